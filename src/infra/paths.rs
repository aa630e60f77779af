// src/infra/paths.rs — Platform path management
//
// LEDGERPILOT_HOME overrides every location (config and data live under it).
// Otherwise config and data follow the platform conventions from `directories`.

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "ledgerpilot")
}

fn home_override() -> Option<PathBuf> {
    std::env::var_os("LEDGERPILOT_HOME").map(PathBuf::from)
}

pub fn config_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home;
    }
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ledgerpilot"))
}

pub fn data_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home.join("data");
    }
    project_dirs()
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ledgerpilot").join("data"))
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn db_path() -> PathBuf {
    data_dir().join("ledgerpilot.db")
}
