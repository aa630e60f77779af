// src/cli/migrate.rs — Database migration command

use std::path::Path;

use rusqlite::Connection;

use crate::storage::schema;

/// Apply pending migrations, show the version, or roll back the latest one.
pub fn run_migrate(db_path: &Path, status_only: bool, rollback: bool) -> anyhow::Result<()> {
    if !db_path.exists() && (status_only || rollback) {
        println!("No database found at: {}", db_path.display());
        return Ok(());
    }
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;

    if status_only {
        println!("Schema version: {}", schema::current_version(&conn)?);
        return Ok(());
    }

    if rollback {
        match schema::rollback_last(&conn)? {
            Some(version) => println!("Rolled back migration {version}"),
            None => println!("Nothing to roll back"),
        }
        return Ok(());
    }

    let applied = schema::run_migrations(&conn)?;
    println!(
        "Applied {applied} migration(s); schema version {}",
        schema::current_version(&conn)?
    );
    Ok(())
}
