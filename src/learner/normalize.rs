// src/learner/normalize.rs — Description fingerprints

use regex::Regex;
use std::sync::LazyLock;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2,4}[/\-.]\d{1,2}(?:[/\-.]\d{1,2})?").expect("date regex")
});

static LONG_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,}\b").expect("number regex"));

/// Strip dates and 4+ digit numbers, then collapse whitespace, so that
/// recurring descriptions ("RENT 2026/03 #88123") share one fingerprint.
pub fn normalize_description(text: &str) -> String {
    let without_dates = DATE_RE.replace_all(text, " ");
    let without_numbers = LONG_NUMBER_RE.replace_all(&without_dates, " ");
    without_numbers.split_whitespace().collect::<Vec<_>>().join(" ")
}
