// src/util.rs — Small text helpers shared by hint builders and logs

use std::borrow::Cow;

/// Shorten to at most `max_chars` characters, marking the cut with `…`.
/// Counts characters, not bytes, so CJK memos are cut at the same visual width.
pub fn truncate_str(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some(_) if max_chars == 0 => Cow::Borrowed(""),
        Some(_) => {
            let keep: String = s.chars().take(max_chars.saturating_sub(1)).collect();
            Cow::Owned(format!("{keep}…"))
        }
    }
}

/// Case-insensitive substring test. An empty needle never matches.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}
