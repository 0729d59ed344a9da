//! Helpers for importing many accounts at once.

use itertools::Itertools;

/// Most items the server accepts in one bulk request.
pub const MAX_BULK_ITEMS: usize = 10_000;

/// Turn pasted text into account entries: one per line, trimmed, blank lines
/// and repeats removed, first occurrence order kept.
///
/// # Example
/// ```
/// use account_hub::bulk::parse_bulk_input;
///
/// let entries = parse_bulk_input("alice:pw1\n\n  bob:pw2 \r\nalice:pw1\n");
/// assert_eq!(entries, vec!["alice:pw1", "bob:pw2"]);
/// ```
pub fn parse_bulk_input(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Split entries into request-sized batches.
pub fn batches<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(MAX_BULK_ITEMS)
}
