//! Name parsing: surname keys and honorific titles.
//!
//! Names follow `"Surname, Title. Given names"`. The surname is the part
//! before the first comma; the title sits between that comma and the next
//! period.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::types::PassengerRecord;

// Group 1: surname, group 2: title (up to the first period, or end of string).
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^,]*),([^.]*)").expect("Invalid regex: passenger name"));

/// Surname key of a full name.
///
/// A name without a comma is treated as a bare surname.
pub fn surname_key(name: &str) -> String {
    match NAME_PATTERN.captures(name) {
        Some(caps) => caps[1].trim().to_string(),
        None => name.trim().to_string(),
    }
}

/// Title of a full name, or `None` when the name has no comma or the title
/// is empty.
pub fn parse_title(name: &str) -> Option<String> {
    NAME_PATTERN
        .captures(name)
        .map(|caps| caps[2].trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Sorted distinct non-empty surnames across `records`.
pub fn distinct_surnames<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a PassengerRecord>,
{
    records
        .into_iter()
        .map(|r| r.surname_key.as_str())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
