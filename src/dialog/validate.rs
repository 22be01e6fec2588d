//! Input policy for the two collected fields.
//!
//! Names are free text with a length cap. Phones may arrive from a contact
//! card or be typed by hand; both are normalized by dropping common
//! separators and must then look like an E.164 number (optional `+`, 7 to 15
//! digits).

use std::sync::LazyLock;

use regex::Regex;

/// Longest accepted name, in characters.
pub const MAX_NAME_CHARS: usize = 128;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern is valid"));

/// Validate a name. Returns the trimmed name, or `None` if unusable.
pub fn name(input: Option<&str>) -> Option<String> {
    let trimmed = input?.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_CHARS {
        return None;
    }
    Some(trimmed.to_string())
}

/// Validate a phone number. Returns the normalized number, or `None`.
pub fn phone(input: Option<&str>) -> Option<String> {
    let normalized: String = input?
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    PHONE_RE.is_match(&normalized).then_some(normalized)
}
