//! Canonical comparison keys for people: display names, phone numbers, emails.
//!
//! Every index and lookup in the crate goes through these functions so that a
//! roster row, a calendar attendee, and a cached funding row all produce the
//! same key for the same written name.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Minimum digit count for a phone number to be usable as a lookup key.
const MIN_PHONE_DIGITS: usize = 7;

/// Normalize a display name: fold case and diacritics, drop apostrophes,
/// turn other punctuation into word breaks, collapse whitespace.
///
/// `"  O'Brien,  Mary-Jane "` → `"obrien mary jane"`.
pub fn normalize_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        for lower in c.to_lowercase() {
            if is_combining_mark(lower) {
                continue;
            }
            if lower.is_alphanumeric() {
                out.push(lower);
            } else if is_apostrophe(lower) {
                // O'Brien and OBrien are the same written name
            } else {
                out.push(' ');
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '\u{2018}' | '`')
}

/// Normalize a phone number to its digits. An 11-digit number with the "1"
/// trunk prefix becomes the 10-digit national form. Returns `None` when fewer
/// than 7 digits remain.
pub fn normalize_phone(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    if digits.len() == 11 && digits.starts_with('1') {
        return Some(digits[1..].to_string());
    }
    Some(digits)
}

/// Lowercase + trim. Empty input yields `None`.
pub fn normalize_email_for_lookup(value: &str) -> Option<String> {
    let email = value.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

/// Title-case each whitespace-separated word: `"on HOLD"` → `"On Hold"`.
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
