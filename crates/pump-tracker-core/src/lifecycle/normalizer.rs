//! Text normalizer for cross-source matching.
//!
//! Serials, branch names and hospital names come from independently typed
//! sources (loan form, maintenance form, inventory sheet) and differ in case,
//! accents and padding. The normalized form is the only join key.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize free text: decompose accents, drop non-ASCII remnants,
/// uppercase, trim.
///
/// Idempotent: `normalize_text(&normalize_text(x)) == normalize_text(x)`.
pub fn normalize_text(text: &str) -> String {
    text.nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_uppercase()
        .trim()
        .to_string()
}

/// Normalize an optional value; absent input yields an empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize_text).unwrap_or_default()
}

/// Compare two strings by their normalized form.
pub fn same_key(a: &str, b: &str) -> bool {
    normalize_text(a) == normalize_text(b)
}
