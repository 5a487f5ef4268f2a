use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static whitespace regex"));

/// Trims and collapses inner whitespace, keeping the original casing.
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

/// Lookup key for free-text names: lower-cased, trimmed, single-spaced.
pub fn normalize_key(value: &str) -> String {
    collapse_whitespace(value).to_lowercase()
}

/// Lookup key for person names: like `normalize_key`, with punctuation dropped
/// so that "J. Doe" and "J Doe" collide.
pub fn normalize_person_name(value: &str) -> String {
    let stripped: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    normalize_key(&stripped)
}
