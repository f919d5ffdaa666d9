use std::sync::LazyLock;

use regex::Regex;

static NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9]").unwrap());

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Strips formatting from a phone number, keeping only digits.
///
/// Returns `None` unless the result has an E.164-compatible length.
pub fn normalize_phone(input: &str) -> Option<String> {
    let digits = NON_DIGITS.replace_all(input.trim(), "").into_owned();

    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS)
        .contains(&digits.len())
        .then_some(digits)
}

/// Returns the base64 payload of a `data:` URL, or the input itself when it
/// carries no header.
pub fn strip_data_url(input: &str) -> &str {
    let input = input.trim();

    match input.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or("", |(_, payload)| payload),
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_phone, strip_data_url};

    #[test]
    fn test_basic() {
        assert_eq!(normalize_phone("15551234567").as_deref(), Some("15551234567"));
        assert_eq!(normalize_phone("+1 (555) 123-4567").as_deref(), Some("15551234567"));
        assert_eq!(normalize_phone("  44 20 7946 0958 ").as_deref(), Some("442079460958"));
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(normalize_phone("123456"), None);
        assert_eq!(normalize_phone("1234567").as_deref(), Some("1234567"));
        assert_eq!(normalize_phone("123456789012345").as_deref(), Some("123456789012345"));
        assert_eq!(normalize_phone("1234567890123456"), None);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("   "), None);
        assert_eq!(normalize_phone("not a phone"), None);
    }

    #[test]
    fn test_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,aGVsbG8="), "aGVsbG8=");
        assert_eq!(strip_data_url("aGVsbG8="), "aGVsbG8=");
        assert_eq!(strip_data_url("data:image/png;base64"), "");
    }
}
