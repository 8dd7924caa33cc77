//! Identifier validation and file-name escaping
//!
//! Identifiers are arbitrary non-empty strings chosen by callers. They join a
//! stored object, its listener set and its bridge subscription, and they also
//! name files inside the shared directory. Escaping maps every identifier to a
//! single path component and is reversible, so a directory listing can be
//! turned back into identifiers.

use std::fmt::Write;

/// Returns true when the identifier can be used with any keyed operation.
pub fn is_valid(identifier: &str) -> bool {
    !identifier.is_empty()
}

/// Escape an identifier into a file-name safe component.
///
/// Bytes outside `[A-Za-z0-9_-]` are written as `%XX` (uppercase hex). This
/// includes `.`, so the extension separator is never ambiguous, and `%`.
pub fn escape(identifier: &str) -> String {
    let mut escaped = String::with_capacity(identifier.len());
    for byte in identifier.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            escaped.push(byte as char);
        } else {
            // Writing to a String cannot fail.
            let _ = write!(escaped, "%{:02X}", byte);
        }
    }
    escaped
}

/// Reverse [`escape`]. Returns `None` for components that were not produced
/// by it (stray characters, truncated escapes, invalid UTF-8).
pub fn unescape(component: &str) -> Option<String> {
    let bytes = component.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                let hex = component.get(index + 1..index + 3)?;
                if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                index += 3;
            }
            byte if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' => {
                decoded.push(byte);
                index += 1;
            }
            _ => return None,
        }
    }

    String::from_utf8(decoded).ok()
}

/// Build the file name for an identifier with the given extension.
pub fn file_name(identifier: &str, extension: &str) -> String {
    format!("{}.{}", escape(identifier), extension)
}

/// Recover the identifier from a file name produced by [`file_name`].
pub fn from_file_name(file_name: &str, extension: &str) -> Option<String> {
    let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
    if stem.is_empty() {
        return None;
    }
    unescape(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_identifiers_are_untouched() {
        assert_eq!(escape("weather-update_2"), "weather-update_2");
        assert_eq!(file_name("score", "archive"), "score.archive");
    }

    #[test]
    fn test_separators_and_dots_are_escaped() {
        assert_eq!(escape("a/b"), "a%2Fb");
        assert_eq!(escape(".."), "%2E%2E");
        assert_eq!(escape("50%"), "50%25");
        assert_eq!(file_name("com.example.note", "archive"), "com%2Eexample%2Enote.archive");
    }

    #[test]
    fn test_from_file_name_rejects_foreign_files() {
        assert_eq!(from_file_name("score.archive", "archive"), Some("score".to_string()));
        assert_eq!(from_file_name("score.json", "archive"), None);
        assert_eq!(from_file_name(".archive", "archive"), None);
        assert_eq!(from_file_name("bad name.archive", "archive"), None);
        assert_eq!(from_file_name("%4.archive", "archive"), None);
    }

    #[test]
    fn test_validity() {
        assert!(!is_valid(""));
        assert!(is_valid(" "));
        assert!(is_valid("id"));
    }

    proptest! {
        #[test]
        fn escape_is_reversible(identifier in ".+") {
            let escaped = escape(&identifier);
            prop_assert!(!escaped.contains('/'));
            prop_assert!(!escaped.contains('.'));
            prop_assert_eq!(unescape(&escaped), Some(identifier));
        }

        #[test]
        fn file_names_round_trip(identifier in ".+") {
            let name = file_name(&identifier, "archive");
            prop_assert_eq!(from_file_name(&name, "archive"), Some(identifier));
        }
    }
}
