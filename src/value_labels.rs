//! Flattening of value-label maps into `code: label` strings and the reverse parse.
//!
//! A flattened string looks like `"1: Male, 2: Female"`. Label text may
//! itself contain `", "`, so parsing only splits where the comma is
//! followed by the next `<code>:` token.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{CodeKey, ValueLabelMap};

const PAIR_SEPARATOR: &str = ", ";
const KEY_SEPARATOR: &str = ": ";

// A comma and one whitespace character, followed by an optionally negative integer code and a colon.
static SPLIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s-?\d+:").unwrap());

/// Join a label map as `"<code>: <label>"` pairs in key order
pub fn flatten_label_map(map: &ValueLabelMap) -> String {
    map.iter()
        .map(|(code, label)| format!("{}{}{}", code, KEY_SEPARATOR, label))
        .collect::<Vec<_>>()
        .join(PAIR_SEPARATOR)
}

/// Split a flattened string into one fragment per `code: label` pair
pub fn split_value_labels(flattened: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;
    for found in SPLIT_PATTERN.find_iter(flattened) {
        fragments.push(&flattened[start..found.start()]);
        // the next fragment begins after the comma and the whitespace character
        start = found.start()
            + 1
            + flattened[found.start() + 1..]
                .chars()
                .next()
                .map_or(0, char::len_utf8);
    }
    fragments.push(&flattened[start..]);
    fragments
}

/// Integer parse that reports failure instead of raising it
pub fn try_parse_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Parse a flattened string back into a code -> label map.
///
/// Fragments without `": "` are skipped; malformed input gives an empty map.
pub fn parse_value_labels(flattened: &str) -> ValueLabelMap {
    let mut labels = ValueLabelMap::new();
    for fragment in split_value_labels(flattened) {
        let Some((key, value)) = fragment.split_once(KEY_SEPARATOR) else {
            continue;
        };
        let code = match try_parse_int(key) {
            Some(code) => CodeKey::Int(code),
            None => CodeKey::Str(key.to_string()),
        };
        labels.insert(code, value.trim().to_string());
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(entries: &[(CodeKey, &str)]) -> ValueLabelMap {
        entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_flatten_label_map() {
        let labels = map(&[
            (CodeKey::Int(1), "Male"),
            (CodeKey::Int(-2), "Refused"),
            (CodeKey::Str("x".to_string()), "Other"),
        ]);
        assert_eq!(flatten_label_map(&labels), "1: Male, -2: Refused, x: Other");
        assert_eq!(flatten_label_map(&ValueLabelMap::new()), "");
    }

    #[test]
    fn test_split_keeps_commas_inside_labels() {
        assert_eq!(
            split_value_labels("1: red, blue car, 2: green"),
            vec!["1: red, blue car", "2: green"]
        );
    }

    #[test]
    fn test_split_negative_codes() {
        assert_eq!(
            split_value_labels("-1: Don't know, 1: Yes, -2: No answer"),
            vec!["-1: Don't know", "1: Yes", "-2: No answer"]
        );
    }

    #[test]
    fn test_split_requires_whitespace_after_comma() {
        assert_eq!(split_value_labels("1: a,2: b"), vec!["1: a,2: b"]);
        assert_eq!(split_value_labels("1: a,\t2: b"), vec!["1: a", "2: b"]);
    }

    #[test]
    fn test_split_empty() {
        assert_eq!(split_value_labels(""), vec![""]);
    }

    #[test]
    fn test_parse_value_labels_mixed_keys() {
        let parsed = parse_value_labels("x: Other, 1: Male, 2: Female ");
        let expected = map(&[
            (CodeKey::Str("x".to_string()), "Other"),
            (CodeKey::Int(1), "Male"),
            (CodeKey::Int(2), "Female"),
        ]);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_string_code_after_first_pair_stays_in_label() {
        // only integer codes anchor a split
        let parsed = parse_value_labels("1: Male, x: Other");
        assert_eq!(parsed, map(&[(CodeKey::Int(1), "Male, x: Other")]));
    }

    #[test]
    fn test_parse_skips_fragments_without_separator() {
        assert!(parse_value_labels("").is_empty());
        assert!(parse_value_labels("no pairs here").is_empty());
        assert!(parse_value_labels("int8").is_empty());

        let parsed = parse_value_labels("junk, 3: Three");
        assert_eq!(parsed, map(&[(CodeKey::Int(3), "Three")]));
    }

    #[test]
    fn test_parse_splits_label_at_first_separator() {
        let parsed = parse_value_labels("1: Ratio: high");
        assert_eq!(parsed, map(&[(CodeKey::Int(1), "Ratio: high")]));
    }

    #[test]
    fn test_try_parse_int() {
        assert_eq!(try_parse_int("42"), Some(42));
        assert_eq!(try_parse_int(" -7 "), Some(-7));
        assert_eq!(try_parse_int("4.5"), None);
        assert_eq!(try_parse_int("abc"), None);
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_flatten(
            entries in proptest::collection::vec((any::<i32>(), "[A-Za-z][A-Za-z ,'/()-]{0,20}[A-Za-z]"), 0..12)
        ) {
            let labels: ValueLabelMap = entries
                .into_iter()
                .map(|(code, label)| (CodeKey::Int(i64::from(code)), label))
                .collect();
            let flattened = flatten_label_map(&labels);
            prop_assert_eq!(parse_value_labels(&flattened), labels);
        }
    }
}
