//! Inline query classification
//!
//! Routes a raw inline query to one of four handling paths: empty prompt,
//! numeric price conversion, username lookup, or invalid input.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Digits with optional comma/period separators
    static ref NUMERIC_RE: Regex = Regex::new(r"^[\d,\.]+$").unwrap();
    /// Accepted username grammar: starts with a letter, ends with a letter
    /// or digit, interior letters/digits/underscore
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-z][a-z0-9_]{2,}[a-z0-9]$").unwrap();
}

/// Classified inline query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Empty,
    /// Digits/comma/period input, kept verbatim for decimal parsing
    Numeric(String),
    /// Normalized (lowercased, stripped) username matching the grammar
    Identifier(String),
    Invalid,
}

/// Classify a raw inline query.
///
/// Spaces are stripped everywhere; on the identifier path a leading `@`
/// is dropped and the rest lowercased before the grammar check.
pub fn classify(raw_query: &str) -> QueryKind {
    if raw_query.trim().is_empty() {
        return QueryKind::Empty;
    }

    let compact: String = raw_query.chars().filter(|c| !c.is_whitespace()).collect();

    if NUMERIC_RE.is_match(&compact) {
        return QueryKind::Numeric(compact);
    }

    let normalized = compact.to_lowercase().replace('@', "");
    if USERNAME_RE.is_match(&normalized) {
        QueryKind::Identifier(normalized)
    } else {
        QueryKind::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query() {
        assert_eq!(classify(""), QueryKind::Empty);
        assert_eq!(classify("   "), QueryKind::Empty);
    }

    #[test]
    fn test_numeric_queries() {
        assert_eq!(classify("100"), QueryKind::Numeric("100".to_string()));
        assert_eq!(classify("1,5"), QueryKind::Numeric("1,5".to_string()));
        assert_eq!(classify("3.25"), QueryKind::Numeric("3.25".to_string()));
        assert_eq!(classify(" 10 "), QueryKind::Numeric("10".to_string()));
    }

    #[test]
    fn test_identifier_acceptance_matches_grammar() {
        for ok in ["abcde", "a12_b", "hello_world", "abc9", "x_y_z9"] {
            assert_eq!(
                classify(ok),
                QueryKind::Identifier(ok.to_string()),
                "expected {ok} to be accepted"
            );
        }
        // Normalization: mention symbol, case, spaces
        assert_eq!(
            classify("@Alice_99"),
            QueryKind::Identifier("alice_99".to_string())
        );
        assert_eq!(
            classify("  ab cde "),
            QueryKind::Identifier("abcde".to_string())
        );
    }

    #[test]
    fn test_identifier_rejection_matches_grammar() {
        // Too short, bad first char, bad last char, illegal chars
        for bad in ["abc", "1abcd", "_abcd", "abcd_", "ab-cd", "héllo", "ab.cd5x"] {
            assert_eq!(classify(bad), QueryKind::Invalid, "expected {bad} rejected");
        }
    }
}
