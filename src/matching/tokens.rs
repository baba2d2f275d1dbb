//! Keyword tokenization and the partial-match score.
//!
//! A keyword such as `"white background, standing, full body, 1girl"` is split
//! on the separator into trimmed, non-empty tokens. The partial score against a
//! metadata value is the fraction of tokens contained in that value:
//!
//! ```text
//! tokens  = [white background, standing, full body, 1girl]
//! value   = "1girl, standing, full body, outdoors"
//! score   = 3 / 4 = 0.75
//! ```
//!
//! Containment is a case-sensitive substring test, so token order and position
//! in the value do not matter.

use serde::{Deserialize, Serialize};

/// Split `keyword` on the literal `separator`, trimming and dropping empty pieces.
///
/// An empty separator does not split.
pub fn tokenize<'a>(keyword: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        let trimmed = keyword.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed]
        };
    }
    keyword
        .split(separator)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenScore {
    pub score: f64,
    /// Tokens found in the value, in keyword order.
    pub matched_tokens: Vec<String>,
    pub total_tokens: usize,
}

/// Score `keyword` against one metadata value.
pub fn score_tokens(keyword: &str, value: &str, separator: &str) -> TokenScore {
    let tokens = tokenize(keyword, separator);
    if tokens.is_empty() {
        return TokenScore {
            score: 0.0,
            matched_tokens: Vec::new(),
            total_tokens: 0,
        };
    }
    let matched_tokens: Vec<String> = tokens
        .iter()
        .filter(|t| value.contains(**t))
        .map(|t| t.to_string())
        .collect();
    TokenScore {
        score: matched_tokens.len() as f64 / tokens.len() as f64,
        matched_tokens,
        total_tokens: tokens.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_and_trims() {
        assert_eq!(tokenize(" a , b,c ", ","), vec!["a", "b", "c"]);
    }

    #[test]
    fn tokenize_drops_empty_pieces() {
        assert_eq!(tokenize("a,, ,b,", ","), vec!["a", "b"]);
        assert!(tokenize(" , ,", ",").is_empty());
        assert!(tokenize("", ",").is_empty());
    }

    #[test]
    fn tokenize_without_separator_is_single_token() {
        assert_eq!(tokenize("  blue sky  ", ","), vec!["blue sky"]);
    }

    #[test]
    fn tokenize_custom_multi_char_separator() {
        assert_eq!(tokenize("a || b || c", "||"), vec!["a", "b", "c"]);
    }

    #[test]
    fn tokenize_empty_separator_does_not_split() {
        assert_eq!(tokenize(" a,b ", ""), vec!["a,b"]);
        assert!(tokenize("  ", "").is_empty());
    }

    #[test]
    fn score_counts_contained_tokens() {
        let s = score_tokens(
            "white background, standing, full body, 1girl",
            "1girl, standing, full body, outdoors",
            ",",
        );
        assert_eq!(s.score, 0.75);
        assert_eq!(s.matched_tokens, vec!["standing", "full body", "1girl"]);
        assert_eq!(s.total_tokens, 4);
    }

    #[test]
    fn score_is_order_invariant() {
        let a = score_tokens("a, b, c", "c b", ",");
        let b = score_tokens("c, a, b", "c b", ",");
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn score_is_case_sensitive() {
        assert_eq!(score_tokens("Cat", "cat", ",").score, 0.0);
    }

    #[test]
    fn score_with_no_tokens_is_zero() {
        let s = score_tokens(" , ", "anything", ",");
        assert_eq!(s.score, 0.0);
        assert_eq!(s.total_tokens, 0);
    }

    #[test]
    fn substring_containment_not_equality() {
        assert_eq!(score_tokens("girl", "1girl", ",").score, 1.0);
    }
}
