//! Shared tokenizer (§9 Open Question (c), fixed): split on whitespace and
//! punctuation, lower-case, no stemming. Used by the MetadataSearcher and by
//! the QueryCache's key normalization.

/// Tokenize `text` into lower-case alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Normalize a query string for cache-key purposes: trim, lower-case,
/// collapse internal whitespace (§4.4). Distinct from `tokenize` — this
/// preserves word boundaries as a single string rather than splitting them.
pub fn normalize_query(query: &str) -> String {
    query
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation() {
        let toks = tokenize("How do I use the api-key? (OAuth/PKCE)");
        assert_eq!(
            toks,
            vec!["how", "do", "i", "use", "the", "api", "key", "oauth", "pkce"]
        );
    }

    #[test]
    fn tokenize_empty_string_is_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn normalize_query_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  How   To   OAuth  "), "how to oauth");
    }
}
