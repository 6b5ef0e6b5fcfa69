//! Data model (§3): `Document`, `Section`, and the normalization rules applied
//! on ingestion. Facet sets are normalized once, here, so every downstream
//! component (Store, MetadataSearcher, FtsSearcher) can assume lower-case,
//! trimmed, de-duplicated strings.

use serde::{Deserialize, Serialize};

const DEFAULT_PRIORITY: i32 = 5;

/// Wire schema for a single section inside a document JSON (§6, bit-exact).
#[derive(Debug, Clone, Deserialize)]
pub struct SectionInput {
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub content: String,
}

/// Wire schema for a document JSON (§6, bit-exact; unknown fields ignored).
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

/// A document header without its sections (used by `list_documents`).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHeader {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub sections: usize,
}

/// A normalized, Store-assigned section. `section_id` is `None` until the
/// Store has assigned one.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub section_id: i64,
    pub doc_name: String,
    pub title: String,
    pub path: String,
    pub url: String,
    pub content: String,
    pub priority: i32,
    pub keywords: Vec<String>,
    pub use_cases: Vec<String>,
    pub tags: Vec<String>,
}

/// Normalize a facet set: lower-case, trim, drop empties, de-duplicate while
/// preserving first-seen order (§3: "normalized ... on insertion").
pub fn normalize_facets(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for v in values {
        let t = v.trim().to_lowercase();
        if t.is_empty() {
            continue;
        }
        if seen.insert(t.clone()) {
            out.push(t);
        }
    }
    out
}

/// Clamp priority to [1,10]; missing or out-of-range becomes 5 (§3).
pub fn normalize_priority(priority: Option<i32>) -> i32 {
    match priority {
        Some(p) if (1..=10).contains(&p) => p,
        _ => DEFAULT_PRIORITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_facets_dedupes_and_lowercases() {
        let input = vec![
            " Auth ".to_string(),
            "auth".to_string(),
            "API-Key".to_string(),
            "".to_string(),
            "  ".to_string(),
        ];
        let out = normalize_facets(&input);
        assert_eq!(out, vec!["auth".to_string(), "api-key".to_string()]);
    }

    #[test]
    fn normalize_priority_clamps_and_defaults() {
        assert_eq!(normalize_priority(Some(0)), 5);
        assert_eq!(normalize_priority(Some(11)), 5);
        assert_eq!(normalize_priority(Some(7)), 7);
        assert_eq!(normalize_priority(None), 5);
        assert_eq!(normalize_priority(Some(1)), 1);
        assert_eq!(normalize_priority(Some(10)), 10);
    }

    #[test]
    fn document_input_deserializes_missing_optionals() {
        let json = r#"{
            "name": "openrouter",
            "display_name": "OpenRouter",
            "version": "1.0",
            "base_url": "https://openrouter.ai",
            "sections": [
                { "title": "Authentication", "path": "/auth", "keywords": ["auth", "api-key"] }
            ]
        }"#;
        let doc: DocumentInput = serde_json::from_str(json).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].priority, None);
        assert!(doc.sections[0].use_cases.is_empty());
        assert!(doc.sections[0].content.is_empty());
    }
}
