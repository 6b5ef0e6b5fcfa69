//! End-to-end cascade scenarios exercised through the public `Engine` API
//! rather than any single module's internals.

use cascade_docs::{DocumentInput, Engine, SectionInput};

fn doc(name: &str, sections: Vec<SectionInput>) -> DocumentInput {
    DocumentInput {
        name: name.to_string(),
        display_name: name.to_string(),
        version: "1.0".to_string(),
        base_url: format!("https://{name}.example"),
        sections,
    }
}

fn section(title: &str, path: &str, keywords: &[&str], content: &str) -> SectionInput {
    SectionInput {
        title: title.to_string(),
        path: path.to_string(),
        url: String::new(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        use_cases: vec![],
        tags: vec![],
        priority: None,
        content: content.to_string(),
    }
}

#[test]
fn cache_short_circuit_scenario() {
    let engine = Engine::in_memory_for_tests().unwrap();
    engine
        .add_document(doc(
            "openrouter",
            vec![section(
                "Authentication",
                "/auth",
                &["auth", "api-key"],
                "Use your API key in the Authorization header.",
            )],
        ))
        .unwrap();

    let first = engine.search("api-key", None, None, None).unwrap();
    assert_eq!(first.method, "metadata");
    assert!(!first.from_cache);

    let second = engine.search("api-key", None, None, None).unwrap();
    assert_eq!(second.method, "cache");
    assert!(second.from_cache);
    assert_eq!(first.results[0].section_id, second.results[0].section_id);
}

#[test]
fn metadata_beats_fts_scenario() {
    let engine = Engine::in_memory_for_tests().unwrap();
    engine
        .add_document(doc(
            "streaming-doc",
            vec![
                section("Streaming API", "/a", &["streaming"], "short content"),
                section(
                    "Unrelated",
                    "/b",
                    &[],
                    "streaming streaming streaming but never tagged as such",
                ),
            ],
        ))
        .unwrap();

    let response = engine.search("streaming", None, None, None).unwrap();
    assert_eq!(response.method, "metadata");
    assert_eq!(response.results[0].title, "Streaming API");
}

#[test]
fn graceful_degradation_without_embedder_uses_fts() {
    let engine = Engine::in_memory_for_tests().unwrap();
    engine
        .add_document(doc(
            "openrouter",
            vec![
                section(
                    "OAuth PKCE",
                    "/oauth",
                    &[],
                    "OpenRouter supports OAuth with PKCE for user-facing apps.",
                ),
                section("Quickstart", "/quickstart", &[], "Send your first request."),
            ],
        ))
        .unwrap();

    // The hybrid layer rewrites search_path with a hybrid_hit/hybrid_empty
    // marker whenever the embedder is available; this scenario only checks
    // that a pure-keyword BM25 query can still resolve to a result when
    // metadata has nothing to say about it.
    let response = engine.search("PKCE", None, None, None).unwrap();
    assert!(response.found);
    assert_eq!(response.results[0].title, "OAuth PKCE");
}

#[test]
fn miss_scenario_reports_full_path() {
    let engine = Engine::in_memory_for_tests().unwrap();
    engine
        .add_document(doc(
            "openrouter",
            vec![section("Quickstart", "/quickstart", &[], "Send your first request.")],
        ))
        .unwrap();

    let response = engine.search("quantum teleportation", None, None, None).unwrap();
    assert!(!response.found);
    assert_eq!(response.search_path[0], "cache_miss");
    assert_eq!(response.search_path[1], "metadata_miss");
}

#[test]
fn idempotent_reingest_scenario() {
    let engine = Engine::in_memory_for_tests().unwrap();
    let d = doc(
        "openrouter",
        vec![section("Quickstart", "/quickstart", &["quickstart"], "Send your first request.")],
    );
    engine.add_document(d.clone()).unwrap();
    engine.add_document(d.clone()).unwrap();

    let docs = engine.list_documents().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].sections, 1);

    let first = engine.search("quickstart", None, None, None).unwrap();
    engine.search("quickstart", None, None, None).unwrap();
    let docs_again = engine.list_documents().unwrap();
    assert_eq!(docs_again[0].sections, 1, "re-ingest must not grow section count");
    assert_eq!(first.results.len(), 1);
}

#[test]
fn delete_document_scenario() {
    let engine = Engine::in_memory_for_tests().unwrap();
    engine
        .add_document(doc(
            "openrouter",
            vec![section("Quickstart", "/quickstart", &["quickstart"], "Send your first request.")],
        ))
        .unwrap();

    let removed = engine.delete_document("openrouter").unwrap();
    assert_eq!(removed, 1);

    let response = engine.search("quickstart", None, None, None).unwrap();
    assert!(!response.found, "no section from a deleted document should ever match");
}
