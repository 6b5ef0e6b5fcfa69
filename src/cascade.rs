//! Cascade orchestration (§4.8): consults each layer in strict order,
//! short-circuiting at the first hit and recording a transparency trace.

use crate::cache::QueryCache;
use crate::embedder::EmbedderHandle;
use crate::error::EngineResult;
use crate::fts_search::FtsSearcher;
use crate::hybrid::HybridReranker;
use crate::metadata_search::MetadataSearcher;
use crate::model::Section;
use crate::store::Store;
use crate::vector_index::VectorIndex;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Cache,
    Metadata,
    Fts,
    HybridRerank,
    Miss,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub section_id: i64,
    pub similarity_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct Transparency {
    pub method: Method,
    pub latency_ms: u64,
    pub search_path: Vec<String>,
    pub from_cache: bool,
    pub similarity_scores: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub found: bool,
    pub results: Vec<SearchResult>,
    pub transparency: Transparency,
}

pub struct CascadeDeps<'a> {
    pub store: &'a Store,
    pub vector_index: &'a VectorIndex,
    pub embedder: &'a EmbedderHandle,
    pub metadata: &'a MetadataSearcher,
    pub fts: &'a FtsSearcher,
    pub hybrid: &'a HybridReranker,
}

pub fn run(
    deps: &CascadeDeps,
    cache: &mut QueryCache,
    query: &str,
    doc_name: Option<&str>,
    max_results: usize,
    deadline: Option<Instant>,
) -> EngineResult<CascadeOutcome> {
    let started = Instant::now();
    let mut path: Vec<String> = Vec::new();

    let span = tracing::debug_span!("cascade", query, doc_name = ?doc_name);
    let _enter = span.enter();

    // Layer 1: cache.
    if let Some(hit) = cache.get(query, doc_name, |id| deps.store.section_exists(id)) {
        path.push("cache_hit".to_string());
        tracing::debug!(layer = "cache", verdict = "hit");
        let results = hit
            .section_ids
            .into_iter()
            .map(|id| SearchResult { section_id: id, similarity_score: None })
            .collect();
        return Ok(finish(true, results, Method::Cache, path, true, None, started));
    }
    path.push("cache_miss".to_string());
    tracing::debug!(layer = "cache", verdict = "miss");

    if deadline_exceeded(deadline) {
        return Err(timeout_error(path, started));
    }

    // Layer 2: metadata.
    let all_sections: Vec<Section> = match doc_name {
        Some(d) => deps.store.iter_sections_for_doc(d)?,
        None => deps.store.iter_sections()?,
    };
    let metadata_candidates = deps.metadata.search(query, &all_sections);
    if MetadataSearcher::is_hit(&metadata_candidates) {
        path.push("metadata_hit".to_string());
        tracing::debug!(layer = "metadata", verdict = "hit");
        let section_ids: Vec<i64> = metadata_candidates
            .iter()
            .take(max_results)
            .map(|c| c.section_id)
            .collect();
        cache.put(query, doc_name, section_ids.clone());
        let results = section_ids
            .into_iter()
            .map(|id| SearchResult { section_id: id, similarity_score: None })
            .collect();
        return Ok(finish(true, results, Method::Metadata, path, false, None, started));
    }
    path.push("metadata_miss".to_string());
    tracing::debug!(layer = "metadata", verdict = "miss");

    if deadline_exceeded(deadline) {
        return Err(timeout_error(path, started));
    }

    // Layer 3: FTS.
    let sections_by_id: std::collections::HashMap<i64, Section> =
        all_sections.iter().map(|s| (s.section_id, s.clone())).collect();
    let fts_candidates =
        deps.fts
            .search(deps.store, query, doc_name, |id| sections_by_id.get(&id).cloned())?;

    if fts_candidates.is_empty() {
        path.push("fts_miss".to_string());
        tracing::debug!(layer = "fts", verdict = "miss");
        return Ok(finish(false, Vec::new(), Method::Miss, path, false, None, started));
    }

    let fts_is_hit = FtsSearcher::is_hit(&fts_candidates);

    if !deps.embedder.is_available() {
        if fts_is_hit {
            path.push("embedder_unavailable".to_string());
            tracing::debug!(layer = "fts", verdict = "hit_no_embedder");
            let section_ids: Vec<i64> = fts_candidates
                .iter()
                .take(max_results)
                .map(|c| c.section_id)
                .collect();
            cache.put(query, doc_name, section_ids.clone());
            let results = section_ids
                .into_iter()
                .map(|id| SearchResult { section_id: id, similarity_score: None })
                .collect();
            return Ok(finish(true, results, Method::Fts, path, false, None, started));
        }
        path.push("fts_miss".to_string());
        path.push("embedder_unavailable".to_string());
        tracing::debug!(layer = "fts", verdict = "miss_no_embedder");
        return Ok(finish(false, Vec::new(), Method::Miss, path, false, None, started));
    }

    if deadline_exceeded(deadline) {
        return Err(timeout_error(path, started));
    }

    // Layer 4: hybrid rerank. Runs whenever the embedder is available and FTS
    // produced candidates, regardless of `fts_is_hit` (§4.8 step 4).
    let query_vec = deps.embedder.embed(query);
    match query_vec {
        Some(vec) => {
            let hybrid_results =
                deps.hybrid.rerank(&fts_candidates, &vec, deps.vector_index, max_results);
            if hybrid_results.is_empty() {
                path.push("hybrid_empty".to_string());
                tracing::debug!(layer = "hybrid", verdict = "empty");
                return Ok(finish(false, Vec::new(), Method::Miss, path, false, None, started));
            }
            path.push("hybrid_hit".to_string());
            tracing::debug!(layer = "hybrid", verdict = "hit");
            let similarity_scores: Vec<f32> = hybrid_results.iter().map(|r| r.similarity).collect();
            let section_ids: Vec<i64> = hybrid_results.iter().map(|r| r.section_id).collect();
            cache.put(query, doc_name, section_ids.clone());
            let results = hybrid_results
                .into_iter()
                .map(|r| SearchResult { section_id: r.section_id, similarity_score: Some(r.similarity) })
                .collect();
            Ok(finish(
                true,
                results,
                Method::HybridRerank,
                path,
                false,
                Some(similarity_scores),
                started,
            ))
        }
        None => {
            // Embedder reported available() but failed this call; degrade
            // the same way as an unavailable embedder (§7).
            if fts_is_hit {
                path.push("embedder_unavailable".to_string());
                let section_ids: Vec<i64> = fts_candidates
                    .iter()
                    .take(max_results)
                    .map(|c| c.section_id)
                    .collect();
                let results = section_ids
                    .into_iter()
                    .map(|id| SearchResult { section_id: id, similarity_score: None })
                    .collect();
                Ok(finish(true, results, Method::Fts, path, false, None, started))
            } else {
                path.push("fts_miss".to_string());
                path.push("embedder_unavailable".to_string());
                Ok(finish(false, Vec::new(), Method::Miss, path, false, None, started))
            }
        }
    }
}

fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    matches!(deadline, Some(d) if Instant::now() >= d)
}

fn timeout_error(path: Vec<String>, started: Instant) -> crate::error::EngineError {
    crate::error::EngineError::Timeout {
        elapsed_ms: elapsed_ms(started),
        search_path: path,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn finish(
    found: bool,
    results: Vec<SearchResult>,
    method: Method,
    search_path: Vec<String>,
    from_cache: bool,
    similarity_scores: Option<Vec<f32>>,
    started: Instant,
) -> CascadeOutcome {
    let latency_ms = elapsed_ms(started);
    tracing::info!(method = ?method, latency_ms, from_cache, "search completed");
    CascadeOutcome {
        found,
        results,
        transparency: Transparency {
            method,
            latency_ms,
            search_path,
            from_cache,
            similarity_scores,
        },
    }
}
