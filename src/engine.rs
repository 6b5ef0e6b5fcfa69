//! Process-lifetime façade (§10 "Engine façade"). Owns every component and
//! is the only public entry point; wires the four §6 operations plus
//! `delete_document` over the Cascade orchestrator.

use crate::cache::QueryCache;
use crate::cascade::{self, CascadeDeps, CascadeOutcome};
use crate::config::Config;
use crate::embedder::{DeterministicEmbedder, EmbedderHandle, Model2VecEmbedder};
use crate::error::{EngineError, EngineResult};
use crate::fts_search::FtsSearcher;
use crate::hybrid::HybridReranker;
use crate::metadata_search::MetadataSearcher;
use crate::model::{DocumentHeader, DocumentInput};
use crate::store::Store;
use crate::vector_index::VectorIndex;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Fallback dimension used only when no embedder is available to report its
/// own `dim()` (embedder disabled, or the production model failed to load
/// and even the deterministic fallback hasn't been constructed yet).
const EMBEDDING_DIM: usize = 384;

struct Inner {
    store: Store,
    vector_index: VectorIndex,
}

pub struct Engine {
    inner: RwLock<Inner>,
    cache: RwLock<QueryCache>,
    embedder: EmbedderHandle,
    metadata: MetadataSearcher,
    fts: FtsSearcher,
    hybrid: HybridReranker,
    config: Config,
}

pub struct SearchResponse {
    pub found: bool,
    pub method: String,
    pub results: Vec<SearchResultItem>,
    pub latency_ms: u64,
    pub search_path: Vec<String>,
    pub from_cache: bool,
}

pub struct SearchResultItem {
    pub section_id: i64,
    pub doc_name: String,
    pub title: String,
    pub path: String,
    pub url: String,
    pub content: String,
    pub priority: i32,
    pub similarity_score: Option<f32>,
}

pub struct ShowContextResponse {
    pub preview_tokens: usize,
    pub results: Vec<SearchResultItem>,
}

impl Engine {
    pub fn new(config: Config) -> EngineResult<Self> {
        let db_path = config.data_dir.join("cascade.db");
        let store = Store::open(&db_path)?;

        let embedder = if config.embedder_enabled {
            match Model2VecEmbedder::load(&config.embedder_model_id) {
                Ok(model) => EmbedderHandle::new(Some(Box::new(model))),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load embedder model, falling back to deterministic embedder");
                    EmbedderHandle::new(Some(Box::new(DeterministicEmbedder::new(EMBEDDING_DIM))))
                }
            }
        } else {
            EmbedderHandle::disabled()
        };
        let dim = embedder.dim().unwrap_or(EMBEDDING_DIM);

        let matrix_path = config.data_dir.join("vectors.bin");
        let mapping_path = config.data_dir.join("vectors.json");
        let vector_index = match VectorIndex::load(&matrix_path, &mapping_path) {
            Ok(idx) if idx.dim() == dim => idx,
            Ok(_) => {
                tracing::warn!("vector index dimension does not match the active embedder, rebuilding from store");
                rebuild_vector_index(&store, &embedder, dim)
            }
            Err(e) => {
                tracing::warn!(error = %e, "vector index failed to load, rebuilding from store");
                rebuild_vector_index(&store, &embedder, dim)
            }
        };

        Ok(Engine {
            inner: RwLock::new(Inner { store, vector_index }),
            cache: RwLock::new(QueryCache::new(config.cache_capacity)),
            metadata: MetadataSearcher::new(config.metadata_max_results),
            fts: FtsSearcher::new(config.fts_candidate_cap),
            hybrid: HybridReranker::new(config.hybrid_alpha, config.hybrid_threshold),
            embedder,
            config,
        })
    }

    /// An in-memory, model-free engine for tests: no data directory, no
    /// embedder download, deterministic embeddings.
    pub fn in_memory_for_tests() -> EngineResult<Self> {
        let store = Store::open_in_memory()?;
        let vector_index = VectorIndex::empty(64);
        let config = Config {
            data_dir: PathBuf::new(),
            embedder_enabled: true,
            ..Config::default()
        };
        Ok(Engine {
            inner: RwLock::new(Inner { store, vector_index }),
            cache: RwLock::new(QueryCache::new(config.cache_capacity)),
            metadata: MetadataSearcher::new(config.metadata_max_results),
            fts: FtsSearcher::new(config.fts_candidate_cap),
            hybrid: HybridReranker::new(config.hybrid_alpha, config.hybrid_threshold),
            embedder: EmbedderHandle::new(Some(Box::new(DeterministicEmbedder::new(64)))),
            config,
        })
    }

    pub fn search(
        &self,
        query: &str,
        doc_name: Option<&str>,
        max_results: Option<usize>,
        timeout: Option<Duration>,
    ) -> EngineResult<SearchResponse> {
        if query.trim().is_empty() {
            return Err(EngineError::InvalidInput("query must not be empty".to_string()));
        }
        let max_results = max_results.unwrap_or(self.config.metadata_max_results);
        let deadline = timeout.map(|d| Instant::now() + d);

        let inner = self.inner.read();
        let mut cache = self.cache.write();
        let deps = CascadeDeps {
            store: &inner.store,
            vector_index: &inner.vector_index,
            embedder: &self.embedder,
            metadata: &self.metadata,
            fts: &self.fts,
            hybrid: &self.hybrid,
        };
        let outcome = cascade::run(&deps, &mut cache, query, doc_name, max_results, deadline)?;
        drop(cache);

        self.hydrate(&inner, outcome)
    }

    pub fn show_context(
        &self,
        query: &str,
        doc_name: Option<&str>,
    ) -> EngineResult<ShowContextResponse> {
        let response = self.search(query, doc_name, None, None)?;
        let preview_tokens = response
            .results
            .iter()
            .map(|r| r.content.len() / 4)
            .sum();
        Ok(ShowContextResponse {
            preview_tokens,
            results: response.results,
        })
    }

    pub fn list_documents(&self) -> EngineResult<Vec<DocumentHeader>> {
        self.inner.read().store.list_documents()
    }

    pub fn add_document(&self, doc: DocumentInput) -> EngineResult<(String, usize)> {
        if doc.name.trim().is_empty() {
            return Err(EngineError::InvalidInput("document name must not be empty".to_string()));
        }
        let mut inner = self.inner.write();
        let removed = inner.store.delete_document(&doc.name)?;
        inner.vector_index.remove_many(&removed);

        let section_ids = inner.store.upsert_document(&doc)?;

        if self.embedder.is_available() {
            let sections = inner.store.iter_sections_for_doc(&doc.name)?;
            let contents: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
            if let Some(vectors) = self.embedder.embed_batch(&contents) {
                for (section, vec) in sections.iter().zip(vectors.into_iter()) {
                    inner.vector_index.upsert(section.section_id, vec)?;
                }
            }
        }

        let mut cache = self.cache.write();
        for id in &removed {
            cache.invalidate_section(*id);
        }
        drop(cache);

        let added = section_ids.len();
        Ok((doc.name, added))
    }

    pub fn delete_document(&self, name: &str) -> EngineResult<usize> {
        let mut inner = self.inner.write();
        let removed = inner.store.delete_document(name)?;
        inner.vector_index.remove_many(&removed);

        let mut cache = self.cache.write();
        for id in &removed {
            cache.invalidate_section(*id);
        }
        Ok(removed.len())
    }

    /// Flush the VectorIndex to disk; called at process teardown (§9
    /// "Global state", re-architected lifecycle note).
    pub fn persist(&self) -> EngineResult<()> {
        if self.config.data_dir.as_os_str().is_empty() {
            return Ok(());
        }
        let inner = self.inner.read();
        let matrix_path = self.config.data_dir.join("vectors.bin");
        let mapping_path = self.config.data_dir.join("vectors.json");
        inner.vector_index.persist(&matrix_path, &mapping_path)
    }

    fn hydrate(&self, inner: &Inner, outcome: CascadeOutcome) -> EngineResult<SearchResponse> {
        let mut results = Vec::with_capacity(outcome.results.len());
        for r in &outcome.results {
            let section = inner.store.get_section(r.section_id)?;
            results.push(SearchResultItem {
                section_id: section.section_id,
                doc_name: section.doc_name,
                title: section.title,
                path: section.path,
                url: section.url,
                content: section.content,
                priority: section.priority,
                similarity_score: r.similarity_score,
            });
        }
        Ok(SearchResponse {
            found: outcome.found,
            method: method_label(&outcome.transparency.method),
            results,
            latency_ms: outcome.transparency.latency_ms,
            search_path: outcome.transparency.search_path,
            from_cache: outcome.transparency.from_cache,
        })
    }
}

/// Rebuild the VectorIndex from scratch by re-embedding every section
/// currently in the Store (§4.3/§6: "if the matrix and mapping disagree,
/// the index is rebuilt from the Store and Embedder"). Sections are
/// skipped, not fatal, if the embedder turns out to be unavailable.
fn rebuild_vector_index(store: &Store, embedder: &EmbedderHandle, dim: usize) -> VectorIndex {
    let mut idx = VectorIndex::empty(dim);
    let Ok(sections) = store.iter_sections() else {
        return idx;
    };
    if sections.is_empty() {
        return idx;
    }
    let contents: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
    if let Some(vectors) = embedder.embed_batch(&contents) {
        for (section, vec) in sections.iter().zip(vectors) {
            let _ = idx.upsert(section.section_id, vec);
        }
    }
    idx
}

fn method_label(method: &cascade::Method) -> String {
    match method {
        cascade::Method::Cache => "cache",
        cascade::Method::Metadata => "metadata",
        cascade::Method::Fts => "fts",
        cascade::Method::HybridRerank => "hybrid_rerank",
        cascade::Method::Miss => "miss",
    }
    .to_string()
}
