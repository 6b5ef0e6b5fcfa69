//! Cascade Search Engine: a local-first documentation retrieval service.
//!
//! The public surface is [`Engine`], constructed once per process from a
//! [`Config`] and exposing the four query/ingest operations an external
//! tool-call layer (out of scope for this crate) wraps.

mod cache;
mod cascade;
mod config;
mod embedder;
mod error;
mod fts_search;
mod hybrid;
mod metadata_search;
mod model;
mod store;
mod tokenize;
mod vector_index;

pub use config::Config;
pub use engine::{Engine, SearchResponse, SearchResultItem, ShowContextResponse};
pub use error::{EngineError, EngineResult};
pub use model::{DocumentHeader, DocumentInput, SectionInput};

mod engine;

/// Initialize the crate's tracing subscriber from `RUST_LOG` (or a sane
/// default) if one isn't already installed. Convenience for binaries
/// embedding this crate; library code never calls this itself.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
