//! Error taxonomy (§7). `EngineError` is the only error type that crosses the
//! public API boundary; everything internal that only needs context-bearing
//! propagation stays on `anyhow` and converts at the edge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cascade timed out after {elapsed_ms}ms (attempted: {search_path:?})")]
    Timeout {
        elapsed_ms: u64,
        search_path: Vec<String>,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("ingest failed, rolled back: {0}")]
    Ingest(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        EngineError::Store(e.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Store(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
