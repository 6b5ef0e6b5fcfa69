//! Embedding backends (§4.7). `Embedder` is the seam the HybridReranker
//! depends on; the production backend wraps a local `model2vec-rs` static
//! model, and a deterministic hash-based backend exists for tests and for
//! running with `embedder_enabled = false` (§4.8's "Embedder unavailable"
//! path is exercised the same way regardless of which backend is in use).

use model2vec_rs::model::StaticModel;
use std::sync::atomic::{AtomicBool, Ordering};

/// A source of L2-normalized dense vectors, one per input string.
pub trait Embedder: Send + Sync {
    /// Embedding dimension this backend produces.
    fn dim(&self) -> usize;

    /// Encode one string into a unit-length vector of length `dim()`.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Encode a batch of strings (§4.2: "semantically equivalent to
    /// per-text `embed`"). Backends whose underlying model exposes a true
    /// batched encode path can override this; the default is correct for
    /// any backend, just not necessarily the fastest.
    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Wraps a local `model2vec-rs` model (§4.7: "a local, static embedding
/// model; no network calls at query time").
pub struct Model2VecEmbedder {
    model: StaticModel,
    dim: usize,
}

impl Model2VecEmbedder {
    pub fn load(model_id: &str) -> anyhow::Result<Self> {
        let model = StaticModel::from_pretrained(model_id, None, None, None)?;
        let dim = model.encode_single("dimension probe").len();
        Ok(Model2VecEmbedder { model, dim })
    }
}

impl Embedder for Model2VecEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        normalize(self.model.encode_single(text))
    }
}

/// A deterministic, model-free embedder: hashes overlapping token shingles
/// into fixed-size buckets, à la the feature-hashing trick. It has no
/// semantic content whatsoever, but it is stable and dependency-free, which
/// is exactly what tests and `embedder_enabled = false` deployments need.
pub struct DeterministicEmbedder {
    dim: usize,
}

impl DeterministicEmbedder {
    pub fn new(dim: usize) -> Self {
        DeterministicEmbedder { dim }
    }
}

impl Embedder for DeterministicEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in crate::tokenize::tokenize(text) {
            let h = xxhash_rust::xxh3::xxh3_64(token.as_bytes());
            let bucket = (h as usize) % self.dim;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(v)
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
    v
}

/// Tracks whether the embedder has gone unavailable, so the engine can log
/// the warning exactly once per process (§10 Logging) and route every
/// subsequent query straight to the non-hybrid layers (§4.8).
pub struct EmbedderHandle {
    inner: Option<Box<dyn Embedder>>,
    warned: AtomicBool,
}

impl EmbedderHandle {
    pub fn new(inner: Option<Box<dyn Embedder>>) -> Self {
        EmbedderHandle {
            inner,
            warned: AtomicBool::new(false),
        }
    }

    pub fn disabled() -> Self {
        EmbedderHandle {
            inner: None,
            warned: AtomicBool::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    pub fn dim(&self) -> Option<usize> {
        self.inner.as_ref().map(|e| e.dim())
    }

    /// Returns `None` if the embedder is unavailable, warning exactly once.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match &self.inner {
            Some(e) => Some(e.embed(text)),
            None => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!("embedder unavailable, hybrid rerank layer disabled for this process");
                }
                None
            }
        }
    }

    /// Batch form of [`embed`], used when ingesting a whole document's
    /// sections at once. Returns `None` under the same conditions `embed`
    /// would, without re-emitting the once-per-process warning.
    pub fn embed_batch(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        self.inner.as_ref().map(|e| e.embed_batch(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embedder_is_stable() {
        let e = DeterministicEmbedder::new(64);
        let a = e.embed("authenticate with an api key");
        let b = e.embed("authenticate with an api key");
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_embedder_produces_unit_vectors() {
        let e = DeterministicEmbedder::new(64);
        let v = e.embed("quickstart guide for new users");
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 1e-4 || mag == 0.0);
    }

    #[test]
    fn empty_text_yields_zero_vector_not_nan() {
        let e = DeterministicEmbedder::new(32);
        let v = e.embed("   ");
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn handle_warns_once_when_disabled() {
        let handle = EmbedderHandle::disabled();
        assert!(!handle.is_available());
        assert!(handle.embed("anything").is_none());
        assert!(handle.embed("anything else").is_none());
    }

    #[test]
    fn handle_delegates_when_available() {
        let handle = EmbedderHandle::new(Some(Box::new(DeterministicEmbedder::new(16))));
        assert!(handle.is_available());
        assert_eq!(handle.dim(), Some(16));
        assert!(handle.embed("hello").is_some());
    }

    #[test]
    fn embed_batch_matches_per_text_embed() {
        let e = DeterministicEmbedder::new(32);
        let texts = vec!["authentication guide".to_string(), "quickstart tour".to_string()];
        let batch = e.embed_batch(&texts);
        let singles: Vec<Vec<f32>> = texts.iter().map(|t| e.embed(t)).collect();
        assert_eq!(batch, singles);
    }

    #[test]
    fn handle_embed_batch_none_when_disabled() {
        let handle = EmbedderHandle::disabled();
        assert!(handle.embed_batch(&["a".to_string()]).is_none());
    }
}
