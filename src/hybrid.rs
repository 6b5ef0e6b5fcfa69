//! Layer 4: hybrid semantic rerank (§4.7). Blends FTS candidates with
//! vector similarity; only runs when the Embedder is available and layer 3
//! produced at least one candidate.

use crate::fts_search::FtsCandidate;
use crate::vector_index::VectorIndex;

pub struct HybridResult {
    pub section_id: i64,
    pub score_hybrid: f32,
    pub similarity: f32,
}

pub struct HybridReranker {
    pub alpha: f32,
    pub threshold: f32,
}

impl HybridReranker {
    pub fn new(alpha: f32, threshold: f32) -> Self {
        HybridReranker { alpha, threshold }
    }

    /// Rerank `candidates` (already FTS-ranked) against `query_vec` using
    /// the vectors in `index`. Sections without an embedding get
    /// `similarity = 0`. A section survives only if `similarity >= threshold`
    /// or its FTS score alone already clears 0.5 (§4.7).
    pub fn rerank(
        &self,
        candidates: &[FtsCandidate],
        query_vec: &[f32],
        index: &VectorIndex,
        max_results: usize,
    ) -> Vec<HybridResult> {
        let sims: std::collections::HashMap<i64, f32> =
            index.similarities(query_vec).into_iter().collect();

        let scored_all: Vec<HybridResult> = candidates
            .iter()
            .map(|c| {
                let similarity = sims.get(&c.section_id).copied().unwrap_or(0.0);
                let score_hybrid = self.alpha * similarity + (1.0 - self.alpha) * c.score_norm;
                HybridResult {
                    section_id: c.section_id,
                    score_hybrid,
                    similarity,
                }
            })
            .collect();

        let mut scored: Vec<HybridResult> = candidates
            .iter()
            .zip(scored_all.iter())
            .filter(|(c, r)| r.similarity >= self.threshold || c.score_norm >= 0.5)
            .map(|(_, r)| HybridResult {
                section_id: r.section_id,
                score_hybrid: r.score_hybrid,
                similarity: r.similarity,
            })
            .collect();

        // §4.7: "never declares a miss unless the input candidate list was
        // empty" — if the threshold filter would empty a nonempty input,
        // fall back to the unfiltered ranking rather than reporting a miss.
        if scored.is_empty() && !scored_all.is_empty() {
            scored = scored_all;
        }

        scored.sort_by(|a, b| b.score_hybrid.total_cmp(&a.score_hybrid));
        scored.truncate(max_results);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, score_norm: f32) -> FtsCandidate {
        FtsCandidate { section_id: id, score_norm, priority: 5 }
    }

    fn unit(values: &[f32]) -> Vec<f32> {
        let mag: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        values.iter().map(|x| x / mag).collect()
    }

    #[test]
    fn blends_similarity_and_fts_score() {
        let mut idx = VectorIndex::empty(2);
        idx.upsert(1, unit(&[1.0, 0.0])).unwrap();
        let reranker = HybridReranker::new(0.7, 0.0);
        let results = reranker.rerank(&[candidate(1, 0.4)], &unit(&[1.0, 0.0]), &idx, 5);
        assert_eq!(results.len(), 1);
        let expected = 0.7 * 1.0 + 0.3 * 0.4;
        assert!((results[0].score_hybrid - expected).abs() < 1e-5);
    }

    #[test]
    fn section_without_embedding_gets_zero_similarity() {
        let idx = VectorIndex::empty(2);
        let reranker = HybridReranker::new(0.7, 0.0);
        let results = reranker.rerank(&[candidate(1, 0.6)], &unit(&[1.0, 0.0]), &idx, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].similarity, 0.0);
    }

    #[test]
    fn low_similarity_dropped_unless_fts_is_strong() {
        let mut idx = VectorIndex::empty(2);
        idx.upsert(1, unit(&[0.0, 1.0])).unwrap();
        idx.upsert(2, unit(&[0.0, 1.0])).unwrap();
        let reranker = HybridReranker::new(0.7, 0.5);
        let results = reranker.rerank(
            &[candidate(1, 0.2), candidate(2, 0.9)],
            &unit(&[1.0, 0.0]),
            &idx,
            5,
        );
        let ids: Vec<i64> = results.iter().map(|r| r.section_id).collect();
        assert!(!ids.contains(&1), "low similarity and weak fts score must be dropped");
        assert!(ids.contains(&2), "strong fts score survives despite low similarity");
    }

    #[test]
    fn empty_candidates_yields_empty_result() {
        let idx = VectorIndex::empty(2);
        let reranker = HybridReranker::new(0.7, 0.5);
        let results = reranker.rerank(&[], &unit(&[1.0, 0.0]), &idx, 5);
        assert!(results.is_empty());
    }

    #[test]
    fn results_capped_at_max_results() {
        let mut idx = VectorIndex::empty(2);
        let cands: Vec<FtsCandidate> = (0..10)
            .map(|i| {
                idx.upsert(i, unit(&[1.0, 0.0])).unwrap();
                candidate(i, 0.9)
            })
            .collect();
        let reranker = HybridReranker::new(0.7, 0.0);
        let results = reranker.rerank(&cands, &unit(&[1.0, 0.0]), &idx, 3);
        assert_eq!(results.len(), 3);
    }
}
