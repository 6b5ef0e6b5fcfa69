//! Layer 3: BM25 full-text search (§4.6), thin wrapper around
//! `Store::fts_search` that normalizes SQLite's `bm25()` rank into `[0,1]`
//! and applies the doc-order sort and hit-threshold policy.

use crate::model::Section;
use crate::store::Store;

pub struct FtsCandidate {
    pub section_id: i64,
    /// Normalized into `[0,1]`, higher is better.
    pub score_norm: f32,
    pub priority: i32,
}

pub struct FtsSearcher {
    pub candidate_cap: usize,
}

const HIT_THRESHOLD: f32 = 0.15;

impl FtsSearcher {
    pub fn new(candidate_cap: usize) -> Self {
        FtsSearcher { candidate_cap }
    }

    /// Run the BM25 query and return candidates ordered by normalized score
    /// desc, priority desc, section_id asc — `sections_by_id` supplies the
    /// `priority` field the raw `(section_id, bm25_rank)` pairs don't carry.
    pub fn search(
        &self,
        store: &Store,
        query: &str,
        doc_name: Option<&str>,
        sections_by_id: impl Fn(i64) -> Option<Section>,
    ) -> crate::error::EngineResult<Vec<FtsCandidate>> {
        let raw = store.fts_search(query, doc_name, self.candidate_cap)?;
        let mut candidates: Vec<FtsCandidate> = raw
            .into_iter()
            .filter_map(|(section_id, bm25_rank)| {
                let priority = sections_by_id(section_id)?.priority;
                Some(FtsCandidate {
                    section_id,
                    score_norm: normalize_bm25(bm25_rank),
                    priority,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score_norm
                .total_cmp(&a.score_norm)
                .then(b.priority.cmp(&a.priority))
                .then(a.section_id.cmp(&b.section_id))
        });
        Ok(candidates)
    }

    pub fn is_hit(candidates: &[FtsCandidate]) -> bool {
        candidates.iter().any(|c| c.score_norm >= HIT_THRESHOLD)
    }
}

/// SQLite's `bm25()` returns a non-positive number, more negative is more
/// relevant. §4.6 maps the rank monotonically into `[0,1]` for downstream
/// blending; taking the rank's magnitude `m` (sign is purely a SQLite
/// convention) and normalizing via `m/(1+m)` keeps the mapping increasing in
/// match strength, so a stronger BM25 match always yields a higher score.
fn normalize_bm25(bm25_rank: f64) -> f32 {
    let magnitude = bm25_rank.abs();
    (magnitude / (1.0 + magnitude)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_bm25_is_monotonic_and_bounded() {
        let weak = normalize_bm25(-0.2);
        let strong = normalize_bm25(-8.0);
        assert!(strong > weak, "a more negative bm25 rank is a stronger match");
        assert!(weak < 1.0 && weak > 0.0);
        assert!(strong < 1.0 && strong > 0.0);
    }

    #[test]
    fn normalize_bm25_of_zero_is_zero() {
        assert!((normalize_bm25(0.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn is_hit_respects_threshold() {
        let weak = FtsCandidate { section_id: 1, score_norm: 0.05, priority: 5 };
        let strong = FtsCandidate { section_id: 2, score_norm: 0.2, priority: 5 };
        assert!(!FtsSearcher::is_hit(&[weak]));
        assert!(FtsSearcher::is_hit(&[strong]));
    }

    #[test]
    fn is_hit_on_empty_candidates_is_false() {
        assert!(!FtsSearcher::is_hit(&[]));
    }
}
