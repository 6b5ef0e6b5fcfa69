//! Layer 2: structured metadata match (§4.5). Token-wise scoring over a
//! section's normalized keyword/use_case/tag facets, independent of the FTS
//! index — cheap enough to run on every query before reaching for BM25.

use crate::model::Section;
use crate::tokenize::tokenize;
use rayon::prelude::*;
use std::collections::HashSet;

pub struct MetadataCandidate {
    pub section_id: i64,
    pub score: f32,
    pub priority: i32,
    /// `keyword_hits + use_case_hits + tag_hits`, the layer-hit threshold input.
    pub weighted_hits: u32,
    pub keyword_hits: u32,
}

pub struct MetadataSearcher {
    pub max_results: usize,
}

impl MetadataSearcher {
    pub fn new(max_results: usize) -> Self {
        MetadataSearcher { max_results }
    }

    /// Score every section in `sections` against `query`, keep only those
    /// with a nonzero weighted hit count, and return the top `max_results`
    /// sorted by `score_meta` desc, `priority` desc, `section_id` asc.
    pub fn search(&self, query: &str, sections: &[Section]) -> Vec<MetadataCandidate> {
        let q: HashSet<String> = tokenize(query).into_iter().collect();
        if q.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<MetadataCandidate> = sections
            .par_iter()
            .filter_map(|s| score_section(&q, s))
            .filter(|c| c.weighted_hits >= 1)
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.priority.cmp(&a.priority))
                .then(a.section_id.cmp(&b.section_id))
        });
        candidates.truncate(self.max_results);
        candidates
    }

    /// §4.5: "a hit is declared iff at least one candidate has weighted hit
    /// count ≥ 2, OR at least one candidate has a keyword hit."
    pub fn is_hit(candidates: &[MetadataCandidate]) -> bool {
        candidates
            .iter()
            .any(|c| c.weighted_hits >= 2 || c.keyword_hits >= 1)
    }
}

fn score_section(q: &HashSet<String>, s: &Section) -> Option<MetadataCandidate> {
    let keyword_set: HashSet<&String> = s.keywords.iter().collect();
    let tag_set: HashSet<&String> = s.tags.iter().collect();
    let use_case_tokens: HashSet<String> = s
        .use_cases
        .iter()
        .flat_map(|phrase| tokenize(phrase))
        .collect();

    let keyword_hits = q.iter().filter(|t| keyword_set.contains(t)).count() as u32;
    let use_case_hits = q.iter().filter(|t| use_case_tokens.contains(*t)).count() as u32;
    let tag_hits = q.iter().filter(|t| tag_set.contains(t)).count() as u32;

    let weighted_hits = keyword_hits + use_case_hits + tag_hits;
    if weighted_hits == 0 {
        return None;
    }

    let score = 3.0 * keyword_hits as f32
        + 2.0 * use_case_hits as f32
        + 1.0 * tag_hits as f32
        + 0.1 * s.priority as f32;

    Some(MetadataCandidate {
        section_id: s.section_id,
        score,
        priority: s.priority,
        weighted_hits,
        keyword_hits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: i64, keywords: &[&str], use_cases: &[&str], tags: &[&str], priority: i32) -> Section {
        Section {
            section_id: id,
            doc_name: "doc".to_string(),
            title: format!("section-{id}"),
            path: format!("/s{id}"),
            url: String::new(),
            content: String::new(),
            priority,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            use_cases: use_cases.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn keyword_hit_outranks_tag_only_hit() {
        let sections = vec![
            section(1, &["streaming"], &[], &[], 5),
            section(2, &[], &[], &["streaming"], 5),
        ];
        let searcher = MetadataSearcher::new(5);
        let results = searcher.search("streaming", &sections);
        assert_eq!(results[0].section_id, 1);
        assert!(MetadataSearcher::is_hit(&results));
    }

    #[test]
    fn tag_only_single_hit_is_candidate_but_not_a_layer_hit() {
        let sections = vec![section(1, &[], &[], &["streaming"], 5)];
        let searcher = MetadataSearcher::new(5);
        let results = searcher.search("streaming", &sections);
        assert_eq!(results.len(), 1, "still a candidate");
        assert!(!MetadataSearcher::is_hit(&results), "but not enough to short-circuit");
    }

    #[test]
    fn no_query_tokens_yields_no_candidates() {
        let sections = vec![section(1, &["auth"], &[], &[], 5)];
        let searcher = MetadataSearcher::new(5);
        assert!(searcher.search("???", &sections).is_empty());
    }

    #[test]
    fn ties_break_on_priority_then_section_id() {
        let sections = vec![
            section(2, &["auth"], &[], &[], 3),
            section(1, &["auth"], &[], &[], 3),
            section(3, &["auth"], &[], &[], 9),
        ];
        let searcher = MetadataSearcher::new(5);
        let results = searcher.search("auth", &sections);
        assert_eq!(results.iter().map(|c| c.section_id).collect::<Vec<_>>(), vec![3, 1, 2]);
    }

    #[test]
    fn results_are_capped_at_max_results() {
        let sections: Vec<Section> = (0..10).map(|i| section(i, &["auth"], &[], &[], 5)).collect();
        let searcher = MetadataSearcher::new(3);
        assert_eq!(searcher.search("auth", &sections).len(), 3);
    }

    #[test]
    fn use_case_phrase_tokenizes_for_matching() {
        let sections = vec![section(1, &[], &["authenticate requests"], &[], 5)];
        let searcher = MetadataSearcher::new(5);
        let results = searcher.search("requests", &sections);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].keyword_hits, 0);
    }
}
