use sieve_core::types::{Document, SearchResult};
use sieve_core::vector::clamp_unit;

/// Non-negative weights summing to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub keyword: f32,
}

impl FusionWeights {
    /// Negative or non-finite inputs count as 0; both 0 means an equal split.
    pub fn normalized(vector_weight: f32, keyword_weight: f32) -> Self {
        let clean = |w: f32| if w.is_finite() { w.max(0.0) } else { 0.0 };
        let (v, k) = (clean(vector_weight), clean(keyword_weight));
        let total = v + k;
        if total <= f32::EPSILON { return Self { vector: 0.5, keyword: 0.5 }; }
        Self { vector: v / total, keyword: k / total }
    }

    pub fn combine(&self, vector_score: f32, keyword_score: f32) -> f32 {
        clamp_unit(clamp_unit(vector_score) * self.vector + clamp_unit(keyword_score) * self.keyword)
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub document: Document,
    pub vector_score: f32,
    pub keyword_score: f32,
}

/// Weighted fusion: drop below `threshold`, stable sort by combined score
/// (fetch order breaks ties), keep `top_k`.
pub fn fuse(candidates: Vec<Candidate>, weights: FusionWeights, threshold: f32, top_k: usize) -> Vec<SearchResult> {
    let mut scored: Vec<(Document, f32)> = candidates
        .into_iter()
        .map(|c| {
            let combined = weights.combine(c.vector_score, c.keyword_score);
            (c.document, combined)
        })
        .filter(|(_, combined)| *combined >= threshold)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored.into_iter().map(|(doc, score)| SearchResult::from_document(doc, score)).collect()
}
