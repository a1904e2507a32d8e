//! Weighted reciprocal-rank fusion.
//!
//! Merges the vector and keyword result lists using ranks only. Native
//! scores are ignored because cosine similarity and lexical scores are not
//! comparable.
//!
//! # Algorithm
//!
//! 1. A hit at 1-based rank `r` from a list with weight `w` contributes `w / r`.
//! 2. Hits are merged by chunk id, or by `(text, metadata)` when a hit has no id.
//!    A merged item's score is the sum of its contributions.
//! 3. Items are ordered by fused score descending. Scores are compared
//!    after rounding to 1e-9, so `0.6 / 3` and `0.4 / 2` tie.
//! 4. Ties go to the better vector rank (items without one last), then to
//!    discovery order: the vector list first, then the keyword list.
//! 5. The list is truncated to `k`.
//!
//! An empty list contributes nothing, so fusion degrades to the other list
//! scaled by its weight.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{FusedResult, Origin, RetrievalHit};

pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.6;
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.4;

/// Scores closer than `1 / SCORE_SCALE` compare equal.
const SCORE_SCALE: f64 = 1e9;

/// Per-source fusion weights. Not renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f64,
    pub keyword: f64,
}

impl FusionWeights {
    pub fn new(vector: f64, keyword: f64) -> Result<Self> {
        let weights = Self { vector, keyword };
        weights.validate()?;
        Ok(weights)
    }

    /// Both weights finite and non-negative, with a positive sum.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("vector", self.vector), ("keyword", self.keyword)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidWeights(format!(
                    "{} weight must be a finite non-negative number, got {}",
                    name, w
                )));
            }
        }
        if self.vector + self.keyword <= 0.0 {
            return Err(Error::InvalidWeights("weights must not both be zero".into()));
        }
        Ok(())
    }

    fn for_origin(&self, origin: Origin) -> f64 {
        match origin {
            Origin::Vector => self.vector,
            Origin::Keyword => self.keyword,
        }
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: DEFAULT_VECTOR_WEIGHT,
            keyword: DEFAULT_KEYWORD_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MergeKey {
    Id(String),
    Content { text: String, metadata: String },
}

impl MergeKey {
    fn of(hit: &RetrievalHit) -> Self {
        match &hit.id {
            Some(id) => MergeKey::Id(id.clone()),
            // Map serializes with sorted keys, so equal metadata gives equal strings.
            None => MergeKey::Content {
                text: hit.text.clone(),
                metadata: serde_json::Value::Object(hit.metadata.clone()).to_string(),
            },
        }
    }
}

fn quantize(score: f64) -> i64 {
    (score * SCORE_SCALE).round() as i64
}

/// Fuse two ranked lists into at most `k` results.
///
/// A key seen twice in the same list counts once, at its first (best) rank.
pub fn fuse(
    vector_hits: &[RetrievalHit],
    keyword_hits: &[RetrievalHit],
    weights: FusionWeights,
    k: usize,
) -> Vec<FusedResult> {
    let mut results: Vec<FusedResult> = Vec::new();
    let mut slots: HashMap<MergeKey, usize> = HashMap::new();

    for (hits, origin) in [(vector_hits, Origin::Vector), (keyword_hits, Origin::Keyword)] {
        let weight = weights.for_origin(origin);
        for hit in hits {
            let slot = *slots.entry(MergeKey::of(hit)).or_insert_with(|| {
                results.push(FusedResult {
                    id: hit.id.clone(),
                    text: hit.text.clone(),
                    metadata: hit.metadata.clone(),
                    fused_score: 0.0,
                    vector_rank: None,
                    keyword_rank: None,
                });
                results.len() - 1
            });

            let result = &mut results[slot];
            let rank_field = match origin {
                Origin::Vector => &mut result.vector_rank,
                Origin::Keyword => &mut result.keyword_rank,
            };
            if rank_field.is_some() {
                continue;
            }
            let rank = hit.rank.max(1);
            *rank_field = Some(rank);
            result.fused_score += weight / rank as f64;
        }
    }

    // Stable sort: equal keys keep discovery order.
    results.sort_by(|a, b| {
        quantize(b.fused_score)
            .cmp(&quantize(a.fused_score))
            .then_with(|| {
                a.vector_rank
                    .unwrap_or(usize::MAX)
                    .cmp(&b.vector_rank.unwrap_or(usize::MAX))
            })
    });
    results.truncate(k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn hit(id: &str, rank: usize, origin: Origin) -> RetrievalHit {
        RetrievalHit {
            id: Some(id.into()),
            text: format!("text {}", id),
            metadata: Metadata::new(),
            score: 0.0,
            rank,
            origin,
        }
    }

    fn ranked(ids: &[&str], origin: Origin) -> Vec<RetrievalHit> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| hit(id, i + 1, origin))
            .collect()
    }

    fn ids(results: &[FusedResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_deref().unwrap()).collect()
    }

    #[test]
    fn test_weighted_rrf_example() {
        let vector = ranked(&["A", "B", "C"], Origin::Vector);
        let keyword = ranked(&["B", "D"], Origin::Keyword);

        let fused = fuse(&vector, &keyword, FusionWeights::default(), 10);
        assert_eq!(ids(&fused), vec!["B", "A", "C", "D"]);

        let scores: Vec<f64> = fused.iter().map(|r| r.fused_score).collect();
        for (got, want) in scores.iter().zip([0.7, 0.6, 0.2, 0.2]) {
            assert!((got - want).abs() < 1e-9, "got {} want {}", got, want);
        }
        assert_eq!(fused[0].vector_rank, Some(2));
        assert_eq!(fused[0].keyword_rank, Some(1));
        assert_eq!(fused[3].vector_rank, None);
    }

    #[test]
    fn test_deterministic() {
        let vector = ranked(&["A", "B", "C"], Origin::Vector);
        let keyword = ranked(&["B", "D"], Origin::Keyword);
        let first = fuse(&vector, &keyword, FusionWeights::default(), 10);
        for _ in 0..20 {
            assert_eq!(fuse(&vector, &keyword, FusionWeights::default(), 10), first);
        }
    }

    #[test]
    fn test_empty_keyword_list_keeps_vector_order() {
        let vector = ranked(&["A", "B", "C"], Origin::Vector);
        let fused = fuse(&vector, &[], FusionWeights::default(), 10);
        assert_eq!(ids(&fused), vec!["A", "B", "C"]);
        assert!((fused[0].fused_score - 0.6).abs() < 1e-12);
        assert!((fused[1].fused_score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_vector_list_keeps_keyword_order() {
        let keyword = ranked(&["X", "Y"], Origin::Keyword);
        let fused = fuse(&[], &keyword, FusionWeights::default(), 10);
        assert_eq!(ids(&fused), vec!["X", "Y"]);
        assert!(fused.iter().all(|r| r.vector_rank.is_none()));
    }

    #[test]
    fn test_both_empty() {
        assert!(fuse(&[], &[], FusionWeights::default(), 5).is_empty());
    }

    #[test]
    fn test_truncates_to_k() {
        let vector = ranked(&["A", "B", "C", "D"], Origin::Vector);
        let fused = fuse(&vector, &[], FusionWeights::default(), 2);
        assert_eq!(ids(&fused), vec!["A", "B"]);
    }

    #[test]
    fn test_merges_by_content_without_ids() {
        let mut v = hit("", 1, Origin::Vector);
        v.id = None;
        v.text = "same text".into();
        let mut k = v.clone();
        k.origin = Origin::Keyword;
        let mut other = k.clone();
        other.text = "other text".into();
        other.rank = 2;

        let fused = fuse(&[v], &[k, other], FusionWeights::default(), 10);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].text, "same text");
        assert!((fused[0].fused_score - 1.0).abs() < 1e-12);
        assert_eq!(fused[0].keyword_rank, Some(1));
    }

    #[test]
    fn test_duplicate_in_one_list_counts_once() {
        let vector = vec![hit("A", 1, Origin::Vector), hit("A", 2, Origin::Vector)];
        let fused = fuse(&vector, &[], FusionWeights::default(), 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].fused_score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_weights_not_renormalized() {
        let weights = FusionWeights::new(2.0, 2.0).unwrap();
        let fused = fuse(&ranked(&["A"], Origin::Vector), &ranked(&["A"], Origin::Keyword), weights, 1);
        assert!((fused[0].fused_score - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_weight_validation() {
        assert!(FusionWeights::new(0.6, 0.4).is_ok());
        assert!(FusionWeights::new(0.0, 1.0).is_ok());
        assert!(matches!(FusionWeights::new(-0.1, 0.4), Err(Error::InvalidWeights(_))));
        assert!(FusionWeights::new(f64::NAN, 0.4).is_err());
        assert!(FusionWeights::new(f64::INFINITY, 0.4).is_err());
        assert!(FusionWeights::new(0.0, 0.0).is_err());
    }
}
