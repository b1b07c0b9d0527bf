//! Reciprocal Rank Fusion: `fused(id) = w_lex/(K + rank_lex) + w_dense/(K + rank_dense)`.
//!
//! Fusion operates on rank positions only, never raw scores: BM25 scores and
//! cosine similarities live on incomparable scales, and RRF needs nothing
//! but each source's relative ordering.

use std::collections::HashMap;

/// Fuse two ranked lists of (id, 1-based rank) into a single ranking.
///
/// An id absent from one list simply gets no contribution from it. Output is
/// sorted descending by fused score with ties broken by id string, so the
/// ordering is deterministic across runs.
pub fn reciprocal_rank_fusion(
    lexical: &[(String, usize)],
    dense: &[(String, usize)],
    lexical_weight: f32,
    dense_weight: f32,
    k: f32,
) -> Vec<(String, f32)> {
    let mut combined: HashMap<String, f32> = HashMap::new();

    for (id, rank) in lexical {
        *combined.entry(id.clone()).or_default() += lexical_weight / (k + *rank as f32);
    }
    for (id, rank) in dense {
        *combined.entry(id.clone()).or_default() += dense_weight / (k + *rank as f32);
    }

    let mut fused: Vec<(String, f32)> = combined.into_iter().collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    fused
}
