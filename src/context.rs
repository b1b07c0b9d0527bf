//! Turns fused retrieval results into the final context string: relevance
//! threshold, token-budget packing, and per-chunk labeling.

use tracing::info;

use crate::config::RetrievalConfig;
use crate::models::RetrievalResult;

/// Crude token estimate for a chunk of text: whitespace word count scaled
/// by the configured multiplier.
pub fn estimate_tokens(text: &str, tokens_per_word: f32) -> usize {
    (text.split_whitespace().count() as f32 * tokens_per_word) as usize
}

/// Label a chunk with its provenance for the synthesis model.
pub fn format_chunk(result: &RetrievalResult) -> String {
    format!(
        "[Turn {} | Stage {} | Model: {}]\n{}",
        result.metadata.turn_index, result.metadata.stage, result.metadata.model, result.text
    )
}

/// Assemble the context string from fused-ranked results.
///
/// Results below the relevance threshold are dropped; the rest are walked in
/// fused order and appended until the next chunk would exceed the token
/// budget. The walk stops there: a later chunk that would have fit is
/// omitted rather than reordered, so the output always preserves descending
/// fused-score order. Chunks are never truncated mid-text.
pub fn assemble(results: &[RetrievalResult], config: &RetrievalConfig) -> String {
    let passing: Vec<&RetrievalResult> = results
        .iter()
        .filter(|r| r.score >= config.relevance_threshold)
        .collect();

    info!(
        candidates = results.len(),
        passing = passing.len(),
        "context assembly threshold applied"
    );

    let mut parts: Vec<String> = Vec::new();
    let mut used_tokens = 0usize;

    for result in passing {
        let est = estimate_tokens(&result.text, config.tokens_per_word);
        if used_tokens + est > config.token_budget {
            break;
        }
        used_tokens += est;
        parts.push(format_chunk(result));
    }

    info!(
        tokens = used_tokens,
        pieces = parts.len(),
        "context assembled"
    );

    parts.join("\n\n")
}
