use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel `avg_rank` for a document whose model was never ranked by the
/// judges. Lower ranks are better, so the sentinel sorts last.
pub const UNRANKED_AVG_RANK: f64 = 999.0;

/// Which council stage produced a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// One model's individual answer to the user question.
    Opinion,
    /// The chairman's final synthesized answer.
    Synthesis,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Opinion => write!(f, "opinion"),
            Stage::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// Metadata stored alongside each indexed document.
///
/// The store persists this as the document's metadata record; the engine
/// reads it back for conversation scoping and context labeling. Quality
/// fields fall back to documented sentinels when the model was never ranked
/// ([`UNRANKED_AVG_RANK`], consensus 0.0).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocMetadata {
    pub conversation_id: String,
    pub turn_index: u32,
    pub stage: Stage,
    /// Model identifier, e.g. `openai/gpt-5.1` or the chairman model.
    pub model: String,
    /// Topics extracted for the turn, in extraction order.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Mean 1-based rank across judges; [`UNRANKED_AVG_RANK`] if unranked.
    #[serde(default = "default_avg_rank")]
    pub avg_rank: f64,
    /// First-place win rate across judges, in [0.0, 1.0]; 0.0 if unranked.
    #[serde(default)]
    pub consensus_score: f64,
    pub timestamp: DateTime<Utc>,
}

fn default_avg_rank() -> f64 {
    UNRANKED_AVG_RANK
}

/// One council member's answer, as fed to the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOpinion {
    pub model: String,
    pub response: String,
}

/// The chairman's final synthesis, as fed to the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisDraft {
    pub model: String,
    pub response: String,
}

/// Per-model ranking quality, attached to indexed documents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
    pub avg_rank: f64,
    pub consensus_score: f64,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            avg_rank: UNRANKED_AVG_RANK,
            consensus_score: 0.0,
        }
    }
}

/// One fused retrieval hit, produced transiently per call.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub id: String,
    /// Fused RRF score (higher = more relevant).
    pub score: f32,
    pub metadata: DocMetadata,
    pub text: String,
}

/// Document id for a model opinion.
///
/// The id encodes (conversation, turn, stage, ordinal, model) and is stable:
/// re-indexing the same turn produces the same ids, so upserts overwrite
/// rather than duplicate.
pub fn opinion_doc_id(conversation_id: &str, turn_index: u32, ordinal: usize, model: &str) -> String {
    format!("{conversation_id}:turn:{turn_index}:opinion:{ordinal}:{model}")
}

/// Document id for the turn's final synthesis.
pub fn synthesis_doc_id(conversation_id: &str, turn_index: u32, model: &str) -> String {
    format!("{conversation_id}:turn:{turn_index}:synthesis:{model}")
}

/// Indexed body text: the user question prepended to the stage's answer.
pub fn format_body(user_question: &str, answer: &str) -> String {
    format!("Q: {user_question}\n\nA: {answer}")
}
