use serde::{Deserialize, Serialize};

/// Tunables for the hybrid retrieval engine.
///
/// Every constant that shapes ranking or assembly lives here so deployments
/// can adjust recall/precision without touching engine logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// RRF damping constant. 60.0 is the standard choice: large enough that
    /// rank-1 vs rank-2 differences are smoothed rather than dominating.
    pub rrf_k: f32,
    /// Weight of the BM25 (lexical) leg in fusion.
    pub lexical_weight: f32,
    /// Weight of the dense (vector) leg in fusion.
    pub dense_weight: f32,
    /// Number of fused results that survive to context assembly.
    pub top_k: usize,
    /// Each source list is truncated to `candidate_multiplier * top_k`
    /// before fusion, bounding cost while leaving fusion enough candidates.
    pub candidate_multiplier: usize,
    /// Minimum fused score for a result to enter the context. This is on the
    /// RRF scale (scores are small by construction), not a raw similarity.
    pub relevance_threshold: f32,
    /// Cap on the estimated token size of the assembled context.
    pub token_budget: usize,
    /// Crude words-to-tokens estimate multiplier.
    pub tokens_per_word: f32,
    /// BM25 term-frequency saturation parameter.
    pub bm25_k1: f32,
    /// BM25 document-length normalization parameter.
    pub bm25_b: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            lexical_weight: 0.5,
            dense_weight: 0.5,
            top_k: 10,
            candidate_multiplier: 2,
            relevance_threshold: 0.01,
            token_budget: 3000,
            tokens_per_word: 1.3,
            bm25_k1: 1.5,
            bm25_b: 0.75,
        }
    }
}

impl RetrievalConfig {
    /// Build a config from defaults overridden by `COUNCIL_RAG_*` env vars.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COUNCIL_RAG_RRF_K") {
            if let Ok(v) = val.parse() {
                config.rrf_k = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_LEXICAL_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.lexical_weight = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_DENSE_WEIGHT") {
            if let Ok(v) = val.parse() {
                config.dense_weight = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_TOP_K") {
            if let Ok(v) = val.parse() {
                config.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_CANDIDATE_MULTIPLIER") {
            if let Ok(v) = val.parse() {
                config.candidate_multiplier = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_RELEVANCE_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.relevance_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_TOKEN_BUDGET") {
            if let Ok(v) = val.parse() {
                config.token_budget = v;
            }
        }
        if let Ok(val) = std::env::var("COUNCIL_RAG_TOKENS_PER_WORD") {
            if let Ok(v) = val.parse() {
                config.tokens_per_word = v;
            }
        }

        config
    }

    /// Size of each source's candidate pool fed into fusion.
    pub fn candidate_pool(&self) -> usize {
        self.candidate_multiplier * self.top_k
    }
}
