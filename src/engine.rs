use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::RetrievalConfig;
use crate::context;
use crate::models::{
    format_body, opinion_doc_id, synthesis_doc_id, DocMetadata, ModelOpinion, QualityMetrics,
    Stage, SynthesisDraft,
};
use crate::search::hybrid::HybridRetriever;
use crate::search::lexical::{Bm25Snapshot, LexicalIndex};
use crate::store::{DocumentBatch, DocumentStore};

/// Why a retrieval call produced no context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The store collaborator was unavailable at startup; the engine runs
    /// for its lifetime with retrieval off and writes as no-ops.
    Disabled,
    /// The pipeline ran but nothing relevant survived scoping, the
    /// relevance threshold, or the token budget.
    NoMatches,
    /// A store call failed mid-retrieval; downgraded, never propagated.
    Failed,
}

/// Outcome of a retrieval call.
///
/// Retrieval is a best-effort enhancement to answer synthesis, so it never
/// returns an error; it returns either context or an empty outcome whose
/// reason the caller can log. `into_text()` collapses both to the string the
/// synthesis prompt consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextOutcome {
    Context(String),
    Empty(EmptyReason),
}

impl ContextOutcome {
    pub fn into_text(self) -> String {
        match self {
            ContextOutcome::Context(text) => text,
            ContextOutcome::Empty(_) => String::new(),
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            ContextOutcome::Context(text) => text,
            ContextOutcome::Empty(_) => "",
        }
    }
}

/// The conversation-scoped hybrid retrieval engine.
///
/// Owns the derived BM25 snapshot (disposable, rebuildable from the store at
/// any time) and consumes the external document/vector store for everything
/// persistent. Holds no per-conversation state: concurrent retrievals for
/// different conversations are independent, and `refresh_index` swaps the
/// snapshot atomically under in-flight readers.
pub struct CouncilRag<S> {
    store: Option<S>,
    lexical: LexicalIndex,
    config: RetrievalConfig,
}

impl<S: DocumentStore> CouncilRag<S> {
    pub fn new(store: S, config: RetrievalConfig) -> Self {
        Self {
            lexical: LexicalIndex::new(config.bm25_k1, config.bm25_b),
            store: Some(store),
            config,
        }
    }

    /// An engine whose collaborator could not be initialized: retrieval
    /// always returns [`EmptyReason::Disabled`], writes silently no-op, and
    /// the rest of the answer pipeline keeps working.
    pub fn disabled(config: RetrievalConfig) -> Self {
        Self {
            lexical: LexicalIndex::new(config.bm25_k1, config.bm25_b),
            store: None,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// The underlying store, if the engine is enabled.
    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    /// Retrieve prior-turn context for a query, scoped to one conversation.
    ///
    /// Any failure inside the pipeline is caught here and downgraded to an
    /// empty outcome: retrieval failure must never block answer synthesis.
    pub async fn retrieve(&self, query: &str, conversation_id: &str) -> ContextOutcome {
        let store = match &self.store {
            Some(store) => store,
            None => {
                info!("retrieval disabled, returning empty context");
                return ContextOutcome::Empty(EmptyReason::Disabled);
            }
        };

        match self.try_retrieve(store, query, conversation_id).await {
            Ok(text) if text.is_empty() => ContextOutcome::Empty(EmptyReason::NoMatches),
            Ok(text) => ContextOutcome::Context(text),
            Err(e) => {
                warn!(conversation_id, error = %e, "retrieval failed, returning empty context");
                ContextOutcome::Empty(EmptyReason::Failed)
            }
        }
    }

    async fn try_retrieve(
        &self,
        store: &S,
        query: &str,
        conversation_id: &str,
    ) -> Result<String> {
        let snapshot = self.ensure_snapshot(store).await?;

        let retriever = HybridRetriever::new(store, &self.config);
        let results = retriever.retrieve(&snapshot, query, conversation_id).await?;

        Ok(context::assemble(&results, &self.config))
    }

    /// Current snapshot, building one lazily on first retrieval. Two racing
    /// first retrievals may both build; both snapshots are complete and the
    /// last swap wins.
    async fn ensure_snapshot(&self, store: &S) -> Result<Arc<Bm25Snapshot>> {
        if let Some(snapshot) = self.lexical.snapshot() {
            return Ok(snapshot);
        }
        let batch = store
            .get_all()
            .await
            .context("full-collection scan for BM25 rebuild")?;
        Ok(self.lexical.install(&batch))
    }

    /// Index one completed council turn: one document per model opinion and
    /// one for the final synthesis (skipped when its text is empty), all
    /// upserted as a single batch.
    ///
    /// Ids are stable functions of (conversation, turn, stage, ordinal,
    /// model), so re-indexing a turn overwrites instead of duplicating. This
    /// never rebuilds the lexical index; call [`refresh_index`] once after a
    /// batch of writes.
    ///
    /// [`refresh_index`]: CouncilRag::refresh_index
    #[allow(clippy::too_many_arguments)]
    pub async fn index_turn(
        &self,
        conversation_id: &str,
        turn_index: u32,
        user_question: &str,
        opinions: &[ModelOpinion],
        synthesis: &SynthesisDraft,
        topics: &[String],
        quality_metrics: &HashMap<String, QualityMetrics>,
    ) -> Result<()> {
        let store = match &self.store {
            Some(store) => store,
            None => return Ok(()),
        };

        let timestamp = Utc::now();
        let mut batch = DocumentBatch::default();

        for (ordinal, opinion) in opinions.iter().enumerate() {
            let quality = quality_metrics
                .get(&opinion.model)
                .copied()
                .unwrap_or_default();
            batch.push(
                opinion_doc_id(conversation_id, turn_index, ordinal, &opinion.model),
                format_body(user_question, &opinion.response),
                DocMetadata {
                    conversation_id: conversation_id.to_string(),
                    turn_index,
                    stage: Stage::Opinion,
                    model: opinion.model.clone(),
                    topics: topics.to_vec(),
                    avg_rank: quality.avg_rank,
                    consensus_score: quality.consensus_score,
                    timestamp,
                },
            );
        }

        if !synthesis.response.is_empty() {
            let quality = quality_metrics
                .get(&synthesis.model)
                .copied()
                .unwrap_or_default();
            batch.push(
                synthesis_doc_id(conversation_id, turn_index, &synthesis.model),
                format_body(user_question, &synthesis.response),
                DocMetadata {
                    conversation_id: conversation_id.to_string(),
                    turn_index,
                    stage: Stage::Synthesis,
                    model: synthesis.model.clone(),
                    topics: topics.to_vec(),
                    avg_rank: quality.avg_rank,
                    consensus_score: quality.consensus_score,
                    timestamp,
                },
            );
        }

        if batch.is_empty() {
            return Ok(());
        }

        info!(
            conversation_id,
            turn_index,
            docs = batch.len(),
            "indexing council turn"
        );
        store
            .upsert(batch)
            .await
            .context("upserting council turn documents")
    }

    /// Explicitly rebuild the BM25 snapshot from a fresh full-collection
    /// scan. Call once per completed turn, after [`index_turn`]. Safe while
    /// retrievals are in flight: readers see the old or new snapshot, never
    /// a partial one. Fetch failures surface to the caller.
    ///
    /// [`index_turn`]: CouncilRag::index_turn
    pub async fn refresh_index(&self) -> Result<()> {
        let store = match &self.store {
            Some(store) => store,
            None => return Ok(()),
        };

        let batch = store
            .get_all()
            .await
            .context("full-collection scan for BM25 rebuild")?;
        self.lexical.install(&batch);
        Ok(())
    }
}
