use anyhow::Result;
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::models::RetrievalResult;
use crate::search::fusion::reciprocal_rank_fusion;
use crate::search::lexical::{tokenize, Bm25Snapshot};
use crate::store::DocumentStore;

/// Produces fused, conversation-scoped candidates from the lexical snapshot
/// and the store's dense retrieval, then resolves them to full results.
pub struct HybridRetriever<'a, S> {
    store: &'a S,
    config: &'a RetrievalConfig,
}

impl<'a, S: DocumentStore> HybridRetriever<'a, S> {
    pub fn new(store: &'a S, config: &'a RetrievalConfig) -> Self {
        Self { store, config }
    }

    /// Hybrid retrieval via reciprocal rank fusion.
    ///
    /// The lexical leg scores the whole collection, truncates to the global
    /// top `2 × top_k`, then drops non-positive scores and any candidate
    /// belonging to another conversation (surviving candidates keep their
    /// global rank positions). The dense leg is tenant-filtered by the store
    /// itself. Both legs therefore agree on the same scoping: no document
    /// may cross a conversation boundary into fused output.
    pub async fn retrieve(
        &self,
        snapshot: &Bm25Snapshot,
        query: &str,
        conversation_id: &str,
    ) -> Result<Vec<RetrievalResult>> {
        if snapshot.is_empty() {
            info!("hybrid retrieval skipped, empty index");
            return Ok(Vec::new());
        }

        let pool = self.config.candidate_pool();
        let query_tokens = tokenize(query);

        // ── Lexical leg: global BM25, then conversation filter ──
        let scores = snapshot.score(&query_tokens);
        let mut global: Vec<(String, f32)> = scores.into_iter().collect();
        global.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        global.truncate(pool);

        let mut lexical_ranked: Vec<(String, usize)> = Vec::new();
        for (i, (id, score)) in global.iter().enumerate() {
            // BM25 can return 0 or negative for non-matching docs; those are
            // not relevant and must not enter the candidate set.
            if *score <= 0.0 {
                continue;
            }
            if snapshot.conversation_of(id) != Some(conversation_id) {
                continue;
            }
            lexical_ranked.push((id.clone(), i + 1));
        }

        // ── Dense leg: already tenant-scoped by the store ──
        let dense_hits = self.store.query(query, pool, conversation_id).await?;
        let mut dense_ranked: Vec<(String, usize)> = Vec::with_capacity(dense_hits.len());
        for (i, hit) in dense_hits.iter().enumerate() {
            // Cosine distance, smaller is closer. The similarity is carried
            // for inspection only; fusion consumes rank positions.
            let similarity = 1.0 - hit.distance;
            debug!(id = %hit.id, similarity, rank = i + 1, "dense candidate");
            dense_ranked.push((hit.id.clone(), i + 1));
        }

        // ── Fusion ──
        let mut fused = reciprocal_rank_fusion(
            &lexical_ranked,
            &dense_ranked,
            self.config.lexical_weight,
            self.config.dense_weight,
            self.config.rrf_k,
        );
        let candidates = fused.len();
        fused.truncate(self.config.top_k);

        if fused.is_empty() {
            info!("hybrid retrieval found no candidates");
            return Ok(Vec::new());
        }

        // ── Batched resolve, preserving fused order ──
        let ids: Vec<String> = fused.iter().map(|(id, _)| id.clone()).collect();
        let resolved = self.store.get_by_ids(&ids).await?;

        let mut by_id = std::collections::HashMap::with_capacity(resolved.len());
        for i in 0..resolved.len() {
            by_id.insert(
                resolved.ids[i].clone(),
                (resolved.metadatas[i].clone(), resolved.documents[i].clone()),
            );
        }

        let mut results = Vec::with_capacity(fused.len());
        for (id, score) in fused {
            // Ids the store no longer holds are dropped; the store is the
            // source of truth for document content.
            if let Some((metadata, text)) = by_id.remove(&id) {
                results.push(RetrievalResult {
                    id,
                    score,
                    metadata,
                    text,
                });
            }
        }

        info!(
            conversation_id,
            candidates,
            returned = results.len(),
            "hybrid retrieval complete"
        );

        Ok(results)
    }
}
