use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::store::DocumentBatch;

/// Lowercase + whitespace tokenization, shared by indexing and querying.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

struct DocEntry {
    id: String,
    conversation_id: String,
    term_freqs: HashMap<String, u32>,
    token_count: u32,
}

/// An immutable BM25 index over the full document collection.
///
/// Built in one pass from a whole-collection scan and never mutated; updates
/// happen by building a replacement snapshot and swapping it in via
/// [`LexicalIndex`]. Holds exactly the statistics BM25 scoring needs: per-doc
/// term frequencies, per-term document frequencies (folded into precomputed
/// IDF), average document length, and document count.
pub struct Bm25Snapshot {
    docs: Vec<DocEntry>,
    index_of: HashMap<String, usize>,
    idf: HashMap<String, f32>,
    avg_doc_len: f32,
    k1: f32,
    b: f32,
}

impl Bm25Snapshot {
    /// Build a snapshot from a full-collection batch. An empty batch yields
    /// an explicit empty snapshot whose `score` returns nothing.
    pub fn build(batch: &DocumentBatch, k1: f32, b: f32) -> Self {
        let mut docs = Vec::with_capacity(batch.len());
        let mut index_of = HashMap::with_capacity(batch.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_tokens: u64 = 0;

        for i in 0..batch.len() {
            let tokens = tokenize(&batch.documents[i]);
            total_tokens += tokens.len() as u64;

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens.iter() {
                *term_freqs.entry(token.clone()).or_default() += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }

            index_of.insert(batch.ids[i].clone(), i);
            docs.push(DocEntry {
                id: batch.ids[i].clone(),
                conversation_id: batch.metadatas[i].conversation_id.clone(),
                token_count: term_freqs.values().sum(),
                term_freqs,
            });
        }

        let doc_count = docs.len();
        let avg_doc_len = if doc_count == 0 {
            0.0
        } else {
            total_tokens as f32 / doc_count as f32
        };

        Self {
            docs,
            index_of,
            idf: compute_idf(&doc_freqs, doc_count),
            avg_doc_len,
            k1,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Conversation owning an indexed document, for post-scoring tenant
    /// filtering.
    pub fn conversation_of(&self, id: &str) -> Option<&str> {
        self.index_of
            .get(id)
            .map(|&i| self.docs[i].conversation_id.as_str())
    }

    /// Raw BM25 score of every document in the collection against the query
    /// tokens. No tenant filter here: filtering happens after scoring, so
    /// term statistics stay global. Scores can legitimately be zero or
    /// negative for non-matching documents; the caller discards those before
    /// ranking.
    pub fn score(&self, query_tokens: &[String]) -> HashMap<String, f32> {
        let mut scores = HashMap::with_capacity(self.docs.len());
        if self.docs.is_empty() {
            return scores;
        }

        for doc in &self.docs {
            let mut score = 0.0f32;
            let dl = doc.token_count as f32;
            let norm = self.k1 * (1.0 - self.b + self.b * dl / self.avg_doc_len);

            for token in query_tokens {
                let tf = match doc.term_freqs.get(token) {
                    Some(&tf) => tf as f32,
                    None => continue,
                };
                let idf = self.idf.get(token).copied().unwrap_or(0.0);
                score += idf * (tf * (self.k1 + 1.0)) / (tf + norm);
            }

            scores.insert(doc.id.clone(), score);
        }

        scores
    }
}

/// Non-negative IDF: `ln(1 + (N - df + 0.5) / (df + 0.5))`.
///
/// Strictly positive even for a term present in every document, so a match
/// always contributes upward. Small conversation collections (a handful of
/// near-duplicate turns) would otherwise zero out entirely under the raw
/// Okapi formula, and the relevance threshold already rejects weak fusion
/// candidates downstream.
fn compute_idf(doc_freqs: &HashMap<String, u32>, doc_count: usize) -> HashMap<String, f32> {
    let n = doc_count as f32;
    doc_freqs
        .iter()
        .map(|(term, &df)| {
            let df = df as f32;
            let value = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            (term.clone(), value)
        })
        .collect()
}

/// Handle to the current BM25 snapshot.
///
/// Readers clone the `Arc` and score against a consistent snapshot even
/// while a rebuild is in progress; `install` builds the replacement off to
/// the side and swaps it in under a short write lock, so readers only ever
/// see the old or the new snapshot, never a partial one.
pub struct LexicalIndex {
    snapshot: RwLock<Option<Arc<Bm25Snapshot>>>,
    k1: f32,
    b: f32,
}

impl LexicalIndex {
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            snapshot: RwLock::new(None),
            k1,
            b,
        }
    }

    /// The current snapshot, or `None` if no rebuild has happened yet.
    pub fn snapshot(&self) -> Option<Arc<Bm25Snapshot>> {
        self.snapshot.read().clone()
    }

    /// Replace the snapshot with one built from a fresh full-collection
    /// scan. An empty collection installs an explicit empty snapshot.
    pub fn install(&self, batch: &DocumentBatch) -> Arc<Bm25Snapshot> {
        let built = Arc::new(Bm25Snapshot::build(batch, self.k1, self.b));
        info!(docs = built.len(), "BM25 index rebuilt");
        *self.snapshot.write() = Some(built.clone());
        built
    }
}
