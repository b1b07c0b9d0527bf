use anyhow::Result;

use crate::models::DocMetadata;

/// A batch of documents in the store's wire shape: parallel vectors of ids,
/// body texts, and metadata records.
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<DocMetadata>,
}

impl DocumentBatch {
    pub fn push(&mut self, id: String, document: String, metadata: DocMetadata) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One nearest-neighbor hit from the store's vector search.
#[derive(Debug, Clone)]
pub struct DenseHit {
    pub id: String,
    /// Cosine distance: 0 = identical, larger = more distant.
    pub distance: f32,
}

/// The external document/vector store the engine is built against.
///
/// The store owns persisted text, vectors, and metadata; embedding and
/// nearest-neighbor search happen on its side of the boundary. The engine
/// only consumes this contract. Calls may block on network or disk, hence
/// async; implementations are expected to be cheap to share (`&self`
/// methods, interior synchronization as needed).
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Write a batch of documents, idempotent by id: re-upserting an id
    /// replaces the whole document (text, vector, metadata), never merges.
    async fn upsert(&self, batch: DocumentBatch) -> Result<()>;

    /// Full-collection scan across all conversations. Used only by the
    /// lexical index rebuild.
    async fn get_all(&self) -> Result<DocumentBatch>;

    /// Batched resolve of text and metadata for a known id set. Ids the
    /// store no longer holds are simply absent from the response.
    async fn get_by_ids(&self, ids: &[String]) -> Result<DocumentBatch>;

    /// Nearest-neighbor search by cosine distance, nearest first, already
    /// filtered server-side to the given conversation.
    async fn query(
        &self,
        text: &str,
        limit: usize,
        conversation_id: &str,
    ) -> Result<Vec<DenseHit>>;
}
