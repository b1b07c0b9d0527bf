//! # council-rag
//!
//! A hybrid retrieval engine for a multi-model "council" assistant: given a
//! free-text query and a conversation id, it returns a ranked, token-budgeted
//! block of prior-turn context assembled from the council's past opinions and
//! syntheses.
//!
//! ## Architecture
//!
//! The retrieval pipeline:
//!
//! ```text
//!                        ┌─────────────┐
//!                        │  User Query  │
//!                        └──────┬───────┘
//!                               │
//!                  ┌────────────┴────────────┐
//!                  ▼                         ▼
//!         ┌────────────────┐      ┌──────────────────┐
//!         │  BM25 (global  │      │  Dense retrieval  │
//!         │  snapshot) +   │      │  via store, pre-  │
//!         │  tenant filter │      │  filtered to conv │
//!         └───────┬────────┘      └────────┬─────────┘
//!                 │ ranked list            │ ranked list
//!                 └────────────┬───────────┘
//!                              ▼
//!                 ┌────────────────────────┐
//!                 │  RRF Fusion (K = 60)   │
//!                 │  w/(K + rank) per leg  │
//!                 │  keep top_k            │
//!                 └───────────┬────────────┘
//!                             │
//!                             ▼
//!                 ┌────────────────────────┐
//!                 │  Batch resolve text +  │
//!                 │  metadata by id        │
//!                 └───────────┬────────────┘
//!                             │
//!                             ▼
//!                 ┌────────────────────────┐
//!                 │  Threshold + token     │
//!                 │  budget + formatting   │
//!                 └───────────┬────────────┘
//!                             │
//!                             ▼
//!                       context string
//! ```
//!
//! The write path indexes one document per model opinion plus one for the
//! final synthesis after each completed council turn; the caller refreshes
//! the BM25 snapshot once per batch of writes.
//!
//! ## Module Overview
//!
//! - [`config`] - Engine tunables (RRF constant, weights, budgets) with env overrides
//! - [`models`] - Shared data types: `DocMetadata`, `Stage`, `RetrievalResult`, id construction
//! - [`store`] - `DocumentStore`: the external document/vector store collaborator
//! - [`search::lexical`] - In-memory BM25 index, rebuilt wholesale from the store
//! - [`search::fusion`] - Reciprocal Rank Fusion with deterministic tie-breaking
//! - [`search::hybrid`] - Lexical + dense candidate production with conversation scoping
//! - [`context`] - Relevance threshold, token-budget packing, chunk formatting
//! - [`metrics`] - Per-model quality metrics aggregated from judge rankings
//! - [`engine`] - `CouncilRag`: the public retrieve / index_turn / refresh_index API

pub mod config;
pub mod context;
pub mod engine;
pub mod metrics;
pub mod models;
pub mod search;
pub mod store;

pub use config::RetrievalConfig;
pub use engine::{ContextOutcome, CouncilRag, EmptyReason};
pub use models::{
    DocMetadata, ModelOpinion, QualityMetrics, RetrievalResult, Stage, SynthesisDraft,
};
pub use store::{DenseHit, DocumentBatch, DocumentStore};
