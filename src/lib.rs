//! Hybrid retrieval and feedback-adaptive ranking engine.
//!
//! Combines a BM25 lexical index and a brute-force cosine-similarity vector
//! index over one shared corpus, fuses the two rankings with configurable
//! weights, and re-weights results from accumulated user feedback. Document
//! chunking and embedding generation are consumed through the [`chunker`]
//! and [`embedding`] collaborator interfaces; this crate never hosts a
//! model or a network surface.

pub mod chunker;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod fts;
pub mod indexer;
pub mod search;
pub mod store;

pub use chunker::{TextChunk, TextChunker};
pub use embedding::Embedder;
pub use error::EngineError;
pub use feedback::{FeedbackConfig, FeedbackScorer, FeedbackStats};
pub use fts::{Bm25Params, Bm25Search};
pub use indexer::{DocumentIndexer, IndexMetadata, IndexerConfig, SourceDocument};
pub use search::{FusionWeights, HybridSearch, ScoredChunk};
pub use store::{ChunkRecord, VectorHit, VectorStore};
