use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunker::TextChunker;
use crate::embedding::Embedder;
use crate::error::EngineError;
use crate::feedback::{FeedbackConfig, FeedbackScorer, FeedbackStats};
use crate::fts::Bm25Params;
use crate::search::{FusionWeights, HybridSearch, ScoredChunk};
use crate::store::{ChunkRecord, VectorStore};

/// A raw document handed to the indexing pipeline.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_file: String,
    pub title: String,
    pub text: String,
    /// Passthrough fields copied onto every chunk record of this document.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SourceDocument {
    pub fn new(source_file: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            title: title.into(),
            text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Tuning knobs for one engine instance. Several independently-configured
/// instances can coexist; nothing here is global.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexerConfig {
    pub fusion: FusionWeights,
    pub bm25: Bm25Params,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexMetadata {
    pub version: String,
    pub dimension: usize,
    pub indexed_at: DateTime<Utc>,
    pub total_documents: usize,
    pub total_chunks: usize,
}

#[derive(Debug)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub duration: Duration,
}

struct Snapshot {
    index: HybridSearch,
    metadata: IndexMetadata,
}

/// Owns the indexing pipeline and exposes the three search modes plus
/// persistence.
///
/// Rebuilds construct a fresh index off to the side and publish it by
/// swapping the snapshot behind an `RwLock`, so in-flight searches never
/// observe a half-built corpus. Feedback lives outside the snapshot and
/// survives rebuilds.
pub struct DocumentIndexer {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    config: IndexerConfig,
    feedback: FeedbackScorer,
    snapshot: RwLock<Option<Snapshot>>,
}

impl DocumentIndexer {
    pub fn new(chunker: TextChunker, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_config(chunker, embedder, IndexerConfig::default())
    }

    pub fn with_config(
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            chunker,
            embedder,
            config,
            feedback: FeedbackScorer::new(config.feedback),
            snapshot: RwLock::new(None),
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn is_indexed(&self) -> bool {
        self.read_snapshot()
            .as_ref()
            .map(|s| !s.index.is_empty())
            .unwrap_or(false)
    }

    pub fn metadata(&self) -> Option<IndexMetadata> {
        self.read_snapshot().as_ref().map(|s| s.metadata.clone())
    }

    /// Full-corpus rebuild: chunk, embed, populate both indexes in
    /// lock-step, then atomically swap the published snapshot.
    pub fn index_documents(&self, docs: &[SourceDocument]) -> Result<IndexReport> {
        let start = Instant::now();

        let mut records = Vec::new();
        let mut texts = Vec::new();
        for doc in docs {
            for chunk in self.chunker.chunk(&doc.source_file, &doc.text) {
                texts.push(chunk.text.clone());
                records.push(ChunkRecord {
                    id: 0, // assigned by the vector store
                    source_file: doc.source_file.clone(),
                    title: doc.title.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text,
                    extra: doc.extra.clone(),
                });
            }
        }
        debug!(documents = docs.len(), chunks = records.len(), "chunked corpus");

        let vectors = self.embedder.embed_many(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EngineError::validation(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            ))
            .into());
        }

        let mut index = HybridSearch::with_params(
            self.embedder.dimension(),
            self.config.fusion,
            self.config.bm25,
        );
        let chunks = records.len();
        index.index_documents(records, vectors)?;

        let metadata = self.describe(&index);
        let report = IndexReport {
            documents: docs.len(),
            chunks,
            duration: start.elapsed(),
        };
        *self.write_snapshot() = Some(Snapshot { index, metadata });

        info!(
            documents = report.documents,
            chunks = report.chunks,
            elapsed_ms = report.duration.as_millis() as u64,
            "index rebuilt"
        );
        Ok(report)
    }

    /// BM25-only search.
    pub fn search_lexical(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        match self.read_snapshot().as_ref() {
            Some(snapshot) => Ok(snapshot.index.search_lexical(query, k)),
            None => Ok(vec![]),
        }
    }

    /// Embedding-similarity-only search.
    pub fn search_vector(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let guard = self.read_snapshot();
        let Some(snapshot) = guard.as_ref() else {
            return Ok(vec![]);
        };
        if snapshot.index.is_empty() {
            return Ok(vec![]);
        }
        let query_vector = self.embedder.embed(query)?;
        snapshot.index.search_vector(&query_vector, k)
    }

    /// Fused search over both indexes.
    pub fn search_hybrid(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let guard = self.read_snapshot();
        let Some(snapshot) = guard.as_ref() else {
            return Ok(vec![]);
        };
        if snapshot.index.is_empty() {
            return Ok(vec![]);
        }
        let query_vector = self.embedder.embed(query)?;
        snapshot.index.search(query, &query_vector, k)
    }

    /// Fused search re-weighted by accumulated feedback.
    pub fn search_hybrid_adjusted(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let results = self.search_hybrid(query, k)?;
        Ok(self.feedback.adjust_search_results(results, query))
    }

    pub fn add_feedback(&self, query: &str, doc_id: &str, label: &str) -> Result<()> {
        self.feedback.add_feedback(query, doc_id, label)?;
        Ok(())
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        self.feedback.get_feedback_stats()
    }

    pub fn reset_feedback(&self) {
        self.feedback.reset_feedback();
    }

    pub fn feedback(&self) -> &FeedbackScorer {
        &self.feedback
    }

    /// Persist the current snapshot's vector side to `<stem>.vectors` +
    /// `<stem>.meta`. The lexical index is derived state and is rebuilt on
    /// load.
    pub fn save(&self, stem: &Path) -> Result<()> {
        match self.read_snapshot().as_ref() {
            Some(snapshot) => snapshot.index.save(stem),
            None => Err(EngineError::validation("nothing indexed, refusing to save").into()),
        }
    }

    /// Replace the published snapshot with a persisted index. The stored
    /// dimension must match this instance's embedder.
    pub fn load(&self, stem: &Path) -> Result<IndexMetadata> {
        let store = VectorStore::load(stem)?;
        if store.dimension() != self.embedder.dimension() {
            return Err(EngineError::validation(format!(
                "persisted index has dimension {}, embedder produces {}",
                store.dimension(),
                self.embedder.dimension()
            ))
            .into());
        }

        let index = HybridSearch::from_store(store, self.config.fusion, self.config.bm25);
        let metadata = self.describe(&index);
        info!(
            chunks = metadata.total_chunks,
            dimension = metadata.dimension,
            "index loaded from {}",
            stem.display()
        );
        *self.write_snapshot() = Some(Snapshot {
            index,
            metadata: metadata.clone(),
        });
        Ok(metadata)
    }

    fn describe(&self, index: &HybridSearch) -> IndexMetadata {
        let total_documents = index
            .records()
            .iter()
            .map(|r| r.source_file.as_str())
            .collect::<HashSet<_>>()
            .len();
        IndexMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            dimension: index.dimension(),
            indexed_at: index.indexed_at(),
            total_documents,
            total_chunks: index.len(),
        }
    }

    fn read_snapshot(&self) -> RwLockReadGuard<'_, Option<Snapshot>> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_snapshot(&self) -> RwLockWriteGuard<'_, Option<Snapshot>> {
        self.snapshot.write().unwrap_or_else(|e| e.into_inner())
    }
}
