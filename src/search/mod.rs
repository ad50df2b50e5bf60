mod results;
pub mod scoring;

pub use results::ScoredChunk;
pub use scoring::{cosine_similarity, normalize_bm25_scores};

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::fts::{Bm25Params, Bm25Search};
use crate::store::{ChunkRecord, VectorStore};

use scoring::select_top_k;

pub const DEFAULT_BM25_WEIGHT: f32 = 0.5;
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.5;

/// Linear fusion weights. Intended to sum to 1.0, though this is not
/// enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub bm25: f32,
    pub vector: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            bm25: DEFAULT_BM25_WEIGHT,
            vector: DEFAULT_VECTOR_WEIGHT,
        }
    }
}

/// Combines the lexical and vector indexes over one shared corpus.
///
/// Both indexes are populated in lock-step by `index_documents`, so a BM25
/// document position and a vector store position always refer to the same
/// `ChunkRecord`.
pub struct HybridSearch {
    weights: FusionWeights,
    bm25: Bm25Search,
    store: VectorStore,
}

impl HybridSearch {
    pub fn new(dimension: usize, weights: FusionWeights) -> Self {
        Self::with_params(dimension, weights, Bm25Params::default())
    }

    pub fn with_params(dimension: usize, weights: FusionWeights, params: Bm25Params) -> Self {
        Self {
            weights,
            bm25: Bm25Search::new(params),
            store: VectorStore::new(dimension),
        }
    }

    /// Rebuild the fusion engine around an already-populated vector store,
    /// deriving the lexical index from the stored chunk texts.
    pub fn from_store(store: VectorStore, weights: FusionWeights, params: Bm25Params) -> Self {
        let mut bm25 = Bm25Search::new(params);
        let texts: Vec<&str> = store.records().iter().map(|r| r.text.as_str()).collect();
        bm25.index_documents(&texts);
        Self {
            weights,
            bm25,
            store,
        }
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn records(&self) -> &[ChunkRecord] {
        self.store.records()
    }

    pub fn indexed_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.store.indexed_at()
    }

    /// Feed identical metadata to both indexes. The lexical side is rebuilt
    /// wholesale from the full stored corpus, so repeated calls stay
    /// consistent with the append-only vector side.
    pub fn index_documents(
        &mut self,
        records: Vec<ChunkRecord>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<usize>> {
        let ids = self.store.add_documents(vectors, records)?;
        let texts: Vec<&str> = self
            .store
            .records()
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        self.bm25.index_documents(&texts);
        Ok(ids)
    }

    /// BM25-only ranking over the shared corpus.
    pub fn search_lexical(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        self.bm25
            .search(query, k)
            .into_iter()
            .map(|(pos, score)| ScoredChunk::lexical(self.store.records()[pos].clone(), score))
            .collect()
    }

    /// Cosine-similarity-only ranking over the shared corpus.
    pub fn search_vector(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        Ok(self
            .store
            .search(query_vector, k)?
            .into_iter()
            .map(|hit| ScoredChunk::vector(hit.record, hit.similarity))
            .collect())
    }

    /// Weighted fusion of both rankings.
    ///
    /// Both sides retrieve over the full corpus (never truncated to `k`) so
    /// the union is scored fairly; a document absent from one side
    /// contributes 0 for that side. The reported `bm25_score` is the
    /// max-normalized value that entered the fusion, so
    /// `score == weights.bm25 * bm25_score + weights.vector * vector_score`
    /// holds exactly.
    pub fn search(&self, query: &str, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.store.is_empty() {
            return Ok(vec![]);
        }

        let corpus = self.store.len();
        let lexical = self.bm25.search(query, corpus);
        let raw_scores: Vec<f32> = lexical.iter().map(|(_, score)| *score).collect();
        let normalized = normalize_bm25_scores(&raw_scores);

        struct Slot {
            record: ChunkRecord,
            bm25: f32,
            similarity: f32,
        }

        let mut merged: HashMap<String, Slot> = HashMap::new();
        for ((pos, _), norm) in lexical.iter().zip(normalized) {
            let record = self.store.records()[*pos].clone();
            merged.insert(
                record.doc_id(),
                Slot {
                    record,
                    bm25: norm,
                    similarity: 0.0,
                },
            );
        }

        for hit in self.store.search(query_vector, corpus)? {
            let doc_id = hit.record.doc_id();
            match merged.get_mut(&doc_id) {
                Some(slot) => slot.similarity = hit.similarity,
                None => {
                    merged.insert(
                        doc_id,
                        Slot {
                            record: hit.record,
                            bm25: 0.0,
                            similarity: hit.similarity,
                        },
                    );
                }
            }
        }

        let mut fused: Vec<ScoredChunk> = merged
            .into_values()
            .map(|slot| {
                let hybrid =
                    self.weights.bm25 * slot.bm25 + self.weights.vector * slot.similarity;
                ScoredChunk::hybrid(slot.record, hybrid, slot.bm25, slot.similarity)
            })
            .collect();
        select_top_k(&mut fused, k);
        Ok(fused)
    }

    pub fn save(&self, stem: &Path) -> Result<()> {
        self.store.save(stem)
    }
}
