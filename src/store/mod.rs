mod blob;

pub(crate) use blob::{parse_header, read_vectors, validate_size, write_vectors};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::search::scoring::dot_product;

pub use blob::BLOB_FORMAT_VERSION;

const INDEX_TYPE_FLAT: &str = "flat";
const VECTORS_EXT: &str = ".vectors";
const META_EXT: &str = ".meta";
const ZSTD_LEVEL: i32 = 3;

/// One indexed unit. The lexical and vector indexes address the same record
/// through its positional `id`; the vector index additionally owns the
/// embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: usize,
    pub source_file: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    /// Caller-supplied passthrough fields, persisted verbatim.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChunkRecord {
    /// Identity key shared by fusion and feedback: `source_file:chunk_index`.
    pub fn doc_id(&self) -> String {
        format!("{}:{}", self.source_file, self.chunk_index)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorHit {
    pub record: ChunkRecord,
    pub similarity: f32,
}

/// Persisted alongside the vector blob; holds everything except the raw
/// vector data.
#[derive(Debug, Serialize, Deserialize)]
struct StoreManifest {
    format_version: u32,
    index_type: String,
    dimension: usize,
    next_id: usize,
    indexed_at: DateTime<Utc>,
    records: Vec<ChunkRecord>,
}

/// Brute-force cosine-similarity vector index.
///
/// Vectors are L2-normalized on ingest, so similarity reduces to a dot
/// product. Append-only within one instance; the unit of corpus mutation is
/// a full rebuild by the orchestrator.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    records: Vec<ChunkRecord>,
    next_id: usize,
    indexed_at: DateTime<Utc>,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            records: Vec::new(),
            next_id: 0,
            indexed_at: Utc::now(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// When the store content last changed (restored across save/load).
    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.indexed_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn get_vector(&self, idx: usize) -> Option<&[f32]> {
        self.vectors.get(idx).map(|v| v.as_slice())
    }

    /// Append vectors with their metadata records, assigning sequential ids
    /// from the running counter. Returns the assigned ids.
    pub fn add_documents(
        &mut self,
        vectors: Vec<Vec<f32>>,
        records: Vec<ChunkRecord>,
    ) -> Result<Vec<usize>> {
        if vectors.len() != records.len() {
            return Err(EngineError::validation(format!(
                "vector/metadata count mismatch: {} vectors, {} records",
                vectors.len(),
                records.len()
            ))
            .into());
        }
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(EngineError::validation(format!(
                    "vector {} has dimension {}, index expects {}",
                    i,
                    vector.len(),
                    self.dimension
                ))
                .into());
            }
        }

        let mut ids = Vec::with_capacity(records.len());
        for (mut vector, mut record) in vectors.into_iter().zip(records) {
            l2_normalize(&mut vector);
            record.id = self.next_id;
            ids.push(self.next_id);
            self.next_id += 1;
            self.vectors.push(vector);
            self.records.push(record);
        }
        self.indexed_at = Utc::now();
        Ok(ids)
    }

    /// Exhaustive cosine-similarity scan. Top-k descending; ties keep
    /// insertion order. An empty store yields an empty result for any `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if self.is_empty() {
            return Ok(vec![]);
        }
        if query.len() != self.dimension {
            return Err(EngineError::validation(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            ))
            .into());
        }

        let mut normalized = query.to_vec();
        l2_normalize(&mut normalized);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_iter()
            .enumerate()
            .map(|(idx, vector)| (idx, dot_product(&normalized, vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, similarity)| VectorHit {
                record: self.records[idx].clone(),
                similarity,
            })
            .collect())
    }

    /// Persist to two companion artifacts: `<stem>.vectors` (raw f32 blob)
    /// and `<stem>.meta` (zstd-compressed JSON manifest).
    pub fn save(&self, stem: &Path) -> Result<()> {
        let vectors_path = artifact_path(stem, VECTORS_EXT);
        let meta_path = artifact_path(stem, META_EXT);

        write_vectors(&vectors_path, self.dimension, &self.vectors)?;

        let manifest = StoreManifest {
            format_version: BLOB_FORMAT_VERSION,
            index_type: INDEX_TYPE_FLAT.to_string(),
            dimension: self.dimension,
            next_id: self.next_id,
            indexed_at: self.indexed_at,
            records: self.records.clone(),
        };
        // JSON rather than a binary codec: the records carry arbitrary
        // caller-supplied JSON in `extra`, which only a self-describing
        // format can round-trip.
        let bytes = serde_json::to_vec(&manifest)?;
        let compressed = zstd::stream::encode_all(bytes.as_slice(), ZSTD_LEVEL)?;
        fs::write(&meta_path, compressed)
            .with_context(|| format!("Failed to write {}", meta_path.display()))?;

        debug!(
            vectors = self.vectors.len(),
            dimension = self.dimension,
            "saved vector index to {}",
            stem.display()
        );
        Ok(())
    }

    /// Load a store persisted by `save`. A missing artifact is a not-found
    /// error; any disagreement between the two artifacts (dimension, type
    /// tag, vector count) is a validation error.
    pub fn load(stem: &Path) -> Result<Self> {
        let vectors_path = artifact_path(stem, VECTORS_EXT);
        let meta_path = artifact_path(stem, META_EXT);

        if !meta_path.exists() {
            return Err(EngineError::not_found(meta_path).into());
        }
        if !vectors_path.exists() {
            return Err(EngineError::not_found(vectors_path).into());
        }

        let compressed = fs::read(&meta_path)
            .with_context(|| format!("Failed to read {}", meta_path.display()))?;
        let bytes = zstd::stream::decode_all(compressed.as_slice())?;
        let manifest: StoreManifest = serde_json::from_slice(&bytes)?;

        if manifest.index_type != INDEX_TYPE_FLAT {
            return Err(EngineError::validation(format!(
                "unknown index type tag '{}'",
                manifest.index_type
            ))
            .into());
        }
        if manifest.format_version != BLOB_FORMAT_VERSION {
            return Err(EngineError::validation(format!(
                "unsupported index format version {}",
                manifest.format_version
            ))
            .into());
        }

        let blob = fs::read(&vectors_path)
            .with_context(|| format!("Failed to read {}", vectors_path.display()))?;
        let (blob_version, blob_dim) = parse_header(&blob)?;
        if blob_version != manifest.format_version {
            return Err(EngineError::validation(format!(
                "vector blob version {} disagrees with manifest version {}",
                blob_version, manifest.format_version
            ))
            .into());
        }
        if blob_dim != manifest.dimension {
            return Err(EngineError::validation(format!(
                "vector blob dimension {} disagrees with manifest dimension {}",
                blob_dim, manifest.dimension
            ))
            .into());
        }
        validate_size(&blob, manifest.dimension, manifest.records.len())?;
        let vectors = read_vectors(&blob, manifest.dimension, manifest.records.len());

        debug!(
            vectors = vectors.len(),
            dimension = manifest.dimension,
            "loaded vector index from {}",
            stem.display()
        );
        Ok(Self {
            dimension: manifest.dimension,
            vectors,
            records: manifest.records,
            next_id: manifest.next_id,
            indexed_at: manifest.indexed_at,
        })
    }
}

fn artifact_path(stem: &Path, ext: &str) -> PathBuf {
    let mut os = stem.as_os_str().to_owned();
    os.push(ext);
    PathBuf::from(os)
}

/// Scale to unit length. A zero vector is left untouched and scores 0
/// against any query.
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(source_file: &str, chunk_index: usize) -> ChunkRecord {
        ChunkRecord {
            id: 0,
            source_file: source_file.to_string(),
            title: source_file.to_string(),
            chunk_index,
            text: format!("chunk {chunk_index} of {source_file}"),
            extra: serde_json::Map::new(),
        }
    }

    fn temp_stem(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docrank_store_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn doc_id_joins_source_and_chunk_index() {
        assert_eq!(make_record("notes.md", 3).doc_id(), "notes.md:3");
    }

    #[test]
    fn add_rejects_count_mismatch() {
        let mut store = VectorStore::new(2);
        let err = store
            .add_documents(vec![vec![1.0, 0.0]], vec![])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Validation(_))
        ));
    }

    #[test]
    fn add_rejects_dimension_mismatch() {
        let mut store = VectorStore::new(3);
        let err = store
            .add_documents(vec![vec![1.0, 0.0]], vec![make_record("a", 0)])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Validation(_))
        ));
    }

    #[test]
    fn ids_continue_across_adds() {
        let mut store = VectorStore::new(2);
        let first = store
            .add_documents(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![make_record("a", 0), make_record("a", 1)],
            )
            .unwrap();
        let second = store
            .add_documents(vec![vec![1.0, 1.0]], vec![make_record("b", 0)])
            .unwrap();

        assert_eq!(first, vec![0, 1]);
        assert_eq!(second, vec![2]);
        assert_eq!(store.records()[2].id, 2);
    }

    #[test]
    fn self_similarity_is_maximal() {
        let mut store = VectorStore::new(3);
        store
            .add_documents(
                vec![
                    vec![1.0, 2.0, 3.0],
                    vec![-1.0, 0.5, 0.0],
                    vec![0.0, 0.0, 4.0],
                ],
                vec![
                    make_record("a", 0),
                    make_record("a", 1),
                    make_record("a", 2),
                ],
            )
            .unwrap();

        let hits = store.search(&[1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(hits[0].record.chunk_index, 0);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        for hit in &hits[1..] {
            assert!(hit.similarity <= hits[0].similarity);
        }
    }

    #[test]
    fn zero_vector_is_stored_and_scores_zero() {
        let mut store = VectorStore::new(2);
        store
            .add_documents(
                vec![vec![0.0, 0.0], vec![1.0, 0.0]],
                vec![make_record("a", 0), make_record("a", 1)],
            )
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        let zero_hit = hits.iter().find(|h| h.record.chunk_index == 0).unwrap();
        assert_eq!(zero_hit.similarity, 0.0);
    }

    #[test]
    fn empty_store_returns_empty_for_any_k() {
        let store = VectorStore::new(4);
        assert!(store.search(&[1.0, 0.0, 0.0, 0.0], 100).unwrap().is_empty());
    }

    #[test]
    fn k_larger_than_store_returns_everything() {
        let mut store = VectorStore::new(2);
        store
            .add_documents(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![make_record("a", 0), make_record("a", 1)],
            )
            .unwrap();
        assert_eq!(store.search(&[1.0, 1.0], 50).unwrap().len(), 2);
    }

    #[test]
    fn query_dimension_mismatch_is_validation_error() {
        let mut store = VectorStore::new(2);
        store
            .add_documents(vec![vec![1.0, 0.0]], vec![make_record("a", 0)])
            .unwrap();
        let err = store.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Validation(_))
        ));
    }

    #[test]
    fn save_load_roundtrip_reproduces_identical_scores() {
        let stem = temp_stem("index");
        let mut store = VectorStore::new(3);
        store
            .add_documents(
                vec![
                    vec![0.3, 0.7, 0.1],
                    vec![0.9, 0.1, 0.4],
                    vec![0.2, 0.2, 0.2],
                ],
                vec![
                    make_record("a.md", 0),
                    make_record("a.md", 1),
                    make_record("b.md", 0),
                ],
            )
            .unwrap();
        store.save(&stem).unwrap();

        let reloaded = VectorStore::load(&stem).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.dimension(), 3);

        let query = [0.5, 0.5, 0.5];
        let before = store.search(&query, 3).unwrap();
        let after = reloaded.search(&query, 3).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.record.id, b.record.id);
            assert_eq!(a.similarity.to_bits(), b.similarity.to_bits());
        }

        fs::remove_dir_all(stem.parent().unwrap()).ok();
    }

    #[test]
    fn load_missing_path_is_not_found() {
        let stem = temp_stem("missing");
        let err = VectorStore::load(&stem).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::NotFound(_))
        ));
        fs::remove_dir_all(stem.parent().unwrap()).ok();
    }

    #[test]
    fn load_rejects_dimension_disagreement() {
        let stem = temp_stem("dim");
        let mut store = VectorStore::new(2);
        store
            .add_documents(vec![vec![1.0, 0.0]], vec![make_record("a", 0)])
            .unwrap();
        store.save(&stem).unwrap();

        // Rewrite the blob header with a different dimension.
        let vectors_path = artifact_path(&stem, VECTORS_EXT);
        let mut bytes = fs::read(&vectors_path).unwrap();
        bytes[4..8].copy_from_slice(&5u32.to_le_bytes());
        fs::write(&vectors_path, bytes).unwrap();

        let err = VectorStore::load(&stem).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Validation(_))
        ));
        fs::remove_dir_all(stem.parent().unwrap()).ok();
    }

    #[test]
    fn reloaded_store_continues_id_sequence() {
        let stem = temp_stem("ids");
        let mut store = VectorStore::new(2);
        store
            .add_documents(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![make_record("a", 0), make_record("a", 1)],
            )
            .unwrap();
        store.save(&stem).unwrap();

        let mut reloaded = VectorStore::load(&stem).unwrap();
        let ids = reloaded
            .add_documents(vec![vec![1.0, 1.0]], vec![make_record("b", 0)])
            .unwrap();
        assert_eq!(ids, vec![2]);

        fs::remove_dir_all(stem.parent().unwrap()).ok();
    }
}
