use serde::Serialize;

use crate::store::ChunkRecord;

/// A ranked chunk plus the scores that produced its rank.
///
/// `score` is the value the list is ordered by; the optional fields say
/// which signals were actually computed, so consumers branch on presence
/// instead of string-keyed lookups.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_score: Option<f32>,
    /// Pre-adjustment score, present once feedback has been applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_boost: Option<f32>,
}

impl ScoredChunk {
    pub fn lexical(record: ChunkRecord, bm25_score: f32) -> Self {
        Self {
            record,
            score: bm25_score,
            bm25_score: Some(bm25_score),
            vector_score: None,
            hybrid_score: None,
            original_score: None,
            feedback_boost: None,
        }
    }

    pub fn vector(record: ChunkRecord, similarity: f32) -> Self {
        Self {
            record,
            score: similarity,
            bm25_score: None,
            vector_score: Some(similarity),
            hybrid_score: None,
            original_score: None,
            feedback_boost: None,
        }
    }

    pub fn hybrid(record: ChunkRecord, hybrid: f32, bm25: f32, similarity: f32) -> Self {
        Self {
            record,
            score: hybrid,
            bm25_score: Some(bm25),
            vector_score: Some(similarity),
            hybrid_score: Some(hybrid),
            original_score: None,
            feedback_boost: None,
        }
    }

    pub fn doc_id(&self) -> String {
        self.record.doc_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ChunkRecord {
        ChunkRecord {
            id: 7,
            source_file: "guide.md".to_string(),
            title: "Guide".to_string(),
            chunk_index: 2,
            text: "some text".to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn constructors_tag_the_scores_they_carry() {
        let lexical = ScoredChunk::lexical(record(), 3.2);
        assert_eq!(lexical.score, 3.2);
        assert!(lexical.bm25_score.is_some());
        assert!(lexical.vector_score.is_none());

        let vector = ScoredChunk::vector(record(), 0.8);
        assert!(vector.bm25_score.is_none());
        assert_eq!(vector.vector_score, Some(0.8));

        let hybrid = ScoredChunk::hybrid(record(), 0.6, 0.4, 0.8);
        assert_eq!(hybrid.hybrid_score, Some(0.6));
        assert_eq!(hybrid.bm25_score, Some(0.4));
        assert_eq!(hybrid.vector_score, Some(0.8));
    }

    #[test]
    fn doc_id_matches_record_identity() {
        let chunk = ScoredChunk::lexical(record(), 1.0);
        assert_eq!(chunk.doc_id(), "guide.md:2");
    }

    #[test]
    fn absent_scores_are_skipped_in_serialization() {
        let chunk = ScoredChunk::lexical(record(), 1.0);
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("bm25_score").is_some());
        assert!(json.get("vector_score").is_none());
        assert!(json.get("feedback_boost").is_none());
    }
}
