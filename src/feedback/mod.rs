use std::str::FromStr;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::search::scoring::sort_by_score;
use crate::search::ScoredChunk;

pub const DEFAULT_POSITIVE_BOOST: f32 = 0.2;
pub const DEFAULT_NEGATIVE_PENALTY: f32 = 0.3;

/// How much more strongly query-scoped ratios count compared to global ones.
const QUERY_SCOPED_WEIGHT: f32 = 1.5;
/// Blend of the global multiplier vs. the query-scoped refinement.
const GLOBAL_BLEND: f32 = 0.7;
/// Bounds that keep feedback from zeroing out or dominating a score.
const MIN_BOOST: f32 = 0.1;
const MAX_BOOST: f32 = 2.0;

/// Number of words of the query that participate in the fingerprint. The
/// prefix is lossy on purpose so near-duplicate queries share history.
const FINGERPRINT_WORDS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub positive_boost: f32,
    pub negative_penalty: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            positive_boost: DEFAULT_POSITIVE_BOOST,
            negative_penalty: DEFAULT_NEGATIVE_PENALTY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackLabel {
    Positive,
    Negative,
}

impl FromStr for FeedbackLabel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(EngineError::validation(format!(
                "feedback label must be 'positive' or 'negative', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DocFeedback {
    pub positive: u64,
    pub negative: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct PairFeedback {
    positive: u64,
    negative: u64,
}

/// One entry of the observability ranking in `FeedbackStats`.
#[derive(Debug, Clone, Serialize)]
pub struct DocFeedbackSummary {
    pub doc_id: String,
    pub positive: u64,
    pub negative: u64,
    pub total: u64,
    /// `(positive - negative) / total`, in [-1, 1].
    pub net_ratio: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackStats {
    pub total_feedback: u64,
    pub documents_with_feedback: usize,
    pub tracked_query_pairs: usize,
    pub top_documents: Vec<DocFeedbackSummary>,
    pub bottom_documents: Vec<DocFeedbackSummary>,
}

/// Re-weights ranked lists from accumulated user judgments. No model is
/// trained; the statistics only grow until `reset_feedback`.
///
/// Both maps are concurrent, so feedback submission may interleave freely
/// with searches reading the boosts.
#[derive(Debug, Default)]
pub struct FeedbackScorer {
    config: FeedbackConfig,
    by_doc: DashMap<String, DocFeedback>,
    by_query_doc: DashMap<(String, String), PairFeedback>,
}

impl FeedbackScorer {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Record one judgment against both the global and the query-scoped
    /// counters. The label must be `positive` or `negative`.
    pub fn add_feedback(&self, query: &str, doc_id: &str, label: &str) -> Result<(), EngineError> {
        let label = FeedbackLabel::from_str(label)?;

        let mut doc = self.by_doc.entry(doc_id.to_string()).or_default();
        doc.total += 1;
        match label {
            FeedbackLabel::Positive => doc.positive += 1,
            FeedbackLabel::Negative => doc.negative += 1,
        }
        drop(doc);

        let key = (query_fingerprint(query), doc_id.to_string());
        let mut pair = self.by_query_doc.entry(key).or_default();
        match label {
            FeedbackLabel::Positive => pair.positive += 1,
            FeedbackLabel::Negative => pair.negative += 1,
        }
        Ok(())
    }

    /// Multiplier in [0.1, 2.0]; exactly 1.0 for a document without any
    /// feedback. Query-scoped history, when present, refines the global
    /// signal at a 0.7/0.3 blend.
    pub fn get_document_boost(&self, doc_id: &str, query: Option<&str>) -> f32 {
        let global = match self.by_doc.get(doc_id) {
            Some(doc) if doc.total > 0 => {
                let pos_ratio = doc.positive as f32 / doc.total as f32;
                let neg_ratio = doc.negative as f32 / doc.total as f32;
                1.0 + pos_ratio * self.config.positive_boost
                    - neg_ratio * self.config.negative_penalty
            }
            _ => return 1.0,
        };

        let scoped = query.and_then(|q| {
            let key = (query_fingerprint(q), doc_id.to_string());
            self.by_query_doc.get(&key).map(|pair| {
                let total = (pair.positive + pair.negative) as f32;
                let pos_ratio = pair.positive as f32 / total;
                let neg_ratio = pair.negative as f32 / total;
                1.0 + QUERY_SCOPED_WEIGHT
                    * (pos_ratio * self.config.positive_boost
                        - neg_ratio * self.config.negative_penalty)
            })
        });

        let combined = match scoped {
            Some(scoped) => GLOBAL_BLEND * global + (1.0 - GLOBAL_BLEND) * scoped,
            None => global,
        };
        combined.clamp(MIN_BOOST, MAX_BOOST)
    }

    /// Apply boosts to a ranked list and re-sort it descending by the
    /// adjusted score. Each result keeps its pre-adjustment score in
    /// `original_score`. With no recorded feedback the list passes through
    /// unchanged.
    pub fn adjust_search_results(
        &self,
        mut results: Vec<ScoredChunk>,
        query: &str,
    ) -> Vec<ScoredChunk> {
        if results.is_empty() {
            return results;
        }

        for result in &mut results {
            let boost = self.get_document_boost(&result.doc_id(), Some(query));
            result.original_score = Some(result.score);
            result.feedback_boost = Some(boost);
            result.score *= boost;
        }
        sort_by_score(&mut results);
        results
    }

    pub fn get_feedback_stats(&self) -> FeedbackStats {
        let mut summaries: Vec<DocFeedbackSummary> = self
            .by_doc
            .iter()
            .map(|entry| {
                let doc = entry.value();
                DocFeedbackSummary {
                    doc_id: entry.key().clone(),
                    positive: doc.positive,
                    negative: doc.negative,
                    total: doc.total,
                    net_ratio: (doc.positive as f32 - doc.negative as f32) / doc.total as f32,
                }
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.net_ratio
                .partial_cmp(&a.net_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });

        let top_documents: Vec<_> = summaries.iter().take(5).cloned().collect();
        let bottom_documents: Vec<_> = summaries.iter().rev().take(5).cloned().collect();

        FeedbackStats {
            total_feedback: summaries.iter().map(|s| s.total).sum(),
            documents_with_feedback: summaries.len(),
            tracked_query_pairs: self.by_query_doc.len(),
            top_documents,
            bottom_documents,
        }
    }

    pub fn reset_feedback(&self) {
        self.by_doc.clear();
        self.by_query_doc.clear();
    }
}

/// Digest of the lowercased, whitespace-normalized first five words.
/// Deliberately lossy: word order and punctuation still matter, but
/// trailing words do not.
fn query_fingerprint(query: &str) -> String {
    let prefix = query
        .to_lowercase()
        .split_whitespace()
        .take(FINGERPRINT_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    blake3::hash(prefix.as_bytes()).to_hex().to_string()
}
