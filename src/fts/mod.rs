use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Standard BM25 constants. Exposed so callers can tune per instance rather
/// than patching globals.
pub const DEFAULT_BM25_K1: f32 = 1.5;
pub const DEFAULT_BM25_B: f32 = 0.75;

/// Tokenize text for lexical indexing: lowercase, treat every
/// non-alphanumeric character as a separator, drop empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization strength.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_BM25_K1,
            b: DEFAULT_BM25_B,
        }
    }
}

/// Inverted-index BM25 ranker.
///
/// Holds token -> (document position, term frequency) postings plus the
/// corpus statistics the scoring formula needs. The whole structure is
/// rebuilt by every `index_documents` call; there are no incremental
/// updates.
#[derive(Debug, Clone, Default)]
pub struct Bm25Search {
    params: Bm25Params,
    /// token -> postings, each entry (document position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f32,
    num_docs: usize,
}

impl Bm25Search {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.num_docs > 0
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    /// Rebuild the index from scratch. An empty input clears the index and
    /// leaves it in the not-indexed state.
    pub fn index_documents<S: AsRef<str>>(&mut self, texts: &[S]) {
        self.postings.clear();
        self.doc_lengths.clear();
        self.avg_doc_len = 0.0;
        self.num_docs = texts.len();
        if texts.is_empty() {
            return;
        }

        let mut total_len = 0u64;
        for (doc_pos, text) in texts.iter().enumerate() {
            let tokens = tokenize(text.as_ref());
            total_len += tokens.len() as u64;
            self.doc_lengths.push(tokens.len() as u32);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for (token, count) in tf {
                self.postings.entry(token).or_default().push((doc_pos, count));
            }
        }

        self.avg_doc_len = total_len as f32 / texts.len() as f32;
    }

    /// Rank documents containing at least one query token, descending by
    /// BM25 score. Documents that score zero are excluded; ties keep
    /// original document order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        if self.num_docs == 0 {
            return vec![];
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return vec![];
        }

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for token in &query_tokens {
            let Some(postings) = self.postings.get(token) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((self.num_docs as f32 - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(doc_pos, tf) in postings {
                let tf = tf as f32;
                let doc_len = self.doc_lengths[doc_pos] as f32;
                let tf_norm = (tf * (self.params.k1 + 1.0))
                    / (tf
                        + self.params.k1
                            * (1.0 - self.params.b
                                + self.params.b * doc_len / self.avg_doc_len));
                *scores.entry(doc_pos).or_insert(0.0) += idf * tf_norm;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}
