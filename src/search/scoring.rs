use simsimd::SpatialSimilarity;

use super::results::ScoredChunk;

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> f32 {
    match f32::cosine(lhs, rhs) {
        Some(distance) => ((1.0 - distance) as f32).clamp(-1.0, 1.0),
        None => cosine_similarity_scalar(lhs, rhs),
    }
}

pub fn cosine_similarity_scalar(lhs: &[f32], rhs: &[f32]) -> f32 {
    let dot: f32 = lhs.iter().zip(rhs).map(|(a, b)| a * b).sum();
    let norm_l: f32 = lhs.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_r: f32 = rhs.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_l == 0.0 || norm_r == 0.0 {
        return 0.0;
    }
    (dot / (norm_l * norm_r)).clamp(-1.0, 1.0)
}

/// Plain dot product; equals cosine similarity when both sides are unit
/// vectors.
pub fn dot_product(lhs: &[f32], rhs: &[f32]) -> f32 {
    match f32::dot(lhs, rhs) {
        Some(dot) => dot as f32,
        None => dot_product_scalar(lhs, rhs),
    }
}

pub fn dot_product_scalar(lhs: &[f32], rhs: &[f32]) -> f32 {
    lhs.iter().zip(rhs).map(|(a, b)| a * b).sum()
}

/// Scale raw BM25 scores into [0, 1] by dividing by the maximum, so they
/// can be fused with cosine similarities on a comparable scale. All-zero
/// input stays all-zero.
pub fn normalize_bm25_scores(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| s / max).collect()
}

/// Descending by score; equal scores keep ascending record id, which is
/// the original insertion order.
pub fn sort_by_score(matches: &mut [ScoredChunk]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
}

pub fn select_top_k(matches: &mut Vec<ScoredChunk>, k: usize) {
    sort_by_score(matches);
    matches.truncate(k);
}
