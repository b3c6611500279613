//! Vector similarity and hybrid ranking utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Nearest-neighbour ranking over a document field
//! - Reciprocal Rank Fusion (RRF) for merging ranked result lists

use ragchat_core::{Document, VectorField};
use std::collections::HashMap;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

fn field_vector(doc: &Document, field: VectorField) -> Option<&[f32]> {
    match field {
        VectorField::Embedding => doc.embedding.as_deref(),
        VectorField::ImageEmbedding => doc.image_embedding.as_deref(),
    }
}

/// Rank documents by cosine similarity between `field` and `query`.
///
/// Documents without that field are skipped. `score` is set to the
/// similarity.
pub fn vector_search<'a>(
    docs: impl IntoIterator<Item = &'a Document>,
    field: VectorField,
    query: &[f32],
    limit: usize,
) -> Vec<Document> {
    let mut scored: Vec<Document> = docs
        .into_iter()
        .filter_map(|doc| {
            let sim = cosine_similarity(field_vector(doc, field)?, query);
            let mut d = doc.clone();
            d.score = sim;
            Some(d)
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Reciprocal Rank Fusion (RRF) across any number of ranked lists.
///
/// Each document's final score = sum of 1/(k + rank) across the lists it
/// appears in. Standard value is k=60. Results are deduplicated by ID and
/// ties keep first-seen order.
pub fn reciprocal_rank_fusion(lists: &[Vec<Document>], k: u32, limit: usize) -> Vec<Document> {
    let k = k as f32;

    // id → (rrf_score, first_seen, doc)
    let mut scores: HashMap<&str, (f32, usize, &Document)> = HashMap::new();
    let mut seen = 0usize;

    for list in lists {
        for (rank, doc) in list.iter().enumerate() {
            let rrf_score = 1.0 / (k + rank as f32 + 1.0);
            scores
                .entry(doc.id.as_str())
                .and_modify(|(score, _, _)| *score += rrf_score)
                .or_insert_with(|| {
                    seen += 1;
                    (rrf_score, seen, doc)
                });
        }
    }

    let mut fused: Vec<(f32, usize, &Document)> = scores.into_values().collect();
    fused.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    fused.truncate(limit);
    fused
        .into_iter()
        .map(|(score, _, doc)| {
            let mut d = doc.clone();
            d.score = score;
            d
        })
        .collect()
}
