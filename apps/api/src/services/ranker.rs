use crate::{
    error::{ApiError, Result},
    models::CatalogItem,
    services::catalog::Catalog,
};
use ndarray::ArrayView1;
use std::cmp::Ordering;

/// A catalog item paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredItem<'a> {
    pub item: &'a CatalogItem,
    pub score: f32,
}

/// Items ordered by non-increasing score, ties in catalog order.
pub type RankedResult<'a> = Vec<ScoredItem<'a>>;

fn norm(v: ArrayView1<'_, f32>) -> f32 {
    v.dot(&v).sqrt()
}

/// Cosine similarity of two equal-length vectors. A zero-length vector on
/// either side scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let denom = norm(a) * norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }

    let score = a.dot(&b) / denom;
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// Brute-force top-k by cosine similarity.
///
/// Returns `min(k, catalog.len())` items. The sort is stable so equal
/// scores keep catalog insertion order.
pub fn rank<'a>(query: &[f32], catalog: &'a Catalog, k: usize) -> Result<RankedResult<'a>> {
    if k == 0 {
        return Err(ApiError::InvalidInput("k must be at least 1".into()));
    }
    if query.len() != catalog.dimension() {
        return Err(ApiError::DimensionMismatch {
            expected: catalog.dimension(),
            got: query.len(),
        });
    }

    let mut scored: Vec<ScoredItem<'a>> = catalog
        .items()
        .iter()
        .map(|item| ScoredItem {
            item,
            score: cosine_similarity(query, &item.embedding),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);

    Ok(scored)
}
