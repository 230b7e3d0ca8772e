use dumbvec_distance::{cosine_similarity_with_norm, dot_product, norm, SimilarityMetric};
use dumbvec_error::{DumbvecError, ErrorCodes};
use dumbvec_types::{DumbIndex, Reference};
use thiserror::Error;

use crate::mask::{DimensionMask, MaskError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Zero-magnitude query vector under cosine similarity")]
    DegenerateQuery,
    #[error("Zero-magnitude vector at position {position} under cosine similarity")]
    DegenerateVector { position: usize },
    #[error("Query value at dimension {dimension} is not finite")]
    NonFiniteQuery { dimension: usize },
    #[error("Scored position {position} is not in an index of {len} entries")]
    UnknownPosition { position: usize, len: usize },
    #[error(transparent)]
    Mask(#[from] MaskError),
}

impl DumbvecError for SearchError {
    fn code(&self) -> ErrorCodes {
        match self {
            SearchError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
            SearchError::DegenerateQuery => ErrorCodes::InvalidArgument,
            SearchError::DegenerateVector { .. } => ErrorCodes::InvalidArgument,
            SearchError::NonFiniteQuery { .. } => ErrorCodes::InvalidArgument,
            SearchError::UnknownPosition { .. } => ErrorCodes::Internal,
            SearchError::Mask(e) => e.code(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredEntry {
    pub score: f32,
    /// Position of the entry in the searched index.
    pub position: usize,
    pub reference: Reference,
}

/// Reduces a raw query to the width of a masked index.
pub fn prepare_query(
    query: &[f32],
    mask: Option<&DimensionMask>,
) -> Result<Vec<f32>, SearchError> {
    match mask {
        Some(mask) => Ok(mask.apply(query)?),
        None => Ok(query.to_vec()),
    }
}

fn score_all(
    index: &DumbIndex,
    query: &[f32],
    metric: SimilarityMetric,
) -> Result<Vec<ScoredEntry>, SearchError> {
    let entries = index.entries();
    match metric {
        SimilarityMetric::Dot => Ok(entries
            .iter()
            .enumerate()
            .map(|(position, entry)| ScoredEntry {
                score: dot_product(query, &entry.vector),
                position,
                reference: entry.reference,
            })
            .collect()),
        SimilarityMetric::Cosine => {
            let query_norm = norm(query);
            if query_norm == 0.0 {
                return Err(SearchError::DegenerateQuery);
            }
            entries
                .iter()
                .enumerate()
                .map(|(position, entry)| {
                    let score = cosine_similarity_with_norm(query, query_norm, &entry.vector)
                        .ok_or(SearchError::DegenerateVector { position })?;
                    Ok(ScoredEntry {
                        score,
                        position,
                        reference: entry.reference,
                    })
                })
                .collect()
        }
    }
}

/// The `k` entries most similar to `query`, best first.
///
/// Scores every entry, then partially selects the top `k` so that only the
/// selected entries are sorted. Equal scores keep index order.
pub fn top_k(
    index: &DumbIndex,
    query: &[f32],
    k: usize,
    metric: SimilarityMetric,
) -> Result<Vec<ScoredEntry>, SearchError> {
    if index.is_empty() {
        return Ok(Vec::new());
    }
    if query.len() != index.dimensions() {
        return Err(SearchError::DimensionMismatch {
            expected: index.dimensions(),
            got: query.len(),
        });
    }
    if let Some(dimension) = query.iter().position(|v| !v.is_finite()) {
        return Err(SearchError::NonFiniteQuery { dimension });
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored = score_all(index, query, metric)?;
    let order = |a: &ScoredEntry, b: &ScoredEntry| {
        b.score
            .total_cmp(&a.score)
            .then(a.position.cmp(&b.position))
    };
    let k = k.min(scored.len());
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, order);
        scored.truncate(k);
    }
    scored.sort_unstable_by(order);
    Ok(scored)
}

/// Like [`top_k`], but returns the selected entries as a new index in ranked
/// order. The new index shares the path and file tables of `index`.
pub fn top_k_index(
    index: &DumbIndex,
    query: &[f32],
    k: usize,
    metric: SimilarityMetric,
) -> Result<DumbIndex, SearchError> {
    let scored = top_k(index, query, k, metric)?;
    ranked_index(index, &scored)
}

/// The entries of `index` named by `scored`, in that order. `scored` must
/// come from searching `index`.
pub fn ranked_index(
    index: &DumbIndex,
    scored: &[ScoredEntry],
) -> Result<DumbIndex, SearchError> {
    let positions = scored.iter().map(|s| s.position).collect::<Vec<_>>();
    index.select(&positions).ok_or_else(|| {
        let position = positions
            .iter()
            .copied()
            .find(|&p| p >= index.len())
            .unwrap_or_default();
        SearchError::UnknownPosition {
            position,
            len: index.len(),
        }
    })
}
