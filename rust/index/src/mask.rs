use dumbvec_error::{DumbvecError, ErrorCodes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    #[error("Vector has {got} dimensions, mask expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl DumbvecError for MaskError {
    fn code(&self) -> ErrorCodes {
        match self {
            MaskError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
        }
    }
}

/// Which source dimensions survive into a reduced vector, one flag per
/// source dimension.
///
/// The container does not carry the mask, so whoever builds a masked index
/// must keep the mask and apply it to every query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMask {
    keep: Vec<bool>,
}

impl DimensionMask {
    pub fn new(keep: Vec<bool>) -> Self {
        DimensionMask { keep }
    }

    /// A mask that keeps every one of `width` dimensions.
    pub fn all(width: usize) -> Self {
        DimensionMask {
            keep: vec![true; width],
        }
    }

    /// Width of the vectors the mask applies to.
    pub fn width(&self) -> usize {
        self.keep.len()
    }

    /// Width of the vectors the mask produces.
    pub fn kept(&self) -> usize {
        self.keep.iter().filter(|k| **k).count()
    }

    pub fn is_identity(&self) -> bool {
        self.keep.iter().all(|k| *k)
    }

    pub fn bits(&self) -> &[bool] {
        &self.keep
    }

    pub fn apply(&self, vector: &[f32]) -> Result<Vec<f32>, MaskError> {
        if vector.len() != self.keep.len() {
            return Err(MaskError::DimensionMismatch {
                expected: self.keep.len(),
                got: vector.len(),
            });
        }
        Ok(vector
            .iter()
            .zip(&self.keep)
            .filter_map(|(v, keep)| keep.then_some(*v))
            .collect())
    }
}

/// Drops every dimension whose range (max - min) across `vectors` is below
/// `threshold`. Returns `None` when there are no vectors to measure.
pub fn compute_mask(
    vectors: &[Vec<f32>],
    threshold: f32,
) -> Result<Option<DimensionMask>, MaskError> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let width = first.len();
    let mut min = first.clone();
    let mut max = first.clone();
    for vector in &vectors[1..] {
        if vector.len() != width {
            return Err(MaskError::DimensionMismatch {
                expected: width,
                got: vector.len(),
            });
        }
        for (i, v) in vector.iter().enumerate() {
            min[i] = min[i].min(*v);
            max[i] = max[i].max(*v);
        }
    }
    let keep = min
        .iter()
        .zip(&max)
        .map(|(lo, hi)| hi - lo >= threshold)
        .collect();
    Ok(Some(DimensionMask { keep }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_mask_drops_constant_dimension() {
        let vectors = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![0.0, 10.0]];
        let mask = compute_mask(&vectors, 0.5).unwrap().unwrap();
        assert_eq!(mask.bits(), &[false, true]);
        assert_eq!(mask.kept(), 1);
        assert_eq!(mask.apply(&[3.0, 4.0]).unwrap(), vec![4.0]);
    }

    #[test]
    fn test_range_equal_to_threshold_is_kept() {
        let vectors = vec![vec![0.0, 0.25], vec![0.5, 0.5]];
        let mask = compute_mask(&vectors, 0.5).unwrap().unwrap();
        assert_eq!(mask.bits(), &[true, false]);
    }

    #[test]
    fn test_empty_input_has_no_mask() {
        assert_eq!(compute_mask(&[], 0.5).unwrap(), None);
    }

    #[test]
    fn test_apply_preserves_order_and_checks_width() {
        let mask = DimensionMask::new(vec![true, false, true, true]);
        assert_eq!(mask.apply(&[1.0, 2.0, 3.0, 4.0]).unwrap(), vec![1.0, 3.0, 4.0]);
        assert_eq!(
            mask.apply(&[1.0]).unwrap_err(),
            MaskError::DimensionMismatch {
                expected: 4,
                got: 1
            }
        );
        assert!(DimensionMask::all(3).is_identity());
    }

    #[test]
    fn test_ragged_vectors_rejected() {
        let err = compute_mask(&[vec![0.0, 1.0], vec![0.0]], 0.1).unwrap_err();
        assert!(matches!(err, MaskError::DimensionMismatch { .. }));
    }
}
