pub mod distance;
pub mod types;

pub use distance::*;
pub use types::*;

/// Scales `vector` to unit length. Returns `None` for a zero-magnitude
/// vector, which has no direction to preserve.
pub fn normalize(vector: &[f32]) -> Option<Vec<f32>> {
    let norm = norm(vector);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(vector.iter().map(|x| x / norm).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let unit = normalize(&[3.0, 4.0]).unwrap();
        assert!((unit[0] - 0.6).abs() < 1e-6);
        assert!((unit[1] - 0.8).abs() < 1e-6);
        assert!(normalize(&[0.0, 0.0]).is_none());
    }
}
