pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

pub fn norm(a: &[f32]) -> f32 {
    dot_product(a, a).sqrt()
}

/// dot(a, b) / (|a| * |b|), or `None` when either side has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    cosine_similarity_with_norm(a, norm(a), b)
}

/// Same as [`cosine_similarity`] with the norm of `a` computed up front, so
/// that scanning many vectors against one query only pays for it once.
pub fn cosine_similarity_with_norm(a: &[f32], a_norm: f32, b: &[f32]) -> Option<f32> {
    let b_norm = norm(b);
    let denom = a_norm * b_norm;
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(dot_product(a, b) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dot_product() {
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, -5.0, 6.0]), 12.0);
        assert_eq!(dot_product(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_zero_magnitude() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), None);
    }

    #[test]
    fn test_cosine_ignores_scale() {
        let s = cosine_similarity(&[2.0, 0.0], &[5.0, 5.0]).unwrap();
        assert!((s - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn cosine_is_bounded(
            a in proptest::collection::vec(-10.0f32..10.0, 8),
            b in proptest::collection::vec(-10.0f32..10.0, 8),
        ) {
            if let Some(s) = cosine_similarity(&a, &b) {
                prop_assert!((-1.0001..=1.0001).contains(&s));
            }
        }
    }
}
