// Utility functions for style-feed-service

use ndarray::{Array1, ArrayView1};

/// Canonical form used for attribute matching (type, color, brand)
pub fn normalize_attr(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Return a unit-length copy of `vector`, or `None` when it has no direction
pub fn unit_vector(vector: ArrayView1<f32>) -> Option<Array1<f32>> {
    let norm = vector.dot(&vector).sqrt();
    if norm > 0.0 && norm.is_finite() {
        Some(vector.mapv(|x| x / norm))
    } else {
        None
    }
}

/// Cosine similarity between two arbitrary vectors
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(&b) / (norm_a * norm_b)
    }
}

/// Element-wise mean of a set of equally sized vectors
pub fn mean_vector<'a, I>(vectors: I, dim: usize) -> Option<Array1<f32>>
where
    I: IntoIterator<Item = ArrayView1<'a, f32>>,
{
    let mut sum = Array1::<f32>::zeros(dim);
    let mut count = 0usize;
    for vector in vectors {
        sum += &vector;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_attr() {
        assert_eq!(normalize_attr("  Black "), "black");
        assert_eq!(normalize_attr(""), "");
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = array![1.0f32, 0.0];
        let b = array![2.0f32, 0.0];
        let c = array![0.0f32, 1.0];
        assert!((cosine_similarity(a.view(), b.view()) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(a.view(), c.view()), 0.0);
        assert_eq!(cosine_similarity(a.view(), Array1::zeros(2).view()), 0.0);
    }

    #[test]
    fn test_mean_vector() {
        let a = array![1.0f32, 0.0];
        let b = array![0.0f32, 1.0];
        let mean = mean_vector([a.view(), b.view()], 2).unwrap();
        assert_eq!(mean, array![0.5f32, 0.5]);
        assert!(mean_vector(std::iter::empty(), 2).is_none());
    }
}
