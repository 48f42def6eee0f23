//! Distance/similarity kernels for vector comparison.
//!
//! All kernels operate on equal-length `f32` slices. Callers (the HNSW
//! index and the query engine) are responsible for dimension checks —
//! these functions assume `a.len() == b.len()`.

use serde::{Deserialize, Serialize};

/// The distance metric used by a vector index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// `1 - cosine_similarity`. Default metric (§4.1).
    Cosine,
    /// Straight-line (L2) distance.
    Euclidean,
    /// Sum of absolute differences (L1) distance.
    Manhattan,
    /// Negative dot product, for pre-normalized vectors.
    Dot,
}

impl Metric {
    /// Computes the distance between `a` and `b` under this metric.
    ///
    /// Lower is always more similar, including for [`Metric::Dot`] (which
    /// negates the raw dot product so it composes with the rest of the
    /// index as a distance rather than a similarity).
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_distance(a, b),
            Self::Euclidean => euclidean_distance(a, b),
            Self::Manhattan => manhattan_distance(a, b),
            Self::Dot => -dot_product(a, b),
        }
    }
}

/// Cosine distance: `1 - (a·b) / (|a| |b|)`.
///
/// Ranges `[0, 2]` for arbitrary vectors; `0` means identical direction.
/// Zero vectors are treated as maximally distant from everything
/// (including each other) to avoid a division by zero.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    let cosine_similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - cosine_similarity
}

/// Euclidean (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Manhattan (L1) distance.
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Dot product of two vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn magnitude(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let a = [1.0, 2.0, 3.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_maximally_distant() {
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        assert_eq!(cosine_distance(&a, &b), 2.0);
    }

    #[test]
    fn test_euclidean_identical_vectors() {
        let a = [1.0, 2.0, 3.0];
        assert_eq!(euclidean_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_euclidean_known_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_manhattan_known_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_eq!(manhattan_distance(&a, &b), 7.0);
    }

    #[test]
    fn test_dot_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(dot_product(&a, &b), 32.0);
    }

    #[test]
    fn test_metric_dot_negates_for_distance_semantics() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        assert_eq!(Metric::Dot.distance(&a, &b), -1.0);
    }
}
