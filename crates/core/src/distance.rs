//! Distance metrics for vector similarity.
//!
//! Both metrics return a value where **lower is better**: squared euclidean
//! distance, and negated inner product (so a larger dot product sorts first).

use serde::{Deserialize, Serialize};

/// Distance metric used by an ANN index instance.
///
/// Fixed at instance creation; serialized with the index snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared euclidean distance (L2²). Range: \[0, ∞).
    L2,
    /// Negated dot product: `-dot(a, b)`. Lower = more similar.
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal length.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => euclidean_sq(a, b),
            DistanceMetric::InnerProduct => -dot_product(a, b),
        }
    }
}

#[inline]
fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}
