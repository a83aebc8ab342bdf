//! Distance metric implementations for HNSW search.
//!
//! Supports four distance functions over fixed-point vectors: euclidean (squared L2),
//! manhattan (L1), dot product (inverted), and cosine. Every metric returns a `u64`
//! where **lower is better**, and none of them touch floating point.

use crate::config::COSINE_SCALE;
use crate::quantization::fixed;
use crate::quantization::FixedVector;
use std::fmt;
use std::str::FromStr;

/// Distance metric used for vector similarity computation.
///
/// The discriminants are the stable numeric codes used by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum DistanceMetric {
    /// Squared Euclidean distance in scaled units. Range: \[0, u64::MAX\].
    Euclidean = 0,
    /// `1 - cosine_similarity` in units of `1 / COSINE_SCALE`. Range: \[0, 2 * COSINE_SCALE\].
    Cosine = 1,
    /// `u64::MAX - dot(a, b)`, saturating. Lower = higher similarity.
    DotProduct = 2,
    /// Sum of absolute differences in scaled units.
    Manhattan = 3,
}

impl DistanceMetric {
    /// Look up a metric by its numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(DistanceMetric::Euclidean),
            1 => Some(DistanceMetric::Cosine),
            2 => Some(DistanceMetric::DotProduct),
            3 => Some(DistanceMetric::Manhattan),
            _ => None,
        }
    }

    /// The numeric code of this metric.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Compute the distance between two vectors of equal dimension.
    pub fn distance(self, a: &FixedVector, b: &FixedVector) -> u64 {
        let (a, b) = (a.as_slice(), b.as_slice());
        match self {
            DistanceMetric::Euclidean => saturate(fixed::squared_l2(a, b)),
            DistanceMetric::Manhattan => saturate(fixed::l1(a, b)),
            DistanceMetric::DotProduct => inverted_dot(fixed::dot(a, b)),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Manhattan => "manhattan",
        };
        f.write_str(name)
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" | "dot_product" | "dotproduct" => Ok(DistanceMetric::DotProduct),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            other => Err(format!("unknown distance metric '{other}'")),
        }
    }
}

/// Distance under a metric given by numeric code. Unknown codes yield `u64::MAX`.
pub fn distance_by_code(code: u32, a: &FixedVector, b: &FixedVector) -> u64 {
    DistanceMetric::from_code(code).map_or(u64::MAX, |metric| metric.distance(a, b))
}

#[inline]
fn saturate(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// `u64::MAX - dot`, clamped into `[0, u64::MAX]`.
#[inline]
fn inverted_dot(dot: i128) -> u64 {
    let inverted = u64::MAX as i128 - dot;
    inverted.clamp(0, u64::MAX as i128) as u64
}

fn cosine_distance(a: &[i32], b: &[i32]) -> u64 {
    let norm_a = fixed::squared_norm(a);
    let norm_b = fixed::squared_norm(b);
    if norm_a == 0 || norm_b == 0 {
        return COSINE_SCALE;
    }
    // isqrt of the product is exact to one unit; fall back to per-norm roots when it overflows
    let denom = match norm_a.checked_mul(norm_b) {
        Some(product) => product.isqrt(),
        None => norm_a.isqrt() * norm_b.isqrt(),
    };
    if denom == 0 {
        return COSINE_SCALE;
    }
    let scale = COSINE_SCALE as i128;
    let dot = fixed::dot(a, b);
    let cos_scaled = match dot.checked_mul(scale) {
        Some(num) => num / denom as i128,
        None => dot / (denom as i128 / scale).max(1),
    }
    .clamp(-scale, scale);
    (scale - cos_scaled) as u64
}
