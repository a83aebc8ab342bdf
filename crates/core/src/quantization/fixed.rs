//! Fixed-point vector implementation.
//!
//! Each f32 component is multiplied by [`FIXED_POINT_SCALE`] and rounded to the
//! nearest `i32` (saturating; NaN maps to 0). Kernels accumulate in `u128`/`i128`
//! in fixed-size chunks so a 4096-dimensional vector of saturated components
//! cannot overflow, and the compiler can still vectorize the inner loop.

use crate::config::FIXED_POINT_SCALE;
use serde::{Deserialize, Serialize};

/// A vector of scaled integer components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedVector {
    components: Vec<i32>,
}

impl FixedVector {
    /// Scale and round a float vector into fixed point.
    pub fn from_f32(values: &[f32]) -> Self {
        Self {
            components: values
                .iter()
                .map(|&v| (v * FIXED_POINT_SCALE).round() as i32)
                .collect(),
        }
    }

    /// Wrap components that are already in fixed-point units.
    pub fn from_raw(components: Vec<i32>) -> Self {
        Self { components }
    }

    /// Convert back to floats. Lossy below 1 / `FIXED_POINT_SCALE`.
    pub fn to_f32(&self) -> Vec<f32> {
        self.components
            .iter()
            .map(|&c| c as f32 / FIXED_POINT_SCALE)
            .collect()
    }

    /// Returns the dimensionality of the vector.
    pub fn dim(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.components
    }

    /// Sum of squared components.
    pub fn norm_sq(&self) -> u128 {
        squared_norm(&self.components)
    }
}

impl From<Vec<i32>> for FixedVector {
    fn from(components: Vec<i32>) -> Self {
        Self::from_raw(components)
    }
}

/// Chunk size for the kernels. A chunk of 16 squared i32 differences
/// (each < 2^66) fits comfortably in a u128 partial sum.
const CHUNK: usize = 16;

/// Sum of squared differences.
pub fn squared_l2(a: &[i32], b: &[i32]) -> u128 {
    debug_assert_eq!(a.len(), b.len());
    let mut total = 0u128;
    let mut ca = a.chunks_exact(CHUNK);
    let mut cb = b.chunks_exact(CHUNK);
    for (xa, xb) in (&mut ca).zip(&mut cb) {
        let mut partial = 0u128;
        for j in 0..CHUNK {
            let d = (xa[j] as i64 - xb[j] as i64).unsigned_abs() as u128;
            partial += d * d;
        }
        total = total.saturating_add(partial);
    }
    for (&x, &y) in ca.remainder().iter().zip(cb.remainder()) {
        let d = (x as i64 - y as i64).unsigned_abs() as u128;
        total = total.saturating_add(d * d);
    }
    total
}

/// Sum of absolute differences.
pub fn l1(a: &[i32], b: &[i32]) -> u128 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as i64 - y as i64).unsigned_abs() as u128)
        .sum()
}

/// Signed inner product.
pub fn dot(a: &[i32], b: &[i32]) -> i128 {
    debug_assert_eq!(a.len(), b.len());
    let mut total = 0i128;
    let mut ca = a.chunks_exact(CHUNK);
    let mut cb = b.chunks_exact(CHUNK);
    for (xa, xb) in (&mut ca).zip(&mut cb) {
        let mut partial = 0i128;
        for j in 0..CHUNK {
            partial += xa[j] as i64 as i128 * xb[j] as i64 as i128;
        }
        total += partial;
    }
    for (&x, &y) in ca.remainder().iter().zip(cb.remainder()) {
        total += x as i128 * y as i128;
    }
    total
}

/// Sum of squared components.
pub fn squared_norm(a: &[i32]) -> u128 {
    a.iter()
        .map(|&x| {
            let m = x.unsigned_abs() as u128;
            m * m
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_scales_and_rounds() {
        let v = FixedVector::from_f32(&[1.0, -0.5, 0.0004, 0.0006]);
        assert_eq!(v.as_slice(), &[1000, -500, 0, 1]);
        assert_eq!(v.dim(), 4);
    }

    #[test]
    fn test_from_f32_saturates_and_zeroes_nan() {
        let v = FixedVector::from_f32(&[f32::MAX, f32::MIN, f32::NAN]);
        assert_eq!(v.as_slice(), &[i32::MAX, i32::MIN, 0]);
    }

    #[test]
    fn test_to_f32_roundtrip_within_resolution() {
        let raw = [0.123, -4.5, 10.0];
        let back = FixedVector::from_f32(&raw).to_f32();
        for (a, b) in raw.iter().zip(&back) {
            assert!((a - b).abs() <= 0.0005, "{a} vs {b}");
        }
    }

    #[test]
    fn test_kernels_small() {
        let a = [1000, 0, 0, 0];
        let b = [0, 2000, 0, 0];
        assert_eq!(squared_l2(&a, &b), 5_000_000);
        assert_eq!(l1(&a, &b), 3000);
        assert_eq!(dot(&a, &b), 0);
        assert_eq!(squared_norm(&b), 4_000_000);
    }

    #[test]
    fn test_kernels_chunked_match_naive() {
        let a: Vec<i32> = (0..37).map(|i| i * 31 - 500).collect();
        let b: Vec<i32> = (0..37).map(|i| 700 - i * 17).collect();
        let naive_l2: u128 = a
            .iter()
            .zip(&b)
            .map(|(&x, &y)| ((x - y) as i128 * (x - y) as i128) as u128)
            .sum();
        let naive_dot: i128 = a.iter().zip(&b).map(|(&x, &y)| x as i128 * y as i128).sum();
        assert_eq!(squared_l2(&a, &b), naive_l2);
        assert_eq!(dot(&a, &b), naive_dot);
    }

    #[test]
    fn test_extreme_components_do_not_overflow() {
        let a = vec![i32::MAX; 4096];
        let b = vec![i32::MIN; 4096];
        assert!(squared_l2(&a, &b) > u64::MAX as u128);
        assert!(dot(&a, &b) < 0);
    }
}
