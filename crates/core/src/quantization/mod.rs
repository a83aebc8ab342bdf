//! Fixed-point quantization for the index core.
//!
//! Float components are scaled by [`FIXED_POINT_SCALE`](crate::config::FIXED_POINT_SCALE)
//! and rounded to `i32`, so every distance computed inside the HNSW graph is pure
//! integer arithmetic. Includes the integer distance kernels used by
//! [`DistanceMetric`](crate::hnsw::DistanceMetric).

/// Fixed-point vector type and integer distance kernels.
pub mod fixed;

pub use fixed::FixedVector;
