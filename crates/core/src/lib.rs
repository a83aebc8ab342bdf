//! # vecfs-core
//!
//! Concurrent in-memory HNSW approximate nearest neighbor engine for the
//! vector-database filesystem. Vectors are stored as fixed-point integers and
//! every distance is computed without floating point.
//!
//! This is the core library crate with zero async dependencies. The HTTP control
//! surface lives in `vecfs-server`.

/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Error types shared by the index and the engine facade.
pub mod error;
/// HNSW approximate nearest neighbor index: graph structure, search, insertion, and distance metrics.
pub mod hnsw;
/// Fixed-point vectors: f32 inputs scaled by 1000 and stored as i32 components.
pub mod quantization;
/// Storage layer: vector payload store and the engine facade.
pub mod storage;

pub use error::{HnswError, Result};
pub use hnsw::{DistanceMetric, HnswConfig, HnswIndex, IndexStats, SearchResult};
pub use quantization::FixedVector;
pub use storage::{Engine, MemoryVectorStore, VectorStore};
