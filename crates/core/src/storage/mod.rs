//! Storage layer: the vector payload store and the engine facade over the index.
//!
//! The index keeps only ids. Raw fixed-point vectors live in a [`VectorStore`],
//! and an [`Engine`] ties one store to at most one live index at a time.

/// Engine facade: init, insert, search, stats, remove, and cleanup.
pub mod engine;
/// Vector payload storage keyed by vector id.
pub mod vector_store;

pub use engine::Engine;
pub use vector_store::{MemoryVectorStore, VectorStore};
