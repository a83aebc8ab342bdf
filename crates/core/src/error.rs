//! Error types for the HNSW engine.

/// Errors surfaced by index and engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HnswError {
    /// `init` was called on an engine that already holds a live index.
    #[error("index is already initialized")]
    AlreadyInitialized,
    /// An operation was attempted before `init`.
    #[error("index is not initialized")]
    NotInitialized,
    /// A caller-supplied argument is unusable (empty vector, wrong dimension, zero k, bad config).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A node, layer, or registry allocation failed.
    #[error("out of memory while allocating {0}")]
    OutOfMemory(&'static str),
    /// The vector id is already registered or being inserted.
    #[error("vector {0} is already indexed")]
    DuplicateVector(u64),
    /// The vector id is not registered in the index.
    #[error("vector {0} not found")]
    VectorNotFound(u64),
}

/// A connection could not be stored because its layer is full (or does not exist on the node).
///
/// Non-fatal: the edge is dropped and the caller continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection layer {layer} is out of capacity")]
pub struct OutOfCapacity {
    pub layer: usize,
}

pub type Result<T> = std::result::Result<T, HnswError>;
