//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! The graph stores vector ids only; payloads are resolved through a
//! [`VectorStore`](crate::storage::VectorStore) for every distance computed.
//! Nodes live in an owning registry keyed by vector id, and each node guards its
//! own connection layers, so inserts and searches can run from many threads.

/// Bounded, sorted candidate list used by layer searches.
pub mod candidates;
/// Distance metrics: euclidean, cosine, dot product, and manhattan.
pub mod distance;
/// HNSW graph structure, configuration, and layer assignment.
pub mod graph;
/// HNSW insertion algorithm with bidirectional connections and capacity-bounded pruning.
pub mod insert;
/// Graph nodes and their per-layer connection lists.
pub mod node;
/// HNSW search: single-layer search and multi-layer KNN.
pub mod search;
/// Counters, latency averages, and the stats snapshot.
pub mod stats;
/// Visited set for graph traversal.
pub mod visited;

pub use candidates::{Candidate, CandidateList};
pub use distance::{distance_by_code, DistanceMetric};
pub use graph::{HnswConfig, HnswIndex, LevelGenerator};
pub use node::{Connection, ConnectionLayer, GraphNode};
pub use search::SearchResult;
pub use stats::IndexStats;
