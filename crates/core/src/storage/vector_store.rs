//! Vector payload storage consumed by the HNSW index.
//!
//! The graph stores only vector ids; every distance computed during traversal
//! resolves the neighbor's payload through a [`VectorStore`].

use crate::quantization::FixedVector;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Raw vector storage keyed by vector id.
pub trait VectorStore: Send + Sync {
    /// Store a vector, returning the one it replaced.
    fn put(&self, vector_id: u64, vector: Arc<FixedVector>) -> Option<Arc<FixedVector>>;
    fn get(&self, vector_id: u64) -> Option<Arc<FixedVector>>;
    fn remove(&self, vector_id: u64) -> Option<Arc<FixedVector>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&self);
}

/// In-process vector store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    vectors: RwLock<HashMap<u64, Arc<FixedVector>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approximate heap usage of the stored payloads in bytes.
    pub fn estimate_memory_bytes(&self) -> usize {
        let vectors = self.vectors.read();
        vectors
            .values()
            .map(|v| v.dim() * std::mem::size_of::<i32>() + std::mem::size_of::<FixedVector>())
            .sum::<usize>()
            + vectors.capacity() * (std::mem::size_of::<u64>() + std::mem::size_of::<usize>())
    }
}

impl VectorStore for MemoryVectorStore {
    fn put(&self, vector_id: u64, vector: Arc<FixedVector>) -> Option<Arc<FixedVector>> {
        self.vectors.write().insert(vector_id, vector)
    }

    fn get(&self, vector_id: u64) -> Option<Arc<FixedVector>> {
        self.vectors.read().get(&vector_id).cloned()
    }

    fn remove(&self, vector_id: u64) -> Option<Arc<FixedVector>> {
        self.vectors.write().remove(&vector_id)
    }

    fn len(&self) -> usize {
        self.vectors.read().len()
    }

    fn clear(&self) {
        let mut vectors = self.vectors.write();
        vectors.clear();
        vectors.shrink_to_fit();
    }
}
