//! Engine facade: the control surface over a single HNSW index.
//!
//! An [`Engine`] starts uninitialized. `init` builds the index, `cleanup` tears
//! it down again (waiting for in-flight searches) and a later `init` may start
//! over. Cloning the handle is cheap; all clones share one index.

use crate::error::{HnswError, Result};
use crate::hnsw::{DistanceMetric, HnswConfig, HnswIndex, IndexStats, SearchResult};
use crate::quantization::FixedVector;
use crate::storage::vector_store::{MemoryVectorStore, VectorStore};
use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-safe handle to the vector index and its payload store.
#[derive(Clone)]
pub struct Engine {
    index: Arc<RwLock<Option<Arc<HnswIndex>>>>,
    store: Arc<dyn VectorStore>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("index", &*self.index.read())
            .field("stored_vectors", &self.store.len())
            .finish()
    }
}

impl Engine {
    /// Creates an uninitialized engine backed by an in-memory vector store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryVectorStore::new()))
    }

    /// Creates an uninitialized engine over a caller-supplied vector store.
    pub fn with_store(store: Arc<dyn VectorStore>) -> Self {
        Self {
            index: Arc::new(RwLock::new(None)),
            store,
        }
    }

    /// Build an index with default tuning for `dimensions` and `metric`.
    pub fn init(&self, dimensions: u32, metric: DistanceMetric) -> Result<()> {
        self.init_with_config(HnswConfig::new(dimensions as usize, metric))
    }

    pub fn init_with_config(&self, config: HnswConfig) -> Result<()> {
        let mut slot = self.index.write();
        if slot.is_some() {
            return Err(HnswError::AlreadyInitialized);
        }
        let index = HnswIndex::new(config, Arc::clone(&self.store))?;
        tracing::info!(
            dimensions = index.config().dimensions,
            metric = %index.config().distance_metric,
            m = index.config().m,
            ef_construction = index.config().ef_construction,
            ef_search = index.config().ef_search,
            max_layers = index.config().max_layers,
            "Initialized HNSW index"
        );
        *slot = Some(Arc::new(index));
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.index.read().is_some()
    }

    fn current(&self) -> Result<Arc<HnswIndex>> {
        self.index
            .read()
            .as_ref()
            .cloned()
            .ok_or(HnswError::NotInitialized)
    }

    /// Configuration of the live index.
    pub fn config(&self) -> Result<HnswConfig> {
        Ok(self.current()?.config().clone())
    }

    /// Insert a vector. Holds the engine slot for the whole insert so `cleanup`
    /// cannot clear the store underneath it.
    pub fn insert(&self, vector_id: u64, vector: &FixedVector) -> Result<()> {
        let slot = self.index.read();
        let index = slot.as_ref().ok_or(HnswError::NotInitialized)?;
        index.insert(vector_id, vector.clone())
    }

    /// Search with the index's configured `ef_search`. Returns at most `k` results.
    pub fn search(&self, query: &FixedVector, k: u32) -> Result<Vec<SearchResult>> {
        let slot = self.index.read();
        let index = slot.as_ref().ok_or(HnswError::NotInitialized)?;
        index.search(query, k as usize)
    }

    /// Search with an explicit ef. Holds the engine slot like `insert`, so
    /// `cleanup` waits for the search to finish.
    pub fn search_with_ef(
        &self,
        query: &FixedVector,
        k: u32,
        ef: usize,
    ) -> Result<Vec<SearchResult>> {
        let slot = self.index.read();
        let index = slot.as_ref().ok_or(HnswError::NotInitialized)?;
        index.search_with_ef(query, k as usize, ef)
    }

    /// Tombstone a vector so it no longer appears in search results.
    pub fn remove(&self, vector_id: u64) -> Result<()> {
        self.current()?.remove(vector_id)
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        Ok(self.current()?.stats())
    }

    /// Tear the index down: detach it, wait for running searches, release every
    /// node and clear the vector store.
    pub fn cleanup(&self) -> Result<()> {
        let index = self.index.write().take().ok_or(HnswError::NotInitialized)?;
        let released = index.release();
        self.store.clear();
        tracing::info!(released, "Released HNSW index");
        Ok(())
    }
}
