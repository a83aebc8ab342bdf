//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search, distance metric).
//! [`HnswIndex`] owns the node registry, the entry point and the maximum layer behind a
//! coarse structural lock, and delegates neighbor-list mutation to per-node locks.

use crate::config;
use crate::error::{HnswError, Result};
use crate::hnsw::distance::DistanceMetric;
use crate::hnsw::node::{Connection, GraphNode};
use crate::hnsw::stats::{IndexCounters, IndexStats};
use crate::quantization::FixedVector;
use crate::storage::VectorStore;
use parking_lot::{Condvar, Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and memory usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Dimensionality every inserted and queried vector must have.
    pub dimensions: usize,
    /// Distance function for similarity computation.
    pub distance_metric: DistanceMetric,
    /// Number of links per node on layers above 0.
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Fraction of a full layer's capacity a new edge's rank must fall within to be kept.
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f32,
    /// Seed for layer assignment. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_prune_threshold() -> f32 {
    config::HNSW_DEFAULT_PRUNE_THRESHOLD
}

impl HnswConfig {
    /// Default tuning (M=16, ef_c=200, ef_s=50) for the given dimension and metric.
    pub fn new(dimensions: usize, distance_metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            distance_metric,
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            prune_threshold: config::HNSW_DEFAULT_PRUNE_THRESHOLD,
            seed: None,
        }
    }

    /// Set `m` and derive `m_max0 = 2 * m`.
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self.m_max0 = m * 2;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject parameter combinations the graph cannot honor.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(HnswError::InvalidArgument(msg));
        if self.dimensions == 0 || self.dimensions > config::MAX_DIMENSION {
            return invalid(format!(
                "dimensions must be 1-{}, got {}",
                config::MAX_DIMENSION,
                self.dimensions
            ));
        }
        if self.m < 2 || self.m > config::MAX_CONNECTIONS_PER_LAYER {
            return invalid(format!(
                "m must be 2-{}, got {}",
                config::MAX_CONNECTIONS_PER_LAYER,
                self.m
            ));
        }
        if self.m_max0 < self.m || self.m_max0 > config::MAX_CONNECTIONS_PER_LAYER {
            return invalid(format!(
                "m_max0 must be {}-{}, got {}",
                self.m,
                config::MAX_CONNECTIONS_PER_LAYER,
                self.m_max0
            ));
        }
        if self.ef_construction == 0 || self.ef_construction > config::MAX_EF {
            return invalid(format!(
                "ef_construction must be 1-{}, got {}",
                config::MAX_EF,
                self.ef_construction
            ));
        }
        if self.ef_search == 0 || self.ef_search > config::MAX_EF {
            return invalid(format!(
                "ef_search must be 1-{}, got {}",
                config::MAX_EF,
                self.ef_search
            ));
        }
        if self.max_layers == 0 || self.max_layers > config::HNSW_MAX_LAYERS_LIMIT {
            return invalid(format!(
                "max_layers must be 1-{}, got {}",
                config::HNSW_MAX_LAYERS_LIMIT,
                self.max_layers
            ));
        }
        if !(self.prune_threshold > 0.0 && self.prune_threshold <= 1.0) {
            return invalid(format!(
                "prune_threshold must be in (0, 1], got {}",
                self.prune_threshold
            ));
        }
        Ok(())
    }

    /// Maximum connections a node keeps at `layer`.
    #[inline]
    pub fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Rank below which a new edge may displace the worst edge of a full layer.
    pub fn rank_limit(&self, layer: usize) -> usize {
        let capacity = self.layer_capacity(layer);
        ((capacity as f32 * self.prune_threshold).ceil() as usize).clamp(1, capacity)
    }
}

/// Draws node levels from a geometric distribution with ratio `1/m`.
///
/// Each level is a run of biased coin flips: a uniform `u32` below `u32::MAX / m`
/// promotes the node one layer. `P(level >= l) = m^-l`, the `mL = 1/ln(m)`
/// exponential law, without floating point.
#[derive(Debug)]
pub struct LevelGenerator {
    promote_below: u32,
    max_level: usize,
    rng: Mutex<StdRng>,
}

impl LevelGenerator {
    pub fn new(m: usize, max_layers: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            promote_below: (u32::MAX as u64 / m.max(2) as u64) as u32,
            max_level: max_layers.saturating_sub(1),
            rng: Mutex::new(rng),
        }
    }

    pub fn next_level(&self) -> usize {
        let mut rng = self.rng.lock();
        let mut level = 0;
        while level < self.max_level && rng.gen::<u32>() < self.promote_below {
            level += 1;
        }
        level
    }
}

/// Counts in-flight searches so teardown can wait for them to drain.
#[derive(Debug, Default)]
pub(crate) struct SearchGate {
    active: Mutex<usize>,
    drained: Condvar,
}

/// RAII registration of one in-flight search.
pub(crate) struct SearchGuard<'a> {
    gate: &'a SearchGate,
}

impl SearchGate {
    pub(crate) fn enter(&self) -> SearchGuard<'_> {
        *self.active.lock() += 1;
        SearchGuard { gate: self }
    }

    pub(crate) fn active(&self) -> usize {
        *self.active.lock()
    }

    pub(crate) fn wait_idle(&self) {
        let mut active = self.active.lock();
        while *active > 0 {
            self.drained.wait(&mut active);
        }
    }
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.gate.active.lock();
        *active -= 1;
        if *active == 0 {
            self.gate.drained.notify_all();
        }
    }
}

/// State guarded by the structural lock.
#[derive(Debug, Default)]
pub(crate) struct GraphStructure {
    pub(crate) nodes: HashMap<u64, Arc<GraphNode>>,
    /// Ids claimed by inserts that have not registered their node yet.
    pub(crate) pending: HashSet<u64>,
    pub(crate) entry_point: Option<u64>,
    pub(crate) max_layer: usize,
    /// Set by `release`; a released index rejects every later search and insert.
    pub(crate) released: bool,
}

/// Concurrent HNSW index over vector ids.
///
/// Searches and inserts may run in parallel from any number of threads. The
/// structural lock is only held for registry bookkeeping, never across a layer search.
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) structure: RwLock<GraphStructure>,
    pub(crate) levels: LevelGenerator,
    pub(crate) counters: IndexCounters,
    pub(crate) searches: SearchGate,
}

impl fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let structure = self.structure.read();
        f.debug_struct("HnswIndex")
            .field("config", &self.config)
            .field("node_count", &structure.nodes.len())
            .field("entry_point", &structure.entry_point)
            .field("max_layer", &structure.max_layer)
            .finish_non_exhaustive()
    }
}

impl HnswIndex {
    /// Creates a new empty HNSW index resolving vector payloads through `store`.
    pub fn new(config: HnswConfig, store: Arc<dyn VectorStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            levels: LevelGenerator::new(config.m, config.max_layers, config.seed),
            counters: IndexCounters::new(config.max_layers),
            config,
            store,
            structure: RwLock::new(GraphStructure::default()),
            searches: SearchGate::default(),
        })
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimensions
    }

    /// Returns the number of registered nodes, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.structure.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry_point(&self) -> Option<u64> {
        self.structure.read().entry_point
    }

    pub fn max_layer(&self) -> usize {
        self.structure.read().max_layer
    }

    pub fn contains(&self, vector_id: u64) -> bool {
        self.structure.read().nodes.contains_key(&vector_id)
    }

    /// Number of layers the node occupies, if registered.
    pub fn node_layer_count(&self, vector_id: u64) -> Option<usize> {
        self.node(vector_id).map(|n| n.layer_count())
    }

    /// Copy of the node's edges at `layer`, if registered.
    pub fn connections(&self, vector_id: u64, layer: usize) -> Option<Vec<Connection>> {
        self.node(vector_id).map(|n| n.connections(layer))
    }

    /// Ids of every registered node.
    pub fn vector_ids(&self) -> Vec<u64> {
        self.structure.read().nodes.keys().copied().collect()
    }

    /// Registry lookup. Holds the structural lock only for the map access.
    #[inline]
    pub(crate) fn node(&self, vector_id: u64) -> Option<Arc<GraphNode>> {
        self.structure.read().nodes.get(&vector_id).cloned()
    }

    /// Fresh distance from `query` to a stored vector, or `None` if the store lacks it.
    #[inline]
    pub(crate) fn distance_to(&self, query: &FixedVector, vector_id: u64) -> Option<u64> {
        let stored = self.store.get(vector_id)?;
        IndexCounters::bump(&self.counters.distance_calculations);
        Some(self.config.distance_metric.distance(query, &stored))
    }

    pub(crate) fn check_dimension(&self, vector: &FixedVector) -> Result<()> {
        if vector.is_empty() {
            return Err(HnswError::InvalidArgument("vector is empty".into()));
        }
        if vector.dim() != self.config.dimensions {
            return Err(HnswError::InvalidArgument(format!(
                "expected dimension {}, got {}",
                self.config.dimensions,
                vector.dim()
            )));
        }
        Ok(())
    }

    /// Tombstone a vector. It keeps routing traversals but is never returned by search.
    pub fn remove(&self, vector_id: u64) -> Result<()> {
        let node = self
            .node(vector_id)
            .ok_or(HnswError::VectorNotFound(vector_id))?;
        if !node.mark_deleted() {
            return Err(HnswError::VectorNotFound(vector_id));
        }
        IndexCounters::bump(&self.counters.total_deletions);
        tracing::debug!(vector_id, "Tombstoned vector");
        Ok(())
    }

    /// Returns `true` if the vector is registered and not tombstoned.
    pub fn is_live(&self, vector_id: u64) -> bool {
        self.node(vector_id).is_some_and(|n| !n.is_deleted())
    }

    /// Number of searches currently running.
    pub fn active_searches(&self) -> usize {
        self.searches.active()
    }

    /// Block until every in-flight search has finished.
    pub fn wait_for_searches(&self) {
        self.searches.wait_idle();
    }

    /// Drop every node and reset the entry point. Returns how many nodes were released.
    ///
    /// Marks the index released first, then waits for searches already past that
    /// check. Later searches and inserts fail with `NotInitialized`.
    pub fn release(&self) -> usize {
        self.structure.write().released = true;
        self.wait_for_searches();
        let mut structure = self.structure.write();
        let released = structure.nodes.len();
        structure.nodes = HashMap::new();
        structure.pending.clear();
        structure.entry_point = None;
        structure.max_layer = 0;
        released
    }

    pub fn is_released(&self) -> bool {
        self.structure.read().released
    }

    pub fn stats(&self) -> IndexStats {
        let (node_count, max_layer, entry_point) = {
            let s = self.structure.read();
            (s.nodes.len(), s.max_layer, s.entry_point)
        };
        self.counters.snapshot(node_count, max_layer, entry_point)
    }

    /// Validate structural invariants.
    ///
    /// Checks the entry point against the maximum layer, every node's layer table and
    /// per-layer capacity, ordering and uniqueness, and that no node exceeds `max_layer`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let (nodes, entry_point, max_layer) = {
            let s = self.structure.read();
            if let Some(ep) = s.entry_point {
                let ep_node = s
                    .nodes
                    .get(&ep)
                    .ok_or_else(|| format!("entry point {} is not registered", ep))?;
                if ep_node.level() != s.max_layer {
                    return Err(format!(
                        "entry point {} has level {}, max_layer is {}",
                        ep,
                        ep_node.level(),
                        s.max_layer
                    ));
                }
            } else if !s.nodes.is_empty() {
                return Err(format!("{} nodes but no entry point", s.nodes.len()));
            }
            let nodes: Vec<Arc<GraphNode>> = s.nodes.values().cloned().collect();
            (nodes, s.entry_point, s.max_layer)
        };

        for node in &nodes {
            if node.level() > max_layer {
                return Err(format!(
                    "node {} has level {} above max_layer {} (entry point {:?})",
                    node.vector_id(),
                    node.level(),
                    max_layer,
                    entry_point
                ));
            }
            if node.layer_count() > self.config.max_layers {
                return Err(format!(
                    "node {} occupies {} layers, limit {}",
                    node.vector_id(),
                    node.layer_count(),
                    self.config.max_layers
                ));
            }
            node.check_layers()?;
            for layer in 0..node.layer_count() {
                let count = node.connections(layer).len();
                if count > self.config.layer_capacity(layer) {
                    return Err(format!(
                        "node {} layer {} holds {} connections, capacity {}",
                        node.vector_id(),
                        layer,
                        count,
                        self.config.layer_capacity(layer)
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryVectorStore;

    fn index(config: HnswConfig) -> HnswIndex {
        HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let cfg = HnswConfig::new(128, DistanceMetric::Cosine);
        assert_eq!(cfg.m, 16);
        assert_eq!(cfg.m_max0, 32);
        assert_eq!(cfg.layer_capacity(0), 32);
        assert_eq!(cfg.layer_capacity(3), 16);
        assert_eq!(cfg.rank_limit(0), 32);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let base = HnswConfig::new(4, DistanceMetric::Euclidean);
        assert!(HnswConfig { dimensions: 0, ..base.clone() }.validate().is_err());
        assert!(base.clone().with_m(1).validate().is_err());
        assert!(base.clone().with_m(33).validate().is_err());
        assert!(base.clone().with_m(32).validate().is_ok());
        assert!(HnswConfig { m_max0: 8, ..base.clone().with_m(16) }.validate().is_err());
        assert!(HnswConfig { ef_search: 0, ..base.clone() }.validate().is_err());
        assert!(HnswConfig { ef_search: config::MAX_EF, ..base.clone() }.validate().is_ok());
        assert!(HnswConfig { ef_search: config::MAX_EF + 1, ..base.clone() }.validate().is_err());
        assert!(HnswConfig { ef_construction: usize::MAX / 2, ..base.clone() }.validate().is_err());
        assert!(HnswConfig { max_layers: 0, ..base.clone() }.validate().is_err());
        assert!(HnswConfig { prune_threshold: 0.0, ..base.clone() }.validate().is_err());
        assert!(HnswConfig { prune_threshold: 1.5, ..base }.validate().is_err());
    }

    #[test]
    fn test_rank_limit_fraction() {
        let cfg = HnswConfig {
            prune_threshold: 0.5,
            ..HnswConfig::new(4, DistanceMetric::Euclidean).with_m(5)
        };
        assert_eq!(cfg.rank_limit(0), 5);
        assert_eq!(cfg.rank_limit(1), 3);
    }

    #[test]
    fn test_config_serde_defaults_optional_fields() {
        let json = r#"{
            "dimensions": 8, "distance_metric": "cosine", "m": 8, "m_max0": 16,
            "ef_construction": 100, "ef_search": 40, "max_layers": 8
        }"#;
        let cfg: HnswConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.distance_metric, DistanceMetric::Cosine);
        assert_eq!(cfg.prune_threshold, 1.0);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn test_level_generator_geometric_decay() {
        let m = 4;
        let gen = LevelGenerator::new(m, 16, Some(42));
        let draws = 20_000;
        let mut histogram = [0usize; 16];
        for _ in 0..draws {
            histogram[gen.next_level()] += 1;
        }
        // P(level = 0) = 1 - 1/m
        let p0 = histogram[0] as f64 / draws as f64;
        assert!((p0 - 0.75).abs() < 0.02, "p0 = {p0}");
        // Successive layers shrink by roughly 1/m
        for l in 1..3 {
            let ratio = histogram[l] as f64 / histogram[l - 1] as f64;
            assert!((ratio - 0.25).abs() < 0.06, "layer {l} ratio = {ratio}");
        }
    }

    #[test]
    fn test_level_generator_respects_cap() {
        // m = 2 promotes half of the time; a cap of 3 layers means level <= 2
        let gen = LevelGenerator::new(2, 3, Some(1));
        assert!((0..5000).all(|_| gen.next_level() <= 2));
        let single = LevelGenerator::new(2, 1, Some(1));
        assert!((0..100).all(|_| single.next_level() == 0));
    }

    #[test]
    fn test_level_generator_seed_is_reproducible() {
        let a = LevelGenerator::new(8, 16, Some(9));
        let b = LevelGenerator::new(8, 16, Some(9));
        let la: Vec<usize> = (0..500).map(|_| a.next_level()).collect();
        let lb: Vec<usize> = (0..500).map(|_| b.next_level()).collect();
        assert_eq!(la, lb);
    }

    #[test]
    fn test_search_gate_drains() {
        let gate = Arc::new(SearchGate::default());
        let guard = gate.enter();
        assert_eq!(gate.active(), 1);
        let waiter = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || gate.wait_idle())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.join().unwrap();
        assert_eq!(gate.active(), 0);
    }

    #[test]
    fn test_empty_index_state() {
        let idx = index(HnswConfig::new(4, DistanceMetric::Euclidean));
        assert!(idx.is_empty());
        assert_eq!(idx.entry_point(), None);
        assert!(idx.validate().is_ok());
        assert_eq!(idx.stats().node_count, 0);
        assert_eq!(idx.remove(3), Err(HnswError::VectorNotFound(3)));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let cfg = HnswConfig::new(0, DistanceMetric::Euclidean);
        assert!(matches!(
            HnswIndex::new(cfg, Arc::new(MemoryVectorStore::new())),
            Err(HnswError::InvalidArgument(_))
        ));
    }
}
