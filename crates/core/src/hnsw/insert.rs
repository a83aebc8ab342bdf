//! HNSW insertion algorithm.
//!
//! Inserts a vector into the HNSW graph with bidirectional connections. The new
//! node is linked while still invisible to readers, then registered in one step
//! under the structural lock.

use crate::error::{HnswError, Result};
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::node::GraphNode;
use crate::hnsw::search::search_layer;
use crate::hnsw::stats::IndexCounters;
use crate::hnsw::visited::VisitedSet;
use crate::quantization::FixedVector;
use std::sync::Arc;
use std::time::Instant;

impl HnswIndex {
    /// Insert a vector under `vector_id`.
    ///
    /// Fails with `DuplicateVector` if the id is registered or concurrently being
    /// inserted. On any error no node is registered and no payload is left behind.
    pub fn insert(&self, vector_id: u64, vector: FixedVector) -> Result<()> {
        self.check_dimension(&vector)?;
        let start = Instant::now();

        let level = self.levels.next_level();
        let node = Arc::new(GraphNode::new(
            vector_id,
            level,
            self.config.m,
            self.config.m_max0,
        )?);
        let vector = Arc::new(vector);

        // Reserve the id, or register directly as the first node
        let (entry_point, max_layer) = {
            let mut s = self.structure.write();
            if s.released {
                return Err(HnswError::NotInitialized);
            }
            if s.nodes.contains_key(&vector_id) || s.pending.contains(&vector_id) {
                return Err(HnswError::DuplicateVector(vector_id));
            }
            let current = s.entry_point;
            match current {
                None => {
                    s.nodes
                        .try_reserve(1)
                        .map_err(|_| HnswError::OutOfMemory("node registry"))?;
                    self.store.put(vector_id, Arc::clone(&vector));
                    s.nodes.insert(vector_id, node);
                    s.entry_point = Some(vector_id);
                    s.max_layer = level;
                    drop(s);
                    self.counters.record_insert(level, start.elapsed());
                    tracing::debug!(vector_id, level, "Inserted first node as entry point");
                    return Ok(());
                }
                Some(ep) => {
                    s.pending
                        .try_reserve(1)
                        .map_err(|_| HnswError::OutOfMemory("insert reservation"))?;
                    s.pending.insert(vector_id);
                    (ep, s.max_layer)
                }
            }
        };

        self.connect(&node, &vector, entry_point, max_layer);

        self.store.put(vector_id, Arc::clone(&vector));
        if let Err(err) = self.register(node, level) {
            self.structure.write().pending.remove(&vector_id);
            self.store.remove(vector_id);
            return Err(err);
        }
        self.counters.record_insert(level, start.elapsed());
        Ok(())
    }

    /// Link `node` into every layer it occupies, descending from `entry_point`.
    fn connect(&self, node: &GraphNode, vector: &FixedVector, entry_point: u64, max_layer: usize) {
        let Some(entry_distance) = self.distance_to(vector, entry_point) else {
            return;
        };
        let level = node.level();
        let hint = self.config.ef_construction.saturating_mul(4).min(self.len());
        let mut visited = VisitedSet::with_capacity(hint);
        let mut entry_points = vec![(entry_point, entry_distance)];

        // Phase 1: greedy descent above the node's level
        for layer in (level + 1..=max_layer).rev() {
            let nearest = search_layer(self, vector, &entry_points, 1, layer, &mut visited);
            if let Some(best) = nearest.best() {
                entry_points = vec![(best.node_id, best.distance)];
            }
        }

        // Phase 2: connect at each shared layer, closest first
        for layer in (0..=level.min(max_layer)).rev() {
            let candidates = search_layer(
                self,
                vector,
                &entry_points,
                self.config.ef_construction,
                layer,
                &mut visited,
            );
            let capacity = self.config.layer_capacity(layer);
            let rank_limit = self.config.rank_limit(layer);

            let mut linked = 0;
            for candidate in candidates.iter() {
                if linked == capacity {
                    break;
                }
                if candidate.node_id == node.vector_id() {
                    continue;
                }
                let Some(neighbor) = self.node(candidate.node_id) else {
                    continue;
                };
                if neighbor.is_deleted() {
                    continue;
                }
                self.link(node, layer, candidate.node_id, candidate.distance, rank_limit);
                self.link(&neighbor, layer, node.vector_id(), candidate.distance, rank_limit);
                linked += 1;
            }

            entry_points = candidates
                .iter()
                .map(|c| (c.node_id, c.distance))
                .collect();
        }
    }

    /// Add one directed edge, counting it if the layer had no room.
    fn link(&self, from: &GraphNode, layer: usize, to: u64, distance: u64, rank_limit: usize) {
        if let Err(err) = from.add_connection(layer, to, distance, rank_limit) {
            IndexCounters::bump(&self.counters.dropped_connections);
            tracing::trace!(from = from.vector_id(), to, distance, %err, "Dropped connection");
        }
    }

    /// Make a fully linked node visible, promoting it to entry point if it reaches the top.
    fn register(&self, node: Arc<GraphNode>, level: usize) -> Result<()> {
        let vector_id = node.vector_id();
        let mut s = self.structure.write();
        if s.released {
            return Err(HnswError::NotInitialized);
        }
        s.nodes
            .try_reserve(1)
            .map_err(|_| HnswError::OutOfMemory("node registry"))?;
        s.pending.remove(&vector_id);
        s.nodes.insert(vector_id, node);
        if level >= s.max_layer {
            if level > s.max_layer {
                tracing::debug!(vector_id, level, previous = s.max_layer, "Promoted entry point");
            }
            s.entry_point = Some(vector_id);
            s.max_layer = level;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::HnswError;
    use crate::hnsw::{DistanceMetric, HnswConfig, HnswIndex};
    use crate::quantization::FixedVector;
    use crate::storage::{MemoryVectorStore, VectorStore};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn fv(values: &[f32]) -> FixedVector {
        FixedVector::from_f32(values)
    }

    #[test]
    fn test_first_insert_becomes_entry_point() {
        let store = Arc::new(MemoryVectorStore::new());
        let index = HnswIndex::new(HnswConfig::new(2, DistanceMetric::Euclidean), store.clone())
            .unwrap();
        index.insert(42, fv(&[1.0, 1.0])).unwrap();
        assert_eq!(index.entry_point(), Some(42));
        assert_eq!(index.len(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(index.max_layer(), index.node_layer_count(42).unwrap() - 1);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_duplicate_rejected() {
        let index = HnswIndex::new(
            HnswConfig::new(2, DistanceMetric::Euclidean),
            Arc::new(MemoryVectorStore::new()),
        )
        .unwrap();
        index.insert(1, fv(&[0.0, 0.0])).unwrap();
        index.insert(2, fv(&[1.0, 0.0])).unwrap();
        assert_eq!(
            index.insert(2, fv(&[5.0, 5.0])),
            Err(HnswError::DuplicateVector(2))
        );
        assert_eq!(index.len(), 2);
        // Stored payload is untouched
        let hit = index.search(&fv(&[1.0, 0.0]), 1).unwrap();
        assert_eq!((hit[0].vector_id, hit[0].distance), (2, 0));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let store = Arc::new(MemoryVectorStore::new());
        let index =
            HnswIndex::new(HnswConfig::new(3, DistanceMetric::Cosine), store.clone()).unwrap();
        assert!(matches!(
            index.insert(1, fv(&[1.0, 2.0])),
            Err(HnswError::InvalidArgument(_))
        ));
        assert!(index.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_edges_are_bidirectional_after_small_build() {
        let index = HnswIndex::new(
            HnswConfig::new(2, DistanceMetric::Euclidean),
            Arc::new(MemoryVectorStore::new()),
        )
        .unwrap();
        for id in 0..10u64 {
            index.insert(id, fv(&[id as f32, 0.0])).unwrap();
        }
        // Ten nodes never fill a 32-slot layer 0, so every edge is reciprocated
        for id in 0..10u64 {
            for edge in index.connections(id, 0).unwrap() {
                let back = index.connections(edge.neighbor_id, 0).unwrap();
                assert!(back.iter().any(|c| c.neighbor_id == id));
            }
            assert_eq!(index.connections(id, 0).unwrap().len(), 9);
        }
        assert_eq!(index.stats().dropped_connections, 0);
    }

    #[test]
    fn test_capacity_holds_closest_offered() {
        let config = HnswConfig::new(2, DistanceMetric::Euclidean)
            .with_m(2)
            .with_seed(17);
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        let points: [[f32; 2]; 5] = [
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [0.05, 0.05],
        ];
        for (id, p) in points.iter().enumerate() {
            index.insert(id as u64, fv(p)).unwrap();
        }

        for id in 0..points.len() as u64 {
            let edges = index.connections(id, 0).unwrap();
            assert!(edges.len() <= 4, "node {id} holds {} edges", edges.len());
            assert!(edges.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
        // Every node saw the other four, and four fit: the full neighborhood is kept
        for id in 0..points.len() as u64 {
            assert_eq!(index.connections(id, 0).unwrap().len(), 4);
        }
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_full_layer_keeps_closest_edges() {
        let config = HnswConfig::new(1, DistanceMetric::Euclidean)
            .with_m(2)
            .with_seed(3);
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        // A line of points: node 0 is offered ten neighbors but keeps four
        for id in 0..10u64 {
            index.insert(id, fv(&[id as f32])).unwrap();
        }
        let edges = index.connections(0, 0).unwrap();
        assert_eq!(edges.len(), 4);
        let worst_kept = edges.last().unwrap().distance;
        // Nothing closer than the kept worst was dropped from node 0's view
        for id in 1..10u64 {
            let d = (id as u64 * 1000).pow(2);
            if d < worst_kept {
                assert!(edges.iter().any(|c| c.neighbor_id == id));
            }
        }
        assert!(index.stats().dropped_connections > 0);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_entry_point_tracks_max_layer() {
        let config = HnswConfig::new(4, DistanceMetric::Euclidean)
            .with_m(2)
            .with_seed(99);
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        for id in 0..500u64 {
            let v: Vec<f32> = (0..4).map(|_| rng.gen_range(-5.0..5.0)).collect();
            index.insert(id, fv(&v)).unwrap();
            let ep = index.entry_point().unwrap();
            assert_eq!(index.node_layer_count(ep).unwrap() - 1, index.max_layer());
        }
        assert!(index.max_layer() > 0);
        let stats = index.stats();
        assert_eq!(stats.total_insertions, 500);
        assert_eq!(stats.layer_population_histogram.iter().sum::<u64>(), 500);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_inserted_layer_histogram_decays_by_one_over_m() {
        let config = HnswConfig {
            ef_construction: 16,
            ..HnswConfig::new(1, DistanceMetric::Euclidean)
                .with_m(4)
                .with_seed(7)
        };
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        let n = 10_000u64;
        for id in 0..n {
            index.insert(id, fv(&[id as f32])).unwrap();
        }

        let histogram = index.stats().layer_population_histogram;
        assert_eq!(histogram.iter().sum::<u64>(), n);
        let p0 = histogram[0] as f64 / n as f64;
        assert!((p0 - 0.75).abs() < 0.02, "p0 = {p0}");
        for l in 1..3 {
            let ratio = histogram[l] as f64 / histogram[l - 1] as f64;
            assert!((ratio - 0.25).abs() < 0.06, "layer {l} ratio = {ratio}");
        }
    }

    #[test]
    fn test_insert_after_release_rejected() {
        let index = HnswIndex::new(
            HnswConfig::new(2, DistanceMetric::Euclidean),
            Arc::new(MemoryVectorStore::new()),
        )
        .unwrap();
        index.insert(1, fv(&[1.0, 1.0])).unwrap();
        assert_eq!(index.release(), 1);
        assert_eq!(index.insert(2, fv(&[2.0, 2.0])), Err(HnswError::NotInitialized));
        assert!(index.is_empty());
    }

    #[test]
    fn test_tombstoned_nodes_not_linked_to_new_nodes() {
        let index = HnswIndex::new(
            HnswConfig::new(1, DistanceMetric::Euclidean),
            Arc::new(MemoryVectorStore::new()),
        )
        .unwrap();
        for id in 0..5u64 {
            index.insert(id, fv(&[id as f32])).unwrap();
        }
        index.remove(2).unwrap();
        index.insert(10, fv(&[2.1])).unwrap();
        let edges = index.connections(10, 0).unwrap();
        assert!(!edges.iter().any(|c| c.neighbor_id == 2));
        assert!(!edges.is_empty());
    }
}
