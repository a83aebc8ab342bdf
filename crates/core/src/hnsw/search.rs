//! HNSW search algorithms: single-layer search and multi-layer KNN.
//!
//! Tombstoned nodes are still used for navigation but excluded from results.
//! Every distance is recomputed from the vector store; edge distances stored in
//! connection layers are only used for pruning.

use crate::config::{MAX_EF, MAX_K, SEARCH_MAX_EF_GROWTH};
use crate::error::{HnswError, Result};
use crate::hnsw::candidates::CandidateList;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::stats::IndexCounters;
use crate::hnsw::visited::VisitedSet;
use crate::quantization::FixedVector;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A single nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub vector_id: u64,
    pub distance: u64,
    /// `u64::MAX - distance`; higher is more similar.
    pub score: u64,
}

impl SearchResult {
    pub fn new(vector_id: u64, distance: u64) -> Self {
        Self {
            vector_id,
            distance,
            score: u64::MAX - distance,
        }
    }
}

/// Search a single layer of the HNSW graph.
///
/// Seeds the result list with `entry_points` (id, distance) and expands the
/// closest unvisited candidate until every candidate in the list has been
/// expanded. Neighbors that are not (yet) registered are skipped.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &FixedVector,
    entry_points: &[(u64, u64)],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> CandidateList {
    visited.clear();
    let mut results = CandidateList::with_capacity(ef.max(1));
    for &(id, distance) in entry_points {
        if visited.insert(id) {
            results.add(id, distance);
        }
    }

    while let Some(current) = results.next_unvisited() {
        let Some(node) = index.node(current.node_id) else {
            continue;
        };
        IndexCounters::bump(&index.counters.layer_traversals);
        // Copied under the node lock, which is released before any distance work
        let neighbors = node.neighbors(layer);
        for neighbor_id in neighbors {
            if !visited.insert(neighbor_id) || !index.contains(neighbor_id) {
                continue;
            }
            if let Some(distance) = index.distance_to(query, neighbor_id) {
                results.add(neighbor_id, distance);
            }
        }
    }

    results
}

impl HnswIndex {
    /// K-nearest-neighbor search with the configured `ef_search`.
    pub fn search(&self, query: &FixedVector, k: usize) -> Result<Vec<SearchResult>> {
        self.search_with_ef(query, k, self.config.ef_search)
    }

    /// K-nearest-neighbor search with an explicit layer-0 candidate list size.
    ///
    /// The effective ef is `max(ef, k)`. When tombstones leave fewer than `k` live
    /// results, ef is doubled (up to `SEARCH_MAX_EF_GROWTH`x, bounded by node count)
    /// and layer 0 is searched again.
    pub fn search_with_ef(
        &self,
        query: &FixedVector,
        k: usize,
        ef: usize,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 || k > MAX_K {
            return Err(HnswError::InvalidArgument(format!(
                "k must be 1-{}, got {}",
                MAX_K, k
            )));
        }
        if ef > MAX_EF {
            return Err(HnswError::InvalidArgument(format!(
                "ef must be at most {}, got {}",
                MAX_EF, ef
            )));
        }
        self.check_dimension(query)?;

        // Counted before the released check: `release` either waits for this
        // search or the search sees the flag
        let _guard = self.searches.enter();
        let start = Instant::now();
        let results = self.knn(query, k, ef)?;
        self.counters.record_search(start.elapsed());
        Ok(results)
    }

    fn knn(&self, query: &FixedVector, k: usize, ef: usize) -> Result<Vec<SearchResult>> {
        let (entry_point, max_layer, node_count) = {
            let s = self.structure.read();
            if s.released {
                return Err(HnswError::NotInitialized);
            }
            (s.entry_point, s.max_layer, s.nodes.len())
        };
        let Some(entry_point) = entry_point else {
            return Ok(Vec::new());
        };
        let Some(entry_distance) = self.distance_to(query, entry_point) else {
            return Ok(Vec::new());
        };

        let mut ef = ef.max(k);
        let ef_limit = ef.saturating_mul(SEARCH_MAX_EF_GROWTH).min(node_count.max(ef));
        let mut visited = VisitedSet::with_capacity(ef.saturating_mul(4).min(node_count));

        // Greedy descent through the upper layers
        let mut current = (entry_point, entry_distance);
        for layer in (1..=max_layer).rev() {
            let nearest = search_layer(self, query, &[current], 1, layer, &mut visited);
            if let Some(best) = nearest.best() {
                current = (best.node_id, best.distance);
            }
        }

        loop {
            let candidates = search_layer(self, query, &[current], ef, 0, &mut visited);
            let live: Vec<SearchResult> = candidates
                .iter()
                .filter(|c| self.is_live(c.node_id))
                .take(k)
                .map(|c| SearchResult::new(c.node_id, c.distance))
                .collect();

            if live.len() >= k || ef >= ef_limit {
                return Ok(live);
            }
            tracing::trace!(
                found = live.len(),
                k,
                ef,
                "Too few live results, widening layer-0 search"
            );
            ef = ef.saturating_mul(2).min(ef_limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::{DistanceMetric, HnswConfig};
    use crate::storage::MemoryVectorStore;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn fv(values: &[f32]) -> FixedVector {
        FixedVector::from_f32(values)
    }

    fn build(dim: usize, n: u64, seed: u64) -> (HnswIndex, Vec<FixedVector>) {
        let config = HnswConfig::new(dim, DistanceMetric::Euclidean).with_seed(seed);
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut vectors = Vec::new();
        for id in 0..n {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let v = fv(&v);
            index.insert(id, v.clone()).unwrap();
            vectors.push(v);
        }
        (index, vectors)
    }

    #[test]
    fn test_small_euclidean_top2() {
        let config = HnswConfig::new(4, DistanceMetric::Euclidean);
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        index.insert(1, fv(&[0.0, 0.0, 0.0, 0.0])).unwrap();
        index.insert(2, fv(&[1.0, 0.0, 0.0, 0.0])).unwrap();
        index.insert(3, fv(&[10.0, 10.0, 10.0, 10.0])).unwrap();

        let results = index.search(&fv(&[0.0, 0.0, 0.0, 0.0]), 2).unwrap();
        assert_eq!(
            results,
            vec![SearchResult::new(1, 0), SearchResult::new(2, 1_000_000)]
        );
        assert_eq!(results[0].score, u64::MAX);
    }

    #[test]
    fn test_empty_index_returns_no_results() {
        let config = HnswConfig::new(3, DistanceMetric::Cosine);
        let index = HnswIndex::new(config, Arc::new(MemoryVectorStore::new())).unwrap();
        let results = index.search(&fv(&[1.0, 2.0, 3.0]), 5).unwrap();
        assert!(results.is_empty());
        assert_eq!(index.stats().total_searches, 1);
    }

    #[test]
    fn test_invalid_queries() {
        let (index, _) = build(4, 10, 1);
        let q = fv(&[0.0; 4]);
        assert!(matches!(index.search(&q, 0), Err(HnswError::InvalidArgument(_))));
        assert!(matches!(
            index.search(&q, MAX_K + 1),
            Err(HnswError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.search(&fv(&[0.0; 3]), 1),
            Err(HnswError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.search(&FixedVector::from_raw(vec![]), 1),
            Err(HnswError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_oversized_ef_rejected() {
        let (index, vectors) = build(4, 10, 1);
        assert!(matches!(
            index.search_with_ef(&vectors[0], 1, usize::MAX / 2),
            Err(HnswError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.search_with_ef(&vectors[0], 1, MAX_EF + 1),
            Err(HnswError::InvalidArgument(_))
        ));
        let results = index.search_with_ef(&vectors[0], 1, MAX_EF).unwrap();
        assert_eq!(results[0].distance, 0);
        assert_eq!(index.active_searches(), 0);
    }

    #[test]
    fn test_search_after_release_fails() {
        let (index, vectors) = build(4, 30, 4);
        assert_eq!(index.release(), 30);
        assert!(index.is_released());
        assert_eq!(index.search(&vectors[0], 3), Err(HnswError::NotInitialized));
        assert_eq!(index.active_searches(), 0);
    }

    #[test]
    fn test_release_waits_for_running_search() {
        let (index, vectors) = build(4, 30, 6);
        let index = Arc::new(index);
        let guard = index.searches.enter();
        let releaser = {
            let index = Arc::clone(&index);
            std::thread::spawn(move || index.release())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!releaser.is_finished());
        // The running search still sees every node
        assert_eq!(index.len(), 30);
        drop(guard);
        assert_eq!(releaser.join().unwrap(), 30);
        assert_eq!(index.search(&vectors[0], 1), Err(HnswError::NotInitialized));
    }

    #[test]
    fn test_self_recall() {
        let (index, vectors) = build(8, 300, 7);
        for (id, v) in vectors.iter().enumerate() {
            let results = index.search(v, 1).unwrap();
            assert_eq!(results[0].distance, 0, "vector {id} not found at distance 0");
        }
    }

    #[test]
    fn test_results_sorted_and_bounded_by_k() {
        let (index, vectors) = build(8, 200, 3);
        let results = index.search(&vectors[0], 10).unwrap();
        assert_eq!(results.len(), 10);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let few = index.search(&vectors[0], 500).unwrap();
        assert_eq!(few.len(), 200);
    }

    #[test]
    fn test_tombstoned_vectors_excluded() {
        let (index, vectors) = build(4, 50, 11);
        index.remove(0).unwrap();
        let results = index.search(&vectors[0], 5).unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.vector_id != 0));
        assert_eq!(index.remove(0), Err(HnswError::VectorNotFound(0)));
        assert_eq!(index.stats().total_deletions, 1);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_tombstones_trigger_ef_growth() {
        let (index, vectors) = build(4, 40, 5);
        for id in 0..30 {
            index.remove(id).unwrap();
        }
        // ef = k = 10 would mostly land on tombstones; growth must still fill k
        let results = index.search_with_ef(&vectors[0], 10, 10).unwrap();
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.vector_id >= 30));
    }

    #[test]
    fn test_counters_advance() {
        let (index, vectors) = build(4, 50, 9);
        let before = index.stats();
        index.search(&vectors[3], 3).unwrap();
        let after = index.stats();
        assert_eq!(after.total_searches, before.total_searches + 1);
        assert!(after.distance_calculations > before.distance_calculations);
        assert!(after.layer_traversals > before.layer_traversals);
        assert!(after.avg_search_time_ns > 0);
        assert_eq!(index.active_searches(), 0);
    }

    #[test]
    fn test_search_layer_skips_unregistered_neighbors() {
        let (index, vectors) = build(4, 20, 2);
        // An edge to an id that never got registered, as left behind by a failed insert
        let ep = index.entry_point().unwrap();
        let _ = index.node(ep).unwrap().add_connection(0, 9_999, 0, 64);
        let mut visited = VisitedSet::default();
        let ep_dist = index.distance_to(&vectors[0], ep).unwrap();
        let found = search_layer(&index, &vectors[0], &[(ep, ep_dist)], 50, 0, &mut visited);
        assert!(!found.contains(9_999));
        assert!(found.len() > 1);
    }
}
