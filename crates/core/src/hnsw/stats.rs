//! Index counters and the statistics snapshot exposed by `get_stats`.
//!
//! Counters are lock-free atomics bumped on the hot paths; latencies are kept as
//! exponential moving averages in integer nanoseconds.

use crate::config::LATENCY_EMA_SHIFT;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time view of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub node_count: usize,
    pub max_layer: usize,
    pub entry_point_id: Option<u64>,
    pub total_searches: u64,
    pub total_insertions: u64,
    pub total_deletions: u64,
    pub distance_calculations: u64,
    pub layer_traversals: u64,
    /// Edges dropped because a connection layer was full.
    pub dropped_connections: u64,
    pub avg_search_time_ns: u64,
    pub avg_insert_time_ns: u64,
    /// `layer_population_histogram[l]` counts nodes whose assigned top layer is `l`.
    pub layer_population_histogram: Vec<u64>,
}

/// Exponential moving average over durations, alpha = 2^-LATENCY_EMA_SHIFT.
#[derive(Debug, Default)]
pub struct LatencyEma {
    nanos: AtomicU64,
}

impl LatencyEma {
    pub fn record(&self, elapsed: Duration) {
        let sample = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |avg| {
                Some(if avg == 0 {
                    sample
                } else {
                    avg - (avg >> LATENCY_EMA_SHIFT) + (sample >> LATENCY_EMA_SHIFT)
                })
            });
    }

    pub fn get_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }
}

/// Aggregate counters owned by an index.
#[derive(Debug)]
pub struct IndexCounters {
    pub(crate) total_searches: AtomicU64,
    pub(crate) total_insertions: AtomicU64,
    pub(crate) total_deletions: AtomicU64,
    pub(crate) distance_calculations: AtomicU64,
    pub(crate) layer_traversals: AtomicU64,
    pub(crate) dropped_connections: AtomicU64,
    pub(crate) search_latency: LatencyEma,
    pub(crate) insert_latency: LatencyEma,
    layer_population: Vec<AtomicU64>,
}

impl IndexCounters {
    pub fn new(max_layers: usize) -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            total_insertions: AtomicU64::new(0),
            total_deletions: AtomicU64::new(0),
            distance_calculations: AtomicU64::new(0),
            layer_traversals: AtomicU64::new(0),
            dropped_connections: AtomicU64::new(0),
            search_latency: LatencyEma::default(),
            insert_latency: LatencyEma::default(),
            layer_population: (0..max_layers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self, level: usize, elapsed: Duration) {
        Self::bump(&self.total_insertions);
        if let Some(bucket) = self.layer_population.get(level) {
            Self::bump(bucket);
        }
        self.insert_latency.record(elapsed);
    }

    pub(crate) fn record_search(&self, elapsed: Duration) {
        Self::bump(&self.total_searches);
        self.search_latency.record(elapsed);
    }

    pub fn layer_population(&self) -> Vec<u64> {
        self.layer_population
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Fill the counter fields of a snapshot. Structural fields are supplied by the caller.
    pub(crate) fn snapshot(
        &self,
        node_count: usize,
        max_layer: usize,
        entry_point_id: Option<u64>,
    ) -> IndexStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        IndexStats {
            node_count,
            max_layer,
            entry_point_id,
            total_searches: load(&self.total_searches),
            total_insertions: load(&self.total_insertions),
            total_deletions: load(&self.total_deletions),
            distance_calculations: load(&self.distance_calculations),
            layer_traversals: load(&self.layer_traversals),
            dropped_connections: load(&self.dropped_connections),
            avg_search_time_ns: self.search_latency.get_nanos(),
            avg_insert_time_ns: self.insert_latency.get_nanos(),
            layer_population_histogram: self.layer_population(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_first_sample_then_smoothing() {
        let ema = LatencyEma::default();
        ema.record(Duration::from_nanos(800));
        assert_eq!(ema.get_nanos(), 800);
        ema.record(Duration::from_nanos(1600));
        // 800 - 100 + 200
        assert_eq!(ema.get_nanos(), 900);
    }

    #[test]
    fn test_histogram_ignores_out_of_range_level() {
        let counters = IndexCounters::new(3);
        counters.record_insert(0, Duration::from_nanos(10));
        counters.record_insert(2, Duration::from_nanos(10));
        counters.record_insert(7, Duration::from_nanos(10));
        assert_eq!(counters.layer_population(), vec![1, 0, 1]);
        let stats = counters.snapshot(3, 2, Some(9));
        assert_eq!(stats.total_insertions, 3);
        assert_eq!(stats.entry_point_id, Some(9));
    }

    #[test]
    fn test_stats_serialize_as_json() {
        let counters = IndexCounters::new(2);
        counters.record_search(Duration::from_micros(5));
        let json = serde_json::to_value(counters.snapshot(0, 0, None)).unwrap();
        assert_eq!(json["total_searches"], 1);
        assert_eq!(json["avg_search_time_ns"], 5000);
        assert!(json["entry_point_id"].is_null());
    }
}
