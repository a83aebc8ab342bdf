//! Prometheus metrics recording and background collection.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use vecfs_core::Engine;

/// Records HTTP request metrics.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Records an engine operation and whether it succeeded.
pub fn record_engine_operation(operation: &str, outcome: &str) {
    counter!(
        "vecfs_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Records the size of a search response.
pub fn record_search(k: u32, returned: usize) {
    histogram!("vecfs_search_k").record(k as f64);
    histogram!("vecfs_search_results").record(returned as f64);
}

/// Updates index-level Prometheus gauges from the engine's stats snapshot.
pub fn update_index_metrics(engine: &Engine) {
    let Ok(stats) = engine.get_stats() else {
        gauge!("vecfs_index_initialized").set(0.0);
        return;
    };
    gauge!("vecfs_index_initialized").set(1.0);
    gauge!("vecfs_index_nodes").set(stats.node_count as f64);
    gauge!("vecfs_index_max_layer").set(stats.max_layer as f64);
    gauge!("vecfs_index_searches_total").set(stats.total_searches as f64);
    gauge!("vecfs_index_insertions_total").set(stats.total_insertions as f64);
    gauge!("vecfs_index_deletions_total").set(stats.total_deletions as f64);
    gauge!("vecfs_index_distance_calculations_total").set(stats.distance_calculations as f64);
    gauge!("vecfs_index_dropped_connections_total").set(stats.dropped_connections as f64);
    gauge!("vecfs_index_avg_search_seconds").set(stats.avg_search_time_ns as f64 / 1e9);
    gauge!("vecfs_index_avg_insert_seconds").set(stats.avg_insert_time_ns as f64 / 1e9);
    for (layer, count) in stats.layer_population_histogram.iter().enumerate() {
        let labels = [("layer", layer.to_string())];
        gauge!("vecfs_index_layer_population", &labels).set(*count as f64);
    }
}
