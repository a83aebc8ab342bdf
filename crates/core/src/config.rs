//! Global configuration constants for vecfs.
//!
//! All tuning parameters, input validation limits, and server defaults are defined here.
//! These are compile-time constants; runtime configuration is handled via
//! [`HnswConfig`](crate::hnsw::HnswConfig) and CLI arguments in the server binary.

/// Default number of bidirectional links per HNSW node on layers above 0.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–48. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Default maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Upper bound accepted for `max_layers`.
pub const HNSW_MAX_LAYERS_LIMIT: usize = 64;

/// Default fraction of a full connection layer's capacity that a new edge's rank
/// must fall within to displace the current worst edge.
///
/// 1.0 keeps the closest `capacity` edges ever offered; 0.5 only admits edges
/// that would land in the better half of the list.
pub const HNSW_DEFAULT_PRUNE_THRESHOLD: f32 = 1.0;

/// Absolute maximum number of connections a single layer of a node may hold.
pub const MAX_CONNECTIONS_PER_LAYER: usize = 64;

/// Number of slots a connection layer's buffer grows by when it fills up.
pub const CONNECTION_GROWTH_STEP: usize = 4;

/// Multiplier applied to float components before rounding to fixed point.
pub const FIXED_POINT_SCALE: f32 = 1000.0;

/// Resolution of the fixed-point cosine distance: `1 - cos` is reported in units of `1 / COSINE_SCALE`.
pub const COSINE_SCALE: u64 = 1_000_000;

/// Right shift applied in the latency moving averages (alpha = 1/8).
pub const LATENCY_EMA_SHIFT: u32 = 3;

/// Maximum factor by which search grows ef when tombstones starve the result set.
pub const SEARCH_MAX_EF_GROWTH: usize = 4;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per search request.
pub const MAX_K: usize = 10_000;

/// Upper bound on `ef_construction`, `ef_search` and per-request `ef`.
pub const MAX_EF: usize = 10_000;

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 3030;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Global rate limit in requests per second.
pub const RATE_LIMIT_RPS: u64 = 1000;

/// Maximum HTTP request body size in bytes (10 MB).
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of concurrent in-flight requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;

/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Interval in seconds between refreshes of the index gauges.
pub const METRICS_REFRESH_SECS: u64 = 15;
