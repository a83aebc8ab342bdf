//! vecfs-server: HTTP control surface for the vecfs HNSW engine.
//!
//! Provides the REST API. Core index logic lives in `vecfs-core`.

/// REST API layer: Axum router, HTTP handlers, models, metrics.
pub mod api;
