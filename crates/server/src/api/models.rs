//! Request and response data transfer objects for the REST API.
//!
//! All types derive `Serialize` and/or `Deserialize` for JSON marshalling via Axum.

use crate::api::errors::ApiError;
use serde::{Deserialize, Serialize};
use vecfs_core::hnsw::{DistanceMetric, HnswConfig, SearchResult};

/// Request body for `POST /index`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitIndexRequest {
    pub dimensions: usize,
    pub distance_metric: Option<String>,
    pub m: Option<usize>,
    pub ef_construction: Option<usize>,
    pub ef_search: Option<usize>,
    pub max_layers: Option<usize>,
    pub seed: Option<u64>,
}

impl InitIndexRequest {
    /// Resolve the request against the default tuning. Range checks are left to
    /// `HnswConfig::validate` inside the engine.
    pub fn to_config(&self) -> Result<HnswConfig, ApiError> {
        let metric = match &self.distance_metric {
            Some(name) => name.parse::<DistanceMetric>().map_err(ApiError::BadRequest)?,
            None => DistanceMetric::Euclidean,
        };
        let mut config = HnswConfig::new(self.dimensions, metric);
        if let Some(m) = self.m {
            config = config.with_m(m);
        }
        if let Some(ef) = self.ef_construction {
            config.ef_construction = ef;
        }
        if let Some(ef) = self.ef_search {
            config.ef_search = ef;
        }
        if let Some(layers) = self.max_layers {
            config.max_layers = layers;
        }
        config.seed = self.seed;
        Ok(config)
    }
}

/// Response body for `POST /index`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InitIndexResponse {
    pub message: String,
    pub config: HnswConfig,
}

/// Request body for `POST /vectors`.
#[derive(Debug, Deserialize)]
pub struct InsertVectorRequest {
    pub id: u64,
    pub vector: Vec<f32>,
}

/// Response body for `POST /vectors`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertVectorResponse {
    pub id: u64,
    pub message: String,
}

/// Request body for `POST /search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    #[serde(default = "default_k")]
    pub k: u32,
    /// Per-request override of the index's `ef_search`.
    pub ef: Option<usize>,
}

fn default_k() -> u32 {
    10
}

/// One hit in a search response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub distance: u64,
    pub score: u64,
}

impl From<SearchResult> for SearchHit {
    fn from(r: SearchResult) -> Self {
        Self {
            id: r.vector_id,
            distance: r.distance,
            score: r.score,
        }
    }
}

/// Response body for `POST /search`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub count: usize,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub initialized: bool,
    pub node_count: Option<usize>,
}
