//! HTTP request handlers and shared application state.
//!
//! Engine calls block the caller, so inserts, searches and teardown run on the
//! blocking thread pool via `spawn_blocking`.

use crate::api::errors::ApiError;
use crate::api::metrics;
use crate::api::models::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Instant;
use vecfs_core::{Engine, FixedVector, HnswError, IndexStats};

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
}

fn validate_embedding(embedding: &[f32]) -> Result<(), ApiError> {
    if embedding.iter().any(|&v| v.is_nan() || v.is_infinite()) {
        return Err(ApiError::BadRequest("Vector contains NaN or Inf".into()));
    }
    Ok(())
}

/// Count the outcome of an engine call and pass it through.
fn observe<T>(operation: &str, result: Result<T, HnswError>) -> Result<T, ApiError> {
    match result {
        Ok(value) => {
            metrics::record_engine_operation(operation, "ok");
            Ok(value)
        }
        Err(e) => {
            metrics::record_engine_operation(operation, "error");
            tracing::debug!(operation, error = %e, "Engine call failed");
            Err(e.into())
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let node_count = state.engine.get_stats().ok().map(|s| s.node_count);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        initialized: node_count.is_some(),
        node_count,
    })
}

/// `POST /index`
pub async fn init_index(
    State(state): State<AppState>,
    Json(req): Json<InitIndexRequest>,
) -> Result<(StatusCode, Json<InitIndexResponse>), ApiError> {
    let config = req.to_config()?;
    observe("init", state.engine.init_with_config(config.clone()))?;
    Ok((
        StatusCode::CREATED,
        Json(InitIndexResponse {
            message: format!(
                "Index initialized ({} dimensions, {})",
                config.dimensions, config.distance_metric
            ),
            config,
        }),
    ))
}

/// `DELETE /index`
pub async fn cleanup_index(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.cleanup()).await?;
    observe("cleanup", result)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /index/stats`
pub async fn index_stats(State(state): State<AppState>) -> Result<Json<IndexStats>, ApiError> {
    Ok(Json(state.engine.get_stats()?))
}

/// `POST /vectors`
pub async fn insert_vector(
    State(state): State<AppState>,
    Json(req): Json<InsertVectorRequest>,
) -> Result<(StatusCode, Json<InsertVectorResponse>), ApiError> {
    validate_embedding(&req.vector)?;
    let id = req.id;
    let vector = FixedVector::from_f32(&req.vector);
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.insert(id, &vector)).await?;
    observe("insert", result)?;
    Ok((
        StatusCode::CREATED,
        Json(InsertVectorResponse {
            id,
            message: format!("Vector {} inserted", id),
        }),
    ))
}

/// `DELETE /vectors/:id`
pub async fn delete_vector(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    observe("remove", state.engine.remove(id))?;
    tracing::info!(vector_id = id, "Vector removed");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /search`
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    validate_embedding(&req.vector)?;
    let k = req.k;
    let query = FixedVector::from_f32(&req.vector);
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || match req.ef {
        Some(ef) => engine.search_with_ef(&query, k, ef),
        None => engine.search(&query, k),
    })
    .await?;
    let results: Vec<SearchHit> = observe("search", result)?
        .into_iter()
        .map(SearchHit::from)
        .collect();

    let count = results.len();
    metrics::record_search(k, count);
    tracing::info!(k, results = count, "Search completed");
    Ok(Json(SearchResponse { results, count }))
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}
