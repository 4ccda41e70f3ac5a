//! HTTP surface for the coordinator
//!
//! Thin layer over [`Coordinator`]: handlers translate between wire bodies
//! and the core operations, nothing more. Protocol codes come back with
//! HTTP 200; only transport and validation failures use error statuses.

use crate::common::proto::{
    CommitRequest, NewTxnRequest, NewTxnResponse, RegisterRequest, RegisterResponse,
    StatusResponse, UnregisterRequest, UnregisterResponse,
};
use crate::common::{timestamp_now_millis, CommitOutcome, Error};
use crate::coordinator::server::Coordinator;
use crate::coordinator::state::ClientCallback;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    response::IntoResponse,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted chunk upload.
const CHUNK_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Shared coordinator state for HTTP handlers.
#[derive(Clone)]
pub struct CoordState {
    pub coordinator: Arc<Coordinator>,
}

pub fn create_router(state: CoordState) -> Router {
    Router::new()
        // File reads
        .route("/files/:name", axum::routing::get(read_file))
        // Transaction protocol
        .route("/txn", axum::routing::post(new_txn))
        .route("/txn/:id/chunk/:seq", axum::routing::put(write_chunk))
        .route("/txn/:id/commit", axum::routing::post(commit_txn))
        .route("/txn/:id/abort", axum::routing::post(abort_txn))
        // Client registry
        .route("/clients/register", axum::routing::post(register_client))
        .route("/clients/unregister", axum::routing::post(unregister_client))
        // Liveness probe (heartbeat responder)
        .route("/health/live", axum::routing::get(health_live))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(CHUNK_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn read_file(
    State(state): State<CoordState>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, Error> {
    state.coordinator.read(&name).await
}

async fn new_txn(
    State(state): State<CoordState>,
    Json(req): Json<NewTxnRequest>,
) -> Result<Json<NewTxnResponse>, Error> {
    let txn_id = state.coordinator.new_txn(&req.file_name).await?;
    Ok(Json(NewTxnResponse { txn_id }))
}

async fn write_chunk(
    State(state): State<CoordState>,
    Path((txn_id, seq_num)): Path<(u64, u64)>,
    body: Bytes,
) -> Result<Json<StatusResponse>, Error> {
    let status = state.coordinator.write(txn_id, seq_num, body).await?;
    Ok(Json(StatusResponse { status }))
}

async fn commit_txn(
    State(state): State<CoordState>,
    Path(txn_id): Path<u64>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<CommitOutcome>, Error> {
    let outcome = state.coordinator.commit(txn_id, req.num_of_msgs).await?;
    Ok(Json(outcome))
}

async fn abort_txn(
    State(state): State<CoordState>,
    Path(txn_id): Path<u64>,
) -> Result<Json<StatusResponse>, Error> {
    let status = state.coordinator.abort(txn_id).await?;
    Ok(Json(StatusResponse { status }))
}

async fn register_client(
    State(state): State<CoordState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, Error> {
    let callback = req
        .callback_url
        .map(|endpoint| ClientCallback::Http { endpoint });

    let (registered, token) = state.coordinator.register_client(req.token, callback).await?;
    Ok(Json(RegisterResponse { registered, token }))
}

async fn unregister_client(
    State(state): State<CoordState>,
    Json(req): Json<UnregisterRequest>,
) -> Result<Json<UnregisterResponse>, Error> {
    let unregistered = state.coordinator.unregister_client(&req.token).await?;
    Ok(Json(UnregisterResponse { unregistered }))
}

async fn health_live(State(state): State<CoordState>) -> impl IntoResponse {
    Json(json!({
        "alive": state.coordinator.is_alive(),
        "role": "coordinator",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp_now_millis(),
    }))
}
