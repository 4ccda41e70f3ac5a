//! HTTP surface for a replica store
//!
//! The replica is driven entirely by the coordinator's fan-out calls. It
//! keeps no transaction table and no client registry; registration verbs
//! answer with an unsupported-role error.

use crate::common::proto::{ReplicaCommitRequest, StatusResponse};
use crate::common::{timestamp_now_millis, CommitOutcome, Error};
use crate::replica::ReplicaStore;
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

const CHUNK_BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct ReplicaState {
    pub store: Arc<ReplicaStore>,
    pub replica_id: String,
}

pub fn create_router(state: ReplicaState) -> Router {
    Router::new()
        .route("/files/:name", axum::routing::get(read_file))
        .route("/txn/:id/chunk/:seq", axum::routing::put(write_chunk))
        .route("/txn/:id/commit", axum::routing::post(commit_txn))
        .route("/txn/:id/abort", axum::routing::post(abort_txn))
        // the replica role has no client registry
        .route("/clients/register", axum::routing::post(unsupported))
        .route("/clients/unregister", axum::routing::post(unsupported))
        .route("/health/live", axum::routing::get(health_live))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(CHUNK_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn read_file(
    State(state): State<ReplicaState>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, Error> {
    state.store.read(&name)
}

async fn write_chunk(
    State(state): State<ReplicaState>,
    Path((txn_id, seq_num)): Path<(u64, u64)>,
    body: Bytes,
) -> Result<Json<StatusResponse>, Error> {
    let status = state.store.write_chunk(txn_id, seq_num, &body)?;
    Ok(Json(StatusResponse { status }))
}

async fn commit_txn(
    State(state): State<ReplicaState>,
    Path(txn_id): Path<u64>,
    Json(req): Json<ReplicaCommitRequest>,
) -> Result<Json<CommitOutcome>, Error> {
    let outcome = state.store.commit(txn_id, req.num_of_msgs, &req.file_name)?;
    Ok(Json(outcome))
}

async fn abort_txn(
    State(state): State<ReplicaState>,
    Path(txn_id): Path<u64>,
) -> Result<Json<StatusResponse>, Error> {
    let status = state.store.abort(txn_id)?;
    Ok(Json(StatusResponse { status }))
}

async fn unsupported() -> Error {
    Error::Unsupported("replica stores keep no client registry".into())
}

async fn health_live(State(state): State<ReplicaState>) -> impl IntoResponse {
    Json(json!({
        "alive": true,
        "role": "replica",
        "replica_id": state.replica_id,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp_now_millis(),
    }))
}
