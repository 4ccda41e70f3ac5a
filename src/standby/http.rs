//! HTTP mirror surface for the standby
//!
//! Each route appends the mirrored event; none of them validates business
//! rules, since the coordinator already did.

use crate::common::proto::{
    MirrorAbort, MirrorCommit, MirrorNewTxn, MirrorRead, MirrorRegister, MirrorUnregister,
    MirrorWrite,
};
use crate::common::timestamp_now_millis;
use crate::coordinator::state::ClientCallback;
use crate::standby::Standby;
use axum::{extract::State, response::IntoResponse, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct StandbyState {
    pub standby: Arc<Standby>,
}

pub fn create_router(state: StandbyState) -> Router {
    Router::new()
        .route("/mirror/read", axum::routing::post(mirror_read))
        .route("/mirror/new-txn", axum::routing::post(mirror_new_txn))
        .route("/mirror/write", axum::routing::post(mirror_write))
        .route("/mirror/commit", axum::routing::post(mirror_commit))
        .route("/mirror/abort", axum::routing::post(mirror_abort))
        .route("/mirror/register", axum::routing::post(mirror_register))
        .route("/mirror/unregister", axum::routing::post(mirror_unregister))
        .route("/health/live", axum::routing::get(health_live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn mirror_read(State(state): State<StandbyState>, Json(req): Json<MirrorRead>) {
    state.standby.mirror_read(&req.file_name, req.time);
}

async fn mirror_new_txn(State(state): State<StandbyState>, Json(req): Json<MirrorNewTxn>) {
    state
        .standby
        .mirror_new_txn(&req.file_name, req.txn_id, req.time);
}

async fn mirror_write(State(state): State<StandbyState>, Json(req): Json<MirrorWrite>) {
    state
        .standby
        .mirror_write(req.txn_id, req.seq_num, req.data_len, req.time);
}

async fn mirror_commit(State(state): State<StandbyState>, Json(req): Json<MirrorCommit>) {
    state
        .standby
        .mirror_commit(req.txn_id, &req.file_name, req.time);
}

async fn mirror_abort(State(state): State<StandbyState>, Json(req): Json<MirrorAbort>) {
    state
        .standby
        .mirror_abort(req.txn_id, &req.file_name, req.time);
}

async fn mirror_register(State(state): State<StandbyState>, Json(req): Json<MirrorRegister>) {
    match req.callback_url {
        Some(endpoint) => state
            .standby
            .mirror_register(req.token, ClientCallback::Http { endpoint }),
        None => tracing::warn!(
            "mirrored registration of {} carries no callback; dropped",
            req.token
        ),
    }
}

async fn mirror_unregister(State(state): State<StandbyState>, Json(req): Json<MirrorUnregister>) {
    state.standby.mirror_unregister(&req.token);
}

async fn health_live() -> impl IntoResponse {
    Json(json!({
        "alive": true,
        "role": "standby",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp_now_millis(),
    }))
}
