//! Wire types for the repfs RPC surface
//!
//! Protocol results are plain values, never errors: a client branches on the
//! returned code without structured error handling. Transport failures are
//! the only thing surfaced through `Error`.

use serde::{Deserialize, Serialize};

/// Status code returned by `write` and `abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Ack,
    InvalidTransactionId,
    InvalidOperation,
}

/// Outcome of a `commit`.
///
/// `MissingChunks` carries the exact sequence numbers the replica never
/// received; the client resends those and retries the commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    Ack,
    InvalidTransactionId,
    MissingChunks { missing: Vec<u64> },
}

// === Coordinator / replica request bodies ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTxnRequest {
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTxnResponse {
    pub txn_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: OpStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub num_of_msgs: u64,
}

/// Replica-side commit carries the destination name explicitly: replicas
/// keep no transaction table of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaCommitRequest {
    pub num_of_msgs: u64,
    pub file_name: String,
}

// === Client registry bodies ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Absent on first registration; the coordinator mints a token.
    #[serde(default)]
    pub token: Option<String>,
    /// Endpoint the coordinator (or a promoted standby) calls back on.
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterResponse {
    pub unregistered: bool,
}

/// Pushed to every registered client after a standby promotes itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrUpdate {
    pub host: String,
    pub port: u16,
}

// === Standby mirror bodies ===
//
// Each mirror call carries the coordinator's event timestamp: the standby
// logs the coordinator's view of time, not its own.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRead {
    pub file_name: String,
    pub time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorNewTxn {
    pub file_name: String,
    pub txn_id: u64,
    pub time: u64,
}

/// Write events mirror the payload length only, never the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorWrite {
    pub txn_id: u64,
    pub seq_num: u64,
    pub data_len: u64,
    pub time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorCommit {
    pub txn_id: u64,
    pub file_name: String,
    pub time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorAbort {
    pub txn_id: u64,
    pub file_name: String,
    pub time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRegister {
    pub token: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorUnregister {
    pub token: String,
}
