//! Transaction and client tables
//!
//! Both tables are owned by their server (coordinator or standby) behind a
//! mutex; nothing shares a table across processes. The standby keeps its own
//! independent copies so that after promotion it is self-sufficient.

use crate::common::proto::AddrUpdate;
use crate::common::{timestamp_now_millis, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Transaction lifecycle. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnState {
    Started,
    Committed,
    Aborted,
}

impl TxnState {
    /// Numeric code used in log lines (matches the on-disk log format).
    pub fn code(self) -> u8 {
        match self {
            TxnState::Committed => 10,
            TxnState::Started => 20,
            TxnState::Aborted => 30,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub file_name: String,
    pub state: TxnState,
    pub last_edited_at: u64,
}

impl Transaction {
    pub fn new(id: u64, file_name: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            state: TxnState::Started,
            last_edited_at: timestamp_now_millis(),
        }
    }
}

/// Mutex-owned table of live transactions plus the id allocator.
#[derive(Default)]
pub struct TxnTable {
    inner: Mutex<HashMap<u64, Transaction>>,
    last_issued: Mutex<u64>,
}

impl TxnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table from mirrored state (standby promotion path).
    pub fn from_snapshot(transactions: Vec<Transaction>) -> Self {
        let last_issued = transactions.iter().map(|t| t.id).max().unwrap_or(0);
        Self {
            inner: Mutex::new(transactions.into_iter().map(|t| (t.id, t)).collect()),
            last_issued: Mutex::new(last_issued),
        }
    }

    /// Allocate a time-based id that never collides with a live or
    /// previously issued one, even within a single millisecond.
    pub fn allocate_id(&self) -> u64 {
        let mut last = self.last_issued.lock().unwrap();
        let id = timestamp_now_millis().max(*last + 1);
        *last = id;
        id
    }

    pub fn insert(&self, txn: Transaction) {
        self.inner.lock().unwrap().insert(txn.id, txn);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.lock().unwrap().contains_key(&id)
    }

    pub fn state_of(&self, id: u64) -> Option<TxnState> {
        self.inner.lock().unwrap().get(&id).map(|t| t.state)
    }

    pub fn get(&self, id: u64) -> Option<Transaction> {
        self.inner.lock().unwrap().get(&id).cloned()
    }

    pub fn file_name_of(&self, id: u64) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .get(&id)
            .map(|t| t.file_name.clone())
    }

    /// Set a transaction's state; returns false for unknown ids.
    pub fn set_state(&self, id: u64, state: TxnState) -> bool {
        match self.inner.lock().unwrap().get_mut(&id) {
            Some(txn) => {
                txn.state = state;
                txn.last_edited_at = timestamp_now_millis();
                true
            }
            None => false,
        }
    }

    /// Refresh a transaction's idle clock.
    pub fn touch(&self, id: u64) {
        if let Some(txn) = self.inner.lock().unwrap().get_mut(&id) {
            txn.last_edited_at = timestamp_now_millis();
        }
    }

    pub fn remove(&self, id: u64) {
        self.inner.lock().unwrap().remove(&id);
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remote callback reference to one registered client.
#[derive(Debug, Clone)]
pub enum ClientCallback {
    /// `POST endpoint` with an `AddrUpdate` body.
    Http { endpoint: String },
    /// In-process client (embedded use and tests).
    Channel(mpsc::UnboundedSender<AddrUpdate>),
}

impl ClientCallback {
    /// Tell the client where the coordinator now lives.
    pub async fn update_server_addr(
        &self,
        http: &reqwest::Client,
        host: &str,
        port: u16,
    ) -> Result<()> {
        let update = AddrUpdate {
            host: host.to_string(),
            port,
        };
        match self {
            ClientCallback::Http { endpoint } => {
                http.post(endpoint)
                    .json(&update)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
            ClientCallback::Channel(tx) => tx
                .send(update)
                .map_err(|_| Error::ClientUnreachable("callback channel closed".into())),
        }
    }
}

/// Mutex-owned registry of authenticated clients, keyed by auth token.
#[derive(Default)]
pub struct ClientTable {
    inner: Mutex<HashMap<String, ClientCallback>>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(clients: Vec<(String, ClientCallback)>) -> Self {
        Self {
            inner: Mutex::new(clients.into_iter().collect()),
        }
    }

    pub fn insert(&self, token: String, callback: ClientCallback) {
        self.inner.lock().unwrap().insert(token, callback);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.inner.lock().unwrap().contains_key(token)
    }

    /// Remove a token; returns whether it was known.
    pub fn remove(&self, token: &str) -> bool {
        self.inner.lock().unwrap().remove(token).is_some()
    }

    pub fn snapshot(&self) -> Vec<(String, ClientCallback)> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
