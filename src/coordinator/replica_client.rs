//! Replica fan-out client
//!
//! The coordinator drives every replica through a `ReplicaHandle`: an HTTP
//! client for deployed replica servers, or a direct in-process store for
//! embedded use and tests. The operation set is the replica role's only:
//! no transaction bookkeeping, no client registry.

use crate::common::proto::{ReplicaCommitRequest, StatusResponse};
use crate::common::{CommitOutcome, Error, OpStatus, ReplicaDescriptor, Result};
use crate::replica::ReplicaStore;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum ReplicaHandle {
    Local {
        name: String,
        store: Arc<ReplicaStore>,
    },
    Http(ReplicaClient),
}

impl ReplicaHandle {
    pub fn local(name: impl Into<String>, store: Arc<ReplicaStore>) -> Self {
        ReplicaHandle::Local {
            name: name.into(),
            store,
        }
    }

    pub fn from_descriptor(desc: &ReplicaDescriptor, timeout: Duration) -> Result<Self> {
        Ok(ReplicaHandle::Http(ReplicaClient::new(
            desc.base_url(),
            desc.unique_name.clone(),
            timeout,
        )?))
    }

    pub fn name(&self) -> &str {
        match self {
            ReplicaHandle::Local { name, .. } => name,
            ReplicaHandle::Http(client) => &client.name,
        }
    }

    pub async fn write_chunk(&self, txn_id: u64, seq_num: u64, data: Bytes) -> Result<OpStatus> {
        match self {
            ReplicaHandle::Local { store, .. } => store.write_chunk(txn_id, seq_num, &data),
            ReplicaHandle::Http(client) => client.write_chunk(txn_id, seq_num, data).await,
        }
    }

    pub async fn commit(
        &self,
        txn_id: u64,
        num_of_msgs: u64,
        file_name: &str,
    ) -> Result<CommitOutcome> {
        match self {
            ReplicaHandle::Local { store, .. } => store.commit(txn_id, num_of_msgs, file_name),
            ReplicaHandle::Http(client) => client.commit(txn_id, num_of_msgs, file_name).await,
        }
    }

    pub async fn abort(&self, txn_id: u64) -> Result<OpStatus> {
        match self {
            ReplicaHandle::Local { store, .. } => store.abort(txn_id),
            ReplicaHandle::Http(client) => client.abort(txn_id).await,
        }
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        match self {
            ReplicaHandle::Local { store, .. } => store.read(file_name),
            ReplicaHandle::Http(client) => client.read(file_name).await,
        }
    }
}

/// HTTP client for one remote replica store.
#[derive(Clone)]
pub struct ReplicaClient {
    base_url: String,
    name: String,
    http: reqwest::Client,
}

impl ReplicaClient {
    pub fn new(base_url: String, name: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            base_url,
            name,
            http,
        })
    }

    pub async fn write_chunk(&self, txn_id: u64, seq_num: u64, data: Bytes) -> Result<OpStatus> {
        let url = format!("{}/txn/{}/chunk/{}", self.base_url, txn_id, seq_num);
        let resp: StatusResponse = self
            .http
            .put(url)
            .body(data)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.status)
    }

    pub async fn commit(
        &self,
        txn_id: u64,
        num_of_msgs: u64,
        file_name: &str,
    ) -> Result<CommitOutcome> {
        let url = format!("{}/txn/{}/commit", self.base_url, txn_id);
        let outcome: CommitOutcome = self
            .http
            .post(url)
            .json(&ReplicaCommitRequest {
                num_of_msgs,
                file_name: file_name.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(outcome)
    }

    pub async fn abort(&self, txn_id: u64) -> Result<OpStatus> {
        let url = format!("{}/txn/{}/abort", self.base_url, txn_id);
        let resp: StatusResponse = self
            .http
            .post(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.status)
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.base_url, file_name);
        let resp = self.http.get(url).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(file_name.to_string()));
        }

        Ok(resp.error_for_status()?.bytes().await?.to_vec())
    }
}
