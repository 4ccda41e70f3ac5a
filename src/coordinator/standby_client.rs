//! Standby mirror client
//!
//! Every coordinator state change is pushed to the standby through a
//! `StandbyHandle`, carrying the coordinator's own event timestamp so the
//! standby logs the coordinator's view of time. Mirroring is best-effort:
//! a failed mirror call is logged by the caller and skipped.

use crate::common::proto::{
    MirrorAbort, MirrorCommit, MirrorNewTxn, MirrorRead, MirrorRegister, MirrorUnregister,
    MirrorWrite,
};
use crate::common::{Error, Result};
use crate::coordinator::state::ClientCallback;
use crate::standby::Standby;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum StandbyHandle {
    Local(Arc<Standby>),
    Http(StandbyClient),
}

impl StandbyHandle {
    pub fn http(base_url: String, timeout: Duration) -> Result<Self> {
        Ok(StandbyHandle::Http(StandbyClient::new(base_url, timeout)?))
    }

    pub async fn mirror_read(&self, file_name: &str, time: u64) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_read(file_name, time);
                Ok(())
            }
            StandbyHandle::Http(client) => {
                client
                    .post(
                        "read",
                        &MirrorRead {
                            file_name: file_name.to_string(),
                            time,
                        },
                    )
                    .await
            }
        }
    }

    pub async fn mirror_new_txn(&self, file_name: &str, txn_id: u64, time: u64) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_new_txn(file_name, txn_id, time);
                Ok(())
            }
            StandbyHandle::Http(client) => {
                client
                    .post(
                        "new-txn",
                        &MirrorNewTxn {
                            file_name: file_name.to_string(),
                            txn_id,
                            time,
                        },
                    )
                    .await
            }
        }
    }

    pub async fn mirror_write(
        &self,
        txn_id: u64,
        seq_num: u64,
        data_len: u64,
        time: u64,
    ) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_write(txn_id, seq_num, data_len, time);
                Ok(())
            }
            StandbyHandle::Http(client) => {
                client
                    .post(
                        "write",
                        &MirrorWrite {
                            txn_id,
                            seq_num,
                            data_len,
                            time,
                        },
                    )
                    .await
            }
        }
    }

    pub async fn mirror_commit(&self, txn_id: u64, file_name: &str, time: u64) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_commit(txn_id, file_name, time);
                Ok(())
            }
            StandbyHandle::Http(client) => {
                client
                    .post(
                        "commit",
                        &MirrorCommit {
                            txn_id,
                            file_name: file_name.to_string(),
                            time,
                        },
                    )
                    .await
            }
        }
    }

    pub async fn mirror_abort(&self, txn_id: u64, file_name: &str, time: u64) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_abort(txn_id, file_name, time);
                Ok(())
            }
            StandbyHandle::Http(client) => {
                client
                    .post(
                        "abort",
                        &MirrorAbort {
                            txn_id,
                            file_name: file_name.to_string(),
                            time,
                        },
                    )
                    .await
            }
        }
    }

    pub async fn mirror_register(&self, token: &str, callback: &ClientCallback) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_register(token.to_string(), callback.clone());
                Ok(())
            }
            StandbyHandle::Http(client) => {
                // only HTTP callbacks survive a process boundary
                let callback_url = match callback {
                    ClientCallback::Http { endpoint } => Some(endpoint.clone()),
                    ClientCallback::Channel(_) => None,
                };
                client
                    .post(
                        "register",
                        &MirrorRegister {
                            token: token.to_string(),
                            callback_url,
                        },
                    )
                    .await
            }
        }
    }

    pub async fn mirror_unregister(&self, token: &str) -> Result<()> {
        match self {
            StandbyHandle::Local(standby) => {
                standby.mirror_unregister(token);
                Ok(())
            }
            StandbyHandle::Http(client) => {
                client
                    .post(
                        "unregister",
                        &MirrorUnregister {
                            token: token.to_string(),
                        },
                    )
                    .await
            }
        }
    }
}

/// HTTP client for a remote standby's mirror surface.
#[derive(Clone)]
pub struct StandbyClient {
    base_url: String,
    http: reqwest::Client,
}

impl StandbyClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self { base_url, http })
    }

    async fn post<T: serde::Serialize>(&self, verb: &str, body: &T) -> Result<()> {
        let url = format!("{}/mirror/{}", self.base_url, verb);
        self.http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
