//! Coordinator: the single point of transactional truth
//!
//! The coordinator owns the transaction and client tables, fans every write
//! and commit/abort out to all replica stores, serves reads from a randomly
//! chosen replica, and mirrors each state change to the standby. Replication
//! is sequential best-effort: an unreachable replica is skipped for that
//! call, never retried, and there is no catch-up reconciliation.

use crate::common::{
    load_replica_list, timestamp_now_millis, validate_file_name, CommitOutcome, CoordinatorConfig,
    Error, EventLog, OpStatus, Result,
};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::replica_client::ReplicaHandle;
use crate::coordinator::standby_client::StandbyHandle;
use crate::coordinator::state::{ClientCallback, ClientTable, Transaction, TxnState, TxnTable};
use bytes::Bytes;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Coordinator {
    log: Arc<Mutex<EventLog>>,
    txns: TxnTable,
    clients: ClientTable,
    replicas: Vec<ReplicaHandle>,
    standby: Option<StandbyHandle>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl Coordinator {
    pub fn new(
        log: Arc<Mutex<EventLog>>,
        replicas: Vec<ReplicaHandle>,
        standby: Option<StandbyHandle>,
    ) -> Self {
        Self {
            log,
            txns: TxnTable::new(),
            clients: ClientTable::new(),
            replicas,
            standby,
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
        }
    }

    /// Rebuild a coordinator from mirrored state. This is the promotion
    /// path: the standby seeds the new instance with its own log handle and
    /// table copies, never with references into the dead coordinator.
    pub fn resume(
        log: Arc<Mutex<EventLog>>,
        txns: TxnTable,
        clients: ClientTable,
        replicas: Vec<ReplicaHandle>,
    ) -> Self {
        Self {
            log,
            txns,
            clients,
            replicas,
            standby: None,
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
        }
    }

    pub fn with_sweep(mut self, idle_timeout: Duration, sweep_interval: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self.sweep_interval = sweep_interval;
        self
    }

    /// Read a file through one replica chosen uniformly at random. The
    /// coordinator holds no primary copy of its own.
    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        validate_file_name(file_name)?;

        if self.replicas.is_empty() {
            return Err(Error::ReplicaUnavailable(
                "no replica stores configured".into(),
            ));
        }

        let idx = rand::thread_rng().gen_range(0..self.replicas.len());
        let replica = &self.replicas[idx];

        let contents = match replica.read(file_name).await {
            Ok(contents) => contents,
            Err(e @ Error::NotFound(_)) => return Err(e),
            Err(e) if e.is_transport() => {
                return Err(Error::ReplicaUnavailable(format!(
                    "{}: {}",
                    replica.name(),
                    e
                )))
            }
            Err(e) => return Err(e),
        };

        let time = timestamp_now_millis();
        self.log.lock().unwrap().log_read(file_name, time);

        if let Some(standby) = &self.standby {
            if let Err(e) = standby.mirror_read(file_name, time).await {
                tracing::warn!("standby mirror of read failed, skipped: {}", e);
            }
        }

        Ok(contents)
    }

    /// Open a transaction against a file name. Concurrent transactions on
    /// the same name are allowed; the last committer wins.
    pub async fn new_txn(&self, file_name: &str) -> Result<u64> {
        validate_file_name(file_name)?;

        let txn_id = self.txns.allocate_id();
        let time = timestamp_now_millis();

        self.log
            .lock()
            .unwrap()
            .log_transaction(txn_id, TxnState::Started.code(), file_name, time);
        self.txns.insert(Transaction::new(txn_id, file_name));

        if let Some(standby) = &self.standby {
            if let Err(e) = standby.mirror_new_txn(file_name, txn_id, time).await {
                tracing::warn!("standby mirror of new_txn failed, skipped: {}", e);
            }
        }

        Ok(txn_id)
    }

    /// Accept one ordered chunk and replicate it to every store.
    ///
    /// Only a committed transaction refuses writes; an aborted one still
    /// accepts them (its chunks are already gone from the replicas, and the
    /// commit-time gap check is the backstop).
    pub async fn write(&self, txn_id: u64, seq_num: u64, data: Bytes) -> Result<OpStatus> {
        let Some(state) = self.txns.state_of(txn_id) else {
            return Ok(OpStatus::InvalidTransactionId);
        };
        if state == TxnState::Committed {
            return Ok(OpStatus::InvalidOperation);
        }

        for replica in &self.replicas {
            if let Err(e) = replica.write_chunk(txn_id, seq_num, data.clone()).await {
                tracing::warn!(
                    "replica {} unreachable on write, skipped: {}",
                    replica.name(),
                    e
                );
            }
        }

        let time = timestamp_now_millis();
        self.log
            .lock()
            .unwrap()
            .log_write(txn_id, seq_num, data.len() as u64, time);
        self.txns.touch(txn_id);

        if let Some(standby) = &self.standby {
            if let Err(e) = standby
                .mirror_write(txn_id, seq_num, data.len() as u64, time)
                .await
            {
                tracing::warn!("standby mirror of write failed, skipped: {}", e);
            }
        }

        Ok(OpStatus::Ack)
    }

    /// Commit: every replica runs its own gap check; the first missing-chunk
    /// report wins and the transaction stays open for resends. Committing an
    /// already committed transaction acks again.
    pub async fn commit(&self, txn_id: u64, num_of_msgs: u64) -> Result<CommitOutcome> {
        let Some(txn) = self.txns.get(txn_id) else {
            return Ok(CommitOutcome::InvalidTransactionId);
        };
        if txn.state == TxnState::Committed {
            return Ok(CommitOutcome::Ack);
        }

        for replica in &self.replicas {
            match replica.commit(txn_id, num_of_msgs, &txn.file_name).await {
                Ok(CommitOutcome::MissingChunks { missing }) => {
                    return Ok(CommitOutcome::MissingChunks { missing });
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    "replica {} unreachable on commit, skipped: {}",
                    replica.name(),
                    e
                ),
            }
        }

        self.txns.set_state(txn_id, TxnState::Committed);
        let time = timestamp_now_millis();
        self.log.lock().unwrap().log_transaction(
            txn_id,
            TxnState::Committed.code(),
            &txn.file_name,
            time,
        );

        if let Some(standby) = &self.standby {
            if let Err(e) = standby.mirror_commit(txn_id, &txn.file_name, time).await {
                tracing::warn!("standby mirror of commit failed, skipped: {}", e);
            }
        }

        Ok(CommitOutcome::Ack)
    }

    /// Abort: drop cached chunks everywhere. Aborting a committed
    /// transaction is invalid; aborting twice acks the second time.
    pub async fn abort(&self, txn_id: u64) -> Result<OpStatus> {
        let Some(txn) = self.txns.get(txn_id) else {
            return Ok(OpStatus::InvalidTransactionId);
        };
        match txn.state {
            TxnState::Committed => return Ok(OpStatus::InvalidOperation),
            TxnState::Aborted => return Ok(OpStatus::Ack),
            TxnState::Started => {}
        }

        for replica in &self.replicas {
            if let Err(e) = replica.abort(txn_id).await {
                tracing::warn!(
                    "replica {} unreachable on abort, skipped: {}",
                    replica.name(),
                    e
                );
            }
        }

        self.txns.set_state(txn_id, TxnState::Aborted);
        let time = timestamp_now_millis();
        self.log.lock().unwrap().log_transaction(
            txn_id,
            TxnState::Aborted.code(),
            &txn.file_name,
            time,
        );

        if let Some(standby) = &self.standby {
            if let Err(e) = standby.mirror_abort(txn_id, &txn.file_name, time).await {
                tracing::warn!("standby mirror of abort failed, skipped: {}", e);
            }
        }

        Ok(OpStatus::Ack)
    }

    /// Register a client callback. Without a token this mints a new one;
    /// with a token it only answers whether the token is still recognized.
    pub async fn register_client(
        &self,
        token: Option<String>,
        callback: Option<ClientCallback>,
    ) -> Result<(bool, Option<String>)> {
        match token {
            Some(token) => Ok((self.clients.contains(&token), None)),
            None => {
                let Some(callback) = callback else {
                    return Ok((false, None));
                };

                let token = uuid::Uuid::new_v4().to_string();
                self.clients.insert(token.clone(), callback.clone());

                if let Some(standby) = &self.standby {
                    if let Err(e) = standby.mirror_register(&token, &callback).await {
                        tracing::warn!("standby mirror of register failed, skipped: {}", e);
                    }
                }

                Ok((true, Some(token)))
            }
        }
    }

    pub async fn unregister_client(&self, token: &str) -> Result<bool> {
        if !self.clients.remove(token) {
            return Ok(false);
        }

        if let Some(standby) = &self.standby {
            if let Err(e) = standby.mirror_unregister(token).await {
                tracing::warn!("standby mirror of unregister failed, skipped: {}", e);
            }
        }

        Ok(true)
    }

    /// Liveness probe answered to the standby's heartbeat monitor.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// One pass of the idle-transaction check: evict terminal transactions
    /// and force-abort STARTED ones that have gone quiet.
    pub async fn sweep_idle_once(&self) {
        let now = timestamp_now_millis();
        let idle_ms = self.idle_timeout.as_millis() as u64;

        for txn in self.txns.snapshot() {
            if txn.state.is_terminal() {
                self.txns.remove(txn.id);
            } else if now.saturating_sub(txn.last_edited_at) > idle_ms {
                tracing::info!("force-aborting idle transaction {}", txn.id);
                if let Err(e) = self.abort(txn.id).await {
                    tracing::warn!("idle sweep abort of {} failed: {}", txn.id, e);
                }
                self.txns.remove(txn.id);
            }
        }
    }

    /// Run the idle sweeper until the process exits. A failed iteration is
    /// logged and the loop keeps going.
    pub fn spawn_idle_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(coordinator.sweep_interval).await;
                coordinator.sweep_idle_once().await;
            }
        })
    }

    // === Introspection (tests, promotion checks, admin surface) ===

    pub fn txn_snapshot(&self) -> Vec<Transaction> {
        self.txns.snapshot()
    }

    pub fn active_txn_count(&self) -> usize {
        self.txns.len()
    }

    pub fn client_tokens(&self) -> Vec<String> {
        self.clients
            .snapshot()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }
}

/// Bring up a coordinator from configuration and serve its RPC surface.
pub async fn serve(config: CoordinatorConfig) -> Result<()> {
    tracing::info!("Starting coordinator");
    tracing::info!("  RPC API: {}", config.bind_addr);
    tracing::info!("  Data dir: {}", config.data_dir.display());
    tracing::info!("  Replica list: {}", config.replica_list.display());

    let log = Arc::new(Mutex::new(EventLog::open(
        config.data_dir.join("log").join("log.txt"),
    )?));

    let timeout = Duration::from_millis(config.rpc_timeout_ms);
    let descriptors = load_replica_list(&config.replica_list)?;
    let mut replicas = Vec::with_capacity(descriptors.len());
    for desc in &descriptors {
        tracing::info!("  Replica: {} at {}", desc.unique_name, desc.base_url());
        replicas.push(ReplicaHandle::from_descriptor(desc, timeout)?);
    }

    let standby = match &config.standby_url {
        Some(url) => {
            tracing::info!("  Standby: {}", url);
            Some(StandbyHandle::http(url.clone(), timeout)?)
        }
        None => None,
    };

    let coordinator = Arc::new(Coordinator::new(log, replicas, standby).with_sweep(
        Duration::from_millis(config.idle_timeout_ms),
        Duration::from_millis(config.sweep_interval_ms),
    ));
    let _sweeper = coordinator.spawn_idle_sweeper();

    let router = create_router(CoordState { coordinator });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("✓ Coordinator ready");

    axum::serve(listener, router).await?;
    Ok(())
}
