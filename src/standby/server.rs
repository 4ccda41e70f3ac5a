//! Standby server and failover controller
//!
//! The standby passively logs every event the coordinator mirrors to it and
//! keeps its own copies of the transaction and client tables. When the
//! heartbeat monitor reports the coordinator dead, the standby promotes
//! itself: it builds a new coordinator from its own mirrored state — never
//! from references into the dead process — and repoints every registered
//! client at the new address.
//!
//! Chunks are cached only at the replicas, so an uncommitted transaction
//! survives failover as metadata even where its chunks were lost.

use crate::common::{lan_ip, load_replica_list, EventLog, Result, StandbyConfig};
use crate::coordinator::http::{create_router as coordinator_router, CoordState};
use crate::coordinator::replica_client::ReplicaHandle;
use crate::coordinator::state::{ClientCallback, ClientTable, Transaction, TxnState, TxnTable};
use crate::coordinator::Coordinator;
use crate::heartbeat::{HeartbeatMonitor, HeartbeatTarget};
use crate::standby::http::{create_router, StandbyState};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Heartbeat registry id under which the watched coordinator is attached.
pub const COORDINATOR_RESPONDER_ID: u32 = 0;

pub struct Standby {
    log: Arc<Mutex<EventLog>>,
    txns: TxnTable,
    clients: ClientTable,
    replicas: Vec<ReplicaHandle>,
    coordinator_port: u16,
    http: reqwest::Client,
}

impl Standby {
    pub fn new(
        log: Arc<Mutex<EventLog>>,
        replicas: Vec<ReplicaHandle>,
        coordinator_port: u16,
        rpc_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(rpc_timeout).build()?;
        Ok(Self {
            log,
            txns: TxnTable::new(),
            clients: ClientTable::new(),
            replicas,
            coordinator_port,
            http,
        })
    }

    // === Mirror endpoints ===
    //
    // The coordinator already validated each event; the standby records it
    // as-is, stamping the coordinator's timestamp into its own log.

    pub fn mirror_read(&self, file_name: &str, time: u64) {
        self.log.lock().unwrap().log_read(file_name, time);
    }

    pub fn mirror_new_txn(&self, file_name: &str, txn_id: u64, time: u64) {
        self.txns.insert(Transaction::new(txn_id, file_name));
        self.log
            .lock()
            .unwrap()
            .log_transaction(txn_id, TxnState::Started.code(), file_name, time);
    }

    pub fn mirror_write(&self, txn_id: u64, seq_num: u64, data_len: u64, time: u64) {
        self.log
            .lock()
            .unwrap()
            .log_write(txn_id, seq_num, data_len, time);
    }

    pub fn mirror_commit(&self, txn_id: u64, file_name: &str, time: u64) {
        self.txns.set_state(txn_id, TxnState::Committed);
        self.log
            .lock()
            .unwrap()
            .log_transaction(txn_id, TxnState::Committed.code(), file_name, time);
    }

    pub fn mirror_abort(&self, txn_id: u64, file_name: &str, time: u64) {
        self.txns.set_state(txn_id, TxnState::Aborted);
        self.log
            .lock()
            .unwrap()
            .log_transaction(txn_id, TxnState::Aborted.code(), file_name, time);
    }

    pub fn mirror_register(&self, token: String, callback: ClientCallback) {
        self.clients.insert(token, callback);
    }

    pub fn mirror_unregister(&self, token: &str) {
        self.clients.remove(token);
    }

    // === Failover ===

    /// Promote this standby into a coordinator.
    ///
    /// The new instance is seeded with the standby's own log handle and
    /// table copies, then every registered client is told the new address.
    /// A client that cannot be reached is logged and skipped, not retried.
    pub async fn promote(&self) -> Result<Coordinator> {
        let coordinator = Coordinator::resume(
            Arc::clone(&self.log),
            TxnTable::from_snapshot(self.txns.snapshot()),
            ClientTable::from_snapshot(self.clients.snapshot()),
            self.replicas.clone(),
        );

        let host = lan_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());

        for (token, callback) in self.clients.snapshot() {
            if let Err(e) = callback
                .update_server_addr(&self.http, &host, self.coordinator_port)
                .await
            {
                tracing::warn!("unable to update client {}: {}", token, e);
            }
        }

        tracing::info!(
            "standby promoted: {} transactions, {} clients, announcing {}:{}",
            coordinator.active_txn_count(),
            self.clients.len(),
            host,
            self.coordinator_port
        );

        Ok(coordinator)
    }

    // === Introspection ===

    pub fn txn_snapshot(&self) -> Vec<Transaction> {
        self.txns.snapshot()
    }

    pub fn client_tokens(&self) -> Vec<String> {
        self.clients
            .snapshot()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }
}

/// Bring up a standby: serve the mirror surface while watching the
/// coordinator's liveness endpoint, and take over on failure.
pub async fn serve(config: StandbyConfig) -> Result<()> {
    tracing::info!("Starting standby");
    tracing::info!("  Mirror API: {}", config.bind_addr);
    tracing::info!("  Watching: {}", config.coordinator_url);
    tracing::info!("  Data dir: {}", config.data_dir.display());

    let log = Arc::new(Mutex::new(EventLog::open(
        config.data_dir.join("log").join("log.txt"),
    )?));

    let timeout = Duration::from_millis(config.rpc_timeout_ms);
    let descriptors = load_replica_list(&config.replica_list)?;
    let mut replicas = Vec::with_capacity(descriptors.len());
    for desc in &descriptors {
        replicas.push(ReplicaHandle::from_descriptor(desc, timeout)?);
    }

    let standby = Arc::new(Standby::new(
        log,
        replicas,
        config.coordinator_port,
        timeout,
    )?);

    let monitor = Arc::new(HeartbeatMonitor::new(Duration::from_millis(
        config.heartbeat_period_ms,
    )));
    monitor.attach(
        COORDINATOR_RESPONDER_ID,
        HeartbeatTarget::Http {
            url: format!("{}/health/live", config.coordinator_url),
        },
    );

    let (failed_tx, mut failed_rx) = mpsc::unbounded_channel();
    let _monitor_task = Arc::clone(&monitor).spawn(move |id, _| {
        let _ = failed_tx.send(id);
    });

    let router = create_router(StandbyState {
        standby: Arc::clone(&standby),
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("✓ Standby ready");

    tokio::select! {
        res = axum::serve(listener, router).into_future() => {
            res?;
        }
        Some(_) = failed_rx.recv() => {
            tracing::warn!("coordinator heartbeat lost after {}ms period; taking over",
                config.heartbeat_period_ms);

            let coordinator = Arc::new(standby.promote().await?);
            let _sweeper = coordinator.spawn_idle_sweeper();

            let router = coordinator_router(CoordState { coordinator });
            let addr = SocketAddr::from(([0, 0, 0, 0], config.coordinator_port));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("✓ Promoted coordinator ready on {}", addr);

            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
