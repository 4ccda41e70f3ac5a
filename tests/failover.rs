//! Mirroring and failover tests
//!
//! A live coordinator mirrors every event to an in-process standby; killing
//! the coordinator's liveness flag makes the heartbeat monitor fire, and the
//! standby promotes itself into a coordinator with the mirrored tables.

use bytes::Bytes;
use repfs::common::{CommitOutcome, EventLog};
use repfs::coordinator::{
    ClientCallback, Coordinator, ReplicaHandle, StandbyHandle, Transaction, TxnState,
};
use repfs::heartbeat::{HeartbeatMonitor, HeartbeatTarget};
use repfs::standby::COORDINATOR_RESPONDER_ID;
use repfs::{ReplicaStore, Standby};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const COORDINATOR_PORT: u16 = 5555;

struct Pair {
    _dir: TempDir,
    coordinator: Coordinator,
    standby: Arc<Standby>,
    store: Arc<ReplicaStore>,
}

fn coordinator_with_standby() -> Pair {
    let dir = TempDir::new().unwrap();

    let store = Arc::new(
        ReplicaStore::open(dir.path().join("rep-0"), 4 * 1024 * 1024).unwrap(),
    );
    let handles = vec![ReplicaHandle::local("rep-0", Arc::clone(&store))];

    let standby_log = Arc::new(Mutex::new(
        EventLog::open(dir.path().join("standby").join("log.txt")).unwrap(),
    ));
    let standby = Arc::new(
        Standby::new(
            standby_log,
            handles.clone(),
            COORDINATOR_PORT,
            Duration::from_secs(1),
        )
        .unwrap(),
    );

    let coord_log = Arc::new(Mutex::new(
        EventLog::open(dir.path().join("coord").join("log.txt")).unwrap(),
    ));
    let coordinator = Coordinator::new(
        coord_log,
        handles,
        Some(StandbyHandle::Local(Arc::clone(&standby))),
    );

    Pair {
        _dir: dir,
        coordinator,
        standby,
        store,
    }
}

fn by_id(mut txns: Vec<Transaction>) -> Vec<(u64, String, TxnState)> {
    txns.sort_by_key(|t| t.id);
    txns.into_iter()
        .map(|t| (t.id, t.file_name, t.state))
        .collect()
}

#[tokio::test]
async fn test_standby_mirrors_transactions_and_clients() {
    let pair = coordinator_with_standby();
    let coord = &pair.coordinator;

    let (tx, _rx) = mpsc::unbounded_channel();
    let (_, token) = coord
        .register_client(None, Some(ClientCallback::Channel(tx)))
        .await
        .unwrap();
    let token = token.unwrap();

    let committed = coord.new_txn("a.txt").await.unwrap();
    coord
        .write(committed, 1, Bytes::from_static(b"hello"))
        .await
        .unwrap();
    coord.commit(committed, 1).await.unwrap();

    let open = coord.new_txn("b.txt").await.unwrap();
    let aborted = coord.new_txn("c.txt").await.unwrap();
    coord.abort(aborted).await.unwrap();

    let mirrored = by_id(pair.standby.txn_snapshot());
    assert_eq!(
        mirrored,
        vec![
            (committed, "a.txt".to_string(), TxnState::Committed),
            (open, "b.txt".to_string(), TxnState::Started),
            (aborted, "c.txt".to_string(), TxnState::Aborted),
        ]
    );
    assert_eq!(pair.standby.client_tokens(), vec![token.clone()]);

    coord.unregister_client(&token).await.unwrap();
    assert!(pair.standby.client_tokens().is_empty());
}

#[tokio::test]
async fn test_heartbeat_death_triggers_promotion() {
    let pair = coordinator_with_standby();
    let coord = &pair.coordinator;

    // two registered clients, both expecting a repoint on failover
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let (_, token1) = coord
        .register_client(None, Some(ClientCallback::Channel(tx1)))
        .await
        .unwrap();
    let (_, token2) = coord
        .register_client(None, Some(ClientCallback::Channel(tx2)))
        .await
        .unwrap();

    let committed = coord.new_txn("a.txt").await.unwrap();
    coord
        .write(committed, 1, Bytes::from_static(b"hello "))
        .await
        .unwrap();
    coord
        .write(committed, 2, Bytes::from_static(b"world"))
        .await
        .unwrap();
    coord.commit(committed, 2).await.unwrap();
    let open = coord.new_txn("b.txt").await.unwrap();

    // the standby watches the coordinator's liveness through the monitor
    let alive = Arc::new(AtomicBool::new(coord.is_alive()));
    let monitor = HeartbeatMonitor::new(Duration::from_millis(10));
    monitor.attach(
        COORDINATOR_RESPONDER_ID,
        HeartbeatTarget::Flag(Arc::clone(&alive)),
    );

    let mut failures = Vec::new();
    monitor.sweep_once(&mut |id, _| failures.push(id)).await;
    assert!(failures.is_empty());

    // the coordinator dies
    alive.store(false, Ordering::SeqCst);
    monitor.sweep_once(&mut |id, _| failures.push(id)).await;
    assert_eq!(failures, vec![COORDINATOR_RESPONDER_ID]);

    let promoted = pair.standby.promote().await.unwrap();

    // the promoted coordinator's tables equal the mirrored state
    assert_eq!(by_id(promoted.txn_snapshot()), by_id(pair.standby.txn_snapshot()));
    assert_eq!(
        by_id(promoted.txn_snapshot()),
        vec![
            (committed, "a.txt".to_string(), TxnState::Committed),
            (open, "b.txt".to_string(), TxnState::Started),
        ]
    );
    let mut tokens = promoted.client_tokens();
    tokens.sort();
    let mut expected = vec![token1.unwrap(), token2.unwrap()];
    expected.sort();
    assert_eq!(tokens, expected);

    // every client got exactly one address update
    for rx in [&mut rx1, &mut rx2] {
        let update = rx.recv().await.unwrap();
        assert_eq!(update.port, COORDINATOR_PORT);
        assert!(!update.host.is_empty());
        assert!(rx.try_recv().is_err());
    }

    // and the new coordinator serves traffic against the same replicas
    assert_eq!(promoted.read("a.txt").await.unwrap(), b"hello world");
    let txn = promoted.new_txn("c.txt").await.unwrap();
    assert!(txn > open);
    promoted
        .write(txn, 1, Bytes::from_static(b"post-failover"))
        .await
        .unwrap();
    assert_eq!(promoted.commit(txn, 1).await.unwrap(), CommitOutcome::Ack);
    assert_eq!(promoted.read("c.txt").await.unwrap(), b"post-failover");
}

#[tokio::test]
async fn test_unreachable_client_is_skipped_on_promotion() {
    let pair = coordinator_with_standby();
    let coord = &pair.coordinator;

    // one live client, one whose callback channel is already gone
    let (tx_live, mut rx_live) = mpsc::unbounded_channel();
    let (tx_dead, rx_dead) = mpsc::unbounded_channel();
    drop(rx_dead);

    coord
        .register_client(None, Some(ClientCallback::Channel(tx_live)))
        .await
        .unwrap();
    coord
        .register_client(None, Some(ClientCallback::Channel(tx_dead)))
        .await
        .unwrap();

    let promoted = pair.standby.promote().await.unwrap();

    // the dead client is logged and skipped; the live one is repointed
    let update = rx_live.recv().await.unwrap();
    assert_eq!(update.port, COORDINATOR_PORT);
    assert_eq!(promoted.client_tokens().len(), 2);
}

#[tokio::test]
async fn test_uncommitted_chunks_are_not_mirrored() {
    let pair = coordinator_with_standby();
    let coord = &pair.coordinator;

    let open = coord.new_txn("pending.txt").await.unwrap();
    coord
        .write(open, 1, Bytes::from_static(b"only-on-replicas"))
        .await
        .unwrap();

    // metadata survives at the standby, the chunk lives only on replicas
    assert_eq!(pair.standby.txn_snapshot().len(), 1);
    assert_eq!(pair.store.cached_chunk_count(open).unwrap(), 1);

    let promoted = pair.standby.promote().await.unwrap();
    assert_eq!(promoted.commit(open, 1).await.unwrap(), CommitOutcome::Ack);
    assert_eq!(promoted.read("pending.txt").await.unwrap(), b"only-on-replicas");
}
