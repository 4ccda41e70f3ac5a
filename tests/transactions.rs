//! End-to-end transaction protocol tests
//!
//! A coordinator wired to in-process replica stores: the same fan-out code
//! paths as production, minus the network.

use bytes::Bytes;
use repfs::common::{CommitOutcome, Error, EventLog, OpStatus};
use repfs::coordinator::{Coordinator, ReplicaHandle};
use repfs::ReplicaStore;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Cluster {
    _dir: TempDir,
    coordinator: Coordinator,
    stores: Vec<Arc<ReplicaStore>>,
}

fn cluster(replicas: usize) -> Cluster {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(Mutex::new(
        EventLog::open(dir.path().join("log").join("log.txt")).unwrap(),
    ));

    let mut stores = Vec::new();
    let mut handles = Vec::new();
    for i in 0..replicas {
        let store = Arc::new(
            ReplicaStore::open(dir.path().join(format!("rep-{}", i)), 4 * 1024 * 1024).unwrap(),
        );
        stores.push(Arc::clone(&store));
        handles.push(ReplicaHandle::local(format!("rep-{}", i), store));
    }

    Cluster {
        _dir: dir,
        coordinator: Coordinator::new(log, handles, None),
        stores,
    }
}

#[tokio::test]
async fn test_round_trip() {
    let cluster = cluster(2);
    let coord = &cluster.coordinator;

    let txn = coord.new_txn("a.txt").await.unwrap();
    assert_eq!(
        coord.write(txn, 1, Bytes::from_static(b"hello ")).await.unwrap(),
        OpStatus::Ack
    );
    assert_eq!(
        coord.write(txn, 2, Bytes::from_static(b"world")).await.unwrap(),
        OpStatus::Ack
    );
    assert_eq!(coord.commit(txn, 2).await.unwrap(), CommitOutcome::Ack);

    // reads go through a random replica; every replica must agree
    for _ in 0..8 {
        assert_eq!(coord.read("a.txt").await.unwrap(), b"hello world");
    }
}

#[tokio::test]
async fn test_unknown_txn_id_everywhere() {
    let cluster = cluster(1);
    let coord = &cluster.coordinator;

    assert_eq!(
        coord.write(999, 1, Bytes::from_static(b"x")).await.unwrap(),
        OpStatus::InvalidTransactionId
    );
    assert_eq!(
        coord.commit(999, 1).await.unwrap(),
        CommitOutcome::InvalidTransactionId
    );
    assert_eq!(coord.abort(999).await.unwrap(), OpStatus::InvalidTransactionId);
}

#[tokio::test]
async fn test_committed_txn_is_closed() {
    let cluster = cluster(1);
    let coord = &cluster.coordinator;

    let txn = coord.new_txn("closed.txt").await.unwrap();
    coord.write(txn, 1, Bytes::from_static(b"x")).await.unwrap();
    assert_eq!(coord.commit(txn, 1).await.unwrap(), CommitOutcome::Ack);

    // further writes and aborts are invalid; commit stays idempotent
    assert_eq!(
        coord.write(txn, 2, Bytes::from_static(b"y")).await.unwrap(),
        OpStatus::InvalidOperation
    );
    assert_eq!(coord.abort(txn).await.unwrap(), OpStatus::InvalidOperation);
    assert_eq!(coord.commit(txn, 1).await.unwrap(), CommitOutcome::Ack);
}

#[tokio::test]
async fn test_abort_semantics() {
    let cluster = cluster(2);
    let coord = &cluster.coordinator;

    let txn = coord.new_txn("aborted.txt").await.unwrap();
    coord.write(txn, 1, Bytes::from_static(b"x")).await.unwrap();

    assert_eq!(coord.abort(txn).await.unwrap(), OpStatus::Ack);
    // aborting again is a no-op ack
    assert_eq!(coord.abort(txn).await.unwrap(), OpStatus::Ack);
    // an aborted transaction still accepts writes; only commit closes it
    assert_eq!(
        coord.write(txn, 2, Bytes::from_static(b"y")).await.unwrap(),
        OpStatus::Ack
    );

    // nothing was assembled
    assert!(matches!(
        coord.read("aborted.txt").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_commit_reports_missing_chunks_then_succeeds_on_resend() {
    let cluster = cluster(2);
    let coord = &cluster.coordinator;

    let txn = coord.new_txn("gaps.txt").await.unwrap();
    for seq in [1u64, 2, 4] {
        coord
            .write(txn, seq, Bytes::from(format!("chunk{}", seq)))
            .await
            .unwrap();
    }

    assert_eq!(
        coord.commit(txn, 5).await.unwrap(),
        CommitOutcome::MissingChunks {
            missing: vec![3, 5]
        }
    );

    // the client resends exactly the missing chunks and retries
    for seq in [3u64, 5] {
        coord
            .write(txn, seq, Bytes::from(format!("chunk{}", seq)))
            .await
            .unwrap();
    }
    assert_eq!(coord.commit(txn, 5).await.unwrap(), CommitOutcome::Ack);
    assert_eq!(
        coord.read("gaps.txt").await.unwrap(),
        b"chunk1chunk2chunk3chunk4chunk5"
    );
}

#[tokio::test]
async fn test_commit_reports_leading_gap() {
    let cluster = cluster(1);
    let coord = &cluster.coordinator;

    let txn = coord.new_txn("lead.txt").await.unwrap();
    coord.write(txn, 2, Bytes::from_static(b"b")).await.unwrap();
    coord.write(txn, 3, Bytes::from_static(b"c")).await.unwrap();

    assert_eq!(
        coord.commit(txn, 3).await.unwrap(),
        CommitOutcome::MissingChunks { missing: vec![1] }
    );
}

#[tokio::test]
async fn test_no_cached_chunks_survive_commit_or_abort() {
    let cluster = cluster(3);
    let coord = &cluster.coordinator;

    let committed = coord.new_txn("done.txt").await.unwrap();
    coord
        .write(committed, 1, Bytes::from_static(b"x"))
        .await
        .unwrap();
    coord.commit(committed, 1).await.unwrap();

    let aborted = coord.new_txn("gone.txt").await.unwrap();
    coord
        .write(aborted, 1, Bytes::from_static(b"y"))
        .await
        .unwrap();
    coord.abort(aborted).await.unwrap();

    for store in &cluster.stores {
        assert_eq!(store.cached_chunk_count(committed).unwrap(), 0);
        assert_eq!(store.cached_chunk_count(aborted).unwrap(), 0);
    }
}

#[tokio::test]
async fn test_read_missing_file_is_not_found() {
    let cluster = cluster(2);
    assert!(matches!(
        cluster.coordinator.read("absent.txt").await,
        Err(Error::NotFound(name)) if name == "absent.txt"
    ));
}

#[tokio::test]
async fn test_sequential_txns_append_to_the_same_file() {
    let cluster = cluster(1);
    let coord = &cluster.coordinator;

    let first = coord.new_txn("shared.txt").await.unwrap();
    coord.write(first, 1, Bytes::from_static(b"one,")).await.unwrap();
    coord.commit(first, 1).await.unwrap();

    let second = coord.new_txn("shared.txt").await.unwrap();
    coord.write(second, 1, Bytes::from_static(b"two")).await.unwrap();
    coord.commit(second, 1).await.unwrap();

    // commits append in commit order; no isolation across transactions
    assert_eq!(coord.read("shared.txt").await.unwrap(), b"one,two");
}

#[tokio::test]
async fn test_txn_ids_are_distinct_under_burst() {
    let cluster = cluster(1);
    let coord = &cluster.coordinator;

    let mut ids = std::collections::HashSet::new();
    for _ in 0..64 {
        assert!(ids.insert(coord.new_txn("burst.txt").await.unwrap()));
    }
}

#[tokio::test]
async fn test_client_registry_round_trip() {
    let cluster = cluster(1);
    let coord = &cluster.coordinator;
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

    let (registered, token) = coord
        .register_client(None, Some(repfs::coordinator::ClientCallback::Channel(tx)))
        .await
        .unwrap();
    assert!(registered);
    let token = token.unwrap();

    // re-registration is a membership check
    let (known, minted) = coord.register_client(Some(token.clone()), None).await.unwrap();
    assert!(known);
    assert!(minted.is_none());

    assert!(coord.unregister_client(&token).await.unwrap());
    assert!(!coord.unregister_client(&token).await.unwrap());

    let (still_known, _) = coord.register_client(Some(token), None).await.unwrap();
    assert!(!still_known);
}
