//! Chunk cache and file assembly for one replica
//!
//! Layout:
//! - `<root>/cache/<txn_id>_<seq_num>` — one file per pending chunk
//! - `<root>/<file_name>` — assembled files
//!
//! The store keeps no transaction table: it trusts the coordinator's
//! sequencing and only checks chunk completeness at commit time.

use crate::common::{validate_file_name, CommitOutcome, Error, OpStatus, Result};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ReplicaStore {
    root: PathBuf,
    cache: PathBuf,
    max_read_bytes: usize,
    /// Commit/abort cleanup must not interleave with a concurrent listing
    /// of the same transaction's cache set.
    cleanup: Mutex<()>,
}

impl ReplicaStore {
    /// Open or create the store directories.
    pub fn open(root: impl AsRef<Path>, max_read_bytes: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let cache = root.join("cache");

        fs::create_dir_all(&root)?;
        fs::create_dir_all(&cache)?;

        Ok(Self {
            root,
            cache,
            max_read_bytes,
            cleanup: Mutex::new(()),
        })
    }

    /// Persist one chunk. Re-sending the same `(txn_id, seq_num)` overwrites.
    pub fn write_chunk(&self, txn_id: u64, seq_num: u64, data: &[u8]) -> Result<OpStatus> {
        fs::write(self.chunk_path(txn_id, seq_num), data)?;
        Ok(OpStatus::Ack)
    }

    /// Assemble the transaction's chunks into the destination file.
    ///
    /// Fails with the full list of missing sequence numbers in
    /// `[1, num_of_msgs]` — leading, interior and trailing gaps alike —
    /// before touching the destination. On success the cache set is deleted.
    pub fn commit(&self, txn_id: u64, num_of_msgs: u64, file_name: &str) -> Result<CommitOutcome> {
        validate_file_name(file_name)?;
        let _guard = self.cleanup.lock().unwrap();

        let cached = self.cached_seq_nums(txn_id)?;
        let missing = find_missing(&cached, num_of_msgs);
        if !missing.is_empty() {
            return Ok(CommitOutcome::MissingChunks { missing });
        }

        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(file_name))?;

        for seq in 1..=num_of_msgs {
            let chunk = fs::read(self.chunk_path(txn_id, seq))?;
            out.write_all(&chunk)?;
        }
        out.flush()?;
        out.sync_all()?;

        self.clear_cached(txn_id)?;

        Ok(CommitOutcome::Ack)
    }

    /// Drop every cached chunk for the transaction. Assembled files are
    /// not touched.
    pub fn abort(&self, txn_id: u64) -> Result<OpStatus> {
        let _guard = self.cleanup.lock().unwrap();
        self.clear_cached(txn_id)?;
        Ok(OpStatus::Ack)
    }

    /// Read the full contents of an assembled file, bounded by the
    /// configured maximum read size.
    pub fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        validate_file_name(file_name)?;
        let path = self.root.join(file_name);

        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(file_name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        // Files larger than the bound are truncated at it; a known limit.
        let mut contents = Vec::new();
        file.take(self.max_read_bytes as u64)
            .read_to_end(&mut contents)?;

        Ok(contents)
    }

    /// Number of chunks currently cached for a transaction.
    pub fn cached_chunk_count(&self, txn_id: u64) -> Result<usize> {
        Ok(self.cached_seq_nums(txn_id)?.len())
    }

    fn chunk_path(&self, txn_id: u64, seq_num: u64) -> PathBuf {
        self.cache.join(format!("{}_{}", txn_id, seq_num))
    }

    fn cached_seq_nums(&self, txn_id: u64) -> Result<BTreeSet<u64>> {
        let prefix = format!("{}_", txn_id);
        let mut seqs = BTreeSet::new();

        for entry in fs::read_dir(&self.cache)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(seq) = name.strip_prefix(&prefix) {
                if let Ok(seq) = seq.parse::<u64>() {
                    seqs.insert(seq);
                }
            }
        }

        Ok(seqs)
    }

    fn clear_cached(&self, txn_id: u64) -> Result<()> {
        for seq in self.cached_seq_nums(txn_id)? {
            fs::remove_file(self.chunk_path(txn_id, seq))?;
        }
        Ok(())
    }
}

/// Every sequence number in `[1, num_of_msgs]` with no cached chunk,
/// ascending. Covers gaps before the first received chunk, between
/// consecutive chunks, and after the last one.
fn find_missing(cached: &BTreeSet<u64>, num_of_msgs: u64) -> Vec<u64> {
    (1..=num_of_msgs).filter(|seq| !cached.contains(seq)).collect()
}
