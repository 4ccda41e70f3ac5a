//! Append-only event log
//!
//! Every transaction state change, write and read is recorded as one line
//! before the call that caused it returns success. The failover story rests
//! on this file existing, so an append failure is fatal to the process.
//!
//! Line format: `KIND:timestampMillis<TAB>field1:field2:...`

use crate::common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const TRANSACTION_LOG_ENTRY: &str = "TRXN";
pub const READ_LOG_ENTRY: &str = "READ";
pub const WRITE_LOG_ENTRY: &str = "WMSG";

/// Append-only event log. One instance per server role.
pub struct EventLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLog {
    /// Open or create the log file, appending to existing content.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log a transaction state change. `state_code` is the numeric state
    /// (10 committed, 20 started, 30 aborted).
    pub fn log_transaction(&mut self, txn_id: u64, state_code: u8, file_name: &str, time: u64) {
        let msg = format!("{}:{}:{}", txn_id, state_code, file_name);
        self.write_entry(TRANSACTION_LOG_ENTRY, &msg, time);
    }

    /// Log a served read.
    pub fn log_read(&mut self, file_name: &str, time: u64) {
        self.write_entry(READ_LOG_ENTRY, file_name, time);
    }

    /// Log a write chunk. Only the payload length is recorded.
    pub fn log_write(&mut self, txn_id: u64, seq_num: u64, data_len: u64, time: u64) {
        let msg = format!("{}:{}:{}", txn_id, seq_num, data_len);
        self.write_entry(WRITE_LOG_ENTRY, &msg, time);
    }

    fn write_entry(&mut self, kind: &str, msg: &str, time: u64) {
        let line = format!("{}:{}\t{}\n", kind, time, msg);
        let res = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush());

        if let Err(e) = res {
            // The system cannot recover without its log; a server that lost
            // it must not keep serving.
            tracing::error!("event log append failed on {:?}: {}", self.path, e);
            std::process::exit(1);
        }
    }

    /// Replay all entries from a log file. Malformed lines are skipped with
    /// a warning; an absent file replays nothing.
    pub fn replay<F>(path: impl AsRef<Path>, mut callback: F) -> Result<()>
    where
        F: FnMut(ParsedEntry) -> Result<()>,
    {
        let file = match File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match line.parse::<ParsedEntry>() {
                Ok(entry) => callback(entry)?,
                Err(e) => tracing::warn!("skipping malformed log line: {}", e),
            }
        }

        Ok(())
    }
}

/// A decoded log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEntry {
    Transaction {
        txn_id: u64,
        state_code: u8,
        file_name: String,
        time: u64,
    },
    Read {
        file_name: String,
        time: u64,
    },
    Write {
        txn_id: u64,
        seq_num: u64,
        data_len: u64,
        time: u64,
    },
}

impl FromStr for ParsedEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let (head, body) = line
            .split_once('\t')
            .ok_or_else(|| Error::Log(format!("no tab separator: {}", line)))?;
        let (kind, time) = head
            .split_once(':')
            .ok_or_else(|| Error::Log(format!("no kind separator: {}", head)))?;
        let time: u64 = time
            .parse()
            .map_err(|_| Error::Log(format!("bad timestamp: {}", head)))?;

        match kind {
            READ_LOG_ENTRY => Ok(ParsedEntry::Read {
                file_name: body.to_string(),
                time,
            }),
            TRANSACTION_LOG_ENTRY => {
                let mut parts = body.splitn(3, ':');
                let txn_id = next_field(&mut parts, body)?;
                let state_code = next_field(&mut parts, body)?;
                let file_name = parts
                    .next()
                    .ok_or_else(|| Error::Log(format!("short TRXN entry: {}", body)))?;
                Ok(ParsedEntry::Transaction {
                    txn_id,
                    state_code,
                    file_name: file_name.to_string(),
                    time,
                })
            }
            WRITE_LOG_ENTRY => {
                let mut parts = body.splitn(3, ':');
                let txn_id = next_field(&mut parts, body)?;
                let seq_num = next_field(&mut parts, body)?;
                let data_len = next_field(&mut parts, body)?;
                Ok(ParsedEntry::Write {
                    txn_id,
                    seq_num,
                    data_len,
                    time,
                })
            }
            other => Err(Error::Log(format!("unknown entry kind: {}", other))),
        }
    }
}

fn next_field<'a, T: FromStr>(
    parts: &mut impl Iterator<Item = &'a str>,
    body: &str,
) -> Result<T> {
    parts
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::Log(format!("bad entry field in: {}", body)))
}
