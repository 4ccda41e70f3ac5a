//! Common utilities and types shared across repfs

pub mod config;
pub mod error;
pub mod log;
pub mod proto;
pub mod utils;

pub use config::{
    load_replica_list, Config, CoordinatorConfig, ReplicaConfig, ReplicaDescriptor, StandbyConfig,
};
pub use error::{Error, Result};
pub use log::{EventLog, ParsedEntry};
pub use proto::{AddrUpdate, CommitOutcome, OpStatus};
pub use utils::{lan_ip, parse_duration, timestamp_now_millis, validate_file_name};
