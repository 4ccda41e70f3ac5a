//! # repfs
//!
//! A replicated, transactional network file store:
//! - Clients open a transaction against a named file, stream ordered write
//!   chunks, and commit or abort
//! - A coordinator fans every write out to all replica stores and serves
//!   reads from a randomly chosen replica
//! - Replicas assemble chunks at commit time, reporting any missing
//!   sequence numbers back to the client
//! - A standby mirrors all coordinator state and takes over transparently
//!   when the coordinator dies
//!
//! ## Architecture
//!
//! ```text
//!            ┌────────────┐  mirror every event  ┌─────────────┐
//! Client ───▶│ Coordinator│─────────────────────▶│   Standby   │
//!            │ (txn state)│◀── heartbeat probes ──│ (failover)  │
//!            └─────┬──────┘                      └─────────────┘
//!                  │ fan-out writes / commits / aborts
//!     ┌────────────┼──────────────┐
//!     │            │              │
//! ┌───▼──────┐ ┌───▼──────┐ ┌────▼─────┐
//! │ Replica 1│ │ Replica 2│ │ Replica 3│
//! │ cache +  │ │ cache +  │ │ cache +  │
//! │ files    │ │ files    │ │ files    │
//! └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a replica store
//! ```bash
//! repfs-replica serve --id rep-1 --bind 0.0.0.0:6000 --data ./rep1-data
//! ```
//!
//! ### Start the coordinator
//! ```bash
//! repfs-coord serve \
//!   --bind 0.0.0.0:5555 \
//!   --data ./coord-data \
//!   --replica-list ./ReplicaServers \
//!   --standby http://standby-host:4135
//! ```
//!
//! ### Start the standby
//! ```bash
//! repfs-standby serve \
//!   --bind 0.0.0.0:4135 \
//!   --data ./standby-data \
//!   --coordinator http://coord-host:5555 \
//!   --coordinator-port 5555 \
//!   --replica-list ./ReplicaServers
//! ```

pub mod common;
pub mod coordinator;
pub mod heartbeat;
pub mod replica;
pub mod standby;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::Coordinator;
pub use heartbeat::{HeartbeatMonitor, HeartbeatTarget};
pub use replica::{ReplicaServer, ReplicaStore};
pub use standby::Standby;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
