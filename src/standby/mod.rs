//! Standby / failover controller
//!
//! Passively mirrors coordinator state for disaster recovery, watches the
//! coordinator's liveness, and promotes itself into a new coordinator when
//! the heartbeat goes quiet.

pub mod http;
pub mod server;

pub use server::{Standby, COORDINATOR_RESPONDER_ID};
