//! Configuration for repfs components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Global configuration, loaded from a TOML file plus `REPFS_*` environment
/// overrides. Each binary picks its own section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Replica-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<ReplicaConfig>,

    /// Standby-specific config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standby: Option<StandbyConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from an optional TOML file, then apply
    /// `REPFS_*` environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(p) => builder.add_source(config::File::from(p)),
            None => builder.add_source(config::File::with_name("repfs").required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix("REPFS").separator("__"));

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the RPC surface
    pub bind_addr: SocketAddr,

    /// Working directory (event log lives under `log/`)
    pub data_dir: PathBuf,

    /// Replica list file (TSV: host, port, unique name)
    pub replica_list: PathBuf,

    /// Standby mirror endpoint, if a standby is deployed
    #[serde(default)]
    pub standby_url: Option<String>,

    /// STARTED transactions idle longer than this are force-aborted
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Sweep interval for the idle-transaction checker
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Per-call timeout toward replicas and the standby
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_ms: u64,
}

fn default_idle_timeout() -> u64 {
    60_000
}
fn default_sweep_interval() -> u64 {
    5_000
}
fn default_rpc_timeout() -> u64 {
    3_000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5555".parse().unwrap(),
            data_dir: PathBuf::from("./coord-data"),
            replica_list: PathBuf::from("./ReplicaServers"),
            standby_url: None,
            idle_timeout_ms: default_idle_timeout(),
            sweep_interval_ms: default_sweep_interval(),
            rpc_timeout_ms: default_rpc_timeout(),
        }
    }
}

/// Replica store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Bind address for the replica surface
    pub bind_addr: SocketAddr,

    /// Working directory (chunk cache under `cache/`, assembled files at top)
    pub data_dir: PathBuf,

    /// Upper bound for a single read
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: usize,
}

fn default_max_read_bytes() -> usize {
    4 * 1024 * 1024
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:6000".parse().unwrap(),
            data_dir: PathBuf::from("./replica-data"),
            max_read_bytes: default_max_read_bytes(),
        }
    }
}

/// Standby configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandbyConfig {
    /// Bind address for the mirror surface
    pub bind_addr: SocketAddr,

    /// Working directory for the standby's own event log
    pub data_dir: PathBuf,

    /// Liveness endpoint of the watched coordinator
    pub coordinator_url: String,

    /// Port the promoted coordinator binds and announces to clients
    pub coordinator_port: u16,

    /// Replica list file, needed when promoting
    pub replica_list: PathBuf,

    /// Interval between liveness probes
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period_ms: u64,

    /// Per-call timeout toward replicas and client callbacks
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_ms: u64,
}

fn default_heartbeat_period() -> u64 {
    500
}

impl Default for StandbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4135".parse().unwrap(),
            data_dir: PathBuf::from("./standby-data"),
            coordinator_url: "http://localhost:5555".to_string(),
            coordinator_port: 5555,
            replica_list: PathBuf::from("./ReplicaServers"),
            heartbeat_period_ms: default_heartbeat_period(),
            rpc_timeout_ms: default_rpc_timeout(),
        }
    }
}

/// One replica store endpoint. Loaded once at startup; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaDescriptor {
    pub host_name: String,
    pub port: u16,
    pub unique_name: String,
}

impl ReplicaDescriptor {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host_name, self.port)
    }
}

/// Read the replica list file: first line is a format comment, every
/// following line is tab-separated `host<TAB>port<TAB>unique_name`.
pub fn load_replica_list(path: impl AsRef<Path>) -> Result<Vec<ReplicaDescriptor>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut replicas = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let host_name = fields
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("replica list line {}: no host", idx + 1)))?
            .to_string();
        let port = fields
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("replica list line {}: bad port", idx + 1))
            })?;
        let unique_name = fields
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("replica list line {}: no name", idx + 1)))?
            .to_string();

        replicas.push(ReplicaDescriptor {
            host_name,
            port,
            unique_name,
        });
    }

    Ok(replicas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_replica_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ReplicaServers");
        std::fs::write(
            &path,
            "# host\tport\tunique_name\nlocalhost\t6000\trep-1\nlocalhost\t6001\trep-2\n",
        )
        .unwrap();

        let replicas = load_replica_list(&path).unwrap();
        assert_eq!(replicas.len(), 2);
        assert_eq!(replicas[0].host_name, "localhost");
        assert_eq!(replicas[0].port, 6000);
        assert_eq!(replicas[0].unique_name, "rep-1");
        assert_eq!(replicas[1].base_url(), "http://localhost:6001");
    }

    #[test]
    fn test_load_replica_list_bad_port() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ReplicaServers");
        std::fs::write(&path, "# comment\nlocalhost\tnot-a-port\trep-1\n").unwrap();

        assert!(load_replica_list(&path).is_err());
    }

    #[test]
    fn test_coordinator_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.idle_timeout_ms, 60_000);
        assert_eq!(config.sweep_interval_ms, 5_000);
        assert!(config.standby_url.is_none());
    }

    #[test]
    fn test_config_section_from_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repfs.toml");
        std::fs::write(
            &path,
            r#"
[replica]
bind_addr = "127.0.0.1:7100"
data_dir = "/tmp/rep"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        let replica = config.replica.unwrap();
        assert_eq!(replica.bind_addr, "127.0.0.1:7100".parse().unwrap());
        assert_eq!(replica.max_read_bytes, 4 * 1024 * 1024);
        assert!(config.coordinator.is_none());
    }
}
