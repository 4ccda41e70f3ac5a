//! Coordinator binary

use clap::{Parser, Subcommand};
use repfs::common::{parse_duration, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repfs-coord")]
#[command(about = "repfs coordinator - transactional file store front end")]
struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start coordinator server
    Serve {
        /// Bind address for the RPC surface
        #[arg(long, default_value = "0.0.0.0:5555")]
        bind: String,

        /// Working directory
        #[arg(long, default_value = "./coord-data")]
        data: PathBuf,

        /// Replica list file (TSV: host, port, unique name)
        #[arg(long, default_value = "./ReplicaServers")]
        replica_list: PathBuf,

        /// Standby mirror endpoint
        #[arg(long)]
        standby: Option<String>,

        /// Idle-transaction timeout (e.g. 60s, 2m)
        #[arg(long, default_value = "60s")]
        idle_timeout: String,

        /// Idle sweep interval (e.g. 5s)
        #[arg(long, default_value = "5s")]
        sweep_interval: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let file_config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            data,
            replica_list,
            standby,
            idle_timeout,
            sweep_interval,
        } => {
            // file config first, CLI flags on top
            let mut config = file_config.coordinator.unwrap_or_default();
            config.bind_addr = bind.parse()?;
            config.data_dir = data;
            config.replica_list = replica_list;
            if standby.is_some() {
                config.standby_url = standby;
            }
            config.idle_timeout_ms = parse_duration(&idle_timeout)?.as_millis() as u64;
            config.sweep_interval_ms = parse_duration(&sweep_interval)?.as_millis() as u64;

            repfs::coordinator::server::serve(config).await?;
        }
    }

    Ok(())
}
