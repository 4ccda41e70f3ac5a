//! Standby binary

use clap::{Parser, Subcommand};
use repfs::common::{parse_duration, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repfs-standby")]
#[command(about = "repfs standby - mirrors the coordinator and takes over on failure")]
struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start standby server
    Serve {
        /// Bind address for the mirror surface
        #[arg(long, default_value = "0.0.0.0:4135")]
        bind: String,

        /// Working directory
        #[arg(long, default_value = "./standby-data")]
        data: PathBuf,

        /// Base URL of the watched coordinator
        #[arg(long, default_value = "http://localhost:5555")]
        coordinator: String,

        /// Port the promoted coordinator binds and announces
        #[arg(long, default_value = "5555")]
        coordinator_port: u16,

        /// Replica list file, needed when promoting
        #[arg(long, default_value = "./ReplicaServers")]
        replica_list: PathBuf,

        /// Interval between liveness probes (e.g. 500ms)
        #[arg(long, default_value = "500ms")]
        heartbeat_period: String,
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
            coordinator,
            coordinator_port,
            replica_list,
            heartbeat_period,
        } => {
            let mut config = file_config.standby.unwrap_or_default();
            config.bind_addr = bind.parse()?;
            config.data_dir = data;
            config.coordinator_url = coordinator;
            config.coordinator_port = coordinator_port;
            config.replica_list = replica_list;
            config.heartbeat_period_ms = parse_duration(&heartbeat_period)?.as_millis() as u64;

            repfs::standby::server::serve(config).await?;
        }
    }

    Ok(())
}
