//! Replica store binary

use clap::{Parser, Subcommand};
use repfs::common::Config;
use repfs::ReplicaServer;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repfs-replica")]
#[command(about = "repfs replica store - chunk cache and assembled files")]
struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start replica server
    Serve {
        /// Unique replica name
        #[arg(long, default_value = "rep-1")]
        id: String,

        /// Bind address for the replica surface
        #[arg(long, default_value = "0.0.0.0:6000")]
        bind: String,

        /// Working directory
        #[arg(long, default_value = "./replica-data")]
        data: PathBuf,
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
        Commands::Serve { id, bind, data } => {
            let mut config = file_config.replica.unwrap_or_default();
            config.bind_addr = bind.parse()?;
            config.data_dir = data;

            ReplicaServer::new(config, id).serve().await?;
        }
    }

    Ok(())
}
