//! Replica server

use crate::common::{ReplicaConfig, Result};
use crate::replica::http::{create_router, ReplicaState};
use crate::replica::ReplicaStore;
use std::sync::Arc;

pub struct ReplicaServer {
    config: ReplicaConfig,
    replica_id: String,
}

impl ReplicaServer {
    pub fn new(config: ReplicaConfig, replica_id: String) -> Self {
        Self { config, replica_id }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting replica store: {}", self.replica_id);
        tracing::info!("  RPC API: {}", self.config.bind_addr);
        tracing::info!("  Data dir: {}", self.config.data_dir.display());

        let store = Arc::new(ReplicaStore::open(
            &self.config.data_dir,
            self.config.max_read_bytes,
        )?);

        let router = create_router(ReplicaState {
            store,
            replica_id: self.replica_id.clone(),
        });

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Replica store ready");

        axum::serve(listener, router).await?;
        Ok(())
    }
}
