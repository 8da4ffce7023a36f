//! kumi-server entry point.
//!
//! Boots the compile cache, artifact server and share endpoints over HTTP.
//! Logs are JSON on stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use kumi_core::{
    AppConfig, ArtifactServer, Codec, CommandCompiler, CompileCache, Database, MemoryStore, ShareManager,
    VolatileBackend, VolatileStore,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod routes;
mod sweeper;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let command = config.require_compiler_command()?;
    let compiler = CommandCompiler::from_command_line(command, config.compiler_timeout())
        .context("compiler_command has no program")?;

    let db = Arc::new(
        Database::open(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );
    let volatile: Arc<dyn VolatileStore> = match config.volatile_backend {
        VolatileBackend::Sqlite => db.clone(),
        VolatileBackend::Memory => Arc::new(MemoryStore::new(config.memory_max_entries)),
    };
    let keys = config.key_scheme();

    let state = handler::AppState {
        compile: Arc::new(
            CompileCache::new(volatile.clone(), Arc::new(compiler), keys.clone())
                .with_ttl(config.compile_ttl())
                .with_single_flight(config.single_flight),
        ),
        artifacts: Arc::new(ArtifactServer::new(volatile.clone(), keys.clone())),
        shares: Arc::new(
            ShareManager::new(volatile.clone(), db, keys)
                .with_codec(Codec::new(config.brotli_quality))
                .with_ttl(config.share_ttl()),
        ),
        public_base_url: config.public_base_url.clone(),
    };

    let sweeper = sweeper::spawn(volatile, config.sweep_interval());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        compiler = command,
        compiler_version = %config.compiler_version,
        backend = ?config.volatile_backend,
        "Starting kumi server"
    );

    axum::serve(listener, handler::router(state, config.max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("kumi server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
