//! Command-line driver for the statesync engine.
//!
//! A local JSON file stands in for the host application's state container:
//! - `pull` loads the remote state and writes it to the file
//! - `push` replaces the remote state with the file's content
//! - `metadata` shows the backing file without provisioning one
//! - `watch` mirrors local edits to the remote file, saved by autosave

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use statesync_core::SaveStatus;
use statesync_engine::{MemoryObservableStore, SyncEngine};
use statesync_http::{local, HttpProjectFileClient, LogHooks};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{Command, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting statesync v{}", env!("CARGO_PKG_VERSION"));
    info!("  Service: {}", config.base_url);
    info!("  Project: {}", config.project_id);
    info!(
        "  Key: {}{}",
        config.storage_key,
        if config.per_user { " (per user)" } else { "" }
    );
    if config.token.is_none() {
        warn!("  No token configured; remote calls will fail (set STATESYNC_TOKEN)");
    }

    let client =
        Arc::new(HttpProjectFileClient::new(&config.base_url)?.with_token(config.token.clone()));
    let store = Arc::new(MemoryObservableStore::default());
    let engine = SyncEngine::new(store.clone(), client, config.engine_config())?;
    engine.set_host(Arc::new(LogHooks));

    let result = match &config.command {
        Command::Pull { path } => pull(&engine, &store, path).await,
        Command::Push { path } => push(&engine, &store, path).await,
        Command::Metadata => metadata(&engine).await,
        Command::Watch { path, poll_secs } => {
            watch(&engine, &store, path, Duration::from_secs(*poll_secs)).await
        }
    };

    engine.destroy();
    result
}

async fn pull(
    engine: &Arc<SyncEngine>,
    store: &MemoryObservableStore,
    path: &Path,
) -> anyhow::Result<()> {
    if !engine.set_environment_ready().await {
        anyhow::bail!("Could not load the remote state");
    }
    local::write_state(path, &local::user_state(store)).await?;
    info!("Wrote remote state to {}", path.display());
    Ok(())
}

async fn push(
    engine: &Arc<SyncEngine>,
    store: &MemoryObservableStore,
    path: &Path,
) -> anyhow::Result<()> {
    let state = local::read_state(path).await?;
    if !engine.set_environment_ready().await {
        anyhow::bail!("Could not load the remote state");
    }

    if !local::apply_state(store, state) && engine.status() == SaveStatus::Saved {
        info!("Remote state already matches {}", path.display());
        return Ok(());
    }

    let outcome = engine.save().await;
    if !outcome.is_success() {
        anyhow::bail!("Push failed: {:?}", outcome);
    }
    info!("Pushed {} to the remote state", path.display());
    Ok(())
}

async fn metadata(engine: &SyncEngine) -> anyhow::Result<()> {
    match engine.file_metadata().await {
        Some(metadata) => {
            println!("file: {}", metadata.name);
            match metadata.modified_at {
                Some(modified_at) => println!("modified: {}", modified_at.to_rfc3339()),
                None => println!("modified: unknown"),
            }
        }
        None => println!("No backing file yet"),
    }
    Ok(())
}

async fn watch(
    engine: &Arc<SyncEngine>,
    store: &MemoryObservableStore,
    path: &Path,
    poll: Duration,
) -> anyhow::Result<()> {
    if !engine.set_environment_ready().await {
        anyhow::bail!("Could not load the remote state");
    }
    local::write_state(path, &local::user_state(store)).await?;
    info!("Watching {} (poll every {}s)", path.display(), poll.as_secs());

    let mut ticker = tokio::time::interval(poll);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match local::read_state(path).await {
                    Ok(state) => {
                        if local::apply_state(store, state) {
                            info!("Local change detected in {}", path.display());
                        }
                    }
                    Err(e) => warn!("Skipping unreadable {}: {:#}", path.display(), e),
                }
            }
        }
    }

    if engine.status() != SaveStatus::Saved {
        info!("Saving pending changes before exit");
        let outcome = engine.save().await;
        if !outcome.is_success() {
            anyhow::bail!("Final save failed: {:?}", outcome);
        }
    }
    info!("Watch stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, stopping");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
        info!("Received SIGTERM, stopping");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
