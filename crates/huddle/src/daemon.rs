//! Daemon command: connect every team and run the scheduler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use miette::Result;
use tokio::sync::watch;
use tracing::{info, warn};

use huddle_scheduler::{Engine, EngineConfig, Scheduler};
use huddle_store::Store;

/// Configuration for the daemon.
pub struct DaemonConfig {
    pub database: PathBuf,
    pub slack_api_url: String,
    pub root_url: String,
    pub startup_grace: Duration,
    pub command: String,
}

/// Open the store, connect every team and run the scheduler until Ctrl-C.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let store = Store::open(&config.database)
        .map_err(|e| miette::miette!("failed to open {}: {}", config.database.display(), e))?;

    let engine = Engine::new(
        Arc::new(store),
        EngineConfig {
            root_url: config.root_url,
            command: config.command,
            ..EngineConfig::default()
        },
    );

    let connected = engine
        .connect_all(&config.slack_api_url)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    if connected == 0 {
        warn!("no teams connected, rounds will not be posted until a team is added");
    } else {
        info!(teams = connected, "connected teams");
    }

    let scheduler = Scheduler::new(engine)
        .map_err(|e| miette::miette!("{}", e))?
        .with_startup_grace(config.startup_grace);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}
