//! Proximity Tracker - positional voice state for multiplayer sessions
//!
//! This is the main entry point for the tracker. It handles:
//! - Resolving every participant's ear/look vectors each tick
//! - Pairwise acoustic occlusion sampling
//! - Streaming snapshots to the spatial-audio mixing service
//!
//! The binary drives the tracker against the bundled simulation lobby;
//! production hosts embed the same modules behind their engine's frame
//! callback and world-query APIs.

mod app;
mod config;
mod game;
mod settings;
mod sim;
mod sync;
mod util;

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::{RayTrace, TickOrchestrator, WorldQuery};
use crate::sim::SimLobby;
use crate::sync::session::{SessionConfig, SyncSession};
use crate::util::time::frame_duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Proximity Tracker");
    info!("Mixer endpoint: {}", config.mixer_url);
    info!(
        "Advertised game server: {}:{}",
        config.advertised_addr, config.advertised_port
    );

    // Create application state
    let state = AppState::new(config.clone());

    // The simulation lobby doubles as world-query and ray-trace host.
    let lobby = Arc::new(SimLobby::new(config.sim_bots, config.sim_seed));
    info!(bots = config.sim_bots, seed = config.sim_seed, "simulation lobby ready");

    // Spawn the sync session
    let session_cfg = SessionConfig::new(
        state.config.mixer_url.clone(),
        state.config.api_key.clone(),
        state.config.advertised_addr.clone(),
        state.config.advertised_port,
    );
    let (session, session_handle) = SyncSession::new(
        session_cfg,
        state.settings.clone(),
        state.store.clone(),
        lobby.map_name(),
    );
    let session_task = tokio::spawn(session.run());

    let mut orchestrator = TickOrchestrator::new(
        lobby.clone() as Arc<dyn WorldQuery>,
        lobby.clone() as Arc<dyn RayTrace>,
        state.store.clone(),
        session_handle,
        config.fake_participants,
        config.admin_flags.clone(),
    );

    // Frame loop
    let frame = frame_duration();
    let mut ticker = interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                lobby.advance(frame.as_secs_f64());
                orchestrator.on_frame();
            }
            _ = &mut shutdown => break,
        }
    }

    session_task.abort();
    let _ = session_task.await;

    info!("Tracker shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
