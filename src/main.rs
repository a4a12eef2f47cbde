//! Wreck Arena Server - authoritative room for the wrecking-ball arena
//!
//! Serves the WebSocket game endpoint, the health check and the admin
//! override routes, and runs the single room task.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wreck_arena::app::AppState;
use wreck_arena::config::Config;
use wreck_arena::game::level::LevelGenerator;
use wreck_arena::game::{MatchController, Room};
use wreck_arena::http::build_router;
use wreck_arena::util::time::{init_server_time, unix_millis};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Wreck Arena Server");
    info!("Server address: {}", config.server_addr);
    info!(
        level_type = ?config.level_type,
        width = config.level_width,
        height = config.level_height,
        match_duration_secs = config.match_duration_secs,
        "Arena configured"
    );
    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN not set, admin routes are disabled");
    }

    // Spawn the room
    let controller = MatchController::new(
        config.match_rules(),
        LevelGenerator::new(config.level_width, config.level_height, config.level_type),
        unix_millis(),
    );
    let (room, handle) = Room::new(controller);
    tokio::spawn(room.run());

    // Build router
    let state = AppState::new(config.clone(), handle);
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
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
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
