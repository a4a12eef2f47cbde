//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tokio::sync::oneshot;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::app::AppState;
use crate::game::RoomCommand;
use crate::http::middleware::require_admin;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

const STOP_MESSAGE: &str = "Match stopped by administrator";

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origins);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Operator overrides (admin token required)
    let admin_routes = Router::new()
        .route("/admin/stop", post(admin_stop_handler))
        .route("/admin/start", post(admin_start_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, or any origin when none are set
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();
    base.allow_origin(allowed).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    phase: &'static str,
    players: usize,
    time_remaining: Option<u64>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let room = state.room.status();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        phase: room.phase,
        players: room.players,
        time_remaining: room.time_remaining,
    })
}

// ============================================================================
// Admin endpoints
// ============================================================================

#[derive(Serialize)]
struct AdminResponse {
    success: bool,
    message: String,
}

async fn admin_stop_handler(State(state): State<AppState>) -> Result<Json<AdminResponse>, AppError> {
    let (reply, rx) = oneshot::channel();
    state
        .room
        .commands
        .send(RoomCommand::AdminStop {
            message: STOP_MESSAGE.to_string(),
            reply,
        })
        .await
        .map_err(|_| AppError::RoomUnavailable)?;

    let stopped = rx.await.map_err(|_| AppError::RoomUnavailable)?;
    info!(stopped, "Admin stop");

    Ok(Json(AdminResponse {
        success: stopped,
        message: if stopped {
            "Match stopped".to_string()
        } else {
            "No match was running".to_string()
        },
    }))
}

async fn admin_start_handler(State(state): State<AppState>) -> Result<Json<AdminResponse>, AppError> {
    let (reply, rx) = oneshot::channel();
    state
        .room
        .commands
        .send(RoomCommand::AdminStart { reply })
        .await
        .map_err(|_| AppError::RoomUnavailable)?;

    let started = rx.await.map_err(|_| AppError::RoomUnavailable)?;
    info!(started, "Admin start");

    if !started {
        return Err(AppError::Conflict(
            "A match is already running or the room is empty".to_string(),
        ));
    }

    Ok(Json(AdminResponse {
        success: true,
        message: "Countdown started".to_string(),
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Room unavailable")]
    RoomUnavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RoomUnavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
