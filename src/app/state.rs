//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::RoomHandle;
use crate::util::rate_limit::{create_limiter, Limiter, ADMIN_RATE_LIMIT};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub room: RoomHandle,
    /// Server-wide limit on admin override requests
    pub admin_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config, room: RoomHandle) -> Self {
        Self {
            config: Arc::new(config),
            room,
            admin_limiter: create_limiter(ADMIN_RATE_LIMIT),
        }
    }
}
