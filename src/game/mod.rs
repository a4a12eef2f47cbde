//! Game simulation modules
//!
//! `rng`, `level`, `physics`, `collision`, `race` and `scoring` are the shared
//! simulation used by both the server and the predictive client. `match` and
//! `room` are the authoritative server side.

pub mod collision;
pub mod level;
pub mod r#match;
pub mod physics;
pub mod race;
pub mod rng;
pub mod room;
pub mod scoring;
pub mod snapshot;

pub use r#match::{MatchController, MatchPhase, Outbound, PlayerRecord, Recipient};
pub use room::{Room, RoomCommand, RoomHandle, RoomStatus};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player message received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
