//! Wreck Arena - multiplayer wrecking-ball ship arena
//!
//! The simulation in [`game`] is shared by the authoritative server (room,
//! match state machine, HTTP and WebSocket plumbing) and the predictive
//! [`client`].

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
