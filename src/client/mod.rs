//! Predictive client: local simulation plus interpolated remote players

pub mod remote;
pub mod session;

pub use remote::{RemoteBall, RemotePlayer};
pub use session::{ClientPhase, ClientSession};
