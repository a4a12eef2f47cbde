//! HTTP surface: health, websocket upgrade and admin overrides

pub mod middleware;
pub mod routes;

pub use routes::build_router;
