//! HTTP server exposing the remote write endpoint, health checks and metrics.

pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;

pub use routes::{build_router, REMOTE_WRITE_PATH};
pub use state::AppState;
