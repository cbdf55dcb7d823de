//! HTTP handlers for different API endpoints.

pub mod health;
pub mod metrics;
pub mod remote_write;

// Re-export handlers for easier access
pub use health::{healthz, readyz};
pub use metrics::metrics;
pub use remote_write::remote_write;
