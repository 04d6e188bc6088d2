//! boardd - replicated bulletin-board daemon.
//!
//! Server nodes register with a membership authority, elect a coordinator
//! with the Bully algorithm, estimate clock skew Berkeley-style, and push
//! every accepted mutation to their peers on a best-effort basis. Clients
//! talk request/reply; publications fan out over a topic bus.

pub mod authority;
pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod network;
pub mod server;
pub mod state;
pub mod sync;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::server::NodeServer;
pub use crate::state::Node;

/// Initialize the global tracing subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}
