//! Telemetry utilities for request timing and span naming.

use std::time::Instant;

/// Guard for timing one request and recording metrics.
///
/// Records the latency when dropped.
pub struct RequestTimer {
    service: &'static str,
    start: Instant,
}

impl RequestTimer {
    /// Start timing a request for `service`.
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_request(self.service, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span around one client request.
    pub fn request(service: &str, format: &str) -> Span {
        debug_span!("request", service = %service, format = %format)
    }

    /// Span around a request from another server node.
    pub fn peer_request(endpoint: &str, service: &str) -> Span {
        debug_span!("peer_request", endpoint = %endpoint, service = %service)
    }

    /// Span for a node's background coordination tasks.
    pub fn node(name: &str) -> Span {
        info_span!("node", name = %name)
    }

    /// Span for one election run.
    pub fn election(name: &str, rank: u64) -> Span {
        info_span!("election", node = %name, rank)
    }
}
