//! Prometheus metrics collection for boardd.
//!
//! Exposed on the `/metrics` HTTP endpoint when a metrics port is set.
//!
//! - `board_requests_total{service}` - Client requests handled by service
//! - `board_request_duration_seconds{service}` - Request latency histogram
//! - `board_request_errors_total{service,kind}` - Error replies by kind
//! - `board_replication_pushes_total{result}` - Replication sends to peers
//! - `board_elections_total{outcome}` - Elections run by this node
//! - `board_clock_offset_seconds` - Last Berkeley offset estimate
//! - `board_membership_servers` - Live servers known to the authority

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Request handling
// ========================================================================

pub static REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

pub static REQUEST_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

pub static REQUEST_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Coordination
// ========================================================================

/// Replication sends, labelled `ok`, `failed` or `no_membership`.
pub static REPLICATION_PUSHES: OnceLock<IntCounterVec> = OnceLock::new();

/// Elections, labelled by outcome.
pub static ELECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

pub static CLOCK_OFFSET: OnceLock<Gauge> = OnceLock::new();

pub static MEMBERSHIP_SERVERS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize all metrics and register them with the global registry.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(REQUESTS, IntCounterVec::new(Opts::new("board_requests_total", "Client requests handled by service"), &["service"]));
    register!(REQUEST_LATENCY, HistogramVec::new(
        HistogramOpts::new("board_request_duration_seconds", "Client request latency by service")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["service"]));
    register!(REQUEST_ERRORS, IntCounterVec::new(Opts::new("board_request_errors_total", "Error replies by service and kind"), &["service", "kind"]));
    register!(REPLICATION_PUSHES, IntCounterVec::new(Opts::new("board_replication_pushes_total", "Replication sends to peers"), &["result"]));
    register!(ELECTIONS, IntCounterVec::new(Opts::new("board_elections_total", "Elections run by this node"), &["outcome"]));
    register!(CLOCK_OFFSET, Gauge::new("board_clock_offset_seconds", "Estimated offset from the coordinator clock"));
    register!(MEMBERSHIP_SERVERS, IntGauge::new("board_membership_servers", "Live servers in the membership map"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helpers (no-ops until `init` has run)
// ============================================================================

/// Record a handled request with its latency.
#[inline]
pub fn record_request(service: &str, duration_secs: f64) {
    if let Some(c) = REQUESTS.get() {
        c.with_label_values(&[service]).inc();
    }
    if let Some(h) = REQUEST_LATENCY.get() {
        h.with_label_values(&[service]).observe(duration_secs);
    }
}

/// Record an error reply (or a dropped request).
#[inline]
pub fn record_request_error(service: &str, kind: &str) {
    if let Some(c) = REQUEST_ERRORS.get() {
        c.with_label_values(&[service, kind]).inc();
    }
}

#[inline]
pub fn record_replication(result: &str) {
    if let Some(c) = REPLICATION_PUSHES.get() {
        c.with_label_values(&[result]).inc();
    }
}

#[inline]
pub fn record_election(outcome: &str) {
    if let Some(c) = ELECTIONS.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn set_clock_offset(offset: f64) {
    if let Some(g) = CLOCK_OFFSET.get() {
        g.set(offset);
    }
}

#[inline]
pub fn set_membership_servers(count: usize) {
    if let Some(g) = MEMBERSHIP_SERVERS.get() {
        g.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        // Safe to call more than once; later calls only log.
        init();
        init();

        record_request("login", 0.001);
        record_request_error("login", "user_exists");
        record_election("won");

        let output = gather_metrics();
        assert!(output.contains("board_requests_total"));
        assert!(output.contains("board_request_errors_total"));
        assert!(output.contains("board_elections_total"));
    }
}
