//! Logging setup and metrics sink

use access_core::DecisionMetrics;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` level.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Decision metrics routed to the log.
pub struct LogMetrics;

impl DecisionMetrics for LogMetrics {
    fn record_decision(&self, outcome: &str) {
        debug!(outcome, "access decision");
    }

    fn record_latency(&self, seconds: f64) {
        debug!(seconds, "decision latency");
    }
}
