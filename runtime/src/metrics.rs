//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the store runtime:
//! - Actions processed and rejected
//! - Time spent waiting for a key's lock
//! - Reducer execution time
//!
//! Business metrics (RSVPs, check-ins, ...) are recorded by the engine crate
//! through the same `metrics` facade, so one exporter serves both.
//!
//! # Example
//!
//! ```rust,no_run
//! use event_rsvp_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Render the current snapshot in Prometheus text format
//! let _text = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder.
///
/// Installs the global recorder, serves it over HTTP and renders snapshots.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the scrape endpoint listens on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the Prometheus recorder and serve `GET /metrics` on the address.
    ///
    /// Must be called from within a Tokio runtime; the HTTP listener runs as
    /// a spawned task on it.
    ///
    /// # Errors
    ///
    /// Returns error if there is no current runtime, or the exporter cannot
    /// be built (including when the address cannot be bound).
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs
    /// a warning and succeeds without a handle or listener.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
                    1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!(error = %e, "Metrics recorder already initialized, skipping re-initialization");
            return Ok(());
        }

        let addr = self.addr;
        runtime.spawn(async move {
            if let Err(_e) = exporter.await {
                // ExporterError (metrics-exporter-prometheus 0.15) implements neither Debug nor Display.
                tracing::error!(addr = %addr, "Metrics listener stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics exporter listening - scrape at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register runtime metric descriptions.
fn register_metrics() {
    describe_counter!(
        "store_actions_processed_total",
        "Total number of actions accepted by a reducer"
    );
    describe_counter!(
        "store_actions_rejected_total",
        "Total number of actions a reducer refused"
    );
    describe_histogram!(
        "store_lock_wait_duration_seconds",
        "Time spent waiting for a key's lock before reducing"
    );
    describe_histogram!(
        "store_reduce_duration_seconds",
        "Time taken to reduce an accepted action"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an accepted action.
    pub fn record_action(duration: Duration) {
        counter!("store_actions_processed_total").increment(1);
        histogram!("store_reduce_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected action.
    pub fn record_rejection() {
        counter!("store_actions_rejected_total").increment(1);
    }

    /// Record time spent waiting for a key's lock.
    pub fn record_lock_wait(duration: Duration) {
        histogram!("store_lock_wait_duration_seconds").record(duration.as_secs_f64());
    }
}
