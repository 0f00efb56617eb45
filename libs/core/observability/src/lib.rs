//! Observability utilities for the mail dispatch services.
//!
//! This crate provides:
//! - Prometheus recorder installation and rendering
//! - `DispatchMetrics`, the recording helpers used by the dispatcher
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, DispatchMetrics};
//!
//! init_metrics()?;
//! DispatchMetrics::record_sent("hosted_api", elapsed);
//! println!("{}", observability::render_metrics());
//! ```

pub mod dispatch;

pub use dispatch::DispatchMetrics;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus metrics recorder.
///
/// Call once at startup. Later calls return the handle installed by the
/// first one. Without a recorder the `metrics` macros are no-ops, so
/// libraries and tests may record freely without calling this.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the current metrics in the Prometheus text format.
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        dispatch::DISPATCH_TOTAL,
        "Email dispatch attempts by channel and outcome"
    );
    describe_histogram!(
        dispatch::DISPATCH_DURATION_SECONDS,
        "Time spent in a single dispatch attempt, in seconds"
    );
}
