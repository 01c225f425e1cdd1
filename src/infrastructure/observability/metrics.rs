//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Handle for rendering the Prometheus exposition text
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();

            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("block_engine_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

fn status_label(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

/// Record one block invocation
pub fn record_block_execution(block_type: &str, success: bool, duration: Duration) {
    let labels = [
        ("block_type", block_type.to_string()),
        ("status", status_label(success).to_string()),
    ];

    counter!("block_executions_total", &labels).increment(1);
    histogram!("block_execution_duration_seconds", "block_type" => block_type.to_string())
        .record(duration.as_secs_f64());
}

/// Record a block whose deadline elapsed
pub fn record_block_timeout(block_type: &str) {
    counter!("block_timeouts_total", "block_type" => block_type.to_string()).increment(1);
}

/// Record one chain run
pub fn record_chain_execution(success: bool, duration: Duration) {
    counter!("chain_executions_total", "status" => status_label(success)).increment(1);
    histogram!("chain_execution_duration_seconds").record(duration.as_secs_f64());
}
