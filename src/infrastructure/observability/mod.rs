//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use self::metrics::{
    init_metrics, record_block_execution, record_block_timeout, record_chain_execution,
    PrometheusMetrics,
};
