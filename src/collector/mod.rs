pub mod exporter;
pub mod metrics;
pub mod server;

pub use exporter::{BatteryCollector, Collect};
pub use metrics::PrometheusMetrics;
pub use server::MetricsServer;
