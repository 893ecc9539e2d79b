#[path = "../bin_common.rs"]
mod common;

use battery_exporter::collector::{BatteryCollector, MetricsServer, PrometheusMetrics};
use battery_exporter::{BatteryRegistry, DEFAULT_MAX_DEVICES, DeviceBackend};
use clap::Parser;
use common::parse_listen;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "battery-exporter")]
#[command(about = "Export Windows battery class telemetry as Prometheus metrics")]
struct Args {
    /// Metrics listen address (":9004" listens on all interfaces)
    #[arg(long, default_value = ":9004", value_parser = parse_listen)]
    listen: SocketAddr,

    /// Number of battery device indices probed at startup
    #[arg(long, default_value_t = DEFAULT_MAX_DEVICES)]
    max_devices: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    #[cfg(windows)]
    {
        run(args, Arc::new(battery_exporter::WindowsBackend::new())).await
    }

    #[cfg(not(windows))]
    {
        let _ = args;
        Err("the battery device class is only available on Windows".into())
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
async fn run<B: DeviceBackend + 'static>(
    args: Args,
    backend: Arc<B>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();

    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        cancel_signal.cancel();
    });

    tracing::info!("Discovering batteries (up to {} devices)...", args.max_devices);
    let max_devices = args.max_devices;
    let batteries =
        tokio::task::spawn_blocking(move || BatteryRegistry::discover(backend, max_devices))
            .await?;
    if batteries.is_empty() {
        tracing::warn!("No batteries found; serving build info only");
    } else {
        tracing::info!("Found {} battery(s)", batteries.len());
    }

    let metrics = PrometheusMetrics::default();
    let mut registry = Registry::default();
    metrics.register(&mut registry);
    let registry = Arc::new(registry);

    let collector = Arc::new(BatteryCollector::new(batteries, metrics));

    let server = MetricsServer::new(registry, collector.clone(), args.listen, cancel.clone());
    let result = server.run().await;

    collector.shutdown();
    tracing::info!("Shutdown complete");
    result.map_err(|e| e as Box<dyn std::error::Error>)
}
