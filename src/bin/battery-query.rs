#[path = "../bin_common.rs"]
mod common;

use battery_exporter::{BatteryRegistry, DEFAULT_MAX_DEVICES, DeviceBackend};
use clap::Parser;
use common::print_battery_info;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "battery-query")]
#[command(about = "Print everything the battery class driver reports about each battery")]
struct Args {
    /// Number of battery device indices to probe
    #[arg(short, long, default_value_t = DEFAULT_MAX_DEVICES)]
    max_devices: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args = Args::parse();

    #[cfg(windows)]
    {
        query(args, Arc::new(battery_exporter::WindowsBackend::new()))
    }

    #[cfg(not(windows))]
    {
        let _ = args;
        Err("the battery device class is only available on Windows".into())
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
fn query<B: DeviceBackend>(args: Args, backend: Arc<B>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning up to {} battery devices...\n", args.max_devices);
    let batteries = BatteryRegistry::discover(backend, args.max_devices);
    if batteries.is_empty() {
        return Err("No batteries found!".into());
    }

    for (id, handle) in batteries.iter() {
        print_battery_info(id, handle);
    }

    Ok(())
}
