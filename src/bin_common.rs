use battery_exporter::query::{
    query_estimated_time, query_information, query_status, query_string, query_temperature,
};
use battery_exporter::{DeviceBackend, DeviceHandle, InformationLevel, PowerState};
use std::net::SocketAddr;

#[allow(dead_code)]
pub fn print_battery_info<B: DeviceBackend>(id: &str, handle: &DeviceHandle<B>) {
    println!("═══════════════════════════════════════════════════════════");
    println!("Battery \"{}\"", id);
    println!("═══════════════════════════════════════════════════════════");
    println!("  Path: {}", handle.path());
    println!("  Tag: {}", handle.tag());

    let name = query_string(handle, InformationLevel::DeviceName).unwrap_or_default();
    let manufacturer = query_string(handle, InformationLevel::ManufactureName).unwrap_or_default();
    let serial = query_string(handle, InformationLevel::SerialNumber).unwrap_or_default();
    println!(
        "  Name: {}  Manufacturer: {}  Serial: {}",
        name, manufacturer, serial
    );

    match query_information(handle) {
        Ok(info) => {
            println!(
                "  Chemistry: {}  Rechargeable: {}  Capabilities: {:?}",
                info.chemistry(),
                info.is_rechargeable(),
                info.capabilities
            );
            let unit = if info.is_relative() { "" } else { " mWh" };
            println!(
                "  Designed: {}{}  Full charge: {}{}  Cycles: {}",
                info.designed_capacity, unit, info.full_charged_capacity, unit, info.cycle_count
            );
            println!(
                "  Alerts: {}/{}{}  Critical bias: {}{}",
                info.default_alert1, info.default_alert2, unit, info.critical_bias, unit
            );
        }
        Err(e) => println!("  Information: {}", e),
    }

    match query_status(handle) {
        Ok(status) => {
            print_power_state(status.power_state);
            println!(
                "  Capacity: {} mWh  Voltage: {} mV  Rate: {:+} mW",
                status.capacity, status.voltage, status.rate
            );
        }
        Err(e) => println!("  Status: {}", e),
    }

    match query_temperature(handle) {
        Ok(celsius) => println!("  Temperature: {:.1} °C", celsius),
        Err(e) => println!("  Temperature: {}", e),
    }

    match query_estimated_time(handle) {
        Ok(Some(remaining)) => {
            let minutes = remaining.as_secs() / 60;
            println!("  Estimated time: {}h {}m", minutes / 60, minutes % 60);
        }
        Ok(None) => println!("  Estimated time: unknown"),
        Err(e) => println!("  Estimated time: {}", e),
    }
    println!();
}

#[allow(dead_code)]
fn print_power_state(state: PowerState) {
    let flags: Vec<_> = state.iter_names().map(|(name, _)| name).collect();
    if flags.is_empty() {
        println!("  Power state: none");
    } else {
        println!("  Power state: {}", flags.join(", "));
    }
}

/// Parse a listen address. A bare `:port` listens on every interface.
#[allow(dead_code)]
pub fn parse_listen(s: &str) -> Result<SocketAddr, String> {
    let s = s.trim();
    if let Some(port) = s.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|e: std::num::ParseIntError| e.to_string())?;
        Ok(SocketAddr::from(([0, 0, 0, 0], port)))
    } else {
        s.parse()
            .map_err(|e: std::net::AddrParseError| e.to_string())
    }
}
