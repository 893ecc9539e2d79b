use crate::query::BatteryReading;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;
use uom::si::electric_potential::volt;
use uom::si::energy::watt_hour;
use uom::si::power::watt;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BatteryLabels {
    pub id: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BuildInfoLabels {
    pub version: String,
}

type GaugeFamily = Family<BatteryLabels, Gauge<f64, AtomicU64>>;

#[derive(Default)]
pub struct PrometheusMetrics {
    pub power_state: GaugeFamily,
    pub temperature: GaugeFamily,
    pub designed_capacity: GaugeFamily,
    pub available: GaugeFamily,
    pub full_charged_capacity: GaugeFamily,
    pub voltage: GaugeFamily,
    pub cycle_count: GaugeFamily,
    pub rate: GaugeFamily,
    pub build_info: Family<BuildInfoLabels, Gauge<f64, AtomicU64>>,
}

impl PrometheusMetrics {
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "battery_power_state",
            "battery state in bitmask (1: power on line, 2: discharging, 4: charging, 8: critical)",
            self.power_state.clone(),
        );
        registry.register(
            "battery_temperature",
            "battery temperature in Celsius",
            self.temperature.clone(),
        );
        registry.register(
            "battery_designed_capacity",
            "battery designed capacity in Wh",
            self.designed_capacity.clone(),
        );
        registry.register(
            "battery_available",
            "battery available capacity in Wh",
            self.available.clone(),
        );
        registry.register(
            "battery_full_charged_capacity",
            "battery full charged capacity in Wh",
            self.full_charged_capacity.clone(),
        );
        registry.register(
            "battery_voltage",
            "battery voltage in volts",
            self.voltage.clone(),
        );
        registry.register("battery_cycle", "battery cycle count", self.cycle_count.clone());
        registry.register(
            "battery_rate",
            "battery rate in Watt (+: charging, -: discharging)",
            self.rate.clone(),
        );
        registry.register(
            "battery_exporter_build_info",
            "battery exporter build information",
            self.build_info.clone(),
        );

        self.build_info
            .get_or_create(&BuildInfoLabels {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .set(1.0);
    }

    /// Publish one reading. Anything the poll could not obtain is removed so
    /// a stale value from an earlier scrape is never exposed.
    pub fn update(&self, id: &str, reading: &BatteryReading) {
        let labels = BatteryLabels { id: id.to_string() };

        let info = reading.information.as_ref();
        set_or_remove(
            &self.designed_capacity,
            &labels,
            info.and_then(|i| i.designed_capacity())
                .map(|e| e.get::<watt_hour>()),
        );
        set_or_remove(
            &self.full_charged_capacity,
            &labels,
            info.and_then(|i| i.full_charged_capacity())
                .map(|e| e.get::<watt_hour>()),
        );
        set_or_remove(
            &self.cycle_count,
            &labels,
            info.map(|i| i.cycle_count as f64),
        );

        let status = reading.status.as_ref();
        set_or_remove(
            &self.power_state,
            &labels,
            status.map(|s| s.power_state.bits() as f64),
        );
        set_or_remove(
            &self.available,
            &labels,
            status.and_then(|s| s.capacity()).map(|e| e.get::<watt_hour>()),
        );
        set_or_remove(
            &self.voltage,
            &labels,
            status.and_then(|s| s.voltage()).map(|v| v.get::<volt>()),
        );
        set_or_remove(
            &self.rate,
            &labels,
            status.and_then(|s| s.rate()).map(|p| p.get::<watt>()),
        );

        set_or_remove(&self.temperature, &labels, reading.temperature);
    }

    /// Drop every series of a battery that is no longer registered.
    pub fn forget(&self, id: &str) {
        let labels = BatteryLabels { id: id.to_string() };
        for family in [
            &self.power_state,
            &self.temperature,
            &self.designed_capacity,
            &self.available,
            &self.full_charged_capacity,
            &self.voltage,
            &self.cycle_count,
            &self.rate,
        ] {
            family.remove(&labels);
        }
    }
}

fn set_or_remove(family: &GaugeFamily, labels: &BatteryLabels, value: Option<f64>) {
    match value {
        Some(v) => {
            family.get_or_create(labels).set(v);
        }
        None => {
            family.remove(labels);
        }
    }
}
