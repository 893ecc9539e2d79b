use crate::collector::PrometheusMetrics;
use crate::device::DeviceBackend;
use crate::registry::BatteryRegistry;
use std::sync::{Mutex, PoisonError};

/// Something that refreshes metric values right before a scrape is encoded.
pub trait Collect: Send + Sync + 'static {
    fn collect(&self);
}

/// Polls every registered battery and publishes the readings.
///
/// The registry sits behind a mutex so overlapping scrapes never query the
/// same device handle from two threads at once.
pub struct BatteryCollector<B: DeviceBackend> {
    batteries: Mutex<BatteryRegistry<B>>,
    metrics: PrometheusMetrics,
}

impl<B: DeviceBackend> BatteryCollector<B> {
    pub fn new(batteries: BatteryRegistry<B>, metrics: PrometheusMetrics) -> Self {
        Self {
            batteries: Mutex::new(batteries),
            metrics,
        }
    }

    pub fn metrics(&self) -> &PrometheusMetrics {
        &self.metrics
    }

    pub fn battery_count(&self) -> usize {
        self.lock().len()
    }

    /// Release every battery handle and withdraw their series.
    pub fn shutdown(&self) {
        let mut batteries = self.lock();
        for id in batteries.ids() {
            self.metrics.forget(id);
        }
        batteries.close_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatteryRegistry<B>> {
        self.batteries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: DeviceBackend + 'static> Collect for BatteryCollector<B> {
    fn collect(&self) {
        let batteries = self.lock();
        tracing::debug!("Polling {} batteries...", batteries.len());
        for (id, reading) in batteries.poll() {
            tracing::trace!(
                "Battery {}: info={} status={} temperature={:?}",
                id,
                reading.information.is_some(),
                reading.status.is_some(),
                reading.temperature
            );
            self.metrics.update(&id, &reading);
        }
    }
}
