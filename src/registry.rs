use crate::device::DeviceBackend;
use crate::error::BatteryError;
use crate::handle::DeviceHandle;
use crate::query::{BatteryReading, poll_battery, query_unique_id};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of device indices probed at startup. There is no way to ask the
/// class for its device count up front.
pub const DEFAULT_MAX_DEVICES: u32 = 10;

/// Open batteries keyed by their identifier.
///
/// Discovery happens once; afterwards every poll reuses the same handles.
/// Dropping the registry releases every handle.
pub struct BatteryRegistry<B: DeviceBackend> {
    backend: Arc<B>,
    batteries: BTreeMap<String, DeviceHandle<B>>,
}

impl<B: DeviceBackend> BatteryRegistry<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            batteries: BTreeMap::new(),
        }
    }

    /// Open every battery at indices `0..max_devices`.
    pub fn discover(backend: Arc<B>, max_devices: u32) -> Self {
        let mut registry = Self::new(backend);
        registry.scan(max_devices);
        registry
    }

    /// Probe indices `0..max_devices` and register what is found. Stops at
    /// the first index past the last present device.
    pub fn scan(&mut self, max_devices: u32) -> usize {
        let mut found = 0;
        let mut exhausted = false;

        for index in 0..max_devices {
            let handle = match DeviceHandle::acquire(self.backend.clone(), index) {
                Ok(handle) => handle,
                Err(e) if e.is_exhausted() => {
                    tracing::debug!("No battery at index {}, discovery finished", index);
                    exhausted = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Skipping battery at index {}: {}", index, e);
                    continue;
                }
            };

            let id = match query_unique_id(&handle) {
                Ok(id) => id,
                Err(e @ BatteryError::UnsupportedQuery { .. }) => {
                    tracing::info!("{}. Using index {} as the battery id", e, index);
                    index.to_string()
                }
                Err(e) => {
                    tracing::warn!("Unique id query failed: {}. Using index {}", e, index);
                    index.to_string()
                }
            };

            tracing::info!("Found battery \"{}\" at {}", id, handle.path());
            if self.batteries.insert(id.clone(), handle).is_some() {
                tracing::warn!("Battery id \"{}\" seen twice; keeping the later device", id);
            }
            found += 1;
        }

        if !exhausted && max_devices > 0 {
            tracing::warn!(
                "Stopped probing at {} devices; raise the limit if batteries are missing",
                max_devices
            );
        }

        found
    }

    /// Query every registered battery once.
    pub fn poll(&self) -> Vec<(String, BatteryReading)> {
        self.batteries
            .iter()
            .map(|(id, handle)| (id.clone(), poll_battery(handle)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&DeviceHandle<B>> {
        self.batteries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceHandle<B>)> {
        self.batteries.iter().map(|(id, h)| (id.as_str(), h))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.batteries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.batteries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batteries.is_empty()
    }

    /// Release every handle.
    pub fn close_all(&mut self) {
        let count = self.batteries.len();
        self.batteries.clear();
        if count > 0 {
            tracing::info!("Closed {} battery handle(s)", count);
        }
    }
}
