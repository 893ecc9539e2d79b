pub mod collector;
pub mod decode;
pub mod device;
pub mod error;
pub mod handle;
pub mod ioctl;
pub mod query;
pub mod registry;

#[cfg(windows)]
pub mod windows;

#[cfg(test)]
mod sim;

pub use decode::{escape_unique_id, kelvin_tenths_to_celsius};
pub use device::{DeviceBackend, RawHandle};
pub use error::{BatteryError, EnumerationStep, Result};
pub use handle::{BatteryTag, DeviceHandle};
pub use ioctl::{
    BatteryInformation, BatteryStatus, Capabilities, InformationLevel, IoctlCode, PowerState,
};
pub use query::{BatteryReading, poll_battery};
pub use registry::{BatteryRegistry, DEFAULT_MAX_DEVICES};

#[cfg(windows)]
pub use windows::WindowsBackend;
