use crate::ioctl::{InformationLevel, IoctlCode};
use std::fmt;

/// Which SetupAPI step of the class enumeration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationStep {
    ClassDevices,
    InterfaceRecord,
    InterfaceDetail,
}

impl fmt::Display for EnumerationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumerationStep::ClassDevices => write!(f, "SetupDiGetClassDevs"),
            EnumerationStep::InterfaceRecord => write!(f, "SetupDiEnumDeviceInterfaces"),
            EnumerationStep::InterfaceDetail => write!(f, "SetupDiGetDeviceInterfaceDetail"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatteryError {
    #[error("no battery device at index {index}")]
    EnumerationExhausted { index: u32 },

    #[error("{step} failed: {source}")]
    EnumerationFailed {
        step: EnumerationStep,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {path}: {source}")]
    DeviceOpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to acquire battery tag for {path}: {source}")]
    TagAcquisitionFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{code} failed: {source}")]
    ExchangeFailed {
        code: IoctlCode,
        #[source]
        source: std::io::Error,
    },

    #[error("{code} returned {actual} bytes, expected {expected}")]
    ShortResponse {
        code: IoctlCode,
        expected: usize,
        actual: usize,
    },

    #[error("device does not support {level} queries")]
    UnsupportedQuery { level: InformationLevel },
}

impl BatteryError {
    /// True when the error only marks the end of the present devices.
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, BatteryError::EnumerationExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, BatteryError>;
