use crate::decode::{decode_string, decode_unique_id, kelvin_tenths_to_celsius};
use crate::device::DeviceBackend;
use crate::error::{BatteryError, Result};
use crate::handle::{BatteryTag, DeviceHandle};
use crate::ioctl::{
    BATTERY_UNKNOWN_TIME, BatteryInformation, BatteryStatus, InformationLevel, IoctlCode,
    MAX_STRING_UNITS, QueryInformation, WaitStatus, WireLayout,
};
use std::time::Duration;

// Win32 error codes a driver uses to reject an information level it does not
// implement.
const ERROR_INVALID_FUNCTION: i32 = 1;
const ERROR_NOT_SUPPORTED: i32 = 50;

/// One poll of one battery. Each query is attempted on its own, so a failure
/// only leaves its own field empty.
#[derive(Debug, Clone, Default)]
pub struct BatteryReading {
    pub information: Option<BatteryInformation>,
    pub status: Option<BatteryStatus>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
}

/// Send `input` with control code `code` and return how many bytes the device
/// wrote into `output`.
pub fn exchange<B: DeviceBackend>(
    handle: &DeviceHandle<B>,
    code: IoctlCode,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize> {
    handle
        .backend()
        .io_control(handle.raw(), code.code(), input, output)
        .map_err(|source| BatteryError::ExchangeFailed { code, source })
}

/// [`exchange`] for requests and responses with a fixed layout.
pub fn exchange_fixed<B, I, O>(handle: &DeviceHandle<B>, code: IoctlCode, input: &I) -> Result<O>
where
    B: DeviceBackend,
    I: WireLayout,
    O: WireLayout,
{
    let request = input.to_bytes();
    let mut response = vec![0u8; O::SIZE];
    let written = exchange(handle, code, &request, &mut response)?;
    if written < O::SIZE {
        return Err(BatteryError::ShortResponse {
            code,
            expected: O::SIZE,
            actual: written,
        });
    }
    Ok(O::decode(&response))
}

/// Ask the driver for the tag of the battery behind `handle`, without waiting.
pub fn query_tag<B: DeviceBackend>(handle: &DeviceHandle<B>) -> Result<BatteryTag> {
    let timeout_ms: u32 = 0;
    let tag: u32 = exchange_fixed(handle, IoctlCode::QueryTag, &timeout_ms)?;
    Ok(BatteryTag(tag))
}

pub fn query_information<B: DeviceBackend>(handle: &DeviceHandle<B>) -> Result<BatteryInformation> {
    let query = QueryInformation::new(handle.tag().0, InformationLevel::Information);
    exchange_fixed(handle, IoctlCode::QueryInformation, &query)
}

/// Battery temperature in degrees Celsius.
pub fn query_temperature<B: DeviceBackend>(handle: &DeviceHandle<B>) -> Result<f64> {
    let query = QueryInformation::new(handle.tag().0, InformationLevel::Temperature);
    let raw: u32 = exchange_fixed(handle, IoctlCode::QueryInformation, &query)?;
    Ok(kelvin_tenths_to_celsius(raw))
}

/// Estimated run time at the current drain, `None` when the driver cannot tell
/// (for instance while on AC power).
pub fn query_estimated_time<B: DeviceBackend>(handle: &DeviceHandle<B>) -> Result<Option<Duration>> {
    let query = QueryInformation::new(handle.tag().0, InformationLevel::EstimatedTime);
    let seconds: u32 = exchange_fixed(handle, IoctlCode::QueryInformation, &query)?;
    Ok((seconds != BATTERY_UNKNOWN_TIME).then(|| Duration::from_secs(seconds.into())))
}

pub fn query_status<B: DeviceBackend>(handle: &DeviceHandle<B>) -> Result<BatteryStatus> {
    let query = WaitStatus::immediate(handle.tag().0);
    exchange_fixed(handle, IoctlCode::QueryStatus, &query)
}

/// Escaped unique identifier of the battery.
pub fn query_unique_id<B: DeviceBackend>(handle: &DeviceHandle<B>) -> Result<String> {
    let (buffer, written) = query_utf16(handle, InformationLevel::UniqueId)?;
    let id = decode_unique_id(&buffer, written);
    if id.is_empty() {
        return Err(BatteryError::UnsupportedQuery {
            level: InformationLevel::UniqueId,
        });
    }
    Ok(id)
}

/// One of the plain string levels: device name, manufacturer name or serial
/// number.
pub fn query_string<B: DeviceBackend>(
    handle: &DeviceHandle<B>,
    level: InformationLevel,
) -> Result<String> {
    if !level.is_string() {
        return Err(BatteryError::UnsupportedQuery { level });
    }
    let (buffer, written) = query_utf16(handle, level)?;
    Ok(decode_string(&buffer, written))
}

fn query_utf16<B: DeviceBackend>(
    handle: &DeviceHandle<B>,
    level: InformationLevel,
) -> Result<(Vec<u16>, usize)> {
    let query = QueryInformation::new(handle.tag().0, level).to_bytes();
    let mut response = vec![0u8; MAX_STRING_UNITS * 2];
    let written = match exchange(handle, IoctlCode::QueryInformation, &query, &mut response) {
        Ok(written) => written.min(response.len()),
        Err(BatteryError::ExchangeFailed { source, .. })
            if matches!(
                source.raw_os_error(),
                Some(ERROR_INVALID_FUNCTION | ERROR_NOT_SUPPORTED)
            ) =>
        {
            return Err(BatteryError::UnsupportedQuery { level });
        }
        Err(e) => return Err(e),
    };
    let units = response
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok((units, written))
}

/// Run the information, status and temperature queries against `handle`.
pub fn poll_battery<B: DeviceBackend>(handle: &DeviceHandle<B>) -> BatteryReading {
    let information = query_information(handle)
        .inspect_err(|e| tracing::error!("Battery information query on {}: {}", handle.path(), e))
        .ok();

    let status = query_status(handle)
        .inspect_err(|e| tracing::error!("Battery status query on {}: {}", handle.path(), e))
        .ok();

    let temperature = query_temperature(handle)
        .inspect_err(|e| tracing::error!("Battery temperature query on {}: {}", handle.path(), e))
        .ok();

    BatteryReading {
        information,
        status,
        temperature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioctl::PowerState;
    use crate::sim::{SimBackend, SimDevice};
    use std::sync::Arc;

    fn open(device: SimDevice) -> (Arc<SimBackend>, DeviceHandle<SimBackend>) {
        let backend = Arc::new(SimBackend::new(vec![device]));
        let handle = DeviceHandle::acquire(backend.clone(), 0).unwrap();
        (backend, handle)
    }

    #[test]
    fn information_carries_tag_and_decodes() {
        let (backend, handle) = open(SimDevice::new("BAT0").with_tag(0x1234));
        let info = query_information(&handle).unwrap();
        assert_eq!(info.designed_capacity, 50_000);
        assert_eq!(info.cycle_count, 87);
        assert_eq!(info.chemistry(), "LION");
        assert_eq!(backend.last_query_tag(), Some(0x1234));
    }

    #[test]
    fn status_is_queried_fresh_every_time() {
        let (backend, handle) = open(SimDevice::new("BAT0"));
        let first = query_status(&handle).unwrap();
        assert_eq!(first.rate, -9_000);

        backend.update(0, |device| {
            device.status.rate = 15_000;
            device.status.power_state = PowerState::POWER_ON_LINE | PowerState::CHARGING;
        });

        let second = query_status(&handle).unwrap();
        assert_eq!(second.rate, 15_000);
        assert!(second.power_state.contains(PowerState::CHARGING));
        assert_eq!(first.rate, -9_000);
    }

    #[test]
    fn temperature_is_converted() {
        let (_backend, handle) = open(SimDevice::new("BAT0").with_temperature(2982));
        assert!((query_temperature(&handle).unwrap() - 25.04).abs() < 1e-9);
    }

    #[test]
    fn unique_id_uses_returned_byte_count() {
        let (_backend, handle) = open(SimDevice::new("BAT0").with_unique_id("SMP\u{1a}5B10"));
        assert_eq!(query_unique_id(&handle).unwrap(), "SMP%1:5B10");
    }

    #[test]
    fn unsupported_unique_id() {
        let (_backend, handle) = open(SimDevice::new("BAT0").without_unique_id());
        let err = query_unique_id(&handle).unwrap_err();
        assert!(matches!(
            err,
            BatteryError::UnsupportedQuery {
                level: InformationLevel::UniqueId
            }
        ));
    }

    #[test]
    fn string_levels() {
        let (_backend, handle) = open(SimDevice::new("BAT0"));
        assert_eq!(
            query_string(&handle, InformationLevel::DeviceName).unwrap(),
            "SIM BAT0"
        );
        assert_eq!(
            query_string(&handle, InformationLevel::SerialNumber).unwrap(),
            "0001"
        );
        assert!(matches!(
            query_string(&handle, InformationLevel::Temperature),
            Err(BatteryError::UnsupportedQuery { .. })
        ));
    }

    #[test]
    fn estimated_time() {
        let (backend, handle) = open(SimDevice::new("BAT0"));
        assert_eq!(
            query_estimated_time(&handle).unwrap(),
            Some(Duration::from_secs(7_200))
        );
        backend.update(0, |device| device.estimated_time = BATTERY_UNKNOWN_TIME);
        assert_eq!(query_estimated_time(&handle).unwrap(), None);
    }

    #[test]
    fn short_response_is_an_error() {
        let (backend, handle) = open(SimDevice::new("BAT0"));
        backend.update(0, |device| device.truncate_responses = Some(8));
        let err = query_status(&handle).unwrap_err();
        assert!(matches!(
            err,
            BatteryError::ShortResponse {
                code: IoctlCode::QueryStatus,
                expected: 16,
                actual: 8,
            }
        ));
    }

    #[test]
    fn failed_status_keeps_information() {
        let (backend, handle) = open(SimDevice::new("BAT0"));
        backend.update(0, |device| device.fail_status = true);
        let reading = poll_battery(&handle);
        assert!(reading.information.is_some());
        assert!(reading.temperature.is_some());
        assert!(reading.status.is_none());
    }
}
