//! In-memory battery class driver used by the unit tests.

use crate::device::{DeviceBackend, RawHandle};
use crate::error::{BatteryError, EnumerationStep, Result};
use crate::ioctl::{
    BatteryInformation, BatteryStatus, Capabilities, InformationLevel, IoctlCode, PowerState,
    QueryInformation, WaitStatus, WireLayout,
};
use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

const ERROR_FILE_NOT_FOUND: i32 = 2;
const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_INVALID_HANDLE: i32 = 6;
const ERROR_GEN_FAILURE: i32 = 31;
const ERROR_INVALID_FUNCTION: i32 = 1;
const ERROR_INSUFFICIENT_BUFFER: i32 = 122;

#[derive(Debug, Clone)]
pub struct SimDevice {
    pub path: String,
    pub tag: u32,
    pub information: BatteryInformation,
    pub status: BatteryStatus,
    pub temperature: u32,
    pub estimated_time: u32,
    pub unique_id: Option<Vec<u16>>,
    pub device_name: String,
    pub serial_number: String,
    pub fail_enumeration: bool,
    pub fail_open: bool,
    pub fail_tag: bool,
    pub fail_information: bool,
    pub fail_status: bool,
    pub fail_temperature: bool,
    pub truncate_responses: Option<usize>,
}

impl SimDevice {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            tag: 0x10,
            information: BatteryInformation {
                capabilities: Capabilities::SYSTEM_BATTERY,
                technology: 1,
                chemistry: *b"LION",
                designed_capacity: 50_000,
                full_charged_capacity: 45_500,
                default_alert1: 2_275,
                default_alert2: 1_365,
                critical_bias: 0,
                cycle_count: 87,
            },
            status: BatteryStatus {
                power_state: PowerState::DISCHARGING,
                capacity: 30_000,
                voltage: 11_500,
                rate: -9_000,
            },
            temperature: 2982,
            estimated_time: 7_200,
            unique_id: Some(format!("SIM-{path}").encode_utf16().collect()),
            device_name: format!("SIM {path}"),
            serial_number: "0001".to_string(),
            fail_enumeration: false,
            fail_open: false,
            fail_tag: false,
            fail_information: false,
            fail_status: false,
            fail_temperature: false,
            truncate_responses: None,
        }
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_temperature(mut self, k10: u32) -> Self {
        self.temperature = k10;
        self
    }

    pub fn with_unique_id(mut self, id: &str) -> Self {
        self.unique_id = Some(id.encode_utf16().collect());
        self
    }

    pub fn without_unique_id(mut self) -> Self {
        self.unique_id = None;
        self
    }

    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_tag(mut self) -> Self {
        self.fail_tag = true;
        self
    }
}

#[derive(Debug, Default)]
struct SimState {
    devices: Vec<SimDevice>,
    open: HashMap<RawHandle, usize>,
    next_handle: isize,
    closed: Vec<RawHandle>,
    last_query_tag: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SimBackend {
    state: Mutex<SimState>,
}

impl SimBackend {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        Self {
            state: Mutex::new(SimState {
                devices,
                next_handle: 0x100,
                ..SimState::default()
            }),
        }
    }

    pub fn update(&self, index: usize, f: impl FnOnce(&mut SimDevice)) {
        f(&mut self.state.lock().unwrap().devices[index]);
    }

    /// Handles opened and not yet closed.
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    pub fn closed(&self) -> Vec<RawHandle> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn last_query_tag(&self) -> Option<u32> {
        self.state.lock().unwrap().last_query_tag
    }
}

fn os_error(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

fn respond<T: WireLayout>(value: &T, output: &mut [u8]) -> io::Result<usize> {
    if output.len() < T::SIZE {
        return Err(os_error(ERROR_INSUFFICIENT_BUFFER));
    }
    value.encode(output);
    Ok(T::SIZE)
}

fn respond_utf16(units: &[u16], output: &mut [u8]) -> io::Result<usize> {
    let mut bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
    bytes.extend_from_slice(&[0, 0]);
    if output.len() < bytes.len() {
        return Err(os_error(ERROR_INSUFFICIENT_BUFFER));
    }
    output[..bytes.len()].copy_from_slice(&bytes);
    Ok(bytes.len())
}

fn check_tag(device: &SimDevice, tag: u32) -> io::Result<()> {
    if tag == device.tag {
        Ok(())
    } else {
        Err(os_error(ERROR_FILE_NOT_FOUND))
    }
}

impl DeviceBackend for SimBackend {
    fn interface_path(&self, index: u32) -> Result<String> {
        let state = self.state.lock().unwrap();
        match state.devices.get(index as usize) {
            None => Err(BatteryError::EnumerationExhausted { index }),
            Some(device) if device.fail_enumeration => Err(BatteryError::EnumerationFailed {
                step: EnumerationStep::InterfaceDetail,
                source: os_error(ERROR_GEN_FAILURE),
            }),
            Some(device) => Ok(device.path.clone()),
        }
    }

    fn open(&self, path: &str) -> io::Result<RawHandle> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .devices
            .iter()
            .position(|d| d.path == path)
            .ok_or_else(|| os_error(ERROR_FILE_NOT_FOUND))?;
        if state.devices[index].fail_open {
            return Err(os_error(ERROR_ACCESS_DENIED));
        }
        let handle = RawHandle(state.next_handle);
        state.next_handle += 4;
        state.open.insert(handle, index);
        Ok(handle)
    }

    fn io_control(
        &self,
        handle: RawHandle,
        code: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let index = *state
            .open
            .get(&handle)
            .ok_or_else(|| os_error(ERROR_INVALID_HANDLE))?;
        let device = state.devices[index].clone();

        let written = match IoctlCode::from_u32(code) {
            Some(IoctlCode::QueryTag) => {
                if device.fail_tag {
                    return Err(os_error(ERROR_GEN_FAILURE));
                }
                respond(&device.tag, output)?
            }
            Some(IoctlCode::QueryInformation) => {
                let query = QueryInformation::decode(input);
                state.last_query_tag = Some(query.tag);
                check_tag(&device, query.tag)?;
                match query.level {
                    InformationLevel::Information if !device.fail_information => {
                        respond(&device.information, output)?
                    }
                    InformationLevel::Temperature if !device.fail_temperature => {
                        respond(&device.temperature, output)?
                    }
                    InformationLevel::EstimatedTime => respond(&device.estimated_time, output)?,
                    InformationLevel::UniqueId => match &device.unique_id {
                        Some(id) => respond_utf16(id, output)?,
                        None => return Err(os_error(ERROR_INVALID_FUNCTION)),
                    },
                    InformationLevel::DeviceName => {
                        let units: Vec<u16> = device.device_name.encode_utf16().collect();
                        respond_utf16(&units, output)?
                    }
                    InformationLevel::SerialNumber => {
                        let units: Vec<u16> = device.serial_number.encode_utf16().collect();
                        respond_utf16(&units, output)?
                    }
                    InformationLevel::Information | InformationLevel::Temperature => {
                        return Err(os_error(ERROR_GEN_FAILURE));
                    }
                    _ => return Err(os_error(ERROR_INVALID_FUNCTION)),
                }
            }
            Some(IoctlCode::QueryStatus) => {
                let wait = WaitStatus::decode(input);
                check_tag(&device, wait.tag)?;
                if device.fail_status {
                    return Err(os_error(ERROR_GEN_FAILURE));
                }
                respond(&device.status, output)?
            }
            None => return Err(os_error(ERROR_INVALID_FUNCTION)),
        };

        Ok(device
            .truncate_responses
            .map_or(written, |limit| written.min(limit)))
    }

    fn close(&self, handle: RawHandle) {
        let mut state = self.state.lock().unwrap();
        state.open.remove(&handle);
        state.closed.push(handle);
    }
}
