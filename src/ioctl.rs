//! Wire contract with the battery class driver.
//!
//! Control codes, information levels and the fixed little-endian request and
//! response layouts exchanged through `DeviceIoControl`. Field offsets follow
//! `batclass.h`; every layout is listed field by field instead of relying on a
//! `#[repr(C)]` struct so the byte positions stay explicit.

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use uom::si::electric_potential::millivolt;
use uom::si::energy::watt_hour;
use uom::si::f64::{ElectricPotential, Energy, Power};
use uom::si::power::milliwatt;

/// `GUID_DEVCLASS_BATTERY` / `GUID_DEVICE_BATTERY`: 72631E54-78A4-11D0-BCF7-00AA00B7B32A
pub const BATTERY_CLASS_GUID_DATA1: u32 = 0x72631E54;
pub const BATTERY_CLASS_GUID_DATA2: u16 = 0x78A4;
pub const BATTERY_CLASS_GUID_DATA3: u16 = 0x11D0;
pub const BATTERY_CLASS_GUID_DATA4: [u8; 8] = [0xBC, 0xF7, 0x00, 0xAA, 0x00, 0xB7, 0xB3, 0x2A];

const FILE_DEVICE_BATTERY: u32 = 0x29;
const FILE_READ_ACCESS: u32 = 0x1;
const METHOD_BUFFERED: u32 = 0;

/// Equivalent of the `CTL_CODE` macro from `winioctl.h`.
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Tag value the driver hands out when no battery is present.
pub const BATTERY_TAG_INVALID: u32 = 0;

pub const BATTERY_UNKNOWN_CAPACITY: u32 = 0xFFFF_FFFF;
pub const BATTERY_UNKNOWN_VOLTAGE: u32 = 0xFFFF_FFFF;
pub const BATTERY_UNKNOWN_RATE: i32 = i32::MIN;
pub const BATTERY_UNKNOWN_TIME: u32 = 0xFFFF_FFFF;

/// Capacity of the UTF-16 buffer used for string information levels.
pub const MAX_STRING_UNITS: usize = 256;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum IoctlCode {
    QueryTag,
    QueryInformation,
    QueryStatus,
}

impl IoctlCode {
    #[must_use]
    pub const fn code(self) -> u32 {
        let function = match self {
            IoctlCode::QueryTag => 0x10,
            IoctlCode::QueryInformation => 0x11,
            IoctlCode::QueryStatus => 0x13,
        };
        ctl_code(FILE_DEVICE_BATTERY, function, METHOD_BUFFERED, FILE_READ_ACCESS)
    }

    #[must_use]
    pub const fn from_u32(code: u32) -> Option<IoctlCode> {
        match code {
            0x0029_4040 => Some(IoctlCode::QueryTag),
            0x0029_4044 => Some(IoctlCode::QueryInformation),
            0x0029_404C => Some(IoctlCode::QueryStatus),
            _ => None,
        }
    }
}

impl fmt::Display for IoctlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoctlCode::QueryTag => write!(f, "IOCTL_BATTERY_QUERY_TAG"),
            IoctlCode::QueryInformation => write!(f, "IOCTL_BATTERY_QUERY_INFORMATION"),
            IoctlCode::QueryStatus => write!(f, "IOCTL_BATTERY_QUERY_STATUS"),
        }
    }
}

/// `BATTERY_QUERY_INFORMATION_LEVEL`
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum InformationLevel {
    Information = 0,
    GranularityInformation = 1,
    Temperature = 2,
    EstimatedTime = 3,
    DeviceName = 4,
    ManufactureDate = 5,
    ManufactureName = 6,
    UniqueId = 7,
    SerialNumber = 8,
}

impl InformationLevel {
    #[must_use]
    pub const fn from_i32(level: i32) -> Option<InformationLevel> {
        match level {
            0 => Some(InformationLevel::Information),
            1 => Some(InformationLevel::GranularityInformation),
            2 => Some(InformationLevel::Temperature),
            3 => Some(InformationLevel::EstimatedTime),
            4 => Some(InformationLevel::DeviceName),
            5 => Some(InformationLevel::ManufactureDate),
            6 => Some(InformationLevel::ManufactureName),
            7 => Some(InformationLevel::UniqueId),
            8 => Some(InformationLevel::SerialNumber),
            _ => None,
        }
    }

    /// Levels whose response is a UTF-16 string rather than a fixed layout.
    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(
            self,
            InformationLevel::DeviceName
                | InformationLevel::ManufactureName
                | InformationLevel::UniqueId
                | InformationLevel::SerialNumber
        )
    }
}

impl fmt::Display for InformationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InformationLevel::Information => write!(f, "BatteryInformation"),
            InformationLevel::GranularityInformation => {
                write!(f, "BatteryGranularityInformation")
            }
            InformationLevel::Temperature => write!(f, "BatteryTemperature"),
            InformationLevel::EstimatedTime => write!(f, "BatteryEstimatedTime"),
            InformationLevel::DeviceName => write!(f, "BatteryDeviceName"),
            InformationLevel::ManufactureDate => write!(f, "BatteryManufactureDate"),
            InformationLevel::ManufactureName => write!(f, "BatteryManufactureName"),
            InformationLevel::UniqueId => write!(f, "BatteryUniqueID"),
            InformationLevel::SerialNumber => write!(f, "BatterySerialNumber"),
        }
    }
}

/// A request or response with a fixed byte layout.
pub trait WireLayout: Sized {
    const SIZE: usize;

    /// Decode from `data`, which must hold at least `SIZE` bytes.
    fn decode(data: &[u8]) -> Self;

    /// Encode into `data`, which must hold at least `SIZE` bytes.
    fn encode(&self, data: &mut [u8]);

    fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; Self::SIZE];
        self.encode(&mut data);
        data
    }
}

/// Plain `ULONG` payloads: the tag query timeout, the tag itself, temperature
/// and estimated time.
impl WireLayout for u32 {
    const SIZE: usize = 4;

    fn decode(data: &[u8]) -> Self {
        LittleEndian::read_u32(data)
    }

    fn encode(&self, data: &mut [u8]) {
        LittleEndian::write_u32(data, *self);
    }
}

/// `BATTERY_QUERY_INFORMATION`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryInformation {
    pub tag: u32,
    pub level: InformationLevel,
    pub at_rate: i32,
}

impl QueryInformation {
    pub const fn new(tag: u32, level: InformationLevel) -> Self {
        Self {
            tag,
            level,
            at_rate: 0,
        }
    }
}

impl WireLayout for QueryInformation {
    const SIZE: usize = 12;

    fn decode(data: &[u8]) -> Self {
        let raw_level = LittleEndian::read_i32(&data[4..8]);
        Self {
            tag: LittleEndian::read_u32(&data[0..4]),
            level: InformationLevel::from_i32(raw_level).unwrap_or(InformationLevel::Information),
            at_rate: LittleEndian::read_i32(&data[8..12]),
        }
    }

    fn encode(&self, data: &mut [u8]) {
        LittleEndian::write_u32(&mut data[0..4], self.tag);
        LittleEndian::write_i32(&mut data[4..8], self.level as i32);
        LittleEndian::write_i32(&mut data[8..12], self.at_rate);
    }
}

/// `BATTERY_WAIT_STATUS`. Only the tag is meaningful here; a zero timeout
/// makes the driver answer immediately with the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitStatus {
    pub tag: u32,
    pub timeout: u32,
    pub power_state: u32,
    pub low_capacity: u32,
    pub high_capacity: u32,
}

impl WaitStatus {
    pub const fn immediate(tag: u32) -> Self {
        Self {
            tag,
            timeout: 0,
            power_state: 0,
            low_capacity: 0,
            high_capacity: 0,
        }
    }
}

impl WireLayout for WaitStatus {
    const SIZE: usize = 20;

    fn decode(data: &[u8]) -> Self {
        Self {
            tag: LittleEndian::read_u32(&data[0..4]),
            timeout: LittleEndian::read_u32(&data[4..8]),
            power_state: LittleEndian::read_u32(&data[8..12]),
            low_capacity: LittleEndian::read_u32(&data[12..16]),
            high_capacity: LittleEndian::read_u32(&data[16..20]),
        }
    }

    fn encode(&self, data: &mut [u8]) {
        LittleEndian::write_u32(&mut data[0..4], self.tag);
        LittleEndian::write_u32(&mut data[4..8], self.timeout);
        LittleEndian::write_u32(&mut data[8..12], self.power_state);
        LittleEndian::write_u32(&mut data[12..16], self.low_capacity);
        LittleEndian::write_u32(&mut data[16..20], self.high_capacity);
    }
}

bitflags! {
    /// `BATTERY_INFORMATION.Capabilities`
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Capabilities: u32 {
        const SYSTEM_BATTERY = 0x8000_0000;
        const CAPACITY_RELATIVE = 0x4000_0000;
        const IS_SHORT_TERM = 0x2000_0000;
        const SET_CHARGE_SUPPORTED = 0x0000_0001;
        const SET_DISCHARGE_SUPPORTED = 0x0000_0002;
    }
}

bitflags! {
    /// `BATTERY_STATUS.PowerState`
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
    pub struct PowerState: u32 {
        const POWER_ON_LINE = 0x0000_0001;
        const DISCHARGING = 0x0000_0002;
        const CHARGING = 0x0000_0004;
        const CRITICAL = 0x0000_0008;
    }
}

/// `BATTERY_INFORMATION`
///
/// | offset | field |
/// |---|---|
/// | 0 | capabilities (u32) |
/// | 4 | technology (u8) |
/// | 5 | reserved (3 bytes) |
/// | 8 | chemistry (4 bytes) |
/// | 12 | designed capacity (u32, mWh) |
/// | 16 | full charged capacity (u32, mWh) |
/// | 20 | default alert 1 (u32, mWh) |
/// | 24 | default alert 2 (u32, mWh) |
/// | 28 | critical bias (u32, mWh) |
/// | 32 | cycle count (u32) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryInformation {
    pub capabilities: Capabilities,
    pub technology: u8,
    pub chemistry: [u8; 4],
    pub designed_capacity: u32,
    pub full_charged_capacity: u32,
    pub default_alert1: u32,
    pub default_alert2: u32,
    pub critical_bias: u32,
    pub cycle_count: u32,
}

impl BatteryInformation {
    /// Chemistry code such as `LION` or `PbAc`, without trailing NULs.
    pub fn chemistry(&self) -> String {
        String::from_utf8_lossy(&self.chemistry)
            .trim_end_matches('\0')
            .trim()
            .to_string()
    }

    pub const fn is_rechargeable(&self) -> bool {
        self.technology == 1
    }

    /// Capacities are relative (percent-like) units instead of mWh.
    pub const fn is_relative(&self) -> bool {
        self.capabilities.contains(Capabilities::CAPACITY_RELATIVE)
    }

    pub fn designed_capacity(&self) -> Option<Energy> {
        energy_from_mwh(self.designed_capacity)
    }

    pub fn full_charged_capacity(&self) -> Option<Energy> {
        energy_from_mwh(self.full_charged_capacity)
    }
}

impl WireLayout for BatteryInformation {
    const SIZE: usize = 36;

    fn decode(data: &[u8]) -> Self {
        let mut chemistry = [0u8; 4];
        chemistry.copy_from_slice(&data[8..12]);
        Self {
            capabilities: Capabilities::from_bits_retain(LittleEndian::read_u32(&data[0..4])),
            technology: data[4],
            chemistry,
            designed_capacity: LittleEndian::read_u32(&data[12..16]),
            full_charged_capacity: LittleEndian::read_u32(&data[16..20]),
            default_alert1: LittleEndian::read_u32(&data[20..24]),
            default_alert2: LittleEndian::read_u32(&data[24..28]),
            critical_bias: LittleEndian::read_u32(&data[28..32]),
            cycle_count: LittleEndian::read_u32(&data[32..36]),
        }
    }

    fn encode(&self, data: &mut [u8]) {
        LittleEndian::write_u32(&mut data[0..4], self.capabilities.bits());
        data[4] = self.technology;
        data[5..8].fill(0);
        data[8..12].copy_from_slice(&self.chemistry);
        LittleEndian::write_u32(&mut data[12..16], self.designed_capacity);
        LittleEndian::write_u32(&mut data[16..20], self.full_charged_capacity);
        LittleEndian::write_u32(&mut data[20..24], self.default_alert1);
        LittleEndian::write_u32(&mut data[24..28], self.default_alert2);
        LittleEndian::write_u32(&mut data[28..32], self.critical_bias);
        LittleEndian::write_u32(&mut data[32..36], self.cycle_count);
    }
}

/// `BATTERY_STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub power_state: PowerState,
    /// mWh
    pub capacity: u32,
    /// mV
    pub voltage: u32,
    /// mW, positive while charging and negative while discharging
    pub rate: i32,
}

impl BatteryStatus {
    pub fn capacity(&self) -> Option<Energy> {
        energy_from_mwh(self.capacity)
    }

    pub fn voltage(&self) -> Option<ElectricPotential> {
        (self.voltage != BATTERY_UNKNOWN_VOLTAGE)
            .then(|| ElectricPotential::new::<millivolt>(self.voltage as f64))
    }

    pub fn rate(&self) -> Option<Power> {
        (self.rate != BATTERY_UNKNOWN_RATE).then(|| Power::new::<milliwatt>(self.rate as f64))
    }
}

impl WireLayout for BatteryStatus {
    const SIZE: usize = 16;

    fn decode(data: &[u8]) -> Self {
        Self {
            power_state: PowerState::from_bits_retain(LittleEndian::read_u32(&data[0..4])),
            capacity: LittleEndian::read_u32(&data[4..8]),
            voltage: LittleEndian::read_u32(&data[8..12]),
            rate: LittleEndian::read_i32(&data[12..16]),
        }
    }

    fn encode(&self, data: &mut [u8]) {
        LittleEndian::write_u32(&mut data[0..4], self.power_state.bits());
        LittleEndian::write_u32(&mut data[4..8], self.capacity);
        LittleEndian::write_u32(&mut data[8..12], self.voltage);
        LittleEndian::write_i32(&mut data[12..16], self.rate);
    }
}

fn energy_from_mwh(mwh: u32) -> Option<Energy> {
    (mwh != BATTERY_UNKNOWN_CAPACITY).then(|| Energy::new::<watt_hour>(mwh as f64 / 1000.0))
}
