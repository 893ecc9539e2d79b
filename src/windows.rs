//! Battery class access through SetupAPI and `DeviceIoControl`.
//!
//! Enumeration is a three step walk: open a device info list for the battery
//! class restricted to present devices with an interface, pick the Nth
//! interface record from it, then resolve that record to a device path. The
//! list only lives for the duration of one lookup.

use crate::device::{DeviceBackend, RawHandle};
use crate::error::{BatteryError, EnumerationStep, Result};
use crate::ioctl::{
    BATTERY_CLASS_GUID_DATA1, BATTERY_CLASS_GUID_DATA2, BATTERY_CLASS_GUID_DATA3,
    BATTERY_CLASS_GUID_DATA4,
};
use std::io;
use std::mem;
use std::ptr;
use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO, SP_DEVICE_INTERFACE_DATA,
    SP_DEVICE_INTERFACE_DETAIL_DATA_W, SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces,
    SetupDiGetClassDevsW, SetupDiGetDeviceInterfaceDetailW,
};
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::DeviceIoControl;
use windows_sys::core::GUID;

// winnt.h
const FILE_READ_DATA: u32 = 0x0001;
const FILE_WRITE_DATA: u32 = 0x0002;

// winerror.h
const ERROR_INSUFFICIENT_BUFFER: i32 = 122;
const ERROR_NO_MORE_ITEMS: i32 = 259;

const GUID_DEVCLASS_BATTERY: GUID = GUID {
    data1: BATTERY_CLASS_GUID_DATA1,
    data2: BATTERY_CLASS_GUID_DATA2,
    data3: BATTERY_CLASS_GUID_DATA3,
    data4: BATTERY_CLASS_GUID_DATA4,
};

/// The battery class driver of the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

fn step_error(step: EnumerationStep) -> BatteryError {
    BatteryError::EnumerationFailed {
        step,
        source: io::Error::last_os_error(),
    }
}

fn interface_detail_path(devinfo: HDEVINFO, data: &SP_DEVICE_INTERFACE_DATA) -> Result<String> {
    let mut required: u32 = 0;
    let ok = unsafe {
        SetupDiGetDeviceInterfaceDetailW(
            devinfo,
            data,
            ptr::null_mut(),
            0,
            &mut required,
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(ERROR_INSUFFICIENT_BUFFER) {
            return Err(BatteryError::EnumerationFailed {
                step: EnumerationStep::InterfaceDetail,
                source: err,
            });
        }
    }

    let offset = mem::offset_of!(SP_DEVICE_INTERFACE_DETAIL_DATA_W, DevicePath);
    let size = (required as usize).max(mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>());
    // u64 storage keeps the structure suitably aligned.
    let mut buffer = vec![0u64; size.div_ceil(mem::size_of::<u64>())];
    let detail = buffer.as_mut_ptr().cast::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>();

    let ok = unsafe {
        (*detail).cbSize = mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;
        SetupDiGetDeviceInterfaceDetailW(
            devinfo,
            data,
            detail,
            size as u32,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Err(step_error(EnumerationStep::InterfaceDetail));
    }

    let units = unsafe {
        std::slice::from_raw_parts(
            buffer.as_ptr().cast::<u8>().add(offset).cast::<u16>(),
            (size - offset) / 2,
        )
    };
    let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    Ok(String::from_utf16_lossy(&units[..end]))
}

impl DeviceBackend for WindowsBackend {
    fn interface_path(&self, index: u32) -> Result<String> {
        let devinfo = unsafe {
            SetupDiGetClassDevsW(
                &GUID_DEVCLASS_BATTERY,
                ptr::null(),
                ptr::null_mut(),
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        };
        if devinfo as isize == INVALID_HANDLE_VALUE as isize {
            return Err(step_error(EnumerationStep::ClassDevices));
        }
        let devinfo = scopeguard::guard(devinfo, |devinfo| unsafe {
            SetupDiDestroyDeviceInfoList(devinfo);
        });

        let mut data: SP_DEVICE_INTERFACE_DATA = unsafe { mem::zeroed() };
        data.cbSize = mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;
        let ok = unsafe {
            SetupDiEnumDeviceInterfaces(
                *devinfo,
                ptr::null(),
                &GUID_DEVCLASS_BATTERY,
                index,
                &mut data,
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(ERROR_NO_MORE_ITEMS) {
                return Err(BatteryError::EnumerationExhausted { index });
            }
            return Err(BatteryError::EnumerationFailed {
                step: EnumerationStep::InterfaceRecord,
                source: err,
            });
        }

        interface_detail_path(*devinfo, &data)
    }

    fn open(&self, path: &str) -> io::Result<RawHandle> {
        let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                FILE_READ_DATA | FILE_WRITE_DATA,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        Ok(RawHandle(handle as isize))
    }

    fn io_control(
        &self,
        handle: RawHandle,
        code: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> io::Result<usize> {
        let mut returned: u32 = 0;
        let ok = unsafe {
            DeviceIoControl(
                handle.0 as HANDLE,
                code,
                input.as_ptr().cast(),
                input.len() as u32,
                output.as_mut_ptr().cast(),
                output.len() as u32,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(returned as usize)
    }

    fn close(&self, handle: RawHandle) {
        if unsafe { CloseHandle(handle.0 as HANDLE) } == 0 {
            tracing::warn!(
                "CloseHandle({}) failed: {}",
                handle,
                io::Error::last_os_error()
            );
        }
    }
}
