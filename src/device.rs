use crate::error::Result;
use std::fmt;
use std::io;

#[cfg(test)]
use mockall::automock;

/// OS handle value of an open battery device.
///
/// Stored as an integer so handles can move between threads; the backend that
/// produced it is the only thing that interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub isize);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Access to the devices registered under the battery device class.
///
/// Implementations handle the OS details (SetupAPI and `DeviceIoControl` on
/// Windows, an in-memory device in tests) while the handle, query and
/// registry layers handle the protocol.
#[cfg_attr(test, automock)]
pub trait DeviceBackend: Send + Sync {
    /// Resolve the symbolic path of the `index`th present battery interface.
    ///
    /// Returns `BatteryError::EnumerationExhausted` once `index` is past the
    /// last present device.
    fn interface_path(&self, index: u32) -> Result<String>;

    /// Open `path` for read and write data access, shared with other openers.
    fn open(&self, path: &str) -> io::Result<RawHandle>;

    /// Issue one blocking control-code exchange and return the number of
    /// bytes the device wrote into `output`.
    fn io_control(
        &self,
        handle: RawHandle,
        code: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> io::Result<usize>;

    /// Release a handle returned by [`DeviceBackend::open`].
    fn close(&self, handle: RawHandle);
}
