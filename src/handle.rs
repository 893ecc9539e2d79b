use crate::device::{DeviceBackend, RawHandle};
use crate::error::{BatteryError, Result};
use crate::ioctl::BATTERY_TAG_INVALID;
use crate::query;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Session tag handed out by the driver for one open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatteryTag(pub u32);

impl fmt::Display for BatteryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// An open battery device and its session tag.
///
/// The OS handle is released exactly once, when the value is dropped. That
/// includes a failed tag handshake inside [`DeviceHandle::open`].
pub struct DeviceHandle<B: DeviceBackend> {
    backend: Arc<B>,
    raw: RawHandle,
    tag: BatteryTag,
    path: String,
}

impl<B: DeviceBackend> fmt::Debug for DeviceHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("raw", &self.raw)
            .field("tag", &self.tag)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl<B: DeviceBackend> DeviceHandle<B> {
    /// Resolve the `index`th battery interface and open it.
    pub fn acquire(backend: Arc<B>, index: u32) -> Result<Self> {
        let path = backend.interface_path(index)?;
        Self::open(backend, &path)
    }

    /// Open `path` and perform the tag handshake.
    pub fn open(backend: Arc<B>, path: &str) -> Result<Self> {
        let raw = backend
            .open(path)
            .map_err(|source| BatteryError::DeviceOpenFailed {
                path: path.to_string(),
                source,
            })?;

        // From here on, dropping `handle` closes the OS handle.
        let mut handle = Self {
            backend,
            raw,
            tag: BatteryTag(BATTERY_TAG_INVALID),
            path: path.to_string(),
        };

        let tag = query::query_tag(&handle).map_err(|e| BatteryError::TagAcquisitionFailed {
            path: path.to_string(),
            source: into_io_error(e),
        })?;
        if tag.0 == BATTERY_TAG_INVALID {
            return Err(BatteryError::TagAcquisitionFailed {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no battery in slot"),
            });
        }

        tracing::debug!("Opened {} as {} with tag {}", path, raw, tag);
        handle.tag = tag;
        Ok(handle)
    }

    pub fn tag(&self) -> BatteryTag {
        self.tag
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: DeviceBackend> Drop for DeviceHandle<B> {
    fn drop(&mut self) {
        tracing::trace!("Closing {} ({})", self.path, self.raw);
        self.backend.close(self.raw);
    }
}

fn into_io_error(err: BatteryError) -> io::Error {
    match err {
        BatteryError::ExchangeFailed { source, .. } => source,
        other => io::Error::other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDeviceBackend;
    use crate::ioctl::IoctlCode;
    use crate::sim::{SimBackend, SimDevice};
    use mockall::predicate::eq;

    #[test]
    fn tag_failure_releases_handle() {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_open()
            .withf(|path| path == "\\\\?\\acpi#pnp0c0a#1")
            .times(1)
            .returning(|_| Ok(RawHandle(7)));
        backend
            .expect_io_control()
            .withf(|handle, code, _, _| {
                *handle == RawHandle(7) && *code == IoctlCode::QueryTag.code()
            })
            .times(1)
            .returning(|_, _, _, _| Err(io::Error::from_raw_os_error(21)));
        backend
            .expect_close()
            .with(eq(RawHandle(7)))
            .times(1)
            .return_const(());

        let err = DeviceHandle::open(Arc::new(backend), "\\\\?\\acpi#pnp0c0a#1").unwrap_err();
        match err {
            BatteryError::TagAcquisitionFailed { path, source } => {
                assert_eq!(path, "\\\\?\\acpi#pnp0c0a#1");
                assert_eq!(source.raw_os_error(), Some(21));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn open_failure_never_closes() {
        let mut backend = MockDeviceBackend::new();
        backend
            .expect_open()
            .returning(|_| Err(io::Error::from_raw_os_error(5)));
        backend.expect_io_control().never();
        backend.expect_close().never();

        let err = DeviceHandle::open(Arc::new(backend), "bogus").unwrap_err();
        assert!(matches!(err, BatteryError::DeviceOpenFailed { .. }));
    }

    #[test]
    fn zero_tag_is_rejected_and_released() {
        let backend = Arc::new(SimBackend::new(vec![SimDevice::new("BAT0").with_tag(0)]));
        let err = DeviceHandle::acquire(backend.clone(), 0).unwrap_err();
        assert!(matches!(err, BatteryError::TagAcquisitionFailed { .. }));
        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.closed().len(), 1);
    }

    #[test]
    fn handle_keeps_tag_and_closes_once_on_drop() {
        let backend = Arc::new(SimBackend::new(vec![SimDevice::new("BAT0").with_tag(0x55)]));
        let handle = DeviceHandle::acquire(backend.clone(), 0).unwrap();
        assert_eq!(handle.tag(), BatteryTag(0x55));
        assert_eq!(handle.path(), "BAT0");
        assert_eq!(backend.open_count(), 1);

        let raw = handle.raw();
        drop(handle);
        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.closed(), vec![raw]);
    }

    #[test]
    fn acquire_past_last_device_is_exhausted() {
        let backend = Arc::new(SimBackend::new(vec![SimDevice::new("BAT0")]));
        let err = DeviceHandle::acquire(backend.clone(), 1).unwrap_err();
        assert!(err.is_exhausted());
        assert!(backend.closed().is_empty());
    }
}
