use std::fmt;

use crate::controller::edge::EdgeDetector;
use crate::haptics::{ChannelSelector, Vibration};

/// Display name used when the platform has no metadata for a device
pub const GENERIC_DEVICE_NAME: &str = "Generic Xbox Gamepad";

/// Opaque, non-owning reference to a platform device
///
/// Two handles are equal exactly when they refer to the same physical device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// USB vendor/product id pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VidPid {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl VidPid {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for VidPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(VID:0x{:04x} PID:0x{:04x})",
            self.vendor_id, self.product_id
        )
    }
}

/// Identifying metadata reported by the platform
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub vid_pid: Option<VidPid>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, vid_pid: VidPid) -> Self {
        Self {
            name: Some(name.into()),
            vid_pid: Some(vid_pid),
        }
    }

    /// Device without extended metadata
    pub fn generic() -> Self {
        Self::default()
    }
}

/// A connected device and the state the poll loop keeps for it
#[derive(Clone, Debug)]
pub struct TrackedDevice {
    pub handle: DeviceHandle,
    pub name: String,
    pub vid_pid: VidPid,

    // Poll state
    pub last_timestamp: u64,
    pub edge: EdgeDetector,
    pub selector: ChannelSelector,
    pub vibration: Vibration,
}

impl TrackedDevice {
    /// Creates an entry with default poll state, filling in placeholders for
    /// missing metadata
    pub fn new(handle: DeviceHandle, info: DeviceInfo) -> Self {
        let name = info
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| GENERIC_DEVICE_NAME.to_string());

        Self {
            handle,
            name,
            vid_pid: info.vid_pid.unwrap_or_default(),
            last_timestamp: 0,
            edge: EdgeDetector::default(),
            selector: ChannelSelector::default(),
            vibration: Vibration::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vid_pid_renders_as_padded_hex() {
        assert_eq!(
            VidPid::new(0x045e, 0x2ea).to_string(),
            "(VID:0x045e PID:0x02ea)"
        );
        assert_eq!(VidPid::default().to_string(), "(VID:0x0000 PID:0x0000)");
    }

    #[test]
    fn missing_metadata_falls_back_to_placeholders() {
        let device = TrackedDevice::new(DeviceHandle::new(3), DeviceInfo::generic());
        assert_eq!(device.name, GENERIC_DEVICE_NAME);
        assert_eq!(device.vid_pid, VidPid::default());
        assert_eq!(device.last_timestamp, 0);

        let blank = DeviceInfo {
            name: Some("  ".to_string()),
            vid_pid: None,
        };
        let device = TrackedDevice::new(DeviceHandle::new(4), blank);
        assert_eq!(device.name, GENERIC_DEVICE_NAME);
    }

    #[test]
    fn reported_metadata_is_kept() {
        let info = DeviceInfo::new("Xbox Wireless Controller", VidPid::new(0x045e, 0x0b13));
        let device = TrackedDevice::new(DeviceHandle::new(0), info);
        assert_eq!(device.name, "Xbox Wireless Controller");
        assert_eq!(device.vid_pid.product_id, 0x0b13);
    }
}
