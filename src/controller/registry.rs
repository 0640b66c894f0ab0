//! Device Registry - the list of connected devices and their poll state
//!
//! Every operation takes the same mutex for its whole duration. Nothing in here
//! logs or talks to the platform; callers get an outcome back and do their I/O
//! after the lock is released.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::device::{DeviceHandle, DeviceInfo, TrackedDevice, VidPid};

/// Result of [`DeviceRegistry::add`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added { name: String, vid_pid: VidPid },
    AlreadyTracked,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<Vec<TrackedDevice>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is recovered: entries carry no invariant a panic could break.
    fn lock(&self) -> MutexGuard<'_, Vec<TrackedDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking a device. No-op if the handle is already tracked.
    pub fn add(&self, handle: DeviceHandle, info: DeviceInfo) -> AddOutcome {
        let mut devices = self.lock();

        if devices.iter().any(|device| device.handle == handle) {
            debug!("Device {} is already tracked", handle);
            return AddOutcome::AlreadyTracked;
        }

        let device = TrackedDevice::new(handle, info);
        let outcome = AddOutcome::Added {
            name: device.name.clone(),
            vid_pid: device.vid_pid,
        };
        devices.push(device);
        outcome
    }

    /// Stops tracking a device and hands back its last state
    pub fn remove(&self, handle: DeviceHandle) -> Option<TrackedDevice> {
        let mut devices = self.lock();
        let position = devices.iter().position(|device| device.handle == handle)?;
        Some(devices.remove(position))
    }

    /// Runs `f` with exclusive access to every tracked device
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&mut TrackedDevice),
    {
        let mut devices = self.lock();
        for device in devices.iter_mut() {
            f(device);
        }
    }

    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.lock().iter().any(|device| device.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all entries in connection order
    pub fn snapshot(&self) -> Vec<TrackedDevice> {
        self.lock().clone()
    }
}
