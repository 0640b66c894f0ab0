//! Scripted backend for tests and `--simulate`
//!
//! Clones share the same state, so a test (or the demo task) keeps one clone
//! to drive devices while the poll thread owns another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Buttons, InputBackend, InputReading, PlatformError};
use crate::controller::device::{DeviceHandle, DeviceInfo, VidPid};
use crate::controller::listener::ConnectionEvent;
use crate::haptics::Vibration;

const DEMO_PRESS_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug)]
struct SimDevice {
    handle: DeviceHandle,
    info: DeviceInfo,
    reading: InputReading,
    vibration: Vibration,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: usize,
    clock: u64,
    devices: Vec<SimDevice>,
    pending: Vec<ConnectionEvent>,
    writes: Vec<(DeviceHandle, Vibration)>,
    fail_vibration: bool,
}

impl SimState {
    fn device_mut(&mut self, handle: DeviceHandle) -> Option<&mut SimDevice> {
        self.devices.iter_mut().find(|device| device.handle == handle)
    }

    fn tick_clock(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plugs in a new device; the connect event is delivered on the next pump
    pub fn connect(&self, info: DeviceInfo) -> DeviceHandle {
        let mut state = self.lock();
        let handle = DeviceHandle::new(state.next_id);
        state.next_id += 1;
        let timestamp = state.tick_clock();

        state.devices.push(SimDevice {
            handle,
            info: info.clone(),
            reading: InputReading::new(timestamp, Buttons::empty()),
            vibration: Vibration::default(),
        });
        state
            .pending
            .push(ConnectionEvent::Connected { handle, info });
        handle
    }

    /// Unplugs a device. Returns false if it was not connected.
    pub fn disconnect(&self, handle: DeviceHandle) -> bool {
        let mut state = self.lock();
        let before = state.devices.len();
        state.devices.retain(|device| device.handle != handle);
        if state.devices.len() == before {
            return false;
        }
        state.pending.push(ConnectionEvent::Disconnected { handle });
        true
    }

    /// Replaces the pressed buttons, producing a reading with a new timestamp
    pub fn set_buttons(&self, handle: DeviceHandle, buttons: Buttons) -> bool {
        let mut state = self.lock();
        let timestamp = state.tick_clock();
        match state.device_mut(handle) {
            Some(device) => {
                device.reading = InputReading::new(timestamp, buttons);
                true
            }
            None => false,
        }
    }

    pub fn timestamp(&self, handle: DeviceHandle) -> Option<u64> {
        self.lock()
            .device_mut(handle)
            .map(|device| device.reading.timestamp)
    }

    /// Last vibration commanded for a connected device
    pub fn vibration(&self, handle: DeviceHandle) -> Option<Vibration> {
        self.lock().device_mut(handle).map(|device| device.vibration)
    }

    /// Every successful vibration write so far
    pub fn writes(&self) -> Vec<(DeviceHandle, Vibration)> {
        self.lock().writes.clone()
    }

    /// Makes subsequent vibration writes fail
    pub fn fail_vibration(&self, fail: bool) {
        self.lock().fail_vibration = fail;
    }

    /// Connects a demo pad and toggles its A button until `token` is cancelled
    pub fn spawn_demo(&self, token: CancellationToken) -> JoinHandle<()> {
        let backend = self.clone();
        tokio::spawn(async move {
            let pad = backend.connect(DeviceInfo::new(
                "Simulated Gamepad",
                VidPid::new(0x045e, 0x02ea),
            ));
            info!("Simulated gamepad {} connected", pad);

            let mut pressed = false;
            let mut interval = tokio::time::interval(DEMO_PRESS_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        pressed = !pressed;
                        let buttons = if pressed { Buttons::A } else { Buttons::empty() };
                        backend.set_buttons(pad, buttons);
                        debug!("Simulated gamepad buttons: {:?}", buttons);
                    }
                }
            }
            debug!("Simulated gamepad driver stopped");
        })
    }
}

impl InputBackend for SimulatedBackend {
    fn connected_devices(&self) -> Vec<(DeviceHandle, DeviceInfo)> {
        self.lock()
            .devices
            .iter()
            .map(|device| (device.handle, device.info.clone()))
            .collect()
    }

    fn pump(&mut self) -> Vec<ConnectionEvent> {
        std::mem::take(&mut self.lock().pending)
    }

    fn reading(&self, handle: DeviceHandle) -> Option<InputReading> {
        self.lock().device_mut(handle).map(|device| device.reading)
    }

    fn set_vibration(
        &mut self,
        handle: DeviceHandle,
        vibration: &Vibration,
    ) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if state.fail_vibration {
            return Err(PlatformError::ForceFeedbackError(
                "simulated write failure".to_string(),
            ));
        }
        let device = state
            .device_mut(handle)
            .ok_or(PlatformError::UnknownDevice(handle))?;
        device.vibration = *vibration;
        state.writes.push((handle, *vibration));
        Ok(())
    }
}
