//! Platform input service
//!
//! The poll loop talks to the operating system's controller API only through
//! the [`InputBackend`] trait. Two implementations exist:
//!
//! - [`gilrs_backend::GilrsBackend`] - real hardware through `gilrs`
//! - [`simulated::SimulatedBackend`] - scripted devices for tests and demos
//!
//! Backends are created on the poll thread and never leave it, so the trait
//! does not require `Send`.

pub mod gilrs_backend;
pub mod simulated;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::controller::device::{DeviceHandle, DeviceInfo};
use crate::controller::listener::ConnectionEvent;
use crate::haptics::Vibration;

bitflags! {
    /// Button bitmask of a single input reading
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u32 {
        const MENU = 1 << 0;
        const VIEW = 1 << 1;
        const A = 1 << 2;
        const B = 1 << 3;
        const X = 1 << 4;
        const Y = 1 << 5;
        const DPAD_UP = 1 << 6;
        const DPAD_DOWN = 1 << 7;
        const DPAD_LEFT = 1 << 8;
        const DPAD_RIGHT = 1 << 9;
        const LEFT_SHOULDER = 1 << 10;
        const RIGHT_SHOULDER = 1 << 11;
        const LEFT_THUMBSTICK = 1 << 12;
        const RIGHT_THUMBSTICK = 1 << 13;
        const GUIDE = 1 << 14;
    }
}

// Button type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    #[default]
    A,
    B,
    X,
    Y,
    Start,
    Select,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

impl ButtonType {
    /// Bit of this button inside a [`Buttons`] mask
    pub fn mask(self) -> Buttons {
        match self {
            ButtonType::A => Buttons::A,
            ButtonType::B => Buttons::B,
            ButtonType::X => Buttons::X,
            ButtonType::Y => Buttons::Y,
            ButtonType::Start => Buttons::MENU,
            ButtonType::Select => Buttons::VIEW,
            ButtonType::LeftBumper => Buttons::LEFT_SHOULDER,
            ButtonType::RightBumper => Buttons::RIGHT_SHOULDER,
            ButtonType::LeftStick => Buttons::LEFT_THUMBSTICK,
            ButtonType::RightStick => Buttons::RIGHT_THUMBSTICK,
            ButtonType::DPadUp => Buttons::DPAD_UP,
            ButtonType::DPadDown => Buttons::DPAD_DOWN,
            ButtonType::DPadLeft => Buttons::DPAD_LEFT,
            ButtonType::DPadRight => Buttons::DPAD_RIGHT,
            ButtonType::Guide => Buttons::GUIDE,
        }
    }
}

impl std::fmt::Display for ButtonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Latest input snapshot of one device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputReading {
    /// Platform timestamp of the reading; changes whenever new input arrived
    pub timestamp: u64,
    pub buttons: Buttons,
}

impl InputReading {
    pub fn new(timestamp: u64, buttons: Buttons) -> Self {
        Self { timestamp, buttons }
    }

    pub fn is_pressed(&self, button: ButtonType) -> bool {
        self.buttons.contains(button.mask())
    }
}

// Platform errors
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Failed to initialize platform input: {0}")]
    InitializationError(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceHandle),

    #[error("Force feedback error: {0}")]
    ForceFeedbackError(String),
}

/// Access to the platform's controller API
pub trait InputBackend {
    /// Devices connected right now, used for the initial enumeration
    fn connected_devices(&self) -> Vec<(DeviceHandle, DeviceInfo)>;

    /// Processes pending platform events and returns connection changes
    fn pump(&mut self) -> Vec<ConnectionEvent>;

    /// Latest reading of a device, `None` once the device is gone
    fn reading(&self, handle: DeviceHandle) -> Option<InputReading>;

    /// Commands all four haptic channels of a device
    fn set_vibration(
        &mut self,
        handle: DeviceHandle,
        vibration: &Vibration,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_reports_pressed_buttons() {
        let reading = InputReading::new(7, Buttons::A | Buttons::DPAD_UP);
        assert!(reading.is_pressed(ButtonType::A));
        assert!(reading.is_pressed(ButtonType::DPadUp));
        assert!(!reading.is_pressed(ButtonType::B));
    }

    #[test]
    fn every_button_type_has_its_own_bit() {
        let all = [
            ButtonType::A,
            ButtonType::B,
            ButtonType::X,
            ButtonType::Y,
            ButtonType::Start,
            ButtonType::Select,
            ButtonType::LeftBumper,
            ButtonType::RightBumper,
            ButtonType::LeftStick,
            ButtonType::RightStick,
            ButtonType::DPadUp,
            ButtonType::DPadDown,
            ButtonType::DPadLeft,
            ButtonType::DPadRight,
            ButtonType::Guide,
        ];
        let mut seen = Buttons::empty();
        for button in all {
            assert!(!seen.intersects(button.mask()), "{button} shares a bit");
            seen |= button.mask();
        }
        assert_eq!(seen, Buttons::all());
    }
}
