//! Haptic driver
//!
//! A controller exposes four independently controllable vibration channels:
//! two main motors and two trigger motors. The poll loop drives one of them at
//! a time with a [`Waveform`] sample; which one is chosen by a
//! [`ChannelSelector`] that advances on every rising edge of the tracked button.

pub mod selector;
pub mod waveform;

pub use selector::ChannelSelector;
pub use waveform::Waveform;

use serde::{Deserialize, Serialize};

/// One of the four vibration motors of a controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HapticChannel {
    LeftMotor,
    RightMotor,
    LeftTrigger,
    RightTrigger,
}

impl HapticChannel {
    pub const ALL: [HapticChannel; 4] = [
        HapticChannel::LeftMotor,
        HapticChannel::RightMotor,
        HapticChannel::LeftTrigger,
        HapticChannel::RightTrigger,
    ];
}

impl std::fmt::Display for HapticChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HapticChannel::LeftMotor => "left motor",
            HapticChannel::RightMotor => "right motor",
            HapticChannel::LeftTrigger => "left trigger",
            HapticChannel::RightTrigger => "right trigger",
        };
        f.write_str(name)
    }
}

/// Commanded intensities of all four channels, each in `[0, 1]`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vibration {
    pub left_motor: f64,
    pub right_motor: f64,
    pub left_trigger: f64,
    pub right_trigger: f64,
}

impl Vibration {
    pub fn get(&self, channel: HapticChannel) -> f64 {
        match channel {
            HapticChannel::LeftMotor => self.left_motor,
            HapticChannel::RightMotor => self.right_motor,
            HapticChannel::LeftTrigger => self.left_trigger,
            HapticChannel::RightTrigger => self.right_trigger,
        }
    }

    /// Sets one channel, clamping the value into `[0, 1]`
    pub fn set(&mut self, channel: HapticChannel, value: f64) {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        match channel {
            HapticChannel::LeftMotor => self.left_motor = value,
            HapticChannel::RightMotor => self.right_motor = value,
            HapticChannel::LeftTrigger => self.left_trigger = value,
            HapticChannel::RightTrigger => self.right_trigger = value,
        }
    }

    /// Writes `value` to `channel`.
    ///
    /// The other three channels keep their last commanded value unless
    /// `reset_inactive` is set, in which case they are zeroed.
    pub fn drive(&mut self, channel: HapticChannel, value: f64, reset_inactive: bool) {
        if reset_inactive {
            for other in HapticChannel::ALL {
                if other != channel {
                    self.set(other, 0.0);
                }
            }
        }
        self.set(channel, value);
    }

    pub fn is_idle(&self) -> bool {
        HapticChannel::ALL.iter().all(|channel| self.get(*channel) == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_keeps_stale_channels_by_default() {
        let mut vibration = Vibration::default();
        vibration.drive(HapticChannel::LeftMotor, 0.8, false);
        vibration.drive(HapticChannel::RightMotor, 0.3, false);

        assert_eq!(vibration.left_motor, 0.8);
        assert_eq!(vibration.right_motor, 0.3);
        assert_eq!(vibration.left_trigger, 0.0);
    }

    #[test]
    fn drive_can_zero_inactive_channels() {
        let mut vibration = Vibration::default();
        vibration.drive(HapticChannel::LeftMotor, 0.8, true);
        vibration.drive(HapticChannel::RightTrigger, 0.4, true);

        assert_eq!(vibration.left_motor, 0.0);
        assert_eq!(vibration.right_trigger, 0.4);
        assert!(!vibration.is_idle());
    }

    #[test]
    fn set_clamps_out_of_range_values() {
        let mut vibration = Vibration::default();
        vibration.set(HapticChannel::LeftTrigger, 1.7);
        vibration.set(HapticChannel::RightTrigger, -0.2);
        vibration.set(HapticChannel::LeftMotor, f64::NAN);

        assert_eq!(vibration.left_trigger, 1.0);
        assert_eq!(vibration.right_trigger, 0.0);
        assert_eq!(vibration.left_motor, 0.0);
    }
}
