use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Repeat, Replay, Ticks};
use gilrs::{Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

use super::{Buttons, ButtonType, InputBackend, InputReading, PlatformError};
use crate::controller::device::{DeviceHandle, DeviceInfo, VidPid};
use crate::controller::listener::ConnectionEvent;
use crate::haptics::Vibration;

// Length of one rumble slice; the effect repeats until it is replaced
const RUMBLE_SLICE_MS: u32 = 250;

const BUTTON_MAP: [(Button, ButtonType); 15] = [
    (Button::South, ButtonType::A),
    (Button::East, ButtonType::B),
    (Button::West, ButtonType::X),
    (Button::North, ButtonType::Y),
    (Button::Start, ButtonType::Start),
    (Button::Select, ButtonType::Select),
    (Button::LeftTrigger, ButtonType::LeftBumper),
    (Button::RightTrigger, ButtonType::RightBumper),
    (Button::LeftThumb, ButtonType::LeftStick),
    (Button::RightThumb, ButtonType::RightStick),
    (Button::DPadUp, ButtonType::DPadUp),
    (Button::DPadDown, ButtonType::DPadDown),
    (Button::DPadLeft, ButtonType::DPadLeft),
    (Button::DPadRight, ButtonType::DPadRight),
    (Button::Mode, ButtonType::Guide),
];

/// Rumble currently playing on one gamepad
#[derive(Default)]
struct ActiveRumble {
    strong: u16,
    weak: u16,
    // Dropping the effect stops it
    effect: Option<Effect>,
}

/// Real hardware through gilrs
///
/// gilrs exposes two rumble motors per gamepad. The left and right main
/// motors map to its strong and weak effects; trigger motors have no gilrs
/// counterpart and are only recorded.
pub struct GilrsBackend {
    gilrs: Gilrs,
    // Microseconds since the UNIX epoch of the last input event per gamepad
    last_input: HashMap<GamepadId, u64>,
    rumble: HashMap<GamepadId, ActiveRumble>,
    trigger_notice: HashSet<GamepadId>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, PlatformError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => {
                info!("Successfully initialized gilrs");
                gilrs
            }
            Err(gilrs::Error::NotImplemented(dummy)) => {
                warn!("Gamepad input is not supported on this platform, no devices will appear");
                dummy
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(PlatformError::InitializationError(e.to_string()));
            }
        };

        Ok(Self {
            gilrs,
            last_input: HashMap::new(),
            rumble: HashMap::new(),
            trigger_notice: HashSet::new(),
        })
    }

    fn gamepad_id(&self, handle: DeviceHandle) -> Option<GamepadId> {
        self.gilrs
            .gamepads()
            .map(|(id, _)| id)
            .find(|id| usize::from(*id) == handle.raw())
    }
}

impl InputBackend for GilrsBackend {
    fn connected_devices(&self) -> Vec<(DeviceHandle, DeviceInfo)> {
        self.gilrs
            .gamepads()
            .map(|(id, gamepad)| {
                debug!(
                    "Gamepad {}: {} (UUID {:?}, ff: {})",
                    id,
                    gamepad.name(),
                    gamepad.uuid(),
                    gamepad.is_ff_supported()
                );
                (handle_of(id), device_info(&gamepad))
            })
            .collect()
    }

    fn pump(&mut self) -> Vec<ConnectionEvent> {
        let mut changes = Vec::new();

        while let Some(Event { id, event, time, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    let info = match self.gilrs.connected_gamepad(id) {
                        Some(gamepad) => device_info(&gamepad),
                        None => DeviceInfo::generic(),
                    };
                    changes.push(ConnectionEvent::Connected {
                        handle: handle_of(id),
                        info,
                    });
                }
                EventType::Disconnected => {
                    self.last_input.remove(&id);
                    self.rumble.remove(&id);
                    self.trigger_notice.remove(&id);
                    changes.push(ConnectionEvent::Disconnected {
                        handle: handle_of(id),
                    });
                }
                EventType::ButtonPressed(..)
                | EventType::ButtonReleased(..)
                | EventType::ButtonRepeated(..)
                | EventType::ButtonChanged(..)
                | EventType::AxisChanged(..) => {
                    self.last_input.insert(id, micros_since_epoch(time));
                }
                _ => debug!("Ignoring gilrs event: {:?}", event),
            }
        }

        changes
    }

    fn reading(&self, handle: DeviceHandle) -> Option<InputReading> {
        let id = self.gamepad_id(handle)?;
        let gamepad = self.gilrs.connected_gamepad(id)?;

        let buttons = BUTTON_MAP
            .iter()
            .filter(|(button, _)| gamepad.is_pressed(*button))
            .fold(Buttons::empty(), |mask, (_, button_type)| {
                mask | button_type.mask()
            });
        let timestamp = self.last_input.get(&id).copied().unwrap_or(0);

        Some(InputReading::new(timestamp, buttons))
    }

    fn set_vibration(
        &mut self,
        handle: DeviceHandle,
        vibration: &Vibration,
    ) -> Result<(), PlatformError> {
        let id = self
            .gamepad_id(handle)
            .ok_or(PlatformError::UnknownDevice(handle))?;

        if !self.gilrs.gamepad(id).is_ff_supported() {
            debug!("Gamepad {} has no force feedback, skipping vibration", id);
            return Ok(());
        }

        if (vibration.left_trigger > 0.0 || vibration.right_trigger > 0.0)
            && self.trigger_notice.insert(id)
        {
            info!(
                "Gamepad {}: trigger motors are not available through gilrs, only main motors vibrate",
                id
            );
        }

        let strong = magnitude(vibration.left_motor);
        let weak = magnitude(vibration.right_motor);

        let active = self.rumble.entry(id).or_default();
        if active.strong == strong && active.weak == weak {
            return Ok(());
        }

        active.strong = strong;
        active.weak = weak;
        active.effect = None;

        if strong == 0 && weak == 0 {
            debug!("Gamepad {}: rumble stopped", id);
            return Ok(());
        }

        let effect = EffectBuilder::new()
            .add_effect(rumble_effect(BaseEffectType::Strong { magnitude: strong }))
            .add_effect(rumble_effect(BaseEffectType::Weak { magnitude: weak }))
            .repeat(Repeat::Infinitely)
            .gamepads(&[id])
            .finish(&mut self.gilrs)
            .map_err(|e| PlatformError::ForceFeedbackError(e.to_string()))?;
        effect
            .play()
            .map_err(|e| PlatformError::ForceFeedbackError(e.to_string()))?;

        debug!("Gamepad {}: rumble strong={} weak={}", id, strong, weak);
        active.effect = Some(effect);
        Ok(())
    }
}

fn handle_of(id: GamepadId) -> DeviceHandle {
    DeviceHandle::new(usize::from(id))
}

fn device_info(gamepad: &Gamepad<'_>) -> DeviceInfo {
    let vid_pid = match (gamepad.vendor_id(), gamepad.product_id()) {
        (Some(vendor_id), Some(product_id)) => Some(VidPid::new(vendor_id, product_id)),
        _ => None,
    };
    DeviceInfo {
        name: Some(gamepad.name().to_string()),
        vid_pid,
    }
}

fn rumble_effect(kind: BaseEffectType) -> BaseEffect {
    BaseEffect {
        kind,
        scheduling: Replay {
            play_for: Ticks::from_ms(RUMBLE_SLICE_MS),
            ..Default::default()
        },
        envelope: Default::default(),
    }
}

// Maps an intensity in [0, 1] onto the gilrs magnitude range
fn magnitude(intensity: f64) -> u16 {
    (intensity.clamp(0.0, 1.0) * f64::from(u16::MAX)).round() as u16
}

fn micros_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
