//! Physical gamepads through gilrs.

use std::thread;
use std::time::{Duration, Instant};

use gilrs::{Axis as GAxis, Button as GButton, Event, EventType, GamepadId, Gilrs};
use tracing::{info, warn};

use crate::device::{Axis, Button, GamepadEvent, InputDevice};
use crate::error::DeviceError;

/// Sleep between gilrs event queue checks.
const QUEUE_POLL: Duration = Duration::from_millis(2);

/// The first connected gamepad.
pub struct GilrsGamepad {
    gilrs: Option<Gilrs>,
    active: Option<GamepadId>,
    name: String,
}

impl std::fmt::Debug for GilrsGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GilrsGamepad")
            .field("name", &self.name)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl GilrsGamepad {
    /// Open the gamepad subsystem and bind to the first connected pad.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fatal`] if gilrs cannot start or no gamepad is
    /// connected.
    pub fn open() -> Result<Self, DeviceError> {
        let gilrs =
            Gilrs::new().map_err(|e| DeviceError::Fatal(format!("failed to initialize gilrs: {e}")))?;
        let (id, name) = gilrs
            .gamepads()
            .find(|(_, pad)| pad.is_connected())
            .map(|(id, pad)| (id, pad.name().to_string()))
            .ok_or_else(|| DeviceError::Fatal("no gamepad connected".into()))?;
        info!(gamepad = %name, "gamepad connected");
        Ok(Self {
            gilrs: Some(gilrs),
            active: Some(id),
            name,
        })
    }
}

impl InputDevice for GilrsGamepad {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<GamepadEvent>, DeviceError> {
        let gilrs = self
            .gilrs
            .as_mut()
            .ok_or_else(|| DeviceError::Fatal("gamepad released".into()))?;
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(Event { id, event, .. }) = gilrs.next_event() {
                match event {
                    EventType::Connected if self.active.is_none() => {
                        self.active = Some(id);
                        info!("gamepad reconnected");
                    }
                    EventType::Disconnected if self.active == Some(id) => {
                        self.active = None;
                        warn!(gamepad = %self.name, "gamepad disconnected");
                        return Err(DeviceError::Transient("gamepad disconnected".into()));
                    }
                    _ if self.active != Some(id) => {}
                    other => {
                        if let Some(mapped) = translate(other) {
                            return Ok(Some(mapped));
                        }
                    }
                }
            }

            if self.active.is_none() {
                return Err(DeviceError::Transient("waiting for gamepad".into()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep((deadline - now).min(QUEUE_POLL));
        }
    }

    fn release(&mut self) {
        if self.gilrs.take().is_some() {
            info!(gamepad = %self.name, "gamepad released");
        }
    }
}

fn translate(event: EventType) -> Option<GamepadEvent> {
    match event {
        EventType::ButtonPressed(button, _) => button_of(button).map(GamepadEvent::ButtonPressed),
        EventType::ButtonReleased(button, _) => button_of(button).map(GamepadEvent::ButtonReleased),
        EventType::AxisChanged(axis, value, _) => {
            axis_of(axis).map(|a| GamepadEvent::AxisChanged(a, f64::from(value)))
        }
        _ => None,
    }
}

fn button_of(button: GButton) -> Option<Button> {
    Some(match button {
        GButton::South => Button::South,
        GButton::East => Button::East,
        GButton::North => Button::North,
        GButton::West => Button::West,
        GButton::LeftTrigger => Button::LeftShoulder,
        GButton::RightTrigger => Button::RightShoulder,
        GButton::LeftTrigger2 => Button::LeftTrigger,
        GButton::RightTrigger2 => Button::RightTrigger,
        GButton::Select => Button::Select,
        GButton::Start => Button::Start,
        GButton::DPadUp => Button::DPadUp,
        GButton::DPadDown => Button::DPadDown,
        GButton::DPadLeft => Button::DPadLeft,
        GButton::DPadRight => Button::DPadRight,
        _ => return None,
    })
}

fn axis_of(axis: GAxis) -> Option<Axis> {
    Some(match axis {
        GAxis::LeftStickX => Axis::LeftStickX,
        GAxis::LeftStickY => Axis::LeftStickY,
        GAxis::RightStickX => Axis::RightStickX,
        GAxis::RightStickY => Axis::RightStickY,
        _ => return None,
    })
}
