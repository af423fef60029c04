//! Input devices.
//!
//! An [`InputDevice`] yields [`GamepadEvent`]s. The teleop session owns the
//! device inside a [`DeviceGuard`], which calls [`InputDevice::release`] on
//! every exit path so the device can be opened again straight away.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::DeviceError;

/// Gamepad buttons, named by position (Xbox A is `South`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Bottom face button.
    South,
    /// Right face button.
    East,
    /// Top face button.
    North,
    /// Left face button.
    West,
    /// Left bumper.
    LeftShoulder,
    /// Right bumper.
    RightShoulder,
    /// Left trigger.
    LeftTrigger,
    /// Right trigger.
    RightTrigger,
    /// Back/select.
    Select,
    /// Start/options.
    Start,
    /// D-pad up.
    DPadUp,
    /// D-pad down.
    DPadDown,
    /// D-pad left.
    DPadLeft,
    /// D-pad right.
    DPadRight,
}

/// Analog stick axes, normalized to `[-1, 1]`. Positive Y is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left stick, horizontal.
    LeftStickX,
    /// Left stick, vertical.
    LeftStickY,
    /// Right stick, horizontal.
    RightStickX,
    /// Right stick, vertical.
    RightStickY,
}

/// A single change in gamepad state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GamepadEvent {
    /// Button went down.
    ButtonPressed(Button),
    /// Button came up.
    ButtonReleased(Button),
    /// Axis moved.
    AxisChanged(Axis, f64),
}

/// A source of gamepad events.
pub trait InputDevice: Send {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Wait up to `timeout` for the next event.
    ///
    /// `Ok(None)` means nothing happened within the timeout.
    fn poll(&mut self, timeout: Duration) -> Result<Option<GamepadEvent>, DeviceError>;

    /// Give the underlying device back to the system.
    fn release(&mut self) {}
}

/// Owns a device and releases it when dropped.
pub struct DeviceGuard {
    device: Option<Box<dyn InputDevice>>,
}

impl std::fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("device", &self.device.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

impl DeviceGuard {
    /// Take ownership of `device`.
    pub fn new(device: Box<dyn InputDevice>) -> Self {
        Self {
            device: Some(device),
        }
    }

    /// Device name.
    pub fn name(&self) -> &str {
        self.device.as_ref().map_or("<released>", |d| d.name())
    }

    /// Poll the device. A released guard reports a fatal error.
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<GamepadEvent>, DeviceError> {
        match self.device.as_mut() {
            Some(device) => device.poll(timeout),
            None => Err(DeviceError::Fatal("device already released".into())),
        }
    }

    /// Release the device now. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            debug!(device = device.name(), "input device released");
        }
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Exclusive claim on a physical device, shared by everyone who may open it.
///
/// Opening the same controller twice is refused until the holder releases it.
#[derive(Debug, Clone, Default)]
pub struct DeviceSlot {
    held: Arc<AtomicBool>,
}

impl DeviceSlot {
    /// A free slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fatal`] if it is already held.
    pub fn try_acquire(&self) -> Result<SlotLease, DeviceError> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DeviceError::Fatal("device is busy".into()))?;
        Ok(SlotLease {
            held: Arc::clone(&self.held),
        })
    }

    /// Whether someone holds the slot.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// A held [`DeviceSlot`]; frees it on drop.
#[derive(Debug)]
pub struct SlotLease {
    held: Arc<AtomicBool>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// What a [`ScriptedGamepad`] does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptEnd {
    /// Keep reporting no events.
    #[default]
    Idle,
    /// Report a fatal disconnect.
    Disconnect,
}

/// A gamepad that replays a fixed sequence of poll results.
///
/// Used for dry runs and tests. One scripted step is consumed per poll; a
/// scripted `Ok(None)` waits out the poll timeout like a quiet device.
#[derive(Debug)]
pub struct ScriptedGamepad {
    name: String,
    script: VecDeque<Result<Option<GamepadEvent>, DeviceError>>,
    end: ScriptEnd,
    lease: Option<SlotLease>,
}

impl ScriptedGamepad {
    /// Gamepad replaying `script`.
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<Option<GamepadEvent>, DeviceError>>,
    {
        Self {
            name: "scripted gamepad".into(),
            script: script.into_iter().collect(),
            end: ScriptEnd::Idle,
            lease: None,
        }
    }

    /// Gamepad replaying only events.
    pub fn from_events<I: IntoIterator<Item = GamepadEvent>>(events: I) -> Self {
        Self::new(events.into_iter().map(|e| Ok(Some(e))))
    }

    /// Claim `slot` for this gamepad's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Fatal`] if the slot is taken.
    pub fn acquire(mut self, slot: &DeviceSlot) -> Result<Self, DeviceError> {
        self.lease = Some(slot.try_acquire()?);
        Ok(self)
    }

    /// Behaviour after the script is exhausted.
    #[must_use]
    pub fn then(mut self, end: ScriptEnd) -> Self {
        self.end = end;
        self
    }

    /// Rename the device.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Scripted steps left.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl InputDevice for ScriptedGamepad {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<GamepadEvent>, DeviceError> {
        match self.script.pop_front() {
            Some(Ok(None)) => {
                thread::sleep(timeout);
                Ok(None)
            }
            Some(step) => step,
            None => match self.end {
                ScriptEnd::Idle => {
                    thread::sleep(timeout);
                    Ok(None)
                }
                ScriptEnd::Disconnect => Err(DeviceError::Fatal("gamepad disconnected".into())),
            },
        }
    }

    fn release(&mut self) {
        self.lease = None;
    }
}
