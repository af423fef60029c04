//! Gamepad-to-actuator mapping for Stretch.
//!
//! | Input                   | Action                         |
//! |-------------------------|--------------------------------|
//! | Left stick Y / X        | base linear / angular velocity |
//! | Right stick Y           | lift velocity                  |
//! | Right stick X           | arm extension velocity         |
//! | D-pad left / right      | wrist yaw                      |
//! | D-pad up / down         | head tilt                      |
//! | Left / right shoulder   | head pan                       |
//! | South / East            | close / open gripper           |
//! | Start                   | end the session                |
//!
//! Sticks are continuous: each axis event re-emits the command for that
//! stick. Buttons are held: press starts the motion, release stops it.

use crate::config::TeleopConfig;
use crate::device::{Axis, Button, GamepadEvent};
use crate::simulator::{ActuatorCommand, GripperCommand, Joint};

/// Outcome of mapping one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleopAction {
    /// Send this command to the simulator.
    Command(ActuatorCommand),
    /// End the session.
    Stop,
}

/// Stateful event-to-command translator.
#[derive(Debug, Clone)]
pub struct CommandMapper {
    config: TeleopConfig,
    left: (f64, f64),
}

impl CommandMapper {
    /// Mapper using the speeds and deadzone of `config`.
    pub fn new(config: TeleopConfig) -> Self {
        Self {
            config,
            left: (0.0, 0.0),
        }
    }

    /// Translate one event. Events with no binding yield `None`.
    pub fn map(&mut self, event: &GamepadEvent) -> Option<TeleopAction> {
        match *event {
            GamepadEvent::AxisChanged(axis, raw) => Some(TeleopAction::Command(self.axis(axis, raw))),
            GamepadEvent::ButtonPressed(button) => self.button(button, true),
            GamepadEvent::ButtonReleased(button) => self.button(button, false),
        }
    }

    /// Commands that bring every driven actuator to rest.
    pub fn halt(&mut self) -> Vec<ActuatorCommand> {
        self.left = (0.0, 0.0);
        let mut commands = vec![ActuatorCommand::HALT];
        commands.extend(
            [
                Joint::Lift,
                Joint::Arm,
                Joint::WristYaw,
                Joint::HeadPan,
                Joint::HeadTilt,
            ]
            .into_iter()
            .map(|joint| ActuatorCommand::JointVelocity {
                joint,
                velocity: 0.0,
            }),
        );
        commands
    }

    fn axis(&mut self, axis: Axis, raw: f64) -> ActuatorCommand {
        let value = apply_deadzone(raw, self.config.deadzone);
        match axis {
            Axis::LeftStickX => {
                self.left.0 = value;
                self.drive()
            }
            Axis::LeftStickY => {
                self.left.1 = value;
                self.drive()
            }
            Axis::RightStickY => joint(Joint::Lift, value * self.config.lift_speed),
            Axis::RightStickX => joint(Joint::Arm, value * self.config.arm_speed),
        }
    }

    fn drive(&self) -> ActuatorCommand {
        let (x, y) = self.left;
        ActuatorCommand::Drive {
            linear: y * self.config.linear_speed,
            // stick right turns clockwise
            angular: -x * self.config.angular_speed,
        }
    }

    fn button(&self, button: Button, pressed: bool) -> Option<TeleopAction> {
        let held = |speed: f64| if pressed { speed } else { 0.0 };
        let wrist = self.config.wrist_speed;
        let head = self.config.head_speed;

        let command = match button {
            Button::DPadLeft => joint(Joint::WristYaw, held(wrist)),
            Button::DPadRight => joint(Joint::WristYaw, held(-wrist)),
            Button::DPadUp => joint(Joint::HeadTilt, held(head)),
            Button::DPadDown => joint(Joint::HeadTilt, held(-head)),
            Button::LeftShoulder => joint(Joint::HeadPan, held(head)),
            Button::RightShoulder => joint(Joint::HeadPan, held(-head)),
            Button::South if pressed => ActuatorCommand::Gripper(GripperCommand::Close),
            Button::East if pressed => ActuatorCommand::Gripper(GripperCommand::Open),
            Button::Start if pressed => return Some(TeleopAction::Stop),
            _ => return None,
        };
        Some(TeleopAction::Command(command))
    }
}

fn joint(joint: Joint, velocity: f64) -> ActuatorCommand {
    ActuatorCommand::JointVelocity { joint, velocity }
}

/// Zero inside `deadzone`, rescaled to reach ±1 at full deflection outside.
pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let value = value.clamp(-1.0, 1.0);
    if value.abs() < deadzone {
        0.0
    } else {
        value.signum() * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
