//! Simulator backend interface.
//!
//! The physics engine is a collaborator. Anything that can compile MJCF text,
//! step, render, accept actuator commands and answer camera and pose queries
//! can back a teleop session.

use std::time::Duration;

use sim_scene::Pose;

/// Stretch joints driven by velocity commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    /// Vertical lift.
    Lift,
    /// Telescoping arm.
    Arm,
    /// Wrist yaw.
    WristYaw,
    /// Head pan.
    HeadPan,
    /// Head tilt.
    HeadTilt,
}

impl Joint {
    /// Actuator name in the Stretch model.
    pub fn actuator(self) -> &'static str {
        match self {
            Self::Lift => "lift",
            Self::Arm => "arm",
            Self::WristYaw => "wrist_yaw",
            Self::HeadPan => "head_pan",
            Self::HeadTilt => "head_tilt",
        }
    }
}

/// Target gripper state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperCommand {
    /// Open the fingers.
    Open,
    /// Close the fingers.
    Close,
}

/// A command for the robot's actuators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    /// Differential-drive base velocity.
    Drive {
        /// Forward velocity (m/s).
        linear: f64,
        /// Yaw rate (rad/s).
        angular: f64,
    },
    /// Joint velocity.
    JointVelocity {
        /// Driven joint.
        joint: Joint,
        /// Velocity in joint units per second.
        velocity: f64,
    },
    /// Gripper open/close.
    Gripper(GripperCommand),
}

impl ActuatorCommand {
    /// Base at rest.
    pub const HALT: Self = Self::Drive {
        linear: 0.0,
        angular: 0.0,
    };

    /// True if every velocity in the command is finite.
    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Drive { linear, angular } => linear.is_finite() && angular.is_finite(),
            Self::JointVelocity { velocity, .. } => velocity.is_finite(),
            Self::Gripper(_) => true,
        }
    }
}

/// One RGB image from a simulated camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Camera name.
    pub camera: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGB8 pixels, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
    /// Simulation time of the render.
    pub time: f64,
}

/// Summary of a compiled model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelInfo {
    /// Model name, from `<mujoco model="...">`.
    pub name: Option<String>,
    /// Number of bodies, world excluded.
    pub bodies: usize,
    /// Camera names.
    pub cameras: Vec<String>,
    /// Integration timestep (seconds).
    pub timestep: f64,
}

/// Launch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Step without rendering.
    pub headless: bool,
    /// Wall-clock period of the stepping thread.
    pub step_interval: Duration,
    /// Commands buffered between producers and the stepping thread.
    pub mailbox_capacity: usize,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            headless: false,
            step_interval: Duration::from_millis(2),
            mailbox_capacity: 64,
        }
    }
}

impl StartOptions {
    /// Headless options with default timing.
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Default::default()
        }
    }

    /// Set whether rendering is suppressed.
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the stepping period.
    #[must_use]
    pub fn step_interval(mut self, interval: Duration) -> Self {
        self.step_interval = interval;
        self
    }

    /// Set the mailbox capacity.
    #[must_use]
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }
}

/// A physics backend.
///
/// Errors are plain strings: they are the backend's own messages and are
/// surfaced verbatim.
pub trait Simulator: Send + 'static {
    /// Build a model from MJCF text. Replaces any previous model.
    fn compile_model(&mut self, xml: &str) -> Result<ModelInfo, String>;

    /// Advance one timestep.
    fn step(&mut self);

    /// Draw the current state to the viewer.
    fn render(&mut self);

    /// Apply an actuator command. Takes effect from the next step.
    fn apply(&mut self, command: &ActuatorCommand) -> Result<(), String>;

    /// Latest image from `camera`, if the model has it.
    fn camera_frame(&self, camera: &str) -> Option<CameraFrame>;

    /// World pose of body `name`.
    fn body_pose(&self, name: &str) -> Option<Pose>;

    /// Simulation time (seconds).
    fn time(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actuator_names() {
        assert_eq!(Joint::Lift.actuator(), "lift");
        assert_eq!(Joint::WristYaw.actuator(), "wrist_yaw");
        assert_eq!(Joint::HeadTilt.actuator(), "head_tilt");
    }

    #[test]
    fn test_command_finite() {
        assert!(ActuatorCommand::HALT.is_finite());
        assert!(!ActuatorCommand::JointVelocity {
            joint: Joint::Arm,
            velocity: f64::NAN
        }
        .is_finite());
        assert!(ActuatorCommand::Gripper(GripperCommand::Close).is_finite());
    }

    #[test]
    fn test_start_options() {
        let options = StartOptions::headless().step_interval(Duration::from_millis(5));
        assert!(options.headless);
        assert_eq!(options.step_interval, Duration::from_millis(5));
        assert!(!StartOptions::default().headless);
    }
}
