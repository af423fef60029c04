//! Scene launch and gamepad teleoperation for Stretch.
//!
//! This crate takes a composed [`sim_scene::SceneDocument`] to a running
//! simulation and drives it from a gamepad:
//!
//! - [`build_and_start`] validates, serializes and compiles the scene, then
//!   starts a stepping thread that owns the [`Simulator`].
//! - [`TeleopSession`] polls an [`InputDevice`], maps events with a
//!   [`CommandMapper`] and submits [`ActuatorCommand`]s to the simulator's
//!   [`Mailbox`].
//! - [`CameraFeed`] reads camera frames through a [`SimulatorView`].
//!
//! The physics engine is behind the [`Simulator`] trait. [`DryRunSimulator`]
//! checks structure and records commands without integrating anything.
//!
//! # Example
//!
//! ```
//! use sim_scene::SceneDocument;
//! use sim_teleop::{
//!     build_and_start, Axis, DryRunSimulator, GamepadEvent, ScriptedGamepad, StartOptions,
//!     TeleopConfig, TeleopSession,
//! };
//!
//! let scene = SceneDocument::parse("<mujoco><worldbody/></mujoco>")?;
//! let sim = DryRunSimulator::new();
//! let log = sim.log();
//! let mut handle = build_and_start(sim, &scene, StartOptions::headless())?;
//!
//! let pad = ScriptedGamepad::from_events([GamepadEvent::AxisChanged(Axis::LeftStickY, 1.0)]);
//! let mut session = TeleopSession::new(TeleopConfig::default())?;
//! session.start(&handle, pad)?;
//! session.stop()?;
//! handle.stop();
//!
//! assert!(!log.applied().is_empty());
//! # Ok::<(), sim_teleop::TeleopError>(())
//! ```
//!
//! # Features
//!
//! - `serde`: (de)serialize [`TeleopConfig`].
//! - `gilrs`: `GilrsGamepad`, a physical gamepad backend.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

mod backoff;
mod camera;
mod config;
mod device;
mod dry_run;
mod error;
#[cfg(feature = "gilrs")]
mod gilrs_device;
mod launcher;
mod mapping;
mod session;
mod simulator;

pub use backoff::{Backoff, wait_while_running};
pub use camera::{CameraFeed, FrameLogger, FrameSink, LatestFrames, STRETCH_CAMERAS};
pub use config::TeleopConfig;
pub use device::{
    Axis, Button, DeviceGuard, DeviceSlot, GamepadEvent, InputDevice, ScriptEnd, ScriptedGamepad,
    SlotLease,
};
pub use dry_run::{DEFAULT_TIMESTEP, DryRunLog, DryRunSimulator};
pub use error::{DeviceError, Result, TeleopError};
#[cfg(feature = "gilrs")]
pub use gilrs_device::GilrsGamepad;
pub use launcher::{Mailbox, SimulatorHandle, SimulatorView, build_and_start};
pub use mapping::{CommandMapper, TeleopAction, apply_deadzone};
pub use session::{SessionState, StopHandle, TeleopSession};
pub use simulator::{
    ActuatorCommand, CameraFrame, GripperCommand, Joint, ModelInfo, Simulator, StartOptions,
};
