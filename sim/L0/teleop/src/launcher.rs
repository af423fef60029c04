//! Scene launch and the stepping thread.
//!
//! [`build_and_start`] is the last gate before simulation: a scene that fails
//! validation or compilation never reaches the stepping thread.
//!
//! Once running, the simulator is owned by a dedicated thread. Producers talk
//! to it through a [`Mailbox`] (a bounded crossbeam channel drained before
//! every step) and read from it through a [`SimulatorView`]:
//!
//! ```text
//!  teleop poller ──submit──► mailbox ──drain──► stepping thread ─► Simulator
//!  camera feed   ─────────────── view (short lock) ──────────────►
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, SendTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use sim_scene::{Pose, SceneDocument, check_asset_references};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TeleopError};
use crate::simulator::{ActuatorCommand, CameraFrame, ModelInfo, Simulator, StartOptions};

type SharedSimulator = Arc<Mutex<Box<dyn Simulator>>>;

/// How long a producer waits on a full mailbox before rechecking that the
/// simulator is still stepping.
const SUBMIT_RECHECK: Duration = Duration::from_millis(10);

/// Validate, serialize and compile `composed`, then start stepping.
///
/// # Errors
///
/// - [`TeleopError::Scene`] if an asset reference dangles or serialization
///   fails.
/// - [`TeleopError::ModelCompile`] with the simulator's message and the
///   serialized document if compilation fails.
/// - [`TeleopError::InvalidConfig`] for a zero mailbox capacity.
pub fn build_and_start<S: Simulator>(
    mut simulator: S,
    composed: &SceneDocument,
    options: StartOptions,
) -> Result<SimulatorHandle> {
    if options.mailbox_capacity == 0 {
        return Err(TeleopError::invalid_config("mailbox capacity must be at least 1"));
    }

    check_asset_references(composed)?;
    let xml = composed.to_xml_string()?;

    let model = simulator
        .compile_model(&xml)
        .map_err(|message| TeleopError::ModelCompile {
            message,
            document: xml.clone(),
        })?;
    info!(
        model = model.name.as_deref().unwrap_or("<unnamed>"),
        bodies = model.bodies,
        headless = options.headless,
        "model compiled"
    );

    SimulatorHandle::spawn(Box::new(simulator), model, options)
}

/// Sends actuator commands to a running simulator.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: Sender<ActuatorCommand>,
    running: Arc<AtomicBool>,
}

impl Mailbox {
    /// Queue a command for the next step.
    ///
    /// Blocks while the mailbox is full, until the stepping thread drains it
    /// or stops. Commands are never dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::SimulatorStopped`] once stepping has ended.
    pub fn submit(&self, command: ActuatorCommand) -> Result<()> {
        let mut pending = command;
        loop {
            if !self.running.load(Ordering::Acquire) {
                return Err(TeleopError::SimulatorStopped);
            }
            match self.tx.send_timeout(pending, SUBMIT_RECHECK) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(command)) => {
                    debug!(?command, "mailbox full, waiting for the next step");
                    pending = command;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(TeleopError::SimulatorStopped);
                }
            }
        }
    }

    /// Whether the simulator is still stepping.
    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Read-only queries against a running simulator.
#[derive(Clone)]
pub struct SimulatorView {
    simulator: SharedSimulator,
    running: Arc<AtomicBool>,
    steps: Arc<AtomicU64>,
}

impl std::fmt::Debug for SimulatorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorView")
            .field("running", &self.is_running())
            .field("steps", &self.step_count())
            .finish_non_exhaustive()
    }
}

impl SimulatorView {
    /// Latest frame from `camera`.
    pub fn camera_frame(&self, camera: &str) -> Option<CameraFrame> {
        self.simulator.lock().camera_frame(camera)
    }

    /// World pose of body `name`.
    pub fn body_pose(&self, name: &str) -> Option<Pose> {
        self.simulator.lock().body_pose(name)
    }

    /// Simulation time.
    pub fn time(&self) -> f64 {
        self.simulator.lock().time()
    }

    /// Steps taken so far.
    pub fn step_count(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }

    /// Whether the stepping thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// A simulator stepping on its own thread.
///
/// Dropping the handle stops and joins the thread.
pub struct SimulatorHandle {
    view: SimulatorView,
    mailbox: Mailbox,
    model: ModelInfo,
    options: StartOptions,
    stepper: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SimulatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorHandle")
            .field("model", &self.model)
            .field("options", &self.options)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl SimulatorHandle {
    fn spawn(
        simulator: Box<dyn Simulator>,
        model: ModelInfo,
        options: StartOptions,
    ) -> Result<Self> {
        let (tx, rx) = bounded(options.mailbox_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let steps = Arc::new(AtomicU64::new(0));
        let simulator: SharedSimulator = Arc::new(Mutex::new(simulator));

        let stepper = {
            let simulator = Arc::clone(&simulator);
            let running = Arc::clone(&running);
            let steps = Arc::clone(&steps);
            thread::Builder::new()
                .name("sim-step".into())
                .spawn(move || step_loop(&simulator, &rx, &running, &steps, options))
                .map_err(|source| TeleopError::Spawn {
                    name: "sim-step",
                    source,
                })?
        };

        Ok(Self {
            view: SimulatorView {
                simulator,
                running: Arc::clone(&running),
                steps,
            },
            mailbox: Mailbox { tx, running },
            model,
            options,
            stepper: Some(stepper),
        })
    }

    /// A sender for actuator commands.
    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    /// A read-only view for camera and pose queries.
    pub fn view(&self) -> SimulatorView {
        self.view.clone()
    }

    /// Queue a command. See [`Mailbox::submit`].
    pub fn submit(&self, command: ActuatorCommand) -> Result<()> {
        self.mailbox.submit(command)
    }

    /// The compiled model.
    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    /// Launch options in effect.
    pub fn options(&self) -> StartOptions {
        self.options
    }

    /// Whether the stepping thread is alive.
    pub fn is_running(&self) -> bool {
        self.view.is_running()
    }

    /// Steps taken so far.
    pub fn step_count(&self) -> u64 {
        self.view.step_count()
    }

    /// Stop stepping and join the thread. Idempotent.
    pub fn stop(&mut self) {
        self.view.running.store(false, Ordering::Release);
        if let Some(stepper) = self.stepper.take() {
            if stepper.join().is_err() {
                error!("stepping thread panicked");
            }
            info!(steps = self.step_count(), "simulator stopped");
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the running flag when the stepping thread exits, panics included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn step_loop(
    simulator: &Mutex<Box<dyn Simulator>>,
    commands: &Receiver<ActuatorCommand>,
    running: &AtomicBool,
    steps: &AtomicU64,
    options: StartOptions,
) {
    let _guard = RunningGuard(running);
    debug!(interval = ?options.step_interval, "stepping thread started");

    while running.load(Ordering::Acquire) {
        let tick = Instant::now();
        {
            let mut sim = simulator.lock();
            for command in commands.try_iter() {
                if let Err(message) = sim.apply(&command) {
                    warn!(?command, %message, "simulator rejected command");
                }
            }
            sim.step();
            if !options.headless {
                sim.render();
            }
        }
        steps.fetch_add(1, Ordering::AcqRel);

        if let Some(rest) = options.step_interval.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }

    // late halt commands still reach the backend
    let mut sim = simulator.lock();
    for command in commands.try_iter() {
        if let Err(message) = sim.apply(&command) {
            warn!(?command, %message, "simulator rejected command");
        }
    }
}
