//! The teleoperation session.
//!
//! A session pairs a running simulator with a polling thread that reads the
//! gamepad, maps events to actuator commands and drops them in the
//! simulator's mailbox. Polling and stepping never wait on each other.
//!
//! ```text
//!   Idle ──start()──► Running ──activate() / stop()──► Stopped
//! ```
//!
//! `Running` ends when the user presses Start, a fatal device error occurs,
//! the simulator stops, or [`TeleopSession::stop`] is called. The device is
//! released on all of these paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, wait_while_running};
use crate::config::TeleopConfig;
use crate::device::{DeviceGuard, InputDevice};
use crate::error::{DeviceError, Result, TeleopError};
use crate::launcher::{Mailbox, SimulatorHandle};
use crate::mapping::{CommandMapper, TeleopAction};

/// Lifecycle of a [`TeleopSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet polling.
    Idle,
    /// Polling thread alive.
    Running,
    /// Polling ended and joined.
    Stopped,
}

/// Requests a stop from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask the polling thread to finish. Returns immediately.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the polling thread is still meant to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Gamepad teleoperation of a running simulator.
#[derive(Debug)]
pub struct TeleopSession {
    config: TeleopConfig,
    state: SessionState,
    running: Arc<AtomicBool>,
    poller: Option<JoinHandle<Result<()>>>,
}

impl TeleopSession {
    /// New idle session.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: TeleopConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: SessionState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            poller: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for stopping the session from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Start polling `device` and feeding `simulator`.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::InvalidState`] unless the session is idle and
    /// [`TeleopError::SimulatorStopped`] if the simulator is not stepping.
    /// The device is released on error.
    pub fn start(
        &mut self,
        simulator: &SimulatorHandle,
        device: impl InputDevice + 'static,
    ) -> Result<()> {
        let guard = DeviceGuard::new(Box::new(device));
        if self.state != SessionState::Idle {
            return Err(TeleopError::invalid_state(format!(
                "cannot start a session that is {:?}",
                self.state
            )));
        }
        let mailbox = simulator.mailbox();
        if !mailbox.is_open() {
            return Err(TeleopError::SimulatorStopped);
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let config = self.config.clone();
        info!(device = guard.name(), "teleop session starting");

        let poller = thread::Builder::new()
            .name("teleop-poll".into())
            .spawn(move || poll_loop(guard, &mailbox, &running, &config))
            .map_err(|source| {
                self.running.store(false, Ordering::Release);
                TeleopError::Spawn {
                    name: "teleop-poll",
                    source,
                }
            })?;

        self.poller = Some(poller);
        self.state = SessionState::Running;
        Ok(())
    }

    /// Block until the session stops running.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session: a fatal
    /// [`TeleopError::Device`] error or [`TeleopError::SimulatorStopped`].
    /// Returns [`TeleopError::InvalidState`] if the session is not running.
    pub fn activate(&mut self) -> Result<()> {
        if self.state != SessionState::Running {
            return Err(TeleopError::invalid_state(format!(
                "cannot activate a session that is {:?}",
                self.state
            )));
        }
        self.join()
    }

    /// Stop polling and join the polling thread.
    ///
    /// Stopping an idle or stopped session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session, if it ended on its own
    /// before this call and nobody has observed the error yet.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            SessionState::Running => {
                self.running.store(false, Ordering::Release);
                self.join()
            }
            SessionState::Idle => {
                self.state = SessionState::Stopped;
                Ok(())
            }
            SessionState::Stopped => Ok(()),
        }
    }

    fn join(&mut self) -> Result<()> {
        let outcome = match self.poller.take() {
            Some(poller) => poller.join().unwrap_or_else(|_| {
                error!("teleop polling thread panicked");
                Err(TeleopError::Device(DeviceError::Fatal(
                    "polling thread panicked".into(),
                )))
            }),
            None => Ok(()),
        };
        self.running.store(false, Ordering::Release);
        self.state = SessionState::Stopped;
        info!(ok = outcome.is_ok(), "teleop session stopped");
        outcome
    }
}

impl Drop for TeleopSession {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            if let Err(err) = self.stop() {
                warn!(%err, "teleop session ended with error");
            }
        }
    }
}

fn poll_loop(
    mut device: DeviceGuard,
    mailbox: &Mailbox,
    running: &AtomicBool,
    config: &TeleopConfig,
) -> Result<()> {
    let mut mapper = CommandMapper::new(config.clone());
    let mut backoff = Backoff::new(config.initial_backoff(), config.max_backoff());
    let timeout = config.poll_timeout_duration();

    let outcome = loop {
        if !running.load(Ordering::Acquire) {
            break Ok(());
        }
        if !mailbox.is_open() {
            warn!("simulator stopped, ending teleop session");
            break Err(TeleopError::SimulatorStopped);
        }
        match device.poll(timeout) {
            Ok(Some(event)) => {
                backoff.reset();
                match mapper.map(&event) {
                    Some(TeleopAction::Command(command)) => {
                        if let Err(err) = mailbox.submit(command) {
                            break Err(err);
                        }
                    }
                    Some(TeleopAction::Stop) => {
                        info!("stop requested from gamepad");
                        break Ok(());
                    }
                    None => debug!(?event, "unmapped input"),
                }
            }
            Ok(None) => backoff.reset(),
            Err(DeviceError::Transient(msg)) => {
                let delay = backoff.next_delay();
                warn!(
                    device = device.name(),
                    attempt = backoff.attempt(),
                    ?delay,
                    %msg,
                    "transient device error, retrying"
                );
                wait_while_running(delay, running);
            }
            Err(fatal @ DeviceError::Fatal(_)) => {
                error!(device = device.name(), %fatal, "device failed");
                break Err(fatal.into());
            }
        }
    };

    running.store(false, Ordering::Release);
    device.release();
    for command in mapper.halt() {
        if mailbox.submit(command).is_err() {
            break;
        }
    }
    outcome
}
