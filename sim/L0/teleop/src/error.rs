//! Error types for launching and teleoperating a simulation.

use sim_scene::SceneError;
use thiserror::Error;

/// Failures reported by an input device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Recoverable hiccup (disconnect, busy bus). Polling retries with backoff.
    #[error("transient device error: {0}")]
    Transient(String),

    /// Unrecoverable failure. Ends the teleop session.
    #[error("fatal device error: {0}")]
    Fatal(String),
}

impl DeviceError {
    /// Whether polling may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors that can occur while launching a scene or running a teleop session.
#[derive(Debug, Error)]
pub enum TeleopError {
    /// Scene could not be serialized or failed validation.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The simulator rejected the composed scene.
    #[error("model compile failed: {message}")]
    ModelCompile {
        /// Simulator message, verbatim.
        message: String,
        /// The serialized scene that was rejected.
        document: String,
    },

    /// Input device failure.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Operation not valid in the current session state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration value out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The simulator stopped stepping; its mailbox is closed.
    #[error("simulator stopped")]
    SimulatorStopped,

    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name.
        name: &'static str,
        /// OS error.
        #[source]
        source: std::io::Error,
    },
}

impl TeleopError {
    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// The rejected document, for compile failures.
    pub fn document(&self) -> Option<&str> {
        match self {
            Self::ModelCompile { document, .. } => Some(document),
            _ => None,
        }
    }
}

/// Result type for teleop operations.
pub type Result<T> = std::result::Result<T, TeleopError>;
