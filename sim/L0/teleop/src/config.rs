//! Teleoperation configuration.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TeleopError};
use crate::simulator::StartOptions;

/// Speed scales, filtering and timing for a teleop session.
///
/// Durations are stored in milliseconds so the config reads naturally as
/// JSON:
///
/// ```json
/// { "linear_speed": 0.2, "deadzone": 0.15, "max_backoff_ms": 1000 }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TeleopConfig {
    /// Base linear velocity at full stick (m/s).
    pub linear_speed: f64,
    /// Base angular velocity at full stick (rad/s).
    pub angular_speed: f64,
    /// Lift velocity at full stick (m/s).
    pub lift_speed: f64,
    /// Arm extension velocity at full stick (m/s).
    pub arm_speed: f64,
    /// Wrist yaw velocity while the D-pad is held (rad/s).
    pub wrist_speed: f64,
    /// Head pan/tilt velocity while a button is held (rad/s).
    pub head_speed: f64,
    /// Stick deflection below this magnitude reads as zero.
    pub deadzone: f64,
    /// Longest a single device poll may block.
    pub poll_timeout_ms: u64,
    /// First retry delay after a transient device error.
    pub initial_backoff_ms: u64,
    /// Retry delay cap.
    pub max_backoff_ms: u64,
    /// Commands buffered between polling and stepping.
    pub mailbox_capacity: usize,
    /// Wall-clock period of the stepping thread.
    pub step_interval_ms: u64,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            linear_speed: 0.3,
            angular_speed: 1.0,
            lift_speed: 0.1,
            arm_speed: 0.1,
            wrist_speed: 1.0,
            head_speed: 1.0,
            deadzone: 0.1,
            poll_timeout_ms: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            mailbox_capacity: 64,
            step_interval_ms: 2,
        }
    }
}

impl TeleopConfig {
    /// Slow, gentle speeds for tight spaces.
    pub fn precise() -> Self {
        Self {
            linear_speed: 0.1,
            angular_speed: 0.3,
            lift_speed: 0.05,
            arm_speed: 0.05,
            wrist_speed: 0.4,
            head_speed: 0.4,
            ..Default::default()
        }
    }

    /// Set base speeds.
    #[must_use]
    pub fn base_speed(mut self, linear: f64, angular: f64) -> Self {
        self.linear_speed = linear;
        self.angular_speed = angular;
        self
    }

    /// Set the stick deadzone.
    #[must_use]
    pub fn deadzone(mut self, deadzone: f64) -> Self {
        self.deadzone = deadzone;
        self
    }

    /// Set the device poll timeout.
    #[must_use]
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = millis(timeout);
        self
    }

    /// Set the retry backoff bounds.
    #[must_use]
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff_ms = millis(initial);
        self.max_backoff_ms = millis(max);
        self
    }

    /// Set the mailbox capacity.
    #[must_use]
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the stepping period.
    #[must_use]
    pub fn step_interval(mut self, interval: Duration) -> Self {
        self.step_interval_ms = millis(interval);
        self
    }

    /// Device poll timeout.
    pub fn poll_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// First retry delay.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Retry delay cap.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Stepping period.
    pub fn step_interval_duration(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    /// Launch options carrying this config's stepping period and mailbox size.
    pub fn start_options(&self, headless: bool) -> StartOptions {
        StartOptions::default()
            .with_headless(headless)
            .step_interval(self.step_interval_duration())
            .mailbox_capacity(self.mailbox_capacity)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let speeds = [
            ("linear_speed", self.linear_speed),
            ("angular_speed", self.angular_speed),
            ("lift_speed", self.lift_speed),
            ("arm_speed", self.arm_speed),
            ("wrist_speed", self.wrist_speed),
            ("head_speed", self.head_speed),
        ];
        for (name, value) in speeds {
            if !value.is_finite() || value < 0.0 {
                return Err(TeleopError::invalid_config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(TeleopError::invalid_config(format!(
                "deadzone must be in [0, 1), got {}",
                self.deadzone
            )));
        }

        if self.poll_timeout_ms == 0 {
            return Err(TeleopError::invalid_config("poll_timeout_ms must be at least 1"));
        }

        if self.initial_backoff_ms == 0 || self.max_backoff_ms < self.initial_backoff_ms {
            return Err(TeleopError::invalid_config(format!(
                "backoff bounds must satisfy 0 < initial ({}) <= max ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }

        if self.mailbox_capacity == 0 {
            return Err(TeleopError::invalid_config("mailbox_capacity must be at least 1"));
        }

        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
