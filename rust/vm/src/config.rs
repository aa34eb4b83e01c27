//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Wall-clock execution budget for one scheduler pass.
    pub work_time: Duration,
    /// Block executions allowed for one thread in one visit before the visit
    /// is cut short. Bounds warp-mode loops.
    pub runaway_step_limit: usize,
    /// Maximum number of concurrently live clones.
    pub max_clones: usize,
    /// Interval between ticks at the normal frame rate.
    pub tick_interval: Duration,
    /// Run at 30 Hz instead of 60 Hz.
    pub compatibility_mode: bool,
    /// Keep rotating through threads until the budget is spent.
    pub turbo_mode: bool,
    /// Emit block-glow notifications around each executed command block.
    pub highlight_execution: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            work_time: Duration::from_millis(10),
            runaway_step_limit: 100_000,
            max_clones: 300,
            // 1/60 s, rounded up so sixty ticks cover a full second.
            tick_interval: Duration::from_nanos(16_666_667),
            compatibility_mode: false,
            turbo_mode: false,
            highlight_execution: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::Invalid`] for values the runtime cannot use.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would stall the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "tick_interval",
                reason: "must be non-zero".into(),
            });
        }
        if self.runaway_step_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "runaway_step_limit",
                reason: "must allow at least one block per visit".into(),
            });
        }
        Ok(())
    }

    /// Interval the tick driver actually uses.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        if self.compatibility_mode {
            self.tick_interval * 2
        } else {
            self.tick_interval
        }
    }
}
