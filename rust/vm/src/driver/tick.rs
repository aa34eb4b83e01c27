//! Fixed-rate tick driver.

use crate::config::RuntimeConfig;
use crate::notification::Notification;
use crate::runtime::Runtime;
use crate::thread::ThreadId;

/// Cooperative driver: advances the clock by one frame interval, runs a
/// scheduler pass, and requests an animation frame.
#[derive(Debug)]
pub struct TickDriver {
    runtime: Runtime,
    ticks: u64,
}

impl TickDriver {
    /// Create a driver around a fresh runtime.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_runtime(Runtime::new(config))
    }

    /// Wrap an existing runtime.
    #[must_use]
    pub fn with_runtime(runtime: Runtime) -> Self {
        Self { runtime, ticks: 0 }
    }

    /// Access the inner runtime.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Mutable access to the inner runtime.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    /// Unwrap the runtime.
    #[must_use]
    pub fn into_runtime(self) -> Runtime {
        self.runtime
    }

    /// Ticks driven so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Drive one tick and return the notifications it produced.
    pub fn tick(&mut self) -> Vec<Notification> {
        self.tick_with_retired().1
    }

    /// Drive one tick, returning the retired threads and the notifications.
    pub fn tick_with_retired(&mut self) -> (Vec<ThreadId>, Vec<Notification>) {
        let interval = self.runtime.config().frame_interval();
        self.runtime.advance_clock(interval);
        let retired = self.runtime.step();
        self.runtime.animation_frame();
        self.ticks += 1;
        tracing::trace!(tick = self.ticks, retired = retired.len(), "tick");
        (retired, self.runtime.drain_notifications())
    }

    /// Drive `ticks` ticks, collecting every notification in order.
    pub fn run(&mut self, ticks: usize) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for _ in 0..ticks {
            notifications.extend(self.tick());
        }
        notifications
    }
}
