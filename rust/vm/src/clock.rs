//! Clocks: the timer collaborator behind timed waits, and the work timer
//! that meters each scheduler pass.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Handle for a scheduled wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingId(pub(crate) u64);

impl PendingId {
    /// Raw handle value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending#{}", self.0)
    }
}

/// Source of timed wake-ups.
///
/// The runtime never polls a pending handle. It pushes elapsed time into the
/// timer with [`Timer::advance`] and resumes whatever the timer reports due.
pub trait Timer: fmt::Debug {
    /// Current time on this timer.
    fn now(&self) -> Duration;

    /// Schedule a wake-up `delay` from now.
    fn schedule(&mut self, delay: Duration) -> PendingId;

    /// Forget a wake-up. Returns false if it was unknown or already due.
    fn cancel(&mut self, id: PendingId) -> bool;

    /// Move time forward and return every wake-up that became due, earliest
    /// first.
    fn advance(&mut self, elapsed: Duration) -> Vec<PendingId>;
}

/// Deterministic simulation clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Logical tick counter (increments once per advance).
    pub tick: u64,
    /// Simulated time.
    pub time: Duration,
    /// Duration advanced per tick.
    pub tick_duration: Duration,
    next_id: u64,
    deadlines: BTreeMap<PendingId, Duration>,
}

impl SimClock {
    /// Create a new clock starting at tick 0/time 0.
    #[must_use]
    pub fn new(tick_duration: Duration) -> Self {
        Self {
            tick: 0,
            time: Duration::ZERO,
            tick_duration,
            next_id: 0,
            deadlines: BTreeMap::new(),
        }
    }

    /// Advance the clock by one tick.
    pub fn tick(&mut self) -> Vec<PendingId> {
        self.advance(self.tick_duration)
    }

    /// Number of wake-ups not yet due.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.deadlines.len()
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(Duration::from_nanos(16_666_667))
    }
}

impl Timer for SimClock {
    fn now(&self) -> Duration {
        self.time
    }

    fn schedule(&mut self, delay: Duration) -> PendingId {
        let id = PendingId(self.next_id);
        self.next_id += 1;
        self.deadlines.insert(id, self.time.saturating_add(delay));
        id
    }

    fn cancel(&mut self, id: PendingId) -> bool {
        self.deadlines.remove(&id).is_some()
    }

    fn advance(&mut self, elapsed: Duration) -> Vec<PendingId> {
        self.tick += 1;
        self.time = self.time.saturating_add(elapsed);
        let now = self.time;
        let mut due: Vec<(Duration, PendingId)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        due.sort_unstable();
        for (_, id) in &due {
            self.deadlines.remove(id);
        }
        due.into_iter().map(|(_, id)| id).collect()
    }
}

/// Meters the wall-clock cost of one scheduler pass.
pub trait WorkTimer: fmt::Debug {
    /// Begin a pass.
    fn start(&mut self);

    /// Time spent since [`WorkTimer::start`].
    fn elapsed(&mut self) -> Duration;
}

/// Real wall-clock work timer.
#[derive(Debug, Clone, Copy)]
pub struct InstantWorkTimer {
    started: Instant,
}

impl Default for InstantWorkTimer {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl WorkTimer for InstantWorkTimer {
    fn start(&mut self) {
        self.started = Instant::now();
    }

    fn elapsed(&mut self) -> Duration {
        self.started.elapsed()
    }
}

/// Work timer where every reading costs a fixed amount of time.
///
/// The sequencer reads the timer once before each thread visit, so with a
/// cost `c` and budget `b` a pass visits `ceil(b / c) - 1` threads (at least
/// one). Replays and tests use this to get budget exhaustion without a wall
/// clock.
#[derive(Debug, Clone, Copy)]
pub struct FixedCostTimer {
    cost: Duration,
    spent: Duration,
}

impl FixedCostTimer {
    /// Timer charging `cost` per reading.
    #[must_use]
    pub fn new(cost: Duration) -> Self {
        Self {
            cost,
            spent: Duration::ZERO,
        }
    }
}

impl WorkTimer for FixedCostTimer {
    fn start(&mut self) {
        self.spent = Duration::ZERO;
    }

    fn elapsed(&mut self) -> Duration {
        self.spent += self.cost;
        self.spent
    }
}
