//! Cooperative interpreter for block-based visual programs.
//!
//! Programs are graphs of blocks (see [`blocks_graph`]). Each top-level
//! script runs on a lightweight thread; a single scheduler interleaves the
//! threads once per tick under a wall-clock budget.
//!
//! # Architecture
//!
//! - **Values** ([`value::Value`]): loosely typed number, text, and boolean
//!   values with the coercions block programs expect
//! - **Threads** ([`thread::Thread`]): an explicit call stack of block ids
//!   with per-entry scratch frames and a tri-state status
//! - **Primitives** ([`primitive::PrimitiveTable`]): opcode dispatch, hat
//!   metadata, and the [`primitive::BlockUtility`] control object handed to
//!   every primitive
//! - **Sequencer** ([`sequencer`]): the per-thread state machine and the
//!   budgeted, fair scheduling pass
//! - **Runtime** ([`runtime::Runtime`]): targets, clones, hat triggering,
//!   edit intake, and script glow deltas
//! - **Driver** ([`driver::TickDriver`]): the single logical tick source
//!
//! Suspension is explicit state, never a native coroutine: a primitive either
//! asks to yield for the tick or returns a pending handle from the
//! [`clock::Timer`]. The timer pushes resolutions back into the runtime; the
//! scheduler never polls.
//!
//! # Usage
//!
//! ```ignore
//! use blocks_vm::{RuntimeConfig, TickDriver};
//!
//! let mut driver = TickDriver::new(RuntimeConfig::default());
//! let cat = driver.runtime_mut().add_target("cat", program, false);
//! driver.runtime_mut().green_flag();
//! for notification in driver.run(60) {
//!     println!("{notification:?}");
//! }
//! ```

pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod notification;
pub mod packages;
pub mod primitive;
pub mod runtime;
pub mod sequencer;
pub mod target;
pub mod thread;
pub mod value;

pub use clock::{FixedCostTimer, InstantWorkTimer, PendingId, SimClock, Timer, WorkTimer};
pub use config::RuntimeConfig;
pub use driver::TickDriver;
pub use error::{ConfigError, PrimitiveError, RuntimeError};
pub use notification::Notification;
pub use primitive::{
    BlockArgs, BlockPackage, BlockUtility, CloneSource, HatMeta, Outcome, PrimitiveFn,
    PrimitiveTable,
};
pub use runtime::{Renderer, Runtime};
pub use sequencer::Sequencer;
pub use target::{Target, TargetId};
pub use thread::{ScriptSource, StackFrame, Thread, ThreadId, ThreadStatus};
pub use value::Value;
