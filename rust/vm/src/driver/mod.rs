//! Runtime drivers.
//!
//! A driver owns the runtime and is the single source of ticks. Semantic
//! stepping stays in [`Runtime::step`](crate::Runtime::step).

pub mod tick;

pub use tick::TickDriver;
