//! Block program graph for the block VM.
//!
//! This crate owns the in-memory representation of block programs: a flat
//! arena of [`Block`] nodes keyed by [`BlockId`], plus the ordered set of
//! top-level blocks that begin scripts. It contains no execution logic.
//!
//! # Overview
//!
//! - **Blocks** ([`block::Block`]): opcode, ordered fields, ordered inputs,
//!   `next` link, `parent` back-reference, top-level flag
//! - **Program graph** ([`graph::ProgramGraph`]): structural queries and
//!   incremental edits (create/change/move/delete)
//! - **Edit events** ([`event::BlockEvent`]): the editor's ordered edit stream
//! - **Adapter** ([`adapter`]): flattens nested create payloads into blocks
//! - **Documents** ([`document::ProgramDocument`]): serialized program form
//!
//! Every query is total: unknown ids yield `None` rather than failing.
//! Edits validate before mutating, so a rejected edit leaves the graph
//! exactly as it was.

pub mod adapter;
pub mod block;
pub mod document;
pub mod error;
pub mod event;
pub mod graph;
pub mod id;

pub use adapter::{flatten, BlockTree, InputTree};
pub use block::{Block, Field, Input, BRANCH_INPUT_PREFIX};
pub use document::ProgramDocument;
pub use error::{DocumentError, EditError};
pub use event::{BlockEvent, EditOutcome, ParentRef};
pub use graph::ProgramGraph;
pub use id::BlockId;
