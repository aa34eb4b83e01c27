//! Runtime, primitive, and configuration errors.

use blocks_graph::BlockId;

use crate::target::TargetId;

/// A runtime request that could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The target does not exist (never added, or already disposed).
    #[error("unknown target {0}")]
    UnknownTarget(TargetId),
    /// No script starts with this block.
    #[error("unknown script {0}")]
    UnknownScript(BlockId),
    /// The request needs an editing target and none is set.
    #[error("no editing target")]
    NoEditingTarget,
    /// The clone bound has been reached.
    #[error("clone limit ({max}) reached")]
    CloneLimit {
        /// Configured bound.
        max: usize,
    },
    /// The stage cannot be cloned.
    #[error("target {0} cannot be cloned")]
    NotCloneable(TargetId),
}

/// A primitive failed. Only the thread running it is retired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    /// An argument the primitive needs is missing or unusable.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument {
        /// Input or field name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Reporter inputs are nested deeper than the evaluator allows.
    #[error("reporter nesting exceeds {limit} levels")]
    NestingTooDeep {
        /// Maximum depth.
        limit: usize,
    },
}

/// A configuration document that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON text did not parse.
    #[error("malformed runtime config: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
