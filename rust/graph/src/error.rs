//! Errors for graph edits and program documents.

use crate::id::BlockId;

/// A structural edit that was rejected. The graph is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// The edited block does not exist.
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    /// The requested parent does not exist.
    #[error("unknown parent {0}")]
    UnknownParent(BlockId),
    /// The block has no field with this name.
    #[error("block {block} has no field {field}")]
    UnknownField {
        /// Block being changed.
        block: BlockId,
        /// Missing field name.
        field: String,
    },
    /// A block with this id already exists.
    #[error("duplicate block {0}")]
    DuplicateBlock(BlockId),
    /// Attaching the block would make it its own ancestor.
    #[error("moving {block} under {parent} would create a cycle")]
    Cycle {
        /// Block being moved.
        block: BlockId,
        /// Requested parent.
        parent: BlockId,
    },
    /// A new block references a block that is not part of the same create.
    #[error("block {block} references unknown block {target}")]
    DanglingReference {
        /// Referring block.
        block: BlockId,
        /// Unresolved reference.
        target: BlockId,
    },
    /// A parent link disagrees with the slot holding the child.
    #[error("block {block} is not held by its parent {parent}")]
    ParentMismatch {
        /// Child block.
        block: BlockId,
        /// Parent it claims, or the block holding it.
        parent: BlockId,
    },
    /// Change events for anything but a field are ignored.
    #[error("unsupported change element {0}")]
    UnsupportedElement(String),
}

/// A program document that could not be turned into a consistent graph.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The JSON text did not parse.
    #[error("malformed program document: {0}")]
    Json(#[from] serde_json::Error),
    /// Two blocks share an id.
    #[error("duplicate block {0}")]
    DuplicateBlock(BlockId),
    /// A `next`, input, or parent reference points outside the document.
    #[error("block {block} references unknown block {target}")]
    DanglingReference {
        /// Referring block.
        block: BlockId,
        /// Unresolved reference.
        target: BlockId,
    },
    /// A script listed in the document is missing or not top-level.
    #[error("script {0} is not a top-level block")]
    NotTopLevel(BlockId),
    /// A parentless block is not listed as a script.
    #[error("block {0} has no parent but is not a script")]
    OrphanBlock(BlockId),
}
