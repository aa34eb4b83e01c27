//! Structural edit events from the block editor.
//!
//! Events arrive as an ordered stream and are applied in arrival order via
//! [`ProgramGraph::apply_event`](crate::ProgramGraph::apply_event).

use serde::{Deserialize, Serialize};

use crate::adapter::BlockTree;
use crate::id::BlockId;

/// Where a block is attached: a parent plus, for input slots, the input name.
/// `input: None` means the parent's `next` connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    /// Parent block.
    pub parent: BlockId,
    /// Input on the parent, or `None` for the `next` connection.
    #[serde(default)]
    pub input: Option<String>,
}

impl ParentRef {
    /// Attach to the parent's `next` connection.
    #[must_use]
    pub fn next(parent: impl Into<BlockId>) -> Self {
        Self {
            parent: parent.into(),
            input: None,
        }
    }

    /// Attach to a named input on the parent.
    #[must_use]
    pub fn input(parent: impl Into<BlockId>, input: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            input: Some(input.into()),
        }
    }
}

/// One event of the editor's structural edit stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockEvent {
    /// A block subtree was created.
    Create {
        /// Nested description of the new blocks.
        tree: BlockTree,
    },
    /// A field value was edited.
    #[serde(rename_all = "camelCase")]
    Change {
        /// Edited block.
        block_id: BlockId,
        /// What changed; only `field` is supported.
        element: String,
        /// Field name.
        name: String,
        /// New literal value.
        new_value: String,
    },
    /// A block (and everything hanging off it) was moved.
    #[serde(rename_all = "camelCase")]
    Move {
        /// Moved block.
        block_id: BlockId,
        /// Previous attachment, if it had one.
        #[serde(default)]
        old_parent: Option<ParentRef>,
        /// New attachment; `None` makes the block top-level.
        #[serde(default)]
        new_parent: Option<ParentRef>,
    },
    /// A block and its subtree were deleted.
    #[serde(rename_all = "camelCase")]
    Delete {
        /// Deleted block.
        block_id: BlockId,
    },
    /// A stack was clicked in the editor; toggles its execution.
    #[serde(rename_all = "camelCase")]
    StackClick {
        /// Clicked block.
        block_id: BlockId,
    },
}

/// What applying an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The graph changed. Carries the top-level scripts removed by the edit.
    Edited {
        /// Scripts that no longer exist (deleted, or attached under a parent).
        removed_scripts: Vec<BlockId>,
    },
    /// The event is a UI request to toggle the script containing this block.
    StackClick(BlockId),
}
