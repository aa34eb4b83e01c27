//! Push-based notifications for the editor and stage.

use blocks_graph::BlockId;
use serde::{Deserialize, Serialize};

/// Observable event emitted by the runtime. Collected in an outbox and
/// drained by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A script started glowing.
    GlowOn {
        /// Top block of the script.
        script: BlockId,
    },
    /// A script stopped glowing.
    GlowOff {
        /// Top block of the script.
        script: BlockId,
    },
    /// The executing block changed; highlight it.
    BlockGlowOn {
        /// Executing block.
        block: BlockId,
    },
    /// Remove a block highlight.
    BlockGlowOff {
        /// Previously executing block.
        block: BlockId,
    },
    /// A reporter run on its own produced a value.
    VisualReport {
        /// Reporter block.
        block: BlockId,
        /// Stringified value.
        value: String,
    },
    /// Targets were added or removed.
    TargetsUpdated,
    /// The editing target or its program changed.
    WorkspaceUpdated,
}
