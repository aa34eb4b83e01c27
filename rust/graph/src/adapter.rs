//! Adapter from the editor's nested create payload to flat blocks.
//!
//! A create event describes a whole subtree: the new top block plus
//! everything plugged into it and stacked under it. The graph stores blocks
//! flat, so the subtree is unrolled here with an explicit worklist.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::block::{Block, Field, Input};
use crate::id::BlockId;

/// Nested block description carried by a create event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTree {
    /// Block id.
    pub id: BlockId,
    /// Opcode.
    pub opcode: String,
    /// Field name to literal value, in order.
    #[serde(default)]
    pub fields: IndexMap<String, String>,
    /// Input name to the subtree plugged into it, in order.
    #[serde(default)]
    pub inputs: IndexMap<String, InputTree>,
    /// The block stacked below this one.
    #[serde(default)]
    pub next: Option<Box<BlockTree>>,
}

/// Contents of one input slot: a real block, a shadow, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTree {
    /// Block the user plugged in.
    #[serde(default)]
    pub block: Option<BlockTree>,
    /// Default literal block shown when nothing is plugged in.
    #[serde(default)]
    pub shadow: Option<BlockTree>,
}

impl BlockTree {
    /// A tree with no fields, inputs, or next block.
    #[must_use]
    pub fn new(id: impl Into<BlockId>, opcode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opcode: opcode.into(),
            fields: IndexMap::new(),
            inputs: IndexMap::new(),
            next: None,
        }
    }

    /// Builder: add a field.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Builder: plug a block into an input.
    #[must_use]
    pub fn input(mut self, name: &str, child: BlockTree) -> Self {
        self.inputs.insert(
            name.to_string(),
            InputTree {
                block: Some(child),
                shadow: None,
            },
        );
        self
    }

    /// Builder: put a shadow into an input.
    #[must_use]
    pub fn shadow(mut self, name: &str, child: BlockTree) -> Self {
        self.inputs.entry(name.to_string()).or_default().shadow = Some(child);
        self
    }

    /// Builder: stack a block under this one.
    #[must_use]
    pub fn next(mut self, next: BlockTree) -> Self {
        self.next = Some(Box::new(next));
        self
    }
}

/// Flatten a create payload into blocks. The root is marked top-level; every
/// other block records its parent. A real block wins over a shadow in the
/// same input.
#[must_use]
pub fn flatten(tree: &BlockTree) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut work: Vec<(&BlockTree, Option<BlockId>)> = vec![(tree, None)];

    while let Some((node, parent)) = work.pop() {
        let mut block = Block {
            id: node.id.clone(),
            opcode: node.opcode.clone(),
            fields: node
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), Field::new(name.clone(), value.clone())))
                .collect(),
            inputs: IndexMap::new(),
            next: node.next.as_ref().map(|next| next.id.clone()),
            top_level: parent.is_none(),
            parent,
        };

        let mut children = Vec::new();
        for (name, slot) in &node.inputs {
            let child = slot.block.as_ref().or(slot.shadow.as_ref());
            block.inputs.insert(
                name.clone(),
                Input::new(name.clone(), child.map(|c| c.id.clone())),
            );
            if let Some(child) = child {
                children.push(child);
            }
        }
        if let Some(next) = node.next.as_deref() {
            children.push(next);
        }

        // Reverse so the worklist emits children in declaration order.
        for child in children.into_iter().rev() {
            work.push((child, Some(node.id.clone())));
        }
        blocks.push(block);
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_links_parents_and_marks_root() {
        let tree = BlockTree::new("hat", "event_whenflagclicked").next(
            BlockTree::new("loop", "control_repeat")
                .shadow("TIMES", BlockTree::new("n", "math_whole_number").field("NUM", "3"))
                .input("SUBSTACK", BlockTree::new("body", "data_changevariableby")),
        );

        let blocks = flatten(&tree);
        let ids: Vec<_> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["hat", "loop", "n", "body"]);

        assert!(blocks[0].top_level);
        assert_eq!(blocks[0].next, Some(BlockId::new("loop")));
        assert_eq!(blocks[1].parent, Some(BlockId::new("hat")));
        assert!(!blocks[1].top_level);
        assert_eq!(blocks[1].inputs["TIMES"].block, Some(BlockId::new("n")));
        assert_eq!(blocks[2].field("NUM"), Some("3"));
    }

    #[test]
    fn real_block_wins_over_shadow() {
        let mut slot = InputTree::default();
        slot.shadow = Some(BlockTree::new("s", "math_number"));
        slot.block = Some(BlockTree::new("r", "operator_add"));
        let mut tree = BlockTree::new("top", "control_wait");
        tree.inputs.insert("DURATION".into(), slot);

        let blocks = flatten(&tree);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].inputs["DURATION"].block, Some(BlockId::new("r")));
    }
}
