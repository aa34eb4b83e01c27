//! Block nodes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::BlockId;

/// Inputs whose name starts with this prefix hold nested scripts (branches)
/// rather than value-producing expressions.
///
/// The first branch is `SUBSTACK`, the second `SUBSTACK2`, and so on.
pub const BRANCH_INPUT_PREFIX: &str = "SUBSTACK";

/// Input name for a 1-based branch index.
#[must_use]
pub fn branch_input_name(branch: usize) -> String {
    if branch <= 1 {
        BRANCH_INPUT_PREFIX.to_string()
    } else {
        format!("{BRANCH_INPUT_PREFIX}{branch}")
    }
}

/// Whether an input name denotes a branch.
#[must_use]
pub fn is_branch_input(name: &str) -> bool {
    name.starts_with(BRANCH_INPUT_PREFIX)
}

/// An in-place editable literal on a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, e.g. `VARIABLE`.
    pub name: String,
    /// Literal value as entered in the editor.
    pub value: String,
}

impl Field {
    /// Create a field.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named socket on a block, optionally occupied by a child block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Input name, e.g. `TIMES` or `SUBSTACK`.
    pub name: String,
    /// The block plugged into this input, if any.
    pub block: Option<BlockId>,
}

impl Input {
    /// Create an input pointing at `block`.
    #[must_use]
    pub fn new(name: impl Into<String>, block: Option<BlockId>) -> Self {
        Self {
            name: name.into(),
            block,
        }
    }
}

/// A single block in a program graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique identity within the graph.
    pub id: BlockId,
    /// Primitive this block invokes.
    pub opcode: String,
    /// Editable literals, in declaration order.
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
    /// Child sockets, in declaration order. Evaluation follows this order.
    #[serde(default)]
    pub inputs: IndexMap<String, Input>,
    /// Following block in the same stack.
    #[serde(default)]
    pub next: Option<BlockId>,
    /// Block this one is attached to, through `next` or an input.
    #[serde(default)]
    pub parent: Option<BlockId>,
    /// True iff this block has no parent and begins a script.
    #[serde(default)]
    pub top_level: bool,
}

impl Block {
    /// Create a detached top-level block with no fields or inputs.
    #[must_use]
    pub fn new(id: impl Into<BlockId>, opcode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opcode: opcode.into(),
            fields: IndexMap::new(),
            inputs: IndexMap::new(),
            next: None,
            parent: None,
            top_level: true,
        }
    }

    /// Builder: add a field.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(name.to_string(), Field::new(name, value.into()));
        self
    }

    /// Builder: plug `child` into input `name`.
    #[must_use]
    pub fn with_input(mut self, name: &str, child: impl Into<BlockId>) -> Self {
        self.inputs
            .insert(name.to_string(), Input::new(name, Some(child.into())));
        self
    }

    /// Builder: set the next block.
    #[must_use]
    pub fn with_next(mut self, next: impl Into<BlockId>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// Builder: attach under `parent` (clears the top-level flag).
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<BlockId>) -> Self {
        self.parent = Some(parent.into());
        self.top_level = false;
        self
    }

    /// Value of a field, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }

    /// Every block referenced by this block: `next` first, then inputs in order.
    pub fn children(&self) -> impl Iterator<Item = &BlockId> {
        self.next
            .iter()
            .chain(self.inputs.values().filter_map(|input| input.block.as_ref()))
    }

    /// Detach `child` from whichever slot holds it. Returns true if found.
    pub(crate) fn unlink_child(&mut self, child: &BlockId) -> bool {
        if self.next.as_ref() == Some(child) {
            self.next = None;
            return true;
        }
        for input in self.inputs.values_mut() {
            if input.block.as_ref() == Some(child) {
                input.block = None;
                return true;
            }
        }
        false
    }
}
