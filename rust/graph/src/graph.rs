//! The program graph: an arena of blocks plus the ordered script set.
//!
//! Recursive operations (cascading delete, cycle checks, script lookup) walk
//! the arena with explicit worklists so deeply nested programs cannot
//! exhaust the native stack.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::{IndexMap, IndexSet};

use crate::block::{branch_input_name, is_branch_input, Block, Field, Input};
use crate::error::{DocumentError, EditError};
use crate::event::{BlockEvent, EditOutcome, ParentRef};
use crate::id::BlockId;

/// Blocks of one script container (one actor's workspace, or the flyout).
#[derive(Debug, Clone, Default)]
pub struct ProgramGraph {
    blocks: BTreeMap<BlockId, Block>,
    scripts: IndexSet<BlockId>,
    ephemeral: BTreeSet<BlockId>,
}

impl ProgramGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Queries ----

    /// Look up a block.
    #[must_use]
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Whether the block exists.
    #[must_use]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    /// Number of blocks, ephemeral ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the graph holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All block ids in id order.
    pub fn block_ids(&self) -> impl Iterator<Item = &BlockId> + '_ {
        self.blocks.keys()
    }

    /// Opcode of a block.
    #[must_use]
    pub fn opcode(&self, id: &BlockId) -> Option<&str> {
        self.blocks.get(id).map(|b| b.opcode.as_str())
    }

    /// The block after `id` in its stack.
    #[must_use]
    pub fn next(&self, id: &BlockId) -> Option<&BlockId> {
        self.blocks.get(id)?.next.as_ref()
    }

    /// First block of the 1-based `branch` of a C-shaped block. `None` for an
    /// unknown block or an empty branch.
    #[must_use]
    pub fn branch(&self, id: &BlockId, branch: usize) -> Option<&BlockId> {
        self.blocks
            .get(id)?
            .inputs
            .get(&branch_input_name(branch))?
            .block
            .as_ref()
    }

    /// Fields of a block, in order.
    #[must_use]
    pub fn fields(&self, id: &BlockId) -> Option<&IndexMap<String, Field>> {
        self.blocks.get(id).map(|b| &b.fields)
    }

    /// Value inputs of a block (everything except branches), in order.
    pub fn non_branch_inputs(&self, id: &BlockId) -> Option<impl Iterator<Item = &Input> + '_> {
        self.blocks
            .get(id)
            .map(|b| b.inputs.values().filter(|input| !is_branch_input(&input.name)))
    }

    /// Top-level blocks that begin scripts, in insertion order.
    pub fn scripts(&self) -> impl Iterator<Item = &BlockId> + '_ {
        self.scripts.iter()
    }

    /// Whether `id` begins a script.
    #[must_use]
    pub fn is_script(&self, id: &BlockId) -> bool {
        self.scripts.contains(id)
    }

    /// Whether `id` was created as an ephemeral (flyout/preview) block.
    #[must_use]
    pub fn is_ephemeral(&self, id: &BlockId) -> bool {
        self.ephemeral.contains(id)
    }

    /// Root of the stack containing `id`, if that root begins a known script
    /// or is an ephemeral root.
    #[must_use]
    pub fn top_level_script(&self, id: &BlockId) -> Option<&BlockId> {
        let mut current = self.blocks.get(id)?;
        // Bounded by the block count so a corrupted parent chain cannot spin.
        for _ in 0..=self.blocks.len() {
            match current.parent.as_ref() {
                Some(parent) => current = self.blocks.get(parent)?,
                None => {
                    let root = &current.id;
                    return (self.scripts.contains(root) || self.ephemeral.contains(root))
                        .then_some(root);
                }
            }
        }
        None
    }

    // ---- Edits ----

    /// Insert a single parentless block with no children.
    ///
    /// # Errors
    ///
    /// Same as [`create_blocks`](Self::create_blocks).
    pub fn create_block(&mut self, block: Block, ephemeral: bool) -> Result<(), EditError> {
        self.create_blocks(vec![block], ephemeral)
    }

    /// Insert a batch of new blocks. Non-ephemeral parentless blocks join
    /// the script set; ephemeral blocks never do.
    ///
    /// The batch must be closed: every `next`, input, and parent reference
    /// resolves to another block of the batch, and parent links agree with
    /// the slot holding the child. Existing blocks are attached with moves,
    /// not creates.
    ///
    /// # Errors
    ///
    /// Rejects the whole batch, leaving the graph unchanged, on a duplicate
    /// id, an unresolved reference, or a parent link that disagrees with its
    /// slot.
    pub fn create_blocks(&mut self, blocks: Vec<Block>, ephemeral: bool) -> Result<(), EditError> {
        let mut batch: IndexMap<BlockId, Block> = IndexMap::new();
        for block in blocks {
            if self.blocks.contains_key(&block.id) || batch.contains_key(&block.id) {
                return Err(EditError::DuplicateBlock(block.id));
            }
            batch.insert(block.id.clone(), block);
        }

        for block in batch.values() {
            for child in block.children() {
                let Some(child_block) = batch.get(child) else {
                    return Err(EditError::DanglingReference {
                        block: block.id.clone(),
                        target: child.clone(),
                    });
                };
                if child_block.parent.as_ref() != Some(&block.id) {
                    return Err(EditError::ParentMismatch {
                        block: child.clone(),
                        parent: block.id.clone(),
                    });
                }
            }
            if let Some(parent) = &block.parent {
                let Some(parent_block) = batch.get(parent) else {
                    return Err(EditError::UnknownParent(parent.clone()));
                };
                if !parent_block.children().any(|c| c == &block.id) {
                    return Err(EditError::ParentMismatch {
                        block: block.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        for (id, mut block) in batch {
            block.top_level = block.parent.is_none();
            if ephemeral {
                self.ephemeral.insert(id.clone());
            } else if block.top_level {
                self.scripts.insert(id.clone());
            }
            self.blocks.insert(id, block);
        }
        Ok(())
    }

    /// Set the value of an existing field.
    ///
    /// # Errors
    ///
    /// Fails if the block or the field does not exist.
    pub fn change_field(
        &mut self,
        id: &BlockId,
        field: &str,
        value: impl Into<String>,
    ) -> Result<(), EditError> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;
        let slot = block
            .fields
            .get_mut(field)
            .ok_or_else(|| EditError::UnknownField {
                block: id.clone(),
                field: field.to_string(),
            })?;
        slot.value = value.into();
        Ok(())
    }

    /// Move a block (with everything attached below it) to a new parent, or
    /// make it top-level when `new_parent` is `None`.
    ///
    /// The block is detached from its recorded parent; `old_parent` is only
    /// checked for consistency. A block displaced from the target slot
    /// becomes top-level.
    ///
    /// # Errors
    ///
    /// Fails without changing the graph if the block or new parent is unknown
    /// or the move would create a cycle.
    pub fn move_block(
        &mut self,
        id: &BlockId,
        old_parent: Option<&ParentRef>,
        new_parent: Option<&ParentRef>,
    ) -> Result<(), EditError> {
        let recorded = self
            .blocks
            .get(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))?
            .parent
            .clone();

        if let Some(target) = new_parent {
            if !self.blocks.contains_key(&target.parent) {
                return Err(EditError::UnknownParent(target.parent.clone()));
            }
            if self.is_self_or_ancestor(id, &target.parent) {
                return Err(EditError::Cycle {
                    block: id.clone(),
                    parent: target.parent.clone(),
                });
            }
        }

        if let Some(old) = old_parent {
            if recorded.as_ref() != Some(&old.parent) {
                tracing::debug!(block = %id, claimed = %old.parent, ?recorded, "move: stale old parent");
            }
        }

        if let Some(parent) = recorded {
            if let Some(parent_block) = self.blocks.get_mut(&parent) {
                parent_block.unlink_child(id);
            }
        }

        match new_parent {
            None => self.make_top_level(id),
            Some(target) => {
                self.scripts.shift_remove(id);
                if let Some(block) = self.blocks.get_mut(id) {
                    block.parent = Some(target.parent.clone());
                    block.top_level = false;
                }
                let displaced = match self.blocks.get_mut(&target.parent) {
                    Some(parent) => match &target.input {
                        Some(name) => {
                            let slot = parent
                                .inputs
                                .entry(name.clone())
                                .or_insert_with(|| Input::new(name.clone(), None));
                            slot.block.replace(id.clone())
                        }
                        None => parent.next.replace(id.clone()),
                    },
                    None => None,
                };
                if let Some(displaced) = displaced.filter(|d| d != id) {
                    self.make_top_level(&displaced);
                }
            }
        }
        Ok(())
    }

    /// Delete a block, its `next` chain, and everything in its inputs.
    /// Returns every removed id.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::UnknownBlock`] if the block does not exist.
    pub fn delete_block(&mut self, id: &BlockId) -> Result<Vec<BlockId>, EditError> {
        let parent = self
            .blocks
            .get(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))?
            .parent
            .clone();
        if let Some(parent) = parent {
            if let Some(parent_block) = self.blocks.get_mut(&parent) {
                parent_block.unlink_child(id);
            }
        }

        let mut removed = Vec::new();
        let mut work = vec![id.clone()];
        while let Some(current) = work.pop() {
            let Some(block) = self.blocks.remove(&current) else {
                continue;
            };
            work.extend(block.children().cloned());
            self.scripts.shift_remove(&current);
            self.ephemeral.remove(&current);
            removed.push(current);
        }

        // Anything still pointing at a removed parent has lost its only
        // parent link and now begins a script of its own.
        let removed_set: BTreeSet<&BlockId> = removed.iter().collect();
        let orphans: Vec<BlockId> = self
            .blocks
            .values()
            .filter(|b| b.parent.as_ref().is_some_and(|p| removed_set.contains(p)))
            .map(|b| b.id.clone())
            .collect();
        for orphan in orphans {
            self.make_top_level(&orphan);
        }

        Ok(removed)
    }

    /// Apply one event of the edit stream.
    ///
    /// # Errors
    ///
    /// Returns the reason the edit was rejected; the graph is unchanged.
    pub fn apply_event(
        &mut self,
        event: &BlockEvent,
        ephemeral: bool,
    ) -> Result<EditOutcome, EditError> {
        match event {
            BlockEvent::Create { tree } => {
                self.create_blocks(crate::adapter::flatten(tree), ephemeral)?;
                Ok(EditOutcome::Edited {
                    removed_scripts: Vec::new(),
                })
            }
            BlockEvent::Change {
                block_id,
                element,
                name,
                new_value,
            } => {
                if element != "field" {
                    return Err(EditError::UnsupportedElement(element.clone()));
                }
                self.change_field(block_id, name, new_value.clone())?;
                Ok(EditOutcome::Edited {
                    removed_scripts: Vec::new(),
                })
            }
            BlockEvent::Move {
                block_id,
                old_parent,
                new_parent,
            } => {
                let was_script = self.is_script(block_id);
                self.move_block(block_id, old_parent.as_ref(), new_parent.as_ref())?;
                let removed_scripts = if was_script && !self.is_script(block_id) {
                    vec![block_id.clone()]
                } else {
                    Vec::new()
                };
                Ok(EditOutcome::Edited { removed_scripts })
            }
            BlockEvent::Delete { block_id } => {
                let scripts_before: Vec<BlockId> = self.scripts.iter().cloned().collect();
                self.delete_block(block_id)?;
                let removed_scripts = scripts_before
                    .into_iter()
                    .filter(|s| !self.blocks.contains_key(s))
                    .collect();
                Ok(EditOutcome::Edited { removed_scripts })
            }
            BlockEvent::StackClick { block_id } => Ok(EditOutcome::StackClick(block_id.clone())),
        }
    }

    /// Check the graph's structural invariants: references resolve, parent
    /// links agree with the referring slot, and the script set is exactly
    /// the set of parentless non-ephemeral blocks.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), DocumentError> {
        for block in self.blocks.values() {
            for child in block.children() {
                let Some(child_block) = self.blocks.get(child) else {
                    return Err(DocumentError::DanglingReference {
                        block: block.id.clone(),
                        target: child.clone(),
                    });
                };
                if child_block.parent.as_ref() != Some(&block.id) {
                    return Err(DocumentError::DanglingReference {
                        block: child.clone(),
                        target: block.id.clone(),
                    });
                }
            }
            if let Some(parent) = &block.parent {
                if !self.blocks.contains_key(parent) {
                    return Err(DocumentError::DanglingReference {
                        block: block.id.clone(),
                        target: parent.clone(),
                    });
                }
            } else if !self.ephemeral.contains(&block.id) && !self.scripts.contains(&block.id) {
                return Err(DocumentError::OrphanBlock(block.id.clone()));
            }
        }
        for script in &self.scripts {
            match self.blocks.get(script) {
                Some(block) if block.top_level && block.parent.is_none() => {}
                _ => return Err(DocumentError::NotTopLevel(script.clone())),
            }
        }
        Ok(())
    }

    fn make_top_level(&mut self, id: &BlockId) {
        let Some(block) = self.blocks.get_mut(id) else {
            return;
        };
        block.parent = None;
        block.top_level = true;
        if !self.ephemeral.contains(id) {
            self.scripts.insert(id.clone());
        }
    }

    /// Whether `id` is `candidate` or one of its ancestors.
    fn is_self_or_ancestor(&self, id: &BlockId, candidate: &BlockId) -> bool {
        let mut current = Some(candidate);
        for _ in 0..=self.blocks.len() {
            match current {
                Some(c) if c == id => return true,
                Some(c) => current = self.blocks.get(c).and_then(|b| b.parent.as_ref()),
                None => return false,
            }
        }
        true
    }

    pub(crate) fn ephemeral_ids(&self) -> &BTreeSet<BlockId> {
        &self.ephemeral
    }

    pub(crate) fn from_parts(blocks: BTreeMap<BlockId, Block>, scripts: IndexSet<BlockId>) -> Self {
        Self {
            blocks,
            scripts,
            ephemeral: BTreeSet::new(),
        }
    }

    pub(crate) fn blocks(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn id(s: &str) -> BlockId {
        BlockId::new(s)
    }

    /// hat -> loop { body } -> after, with a shadow in loop.TIMES.
    fn sample() -> ProgramGraph {
        let mut graph = ProgramGraph::new();
        graph
            .create_blocks(
                vec![
                    Block::new("hat", "event_whenflagclicked").with_next("loop"),
                    Block::new("loop", "control_repeat")
                        .with_parent("hat")
                        .with_input("TIMES", "n")
                        .with_input("SUBSTACK", "body")
                        .with_next("after"),
                    Block::new("n", "math_whole_number")
                        .with_parent("loop")
                        .with_field("NUM", "3"),
                    Block::new("body", "looks_say").with_parent("loop"),
                    Block::new("after", "looks_hide").with_parent("loop"),
                ],
                false,
            )
            .unwrap();
        graph
    }

    #[test]
    fn queries_on_sample() {
        let graph = sample();
        graph.validate().unwrap();
        assert_eq!(graph.scripts().collect::<Vec<_>>(), vec![&id("hat")]);
        assert_eq!(graph.next(&id("hat")), Some(&id("loop")));
        assert_eq!(graph.branch(&id("loop"), 1), Some(&id("body")));
        assert_eq!(graph.branch(&id("loop"), 2), None);
        let inputs: Vec<_> = graph
            .non_branch_inputs(&id("loop"))
            .unwrap()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(inputs, vec!["TIMES"]);
        assert_eq!(graph.top_level_script(&id("body")), Some(&id("hat")));
    }

    #[test]
    fn unknown_ids_are_absent_not_errors() {
        let graph = sample();
        let missing = id("nope");
        assert!(graph.block(&missing).is_none());
        assert!(graph.next(&missing).is_none());
        assert!(graph.branch(&missing, 1).is_none());
        assert!(graph.fields(&missing).is_none());
        assert!(graph.non_branch_inputs(&missing).is_none());
        assert!(graph.top_level_script(&missing).is_none());
    }

    #[test]
    fn delete_cascades_through_next_and_inputs() {
        let mut graph = sample();
        let mut removed = graph.delete_block(&id("loop")).unwrap();
        removed.sort();
        assert_eq!(removed, vec![id("after"), id("body"), id("loop"), id("n")]);
        assert_eq!(graph.next(&id("hat")), None);
        assert_eq!(graph.len(), 1);
        graph.validate().unwrap();
    }

    #[test]
    fn delete_top_level_removes_script() {
        let mut graph = sample();
        graph.delete_block(&id("hat")).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.scripts().count(), 0);
    }

    #[test]
    fn move_to_top_level_and_back() {
        let mut graph = sample();
        graph
            .move_block(&id("after"), Some(&ParentRef::next("loop")), None)
            .unwrap();
        assert!(graph.is_script(&id("after")));
        assert_eq!(graph.next(&id("loop")), None);
        graph.validate().unwrap();

        graph
            .move_block(&id("after"), None, Some(&ParentRef::input("loop", "SUBSTACK2")))
            .unwrap();
        assert!(!graph.is_script(&id("after")));
        assert_eq!(graph.branch(&id("loop"), 2), Some(&id("after")));
        graph.validate().unwrap();
    }

    #[test]
    fn move_to_unknown_parent_is_rejected_without_change() {
        let mut graph = sample();
        let before = graph.clone();
        let result = graph.move_block(&id("body"), None, Some(&ParentRef::next("ghost")));
        assert_matches!(result, Err(EditError::UnknownParent(_)));
        assert_eq!(graph.blocks, before.blocks);
        assert_eq!(graph.scripts, before.scripts);
    }

    #[test]
    fn move_under_own_descendant_is_a_cycle() {
        let mut graph = sample();
        let result = graph.move_block(&id("loop"), None, Some(&ParentRef::next("body")));
        assert_matches!(result, Err(EditError::Cycle { .. }));
        graph.validate().unwrap();
    }

    #[test]
    fn displaced_occupant_becomes_top_level() {
        let mut graph = sample();
        graph
            .create_block(Block::new("other", "looks_show"), false)
            .unwrap();
        graph
            .move_block(&id("other"), None, Some(&ParentRef::input("loop", "SUBSTACK")))
            .unwrap();
        assert!(graph.is_script(&id("body")));
        assert_eq!(graph.branch(&id("loop"), 1), Some(&id("other")));
        graph.validate().unwrap();
    }

    #[test]
    fn create_rejects_references_outside_the_batch() {
        let mut graph = sample();
        let before = graph.clone();

        assert_matches!(
            graph.create_block(Block::new("a", "looks_show").with_next("ghost"), false),
            Err(EditError::DanglingReference { .. })
        );
        assert_matches!(
            graph.create_block(Block::new("b", "looks_show").with_parent("nowhere"), false),
            Err(EditError::UnknownParent(_))
        );
        // Existing blocks are reachable only through moves.
        assert_matches!(
            graph.create_block(Block::new("c", "looks_show").with_parent("hat"), false),
            Err(EditError::UnknownParent(_))
        );
        assert_matches!(
            graph.create_blocks(
                vec![
                    Block::new("d", "looks_show").with_next("e"),
                    Block::new("e", "looks_hide").with_parent("other"),
                    Block::new("other", "looks_hide"),
                ],
                false,
            ),
            Err(EditError::ParentMismatch { .. })
        );

        assert_eq!(graph.blocks, before.blocks);
        assert_eq!(graph.scripts, before.scripts);
        graph.validate().unwrap();
    }

    #[test]
    fn change_field_requires_existing_field() {
        let mut graph = sample();
        graph.change_field(&id("n"), "NUM", "7").unwrap();
        assert_eq!(graph.block(&id("n")).unwrap().field("NUM"), Some("7"));
        assert_matches!(
            graph.change_field(&id("n"), "TEXT", "x"),
            Err(EditError::UnknownField { .. })
        );
    }

    #[test]
    fn ephemeral_blocks_never_join_scripts() {
        let mut graph = ProgramGraph::new();
        graph
            .create_block(Block::new("f", "looks_say"), true)
            .unwrap();
        assert_eq!(graph.scripts().count(), 0);
        assert!(graph.is_ephemeral(&id("f")));
        assert_eq!(graph.top_level_script(&id("f")), Some(&id("f")));
    }

    #[test]
    fn stack_click_is_reported_not_applied() {
        let mut graph = sample();
        let outcome = graph
            .apply_event(&BlockEvent::StackClick { block_id: id("hat") }, false)
            .unwrap();
        assert_eq!(outcome, EditOutcome::StackClick(id("hat")));
    }
}
