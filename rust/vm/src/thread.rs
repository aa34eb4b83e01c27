//! Execution contexts ("threads").
//!
//! A thread is one running instance of a script on one target: a stack of
//! block ids (the active nesting of branches) with a parallel stack of
//! per-frame scratch state. Threads are plain state machines; the
//! sequencer decides when they run.

use std::collections::BTreeMap;
use std::fmt;

use blocks_graph::BlockId;
use serde::{Deserialize, Serialize};

use crate::clock::PendingId;
use crate::target::TargetId;
use crate::value::Value;

/// Thread identity. Ids increase in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub(crate) u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// Thread status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    /// Runnable this pass.
    Running,
    /// Suspended until the next tick, or until its pending result resolves.
    Yielded,
    /// Finished or stopped; retired at the end of the tick.
    Done,
}

/// Which graph the thread's blocks live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptSource {
    /// The owning target's program.
    Target,
    /// The editor's flyout (ephemeral) blocks.
    Flyout,
}

/// Scratch state private to the block occupying one stack depth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackFrame {
    values: BTreeMap<String, Value>,
    /// Yields are ignored while this is set.
    pub warp: bool,
}

impl StackFrame {
    fn inheriting(warp: bool) -> Self {
        Self {
            values: BTreeMap::new(),
            warp,
        }
    }

    /// Read a slot.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Write a slot.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Clear a slot, returning what it held.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Whether a slot is set and truthy.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(Value::to_bool)
    }

    fn reset(&mut self) {
        self.values.clear();
    }
}

/// One running instance of a script.
#[derive(Debug, Clone)]
pub struct Thread {
    id: ThreadId,
    top_block: BlockId,
    target: TargetId,
    source: ScriptSource,
    stack: Vec<BlockId>,
    frames: Vec<StackFrame>,
    status: ThreadStatus,
    pending: Option<PendingId>,
    pub(crate) resume_past_current: bool,
    pub(crate) request_script_glow: bool,
    pub(crate) stack_click: bool,
}

impl Thread {
    /// A thread positioned on `top_block`.
    #[must_use]
    pub fn new(id: ThreadId, top_block: BlockId, target: TargetId, source: ScriptSource) -> Self {
        let mut thread = Self {
            id,
            top_block: top_block.clone(),
            target,
            source,
            stack: Vec::new(),
            frames: Vec::new(),
            status: ThreadStatus::Running,
            pending: None,
            resume_past_current: false,
            request_script_glow: false,
            stack_click: false,
        };
        thread.push_stack(top_block);
        thread
    }

    /// Thread id.
    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Block that started this thread.
    #[must_use]
    pub fn top_block(&self) -> &BlockId {
        &self.top_block
    }

    /// Owning target.
    #[must_use]
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Graph the thread's blocks live in.
    #[must_use]
    pub fn source(&self) -> ScriptSource {
        self.source
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: ThreadStatus) {
        self.status = status;
    }

    /// Outstanding timed wake-up, if suspended on one.
    #[must_use]
    pub fn pending(&self) -> Option<PendingId> {
        self.pending
    }

    pub(crate) fn suspend_on(&mut self, pending: PendingId) {
        self.pending = Some(pending);
        self.status = ThreadStatus::Yielded;
    }

    /// Wake from a resolved pending result. Execution resumes after the
    /// block that suspended.
    pub(crate) fn resolve(&mut self) {
        self.pending = None;
        self.resume_past_current = true;
        self.status = ThreadStatus::Running;
    }

    /// Whether the thread was started by clicking its script.
    #[must_use]
    pub fn is_stack_click(&self) -> bool {
        self.stack_click
    }

    /// Enter a block one level deeper. The new frame inherits warp mode.
    pub fn push_stack(&mut self, block: BlockId) {
        self.stack.push(block);
        if self.frames.len() < self.stack.len() {
            let warp = self.frames.last().is_some_and(|f| f.warp);
            self.frames.push(StackFrame::inheriting(warp));
        }
    }

    /// Leave the innermost block, discarding its frame.
    pub fn pop_stack(&mut self) -> Option<BlockId> {
        self.frames.truncate(self.stack.len().saturating_sub(1));
        self.stack.pop()
    }

    /// Innermost block.
    #[must_use]
    pub fn peek_stack(&self) -> Option<&BlockId> {
        self.stack.last()
    }

    /// Frame of the innermost block.
    #[must_use]
    pub fn peek_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// Mutable frame of the innermost block.
    pub fn peek_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Nesting depth.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Replace the innermost block with its successor. The frame is reused
    /// with fresh scratch state.
    pub(crate) fn go_to_next(&mut self, next: BlockId) {
        if let Some(top) = self.stack.last_mut() {
            *top = next;
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.reset();
        }
    }

    /// Whether yields are currently ignored.
    #[must_use]
    pub fn is_warp(&self) -> bool {
        self.frames.last().is_some_and(|f| f.warp)
    }

    pub(crate) fn set_warp(&mut self, warp: bool) {
        if let Some(frame) = self.frames.last_mut() {
            frame.warp = warp;
        }
    }

    /// Stop immediately: discard the stack and frames and mark done.
    /// Returns the outstanding wake-up, which the caller must cancel.
    pub(crate) fn stop(&mut self) -> Option<PendingId> {
        self.stack.clear();
        self.frames.clear();
        self.status = ThreadStatus::Done;
        self.request_script_glow = false;
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread() -> Thread {
        Thread::new(
            ThreadId(1),
            BlockId::new("top"),
            TargetId(0),
            ScriptSource::Target,
        )
    }

    #[test]
    fn frames_track_stack_depth() {
        let mut t = thread();
        assert_eq!(t.stack_depth(), 1);
        t.push_stack(BlockId::new("a"));
        t.push_stack(BlockId::new("b"));
        assert_eq!(t.frames.len(), 3);

        assert_eq!(t.pop_stack(), Some(BlockId::new("b")));
        assert_eq!(t.frames.len(), 2);
        assert_eq!(t.peek_stack(), Some(&BlockId::new("a")));
    }

    #[test]
    fn pushed_frame_inherits_warp() {
        let mut t = thread();
        t.set_warp(true);
        t.push_stack(BlockId::new("body"));
        assert!(t.is_warp());
        t.pop_stack();
        t.set_warp(false);
        t.push_stack(BlockId::new("other"));
        assert!(!t.is_warp());
    }

    #[test]
    fn go_to_next_clears_scratch_but_keeps_warp() {
        let mut t = thread();
        t.set_warp(true);
        t.peek_frame_mut().unwrap().set("loop_counter", 3.0);
        t.go_to_next(BlockId::new("after"));
        assert_eq!(t.peek_stack(), Some(&BlockId::new("after")));
        assert!(t.peek_frame().unwrap().get("loop_counter").is_none());
        assert!(t.is_warp());
    }

    #[test]
    fn stop_hands_back_the_pending_wakeup() {
        let mut t = thread();
        t.push_stack(BlockId::new("deep"));
        t.suspend_on(PendingId(4));
        assert_eq!(t.stop(), Some(PendingId(4)));
        assert_eq!(t.status(), ThreadStatus::Done);
        assert_eq!(t.stack_depth(), 0);
        assert!(t.pending().is_none());
    }
}
