//! The runtime: targets, threads, hat triggering, and glow feedback.
//!
//! All state lives in one [`Runtime`] value. Structural edits, triggers,
//! and scheduler passes are serialized through `&mut self`, so a pass never
//! observes a half-applied edit.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use blocks_graph::{BlockEvent, BlockId, EditOutcome, ProgramGraph};
use indexmap::{IndexMap, IndexSet};

use crate::clock::{InstantWorkTimer, PendingId, SimClock, Timer, WorkTimer};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::notification::Notification;
use crate::packages::{control, event};
use crate::primitive::{CloneSource, PrimitiveTable, RuntimeRequest};
use crate::sequencer::Sequencer;
use crate::target::{ProgramId, Target, TargetId};
use crate::thread::{ScriptSource, Thread, ThreadId, ThreadStatus};

/// Rendering collaborator, invoked once per animation frame.
pub trait Renderer: fmt::Debug {
    /// Draw the current frame.
    fn draw(&mut self);
}

/// Owner of every program, target, and thread.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) table: PrimitiveTable,
    pub(crate) sequencer: Sequencer,
    /// Sorted by id, which is creation order.
    pub(crate) threads: Vec<Thread>,
    pub(crate) targets: BTreeMap<TargetId, Target>,
    pub(crate) programs: BTreeMap<ProgramId, ProgramGraph>,
    /// Session-only preview scripts (the editor's palette).
    pub(crate) flyout: ProgramGraph,
    pub(crate) edge_values: BTreeMap<BlockId, bool>,
    pub(crate) timer: Box<dyn Timer>,
    pub(crate) timer_origin: Duration,
    pub(crate) notifications: Vec<Notification>,
    glowing: IndexSet<BlockId>,
    editing_target: Option<TargetId>,
    clone_count: usize,
    next_thread: u64,
    next_target: u64,
    next_program: u64,
    paused: bool,
    renderer: Option<Box<dyn Renderer>>,
}

impl Runtime {
    /// Runtime with the default primitive packages, a simulated clock, and a
    /// wall-clock work timer.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let clock = SimClock::new(config.frame_interval());
        Self::with_parts(
            config,
            PrimitiveTable::with_default_packages(),
            Box::new(clock),
            Box::new(InstantWorkTimer::default()),
        )
    }

    /// Runtime assembled from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: RuntimeConfig,
        table: PrimitiveTable,
        timer: Box<dyn Timer>,
        work_timer: Box<dyn WorkTimer>,
    ) -> Self {
        let timer_origin = timer.now();
        Self {
            config,
            table,
            sequencer: Sequencer::new(work_timer),
            threads: Vec::new(),
            targets: BTreeMap::new(),
            programs: BTreeMap::new(),
            flyout: ProgramGraph::new(),
            edge_values: BTreeMap::new(),
            timer,
            timer_origin,
            notifications: Vec::new(),
            glowing: IndexSet::new(),
            editing_target: None,
            clone_count: 0,
            next_thread: 0,
            next_target: 0,
            next_program: 0,
            paused: false,
            renderer: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Primitive dispatch table.
    #[must_use]
    pub fn table(&self) -> &PrimitiveTable {
        &self.table
    }

    /// Scheduler state.
    #[must_use]
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    // -- targets -----------------------------------------------------------

    /// Register a sprite or the stage with its program.
    pub fn add_target(
        &mut self,
        name: impl Into<String>,
        program: ProgramGraph,
        is_stage: bool,
    ) -> TargetId {
        let program_id = ProgramId(self.next_program);
        self.next_program += 1;
        self.programs.insert(program_id, program);

        let id = self.allocate_target();
        let name = name.into();
        tracing::debug!(target_id = %id, %name, is_stage, "target added");
        self.targets
            .insert(id, Target::new(id, name, program_id, is_stage));
        self.notifications.push(Notification::TargetsUpdated);
        id
    }

    fn allocate_target(&mut self) -> TargetId {
        let id = TargetId(self.next_target);
        self.next_target += 1;
        id
    }

    /// Look up a live target.
    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// Mutable access to a live target.
    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut Target> {
        self.targets.get_mut(&id)
    }

    /// The original (non-clone) target with this name.
    #[must_use]
    pub fn target_by_name(&self, name: &str) -> Option<&Target> {
        self.targets
            .values()
            .find(|t| t.is_original() && t.name() == name)
    }

    /// Live targets in creation order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> + '_ {
        self.targets.values()
    }

    /// The stage, if one was added.
    #[must_use]
    pub fn stage(&self) -> Option<&Target> {
        self.targets.values().find(|t| t.is_stage())
    }

    /// Program run by a target. Clones share their original's.
    #[must_use]
    pub fn program(&self, target: TargetId) -> Option<&ProgramGraph> {
        let target = self.targets.get(&target)?;
        self.programs.get(&target.program())
    }

    /// Preview scripts.
    #[must_use]
    pub fn flyout(&self) -> &ProgramGraph {
        &self.flyout
    }

    /// Number of live clones.
    #[must_use]
    pub fn clone_count(&self) -> usize {
        self.clone_count
    }

    // -- structural edits --------------------------------------------------

    /// Apply an editor event to a target's program.
    ///
    /// Malformed edits are logged and dropped; the program is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownTarget`] if the target is not live.
    pub fn apply_edit(&mut self, target: TargetId, event: &BlockEvent) -> Result<(), RuntimeError> {
        let program = self
            .targets
            .get(&target)
            .map(Target::program)
            .ok_or(RuntimeError::UnknownTarget(target))?;
        let graph = self
            .programs
            .get_mut(&program)
            .ok_or(RuntimeError::UnknownTarget(target))?;

        match graph.apply_event(event, false) {
            Err(error) => {
                tracing::debug!(target_id = %target, %error, "edit dropped");
                Ok(())
            }
            Ok(EditOutcome::StackClick(block)) => {
                let Some(top) = graph.top_level_script(&block).cloned() else {
                    return Err(RuntimeError::UnknownScript(block));
                };
                self.toggle_script_on(target, &top, ScriptSource::Target)?;
                Ok(())
            }
            Ok(EditOutcome::Edited { removed_scripts }) => {
                let gone: Vec<BlockId> = removed_scripts
                    .iter()
                    .filter(|script| !graph.contains(script))
                    .cloned()
                    .collect();
                // Scripts moved under another block keep running; the next
                // glow update moves their glow to the enclosing script.
                for script in &gone {
                    self.stop_script(program, script);
                    self.quiet_glow(script);
                }
                if self.editing_target == Some(target) {
                    self.notifications.push(Notification::WorkspaceUpdated);
                }
                Ok(())
            }
        }
    }

    /// Apply an editor event to the preview scripts. Blocks created here are
    /// session-only and never serialized.
    ///
    /// # Errors
    ///
    /// A stack click needs an editing target to run against:
    /// [`RuntimeError::NoEditingTarget`].
    pub fn apply_flyout_edit(&mut self, event: &BlockEvent) -> Result<(), RuntimeError> {
        match self.flyout.apply_event(event, true) {
            Err(error) => {
                tracing::debug!(%error, "flyout edit dropped");
                Ok(())
            }
            Ok(EditOutcome::StackClick(block)) => {
                let Some(top) = self.flyout.top_level_script(&block).cloned() else {
                    return Err(RuntimeError::UnknownScript(block));
                };
                self.toggle_script(&top, ScriptSource::Flyout)?;
                Ok(())
            }
            Ok(EditOutcome::Edited { removed_scripts }) => {
                let gone: Vec<BlockId> = removed_scripts
                    .into_iter()
                    .filter(|script| !self.flyout.contains(script))
                    .collect();
                for script in &gone {
                    self.quiet_glow(script);
                }
                Ok(())
            }
        }
    }

    /// Stop threads running a script that was deleted from `program`.
    fn stop_script(&mut self, program: ProgramId, script: &BlockId) {
        let targets = &self.targets;
        let timer = &mut self.timer;
        for thread in &mut self.threads {
            let runs_program = targets
                .get(&thread.target())
                .is_some_and(|t| t.program() == program);
            if runs_program && thread.source() == ScriptSource::Target && thread.top_block() == script {
                tracing::debug!(thread = %thread.id(), %script, "script deleted; stopping thread");
                if let Some(pending) = thread.stop() {
                    timer.cancel(pending);
                }
            }
        }
    }

    // -- threads -----------------------------------------------------------

    /// Live threads in creation order.
    #[must_use]
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Look up a thread.
    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads
            .binary_search_by_key(&id, Thread::id)
            .ok()
            .map(|index| &self.threads[index])
    }

    /// Whether the thread is live and not finished.
    #[must_use]
    pub fn is_active_thread(&self, id: ThreadId) -> bool {
        self.thread(id)
            .is_some_and(|t| t.status() != ThreadStatus::Done)
    }

    fn push_thread(&mut self, top: BlockId, target: TargetId, source: ScriptSource) -> ThreadId {
        let id = ThreadId(self.next_thread);
        self.next_thread += 1;
        tracing::debug!(thread = %id, script = %top, target_id = %target, "thread started");
        self.threads.push(Thread::new(id, top, target, source));
        id
    }

    /// Start every hat script with `opcode` whose fields equal `fields`,
    /// across all targets or only `scope`.
    ///
    /// Every thread running the script on the matched target counts,
    /// including one started by clicking the script. Restarting hats remove
    /// those threads and append a fresh one. Other hats start nothing while
    /// such a thread is unfinished. Returns the threads started.
    pub fn start_hats(
        &mut self,
        opcode: &str,
        fields: Option<&IndexMap<String, String>>,
        scope: Option<TargetId>,
    ) -> Vec<ThreadId> {
        let Some(meta) = self.table.hat(opcode).copied() else {
            tracing::trace!(opcode, "not a hat");
            return Vec::new();
        };

        let mut matches = Vec::new();
        for target in self.targets.values() {
            if scope.is_some_and(|s| s != target.id()) {
                continue;
            }
            let Some(graph) = self.programs.get(&target.program()) else {
                continue;
            };
            for script in graph.scripts() {
                let Some(block) = graph.block(script) else {
                    continue;
                };
                if block.opcode != opcode {
                    continue;
                }
                let fields_match = fields.map_or(true, |wanted| {
                    wanted
                        .iter()
                        .all(|(name, value)| block.field(name) == Some(value.as_str()))
                });
                if fields_match {
                    matches.push((target.id(), script.clone()));
                }
            }
        }

        let mut started = Vec::new();
        for (target, script) in matches {
            let runs_script = |t: &Thread| {
                t.target() == target && t.top_block() == &script && t.source() == ScriptSource::Target
            };
            if meta.restart_existing_threads {
                self.remove_threads(runs_script);
            } else if self
                .threads
                .iter()
                .any(|t| runs_script(t) && t.status() != ThreadStatus::Done)
            {
                continue;
            }
            started.push(self.push_thread(script, target, ScriptSource::Target));
        }
        started
    }

    /// Stop and drop every thread `doomed` selects, cancelling their waits.
    fn remove_threads(&mut self, mut doomed: impl FnMut(&Thread) -> bool) {
        let timer = &mut self.timer;
        self.threads.retain_mut(|thread| {
            if !doomed(thread) {
                return true;
            }
            tracing::debug!(thread = %thread.id(), script = %thread.top_block(), "thread removed");
            if let Some(pending) = thread.stop() {
                timer.cancel(pending);
            }
            false
        });
    }

    /// Toggle a script of the editing target: stop its thread if one is
    /// running, otherwise start one. Returns the started thread.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoEditingTarget`] without an editing target, and
    /// [`RuntimeError::UnknownScript`] if `top` does not start a script.
    pub fn toggle_script(
        &mut self,
        top: &BlockId,
        source: ScriptSource,
    ) -> Result<Option<ThreadId>, RuntimeError> {
        let target = self.editing_target.ok_or(RuntimeError::NoEditingTarget)?;
        self.toggle_script_on(target, top, source)
    }

    fn toggle_script_on(
        &mut self,
        target: TargetId,
        top: &BlockId,
        source: ScriptSource,
    ) -> Result<Option<ThreadId>, RuntimeError> {
        let graph = match source {
            ScriptSource::Flyout => &self.flyout,
            ScriptSource::Target => self
                .program(target)
                .ok_or(RuntimeError::UnknownTarget(target))?,
        };
        if graph.top_level_script(top) != Some(top) {
            return Err(RuntimeError::UnknownScript(top.clone()));
        }
        let edge = graph
            .opcode(top)
            .is_some_and(|opcode| self.table.is_edge_activated(opcode));

        let running = self.threads.iter_mut().find(|t| {
            t.target() == target
                && t.source() == source
                && t.top_block() == top
                && t.status() != ThreadStatus::Done
                && !(edge && !t.is_stack_click())
        });
        if let Some(thread) = running {
            tracing::debug!(thread = %thread.id(), script = %top, "toggled off");
            if let Some(pending) = thread.stop() {
                self.timer.cancel(pending);
            }
            return Ok(None);
        }

        let id = self.push_thread(top.clone(), target, source);
        if let Some(thread) = self.threads.last_mut() {
            thread.stack_click = true;
        }
        Ok(Some(id))
    }

    // -- triggers ----------------------------------------------------------

    /// Stop everything, reset the project timer and edge values, and start
    /// the green-flag scripts.
    pub fn green_flag(&mut self) -> Vec<ThreadId> {
        tracing::info!("green flag");
        self.stop_all();
        self.timer_origin = self.timer.now();
        self.edge_values.clear();
        self.start_hats(event::WHEN_FLAG_CLICKED, None, None)
    }

    /// Start the scripts listening for `message`.
    pub fn broadcast(&mut self, message: &str) -> Vec<ThreadId> {
        let fields = IndexMap::from([(event::BROADCAST_OPTION.to_string(), message.to_string())]);
        self.start_hats(event::WHEN_BROADCAST_RECEIVED, Some(&fields), None)
    }

    /// Start the scripts listening for `key` and for any key.
    pub fn key_pressed(&mut self, key: &str) -> Vec<ThreadId> {
        let mut started = Vec::new();
        for option in [key, "any"] {
            let fields = IndexMap::from([(event::KEY_OPTION.to_string(), option.to_string())]);
            started.extend(self.start_hats(event::WHEN_KEY_PRESSED, Some(&fields), None));
        }
        started
    }

    /// Start the target's sprite-click scripts.
    pub fn target_clicked(&mut self, target: TargetId) -> Vec<ThreadId> {
        self.start_hats(event::WHEN_THIS_SPRITE_CLICKED, None, Some(target))
    }

    // -- stopping ----------------------------------------------------------

    /// Dispose every clone, then stop and remove every thread, newest first.
    pub fn stop_all(&mut self) {
        let clones: Vec<TargetId> = self
            .targets
            .values()
            .filter(|t| !t.is_original())
            .map(Target::id)
            .collect();
        for clone in clones {
            self.dispose(clone);
        }

        tracing::debug!(threads = self.threads.len(), "stopping all threads");
        while let Some(mut thread) = self.threads.pop() {
            if let Some(pending) = thread.stop() {
                self.timer.cancel(pending);
            }
        }
    }

    /// Stop the target's threads, optionally sparing one.
    pub fn stop_for_target(&mut self, target: TargetId, except: Option<ThreadId>) {
        for thread in &mut self.threads {
            if thread.target() == target && Some(thread.id()) != except {
                if let Some(pending) = thread.stop() {
                    self.timer.cancel(pending);
                }
            }
        }
    }

    // -- clones ------------------------------------------------------------

    /// Clone a sprite and start the clone's start-as-clone scripts.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::CloneLimit`] once the configured bound is reached,
    /// [`RuntimeError::NotCloneable`] for the stage, and
    /// [`RuntimeError::UnknownTarget`] for a target that is not live.
    pub fn create_clone(&mut self, source: TargetId) -> Result<TargetId, RuntimeError> {
        let original = self
            .targets
            .get(&source)
            .ok_or(RuntimeError::UnknownTarget(source))?;
        if original.is_stage() {
            return Err(RuntimeError::NotCloneable(source));
        }
        if self.clone_count >= self.config.max_clones {
            return Err(RuntimeError::CloneLimit {
                max: self.config.max_clones,
            });
        }

        let id = TargetId(self.next_target);
        let clone = original.make_clone(id);
        self.next_target += 1;
        self.targets.insert(id, clone);
        self.clone_count += 1;
        tracing::debug!(clone = %id, source = %source, live = self.clone_count, "clone created");
        self.notifications.push(Notification::TargetsUpdated);
        self.start_hats(control::START_AS_CLONE, None, Some(id));
        Ok(id)
    }

    /// Remove a target and its threads. Disposing a clone frees a clone
    /// slot.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownTarget`] if the target is not live.
    pub fn dispose_target(&mut self, target: TargetId) -> Result<(), RuntimeError> {
        if self.dispose(target) {
            Ok(())
        } else {
            Err(RuntimeError::UnknownTarget(target))
        }
    }

    fn dispose(&mut self, id: TargetId) -> bool {
        let Some(target) = self.targets.remove(&id) else {
            return false;
        };
        if !target.is_original() {
            self.clone_count = self.clone_count.saturating_sub(1);
        }
        self.remove_threads(|thread| thread.target() == id);
        // Clones share the original's program; drop it with the last user.
        if !self.targets.values().any(|t| t.program() == target.program()) {
            self.programs.remove(&target.program());
        }
        if self.editing_target == Some(id) {
            self.editing_target = None;
        }
        tracing::debug!(target_id = %id, "target disposed");
        self.notifications.push(Notification::TargetsUpdated);
        true
    }

    pub(crate) fn apply_request(&mut self, request: RuntimeRequest) {
        match request {
            RuntimeRequest::StartHats {
                opcode,
                fields,
                target,
            } => {
                let fields = (!fields.is_empty()).then_some(&fields);
                self.start_hats(&opcode, fields, target);
            }
            RuntimeRequest::StopAll => self.stop_all(),
            RuntimeRequest::StopOtherScripts { target, except } => {
                self.stop_for_target(target, Some(except));
            }
            RuntimeRequest::CreateClone { source, requester } => {
                let source = match source {
                    CloneSource::Myself => Some(requester),
                    CloneSource::Named(name) => self.target_by_name(&name).map(Target::id),
                };
                let Some(source) = source else {
                    tracing::debug!("clone source not found");
                    return;
                };
                if let Err(error) = self.create_clone(source) {
                    tracing::debug!(%error, "clone rejected");
                }
            }
            RuntimeRequest::DeleteClone(target) => {
                self.dispose(target);
            }
        }
    }

    // -- glow --------------------------------------------------------------

    /// Target whose scripts are shown in the editor.
    #[must_use]
    pub fn editing_target(&self) -> Option<TargetId> {
        self.editing_target
    }

    /// Switch the edited target. Every glowing script is turned off first;
    /// the new target's running scripts glow immediately.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownTarget`] if the target is not live.
    pub fn set_editing_target(&mut self, target: Option<TargetId>) -> Result<(), RuntimeError> {
        if let Some(id) = target {
            if !self.targets.contains_key(&id) {
                return Err(RuntimeError::UnknownTarget(id));
            }
        }
        for script in self.glowing.drain(..) {
            self.notifications.push(Notification::GlowOff { script });
        }
        self.editing_target = target;
        self.notifications.push(Notification::WorkspaceUpdated);
        self.update_glows();
        Ok(())
    }

    /// Forget that a script is glowing without notifying. Used when the
    /// script itself goes away.
    pub fn quiet_glow(&mut self, script: &BlockId) {
        self.glowing.shift_remove(script);
    }

    /// Scripts currently glowing.
    pub fn glowing_scripts(&self) -> impl Iterator<Item = &BlockId> + '_ {
        self.glowing.iter()
    }

    /// Recompute which scripts of the editing target should glow and emit
    /// the difference from the previous set.
    pub(crate) fn update_glows(&mut self) {
        let mut now = IndexSet::new();
        if let Some(editing) = self.editing_target {
            let graph = self.program(editing);
            for thread in &self.threads {
                if thread.target() != editing || !thread.request_script_glow {
                    continue;
                }
                let block = thread.peek_stack().unwrap_or(thread.top_block());
                let script = graph
                    .and_then(|g| g.top_level_script(block))
                    .or_else(|| self.flyout.top_level_script(block));
                if let Some(script) = script {
                    now.insert(script.clone());
                }
            }
        }

        for script in &self.glowing {
            if !now.contains(script) {
                self.notifications.push(Notification::GlowOff {
                    script: script.clone(),
                });
            }
        }
        for script in &now {
            if !self.glowing.contains(script) {
                self.notifications.push(Notification::GlowOn {
                    script: script.clone(),
                });
            }
        }
        self.glowing = now;
    }

    // -- edge-activated hats -------------------------------------------------

    /// Last recorded value of an edge-activated hat's predicate.
    #[must_use]
    pub fn edge_activated_value(&self, block: &BlockId) -> Option<bool> {
        self.edge_values.get(block).copied()
    }

    /// Record a predicate value, returning the previous one (false if none).
    pub fn update_edge_activated_value(&mut self, block: &BlockId, value: bool) -> bool {
        self.edge_values
            .insert(block.clone(), value)
            .unwrap_or(false)
    }

    /// Forget every recorded predicate value.
    pub fn clear_edge_activated_values(&mut self) {
        self.edge_values.clear();
    }

    // -- clock -------------------------------------------------------------

    /// Move the clock forward and wake threads whose waits are due.
    pub fn advance_clock(&mut self, elapsed: Duration) {
        for pending in self.timer.advance(elapsed) {
            self.resolve_pending(pending);
        }
    }

    fn resolve_pending(&mut self, pending: PendingId) {
        match self.threads.iter_mut().find(|t| t.pending() == Some(pending)) {
            Some(thread) => {
                tracing::trace!(thread = %thread.id(), %pending, "resumed");
                thread.resolve();
            }
            None => tracing::trace!(%pending, "resolved wait has no thread"),
        }
    }

    /// Seconds since the project timer was last reset.
    #[must_use]
    pub fn project_timer(&self) -> f64 {
        self.timer
            .now()
            .saturating_sub(self.timer_origin)
            .as_secs_f64()
    }

    // -- ticking -----------------------------------------------------------

    /// One tick: poll edge-activated hats, run a scheduler pass, update
    /// glows, and retire finished threads. Returns the retired threads.
    pub fn step(&mut self) -> Vec<ThreadId> {
        if self.paused {
            return Vec::new();
        }
        for opcode in self.table.edge_activated_hats() {
            self.start_hats(&opcode, None, None);
        }
        let done = self.step_threads();
        self.update_glows();
        self.threads.retain(|t| t.status() != ThreadStatus::Done);
        done
    }

    /// Suspend ticking; [`Runtime::step`] does nothing until resumed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume ticking.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether ticking is suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Toggle turbo mode.
    pub fn set_turbo_mode(&mut self, on: bool) {
        self.config.turbo_mode = on;
    }

    /// Toggle 30 Hz compatibility mode.
    pub fn set_compatibility_mode(&mut self, on: bool) {
        self.config.compatibility_mode = on;
    }

    /// Attach the rendering collaborator.
    pub fn attach_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    /// Ask the renderer to draw a frame.
    pub fn animation_frame(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.draw();
        }
    }

    /// Take every notification emitted since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use blocks_graph::Block;

    fn hat_program(opcode: &str) -> ProgramGraph {
        let mut graph = ProgramGraph::new();
        graph
            .create_blocks(
                vec![
                    Block::new("hat", opcode).with_next("body"),
                    Block::new("body", "control_forever").with_parent("hat"),
                ],
                false,
            )
            .unwrap();
        graph
    }

    #[test]
    fn non_restarting_hat_does_not_duplicate() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime.add_target("cat", hat_program(event::WHEN_KEY_PRESSED), false);

        assert_eq!(runtime.start_hats(event::WHEN_KEY_PRESSED, None, None).len(), 1);
        assert!(runtime.start_hats(event::WHEN_KEY_PRESSED, None, None).is_empty());
        assert_eq!(runtime.threads().len(), 1);
    }

    #[test]
    fn restarting_hat_replaces_the_thread() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime.add_target("cat", hat_program(event::WHEN_FLAG_CLICKED), false);

        let first = runtime.start_hats(event::WHEN_FLAG_CLICKED, None, None);
        runtime.step();
        let second = runtime.start_hats(event::WHEN_FLAG_CLICKED, None, None);
        assert_ne!(first, second);
        assert!(!runtime.is_active_thread(first[0]));
        assert_eq!(runtime.threads().len(), 1);
        assert_eq!(runtime.threads()[0].id(), second[0]);
        assert_eq!(runtime.threads()[0].stack_depth(), 1);
    }

    #[test]
    fn stopped_thread_does_not_unblock_a_second_start() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let cat = runtime.add_target("cat", hat_program(event::WHEN_KEY_PRESSED), false);
        runtime.start_hats(event::WHEN_KEY_PRESSED, None, None);
        runtime.stop_for_target(cat, None);

        assert_eq!(runtime.start_hats(event::WHEN_KEY_PRESSED, None, None).len(), 1);
        assert!(runtime.start_hats(event::WHEN_KEY_PRESSED, None, None).is_empty());
        let live = runtime
            .threads()
            .iter()
            .filter(|t| t.status() != ThreadStatus::Done)
            .count();
        assert_eq!(live, 1);
    }

    #[test]
    fn clicked_script_counts_as_running_for_hats() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let cat = runtime.add_target("cat", hat_program(event::WHEN_KEY_PRESSED), false);
        runtime.set_editing_target(Some(cat)).unwrap();
        runtime
            .toggle_script(&BlockId::new("hat"), ScriptSource::Target)
            .unwrap();

        assert!(runtime.key_pressed("space").is_empty());
        assert_eq!(runtime.threads().len(), 1);
    }

    #[test]
    fn field_match_is_exact() {
        let mut graph = ProgramGraph::new();
        graph
            .create_block(
                Block::new("hat", event::WHEN_BROADCAST_RECEIVED)
                    .with_field(event::BROADCAST_OPTION, "go"),
                false,
            )
            .unwrap();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime.add_target("cat", graph, false);

        assert!(runtime.broadcast("GO").is_empty());
        assert_eq!(runtime.broadcast("go").len(), 1);
    }

    #[test]
    fn stage_cannot_be_cloned() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let stage = runtime.add_target("Stage", ProgramGraph::new(), true);
        assert_matches!(runtime.create_clone(stage), Err(RuntimeError::NotCloneable(id)) if id == stage);
    }

    #[test]
    fn disposing_twice_decrements_once() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let cat = runtime.add_target("cat", ProgramGraph::new(), false);
        let clone = runtime.create_clone(cat).unwrap();
        assert_eq!(runtime.clone_count(), 1);

        runtime.dispose_target(clone).unwrap();
        assert_matches!(runtime.dispose_target(clone), Err(RuntimeError::UnknownTarget(_)));
        assert_eq!(runtime.clone_count(), 0);
        assert!(runtime.program(cat).is_some());
    }

    #[test]
    fn paused_runtime_does_not_step() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime.add_target("cat", hat_program(event::WHEN_FLAG_CLICKED), false);
        runtime.green_flag();
        runtime.pause();
        runtime.step();
        assert_eq!(runtime.threads()[0].top_block(), &BlockId::new("hat"));
        assert_eq!(runtime.threads()[0].stack_depth(), 1);
        assert_eq!(runtime.sequencer().visits(), 0);
    }
}
