//! The cooperative scheduler.
//!
//! Each pass visits runnable threads in id (creation) order under a
//! wall-clock budget. A visit runs one thread until it yields, suspends,
//! finishes, or hits the runaway ceiling. When the budget runs out the
//! next thread is parked as the cursor and the following pass starts from
//! it, so threads late in the list are not starved.
//!
//! Per-thread state machine, one block at a time:
//!
//! 1. Empty stack: the thread is done.
//! 2. Resolve the opcode. Unknown opcodes (and hats without a predicate)
//!    are skipped.
//! 3. Evaluate fields and non-branch inputs, then invoke the primitive.
//! 4. Follow the primitive's control request: enter a branch, enter a
//!    procedure, yield, unwind, or retire. With no request, advance to
//!    `next`; at the end of a branch, pop back to the block that entered it
//!    and run that block again in the same visit.

use std::collections::BTreeMap;
use std::time::Duration;

use blocks_graph::{BlockId, ProgramGraph};

use crate::clock::{InstantWorkTimer, Timer, WorkTimer};
use crate::config::RuntimeConfig;
use crate::error::PrimitiveError;
use crate::notification::Notification;
use crate::packages::procedures;
use crate::primitive::{BlockArgs, BlockUtility, Control, Outcome, PrimitiveTable, RuntimeRequest};
use crate::runtime::Runtime;
use crate::target::Target;
use crate::thread::{ScriptSource, Thread, ThreadId, ThreadStatus};
use crate::value::Value;

/// Deepest reporter nesting the evaluator follows.
pub const REPORTER_DEPTH_LIMIT: usize = 256;

/// Scheduling state that persists between passes.
#[derive(Debug)]
pub struct Sequencer {
    work_timer: Box<dyn WorkTimer>,
    cursor: Option<ThreadId>,
    visits: usize,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Box::new(InstantWorkTimer::default()))
    }
}

impl Sequencer {
    /// Sequencer metering passes with `work_timer`.
    #[must_use]
    pub fn new(work_timer: Box<dyn WorkTimer>) -> Self {
        Self {
            work_timer,
            cursor: None,
            visits: 0,
        }
    }

    /// Thread the next pass starts from, if the last pass ran out of time.
    #[must_use]
    pub fn cursor(&self) -> Option<ThreadId> {
        self.cursor
    }

    /// Thread visits made by the most recent pass.
    #[must_use]
    pub fn visits(&self) -> usize {
        self.visits
    }

    fn begin_pass(&mut self) {
        self.work_timer.start();
        self.visits = 0;
    }

    /// Whether another visit fits in the budget. The first visit of a pass
    /// always does.
    fn may_visit(&mut self, budget: Duration) -> bool {
        let elapsed = self.work_timer.elapsed();
        self.visits == 0 || elapsed < budget
    }
}

/// Everything a thread step may touch besides the thread and its target.
pub(crate) struct StepContext<'cx> {
    pub(crate) graph: &'cx ProgramGraph,
    pub(crate) table: &'cx PrimitiveTable,
    pub(crate) config: &'cx RuntimeConfig,
    pub(crate) edge_values: &'cx mut BTreeMap<BlockId, bool>,
    pub(crate) timer: &'cx mut dyn Timer,
    pub(crate) timer_origin: &'cx mut Duration,
    pub(crate) notifications: &'cx mut Vec<Notification>,
    pub(crate) requests: Vec<RuntimeRequest>,
}

impl Runtime {
    /// Run one scheduler pass. Returns the threads that are now done; the
    /// caller retires them.
    pub(crate) fn step_threads(&mut self) -> Vec<ThreadId> {
        self.sequencer.begin_pass();
        self.wake_yielded();
        while self.run_rotation() && self.config.turbo_mode {
            self.wake_yielded();
            if !self
                .threads
                .iter()
                .any(|t| t.status() == ThreadStatus::Running)
            {
                break;
            }
        }
        self.threads
            .iter()
            .filter(|t| t.status() == ThreadStatus::Done)
            .map(Thread::id)
            .collect()
    }

    /// Threads that yielded for the tick become runnable again. Threads
    /// waiting on a pending result stay put until it resolves.
    fn wake_yielded(&mut self) {
        for thread in &mut self.threads {
            if thread.status() == ThreadStatus::Yielded && thread.pending().is_none() {
                thread.set_status(ThreadStatus::Running);
            }
        }
    }

    /// Visit runnable threads once, starting from the parked cursor and
    /// wrapping around. Returns false if the budget ran out first.
    fn run_rotation(&mut self) -> bool {
        let start = self.sequencer.cursor.take();
        let mut after: Option<ThreadId> = None;
        let mut wrapped = false;

        loop {
            let from = match after {
                Some(id) => self.threads.partition_point(|t| t.id() <= id),
                None if wrapped => 0,
                None => start.map_or(0, |s| self.threads.partition_point(|t| t.id() < s)),
            };
            let upper = match (wrapped, start) {
                (true, Some(s)) => self.threads.partition_point(|t| t.id() < s),
                _ => self.threads.len(),
            };
            let next = self
                .threads
                .get(from..upper)
                .and_then(|slice| slice.iter().find(|t| t.status() == ThreadStatus::Running))
                .map(Thread::id);

            let Some(id) = next else {
                if wrapped || start.is_none() {
                    return true;
                }
                wrapped = true;
                after = None;
                continue;
            };

            if !self.sequencer.may_visit(self.config.work_time) {
                tracing::trace!(resume_at = %id, "work budget spent");
                self.sequencer.cursor = Some(id);
                return false;
            }
            self.visit(id);
            after = Some(id);
        }
    }

    fn visit(&mut self, id: ThreadId) {
        let Ok(index) = self.threads.binary_search_by_key(&id, Thread::id) else {
            return;
        };
        self.sequencer.visits += 1;

        let requests = {
            let thread = &mut self.threads[index];
            let Some(target) = self.targets.get_mut(&thread.target()) else {
                tracing::debug!(thread = %id, "target disposed; retiring thread");
                if let Some(pending) = thread.stop() {
                    self.timer.cancel(pending);
                }
                return;
            };
            let graph = match thread.source() {
                ScriptSource::Flyout => &self.flyout,
                ScriptSource::Target => match self.programs.get(&target.program()) {
                    Some(graph) => graph,
                    None => {
                        tracing::debug!(thread = %id, "program gone; retiring thread");
                        if let Some(pending) = thread.stop() {
                            self.timer.cancel(pending);
                        }
                        return;
                    }
                },
            };
            let mut cx = StepContext {
                graph,
                table: &self.table,
                config: &self.config,
                edge_values: &mut self.edge_values,
                timer: self.timer.as_mut(),
                timer_origin: &mut self.timer_origin,
                notifications: &mut self.notifications,
                requests: Vec::new(),
            };
            step_thread(&mut cx, thread, target);
            cx.requests
        };

        for request in requests {
            self.apply_request(request);
        }
    }
}

/// Run one thread until it stops being runnable or hits the runaway
/// ceiling.
pub(crate) fn step_thread(cx: &mut StepContext<'_>, thread: &mut Thread, target: &mut Target) {
    if thread.resume_past_current {
        thread.resume_past_current = false;
        advance(cx.graph, thread);
    }

    let mut executed = 0usize;
    while thread.status() == ThreadStatus::Running {
        let Some(block) = thread.peek_stack().cloned() else {
            thread.set_status(ThreadStatus::Done);
            break;
        };
        if executed >= cx.config.runaway_step_limit {
            tracing::warn!(
                thread = %thread.id(),
                limit = cx.config.runaway_step_limit,
                "runaway thread; ending visit"
            );
            thread.set_status(ThreadStatus::Yielded);
            break;
        }
        executed += 1;
        execute_block(cx, thread, target, &block);
    }
}

/// Move past the innermost block: to its `next`, or back out to the block
/// that entered this branch.
fn advance(graph: &ProgramGraph, thread: &mut Thread) {
    let next = thread.peek_stack().and_then(|current| graph.next(current)).cloned();
    match next {
        Some(next) => thread.go_to_next(next),
        None => {
            thread.pop_stack();
            if thread.stack_depth() == 0 {
                thread.set_status(ThreadStatus::Done);
            }
        }
    }
}

fn execute_block(cx: &mut StepContext<'_>, thread: &mut Thread, target: &mut Target, block: &BlockId) {
    let graph = cx.graph;
    let table = cx.table;
    let Some(opcode) = graph.opcode(block) else {
        tracing::debug!(thread = %thread.id(), %block, "block no longer exists; retiring thread");
        retire(cx, thread);
        return;
    };
    let hat = table.hat(opcode).copied();
    if hat.is_none() {
        thread.request_script_glow = true;
    }

    let Some(primitive) = table.get(opcode) else {
        tracing::trace!(opcode, "no primitive; skipping block");
        advance(graph, thread);
        return;
    };

    let args = match evaluate_args(cx, thread, target, block, 0) {
        Ok(args) => args,
        Err(error) => {
            fail(cx, thread, opcode, &error);
            return;
        }
    };

    let highlight = cx.config.highlight_execution && hat.is_none();
    if highlight {
        cx.notifications.push(Notification::BlockGlowOn {
            block: block.clone(),
        });
    }
    let mut util = BlockUtility::new(block, thread, target, cx);
    let result = primitive(&args, &mut util);
    let control = util.into_control();
    if highlight {
        cx.notifications.push(Notification::BlockGlowOff {
            block: block.clone(),
        });
    }
    tracing::trace!(thread = %thread.id(), %block, opcode, ?control, "executed");

    let value = match result {
        Err(error) => {
            fail(cx, thread, opcode, &error);
            return;
        }
        Ok(Outcome::Pending(pending)) => {
            thread.suspend_on(pending);
            return;
        }
        Ok(Outcome::Value(value)) => Some(value),
        Ok(Outcome::Done) => None,
    };

    if let Some(meta) = hat {
        let proceed = match value {
            None => true,
            Some(value) if meta.edge_activated => {
                let now = value.to_bool();
                let before = cx.edge_values.insert(block.clone(), now).unwrap_or(false);
                thread.is_stack_click() || (!before && now)
            }
            Some(value) => value.to_bool(),
        };
        if !proceed {
            thread.set_status(ThreadStatus::Done);
            return;
        }
    } else if let Some(value) = value {
        if thread.stack_depth() == 1 && thread.top_block() == block {
            cx.notifications.push(Notification::VisualReport {
                block: block.clone(),
                value: value.to_string(),
            });
        }
    }

    match control {
        None => advance(graph, thread),
        Some(Control::Yield) => {
            if !thread.is_warp() {
                thread.set_status(ThreadStatus::Yielded);
            }
        }
        Some(Control::Branch(branch)) => {
            if let Some(first) = graph.branch(block, branch) {
                thread.push_stack(first.clone());
            }
        }
        Some(Control::Procedure { body, warp }) => {
            thread.push_stack(body);
            if warp {
                thread.set_warp(true);
            }
        }
        Some(Control::StopThisScript) => stop_this_script(graph, thread),
        Some(Control::Retire) => retire(cx, thread),
    }
}

/// Unwind to the innermost procedure call, which then runs again and
/// advances. Outside a procedure the thread finishes.
fn stop_this_script(graph: &ProgramGraph, thread: &mut Thread) {
    while let Some(top) = thread.peek_stack() {
        if graph.opcode(top) == Some(procedures::CALL) {
            break;
        }
        thread.pop_stack();
    }
    if thread.stack_depth() == 0 {
        thread.stop();
    }
}

fn retire(cx: &mut StepContext<'_>, thread: &mut Thread) {
    if let Some(pending) = thread.stop() {
        cx.timer.cancel(pending);
    }
}

fn fail(cx: &mut StepContext<'_>, thread: &mut Thread, opcode: &str, error: &PrimitiveError) {
    tracing::warn!(thread = %thread.id(), opcode, %error, "primitive failed; retiring thread");
    retire(cx, thread);
}

/// Fields as text plus every non-branch input, evaluated in insertion
/// order. Nothing is memoized: each call re-runs the reporters.
fn evaluate_args(
    cx: &mut StepContext<'_>,
    thread: &mut Thread,
    target: &mut Target,
    block: &BlockId,
    depth: usize,
) -> Result<BlockArgs, PrimitiveError> {
    let graph = cx.graph;
    let mut args = BlockArgs::new();
    if let Some(fields) = graph.fields(block) {
        for (name, field) in fields {
            args.insert(name, field.value.as_str());
        }
    }
    if let Some(inputs) = graph.non_branch_inputs(block) {
        for input in inputs {
            let value = match &input.block {
                Some(child) => evaluate_reporter(cx, thread, target, child, depth + 1)?,
                None => Value::default(),
            };
            args.insert(&input.name, value);
        }
    }
    Ok(args)
}

fn evaluate_reporter(
    cx: &mut StepContext<'_>,
    thread: &mut Thread,
    target: &mut Target,
    block: &BlockId,
    depth: usize,
) -> Result<Value, PrimitiveError> {
    if depth > REPORTER_DEPTH_LIMIT {
        return Err(PrimitiveError::NestingTooDeep {
            limit: REPORTER_DEPTH_LIMIT,
        });
    }
    let graph = cx.graph;
    let table = cx.table;
    let Some(opcode) = graph.opcode(block) else {
        return Ok(Value::default());
    };
    let Some(primitive) = table.get(opcode) else {
        tracing::trace!(opcode, "no reporter primitive; using empty value");
        return Ok(Value::default());
    };
    let args = evaluate_args(cx, thread, target, block, depth)?;
    let mut util = BlockUtility::new(block, thread, target, cx);
    let outcome = primitive(&args, &mut util)?;
    match outcome {
        Outcome::Value(value) => Ok(value),
        Outcome::Done => Ok(Value::default()),
        Outcome::Pending(pending) => {
            // Reporters cannot suspend their caller.
            cx.timer.cancel(pending);
            Ok(Value::default())
        }
    }
}
