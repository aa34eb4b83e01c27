//! Primitive dispatch: opcode to handler, plus the control object handlers
//! use to steer their thread.
//!
//! The table is built once when the runtime is created, from fixed
//! [`BlockPackage`] registrations. Handlers are plain function pointers; all
//! state they touch arrives through [`BlockUtility`].

use std::collections::BTreeMap;
use std::time::Duration;

use blocks_graph::{BlockId, ProgramGraph};
use indexmap::IndexMap;

use crate::clock::PendingId;
use crate::error::PrimitiveError;
use crate::notification::Notification;
use crate::sequencer::StepContext;
use crate::target::{Target, TargetId};
use crate::thread::{StackFrame, Thread, ThreadId};
use crate::value::Value;

/// Signature of every primitive.
pub type PrimitiveFn =
    fn(&BlockArgs, &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError>;

/// What a primitive produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Command finished.
    Done,
    /// Reporter value (or hat predicate result).
    Value(Value),
    /// Suspend until the wake-up resolves, then continue after this block.
    Pending(PendingId),
}

/// Metadata for script-starting opcodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HatMeta {
    /// Starting the hat again restarts a thread already running its script.
    pub restart_existing_threads: bool,
    /// Polled every tick; fires when its predicate goes from false to true.
    pub edge_activated: bool,
}

/// A group of primitives registered together.
pub trait BlockPackage {
    /// Opcode/handler pairs.
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)>;

    /// Opcodes that start scripts.
    fn hats(&self) -> Vec<(&'static str, HatMeta)> {
        Vec::new()
    }
}

/// Opcode-keyed dispatch table.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveTable {
    primitives: BTreeMap<String, PrimitiveFn>,
    hats: BTreeMap<String, HatMeta>,
}

impl PrimitiveTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with every built-in package registered.
    #[must_use]
    pub fn with_default_packages() -> Self {
        let mut table = Self::new();
        for package in crate::packages::default_packages() {
            table.register(package.as_ref());
        }
        table
    }

    /// Register a package. Later registrations replace earlier ones.
    pub fn register(&mut self, package: &dyn BlockPackage) {
        for (opcode, primitive) in package.primitives() {
            self.primitives.insert(opcode.to_string(), primitive);
        }
        for (opcode, meta) in package.hats() {
            self.hats.insert(opcode.to_string(), meta);
        }
    }

    /// Handler for an opcode.
    #[must_use]
    pub fn get(&self, opcode: &str) -> Option<PrimitiveFn> {
        self.primitives.get(opcode).copied()
    }

    /// Hat metadata, if the opcode starts scripts.
    #[must_use]
    pub fn hat(&self, opcode: &str) -> Option<&HatMeta> {
        self.hats.get(opcode)
    }

    /// Whether the opcode starts scripts.
    #[must_use]
    pub fn is_hat(&self, opcode: &str) -> bool {
        self.hats.contains_key(opcode)
    }

    /// Whether the opcode is an edge-activated hat.
    #[must_use]
    pub fn is_edge_activated(&self, opcode: &str) -> bool {
        self.hats.get(opcode).is_some_and(|m| m.edge_activated)
    }

    /// Edge-activated hat opcodes, in a stable order.
    #[must_use]
    pub fn edge_activated_hats(&self) -> Vec<String> {
        self.hats
            .iter()
            .filter(|(_, meta)| meta.edge_activated)
            .map(|(opcode, _)| opcode.clone())
            .collect()
    }
}

/// Resolved arguments: every field as text and every non-branch input
/// evaluated, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockArgs {
    values: IndexMap<String, Value>,
}

impl BlockArgs {
    /// Empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an argument.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set an argument.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Raw argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Argument cast to a number; missing is `0`.
    #[must_use]
    pub fn number(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, Value::to_number)
    }

    /// Argument cast to a boolean; missing is false.
    #[must_use]
    pub fn boolean(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::to_bool)
    }

    /// Argument cast to text; missing is empty.
    #[must_use]
    pub fn string(&self, name: &str) -> String {
        self.get(name).map(ToString::to_string).unwrap_or_default()
    }

    /// Argument names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }
}

/// Where a new clone comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneSource {
    /// The target running the block.
    Myself,
    /// The original sprite with this name.
    Named(String),
}

/// Side effect on the runtime, applied after the requesting thread's step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RuntimeRequest {
    StartHats {
        opcode: String,
        fields: IndexMap<String, String>,
        target: Option<TargetId>,
    },
    StopAll,
    StopOtherScripts {
        target: TargetId,
        except: ThreadId,
    },
    CreateClone {
        source: CloneSource,
        requester: TargetId,
    },
    DeleteClone(TargetId),
}

/// How the sequencer should continue after the primitive returns.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Control {
    Yield,
    Branch(usize),
    Procedure { body: BlockId, warp: bool },
    StopThisScript,
    Retire,
}

const LOOP_ENTERED: &str = "loop_entered";
const EXECUTED: &str = "executed";

/// Control object handed to a primitive for one invocation.
pub struct BlockUtility<'a, 'cx> {
    block: &'a BlockId,
    thread: &'a mut Thread,
    target: &'a mut Target,
    cx: &'a mut StepContext<'cx>,
    control: Option<Control>,
}

impl<'a, 'cx> BlockUtility<'a, 'cx> {
    pub(crate) fn new(
        block: &'a BlockId,
        thread: &'a mut Thread,
        target: &'a mut Target,
        cx: &'a mut StepContext<'cx>,
    ) -> Self {
        Self {
            block,
            thread,
            target,
            cx,
            control: None,
        }
    }

    pub(crate) fn into_control(self) -> Option<Control> {
        self.control
    }

    /// Block being executed.
    #[must_use]
    pub fn block_id(&self) -> &BlockId {
        self.block
    }

    /// Thread running the block.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread.id()
    }

    /// Whether the thread was started by clicking its script.
    #[must_use]
    pub fn is_stack_click(&self) -> bool {
        self.thread.is_stack_click()
    }

    /// Target running the block.
    #[must_use]
    pub fn target(&self) -> &Target {
        self.target
    }

    /// Mutable target running the block.
    pub fn target_mut(&mut self) -> &mut Target {
        self.target
    }

    /// Graph the block lives in.
    #[must_use]
    pub fn graph(&self) -> &ProgramGraph {
        self.cx.graph
    }

    /// Scratch state of the innermost stack entry.
    #[must_use]
    pub fn stack_frame(&self) -> Option<&StackFrame> {
        self.thread.peek_frame()
    }

    /// Mutable scratch state of the innermost stack entry.
    pub fn stack_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.thread.peek_frame_mut()
    }

    /// True the first time the block runs in this activation, false when
    /// control comes back to it after a branch.
    pub fn first_visit(&mut self) -> bool {
        match self.thread.peek_frame_mut() {
            Some(frame) if frame.flag(EXECUTED) => false,
            Some(frame) => {
                frame.set(EXECUTED, true);
                true
            }
            None => true,
        }
    }

    /// Enter a branch (1-based) once this primitive returns. An empty branch
    /// re-invokes the block.
    pub fn start_branch(&mut self, branch: usize) {
        self.control = Some(Control::Branch(branch));
    }

    /// Enter a loop body. The next invocation after the body completes
    /// should call [`returned_from_loop`](Self::returned_from_loop) and
    /// yield, so a loop runs at most one iteration per tick.
    pub fn start_loop(&mut self, branch: usize) {
        if let Some(frame) = self.thread.peek_frame_mut() {
            frame.set(LOOP_ENTERED, true);
        }
        self.start_branch(branch);
    }

    /// Whether control just came back from a loop body. Clears the marker.
    pub fn returned_from_loop(&mut self) -> bool {
        self.thread
            .peek_frame_mut()
            .and_then(|frame| frame.take(LOOP_ENTERED))
            .is_some_and(|v| v.to_bool())
    }

    /// Enter the body of the procedure defined with `proccode`. Returns false
    /// if there is no such definition or its body is empty.
    pub fn start_procedure(&mut self, proccode: &str) -> bool {
        let graph = self.cx.graph;
        let definition = graph.scripts().find(|script| {
            graph.block(script).is_some_and(|b| {
                b.opcode == crate::packages::procedures::DEFINITION
                    && b.field(crate::packages::procedures::PROCCODE) == Some(proccode)
            })
        });
        let Some(definition) = definition else {
            tracing::debug!(proccode, "no procedure definition");
            return false;
        };
        let warp = graph
            .block(definition)
            .and_then(|b| b.field(crate::packages::procedures::WARP))
            .is_some_and(|w| Value::from(w).to_bool());
        match graph.next(definition) {
            Some(body) => {
                self.control = Some(Control::Procedure {
                    body: body.clone(),
                    warp,
                });
                true
            }
            None => false,
        }
    }

    /// End the thread's turn for this tick; the same block runs again next
    /// tick. Ignored in warp mode.
    pub fn yield_tick(&mut self) {
        self.control = Some(Control::Yield);
    }

    /// Unwind to the innermost procedure call, or finish the thread.
    pub fn stop_this_script(&mut self) {
        self.control = Some(Control::StopThisScript);
    }

    /// Finish the thread immediately.
    pub fn retire_thread(&mut self) {
        self.control = Some(Control::Retire);
    }

    /// Schedule a timed wake-up; return it as [`Outcome::Pending`].
    pub fn schedule_wait(&mut self, delay: Duration) -> PendingId {
        self.cx.timer.schedule(delay)
    }

    /// Seconds since the project timer was last reset.
    #[must_use]
    pub fn project_timer(&self) -> f64 {
        self.cx
            .timer
            .now()
            .saturating_sub(*self.cx.timer_origin)
            .as_secs_f64()
    }

    /// Restart the project timer at zero.
    pub fn reset_project_timer(&mut self) {
        *self.cx.timer_origin = self.cx.timer.now();
    }

    /// Start every matching hat across all targets.
    pub fn start_hats(&mut self, opcode: &str, fields: &[(&str, &str)]) {
        self.cx.requests.push(RuntimeRequest::StartHats {
            opcode: opcode.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            target: None,
        });
    }

    /// Stop every thread and dispose every clone.
    pub fn stop_all(&mut self) {
        self.cx.requests.push(RuntimeRequest::StopAll);
    }

    /// Stop the target's other threads.
    pub fn stop_other_scripts(&mut self) {
        self.cx.requests.push(RuntimeRequest::StopOtherScripts {
            target: self.target.id(),
            except: self.thread.id(),
        });
    }

    /// Ask for a clone.
    pub fn create_clone(&mut self, source: CloneSource) {
        self.cx.requests.push(RuntimeRequest::CreateClone {
            source,
            requester: self.target.id(),
        });
    }

    /// Dispose the running target if it is a clone. Returns false for
    /// originals, which cannot be deleted this way.
    pub fn delete_this_clone(&mut self) -> bool {
        if self.target.is_original() {
            return false;
        }
        self.cx
            .requests
            .push(RuntimeRequest::DeleteClone(self.target.id()));
        true
    }

    /// Previous value of this block's edge predicate, replaced by `value`.
    pub fn update_edge_activated_value(&mut self, value: bool) -> bool {
        self.cx
            .edge_values
            .insert(self.block.clone(), value)
            .unwrap_or(false)
    }

    /// Highlight or unhighlight a block.
    pub fn glow_block(&mut self, block: &BlockId, on: bool) {
        let block = block.clone();
        self.cx.notifications.push(if on {
            Notification::BlockGlowOn { block }
        } else {
            Notification::BlockGlowOff { block }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
        Ok(Outcome::Done)
    }

    struct Demo;

    impl BlockPackage for Demo {
        fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
            vec![
                ("demo_noop", noop as PrimitiveFn),
                ("demo_edge", noop as PrimitiveFn),
            ]
        }

        fn hats(&self) -> Vec<(&'static str, HatMeta)> {
            vec![
                (
                    "demo_edge",
                    HatMeta {
                        restart_existing_threads: false,
                        edge_activated: true,
                    },
                ),
                (
                    "demo_when",
                    HatMeta {
                        restart_existing_threads: true,
                        edge_activated: false,
                    },
                ),
            ]
        }
    }

    #[test]
    fn register_package() {
        let mut table = PrimitiveTable::new();
        table.register(&Demo);
        assert!(table.get("demo_noop").is_some());
        assert!(table.get("demo_when").is_none());
        assert!(table.is_hat("demo_when"));
        assert!(!table.is_hat("demo_noop"));
        assert_eq!(table.edge_activated_hats(), vec!["demo_edge".to_string()]);
    }

    #[test]
    fn default_table_has_builtin_hats() {
        let table = PrimitiveTable::with_default_packages();
        assert!(table.hat("event_whenflagclicked").unwrap().restart_existing_threads);
        assert!(table.is_edge_activated("event_whengreaterthan"));
        assert!(table.get("control_repeat").is_some());
        assert!(table.get("procedures_definition").is_none());
    }

    #[test]
    fn args_cast_on_read() {
        let args = BlockArgs::new().with("TIMES", "3").with("FLAG", 0.0);
        assert_eq!(args.number("TIMES"), 3.0);
        assert!(!args.boolean("FLAG"));
        assert_eq!(args.string("MISSING"), "");
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["TIMES", "FLAG"]);
    }
}
