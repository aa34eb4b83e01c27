//! Control blocks: loops, conditionals, waits, stops, and clones.
//!
//! Loops enter their body at most once per tick. The visit that enters the
//! body marks the frame; when the body completes and control returns to
//! the loop block, that visit yields instead of deciding again.

use std::time::Duration;

use crate::error::PrimitiveError;
use crate::primitive::{
    BlockArgs, BlockPackage, BlockUtility, CloneSource, HatMeta, Outcome, PrimitiveFn,
};

/// Hat run by a freshly created clone.
pub const START_AS_CLONE: &str = "control_start_as_clone";

const LOOP_COUNTER: &str = "loop_counter";
const MYSELF: &str = "_myself_";

/// `control_*` opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlPackage;

impl BlockPackage for ControlPackage {
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
        vec![
            ("control_repeat", repeat as PrimitiveFn),
            ("control_repeat_until", repeat_until as PrimitiveFn),
            ("control_forever", forever as PrimitiveFn),
            ("control_if", if_ as PrimitiveFn),
            ("control_if_else", if_else as PrimitiveFn),
            ("control_stop", stop as PrimitiveFn),
            ("control_wait", wait as PrimitiveFn),
            ("control_create_clone_of", create_clone_of as PrimitiveFn),
            ("control_create_clone_of_menu", clone_menu as PrimitiveFn),
            ("control_delete_this_clone", delete_this_clone as PrimitiveFn),
        ]
    }

    fn hats(&self) -> Vec<(&'static str, HatMeta)> {
        vec![(START_AS_CLONE, HatMeta::default())]
    }
}

fn repeat(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    if util.returned_from_loop() {
        util.yield_tick();
        return Ok(Outcome::Done);
    }
    let remaining = match util.stack_frame().and_then(|f| f.get(LOOP_COUNTER)) {
        Some(counter) => counter.to_number(),
        None => crate::packages::operators::round_half_up(args.number("TIMES")),
    } - 1.0;
    if let Some(frame) = util.stack_frame_mut() {
        frame.set(LOOP_COUNTER, remaining);
    }
    if remaining >= 0.0 {
        util.start_loop(1);
    }
    Ok(Outcome::Done)
}

fn repeat_until(
    args: &BlockArgs,
    util: &mut BlockUtility<'_, '_>,
) -> Result<Outcome, PrimitiveError> {
    if util.returned_from_loop() {
        util.yield_tick();
    } else if !args.boolean("CONDITION") {
        util.start_loop(1);
    }
    Ok(Outcome::Done)
}

fn forever(_: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    if util.returned_from_loop() {
        util.yield_tick();
    } else {
        util.start_loop(1);
    }
    Ok(Outcome::Done)
}

fn if_(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    if util.first_visit() && args.boolean("CONDITION") {
        util.start_branch(1);
    }
    Ok(Outcome::Done)
}

fn if_else(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    if util.first_visit() {
        util.start_branch(if args.boolean("CONDITION") { 1 } else { 2 });
    }
    Ok(Outcome::Done)
}

fn stop(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    match args.string("STOP_OPTION").as_str() {
        "all" => {
            util.stop_all();
            util.retire_thread();
        }
        "other scripts in sprite" | "other scripts in stage" => util.stop_other_scripts(),
        _ => util.stop_this_script(),
    }
    Ok(Outcome::Done)
}

fn wait(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    let seconds = args.number("DURATION").max(0.0);
    let delay = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
    Ok(Outcome::Pending(util.schedule_wait(delay)))
}

fn create_clone_of(
    args: &BlockArgs,
    util: &mut BlockUtility<'_, '_>,
) -> Result<Outcome, PrimitiveError> {
    let option = args.string("CLONE_OPTION");
    let source = match option.as_str() {
        "" => {
            return Err(PrimitiveError::InvalidArgument {
                name: "CLONE_OPTION".into(),
                reason: "no clone source".into(),
            })
        }
        MYSELF => CloneSource::Myself,
        name => CloneSource::Named(name.to_string()),
    };
    util.create_clone(source);
    Ok(Outcome::Done)
}

fn clone_menu(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    Ok(Outcome::Value(args.string("CLONE_OPTION").into()))
}

fn delete_this_clone(
    _: &BlockArgs,
    util: &mut BlockUtility<'_, '_>,
) -> Result<Outcome, PrimitiveError> {
    if util.delete_this_clone() {
        util.retire_thread();
    }
    Ok(Outcome::Done)
}
