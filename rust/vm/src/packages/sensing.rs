//! Project timer.

use crate::error::PrimitiveError;
use crate::primitive::{BlockArgs, BlockPackage, BlockUtility, Outcome, PrimitiveFn};
use crate::value::Value;

/// `sensing_*` opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensingPackage;

impl BlockPackage for SensingPackage {
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
        vec![
            ("sensing_timer", timer as PrimitiveFn),
            ("sensing_resettimer", reset_timer as PrimitiveFn),
        ]
    }
}

fn timer(_: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    Ok(Outcome::Value(Value::Number(util.project_timer())))
}

fn reset_timer(_: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    util.reset_project_timer();
    Ok(Outcome::Done)
}
