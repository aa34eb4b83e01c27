//! Target-local variables.

use crate::error::PrimitiveError;
use crate::primitive::{BlockArgs, BlockPackage, BlockUtility, Outcome, PrimitiveFn};
use crate::value::Value;

/// Field naming the variable.
pub const VARIABLE: &str = "VARIABLE";

/// `data_*` opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataPackage;

impl BlockPackage for DataPackage {
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
        vec![
            ("data_variable", variable as PrimitiveFn),
            ("data_setvariableto", set_variable_to as PrimitiveFn),
            ("data_changevariableby", change_variable_by as PrimitiveFn),
        ]
    }
}

fn variable(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    let name = args.string(VARIABLE);
    Ok(Outcome::Value(util.target_mut().variable_mut(&name).clone()))
}

fn set_variable_to(
    args: &BlockArgs,
    util: &mut BlockUtility<'_, '_>,
) -> Result<Outcome, PrimitiveError> {
    let name = args.string(VARIABLE);
    let value = args.get("VALUE").cloned().unwrap_or_default();
    util.target_mut().set_variable(&name, value);
    Ok(Outcome::Done)
}

fn change_variable_by(
    args: &BlockArgs,
    util: &mut BlockUtility<'_, '_>,
) -> Result<Outcome, PrimitiveError> {
    let name = args.string(VARIABLE);
    let delta = args.number("VALUE");
    let slot = util.target_mut().variable_mut(&name);
    *slot = Value::Number(slot.to_number() + delta);
    Ok(Outcome::Done)
}
