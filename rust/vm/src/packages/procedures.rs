//! Custom procedures.
//!
//! A definition is an ordinary top-level script whose first block carries
//! the procedure's signature. Calling it enters the body below the
//! definition as a nested branch, so returning from the body hands control
//! back to the call block.

use crate::error::PrimitiveError;
use crate::primitive::{BlockArgs, BlockPackage, BlockUtility, Outcome, PrimitiveFn};

/// Opcode of a definition block.
pub const DEFINITION: &str = "procedures_definition";
/// Opcode of a call block.
pub const CALL: &str = "procedures_call";
/// Field holding the procedure signature.
pub const PROCCODE: &str = "PROCCODE";
/// Definition field; `"true"` runs the body without yielding.
pub const WARP: &str = "WARP";

/// `procedures_*` opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProceduresPackage;

impl BlockPackage for ProceduresPackage {
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
        vec![(CALL, call as PrimitiveFn)]
    }
}

fn call(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    if util.first_visit() {
        let proccode = args.string(PROCCODE);
        util.start_procedure(&proccode);
    }
    Ok(Outcome::Done)
}
