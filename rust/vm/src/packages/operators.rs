//! Literals, arithmetic, comparison, logic, and text operators.

use std::cmp::Ordering;

use crate::error::PrimitiveError;
use crate::primitive::{BlockArgs, BlockPackage, BlockUtility, Outcome, PrimitiveFn};
use crate::value::Value;

/// Literal shadows and `operator_*` opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorsPackage;

impl BlockPackage for OperatorsPackage {
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
        vec![
            ("math_number", number_literal as PrimitiveFn),
            ("math_whole_number", number_literal as PrimitiveFn),
            ("math_positive_number", number_literal as PrimitiveFn),
            ("math_integer", number_literal as PrimitiveFn),
            ("math_angle", number_literal as PrimitiveFn),
            ("text", text_literal as PrimitiveFn),
            ("operator_add", add as PrimitiveFn),
            ("operator_subtract", subtract as PrimitiveFn),
            ("operator_multiply", multiply as PrimitiveFn),
            ("operator_divide", divide as PrimitiveFn),
            ("operator_mod", modulo as PrimitiveFn),
            ("operator_round", round as PrimitiveFn),
            ("operator_lt", lt as PrimitiveFn),
            ("operator_equals", equals as PrimitiveFn),
            ("operator_gt", gt as PrimitiveFn),
            ("operator_and", and as PrimitiveFn),
            ("operator_or", or as PrimitiveFn),
            ("operator_not", not as PrimitiveFn),
            ("operator_join", join as PrimitiveFn),
            ("operator_length", length as PrimitiveFn),
        ]
    }
}

/// Round to the nearest integer, halves toward positive infinity.
#[must_use]
pub fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

/// Remainder with the sign of the divisor.
#[must_use]
pub fn floored_mod(n: f64, modulus: f64) -> f64 {
    let result = n % modulus;
    if result != 0.0 && (result < 0.0) != (modulus < 0.0) {
        result + modulus
    } else {
        result
    }
}

type OpResult = Result<Outcome, PrimitiveError>;

fn value(v: impl Into<Value>) -> OpResult {
    Ok(Outcome::Value(v.into()))
}

fn number_literal(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.get("NUM").cloned().unwrap_or_default())
}

fn text_literal(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.string("TEXT"))
}

fn add(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.number("NUM1") + args.number("NUM2"))
}

fn subtract(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.number("NUM1") - args.number("NUM2"))
}

fn multiply(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.number("NUM1") * args.number("NUM2"))
}

fn divide(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.number("NUM1") / args.number("NUM2"))
}

fn modulo(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(floored_mod(args.number("NUM1"), args.number("NUM2")))
}

fn round(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(round_half_up(args.number("NUM")))
}

fn ordering(args: &BlockArgs) -> Ordering {
    let left = args.get("OPERAND1").cloned().unwrap_or_default();
    let right = args.get("OPERAND2").cloned().unwrap_or_default();
    left.compare(&right)
}

fn lt(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(ordering(args) == Ordering::Less)
}

fn equals(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(ordering(args) == Ordering::Equal)
}

fn gt(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(ordering(args) == Ordering::Greater)
}

fn and(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.boolean("OPERAND1") && args.boolean("OPERAND2"))
}

fn or(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.boolean("OPERAND1") || args.boolean("OPERAND2"))
}

fn not(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(!args.boolean("OPERAND"))
}

fn join(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    value(args.string("STRING1") + &args.string("STRING2"))
}

fn length(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> OpResult {
    // usize -> f64 is exact for any realistic string.
    #[allow(clippy::cast_precision_loss)]
    let len = args.string("STRING").chars().count() as f64;
    value(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_sends_halves_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(floored_mod(7.0, 3.0), 1.0);
        assert_eq!(floored_mod(-7.0, 3.0), 2.0);
        assert_eq!(floored_mod(7.0, -3.0), -2.0);
        assert_eq!(floored_mod(6.0, -3.0), 0.0);
    }
}
