//! Dynamically typed values passed between blocks.
//!
//! Blocks exchange loosely typed values: numbers, booleans, and text. Every
//! primitive casts its arguments to the type it needs, so the casts here
//! define how the whole language coerces.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value produced by a reporter or stored in a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// Text.
    Text(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Text(String::new())
    }
}

impl Value {
    /// Numeric reading of the value, or `None` if it is not numeric.
    /// Blank text is not numeric.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_number(s),
        }
    }

    /// Cast to a number. Anything non-numeric is `0`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Text(s) if s.trim().is_empty() => 0.0,
            other => other.as_number().unwrap_or(0.0),
        }
    }

    /// Cast to a boolean. Empty text, `"0"`, and `"false"` (any case) are
    /// false, as are zero and NaN.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        }
    }

    /// Compare two values: numerically when both are numeric, otherwise as
    /// case-insensitive text.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => {
                let a = self.to_string().to_lowercase();
                let b = other.to_string().to_lowercase();
                a.cmp(&b)
            }
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Rust accepts spellings like "inf" and "nan" that the language does not.
    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) if *n == 0.0 => f.write_str("0"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_to_number() {
        assert_eq!(Value::from(" 12 ").to_number(), 12.0);
        assert_eq!(Value::from("1e3").to_number(), 1000.0);
        assert_eq!(Value::from("abc").to_number(), 0.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from("nan").to_number(), 0.0);
        assert_eq!(Value::from(true).to_number(), 1.0);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::from("").to_bool());
        assert!(!Value::from("0").to_bool());
        assert!(!Value::from("FALSE").to_bool());
        assert!(Value::from("no").to_bool());
        assert!(!Value::from(0.0).to_bool());
        assert!(Value::from(-1.0).to_bool());
    }

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn compare_numeric_then_text() {
        assert_eq!(Value::from("10").compare(&Value::from(9.0)), Ordering::Greater);
        assert_eq!(Value::from("Apple").compare(&Value::from("apple")), Ordering::Equal);
        assert_eq!(Value::from("a").compare(&Value::from("b")), Ordering::Less);
        assert_eq!(Value::from(" ").compare(&Value::from(0.0)), Ordering::Less);
    }
}
