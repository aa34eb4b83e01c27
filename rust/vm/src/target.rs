//! Targets: the actors that own programs and run threads.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Target identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub(crate) u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Key of a program graph in the runtime. Clones share their original's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ProgramId(pub(crate) u64);

/// A live actor: the stage, a sprite, or a clone of a sprite.
#[derive(Debug, Clone)]
pub struct Target {
    id: TargetId,
    name: String,
    program: ProgramId,
    is_stage: bool,
    original: Option<TargetId>,
    variables: IndexMap<String, Value>,
}

impl Target {
    pub(crate) fn new(id: TargetId, name: String, program: ProgramId, is_stage: bool) -> Self {
        Self {
            id,
            name,
            program,
            is_stage,
            original: None,
            variables: IndexMap::new(),
        }
    }

    /// Target id.
    #[must_use]
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Name shared by a sprite and its clones.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the stage.
    #[must_use]
    pub fn is_stage(&self) -> bool {
        self.is_stage
    }

    /// False for clones.
    #[must_use]
    pub fn is_original(&self) -> bool {
        self.original.is_none()
    }

    /// For a clone, the original sprite it descends from.
    #[must_use]
    pub fn clone_of(&self) -> Option<TargetId> {
        self.original
    }

    pub(crate) fn program(&self) -> ProgramId {
        self.program
    }

    /// Value of a local variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Local variables in creation order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a local variable, creating it if needed.
    pub fn set_variable(&mut self, name: &str, value: impl Into<Value>) {
        self.variables.insert(name.to_string(), value.into());
    }

    /// Variable slot, created with `0` on first use.
    pub fn variable_mut(&mut self, name: &str) -> &mut Value {
        self.variables
            .entry(name.to_string())
            .or_insert(Value::Number(0.0))
    }

    /// A clone sharing this target's program, with a copy of its variables.
    pub(crate) fn make_clone(&self, id: TargetId) -> Self {
        Self {
            id,
            name: self.name.clone(),
            program: self.program,
            is_stage: false,
            original: Some(self.original.unwrap_or(self.id)),
            variables: self.variables.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_copies_variables_and_points_at_original() {
        let mut sprite = Target::new(TargetId(1), "cat".into(), ProgramId(7), false);
        sprite.set_variable("score", 4.0);

        let first = sprite.make_clone(TargetId(2));
        let second = first.make_clone(TargetId(3));
        assert!(!first.is_original());
        assert_eq!(second.clone_of(), Some(TargetId(1)));
        assert_eq!(second.variable("score"), Some(&Value::Number(4.0)));
        assert_eq!(second.program(), ProgramId(7));
    }

    #[test]
    fn missing_variable_starts_at_zero() {
        let mut sprite = Target::new(TargetId(1), "cat".into(), ProgramId(0), false);
        assert_eq!(*sprite.variable_mut("n"), Value::Number(0.0));
        assert_eq!(sprite.variables().count(), 1);
    }
}
