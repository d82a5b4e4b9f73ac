//! Execution outcomes.

use crate::lang::{RuntimeError, Value};

/// The tagged result of executing one submitted block. Exactly one
/// outcome is produced per non-blank block, and exactly one render
/// call consumes it.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The block was an expression producing a displayable value.
    Value(Value),
    /// The block executed but produced nothing to display.
    NoValue,
    /// User code raised; carries the exception and its call stack.
    Raised(RuntimeError),
    /// A user interrupt ended the statement.
    Interrupted,
    /// The scheduler cancelled the statement's task.
    Cancelled,
}

impl Outcome {
    pub fn is_no_value(&self) -> bool {
        matches!(self, Outcome::NoValue)
    }
}
