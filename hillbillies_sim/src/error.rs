// Error types for the simulation.
//
// `SimError` is returned by every fallible public `World` operation.
// `TaskFault` is the interpreter's runtime fault: it moves an execution
// context to FAILED and is never propagated out of `advance_time`.
// `ProgramError` covers task programs that fail to load.
//
// Capacity refusals (full faction, too many active factions, full world) are
// not errors: the relevant operations return `false` or `None` instead.

use crate::types::CubeCoord;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("coordinate {coord} is outside the world")]
    OutOfBounds { coord: CubeCoord },

    #[error("illegal action: {0}")]
    IllegalAction(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid duration {0}: must be finite and non-negative")]
    InvalidDuration(f64),

    #[error("unknown entity {0}")]
    UnknownEntity(String),
}

/// A runtime fault raised while interpreting a task.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFault {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("illegal action: {0}")]
    IllegalAction(String),

    #[error("no {0} matches the query")]
    NoSuchEntity(&'static str),
}

impl From<SimError> for TaskFault {
    fn from(err: SimError) -> Self {
        TaskFault::IllegalAction(err.to_string())
    }
}

/// A task program that could not be loaded.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("malformed program: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid task name `{0}`")]
    InvalidName(String),

    #[error("`Break` outside of a `While` loop")]
    BreakOutsideLoop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_message_names_coordinate() {
        let err = SimError::OutOfBounds {
            coord: CubeCoord::new(1, -2, 3),
        };
        assert_eq!(err.to_string(), "coordinate (1, -2, 3) is outside the world");
    }

    #[test]
    fn sim_error_converts_to_illegal_action_fault() {
        let fault: TaskFault = SimError::IllegalAction("target not passable".into()).into();
        assert!(matches!(fault, TaskFault::IllegalAction(msg) if msg.contains("not passable")));
    }
}
