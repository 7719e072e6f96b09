// Tasks and the task-language interpreter.
//
// A `Task` is a named, prioritized statement tree (plus the cube selected
// when it was created) stored in a faction's scheduler. Assigning it to a
// unit creates an `ExecutionContext`, which the interpreter in `exec.rs`
// drives a little further on each of the unit's turns.
//
// Submodules:
// - `ast.rs`:     `Expression` and `Statement`, serde-tagged enums.
// - `context.rs`: `ExecutionContext`, runtime `Value`s, the resume cursor.
// - `eval.rs`:    side-effect-free expression evaluation against a `World`.
// - `exec.rs`:    statement execution, suspension and resumption.
//
// See also: `faction.rs` for the scheduler, `physics.rs` for the actions a
// task triggers, `world.rs` for task assignment and completion.

pub mod ast;
pub mod context;
pub mod eval;
pub mod exec;

pub use ast::{Expression, Statement};
pub use context::{ExecutionContext, ExecutionState, Value};

use crate::error::{ProgramError, TaskFault};
use crate::types::{CubeCoord, UnitId};
use std::sync::Arc;

/// A schedulable program.
#[derive(Clone, Debug)]
pub struct Task {
    name: String,
    pub(crate) priority: i32,
    body: Arc<Statement>,
    selected: Option<CubeCoord>,
    pub(crate) assignee: Option<UnitId>,
    pub(crate) last_fault: Option<TaskFault>,
}

impl Task {
    /// Build a task. Rejects an empty name and a `Break` outside any loop.
    pub fn new(
        name: &str,
        priority: i32,
        body: Statement,
        selected: Option<CubeCoord>,
    ) -> Result<Self, ProgramError> {
        if name.trim().is_empty() {
            return Err(ProgramError::InvalidName(name.to_string()));
        }
        if body.has_stray_break() {
            return Err(ProgramError::BreakOutsideLoop);
        }
        Ok(Self {
            name: name.to_string(),
            priority,
            body: Arc::new(body),
            selected,
            assignee: None,
            last_fault: None,
        })
    }

    /// Build a task from a JSON statement tree.
    pub fn from_json(
        name: &str,
        priority: i32,
        json: &str,
        selected: Option<CubeCoord>,
    ) -> Result<Self, ProgramError> {
        let body: Statement = serde_json::from_str(json)?;
        Self::new(name, priority, body, selected)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn body(&self) -> &Arc<Statement> {
        &self.body
    }

    pub fn selected(&self) -> Option<CubeCoord> {
        self.selected
    }

    pub fn assignee(&self) -> Option<UnitId> {
        self.assignee
    }

    /// Fault of the most recent failed execution, if any.
    pub fn last_fault(&self) -> Option<&TaskFault> {
        self.last_fault.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_from_json() {
        let task = Task::from_json("rest", 3, r#"{"node": "Rest"}"#, None).unwrap();
        assert_eq!(task.name(), "rest");
        assert_eq!(task.priority(), 3);
        assert_eq!(**task.body(), Statement::Rest);
    }

    #[test]
    fn malformed_program_rejected() {
        let err = Task::from_json("bad", 0, r#"{"node": "Sequence"}"#, None).unwrap_err();
        assert!(matches!(err, ProgramError::Malformed(_)));
    }

    #[test]
    fn stray_break_rejected() {
        let err = Task::new("bad", 0, Statement::Break, None).unwrap_err();
        assert!(matches!(err, ProgramError::BreakOutsideLoop));
    }

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(
            Task::new(" ", 0, Statement::Rest, None),
            Err(ProgramError::InvalidName(_))
        ));
    }
}
