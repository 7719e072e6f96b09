// Execution contexts: the suspendable state of a task bound to one unit.
//
// A context holds the task's variable bindings (one flat map per context,
// no lexical nesting), the executing unit, and a cursor that records where
// evaluation stopped. The cursor is a stack of `Frame`s, one per compound
// statement on the path from the root to the statement being executed.
// Resuming walks the same path again, taking each frame's recorded branch
// instead of re-evaluating conditions or re-running finished children, so
// no side effect is ever repeated.
//
// A `Frame::Action` at the top of the stack means an action has been
// started and the task is waiting for the unit to finish it. The remaining
// duration of that action lives in the unit's activity, which is frozen
// while the unit falls.

use crate::error::TaskFault;
use crate::task::ast::Statement;
use crate::types::{CubeCoord, TaskId, UnitId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// A runtime value of the task language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Position(CubeCoord),
    Unit(UnitId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Position(_) => "position",
            Value::Unit(_) => "unit",
        }
    }

    pub fn as_bool(self) -> Result<bool, TaskFault> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", other)),
        }
    }

    pub fn as_position(self) -> Result<CubeCoord, TaskFault> {
        match self {
            Value::Position(p) => Ok(p),
            other => Err(mismatch("position", other)),
        }
    }

    pub fn as_unit(self) -> Result<UnitId, TaskFault> {
        match self {
            Value::Unit(u) => Ok(u),
            other => Err(mismatch("unit", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: Value) -> TaskFault {
    TaskFault::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

/// Lifecycle of an execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Ready to evaluate statements on the unit's next turn.
    Running,
    /// Waiting for the unit to finish an action.
    Suspended,
    Completed,
    Failed,
}

/// One level of the resume cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Index of the child currently executing.
    Sequence { next: usize },
    /// Which branch was taken.
    If { then_branch: bool },
    /// Whether the body is in progress (otherwise the condition is due).
    While { in_body: bool },
    /// An action was started and has not been observed to finish.
    Action,
}

#[derive(Clone, Debug)]
pub struct ExecutionContext {
    task: TaskId,
    unit: UnitId,
    pub(crate) body: Arc<Statement>,
    selected: Option<CubeCoord>,
    bindings: FxHashMap<String, Value>,
    pub(crate) frames: SmallVec<[Frame; 8]>,
    pub(crate) state: ExecutionState,
}

impl ExecutionContext {
    pub fn new(task: TaskId, unit: UnitId, body: Arc<Statement>, selected: Option<CubeCoord>) -> Self {
        Self {
            task,
            unit,
            body,
            selected,
            bindings: FxHashMap::default(),
            frames: SmallVec::new(),
            state: ExecutionState::Running,
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn selected(&self) -> Option<CubeCoord> {
        self.selected
    }

    pub fn lookup(&self, name: &str) -> Result<Value, TaskFault> {
        self.bindings
            .get(name)
            .copied()
            .ok_or_else(|| TaskFault::UndefinedVariable(name.to_string()))
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    /// Depth of the resume cursor; zero when no statement is in progress.
    pub fn cursor_depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn awaiting_action(&self) -> bool {
        self.frames.last() == Some(&Frame::Action)
    }
}
