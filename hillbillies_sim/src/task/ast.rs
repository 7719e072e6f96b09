// Task language syntax tree.
//
// Closed tagged enums for the two syntactic categories. Both serialize as
// internally tagged JSON (`{"node": "While", "condition": ..., "body": ...}`)
// so task programs can be written by hand or generated by tools.
//
// Expressions are side-effect free. Statements are either control flow
// (`Sequence`, `If`, `While`, `Break`, `Assign`, `Print`) which take no
// simulated time, or actions which suspend the task until the unit's
// physical activity finishes.

use crate::types::CubeCoord;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum Expression {
    True,
    False,
    ReadVariable {
        name: String,
    },

    // Unit-valued.
    This,
    /// Nearest other member of the executing unit's faction.
    Friend,
    /// Nearest unit of another faction.
    Enemy,
    /// Nearest other unit.
    Any,

    // Position-valued.
    Here,
    LiteralPosition {
        x: i32,
        y: i32,
        z: i32,
    },
    /// Nearest workshop cube.
    Workshop,
    /// Cube of the nearest free boulder.
    Boulder,
    /// Cube of the nearest free log.
    Log,
    /// The cube selected when the task was created.
    Selected,
    /// First standable cube adjacent to a position.
    NextTo {
        position: Box<Expression>,
    },
    PositionOf {
        unit: Box<Expression>,
    },

    // Boolean-valued.
    IsSolid {
        position: Box<Expression>,
    },
    IsPassable {
        position: Box<Expression>,
    },
    IsFriend {
        unit: Box<Expression>,
    },
    IsEnemy {
        unit: Box<Expression>,
    },
    IsAlive {
        unit: Box<Expression>,
    },
    CarriesItem {
        unit: Box<Expression>,
    },
    Not {
        operand: Box<Expression>,
    },
    And {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Or {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Equals {
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Expression::ReadVariable { name: name.into() }
    }

    pub fn at(cube: CubeCoord) -> Self {
        Expression::LiteralPosition {
            x: cube.x,
            y: cube.y,
            z: cube.z,
        }
    }

    pub fn not(operand: Expression) -> Self {
        Expression::Not {
            operand: Box::new(operand),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum Statement {
    Sequence {
        statements: Vec<Statement>,
    },
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        #[serde(default)]
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    /// Leave the innermost enclosing `While`.
    Break,
    Assign {
        name: String,
        value: Expression,
    },
    Print {
        value: Expression,
    },

    // Actions.
    MoveTo {
        position: Expression,
    },
    MoveToAdjacent {
        dx: i32,
        dy: i32,
        dz: i32,
    },
    Work {
        position: Expression,
    },
    Attack {
        unit: Expression,
    },
    Follow {
        unit: Expression,
    },
    Rest,
}

impl Statement {
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            Statement::MoveTo { .. }
                | Statement::MoveToAdjacent { .. }
                | Statement::Work { .. }
                | Statement::Attack { .. }
                | Statement::Follow { .. }
                | Statement::Rest
        )
    }

    /// True if some `Break` is not enclosed by a `While`.
    pub fn has_stray_break(&self) -> bool {
        match self {
            Statement::Break => true,
            Statement::Sequence { statements } => statements.iter().any(Statement::has_stray_break),
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.has_stray_break()
                    || else_branch.as_ref().is_some_and(|s| s.has_stray_break())
            }
            // A loop body may break freely.
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_loads_from_tagged_json() {
        let json = r#"{
            "node": "While",
            "condition": {"node": "True"},
            "body": {
                "node": "Sequence",
                "statements": [
                    {"node": "MoveTo", "position": {"node": "Workshop"}},
                    {"node": "If",
                     "condition": {"node": "CarriesItem", "unit": {"node": "This"}},
                     "then_branch": {"node": "Break"}},
                    {"node": "Work", "position": {"node": "LiteralPosition", "x": 1, "y": 2, "z": 0}}
                ]
            }
        }"#;
        let program: Statement = serde_json::from_str(json).unwrap();
        let Statement::While { body, .. } = &program else {
            panic!("expected While, got {program:?}");
        };
        let Statement::Sequence { statements } = body.as_ref() else {
            panic!("expected Sequence");
        };
        assert_eq!(statements.len(), 3);
        assert!(statements[0].is_action());
        assert!(matches!(&statements[1], Statement::If { else_branch: None, .. }));
        assert!(!program.has_stray_break());
    }

    #[test]
    fn stray_break_detected() {
        let program = Statement::Sequence {
            statements: vec![Statement::Rest, Statement::Break],
        };
        assert!(program.has_stray_break());
        let nested = Statement::If {
            condition: Expression::True,
            then_branch: Box::new(Statement::Rest),
            else_branch: Some(Box::new(Statement::Break)),
        };
        assert!(nested.has_stray_break());
    }

    #[test]
    fn unknown_node_rejected() {
        let result: Result<Statement, _> = serde_json::from_str(r#"{"node": "Teleport"}"#);
        assert!(result.is_err());
    }
}
