// Player-visible narrative events.
//
// The sim accumulates `SimEvent`s while it runs (spawns, deaths, cave-ins,
// combat, task progress, `Print` output) and hands them to the caller in the
// `StepResult` of the next `advance_time` call. Events raised by direct API
// calls between ticks (e.g. spawning) are delivered with the following step.
//
// See also: `world.rs` for `advance_time`, which drains the buffer.
//
// **Critical constraint: determinism.** Events are appended in processing
// order, which is itself deterministic, so two identical runs produce
// identical event logs.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// A narrative event emitted by the simulation for a UI or log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Simulated time (seconds since world creation) when it happened.
    pub time: f64,
    pub kind: SimEventKind,
}

/// How an attack was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackOutcome {
    Dodged,
    Blocked,
    Hit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    UnitArrived { unit: UnitId, faction: FactionId },
    UnitDied { unit: UnitId },
    /// A disconnected cube caved in, possibly leaving debris behind.
    CaveIn { cube: CubeCoord, debris: Option<ItemKind> },
    UnitAttacked {
        attacker: UnitId,
        defender: UnitId,
        outcome: AttackOutcome,
    },
    TaskCompleted { unit: UnitId, task: TaskId },
    TaskFailed { unit: UnitId, task: TaskId, reason: String },
    /// Output of a `Print` statement.
    TaskPrinted { unit: UnitId, task: TaskId, text: String },
}

/// Output of one `advance_time` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub events: Vec<SimEvent>,
}

impl StepResult {
    pub fn cave_ins(&self) -> impl Iterator<Item = CubeCoord> + '_ {
        self.events.iter().filter_map(|e| match e.kind {
            SimEventKind::CaveIn { cube, .. } => Some(cube),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_result_serializes() {
        let result = StepResult {
            events: vec![
                SimEvent {
                    time: 0.5,
                    kind: SimEventKind::CaveIn {
                        cube: CubeCoord::new(1, 2, 3),
                        debris: Some(ItemKind::Boulder),
                    },
                },
                SimEvent {
                    time: 0.5,
                    kind: SimEventKind::UnitDied { unit: UnitId(4) },
                },
            ],
        };
        let json = serde_json::to_string(&result).unwrap();
        let restored: StepResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, result);
        assert_eq!(restored.cave_ins().collect::<Vec<_>>(), vec![CubeCoord::new(1, 2, 3)]);
    }
}
