// What an idle unit does next.
//
// `take_turn` is called by `advance_unit` whenever a unit is idle with time
// left in the tick. A unit with a task runs its interpreter; a unit without
// one, if default behaviour is enabled, rests when it is overdue, claims the
// best available task of its faction, or picks a random default action.
//
// Task completion and failure are settled here: a completed task leaves its
// scheduler, a failed one goes back to the pool with reduced priority and
// the fault recorded. Neither aborts the tick, but a unit whose task failed
// sits out the rest of it.
//
// See also: `task/exec.rs` for the interpreter, `physics.rs` for actions.

use crate::error::TaskFault;
use crate::event::SimEventKind;
use crate::task::exec::{RunOutcome, run};
use crate::types::*;
use crate::unit::Activity;
use crate::world::World;
use tracing::{debug, warn};

impl World {
    /// Decide the unit's next step. Returns `true` if the unit may make
    /// further progress within this tick.
    pub(crate) fn take_turn(&mut self, id: UnitId, fuel: &mut u32) -> bool {
        let Some(unit) = self.units.get_mut(&id) else {
            return false;
        };
        if let Some(mut ctx) = unit.context.take() {
            let task = ctx.task();
            return match run(self, &mut ctx, fuel) {
                RunOutcome::Suspended => {
                    let busy = self.units.get_mut(&id).is_some_and(|u| {
                        u.context = Some(ctx);
                        u.activity != Activity::Idle
                    });
                    busy
                }
                RunOutcome::Yielded => {
                    if let Some(u) = self.units.get_mut(&id) {
                        u.context = Some(ctx);
                    }
                    false
                }
                RunOutcome::Completed => {
                    self.complete_task(id, task);
                    true
                }
                RunOutcome::Failed(fault) => {
                    // No retry within the same tick.
                    self.fail_task(id, task, fault);
                    false
                }
            };
        }

        if !unit.default_behavior {
            return false;
        }
        if unit.since_rest >= self.config.auto_rest_interval {
            return self.rest(id).is_ok();
        }
        let best = unit
            .faction
            .and_then(|f| self.factions.get(&f))
            .and_then(|f| f.scheduler().best_available_task());
        if let Some(task) = best
            && self.assign_task(id, task).unwrap_or(false)
        {
            return true;
        }
        self.choose_default_action(id)
    }

    fn complete_task(&mut self, id: UnitId, task: TaskId) {
        let faction = self.units.get_mut(&id).and_then(|u| {
            u.task = None;
            u.faction
        });
        if let Some(f) = faction.and_then(|f| self.factions.get_mut(&f)) {
            f.scheduler.remove_task(task);
        }
        self.mark_task_completed(task);
        debug!(unit = %id, %task, "task completed");
        self.push_event(SimEventKind::TaskCompleted { unit: id, task });
    }

    fn fail_task(&mut self, id: UnitId, task: TaskId, fault: TaskFault) {
        warn!(unit = %id, %task, %fault, "task failed");
        let faction = self.units.get_mut(&id).and_then(|u| {
            u.task = None;
            u.faction
        });
        let penalty = self.config.failed_task_priority_penalty;
        if let Some(f) = faction.and_then(|f| self.factions.get_mut(&f)) {
            f.scheduler.release(task, Some((fault.clone(), penalty)));
        }
        self.push_event(SimEventKind::TaskFailed {
            unit: id,
            task,
            reason: fault.to_string(),
        });
    }

    /// Pick uniformly among walking somewhere, working nearby, resting, and
    /// attacking an adjacent enemy when there is one.
    fn choose_default_action(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.get(&id) else {
            return false;
        };
        let here = unit.cube();
        let enemies: Vec<UnitId> = self
            .units
            .values()
            .filter(|other| {
                other.faction().is_some()
                    && other.faction() != unit.faction()
                    && other.cube().is_adjacent_or_same(here)
            })
            .map(|other| other.id())
            .collect();
        let choices = if enemies.is_empty() { 3 } else { 4 };

        match self.rng.range_usize(0, choices) {
            0 => {
                let Some(goal) = self.random_standable_cube() else {
                    return false;
                };
                if self.move_to(id, goal).is_err() {
                    return false;
                }
                if self.rng.random_bool(0.5) {
                    // Refused when out of stamina.
                    let _ = self.start_sprinting(id);
                }
                true
            }
            1 => {
                let reachable: Vec<CubeCoord> = std::iter::once(here)
                    .chain(here.neighbors())
                    .filter(|&c| self.grid.in_bounds(c))
                    .collect();
                match self.rng.choose(&reachable) {
                    Some(&target) => self.work_at(id, target).is_ok(),
                    None => false,
                }
            }
            2 => self.rest(id).is_ok(),
            _ => match self.rng.choose(&enemies) {
                Some(&enemy) => self.attack(id, enemy).is_ok(),
                None => false,
            },
        }
    }
}
