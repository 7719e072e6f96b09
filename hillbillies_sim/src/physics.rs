// Unit actions and per-tick physics.
//
// The public action methods (`move_to_adjacent`, `move_to`, `follow`,
// `work_at`, `attack`, `rest`, sprinting) validate their arguments and set
// the unit's `Activity`; they never advance time. `advance_unit` then spends
// each tick's elapsed time on that activity, and whenever the activity ends
// early, hands the leftover time to `behavior.rs` so the unit can start its
// next statement or default action in the same tick.
//
// ## Movement
//
// A step moves the unit in a straight line from its current position to the
// centre of an adjacent cube at the speed given by the speed law. Arrival
// snaps to the centre when the remaining time is within `EPS`, so a step
// split across several ticks ends exactly where a single long tick would.
// `move_to` and `follow` re-plan with A* after every step.
//
// ## Falling
//
// Units and free items fall when the cube below them is not solid. A unit
// is only checked for support between steps, never in the middle of one.
// A fall suspends the current activity and restores it on landing, after
// applying `fall_damage_per_level` per cube fallen.
//
// ## Work
//
// The effect of work is decided when the work completes, first matching
// rule wins: drop the carried item, consume a boulder and a log at a
// workshop, pick up a boulder, pick up a log, fell a tree, break a rock.
// Pickup ownership is first come, first served at completion time.
//
// See also: `behavior.rs` for the turn logic, `pathfinding.rs` for A*,
// `unit.rs` for the formulas.
//
// **Critical constraint: determinism.** Combat trials, dodge destinations
// and attribute gains draw from the world's `GameRng` in a fixed order.

use crate::error::SimError;
use crate::event::{AttackOutcome, SimEventKind};
use crate::grid::Grid;
use crate::item::Item;
use crate::pathfinding::{Reach, astar};
use crate::types::*;
use crate::unit::{ActionOutcome, Activity, Unit};
use crate::world::World;
use tracing::{debug, info};

/// Time tolerance for arrivals and timers.
pub(crate) const EPS: f64 = 1e-9;

/// Consecutive turns a unit may take in one tick without spending time or
/// statement fuel before the rest of its tick is given up.
const MAX_STALLED_TURNS: usize = 64;

/// Lower `position` by at most `max_drop` towards the centre of the first
/// standable cube at or below it. Returns the new position and, once landed,
/// the distance actually fallen.
pub(crate) fn descend(grid: &Grid, position: Position, max_drop: f64) -> (Position, Option<f64>) {
    let mut cube = CubeCoord::of(position);
    while cube.z > 0 && !grid.is_standable(cube) {
        cube = cube.below();
    }
    let floor = cube.center().z.min(position.z);
    let drop = position.z - floor;
    if drop <= max_drop + EPS {
        (Position::new(position.x, position.y, floor), Some(drop))
    } else {
        (
            Position::new(position.x, position.y, position.z - max_drop),
            None,
        )
    }
}

fn is_hostile(a: &Unit, b: &Unit) -> bool {
    matches!((a.faction(), b.faction()), (Some(x), Some(y)) if x != y)
}

fn mid_step(activity: &Activity) -> bool {
    matches!(
        activity,
        Activity::Move { step: Some(_), .. } | Activity::Follow { step: Some(_), .. }
    )
}

impl World {
    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// The unit if it may start a new action.
    fn actor(&self, id: UnitId) -> Result<&Unit, SimError> {
        let unit = self
            .units
            .get(&id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        if matches!(unit.activity, Activity::Falling { .. }) {
            return Err(SimError::IllegalAction(format!("{id} is falling")));
        }
        Ok(unit)
    }

    fn not_mid_step(&self, id: UnitId) -> Result<&Unit, SimError> {
        let unit = self.actor(id)?;
        if mid_step(&unit.activity) {
            return Err(SimError::IllegalAction(format!("{id} is between two cubes")));
        }
        Ok(unit)
    }

    fn begin(&mut self, id: UnitId, activity: Activity) {
        if let Some(unit) = self.units.get_mut(&id) {
            if !activity.is_moving() {
                unit.sprinting = false;
            }
            unit.activity = activity;
            unit.action_result = None;
        }
    }

    /// Step into one of the 26 neighbouring cubes.
    pub fn move_to_adjacent(&mut self, id: UnitId, dx: i32, dy: i32, dz: i32) -> Result<(), SimError> {
        let deltas = [dx, dy, dz];
        if deltas.iter().any(|d| !(-1..=1).contains(d)) || deltas == [0, 0, 0] {
            return Err(SimError::IllegalAction(format!(
                "({dx}, {dy}, {dz}) is not an adjacent offset"
            )));
        }
        let target = self.not_mid_step(id)?.cube().offset(dx, dy, dz);
        if !self.grid.is_passable(target)? {
            return Err(SimError::IllegalAction(format!("cube {target} is not passable")));
        }
        self.begin(
            id,
            Activity::Move {
                step: Some(target),
                destination: None,
            },
        );
        if let Some(unit) = self.units.get_mut(&id) {
            unit.face_towards(target.center());
        }
        Ok(())
    }

    /// Walk to a standable cube along the cheapest path. A step already in
    /// progress is finished first.
    pub fn move_to(&mut self, id: UnitId, goal: CubeCoord) -> Result<(), SimError> {
        let unit = self.actor(id)?;
        self.grid.terrain_at(goal)?;
        if !self.grid.is_standable(goal) {
            return Err(SimError::IllegalAction(format!("cube {goal} is not standable")));
        }
        let step = match unit.activity {
            Activity::Move { step, .. } | Activity::Follow { step, .. } => step,
            _ => None,
        };
        let from = step.unwrap_or_else(|| unit.cube());
        if astar(&self.grid, from, goal, Reach::Exact).is_none() {
            return Err(SimError::IllegalAction(format!("no path to {goal}")));
        }
        self.begin(
            id,
            Activity::Move {
                step,
                destination: Some(goal),
            },
        );
        Ok(())
    }

    /// Walk towards another unit until standing next to it.
    pub fn follow(&mut self, id: UnitId, target: UnitId) -> Result<(), SimError> {
        self.not_mid_step(id)?;
        if id == target {
            return Err(SimError::IllegalAction(format!("{id} cannot follow itself")));
        }
        if !self.units.contains_key(&target) {
            return Err(SimError::UnknownEntity(target.to_string()));
        }
        self.begin(id, Activity::Follow { target, step: None });
        Ok(())
    }

    /// Work at the unit's own cube or a neighbouring one.
    pub fn work_at(&mut self, id: UnitId, target: CubeCoord) -> Result<(), SimError> {
        let unit = self.not_mid_step(id)?;
        self.grid.terrain_at(target)?;
        if !unit.cube().is_adjacent_or_same(target) {
            return Err(SimError::IllegalAction(format!("cube {target} is out of reach")));
        }
        let remaining = self.config.work_time_factor / unit.attributes.strength as f64;
        self.begin(id, Activity::Work { target, remaining });
        if let Some(unit) = self.units.get_mut(&id) {
            unit.face_towards(target.center());
        }
        Ok(())
    }

    /// Attack a hostile unit in the same or a neighbouring cube. The
    /// exchange is resolved immediately; the attacker then spends
    /// `attack_duration` recovering.
    pub fn attack(&mut self, id: UnitId, target: UnitId) -> Result<(), SimError> {
        let attacker = self.not_mid_step(id)?;
        let defender = self
            .units
            .get(&target)
            .ok_or_else(|| SimError::UnknownEntity(target.to_string()))?;
        if !is_hostile(attacker, defender) {
            return Err(SimError::IllegalAction(format!("{target} is not hostile to {id}")));
        }
        if !attacker.cube().is_adjacent_or_same(defender.cube()) {
            return Err(SimError::IllegalAction(format!("{target} is out of reach")));
        }
        self.begin(
            id,
            Activity::Attack {
                target,
                remaining: self.config.attack_duration,
            },
        );
        self.resolve_attack(id, target);
        Ok(())
    }

    fn resolve_attack(&mut self, id: UnitId, target: UnitId) {
        let (Some(attacker), Some(defender)) = (self.units.get(&id), self.units.get(&target)) else {
            return;
        };
        let (a, d) = (attacker.attributes, defender.attributes);
        let (attacker_pos, defender_pos) = (attacker.position, defender.position);
        let defender_cube = defender.cube();
        if let Some(u) = self.units.get_mut(&id) {
            u.face_towards(defender_pos);
        }
        if let Some(u) = self.units.get_mut(&target) {
            u.face_towards(attacker_pos);
            if matches!(u.activity, Activity::Rest { .. }) {
                u.activity = Activity::Idle;
                u.action_result = Some(ActionOutcome::Completed);
            }
        }

        let dodge = self.config.dodge_factor * d.agility as f64 / a.agility as f64;
        let block = self.config.block_factor * (d.strength + d.agility) as f64
            / (a.strength + a.agility) as f64;
        let outcome = if self.rng.random_bool(dodge) {
            let escapes: Vec<CubeCoord> = defender_cube
                .neighbors()
                .filter(|&c| self.grid.is_standable(c))
                .collect();
            if let Some(&cube) = self.rng.choose(&escapes) {
                self.knock_to(target, cube);
            }
            AttackOutcome::Dodged
        } else if self.rng.random_bool(block) {
            AttackOutcome::Blocked
        } else {
            AttackOutcome::Hit
        };

        let winner = if outcome == AttackOutcome::Hit { id } else { target };
        let xp = self.config.experience_per_combat;
        if let Some(u) = self.units.get_mut(&winner) {
            u.gain_experience(xp, &mut self.rng, &self.config);
        }
        debug!(attacker = %id, defender = %target, ?outcome, "attack");
        self.push_event(SimEventKind::UnitAttacked {
            attacker: id,
            defender: target,
            outcome,
        });
        if outcome == AttackOutcome::Hit {
            let damage = (a.strength as i32 / self.config.damage_divisor.max(1)) as f64;
            self.damage_unit(target, damage);
        }
    }

    /// Move a dodging unit to another cube. A walk in progress continues
    /// from there.
    fn knock_to(&mut self, id: UnitId, cube: CubeCoord) {
        self.relocate_unit(id, cube.center());
        if let Some(unit) = self.units.get_mut(&id) {
            match &mut unit.activity {
                Activity::Move { step, destination } => {
                    if destination.is_none() {
                        *destination = *step;
                    }
                    *step = None;
                }
                Activity::Follow { step, .. } => *step = None,
                _ => {}
            }
        }
    }

    /// Start resting. Resting also resets the automatic rest clock.
    pub fn rest(&mut self, id: UnitId) -> Result<(), SimError> {
        self.not_mid_step(id)?;
        self.begin(id, Activity::Rest { clock: 0.0 });
        if let Some(unit) = self.units.get_mut(&id) {
            unit.since_rest = 0.0;
        }
        Ok(())
    }

    pub fn start_sprinting(&mut self, id: UnitId) -> Result<(), SimError> {
        let unit = self.actor(id)?;
        if !unit.activity.is_moving() || unit.stamina <= 0.0 {
            return Err(SimError::IllegalAction(format!("{id} cannot sprint now")));
        }
        if let Some(unit) = self.units.get_mut(&id) {
            unit.sprinting = true;
        }
        Ok(())
    }

    pub fn stop_sprinting(&mut self, id: UnitId) -> Result<(), SimError> {
        let unit = self
            .units
            .get_mut(&id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        unit.sprinting = false;
        Ok(())
    }

    pub fn set_default_behavior(&mut self, id: UnitId, enabled: bool) -> Result<(), SimError> {
        let unit = self
            .units
            .get_mut(&id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        unit.default_behavior = enabled;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Spend `dt` seconds on one unit: its activity first, then, whenever it
    /// becomes idle with time left, its next turn.
    pub(crate) fn advance_unit(&mut self, id: UnitId, dt: f64) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        unit.since_rest += dt;
        let mut fuel = self.config.max_statements_per_tick;
        let mut budget = dt;
        let mut stalled = 0;
        while stalled < MAX_STALLED_TURNS {
            let Some(left) = self.advance_activity(id, budget) else {
                return;
            };
            let fuel_before = fuel;
            if !self.take_turn(id, &mut fuel) {
                return;
            }
            if left < budget - EPS || fuel < fuel_before {
                stalled = 0;
            } else {
                stalled += 1;
            }
            budget = left;
        }
        debug!(unit = %id, budget, "turns stalled; rest of tick dropped");
    }

    /// Spend up to `dt` on the unit's activity. Returns the unused time once
    /// the unit is idle, `None` when the activity used all of it or the unit
    /// is gone.
    fn advance_activity(&mut self, id: UnitId, dt: f64) -> Option<f64> {
        let mut budget = dt;
        loop {
            let unit = self.units.get(&id)?;
            let activity = unit.activity.clone();
            let unsupported = unit.cube().z > 0 && !self.grid.is_solid(unit.cube().below());
            let falling = matches!(activity, Activity::Falling { .. });
            if unsupported && !falling && !mid_step(&activity) {
                self.start_fall(id);
                continue;
            }
            budget = match activity {
                Activity::Idle => return Some(budget),
                Activity::Move { step: Some(step), destination } => {
                    let left = self.advance_step(id, step, budget)?;
                    self.set_activity(id, Activity::Move { step: None, destination });
                    if destination.is_none() {
                        self.finish(id, ActionOutcome::Completed);
                    }
                    left
                }
                Activity::Move { step: None, destination } => {
                    self.plan_move(id, destination);
                    budget
                }
                Activity::Follow { target, step: Some(step) } => {
                    let left = self.advance_step(id, step, budget)?;
                    self.set_activity(id, Activity::Follow { target, step: None });
                    left
                }
                Activity::Follow { target, step: None } => {
                    self.plan_follow(id, target);
                    budget
                }
                Activity::Work { target, remaining } => {
                    if remaining > budget + EPS {
                        self.set_activity(id, Activity::Work { target, remaining: remaining - budget });
                        return None;
                    }
                    let outcome = self.complete_work(id, target);
                    self.finish(id, outcome);
                    (budget - remaining).max(0.0)
                }
                Activity::Attack { target, remaining } => {
                    if remaining > budget + EPS {
                        self.set_activity(id, Activity::Attack { target, remaining: remaining - budget });
                        return None;
                    }
                    self.finish(id, ActionOutcome::Completed);
                    (budget - remaining).max(0.0)
                }
                Activity::Rest { mut clock } => {
                    let unit = self.units.get_mut(&id)?;
                    let left = unit.advance_rest(&mut clock, budget, &self.config);
                    unit.activity = Activity::Rest { clock };
                    let left = left?;
                    self.finish(id, ActionOutcome::Completed);
                    left
                }
                Activity::Falling { from_z } => self.advance_fall(id, from_z, budget)?,
            };
        }
    }

    fn set_activity(&mut self, id: UnitId, activity: Activity) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.activity = activity;
        }
    }

    /// End the current action and record how it went.
    fn finish(&mut self, id: UnitId, outcome: ActionOutcome) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.activity = Activity::Idle;
            unit.sprinting = false;
            unit.sprint_clock = 0.0;
            unit.action_result = Some(outcome);
        }
    }

    /// Walk towards the centre of `step`. Returns the unused time on arrival.
    /// A sprint that runs out of stamina part way finishes at walking speed.
    fn advance_step(&mut self, id: UnitId, step: CubeCoord, budget: f64) -> Option<f64> {
        let target = step.center();
        let mut budget = budget;
        loop {
            let unit = self.units.get_mut(&id)?;
            let sprint_left = unit.sprint_time_left(&self.config);
            if sprint_left <= EPS && unit.sprinting {
                unit.sprinting = false;
                unit.sprint_clock = 0.0;
                continue;
            }
            let speed = unit.current_speed(&self.config);
            let position = unit.position;
            let distance = position.distance_to(target);
            let needed = if speed > 0.0 { distance / speed } else { f64::INFINITY };
            let slice = budget.min(sprint_left);

            if needed <= slice + EPS {
                let spent = needed.min(budget);
                let xp = self.config.experience_per_move;
                unit.drain_sprint(spent, &self.config);
                unit.gain_experience(xp, &mut self.rng, &self.config);
                self.relocate_unit(id, target);
                return Some((budget - needed).max(0.0));
            }
            unit.drain_sprint(slice, &self.config);
            let next = position + (target - position) * (speed * slice / distance);
            self.relocate_unit(id, next);
            budget -= slice;
            if budget <= EPS {
                return None;
            }
        }
    }

    fn plan_move(&mut self, id: UnitId, destination: Option<CubeCoord>) {
        let Some(unit) = self.units.get(&id) else {
            return;
        };
        let here = unit.cube();
        let Some(goal) = destination.filter(|&g| g != here) else {
            self.finish(id, ActionOutcome::Completed);
            return;
        };
        match astar(&self.grid, here, goal, Reach::Exact).and_then(|p| p.first_step()) {
            Some(step) => self.take_step(id, step, Activity::Move {
                step: Some(step),
                destination,
            }),
            None => self.finish(id, ActionOutcome::Failed(format!("no path to {goal}"))),
        }
    }

    fn plan_follow(&mut self, id: UnitId, target: UnitId) {
        let (Some(unit), Some(leader)) = (self.units.get(&id), self.units.get(&target)) else {
            self.finish(id, ActionOutcome::Failed(format!("{target} is gone")));
            return;
        };
        let (here, there) = (unit.cube(), leader.cube());
        if here.is_adjacent_or_same(there) {
            self.finish(id, ActionOutcome::Completed);
            return;
        }
        match astar(&self.grid, here, there, Reach::Adjacent).and_then(|p| p.first_step()) {
            Some(step) => self.take_step(id, step, Activity::Follow {
                target,
                step: Some(step),
            }),
            None => self.finish(id, ActionOutcome::Failed(format!("cannot reach {target}"))),
        }
    }

    fn take_step(&mut self, id: UnitId, step: CubeCoord, activity: Activity) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.face_towards(step.center());
            unit.activity = activity;
        }
    }

    // -----------------------------------------------------------------------
    // Falling and damage
    // -----------------------------------------------------------------------

    fn start_fall(&mut self, id: UnitId) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let from_z = unit.cube().z;
        let previous = std::mem::replace(&mut unit.activity, Activity::Falling { from_z });
        if previous != Activity::Idle {
            unit.interrupted = Some(previous);
        }
        unit.sprinting = false;
        debug!(unit = %id, cube = %unit.cube(), "falling");
    }

    /// Returns the unused time once the unit has landed.
    fn advance_fall(&mut self, id: UnitId, from_z: i32, budget: f64) -> Option<f64> {
        let unit = self.units.get(&id)?;
        let max_drop = self.config.fall_speed * budget;
        let (next, landed) = descend(&self.grid, unit.position, max_drop);
        self.relocate_unit(id, next);
        let dropped = landed?;
        let levels = from_z - CubeCoord::of(next).z;
        let damage = (levels.max(0) * self.config.fall_damage_per_level) as f64;
        let unit = self.units.get_mut(&id)?;
        unit.activity = unit.interrupted.take().unwrap_or(Activity::Idle);
        self.damage_unit(id, damage);
        Some((budget - dropped / self.config.fall_speed).max(0.0))
    }

    fn damage_unit(&mut self, id: UnitId, damage: f64) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        unit.hitpoints -= damage;
        if unit.hitpoints <= 0.0 {
            unit.hitpoints = 0.0;
            self.kill_unit(id);
        }
    }

    fn kill_unit(&mut self, id: UnitId) {
        if let Ok(unit) = self.detach_unit(id) {
            info!(unit = %id, name = unit.name(), "unit died");
            self.push_event(SimEventKind::UnitDied { unit: id });
        }
    }

    // -----------------------------------------------------------------------
    // Work
    // -----------------------------------------------------------------------

    fn complete_work(&mut self, id: UnitId, target: CubeCoord) -> ActionOutcome {
        let in_reach = self
            .units
            .get(&id)
            .is_some_and(|u| u.cube().is_adjacent_or_same(target));
        if !in_reach {
            return ActionOutcome::Failed(format!("cube {target} is out of reach"));
        }
        match self.apply_work(id, target) {
            Ok(effect) => {
                if effect {
                    let xp = self.config.experience_per_work;
                    if let Some(unit) = self.units.get_mut(&id) {
                        unit.gain_experience(xp, &mut self.rng, &self.config);
                    }
                }
                ActionOutcome::Completed
            }
            Err(e) => ActionOutcome::Failed(e.to_string()),
        }
    }

    /// Apply the first matching work rule. Returns whether anything changed.
    fn apply_work(&mut self, id: UnitId, target: CubeCoord) -> Result<bool, SimError> {
        let terrain = self.grid.terrain_at(target)?;
        let carried = self.units.get(&id).and_then(|u| u.carried);

        if let Some(item) = carried {
            if !terrain.is_passable() {
                return Err(SimError::IllegalAction(format!("cannot drop into {target}")));
            }
            if let Some(unit) = self.units.get_mut(&id) {
                unit.carried = None;
                unit.carried_weight = 0;
            }
            if let Some(it) = self.items.get_mut(&item) {
                it.carrier = None;
            }
            self.relocate_item(item, target.center());
            return Ok(true);
        }

        let free = |kind: ItemKind| {
            self.spatial
                .entities_at(target)
                .iter()
                .filter_map(|e| match *e {
                    EntityRef::Boulder(i) | EntityRef::Log(i) => self.items.get(&i),
                    EntityRef::Unit(_) => None,
                })
                .find(|it| it.kind() == kind && !it.is_carried())
                .map(Item::id)
        };
        let (boulder, log) = (free(ItemKind::Boulder), free(ItemKind::Log));

        if terrain == TerrainType::Workshop
            && let (Some(b), Some(l)) = (boulder, log)
        {
            self.remove_item(b);
            self.remove_item(l);
            if let Some(unit) = self.units.get_mut(&id) {
                unit.improve_at_workshop();
            }
            return Ok(true);
        }
        if let Some(item) = boulder.or(log) {
            self.pick_up(id, item);
            return Ok(true);
        }
        let debris = match terrain {
            TerrainType::Tree => ItemKind::Log,
            TerrainType::Rock => ItemKind::Boulder,
            _ => return Ok(false),
        };
        self.set_terrain_at(target, TerrainType::Air)?;
        self.spawn_item(debris, target.center());
        Ok(true)
    }

    fn pick_up(&mut self, id: UnitId, item: ItemId) {
        let Some(it) = self.items.get_mut(&item) else {
            return;
        };
        it.carrier = Some(id);
        let weight = it.weight();
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        unit.carried = Some(item);
        unit.carried_weight = weight;
        let position = unit.position;
        self.relocate_item(item, position);
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Free items fall towards the nearest standable cube below them.
    pub(crate) fn advance_item(&mut self, id: ItemId, dt: f64) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        if item.is_carried() {
            return;
        }
        let (next, _) = descend(&self.grid, item.position(), self.config.fall_speed * dt);
        if next != item.position() {
            self.relocate_item(id, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::NullListener;
    use crate::unit::Attributes;

    const ATTRS: Attributes = Attributes {
        strength: 50,
        agility: 50,
        toughness: 50,
        weight: 50,
    };

    /// 6x6x6 world with a rock floor at z = 0.
    fn floor_world() -> World {
        let mut codes = vec![vec![vec![0; 6]; 6]; 6];
        for column in codes.iter_mut().flatten() {
            column[0] = 1;
        }
        World::new(&codes, Box::new(NullListener), 9).unwrap()
    }

    fn add(world: &mut World, name: &str, cube: CubeCoord) -> UnitId {
        world.add_unit(name, cube, ATTRS, false).unwrap().unwrap()
    }

    #[test]
    fn descend_stops_on_standable_centre() {
        let world = floor_world();
        let start = CubeCoord::new(2, 2, 4).center();
        let (pos, landed) = descend(world.grid(), start, 1.0);
        assert_eq!(landed, None);
        assert!((pos.z - 3.5).abs() < 1e-12);
        let (pos, landed) = descend(world.grid(), start, 10.0);
        assert_eq!(landed, Some(3.0));
        assert_eq!(pos, CubeCoord::new(2, 2, 1).center());
    }

    #[test]
    fn adjacent_move_takes_distance_over_speed() {
        let mut world = floor_world();
        let id = add(&mut world, "Walker", CubeCoord::new(1, 1, 1));
        world.move_to_adjacent(id, 1, 0, 0).unwrap();
        assert_eq!(world.unit(id).unwrap().status(), Status::Moving);
        // Base speed 1.5: one cube takes 2/3 s.
        world.advance_time(0.5).unwrap();
        assert_eq!(world.unit(id).unwrap().status(), Status::Moving);
        world.advance_time(0.2).unwrap();
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.status(), Status::Idle);
        assert_eq!(unit.position(), CubeCoord::new(2, 1, 1).center());
        assert_eq!(unit.experience(), 1);
        assert_eq!(unit.orientation(), 0.0);
    }

    #[test]
    fn bad_moves_rejected() {
        let mut world = floor_world();
        let id = add(&mut world, "Walker", CubeCoord::new(0, 0, 1));
        assert!(matches!(world.move_to_adjacent(id, 2, 0, 0), Err(SimError::IllegalAction(_))));
        assert!(matches!(world.move_to_adjacent(id, 0, 0, 0), Err(SimError::IllegalAction(_))));
        assert!(matches!(world.move_to_adjacent(id, -1, 0, 0), Err(SimError::OutOfBounds { .. })));
        assert!(matches!(world.move_to_adjacent(id, 0, 0, -1), Err(SimError::IllegalAction(_))));
        world.move_to_adjacent(id, 1, 0, 0).unwrap();
        world.advance_time(0.1).unwrap();
        assert!(world.move_to_adjacent(id, 1, 0, 0).is_err());
        assert!(world.work_at(id, CubeCoord::new(0, 0, 0)).is_err());
    }

    #[test]
    fn move_to_walks_the_whole_path() {
        let mut world = floor_world();
        let id = add(&mut world, "Walker", CubeCoord::new(0, 0, 1));
        let goal = CubeCoord::new(4, 3, 1);
        world.move_to(id, goal).unwrap();
        for _ in 0..100 {
            world.advance_time(0.1).unwrap();
        }
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.cube(), goal);
        assert_eq!(unit.status(), Status::Idle);
        assert!(world.move_to(id, CubeCoord::new(2, 2, 3)).is_err());
    }

    #[test]
    fn sprint_requires_movement_and_stops_at_zero_stamina() {
        let mut world = floor_world();
        let id = add(&mut world, "Runner", CubeCoord::new(0, 0, 1));
        assert!(world.start_sprinting(id).is_err());
        world.move_to(id, CubeCoord::new(5, 5, 1)).unwrap();
        world.start_sprinting(id).unwrap();
        world.units.get_mut(&id).unwrap().stamina = 0.5;
        world.advance_time(0.2).unwrap();
        let unit = world.unit(id).unwrap();
        assert!(!unit.is_sprinting());
        assert_eq!(unit.stamina(), 0.0);
    }

    #[test]
    fn unit_falls_and_takes_damage() {
        let mut world = floor_world();
        let id = add(&mut world, "Faller", CubeCoord::new(2, 2, 4));
        world.advance_time(0.01).unwrap();
        assert_eq!(world.unit(id).unwrap().status(), Status::Falling);
        assert!(world.rest(id).is_err());
        for _ in 0..20 {
            world.advance_time(0.1).unwrap();
        }
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.cube(), CubeCoord::new(2, 2, 1));
        assert_eq!(unit.status(), Status::Idle);
        assert_eq!(unit.hitpoints(), 50.0 - 30.0);
    }

    #[test]
    fn fatal_fall_kills() {
        let mut world = floor_world();
        let id = add(&mut world, "Faller", CubeCoord::new(2, 2, 5));
        world.units.get_mut(&id).unwrap().hitpoints = 5.0;
        let mut died = false;
        for _ in 0..30 {
            let step = world.advance_time(0.1).unwrap();
            died |= step
                .events
                .iter()
                .any(|e| e.kind == SimEventKind::UnitDied { unit: id });
        }
        assert!(died);
        assert!(world.unit(id).is_none());
    }

    #[test]
    fn fall_resumes_interrupted_work() {
        let mut world = floor_world();
        world.set_terrain_at(CubeCoord::new(2, 2, 1), TerrainType::Rock).unwrap();
        let id = add(&mut world, "Digger", CubeCoord::new(2, 2, 2));
        world.work_at(id, CubeCoord::new(2, 2, 2)).unwrap();
        world.set_terrain_at(CubeCoord::new(2, 2, 1), TerrainType::Air).unwrap();
        world.advance_time(0.01).unwrap();
        assert_eq!(world.unit(id).unwrap().status(), Status::Falling);
        for _ in 0..10 {
            world.advance_time(0.1).unwrap();
        }
        // Landed one level lower, so (2, 2, 2) is still within reach.
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.status(), Status::Working);
        assert_eq!(unit.hitpoints(), 40.0);
    }

    #[test]
    fn work_breaks_rock_then_carries_boulder() {
        let config = SimConfig {
            item_weight_range: (20, 20),
            ..SimConfig::default()
        };
        let mut codes = vec![vec![vec![0; 4]; 4]; 4];
        for column in codes.iter_mut().flatten() {
            column[0] = 1;
        }
        codes[2][1][1] = 1;
        let mut world = World::with_config(&codes, Box::new(NullListener), 4, config).unwrap();
        let id = add(&mut world, "Miner", CubeCoord::new(1, 1, 1));
        let rock = CubeCoord::new(2, 1, 1);

        // 500 / 50 = 10 s per job.
        world.work_at(id, rock).unwrap();
        world.advance_time(9.9).unwrap();
        assert_eq!(world.terrain_at(rock), Ok(TerrainType::Rock));
        world.advance_time(0.2).unwrap();
        assert_eq!(world.terrain_at(rock), Ok(TerrainType::Air));
        assert_eq!(world.boulders().count(), 1);
        assert_eq!(world.unit(id).unwrap().experience(), 10);

        world.work_at(id, rock).unwrap();
        world.advance_time(10.0).unwrap();
        let unit = world.unit(id).unwrap();
        let boulder = unit.carried_item().unwrap();
        assert_eq!(world.item(boulder).unwrap().carrier(), Some(id));
        assert_eq!(unit.effective_weight(), 70);

        world.work_at(id, CubeCoord::new(1, 2, 1)).unwrap();
        world.advance_time(10.0).unwrap();
        assert_eq!(world.unit(id).unwrap().carried_item(), None);
        assert_eq!(world.item(boulder).unwrap().cube(), CubeCoord::new(1, 2, 1));
    }

    #[test]
    fn workshop_consumes_boulder_and_log() {
        let mut codes = vec![vec![vec![0; 4]; 4]; 4];
        for column in codes.iter_mut().flatten() {
            column[0] = 1;
        }
        codes[1][1][1] = 3;
        let mut world = World::new(&codes, Box::new(NullListener), 4).unwrap();
        let shop = CubeCoord::new(1, 1, 1);
        world.add_boulder(shop).unwrap();
        world.add_log(shop).unwrap();
        let id = add(&mut world, "Smith", CubeCoord::new(2, 1, 1));
        world.work_at(id, shop).unwrap();
        world.advance_time(10.0).unwrap();
        // The work experience may raise toughness once more.
        let a = world.unit(id).unwrap().attributes();
        assert_eq!(a.weight, 51);
        assert!((51..=52).contains(&a.toughness));
        assert_eq!(world.items().count(), 0);
    }

    #[test]
    fn attack_requires_hostile_neighbour() {
        let mut world = floor_world();
        let a = add(&mut world, "Alpha", CubeCoord::new(1, 1, 1));
        let b = add(&mut world, "Bravo", CubeCoord::new(2, 1, 1));
        let far = add(&mut world, "Far", CubeCoord::new(5, 5, 1));
        assert!(world.attack(a, far).is_err());
        assert!(world.attack(a, a).is_err());
        world.join_faction(b, world.unit(a).unwrap().faction().unwrap()).unwrap();
        assert!(world.attack(a, b).is_err());
    }

    #[test]
    fn attack_resolves_once_and_recovers() {
        let mut world = floor_world();
        let a = add(&mut world, "Alpha", CubeCoord::new(1, 1, 1));
        let b = add(&mut world, "Bravo", CubeCoord::new(2, 1, 1));
        world.rest(b).unwrap();
        world.attack(a, b).unwrap();
        let attacks = world
            .events
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::UnitAttacked { .. }))
            .count();
        assert_eq!(attacks, 1);
        assert_ne!(world.unit(b).unwrap().status(), Status::Resting);
        assert_eq!(world.unit(a).unwrap().status(), Status::Attacking);
        let total_xp = world.unit(a).unwrap().experience() + world.unit(b).unwrap().experience();
        assert_eq!(total_xp, 20);
        world.advance_time(1.0).unwrap();
        assert_eq!(world.unit(a).unwrap().status(), Status::Idle);
    }

    #[test]
    fn dropped_item_falls_to_the_floor() {
        let mut world = floor_world();
        let boulder = world.add_boulder(CubeCoord::new(3, 3, 4)).unwrap();
        for _ in 0..20 {
            world.advance_time(0.1).unwrap();
        }
        assert_eq!(world.item(boulder).unwrap().position(), CubeCoord::new(3, 3, 1).center());
    }
}
