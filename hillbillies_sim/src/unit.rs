// Units: the autonomous agents of the world.
//
// A `Unit` holds its attributes (strength, agility, toughness, weight), its
// vital statistics (hitpoints, stamina), its position and orientation, and
// its current `Activity`. Cross-references (faction, carried item, task)
// are identifiers resolved through the owning `World`; a unit never points
// at another entity directly.
//
// This file defines the data and the pure formulas (validity rules, speed
// law, hitpoint maxima, rest regeneration, experience). The per-tick
// mechanics that need the grid or other entities live in `physics.rs`.
//
// Random unit names are generated here from a small syllable table so that
// spawning needs nothing but the world's `GameRng`.
//
// See also: `physics.rs` for action mechanics, `task/` for the interpreter
// whose `ExecutionContext` a unit carries, `faction.rs` for membership.
//
// **Critical constraint: determinism.** Attribute rolls, experience gains
// and names draw only from the `GameRng` passed in.

use crate::config::SimConfig;
use crate::error::SimError;
use crate::physics::EPS;
use crate::task::ExecutionContext;
use crate::types::{CubeCoord, FactionId, ItemId, Position, Status, TaskId, UnitId};
use hillbillies_prng::GameRng;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

pub const MIN_ATTRIBUTE: u32 = 1;
pub const MAX_ATTRIBUTE: u32 = 200;

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: u32,
    pub agility: u32,
    pub toughness: u32,
    pub weight: u32,
}

impl Attributes {
    /// Lowest weight a unit with this strength and agility may have.
    pub fn min_weight(strength: u32, agility: u32) -> u32 {
        (strength + agility) / 2
    }

    pub fn is_valid(&self) -> bool {
        let in_range = |v: u32| (MIN_ATTRIBUTE..=MAX_ATTRIBUTE).contains(&v);
        in_range(self.strength)
            && in_range(self.agility)
            && in_range(self.toughness)
            && in_range(self.weight)
            && self.weight >= Self::min_weight(self.strength, self.agility)
    }

    /// Maximum hitpoints and stamina: `ceil(200 * weight/100 * toughness/100)`.
    pub fn max_points(&self) -> u32 {
        (self.weight * self.toughness).div_ceil(50)
    }

    /// Roll a valid attribute set with every value in `range` (inclusive).
    pub fn roll(rng: &mut GameRng, range: (u32, u32)) -> Self {
        let (low, high) = range;
        let strength = rng.range_u32_inclusive(low, high);
        let agility = rng.range_u32_inclusive(low, high);
        let toughness = rng.range_u32_inclusive(low, high);
        let weight_floor = Self::min_weight(strength, agility).max(low);
        let weight = rng.range_u32_inclusive(weight_floor, high.max(weight_floor));
        Self {
            strength,
            agility,
            toughness,
            weight,
        }
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// What a unit is physically doing right now.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Activity {
    Idle,
    /// Walking. `step` is the adjacent cube currently being entered;
    /// `destination` is set for multi-step `move_to` travel.
    Move {
        step: Option<CubeCoord>,
        destination: Option<CubeCoord>,
    },
    /// Walking towards another unit until adjacent to it.
    Follow {
        target: UnitId,
        step: Option<CubeCoord>,
    },
    Work {
        target: CubeCoord,
        remaining: f64,
    },
    /// Recovery after an attack that was resolved when it started.
    Attack {
        target: UnitId,
        remaining: f64,
    },
    /// `clock` is the time accumulated towards the next regeneration step.
    Rest { clock: f64 },
    Falling { from_z: i32 },
}

impl Activity {
    pub fn status(&self) -> Status {
        match self {
            Activity::Idle => Status::Idle,
            Activity::Move { .. } | Activity::Follow { .. } => Status::Moving,
            Activity::Work { .. } => Status::Working,
            Activity::Attack { .. } => Status::Attacking,
            Activity::Rest { .. } => Status::Resting,
            Activity::Falling { .. } => Status::Falling,
        }
    }

    pub fn is_moving(&self) -> bool {
        matches!(self, Activity::Move { .. } | Activity::Follow { .. })
    }
}

/// How the most recent action of a unit ended. Read by the interpreter when
/// it resumes a suspended action statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Completed,
    Failed(String),
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Unit {
    pub(crate) id: UnitId,
    name: String,
    pub(crate) position: Position,
    pub(crate) attributes: Attributes,
    pub(crate) hitpoints: f64,
    pub(crate) stamina: f64,
    pub(crate) orientation: f64,
    pub(crate) faction: Option<FactionId>,
    pub(crate) carried: Option<ItemId>,
    /// Weight of the carried item, zero when empty-handed.
    pub(crate) carried_weight: u32,
    pub(crate) activity: Activity,
    /// Activity suspended by a fall, restored on landing.
    pub(crate) interrupted: Option<Activity>,
    pub(crate) sprinting: bool,
    pub(crate) sprint_clock: f64,
    pub(crate) default_behavior: bool,
    pub(crate) experience: u32,
    /// Seconds since this unit last started resting.
    pub(crate) since_rest: f64,
    pub(crate) task: Option<TaskId>,
    pub(crate) context: Option<ExecutionContext>,
    pub(crate) action_result: Option<ActionOutcome>,
    pub(crate) alive: bool,
}

impl Unit {
    /// Build a unit with full hitpoints and stamina. Fails with
    /// `InvariantViolation` for an invalid name or attribute set.
    pub fn new(
        id: UnitId,
        name: &str,
        position: Position,
        attributes: Attributes,
        default_behavior: bool,
    ) -> Result<Self, SimError> {
        if !is_valid_name(name) {
            return Err(SimError::InvariantViolation(format!(
                "invalid unit name `{name}`"
            )));
        }
        if !attributes.is_valid() {
            return Err(SimError::InvariantViolation(format!(
                "invalid attributes {attributes:?}"
            )));
        }
        let full = attributes.max_points() as f64;
        Ok(Self {
            id,
            name: name.to_string(),
            position,
            attributes,
            hitpoints: full,
            stamina: full,
            orientation: FRAC_PI_2,
            faction: None,
            carried: None,
            carried_weight: 0,
            activity: Activity::Idle,
            interrupted: None,
            sprinting: false,
            sprint_clock: 0.0,
            default_behavior,
            experience: 0,
            since_rest: 0.0,
            task: None,
            context: None,
            action_result: None,
            alive: true,
        })
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cube(&self) -> CubeCoord {
        CubeCoord::of(self.position)
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn hitpoints(&self) -> f64 {
        self.hitpoints
    }

    pub fn stamina(&self) -> f64 {
        self.stamina
    }

    pub fn max_hitpoints(&self) -> u32 {
        self.attributes.max_points()
    }

    pub fn max_stamina(&self) -> u32 {
        self.attributes.max_points()
    }

    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    pub fn faction(&self) -> Option<FactionId> {
        self.faction
    }

    pub fn carried_item(&self) -> Option<ItemId> {
        self.carried
    }

    pub fn is_sprinting(&self) -> bool {
        self.sprinting
    }

    pub fn experience(&self) -> u32 {
        self.experience
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn has_default_behavior(&self) -> bool {
        self.default_behavior
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn status(&self) -> Status {
        if self.alive {
            self.activity.status()
        } else {
            Status::Done
        }
    }

    /// Weight used by the speed law: own weight plus the carried item.
    pub fn effective_weight(&self) -> u32 {
        self.attributes.weight + self.carried_weight
    }

    /// `factor * (strength + agility) / (200 * weight / 100)`.
    pub fn base_speed(&self, config: &SimConfig) -> f64 {
        let a = &self.attributes;
        config.base_speed_factor * (a.strength + a.agility) as f64
            / (200.0 * self.effective_weight() as f64 / 100.0)
    }

    /// Walking speed for a step with vertical component `dz`.
    pub fn speed_for_step(&self, dz: i32, config: &SimConfig) -> f64 {
        let mut speed = self.base_speed(config);
        if dz > 0 {
            speed *= config.upward_speed_multiplier;
        } else if dz < 0 {
            speed *= config.downward_speed_multiplier;
        }
        if self.sprinting {
            speed *= config.sprint_multiplier;
        }
        speed
    }

    /// Current speed: the walking speed of the step in progress, the fall
    /// speed while falling, zero otherwise.
    pub fn current_speed(&self, config: &SimConfig) -> f64 {
        match &self.activity {
            Activity::Move { step: Some(step), .. } | Activity::Follow { step: Some(step), .. } => {
                let rise = step.center().z - self.position.z;
                let dz = if rise > 0.0 {
                    1
                } else if rise < 0.0 {
                    -1
                } else {
                    0
                };
                self.speed_for_step(dz, config)
            }
            Activity::Falling { .. } => config.fall_speed,
            _ => 0.0,
        }
    }

    pub fn is_fully_rested(&self) -> bool {
        let max = self.attributes.max_points() as f64;
        self.hitpoints >= max && self.stamina >= max
    }

    /// Advance a rest by `dt`. Every `rest_interval` seconds the unit regains
    /// `toughness / 200` hitpoints, or `toughness / 100` stamina once
    /// hitpoints are full. Returns the unused time once fully rested.
    pub(crate) fn advance_rest(&mut self, clock: &mut f64, dt: f64, config: &SimConfig) -> Option<f64> {
        let max = self.attributes.max_points() as f64;
        let toughness = self.attributes.toughness as f64;
        let mut budget = dt;
        loop {
            if self.is_fully_rested() {
                return Some(budget);
            }
            let needed = config.rest_interval - *clock;
            if budget < needed {
                *clock += budget;
                return None;
            }
            budget -= needed;
            *clock = 0.0;
            if self.hitpoints < max {
                self.hitpoints = (self.hitpoints + toughness / 200.0).min(max);
            } else {
                self.stamina = (self.stamina + toughness / 100.0).min(max);
            }
        }
    }

    /// Seconds of sprinting left before stamina hits zero. Infinite while
    /// walking.
    pub(crate) fn sprint_time_left(&self, config: &SimConfig) -> f64 {
        if !self.sprinting {
            return f64::INFINITY;
        }
        (self.stamina.ceil() * config.sprint_stamina_interval - self.sprint_clock).max(0.0)
    }

    /// Drain stamina for `dt` seconds of sprinting. Sprinting stops on its
    /// own when stamina runs out.
    pub(crate) fn drain_sprint(&mut self, dt: f64, config: &SimConfig) {
        if !self.sprinting {
            return;
        }
        self.sprint_clock += dt;
        while self.sprint_clock + EPS >= config.sprint_stamina_interval {
            self.sprint_clock = (self.sprint_clock - config.sprint_stamina_interval).max(0.0);
            self.stamina = (self.stamina - 1.0).max(0.0);
            if self.stamina <= 0.0 {
                self.sprinting = false;
                self.sprint_clock = 0.0;
                break;
            }
        }
    }

    /// Add experience. Each completed block of `experience_per_level` points
    /// raises strength, agility or toughness (chosen at random) by one, if
    /// the result stays valid.
    pub(crate) fn gain_experience(&mut self, points: u32, rng: &mut GameRng, config: &SimConfig) {
        let per_level = config.experience_per_level.max(1);
        let before = self.experience / per_level;
        self.experience += points;
        let after = self.experience / per_level;
        for _ in before..after {
            let mut raised = self.attributes;
            match rng.range_u32_inclusive(0, 2) {
                0 => raised.strength += 1,
                1 => raised.agility += 1,
                _ => raised.toughness += 1,
            }
            if raised.is_valid() {
                self.attributes = raised;
            }
        }
    }

    /// Raise weight and toughness by one each where that stays valid.
    pub(crate) fn improve_at_workshop(&mut self) {
        let mut raised = self.attributes;
        raised.weight += 1;
        if raised.is_valid() {
            self.attributes = raised;
        }
        let mut raised = self.attributes;
        raised.toughness += 1;
        if raised.is_valid() {
            self.attributes = raised;
        }
    }

    pub(crate) fn face_towards(&mut self, target: Position) {
        let delta = target - self.position;
        if delta.x != 0.0 || delta.y != 0.0 {
            self.orientation = delta.y.atan2(delta.x);
        }
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// At least two characters, an uppercase first letter, then only letters,
/// spaces and quotes.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.chars().count() >= 2
        && first.is_uppercase()
        && chars.all(|c| c.is_alphabetic() || c == ' ' || c == '\'' || c == '"')
}

const ONSETS: &[&str] = &["B", "D", "G", "H", "J", "K", "L", "M", "P", "R", "T", "W", "Z"];
const VOWELS: &[&str] = &["a", "e", "i", "o", "u", "ee", "oo"];
const CODAS: &[&str] = &["b", "d", "g", "l", "m", "n", "r", "s", "t", "ck", "mp"];

/// Generate a random valid name such as "Jebbo Tuck".
pub fn generate_name(rng: &mut GameRng) -> String {
    let given = name_part(rng);
    if rng.random_bool(0.5) {
        format!("{given} {}", name_part(rng))
    } else {
        given
    }
}

fn name_part(rng: &mut GameRng) -> String {
    let syllables = rng.range_u32_inclusive(1, 2);
    let mut part = String::new();
    for i in 0..syllables {
        let onset = rng.choose(ONSETS).copied().unwrap_or("B");
        if i == 0 {
            part.push_str(onset);
        } else {
            part.push_str(&onset.to_lowercase());
        }
        part.push_str(rng.choose(VOWELS).copied().unwrap_or("a"));
        part.push_str(rng.choose(CODAS).copied().unwrap_or("b"));
    }
    part
}
