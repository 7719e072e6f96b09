// Core types shared across the simulation.
//
// Defines the two spatial types (`CubeCoord` for the integer grid,
// `Position` for continuous entity positions), the terrain enum, compact
// entity identifiers, and the unit `Status` enum. All types derive
// `Serialize`/`Deserialize` so task programs and configs can reference them.
//
// **Critical constraint: determinism.** Identifiers are plain counters
// allocated by the `World` in creation order. Every ordered collection keyed
// by them (`BTreeMap`, `BTreeSet`) therefore iterates identically across runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// Face-adjacent offsets (±x, ±y, ±z).
pub const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// A cube in the world grid. `z` is the vertical axis; `z == 0` is the floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CubeCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CubeCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The cube containing a continuous position (floor of each axis).
    pub fn of(position: Position) -> Self {
        Self {
            x: position.x.floor() as i32,
            y: position.y.floor() as i32,
            z: position.z.floor() as i32,
        }
    }

    /// Centre of this cube in continuous coordinates.
    pub fn center(self) -> Position {
        Position::new(
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn below(self) -> Self {
        self.offset(0, 0, -1)
    }

    /// The 26 cubes surrounding this one, in a fixed order. Callers filter
    /// for bounds themselves.
    pub fn neighbors(self) -> impl Iterator<Item = CubeCoord> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dz| {
                    if dx == 0 && dy == 0 && dz == 0 {
                        None
                    } else {
                        Some(self.offset(dx, dy, dz))
                    }
                })
            })
        })
    }

    /// The 6 face-adjacent cubes.
    pub fn face_neighbors(self) -> impl Iterator<Item = CubeCoord> {
        FACE_OFFSETS
            .iter()
            .map(move |&(dx, dy, dz)| self.offset(dx, dy, dz))
    }

    /// True if `other` is this cube or one of its 26 neighbours.
    pub fn is_adjacent_or_same(self, other: CubeCoord) -> bool {
        (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1 && (self.z - other.z).abs() <= 1
    }
}

impl fmt::Display for CubeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A continuous position in cube units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance_to(self, other: Position) -> f64 {
        (other - self).length()
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Position {
    type Output = Position;
    fn mul(self, rhs: f64) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// The material of a single cube.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    #[default]
    Air,
    Rock,
    Tree,
    Workshop,
}

impl TerrainType {
    /// Decode the external terrain code (0=air, 1=rock, 2=tree, 3=workshop).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Air),
            1 => Some(Self::Rock),
            2 => Some(Self::Tree),
            3 => Some(Self::Workshop),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Air => 0,
            Self::Rock => 1,
            Self::Tree => 2,
            Self::Workshop => 3,
        }
    }

    pub fn is_passable(self) -> bool {
        matches!(self, Self::Air | Self::Workshop)
    }

    pub fn is_solid(self) -> bool {
        !self.is_passable()
    }
}

// ---------------------------------------------------------------------------
// Entity IDs: compact counters, allocated by the World
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// Identifier of a unit.
UnitId);
entity_id!(/// Identifier of a carryable item (boulder or log).
ItemId);
entity_id!(/// Identifier of a faction.
FactionId);
entity_id!(/// Identifier of a scheduled task.
TaskId);

/// The two kinds of carryable debris.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Boulder,
    Log,
}

/// Any entity that can occupy a cube, as stored in the spatial index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRef {
    Unit(UnitId),
    Boulder(ItemId),
    Log(ItemId),
}

impl EntityRef {
    pub fn item(kind: ItemKind, id: ItemId) -> Self {
        match kind {
            ItemKind::Boulder => Self::Boulder(id),
            ItemKind::Log => Self::Log(id),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit status
// ---------------------------------------------------------------------------

/// Coarse behavioural state of a unit, derived from its current activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Moving,
    Working,
    Attacking,
    Resting,
    Falling,
    /// Terminated: the unit died or was removed from its world.
    Done,
}
