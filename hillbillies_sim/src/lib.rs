// hillbillies_sim: cube-world colony simulation library.
//
// This crate contains all simulation logic: the terrain grid and its
// cave-in rules, units and the items they carry, factions with their task
// schedulers, and the suspendable interpreter that runs task programs. It
// has no rendering or I/O dependencies; terrain changes are reported to an
// external `TerrainChangeListener`.
//
// Module overview:
// - `world.rs`:        World: owner of all state, queries, `advance_time`.
// - `physics.rs`:      Unit actions (move, work, attack, rest), falling, items.
// - `behavior.rs`:     Turn logic: task execution and default behaviour.
// - `grid.rs`:         Dense 3D terrain grid and the change listener.
// - `connectivity.rs`: Incremental border connectivity (cave-in candidates).
// - `spatial.rs`:      Cube -> entity index.
// - `pathfinding.rs`:  A* over standable cubes.
// - `unit.rs`:         Unit data, attribute rules, speed law, names.
// - `item.rs`:         Boulders and logs.
// - `faction.rs`:      Factions, schedulers, placement of new units.
// - `task/`:           Task programs: AST, execution context, evaluator, executor.
// - `event.rs`:        Events reported by `advance_time`.
// - `config.rs`:       SimConfig, all tunable constants.
// - `error.rs`:        SimError, TaskFault, ProgramError.
// - `types.rs`:        CubeCoord, Position, terrain, entity ids.
// - `prng`:            Re-exported from `hillbillies_prng` (xoshiro256++ PRNG).
//
// **Critical constraint: determinism.** Given the same terrain, seed and
// sequence of calls, the simulation produces the same world. All randomness
// comes from a seeded `GameRng`. No `HashMap` iteration, no system time, no
// OS entropy. Use `BTreeMap` for ordered collections.

pub mod behavior;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod event;
pub mod faction;
pub mod grid;
pub mod item;
pub mod pathfinding;
pub mod physics;
pub use hillbillies_prng as prng;
pub mod spatial;
pub mod task;
pub mod types;
pub mod unit;
pub mod world;

pub use config::SimConfig;
pub use error::{ProgramError, SimError, TaskFault};
pub use event::{SimEvent, SimEventKind, StepResult};
pub use grid::{NullListener, TerrainChangeListener};
pub use task::{ExecutionState, Expression, Statement, Task};
pub use types::{CubeCoord, FactionId, ItemId, Position, Status, TaskId, TerrainType, UnitId};
pub use unit::Attributes;
pub use world::World;
