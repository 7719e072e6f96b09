// The world: owner of all simulation state and driver of the tick.
//
// `World` owns the terrain `Grid`, its `BorderConnectivity`, the
// `SpatialIndex`, the unit, item and faction arenas, the `GameRng` and the
// `SimConfig`. Every cross-reference between entities is an id resolved
// through these arenas, so there are no reference cycles and ownership is
// exclusive: removing an entity from the world detaches it completely.
//
// This file holds construction, queries, terrain mutation with the cave-in
// pass, entity registration, faction membership, task bookkeeping, and
// `advance_time`. Unit actions and per-tick physics are in `physics.rs`;
// the decision of what an idle unit does next is in `behavior.rs`.
//
// ## Tick order
//
// `advance_time(dt)` runs, in order: the cave-in pass, every unit (ascending
// id), every boulder, every log, and the cave-in pass again (work done by
// units may have removed terrain). Collected `SimEvent`s are returned in the
// `StepResult`.
//
// ## Move notification
//
// Entity positions only change through `relocate_unit` / `relocate_item`,
// which keep the spatial index in sync and drag a carried item along with
// its carrier.
//
// See also: `physics.rs`, `behavior.rs`, `connectivity.rs`, `faction.rs`.
//
// **Critical constraint: determinism.** All registries are `BTreeMap`s keyed
// by ids from monotonic counters, and all randomness comes from the seeded
// `GameRng`. Identical inputs and seeds produce identical worlds.

use crate::config::SimConfig;
use crate::connectivity::BorderConnectivity;
use crate::error::SimError;
use crate::event::{SimEvent, SimEventKind, StepResult};
use crate::faction::{Faction, Placement, place_new_unit};
use crate::grid::{Grid, TerrainChangeListener};
use crate::item::Item;
use crate::spatial::SpatialIndex;
use crate::task::{ExecutionContext, ExecutionState, Task, Value};
use crate::types::*;
use crate::unit::{ActionOutcome, Attributes, Unit, generate_name};
use hillbillies_prng::GameRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Entities found in one cube, partitioned by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CubeContents {
    pub units: Vec<UnitId>,
    pub boulders: Vec<ItemId>,
    pub logs: Vec<ItemId>,
}

#[derive(Debug)]
pub struct World {
    pub(crate) config: SimConfig,
    pub(crate) rng: GameRng,
    pub(crate) grid: Grid,
    pub(crate) connectivity: BorderConnectivity,
    pub(crate) spatial: SpatialIndex,
    pub(crate) units: BTreeMap<UnitId, Unit>,
    pub(crate) items: BTreeMap<ItemId, Item>,
    pub(crate) factions: BTreeMap<FactionId, Faction>,
    next_unit_id: u32,
    next_item_id: u32,
    next_faction_id: u32,
    next_task_id: u32,
    completed_tasks: BTreeSet<TaskId>,
    pub(crate) events: Vec<SimEvent>,
    time: f64,
}

impl World {
    /// Build a world from terrain codes indexed `terrain[x][y][z]` with the
    /// default configuration.
    pub fn new(
        terrain: &[Vec<Vec<i32>>],
        listener: Box<dyn TerrainChangeListener>,
        seed: u64,
    ) -> Result<Self, SimError> {
        Self::with_config(terrain, listener, seed, SimConfig::default())
    }

    pub fn with_config(
        terrain: &[Vec<Vec<i32>>],
        listener: Box<dyn TerrainChangeListener>,
        seed: u64,
        config: SimConfig,
    ) -> Result<Self, SimError> {
        let grid = Grid::from_codes(terrain, listener)?;
        let connectivity = BorderConnectivity::new(&grid);
        let (x, y, z) = grid.dimensions();
        debug!(x, y, z, "world created");
        Ok(Self {
            config,
            rng: GameRng::new(seed),
            grid,
            connectivity,
            spatial: SpatialIndex::new(),
            units: BTreeMap::new(),
            items: BTreeMap::new(),
            factions: BTreeMap::new(),
            next_unit_id: 0,
            next_item_id: 0,
            next_faction_id: 0,
            next_task_id: 0,
            completed_tasks: BTreeSet::new(),
            events: Vec::new(),
            time: 0.0,
        })
    }

    // -----------------------------------------------------------------------
    // Terrain
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Simulated seconds since creation.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dimensions(&self) -> (i32, i32, i32) {
        self.grid.dimensions()
    }

    pub fn terrain_at(&self, coord: CubeCoord) -> Result<TerrainType, SimError> {
        self.grid.terrain_at(coord)
    }

    pub fn is_passable(&self, coord: CubeCoord) -> Result<bool, SimError> {
        self.grid.is_passable(coord)
    }

    pub fn is_connected_to_border(&self, coord: CubeCoord) -> Result<bool, SimError> {
        self.grid.terrain_at(coord)?;
        Ok(self.connectivity.is_connected_to_border(&self.grid, coord))
    }

    /// Replace a cube's terrain, notify the listener and update border
    /// connectivity. Cubes cut off by the change cave in on the next pass.
    pub fn set_terrain_at(&mut self, coord: CubeCoord, terrain: TerrainType) -> Result<(), SimError> {
        let previous = self.grid.set_terrain_at(coord, terrain)?;
        match (previous.is_solid(), terrain.is_solid()) {
            (true, false) => {
                let lost = self.connectivity.mark_passable(&self.grid, coord);
                if !lost.is_empty() {
                    debug!(%coord, disconnected = lost.len(), "terrain lost its support");
                }
            }
            (false, true) => self.connectivity.mark_solid(&self.grid, coord),
            _ => {}
        }
        Ok(())
    }

    /// Convert every solid cube disconnected from the border to air, until
    /// none is left. Each collapsed rock or tree may leave a boulder or log.
    /// Returns the collapsed cubes in collapse order.
    pub fn collapse_pass(&mut self) -> Vec<CubeCoord> {
        let mut collapsed = Vec::new();
        loop {
            let Some(cube) = self.connectivity.collapse_candidates().next() else {
                break;
            };
            let debris = match self.grid.get(cube) {
                TerrainType::Rock => Some(ItemKind::Boulder),
                TerrainType::Tree => Some(ItemKind::Log),
                _ => None,
            }
            .filter(|_| self.rng.random_bool(self.config.collapse_drop_chance));
            if self.set_terrain_at(cube, TerrainType::Air).is_err() {
                break;
            }
            if let Some(kind) = debris {
                self.spawn_item(kind, cube.center());
            }
            debug!(%cube, ?debris, "cave-in");
            self.push_event(SimEventKind::CaveIn { cube, debris });
            collapsed.push(cube);
        }
        collapsed
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn boulders(&self) -> impl Iterator<Item = &Item> {
        self.items.values().filter(|i| i.kind() == ItemKind::Boulder)
    }

    pub fn logs(&self) -> impl Iterator<Item = &Item> {
        self.items.values().filter(|i| i.kind() == ItemKind::Log)
    }

    pub fn units_of_faction(&self, faction: FactionId) -> impl Iterator<Item = &Unit> {
        self.units
            .values()
            .filter(move |u| u.faction() == Some(faction))
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn factions(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    pub fn active_factions(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values().filter(|f| f.is_active())
    }

    pub fn entities_at(&self, coord: CubeCoord) -> Result<CubeContents, SimError> {
        self.grid.terrain_at(coord)?;
        let mut contents = CubeContents::default();
        for entity in self.spatial.entities_at(coord) {
            match *entity {
                EntityRef::Unit(id) => contents.units.push(id),
                EntityRef::Boulder(id) => contents.boulders.push(id),
                EntityRef::Log(id) => contents.logs.push(id),
            }
        }
        Ok(contents)
    }

    pub(crate) fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    // -----------------------------------------------------------------------
    // Units and items
    // -----------------------------------------------------------------------

    /// Spawn a unit with random attributes and name on a random standable
    /// cube. Returns `Ok(None)` when the world or every faction is full.
    pub fn spawn_unit(&mut self, default_behavior: bool) -> Result<Option<UnitId>, SimError> {
        if !self.has_room_for_unit() {
            return Ok(None);
        }
        let cube = self
            .random_standable_cube()
            .ok_or_else(|| SimError::IllegalAction("no standable cube to spawn on".into()))?;
        let attributes = Attributes::roll(&mut self.rng, self.config.spawn_attribute_range);
        let name = generate_name(&mut self.rng);
        self.insert_unit(&name, cube, attributes, default_behavior)
    }

    /// Add a unit with the given name and attributes at the centre of a
    /// passable cube. Returns `Ok(None)` when the world or every faction is
    /// full; invalid names or attributes are an `InvariantViolation`.
    pub fn add_unit(
        &mut self,
        name: &str,
        cube: CubeCoord,
        attributes: Attributes,
        default_behavior: bool,
    ) -> Result<Option<UnitId>, SimError> {
        if !self.grid.is_passable(cube)? {
            return Err(SimError::IllegalAction(format!("cube {cube} is not passable")));
        }
        if !self.has_room_for_unit() {
            return Ok(None);
        }
        self.insert_unit(name, cube, attributes, default_behavior)
    }

    fn has_room_for_unit(&self) -> bool {
        self.units.len() < self.config.max_units
            && place_new_unit(&self.factions, &self.config) != Placement::Refuse
    }

    fn insert_unit(
        &mut self,
        name: &str,
        cube: CubeCoord,
        attributes: Attributes,
        default_behavior: bool,
    ) -> Result<Option<UnitId>, SimError> {
        let id = UnitId(self.next_unit_id);
        let mut unit = Unit::new(id, name, cube.center(), attributes, default_behavior)?;
        let faction = match place_new_unit(&self.factions, &self.config) {
            Placement::Join(f) | Placement::Reuse(f) => f,
            Placement::Found => self.found_faction(),
            Placement::Refuse => return Ok(None),
        };
        let capacity = self.config.max_faction_size;
        let joined = self
            .factions
            .get_mut(&faction)
            .is_some_and(|f| f.add_member(id, capacity));
        if !joined {
            return Ok(None);
        }
        self.next_unit_id += 1;
        unit.faction = Some(faction);
        self.spatial.insert(EntityRef::Unit(id), cube);
        self.units.insert(id, unit);
        info!(unit = %id, %faction, name, "unit arrived");
        self.push_event(SimEventKind::UnitArrived { unit: id, faction });
        Ok(Some(id))
    }

    fn found_faction(&mut self) -> FactionId {
        let id = FactionId(self.next_faction_id);
        self.next_faction_id += 1;
        self.factions
            .insert(id, Faction::new(id, format!("Faction {}", id.0 + 1)));
        id
    }

    /// Detach a unit from the world: it drops its item, leaves its faction
    /// and the spatial index, and its task context is discarded.
    pub fn remove_unit(&mut self, id: UnitId) -> Result<Unit, SimError> {
        self.detach_unit(id)
    }

    pub(crate) fn detach_unit(&mut self, id: UnitId) -> Result<Unit, SimError> {
        let mut unit = self
            .units
            .remove(&id)
            .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
        if let Some(item) = unit.carried.take()
            && let Some(released) = self.items.get_mut(&item)
        {
            released.carrier = None;
            let center = released.cube().center();
            self.relocate_item(item, center);
        }
        unit.carried_weight = 0;
        if let Some(faction) = unit.faction.take()
            && let Some(faction) = self.factions.get_mut(&faction)
        {
            if let Some(task) = unit.task {
                faction.scheduler.release(task, None);
            }
            faction.remove_member(id);
        }
        self.spatial.remove(EntityRef::Unit(id), unit.cube());
        unit.task = None;
        unit.context = None;
        unit.activity = crate::unit::Activity::Idle;
        unit.interrupted = None;
        unit.alive = false;
        Ok(unit)
    }

    /// Move a unit into another faction. Returns `false`, changing nothing,
    /// when the target faction is full.
    pub fn join_faction(&mut self, unit: UnitId, faction: FactionId) -> Result<bool, SimError> {
        let current = self
            .units
            .get(&unit)
            .ok_or_else(|| SimError::UnknownEntity(unit.to_string()))?
            .faction;
        if current == Some(faction) {
            return Ok(true);
        }
        let capacity = self.config.max_faction_size;
        let target = self
            .factions
            .get_mut(&faction)
            .ok_or_else(|| SimError::UnknownEntity(faction.to_string()))?;
        if !target.add_member(unit, capacity) {
            return Ok(false);
        }
        if let Some(old) = current.and_then(|f| self.factions.get_mut(&f)) {
            old.remove_member(unit);
        }
        if let Some(u) = self.units.get_mut(&unit) {
            u.faction = Some(faction);
        }
        Ok(true)
    }

    pub fn add_boulder(&mut self, cube: CubeCoord) -> Result<ItemId, SimError> {
        self.grid.terrain_at(cube)?;
        Ok(self.spawn_item(ItemKind::Boulder, cube.center()))
    }

    pub fn add_log(&mut self, cube: CubeCoord) -> Result<ItemId, SimError> {
        self.grid.terrain_at(cube)?;
        Ok(self.spawn_item(ItemKind::Log, cube.center()))
    }

    pub(crate) fn spawn_item(&mut self, kind: ItemKind, position: Position) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        let (low, high) = self.config.item_weight_range;
        let weight = self.rng.range_u32_inclusive(low, high.max(low));
        self.items.insert(id, Item::new(id, kind, position, weight));
        self.spatial
            .insert(EntityRef::item(kind, id), CubeCoord::of(position));
        id
    }

    pub(crate) fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let item = self.items.remove(&id)?;
        self.spatial
            .remove(EntityRef::item(item.kind(), id), item.cube());
        Some(item)
    }

    /// A uniformly random standable cube: random probes first, then a full
    /// scan.
    pub(crate) fn random_standable_cube(&mut self) -> Option<CubeCoord> {
        let (dx, dy, dz) = self.grid.dimensions();
        for _ in 0..self.config.spawn_attempts {
            let cube = CubeCoord::new(
                self.rng.range_u32_inclusive(0, dx as u32 - 1) as i32,
                self.rng.range_u32_inclusive(0, dy as u32 - 1) as i32,
                self.rng.range_u32_inclusive(0, dz as u32 - 1) as i32,
            );
            if self.grid.is_standable(cube) {
                return Some(cube);
            }
        }
        let standable: Vec<_> = self
            .grid
            .coords()
            .filter(|&c| self.grid.is_standable(c))
            .collect();
        self.rng.choose(&standable).copied()
    }

    // -----------------------------------------------------------------------
    // Move notification
    // -----------------------------------------------------------------------

    pub(crate) fn relocate_unit(&mut self, id: UnitId, position: Position) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let old = unit.cube();
        unit.position = position;
        let new = unit.cube();
        let carried = unit.carried;
        self.spatial.on_entity_moved(EntityRef::Unit(id), old, new);
        if let Some(item) = carried {
            self.relocate_item(item, position);
        }
    }

    pub(crate) fn relocate_item(&mut self, id: ItemId, position: Position) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        let old = item.cube();
        item.position = position;
        let new = item.cube();
        let entity = EntityRef::item(item.kind(), id);
        self.spatial.on_entity_moved(entity, old, new);
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Add a task to a faction's scheduler.
    pub fn schedule_task(&mut self, faction: FactionId, task: Task) -> Result<TaskId, SimError> {
        let id = TaskId(self.next_task_id);
        let scheduler = &mut self
            .factions
            .get_mut(&faction)
            .ok_or_else(|| SimError::UnknownEntity(faction.to_string()))?
            .scheduler;
        self.next_task_id += 1;
        debug!(task = %id, %faction, name = task.name(), "task scheduled");
        scheduler.schedule(id, task);
        Ok(id)
    }

    /// Remove a task from its scheduler, discarding the context of the unit
    /// executing it.
    pub fn remove_task(&mut self, faction: FactionId, task: TaskId) -> Result<Task, SimError> {
        let removed = self
            .factions
            .get_mut(&faction)
            .and_then(|f| f.scheduler.remove_task(task))
            .ok_or_else(|| SimError::UnknownEntity(task.to_string()))?;
        if let Some(unit) = removed.assignee().and_then(|u| self.units.get_mut(&u)) {
            unit.task = None;
            unit.context = None;
        }
        Ok(removed)
    }

    /// Give a scheduled task of the unit's faction to the unit. Returns
    /// `false` when the unit already has a task or the task is taken.
    pub fn assign_task(&mut self, unit: UnitId, task: TaskId) -> Result<bool, SimError> {
        let u = self
            .units
            .get(&unit)
            .ok_or_else(|| SimError::UnknownEntity(unit.to_string()))?;
        if u.task.is_some() {
            return Ok(false);
        }
        let scheduler = &mut u
            .faction
            .and_then(|f| self.factions.get_mut(&f))
            .ok_or_else(|| SimError::UnknownEntity(unit.to_string()))?
            .scheduler;
        let (body, selected) = match scheduler.task(task) {
            Some(t) => (Arc::clone(t.body()), t.selected()),
            None => return Err(SimError::UnknownEntity(task.to_string())),
        };
        if !scheduler.claim(task, unit) {
            return Ok(false);
        }
        if let Some(u) = self.units.get_mut(&unit) {
            u.task = Some(task);
            u.action_result = None;
            u.context = Some(ExecutionContext::new(task, unit, body, selected));
        }
        debug!(%unit, %task, "task assigned");
        Ok(true)
    }

    /// State of a task: its context's state while assigned, `Completed`
    /// once finished, `Failed` while waiting to be retried after a fault,
    /// `None` if it never ran or is unknown.
    pub fn task_state(&self, task: TaskId) -> Option<ExecutionState> {
        if self.completed_tasks.contains(&task) {
            return Some(ExecutionState::Completed);
        }
        if let Some(ctx) = self
            .units
            .values()
            .filter_map(|u| u.context.as_ref())
            .find(|c| c.task() == task)
        {
            return Some(ctx.state());
        }
        self.factions
            .values()
            .filter_map(|f| f.scheduler().task(task))
            .find(|t| t.assignee().is_none() && t.last_fault().is_some())
            .map(|_| ExecutionState::Failed)
    }

    pub(crate) fn mark_task_completed(&mut self, task: TaskId) {
        self.completed_tasks.insert(task);
    }

    pub(crate) fn take_action_result(&mut self, unit: UnitId) -> Option<ActionOutcome> {
        self.units.get_mut(&unit)?.action_result.take()
    }

    pub(crate) fn record_print(&mut self, unit: UnitId, task: TaskId, value: Value) {
        let text = match value {
            Value::Bool(b) => b.to_string(),
            Value::Position(cube) => cube.to_string(),
            Value::Unit(id) => self
                .units
                .get(&id)
                .map_or_else(|| id.to_string(), |u| u.name().to_string()),
        };
        info!(%unit, %task, "{text}");
        self.push_event(SimEventKind::TaskPrinted { unit, task, text });
    }

    // -----------------------------------------------------------------------
    // Events and time
    // -----------------------------------------------------------------------

    pub(crate) fn push_event(&mut self, kind: SimEventKind) {
        self.events.push(SimEvent {
            time: self.time,
            kind,
        });
    }

    /// Advance the simulation by `dt` seconds.
    pub fn advance_time(&mut self, dt: f64) -> Result<StepResult, SimError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidDuration(dt));
        }
        self.collapse_pass();

        let unit_ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in unit_ids {
            self.advance_unit(id, dt);
        }
        for kind in [ItemKind::Boulder, ItemKind::Log] {
            let item_ids: Vec<ItemId> = self
                .items
                .values()
                .filter(|i| i.kind() == kind)
                .map(Item::id)
                .collect();
            for id in item_ids {
                self.advance_item(id, dt);
            }
        }

        self.collapse_pass();
        self.time += dt;
        Ok(StepResult {
            events: std::mem::take(&mut self.events),
        })
    }

    #[cfg(test)]
    pub(crate) fn finish_activity_for_test(&mut self, unit: UnitId) {
        if let Some(u) = self.units.get_mut(&unit) {
            u.activity = crate::unit::Activity::Idle;
            u.action_result = Some(ActionOutcome::Completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NullListener;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn codes(dims: (usize, usize, usize)) -> Vec<Vec<Vec<i32>>> {
        vec![vec![vec![0; dims.2]; dims.1]; dims.0]
    }

    fn floor_world(dims: (usize, usize, usize), seed: u64) -> World {
        let mut c = codes(dims);
        for column in c.iter_mut().flatten() {
            column[0] = 1;
        }
        World::new(&c, Box::new(NullListener), seed).unwrap()
    }

    #[test]
    fn fixture_10_20_30() {
        let mut c = codes((10, 20, 30));
        c[1][1][0] = 1;
        let world = World::new(&c, Box::new(NullListener), 0).unwrap();
        assert_eq!(world.dimensions(), (10, 20, 30));
        assert_eq!(world.terrain_at(CubeCoord::new(1, 1, 0)), Ok(TerrainType::Rock));
        assert_eq!(world.terrain_at(CubeCoord::new(2, 1, 0)), Ok(TerrainType::Air));
        assert!(world.terrain_at(CubeCoord::new(10, 0, 0)).is_err());
    }

    #[test]
    fn fixture_3_3_3_set_terrain() {
        let mut c = codes((3, 3, 3));
        c[1][1][0] = 1;
        c[1][1][1] = 2;
        c[1][1][2] = 3;
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut world =
            World::new(&c, Box::new(move |cube: CubeCoord| sink.borrow_mut().push(cube)), 0).unwrap();
        let cube = CubeCoord::new(1, 1, 1);
        assert_eq!(world.terrain_at(cube), Ok(TerrainType::Tree));
        world.set_terrain_at(cube, TerrainType::Rock).unwrap();
        assert_eq!(world.terrain_at(cube), Ok(TerrainType::Rock));
        assert_eq!(*seen.borrow(), vec![cube]);
        assert!(world.is_connected_to_border(cube).unwrap());
    }

    #[test]
    fn collapse_pass_converts_disconnected_cubes() {
        // Pillar from the floor up into the interior of a 5x5x5 world.
        let mut c = codes((5, 5, 5));
        for z in 0..4 {
            c[2][2][z] = if z == 2 { 2 } else { 1 };
        }
        let mut world = World::new(&c, Box::new(NullListener), 3).unwrap();
        assert!(world.collapse_pass().is_empty());

        world
            .set_terrain_at(CubeCoord::new(2, 2, 0), TerrainType::Air)
            .unwrap();
        let disconnected: Vec<_> = (1..4)
            .map(|z| CubeCoord::new(2, 2, z))
            .filter(|&c| !world.is_connected_to_border(c).unwrap())
            .collect();
        assert_eq!(disconnected.len(), 3);

        let collapsed = world.collapse_pass();
        assert_eq!(collapsed.len(), 3);
        for cube in disconnected {
            assert_eq!(world.terrain_at(cube), Ok(TerrainType::Air));
        }
    }

    #[test]
    fn certain_drop_leaves_matching_debris() {
        let mut c = codes((5, 5, 5));
        c[2][2][0] = 1;
        c[2][2][1] = 1;
        c[2][2][2] = 2;
        let config = SimConfig {
            collapse_drop_chance: 1.0,
            ..SimConfig::default()
        };
        let mut world = World::with_config(&c, Box::new(NullListener), 5, config).unwrap();
        world
            .set_terrain_at(CubeCoord::new(2, 2, 0), TerrainType::Air)
            .unwrap();
        world.collapse_pass();
        assert_eq!(world.boulders().count(), 1);
        assert_eq!(world.logs().count(), 1);
        let log = world.logs().next().unwrap();
        assert_eq!(log.cube(), CubeCoord::new(2, 2, 2));
        let (low, high) = world.config().item_weight_range;
        assert!((low..=high).contains(&log.weight()));
    }

    #[test]
    fn floating_terrain_collapses_on_first_tick() {
        let mut c = codes((5, 5, 5));
        c[2][2][2] = 1;
        let mut world = World::new(&c, Box::new(NullListener), 0).unwrap();
        let step = world.advance_time(0.1).unwrap();
        assert_eq!(step.cave_ins().collect::<Vec<_>>(), vec![CubeCoord::new(2, 2, 2)]);
        assert_eq!(world.terrain_at(CubeCoord::new(2, 2, 2)), Ok(TerrainType::Air));
    }

    #[test]
    fn invalid_durations_rejected() {
        let mut world = floor_world((3, 3, 3), 0);
        for dt in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(world.advance_time(dt), Err(SimError::InvalidDuration(_))));
        }
        assert!(world.advance_time(0.0).is_ok());
    }

    #[test]
    fn spawned_units_are_valid_and_indexed() {
        let mut world = floor_world((6, 6, 4), 21);
        for _ in 0..12 {
            let id = world.spawn_unit(false).unwrap().unwrap();
            let unit = world.unit(id).unwrap();
            let a = unit.attributes();
            assert!(a.is_valid());
            for v in [a.strength, a.agility, a.toughness, a.weight] {
                assert!((25..=100).contains(&v));
            }
            assert!(world.grid().is_standable(unit.cube()));
            assert_eq!(world.spatial().locate(EntityRef::Unit(id)), vec![unit.cube()]);
            let faction = unit.faction().unwrap();
            let memberships = world
                .factions()
                .filter(|f| f.members().contains(&id))
                .count();
            assert_eq!(memberships, 1);
            assert!(world.faction(faction).unwrap().members().contains(&id));
        }
        assert_eq!(world.active_factions().count(), 5);
    }

    #[test]
    fn world_unit_capacity() {
        let config = SimConfig {
            max_units: 3,
            ..SimConfig::default()
        };
        let mut c = codes((4, 4, 2));
        for column in c.iter_mut().flatten() {
            column[0] = 1;
        }
        let mut world = World::with_config(&c, Box::new(NullListener), 2, config).unwrap();
        for _ in 0..3 {
            assert!(world.spawn_unit(false).unwrap().is_some());
        }
        assert_eq!(world.spawn_unit(false).unwrap(), None);
        assert_eq!(world.units().count(), 3);
    }

    #[test]
    fn add_unit_validation() {
        let mut world = floor_world((4, 4, 3), 0);
        let attrs = Attributes {
            strength: 50,
            agility: 50,
            toughness: 50,
            weight: 50,
        };
        assert!(matches!(
            world.add_unit("Bob", CubeCoord::new(0, 0, 0), attrs, false),
            Err(SimError::IllegalAction(_))
        ));
        assert!(matches!(
            world.add_unit("Bob", CubeCoord::new(9, 0, 1), attrs, false),
            Err(SimError::OutOfBounds { .. })
        ));
        assert!(matches!(
            world.add_unit("bob", CubeCoord::new(0, 0, 1), attrs, false),
            Err(SimError::InvariantViolation(_))
        ));
        assert_eq!(world.units().count(), 0);
        assert!(world.factions().next().is_none());
    }

    #[test]
    fn entities_partitioned_by_kind() {
        let mut world = floor_world((4, 4, 3), 0);
        let cube = CubeCoord::new(1, 1, 1);
        let unit = world.spawn_unit(false).unwrap().unwrap();
        let b = world.add_boulder(cube).unwrap();
        let l = world.add_log(cube).unwrap();
        let here = world.entities_at(cube).unwrap();
        assert_eq!(here.boulders, vec![b]);
        assert_eq!(here.logs, vec![l]);
        let at_unit = world.entities_at(world.unit(unit).unwrap().cube()).unwrap();
        assert!(at_unit.units.contains(&unit));
        assert!(world.entities_at(CubeCoord::new(-1, 0, 0)).is_err());
    }

    #[test]
    fn remove_unit_detaches_everything() {
        let mut world = floor_world((4, 4, 3), 0);
        let id = world.spawn_unit(false).unwrap().unwrap();
        let faction = world.unit(id).unwrap().faction().unwrap();
        let removed = world.remove_unit(id).unwrap();
        assert_eq!(removed.status(), Status::Done);
        assert!(world.unit(id).is_none());
        assert!(world.spatial().locate(EntityRef::Unit(id)).is_empty());
        assert!(!world.faction(faction).unwrap().is_active());
        assert!(matches!(world.remove_unit(id), Err(SimError::UnknownEntity(_))));
    }

    #[test]
    fn same_seed_same_world() {
        let run = |seed| {
            let mut world = floor_world((8, 8, 4), seed);
            for _ in 0..6 {
                world.spawn_unit(true).unwrap();
            }
            for _ in 0..50 {
                world.advance_time(0.1).unwrap();
            }
            world
                .units()
                .map(|u| (u.id(), u.cube(), u.hitpoints().to_bits()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(77), run(77));
    }
}
