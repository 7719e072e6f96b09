// Spatial index: cube coordinate -> entities occupying it.
//
// Every entity (unit, boulder, log) appears in exactly one bucket, the one
// matching the cube of its current position. The index is updated eagerly
// through `on_entity_moved`, the single move-notification path; nothing ever
// rebuilds it lazily. Empty buckets are deleted so the map only holds
// occupied cubes.
//
// **Critical constraint: determinism.** Buckets are `BTreeSet`s inside a
// `BTreeMap`, so queries return entities in a stable order.

use crate::types::{CubeCoord, EntityRef};
use std::collections::{BTreeMap, BTreeSet};

static EMPTY: BTreeSet<EntityRef> = BTreeSet::new();

#[derive(Clone, Debug, Default)]
pub struct SpatialIndex {
    buckets: BTreeMap<CubeCoord, BTreeSet<EntityRef>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityRef, at: CubeCoord) {
        self.buckets.entry(at).or_default().insert(entity);
    }

    pub fn remove(&mut self, entity: EntityRef, at: CubeCoord) {
        if let Some(bucket) = self.buckets.get_mut(&at) {
            bucket.remove(&entity);
            if bucket.is_empty() {
                self.buckets.remove(&at);
            }
        }
    }

    /// Move an entity between buckets. A no-op when the cube is unchanged.
    pub fn on_entity_moved(&mut self, entity: EntityRef, old: CubeCoord, new: CubeCoord) {
        if old != new {
            self.remove(entity, old);
            self.insert(entity, new);
        }
    }

    /// Entities in a cube; empty for unoccupied cubes.
    pub fn entities_at(&self, at: CubeCoord) -> &BTreeSet<EntityRef> {
        self.buckets.get(&at).unwrap_or(&EMPTY)
    }

    /// Number of occupied cubes.
    pub fn occupied_cubes(&self) -> usize {
        self.buckets.len()
    }

    /// The cube currently holding `entity`, found by scanning all buckets.
    /// Only used by consistency checks.
    pub fn locate(&self, entity: EntityRef) -> Vec<CubeCoord> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| bucket.contains(&entity))
            .map(|(&coord, _)| coord)
            .collect()
    }
}
