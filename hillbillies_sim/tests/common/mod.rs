// Shared fixtures for the integration tests.

#![allow(dead_code)]

use hillbillies_sim::{Attributes, CubeCoord, NullListener, SimConfig, UnitId, World};

pub const ATTRS: Attributes = Attributes {
    strength: 50,
    agility: 50,
    toughness: 50,
    weight: 50,
};

/// All-air terrain codes of the given size.
pub fn air(x: usize, y: usize, z: usize) -> Vec<Vec<Vec<i32>>> {
    vec![vec![vec![0; z]; y]; x]
}

/// Terrain codes with a rock floor at z = 0.
pub fn floored(x: usize, y: usize, z: usize) -> Vec<Vec<Vec<i32>>> {
    let mut codes = air(x, y, z);
    for column in codes.iter_mut().flatten() {
        column[0] = 1;
    }
    codes
}

pub fn world(codes: &[Vec<Vec<i32>>], seed: u64) -> World {
    World::new(codes, Box::new(NullListener), seed).unwrap()
}

pub fn world_with(codes: &[Vec<Vec<i32>>], seed: u64, config: SimConfig) -> World {
    World::with_config(codes, Box::new(NullListener), seed, config).unwrap()
}

pub fn add(world: &mut World, name: &str, cube: CubeCoord) -> UnitId {
    world.add_unit(name, cube, ATTRS, false).unwrap().unwrap()
}
