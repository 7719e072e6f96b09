// Dense 3D terrain grid for the game world.
//
// The grid is stored as a flat `Vec<TerrainType>` indexed by
// `x + y * dim_x + z * dim_x * dim_y`, giving O(1) read/write access.
// Dimensions are fixed at construction. Every public accessor is
// bounds-checked and fails with `SimError::OutOfBounds`; the crate-internal
// `get` returns `Air` out of bounds so geometry helpers need no special cases.
//
// Every `set_terrain_at` call notifies the external `TerrainChangeListener`
// synchronously, before returning, with exactly one call per invocation.
//
// See also: `connectivity.rs` for the border-connectivity bookkeeping kept
// on top of this grid, `world.rs` which owns the `Grid`.
//
// **Critical constraint: determinism.** All terrain modifications go through
// `set_terrain_at`, called only from deterministic sim logic.

use crate::error::SimError;
use crate::types::{CubeCoord, TerrainType};
use std::fmt;

// ---------------------------------------------------------------------------
// Terrain change notification
// ---------------------------------------------------------------------------

/// External sink for terrain changes (e.g. a renderer).
pub trait TerrainChangeListener {
    fn notify_terrain_changed(&mut self, coord: CubeCoord);
}

impl<F: FnMut(CubeCoord)> TerrainChangeListener for F {
    fn notify_terrain_changed(&mut self, coord: CubeCoord) {
        self(coord)
    }
}

/// Listener that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl TerrainChangeListener for NullListener {
    fn notify_terrain_changed(&mut self, _coord: CubeCoord) {}
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Dense 3D terrain grid.
pub struct Grid {
    /// Flat storage: index = x + y * dim_x + z * dim_x * dim_y.
    cells: Vec<TerrainType>,
    dim_x: i32,
    dim_y: i32,
    dim_z: i32,
    listener: Box<dyn TerrainChangeListener>,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("dimensions", &self.dimensions())
            .finish_non_exhaustive()
    }
}

impl Grid {
    /// Create a grid filled with one terrain type.
    pub fn filled(
        dimensions: (i32, i32, i32),
        fill: TerrainType,
        listener: Box<dyn TerrainChangeListener>,
    ) -> Result<Self, SimError> {
        let (dim_x, dim_y, dim_z) = dimensions;
        if dim_x <= 0 || dim_y <= 0 || dim_z <= 0 {
            return Err(SimError::InvariantViolation(format!(
                "grid dimensions must be positive, got {dimensions:?}"
            )));
        }
        let total = dim_x as usize * dim_y as usize * dim_z as usize;
        Ok(Self {
            cells: vec![fill; total],
            dim_x,
            dim_y,
            dim_z,
            listener,
        })
    }

    /// Build a grid from nested terrain codes indexed `codes[x][y][z]`.
    /// The array must be non-empty and rectangular and may only hold the
    /// codes 0..=3.
    pub fn from_codes(
        codes: &[Vec<Vec<i32>>],
        listener: Box<dyn TerrainChangeListener>,
    ) -> Result<Self, SimError> {
        let dim_x = codes.len();
        let dim_y = codes.first().map_or(0, |plane| plane.len());
        let dim_z = codes
            .first()
            .and_then(|plane| plane.first())
            .map_or(0, |column| column.len());
        let mut grid = Self::filled(
            (dim_x as i32, dim_y as i32, dim_z as i32),
            TerrainType::Air,
            listener,
        )?;
        for (x, plane) in codes.iter().enumerate() {
            if plane.len() != dim_y {
                return Err(SimError::InvariantViolation(format!(
                    "terrain plane x={x} has {} rows, expected {dim_y}",
                    plane.len()
                )));
            }
            for (y, column) in plane.iter().enumerate() {
                if column.len() != dim_z {
                    return Err(SimError::InvariantViolation(format!(
                        "terrain column ({x}, {y}) has {} cubes, expected {dim_z}",
                        column.len()
                    )));
                }
                for (z, &code) in column.iter().enumerate() {
                    let terrain = TerrainType::from_code(code).ok_or_else(|| {
                        SimError::InvariantViolation(format!(
                            "unknown terrain code {code} at ({x}, {y}, {z})"
                        ))
                    })?;
                    let coord = CubeCoord::new(x as i32, y as i32, z as i32);
                    if let Some(i) = grid.index(coord) {
                        grid.cells[i] = terrain;
                    }
                }
            }
        }
        Ok(grid)
    }

    pub fn dimensions(&self) -> (i32, i32, i32) {
        (self.dim_x, self.dim_y, self.dim_z)
    }

    /// Total number of cubes.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn in_bounds(&self, coord: CubeCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && coord.x < self.dim_x
            && coord.y < self.dim_y
            && coord.z < self.dim_z
    }

    /// Convert a coordinate to a flat index. Returns `None` if out of bounds.
    pub fn index(&self, coord: CubeCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
            let (dx, dy) = (self.dim_x as usize, self.dim_y as usize);
            Some(x + y * dx + z * dx * dy)
        } else {
            None
        }
    }

    fn checked_index(&self, coord: CubeCoord) -> Result<usize, SimError> {
        self.index(coord).ok_or(SimError::OutOfBounds { coord })
    }

    /// Read a cube's terrain.
    pub fn terrain_at(&self, coord: CubeCoord) -> Result<TerrainType, SimError> {
        self.checked_index(coord).map(|i| self.cells[i])
    }

    /// Replace a cube's terrain and notify the listener if it changed.
    /// Returns the previous terrain.
    pub fn set_terrain_at(
        &mut self,
        coord: CubeCoord,
        terrain: TerrainType,
    ) -> Result<TerrainType, SimError> {
        let i = self.checked_index(coord)?;
        let previous = std::mem::replace(&mut self.cells[i], terrain);
        if previous != terrain {
            self.listener.notify_terrain_changed(coord);
        }
        Ok(previous)
    }

    pub fn is_passable(&self, coord: CubeCoord) -> Result<bool, SimError> {
        self.terrain_at(coord).map(TerrainType::is_passable)
    }

    /// Unchecked read. Returns `Air` for out-of-bounds coordinates.
    pub(crate) fn get(&self, coord: CubeCoord) -> TerrainType {
        self.index(coord)
            .map_or(TerrainType::Air, |i| self.cells[i])
    }

    /// True if the cube is in the world and solid.
    pub fn is_solid(&self, coord: CubeCoord) -> bool {
        self.in_bounds(coord) && self.get(coord).is_solid()
    }

    /// True if some coordinate of the cube lies on a face of the world.
    pub fn is_boundary(&self, coord: CubeCoord) -> bool {
        self.in_bounds(coord)
            && (coord.x == 0
                || coord.y == 0
                || coord.z == 0
                || coord.x == self.dim_x - 1
                || coord.y == self.dim_y - 1
                || coord.z == self.dim_z - 1)
    }

    /// A cube an entity can stand in: in the world, passable, and resting
    /// on the world floor or on a solid cube.
    pub fn is_standable(&self, coord: CubeCoord) -> bool {
        self.in_bounds(coord)
            && self.get(coord).is_passable()
            && (coord.z == 0 || self.get(coord.below()).is_solid())
    }

    /// All cubes in flat-index order (x fastest, z slowest).
    pub fn coords(&self) -> impl Iterator<Item = CubeCoord> + use<> {
        let (dx, dy, dz) = self.dimensions();
        (0..dz).flat_map(move |z| {
            (0..dy).flat_map(move |y| (0..dx).map(move |x| CubeCoord::new(x, y, z)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn air_grid(dims: (i32, i32, i32)) -> Grid {
        Grid::filled(dims, TerrainType::Air, Box::new(NullListener)).unwrap()
    }

    fn codes(dims: (usize, usize, usize)) -> Vec<Vec<Vec<i32>>> {
        vec![vec![vec![0; dims.2]; dims.1]; dims.0]
    }

    #[test]
    fn from_codes_preserves_every_cube() {
        let mut c = codes((3, 4, 5));
        c[1][2][3] = 1;
        c[0][0][0] = 2;
        c[2][3][4] = 3;
        let grid = Grid::from_codes(&c, Box::new(NullListener)).unwrap();
        assert_eq!(grid.dimensions(), (3, 4, 5));
        for coord in grid.coords() {
            let expected = c[coord.x as usize][coord.y as usize][coord.z as usize];
            assert_eq!(grid.terrain_at(coord).unwrap().code(), expected);
        }
    }

    #[test]
    fn unknown_code_is_invariant_violation() {
        let mut c = codes((2, 2, 2));
        c[1][1][1] = 7;
        let err = Grid::from_codes(&c, Box::new(NullListener)).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
    }

    #[test]
    fn ragged_or_empty_arrays_are_rejected() {
        let mut c = codes((2, 2, 2));
        c[1].pop();
        assert!(Grid::from_codes(&c, Box::new(NullListener)).is_err());
        assert!(Grid::from_codes(&[], Box::new(NullListener)).is_err());
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let mut grid = air_grid((2, 3, 4));
        for coord in [
            CubeCoord::new(-1, 0, 0),
            CubeCoord::new(2, 0, 0),
            CubeCoord::new(0, 3, 0),
            CubeCoord::new(0, 0, 4),
        ] {
            assert_eq!(
                grid.terrain_at(coord),
                Err(SimError::OutOfBounds { coord })
            );
            assert!(grid.set_terrain_at(coord, TerrainType::Rock).is_err());
            assert!(grid.is_passable(coord).is_err());
        }
    }

    #[test]
    fn set_terrain_notifies_listener_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut grid = Grid::filled(
            (3, 3, 3),
            TerrainType::Air,
            Box::new(move |c: CubeCoord| sink.borrow_mut().push(c)),
        )
        .unwrap();
        let coord = CubeCoord::new(1, 1, 1);
        let previous = grid.set_terrain_at(coord, TerrainType::Rock).unwrap();
        assert_eq!(previous, TerrainType::Air);
        assert_eq!(grid.terrain_at(coord).unwrap(), TerrainType::Rock);
        assert_eq!(*seen.borrow(), vec![coord]);
    }

    #[test]
    fn rewriting_same_terrain_is_silent() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut grid = Grid::filled(
            (3, 3, 3),
            TerrainType::Rock,
            Box::new(move |c: CubeCoord| sink.borrow_mut().push(c)),
        )
        .unwrap();
        let coord = CubeCoord::new(0, 1, 2);
        assert_eq!(grid.set_terrain_at(coord, TerrainType::Rock), Ok(TerrainType::Rock));
        assert!(seen.borrow().is_empty());
        grid.set_terrain_at(coord, TerrainType::Workshop).unwrap();
        grid.set_terrain_at(coord, TerrainType::Workshop).unwrap();
        assert_eq!(*seen.borrow(), vec![coord]);
    }

    #[test]
    fn indexing_is_correct() {
        let grid = air_grid((4, 5, 6));
        let mut seen = std::collections::BTreeSet::new();
        for coord in grid.coords() {
            assert!(seen.insert(grid.index(coord).unwrap()));
        }
        assert_eq!(seen.len(), grid.len());
        assert_eq!(grid.index(CubeCoord::new(1, 2, 3)), Some(1 + 2 * 4 + 3 * 20));
    }

    #[test]
    fn boundary_detection() {
        let grid = air_grid((3, 3, 3));
        assert!(!grid.is_boundary(CubeCoord::new(1, 1, 1)));
        assert!(grid.is_boundary(CubeCoord::new(0, 1, 1)));
        assert!(grid.is_boundary(CubeCoord::new(1, 2, 1)));
        assert!(grid.is_boundary(CubeCoord::new(1, 1, 0)));
        assert!(!grid.is_boundary(CubeCoord::new(3, 1, 1)));
    }

    #[test]
    fn standable_needs_floor_or_solid_below() {
        let mut grid = air_grid((3, 3, 3));
        assert!(grid.is_standable(CubeCoord::new(1, 1, 0)));
        assert!(!grid.is_standable(CubeCoord::new(1, 1, 1)));
        grid.set_terrain_at(CubeCoord::new(1, 1, 0), TerrainType::Rock)
            .unwrap();
        assert!(!grid.is_standable(CubeCoord::new(1, 1, 0)));
        assert!(grid.is_standable(CubeCoord::new(1, 1, 1)));
        grid.set_terrain_at(CubeCoord::new(1, 1, 1), TerrainType::Workshop)
            .unwrap();
        assert!(grid.is_standable(CubeCoord::new(1, 1, 1)));
    }
}
