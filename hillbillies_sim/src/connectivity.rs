// Incremental border connectivity over solid terrain.
//
// A solid cube is *connected* when a chain of face-adjacent solid cubes links
// it to a boundary cube (any cube with a coordinate at 0 or `dim - 1`). The
// six faces of the bounding box act as one virtual "border" node.
//
// `BorderConnectivity` keeps a per-cube connected flag plus the set of solid
// cubes currently known to be disconnected (collapse candidates). It never
// recomputes the whole grid after construction:
//
// - `mark_passable()` runs one BFS per solid face neighbour of the removed
//   cube. A BFS stops as soon as it reaches the boundary or a cube already
//   proven connected during the same call; a BFS that exhausts its
//   component without doing so marks the whole component disconnected.
// - `mark_solid()` grows the connected region into a newly solid cube (and
//   any disconnected solid component it now anchors).
//
// The grid must already hold the new terrain when either is called.
//
// See also: `grid.rs` for the terrain it reads, `world.rs` for the collapse
// pass that converts candidates to air and feeds the result back in.
//
// **Critical constraint: determinism.** Neighbours are visited in the fixed
// `FACE_OFFSETS` order and candidates are kept in a `BTreeSet`.

use crate::grid::Grid;
use crate::types::CubeCoord;
use std::collections::{BTreeSet, VecDeque};

#[derive(Clone, Debug)]
pub struct BorderConnectivity {
    /// Indexed like `Grid::index`. False for every passable cube.
    connected: Vec<bool>,
    /// Solid cubes whose connected flag is false.
    disconnected: BTreeSet<CubeCoord>,
}

impl BorderConnectivity {
    /// Full flood fill from every solid boundary cube.
    pub fn new(grid: &Grid) -> Self {
        let mut connectivity = Self {
            connected: vec![false; grid.len()],
            disconnected: BTreeSet::new(),
        };
        let mut queue = VecDeque::new();
        for coord in grid.coords() {
            if grid.is_boundary(coord) && grid.is_solid(coord) {
                connectivity.set_connected(grid, coord, true);
                queue.push_back(coord);
            }
        }
        connectivity.spread_connected(grid, queue);
        connectivity.disconnected = grid
            .coords()
            .filter(|&c| grid.is_solid(c) && !connectivity.flag(grid, c))
            .collect();
        connectivity
    }

    /// True iff the cube is solid and linked to the border through solid
    /// cubes.
    pub fn is_connected_to_border(&self, grid: &Grid, coord: CubeCoord) -> bool {
        grid.is_solid(coord) && self.flag(grid, coord)
    }

    /// Solid cubes currently disconnected from the border, in coordinate
    /// order.
    pub fn collapse_candidates(&self) -> impl Iterator<Item = CubeCoord> + '_ {
        self.disconnected.iter().copied()
    }

    pub fn has_collapse_candidates(&self) -> bool {
        !self.disconnected.is_empty()
    }

    /// Record that a previously solid cube became passable. Returns the solid
    /// cubes that lost their border connection as a result.
    pub fn mark_passable(&mut self, grid: &Grid, coord: CubeCoord) -> Vec<CubeCoord> {
        let was_connected = self.flag(grid, coord);
        self.set_connected(grid, coord, false);
        self.disconnected.remove(&coord);
        if !was_connected {
            // Its neighbours could not have depended on it.
            return Vec::new();
        }

        let mut proven = BTreeSet::new();
        let mut lost = Vec::new();
        for start in coord.face_neighbors() {
            if !grid.is_solid(start) || !self.flag(grid, start) || proven.contains(&start) {
                continue;
            }
            match self.search_border(grid, start, &proven) {
                Ok(component) => proven.extend(component),
                Err(component) => {
                    for &cube in &component {
                        self.set_connected(grid, cube, false);
                        self.disconnected.insert(cube);
                    }
                    lost.extend(component);
                }
            }
        }
        lost
    }

    /// Record that a cube became solid.
    pub fn mark_solid(&mut self, grid: &Grid, coord: CubeCoord) {
        let anchored = grid.is_boundary(coord)
            || coord
                .face_neighbors()
                .any(|n| grid.is_solid(n) && self.flag(grid, n));
        if anchored {
            self.set_connected(grid, coord, true);
            self.disconnected.remove(&coord);
            self.spread_connected(grid, VecDeque::from([coord]));
        } else {
            self.set_connected(grid, coord, false);
            self.disconnected.insert(coord);
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn flag(&self, grid: &Grid, coord: CubeCoord) -> bool {
        grid.index(coord).is_some_and(|i| self.connected[i])
    }

    fn set_connected(&mut self, grid: &Grid, coord: CubeCoord, value: bool) {
        if let Some(i) = grid.index(coord) {
            self.connected[i] = value;
        }
    }

    /// BFS outward from already-connected cubes, flagging every solid cube
    /// reached.
    fn spread_connected(&mut self, grid: &Grid, mut queue: VecDeque<CubeCoord>) {
        while let Some(current) = queue.pop_front() {
            for neighbor in current.face_neighbors() {
                if grid.is_solid(neighbor) && !self.flag(grid, neighbor) {
                    self.set_connected(grid, neighbor, true);
                    self.disconnected.remove(&neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    /// BFS over solid cubes from `start`. Returns `Ok(visited)` on reaching
    /// the boundary or a cube in `proven`, `Err(component)` with the whole
    /// solid component otherwise.
    fn search_border(
        &self,
        grid: &Grid,
        start: CubeCoord,
        proven: &BTreeSet<CubeCoord>,
    ) -> Result<Vec<CubeCoord>, Vec<CubeCoord>> {
        let mut visited = BTreeSet::from([start]);
        let mut order = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if grid.is_boundary(current) || proven.contains(&current) {
                return Ok(order);
            }
            for neighbor in current.face_neighbors() {
                if grid.is_solid(neighbor) && visited.insert(neighbor) {
                    order.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        Err(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NullListener;
    use crate::types::TerrainType;

    fn grid_with(dims: (i32, i32, i32), solids: &[(i32, i32, i32)]) -> Grid {
        let mut grid = Grid::filled(dims, TerrainType::Air, Box::new(NullListener)).unwrap();
        for &(x, y, z) in solids {
            grid.set_terrain_at(CubeCoord::new(x, y, z), TerrainType::Rock)
                .unwrap();
        }
        grid
    }

    fn clear(grid: &mut Grid, conn: &mut BorderConnectivity, c: (i32, i32, i32)) -> Vec<CubeCoord> {
        let coord = CubeCoord::new(c.0, c.1, c.2);
        grid.set_terrain_at(coord, TerrainType::Air).unwrap();
        conn.mark_passable(grid, coord)
    }

    #[test]
    fn boundary_solids_are_connected() {
        let grid = grid_with((5, 5, 5), &[(0, 2, 2), (2, 2, 0)]);
        let conn = BorderConnectivity::new(&grid);
        assert!(conn.is_connected_to_border(&grid, CubeCoord::new(0, 2, 2)));
        assert!(conn.is_connected_to_border(&grid, CubeCoord::new(2, 2, 0)));
        assert!(!conn.has_collapse_candidates());
    }

    #[test]
    fn floating_cube_is_candidate_from_start() {
        let grid = grid_with((5, 5, 5), &[(2, 2, 2)]);
        let conn = BorderConnectivity::new(&grid);
        assert!(!conn.is_connected_to_border(&grid, CubeCoord::new(2, 2, 2)));
        assert_eq!(
            conn.collapse_candidates().collect::<Vec<_>>(),
            vec![CubeCoord::new(2, 2, 2)]
        );
    }

    #[test]
    fn air_is_never_connected() {
        let grid = grid_with((3, 3, 3), &[]);
        let conn = BorderConnectivity::new(&grid);
        assert!(!conn.is_connected_to_border(&grid, CubeCoord::new(0, 0, 0)));
        assert!(!conn.is_connected_to_border(&grid, CubeCoord::new(9, 9, 9)));
    }

    #[test]
    fn removing_pillar_base_disconnects_column() {
        // A pillar rising from the floor into the interior.
        let mut grid = grid_with((5, 5, 6), &[(2, 2, 0), (2, 2, 1), (2, 2, 2), (2, 2, 3)]);
        let mut conn = BorderConnectivity::new(&grid);
        assert!(conn.is_connected_to_border(&grid, CubeCoord::new(2, 2, 3)));

        let mut lost = clear(&mut grid, &mut conn, (2, 2, 0));
        lost.sort();
        assert_eq!(
            lost,
            vec![
                CubeCoord::new(2, 2, 1),
                CubeCoord::new(2, 2, 2),
                CubeCoord::new(2, 2, 3)
            ]
        );
        for z in 1..4 {
            assert!(!conn.is_connected_to_border(&grid, CubeCoord::new(2, 2, z)));
        }
        assert_eq!(conn.collapse_candidates().count(), 3);
    }

    #[test]
    fn alternative_path_keeps_connection() {
        // An arch: two legs on the floor joined at the top.
        let mut grid = grid_with(
            (5, 5, 5),
            &[(1, 2, 0), (1, 2, 1), (1, 2, 2), (2, 2, 2), (3, 2, 2), (3, 2, 1), (3, 2, 0)],
        );
        let mut conn = BorderConnectivity::new(&grid);
        let lost = clear(&mut grid, &mut conn, (1, 2, 0));
        assert!(lost.is_empty());
        assert!(conn.is_connected_to_border(&grid, CubeCoord::new(1, 2, 1)));
        assert!(conn.is_connected_to_border(&grid, CubeCoord::new(2, 2, 2)));
    }

    #[test]
    fn removing_disconnected_cube_reports_nothing() {
        let mut grid = grid_with((5, 5, 5), &[(2, 2, 2), (2, 2, 3)]);
        let mut conn = BorderConnectivity::new(&grid);
        let lost = clear(&mut grid, &mut conn, (2, 2, 2));
        assert!(lost.is_empty());
        assert_eq!(
            conn.collapse_candidates().collect::<Vec<_>>(),
            vec![CubeCoord::new(2, 2, 3)]
        );
    }

    #[test]
    fn mark_solid_reconnects_floating_component() {
        let mut grid = grid_with((5, 5, 5), &[(2, 2, 2), (2, 2, 3)]);
        let mut conn = BorderConnectivity::new(&grid);
        assert_eq!(conn.collapse_candidates().count(), 2);

        let base = CubeCoord::new(2, 2, 1);
        let floor = CubeCoord::new(2, 2, 0);
        grid.set_terrain_at(floor, TerrainType::Rock).unwrap();
        conn.mark_solid(&grid, floor);
        grid.set_terrain_at(base, TerrainType::Rock).unwrap();
        conn.mark_solid(&grid, base);

        assert!(!conn.has_collapse_candidates());
        assert!(conn.is_connected_to_border(&grid, CubeCoord::new(2, 2, 3)));
    }

    #[test]
    fn matches_full_recompute_after_removals() {
        // A solid interior slab with some holes punched through it.
        let mut solids = Vec::new();
        for x in 0..6 {
            for y in 0..6 {
                solids.push((x, y, 0));
                if (1..5).contains(&x) && (1..5).contains(&y) {
                    solids.push((x, y, 2));
                }
            }
        }
        solids.extend([(2, 2, 1), (3, 3, 1)]);
        let mut grid = grid_with((6, 6, 5), &solids);
        let mut conn = BorderConnectivity::new(&grid);

        for cube in [(2, 2, 1), (3, 3, 1), (1, 1, 2)] {
            clear(&mut grid, &mut conn, cube);
            let fresh = BorderConnectivity::new(&grid);
            for coord in grid.coords() {
                assert_eq!(
                    conn.is_connected_to_border(&grid, coord),
                    fresh.is_connected_to_border(&grid, coord),
                    "mismatch at {coord}"
                );
            }
        }
    }
}
