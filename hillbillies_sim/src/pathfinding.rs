// A* pathfinding over standable cubes.
//
// Implements standard A* search using a `BinaryHeap` (min-heap via reversed
// ordering). Scores and came-from data are stored in `Vec`s indexed by the
// grid's flat cube index for O(1) access and deterministic behavior (no
// `HashMap`).
//
// Walkable cubes are the grid's standable cubes; every step goes to one of
// the 26 neighbouring cubes and costs its Euclidean length (1, √2 or √3).
// The heuristic is the straight-line distance to the goal, which is
// admissible. `Reach::Adjacent` accepts any cube next to the goal, which is
// what following another unit needs.
//
// See also: `physics.rs` which re-plans one step at a time while a unit
// walks, so terrain changes during the walk are honoured.
//
// **Critical constraint: determinism.** A* is a pure function of the grid
// and the start/goal cubes, with `total_cmp` and cube order breaking ties.

use crate::grid::Grid;
use crate::types::CubeCoord;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// When the search counts as arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reach {
    Exact,
    /// The goal cube itself or any of its neighbours.
    Adjacent,
}

/// The result of a successful A* search.
#[derive(Clone, Debug)]
pub struct PathResult {
    /// Cubes from start to goal, inclusive.
    pub cubes: Vec<CubeCoord>,
    pub total_cost: f64,
}

impl PathResult {
    /// The cube to walk into next, `None` when already there.
    pub fn first_step(&self) -> Option<CubeCoord> {
        self.cubes.get(1).copied()
    }
}

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    cube: CubeCoord,
    f_score: f64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.cube == other.cube
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.cube.cmp(&self.cube))
    }
}

fn step_cost(a: CubeCoord, b: CubeCoord) -> f64 {
    a.center().distance_to(b.center())
}

fn arrived(cube: CubeCoord, goal: CubeCoord, reach: Reach) -> bool {
    match reach {
        Reach::Exact => cube == goal,
        Reach::Adjacent => cube.is_adjacent_or_same(goal),
    }
}

/// Find the cheapest walk from `start` to `goal`.
///
/// `start` need not be standable (a unit may stand on a cube whose floor
/// just vanished); every later cube on the path is. Returns `None` if no
/// path exists.
pub fn astar(grid: &Grid, start: CubeCoord, goal: CubeCoord, reach: Reach) -> Option<PathResult> {
    let start_index = grid.index(start)?;
    if arrived(start, goal, reach) {
        return Some(PathResult {
            cubes: vec![start],
            total_cost: 0.0,
        });
    }
    if reach == Reach::Exact && !grid.is_standable(goal) {
        return None;
    }

    let n = grid.len();
    let mut g_score = vec![f64::INFINITY; n];
    let mut came_from: Vec<Option<CubeCoord>> = vec![None; n];
    let mut closed = vec![false; n];
    g_score[start_index] = 0.0;

    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        cube: start,
        f_score: step_cost(start, goal),
    });

    while let Some(current) = open.pop() {
        let Some(ci) = grid.index(current.cube) else {
            continue;
        };
        if arrived(current.cube, goal, reach) {
            return Some(reconstruct_path(grid, &came_from, current.cube, g_score[ci]));
        }
        if closed[ci] {
            continue;
        }
        closed[ci] = true;
        let current_g = g_score[ci];

        for neighbor in current.cube.neighbors() {
            if !grid.is_standable(neighbor) {
                continue;
            }
            let Some(ni) = grid.index(neighbor) else {
                continue;
            };
            if closed[ni] {
                continue;
            }
            let tentative_g = current_g + step_cost(current.cube, neighbor);
            if tentative_g < g_score[ni] {
                g_score[ni] = tentative_g;
                came_from[ni] = Some(current.cube);
                open.push(OpenEntry {
                    cube: neighbor,
                    f_score: tentative_g + step_cost(neighbor, goal),
                });
            }
        }
    }

    None
}

fn reconstruct_path(
    grid: &Grid,
    came_from: &[Option<CubeCoord>],
    end: CubeCoord,
    total_cost: f64,
) -> PathResult {
    let mut cubes = vec![end];
    let mut current = end;
    while let Some(prev) = grid.index(current).and_then(|i| came_from[i]) {
        cubes.push(prev);
        current = prev;
    }
    cubes.reverse();
    PathResult { cubes, total_cost }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NullListener;
    use crate::types::TerrainType;

    fn grid(dims: (i32, i32, i32), rocks: &[(i32, i32, i32)]) -> Grid {
        let mut g = Grid::filled(dims, TerrainType::Air, Box::new(NullListener)).unwrap();
        for &(x, y, z) in rocks {
            g.set_terrain_at(CubeCoord::new(x, y, z), TerrainType::Rock)
                .unwrap();
        }
        g
    }

    #[test]
    fn straight_line_on_floor() {
        let g = grid((5, 1, 2), &[]);
        let path = astar(&g, CubeCoord::new(0, 0, 0), CubeCoord::new(4, 0, 0), Reach::Exact).unwrap();
        assert_eq!(path.cubes.len(), 5);
        assert!((path.total_cost - 4.0).abs() < 1e-9);
        assert_eq!(path.first_step(), Some(CubeCoord::new(1, 0, 0)));
    }

    #[test]
    fn diagonal_is_cheaper_than_manhattan() {
        let g = grid((3, 3, 1), &[]);
        let path = astar(&g, CubeCoord::new(0, 0, 0), CubeCoord::new(2, 2, 0), Reach::Exact).unwrap();
        assert_eq!(path.cubes.len(), 3);
        assert!((path.total_cost - 2.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn climbs_onto_rock() {
        // A wall at x=2 of height 1: the path goes over it.
        let g = grid((5, 1, 3), &[(2, 0, 0)]);
        let path = astar(&g, CubeCoord::new(0, 0, 0), CubeCoord::new(4, 0, 0), Reach::Exact).unwrap();
        assert!(path.cubes.contains(&CubeCoord::new(2, 0, 1)));
        for cube in &path.cubes {
            assert!(g.is_standable(*cube));
        }
    }

    #[test]
    fn unreachable_goal() {
        // Wall of height 2 spanning the whole corridor, no headroom above.
        let g = grid((5, 1, 2), &[(2, 0, 0), (2, 0, 1)]);
        assert!(astar(&g, CubeCoord::new(0, 0, 0), CubeCoord::new(4, 0, 0), Reach::Exact).is_none());
    }

    #[test]
    fn non_standable_goal_is_rejected() {
        let g = grid((3, 3, 3), &[]);
        assert!(astar(&g, CubeCoord::new(0, 0, 0), CubeCoord::new(1, 1, 2), Reach::Exact).is_none());
    }

    #[test]
    fn adjacent_reach_stops_next_to_goal() {
        let g = grid((6, 1, 1), &[]);
        let path = astar(&g, CubeCoord::new(0, 0, 0), CubeCoord::new(5, 0, 0), Reach::Adjacent).unwrap();
        assert_eq!(path.cubes.last(), Some(&CubeCoord::new(4, 0, 0)));
    }
}
