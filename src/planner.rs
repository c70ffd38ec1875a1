//! Four-connected A* over the occupancy grid.
//!
//! Every step costs 1 and the heuristic is Manhattan distance. Open-set ties
//! break on lowest `f`, then lowest `h`, then insertion order; neighbours are
//! expanded in the order +x, -x, +y, -y. Identical inputs therefore always
//! produce the identical path.

use crate::grid::{CellType, OccupancyGrid};
use log::{debug, warn};
use rover_common::LogicalCoord;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchNode {
    coord: LogicalCoord,
    f: u32,
    h: u32,
    seq: u64,
}

// BinaryHeap is a max-heap; invert so the smallest (f, h, seq) pops first.
// `coord` closes the ordering so it agrees with the derived `Eq`.
impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn passable(grid: &OccupancyGrid, exclusions: &HashSet<LogicalCoord>, coord: LogicalCoord) -> bool {
    grid.is_traversable(coord) && !exclusions.contains(&coord)
}

/// Shortest 4-connected path from `start` to `goal`, excluding `start` and
/// including `goal`.
///
/// Returns an empty path when either endpoint is out of bounds, when
/// `start == goal`, when the goal is an obstacle or excluded, or when no
/// route exists. The start cell itself is never tested for passability.
pub fn find_path(
    grid: &OccupancyGrid,
    start: LogicalCoord,
    goal: LogicalCoord,
    exclusions: &HashSet<LogicalCoord>,
) -> Vec<LogicalCoord> {
    if !grid.contains(start) || !grid.contains(goal) {
        warn!("Path request {} -> {} leaves the {}x{} grid.", start, goal, grid.size(), grid.size());
        return Vec::new();
    }
    if start == goal {
        return Vec::new();
    }
    if !passable(grid, exclusions, goal) {
        debug!("Goal {} is blocked; no path.", goal);
        return Vec::new();
    }

    let mut open = BinaryHeap::new();
    let mut closed: HashSet<LogicalCoord> = HashSet::new();
    let mut g_score: HashMap<LogicalCoord, u32> = HashMap::new();
    let mut came_from: HashMap<LogicalCoord, LogicalCoord> = HashMap::new();
    let mut seq: u64 = 0;

    let h0 = start.manhattan(goal);
    g_score.insert(start, 0);
    open.push(SearchNode { coord: start, f: h0, h: h0, seq });

    while let Some(node) = open.pop() {
        if node.coord == goal {
            let path = reconstruct(&came_from, start, goal);
            debug!("Path {} -> {}: {} steps, {} nodes expanded.", start, goal, path.len(), closed.len());
            return path;
        }
        // Stale duplicate of an already expanded node
        if !closed.insert(node.coord) {
            continue;
        }

        let g_current = g_score.get(&node.coord).copied().unwrap_or(0);
        for neighbor in node.coord.neighbors4() {
            if closed.contains(&neighbor) || !passable(grid, exclusions, neighbor) {
                continue;
            }
            let tentative = g_current + 1;
            let improved = g_score.get(&neighbor).map_or(true, |&known| tentative < known);
            if improved {
                g_score.insert(neighbor, tentative);
                came_from.insert(neighbor, node.coord);
                seq += 1;
                let h = neighbor.manhattan(goal);
                open.push(SearchNode { coord: neighbor, f: tentative + h, h, seq });
            }
        }
    }

    warn!("No path from {} to {} ({} nodes expanded).", start, goal, closed.len());
    Vec::new()
}

fn reconstruct(
    came_from: &HashMap<LogicalCoord, LogicalCoord>,
    start: LogicalCoord,
    goal: LogicalCoord,
) -> Vec<LogicalCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Empty 8-neighbour of `target` closest (Manhattan) to `from`, for reaching
/// cells the rover may not stand on. Ties keep neighbour order.
pub fn find_nearest_accessible(
    grid: &OccupancyGrid,
    target: LogicalCoord,
    from: LogicalCoord,
) -> Option<LogicalCoord> {
    target
        .neighbors8()
        .into_iter()
        .filter(|c| grid.contains(*c) && grid.get(*c).cell_type == CellType::Empty)
        .min_by_key(|c| c.manhattan(from))
}

/// Chains `find_path` through `stops` into one waypoint list that begins at
/// the first stop. Unreachable stops are skipped with a warning and the next
/// leg is planned from the last reached stop.
pub fn plan_route(
    grid: &OccupancyGrid,
    stops: &[LogicalCoord],
    exclusions: &HashSet<LogicalCoord>,
) -> Vec<LogicalCoord> {
    let Some((&first, rest)) = stops.split_first() else {
        return Vec::new();
    };
    if !grid.contains(first) {
        warn!("Route start {} is outside the grid; no route planned.", first);
        return Vec::new();
    }

    let mut route = vec![first];
    let mut current = first;
    for &stop in rest {
        if stop == current {
            continue;
        }
        let leg = find_path(grid, current, stop, exclusions);
        if leg.is_empty() {
            warn!("Stop {} is unreachable from {}; skipped.", stop, current);
            continue;
        }
        route.extend(leg);
        current = stop;
    }
    debug!("Planned route through {} stops: {} waypoints.", stops.len(), route.len());
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellPatch;

    fn c(x: i32, y: i32) -> LogicalCoord {
        LogicalCoord::new(x, y)
    }

    fn no_exclusions() -> HashSet<LogicalCoord> {
        HashSet::new()
    }

    #[test]
    fn search_node_order_agrees_with_equality() {
        let a = SearchNode { coord: c(0, 0), f: 3, h: 1, seq: 7 };
        let b = SearchNode { coord: c(1, 0), ..a };
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&a), Ordering::Equal);

        let cheaper = SearchNode { f: 2, seq: 9, ..a };
        let mut heap = BinaryHeap::from(vec![a, cheaper, b]);
        assert_eq!(heap.pop(), Some(cheaper));
    }

    fn assert_contiguous(start: LogicalCoord, path: &[LogicalCoord]) {
        let mut prev = start;
        for step in path {
            assert_eq!(prev.manhattan(*step), 1, "{} -> {} is not one step", prev, step);
            prev = *step;
        }
    }

    #[test]
    fn open_grid_path_is_manhattan_length() {
        let grid = OccupancyGrid::new(5).unwrap();
        let path = find_path(&grid, c(-2, -2), c(2, 2), &no_exclusions());
        assert_eq!(path.len(), 8);
        assert_eq!(path.last(), Some(&c(2, 2)));
        assert!(!path.contains(&c(-2, -2)));
        assert_contiguous(c(-2, -2), &path);
    }

    #[test]
    fn straight_line_prefers_positive_x_first() {
        let grid = OccupancyGrid::new(5).unwrap();
        let path = find_path(&grid, c(0, 0), c(1, 1), &no_exclusions());
        assert_eq!(path, vec![c(1, 0), c(1, 1)]);
    }

    #[test]
    fn routes_around_a_wall() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        for y in -2..=1 {
            grid.set(c(0, y), CellPatch::of_type(CellType::Obstacle));
        }
        let path = find_path(&grid, c(-1, 0), c(1, 0), &no_exclusions());
        assert_eq!(path.len(), 6);
        assert!(path.contains(&c(0, 2)));
        assert!(path.iter().all(|p| !grid.get(*p).is_obstacle()));
        assert_contiguous(c(-1, 0), &path);
    }

    #[test]
    fn empty_results() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        assert!(find_path(&grid, c(0, 0), c(0, 0), &no_exclusions()).is_empty());
        assert!(find_path(&grid, c(0, 0), c(3, 0), &no_exclusions()).is_empty());

        grid.set(c(1, 1), CellPatch::of_type(CellType::Obstacle));
        assert!(find_path(&grid, c(0, 0), c(1, 1), &no_exclusions()).is_empty());

        let excluded: HashSet<_> = [c(2, 2)].into_iter().collect();
        assert!(find_path(&grid, c(0, 0), c(2, 2), &excluded).is_empty());
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        for n in c(2, 2).neighbors4() {
            grid.set(n, CellPatch::of_type(CellType::Obstacle));
        }
        assert!(find_path(&grid, c(-2, -2), c(2, 2), &no_exclusions()).is_empty());
    }

    #[test]
    fn plants_are_traversable_unless_excluded() {
        let mut grid = OccupancyGrid::new(3).unwrap();
        grid.set(c(0, 0), CellPatch::plant("basil", 55.0, 25.0));
        let path = find_path(&grid, c(-1, 0), c(1, 0), &no_exclusions());
        assert_eq!(path, vec![c(0, 0), c(1, 0)]);

        let plants: HashSet<_> = grid.cells_of_type(CellType::Plant).into_iter().collect();
        let detour = find_path(&grid, c(-1, 0), c(1, 0), &plants);
        assert_eq!(detour.len(), 4);
        assert!(!detour.contains(&c(0, 0)));
    }

    #[test]
    fn blocked_start_is_not_checked() {
        let mut grid = OccupancyGrid::new(3).unwrap();
        grid.set(c(0, 0), CellPatch::of_type(CellType::Obstacle));
        let path = find_path(&grid, c(0, 0), c(1, 0), &no_exclusions());
        assert_eq!(path, vec![c(1, 0)]);
    }

    #[test]
    fn repeated_queries_match() {
        let mut grid = OccupancyGrid::new(7).unwrap();
        grid.set(c(0, 1), CellPatch::of_type(CellType::Obstacle));
        grid.set(c(1, 0), CellPatch::of_type(CellType::Obstacle));
        let a = find_path(&grid, c(-3, -3), c(3, 3), &no_exclusions());
        let b = find_path(&grid, c(-3, -3), c(3, 3), &no_exclusions());
        assert_eq!(a, b);
    }

    #[test]
    fn nearest_accessible_neighbour() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        grid.set(c(0, 0), CellPatch::plant("tomato", 45.0, 24.0));
        grid.set(c(-1, 0), CellPatch::of_type(CellType::Obstacle));
        let near = find_nearest_accessible(&grid, c(0, 0), c(-2, 0));
        assert_eq!(near.map(|n| n.manhattan(c(-2, 0))), Some(2));
        assert_ne!(near, Some(c(-1, 0)));

        let mut boxed = OccupancyGrid::new(3).unwrap();
        for n in c(0, 0).neighbors8() {
            boxed.set(n, CellPatch::of_type(CellType::Obstacle));
        }
        assert_eq!(find_nearest_accessible(&boxed, c(0, 0), c(1, 1)), None);
    }

    #[test]
    fn route_chains_legs_and_skips_unreachable() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        grid.set(c(2, 2), CellPatch::of_type(CellType::Obstacle));
        let route = plan_route(&grid, &[c(0, 0), c(2, 0), c(2, 2), c(0, 2)], &no_exclusions());
        assert_eq!(route.first(), Some(&c(0, 0)));
        assert_eq!(route.last(), Some(&c(0, 2)));
        assert!(route.contains(&c(2, 0)));
        assert!(!route.contains(&c(2, 2)));
        assert_contiguous(c(0, 0), &route[1..]);
        assert!(plan_route(&grid, &[], &no_exclusions()).is_empty());
    }
}
