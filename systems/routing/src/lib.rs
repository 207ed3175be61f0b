#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Route planning over the explored maze.
//!
//! [`a_star`] finds the cheapest single path between two cells,
//! [`find_rescue_route`] chains those paths greedily through every survivor
//! and back to the exit, and [`normalize_route`] compresses a cell path into
//! the turn points a driver needs to visit.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use maze_rescue_core::{CellCoord, Direction};
use maze_rescue_world::{query, Maze};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while composing a rescue route.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// No path leads from the last visited cell back to the exit.
    #[error("exit {exit:?} is unreachable from {from:?}")]
    ExitUnreachable {
        /// Cell the final leg would have started from.
        from: CellCoord,
        /// Requested exit cell.
        exit: CellCoord,
    },
}

#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    estimate: u32,
    order: u64,
    cost: u32,
    cell: CellCoord,
}

// Equality follows the heap key so it agrees with `Ord`.
impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.estimate == other.estimate && self.order == other.order
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest path from `start` to `goal`, inclusive of both ends.
///
/// Entering a cell costs its [`maze_rescue_core::Damage::entry_cost`]; the
/// heuristic is the Manhattan distance. Expansion honours the walls of the
/// cell being expanded. Returns `None` when the goal cannot be reached or
/// either endpoint lies outside the grid.
#[must_use]
pub fn a_star(maze: &Maze, start: CellCoord, goal: CellCoord) -> Option<Vec<CellCoord>> {
    let _ = query::cell(maze, start)?;
    let _ = query::cell(maze, goal)?;
    let (columns, rows) = query::dimensions(maze);

    let mut open = BinaryHeap::new();
    let mut best_cost: HashMap<CellCoord, u32> = HashMap::new();
    let mut came_from: HashMap<CellCoord, CellCoord> = HashMap::new();
    let mut order = 0_u64;

    let _ = best_cost.insert(start, 0);
    open.push(OpenEntry {
        estimate: start.manhattan_distance(goal),
        order,
        cost: 0,
        cell: start,
    });

    while let Some(OpenEntry { cost, cell, .. }) = open.pop() {
        if cell == goal {
            return Some(reconstruct(&came_from, start, goal));
        }
        if best_cost.get(&cell).is_some_and(|best| cost > *best) {
            continue;
        }

        let Some(current) = query::cell(maze, cell) else {
            continue;
        };
        let walls = current.walls();

        for direction in Direction::ALL {
            if walls.blocks(direction) {
                continue;
            }
            let Some(next) = direction.neighbor(cell, columns, rows) else {
                continue;
            };
            let Some(next_cell) = query::cell(maze, next) else {
                continue;
            };

            let tentative = cost.saturating_add(next_cell.entry_cost());
            if best_cost.get(&next).is_some_and(|known| tentative >= *known) {
                continue;
            }

            let _ = best_cost.insert(next, tentative);
            let _ = came_from.insert(next, cell);
            order += 1;
            open.push(OpenEntry {
                estimate: tentative.saturating_add(next.manhattan_distance(goal)),
                order,
                cost: tentative,
                cell: next,
            });
        }
    }

    None
}

fn reconstruct(
    came_from: &HashMap<CellCoord, CellCoord>,
    start: CellCoord,
    goal: CellCoord,
) -> Vec<CellCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(previous) => {
                current = *previous;
                path.push(current);
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Sum of entry costs along `path`, excluding the starting cell.
#[must_use]
pub fn path_cost(maze: &Maze, path: &[CellCoord]) -> u32 {
    path.iter()
        .skip(1)
        .filter_map(|cell| query::cell(maze, *cell))
        .map(|cell| cell.entry_cost())
        .sum()
}

/// Reason a leg of the rescue route is driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LegPurpose {
    /// The leg ends at a survivor that must be extracted.
    Rescue,
    /// The leg returns to the exit.
    Exit,
}

/// Single A* path between two consecutive stops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteLeg {
    purpose: LegPurpose,
    cells: Vec<CellCoord>,
}

impl RouteLeg {
    /// Why the leg is driven.
    #[must_use]
    pub const fn purpose(&self) -> LegPurpose {
        self.purpose
    }

    /// Cells of the leg, including both endpoints.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Final cell of the leg.
    #[must_use]
    pub fn destination(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }

    /// Number of moves needed to drive the leg.
    #[must_use]
    pub fn length(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }
}

/// Greedy multi-target route through every reachable survivor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RescueRoute {
    start: CellCoord,
    legs: Vec<RouteLeg>,
    unreachable: Vec<CellCoord>,
}

impl RescueRoute {
    /// Cell the route starts from.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        self.start
    }

    /// Legs in driving order; the last leg returns to the exit.
    #[must_use]
    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    /// Targets for which no path exists.
    #[must_use]
    pub fn unreachable(&self) -> &[CellCoord] {
        &self.unreachable
    }

    /// Survivor cells in the order they are visited.
    #[must_use]
    pub fn stops(&self) -> Vec<CellCoord> {
        self.legs
            .iter()
            .filter(|leg| leg.purpose == LegPurpose::Rescue)
            .filter_map(RouteLeg::destination)
            .collect()
    }

    /// Full cell sequence: the start followed by each leg without its first cell.
    #[must_use]
    pub fn cells(&self) -> Vec<CellCoord> {
        let mut cells = vec![self.start];
        for leg in &self.legs {
            cells.extend(leg.cells.iter().skip(1));
        }
        cells
    }
}

/// Builds a rescue route that visits every reachable target and ends at `exit`.
///
/// Each round runs A* from the current cell to every remaining target and
/// commits to the shortest path by number of moves; ties go to the target
/// listed first. Unreachable targets are reported on the route rather than
/// failing the plan.
pub fn find_rescue_route(
    maze: &Maze,
    start: CellCoord,
    targets: &[CellCoord],
    exit: CellCoord,
) -> Result<RescueRoute, RouteError> {
    let mut remaining: Vec<CellCoord> = targets.to_vec();
    let mut legs = Vec::with_capacity(targets.len() + 1);
    let mut unreachable = Vec::new();
    let mut current = start;

    while !remaining.is_empty() {
        let mut nearest: Option<(usize, Vec<CellCoord>)> = None;
        let mut index = 0;
        while index < remaining.len() {
            let target = remaining[index];
            match a_star(maze, current, target) {
                Some(path) => {
                    if nearest
                        .as_ref()
                        .map_or(true, |(_, best)| path.len() < best.len())
                    {
                        nearest = Some((index, path));
                    }
                    index += 1;
                }
                None => {
                    warn!(?target, from = ?current, "rescue target unreachable");
                    unreachable.push(remaining.remove(index));
                }
            }
        }

        let Some((index, path)) = nearest else {
            break;
        };
        let target = remaining.remove(index);
        debug!(?target, moves = path.len() - 1, "rescue leg planned");
        current = target;
        legs.push(RouteLeg {
            purpose: LegPurpose::Rescue,
            cells: path,
        });
    }

    let exit_path = a_star(maze, current, exit).ok_or(RouteError::ExitUnreachable {
        from: current,
        exit,
    })?;
    legs.push(RouteLeg {
        purpose: LegPurpose::Exit,
        cells: exit_path,
    });

    Ok(RescueRoute {
        start,
        legs,
        unreachable,
    })
}

/// Direction of a single step between consecutive cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepDirection {
    /// Toward decreasing row indices.
    Up,
    /// Toward increasing row indices.
    Down,
    /// Toward decreasing column indices.
    Left,
    /// Toward increasing column indices.
    Right,
}

impl StepDirection {
    /// Classifies the step from `from` to `to`.
    #[must_use]
    pub fn between(from: CellCoord, to: CellCoord) -> Self {
        if from.column() == to.column() {
            if to.row() > from.row() {
                Self::Down
            } else {
                Self::Up
            }
        } else if to.column() > from.column() {
            Self::Right
        } else {
            Self::Left
        }
    }
}

/// Keeps the first cell, every cell where the direction changes, and the last cell.
///
/// Paths with at most two cells are returned unchanged.
#[must_use]
pub fn normalize_route(path: &[CellCoord]) -> Vec<CellCoord> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut waypoints = vec![path[0]];
    let mut previous: Option<StepDirection> = None;
    for pair in path.windows(2) {
        let direction = StepDirection::between(pair[0], pair[1]);
        if previous.is_some_and(|last| last != direction) {
            waypoints.push(pair[0]);
        }
        previous = Some(direction);
    }
    if let Some(last) = path.last() {
        waypoints.push(*last);
    }
    waypoints
}
