#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative maze state for Maze Rescue.
//!
//! The maze is a fixed lattice of cells that starts unexplored. Exploration
//! mutates it exclusively through [`apply`]; every other component reads it
//! through the [`query`] module.

use maze_rescue_core::{CellCoord, Command, Damage, Event, Rejection, WallFlags, WorldPoint};
use thiserror::Error;
use tracing::warn;

pub mod snapshot;

const DEFAULT_GRID_COLUMNS: u32 = 20;
const DEFAULT_GRID_ROWS: u32 = 20;
const DEFAULT_ENTRANCE: CellCoord = CellCoord::new(10, 19);

/// Describes the lattice dimensions and the entrance location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridTuning {
    /// Number of cell columns.
    pub columns: u32,
    /// Number of cell rows.
    pub rows: u32,
    /// Cell through which the robot enters and leaves the maze.
    pub entrance: CellCoord,
}

impl Default for GridTuning {
    fn default() -> Self {
        Self {
            columns: DEFAULT_GRID_COLUMNS,
            rows: DEFAULT_GRID_ROWS,
            entrance: DEFAULT_ENTRANCE,
        }
    }
}

/// Errors raised while constructing a maze.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MazeError {
    /// The grid must contain at least one cell.
    #[error("maze grid must have positive dimensions (received {columns}x{rows})")]
    EmptyGrid {
        /// Requested column count.
        columns: u32,
        /// Requested row count.
        rows: u32,
    },
    /// The entrance must lie inside the grid.
    #[error("entrance ({column}, {row}) lies outside the {columns}x{rows} grid")]
    EntranceOutOfBounds {
        /// Entrance column.
        column: u32,
        /// Entrance row.
        row: u32,
        /// Grid column count.
        columns: u32,
        /// Grid row count.
        rows: u32,
    },
}

/// Single lattice cell with its first authoritative observation.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    coord: CellCoord,
    position: Option<WorldPoint>,
    walls: WallFlags,
    damage: Damage,
    survivor: bool,
    explored: bool,
}

impl Cell {
    fn unexplored(coord: CellCoord) -> Self {
        Self {
            coord,
            position: None,
            walls: WallFlags::default(),
            damage: Damage::Unknown,
            survivor: false,
            explored: false,
        }
    }

    /// Grid coordinate of the cell.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// World coordinate recorded when the cell was first reached.
    #[must_use]
    pub const fn position(&self) -> Option<WorldPoint> {
        self.position
    }

    /// Walls observed around the cell.
    #[must_use]
    pub const fn walls(&self) -> WallFlags {
        self.walls
    }

    /// Floor hazard classification.
    #[must_use]
    pub const fn damage(&self) -> Damage {
        self.damage
    }

    /// Whether a survivor was detected in the cell.
    #[must_use]
    pub const fn has_survivor(&self) -> bool {
        self.survivor
    }

    /// Whether sensor readings were committed to the cell.
    #[must_use]
    pub const fn is_explored(&self) -> bool {
        self.explored
    }

    /// Cost of entering the cell.
    #[must_use]
    pub const fn entry_cost(&self) -> u32 {
        self.damage.entry_cost()
    }
}

/// Represents the authoritative maze map built during exploration.
#[derive(Clone, Debug, PartialEq)]
pub struct Maze {
    columns: u32,
    rows: u32,
    entrance: CellCoord,
    cells: Vec<Cell>,
    traversal: Vec<CellCoord>,
}

impl Maze {
    /// Creates an unexplored maze with the provided dimensions.
    pub fn new(tuning: GridTuning) -> Result<Self, MazeError> {
        let GridTuning {
            columns,
            rows,
            entrance,
        } = tuning;
        if columns == 0 || rows == 0 {
            return Err(MazeError::EmptyGrid { columns, rows });
        }
        if entrance.column() >= columns || entrance.row() >= rows {
            return Err(MazeError::EntranceOutOfBounds {
                column: entrance.column(),
                row: entrance.row(),
                columns,
                rows,
            });
        }

        let mut cells = Vec::with_capacity(cell_capacity(columns, rows));
        for row in 0..rows {
            for column in 0..columns {
                cells.push(Cell::unexplored(CellCoord::new(column, row)));
            }
        }

        Ok(Self {
            columns,
            rows,
            entrance,
            cells,
            traversal: Vec::new(),
        })
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    fn cell_mut(&mut self, cell: CellCoord) -> Option<&mut Cell> {
        let index = self.index(cell)?;
        self.cells.get_mut(index)
    }

    fn push_current(&mut self, cell: CellCoord, position: WorldPoint) -> bool {
        let Some(slot) = self.cell_mut(cell) else {
            return false;
        };
        if slot.position.is_none() {
            slot.position = Some(position);
        }
        self.traversal.push(cell);
        true
    }
}

/// Applies the provided command to the maze, mutating state deterministically.
pub fn apply(maze: &mut Maze, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetEntrance { position } => {
            let cell = maze.entrance;
            if maze.push_current(cell, position) {
                out_events.push(Event::EntranceSet { cell, position });
            } else {
                reject(Rejection::OutOfBounds, out_events);
            }
        }
        Command::DiscoverCell { cell, position } => {
            if maze.push_current(cell, position) {
                out_events.push(Event::CellDiscovered { cell });
            } else {
                reject(Rejection::OutOfBounds, out_events);
            }
        }
        Command::RecordObservation {
            walls,
            damage,
            survivor,
        } => {
            let Some(current) = maze.traversal.last().copied() else {
                reject(Rejection::NoCurrentCell, out_events);
                return;
            };
            let Some(cell) = maze.cell_mut(current) else {
                reject(Rejection::OutOfBounds, out_events);
                return;
            };
            if cell.explored {
                out_events.push(Event::ObservationIgnored { cell: current });
                return;
            }

            cell.walls = walls;
            cell.damage = damage;
            cell.survivor = survivor;
            cell.explored = true;
            out_events.push(Event::CellRecorded {
                cell: current,
                damage,
                survivor,
            });
        }
        Command::Backtrack => match maze.traversal.pop() {
            Some(from) => out_events.push(Event::Backtracked {
                from,
                to: maze.traversal.last().copied(),
            }),
            None => reject(Rejection::NoCurrentCell, out_events),
        },
    }
}

fn reject(reason: Rejection, out_events: &mut Vec<Event>) {
    warn!(?reason, "maze command rejected");
    out_events.push(Event::CommandRejected { reason });
}

fn cell_capacity(columns: u32, rows: u32) -> usize {
    let capacity_u64 = u64::from(columns) * u64::from(rows);
    usize::try_from(capacity_u64).unwrap_or(0)
}

/// Query functions that provide read-only access to the maze state.
pub mod query {
    use super::{Cell, Maze};
    use maze_rescue_core::{CellCoord, WorldPoint};

    /// Provides the dimensions of the lattice as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(maze: &Maze) -> (u32, u32) {
        (maze.columns, maze.rows)
    }

    /// Total number of cells in the lattice.
    #[must_use]
    pub fn cell_count(maze: &Maze) -> usize {
        maze.cells.len()
    }

    /// Cell through which the robot enters the maze.
    #[must_use]
    pub fn entrance(maze: &Maze) -> CellCoord {
        maze.entrance
    }

    /// World coordinate assigned to the entrance, once set.
    #[must_use]
    pub fn entrance_position(maze: &Maze) -> Option<WorldPoint> {
        cell(maze, maze.entrance).and_then(Cell::position)
    }

    /// Retrieves the cell at the provided coordinate, if it lies inside the grid.
    #[must_use]
    pub fn cell(maze: &Maze, coord: CellCoord) -> Option<&Cell> {
        maze.index(coord).and_then(|index| maze.cells.get(index))
    }

    /// Cell at the top of the traversal stack.
    #[must_use]
    pub fn current_cell(maze: &Maze) -> Option<CellCoord> {
        maze.traversal.last().copied()
    }

    /// Number of cells currently on the traversal stack.
    #[must_use]
    pub fn traversal_depth(maze: &Maze) -> usize {
        maze.traversal.len()
    }

    /// Iterates over all cells in row-major order.
    pub fn cells(maze: &Maze) -> impl Iterator<Item = &Cell> {
        maze.cells.iter()
    }

    /// Number of cells that received sensor readings.
    #[must_use]
    pub fn explored_count(maze: &Maze) -> usize {
        maze.cells.iter().filter(|cell| cell.is_explored()).count()
    }

    /// Coordinates of every cell holding a survivor, in row-major order.
    #[must_use]
    pub fn survivor_cells(maze: &Maze) -> Vec<CellCoord> {
        maze.cells
            .iter()
            .filter(|cell| cell.has_survivor())
            .map(Cell::coord)
            .collect()
    }
}
