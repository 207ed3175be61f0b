//! Ground-truth maze layouts used by the simulated robot.

use maze_rescue_core::{CellCoord, Damage, Direction, WallFlags};
use maze_rescue_world::{GridTuning, MazeError};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

const LOOP_ATTEMPTS_PER_OPENING: u32 = 16;

/// Parameters controlling procedural layout generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTuning {
    /// Number of extra walls removed after carving so the maze contains loops.
    pub loop_openings: u32,
    /// Number of survivors placed in dead ends.
    pub survivors: u32,
    /// Number of red floor tiles.
    pub severe_hazards: u32,
    /// Number of orange floor tiles.
    pub light_hazards: u32,
    /// Number of yellow floor tiles.
    pub clear_tiles: u32,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            loop_openings: 24,
            survivors: 3,
            severe_hazards: 12,
            light_hazards: 24,
            clear_tiles: 16,
        }
    }
}

/// Maze ground truth with two-sided walls, floor hazards and survivors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    columns: u32,
    rows: u32,
    entrance: CellCoord,
    walls: Vec<WallFlags>,
    hazards: Vec<Damage>,
    survivors: Vec<bool>,
}

impl Layout {
    /// Creates a layout without interior walls.
    ///
    /// The perimeter is closed except for the south side of the entrance
    /// when it lies on the southern edge.
    pub fn open(grid: GridTuning) -> Result<Self, MazeError> {
        let mut layout = Self::blank(grid, WallFlags::default())?;
        for row in 0..layout.rows {
            for column in 0..layout.columns {
                let cell = CellCoord::new(column, row);
                for direction in Direction::ALL {
                    if direction.neighbor(cell, layout.columns, layout.rows).is_none() {
                        let _ = layout.set_wall(cell, direction, true);
                    }
                }
            }
        }
        layout.open_entrance();
        Ok(layout)
    }

    /// Generates a seeded maze with loops, hazards and survivors.
    pub fn generate(grid: GridTuning, tuning: LayoutTuning, seed: u64) -> Result<Self, MazeError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut layout = Self::blank(grid, WallFlags::CLOSED)?;

        layout.carve(&mut rng);
        layout.open_loops(&mut rng, tuning.loop_openings);
        layout.open_entrance();
        layout.place_survivors(&mut rng, tuning.survivors);
        layout.place_hazards(&mut rng, tuning);

        debug!(
            seed,
            survivors = layout.survivor_cells().len(),
            "layout generated"
        );
        Ok(layout)
    }

    fn blank(grid: GridTuning, walls: WallFlags) -> Result<Self, MazeError> {
        let GridTuning {
            columns,
            rows,
            entrance,
        } = grid;
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
        let count = usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(0);
        Ok(Self {
            columns,
            rows,
            entrance,
            walls: vec![walls; count],
            hazards: vec![Damage::Unknown; count],
            survivors: vec![false; count],
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

    fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.columns).map(move |column| CellCoord::new(column, row)))
    }

    fn open_entrance(&mut self) {
        if self.entrance.row() + 1 == self.rows {
            let entrance = self.entrance;
            if let Some(index) = self.index(entrance) {
                self.walls[index] = self.walls[index].with(Direction::South, false);
            }
        }
    }

    fn carve(&mut self, rng: &mut ChaCha8Rng) {
        let mut visited = vec![false; self.walls.len()];
        let mut stack = vec![self.entrance];
        if let Some(index) = self.index(self.entrance) {
            visited[index] = true;
        }

        while let Some(current) = stack.last().copied() {
            let unvisited: Vec<(Direction, CellCoord)> = Direction::ALL
                .into_iter()
                .filter_map(|direction| {
                    let next = direction.neighbor(current, self.columns, self.rows)?;
                    let index = self.index(next)?;
                    (!visited[index]).then_some((direction, next))
                })
                .collect();

            let Some((direction, next)) = unvisited.choose(rng).copied() else {
                let _ = stack.pop();
                continue;
            };
            let _ = self.set_wall(current, direction, false);
            if let Some(index) = self.index(next) {
                visited[index] = true;
            }
            stack.push(next);
        }
    }

    fn open_loops(&mut self, rng: &mut ChaCha8Rng, openings: u32) {
        let attempts = openings.saturating_mul(LOOP_ATTEMPTS_PER_OPENING);
        let mut opened = 0;
        for _ in 0..attempts {
            if opened >= openings {
                break;
            }
            let cell = CellCoord::new(rng.gen_range(0..self.columns), rng.gen_range(0..self.rows));
            let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
            if direction.neighbor(cell, self.columns, self.rows).is_none() {
                continue;
            }
            if self.walls(cell).is_some_and(|walls| walls.blocks(direction)) {
                let _ = self.set_wall(cell, direction, false);
                opened += 1;
            }
        }
    }

    fn place_survivors(&mut self, rng: &mut ChaCha8Rng, count: u32) {
        let mut dead_ends: Vec<CellCoord> = self
            .cells()
            .filter(|cell| *cell != self.entrance)
            .filter(|cell| {
                self.walls(*cell).is_some_and(|walls| {
                    Direction::ALL
                        .into_iter()
                        .filter(|direction| walls.blocks(*direction))
                        .count()
                        == 3
                })
            })
            .collect();
        dead_ends.shuffle(rng);

        for cell in dead_ends.into_iter().take(to_usize(count)) {
            let _ = self.place_survivor(cell);
        }
    }

    fn place_hazards(&mut self, rng: &mut ChaCha8Rng, tuning: LayoutTuning) {
        let mut floor: Vec<CellCoord> = self
            .cells()
            .filter(|cell| *cell != self.entrance && !self.has_survivor(*cell))
            .collect();
        floor.shuffle(rng);

        let plan = [
            (Damage::Severe, tuning.severe_hazards),
            (Damage::Light, tuning.light_hazards),
            (Damage::Clear, tuning.clear_tiles),
        ];
        let mut tiles = floor.into_iter();
        for (damage, count) in plan {
            for cell in tiles.by_ref().take(to_usize(count)) {
                let _ = self.set_hazard(cell, damage);
            }
        }
    }

    /// Sets or clears the wall on `direction` of `cell` and the matching wall of its neighbour.
    ///
    /// Returns `false` when `cell` lies outside the grid.
    pub fn set_wall(&mut self, cell: CellCoord, direction: Direction, present: bool) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        self.walls[index] = self.walls[index].with(direction, present);
        if let Some(neighbor) = direction
            .neighbor(cell, self.columns, self.rows)
            .and_then(|neighbor| self.index(neighbor))
        {
            self.walls[neighbor] = self.walls[neighbor].with(direction.opposite(), present);
        }
        true
    }

    /// Paints the floor of `cell` with the colour matching `damage`.
    pub fn set_hazard(&mut self, cell: CellCoord, damage: Damage) -> bool {
        match self.index(cell) {
            Some(index) => {
                self.hazards[index] = damage;
                true
            }
            None => false,
        }
    }

    /// Places a survivor marker in `cell`.
    pub fn place_survivor(&mut self, cell: CellCoord) -> bool {
        match self.index(cell) {
            Some(index) => {
                self.survivors[index] = true;
                true
            }
            None => false,
        }
    }

    /// Dimensions of the layout as `(columns, rows)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Entrance cell.
    #[must_use]
    pub const fn entrance(&self) -> CellCoord {
        self.entrance
    }

    /// Walls around `cell`, if it lies inside the grid.
    #[must_use]
    pub fn walls(&self, cell: CellCoord) -> Option<WallFlags> {
        self.index(cell).map(|index| self.walls[index])
    }

    /// Floor classification of `cell`; cells outside the grid are unmarked.
    #[must_use]
    pub fn hazard(&self, cell: CellCoord) -> Damage {
        self.index(cell)
            .map_or(Damage::Unknown, |index| self.hazards[index])
    }

    /// Reports whether `cell` holds a survivor.
    #[must_use]
    pub fn has_survivor(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some_and(|index| self.survivors[index])
    }

    /// Survivor cells in row-major order.
    #[must_use]
    pub fn survivor_cells(&self) -> Vec<CellCoord> {
        self.cells().filter(|cell| self.has_survivor(*cell)).collect()
    }
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
