#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Maze Rescue engine.
//!
//! This crate defines the message surface that connects the device boundary,
//! the authoritative maze, and pure systems. Systems submit [`Command`] values
//! describing desired maze mutations, the world executes those commands via
//! its `apply` entry point, and then reports [`Event`] values describing what
//! changed. Physical motion is expressed separately through [`Motion`] values
//! that drivers hand to a [`device::Device`].

use serde::{Deserialize, Serialize};

pub mod device;

/// Commands that express all permissible maze mutations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Assigns the entrance cell's world coordinate and seeds the traversal stack with it.
    SetEntrance {
        /// World coordinate of the entrance cell centre.
        position: WorldPoint,
    },
    /// Registers a newly reached neighbour and makes it the current cell.
    DiscoverCell {
        /// Grid coordinate of the discovered cell.
        cell: CellCoord,
        /// World coordinate observed when the robot arrived.
        position: WorldPoint,
    },
    /// Commits sensor readings to the current cell unless it was already explored.
    RecordObservation {
        /// Walls observed around the cell.
        walls: WallFlags,
        /// Floor hazard classification.
        damage: Damage,
        /// Whether a survivor marker was detected.
        survivor: bool,
    },
    /// Pops the current cell off the traversal stack without touching cell data.
    Backtrack,
}

/// Events reported by the world after processing commands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the entrance was anchored in world space.
    EntranceSet {
        /// Grid coordinate of the entrance.
        cell: CellCoord,
        /// World coordinate assigned to the entrance.
        position: WorldPoint,
    },
    /// Confirms that a cell was pushed onto the traversal stack.
    CellDiscovered {
        /// Grid coordinate of the discovered cell.
        cell: CellCoord,
    },
    /// Confirms that sensor readings were committed to a cell.
    CellRecorded {
        /// Cell that received the readings.
        cell: CellCoord,
        /// Classification stored for the cell.
        damage: Damage,
        /// Whether a survivor was stored for the cell.
        survivor: bool,
    },
    /// Reports that readings for an already explored cell were discarded.
    ObservationIgnored {
        /// Cell whose first observation stays authoritative.
        cell: CellCoord,
    },
    /// Confirms that the traversal stack was popped.
    Backtracked {
        /// Cell that was popped.
        from: CellCoord,
        /// Cell that became current, if any remain.
        to: Option<CellCoord>,
    },
    /// Reports that a command could not be applied.
    CommandRejected {
        /// Specific reason the command failed.
        reason: Rejection,
    },
}

/// Reasons a maze command may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    /// The referenced cell lies outside the configured grid.
    OutOfBounds,
    /// The traversal stack is empty so there is no current cell.
    NoCurrentCell,
}

/// Physical motion requests executed by a device driver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Motion {
    /// Rotate toward the point and drive forward onto it.
    MoveTo(WorldPoint),
    /// Rotate away from the point and drive backward onto it.
    MoveToReversed(WorldPoint),
    /// Rotate in place to the provided cardinal bearing.
    RotateTo(Bearing),
    /// Stay in place for the provided number of simulation steps.
    Hold {
        /// Number of steps to wait.
        steps: u64,
    },
}

/// Sampled RGB colour with byte channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    red: u8,
    green: u8,
    blue: u8,
}

impl Rgb {
    /// Creates a new colour from byte RGB components.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Red component of the color.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.red
    }

    /// Green component of the color.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.green
    }

    /// Blue component of the color.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.blue
    }
}

/// Cardinal directions in the maze frame.
///
/// `North` points toward decreasing row indices, which corresponds to the
/// robot's initial heading when exploration begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward decreasing row indices.
    North,
    /// Toward increasing column indices.
    East,
    /// Toward increasing row indices.
    South,
    /// Toward decreasing column indices.
    West,
}

impl Direction {
    /// All directions in wall-flag order (north, south, east, west).
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Maps a bearing onto a direction using the east-north-up convention.
    ///
    /// Bearings grow counter-clockwise: 0° is north, 90° west, 180° south and
    /// 270° east.
    #[must_use]
    pub const fn from_bearing(bearing: Bearing) -> Self {
        match bearing {
            Bearing::Zero => Self::North,
            Bearing::Quarter => Self::West,
            Bearing::Half => Self::South,
            Bearing::ThreeQuarter => Self::East,
        }
    }

    /// Bearing that points along this direction.
    #[must_use]
    pub const fn bearing(self) -> Bearing {
        match self {
            Self::North => Bearing::Zero,
            Self::West => Bearing::Quarter,
            Self::South => Bearing::Half,
            Self::East => Bearing::ThreeQuarter,
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// World-space displacement of a step of `distance` along this direction.
    ///
    /// World space is east-north-up, so north increases `y`.
    #[must_use]
    pub fn world_step(self, distance: f64) -> (f64, f64) {
        match self {
            Self::North => (0.0, distance),
            Self::South => (0.0, -distance),
            Self::East => (distance, 0.0),
            Self::West => (-distance, 0.0),
        }
    }

    /// Neighbouring cell in this direction, if it lies inside the grid.
    #[must_use]
    pub fn neighbor(self, cell: CellCoord, columns: u32, rows: u32) -> Option<CellCoord> {
        let (column, row) = match self {
            Self::North => (Some(cell.column()), cell.row().checked_sub(1)),
            Self::South => (Some(cell.column()), cell.row().checked_add(1)),
            Self::East => (cell.column().checked_add(1), Some(cell.row())),
            Self::West => (cell.column().checked_sub(1), Some(cell.row())),
        };
        let (column, row) = (column?, row?);
        if column < columns && row < rows {
            Some(CellCoord::new(column, row))
        } else {
            None
        }
    }
}

/// Heading quantized to the nearest cardinal bearing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bearing {
    /// 0 degrees.
    Zero,
    /// 90 degrees.
    Quarter,
    /// 180 degrees.
    Half,
    /// 270 degrees.
    ThreeQuarter,
}

impl Bearing {
    /// Rounds a raw compass heading to the nearest cardinal bearing.
    #[must_use]
    pub fn nearest(degrees: f64) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let quarter = (normalized / 90.0).round() as i64;
        Self::from_quarters(quarter)
    }

    /// Bearing expressed in whole degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Zero => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }

    /// Bearing after a quarter turn to the left (counter-clockwise).
    #[must_use]
    pub fn left(self) -> Self {
        Self::from_quarters(self.quarters() + 1)
    }

    /// Bearing after a quarter turn to the right (clockwise).
    #[must_use]
    pub fn right(self) -> Self {
        Self::from_quarters(self.quarters() - 1)
    }

    /// Bearing measured relative to `reference`.
    #[must_use]
    pub fn relative_to(self, reference: Bearing) -> Self {
        Self::from_quarters(self.quarters() - reference.quarters())
    }

    fn quarters(self) -> i64 {
        i64::from(self.degrees() / 90)
    }

    fn from_quarters(quarters: i64) -> Self {
        match quarters.rem_euclid(4) {
            0 => Self::Zero,
            1 => Self::Quarter,
            2 => Self::Half,
            _ => Self::ThreeQuarter,
        }
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Direction of travel between two orthogonally adjacent cells.
    #[must_use]
    pub fn direction_to(self, other: CellCoord) -> Option<Direction> {
        let column_diff = self.column().abs_diff(other.column());
        let row_diff = self.row().abs_diff(other.row());
        if column_diff + row_diff != 1 {
            return None;
        }

        if column_diff == 1 {
            if other.column() > self.column() {
                Some(Direction::East)
            } else {
                Some(Direction::West)
            }
        } else if other.row() > self.row() {
            Some(Direction::South)
        } else {
            Some(Direction::North)
        }
    }
}

/// Position in the east-north-up world frame measured in metres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
}

impl WorldPoint {
    /// Creates a new world coordinate.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point reached after stepping `distance` along `direction`.
    #[must_use]
    pub fn stepped(self, direction: Direction, distance: f64) -> Self {
        let (dx, dy) = direction.world_step(distance);
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(self, other: WorldPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Rounds both coordinates to the nearest multiple of `increment`.
    #[must_use]
    pub fn snapped(self, increment: f64) -> Self {
        if increment <= 0.0 {
            return self;
        }
        Self::new(
            (self.x / increment).round() * increment,
            (self.y / increment).round() * increment,
        )
    }

    /// Integer lattice key identifying the point at the provided resolution.
    ///
    /// Two points that differ by less than half the resolution share a key,
    /// so accumulated floating-point drift never splits one location in two.
    #[must_use]
    pub fn lattice_key(self, resolution: f64) -> (i64, i64) {
        let resolution = if resolution > 0.0 { resolution } else { 1.0 };
        (
            (self.x / resolution).round() as i64,
            (self.y / resolution).round() as i64,
        )
    }
}

/// Robot pose captured at a single instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position of the robot.
    pub position: WorldPoint,
    /// Cardinal heading of the robot.
    pub bearing: Bearing,
}

/// Walls observed around a single cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallFlags {
    /// Wall along the north edge.
    pub north: bool,
    /// Wall along the south edge.
    pub south: bool,
    /// Wall along the east edge.
    pub east: bool,
    /// Wall along the west edge.
    pub west: bool,
}

impl WallFlags {
    /// Cell enclosed on every side.
    pub const CLOSED: WallFlags = WallFlags {
        north: true,
        south: true,
        east: true,
        west: true,
    };

    /// Reports whether travel in `direction` is blocked.
    #[must_use]
    pub const fn blocks(&self, direction: Direction) -> bool {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    /// Returns a copy with the wall in `direction` set to `present`.
    #[must_use]
    pub fn with(mut self, direction: Direction, present: bool) -> Self {
        match direction {
            Direction::North => self.north = present,
            Direction::South => self.south = present,
            Direction::East => self.east = present,
            Direction::West => self.west = present,
        }
        self
    }

    /// Flags encoded as `[north, south, east, west]` zero/one values.
    #[must_use]
    pub const fn to_bits(self) -> [u8; 4] {
        [
            self.north as u8,
            self.south as u8,
            self.east as u8,
            self.west as u8,
        ]
    }

    /// Decodes `[north, south, east, west]` values; any non-zero value is a wall.
    #[must_use]
    pub const fn from_bits(bits: [u8; 4]) -> Self {
        Self {
            north: bits[0] != 0,
            south: bits[1] != 0,
            east: bits[2] != 0,
            west: bits[3] != 0,
        }
    }
}

/// Floor hazard classification recorded for a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Damage {
    /// No reference colour matched the floor sample.
    #[default]
    Unknown,
    /// Yellow floor marking.
    Clear,
    /// Orange floor marking.
    Light,
    /// Red floor marking.
    Severe,
}

impl Damage {
    /// Cost of entering a cell carrying this classification.
    #[must_use]
    pub const fn entry_cost(self) -> u32 {
        match self {
            Self::Unknown => 1,
            Self::Clear => 0,
            Self::Light => 10,
            Self::Severe => 40,
        }
    }

    /// Numeric code used by persisted snapshots.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Unknown => -1,
            Self::Clear => 0,
            Self::Light => 10,
            Self::Severe => 40,
        }
    }

    /// Decodes a persisted damage code.
    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Self::Unknown),
            0 => Some(Self::Clear),
            10 => Some(Self::Light),
            40 => Some(Self::Severe),
            _ => None,
        }
    }

    /// Reports whether the robot may leave reversed driving on this floor.
    #[must_use]
    pub const fn is_benign(self) -> bool {
        matches!(self, Self::Unknown | Self::Clear)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bearing, CellCoord, Damage, Direction, Rejection, WallFlags, WorldPoint};
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn damage_round_trips_through_bincode() {
        assert_round_trip(&Damage::Severe);
        assert_round_trip(&Damage::Unknown);
    }

    #[test]
    fn rejection_round_trips_through_bincode() {
        assert_round_trip(&Rejection::OutOfBounds);
    }

    #[test]
    fn wall_flags_round_trip_through_bincode() {
        let walls = WallFlags::default()
            .with(Direction::North, true)
            .with(Direction::West, true);
        assert_round_trip(&walls);
    }

    #[test]
    fn bearing_rounds_to_nearest_cardinal() {
        assert_eq!(Bearing::nearest(3.0), Bearing::Zero);
        assert_eq!(Bearing::nearest(358.0), Bearing::Zero);
        assert_eq!(Bearing::nearest(91.5), Bearing::Quarter);
        assert_eq!(Bearing::nearest(-90.0), Bearing::ThreeQuarter);
        assert_eq!(Bearing::nearest(224.0), Bearing::Half);
    }

    #[test]
    fn bearing_turns_wrap_around() {
        assert_eq!(Bearing::Zero.left(), Bearing::Quarter);
        assert_eq!(Bearing::Zero.right(), Bearing::ThreeQuarter);
        assert_eq!(Bearing::ThreeQuarter.left(), Bearing::Zero);
        assert_eq!(
            Bearing::Quarter.relative_to(Bearing::Half),
            Bearing::ThreeQuarter
        );
    }

    #[test]
    fn bearings_map_to_enu_directions() {
        assert_eq!(Direction::from_bearing(Bearing::Zero), Direction::North);
        assert_eq!(Direction::from_bearing(Bearing::Quarter), Direction::West);
        assert_eq!(Direction::from_bearing(Bearing::Half), Direction::South);
        assert_eq!(
            Direction::from_bearing(Bearing::ThreeQuarter),
            Direction::East
        );
        for direction in Direction::ALL {
            assert_eq!(Direction::from_bearing(direction.bearing()), direction);
        }
    }

    #[test]
    fn neighbor_respects_grid_bounds() {
        let corner = CellCoord::new(0, 0);
        assert_eq!(Direction::North.neighbor(corner, 3, 3), None);
        assert_eq!(Direction::West.neighbor(corner, 3, 3), None);
        assert_eq!(
            Direction::South.neighbor(corner, 3, 3),
            Some(CellCoord::new(0, 1))
        );
        assert_eq!(Direction::East.neighbor(CellCoord::new(2, 0), 3, 3), None);
    }

    #[test]
    fn direction_to_neighbors() {
        let origin = CellCoord::new(3, 3);
        assert_eq!(
            origin.direction_to(CellCoord::new(3, 2)),
            Some(Direction::North)
        );
        assert_eq!(
            origin.direction_to(CellCoord::new(4, 3)),
            Some(Direction::East)
        );
        assert_eq!(origin.direction_to(origin), None);
    }

    #[test]
    fn world_steps_follow_enu_axes() {
        let origin = WorldPoint::new(0.5, 0.5);
        assert_eq!(
            origin.stepped(Direction::North, 0.25),
            WorldPoint::new(0.5, 0.75)
        );
        assert_eq!(
            origin.stepped(Direction::West, 0.25),
            WorldPoint::new(0.25, 0.5)
        );
    }

    #[test]
    fn snapping_rounds_to_increment() {
        let snapped = WorldPoint::new(0.13, -0.49).snapped(0.125);
        assert_eq!(snapped, WorldPoint::new(0.125, -0.5));
    }

    #[test]
    fn lattice_key_absorbs_float_drift() {
        let exact = WorldPoint::new(0.75, -1.25);
        let drifted = WorldPoint::new(0.75 + 1e-9, -1.25 - 1e-9);
        assert_eq!(exact.lattice_key(0.125), drifted.lattice_key(0.125));
    }

    #[test]
    fn damage_costs_follow_classification() {
        assert_eq!(Damage::Unknown.entry_cost(), 1);
        assert_eq!(Damage::Clear.entry_cost(), 0);
        assert_eq!(Damage::Light.entry_cost(), 10);
        assert_eq!(Damage::Severe.entry_cost(), 40);
        for damage in [Damage::Unknown, Damage::Clear, Damage::Light, Damage::Severe] {
            assert_eq!(Damage::from_code(damage.code()), Some(damage));
        }
        assert_eq!(Damage::from_code(7), None);
    }

    #[test]
    fn wall_bits_round_trip() {
        let walls = WallFlags::from_bits([1, 0, 0, 1]);
        assert!(walls.blocks(Direction::North));
        assert!(walls.blocks(Direction::West));
        assert!(!walls.blocks(Direction::East));
        assert_eq!(walls.to_bits(), [1, 0, 0, 1]);
    }
}
