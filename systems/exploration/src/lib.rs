#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Depth-first exploration of the maze.
//!
//! [`Exploration`] is a pure state machine: every call to
//! [`Exploration::advance`] consumes one [`Observation`] and emits the maze
//! commands and motions the robot must perform next. [`explore`] drives the
//! machine against a live [`Device`] until the maze is mapped and the robot is
//! back at its starting pose.

use std::collections::HashSet;

use maze_rescue_core::{
    device::{perform, read_bearing, Device, DeviceError, Obstructions},
    Bearing, CellCoord, Command, Damage, Direction, Event, Motion, Pose, Rejection, WallFlags,
    WorldPoint,
};
use maze_rescue_system_perception::Perception;
use maze_rescue_world::{apply, query, Maze};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CELL_PITCH: f64 = 0.25;
const DEFAULT_ENTRANCE_OFFSET: f64 = 0.455;
const DEFAULT_SNAP_INCREMENT: f64 = 0.125;

/// Geometry used to translate between grid cells and world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplorationTuning {
    /// Distance between neighbouring cell centres in metres.
    pub cell_pitch: f64,
    /// Distance from the starting position to the entrance cell centre.
    pub entrance_offset: f64,
    /// Increment the entrance coordinate is rounded to.
    pub snap_increment: f64,
}

impl ExplorationTuning {
    fn visit_resolution(&self) -> f64 {
        self.cell_pitch / 2.0
    }
}

impl Default for ExplorationTuning {
    fn default() -> Self {
        Self {
            cell_pitch: DEFAULT_CELL_PITCH,
            entrance_offset: DEFAULT_ENTRANCE_OFFSET,
            snap_increment: DEFAULT_SNAP_INCREMENT,
        }
    }
}

/// Stage of the exploration state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// A new neighbour was selected and entered.
    Discover,
    /// The robot retraced its steps to the latest branch point.
    Backtrack,
    /// The robot retraced its steps to the entrance and returned home.
    Retreat,
    /// Exploration has finished; further observations are ignored.
    Done,
}

/// Floor and survivor readings for a cell that has not been explored yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellReading {
    /// Floor hazard classification.
    pub damage: Damage,
    /// Whether a survivor marker is visible ahead.
    pub survivor: bool,
}

/// Sensor snapshot consumed by a single exploration iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    /// Current heading quantized to a cardinal bearing.
    pub bearing: Bearing,
    /// Live obstruction sensor readings.
    pub obstructions: Obstructions,
    /// Camera readings, present only when the current cell is unexplored.
    pub reading: Option<CellReading>,
}

/// Work requested by the state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Mutate the maze.
    Apply(Command),
    /// Move the robot.
    Drive(Motion),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Location {
    position: WorldPoint,
    cell: CellCoord,
}

/// Depth-first frontier walker with branch-point backtracking.
#[derive(Clone, Debug)]
pub struct Exploration {
    tuning: ExplorationTuning,
    columns: u32,
    rows: u32,
    home: Pose,
    entrance_position: WorldPoint,
    location_stack: Vec<Location>,
    branch_stack: Vec<Location>,
    visited: HashSet<(i64, i64)>,
    phase: Phase,
}

impl Exploration {
    /// Starts exploring from `home`, driving to the entrance cell first.
    ///
    /// The entrance lies `entrance_offset` ahead of the starting position,
    /// snapped to the configured increment.
    pub fn begin(
        maze: &Maze,
        home: Pose,
        tuning: ExplorationTuning,
        out: &mut Vec<Action>,
    ) -> Self {
        let (columns, rows) = query::dimensions(maze);
        let entrance_position = home
            .position
            .stepped(Direction::from_bearing(home.bearing), tuning.entrance_offset)
            .snapped(tuning.snap_increment);
        let entrance = Location {
            position: entrance_position,
            cell: query::entrance(maze),
        };

        out.push(Action::Drive(Motion::MoveTo(entrance_position)));
        out.push(Action::Apply(Command::SetEntrance {
            position: entrance_position,
        }));

        let mut visited = HashSet::new();
        let _ = visited.insert(entrance_position.lattice_key(tuning.visit_resolution()));

        info!(
            x = entrance_position.x,
            y = entrance_position.y,
            "exploration started"
        );

        Self {
            tuning,
            columns,
            rows,
            home,
            entrance_position,
            location_stack: vec![entrance],
            branch_stack: Vec::new(),
            visited,
            phase: Phase::Discover,
        }
    }

    /// Pose recorded before exploration began.
    #[must_use]
    pub const fn home(&self) -> Pose {
        self.home
    }

    /// World coordinate of the entrance cell centre.
    #[must_use]
    pub const fn entrance_position(&self) -> WorldPoint {
        self.entrance_position
    }

    /// Number of distinct locations visited so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Phase reached by the most recent iteration.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Reports whether exploration has terminated.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Runs a single exploration iteration and reports which phase it executed.
    pub fn advance(&mut self, observation: &Observation, out: &mut Vec<Action>) -> Phase {
        if self.is_done() {
            return Phase::Done;
        }
        let Some(current) = self.location_stack.last().copied() else {
            self.phase = Phase::Done;
            return Phase::Done;
        };

        if let Some(reading) = observation.reading {
            out.push(Action::Apply(Command::RecordObservation {
                walls: self.observed_walls(observation),
                damage: reading.damage,
                survivor: reading.survivor,
            }));
        }

        let mut candidates = self.candidates(current, observation);

        if self.visited.len() >= self.cell_total() {
            self.retreat(out);
            return Phase::Retreat;
        }

        let Some(selected) = candidates.pop() else {
            if self.branch_stack.is_empty() {
                debug!("no branch points remain");
                self.retreat(out);
                return Phase::Retreat;
            }
            self.backtrack(out);
            self.phase = Phase::Backtrack;
            return Phase::Backtrack;
        };

        if !candidates.is_empty() {
            self.branch_stack.push(current);
        }
        self.discover(current, selected, out);
        self.phase = Phase::Discover;
        Phase::Discover
    }

    fn cell_total(&self) -> usize {
        usize::try_from(u64::from(self.columns) * u64::from(self.rows)).unwrap_or(usize::MAX)
    }

    fn relative(&self, bearing: Bearing) -> Direction {
        Direction::from_bearing(bearing.relative_to(self.home.bearing))
    }

    fn observed_walls(&self, observation: &Observation) -> WallFlags {
        let bearing = observation.bearing;
        let Obstructions { front, left, right } = observation.obstructions;
        WallFlags::default()
            .with(self.relative(bearing), front)
            .with(self.relative(bearing.right()), right)
            .with(self.relative(bearing.left()), left)
    }

    fn candidates(&self, current: Location, observation: &Observation) -> Vec<Bearing> {
        let bearing = observation.bearing;
        let sensors = observation.obstructions;
        [
            (bearing, sensors.front),
            (bearing.right(), sensors.right),
            (bearing.left(), sensors.left),
        ]
        .into_iter()
        .filter(|(_, blocked)| !blocked)
        .map(|(candidate, _)| candidate)
        .filter(|candidate| {
            let target = current
                .position
                .stepped(Direction::from_bearing(*candidate), self.tuning.cell_pitch);
            !self
                .visited
                .contains(&target.lattice_key(self.tuning.visit_resolution()))
        })
        .filter(|candidate| {
            self.relative(*candidate)
                .neighbor(current.cell, self.columns, self.rows)
                .is_some()
        })
        .collect()
    }

    fn discover(&mut self, current: Location, bearing: Bearing, out: &mut Vec<Action>) {
        let position = current
            .position
            .stepped(Direction::from_bearing(bearing), self.tuning.cell_pitch);
        let Some(cell) = self
            .relative(bearing)
            .neighbor(current.cell, self.columns, self.rows)
        else {
            return;
        };

        out.push(Action::Drive(Motion::MoveTo(position)));
        self.location_stack.push(Location { position, cell });
        let _ = self
            .visited
            .insert(position.lattice_key(self.tuning.visit_resolution()));
        out.push(Action::Apply(Command::DiscoverCell { cell, position }));

        debug!(
            column = cell.column(),
            row = cell.row(),
            visited = self.visited.len(),
            "cell discovered"
        );
    }

    fn backtrack(&mut self, out: &mut Vec<Action>) {
        let resolution = self.tuning.visit_resolution();
        let Some(branch) = self.branch_stack.last().copied() else {
            return;
        };
        let branch_key = branch.position.lattice_key(resolution);

        while let Some(top) = self.location_stack.last().copied() {
            out.push(Action::Drive(Motion::MoveTo(top.position)));
            if top.position.lattice_key(resolution) == branch_key {
                let _ = self.branch_stack.pop();
                break;
            }
            if self.location_stack.len() == 1 {
                self.branch_stack.clear();
                break;
            }
            let _ = self.location_stack.pop();
            out.push(Action::Apply(Command::Backtrack));
        }

        debug!(
            column = branch.cell.column(),
            row = branch.cell.row(),
            "backtracked to branch point"
        );
    }

    fn retreat(&mut self, out: &mut Vec<Action>) {
        info!(visited = self.visited.len(), "retreating to entrance");
        while let Some(top) = self.location_stack.last().copied() {
            out.push(Action::Drive(Motion::MoveTo(top.position)));
            if self.location_stack.len() == 1 {
                break;
            }
            let _ = self.location_stack.pop();
            out.push(Action::Apply(Command::Backtrack));
        }
        self.branch_stack.clear();

        out.push(Action::Drive(Motion::MoveTo(self.home.position)));
        out.push(Action::Drive(Motion::RotateTo(self.home.bearing)));
        self.phase = Phase::Done;
    }
}

/// Errors that abort exploration.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ExplorationError {
    /// The device failed or the host shut down.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// The maze refused a command the explorer issued.
    #[error("maze rejected exploration command: {0:?}")]
    CommandRejected(Rejection),
}

/// Summary of a completed exploration run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplorationOutcome {
    /// Pose recorded before exploration began.
    pub home: Pose,
    /// World coordinate of the entrance cell centre.
    pub entrance_position: WorldPoint,
    /// Number of distinct locations visited.
    pub visited: usize,
    /// Number of exploration iterations executed.
    pub iterations: u64,
}

/// Explores the maze with `device` until every reachable cell is mapped.
///
/// The robot finishes back at the pose it started from.
pub fn explore<D>(
    device: &mut D,
    maze: &mut Maze,
    perception: &Perception,
    tuning: ExplorationTuning,
) -> Result<ExplorationOutcome, ExplorationError>
where
    D: Device + ?Sized,
{
    if !device.advance_step() {
        return Err(DeviceError::HostShutdown.into());
    }
    let home = Pose {
        position: device.current_position(),
        bearing: read_bearing(device)?,
    };

    let mut actions = Vec::new();
    let mut events = Vec::new();
    let mut engine = Exploration::begin(maze, home, tuning, &mut actions);
    execute(device, maze, &mut actions, &mut events)?;

    let mut iterations = 0_u64;
    while !engine.is_done() {
        if !device.advance_step() {
            return Err(DeviceError::HostShutdown.into());
        }
        let observation = observe(device, maze, perception)?;
        let _ = engine.advance(&observation, &mut actions);
        execute(device, maze, &mut actions, &mut events)?;
        iterations += 1;
    }

    info!(
        visited = engine.visited_count(),
        explored = query::explored_count(maze),
        iterations,
        "exploration completed"
    );

    Ok(ExplorationOutcome {
        home: engine.home(),
        entrance_position: engine.entrance_position(),
        visited: engine.visited_count(),
        iterations,
    })
}

fn observe<D>(device: &D, maze: &Maze, perception: &Perception) -> Result<Observation, DeviceError>
where
    D: Device + ?Sized,
{
    let bearing = read_bearing(device)?;
    let obstructions = device.obstructions();
    let unexplored = query::current_cell(maze)
        .and_then(|cell| query::cell(maze, cell))
        .is_some_and(|cell| !cell.is_explored());

    let reading = unexplored.then(|| CellReading {
        damage: perception.classify_floor(&device.floor_image()),
        survivor: perception.detect_survivor(&device.front_image(), obstructions),
    });

    Ok(Observation {
        bearing,
        obstructions,
        reading,
    })
}

fn execute<D>(
    device: &mut D,
    maze: &mut Maze,
    actions: &mut Vec<Action>,
    events: &mut Vec<Event>,
) -> Result<(), ExplorationError>
where
    D: Device + ?Sized,
{
    for action in actions.drain(..) {
        match action {
            Action::Apply(command) => {
                apply(maze, command, events);
                for event in events.drain(..) {
                    if let Event::CommandRejected { reason } = event {
                        return Err(ExplorationError::CommandRejected(reason));
                    }
                    if let Event::CellRecorded {
                        cell,
                        damage,
                        survivor,
                    } = event
                    {
                        debug!(?cell, ?damage, survivor, "cell recorded");
                    }
                }
            }
            Action::Drive(motion) => perform(device, motion)?,
        }
    }
    Ok(())
}
