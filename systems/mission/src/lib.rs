#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Rescue mission executed once the maze has been explored.
//!
//! The mission plans a greedy route through every detected survivor, drives
//! the turn points of each leg, holds at each survivor for the extraction
//! delay and finally returns the robot to the pose it started from.

use std::time::Duration;

use maze_rescue_core::{
    device::{perform, steps_for, Device, DeviceError},
    CellCoord, Motion, Pose, WorldPoint,
};
use maze_rescue_system_exploration::{
    explore, ExplorationError, ExplorationOutcome, ExplorationTuning,
};
use maze_rescue_system_perception::Perception;
use maze_rescue_system_routing::{
    find_rescue_route, normalize_route, LegPurpose, RescueRoute, RouteError,
};
use maze_rescue_world::{query, Maze};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_EXTRACTION_DELAY: Duration = Duration::from_secs(3);

/// Timing parameters of the rescue mission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissionTuning {
    /// Time spent holding still at each survivor.
    pub extraction_delay: Duration,
}

impl Default for MissionTuning {
    fn default() -> Self {
        Self {
            extraction_delay: DEFAULT_EXTRACTION_DELAY,
        }
    }
}

/// Errors that abort a rescue mission.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MissionError {
    /// The device failed or the host shut down.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// No route back to the exit exists.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// Exploration failed before the mission could start.
    #[error(transparent)]
    Exploration(#[from] ExplorationError),
    /// A waypoint has no recorded world coordinate to drive to.
    #[error("waypoint {cell:?} has no recorded world position")]
    UnmappedWaypoint {
        /// Cell lacking a world coordinate.
        cell: CellCoord,
    },
}

/// Turn points of one route leg.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedLeg {
    /// Why the leg is driven.
    pub purpose: LegPurpose,
    /// Normalized waypoints, starting at the cell the leg departs from.
    pub waypoints: Vec<CellCoord>,
}

/// Rescue route together with the waypoints a driver follows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissionPlan {
    /// Cell-by-cell route.
    pub route: RescueRoute,
    /// Normalized legs in driving order.
    pub legs: Vec<PlannedLeg>,
}

impl MissionPlan {
    /// Every waypoint in driving order with consecutive duplicates removed.
    #[must_use]
    pub fn waypoints(&self) -> Vec<CellCoord> {
        let mut waypoints: Vec<CellCoord> = Vec::new();
        for leg in &self.legs {
            for cell in &leg.waypoints {
                if waypoints.last() != Some(cell) {
                    waypoints.push(*cell);
                }
            }
        }
        waypoints
    }
}

/// Plans a rescue from the entrance through every survivor and back.
///
/// Survivors are considered in row-major order. Each leg is normalized on its
/// own so every survivor cell stays a waypoint.
pub fn plan_rescue(maze: &Maze) -> Result<MissionPlan, RouteError> {
    let entrance = query::entrance(maze);
    let survivors = query::survivor_cells(maze);
    let route = find_rescue_route(maze, entrance, &survivors, entrance)?;
    let legs = route
        .legs()
        .iter()
        .map(|leg| PlannedLeg {
            purpose: leg.purpose(),
            waypoints: normalize_route(leg.cells()),
        })
        .collect();
    Ok(MissionPlan { route, legs })
}

/// Positions recorded by exploration that the mission starts from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MissionContext {
    /// Pose to return to once every survivor is extracted.
    pub home: Pose,
    /// World coordinate of the entrance cell centre.
    pub entrance_position: WorldPoint,
}

impl From<ExplorationOutcome> for MissionContext {
    fn from(outcome: ExplorationOutcome) -> Self {
        Self {
            home: outcome.home,
            entrance_position: outcome.entrance_position,
        }
    }
}

/// Summary of a completed mission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissionReport {
    /// Plan that was driven.
    pub plan: MissionPlan,
    /// Survivors extracted, in visiting order.
    pub rescued: Vec<CellCoord>,
    /// Survivors that could not be reached.
    pub unreachable: Vec<CellCoord>,
    /// Number of steps spent holding for extraction.
    pub hold_steps: u64,
}

/// Drives rescue plans on a device.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mission {
    tuning: MissionTuning,
}

impl Mission {
    /// Creates a mission with the provided tuning.
    #[must_use]
    pub const fn new(tuning: MissionTuning) -> Self {
        Self { tuning }
    }

    /// Moves to the entrance, rescues every reachable survivor and returns home.
    ///
    /// After a survivor the robot keeps driving in reverse until it reaches a
    /// waypoint whose floor is unmarked or clear.
    pub fn run<D>(
        &self,
        device: &mut D,
        maze: &Maze,
        context: MissionContext,
    ) -> Result<MissionReport, MissionError>
    where
        D: Device + ?Sized,
    {
        info!("rescue mission started");
        perform(device, Motion::MoveTo(context.entrance_position))?;

        let plan = plan_rescue(maze)?;
        let hold = steps_for(self.tuning.extraction_delay, device.step_duration());
        let mut rescued = Vec::new();
        let mut hold_steps = 0_u64;
        let mut reverse = false;

        for leg in &plan.legs {
            for waypoint in leg.waypoints.iter().skip(1) {
                let cell = query::cell(maze, *waypoint)
                    .ok_or(MissionError::UnmappedWaypoint { cell: *waypoint })?;
                let position = cell
                    .position()
                    .ok_or(MissionError::UnmappedWaypoint { cell: *waypoint })?;

                let motion = if reverse {
                    Motion::MoveToReversed(position)
                } else {
                    Motion::MoveTo(position)
                };
                debug!(?waypoint, reverse, "driving to waypoint");
                perform(device, motion)?;

                if cell.has_survivor() {
                    reverse = true;
                } else if cell.damage().is_benign() {
                    reverse = false;
                }
            }

            if leg.purpose == LegPurpose::Rescue {
                if let Some(survivor) = leg.waypoints.last().copied() {
                    info!(?survivor, "extracting survivor");
                    perform(device, Motion::Hold { steps: hold })?;
                    hold_steps += hold;
                    rescued.push(survivor);
                }
            }
        }

        perform(device, Motion::MoveTo(context.home.position))?;
        perform(device, Motion::RotateTo(context.home.bearing))?;
        info!(rescued = rescued.len(), "rescue mission completed");

        let unreachable = plan.route.unreachable().to_vec();
        Ok(MissionReport {
            plan,
            rescued,
            unreachable,
            hold_steps,
        })
    }
}

/// Outcome of a full explore-then-rescue run.
#[derive(Clone, Debug, PartialEq)]
pub struct RescueReport {
    /// Exploration summary.
    pub exploration: ExplorationOutcome,
    /// Mission summary.
    pub mission: MissionReport,
}

/// Explores the maze and then runs the rescue mission on the resulting map.
pub fn run_rescue<D>(
    device: &mut D,
    maze: &mut Maze,
    perception: &Perception,
    exploration: ExplorationTuning,
    mission: Mission,
) -> Result<RescueReport, MissionError>
where
    D: Device + ?Sized,
{
    let outcome = explore(device, maze, perception, exploration)?;
    let report = mission.run(device, maze, MissionContext::from(outcome))?;
    Ok(RescueReport {
        exploration: outcome,
        mission: report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_rescue_core::{
        device::{ImageSample, Obstructions},
        Bearing, Command, Damage, Rgb, WallFlags,
    };
    use maze_rescue_world::{apply, snapshot, GridTuning};

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Recorded {
        Forward(WorldPoint),
        Reversed(WorldPoint),
        Rotate(f64),
    }

    #[derive(Debug, Default)]
    struct RecordingDevice {
        calls: Vec<Recorded>,
        steps: u64,
        position: Option<WorldPoint>,
    }

    impl Device for RecordingDevice {
        fn advance_step(&mut self) -> bool {
            self.steps += 1;
            true
        }

        fn step_duration(&self) -> Duration {
            Duration::from_millis(64)
        }

        fn current_heading(&self) -> Option<f64> {
            Some(0.0)
        }

        fn current_position(&self) -> WorldPoint {
            self.position.unwrap_or(WorldPoint::new(0.0, 0.0))
        }

        fn obstructions(&self) -> Obstructions {
            Obstructions::default()
        }

        fn front_image(&self) -> ImageSample {
            ImageSample::filled(1, 1, Rgb::new(0, 0, 0))
        }

        fn floor_image(&self) -> ImageSample {
            ImageSample::filled(1, 1, Rgb::new(0, 0, 0))
        }

        fn move_to_point(&mut self, target: WorldPoint) -> Result<(), DeviceError> {
            self.calls.push(Recorded::Forward(target));
            self.position = Some(target);
            Ok(())
        }

        fn move_to_point_reversed(&mut self, target: WorldPoint) -> Result<(), DeviceError> {
            self.calls.push(Recorded::Reversed(target));
            self.position = Some(target);
            Ok(())
        }

        fn rotate_to_heading(&mut self, degrees: f64) -> Result<(), DeviceError> {
            self.calls.push(Recorded::Rotate(degrees));
            Ok(())
        }
    }

    fn position(column: u32, row: u32) -> WorldPoint {
        WorldPoint::new(f64::from(column) * 0.25, f64::from(2 - row) * 0.25)
    }

    fn mapped_maze() -> Maze {
        let mut maze = Maze::new(GridTuning {
            columns: 2,
            rows: 3,
            entrance: CellCoord::new(0, 2),
        })
        .expect("valid grid");
        let mut events = Vec::new();
        apply(
            &mut maze,
            Command::SetEntrance {
                position: position(0, 2),
            },
            &mut events,
        );
        for row in 0..3 {
            for column in 0..2 {
                let cell = CellCoord::new(column, row);
                apply(
                    &mut maze,
                    Command::DiscoverCell {
                        cell,
                        position: position(column, row),
                    },
                    &mut events,
                );
                let damage = match (column, row) {
                    (1, 1) | (1, 2) => Damage::Severe,
                    (0, 0) => Damage::Light,
                    _ => Damage::Unknown,
                };
                apply(
                    &mut maze,
                    Command::RecordObservation {
                        walls: WallFlags::default(),
                        damage,
                        survivor: column == 1 && row == 0,
                    },
                    &mut events,
                );
            }
        }
        maze
    }

    fn context() -> MissionContext {
        MissionContext {
            home: Pose {
                position: WorldPoint::new(0.0, -0.455),
                bearing: Bearing::Zero,
            },
            entrance_position: position(0, 2),
        }
    }

    #[test]
    fn plan_keeps_survivor_as_waypoint() {
        let plan = plan_rescue(&mapped_maze()).expect("route exists");
        assert_eq!(
            plan.waypoints(),
            vec![
                CellCoord::new(0, 2),
                CellCoord::new(0, 0),
                CellCoord::new(1, 0),
                CellCoord::new(0, 0),
                CellCoord::new(0, 2),
            ]
        );
        assert_eq!(plan.route.stops(), vec![CellCoord::new(1, 0)]);
    }

    #[test]
    fn reverses_after_survivor_until_benign_floor() {
        let mut device = RecordingDevice::default();
        let report = Mission::default()
            .run(&mut device, &mapped_maze(), context())
            .expect("mission completes");

        assert_eq!(
            device.calls,
            vec![
                Recorded::Forward(position(0, 2)),
                Recorded::Forward(position(0, 0)),
                Recorded::Forward(position(1, 0)),
                Recorded::Reversed(position(0, 0)),
                Recorded::Reversed(position(0, 2)),
                Recorded::Forward(WorldPoint::new(0.0, -0.455)),
                Recorded::Rotate(0.0),
            ]
        );
        assert_eq!(report.rescued, vec![CellCoord::new(1, 0)]);
        assert_eq!(report.hold_steps, 47);
        assert_eq!(device.steps, 47, "three seconds at 64 ms per step");
    }

    #[test]
    fn empty_maze_returns_home_directly() {
        let mut maze = Maze::new(GridTuning {
            columns: 2,
            rows: 2,
            entrance: CellCoord::new(0, 1),
        })
        .expect("valid grid");
        let mut events = Vec::new();
        apply(
            &mut maze,
            Command::SetEntrance {
                position: WorldPoint::new(0.0, 0.0),
            },
            &mut events,
        );

        let mut device = RecordingDevice::default();
        let report = Mission::default()
            .run(&mut device, &maze, context())
            .expect("mission completes");

        assert!(report.rescued.is_empty());
        assert_eq!(report.hold_steps, 0);
        assert_eq!(device.calls.len(), 3);
    }

    #[test]
    fn waypoint_without_position_is_an_error() {
        let mut rows = snapshot::export(&mapped_maze());
        rows[0][1].3 = [None, None];
        let maze = snapshot::import(
            &rows,
            GridTuning {
                columns: 2,
                rows: 3,
                entrance: CellCoord::new(0, 2),
            },
        )
        .expect("valid snapshot");

        let mut device = RecordingDevice::default();
        let error = Mission::default()
            .run(&mut device, &maze, context())
            .expect_err("survivor cell has no position");
        assert_eq!(
            error,
            MissionError::UnmappedWaypoint {
                cell: CellCoord::new(1, 0)
            }
        );
    }
}
