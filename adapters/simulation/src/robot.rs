//! Step-driven differential robot that moves through a [`Layout`].

use std::time::Duration;

use maze_rescue_core::{
    device::{await_completion, Device, DeviceError, ImageSample, Obstructions, StepBudget},
    Bearing, CellCoord, Damage, Direction, Rgb, WorldPoint,
};

use crate::layout::Layout;

const ARRIVAL_TOLERANCE: f64 = 1e-6;
const HEADING_TOLERANCE: f64 = 1e-6;

const FLOOR_COLOR: Rgb = Rgb::new(180, 180, 180);
const SEVERE_COLOR: Rgb = Rgb::new(255, 0, 0);
const LIGHT_COLOR: Rgb = Rgb::new(255, 165, 0);
const CLEAR_COLOR: Rgb = Rgb::new(255, 255, 0);
const WALL_COLOR: Rgb = Rgb::new(90, 90, 90);
const CORRIDOR_COLOR: Rgb = Rgb::new(30, 30, 30);
const SURVIVOR_COLOR: Rgb = Rgb::new(0, 255, 0);

/// Physical parameters of the simulated robot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationTuning {
    /// Simulated time covered by one step.
    pub step_duration: Duration,
    /// Distance driven per step in metres.
    pub drive_per_step: f64,
    /// Rotation per step in degrees.
    pub turn_per_step: f64,
    /// Distance between neighbouring cell centres in metres.
    pub cell_pitch: f64,
    /// Distance from the starting position to the entrance cell centre.
    pub entrance_offset: f64,
    /// Edge length of the square camera images in pixels.
    pub image_size: u32,
    /// Bound applied to each individual motion.
    pub motion_budget: StepBudget,
    /// Host shuts down once this many steps have elapsed.
    pub step_limit: Option<u64>,
    /// Compass stops reporting once this many steps have elapsed.
    pub compass_fault_after: Option<u64>,
}

impl Default for SimulationTuning {
    fn default() -> Self {
        Self {
            step_duration: Duration::from_millis(64),
            drive_per_step: 0.05,
            turn_per_step: 30.0,
            cell_pitch: 0.25,
            entrance_offset: 0.455,
            image_size: 64,
            motion_budget: StepBudget::Unbounded,
            step_limit: None,
            compass_fault_after: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ActiveMotion {
    Drive { target: WorldPoint },
    Turn { target: f64 },
}

/// Simulated robot implementing [`Device`] on top of a ground-truth layout.
///
/// The entrance cell centre is the world origin. The robot starts
/// `entrance_offset` south of it, facing north.
#[derive(Clone, Debug)]
pub struct SimulatedRobot {
    layout: Layout,
    tuning: SimulationTuning,
    position: WorldPoint,
    heading: f64,
    steps: u64,
    distance: f64,
    active: Option<ActiveMotion>,
}

impl SimulatedRobot {
    /// Places a robot at the start position in front of the layout's entrance.
    #[must_use]
    pub fn new(layout: Layout, tuning: SimulationTuning) -> Self {
        Self {
            layout,
            tuning,
            position: WorldPoint::new(0.0, -tuning.entrance_offset),
            heading: 0.0,
            steps: 0,
            distance: 0.0,
            active: None,
        }
    }

    /// Ground truth the robot moves through.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Number of steps elapsed so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Exact heading in degrees.
    #[must_use]
    pub const fn heading(&self) -> f64 {
        self.heading
    }

    /// Total distance driven in metres.
    #[must_use]
    pub const fn distance_travelled(&self) -> f64 {
        self.distance
    }

    /// Simulated time elapsed so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let steps = u32::try_from(self.steps).unwrap_or(u32::MAX);
        self.tuning.step_duration.saturating_mul(steps)
    }

    /// Grid cell containing the robot, if it is inside the maze.
    #[must_use]
    pub fn cell(&self) -> Option<CellCoord> {
        let (columns, rows) = self.layout.dimensions();
        let entrance = self.layout.entrance();
        let column_offset = (self.position.x / self.tuning.cell_pitch).round() as i64;
        let row_offset = (self.position.y / self.tuning.cell_pitch).round() as i64;
        let column = i64::from(entrance.column()) + column_offset;
        let row = i64::from(entrance.row()) - row_offset;
        let column = u32::try_from(column).ok()?;
        let row = u32::try_from(row).ok()?;
        (column < columns && row < rows).then_some(CellCoord::new(column, row))
    }

    fn run(&mut self, motion: ActiveMotion) -> Result<(), DeviceError> {
        self.active = Some(motion);
        let budget = self.tuning.motion_budget;
        let outcome = await_completion(self, budget, |robot| robot.active.is_none());
        self.active = None;
        outcome.map(|_| ())
    }

    fn drive(&mut self, target: WorldPoint, reversed: bool) -> Result<(), DeviceError> {
        let dx = target.x - self.position.x;
        let dy = target.y - self.position.y;
        if dx.hypot(dy) < ARRIVAL_TOLERANCE {
            return Ok(());
        }

        let mut heading = dy.atan2(dx).to_degrees() - 90.0;
        if reversed {
            heading += 180.0;
        }
        self.rotate_to_heading(heading.rem_euclid(360.0))?;
        self.run(ActiveMotion::Drive { target })
    }

    fn progress(&mut self, motion: ActiveMotion) -> Option<ActiveMotion> {
        match motion {
            ActiveMotion::Drive { target } => {
                let remaining = self.position.distance_to(target);
                if remaining <= self.tuning.drive_per_step {
                    self.distance += remaining;
                    self.position = target;
                    return None;
                }
                let ratio = self.tuning.drive_per_step / remaining;
                self.position = WorldPoint::new(
                    self.position.x + (target.x - self.position.x) * ratio,
                    self.position.y + (target.y - self.position.y) * ratio,
                );
                self.distance += self.tuning.drive_per_step;
                Some(motion)
            }
            ActiveMotion::Turn { target } => {
                let difference = shortest_difference(self.heading, target);
                if difference.abs() <= self.tuning.turn_per_step {
                    self.heading = target;
                    return None;
                }
                let turn = self.tuning.turn_per_step.copysign(difference);
                self.heading = (self.heading + turn).rem_euclid(360.0);
                Some(motion)
            }
        }
    }

    fn facing(&self) -> Bearing {
        Bearing::nearest(self.heading)
    }

    fn wall_on(&self, bearing: Bearing) -> bool {
        self.cell()
            .and_then(|cell| self.layout.walls(cell))
            .is_some_and(|walls| walls.blocks(Direction::from_bearing(bearing)))
    }

    fn square_image(&self, background: Rgb, patch: Option<Rgb>) -> ImageSample {
        let size = self.tuning.image_size.max(1);
        let mut image = ImageSample::filled(size, size, background);
        if let Some(color) = patch {
            let start = size / 4;
            let end = size - start;
            for y in start..end.max(start + 1) {
                for x in start..end.max(start + 1) {
                    if let Some(pixel) = image.pixel_mut(x, y) {
                        *pixel = color;
                    }
                }
            }
        }
        image
    }
}

fn shortest_difference(current: f64, target: f64) -> f64 {
    (target - current + 180.0).rem_euclid(360.0) - 180.0
}

impl Device for SimulatedRobot {
    fn advance_step(&mut self) -> bool {
        if self.tuning.step_limit.is_some_and(|limit| self.steps >= limit) {
            return false;
        }
        self.steps += 1;
        if let Some(motion) = self.active {
            self.active = self.progress(motion);
        }
        true
    }

    fn step_duration(&self) -> Duration {
        self.tuning.step_duration
    }

    fn current_heading(&self) -> Option<f64> {
        if self
            .tuning
            .compass_fault_after
            .is_some_and(|after| self.steps >= after)
        {
            return None;
        }
        Some(self.heading)
    }

    fn current_position(&self) -> WorldPoint {
        self.position
    }

    fn obstructions(&self) -> Obstructions {
        let facing = self.facing();
        Obstructions {
            front: self.wall_on(facing),
            left: self.wall_on(facing.left()),
            right: self.wall_on(facing.right()),
        }
    }

    fn front_image(&self) -> ImageSample {
        let facing = self.facing();
        if !self.wall_on(facing) {
            return self.square_image(CORRIDOR_COLOR, None);
        }
        let survivor = self
            .cell()
            .is_some_and(|cell| self.layout.has_survivor(cell));
        self.square_image(WALL_COLOR, survivor.then_some(SURVIVOR_COLOR))
    }

    fn floor_image(&self) -> ImageSample {
        let patch = match self.cell().map(|cell| self.layout.hazard(cell)) {
            Some(Damage::Severe) => Some(SEVERE_COLOR),
            Some(Damage::Light) => Some(LIGHT_COLOR),
            Some(Damage::Clear) => Some(CLEAR_COLOR),
            Some(Damage::Unknown) | None => None,
        };
        self.square_image(FLOOR_COLOR, patch)
    }

    fn move_to_point(&mut self, target: WorldPoint) -> Result<(), DeviceError> {
        self.drive(target, false)
    }

    fn move_to_point_reversed(&mut self, target: WorldPoint) -> Result<(), DeviceError> {
        self.drive(target, true)
    }

    fn rotate_to_heading(&mut self, degrees: f64) -> Result<(), DeviceError> {
        let target = degrees.rem_euclid(360.0);
        if shortest_difference(self.heading, target).abs() < HEADING_TOLERANCE {
            return Ok(());
        }
        self.run(ActiveMotion::Turn { target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_rescue_core::{
        device::{perform, read_bearing},
        Motion,
    };
    use maze_rescue_world::GridTuning;

    fn robot(tuning: SimulationTuning) -> SimulatedRobot {
        let layout = Layout::open(GridTuning {
            columns: 3,
            rows: 3,
            entrance: CellCoord::new(1, 2),
        })
        .expect("valid grid");
        SimulatedRobot::new(layout, tuning)
    }

    fn small() -> SimulationTuning {
        SimulationTuning {
            image_size: 4,
            ..SimulationTuning::default()
        }
    }

    #[test]
    fn starts_outside_the_entrance() {
        let robot = robot(small());
        assert_eq!(robot.current_position(), WorldPoint::new(0.0, -0.455));
        assert_eq!(robot.cell(), None);
        assert_eq!(robot.obstructions(), Obstructions::default());
    }

    #[test]
    fn drives_north_into_entrance() {
        let mut robot = robot(small());
        robot
            .move_to_point(WorldPoint::new(0.0, 0.0))
            .expect("drive completes");
        assert_eq!(robot.current_position(), WorldPoint::new(0.0, 0.0));
        assert_eq!(robot.cell(), Some(CellCoord::new(1, 2)));
        assert_eq!(robot.steps(), 10, "0.455 m at 0.05 m per step");
        assert_eq!(read_bearing(&robot), Ok(Bearing::Zero));
    }

    #[test]
    fn turning_west_follows_enu_headings() {
        let mut robot = robot(small());
        robot
            .move_to_point(WorldPoint::new(0.0, 0.0))
            .expect("enter maze");
        robot
            .move_to_point(WorldPoint::new(-0.25, 0.0))
            .expect("drive west");
        assert_eq!(read_bearing(&robot), Ok(Bearing::Quarter));
        assert_eq!(robot.cell(), Some(CellCoord::new(0, 2)));
        let sensors = robot.obstructions();
        assert!(sensors.front, "west perimeter wall ahead");
        assert!(sensors.left, "south perimeter wall on the left");
        assert!(!sensors.right);
    }

    #[test]
    fn reversed_drive_faces_away_from_target() {
        let mut robot = robot(small());
        robot
            .move_to_point(WorldPoint::new(0.0, 0.0))
            .expect("enter maze");
        robot
            .move_to_point_reversed(WorldPoint::new(0.0, 0.25))
            .expect("reverse north");
        assert_eq!(robot.current_position(), WorldPoint::new(0.0, 0.25));
        assert_eq!(read_bearing(&robot), Ok(Bearing::Half));
    }

    #[test]
    fn step_limit_reports_shutdown() {
        let mut robot = robot(SimulationTuning {
            step_limit: Some(3),
            ..small()
        });
        assert_eq!(
            robot.move_to_point(WorldPoint::new(0.0, 0.0)),
            Err(DeviceError::HostShutdown)
        );
        assert_eq!(robot.steps(), 3);
    }

    #[test]
    fn motion_budget_times_out() {
        let mut robot = robot(SimulationTuning {
            motion_budget: StepBudget::Limited(2),
            ..small()
        });
        assert_eq!(
            robot.move_to_point(WorldPoint::new(0.0, 0.0)),
            Err(DeviceError::Timeout { steps: 2 })
        );
    }

    #[test]
    fn compass_fault_hides_heading() {
        let mut robot = robot(SimulationTuning {
            compass_fault_after: Some(1),
            ..small()
        });
        assert!(robot.current_heading().is_some());
        assert!(robot.advance_step());
        assert_eq!(read_bearing(&robot), Err(DeviceError::HeadingUnavailable));
    }

    #[test]
    fn images_reflect_ground_truth() {
        let mut layout = Layout::open(GridTuning {
            columns: 3,
            rows: 3,
            entrance: CellCoord::new(1, 2),
        })
        .expect("valid grid");
        let _ = layout.set_hazard(CellCoord::new(1, 1), Damage::Severe);
        let _ = layout.place_survivor(CellCoord::new(1, 0));
        let mut robot = SimulatedRobot::new(layout, small());

        robot
            .move_to_point(WorldPoint::new(0.0, 0.25))
            .expect("drive to hazard");
        assert!(robot.floor_image().pixels().contains(&SEVERE_COLOR));
        assert!(!robot.front_image().pixels().contains(&SURVIVOR_COLOR));

        robot
            .move_to_point(WorldPoint::new(0.0, 0.5))
            .expect("drive to survivor");
        assert!(robot.obstructions().front);
        assert!(robot.front_image().pixels().contains(&SURVIVOR_COLOR));
        assert!(!robot.floor_image().pixels().contains(&SEVERE_COLOR));
    }

    #[test]
    fn hold_advances_elapsed_time() {
        let mut robot = robot(small());
        perform(&mut robot, Motion::Hold { steps: 47 }).expect("hold completes");
        assert_eq!(robot.elapsed(), Duration::from_millis(64 * 47));
    }
}
