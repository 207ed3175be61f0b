//! Contract consumed from the device and simulation boundary.
//!
//! Every motion primitive blocks the caller until the motion completes. The
//! waiting itself goes through [`await_completion`], which advances the step
//! provider once per iteration so that control is yielded on every tick.

use std::time::Duration;

use thiserror::Error;

use crate::{Bearing, Motion, Rgb, WorldPoint};

/// Live readings from the three obstruction sensors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Obstructions {
    /// A wall is directly ahead.
    pub front: bool,
    /// A wall is on the robot's left.
    pub left: bool,
    /// A wall is on the robot's right.
    pub right: bool,
}

/// Fixed-size RGB image sampled from a camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSample {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl ImageSample {
    /// Creates an image from row-major pixels.
    ///
    /// Returns `None` when the pixel count does not match the dimensions.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgb>) -> Option<Self> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Creates an image filled with a single colour.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let count = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            pixels: vec![color; count],
        }
    }

    /// Width of the image in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the image in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel data.
    #[must_use]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Mutable access to the pixel at `(x, y)`, if it lies inside the image.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.pixels.get_mut(index)
    }
}

/// Failures surfaced by the device boundary.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The step provider reported that the host is shutting down.
    #[error("host requested shutdown")]
    HostShutdown,
    /// The compass returned no reading.
    #[error("compass heading unavailable")]
    HeadingUnavailable,
    /// A bounded wait ran out of steps before its completion condition held.
    #[error("motion did not complete within {steps} steps")]
    Timeout {
        /// Number of steps that were spent waiting.
        steps: u64,
    },
}

/// Upper bound on the number of steps a blocking wait may consume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StepBudget {
    /// Wait until the step provider stops; no timeout is imposed.
    #[default]
    Unbounded,
    /// Give up with [`DeviceError::Timeout`] after the provided number of steps.
    Limited(u64),
}

/// Motor, sensor and camera boundary driven one step at a time.
pub trait Device {
    /// Advances the simulation by one step; `false` signals host shutdown.
    fn advance_step(&mut self) -> bool;

    /// Simulated time covered by a single step.
    fn step_duration(&self) -> Duration;

    /// Raw compass heading in degrees, or `None` on sensor fault.
    fn current_heading(&self) -> Option<f64>;

    /// Current GPS position.
    fn current_position(&self) -> WorldPoint;

    /// Current obstruction sensor readings.
    fn obstructions(&self) -> Obstructions;

    /// Sample from the forward-facing camera.
    fn front_image(&self) -> ImageSample;

    /// Sample from the downward-facing camera.
    fn floor_image(&self) -> ImageSample;

    /// Rotates toward `target` and drives forward until it is reached.
    fn move_to_point(&mut self, target: WorldPoint) -> Result<(), DeviceError>;

    /// Rotates away from `target` and drives backward until it is reached.
    fn move_to_point_reversed(&mut self, target: WorldPoint) -> Result<(), DeviceError>;

    /// Rotates in place until the heading matches `degrees`.
    fn rotate_to_heading(&mut self, degrees: f64) -> Result<(), DeviceError>;
}

/// Advances `device` one step at a time until `done` reports completion.
///
/// The predicate is checked before every step, so an already satisfied
/// condition returns without advancing. Host shutdown and budget exhaustion
/// are reported as errors.
pub fn await_completion<D, F>(device: &mut D, budget: StepBudget, mut done: F) -> Result<u64, DeviceError>
where
    D: Device + ?Sized,
    F: FnMut(&D) -> bool,
{
    let mut spent = 0_u64;
    loop {
        if done(device) {
            return Ok(spent);
        }
        if let StepBudget::Limited(limit) = budget {
            if spent >= limit {
                return Err(DeviceError::Timeout { steps: spent });
            }
        }
        if !device.advance_step() {
            return Err(DeviceError::HostShutdown);
        }
        spent = spent.saturating_add(1);
    }
}

/// Reads the compass and quantizes it to the nearest cardinal bearing.
///
/// A NaN or infinite reading counts as a sensor fault.
pub fn read_bearing<D>(device: &D) -> Result<Bearing, DeviceError>
where
    D: Device + ?Sized,
{
    device
        .current_heading()
        .filter(|heading| heading.is_finite())
        .map(Bearing::nearest)
        .ok_or(DeviceError::HeadingUnavailable)
}

/// Number of whole steps needed to cover `duration`, rounded up.
#[must_use]
pub fn steps_for(duration: Duration, step: Duration) -> u64 {
    let step_nanos = step.as_nanos();
    if step_nanos == 0 {
        return 0;
    }
    let steps = duration.as_nanos().div_ceil(step_nanos);
    u64::try_from(steps).unwrap_or(u64::MAX)
}

/// Executes a single motion request against the device.
pub fn perform<D>(device: &mut D, motion: Motion) -> Result<(), DeviceError>
where
    D: Device + ?Sized,
{
    match motion {
        Motion::MoveTo(target) => device.move_to_point(target),
        Motion::MoveToReversed(target) => device.move_to_point_reversed(target),
        Motion::RotateTo(bearing) => device.rotate_to_heading(f64::from(bearing.degrees())),
        Motion::Hold { steps } => {
            let mut remaining = steps;
            let _ = await_completion(device, StepBudget::Unbounded, |_| {
                if remaining == 0 {
                    true
                } else {
                    remaining -= 1;
                    false
                }
            })?;
            Ok(())
        }
    }
}
