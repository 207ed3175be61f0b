#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic simulated device for exercising the rescue engine end to end.
//!
//! A [`Layout`] holds the ground truth of a maze and a [`SimulatedRobot`]
//! moves through it one step at a time, synthesizing sensor and camera
//! readings from that ground truth.

mod layout;
mod robot;

pub use layout::{Layout, LayoutTuning};
pub use robot::{SimulatedRobot, SimulationTuning};
