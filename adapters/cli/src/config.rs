use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use maze_rescue_core::{CellCoord, Rgb};
use maze_rescue_simulation::{LayoutTuning, SimulationTuning};
use maze_rescue_system_exploration::ExplorationTuning;
use maze_rescue_system_mission::MissionTuning;
use maze_rescue_system_perception::PerceptionTuning;
use maze_rescue_world::GridTuning;
use serde::Deserialize;

/// Tuning overrides loaded from an optional TOML file.
///
/// Every field is optional; anything left out keeps the default of the
/// tuning struct it overrides.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RescueConfig {
    grid: GridSection,
    perception: PerceptionSection,
    mission: MissionSection,
    simulation: SimulationSection,
    layout: LayoutSection,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GridSection {
    columns: Option<u32>,
    rows: Option<u32>,
    entrance: Option<[u32; 2]>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PerceptionSection {
    severe_color: Option<[u8; 3]>,
    light_color: Option<[u8; 3]>,
    clear_color: Option<[u8; 3]>,
    survivor_color: Option<[u8; 3]>,
    hazard_threshold: Option<f64>,
    survivor_threshold: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MissionSection {
    extraction_delay_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SimulationSection {
    step_ms: Option<u64>,
    drive_per_step: Option<f64>,
    turn_per_step: Option<f64>,
    cell_pitch: Option<f64>,
    entrance_offset: Option<f64>,
    image_size: Option<u32>,
    step_limit: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LayoutSection {
    loop_openings: Option<u32>,
    survivors: Option<u32>,
    severe_hazards: Option<u32>,
    light_hazards: Option<u32>,
    clear_tiles: Option<u32>,
}

impl RescueConfig {
    /// Loads the configuration at `path`, or the defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid config at {}", path.display()))
    }

    /// Parses and validates TOML configuration contents.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse config toml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let grid = self.grid();
        if grid.columns == 0 || grid.rows == 0 {
            bail!("grid must have at least one column and one row");
        }
        if grid.entrance.column() >= grid.columns || grid.entrance.row() >= grid.rows {
            bail!(
                "entrance {:?} lies outside the {}x{} grid",
                grid.entrance,
                grid.columns,
                grid.rows
            );
        }

        let simulation = self.simulation();
        if simulation.step_duration.is_zero() {
            bail!("simulation step_ms must be positive");
        }
        for (name, value) in [
            ("drive_per_step", simulation.drive_per_step),
            ("turn_per_step", simulation.turn_per_step),
            ("cell_pitch", simulation.cell_pitch),
        ] {
            if !(value.is_finite() && value > 0.0) {
                bail!("simulation {name} must be a positive number, got {value}");
            }
        }

        let perception = self.perception();
        for (name, value) in [
            ("hazard_threshold", perception.hazard_threshold),
            ("survivor_threshold", perception.survivor_threshold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                bail!("perception {name} must not be negative, got {value}");
            }
        }
        Ok(())
    }

    /// Grid dimensions and entrance.
    ///
    /// Without an explicit entrance the middle cell of the southern row is used.
    pub(crate) fn grid(&self) -> GridTuning {
        let defaults = GridTuning::default();
        let columns = self.grid.columns.unwrap_or(defaults.columns);
        let rows = self.grid.rows.unwrap_or(defaults.rows);
        let entrance = self.grid.entrance.map_or_else(
            || CellCoord::new(columns / 2, rows.saturating_sub(1)),
            |[column, row]| CellCoord::new(column, row),
        );
        GridTuning {
            columns,
            rows,
            entrance,
        }
    }

    pub(crate) fn perception(&self) -> PerceptionTuning {
        let section = &self.perception;
        let defaults = PerceptionTuning::default();
        PerceptionTuning {
            severe_color: section.severe_color.map_or(defaults.severe_color, rgb),
            light_color: section.light_color.map_or(defaults.light_color, rgb),
            clear_color: section.clear_color.map_or(defaults.clear_color, rgb),
            survivor_color: section.survivor_color.map_or(defaults.survivor_color, rgb),
            hazard_threshold: section.hazard_threshold.unwrap_or(defaults.hazard_threshold),
            survivor_threshold: section
                .survivor_threshold
                .unwrap_or(defaults.survivor_threshold),
        }
    }

    pub(crate) fn mission(&self) -> MissionTuning {
        let defaults = MissionTuning::default();
        MissionTuning {
            extraction_delay: self
                .mission
                .extraction_delay_ms
                .map_or(defaults.extraction_delay, Duration::from_millis),
        }
    }

    pub(crate) fn simulation(&self) -> SimulationTuning {
        let section = &self.simulation;
        let defaults = SimulationTuning::default();
        SimulationTuning {
            step_duration: section
                .step_ms
                .map_or(defaults.step_duration, Duration::from_millis),
            drive_per_step: section.drive_per_step.unwrap_or(defaults.drive_per_step),
            turn_per_step: section.turn_per_step.unwrap_or(defaults.turn_per_step),
            cell_pitch: section.cell_pitch.unwrap_or(defaults.cell_pitch),
            entrance_offset: section.entrance_offset.unwrap_or(defaults.entrance_offset),
            image_size: section.image_size.unwrap_or(defaults.image_size),
            step_limit: section.step_limit.or(defaults.step_limit),
            ..defaults
        }
    }

    /// Exploration geometry, kept consistent with the simulated robot.
    pub(crate) fn exploration(&self) -> ExplorationTuning {
        let simulation = self.simulation();
        ExplorationTuning {
            cell_pitch: simulation.cell_pitch,
            entrance_offset: simulation.entrance_offset,
            ..ExplorationTuning::default()
        }
    }

    pub(crate) fn layout(&self) -> LayoutTuning {
        let section = &self.layout;
        let defaults = LayoutTuning::default();
        LayoutTuning {
            loop_openings: section.loop_openings.unwrap_or(defaults.loop_openings),
            survivors: section.survivors.unwrap_or(defaults.survivors),
            severe_hazards: section.severe_hazards.unwrap_or(defaults.severe_hazards),
            light_hazards: section.light_hazards.unwrap_or(defaults.light_hazards),
            clear_tiles: section.clear_tiles.unwrap_or(defaults.clear_tiles),
        }
    }
}

fn rgb([red, green, blue]: [u8; 3]) -> Rgb {
    Rgb::new(red, green, blue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_keeps_defaults() {
        let config = RescueConfig::parse("").expect("empty config parses");
        assert_eq!(config.grid(), GridTuning::default());
        assert_eq!(config.mission(), MissionTuning::default());
        assert_eq!(config.simulation(), SimulationTuning::default());
        assert_eq!(config.layout(), LayoutTuning::default());
        assert_eq!(config.exploration(), ExplorationTuning::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = RescueConfig::parse(
            r#"
            [grid]
            columns = 8
            rows = 6

            [perception]
            survivor_color = [0, 200, 0]
            hazard_threshold = 12.5

            [mission]
            extraction_delay_ms = 500

            [simulation]
            step_ms = 32
            step_limit = 10000

            [layout]
            survivors = 5
            "#,
        )
        .expect("config parses");

        assert_eq!(
            config.grid(),
            GridTuning {
                columns: 8,
                rows: 6,
                entrance: CellCoord::new(4, 5),
            }
        );
        let perception = config.perception();
        assert_eq!(perception.survivor_color, Rgb::new(0, 200, 0));
        assert!((perception.hazard_threshold - 12.5).abs() < f64::EPSILON);
        assert_eq!(
            config.mission().extraction_delay,
            Duration::from_millis(500)
        );
        let simulation = config.simulation();
        assert_eq!(simulation.step_duration, Duration::from_millis(32));
        assert_eq!(simulation.step_limit, Some(10_000));
        assert_eq!(config.layout().survivors, 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = RescueConfig::parse("[grid]\ncolumnz = 3\n").expect_err("typo rejected");
        assert!(format!("{error:#}").contains("columnz"));
    }

    #[test]
    fn entrance_outside_grid_is_rejected() {
        let error = RescueConfig::parse("[grid]\ncolumns = 4\nrows = 4\nentrance = [4, 0]\n")
            .expect_err("entrance out of bounds");
        assert!(error.to_string().contains("outside"));
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(RescueConfig::parse("[simulation]\nstep_ms = 0\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[layout]\nloop_openings = 2").expect("write config");

        let config = RescueConfig::load(Some(file.path())).expect("config loads");
        assert_eq!(config.layout().loop_openings, 2);
        assert_eq!(
            RescueConfig::load(None).expect("defaults"),
            RescueConfig::default()
        );
    }

    #[test]
    fn missing_file_names_the_path() {
        let error = RescueConfig::load(Some(Path::new("/nonexistent/rescue.toml")))
            .expect_err("missing file");
        assert!(error.to_string().contains("/nonexistent/rescue.toml"));
    }
}
