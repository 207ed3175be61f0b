#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs rescue missions in the simulated maze and
//! inspects persisted maze snapshots.

mod config;
mod render;
mod snapshot_transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use maze_rescue_simulation::{Layout, SimulatedRobot};
use maze_rescue_system_mission::{plan_rescue, run_rescue, Mission, MissionPlan};
use maze_rescue_system_perception::Perception;
use maze_rescue_world::{query, snapshot, Maze};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    config::RescueConfig,
    snapshot_transfer::{is_transfer_string, SnapshotTransfer},
};

#[derive(Debug, Parser)]
#[command(name = "maze-rescue")]
#[command(about = "Explore a simulated maze and rescue the survivors inside")]
struct Cli {
    /// Emit debug logs.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// TOML file overriding the default tuning.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a layout, explore it and rescue every survivor found.
    Simulate {
        /// Seed for layout generation.
        #[arg(long, default_value_t = 2024)]
        seed: u64,
        /// Write the explored maze snapshot to this file.
        #[arg(long)]
        save: Option<PathBuf>,
        /// Use a layout without inner walls, hazards or survivors.
        #[arg(long)]
        open: bool,
    },
    /// Print the rescue route for a snapshot file or transfer string.
    Plan {
        /// Snapshot file path or `rescue:v1:...` transfer string.
        snapshot: String,
    },
    /// Draw a snapshot as ASCII art.
    Render {
        /// Snapshot file path or `rescue:v1:...` transfer string.
        snapshot: String,
        /// Overlay the planned rescue route.
        #[arg(long)]
        route: bool,
    },
    /// Print a snapshot as a single-line transfer string.
    Export {
        /// Snapshot file path or `rescue:v1:...` transfer string.
        snapshot: String,
    },
}

/// Entry point for the maze rescue command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = RescueConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { seed, save, open } => simulate(&config, seed, save, open),
        Commands::Plan { snapshot } => {
            let maze = load_maze(&config, &snapshot)?;
            let plan = plan_rescue(&maze).context("failed to plan the rescue route")?;
            print_plan(&plan);
            Ok(())
        }
        Commands::Render { snapshot, route } => {
            let maze = load_maze(&config, &snapshot)?;
            let overlay = if route {
                plan_rescue(&maze)
                    .context("failed to plan the rescue route")?
                    .route
                    .cells()
            } else {
                Vec::new()
            };
            print!("{}", render::render(&maze, &overlay));
            println!("{}", render::LEGEND);
            Ok(())
        }
        Commands::Export { snapshot } => {
            let maze = load_maze(&config, &snapshot)?;
            let encoded = SnapshotTransfer::capture(&maze)
                .encode()
                .context("failed to encode snapshot")?;
            println!("{encoded}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn simulate(config: &RescueConfig, seed: u64, save: Option<PathBuf>, open: bool) -> Result<()> {
    let grid = config.grid();
    info!(seed, open, columns = grid.columns, rows = grid.rows, "starting simulated rescue");
    let layout = if open {
        Layout::open(grid)
    } else {
        Layout::generate(grid, config.layout(), seed)
    }
    .context("failed to build the simulated layout")?;

    let mut robot = SimulatedRobot::new(layout, config.simulation());
    let mut maze = Maze::new(grid).context("failed to build the maze")?;
    let report = run_rescue(
        &mut robot,
        &mut maze,
        &Perception::new(config.perception()),
        config.exploration(),
        Mission::new(config.mission()),
    )
    .context("rescue run failed")?;

    println!(
        "explored {} of {} cells in {} iterations",
        report.exploration.visited,
        query::cell_count(&maze),
        report.exploration.iterations
    );
    println!(
        "survivors detected: {}",
        format_cells(&query::survivor_cells(&maze))
    );
    println!("survivors rescued: {}", format_cells(&report.mission.rescued));
    if !report.mission.unreachable.is_empty() {
        println!(
            "survivors unreachable: {}",
            format_cells(&report.mission.unreachable)
        );
    }
    println!(
        "simulated time {:.1}s over {} steps, {:.2} m driven",
        robot.elapsed().as_secs_f64(),
        robot.steps(),
        robot.distance_travelled()
    );
    print!("{}", render::render(&maze, &report.mission.plan.route.cells()));

    if let Some(path) = save {
        snapshot::save(&maze, &path)
            .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
        info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

fn load_maze(config: &RescueConfig, source: &str) -> Result<Maze> {
    if is_transfer_string(source) {
        let transfer = SnapshotTransfer::decode(source).context("invalid transfer string")?;
        return transfer
            .restore()
            .context("transfer string does not describe a valid maze");
    }
    snapshot::load(source, config.grid())
        .with_context(|| format!("failed to load snapshot from {source}"))
}

fn print_plan(plan: &MissionPlan) {
    println!("rescue order: {}", format_cells(&plan.route.stops()));
    if !plan.route.unreachable().is_empty() {
        println!("unreachable: {}", format_cells(plan.route.unreachable()));
    }
    for (index, leg) in plan.legs.iter().enumerate() {
        println!(
            "leg {} ({:?}): {}",
            index + 1,
            leg.purpose,
            format_cells(&leg.waypoints)
        );
    }
    println!("route length: {} cells", plan.route.cells().len());
}

fn format_cells(cells: &[maze_rescue_core::CellCoord]) -> String {
    if cells.is_empty() {
        return "none".to_owned();
    }
    cells
        .iter()
        .map(|cell| format!("({}, {})", cell.column(), cell.row()))
        .collect::<Vec<_>>()
        .join(" -> ")
}
