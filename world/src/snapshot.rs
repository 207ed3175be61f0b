//! Persisted maze snapshots.
//!
//! A snapshot is a JSON array holding one array per row, each with one record
//! per cell: `[[north, south, east, west], damage, survivor, [x, y]]`.
//! Unexplored cells carry `null` damage and survivor values, and cells that
//! were never reached carry `null` coordinates.

use std::{fs, io, path::Path, path::PathBuf};

use maze_rescue_core::{Damage, WallFlags, WorldPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Cell, GridTuning, Maze, MazeError};

/// Serialized form of a single cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellRecord(
    /// Wall flags encoded as `[north, south, east, west]` zero/one values.
    pub [u8; 4],
    /// Damage code, or `None` while the cell is unexplored.
    pub Option<i8>,
    /// Survivor flag as zero/one, or `None` while the cell is unexplored.
    pub Option<u8>,
    /// World coordinate assigned when the cell was first reached.
    pub [Option<f64>; 2],
);

impl CellRecord {
    fn from_cell(cell: &Cell) -> Self {
        let (damage, survivor) = if cell.is_explored() {
            (
                Some(cell.damage().code()),
                Some(u8::from(cell.has_survivor())),
            )
        } else {
            (None, None)
        };
        let position = cell
            .position()
            .map_or([None, None], |point| [Some(point.x), Some(point.y)]);
        Self(cell.walls().to_bits(), damage, survivor, position)
    }
}

/// Errors raised while persisting or restoring snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The number of rows does not match the configured grid.
    #[error("snapshot holds {actual} rows but the grid expects {expected}")]
    RowCountMismatch {
        /// Number of rows in the configured grid.
        expected: usize,
        /// Number of rows found in the snapshot.
        actual: usize,
    },
    /// A row holds the wrong number of cells.
    #[error("snapshot row {row} holds {actual} cells but the grid expects {expected}")]
    RowLengthMismatch {
        /// Index of the offending row.
        row: usize,
        /// Number of columns in the configured grid.
        expected: usize,
        /// Number of records found in the row.
        actual: usize,
    },
    /// A record carried an unknown damage code.
    #[error("cell ({column}, {row}) carries unknown damage code {code}")]
    InvalidDamage {
        /// Column of the offending record.
        column: usize,
        /// Row of the offending record.
        row: usize,
        /// Code that failed to decode.
        code: i8,
    },
    /// The configured grid could not be constructed.
    #[error(transparent)]
    Maze(#[from] MazeError),
    /// The JSON payload could not be encoded or decoded.
    #[error("malformed snapshot json")]
    Json(#[from] serde_json::Error),
    /// Reading or writing the snapshot file failed.
    #[error("snapshot file {path} could not be accessed")]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Captures every cell of the maze, one inner vector per row.
#[must_use]
pub fn export(maze: &Maze) -> Vec<Vec<CellRecord>> {
    let width = usize::try_from(maze.columns).unwrap_or(usize::MAX).max(1);
    maze.cells
        .chunks(width)
        .map(|row| row.iter().map(CellRecord::from_cell).collect())
        .collect()
}

/// Rebuilds a maze from persisted rows of records.
///
/// The traversal stack is not persisted, so the restored maze has no current
/// cell.
pub fn import(rows: &[Vec<CellRecord>], tuning: GridTuning) -> Result<Maze, SnapshotError> {
    let mut maze = Maze::new(tuning)?;
    let expected_rows = usize::try_from(tuning.rows).unwrap_or(usize::MAX);
    let expected_columns = usize::try_from(tuning.columns).unwrap_or(usize::MAX);
    if rows.len() != expected_rows {
        return Err(SnapshotError::RowCountMismatch {
            expected: expected_rows,
            actual: rows.len(),
        });
    }
    if let Some((row, records)) = rows
        .iter()
        .enumerate()
        .find(|(_, records)| records.len() != expected_columns)
    {
        return Err(SnapshotError::RowLengthMismatch {
            row,
            expected: expected_columns,
            actual: records.len(),
        });
    }

    let records = rows.iter().enumerate().flat_map(|(row, records)| {
        records
            .iter()
            .enumerate()
            .map(move |(column, record)| (column, row, record))
    });
    for (cell, (column, row, record)) in maze.cells.iter_mut().zip(records) {
        let CellRecord(walls, damage, survivor, [x, y]) = record;
        cell.walls = WallFlags::from_bits(*walls);
        if let (Some(x), Some(y)) = (x, y) {
            cell.position = Some(WorldPoint::new(*x, *y));
        }
        if let Some(code) = *damage {
            cell.damage = Damage::from_code(code).ok_or(SnapshotError::InvalidDamage {
                column,
                row,
                code,
            })?;
            cell.survivor = survivor.is_some_and(|flag| flag != 0);
            cell.explored = true;
        }
    }

    Ok(maze)
}

/// Encodes the maze as a snapshot JSON document.
pub fn to_json(maze: &Maze) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(&export(maze))?)
}

/// Decodes a snapshot JSON document into a maze of the provided dimensions.
pub fn from_json(json: &str, tuning: GridTuning) -> Result<Maze, SnapshotError> {
    let rows: Vec<Vec<CellRecord>> = serde_json::from_str(json)?;
    import(&rows, tuning)
}

/// Writes the snapshot JSON document to `path`.
pub fn save(maze: &Maze, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let json = to_json(maze)?;
    fs::write(path, json).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a snapshot JSON document from `path`.
pub fn load(path: impl AsRef<Path>, tuning: GridTuning) -> Result<Maze, SnapshotError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&json, tuning)
}
