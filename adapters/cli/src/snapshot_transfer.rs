use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use maze_rescue_core::CellCoord;
use maze_rescue_world::{
    query,
    snapshot::{self, CellRecord, SnapshotError},
    GridTuning, Maze,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "rescue";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "rescue:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Explored maze packed into a single line for clipboard transfer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SnapshotTransfer {
    /// Number of cell columns.
    pub(crate) columns: u32,
    /// Number of cell rows.
    pub(crate) rows: u32,
    /// Cell through which the robot enters the maze.
    pub(crate) entrance: CellCoord,
    /// Cell records, one inner vector per row.
    pub(crate) cells: Vec<Vec<CellRecord>>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    entrance: CellCoord,
    cells: Vec<Vec<CellRecord>>,
}

/// Errors raised while encoding or decoding transfer strings.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("transfer string was empty")]
    EmptyPayload,
    /// A segment was missing from the transfer string.
    #[error("transfer string is missing the {0}")]
    MissingSegment(&'static str),
    /// The transfer string used an unexpected prefix.
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The transfer string used an unsupported version.
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode snapshot payload")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The JSON payload could not be encoded or decoded.
    #[error("could not process snapshot payload")]
    InvalidPayload(#[source] serde_json::Error),
    /// The records do not describe a valid maze.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl SnapshotTransfer {
    /// Captures the cells of `maze`.
    pub(crate) fn capture(maze: &Maze) -> Self {
        let (columns, rows) = query::dimensions(maze);
        Self {
            columns,
            rows,
            entrance: query::entrance(maze),
            cells: snapshot::export(maze),
        }
    }

    /// Grid dimensions and entrance described by the transfer.
    pub(crate) fn grid(&self) -> GridTuning {
        GridTuning {
            columns: self.columns,
            rows: self.rows,
            entrance: self.entrance,
        }
    }

    /// Rebuilds the maze described by the transfer.
    pub(crate) fn restore(&self) -> Result<Maze, TransferError> {
        Ok(snapshot::import(&self.cells, self.grid())?)
    }

    /// Encodes the snapshot into a single-line string.
    pub(crate) fn encode(&self) -> Result<String, TransferError> {
        let payload = Payload {
            entrance: self.entrance,
            cells: self.cells.clone(),
        };
        let json = serde_json::to_vec(&payload).map_err(TransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}{FIELD_DELIMITER}{}x{}{FIELD_DELIMITER}{encoded}",
            self.columns, self.rows
        ))
    }

    /// Decodes a snapshot from its single-line representation.
    pub(crate) fn decode(value: &str) -> Result<Self, TransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(TransferError::MissingSegment("prefix"))?;
        let version = parts
            .next()
            .ok_or(TransferError::MissingSegment("version"))?;
        let dimensions = parts
            .next()
            .ok_or(TransferError::MissingSegment("grid dimensions"))?;
        let payload = parts
            .next()
            .ok_or(TransferError::MissingSegment("payload"))?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(TransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(TransferError::UnsupportedVersion(version.to_owned()));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(TransferError::InvalidEncoding)?;
        let decoded: Payload =
            serde_json::from_slice(&bytes).map_err(TransferError::InvalidPayload)?;

        Ok(Self {
            columns,
            rows,
            entrance: decoded.entrance,
            cells: decoded.cells,
        })
    }
}

/// Reports whether `value` looks like a transfer string rather than a path.
pub(crate) fn is_transfer_string(value: &str) -> bool {
    value
        .trim()
        .strip_prefix(SNAPSHOT_DOMAIN)
        .is_some_and(|rest| rest.starts_with(FIELD_DELIMITER))
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), TransferError> {
    let invalid = || TransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;

    if columns == 0 || rows == 0 {
        return Err(invalid());
    }

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_rescue_core::{Command, Damage, WallFlags, WorldPoint};
    use maze_rescue_world::apply;

    fn explored_maze() -> Maze {
        let mut maze = Maze::new(GridTuning {
            columns: 3,
            rows: 2,
            entrance: CellCoord::new(1, 1),
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
        apply(
            &mut maze,
            Command::RecordObservation {
                walls: WallFlags::default().with(maze_rescue_core::Direction::East, true),
                damage: Damage::Light,
                survivor: true,
            },
            &mut events,
        );
        maze
    }

    #[test]
    fn restores_the_encoded_maze() {
        let maze = explored_maze();
        let encoded = SnapshotTransfer::capture(&maze)
            .encode()
            .expect("snapshot encodes");
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:3x2:")));
        assert!(is_transfer_string(&encoded));

        let restored = SnapshotTransfer::decode(&encoded)
            .expect("snapshot decodes")
            .restore()
            .expect("maze restores");
        assert_eq!(query::entrance(&restored), CellCoord::new(1, 1));
        assert_eq!(query::survivor_cells(&restored), vec![CellCoord::new(1, 1)]);
        assert_eq!(snapshot::export(&restored), snapshot::export(&maze));
    }

    #[test]
    fn rejects_foreign_prefix() {
        let error = SnapshotTransfer::decode("maze:v1:3x2:e30").expect_err("wrong domain");
        assert!(matches!(error, TransferError::InvalidPrefix(prefix) if prefix == "maze"));
        assert!(!is_transfer_string("maze:v1:3x2:e30"));
        assert!(!is_transfer_string("rescue.json"));
    }

    #[test]
    fn rejects_unknown_version() {
        let error = SnapshotTransfer::decode("rescue:v9:3x2:e30").expect_err("wrong version");
        assert!(matches!(error, TransferError::UnsupportedVersion(version) if version == "v9"));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let error = SnapshotTransfer::decode("rescue:v1:0x2:e30").expect_err("empty grid");
        assert!(matches!(error, TransferError::InvalidDimensions(_)));
    }

    #[test]
    fn reports_missing_segments() {
        assert!(matches!(
            SnapshotTransfer::decode("  "),
            Err(TransferError::EmptyPayload)
        ));
        assert!(matches!(
            SnapshotTransfer::decode("rescue:v1:3x2"),
            Err(TransferError::MissingSegment("payload"))
        ));
    }

    #[test]
    fn mismatched_row_length_fails_on_restore() {
        let mut transfer = SnapshotTransfer::capture(&explored_maze());
        let _ = transfer.cells[1].pop();
        let encoded = transfer.encode().expect("snapshot encodes");
        let error = SnapshotTransfer::decode(&encoded)
            .expect("payload decodes")
            .restore()
            .expect_err("row length mismatch");
        assert!(matches!(
            error,
            TransferError::Snapshot(SnapshotError::RowLengthMismatch {
                row: 1,
                expected: 3,
                actual: 2
            })
        ));
    }
}
