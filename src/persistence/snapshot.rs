use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ecosystem::EcosystemParams;
use crate::persistence::{SimulationId, StoreError};
use crate::world::{Animal, Turn};

/// Full state of one simulation: rules, turn counter and every animal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub id: SimulationId,
    pub params: EcosystemParams,
    pub turn: Turn,
    pub animals: Vec<Animal>,
}

impl SimulationSnapshot {
    /// Living animals must be on the grid and never share a cell.
    fn is_consistent(&self) -> bool {
        let mut cells = HashSet::new();
        self.animals
            .iter()
            .filter(|a| a.alive)
            .all(|a| a.position.in_bounds(self.params.grid_size) && cells.insert(a.position))
    }
}

/// A snapshot file on disk, as described by its name.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub turn: Turn,
    pub timestamp: u64,
    pub file_size: u64,
}

/// Errors that can occur while saving, listing or loading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    /// Decoded, but living animals overlap or sit off the grid.
    #[error("Corrupt snapshot: {}", .0.display())]
    Corrupt(PathBuf),
    #[error("No valid snapshots found. Start a new run with: fishbowl run")]
    NoValidSnapshots,
    /// The simulation could not be read out of its store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn snapshot_filename(turn: Turn, timestamp: u64) -> String {
    format!("fishbowl-turn{}-{}.bin", turn, timestamp)
}

/// Parse `fishbowl-turn{N}-{timestamp}.bin`.
fn parse_snapshot_filename(filename: &str) -> Option<(Turn, u64)> {
    let rest = filename
        .strip_suffix(".bin")?
        .strip_prefix("fishbowl-turn")?;
    let (turn, ts) = rest.split_once('-')?;
    Some((turn.parse().ok()?, ts.parse().ok()?))
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Write a snapshot into `snapshot_dir`. The file only appears under its
/// final name once fully written.
pub fn save_snapshot(
    snapshot: &SimulationSnapshot,
    snapshot_dir: &Path,
) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let filename = snapshot_filename(snapshot.turn, unix_timestamp_now());
    let target = snapshot_dir.join(&filename);
    let tmp = snapshot_dir.join(format!(".{}.tmp", filename));

    let encoded =
        bincode::serialize(snapshot).map_err(|e| SnapshotError::Serialize(e.to_string()))?;

    if let Err(e) = fs::write(&tmp, &encoded).and_then(|()| fs::rename(&tmp, &target)) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::Io(e));
    }

    debug!(path = %target.display(), turn = snapshot.turn, bytes = encoded.len(), "Snapshot saved");
    Ok(target)
}

pub fn load_snapshot(path: &Path) -> Result<SimulationSnapshot, SnapshotError> {
    let data = fs::read(path)?;
    let snapshot: SimulationSnapshot =
        bincode::deserialize(&data).map_err(|e| SnapshotError::Deserialize(e.to_string()))?;

    if !snapshot.is_consistent() {
        return Err(SnapshotError::Corrupt(path.to_path_buf()));
    }
    Ok(snapshot)
}

/// Snapshots in a directory, newest first. A missing directory has none.
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if filename.starts_with('.') {
            continue;
        }
        if let Some((turn, timestamp)) = parse_snapshot_filename(filename) {
            let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            snapshots.push(SnapshotMetadata {
                path,
                turn,
                timestamp,
                file_size,
            });
        }
    }

    snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.turn.cmp(&a.turn)));
    Ok(snapshots)
}

/// Delete all but the `max_snapshots` newest snapshots. Returns the deleted paths.
pub fn prune_snapshots(
    snapshot_dir: &Path,
    max_snapshots: usize,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let snapshots = list_snapshots(snapshot_dir)?;
    let mut deleted = Vec::new();
    for snapshot in snapshots.iter().skip(max_snapshots) {
        fs::remove_file(&snapshot.path)?;
        deleted.push(snapshot.path.clone());
    }
    Ok(deleted)
}

/// Load the newest snapshot that decodes and passes validation.
pub fn load_latest_valid_snapshot(
    snapshot_dir: &Path,
) -> Result<SimulationSnapshot, SnapshotError> {
    for snapshot in list_snapshots(snapshot_dir)? {
        match load_snapshot(&snapshot.path) {
            Ok(loaded) => return Ok(loaded),
            Err(e) => {
                warn!(
                    path = %snapshot.path.display(),
                    error = %e,
                    "Corrupt snapshot, trying next"
                );
            }
        }
    }
    Err(SnapshotError::NoValidSnapshots)
}
