//! Checkpoint artifacts: per-epoch histories and the final-state snapshot
//! used to resume a run.

use csv::{ReaderBuilder, Trim, Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use sf_types::{CandidateState, CheckpointError, SfResult};

/// Where a strategy writes its artifacts. No directory means no files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub directory: Option<PathBuf>,
    pub stem: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: None,
            stem: "optimizer".to_string(),
        }
    }
}

impl ArtifactConfig {
    pub fn in_directory(directory: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            directory: Some(directory.into()),
            stem: stem.into(),
        }
    }

    fn file(&self, suffix: &str) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(format!("{}_{}", self.stem, suffix)))
    }

    pub fn cost_history_path(&self) -> Option<PathBuf> {
        self.file("cost_history.csv")
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        self.file("history.csv")
    }

    pub fn final_state_path(&self) -> Option<PathBuf> {
        self.file("final_state.txt")
    }
}

/// Index written in the first snapshot row, which holds the best state.
pub const BEST_ROW_INDEX: i64 = -1;

/// One row of the final-state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub index: i64,
    pub epoch: u32,
    pub cost: f64,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub best_cost: f64,
    pub best_position: Vec<f64>,
}

impl SnapshotRow {
    /// Row describing a best-so-far record. Velocity is zero.
    pub fn for_best(epoch: u32, best: &CandidateState) -> Self {
        Self {
            index: BEST_ROW_INDEX,
            epoch,
            cost: best.cost,
            position: best.position.clone(),
            velocity: vec![0.0; best.dimensions()],
            best_cost: best.cost,
            best_position: best.position.clone(),
        }
    }

    pub fn column_count(dimensions: usize) -> usize {
        4 + 3 * dimensions
    }

    fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(Self::column_count(self.position.len()));
        record.push(self.index.to_string());
        record.push(self.epoch.to_string());
        record.push(self.cost.to_string());
        record.extend(self.position.iter().map(f64::to_string));
        record.extend(self.velocity.iter().map(f64::to_string));
        record.push(self.best_cost.to_string());
        record.extend(self.best_position.iter().map(f64::to_string));
        record
    }

    fn from_record(
        record: &csv::StringRecord,
        dimensions: usize,
        path: &Path,
        row: usize,
    ) -> Result<Self, CheckpointError> {
        let expected = Self::column_count(dimensions);
        if record.len() != expected {
            return Err(CheckpointError::ColumnCount {
                path: path.to_path_buf(),
                row,
                expected,
                actual: record.len(),
            });
        }

        let malformed = |column: usize, field: &str| CheckpointError::Malformed {
            path: path.to_path_buf(),
            message: format!("row {} column {}: cannot parse {:?}", row, column, field),
        };
        let number = |column: usize| -> Result<f64, CheckpointError> {
            let field = &record[column];
            field.parse::<f64>().map_err(|_| malformed(column, field))
        };
        let vector = |start: usize| -> Result<Vec<f64>, CheckpointError> {
            (start..start + dimensions).map(&number).collect()
        };

        let index = record[0]
            .parse::<i64>()
            .map_err(|_| malformed(0, &record[0]))?;
        let epoch = record[1]
            .parse::<u32>()
            .map_err(|_| malformed(1, &record[1]))?;

        Ok(Self {
            index,
            epoch,
            cost: number(2)?,
            position: vector(3)?,
            velocity: vector(3 + dimensions)?,
            best_cost: number(3 + 2 * dimensions)?,
            best_position: vector(4 + 2 * dimensions)?,
        })
    }
}

/// Best row followed by one row per candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub best: SnapshotRow,
    pub members: Vec<SnapshotRow>,
}

pub fn snapshot_header(dimensions: usize) -> Vec<String> {
    let mut header = vec!["Particle".to_string(), "epoch".to_string(), "cost".to_string()];
    header.extend((0..dimensions).map(|j| format!("pos_{}", j)));
    header.extend((0..dimensions).map(|j| format!("vel_{}", j)));
    header.push("best_cost".to_string());
    header.extend((0..dimensions).map(|j| format!("best_pos_{}", j)));
    header
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> SfResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let dimensions = snapshot.best.position.len();
    let mut writer = WriterBuilder::new().delimiter(b' ').from_path(path)?;
    writer.write_record(snapshot_header(dimensions))?;
    writer.write_record(snapshot.best.to_record())?;
    for member in &snapshot.members {
        writer.write_record(member.to_record())?;
    }
    writer.flush()?;
    tracing::debug!(
        "Wrote snapshot with {} members to {}",
        snapshot.members.len(),
        path.display()
    );
    Ok(())
}

/// Read a snapshot, validating the column count of every row and, when
/// `expected_members` is given, the number of candidate rows.
pub fn read_snapshot(
    path: &Path,
    dimensions: usize,
    expected_members: Option<usize>,
) -> SfResult<Snapshot> {
    if !path.exists() {
        return Err(CheckpointError::Missing {
            path: path.to_path_buf(),
        }
        .into());
    }
    tracing::info!("Loading snapshot from: {}", path.display());

    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;

    let header_len = reader.headers()?.len();
    let expected_columns = SnapshotRow::column_count(dimensions);
    if header_len != expected_columns {
        return Err(CheckpointError::ColumnCount {
            path: path.to_path_buf(),
            row: 0,
            expected: expected_columns,
            actual: header_len,
        }
        .into());
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        rows.push(SnapshotRow::from_record(&record, dimensions, path, line + 1)?);
    }

    let expected_rows = expected_members.map(|members| members + 1);
    let row_count_ok = match expected_rows {
        Some(expected) => rows.len() == expected,
        None => !rows.is_empty(),
    };
    if !row_count_ok {
        return Err(CheckpointError::RowCount {
            path: path.to_path_buf(),
            expected: expected_rows.unwrap_or(1),
            actual: rows.len(),
        }
        .into());
    }

    let members = rows.split_off(1);
    let best = rows.remove(0);
    Ok(Snapshot { best, members })
}

/// Header for the per-epoch candidate history.
pub fn history_header(candidates: usize, dimensions: usize) -> Vec<String> {
    let mut header = Vec::with_capacity((candidates + 1) * (dimensions + 1));
    for i in 0..candidates {
        header.extend((0..dimensions).map(|j| format!("Pos_{}_{}", i, j)));
        header.push(format!("Cost_{}", i));
    }
    header.extend((0..dimensions).map(|j| format!("Pos_Best_{}", j)));
    header.push("Cost_Best".to_string());
    header
}

pub fn history_row<'a>(
    candidates: impl IntoIterator<Item = &'a CandidateState>,
    best: &'a CandidateState,
) -> Vec<String> {
    let mut row = Vec::new();
    for candidate in candidates.into_iter().chain(std::iter::once(best)) {
        row.extend(candidate.position.iter().map(f64::to_string));
        row.push(candidate.cost.to_string());
    }
    row
}

/// Appends one cost-history row and one candidate-history row per closed
/// epoch, flushing after each so a crashed run keeps its progress.
#[derive(Debug, Default)]
pub struct EpochLog {
    cost_history: Option<Writer<File>>,
    history: Option<Writer<File>>,
}

impl EpochLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn create(artifacts: &ArtifactConfig, history_header: Vec<String>) -> SfResult<Self> {
        let (Some(cost_path), Some(history_path)) =
            (artifacts.cost_history_path(), artifacts.history_path())
        else {
            return Ok(Self::disabled());
        };
        if let Some(directory) = &artifacts.directory {
            fs::create_dir_all(directory)?;
        }

        let mut cost_history = Writer::from_writer(Self::truncate(&cost_path)?);
        cost_history.write_record(["Epoch", "Global_Best_Cost"])?;
        cost_history.flush()?;

        let mut history = Writer::from_writer(Self::truncate(&history_path)?);
        history.write_record(history_header)?;
        history.flush()?;

        tracing::info!(
            "Recording epoch history to {} and {}",
            cost_path.display(),
            history_path.display()
        );
        Ok(Self {
            cost_history: Some(cost_history),
            history: Some(history),
        })
    }

    fn truncate(path: &Path) -> SfResult<File> {
        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?)
    }

    pub fn is_enabled(&self) -> bool {
        self.cost_history.is_some()
    }

    pub fn record(&mut self, epoch: u32, best_cost: f64, history_row: Vec<String>) -> SfResult<()> {
        if let Some(writer) = self.cost_history.as_mut() {
            writer.write_record([epoch.to_string(), best_cost.to_string()])?;
            writer.flush()?;
        }
        if let Some(writer) = self.history.as_mut() {
            writer.write_record(history_row)?;
            writer.flush()?;
        }
        Ok(())
    }
}
