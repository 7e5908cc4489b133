//! Final report of a calibration session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use sf_types::SfResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub session_id: Uuid,
    pub name: String,
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub epochs_completed: u32,
    pub runs_completed: u64,
    pub best_cost: Option<f64>,
    pub best_run_id: Option<u64>,
    /// Best parameter values keyed by parameter name.
    pub best_parameters: BTreeMap<String, f64>,
}

impl RunReport {
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.name, self.session_id)
    }

    /// Write the report as pretty JSON into `dir`, creating it if needed.
    pub fn write_json(&self, dir: &Path) -> SfResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(path)
    }
}
