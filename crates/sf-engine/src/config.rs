//! Run configuration loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use sf_optimizer::OptimizerKind;
use sf_types::SfResult;

/// Top-level configuration of one calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub name: String,
    pub optimizer: OptimizerKind,
    /// Directory for the JSON run report. No directory, no report file.
    pub report_dir: Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            name: "calibration".to_string(),
            optimizer: OptimizerKind::default(),
            report_dir: None,
        }
    }
}

impl CalibrationConfig {
    pub fn new(name: impl Into<String>, optimizer: OptimizerKind) -> Self {
        Self {
            name: name.into(),
            optimizer,
            report_dir: None,
        }
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    pub fn from_json_file(path: &Path) -> SfResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: CalibrationConfig = serde_json::from_str(&text)?;
        info!(
            "Loaded calibration config {:?} ({} optimizer) from {}",
            config.name,
            config.optimizer.name(),
            path.display()
        );
        Ok(config)
    }
}
