//! Evaluation targets, driver trajectories and trajectory row parsing.

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, SfResult};
use crate::slots::SlotHandle;

/// What "cost" means for one model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTarget {
    pub name: String,
    pub binding: SlotHandle,
    pub cost_weight: f64,
    pub scalar_target: Option<f64>,
    pub trajectory_target: Vec<f64>,
}

impl EvaluationTarget {
    pub fn new(
        name: impl Into<String>,
        binding: SlotHandle,
        scalar_target: Option<f64>,
        cost_weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            binding,
            cost_weight,
            scalar_target,
            trajectory_target: Vec::new(),
        }
    }

    /// Scalar mode is active until a trajectory row has been added.
    pub fn is_scalar(&self) -> bool {
        self.trajectory_target.is_empty()
    }

    /// Targets registered without a scalar value take trajectory columns.
    pub fn accepts_trajectory(&self) -> bool {
        self.scalar_target.is_none()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cost_weight > 0.0) {
            return Err(ConfigError::NonPositive {
                field: format!("cost_weight of target {}", self.name),
                value: self.cost_weight,
            });
        }
        if self.is_scalar() && self.scalar_target.is_none() {
            return Err(ConfigError::TargetWithoutValues {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Time series fed into the model, one sample per simulated step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverTrajectory {
    pub binding: SlotHandle,
    pub trajectory: Vec<f64>,
}

impl DriverTrajectory {
    pub fn new(binding: SlotHandle) -> Self {
        Self {
            binding,
            trajectory: Vec::new(),
        }
    }

    /// Sample for `step`; past the end the last sample is held.
    pub fn sample(&self, step: usize) -> Option<f64> {
        self.trajectory
            .get(step)
            .or_else(|| self.trajectory.last())
            .copied()
    }
}

/// Parse one comma separated trajectory row. The first column is a time
/// tag; it must parse as a number but is discarded.
pub fn parse_trajectory_row(line: &str, row: usize, expected_values: usize) -> SfResult<Vec<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let record = match reader.records().next() {
        Some(record) => record?,
        None => {
            return Err(ConfigError::InvalidTrajectoryRow {
                row,
                message: "row is empty".to_string(),
            }
            .into())
        }
    };

    if record.len() != expected_values + 1 {
        return Err(ConfigError::InvalidTrajectoryRow {
            row,
            message: format!(
                "expected a time tag and {} values, got {} columns",
                expected_values,
                record.len()
            ),
        }
        .into());
    }

    let mut values = Vec::with_capacity(expected_values);
    for (column, field) in record.iter().enumerate() {
        let value: f64 = field.parse().map_err(|_| ConfigError::InvalidTrajectoryRow {
            row,
            message: format!("column {} is not a number: {:?}", column, field),
        })?;
        if column > 0 {
            values.push(value);
        }
    }
    Ok(values)
}
