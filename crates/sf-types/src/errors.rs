use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the SimFit system
#[derive(Error, Debug)]
pub enum SfError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration type mismatch: expected {expected} configuration, got {actual}")]
    ConfigType { expected: String, actual: String },

    #[error("Correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Role error: {0}")]
    Role(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invalid or missing configuration. Always fatal to the call that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("parameter space is empty")]
    EmptyParameterSpace,

    #[error("parameter at index {index} has an empty name")]
    EmptyName { index: usize },

    #[error("parameter {name} has no binding")]
    MissingBinding { name: String },

    #[error("parameter {name} has inverted bounds: min {minimum} > max {maximum}")]
    InvertedBounds {
        name: String,
        minimum: f64,
        maximum: f64,
    },

    #[error("parameter {name} has non-finite bounds")]
    NonFiniteBounds { name: String },

    #[error("{field} must be at least {minimum}, got {value}")]
    CountTooSmall {
        field: String,
        value: u64,
        minimum: u64,
    },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: String, value: f64 },

    #[error("{field} must lie in {range}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        range: String,
    },

    #[error("{field} has {actual} values for {expected} parameters")]
    DimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid constraint on {parameter}: {message}")]
    InvalidConstraint { parameter: String, message: String },

    #[error("unknown binding slot {slot}")]
    UnknownSlot { slot: usize },

    #[error("invalid trajectory row {row}: {message}")]
    InvalidTrajectoryRow { row: usize, message: String },

    #[error("target {name} has neither a scalar target nor trajectory rows")]
    TargetWithoutValues { name: String },

    #[error("missing configuration: {0}")]
    Missing(String),

    #[error("{0}")]
    Other(String),
}

/// A returned run id could not be matched to exactly one outstanding candidate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    #[error("run id {run_id} matches no dispatched candidate")]
    UnknownRunId { run_id: u64 },

    #[error("run id {run_id} was already assigned a cost")]
    AlreadyAssigned { run_id: u64 },

    #[error("run id {run_id} is still awaiting its cost at the epoch boundary")]
    Outstanding { run_id: u64 },

    #[error("transported run id {value} is not an exact whole number")]
    NotIntegral { value: f64 },
}

/// Checkpoint artifact missing, malformed, or unwritable.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("checkpoint file {} is malformed: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("checkpoint file {} has {actual} data rows, expected {expected}", path.display())]
    RowCount {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("checkpoint file {} row {row} has {actual} columns, expected {expected}", path.display())]
    ColumnCount {
        path: PathBuf,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for SimFit operations
pub type SfResult<T> = Result<T, SfError>;

impl From<csv::Error> for SfError {
    fn from(err: csv::Error) -> Self {
        SfError::Checkpoint(CheckpointError::Csv(err))
    }
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::SfError::Internal(format!($($arg)*))
    };
}

/// Macro for creating free-form configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SfError::Config($crate::ConfigError::Other(format!($($arg)*)))
    };
}

/// Macro for creating role errors
#[macro_export]
macro_rules! role_error {
    ($($arg:tt)*) => {
        $crate::SfError::Role(format!($($arg)*))
    };
}
