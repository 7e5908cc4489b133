// SimFit calibration engine
// Proposer/evaluator protocol over an injected host environment

pub mod config;
pub mod cost;
pub mod host;
pub mod manager;
pub mod report;

pub use config::CalibrationConfig;
pub use cost::{compute_cost, CostFunction, WeightedAbsoluteError, WeightedSquaredError};
pub use host::{ChannelHost, CostFrame, HostEnvironment, Role, ScriptedHost};
pub use manager::OptimizationManager;
pub use report::RunReport;
