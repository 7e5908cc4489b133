//! # sf-optimizer
//!
//! Search strategies for SimFit calibration runs.
//!
//! Provides the [`Optimizer`] contract, particle swarm and finite-difference
//! gradient descent strategies, the [`OptimizerKind`] selector and the
//! checkpoint artifacts written while a search runs.

mod checkpoint;
mod factory;
mod gradient;
mod optimizer;
mod swarm;

pub use checkpoint::{
    read_snapshot, write_snapshot, ArtifactConfig, EpochLog, Snapshot, SnapshotRow,
    BEST_ROW_INDEX,
};
pub use factory::{OptimizerFactory, OptimizerKind};
pub use gradient::{GradientConfig, GradientDescentOptimizer, GradientInit, Probe, ProbeDirection};
pub use optimizer::{OptimizationSummary, Optimizer};
pub use swarm::{Particle, ParticleSwarmOptimizer, SwarmConfig, SwarmInit};
