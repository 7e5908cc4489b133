//! Strategy selection: a closed set of strategies chosen once per run.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sf_types::{SfError, SfResult};

use crate::gradient::{GradientConfig, GradientDescentOptimizer};
use crate::optimizer::Optimizer;
use crate::swarm::{ParticleSwarmOptimizer, SwarmConfig};

/// Strategy plus its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    ParticleSwarm(SwarmConfig),
    GradientDescent(GradientConfig),
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::ParticleSwarm(SwarmConfig::default())
    }
}

impl OptimizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::ParticleSwarm(_) => "particle_swarm",
            OptimizerKind::GradientDescent(_) => "gradient_descent",
        }
    }

    pub fn build(&self) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::ParticleSwarm(config) => {
                Box::new(ParticleSwarmOptimizer::new(config.clone()))
            }
            OptimizerKind::GradientDescent(config) => {
                Box::new(GradientDescentOptimizer::new(config.clone()))
            }
        }
    }
}

/// Owns the single optimizer instance of a calibration run.
#[derive(Default)]
pub struct OptimizerFactory {
    kind: Option<OptimizerKind>,
    optimizer: Option<Box<dyn Optimizer>>,
}

impl OptimizerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the optimizer for `kind`, replacing any previous one.
    pub fn create(&mut self, kind: OptimizerKind) -> SfResult<&mut (dyn Optimizer + 'static)> {
        if let Some(previous) = &self.kind {
            debug!("Replacing {} optimizer with {}", previous.name(), kind.name());
        }
        info!("Creating {} optimizer", kind.name());
        self.optimizer = Some(kind.build());
        self.kind = Some(kind);
        self.optimizer_mut()
            .ok_or_else(|| sf_types::internal_error!("optimizer missing right after creation"))
    }

    /// Swap in a new configuration for the strategy already created. The
    /// optimizer is rebuilt and must be initialized again.
    pub fn set_config(&mut self, kind: OptimizerKind) -> SfResult<()> {
        let current = self
            .kind
            .as_ref()
            .ok_or_else(|| sf_types::config_error!("set_config called before an optimizer was created"))?;
        if current.name() != kind.name() {
            return Err(SfError::ConfigType {
                expected: current.name().to_string(),
                actual: kind.name().to_string(),
            });
        }
        self.create(kind)?;
        Ok(())
    }

    pub fn kind(&self) -> Option<&OptimizerKind> {
        self.kind.as_ref()
    }

    pub fn optimizer(&self) -> Option<&(dyn Optimizer + 'static)> {
        self.optimizer.as_deref()
    }

    pub fn optimizer_mut(&mut self) -> Option<&mut (dyn Optimizer + 'static)> {
        self.optimizer.as_deref_mut()
    }

    pub fn destroy(&mut self) {
        if let Some(kind) = self.kind.take() {
            debug!("Destroying {} optimizer", kind.name());
        }
        self.optimizer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_requested_strategy() {
        let mut factory = OptimizerFactory::new();
        let optimizer = factory
            .create(OptimizerKind::GradientDescent(GradientConfig::new(3)))
            .unwrap();
        assert_eq!(optimizer.kind_name(), "gradient_descent");

        factory
            .create(OptimizerKind::ParticleSwarm(SwarmConfig::new(4, 2)))
            .unwrap();
        assert_eq!(factory.optimizer().unwrap().kind_name(), "particle_swarm");
        assert_eq!(factory.optimizer().unwrap().num_runs_needed(), 8);
    }

    #[test]
    fn set_config_rejects_other_kind() {
        let mut factory = OptimizerFactory::new();
        factory
            .create(OptimizerKind::ParticleSwarm(SwarmConfig::new(4, 2)))
            .unwrap();

        let err = factory
            .set_config(OptimizerKind::GradientDescent(GradientConfig::default()))
            .unwrap_err();
        match err {
            SfError::ConfigType { expected, actual } => {
                assert_eq!(expected, "particle_swarm");
                assert_eq!(actual, "gradient_descent");
            }
            other => panic!("unexpected error {other:?}"),
        }

        factory
            .set_config(OptimizerKind::ParticleSwarm(SwarmConfig::new(6, 2)))
            .unwrap();
        assert_eq!(factory.optimizer().unwrap().num_runs_needed(), 12);
    }

    #[test]
    fn set_config_needs_an_optimizer() {
        let mut factory = OptimizerFactory::new();
        assert!(matches!(
            factory.set_config(OptimizerKind::default()),
            Err(SfError::Config(_))
        ));
    }

    #[test]
    fn destroy_releases_optimizer() {
        let mut factory = OptimizerFactory::new();
        factory.create(OptimizerKind::default()).unwrap();
        factory.destroy();
        assert!(factory.optimizer().is_none());
        assert!(factory.kind().is_none());
    }

    #[test]
    fn kind_uses_external_tagging() {
        let json = r#"{"gradient_descent": {"num_epochs": 7, "propagation_gain": 0.5}}"#;
        let kind: OptimizerKind = serde_json::from_str(json).unwrap();
        match kind {
            OptimizerKind::GradientDescent(config) => {
                assert_eq!(config.num_epochs, 7);
                assert_eq!(config.propagation_gain, 0.5);
                assert_eq!(config.probe_delta_factor, 0.001);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let json = r#"{"particle_swarm": {"num_particles": 3, "init": "corners"}}"#;
        let kind: OptimizerKind = serde_json::from_str(json).unwrap();
        assert_eq!(
            kind,
            OptimizerKind::ParticleSwarm(SwarmConfig {
                num_particles: 3,
                init: crate::swarm::SwarmInit::Corners,
                ..SwarmConfig::default()
            })
        );
    }
}
