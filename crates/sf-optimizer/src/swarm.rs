//! Particle swarm optimization driven one evaluation at a time.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use sf_types::{
    apply_constraints, validate_parameter_space, CandidateState, ConfigError, CorrelationError,
    ParameterDescriptor, RunId, SfResult,
};

use crate::checkpoint::{
    history_header, history_row, read_snapshot, write_snapshot, ArtifactConfig, EpochLog,
    Snapshot, SnapshotRow,
};
use crate::optimizer::{first_outstanding, unknown_run, OptimizationSummary, Optimizer, RunCounters};

/// How the swarm is seeded at `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmInit {
    /// Uniform random positions within bounds.
    Random,
    /// First half of the swarm at the minimum corner, the rest at the maximum.
    Corners,
    /// Positions from a final-state snapshot; costs and velocities start fresh.
    FromFile { path: PathBuf },
    /// Positions, velocities, personal bests and the global best from a snapshot.
    FromFileContinuous { path: PathBuf },
}

/// Swarm configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub num_particles: u32,
    pub num_epochs: u32,
    /// Inertia weight at the first epoch (w).
    pub inertia_start: f64,
    /// Inertia weight reached at the last epoch.
    pub inertia_end: f64,
    /// c1 - personal best influence
    pub cognitive_weight: f64,
    /// c2 - global best influence
    pub social_weight: f64,
    /// Fraction of each parameter range used for initial and maximum velocity.
    pub velocity_scale: f64,
    pub seed: u64,
    pub init: SwarmInit,
    pub artifacts: ArtifactConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            num_particles: 20,
            num_epochs: 50,
            inertia_start: 0.9,
            inertia_end: 0.4,
            cognitive_weight: 1.5,
            social_weight: 1.5,
            velocity_scale: 0.2,
            seed: 42,
            init: SwarmInit::Random,
            artifacts: ArtifactConfig::default(),
        }
    }
}

impl SwarmConfig {
    pub fn new(num_particles: u32, num_epochs: u32) -> Self {
        Self {
            num_particles,
            num_epochs,
            ..Self::default()
        }
    }

    pub fn with_inertia(mut self, start: f64, end: f64) -> Self {
        self.inertia_start = start;
        self.inertia_end = end;
        self
    }

    pub fn with_weights(mut self, cognitive: f64, social: f64) -> Self {
        self.cognitive_weight = cognitive;
        self.social_weight = social;
        self
    }

    pub fn with_velocity_scale(mut self, scale: f64) -> Self {
        self.velocity_scale = scale;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_init(mut self, init: SwarmInit) -> Self {
        self.init = init;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactConfig) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_particles < 1 {
            return Err(ConfigError::CountTooSmall {
                field: "num_particles".to_string(),
                value: self.num_particles as u64,
                minimum: 1,
            });
        }
        if self.num_epochs < 1 {
            return Err(ConfigError::CountTooSmall {
                field: "num_epochs".to_string(),
                value: self.num_epochs as u64,
                minimum: 1,
            });
        }
        for (field, value) in [
            ("inertia_start", self.inertia_start),
            ("inertia_end", self.inertia_end),
            ("cognitive_weight", self.cognitive_weight),
            ("social_weight", self.social_weight),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if !(self.velocity_scale > 0.0 && self.velocity_scale <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "velocity_scale".to_string(),
                value: self.velocity_scale,
                range: "(0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// One swarm member.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub state: CandidateState,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
    pub personal_best: CandidateState,
}

impl Particle {
    fn new(position: Vec<f64>, velocity: Vec<f64>) -> Self {
        let dims = position.len();
        Self {
            personal_best: CandidateState::new(position.clone()),
            state: CandidateState::new(position),
            velocity,
            acceleration: vec![0.0; dims],
        }
    }
}

/// Particle Swarm Optimization scheduled as one evaluation per `update`.
///
/// Every particle is evaluated once per epoch, in index order. When the
/// last cost of an epoch is in, the next `update` refreshes the personal
/// and global bests and moves the whole swarm.
pub struct ParticleSwarmOptimizer {
    config: SwarmConfig,
    parameters: Vec<ParameterDescriptor>,
    particles: Vec<Particle>,
    global_best: CandidateState,
    max_velocity: Vec<f64>,
    rng: ChaCha8Rng,
    counters: RunCounters,
    log: EpochLog,
}

impl ParticleSwarmOptimizer {
    pub fn new(config: SwarmConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            parameters: Vec::new(),
            particles: Vec::new(),
            global_best: CandidateState::new(Vec::new()),
            max_velocity: Vec::new(),
            rng,
            counters: RunCounters::default(),
            log: EpochLog::disabled(),
        }
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn global_best(&self) -> &CandidateState {
        &self.global_best
    }

    /// Inertia weight after `epoch` of `num_epochs` epochs have elapsed.
    pub fn inertia(&self, epoch: u32) -> f64 {
        let progress = (epoch as f64 / self.config.num_epochs as f64).min(1.0);
        self.config.inertia_start + (self.config.inertia_end - self.config.inertia_start) * progress
    }

    /// Snapshot of the current swarm in final-state layout.
    pub fn snapshot(&self) -> Snapshot {
        let epoch = self.counters.epochs_closed;
        Snapshot {
            best: SnapshotRow::for_best(epoch, &self.global_best),
            members: self
                .particles
                .iter()
                .enumerate()
                .map(|(i, particle)| SnapshotRow {
                    index: i as i64,
                    epoch,
                    cost: particle.state.cost,
                    position: particle.state.position.clone(),
                    velocity: particle.velocity.clone(),
                    best_cost: particle.personal_best.cost,
                    best_position: particle.personal_best.position.clone(),
                })
                .collect(),
        }
    }

    fn random_velocity(&mut self) -> Vec<f64> {
        let rng = &mut self.rng;
        self.max_velocity
            .iter()
            .map(|&vmax| rng.gen_range(-vmax..=vmax))
            .collect()
    }

    fn seed_particles(&mut self) -> SfResult<Vec<Particle>> {
        let n = self.config.num_particles as usize;
        let dims = self.parameters.len();
        let mut particles = Vec::with_capacity(n);

        match self.config.init.clone() {
            SwarmInit::Random => {
                for _ in 0..n {
                    let position = self
                        .parameters
                        .iter()
                        .map(|p| self.rng.gen_range(p.minimum..=p.maximum))
                        .collect();
                    let velocity = self.random_velocity();
                    particles.push(Particle::new(position, velocity));
                }
            }
            SwarmInit::Corners => {
                let at_minimum = (n + 1) / 2;
                for i in 0..n {
                    let position = self
                        .parameters
                        .iter()
                        .map(|p| if i < at_minimum { p.minimum } else { p.maximum })
                        .collect();
                    let velocity = self.random_velocity();
                    particles.push(Particle::new(position, velocity));
                }
            }
            SwarmInit::FromFile { path } => {
                let snapshot = read_snapshot(&path, dims, Some(n))?;
                for row in snapshot.members {
                    let velocity = self.random_velocity();
                    particles.push(Particle::new(row.position, velocity));
                }
            }
            SwarmInit::FromFileContinuous { path } => {
                let snapshot = read_snapshot(&path, dims, Some(n))?;
                for row in snapshot.members {
                    let velocity = row
                        .velocity
                        .iter()
                        .zip(&self.max_velocity)
                        .map(|(&v, &vmax)| v.clamp(-vmax, vmax))
                        .collect();
                    let mut particle = Particle::new(row.position, velocity);
                    particle.personal_best.position = row.best_position;
                    particle.personal_best.cost = row.best_cost;
                    particles.push(particle);
                }
                self.global_best.position = snapshot.best.position;
                self.global_best.cost = snapshot.best.cost;
            }
        }

        for particle in &mut particles {
            apply_constraints(&self.parameters, &mut particle.state.position);
        }
        Ok(particles)
    }

    /// Refresh personal and global bests from the epoch that just finished
    /// and append its history rows.
    fn close_epoch(&mut self) -> SfResult<()> {
        if let Some(run_id) = first_outstanding(self.particles.iter().map(|p| &p.state)) {
            return Err(CorrelationError::Outstanding {
                run_id: run_id.value(),
            }
            .into());
        }

        let epoch = self.counters.epoch;
        for particle in &mut self.particles {
            if !particle.state.is_evaluated() {
                continue;
            }
            particle.personal_best.offer_best(&particle.state);
            if self.global_best.offer_best(&particle.state) {
                info!(
                    "Epoch {}: new global best cost {:.6e} from run {}",
                    epoch,
                    self.global_best.cost,
                    particle.state.run_id.map(|id| id.value()).unwrap_or_default()
                );
            }
        }

        let row = history_row(self.particles.iter().map(|p| &p.state), &self.global_best);
        self.log.record(epoch, self.global_best.cost, row)?;
        self.counters.epochs_closed = epoch;
        debug!("Epoch {} closed, global best cost {:.6e}", epoch, self.global_best.cost);
        Ok(())
    }

    /// Move every particle: stochastic pull toward its personal best and
    /// the global best, velocity clamp, reflecting boundaries.
    fn propagate(&mut self) {
        let epoch = self.counters.epoch;
        let inertia = self.inertia(epoch);
        let c1 = self.config.cognitive_weight;
        let c2 = self.config.social_weight;
        debug!("Propagating swarm after epoch {} with inertia {:.4}", epoch, inertia);

        for particle in &mut self.particles {
            for d in 0..self.parameters.len() {
                let r1: f64 = self.rng.gen();
                let r2: f64 = self.rng.gen();
                let x = particle.state.position[d];

                let acceleration = c1 * r1 * (particle.personal_best.position[d] - x)
                    + c2 * r2 * (self.global_best.position[d] - x);
                particle.acceleration[d] = acceleration;

                let vmax = self.max_velocity[d];
                let mut velocity = (inertia * particle.velocity[d] + acceleration).clamp(-vmax, vmax);
                let mut next = x + velocity;

                // Reflect off the boundary rather than wrapping around.
                let bounds = &self.parameters[d];
                if next < bounds.minimum {
                    next = bounds.minimum;
                    velocity = -velocity;
                } else if next > bounds.maximum {
                    next = bounds.maximum;
                    velocity = -velocity;
                }

                particle.velocity[d] = velocity;
                particle.state.position[d] = next;
            }
            apply_constraints(&self.parameters, &mut particle.state.position);
            particle.state.reset_cost();
        }
    }
}

impl Optimizer for ParticleSwarmOptimizer {
    fn name(&self) -> &str {
        "Particle Swarm Optimization"
    }

    fn kind_name(&self) -> &'static str {
        "particle_swarm"
    }

    fn initialize(&mut self, parameters: &[ParameterDescriptor]) -> SfResult<()> {
        validate_parameter_space(parameters)?;
        self.config.validate()?;

        self.parameters = parameters.to_vec();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.max_velocity = parameters
            .iter()
            .map(|p| self.config.velocity_scale * p.range())
            .collect();
        self.global_best = CandidateState::new(vec![0.0; parameters.len()]);
        self.particles = self.seed_particles()?;
        if self.global_best.cost.is_infinite() {
            self.global_best.position = self.particles[0].state.position.clone();
        }
        self.counters = RunCounters::default();

        let header = history_header(self.particles.len(), parameters.len());
        self.log = EpochLog::create(&self.config.artifacts, header)?;

        info!(
            "Initialized particle swarm: {} particles, {} epochs, {} parameters, {:?} seeding",
            self.config.num_particles,
            self.config.num_epochs,
            parameters.len(),
            self.config.init
        );
        Ok(())
    }

    fn update(&mut self, run_id: RunId) -> SfResult<()> {
        if self.particles.is_empty() {
            return Err(sf_types::internal_error!("particle swarm used before initialize"));
        }
        let runs_per_epoch = self.runs_per_epoch();
        let previous = self.counters;
        if self.counters.advance(runs_per_epoch) {
            if let Err(error) = self.close_epoch() {
                self.counters = previous;
                return Err(error);
            }
            self.propagate();
            self.counters.start_next_epoch();
        }

        let active = self.counters.active_index();
        self.particles[active].state.dispatch(run_id);
        debug!(
            "Run {} -> particle {} (epoch {})",
            run_id, active, self.counters.epoch
        );
        Ok(())
    }

    fn state(&self) -> &[f64] {
        self.particles
            .get(self.counters.active_index())
            .map(|p| p.state.position.as_slice())
            .unwrap_or(&[])
    }

    fn assign_cost(&mut self, cost: f64, run_id: RunId) -> SfResult<()> {
        let index = self
            .particles
            .iter()
            .position(|particle| particle.state.matches(run_id))
            .ok_or_else(|| unknown_run(self.name(), run_id))?;

        self.particles[index].state.acknowledge(run_id, cost)?;
        debug!("Run {}: particle {} cost {:.6e}", run_id, index, cost);
        Ok(())
    }

    fn shutdown(&mut self) -> SfResult<OptimizationSummary> {
        let runs_per_epoch = self.runs_per_epoch();
        let epoch_open = self.counters.epochs_closed < self.counters.epoch
            && self.counters.global_run >= 0
            && self.counters.epoch_fully_dispatched(runs_per_epoch);
        if epoch_open {
            let outstanding = first_outstanding(self.particles.iter().map(|p| &p.state));
            match outstanding {
                None => self.close_epoch()?,
                Some(run_id) => warn!(
                    "Shutting down with run {} outstanding; final epoch not recorded",
                    run_id
                ),
            }
        }

        if let Some(path) = self.config.artifacts.final_state_path() {
            write_snapshot(&path, &self.snapshot())?;
            info!("Final swarm state written to {}", path.display());
        }

        let best = self.best().cloned();
        match &best {
            Some(best) => info!(
                "Particle swarm finished after {} epochs: best cost {:.6e} at {:?}",
                self.counters.epochs_closed, best.cost, best.position
            ),
            None => warn!("Particle swarm finished without any evaluated particle"),
        }

        Ok(OptimizationSummary {
            strategy: self.kind_name().to_string(),
            epochs_completed: self.counters.epochs_closed,
            runs_completed: self.counters.runs_dispatched(),
            best,
        })
    }

    fn num_runs_needed(&self) -> u32 {
        self.config.num_particles.saturating_mul(self.config.num_epochs)
    }

    fn runs_per_epoch(&self) -> u32 {
        self.config.num_particles
    }

    fn epoch(&self) -> u32 {
        self.counters.epoch
    }

    fn best(&self) -> Option<&CandidateState> {
        if self.global_best.cost.is_finite() {
            Some(&self.global_best)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_types::{Constraint, ParameterId, SfError, SlotHandle};
    use tempfile::TempDir;

    fn space() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("a", SlotHandle::from_index(0), 0.0, 20.0),
            ParameterDescriptor::new("b", SlotHandle::from_index(1), 5.0, 10.0),
        ]
    }

    fn sphere(x: &[f64]) -> f64 {
        (x[0] - 7.0).powi(2) + (x[1] - 8.0).powi(2)
    }

    /// Drive `epochs` full epochs sequentially, returning the next run id.
    fn run_epochs(pso: &mut ParticleSwarmOptimizer, epochs: u32, mut next: u64) -> u64 {
        for _ in 0..epochs * pso.runs_per_epoch() {
            let id = RunId::new(next);
            pso.update(id).unwrap();
            let cost = sphere(pso.state());
            pso.assign_cost(cost, id).unwrap();
            next += 1;
        }
        next
    }

    #[test]
    fn corner_seeding_places_particles_on_bounds() {
        let config = SwarmConfig::new(2, 3).with_init(SwarmInit::Corners);
        let mut pso = ParticleSwarmOptimizer::new(config);
        pso.initialize(&space()).unwrap();

        assert_eq!(pso.particles()[0].state.position, vec![0.0, 5.0]);
        assert_eq!(pso.particles()[1].state.position, vec![20.0, 10.0]);
        assert_eq!(pso.particles()[0].personal_best.cost, f64::INFINITY);
        assert!(pso.best().is_none());
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let cases = vec![
            SwarmConfig::new(0, 5),
            SwarmConfig::new(5, 0),
            SwarmConfig::new(5, 5).with_weights(0.0, 1.0),
            SwarmConfig::new(5, 5).with_weights(1.0, -1.0),
            SwarmConfig::new(5, 5).with_inertia(0.0, 0.4),
            SwarmConfig::new(5, 5).with_velocity_scale(0.0),
            SwarmConfig::new(5, 5).with_velocity_scale(1.5),
        ];
        for config in cases {
            let mut pso = ParticleSwarmOptimizer::new(config.clone());
            match pso.initialize(&space()) {
                Err(SfError::Config(_)) => {}
                other => panic!("expected config error for {config:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_parameter_space_is_rejected() {
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(4, 4));
        assert!(matches!(
            pso.initialize(&[]),
            Err(SfError::Config(ConfigError::EmptyParameterSpace))
        ));
    }

    #[test]
    fn states_and_velocities_stay_bounded() {
        let config = SwarmConfig::new(6, 25).with_seed(7).with_velocity_scale(0.5);
        let mut pso = ParticleSwarmOptimizer::new(config);
        let params = space();
        pso.initialize(&params).unwrap();

        let mut next = 0;
        for _ in 0..pso.num_runs_needed() {
            let id = RunId::new(next);
            pso.update(id).unwrap();
            let state = pso.state().to_vec();
            for (value, p) in state.iter().zip(&params) {
                assert!(p.contains(*value), "{value} outside [{}, {}]", p.minimum, p.maximum);
            }
            for particle in pso.particles() {
                for (v, p) in particle.velocity.iter().zip(&params) {
                    assert!(v.abs() <= 0.5 * p.range() + 1e-12);
                }
            }
            pso.assign_cost(sphere(&state), id).unwrap();
            next += 1;
        }
    }

    #[test]
    fn swarm_improves_on_sphere() {
        let config = SwarmConfig::new(10, 30).with_seed(11);
        let mut pso = ParticleSwarmOptimizer::new(config);
        pso.initialize(&space()).unwrap();

        let next = run_epochs(&mut pso, 1, 0);
        let first_epoch_best = pso
            .particles()
            .iter()
            .map(|p| p.state.cost)
            .fold(f64::INFINITY, f64::min);
        run_epochs(&mut pso, 29, next);
        let summary = pso.shutdown().unwrap();

        let best = summary.best.unwrap();
        assert!(best.cost <= first_epoch_best);
        assert!(best.cost < 1.0, "best cost {}", best.cost);
        assert_eq!(summary.epochs_completed, 30);
        assert_eq!(summary.runs_completed, 300);
    }

    #[test]
    fn same_seed_same_search() {
        let run = || {
            let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(5, 4).with_seed(3));
            pso.initialize(&space()).unwrap();
            run_epochs(&mut pso, 4, 0);
            pso.shutdown().unwrap().best.unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn costs_may_arrive_out_of_order() {
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(3, 2).with_init(SwarmInit::Corners));
        pso.initialize(&space()).unwrap();

        let mut dispatched = Vec::new();
        for id in 0..3 {
            pso.update(RunId::new(id)).unwrap();
            dispatched.push((RunId::new(id), pso.state().to_vec()));
        }
        for (id, position) in dispatched.iter().rev() {
            pso.assign_cost(sphere(position), *id).unwrap();
        }
        for (particle, (_, position)) in pso.particles().iter().zip(&dispatched) {
            assert_eq!(particle.state.cost, sphere(position));
        }
    }

    #[test]
    fn unknown_and_duplicate_run_ids_are_fatal() {
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(2, 2));
        pso.initialize(&space()).unwrap();
        pso.update(RunId::new(0)).unwrap();
        pso.update(RunId::new(1)).unwrap();

        assert!(matches!(
            pso.assign_cost(1.0, RunId::new(99)),
            Err(SfError::Correlation(CorrelationError::UnknownRunId { run_id: 99 }))
        ));

        pso.assign_cost(4.0, RunId::new(0)).unwrap();
        pso.assign_cost(6.0, RunId::new(1)).unwrap();
        assert_eq!(pso.particles()[0].state.cost, 4.0);
        assert_eq!(pso.particles()[1].state.cost, 6.0);

        assert!(matches!(
            pso.assign_cost(5.0, RunId::new(0)),
            Err(SfError::Correlation(CorrelationError::AlreadyAssigned { run_id: 0 }))
        ));
        assert_eq!(pso.particles()[0].state.cost, 4.0);
    }

    #[test]
    fn epoch_boundary_with_outstanding_run_fails() {
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(2, 2));
        pso.initialize(&space()).unwrap();
        pso.update(RunId::new(0)).unwrap();
        pso.update(RunId::new(1)).unwrap();
        pso.assign_cost(1.0, RunId::new(1)).unwrap();

        assert!(matches!(
            pso.update(RunId::new(2)),
            Err(SfError::Correlation(CorrelationError::Outstanding { run_id: 0 }))
        ));
    }

    #[test]
    fn late_cost_then_retry_keeps_counters_aligned() {
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(2, 2));
        pso.initialize(&space()).unwrap();
        pso.update(RunId::new(0)).unwrap();
        pso.update(RunId::new(1)).unwrap();
        pso.assign_cost(1.0, RunId::new(1)).unwrap();

        assert!(pso.update(RunId::new(2)).is_err());
        assert_eq!(pso.epoch(), 1);

        pso.assign_cost(2.0, RunId::new(0)).unwrap();
        pso.update(RunId::new(2)).unwrap();
        assert_eq!(pso.epoch(), 2);
        assert_eq!(pso.particles()[0].state.run_id, Some(RunId::new(2)));
        pso.assign_cost(3.0, RunId::new(2)).unwrap();
        pso.update(RunId::new(3)).unwrap();
        assert_eq!(pso.particles()[1].state.run_id, Some(RunId::new(3)));
        pso.assign_cost(4.0, RunId::new(3)).unwrap();

        let summary = pso.shutdown().unwrap();
        assert_eq!(summary.runs_completed, 4);
        assert_eq!(summary.epochs_completed, 2);
    }

    #[test]
    fn inertia_anneals_linearly() {
        let pso = ParticleSwarmOptimizer::new(SwarmConfig::new(2, 4).with_inertia(0.9, 0.5));
        assert!((pso.inertia(0) - 0.9).abs() < 1e-12);
        assert!((pso.inertia(2) - 0.7).abs() < 1e-12);
        assert!((pso.inertia(4) - 0.5).abs() < 1e-12);
        assert!((pso.inertia(8) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn constraints_hold_after_propagation() {
        let params = vec![
            ParameterDescriptor::new("a", SlotHandle::from_index(0), 0.0, 10.0),
            ParameterDescriptor::new("b", SlotHandle::from_index(1), 0.0, 10.0)
                .with_constraint(Constraint::linear(ParameterId(0), 0.5, 1.0)),
        ];
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(4, 5).with_seed(5));
        pso.initialize(&params).unwrap();

        for id in 0..pso.num_runs_needed() as u64 {
            pso.update(RunId::new(id)).unwrap();
            let state = pso.state().to_vec();
            assert!((state[1] - (0.5 * state[0] + 1.0)).abs() < 1e-12);
            pso.assign_cost(state[0], RunId::new(id)).unwrap();
        }
    }

    #[test]
    fn checkpoint_resume_reproduces_positions() {
        let dir = TempDir::new().unwrap();
        let artifacts = ArtifactConfig::in_directory(dir.path(), "pso");
        let config = SwarmConfig::new(4, 3).with_seed(9).with_artifacts(artifacts.clone());
        let mut pso = ParticleSwarmOptimizer::new(config);
        pso.initialize(&space()).unwrap();
        run_epochs(&mut pso, 3, 0);
        pso.shutdown().unwrap();

        let expected: Vec<Vec<f64>> = pso
            .particles()
            .iter()
            .map(|p| p.state.position.clone())
            .collect();
        let path = artifacts.final_state_path().unwrap();

        let resumed_config = SwarmConfig::new(4, 3).with_init(SwarmInit::FromFile { path: path.clone() });
        let mut resumed = ParticleSwarmOptimizer::new(resumed_config);
        resumed.initialize(&space()).unwrap();
        for (particle, position) in resumed.particles().iter().zip(&expected) {
            assert_eq!(&particle.state.position, position);
            assert_eq!(particle.state.cost, f64::INFINITY);
            assert_eq!(particle.personal_best.cost, f64::INFINITY);
        }
        assert!(resumed.best().is_none());

        let continuous_config =
            SwarmConfig::new(4, 3).with_init(SwarmInit::FromFileContinuous { path });
        let mut continued = ParticleSwarmOptimizer::new(continuous_config);
        continued.initialize(&space()).unwrap();
        for (new, old) in continued.particles().iter().zip(pso.particles()) {
            assert_eq!(new.velocity, old.velocity);
            assert_eq!(new.personal_best.cost, old.personal_best.cost);
            assert_eq!(new.personal_best.position, old.personal_best.position);
        }
        assert_eq!(continued.global_best().cost, pso.global_best().cost);

        let costs = std::fs::read_to_string(artifacts.cost_history_path().unwrap()).unwrap();
        assert_eq!(costs.lines().count(), 4);
    }

    #[test]
    fn resume_with_wrong_swarm_size_fails() {
        let dir = TempDir::new().unwrap();
        let artifacts = ArtifactConfig::in_directory(dir.path(), "pso");
        let mut pso = ParticleSwarmOptimizer::new(SwarmConfig::new(3, 1).with_artifacts(artifacts.clone()));
        pso.initialize(&space()).unwrap();
        run_epochs(&mut pso, 1, 0);
        pso.shutdown().unwrap();

        let path = artifacts.final_state_path().unwrap();
        let mut resumed =
            ParticleSwarmOptimizer::new(SwarmConfig::new(5, 1).with_init(SwarmInit::FromFile { path }));
        assert!(matches!(
            resumed.initialize(&space()),
            Err(SfError::Checkpoint(_))
        ));
    }
}
