//! Finite-difference gradient descent.
//!
//! Each epoch evaluates the working state followed by one positive and one
//! negative probe per dimension. The step taken along a dimension divides
//! the working cost by the probe gradient, so the search behaves like a
//! damped root finder on the cost surface: it settles into the local basin
//! it starts in and carries no global-optimum guarantee.

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

/// Starting point of the working state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientInit {
    /// Centre of every parameter range.
    Midpoint,
    /// One value per parameter, each within bounds.
    Explicit { values: Vec<f64> },
    Random,
    /// Best row of a final-state snapshot. Snapshots written by either
    /// strategy are accepted.
    FromFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    pub num_epochs: u32,
    pub propagation_gain: f64,
    /// Probe offset relative to the current coordinate.
    pub probe_delta_factor: f64,
    pub seed: u64,
    pub init: GradientInit,
    pub artifacts: ArtifactConfig,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            num_epochs: 20,
            propagation_gain: 1.0,
            probe_delta_factor: 0.001,
            seed: 42,
            init: GradientInit::Midpoint,
            artifacts: ArtifactConfig::default(),
        }
    }
}

impl GradientConfig {
    pub fn new(num_epochs: u32) -> Self {
        Self {
            num_epochs,
            ..Self::default()
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.propagation_gain = gain;
        self
    }

    pub fn with_probe_delta_factor(mut self, factor: f64) -> Self {
        self.probe_delta_factor = factor;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_init(mut self, init: GradientInit) -> Self {
        self.init = init;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactConfig) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_epochs < 1 {
            return Err(ConfigError::CountTooSmall {
                field: "num_epochs".to_string(),
                value: self.num_epochs as u64,
                minimum: 1,
            });
        }
        if !(self.propagation_gain > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "propagation_gain".to_string(),
                value: self.propagation_gain,
            });
        }
        if !(self.probe_delta_factor > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "probe_delta_factor".to_string(),
                value: self.probe_delta_factor,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeDirection {
    Positive,
    Negative,
}

impl ProbeDirection {
    fn sign(self) -> f64 {
        match self {
            ProbeDirection::Positive => 1.0,
            ProbeDirection::Negative => -1.0,
        }
    }
}

/// A working-state copy displaced along one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub state: CandidateState,
    pub dimension: usize,
    pub direction: ProbeDirection,
    /// Displacement from the working state after clamping to bounds.
    pub delta_state: f64,
    pub delta_cost: Option<f64>,
    pub cost_gradient: Option<f64>,
}

impl Probe {
    /// Fill in the cost difference and gradient once both costs are known.
    fn refresh(&mut self, working: &CandidateState) {
        if !(working.is_evaluated() && self.state.is_evaluated()) {
            return;
        }
        let delta_cost = self.state.cost - working.cost;
        self.delta_cost = Some(delta_cost);
        self.cost_gradient = if self.delta_state != 0.0 {
            Some(delta_cost / self.delta_state)
        } else {
            None
        };
    }

    fn descends(&self) -> Option<(f64, f64)> {
        match (self.delta_cost, self.cost_gradient) {
            (Some(delta_cost), Some(gradient)) if delta_cost < 0.0 && gradient != 0.0 => {
                Some((delta_cost, gradient))
            }
            _ => None,
        }
    }
}

/// Which candidate an epoch run evaluates.
enum Slot {
    Working,
    Probe(usize),
}

pub struct GradientDescentOptimizer {
    config: GradientConfig,
    parameters: Vec<ParameterDescriptor>,
    working: CandidateState,
    probes: Vec<Probe>,
    best: CandidateState,
    rng: ChaCha8Rng,
    counters: RunCounters,
    log: EpochLog,
}

impl GradientDescentOptimizer {
    pub fn new(config: GradientConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            parameters: Vec::new(),
            working: CandidateState::new(Vec::new()),
            probes: Vec::new(),
            best: CandidateState::new(Vec::new()),
            rng,
            counters: RunCounters::default(),
            log: EpochLog::disabled(),
        }
    }

    pub fn config(&self) -> &GradientConfig {
        &self.config
    }

    pub fn working_state(&self) -> &CandidateState {
        &self.working
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn snapshot(&self) -> Snapshot {
        let epoch = self.counters.epochs_closed;
        Snapshot {
            best: SnapshotRow::for_best(epoch, &self.best),
            members: vec![SnapshotRow {
                index: 0,
                epoch,
                cost: self.working.cost,
                position: self.working.position.clone(),
                velocity: vec![0.0; self.working.dimensions()],
                best_cost: self.best.cost,
                best_position: self.best.position.clone(),
            }],
        }
    }

    fn slot(&self) -> Slot {
        match self.counters.active_index() {
            0 => Slot::Working,
            i => Slot::Probe(i - 1),
        }
    }

    fn starting_point(&mut self) -> SfResult<Vec<f64>> {
        let dims = self.parameters.len();
        let start = match self.config.init.clone() {
            GradientInit::Midpoint => self
                .parameters
                .iter()
                .map(|p| 0.5 * (p.minimum + p.maximum))
                .collect(),
            GradientInit::Explicit { values } => {
                if values.len() != dims {
                    return Err(ConfigError::DimensionMismatch {
                        field: "explicit starting point".to_string(),
                        expected: dims,
                        actual: values.len(),
                    }
                    .into());
                }
                for (value, p) in values.iter().zip(&self.parameters) {
                    if !p.contains(*value) {
                        return Err(ConfigError::OutOfRange {
                            field: format!("starting value of {}", p.name),
                            value: *value,
                            range: format!("[{}, {}]", p.minimum, p.maximum),
                        }
                        .into());
                    }
                }
                values
            }
            GradientInit::Random => self
                .parameters
                .iter()
                .map(|p| self.rng.gen_range(p.minimum..=p.maximum))
                .collect(),
            GradientInit::FromFile { path } => read_snapshot(&path, dims, None)?.best.position,
        };
        Ok(start)
    }

    /// Rebuild the probe set around the working state, ordered
    /// `[d0+, d0-, d1+, d1-, ...]`.
    fn build_probes(&mut self) {
        let factor = self.config.probe_delta_factor;
        let mut probes = Vec::with_capacity(2 * self.parameters.len());
        for (dimension, parameter) in self.parameters.iter().enumerate() {
            let x = self.working.position[dimension];
            let magnitude = if x == 0.0 {
                factor * parameter.range()
            } else {
                factor * x.abs()
            };
            for direction in [ProbeDirection::Positive, ProbeDirection::Negative] {
                let value = parameter.clamp(x + direction.sign() * magnitude);
                let mut position = self.working.position.clone();
                position[dimension] = value;
                probes.push(Probe {
                    state: CandidateState::new(position),
                    dimension,
                    direction,
                    delta_state: value - x,
                    delta_cost: None,
                    cost_gradient: None,
                });
            }
        }
        self.probes = probes;
    }

    fn close_epoch(&mut self) -> SfResult<()> {
        let candidates = std::iter::once(&self.working).chain(self.probes.iter().map(|p| &p.state));
        if let Some(run_id) = first_outstanding(candidates) {
            return Err(CorrelationError::Outstanding {
                run_id: run_id.value(),
            }
            .into());
        }

        let epoch = self.counters.epoch;
        let evaluated = std::iter::once(&self.working)
            .chain(self.probes.iter().map(|p| &p.state))
            .filter(|state| state.is_evaluated());
        for state in evaluated {
            if self.best.offer_best(state) {
                info!(
                    "Epoch {}: new best cost {:.6e} at {:?}",
                    epoch, self.best.cost, self.best.position
                );
            }
        }

        let row = history_row(
            std::iter::once(&self.working).chain(self.probes.iter().map(|p| &p.state)),
            &self.best,
        );
        self.log.record(epoch, self.best.cost, row)?;
        self.counters.epochs_closed = epoch;
        Ok(())
    }

    fn propagate(&mut self) {
        let dims = self.parameters.len();
        let gain = self.config.propagation_gain;
        let cost = self.working.cost;

        let mut steps = vec![0.0; dims];
        for (dimension, step) in steps.iter_mut().enumerate() {
            let steepest = self
                .probes
                .iter()
                .filter(|probe| probe.dimension == dimension)
                .filter_map(Probe::descends)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, gradient)) = steepest {
                *step = -cost / gradient / dims as f64 * gain;
            }
        }
        debug!("Epoch {} gradient step {:?}", self.counters.epoch, steps);

        for (value, step) in self.working.position.iter_mut().zip(&steps) {
            *value += step;
        }
        apply_constraints(&self.parameters, &mut self.working.position);
        self.working.reset_cost();
        self.build_probes();
    }
}

impl Optimizer for GradientDescentOptimizer {
    fn name(&self) -> &str {
        "Gradient Descent"
    }

    fn kind_name(&self) -> &'static str {
        "gradient_descent"
    }

    fn initialize(&mut self, parameters: &[ParameterDescriptor]) -> SfResult<()> {
        validate_parameter_space(parameters)?;
        self.config.validate()?;

        self.parameters = parameters.to_vec();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut start = self.starting_point()?;
        apply_constraints(&self.parameters, &mut start);

        self.best = CandidateState::new(start.clone());
        self.working = CandidateState::new(start);
        self.build_probes();
        self.counters = RunCounters::default();

        let header = history_header(1 + self.probes.len(), parameters.len());
        self.log = EpochLog::create(&self.config.artifacts, header)?;

        info!(
            "Initialized gradient descent: {} parameters, {} epochs, start {:?}",
            parameters.len(),
            self.config.num_epochs,
            self.working.position
        );
        Ok(())
    }

    fn update(&mut self, run_id: RunId) -> SfResult<()> {
        if self.parameters.is_empty() {
            return Err(sf_types::internal_error!("gradient descent used before initialize"));
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

        match self.slot() {
            Slot::Working => self.working.dispatch(run_id),
            Slot::Probe(i) => self.probes[i].state.dispatch(run_id),
        }
        debug!(
            "Run {} -> epoch {} slot {}",
            run_id,
            self.counters.epoch,
            self.counters.active_index()
        );
        Ok(())
    }

    fn state(&self) -> &[f64] {
        if self.parameters.is_empty() {
            return &[];
        }
        match self.slot() {
            Slot::Working => self.working.position.as_slice(),
            Slot::Probe(i) => self.probes[i].state.position.as_slice(),
        }
    }

    fn assign_cost(&mut self, cost: f64, run_id: RunId) -> SfResult<()> {
        if self.working.matches(run_id) {
            self.working.acknowledge(run_id, cost)?;
            for probe in &mut self.probes {
                probe.refresh(&self.working);
            }
            debug!("Run {}: working state cost {:.6e}", run_id, cost);
            return Ok(());
        }

        let index = self
            .probes
            .iter()
            .position(|probe| probe.state.matches(run_id))
            .ok_or_else(|| unknown_run(self.name(), run_id))?;
        let probe = &mut self.probes[index];
        probe.state.acknowledge(run_id, cost)?;
        probe.refresh(&self.working);
        debug!(
            "Run {}: probe {} ({:?} along {}) cost {:.6e}",
            run_id, index, probe.direction, probe.dimension, cost
        );
        Ok(())
    }

    fn shutdown(&mut self) -> SfResult<OptimizationSummary> {
        let runs_per_epoch = self.runs_per_epoch();
        let epoch_open = self.counters.epochs_closed < self.counters.epoch
            && self.counters.global_run >= 0
            && self.counters.epoch_fully_dispatched(runs_per_epoch);
        if epoch_open {
            let candidates =
                std::iter::once(&self.working).chain(self.probes.iter().map(|p| &p.state));
            match first_outstanding(candidates) {
                None => self.close_epoch()?,
                Some(run_id) => warn!(
                    "Shutting down with run {} outstanding; final epoch not recorded",
                    run_id
                ),
            }
        }

        if let Some(path) = self.config.artifacts.final_state_path() {
            write_snapshot(&path, &self.snapshot())?;
            info!("Final gradient descent state written to {}", path.display());
        }

        let best = self.best().cloned();
        match &best {
            Some(best) => info!(
                "Gradient descent finished after {} epochs: best cost {:.6e} at {:?}",
                self.counters.epochs_closed, best.cost, best.position
            ),
            None => warn!("Gradient descent finished without any evaluated state"),
        }

        Ok(OptimizationSummary {
            strategy: self.kind_name().to_string(),
            epochs_completed: self.counters.epochs_closed,
            runs_completed: self.counters.runs_dispatched(),
            best,
        })
    }

    fn num_runs_needed(&self) -> u32 {
        self.runs_per_epoch().saturating_mul(self.config.num_epochs)
    }

    fn runs_per_epoch(&self) -> u32 {
        2 * self.parameters.len() as u32 + 1
    }

    fn epoch(&self) -> u32 {
        self.counters.epoch
    }

    fn best(&self) -> Option<&CandidateState> {
        if self.best.cost.is_finite() {
            Some(&self.best)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_types::{SfError, SlotHandle};
    use tempfile::TempDir;

    fn unit_space(dims: usize) -> Vec<ParameterDescriptor> {
        (0..dims)
            .map(|i| ParameterDescriptor::new(format!("p{i}"), SlotHandle::from_index(i), 0.0, 1.0))
            .collect()
    }

    fn bowl(x: &[f64]) -> f64 {
        (x[0] - 0.3).powi(2) + (x[1] - 0.6).powi(2)
    }

    fn run_sequential(gd: &mut GradientDescentOptimizer, cost: impl Fn(&[f64]) -> f64) {
        for id in 0..gd.num_runs_needed() as u64 {
            let run_id = RunId::new(id);
            gd.update(run_id).unwrap();
            let value = cost(gd.state());
            gd.assign_cost(value, run_id).unwrap();
        }
    }

    #[test]
    fn probes_follow_relative_offsets() {
        let config = GradientConfig::new(3).with_init(GradientInit::Explicit {
            values: vec![0.1, 0.2],
        });
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&unit_space(2)).unwrap();

        let expected = [
            (0, ProbeDirection::Positive, [0.1001, 0.2]),
            (0, ProbeDirection::Negative, [0.0999, 0.2]),
            (1, ProbeDirection::Positive, [0.1, 0.2002]),
            (1, ProbeDirection::Negative, [0.1, 0.1998]),
        ];
        assert_eq!(gd.probes().len(), 4);
        for (probe, (dimension, direction, position)) in gd.probes().iter().zip(expected) {
            assert_eq!(probe.dimension, dimension);
            assert_eq!(probe.direction, direction);
            for (actual, wanted) in probe.state.position.iter().zip(position) {
                assert!((actual - wanted).abs() < 1e-12, "{actual} != {wanted}");
            }
            assert_eq!(probe.state.cost, f64::INFINITY);
        }
        assert_eq!(gd.runs_per_epoch(), 5);
        assert_eq!(gd.num_runs_needed(), 15);
    }

    #[test]
    fn zero_coordinate_probes_scale_with_range() {
        let params = vec![ParameterDescriptor::new("a", SlotHandle::from_index(0), -2.0, 2.0)];
        let config = GradientConfig::new(1)
            .with_probe_delta_factor(0.01)
            .with_init(GradientInit::Explicit { values: vec![0.0] });
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&params).unwrap();

        assert!((gd.probes()[0].delta_state - 0.04).abs() < 1e-12);
        assert!((gd.probes()[1].delta_state + 0.04).abs() < 1e-12);
    }

    #[test]
    fn probe_at_bound_has_no_gradient() {
        let config = GradientConfig::new(1).with_init(GradientInit::Explicit { values: vec![1.0] });
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&unit_space(1)).unwrap();
        assert_eq!(gd.probes()[0].state.position, vec![1.0]);
        assert_eq!(gd.probes()[0].delta_state, 0.0);

        for id in 0..3 {
            gd.update(RunId::new(id)).unwrap();
            gd.assign_cost(2.0 - id as f64 * 0.5, RunId::new(id)).unwrap();
        }
        assert_eq!(gd.probes()[0].delta_cost, Some(-0.5));
        assert_eq!(gd.probes()[0].cost_gradient, None);
        assert!(gd.probes()[1].cost_gradient.is_some());
    }

    #[test]
    fn gradients_form_in_either_arrival_order() {
        let config = GradientConfig::new(2).with_init(GradientInit::Explicit {
            values: vec![0.5, 0.5],
        });
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&unit_space(2)).unwrap();

        let mut dispatched = Vec::new();
        for id in 0..5 {
            gd.update(RunId::new(id)).unwrap();
            dispatched.push((RunId::new(id), gd.state().to_vec()));
        }

        // Probes first, working state last.
        for (id, position) in dispatched.iter().skip(1) {
            gd.assign_cost(bowl(position), *id).unwrap();
        }
        assert!(gd.probes().iter().all(|p| p.delta_cost.is_none()));

        gd.assign_cost(bowl(&dispatched[0].1), dispatched[0].0).unwrap();
        for probe in gd.probes() {
            let expected = bowl(&probe.state.position) - bowl(&[0.5, 0.5]);
            let delta_cost = probe.delta_cost.unwrap();
            assert!((delta_cost - expected).abs() < 1e-15);
            assert!((probe.cost_gradient.unwrap() - delta_cost / probe.delta_state).abs() < 1e-12);
        }
    }

    #[test]
    fn one_dimensional_descent_converges() {
        let params = unit_space(1);
        let config = GradientConfig::new(20).with_init(GradientInit::Midpoint);
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&params).unwrap();

        run_sequential(&mut gd, |x| (x[0] - 0.3).powi(2));
        let summary = gd.shutdown().unwrap();
        let best = summary.best.unwrap();
        assert!(best.cost < 1e-6, "best cost {}", best.cost);
        assert!((best.position[0] - 0.3).abs() < 1e-3);
        assert_eq!(summary.epochs_completed, 20);
        assert_eq!(summary.runs_completed, 60);
    }

    #[test]
    fn best_never_regresses_in_two_dimensions() {
        let config = GradientConfig::new(10);
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&unit_space(2)).unwrap();
        let start_cost = bowl(&[0.5, 0.5]);

        let mut last_best = f64::INFINITY;
        for id in 0..gd.num_runs_needed() as u64 {
            let run_id = RunId::new(id);
            gd.update(run_id).unwrap();
            if let Some(best) = gd.best() {
                assert!(best.cost <= last_best);
                last_best = best.cost;
            }
            for (value, p) in gd.state().iter().zip(&unit_space(2)) {
                assert!(p.contains(*value));
            }
            let value = bowl(gd.state());
            gd.assign_cost(value, run_id).unwrap();
        }
        let summary = gd.shutdown().unwrap();
        assert!(summary.best.unwrap().cost < start_cost);
    }

    #[test]
    fn unknown_and_duplicate_ids_are_rejected() {
        let mut gd = GradientDescentOptimizer::new(GradientConfig::new(2));
        gd.initialize(&unit_space(1)).unwrap();
        gd.update(RunId::new(0)).unwrap();

        assert!(matches!(
            gd.assign_cost(1.0, RunId::new(7)),
            Err(SfError::Correlation(CorrelationError::UnknownRunId { run_id: 7 }))
        ));
        gd.assign_cost(1.0, RunId::new(0)).unwrap();
        assert!(matches!(
            gd.assign_cost(1.0, RunId::new(0)),
            Err(SfError::Correlation(CorrelationError::AlreadyAssigned { run_id: 0 }))
        ));
    }

    #[test]
    fn late_cost_then_retry_keeps_counters_aligned() {
        let mut gd = GradientDescentOptimizer::new(GradientConfig::new(2));
        gd.initialize(&unit_space(1)).unwrap();
        for id in 0..3 {
            gd.update(RunId::new(id)).unwrap();
        }
        gd.assign_cost(0.5, RunId::new(1)).unwrap();
        gd.assign_cost(0.7, RunId::new(2)).unwrap();

        assert!(matches!(
            gd.update(RunId::new(3)),
            Err(SfError::Correlation(CorrelationError::Outstanding { run_id: 0 }))
        ));
        assert_eq!(gd.epoch(), 1);

        gd.assign_cost(0.6, RunId::new(0)).unwrap();
        for id in 3..6 {
            let run_id = RunId::new(id);
            gd.update(run_id).unwrap();
            gd.assign_cost(0.4, run_id).unwrap();
        }
        assert_eq!(gd.epoch(), 2);
        assert_eq!(gd.working_state().run_id, Some(RunId::new(3)));

        let summary = gd.shutdown().unwrap();
        assert_eq!(summary.runs_completed, 6);
        assert_eq!(summary.epochs_completed, 2);
    }

    #[test]
    fn explicit_start_is_validated() {
        let too_short = GradientConfig::new(1).with_init(GradientInit::Explicit { values: vec![0.5] });
        let mut gd = GradientDescentOptimizer::new(too_short);
        assert!(matches!(
            gd.initialize(&unit_space(2)),
            Err(SfError::Config(ConfigError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }))
        ));

        let outside = GradientConfig::new(1).with_init(GradientInit::Explicit {
            values: vec![0.5, 1.5],
        });
        let mut gd = GradientDescentOptimizer::new(outside);
        assert!(matches!(
            gd.initialize(&unit_space(2)),
            Err(SfError::Config(ConfigError::OutOfRange { .. }))
        ));

        let mut gd = GradientDescentOptimizer::new(GradientConfig::new(1).with_gain(0.0));
        assert!(matches!(
            gd.initialize(&unit_space(2)),
            Err(SfError::Config(ConfigError::NonPositive { .. }))
        ));
    }

    #[test]
    fn resumes_from_snapshot_best_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seed_final_state.txt");
        let mut best = CandidateState::new(vec![0.25, 0.75]);
        best.cost = 0.01;
        let member = |i: i64| SnapshotRow {
            index: i,
            epoch: 3,
            cost: 0.5,
            position: vec![0.9, 0.1],
            velocity: vec![0.01, -0.01],
            best_cost: 0.4,
            best_position: vec![0.8, 0.2],
        };
        let snapshot = Snapshot {
            best: SnapshotRow::for_best(3, &best),
            members: vec![member(0), member(1), member(2)],
        };
        write_snapshot(&path, &snapshot).unwrap();

        let config = GradientConfig::new(1).with_init(GradientInit::FromFile { path });
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&unit_space(2)).unwrap();
        assert_eq!(gd.working_state().position, vec![0.25, 0.75]);
        assert_eq!(gd.working_state().cost, f64::INFINITY);
    }

    #[test]
    fn shutdown_writes_artifacts() {
        let dir = TempDir::new().unwrap();
        let artifacts = ArtifactConfig::in_directory(dir.path(), "gd");
        let config = GradientConfig::new(4).with_artifacts(artifacts.clone());
        let mut gd = GradientDescentOptimizer::new(config);
        gd.initialize(&unit_space(2)).unwrap();
        run_sequential(&mut gd, bowl);
        let summary = gd.shutdown().unwrap();

        let snapshot = read_snapshot(&artifacts.final_state_path().unwrap(), 2, Some(1)).unwrap();
        let best = summary.best.unwrap();
        assert_eq!(snapshot.best.cost, best.cost);
        assert_eq!(snapshot.best.position, best.position);

        let history = std::fs::read_to_string(artifacts.history_path().unwrap()).unwrap();
        let header = history.lines().next().unwrap();
        assert_eq!(header.split(',').count(), 6 * 3);
        assert_eq!(history.lines().count(), 5);
    }
}
