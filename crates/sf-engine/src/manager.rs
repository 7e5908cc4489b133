// Optimization manager: proposer and evaluator halves of the calibration
// protocol around one shared model description.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sf_optimizer::{Optimizer, OptimizerFactory, OptimizerKind};
use sf_types::{
    apply_constraints, parse_trajectory_row, ConfigError, Constraint, DriverTrajectory,
    EvaluationTarget, ParameterDescriptor, ParameterId, RunId, SfResult, SlotHandle, SlotRegistry,
};

use crate::config::CalibrationConfig;
use crate::cost::{CostFunction, WeightedSquaredError};
use crate::host::{HostEnvironment, Role};
use crate::report::RunReport;

/// Cost accumulated for the evaluation in progress.
#[derive(Debug, Clone)]
struct Evaluation {
    run_id: RunId,
    step: usize,
    cost: f64,
    exhausted_warned: bool,
}

/// Drives one calibration session.
///
/// Both roles register the same parameters, targets and drivers against
/// their own [`SlotRegistry`]. The proposer then owns the optimizer and
/// turns its states into proposals; evaluators run the model for a given
/// proposal and report `(cost, run_id)` back through the host.
pub struct OptimizationManager<H: HostEnvironment> {
    host: H,
    role: Role,
    name: String,
    report_dir: Option<PathBuf>,
    session_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    slots: SlotRegistry,
    parameters: Vec<ParameterDescriptor>,
    targets: Vec<EvaluationTarget>,
    drivers: Vec<DriverTrajectory>,
    target_rows: usize,
    driver_rows: usize,
    cost_function: Box<dyn CostFunction>,
    factory: OptimizerFactory,
    initialized: bool,
    next_run: RunId,
    evaluation: Option<Evaluation>,
}

impl<H: HostEnvironment> OptimizationManager<H> {
    pub fn new(host: H) -> Self {
        let role = host.role();
        let session_id = Uuid::new_v4();
        info!("Optimization manager {} started as {}", session_id, role);
        Self {
            host,
            role,
            name: "calibration".to_string(),
            report_dir: None,
            session_id,
            started_at: None,
            slots: SlotRegistry::new(),
            parameters: Vec::new(),
            targets: Vec::new(),
            drivers: Vec::new(),
            target_rows: 0,
            driver_rows: 0,
            cost_function: Box::new(WeightedSquaredError),
            factory: OptimizerFactory::new(),
            initialized: false,
            next_run: RunId::FIRST,
            evaluation: None,
        }
    }

    /// Apply a run configuration. The optimizer choice only matters to the
    /// proposer and is ignored by evaluators.
    pub fn with_config(mut self, config: &CalibrationConfig) -> SfResult<Self> {
        self.name = config.name.clone();
        self.report_dir = config.report_dir.clone();
        if self.role.is_proposer() {
            self.set_optimizer(config.optimizer.clone())?;
        }
        Ok(self)
    }

    pub fn with_cost_function(mut self, cost_function: impl CostFunction + 'static) -> Self {
        self.cost_function = Box::new(cost_function);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn slots(&self) -> &SlotRegistry {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut SlotRegistry {
        &mut self.slots
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn targets(&self) -> &[EvaluationTarget] {
        &self.targets
    }

    pub fn optimizer(&self) -> Option<&(dyn Optimizer + 'static)> {
        self.factory.optimizer()
    }

    fn require_proposer(&self, operation: &str) -> SfResult<()> {
        if self.role.is_proposer() {
            Ok(())
        } else {
            Err(sf_types::role_error!("{} is proposer-only, called as {}", operation, self.role))
        }
    }

    fn require_evaluator(&self, operation: &str) -> SfResult<()> {
        if self.role.is_proposer() {
            Err(sf_types::role_error!("{} is evaluator-only, called as {}", operation, self.role))
        } else {
            Ok(())
        }
    }

    fn require_slot(&self, binding: SlotHandle) -> SfResult<()> {
        if self.slots.contains(binding) {
            Ok(())
        } else {
            Err(ConfigError::UnknownSlot {
                slot: binding.index(),
            }
            .into())
        }
    }

    // Registration (both roles)

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        binding: SlotHandle,
        minimum: f64,
        maximum: f64,
        constraints: Vec<Constraint>,
    ) -> SfResult<ParameterId> {
        self.require_slot(binding)?;
        let mut descriptor = ParameterDescriptor::new(name, binding, minimum, maximum);
        descriptor.constraints = constraints;

        let index = self.parameters.len();
        descriptor.validate(index)?;
        debug!(
            "Parameter {} '{}' bound to {} in [{}, {}]",
            index, descriptor.name, binding, minimum, maximum
        );
        self.parameters.push(descriptor);
        Ok(ParameterId(index))
    }

    /// Register an output to fit. Without a scalar target the output takes
    /// one column of every target trajectory row.
    pub fn add_target(
        &mut self,
        name: impl Into<String>,
        binding: SlotHandle,
        scalar_target: Option<f64>,
        weight: f64,
    ) -> SfResult<()> {
        self.require_slot(binding)?;
        let target = EvaluationTarget::new(name, binding, scalar_target, weight);
        if !(weight > 0.0) {
            return Err(ConfigError::NonPositive {
                field: format!("cost_weight of target {}", target.name),
                value: weight,
            }
            .into());
        }
        debug!("Target '{}' bound to {} ({:?})", target.name, binding, scalar_target);
        self.targets.push(target);
        Ok(())
    }

    pub fn add_target_trajectory_row(&mut self, line: &str) -> SfResult<()> {
        let columns = self.targets.iter().filter(|t| t.accepts_trajectory()).count();
        if columns == 0 {
            return Err(sf_types::config_error!(
                "target trajectory row given but no trajectory targets are registered"
            ));
        }
        let values = parse_trajectory_row(line, self.target_rows, columns)?;
        let trajectory_targets = self.targets.iter_mut().filter(|t| t.accepts_trajectory());
        for (target, value) in trajectory_targets.zip(values) {
            target.trajectory_target.push(value);
        }
        self.target_rows += 1;
        Ok(())
    }

    pub fn add_driver(&mut self, binding: SlotHandle) -> SfResult<()> {
        self.require_slot(binding)?;
        self.drivers.push(DriverTrajectory::new(binding));
        Ok(())
    }

    pub fn add_driver_trajectory_row(&mut self, line: &str) -> SfResult<()> {
        if self.drivers.is_empty() {
            return Err(sf_types::config_error!(
                "driver trajectory row given but no drivers are registered"
            ));
        }
        let values = parse_trajectory_row(line, self.driver_rows, self.drivers.len())?;
        for (driver, value) in self.drivers.iter_mut().zip(values) {
            driver.trajectory.push(value);
        }
        self.driver_rows += 1;
        Ok(())
    }

    /// Current values of the parameter slots, in registration order.
    pub fn parameter_values(&self) -> SfResult<Vec<f64>> {
        self.parameters
            .iter()
            .map(|p| self.slots.get(self.binding_of(p)?))
            .collect()
    }

    /// Constrain `values` and copy them into the parameter slots.
    pub fn load_parameters(&mut self, values: &[f64]) -> SfResult<()> {
        if values.len() != self.parameters.len() {
            return Err(sf_types::config_error!(
                "{} parameter values given for {} parameters",
                values.len(),
                self.parameters.len()
            ));
        }
        let mut state = values.to_vec();
        apply_constraints(&self.parameters, &mut state);
        for (parameter, value) in self.parameters.iter().zip(state) {
            let binding = self.binding_of(parameter)?;
            self.slots.set(binding, value)?;
        }
        Ok(())
    }

    fn binding_of(&self, parameter: &ParameterDescriptor) -> SfResult<SlotHandle> {
        parameter.binding.ok_or_else(|| {
            ConfigError::MissingBinding {
                name: parameter.name.clone(),
            }
            .into()
        })
    }

    // Proposer role

    pub fn set_optimizer(&mut self, kind: OptimizerKind) -> SfResult<()> {
        self.require_proposer("set_optimizer")?;
        self.factory.create(kind)?;
        self.initialized = false;
        Ok(())
    }

    /// Replace the configuration of the optimizer already selected.
    pub fn set_optimizer_config(&mut self, kind: OptimizerKind) -> SfResult<()> {
        self.require_proposer("set_optimizer_config")?;
        self.factory.set_config(kind)?;
        self.initialized = false;
        Ok(())
    }

    pub fn initialize(&mut self) -> SfResult<()> {
        self.require_proposer("initialize")?;
        let optimizer = self
            .factory
            .optimizer_mut()
            .ok_or_else(|| ConfigError::Missing("no optimizer selected".to_string()))?;
        optimizer.initialize(&self.parameters)?;
        info!(
            "Calibration '{}' ready: {} parameters, {} runs with {}",
            self.name,
            self.parameters.len(),
            optimizer.num_runs_needed(),
            optimizer.name()
        );

        self.next_run = RunId::FIRST;
        self.started_at = Some(self.host.now());
        self.initialized = true;
        Ok(())
    }

    fn active_optimizer(&mut self) -> SfResult<&mut (dyn Optimizer + 'static)> {
        if !self.initialized {
            return Err(sf_types::config_error!("optimizer used before initialize"));
        }
        self.factory
            .optimizer_mut()
            .ok_or_else(|| ConfigError::Missing("no optimizer selected".to_string()).into())
    }

    fn initialized_optimizer(&self) -> SfResult<&(dyn Optimizer + 'static)> {
        if !self.initialized {
            return Err(sf_types::config_error!("run counts requested before initialize"));
        }
        self.factory
            .optimizer()
            .ok_or_else(|| ConfigError::Missing("no optimizer selected".to_string()).into())
    }

    pub fn num_runs_needed(&self) -> SfResult<u32> {
        Ok(self.initialized_optimizer()?.num_runs_needed())
    }

    pub fn runs_per_epoch(&self) -> SfResult<u32> {
        Ok(self.initialized_optimizer()?.runs_per_epoch())
    }

    /// Issue the next proposal: advance the optimizer under a fresh run id
    /// and write its (constrained) state into the parameter slots.
    pub fn propose(&mut self) -> SfResult<RunId> {
        self.require_proposer("propose")?;
        let run_id = self.next_run;
        let optimizer = self.active_optimizer()?;
        optimizer.update(run_id)?;
        let state = optimizer.state().to_vec();

        self.load_parameters(&state)?;
        self.next_run = run_id.next();
        debug!("Proposed run {}: {:?}", run_id, state);
        Ok(run_id)
    }

    /// Read one `(cost, run_id)` report from the host and hand it to the
    /// optimizer.
    pub fn ingest_result(&mut self) -> SfResult<(RunId, f64)> {
        self.require_proposer("ingest_result")?;
        let cost = self.host.read()?;
        let run_id = RunId::from_wire(self.host.read()?)?;
        self.active_optimizer()?.assign_cost(cost, run_id)?;
        debug!("Ingested run {} cost {:.6e}", run_id, cost);
        Ok((run_id, cost))
    }

    /// Sequential loop over every run the optimizer needs. `dispatch` must
    /// make the result of the given run readable from the host before it
    /// returns.
    pub fn run<F>(&mut self, mut dispatch: F) -> SfResult<()>
    where
        F: FnMut(RunId, &SlotRegistry) -> SfResult<()>,
    {
        let total = self.num_runs_needed()?;
        for _ in 0..total {
            let run_id = self.propose()?;
            dispatch(run_id, &self.slots)?;
            self.ingest_result()?;
        }
        Ok(())
    }

    /// Shut the optimizer down, load the best state into the parameter
    /// slots and produce the run report.
    pub fn finish(&mut self) -> SfResult<RunReport> {
        self.require_proposer("finish")?;
        let summary = self.active_optimizer()?.shutdown()?;
        self.initialized = false;

        let mut best_parameters = BTreeMap::new();
        if let Some(best) = &summary.best {
            self.load_parameters(&best.position)?;
            for parameter in &self.parameters {
                let value = self.slots.get(self.binding_of(parameter)?)?;
                best_parameters.insert(parameter.name.clone(), value);
            }
        }

        let finished_at = self.host.now();
        let report = RunReport {
            session_id: self.session_id,
            name: self.name.clone(),
            strategy: summary.strategy,
            started_at: self.started_at.unwrap_or(finished_at),
            finished_at,
            epochs_completed: summary.epochs_completed,
            runs_completed: summary.runs_completed,
            best_cost: summary.best.as_ref().map(|best| best.cost),
            best_run_id: summary.best.as_ref().and_then(|best| best.run_id).map(|id| id.value()),
            best_parameters,
        };

        if let Some(dir) = &self.report_dir {
            let path = report.write_json(dir)?;
            info!("Run report written to {}", path.display());
        }
        match report.best_cost {
            Some(cost) => info!(
                "Calibration '{}' finished: best cost {:.6e} with {:?}",
                self.name, cost, report.best_parameters
            ),
            None => warn!("Calibration '{}' finished without a result", self.name),
        }
        Ok(report)
    }

    // Evaluator role

    /// Start accumulating cost for `run_id`. Any evaluation in progress is
    /// discarded.
    pub fn begin_evaluation(&mut self, run_id: RunId) -> SfResult<()> {
        self.require_evaluator("begin_evaluation")?;
        for target in &self.targets {
            target.validate()?;
        }
        if let Some(previous) = &self.evaluation {
            warn!("Run {} abandoned before finish_evaluation", previous.run_id);
        }
        self.evaluation = Some(Evaluation {
            run_id,
            step: 0,
            cost: 0.0,
            exhausted_warned: false,
        });
        debug!("{} evaluating run {}", self.role, run_id);
        Ok(())
    }

    fn evaluation_mut(&mut self) -> SfResult<&mut Evaluation> {
        self.evaluation
            .as_mut()
            .ok_or_else(|| sf_types::role_error!("no evaluation in progress"))
    }

    /// Write each driver's sample for the current step into its slot.
    pub fn apply_drivers(&mut self) -> SfResult<()> {
        self.require_evaluator("apply_drivers")?;
        let step = self.evaluation_mut()?.step;
        for driver in &self.drivers {
            if let Some(value) = driver.sample(step) {
                self.slots.set(driver.binding, value)?;
            }
        }
        Ok(())
    }

    /// Add the trajectory cost of the step just simulated.
    pub fn accumulate_step(&mut self) -> SfResult<()> {
        self.require_evaluator("accumulate_step")?;
        let Some(evaluation) = self.evaluation.as_mut() else {
            return Err(sf_types::role_error!("no evaluation in progress"));
        };
        let step = evaluation.step;

        for target in self.targets.iter().filter(|t| !t.is_scalar()) {
            match target.trajectory_target.get(step) {
                Some(&wanted) => {
                    let value = self.slots.get(target.binding)?;
                    evaluation.cost += self.cost_function.cost(value, wanted, target.cost_weight);
                }
                None if !evaluation.exhausted_warned => {
                    warn!(
                        "Run {}: step {} is past the end of target trajectory '{}'",
                        evaluation.run_id, step, target.name
                    );
                    evaluation.exhausted_warned = true;
                }
                None => {}
            }
        }
        evaluation.step += 1;
        Ok(())
    }

    /// Add the scalar target costs and report `(cost, run_id)` to the host.
    pub fn finish_evaluation(&mut self) -> SfResult<f64> {
        self.require_evaluator("finish_evaluation")?;
        let evaluation = self
            .evaluation
            .take()
            .ok_or_else(|| sf_types::role_error!("no evaluation in progress"))?;

        let mut cost = evaluation.cost;
        for target in self.targets.iter().filter(|t| t.is_scalar()) {
            if let Some(wanted) = target.scalar_target {
                let value = self.slots.get(target.binding)?;
                cost += self.cost_function.cost(value, wanted, target.cost_weight);
            }
        }

        self.host.write(cost)?;
        self.host.write(evaluation.run_id.to_wire())?;
        debug!(
            "{} finished run {} after {} steps: cost {:.6e}",
            self.role, evaluation.run_id, evaluation.step, cost
        );
        Ok(cost)
    }
}
