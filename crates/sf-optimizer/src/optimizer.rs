//! The strategy contract every search strategy implements.

use serde::{Deserialize, Serialize};

use sf_types::{CandidateState, CorrelationError, ParameterDescriptor, RunId, SfResult};

/// Outcome reported by [`Optimizer::shutdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub strategy: String,
    pub epochs_completed: u32,
    pub runs_completed: u64,
    pub best: Option<CandidateState>,
}

/// Common trait for all search strategies.
///
/// The manager drives an optimizer with the loop
/// `update -> state -> (external evaluation) -> assign_cost`, finishing
/// with `shutdown`. Costs may arrive in any order; they are matched to
/// candidates solely by run id.
pub trait Optimizer: Send {
    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Configuration key of the strategy, as used by `OptimizerKind`.
    fn kind_name(&self) -> &'static str;

    /// Validate the parameter space and strategy configuration, seed the
    /// candidates and reset all counters.
    fn initialize(&mut self, parameters: &[ParameterDescriptor]) -> SfResult<()>;

    /// Advance the scheduler by one run and tag the newly active candidate
    /// with `run_id`. Propagates the search at epoch boundaries.
    fn update(&mut self, run_id: RunId) -> SfResult<()>;

    /// Position of the active candidate.
    fn state(&self) -> &[f64];

    /// Record the cost returned for `run_id`.
    fn assign_cost(&mut self, cost: f64, run_id: RunId) -> SfResult<()>;

    /// Close the final epoch, persist the final state and report the best
    /// result found.
    fn shutdown(&mut self) -> SfResult<OptimizationSummary>;

    /// Total runs the configured search needs. Meaningful once
    /// `initialize` has fixed the dimensionality.
    fn num_runs_needed(&self) -> u32;

    /// Runs in one epoch; every candidate is evaluated once per epoch.
    fn runs_per_epoch(&self) -> u32;

    /// Current epoch, starting at 1.
    fn epoch(&self) -> u32;

    /// Best candidate found so far, if any cost has been recorded.
    fn best(&self) -> Option<&CandidateState>;
}

/// Scheduler counters shared by both strategies. Both run counters start
/// at -1 so the first `advance` lands on run 0 of epoch 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunCounters {
    pub global_run: i64,
    pub epoch_run: i64,
    pub epoch: u32,
    pub epochs_closed: u32,
}

impl Default for RunCounters {
    fn default() -> Self {
        Self {
            global_run: -1,
            epoch_run: -1,
            epoch: 1,
            epochs_closed: 0,
        }
    }
}

impl RunCounters {
    /// Step to the next run. Returns true when the step crossed an epoch
    /// boundary; the caller closes and propagates the finished epoch before
    /// calling [`RunCounters::start_next_epoch`].
    pub fn advance(&mut self, runs_per_epoch: u32) -> bool {
        self.global_run += 1;
        self.epoch_run += 1;
        self.epoch_run >= runs_per_epoch as i64
    }

    pub fn start_next_epoch(&mut self) {
        self.epoch += 1;
        self.epoch_run = 0;
    }

    pub fn active_index(&self) -> usize {
        self.epoch_run.max(0) as usize
    }

    pub fn runs_dispatched(&self) -> u64 {
        (self.global_run + 1) as u64
    }

    /// True when the last run of the current epoch has been dispatched.
    pub fn epoch_fully_dispatched(&self, runs_per_epoch: u32) -> bool {
        self.epoch_run + 1 >= runs_per_epoch as i64
    }
}

/// Error for a returned id that matches no candidate. Always logged.
pub(crate) fn unknown_run(strategy: &str, run_id: RunId) -> CorrelationError {
    tracing::error!("{}: returned run id {} matches no candidate", strategy, run_id);
    CorrelationError::UnknownRunId {
        run_id: run_id.value(),
    }
}

/// First run id still pending among `candidates`, if any.
pub(crate) fn first_outstanding<'a>(
    candidates: impl IntoIterator<Item = &'a CandidateState>,
) -> Option<RunId> {
    candidates
        .into_iter()
        .find(|candidate| candidate.pending)
        .and_then(|candidate| candidate.run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_cross_epoch_boundaries() {
        let mut counters = RunCounters::default();
        assert!(!counters.advance(3));
        assert_eq!(counters.active_index(), 0);
        assert!(!counters.advance(3));
        assert!(!counters.advance(3));
        assert!(counters.epoch_fully_dispatched(3));
        assert!(counters.advance(3));
        counters.start_next_epoch();
        assert_eq!(counters.epoch, 2);
        assert_eq!(counters.active_index(), 0);
        assert_eq!(counters.runs_dispatched(), 4);
    }

    #[test]
    fn outstanding_detection() {
        let mut a = CandidateState::new(vec![0.0]);
        let mut b = CandidateState::new(vec![1.0]);
        a.dispatch(RunId::new(0));
        a.acknowledge(RunId::new(0), 1.0).unwrap();
        assert_eq!(first_outstanding([&a, &b]), None);
        b.dispatch(RunId::new(1));
        assert_eq!(first_outstanding([&a, &b]), Some(RunId::new(1)));
    }
}
