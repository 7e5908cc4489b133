//! Candidate states: a point in parameter space plus its evaluation status.

use serde::{Deserialize, Serialize};

use crate::errors::CorrelationError;
use crate::run::RunId;

/// Cost of a candidate that has not been evaluated yet.
pub const UNEVALUATED_COST: f64 = f64::INFINITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateState {
    pub position: Vec<f64>,
    pub cost: f64,
    pub run_id: Option<RunId>,
    /// True while `run_id` has been dispatched but no cost has come back.
    pub pending: bool,
}

impl CandidateState {
    pub fn new(position: Vec<f64>) -> Self {
        Self {
            position,
            cost: UNEVALUATED_COST,
            run_id: None,
            pending: false,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.position.len()
    }

    pub fn is_evaluated(&self) -> bool {
        !self.pending && self.cost != UNEVALUATED_COST
    }

    /// Tag this candidate with a freshly dispatched run id.
    pub fn dispatch(&mut self, run_id: RunId) {
        self.run_id = Some(run_id);
        self.cost = UNEVALUATED_COST;
        self.pending = true;
    }

    pub fn matches(&self, run_id: RunId) -> bool {
        self.run_id == Some(run_id)
    }

    /// Record the cost for `run_id`. The caller has already matched the id.
    pub fn acknowledge(&mut self, run_id: RunId, cost: f64) -> Result<(), CorrelationError> {
        if !self.pending {
            return Err(CorrelationError::AlreadyAssigned {
                run_id: run_id.value(),
            });
        }
        self.cost = cost;
        self.pending = false;
        Ok(())
    }

    /// Forget the last evaluation so the candidate can be dispatched again.
    pub fn reset_cost(&mut self) {
        self.cost = UNEVALUATED_COST;
        self.pending = false;
    }

    /// Replace this best-so-far record with `other` when `other` is strictly
    /// cheaper. Returns whether the record changed.
    pub fn offer_best(&mut self, other: &CandidateState) -> bool {
        if other.cost < self.cost {
            self.position.clone_from(&other.position);
            self.cost = other.cost;
            self.run_id = other.run_id;
            self.pending = false;
            true
        } else {
            false
        }
    }
}
