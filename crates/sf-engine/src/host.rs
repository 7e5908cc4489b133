//! Host integration: the narrow interface the manager needs from whatever
//! runs the model, plus two implementations.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use tracing::trace;

use sf_types::{SfError, SfResult};

/// Which half of the protocol a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the optimizer, proposes parameters and ingests costs.
    Proposer,
    /// Runs the model for one proposal and reports its cost.
    Evaluator { id: u32 },
}

impl Role {
    pub fn is_proposer(&self) -> bool {
        matches!(self, Role::Proposer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Proposer => write!(f, "proposer"),
            Role::Evaluator { id } => write!(f, "evaluator {}", id),
        }
    }
}

/// Services the host provides to an [`crate::OptimizationManager`].
///
/// Values travel as single `f64` words. An evaluator writes its total cost
/// followed by the run id; the proposer reads them back in the same order.
pub trait HostEnvironment {
    fn role(&self) -> Role;

    fn write(&mut self, value: f64) -> SfResult<()>;

    fn read(&mut self) -> SfResult<f64>;

    fn now(&self) -> DateTime<Utc>;
}

/// Test double: reads come from a queue, writes are recorded, the clock is
/// fixed.
#[derive(Debug, Clone)]
pub struct ScriptedHost {
    role: Role,
    reads: VecDeque<f64>,
    writes: Vec<f64>,
    clock: DateTime<Utc>,
}

impl ScriptedHost {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            reads: VecDeque::new(),
            writes: Vec::new(),
            clock: DateTime::<Utc>::default(),
        }
    }

    pub fn proposer() -> Self {
        Self::new(Role::Proposer)
    }

    pub fn evaluator(id: u32) -> Self {
        Self::new(Role::Evaluator { id })
    }

    pub fn with_clock(mut self, clock: DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn push_read(&mut self, value: f64) {
        self.reads.push_back(value);
    }

    pub fn writes(&self) -> &[f64] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.writes)
    }
}

impl HostEnvironment for ScriptedHost {
    fn role(&self) -> Role {
        self.role
    }

    fn write(&mut self, value: f64) -> SfResult<()> {
        self.writes.push(value);
        Ok(())
    }

    fn read(&mut self) -> SfResult<f64> {
        self.reads
            .pop_front()
            .ok_or_else(|| SfError::Channel("scripted host has no queued value".to_string()))
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock
    }
}

/// One evaluator report: `[total_cost, run_id]`.
pub type CostFrame = [f64; 2];

/// Host backed by a crossbeam channel. Evaluator writes are buffered until
/// a whole `(cost, run_id)` frame is complete and then sent as one message,
/// so concurrent evaluators never interleave words.
pub struct ChannelHost {
    role: Role,
    outgoing: Option<Sender<CostFrame>>,
    incoming: Option<Receiver<CostFrame>>,
    partial: Vec<f64>,
    inbox: VecDeque<f64>,
}

impl ChannelHost {
    /// Proposer end of a fresh channel, plus the sender evaluators clone.
    pub fn link() -> (ChannelHost, Sender<CostFrame>) {
        let (sender, receiver) = unbounded();
        (ChannelHost::proposer(receiver), sender)
    }

    pub fn proposer(incoming: Receiver<CostFrame>) -> Self {
        Self {
            role: Role::Proposer,
            outgoing: None,
            incoming: Some(incoming),
            partial: Vec::with_capacity(2),
            inbox: VecDeque::new(),
        }
    }

    pub fn evaluator(id: u32, outgoing: Sender<CostFrame>) -> Self {
        Self {
            role: Role::Evaluator { id },
            outgoing: Some(outgoing),
            incoming: None,
            partial: Vec::with_capacity(2),
            inbox: VecDeque::new(),
        }
    }
}

impl HostEnvironment for ChannelHost {
    fn role(&self) -> Role {
        self.role
    }

    fn write(&mut self, value: f64) -> SfResult<()> {
        let sender = self
            .outgoing
            .as_ref()
            .ok_or_else(|| SfError::Channel(format!("{} host cannot send", self.role)))?;
        self.partial.push(value);
        if self.partial.len() == 2 {
            let frame = [self.partial[0], self.partial[1]];
            self.partial.clear();
            sender
                .send(frame)
                .map_err(|_| SfError::Channel("proposer hung up".to_string()))?;
            trace!("{} sent frame {:?}", self.role, frame);
        }
        Ok(())
    }

    fn read(&mut self) -> SfResult<f64> {
        if let Some(value) = self.inbox.pop_front() {
            return Ok(value);
        }
        let receiver = self
            .incoming
            .as_ref()
            .ok_or_else(|| SfError::Channel(format!("{} host cannot receive", self.role)))?;
        let [cost, run_id] = receiver
            .recv()
            .map_err(|_| SfError::Channel("all evaluators hung up".to_string()))?;
        self.inbox.push_back(run_id);
        Ok(cost)
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
