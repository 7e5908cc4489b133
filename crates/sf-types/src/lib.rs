//! # sf-types
//!
//! Core types shared by the SimFit calibration engine: the error taxonomy,
//! value slots, parameter descriptors and constraints, evaluation targets,
//! driver trajectories, run identifiers and candidate states.

pub mod candidate;
pub mod errors;
pub mod parameter;
pub mod run;
pub mod slots;
pub mod target;

pub use candidate::*;
pub use errors::*;
pub use parameter::*;
pub use run::*;
pub use slots::*;
pub use target::*;
