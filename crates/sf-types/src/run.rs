//! Run identifiers: the correlation key between a dispatched proposal and
//! the cost that eventually comes back for it.

use serde::{Deserialize, Serialize};

use crate::errors::CorrelationError;

/// Largest integer an `f64` carries exactly.
const MAX_EXACT_F64_INTEGER: u64 = 1 << 53;

/// Identifier assigned by the proposer at dispatch time.
///
/// The host channel only moves `f64` words, so ids travel as floats. Every
/// id below 2^53 survives that trip bit-exactly; [`RunId::from_wire`]
/// rejects anything that is not an exact whole number in that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    pub const FIRST: RunId = RunId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> RunId {
        RunId(self.0 + 1)
    }

    pub fn to_wire(&self) -> f64 {
        self.0 as f64
    }

    /// Exact conversion back from the wire. No tolerance is applied.
    pub fn from_wire(value: f64) -> Result<Self, CorrelationError> {
        let exact = value.is_finite()
            && value >= 0.0
            && value.fract() == 0.0
            && value < MAX_EXACT_F64_INTEGER as f64;
        if !exact {
            return Err(CorrelationError::NotIntegral { value });
        }
        Ok(RunId(value as u64))
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_is_exact() {
        for raw in [0_u64, 1, 17, 4_096, (1 << 53) - 1] {
            let id = RunId::new(raw);
            assert_eq!(RunId::from_wire(id.to_wire()).unwrap(), id);
        }
    }

    #[test]
    fn fractional_and_negative_values_are_rejected() {
        assert!(matches!(
            RunId::from_wire(3.5),
            Err(CorrelationError::NotIntegral { .. })
        ));
        assert!(RunId::from_wire(-1.0).is_err());
        assert!(RunId::from_wire(f64::NAN).is_err());
        assert!(RunId::from_wire(f64::INFINITY).is_err());
        assert!(RunId::from_wire(9.007_199_254_740_992e15).is_err());
    }

    #[test]
    fn ids_are_monotonic() {
        let first = RunId::FIRST;
        assert!(first.next() > first);
        assert_eq!(first.next().value(), 1);
    }
}
