//! Parameter descriptors: the search space of a calibration run.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, SfResult};
use crate::slots::SlotHandle;

/// Position of a parameter in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterId(pub usize);

/// Fitted function of other parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintForm {
    /// `slope * x[source] + intercept`
    Linear {
        source: ParameterId,
        slope: f64,
        intercept: f64,
    },
    /// `coefficient * x[first] * x[second] + offset`
    Product {
        first: ParameterId,
        second: ParameterId,
        coefficient: f64,
        offset: f64,
    },
}

impl ConstraintForm {
    pub fn sources(&self) -> Vec<ParameterId> {
        match self {
            Self::Linear { source, .. } => vec![*source],
            Self::Product { first, second, .. } => vec![*first, *second],
        }
    }

    pub fn evaluate(&self, state: &[f64]) -> f64 {
        match self {
            Self::Linear {
                source,
                slope,
                intercept,
            } => slope * state[source.0] + intercept,
            Self::Product {
                first,
                second,
                coefficient,
                offset,
            } => coefficient * state[first.0] * state[second.0] + offset,
        }
    }
}

/// How the derived value adjusts the constrained parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintAction {
    Override,
    AtLeast,
    AtMost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub form: ConstraintForm,
    pub action: ConstraintAction,
}

impl Constraint {
    pub fn linear(source: ParameterId, slope: f64, intercept: f64) -> Self {
        Self {
            form: ConstraintForm::Linear {
                source,
                slope,
                intercept,
            },
            action: ConstraintAction::Override,
        }
    }

    pub fn product(first: ParameterId, second: ParameterId, coefficient: f64, offset: f64) -> Self {
        Self {
            form: ConstraintForm::Product {
                first,
                second,
                coefficient,
                offset,
            },
            action: ConstraintAction::Override,
        }
    }

    pub fn with_action(mut self, action: ConstraintAction) -> Self {
        self.action = action;
        self
    }

    pub fn apply(&self, current: f64, state: &[f64]) -> f64 {
        let derived = self.form.evaluate(state);
        match self.action {
            ConstraintAction::Override => derived,
            ConstraintAction::AtLeast => current.max(derived),
            ConstraintAction::AtMost => current.min(derived),
        }
    }
}

/// One optimized dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub binding: Option<SlotHandle>,
    pub minimum: f64,
    pub maximum: f64,
    pub constraints: Vec<Constraint>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, binding: SlotHandle, minimum: f64, maximum: f64) -> Self {
        Self {
            name: name.into(),
            binding: Some(binding),
            minimum,
            maximum,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn range(&self) -> f64 {
        self.maximum - self.minimum
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.minimum, self.maximum)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.minimum && value <= self.maximum
    }

    /// Check the descriptor at position `index` of its parameter list.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { index });
        }
        if self.binding.is_none() {
            return Err(ConfigError::MissingBinding {
                name: self.name.clone(),
            });
        }
        if !self.minimum.is_finite() || !self.maximum.is_finite() {
            return Err(ConfigError::NonFiniteBounds {
                name: self.name.clone(),
            });
        }
        if self.maximum < self.minimum {
            return Err(ConfigError::InvertedBounds {
                name: self.name.clone(),
                minimum: self.minimum,
                maximum: self.maximum,
            });
        }
        for constraint in &self.constraints {
            for source in constraint.form.sources() {
                if source.0 >= index {
                    return Err(ConfigError::InvalidConstraint {
                        parameter: self.name.clone(),
                        message: format!(
                            "source parameter {} must be registered before index {}",
                            source.0, index
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Validate a whole parameter space.
pub fn validate_parameter_space(parameters: &[ParameterDescriptor]) -> SfResult<()> {
    if parameters.is_empty() {
        return Err(ConfigError::EmptyParameterSpace.into());
    }
    for (index, parameter) in parameters.iter().enumerate() {
        parameter.validate(index)?;
    }
    Ok(())
}

pub fn clamp_to_bounds(parameters: &[ParameterDescriptor], state: &mut [f64]) {
    for (value, parameter) in state.iter_mut().zip(parameters) {
        *value = parameter.clamp(*value);
    }
}

/// Apply every parameter's constraints in registration order, then clamp
/// the whole state back into bounds.
pub fn apply_constraints(parameters: &[ParameterDescriptor], state: &mut [f64]) {
    for (index, parameter) in parameters.iter().enumerate() {
        for constraint in &parameter.constraints {
            let adjusted = constraint.apply(state[index], state);
            state[index] = adjusted;
        }
    }
    clamp_to_bounds(parameters, state);
}
