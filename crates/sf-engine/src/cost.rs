// Cost contributions of model outputs against their targets.

/// Weighted squared error: `(weight * (value - target))^2`.
pub fn compute_cost(value: f64, target: f64, weight: f64) -> f64 {
    let residual = weight * (value - target);
    residual * residual
}

/// Per-sample cost of an output against its target.
pub trait CostFunction: Send + Sync {
    fn cost(&self, value: f64, target: f64, weight: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSquaredError;

impl CostFunction for WeightedSquaredError {
    fn cost(&self, value: f64, target: f64, weight: f64) -> f64 {
        compute_cost(value, target, weight)
    }
}

/// `weight * |value - target|`, less sensitive to outlying samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAbsoluteError;

impl CostFunction for WeightedAbsoluteError {
    fn cost(&self, value: f64, target: f64, weight: f64) -> f64 {
        weight * (value - target).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_error_examples() {
        assert_eq!(compute_cost(4.0, 3.0, 1.0), 1.0);
        assert_eq!(compute_cost(11.0, 12.0, 0.5), 0.25);
        assert_eq!(compute_cost(2.0, 2.0, 3.0), 0.0);
        assert_eq!(WeightedSquaredError.cost(4.0, 3.0, 2.0), 4.0);
    }

    #[test]
    fn absolute_error() {
        assert_eq!(WeightedAbsoluteError.cost(1.0, 4.0, 0.5), 1.5);
    }
}
