//! Rated capacities which are either fixed by the user or chosen by the optimisation.
use crate::optimisation::{LinearExpr, Solution, Variable, VariablePool};
use anyhow::{Result, ensure};

/// How a capacity is determined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rating {
    /// The capacity is a known parameter
    Fixed(f64),
    /// The capacity is a decision variable with optional bounds
    Sized {
        /// Lower bound on the capacity
        min: f64,
        /// Upper bound on the capacity, if any
        max: Option<f64>,
    },
}

impl Rating {
    /// Build a [`Rating`] from the user-supplied value and bounds.
    ///
    /// If `value` is given the capacity is fixed, otherwise it will be sized.
    pub fn from_params(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> Self {
        match value {
            Some(value) => Self::Fixed(value),
            None => Self::Sized {
                min: min.unwrap_or(0.0),
                max,
            },
        }
    }
}

/// A capacity along with the variable that represents it in the current window
#[derive(Debug, Clone, PartialEq)]
pub struct RatedCapacity {
    rating: Rating,
    variable: Option<Variable>,
    optimal: Option<f64>,
}

impl RatedCapacity {
    /// A capacity fixed at `value`
    pub fn fixed(value: f64) -> Self {
        Self::new(Rating::Fixed(value))
    }

    /// A capacity to be chosen by the optimisation
    pub fn sized(min: f64, max: Option<f64>) -> Self {
        Self::new(Rating::Sized { min, max })
    }

    /// Create a new [`RatedCapacity`]
    pub fn new(rating: Rating) -> Self {
        Self {
            rating,
            variable: None,
            optimal: None,
        }
    }

    /// How this capacity is determined
    pub fn rating(&self) -> Rating {
        self.rating
    }

    /// Whether this capacity is a decision variable
    pub fn is_sized(&self) -> bool {
        matches!(self.rating, Rating::Sized { .. })
    }

    /// Whether there is a finite upper bound on this capacity
    pub fn max_defined(&self) -> bool {
        match self.rating {
            Rating::Fixed(_) => true,
            Rating::Sized { max, .. } => max.is_some(),
        }
    }

    /// The upper bound on this capacity, if there is one
    pub fn max(&self) -> Option<f64> {
        match self.rating {
            Rating::Fixed(value) => Some(value),
            Rating::Sized { max, .. } => max,
        }
    }

    /// The lower bound on this capacity
    pub fn min(&self) -> f64 {
        match self.rating {
            Rating::Fixed(value) => value,
            Rating::Sized { min, .. } => min,
        }
    }

    /// Fix the capacity at `value`, discarding any sizing bounds
    pub fn set_fixed(&mut self, value: f64) {
        self.rating = Rating::Fixed(value);
        self.variable = None;
        self.optimal = None;
    }

    /// Create the capacity variable for a new window, if the capacity is being sized
    pub fn initialize(&mut self, pool: &mut VariablePool, name: &str) {
        self.variable = match self.rating {
            Rating::Fixed(_) => None,
            Rating::Sized { min, max } => {
                Some(pool.add(name, min, max.unwrap_or(f64::INFINITY)))
            }
        };
    }

    /// The capacity as an expression: either a constant or the capacity variable
    pub fn expr(&self) -> LinearExpr {
        match (self.rating, self.variable) {
            (Rating::Fixed(value), _) => LinearExpr::constant(value),
            (Rating::Sized { .. }, Some(var)) => LinearExpr::from(var),
            (Rating::Sized { .. }, None) => panic!("Capacity variable has not been initialised"),
        }
    }

    /// Record the value chosen by the solver
    pub fn record(&mut self, solution: &Solution) {
        if let Some(var) = self.variable {
            self.optimal = Some(solution.value(var));
        }
    }

    /// The capacity, if known: either the fixed value or the optimal size
    pub fn value(&self) -> Option<f64> {
        match self.rating {
            Rating::Fixed(value) => Some(value),
            Rating::Sized { .. } => self.optimal,
        }
    }

    /// Check the rating is internally consistent
    pub fn validate(&self, label: &str) -> Result<()> {
        match self.rating {
            Rating::Fixed(value) => {
                ensure!(
                    value.is_finite() && value >= 0.0,
                    "{label} must be a finite, non-negative number"
                );
            }
            Rating::Sized { min, max } => {
                ensure!(
                    min.is_finite() && min >= 0.0,
                    "minimum {label} must be a finite, non-negative number"
                );
                if let Some(max) = max {
                    ensure!(
                        max >= min,
                        "maximum {label} ({max}) is less than minimum {label} ({min})"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(10.0), None, None, Rating::Fixed(10.0))]
    #[case(None, None, Some(5.0), Rating::Sized { min: 0.0, max: Some(5.0) })]
    #[case(None, Some(1.0), None, Rating::Sized { min: 1.0, max: None })]
    fn test_rating_from_params(
        #[case] value: Option<f64>,
        #[case] min: Option<f64>,
        #[case] max: Option<f64>,
        #[case] expected: Rating,
    ) {
        assert_eq!(Rating::from_params(value, min, max), expected);
    }

    #[test]
    fn test_validate() {
        assert!(RatedCapacity::fixed(10.0).validate("power").is_ok());
        assert!(RatedCapacity::fixed(-1.0).validate("power").is_err());
        assert!(RatedCapacity::sized(0.0, None).validate("power").is_ok());
        assert!(RatedCapacity::sized(10.0, Some(5.0)).validate("power").is_err());
    }

    #[test]
    fn test_expr_fixed_is_constant() {
        let mut capacity = RatedCapacity::fixed(3.0);
        let mut pool = VariablePool::default();
        capacity.initialize(&mut pool, "rated");
        assert!(pool.is_empty());
        assert!(!capacity.expr().has_variables());
    }

    #[test]
    fn test_expr_sized_is_variable() {
        let mut capacity = RatedCapacity::sized(0.0, Some(100.0));
        let mut pool = VariablePool::default();
        capacity.initialize(&mut pool, "rated");
        assert_eq!(pool.len(), 1);
        assert!(capacity.expr().has_variables());
        assert_eq!(capacity.value(), None);
    }
}
