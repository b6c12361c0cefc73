//! Data structures for building an optimisation problem and solving it with HiGHS.
//!
//! Technologies and the POI describe their part of a window's problem in terms of [`Variable`]s,
//! [`LinearExpr`]s and [`Constraint`]s. Nothing is handed to the solver until [`solve`] is called,
//! at which point the variables become columns and the constraints become rows of a HiGHS problem.
use crate::error::ModelError;
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::{debug, log_enabled};

/// How far a constraint row with no variables may be violated before the problem is rejected
const CONSTANT_ROW_TOLERANCE: f64 = 1e-9;

pub mod expression;
pub use expression::{ExprSeries, LinearExpr};

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    /// Create a reference to the variable at position `index` in a [`VariablePool`]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The position of this variable in its [`VariablePool`]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The definition of a variable to be optimised
#[derive(Debug, Clone, PartialEq)]
struct VariableDefinition {
    name: String,
    lower: f64,
    upper: f64,
    integer: bool,
}

/// All the decision variables for one optimisation window
#[derive(Debug, Default)]
pub struct VariablePool(Vec<VariableDefinition>);

impl VariablePool {
    fn push(&mut self, name: String, lower: f64, upper: f64, integer: bool) -> Variable {
        assert!(lower <= upper, "Bad bounds for variable {name}");
        self.0.push(VariableDefinition {
            name,
            lower,
            upper,
            integer,
        });
        Variable(self.0.len() - 1)
    }

    /// Add a continuous variable with the given bounds (which may be infinite)
    pub fn add(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> Variable {
        self.push(name.into(), lower, upper, false)
    }

    /// Add one variable per time step
    pub fn add_series(&mut self, name: &str, size: usize, lower: f64, upper: f64) -> Vec<Variable> {
        (0..size)
            .map(|t| self.push(format!("{name}[{t}]"), lower, upper, false))
            .collect()
    }

    /// Add one nonnegative variable per time step
    pub fn add_nonneg_series(&mut self, name: &str, size: usize) -> Vec<Variable> {
        self.add_series(name, size, 0.0, f64::INFINITY)
    }

    /// Add one binary (0/1 integer) variable per time step
    pub fn add_binary_series(&mut self, name: &str, size: usize) -> Vec<Variable> {
        (0..size)
            .map(|t| self.push(format!("{name}[{t}]"), 0.0, 1.0, true))
            .collect()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The name given to `var` when it was created
    pub fn name(&self, var: Variable) -> &str {
        &self.0[var.0].name
    }

    /// Whether any of the variables are restricted to integer values
    pub fn has_integers(&self) -> bool {
        self.0.iter().any(|def| def.integer)
    }
}

/// The sense of a [`Constraint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Every row must be `<= 0`
    NonPositive,
    /// Every row must be `== 0`
    Zero,
}

/// A named, possibly vector-valued, constraint on the decision variables
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    label: String,
    kind: ConstraintKind,
    rows: Vec<LinearExpr>,
}

impl Constraint {
    /// Constrain every row of `expr` to be `<= 0`
    pub fn non_positive(label: impl Into<String>, expr: impl Into<ExprSeries>) -> Self {
        let series: ExprSeries = expr.into();
        Self {
            label: label.into(),
            kind: ConstraintKind::NonPositive,
            rows: series.into_iter().collect(),
        }
    }

    /// Constrain every row of `expr` to be `== 0`
    pub fn zero(label: impl Into<String>, expr: impl Into<ExprSeries>) -> Self {
        let series: ExprSeries = expr.into();
        Self {
            label: label.into(),
            kind: ConstraintKind::Zero,
            rows: series.into_iter().collect(),
        }
    }

    /// A description of what is being constrained
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The sense of the constraint
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// The expression for each row
    pub fn rows(&self) -> &[LinearExpr] {
        &self.rows
    }

    /// Check whether `values` satisfy every row to within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        self.rows
            .iter()
            .all(|row| self.is_satisfied_by(row.evaluate(values), tolerance))
    }

    /// Whether a row which evaluates to `value` is satisfied to within `tolerance`
    fn is_satisfied_by(&self, value: f64, tolerance: f64) -> bool {
        match self.kind {
            ConstraintKind::NonPositive => value <= tolerance,
            ConstraintKind::Zero => value.abs() <= tolerance,
        }
    }

    /// The bounds for the variable part of a row, after moving the constant to the right-hand side
    fn row_bounds(&self, row: &LinearExpr) -> (f64, f64) {
        let rhs = -row.constant_value();
        match self.kind {
            ConstraintKind::NonPositive => (f64::NEG_INFINITY, rhs),
            ConstraintKind::Zero => (rhs, rhs),
        }
    }
}

/// The parts of the objective function, labelled by what each cost represents
pub type ObjectiveTerms = IndexMap<String, LinearExpr>;

/// Combine two sets of objective terms, summing any terms which share a label
pub fn merge_objective_terms(mut lhs: ObjectiveTerms, rhs: ObjectiveTerms) -> ObjectiveTerms {
    for (label, expr) in rhs {
        *lhs.entry(label).or_default() += expr;
    }
    lhs
}

/// The solution to an optimisation problem
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    objective_value: f64,
}

impl Solution {
    /// The optimal value of `var`
    pub fn value(&self, var: Variable) -> f64 {
        self.values[var.0]
    }

    /// The optimal values of several variables
    pub fn values(&self, vars: &[Variable]) -> Vec<f64> {
        vars.iter().map(|var| self.value(*var)).collect()
    }

    /// The value of every variable in the problem, indexed by [`Variable::index`]
    pub fn all_values(&self) -> &[f64] {
        &self.values
    }

    /// Evaluate an expression at the solution
    pub fn evaluate(&self, expr: &LinearExpr) -> f64 {
        expr.evaluate(&self.values)
    }

    /// Evaluate a series of expressions at the solution
    pub fn evaluate_series(&self, series: &ExprSeries) -> Vec<f64> {
        series.evaluate(&self.values)
    }

    /// The value of the objective function, including constant terms
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }
}

/// Minimise the sum of `objective` subject to `constraints`.
///
/// Rows which contain no variables are checked rather than passed to the solver; if one of them
/// cannot be satisfied the problem is reported as infeasible.
pub fn solve(
    variables: &VariablePool,
    objective: &ObjectiveTerms,
    constraints: &[Constraint],
) -> Result<Solution, ModelError> {
    // Combine the objective terms into one coefficient per column
    let mut coefficients = vec![0.0; variables.len()];
    let mut offset = 0.0;
    for expr in objective.values() {
        for (var, coeff) in expr.terms() {
            coefficients[var.0] += coeff;
        }
        offset += expr.constant_value();
    }

    let mut problem = Problem::default();
    let columns: Vec<_> = variables
        .0
        .iter()
        .zip(&coefficients)
        .map(|(def, coeff)| {
            if def.integer {
                problem.add_integer_column(*coeff, def.lower..=def.upper)
            } else {
                problem.add_column(*coeff, def.lower..=def.upper)
            }
        })
        .collect();

    let mut terms = Vec::new();
    for constraint in constraints {
        for row in constraint.rows() {
            if !row.has_variables() {
                if !constraint.is_satisfied_by(row.constant_value(), CONSTANT_ROW_TOLERANCE) {
                    return Err(ModelError::Solver {
                        status: format!("Infeasible constant constraint '{}'", constraint.label),
                    });
                }
                continue;
            }

            terms.extend(row.terms().map(|(var, coeff)| (columns[var.0], coeff)));
            let (lower, upper) = constraint.row_bounds(row);
            problem.add_row(lower..=upper, terms.drain(..));
        }
    }

    debug!(
        "Solving problem with {} variables and {} constraints",
        variables.len(),
        constraints.len()
    );
    let mut model = problem.optimise(Sense::Minimise);
    enable_highs_logging(&mut model);

    let solved = model.try_solve().map_err(|status| ModelError::Solver {
        status: format!("{status:?}"),
    })?;
    match solved.status() {
        HighsModelStatus::Optimal => {
            let values = solved.get_solution().columns().to_vec();
            let objective_value = values
                .iter()
                .zip(&coefficients)
                .map(|(value, coeff)| value * coeff)
                .sum::<f64>()
                + offset;
            Ok(Solution {
                values,
                objective_value,
            })
        }
        status => Err(ModelError::Solver {
            status: format!("{status:?}"),
        }),
    }
}

#[cfg(test)]
impl Solution {
    /// A solution with the given variable values
    pub(crate) fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            objective_value: 0.0,
        }
    }
}

/// Enable console output for the HiGHS solver, but only when tracing
fn enable_highs_logging(model: &mut highs::Model) {
    let verbose = log_enabled!(log::Level::Trace);
    model.set_option("output_flag", verbose);
    model.set_option("log_to_console", verbose);
}
