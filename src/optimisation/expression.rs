//! Linear expressions over decision variables.
use super::Variable;
use indexmap::IndexMap;
use std::ops::{Add, AddAssign, Index, Mul, Neg, Sub, SubAssign};

/// An affine expression of the form `a1*x1 + a2*x2 + ... + c`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: IndexMap<Variable, f64>,
    constant: f64,
}

impl LinearExpr {
    /// An expression with no variables
    pub fn constant(value: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant: value,
        }
    }

    /// A single variable multiplied by `coeff`
    pub fn term(var: Variable, coeff: f64) -> Self {
        let mut expr = Self::default();
        expr.add_term(var, coeff);
        expr
    }

    /// Add `coeff * var` to this expression
    pub fn add_term(&mut self, var: Variable, coeff: f64) {
        *self.terms.entry(var).or_insert(0.0) += coeff;
    }

    /// Whether the expression depends on at least one decision variable
    pub fn has_variables(&self) -> bool {
        self.terms.values().any(|coeff| *coeff != 0.0)
    }

    /// Iterate over the variables and their (non-zero) coefficients
    pub fn terms(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        self.terms
            .iter()
            .filter(|(_, coeff)| **coeff != 0.0)
            .map(|(var, coeff)| (*var, *coeff))
    }

    /// The constant part of the expression
    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    /// Evaluate the expression given values for every variable in the problem
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum::<f64>()
            + self.constant
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<Variable> for LinearExpr {
    fn from(var: Variable) -> Self {
        Self::term(var, 1.0)
    }
}

impl AddAssign<&LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: &LinearExpr) {
        for (var, coeff) in &rhs.terms {
            self.add_term(*var, *coeff);
        }
        self.constant += rhs.constant;
    }
}

impl AddAssign<LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        *self += &rhs;
    }
}

impl SubAssign<&LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: &LinearExpr) {
        for (var, coeff) in &rhs.terms {
            self.add_term(*var, -*coeff);
        }
        self.constant -= rhs.constant;
    }
}

impl SubAssign<LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: LinearExpr) {
        *self -= &rhs;
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += &rhs;
        self
    }
}

impl Add<f64> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: f64) -> LinearExpr {
        self.constant += rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self -= &rhs;
        self
    }
}

impl Sub<f64> for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: f64) -> LinearExpr {
        self.constant -= rhs;
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, rhs: f64) -> LinearExpr {
        for coeff in self.terms.values_mut() {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Mul<f64> for &LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.clone() * rhs
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

impl std::iter::Sum for LinearExpr {
    fn sum<I: Iterator<Item = LinearExpr>>(iter: I) -> Self {
        iter.fold(LinearExpr::default(), |acc, expr| acc + expr)
    }
}

/// One [`LinearExpr`] per time step of an optimisation window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprSeries(Vec<LinearExpr>);

impl ExprSeries {
    /// A series of `len` zero expressions
    pub fn zeros(len: usize) -> Self {
        Self(vec![LinearExpr::default(); len])
    }

    /// A series of constants
    pub fn from_values(values: &[f64]) -> Self {
        Self(values.iter().copied().map(LinearExpr::constant).collect())
    }

    /// A series with one variable per time step
    pub fn from_variables(vars: &[Variable]) -> Self {
        Self(vars.iter().copied().map(LinearExpr::from).collect())
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the series has no time steps
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any time step depends on a decision variable
    pub fn has_variables(&self) -> bool {
        self.0.iter().any(LinearExpr::has_variables)
    }

    /// Iterate over the expression for each time step
    pub fn iter(&self) -> std::slice::Iter<'_, LinearExpr> {
        self.0.iter()
    }

    /// Sum the expressions over all time steps
    pub fn total(&self) -> LinearExpr {
        self.0.iter().cloned().sum()
    }

    /// Weighted sum over all time steps, i.e. `sum(weights[t] * self[t])`
    pub fn dot(&self, weights: &[f64]) -> LinearExpr {
        assert_eq!(weights.len(), self.len(), "Weights do not match series length");
        self.0
            .iter()
            .zip(weights)
            .map(|(expr, weight)| expr * *weight)
            .sum()
    }

    /// Evaluate every time step given values for each variable in the problem
    pub fn evaluate(&self, values: &[f64]) -> Vec<f64> {
        self.0.iter().map(|expr| expr.evaluate(values)).collect()
    }
}

impl Index<usize> for ExprSeries {
    type Output = LinearExpr;

    fn index(&self, index: usize) -> &LinearExpr {
        &self.0[index]
    }
}

impl FromIterator<LinearExpr> for ExprSeries {
    fn from_iter<I: IntoIterator<Item = LinearExpr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ExprSeries {
    type Item = LinearExpr;
    type IntoIter = std::vec::IntoIter<LinearExpr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<LinearExpr> for ExprSeries {
    fn from(expr: LinearExpr) -> Self {
        Self(vec![expr])
    }
}

impl AddAssign<&ExprSeries> for ExprSeries {
    fn add_assign(&mut self, rhs: &ExprSeries) {
        assert_eq!(self.len(), rhs.len(), "Series lengths differ");
        for (lhs, rhs) in self.0.iter_mut().zip(&rhs.0) {
            *lhs += rhs;
        }
    }
}

impl SubAssign<&ExprSeries> for ExprSeries {
    fn sub_assign(&mut self, rhs: &ExprSeries) {
        assert_eq!(self.len(), rhs.len(), "Series lengths differ");
        for (lhs, rhs) in self.0.iter_mut().zip(&rhs.0) {
            *lhs -= rhs;
        }
    }
}

impl Add<&ExprSeries> for ExprSeries {
    type Output = ExprSeries;

    fn add(mut self, rhs: &ExprSeries) -> ExprSeries {
        self += rhs;
        self
    }
}

impl Sub<&ExprSeries> for ExprSeries {
    type Output = ExprSeries;

    fn sub(mut self, rhs: &ExprSeries) -> ExprSeries {
        self -= rhs;
        self
    }
}

impl Mul<f64> for ExprSeries {
    type Output = ExprSeries;

    fn mul(self, rhs: f64) -> ExprSeries {
        self.0.into_iter().map(|expr| expr * rhs).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_expression_arithmetic() {
        let x = Variable::new(0);
        let y = Variable::new(1);
        let expr = (LinearExpr::from(x) * 2.0 - LinearExpr::from(y)) + 3.0;
        assert_approx_eq!(f64, expr.evaluate(&[1.0, 4.0]), 1.0);
        assert!(expr.has_variables());
        assert_eq!(expr.terms().count(), 2);
    }

    #[test]
    fn test_cancelled_terms_are_not_variables() {
        let x = Variable::new(0);
        let expr = LinearExpr::from(x) - LinearExpr::from(x) + 5.0;
        assert!(!expr.has_variables());
        assert_approx_eq!(f64, expr.constant_value(), 5.0);
    }

    #[test]
    fn test_series_has_variables() {
        let constant = ExprSeries::from_values(&[1.0, 2.0]);
        assert!(!constant.has_variables());

        let mut mixed = constant.clone();
        mixed += &ExprSeries::from_variables(&[Variable::new(0), Variable::new(1)]);
        assert!(mixed.has_variables());
        assert_eq!(mixed.evaluate(&[10.0, 20.0]), [11.0, 22.0]);
    }

    #[test]
    fn test_series_dot() {
        let series = ExprSeries::from_variables(&[Variable::new(0), Variable::new(1)]);
        let expr = series.dot(&[0.5, 2.0]);
        assert_approx_eq!(f64, expr.evaluate(&[2.0, 3.0]), 7.0);
    }
}
