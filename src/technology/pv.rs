//! Solar photovoltaics.
use super::rating::RatedCapacity;
use super::{CAPITAL_COST_SUFFIX, FIXED_OM_SUFFIX, Lifecycle, record_series, result_column};
use crate::optimisation::{
    Constraint, ExprSeries, LinearExpr, ObjectiveTerms, Solution, Variable, VariablePool,
};
use crate::report::{MonthlyTable, TimeSeriesTable};
use crate::time_series::{Mask, TimeIndex, TimeSeries};
use crate::units::{MoneyPerPower, MoneyPerPowerPerYear};

/// A solar PV system whose output follows a per-kW generation profile
#[derive(Debug, Clone, PartialEq)]
pub struct Pv {
    /// The user-provided name
    pub name: String,
    /// The years in which the system is in service
    pub lifecycle: Lifecycle,
    /// Rated (AC) power
    pub rated_capacity: RatedCapacity,
    /// Generation per kW of rated power at each time step
    pub profile: TimeSeries,
    /// Whether output may be curtailed below the profile
    pub curtail: bool,
    /// Capital cost, only included in the objective when sizing
    pub capital_cost: MoneyPerPower,
    /// Fixed operation and maintenance cost
    pub fixed_om: MoneyPerPowerPerYear,
    /// Generation variables for the current window (only used with curtailment)
    generation: Option<Vec<Variable>>,
    generation_results: Vec<f64>,
}

impl Pv {
    /// Create a new [`Pv`]
    pub fn new(
        name: &str,
        lifecycle: Lifecycle,
        rated_capacity: RatedCapacity,
        profile: TimeSeries,
        curtail: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            lifecycle,
            rated_capacity,
            profile,
            curtail,
            capital_cost: MoneyPerPower(0.0),
            fixed_om: MoneyPerPowerPerYear(0.0),
            generation: None,
            generation_results: Vec::new(),
        }
    }

    /// Problems with the sizing configuration of this system
    pub fn sizing_errors(&self) -> Vec<String> {
        self.rated_capacity
            .validate("rated capacity")
            .err()
            .map(|err| err.to_string())
            .into_iter()
            .collect()
    }

    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        let name = &self.name;
        self.rated_capacity
            .initialize(pool, &format!("{name}-rated_capacity"));
        self.generation = self
            .curtail
            .then(|| pool.add_nonneg_series(&format!("{name}-gen"), size));
    }

    /// The most that can be generated at each step of the window
    fn available(&self, mask: &Mask) -> ExprSeries {
        let rated = self.rated_capacity.expr();
        self.profile
            .masked(mask)
            .into_iter()
            .map(|per_kw| &rated * per_kw)
            .collect()
    }

    /// Electric generation for the current window
    pub fn generation(&self, mask: &Mask) -> ExprSeries {
        match &self.generation {
            Some(generation) => ExprSeries::from_variables(generation),
            None => self.available(mask),
        }
    }

    /// Curtailed output may not exceed what is available
    pub fn constraints(&self, mask: &Mask) -> Vec<Constraint> {
        let Some(generation) = &self.generation else {
            return Vec::new();
        };

        vec![Constraint::non_positive(
            format!("{} max generation", self.name),
            generation
                .iter()
                .zip(self.available(mask))
                .map(|(generation, available)| LinearExpr::from(*generation) - available)
                .collect::<ExprSeries>(),
        )]
    }

    /// Fixed O&M and (when sizing) capital costs
    pub fn objective_terms(&self, _mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        let name = &self.name;
        let rated = self.rated_capacity.expr();
        let mut costs = ObjectiveTerms::new();
        costs.insert(
            format!("{name} {FIXED_OM_SUFFIX}"),
            &rated * (self.fixed_om.value() * annuity_scalar),
        );
        if self.rated_capacity.is_sized() {
            costs.insert(
                format!("{name} {CAPITAL_COST_SUFFIX}"),
                rated * self.capital_cost.value(),
            );
        }
        costs
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        let generation = solution.evaluate_series(&self.generation(mask));
        record_series(&mut self.generation_results, mask, generation);
        self.rated_capacity.record(solution);
    }

    /// Electric generation over the whole time index
    pub fn generation_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.generation_results, len)
    }

    /// Add this system's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        let len = report.len();
        report.insert(
            format!("{id} Electric Generation (kW)"),
            self.generation_results(len),
        );
        if self.curtail {
            let rated = self.rated_capacity.value().unwrap_or(f64::NAN);
            report.insert(
                format!("{id} Maximum (kW)"),
                self.profile.scaled(rated).values().to_vec(),
            );
        }
    }

    /// Add this system's columns to a monthly report
    pub fn add_monthly_columns(&self, id: &str, index: &TimeIndex, report: &mut MonthlyTable) {
        report.insert_energy(
            format!("{id} Electric Generation (kWh)"),
            index,
            &self.generation_results(index.len()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_uncurtailed_generation_is_constant() {
        let mut pv = Pv::new(
            "pv",
            Lifecycle::default(),
            RatedCapacity::fixed(100.0),
            TimeSeries::new(vec![0.0, 0.5]),
            false,
        );
        let mut pool = VariablePool::default();
        pv.initialize_variables(&mut pool, 2);
        let generation = pv.generation(&Mask::all(2));
        assert!(!generation.has_variables());
        assert_approx_eq!(f64, generation[1].constant_value(), 50.0);
        assert!(pv.constraints(&Mask::all(2)).is_empty());
    }

    #[test]
    fn test_sized_generation_scales_with_rating() {
        let mut pv = Pv::new(
            "pv",
            Lifecycle::default(),
            RatedCapacity::sized(0.0, Some(10.0)),
            TimeSeries::new(vec![0.25]),
            true,
        );
        let mut pool = VariablePool::default();
        pv.initialize_variables(&mut pool, 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pv.constraints(&Mask::all(1)).len(), 1);
        assert!(pv.objective_terms(&Mask::all(1), 1.0).contains_key("pv Capital Cost"));
    }
}
