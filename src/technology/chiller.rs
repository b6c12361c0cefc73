//! Electric chillers.
use super::rating::RatedCapacity;
use super::{CAPITAL_COST_SUFFIX, FIXED_OM_SUFFIX, Lifecycle, record_series, result_column};
use crate::optimisation::{
    Constraint, ExprSeries, LinearExpr, ObjectiveTerms, Solution, Variable, VariablePool,
};
use crate::report::TimeSeriesTable;
use crate::time_series::{Mask, TimeSeries};
use crate::units::{KW_PER_BTU_PER_HOUR, MoneyPerPower, MoneyPerPowerPerYear};
use anyhow::{Result, ensure};

/// An electric chiller which meets a site cooling load
#[derive(Debug, Clone, PartialEq)]
pub struct Chiller {
    /// The user-provided name
    pub name: String,
    /// The years in which the chiller is in service
    pub lifecycle: Lifecycle,
    /// Rated cooling output, in kW
    pub rated_cold: RatedCapacity,
    /// Coefficient of performance (cooling output per unit of electricity)
    pub cop: f64,
    /// Site cooling load, in kW
    pub site_cooling_load: Option<TimeSeries>,
    /// Capital cost, only included in the objective when sizing
    pub capital_cost: MoneyPerPower,
    /// Fixed operation and maintenance cost
    pub fixed_om: MoneyPerPowerPerYear,
    cold: Option<Vec<Variable>>,
    cold_results: Vec<f64>,
}

impl Chiller {
    /// Create a new [`Chiller`]
    pub fn new(
        name: &str,
        lifecycle: Lifecycle,
        rated_cold: RatedCapacity,
        cop: f64,
        site_cooling_load: Option<TimeSeries>,
    ) -> Result<Self> {
        ensure!(
            cop.is_finite() && cop > 0.0,
            "coefficient of performance must be a finite number greater than zero"
        );

        Ok(Self {
            name: name.to_string(),
            lifecycle,
            rated_cold,
            cop,
            site_cooling_load,
            capital_cost: MoneyPerPower(0.0),
            fixed_om: MoneyPerPowerPerYear(0.0),
            cold: None,
            cold_results: Vec::new(),
        })
    }

    /// Problems with the sizing configuration of this chiller
    pub fn sizing_errors(&self) -> Vec<String> {
        self.rated_cold
            .validate("rated cooling power")
            .err()
            .map(|err| err.to_string())
            .into_iter()
            .collect()
    }

    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        let name = &self.name;
        self.rated_cold.initialize(pool, &format!("{name}-rated_cold"));
        self.cold = Some(pool.add_nonneg_series(&format!("{name}-cold"), size));
    }

    fn cold_vars(&self) -> &[Variable] {
        self.cold
            .as_ref()
            .expect("Chiller variables have not been initialised")
    }

    /// Cooling output for the current window
    pub fn cold(&self) -> ExprSeries {
        ExprSeries::from_variables(self.cold_vars())
    }

    /// Electricity consumed for the current window
    pub fn electric_consumption(&self) -> ExprSeries {
        self.cold() * (1.0 / self.cop)
    }

    /// Cooling output may not exceed the rated output
    pub fn constraints(&self, _mask: &Mask) -> Vec<Constraint> {
        let rated = self.rated_cold.expr();
        vec![Constraint::non_positive(
            format!("{} max cooling", self.name),
            self.cold_vars()
                .iter()
                .map(|cold| LinearExpr::from(*cold) - rated.clone())
                .collect::<ExprSeries>(),
        )]
    }

    /// Fixed O&M and (when sizing) capital costs
    pub fn objective_terms(&self, _mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        let name = &self.name;
        let rated = self.rated_cold.expr();
        let mut costs = ObjectiveTerms::new();
        costs.insert(
            format!("{name} {FIXED_OM_SUFFIX}"),
            &rated * (self.fixed_om.value() * annuity_scalar),
        );
        if self.rated_cold.is_sized() {
            costs.insert(
                format!("{name} {CAPITAL_COST_SUFFIX}"),
                rated * self.capital_cost.value(),
            );
        }
        costs
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        let cold = solution.values(self.cold_vars());
        record_series(&mut self.cold_results, mask, cold);
        self.rated_cold.record(solution);
    }

    /// Electricity consumed over the whole time index
    pub fn consumption_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.cold_results, len)
            .into_iter()
            .map(|cold| cold / self.cop)
            .collect()
    }

    /// Add this chiller's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        let len = report.len();
        report.insert(
            format!("{id} Cooling Generation (kW)"),
            result_column(&self.cold_results, len),
        );
        report.insert(
            format!("{id} Electric Consumption (kW)"),
            self.consumption_results(len),
        );
        if let Some(load) = &self.site_cooling_load {
            report.insert(
                format!("{id} Site Cooling Thermal Load (BTU/hr)"),
                load.scaled(1.0 / KW_PER_BTU_PER_HOUR).values().to_vec(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_consumption_follows_cop() {
        let mut chiller = Chiller::new(
            "chiller",
            Lifecycle::default(),
            RatedCapacity::fixed(100.0),
            4.0,
            None,
        )
        .unwrap();
        let mut pool = VariablePool::default();
        chiller.initialize_variables(&mut pool, 1);
        let consumption = chiller.electric_consumption();
        assert_approx_eq!(f64, consumption[0].evaluate(&[40.0]), 10.0);
    }

    #[test]
    fn test_invalid_cop() {
        assert!(
            Chiller::new("c", Lifecycle::default(), RatedCapacity::fixed(1.0), 0.0, None).is_err()
        );
    }
}
