//! Site electric loads.
use super::{Lifecycle, record_series, result_column};
use crate::optimisation::{
    Constraint, ExprSeries, ObjectiveTerms, Solution, Variable, VariablePool,
};
use crate::report::TimeSeriesTable;
use crate::time_series::{Mask, TimeSeries};
use anyhow::{Result, ensure};

/// A fixed site load
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// The user-provided name
    pub name: String,
    /// The years in which the load is present
    pub lifecycle: Lifecycle,
    /// Electric load, in kW
    pub load: TimeSeries,
}

impl Load {
    /// Add this load's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        report.insert(
            format!("{id} Original Load (kW)"),
            self.load.values().to_vec(),
        );
    }
}

/// A site load which can be moved between time steps within a window
#[derive(Debug, Clone, PartialEq)]
pub struct ControllableLoad {
    /// The user-provided name
    pub name: String,
    /// The years in which the load is present
    pub lifecycle: Lifecycle,
    /// Electric load before any shifting, in kW
    pub original_load: TimeSeries,
    /// Maximum load which can be added or removed at each time step, in kW
    pub power_rating: f64,
    shift: Option<Vec<Variable>>,
    load_results: Vec<f64>,
}

impl ControllableLoad {
    /// Create a new [`ControllableLoad`]
    pub fn new(
        name: &str,
        lifecycle: Lifecycle,
        original_load: TimeSeries,
        power_rating: f64,
    ) -> Result<Self> {
        ensure!(
            power_rating.is_finite() && power_rating >= 0.0,
            "power_rating must be a finite, non-negative number"
        );

        Ok(Self {
            name: name.to_string(),
            lifecycle,
            original_load,
            power_rating,
            shift: None,
            load_results: Vec::new(),
        })
    }

    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        self.shift = Some(pool.add_series(
            &format!("{}-shift", self.name),
            size,
            -self.power_rating,
            self.power_rating,
        ));
    }

    fn shift(&self) -> &[Variable] {
        self.shift
            .as_ref()
            .expect("Controllable load variables have not been initialised")
    }

    /// The load after shifting for the current window
    pub fn load(&self, mask: &Mask) -> ExprSeries {
        ExprSeries::from_values(&self.original_load.masked(mask))
            + &ExprSeries::from_variables(self.shift())
    }

    /// Shifting must not change the energy consumed over the window or make the load negative
    pub fn constraints(&self, mask: &Mask) -> Vec<Constraint> {
        let name = &self.name;
        vec![
            Constraint::zero(
                format!("{name} energy neutral"),
                ExprSeries::from_variables(self.shift()).total(),
            ),
            Constraint::non_positive(
                format!("{name} non-negative load"),
                self.load(mask).into_iter().map(|load| -load).collect::<ExprSeries>(),
            ),
        ]
    }

    /// Shifting load has no direct cost
    pub fn objective_terms(&self, _mask: &Mask, _annuity_scalar: f64) -> ObjectiveTerms {
        ObjectiveTerms::new()
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        let load = solution.evaluate_series(&self.load(mask));
        record_series(&mut self.load_results, mask, load);
    }

    /// The load after shifting over the whole time index
    pub fn load_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.load_results, len)
    }

    /// Add this load's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        let len = report.len();
        report.insert(
            format!("{id} Original Load (kW)"),
            self.original_load.values().to_vec(),
        );
        report.insert(format!("{id} Load (kW)"), self.load_results(len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimisation::solve;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_shifted_load_is_energy_neutral() {
        let mut load = ControllableLoad::new(
            "flex",
            Lifecycle::default(),
            TimeSeries::new(vec![10.0, 10.0]),
            5.0,
        )
        .unwrap();
        let mut pool = VariablePool::default();
        load.initialize_variables(&mut pool, 2);
        let mask = Mask::all(2);

        // Energy is more expensive in the second step, so load moves into the first
        let objective: ObjectiveTerms = [("energy".to_string(), load.load(&mask).dot(&[1.0, 3.0]))]
            .into_iter()
            .collect();
        let solution = solve(&pool, &objective, &load.constraints(&mask)).unwrap();
        load.record_solution(&mask, &solution);

        let shifted = load.load_results(2);
        assert_approx_eq!(f64, shifted[0], 15.0, epsilon = 1e-6);
        assert_approx_eq!(f64, shifted[1], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_negative_rating() {
        assert!(
            ControllableLoad::new("flex", Lifecycle::default(), TimeSeries::default(), -1.0)
                .is_err()
        );
    }

    #[test]
    fn test_fixed_load_report() {
        let load = Load {
            name: "site".into(),
            lifecycle: Lifecycle::default(),
            load: TimeSeries::new(vec![1.0, 2.0]),
        };
        let mut report = TimeSeriesTable::new(&crate::fixture::time_index(2));
        load.add_timeseries_columns("LOAD: site", &mut report);
        assert_eq!(report.get("LOAD: site Original Load (kW)").unwrap(), [1.0, 2.0]);
    }
}
