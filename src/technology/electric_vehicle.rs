//! Electric vehicles charged at the site.
//!
//! A vehicle arrives with an empty battery at the plug-in hour each day and must hold at least the
//! target energy when it leaves at the plug-out hour. It can only charge while plugged in.
use super::{Lifecycle, record_series, result_column};
use crate::optimisation::{Constraint, ExprSeries, LinearExpr, Solution, Variable, VariablePool};
use crate::report::TimeSeriesTable;
use crate::time_series::{Mask, TimeIndex};
use anyhow::{Result, ensure};
use chrono::Timelike;

/// Charging parameters for an electric vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectricVehicleParams {
    /// Maximum charging power, in kW
    pub ch_max_rated: f64,
    /// Energy required at departure, in kWh
    pub ene_target: f64,
    /// Hour of the day at which the vehicle is plugged in
    pub plugin_time: u32,
    /// Hour of the day at which the vehicle leaves
    pub plugout_time: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct ElectricVehicleVars {
    ch: Vec<Variable>,
    ene: Vec<Variable>,
}

/// A single electric vehicle with a daily charging session
#[derive(Debug, Clone, PartialEq)]
pub struct ElectricVehicle {
    /// The user-provided name
    pub name: String,
    /// The years in which the vehicle is in service
    pub lifecycle: Lifecycle,
    /// Maximum charging power, in kW
    pub ch_max_rated: f64,
    /// Energy required at departure, in kWh
    pub ene_target: f64,
    plugged: Vec<bool>,
    dt: f64,
    vars: Option<ElectricVehicleVars>,
    ch_results: Vec<f64>,
    ene_results: Vec<f64>,
}

impl ElectricVehicle {
    /// Create a new [`ElectricVehicle`], working out when it is plugged in from `index`
    pub fn new(
        name: &str,
        lifecycle: Lifecycle,
        params: ElectricVehicleParams,
        index: &TimeIndex,
    ) -> Result<Self> {
        ensure!(
            params.plugin_time < 24 && params.plugout_time < 24,
            "plug-in and plug-out times must be hours of the day (0-23)"
        );
        ensure!(
            params.plugin_time != params.plugout_time,
            "plug-in and plug-out times must differ"
        );
        ensure!(
            params.ch_max_rated > 0.0 && params.ene_target >= 0.0,
            "charging power must be positive and the energy target non-negative"
        );

        let plugged = index
            .timestamps()
            .iter()
            .map(|ts| {
                let hour = ts.hour();
                if params.plugin_time < params.plugout_time {
                    (params.plugin_time..params.plugout_time).contains(&hour)
                } else {
                    hour >= params.plugin_time || hour < params.plugout_time
                }
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            lifecycle,
            ch_max_rated: params.ch_max_rated,
            ene_target: params.ene_target,
            plugged,
            dt: index.dt(),
            vars: None,
            ch_results: Vec::new(),
            ene_results: Vec::new(),
        })
    }

    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        let name = &self.name;
        self.vars = Some(ElectricVehicleVars {
            ch: pool.add_series(&format!("{name}-ch"), size, 0.0, self.ch_max_rated),
            ene: pool.add_nonneg_series(&format!("{name}-ene"), size),
        });
    }

    fn vars(&self) -> &ElectricVehicleVars {
        self.vars
            .as_ref()
            .expect("Electric vehicle variables have not been initialised")
    }

    /// Charging power for the current window
    pub fn charge(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.vars().ch)
    }

    /// Stored energy for the current window
    pub fn energy(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.vars().ene)
    }

    /// Charging availability and the energy needed at each departure
    pub fn constraints(&self, mask: &Mask) -> Vec<Constraint> {
        let name = &self.name;
        let vars = self.vars();
        let plugged = mask.select(&self.plugged);
        let size = plugged.len();
        let after_charging =
            |t: usize| LinearExpr::from(vars.ene[t]) + LinearExpr::term(vars.ch[t], self.dt);

        let mut unplugged = Vec::new();
        let mut arrivals = Vec::new();
        let mut balance = Vec::new();
        let mut departures = Vec::new();
        for t in 0..size {
            if !plugged[t] {
                unplugged.push(LinearExpr::from(vars.ch[t]));
                unplugged.push(LinearExpr::from(vars.ene[t]));
                continue;
            }
            if t == 0 || !plugged[t - 1] {
                arrivals.push(LinearExpr::from(vars.ene[t]));
            }
            if t + 1 < size && plugged[t + 1] {
                balance.push(LinearExpr::from(vars.ene[t + 1]) - after_charging(t));
            } else {
                departures.push(LinearExpr::constant(self.ene_target) - after_charging(t));
            }
        }

        [
            Constraint::zero(format!("{name} unplugged"), ExprSeries::from_iter(unplugged)),
            Constraint::zero(format!("{name} arrival energy"), ExprSeries::from_iter(arrivals)),
            Constraint::zero(format!("{name} energy balance"), ExprSeries::from_iter(balance)),
            Constraint::non_positive(
                format!("{name} departure energy"),
                ExprSeries::from_iter(departures),
            ),
        ]
        .into_iter()
        .filter(|constraint| !constraint.rows().is_empty())
        .collect()
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        let vars = self.vars().clone();
        record_series(&mut self.ch_results, mask, solution.values(&vars.ch));
        record_series(&mut self.ene_results, mask, solution.values(&vars.ene));
    }

    /// Charging power over the whole time index
    pub fn charge_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.ch_results, len)
    }

    /// Stored energy over the whole time index
    pub fn energy_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.ene_results, len)
    }

    /// Add this vehicle's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        let len = report.len();
        report.insert(format!("{id} Charge (kW)"), self.charge_results(len));
        report.insert(
            format!("{id} State of Energy (kWh)"),
            self.energy_results(len),
        );
        report.insert(
            format!("{id} Plugged In (y/n)"),
            self.plugged
                .iter()
                .map(|plugged| f64::from(u8::from(*plugged)))
                .collect(),
        );
    }
}
