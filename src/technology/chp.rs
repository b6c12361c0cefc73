//! Combined heat and power.
//!
//! A CHP unit is a generator whose recovered heat is split between steam and hot water. Heat
//! recovery is tied to electric output by a fixed ratio, so it is never dispatched independently.
//!
//! Start-up costs are not modelled.
use super::generator::GeneratorCore;
use super::{Lifecycle, record_series, result_column};
use crate::optimisation::{
    Constraint, ExprSeries, LinearExpr, ObjectiveTerms, Solution, Variable, VariablePool,
};
use crate::report::TimeSeriesTable;
use crate::time_series::{Mask, TimeSeries};
use crate::units::KW_PER_BTU_PER_HOUR;
use anyhow::{Result, ensure};

/// The heat recovery part of a CHP unit
#[derive(Debug, Clone, PartialEq)]
pub struct ChpThermal {
    /// Electric output per unit of recovered heat
    pub electric_heat_ratio: f64,
    /// Maximum ratio of steam to hot water output
    pub max_steam_ratio: f64,
    /// Site steam load, in kW
    pub site_steam_load: Option<TimeSeries>,
    /// Site hot water load, in kW
    pub site_hotwater_load: Option<TimeSeries>,
    vars: Option<ThermalVars>,
    steam_results: Vec<f64>,
    hotwater_results: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct ThermalVars {
    steam: Vec<Variable>,
    hotwater: Vec<Variable>,
}

impl ChpThermal {
    /// Create a new [`ChpThermal`].
    ///
    /// # Arguments
    ///
    /// * `electric_heat_ratio` - Electric output per unit of recovered heat
    /// * `max_steam_ratio` - Maximum ratio of steam to hot water output
    /// * `site_steam_load` - Site steam load in kW, if any
    /// * `site_hotwater_load` - Site hot water load in kW, if any
    pub fn new(
        electric_heat_ratio: f64,
        max_steam_ratio: f64,
        site_steam_load: Option<TimeSeries>,
        site_hotwater_load: Option<TimeSeries>,
    ) -> Result<Self> {
        ensure!(
            electric_heat_ratio.is_finite() && electric_heat_ratio > 0.0,
            "electric_heat_ratio must be a finite number greater than zero"
        );
        ensure!(
            max_steam_ratio.is_finite() && max_steam_ratio >= 0.0,
            "max_steam_ratio must be a finite, non-negative number"
        );

        Ok(Self {
            electric_heat_ratio,
            max_steam_ratio,
            site_steam_load,
            site_hotwater_load,
            vars: None,
            steam_results: Vec::new(),
            hotwater_results: Vec::new(),
        })
    }

    fn vars(&self) -> &ThermalVars {
        self.vars
            .as_ref()
            .expect("CHP thermal variables have not been initialised")
    }
}

/// A combined heat and power unit
#[derive(Debug, Clone, PartialEq)]
pub struct Chp {
    /// The years in which the unit is in service
    pub lifecycle: Lifecycle,
    /// Electric generation capability
    pub generator: GeneratorCore,
    /// Heat recovery
    pub thermal: ChpThermal,
}

impl Chp {
    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        self.generator.initialize_variables(pool, size);
        let name = self.generator.name();
        self.thermal.vars = Some(ThermalVars {
            steam: pool.add_nonneg_series(&format!("{name}-steamP"), size),
            hotwater: pool.add_nonneg_series(&format!("{name}-hotwaterP"), size),
        });
    }

    /// Generator constraints plus the coupling between heat recovery and electric output
    pub fn constraints(&self, mask: &Mask) -> Vec<Constraint> {
        let mut constraints = self.generator.constraints(mask);
        let name = self.generator.name();
        let thermal = &self.thermal;
        let vars = thermal.vars();
        let elec = self.generator.elec();

        constraints.push(Constraint::non_positive(
            format!("{name} steam to hot water ratio"),
            vars.steam
                .iter()
                .zip(&vars.hotwater)
                .map(|(steam, hotwater)| {
                    LinearExpr::from(*steam) - LinearExpr::term(*hotwater, thermal.max_steam_ratio)
                })
                .collect::<ExprSeries>(),
        ));
        constraints.push(Constraint::zero(
            format!("{name} electric to heat ratio"),
            vars.steam
                .iter()
                .zip(&vars.hotwater)
                .zip(elec)
                .map(|((steam, hotwater), elec)| {
                    (LinearExpr::from(*steam) + LinearExpr::from(*hotwater))
                        * thermal.electric_heat_ratio
                        - LinearExpr::from(*elec)
                })
                .collect::<ExprSeries>(),
        ));

        constraints
    }

    /// The steam output variables for the current window
    pub fn recovered_steam(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.thermal.vars().steam)
    }

    /// The hot water output variables for the current window
    pub fn recovered_hotwater(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.thermal.vars().hotwater)
    }

    /// The generator's cost terms
    pub fn objective_terms(&self, mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        self.generator.objective_terms(mask, annuity_scalar)
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        self.generator.record_solution(mask, solution);
        let vars = self.thermal.vars().clone();
        record_series(
            &mut self.thermal.steam_results,
            mask,
            solution.values(&vars.steam),
        );
        record_series(
            &mut self.thermal.hotwater_results,
            mask,
            solution.values(&vars.hotwater),
        );
    }

    /// Add this unit's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        self.generator.add_timeseries_columns(id, report);
        let len = report.len();
        let thermal = &self.thermal;
        report.insert(
            format!("{id} Steam Generation (kW)"),
            result_column(&thermal.steam_results, len),
        );
        report.insert(
            format!("{id} Hot Water Generation (kW)"),
            result_column(&thermal.hotwater_results, len),
        );
        if let Some(load) = &thermal.site_steam_load {
            report.insert(
                format!("{id} Site Steam Thermal Load (BTU/hr)"),
                load.scaled(1.0 / KW_PER_BTU_PER_HOUR).values().to_vec(),
            );
        }
        if let Some(load) = &thermal.site_hotwater_load {
            report.insert(
                format!("{id} Site Hot Water Thermal Load (BTU/hr)"),
                load.scaled(1.0 / KW_PER_BTU_PER_HOUR).values().to_vec(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::chp;
    use crate::optimisation::solve;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_invalid_ratios() {
        assert!(ChpThermal::new(0.0, 1.0, None, None).is_err());
        assert!(ChpThermal::new(1.0, -1.0, None, None).is_err());
        assert!(ChpThermal::new(1.5, 2.0, None, None).is_ok());
    }

    #[rstest]
    fn test_recovered_heat_is_the_decision_variables(mut chp: Chp) {
        let mut pool = VariablePool::default();
        chp.initialize_variables(&mut pool, 2);
        let steam = chp.recovered_steam();
        assert_eq!(steam, ExprSeries::from_variables(&chp.thermal.vars().steam));
        assert!(chp.recovered_hotwater().has_variables());
    }

    #[rstest]
    fn test_solution_respects_heat_coupling(mut chp: Chp) {
        // Require enough steam that the steam/hot water envelope is binding
        let mut pool = VariablePool::default();
        chp.initialize_variables(&mut pool, 3);
        let mask = Mask::all(3);
        let mut constraints = chp.constraints(&mask);
        let demand = [10.0, 30.0, 20.0];
        constraints.push(Constraint::non_positive(
            "steam demand",
            chp.recovered_steam()
                .iter()
                .zip(demand)
                .map(|(steam, demand)| LinearExpr::constant(demand) - steam.clone())
                .collect::<ExprSeries>(),
        ));

        let solution = solve(&pool, &chp.objective_terms(&mask, 1.0), &constraints).unwrap();
        chp.record_solution(&mask, &solution);

        let thermal = &chp.thermal;
        let elec = chp.generator.elec_results(3);
        for t in 0..3 {
            let steam = thermal.steam_results[t];
            let hotwater = thermal.hotwater_results[t];
            assert!(steam <= thermal.max_steam_ratio * hotwater + 1e-6);
            assert_approx_eq!(
                f64,
                (steam + hotwater) * thermal.electric_heat_ratio,
                elec[t],
                epsilon = 1e-6
            );
        }
    }

    #[rstest]
    fn test_report_columns(chp: Chp) {
        let index = crate::fixture::time_index(2);
        let mut report = TimeSeriesTable::new(&index);
        chp.add_timeseries_columns("CHP: chp1", &mut report);
        assert!(report.contains("CHP: chp1 Steam Generation (kW)"));
        assert!(report.contains("CHP: chp1 Hot Water Generation (kW)"));
        assert!(report.contains("CHP: chp1 Site Steam Thermal Load (BTU/hr)"));
        assert!(!report.contains("CHP: chp1 Site Hot Water Thermal Load (BTU/hr)"));
    }
}
