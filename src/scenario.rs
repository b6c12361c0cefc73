//! Running a scenario: one optimisation problem per window, solved in turn.
use crate::error::ModelError;
use crate::finance::annuity_scalar;
use crate::optimisation::{ObjectiveTerms, Solution, VariablePool, merge_objective_terms, solve};
use crate::poi::{Poi, SystemState};
use crate::report::{CAPEX_YEAR, MonthlyTable, ProformaTable, SizingTable, TimeSeriesTable};
use crate::technology::{CAPITAL_COST_SUFFIX, FIXED_OM_SUFFIX, record_series, result_column};
use crate::time_series::{Mask, TimeIndex, Window, WindowLevel};
use crate::units::Dimensionless;
use crate::value_stream::ValueStream;
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use log::{error, info};
use serde::Deserialize;

/// Label of the time series column holding the power imported at the POI
pub const NET_IMPORT: &str = "Net Import (kW)";

/// Scenario-wide parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioParams {
    /// Name of the scenario, shown in log messages
    pub name: String,
    /// The years of the time series to optimise
    pub opt_years: Vec<i32>,
    /// How the optimisation years are split into windows
    #[serde(default)]
    pub window: WindowLevel,
    /// Whether storage and generators use on/off binary variables
    #[serde(default)]
    pub binary: bool,
    /// Annual discount rate used when sizing
    #[serde(default)]
    pub discount_rate: Dimensionless,
    /// Annual inflation rate used when sizing
    #[serde(default)]
    pub inflation_rate: Dimensionless,
    /// First year of the project (defaults to the first optimisation year)
    pub start_year: Option<i32>,
    /// Last year of the project (defaults to the start year)
    pub end_year: Option<i32>,
}

/// A window for which no optimal solution was found
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWindow {
    /// The window's label
    pub label: String,
    /// Why the window failed
    pub reason: String,
}

/// Everything produced by a scenario run
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    /// The capacity of every technology
    pub sizing: SizingTable,
    /// Dispatch results for every time step
    pub timeseries: TimeSeriesTable,
    /// Energy and cost results summed by month
    pub monthly: MonthlyTable,
    /// Costs by year
    pub proforma: ProformaTable,
    /// Windows which could not be solved; their rows in the time series are NaN
    pub failed_windows: Vec<FailedWindow>,
}

/// Cost values for the solved windows, collected for the proforma
#[derive(Debug, Default)]
struct CostLedger {
    labels: IndexSet<String>,
    capex: IndexMap<String, f64>,
    yearly: IndexMap<i32, IndexMap<String, f64>>,
}

impl CostLedger {
    /// Add the cost terms of one solved window, evaluated without the annuity scalar
    fn add_window(&mut self, year: i32, terms: &ObjectiveTerms, solution: &Solution) {
        let row = self.yearly.entry(year).or_default();
        for (label, expr) in terms {
            self.labels.insert(label.clone());
            let cost = -solution.evaluate(expr);
            if label.ends_with(CAPITAL_COST_SUFFIX) {
                self.capex.insert(label.clone(), cost);
            } else if label.ends_with(FIXED_OM_SUFFIX) {
                row.insert(label.clone(), cost);
            } else {
                *row.entry(label.clone()).or_default() += cost;
            }
        }
    }

    fn into_proforma(self) -> ProformaTable {
        let mut proforma = ProformaTable::new(self.labels);
        proforma.add_row(CAPEX_YEAR, &self.capex);
        for (year, values) in &self.yearly {
            proforma.add_row(year.to_string(), values);
        }
        proforma
    }
}

/// A scenario which is ready to run
#[derive(Debug, Clone)]
pub struct Scenario {
    params: ScenarioParams,
    index: TimeIndex,
    windows: Vec<Window>,
    poi: Poi,
    value_streams: Vec<ValueStream>,
    annuity_scalar: f64,
}

impl Scenario {
    /// Check a scenario can be run and prepare it.
    ///
    /// Formulation conflicts and sizing problems are reported here, before any problem is built.
    ///
    /// # Arguments
    ///
    /// * `params` - Scenario-wide parameters
    /// * `index` - Time index of the optimisation years
    /// * `poi` - The site's DERs
    /// * `value_streams` - The services the DERs provide
    pub fn new(
        params: ScenarioParams,
        index: TimeIndex,
        mut poi: Poi,
        value_streams: Vec<ValueStream>,
    ) -> Result<Self> {
        if poi.detect_nonconvex_sizing_conflict(params.binary) {
            return Err(ModelError::FormulationConflict(
                "Storage power cannot be sized with the binary formulation. Turn off binary or \
                fix the storage power ratings."
                    .into(),
            )
            .into());
        }

        let windows = index.windows(params.window);
        let start_year = params
            .start_year
            .or_else(|| index.years().first().copied())
            .context("Time index has no years")?;
        let mut annuity = 1.0;
        if poi.is_sizing_optimization() {
            if windows.len() != 1 {
                return Err(ModelError::configuration(format!(
                    "Sizing requires a single optimisation window, but {} were found. Use one \
                    optimisation year with yearly windows.",
                    windows.len()
                ))
                .into());
            }
            if params.binary && poi.is_any_sizable_der_missing_power_max() {
                return Err(ModelError::configuration(
                    "Every technology being sized needs a maximum power rating when using the \
                    binary formulation",
                )
                .into());
            }

            poi.resolve_minimum_size(&value_streams, start_year)?;
            let end_year = params.end_year.unwrap_or(start_year);
            annuity = annuity_scalar(
                start_year,
                end_year,
                params.discount_rate,
                params.inflation_rate,
            )
            .value();
            info!("Sizing with an annuity scalar of {annuity:.4}");
        }

        Ok(Self {
            params,
            index,
            windows,
            poi,
            value_streams,
            annuity_scalar: annuity,
        })
    }

    /// The scenario's parameters
    pub fn params(&self) -> &ScenarioParams {
        &self.params
    }

    /// The optimisation windows, in the order they are solved
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// The multiplier applied to yearly costs in the objective
    pub fn annuity_scalar(&self) -> f64 {
        self.annuity_scalar
    }

    /// Solve every window in turn and collect the results.
    ///
    /// A window which cannot be solved is logged and skipped.
    pub fn run(mut self) -> Results {
        let windows = std::mem::take(&mut self.windows);
        let mut costs = CostLedger::default();
        let mut net_import = Vec::new();
        let mut failed_windows = Vec::new();

        for window in &windows {
            info!("Optimising window {}", window.label);
            match self.solve_window(window, &mut net_import) {
                Ok((terms, solution)) => costs.add_window(window.year, &terms, &solution),
                Err(err) => {
                    error!("{err:?}");
                    failed_windows.push(FailedWindow {
                        label: window.label.clone(),
                        reason: format!("{err:#}"),
                    });
                }
            }
        }
        if !failed_windows.is_empty() {
            error!(
                "{} of {} windows could not be solved",
                failed_windows.len(),
                windows.len()
            );
        }

        self.collect_results(&net_import, costs, failed_windows)
    }

    /// Build and solve one window, recording its solution.
    ///
    /// Returns the window's cost terms without the annuity scalar, for the proforma.
    fn solve_window(
        &mut self,
        window: &Window,
        net_import: &mut Vec<f64>,
    ) -> Result<(ObjectiveTerms, Solution)> {
        let mask = &window.mask;
        self.poi.select_active_technologies(window.year);

        let mut pool = VariablePool::default();
        self.poi.initialize_variables(&mut pool, mask);
        let state = self.poi.aggregate_system_state(mask);
        let (poi_terms, mut constraints) = self.poi.build_optimization_problem(
            mask,
            &state.power_in,
            &state.power_out,
            &state.steam,
            &state.hotwater,
            &state.cold,
            self.annuity_scalar,
        );
        constraints.extend(self.poi.technology_constraints(mask));
        let objective = self.objective(mask, poi_terms, &state, self.annuity_scalar);

        let solution = solve(&pool, &objective, &constraints)
            .with_context(|| format!("Failed to solve window {}", window.label))?;
        info!(
            "Window {} solved with objective value {:.2}",
            window.label,
            solution.objective_value()
        );

        self.poi.record_solution(mask, &solution);
        record_series(
            net_import,
            mask,
            solution.evaluate_series(&state.net_import()),
        );

        let yearly_terms = self.objective(mask, ObjectiveTerms::new(), &state, 1.0);
        Ok((yearly_terms, solution))
    }

    /// Combine the cost terms of the POI, the technologies and the value streams
    fn objective(
        &self,
        mask: &Mask,
        poi_terms: ObjectiveTerms,
        state: &SystemState,
        annuity_scalar: f64,
    ) -> ObjectiveTerms {
        let dt = self.index.dt();
        let objective =
            merge_objective_terms(poi_terms, self.poi.technology_objective(mask, annuity_scalar));
        self.value_streams
            .iter()
            .map(|stream| stream.objective_terms(mask, state, dt, annuity_scalar))
            .fold(objective, merge_objective_terms)
    }

    fn collect_results(
        &self,
        net_import: &[f64],
        costs: CostLedger,
        failed_windows: Vec<FailedWindow>,
    ) -> Results {
        let (mut timeseries, mut monthly) = self.poi.merge_reports(true, &self.index);
        let net_import = result_column(net_import, self.index.len());
        for stream in &self.value_streams {
            stream.add_timeseries_columns(&mut timeseries);
            stream.add_monthly_columns(&self.index, &net_import, &mut monthly);
        }
        timeseries.insert(NET_IMPORT, net_import);

        Results {
            sizing: self.poi.sizing_summary(),
            timeseries,
            monthly,
            proforma: costs.into_proforma(),
            failed_windows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, chp, generator, pv, scenario_params, site_load, time_index};
    use crate::report::{NET_LOAD, YEARLY_NET_VALUE};
    use crate::technology::Technology;
    use crate::technology::battery::Battery;
    use crate::technology::chp::Chp;
    use crate::technology::generator::Generator;
    use crate::technology::load::Load;
    use crate::technology::pv::Pv;
    use crate::technology::rating::RatedCapacity;
    use crate::time_series::TimeSeries;
    use crate::units::{Energy, Power};
    use crate::value_stream::{Deferral, DeferralRequirement, EnergyTimeShift};
    use indexmap::indexmap;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn time_shift(len: usize) -> ValueStream {
        ValueStream::EnergyTimeShift(EnergyTimeShift {
            price: TimeSeries::constant(0.1, len),
        })
    }

    fn model_error(err: &anyhow::Error) -> &ModelError {
        err.downcast_ref::<ModelError>()
            .expect("Expected a ModelError")
    }

    #[rstest]
    fn test_binary_power_sizing_conflicts(mut scenario_params: ScenarioParams, mut battery: Battery) {
        scenario_params.binary = true;
        battery.dis_max_rated = RatedCapacity::sized(0.0, Some(100.0));
        let poi = Poi::new(vec![Technology::Battery(battery)], None, None).unwrap();
        let err = Scenario::new(scenario_params, time_index(2), poi, vec![time_shift(2)])
            .unwrap_err();
        assert!(matches!(
            model_error(&err),
            ModelError::FormulationConflict(_)
        ));
    }

    #[rstest]
    fn test_deferral_beyond_fixed_battery_rejected(
        scenario_params: ScenarioParams,
        battery: Battery,
        mut pv: Pv,
    ) {
        pv.rated_capacity = RatedCapacity::sized(0.0, Some(100.0));
        let deferral = ValueStream::Deferral(Deferral {
            min_years: 1,
            requirements: indexmap! {
                2017 => DeferralRequirement { power: Power(500.0), energy: Energy(2000.0) },
            },
        });
        let poi = Poi::new(
            vec![Technology::Pv(pv), Technology::Battery(battery)],
            None,
            None,
        )
        .unwrap();
        let err = Scenario::new(
            scenario_params,
            time_index(2),
            poi,
            vec![deferral, time_shift(2)],
        )
        .unwrap_err();
        assert!(matches!(model_error(&err), ModelError::Configuration(_)));
    }

    #[rstest]
    fn test_sizing_requires_single_window(
        mut scenario_params: ScenarioParams,
        mut generator: Generator,
    ) {
        scenario_params.window = WindowLevel::Steps(1);
        generator.core = crate::fixture::sized_generator_core();
        let poi = Poi::new(vec![Technology::Generator(generator)], None, None).unwrap();
        let err = Scenario::new(scenario_params, time_index(2), poi, Vec::new()).unwrap_err();
        assert!(matches!(model_error(&err), ModelError::Configuration(_)));
    }

    #[rstest]
    fn test_dispatch_uses_unit_annuity(mut scenario_params: ScenarioParams, site_load: Load) {
        scenario_params.discount_rate = Dimensionless(0.1);
        scenario_params.end_year = Some(2030);
        let poi = Poi::new(vec![Technology::Load(site_load)], None, None).unwrap();
        let scenario = Scenario::new(scenario_params, time_index(2), poi, Vec::new()).unwrap();
        assert_eq!(scenario.annuity_scalar(), 1.0);
        assert_eq!(scenario.windows().len(), 1);
    }

    #[rstest]
    fn test_chp_window_respects_coupling(scenario_params: ScenarioParams, chp: Chp, site_load: Load) {
        let ehr = chp.thermal.electric_heat_ratio;
        let msr = chp.thermal.max_steam_ratio;
        let poi = Poi::new(
            vec![Technology::Load(site_load), Technology::Chp(chp)],
            None,
            None,
        )
        .unwrap();
        let scenario =
            Scenario::new(scenario_params, time_index(2), poi, vec![time_shift(2)]).unwrap();
        let results = scenario.run();
        assert!(results.failed_windows.is_empty());

        let ts = &results.timeseries;
        let elec = ts.get("CHP: chp1 Electric Generation (kW)").unwrap();
        let steam = ts.get("CHP: chp1 Steam Generation (kW)").unwrap();
        let hotwater = ts.get("CHP: chp1 Hot Water Generation (kW)").unwrap();
        for t in 0..2 {
            assert!(steam[t] - msr * hotwater[t] <= 1e-6);
            assert_approx_eq!(f64, (steam[t] + hotwater[t]) * ehr, elec[t], epsilon = 1e-6);
            // The site steam load is 10 kW
            assert!(steam[t] >= 10.0 - 1e-6);
        }

        let net_load = ts.get(NET_LOAD).unwrap();
        let net_import = ts.get(NET_IMPORT).unwrap();
        for t in 0..2 {
            assert_approx_eq!(f64, net_load[t], net_import[t], epsilon = 1e-6);
        }
        assert!(results.proforma.value("2017", YEARLY_NET_VALUE).unwrap() < 0.0);
        assert_eq!(results.proforma.value(CAPEX_YEAR, YEARLY_NET_VALUE), Some(0.0));
    }

    #[rstest]
    fn test_infeasible_windows_are_skipped(
        mut scenario_params: ScenarioParams,
        battery: Battery,
        site_load: Load,
    ) {
        // Nothing can be imported and the battery must end each window where it started
        scenario_params.window = WindowLevel::Steps(1);
        let poi = Poi::new(
            vec![Technology::Load(site_load), Technology::Battery(battery)],
            Some(0.0),
            None,
        )
        .unwrap();
        let scenario =
            Scenario::new(scenario_params, time_index(2), poi, vec![time_shift(2)]).unwrap();
        let results = scenario.run();

        let labels: Vec<_> = results
            .failed_windows
            .iter()
            .map(|window| window.label.as_str())
            .collect();
        assert_eq!(labels, ["window 1", "window 2"]);
        let power = results.timeseries.get("BATTERY: ess Power (kW)").unwrap();
        assert!(power.iter().all(|p| p.is_nan()));
    }
}
