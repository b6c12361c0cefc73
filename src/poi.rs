//! The point of interconnection (POI), where every DER's flows and the site loads are balanced.
//!
//! The POI owns the scenario's technologies. For each optimisation window it selects the active
//! technologies, aggregates their contributions and adds the system-wide constraints: import and
//! export limits and a balance for each thermal channel.
use crate::error::ModelError;
use crate::optimisation::{
    Constraint, ExprSeries, ObjectiveTerms, Solution, VariablePool, merge_objective_terms,
};
use crate::report::{
    AGGREGATED_STATE_OF_ENERGY, MonthlyTable, NET_LOAD, ReportTotals, SizingTable,
    TOTAL_GENERATION, TOTAL_LOAD, TOTAL_ORIGINAL_LOAD, TOTAL_STORAGE_POWER, TimeSeriesTable,
};
use crate::technology::Technology;
use crate::technology::battery::RatedQuantity;
use crate::time_series::{Mask, TimeIndex, TimeSeries};
use crate::value_stream::ValueStream;
use anyhow::Result;
use itertools::Itertools;
use log::{debug, warn};

/// The aggregated flows at the POI for one window, one expression per time step
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    /// Site load, including vehicle charging
    pub load: ExprSeries,
    /// Generation from intermittent resources
    pub variable_generation: ExprSeries,
    /// Generation from dispatchable sources
    pub generation: ExprSeries,
    /// Net storage power (discharge minus charge)
    pub storage_power: ExprSeries,
    /// Energy stored across all storage
    pub state_of_energy: ExprSeries,
    /// Power flowing from the DERs into the POI
    pub power_in: ExprSeries,
    /// Power flowing out of the POI to loads and charging
    pub power_out: ExprSeries,
    /// Recovered steam
    pub steam: ExprSeries,
    /// Recovered hot water
    pub hotwater: ExprSeries,
    /// Cooling
    pub cold: ExprSeries,
}

impl SystemState {
    /// A state with every flow zero for `size` time steps
    pub fn zeros(size: usize) -> Self {
        let zeros = ExprSeries::zeros(size);
        Self {
            load: zeros.clone(),
            variable_generation: zeros.clone(),
            generation: zeros.clone(),
            storage_power: zeros.clone(),
            state_of_energy: zeros.clone(),
            power_in: zeros.clone(),
            power_out: zeros.clone(),
            steam: zeros.clone(),
            hotwater: zeros.clone(),
            cold: zeros,
        }
    }

    /// Power imported from the grid (negative when exporting)
    pub fn net_import(&self) -> ExprSeries {
        self.power_out.clone() - &self.power_in
    }
}

/// The point of interconnection
#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    technologies: Vec<Technology>,
    active: Vec<usize>,
    is_sizing_optimization: bool,
    site_steam_load: Option<TimeSeries>,
    site_hotwater_load: Option<TimeSeries>,
    site_cooling_load: Option<TimeSeries>,
    max_import: Option<f64>,
    max_export: Option<f64>,
}

/// Take the first declared site load of one type, warning about any others
fn first_site_load<'a>(
    technologies: &'a [Technology],
    kind: &str,
    site_load: impl Fn(&'a Technology) -> Option<&'a TimeSeries>,
) -> Option<TimeSeries> {
    let mut declared = technologies
        .iter()
        .filter_map(|tech| site_load(tech).map(|load| (tech, load)));
    let (_, first) = declared.next()?;
    for (tech, _) in declared {
        warn!(
            "{} also declares a site {kind} load; only the first one declared is used",
            tech.unique_tech_id()
        );
    }
    Some(first.clone())
}

impl Poi {
    /// Create a new [`Poi`].
    ///
    /// Every technology must have a distinct [`Technology::unique_tech_id`]. If any technology is being sized, every technology's sizing configuration is checked and
    /// all problems found are reported together.
    ///
    /// # Arguments
    ///
    /// * `technologies` - All the DERs at the site
    /// * `max_import` - Maximum power which may be imported from the grid, in kW
    /// * `max_export` - Maximum power which may be exported to the grid, in kW
    pub fn new(
        technologies: Vec<Technology>,
        max_import: Option<f64>,
        max_export: Option<f64>,
    ) -> Result<Self, ModelError> {
        check_unique_ids(&technologies)?;
        let is_sizing_optimization = technologies.iter().any(Technology::being_sized);
        if is_sizing_optimization {
            check_sizing(&technologies)?;
        }

        Ok(Self {
            site_steam_load: first_site_load(&technologies, "steam", Technology::site_steam_load),
            site_hotwater_load: first_site_load(
                &technologies,
                "hot water",
                Technology::site_hotwater_load,
            ),
            site_cooling_load: first_site_load(
                &technologies,
                "cooling",
                Technology::site_cooling_load,
            ),
            active: (0..technologies.len()).collect(),
            technologies,
            is_sizing_optimization,
            max_import,
            max_export,
        })
    }

    /// Whether any technology's capacity is chosen by the optimisation
    pub fn is_sizing_optimization(&self) -> bool {
        self.is_sizing_optimization
    }

    /// All the technologies at the site
    pub fn technologies(&self) -> &[Technology] {
        &self.technologies
    }

    /// The site steam load, in kW
    pub fn site_steam_load(&self) -> Option<&TimeSeries> {
        self.site_steam_load.as_ref()
    }

    /// The site hot water load, in kW
    pub fn site_hotwater_load(&self) -> Option<&TimeSeries> {
        self.site_hotwater_load.as_ref()
    }

    /// The site cooling load, in kW
    pub fn site_cooling_load(&self) -> Option<&TimeSeries> {
        self.site_cooling_load.as_ref()
    }

    /// Whether any technology being sized has no upper bound on its power
    pub fn is_any_sizable_der_missing_power_max(&self) -> bool {
        self.technologies
            .iter()
            .any(|tech| tech.being_sized() && !tech.max_power_defined())
    }

    /// Choose the technologies which are in service in `year`
    pub fn select_active_technologies(&mut self, year: i32) {
        self.active = self
            .technologies
            .iter()
            .enumerate()
            .filter(|(_, tech)| tech.operational(year))
            .map(|(i, _)| i)
            .collect();
    }

    /// The technologies in service for the current window
    pub fn active_technologies(&self) -> impl Iterator<Item = &Technology> {
        self.active.iter().map(|i| &self.technologies[*i])
    }

    /// Create the decision variables of every active technology for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, mask: &Mask) {
        for i in &self.active {
            self.technologies[*i].initialize_variables(pool, mask);
        }
    }

    /// Sum the contributions of the active technologies.
    ///
    /// Heat and cooling recovered by a technology is only included if the matching site load has
    /// been declared.
    pub fn aggregate_system_state(&self, mask: &Mask) -> SystemState {
        let mut state = SystemState::zeros(mask.count());
        for tech in self.active_technologies() {
            tech.add_to_system_state(mask, &mut state);
            let id = tech.unique_tech_id();

            if tech.is_hot() {
                if self.site_steam_load.is_none() && self.site_hotwater_load.is_none() {
                    warn!(
                        "A heat source technology is active ({id}), but no site steam or hot \
                        water load is defined. Any recovered heat will be ignored."
                    );
                } else {
                    if self.site_steam_load.is_some()
                        && let Some(steam) = tech.recovered_steam(mask)
                    {
                        debug!("Adding heat (steam) recovered from {id}");
                        state.steam += &steam;
                    }
                    if self.site_hotwater_load.is_some()
                        && let Some(hotwater) = tech.recovered_hotwater(mask)
                    {
                        debug!("Adding heat (hot water) recovered from {id}");
                        state.hotwater += &hotwater;
                    }
                }
            }
            if tech.is_cold() {
                match (&self.site_cooling_load, tech.recovered_cold(mask)) {
                    (Some(_), Some(cold)) => {
                        debug!("Adding cold recovered from {id}");
                        state.cold += &cold;
                    }
                    _ => warn!(
                        "A cold source technology is active ({id}), but no site cooling load is \
                        defined. Any cooling produced will be ignored."
                    ),
                }
            }
        }
        state
    }

    /// Build the POI's constraints for one window.
    ///
    /// A thermal balance constraint is only added for a channel if its site load is defined and the
    /// supply depends on at least one decision variable.
    ///
    /// # Arguments
    ///
    /// * `mask` - The rows of the time index in the current window
    /// * `power_in` - Power flowing from the DERs into the POI
    /// * `power_out` - Power flowing out of the POI to loads and charging
    /// * `steam_in` - Recovered steam
    /// * `hotwater_in` - Recovered hot water
    /// * `cold_in` - Cooling
    /// * `annuity_scalar` - Multiplier projecting one year's costs over the project lifetime
    #[allow(clippy::too_many_arguments)]
    pub fn build_optimization_problem(
        &self,
        mask: &Mask,
        power_in: &ExprSeries,
        power_out: &ExprSeries,
        steam_in: &ExprSeries,
        hotwater_in: &ExprSeries,
        cold_in: &ExprSeries,
        _annuity_scalar: f64,
    ) -> (ObjectiveTerms, Vec<Constraint>) {
        let mut constraints = Vec::new();

        let net_import = power_out.clone() - power_in;
        if net_import.has_variables() {
            if let Some(max_import) = self.max_import {
                constraints.push(Constraint::non_positive(
                    "max import",
                    net_import.iter().map(|p| p.clone() - max_import).collect::<ExprSeries>(),
                ));
            }
            if let Some(max_export) = self.max_export {
                constraints.push(Constraint::non_positive(
                    "max export",
                    net_import.iter().map(|p| -p.clone() - max_export).collect::<ExprSeries>(),
                ));
            }
        }

        let channels = [
            ("steam", &self.site_steam_load, steam_in),
            ("hot water", &self.site_hotwater_load, hotwater_in),
            ("cooling", &self.site_cooling_load, cold_in),
        ];
        for (channel, site_load, supply) in channels {
            if let Some(site_load) = site_load
                && supply.has_variables()
            {
                debug!("Adding {channel} thermal balance constraint");
                let load = ExprSeries::from_values(&site_load.masked(mask));
                constraints.push(Constraint::non_positive(
                    format!("{channel} thermal balance"),
                    load - supply,
                ));
            }
        }

        (ObjectiveTerms::new(), constraints)
    }

    /// Constraints local to each active technology
    pub fn technology_constraints(&self, mask: &Mask) -> Vec<Constraint> {
        self.active_technologies()
            .flat_map(|tech| tech.constraints(mask))
            .collect()
    }

    /// The cost terms of all active technologies, combined
    pub fn technology_objective(&self, mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        self.active_technologies()
            .map(|tech| tech.objective_terms(mask, annuity_scalar))
            .fold(ObjectiveTerms::new(), merge_objective_terms)
    }

    /// Store the optimal values of every active technology
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        for i in &self.active {
            self.technologies[*i].record_solution(mask, solution);
        }
    }

    /// Apply the storage capacity needed for deferral to the first battery.
    ///
    /// If deferral is the only value stream, the battery's ratings are set to the requirement.
    /// Otherwise the requirement becomes a floor on the sizes the optimisation may choose, and it
    /// is a configuration error for a rating to be unable to reach its floor.
    pub fn resolve_minimum_size(
        &mut self,
        value_streams: &[ValueStream],
        start_year: i32,
    ) -> Result<(), ModelError> {
        let Some(deferral) = value_streams.iter().find_map(|stream| match stream {
            ValueStream::Deferral(deferral) => Some(deferral),
            _ => None,
        }) else {
            return Ok(());
        };

        let last_year = deferral.last_year_to_defer(start_year);
        let requirement = deferral.requirements.get(&last_year).ok_or_else(|| {
            ModelError::configuration(format!(
                "No deferral requirement given for {last_year}, the last year to defer"
            ))
        })?;
        let (id, battery) = self
            .technologies
            .iter_mut()
            .find_map(|tech| {
                let id = tech.unique_tech_id();
                match tech {
                    Technology::Battery(battery) => Some((id, battery)),
                    _ => None,
                }
            })
            .ok_or_else(|| {
                ModelError::configuration("Deferral requires an energy storage system")
            })?;

        let min_power = requirement.power.value();
        let min_energy = requirement.energy.value();
        if value_streams.len() > 1 {
            let errors: Vec<_> = [
                (RatedQuantity::Energy, min_energy),
                (RatedQuantity::Charge, min_power),
                (RatedQuantity::Discharge, min_power),
            ]
            .into_iter()
            .filter_map(|(quantity, min)| battery.add_size_floor(quantity, min).err())
            .map(|err| format!("{id}: {err}"))
            .collect();
            if !errors.is_empty() {
                return Err(ModelError::Configuration(errors));
            }
        } else {
            battery.set_rated(RatedQuantity::Charge, min_power);
            battery.set_rated(RatedQuantity::Discharge, min_power);
            battery.set_rated(RatedQuantity::Energy, min_energy);
        }

        Ok(())
    }

    /// Whether sizing storage power with the binary formulation would make the problem non-convex
    pub fn detect_nonconvex_sizing_conflict(&self, is_binary_formulation: bool) -> bool {
        is_binary_formulation
            && self
                .technologies
                .iter()
                .any(|tech| matches!(tech, Technology::Battery(_)) && tech.is_power_sizing())
    }

    /// The capacity outcome for every technology
    pub fn sizing_summary(&self) -> SizingTable {
        self.technologies
            .iter()
            .map(Technology::sizing_summary)
            .collect()
    }

    /// Merge every technology's results into one time series table and one monthly table.
    ///
    /// System-wide totals are only calculated for dispatch optimisations.
    pub fn merge_reports(
        &self,
        is_dispatch_opt: bool,
        index: &TimeIndex,
    ) -> (TimeSeriesTable, MonthlyTable) {
        let mut results = TimeSeriesTable::new(index);
        let mut monthly = MonthlyTable::new(index);
        let mut totals = ReportTotals::new(index.len());

        for tech in &self.technologies {
            results.extend(tech.timeseries_report(index));
            if is_dispatch_opt {
                tech.accumulate_totals(&mut totals);
            }
            monthly.extend(tech.monthly_report(index));
        }

        let original_load = totals.original_load.into_values();
        let load = totals.load.into_values();
        let generation = totals.generation.into_values();
        let storage_power = totals.storage_power.into_values();
        let net_load = net_load(&load, &generation, &storage_power);

        let load_shifted = original_load
            .iter()
            .zip(&load)
            .any(|(original, load)| original != load && !(original.is_nan() && load.is_nan()));
        if load_shifted {
            results.insert(TOTAL_ORIGINAL_LOAD, original_load);
        }
        results.insert(TOTAL_LOAD, load);
        results.insert(TOTAL_GENERATION, generation);
        results.insert(TOTAL_STORAGE_POWER, storage_power);
        results.insert(
            AGGREGATED_STATE_OF_ENERGY,
            totals.state_of_energy.into_values(),
        );
        results.insert(NET_LOAD, net_load);

        (results, monthly)
    }
}

/// Net load at each time step: total load minus total generation minus storage power
fn net_load(load: &[f64], generation: &[f64], storage_power: &[f64]) -> Vec<f64> {
    load.iter()
        .zip(generation)
        .zip(storage_power)
        .map(|((load, generation), storage)| load - generation - storage)
        .collect()
}

/// Check that no two technologies share an id, as the ids label their results
fn check_unique_ids(technologies: &[Technology]) -> Result<(), ModelError> {
    let errors: Vec<_> = technologies
        .iter()
        .map(Technology::unique_tech_id)
        .duplicates()
        .map(|id| format!("{id} is declared more than once"))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Configuration(errors))
    }
}

/// Check the sizing configuration of every technology, reporting every problem at once
fn check_sizing(technologies: &[Technology]) -> Result<(), ModelError> {
    let errors: Vec<_> = technologies
        .iter()
        .flat_map(|tech| {
            let id = tech.unique_tech_id();
            tech.sizing_errors()
                .into_iter()
                .map(move |err| format!("{id}: {err}"))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Configuration(errors))
    }
}
