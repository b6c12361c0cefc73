//! Distributed energy resources (DERs) and their part in each window's optimisation problem.
//!
//! The set of technologies is closed: every DER is one variant of [`Technology`]. Each variant owns
//! its decision variables for the current window, builds its own constraints and cost terms, and
//! records its optimal dispatch once a window has been solved.
use crate::optimisation::{Constraint, ExprSeries, ObjectiveTerms, Solution, VariablePool};
use crate::poi::SystemState;
use crate::report::{MonthlyTable, ReportTotals, SizingRow, TimeSeriesTable};
use crate::time_series::{Mask, TimeIndex, TimeSeries};
use serde::Deserialize;
use strum::Display;

pub mod battery;
pub mod chiller;
pub mod chp;
pub mod electric_vehicle;
pub mod generator;
pub mod load;
pub mod pv;
pub mod rating;

use battery::Battery;
use chiller::Chiller;
use chp::Chp;
use electric_vehicle::ElectricVehicle;
use generator::Generator;
use load::{ControllableLoad, Load};
use pv::Pv;

/// Objective terms whose label ends with this are one-off capital costs
pub const CAPITAL_COST_SUFFIX: &str = "Capital Cost";
/// Objective terms whose label ends with this are charged once per year
pub const FIXED_OM_SUFFIX: &str = "Fixed O&M Cost";

/// The broad category a technology belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TechnologyType {
    /// Stationary storage
    #[strum(to_string = "Energy Storage System")]
    EnergyStorageSystem,
    /// Generation following a weather-driven profile
    #[strum(to_string = "Intermittent Resource")]
    IntermittentResource,
    /// Electric vehicles charged at the site
    #[strum(to_string = "Electric Vehicle")]
    ElectricVehicle,
    /// Site electric loads
    Load,
    /// Dispatchable generation
    Generator,
    /// Heating or cooling plant
    Thermal,
}

/// The years in which a technology is in service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Lifecycle {
    /// First year of operation (in service from the start if absent)
    pub operation_year: Option<i32>,
    /// Last year of operation (never retired if absent)
    pub end_year: Option<i32>,
}

impl Lifecycle {
    /// Whether the technology is in service in `year`
    pub fn operational(&self, year: i32) -> bool {
        self.operation_year.is_none_or(|first| year >= first)
            && self.end_year.is_none_or(|last| year <= last)
    }
}

/// A distributed energy resource at the site
#[derive(Debug, Clone, PartialEq)]
pub enum Technology {
    /// A fixed site load
    Load(Load),
    /// A site load which can be shifted in time
    ControllableLoad(ControllableLoad),
    /// Solar photovoltaics
    Pv(Pv),
    /// A combustion turbine or internal combustion engine
    Generator(Generator),
    /// Combined heat and power
    Chp(Chp),
    /// Battery energy storage
    Battery(Battery),
    /// A fleet of electric vehicles charged at the site
    ElectricVehicle(ElectricVehicle),
    /// An electric chiller
    Chiller(Chiller),
}

impl Technology {
    /// The short tag identifying the kind of technology (e.g. `CHP`)
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Load(_) => "Load",
            Self::ControllableLoad(_) => "ControllableLoad",
            Self::Pv(_) => "PV",
            Self::Generator(generator) => generator.kind.tag(),
            Self::Chp(_) => "CHP",
            Self::Battery(_) => "Battery",
            Self::ElectricVehicle(_) => "ElectricVehicle1",
            Self::Chiller(_) => "Chiller",
        }
    }

    /// The user-provided name
    pub fn name(&self) -> &str {
        match self {
            Self::Load(load) => &load.name,
            Self::ControllableLoad(load) => &load.name,
            Self::Pv(pv) => &pv.name,
            Self::Generator(generator) => generator.core.name(),
            Self::Chp(chp) => chp.generator.name(),
            Self::Battery(battery) => &battery.name,
            Self::ElectricVehicle(ev) => &ev.name,
            Self::Chiller(chiller) => &chiller.name,
        }
    }

    /// The category of this technology
    pub fn technology_type(&self) -> TechnologyType {
        match self {
            Self::Load(_) | Self::ControllableLoad(_) => TechnologyType::Load,
            Self::Pv(_) => TechnologyType::IntermittentResource,
            Self::Generator(_) | Self::Chp(_) => TechnologyType::Generator,
            Self::Battery(_) => TechnologyType::EnergyStorageSystem,
            Self::ElectricVehicle(_) => TechnologyType::ElectricVehicle,
            Self::Chiller(_) => TechnologyType::Thermal,
        }
    }

    /// An identifier which is unique across all the technologies in a scenario
    pub fn unique_tech_id(&self) -> String {
        format!("{}: {}", self.tag().to_uppercase(), self.name())
    }

    fn lifecycle(&self) -> &Lifecycle {
        match self {
            Self::Load(load) => &load.lifecycle,
            Self::ControllableLoad(load) => &load.lifecycle,
            Self::Pv(pv) => &pv.lifecycle,
            Self::Generator(generator) => &generator.lifecycle,
            Self::Chp(chp) => &chp.lifecycle,
            Self::Battery(battery) => &battery.lifecycle,
            Self::ElectricVehicle(ev) => &ev.lifecycle,
            Self::Chiller(chiller) => &chiller.lifecycle,
        }
    }

    /// Whether the technology is in service in `year`
    pub fn operational(&self, year: i32) -> bool {
        self.lifecycle().operational(year)
    }

    /// Whether the technology recovers heat
    pub fn is_hot(&self) -> bool {
        matches!(self, Self::Chp(_))
    }

    /// Whether the technology produces cooling
    pub fn is_cold(&self) -> bool {
        matches!(self, Self::Chiller(_))
    }

    /// Whether any of the technology's capacities are chosen by the optimisation
    pub fn being_sized(&self) -> bool {
        match self {
            Self::Load(_) | Self::ControllableLoad(_) | Self::ElectricVehicle(_) => false,
            Self::Pv(pv) => pv.rated_capacity.is_sized(),
            Self::Generator(generator) => generator.core.being_sized(),
            Self::Chp(chp) => chp.generator.being_sized(),
            Self::Battery(battery) => battery.being_sized(),
            Self::Chiller(chiller) => chiller.rated_cold.is_sized(),
        }
    }

    /// Whether the technology's power rating is chosen by the optimisation
    pub fn is_power_sizing(&self) -> bool {
        match self {
            Self::Battery(battery) => battery.is_power_sizing(),
            _ => self.being_sized(),
        }
    }

    /// Whether the technology's power rating has a finite upper bound
    pub fn max_power_defined(&self) -> bool {
        match self {
            Self::Load(_) | Self::ControllableLoad(_) | Self::ElectricVehicle(_) => true,
            Self::Pv(pv) => pv.rated_capacity.max_defined(),
            Self::Generator(generator) => generator.core.rated_power().max_defined(),
            Self::Chp(chp) => chp.generator.rated_power().max_defined(),
            Self::Battery(battery) => battery.max_power_defined(),
            Self::Chiller(chiller) => chiller.rated_cold.max_defined(),
        }
    }

    /// Problems with the sizing configuration of this technology
    pub fn sizing_errors(&self) -> Vec<String> {
        match self {
            Self::Load(_) | Self::ControllableLoad(_) | Self::ElectricVehicle(_) => Vec::new(),
            Self::Pv(pv) => pv.sizing_errors(),
            Self::Generator(generator) => generator.core.sizing_errors(),
            Self::Chp(chp) => chp.generator.sizing_errors(),
            Self::Battery(battery) => battery.sizing_errors(),
            Self::Chiller(chiller) => chiller.sizing_errors(),
        }
    }

    /// The site steam load declared by this technology, in kW
    pub fn site_steam_load(&self) -> Option<&TimeSeries> {
        match self {
            Self::Chp(chp) => chp.thermal.site_steam_load.as_ref(),
            _ => None,
        }
    }

    /// The site hot water load declared by this technology, in kW
    pub fn site_hotwater_load(&self) -> Option<&TimeSeries> {
        match self {
            Self::Chp(chp) => chp.thermal.site_hotwater_load.as_ref(),
            _ => None,
        }
    }

    /// The site cooling load declared by this technology, in kW
    pub fn site_cooling_load(&self) -> Option<&TimeSeries> {
        match self {
            Self::Chiller(chiller) => chiller.site_cooling_load.as_ref(),
            _ => None,
        }
    }

    /// Steam recovered by this technology, if it is a heat source
    pub fn recovered_steam(&self, _mask: &Mask) -> Option<ExprSeries> {
        match self {
            Self::Chp(chp) => Some(chp.recovered_steam()),
            _ => None,
        }
    }

    /// Hot water recovered by this technology, if it is a heat source
    pub fn recovered_hotwater(&self, _mask: &Mask) -> Option<ExprSeries> {
        match self {
            Self::Chp(chp) => Some(chp.recovered_hotwater()),
            _ => None,
        }
    }

    /// Cooling produced by this technology, if it is a cold source
    pub fn recovered_cold(&self, _mask: &Mask) -> Option<ExprSeries> {
        match self {
            Self::Chiller(chiller) => Some(chiller.cold()),
            _ => None,
        }
    }

    /// Create the decision variables for a new window of `size` time steps
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, mask: &Mask) {
        let size = mask.count();
        match self {
            Self::Load(_) => {}
            Self::ControllableLoad(load) => load.initialize_variables(pool, size),
            Self::Pv(pv) => pv.initialize_variables(pool, size),
            Self::Generator(generator) => generator.core.initialize_variables(pool, size),
            Self::Chp(chp) => chp.initialize_variables(pool, size),
            Self::Battery(battery) => battery.initialize_variables(pool, size),
            Self::ElectricVehicle(ev) => ev.initialize_variables(pool, size),
            Self::Chiller(chiller) => chiller.initialize_variables(pool, size),
        }
    }

    /// Add this technology's electrical flows to the state of the system
    pub fn add_to_system_state(&self, mask: &Mask, state: &mut SystemState) {
        match self {
            Self::Load(load) => {
                let series = ExprSeries::from_values(&load.load.masked(mask));
                state.load += &series;
                state.power_out += &series;
            }
            Self::ControllableLoad(load) => {
                let series = load.load(mask);
                state.load += &series;
                state.power_out += &series;
            }
            Self::Pv(pv) => {
                let generation = pv.generation(mask);
                state.variable_generation += &generation;
                state.power_in += &generation;
            }
            Self::Generator(generator) => {
                let generation = generator.core.generation();
                state.generation += &generation;
                state.power_in += &generation;
            }
            Self::Chp(chp) => {
                let generation = chp.generator.generation();
                state.generation += &generation;
                state.power_in += &generation;
            }
            Self::Battery(battery) => {
                let (charge, discharge) = (battery.charge(), battery.discharge());
                state.storage_power += &(discharge.clone() - &charge);
                state.state_of_energy += &battery.energy();
                state.power_in += &discharge;
                state.power_out += &charge;
            }
            Self::ElectricVehicle(ev) => {
                let charge = ev.charge();
                state.load += &charge;
                state.state_of_energy += &ev.energy();
                state.power_out += &charge;
            }
            Self::Chiller(chiller) => {
                let consumption = chiller.electric_consumption();
                state.load += &consumption;
                state.power_out += &consumption;
            }
        }
    }

    /// Constraints local to this technology for the current window
    pub fn constraints(&self, mask: &Mask) -> Vec<Constraint> {
        match self {
            Self::Load(_) => Vec::new(),
            Self::ControllableLoad(load) => load.constraints(mask),
            Self::Pv(pv) => pv.constraints(mask),
            Self::Generator(generator) => generator.core.constraints(mask),
            Self::Chp(chp) => chp.constraints(mask),
            Self::Battery(battery) => battery.constraints(mask),
            Self::ElectricVehicle(ev) => ev.constraints(mask),
            Self::Chiller(chiller) => chiller.constraints(mask),
        }
    }

    /// Cost terms for the current window, labelled by what each cost represents
    pub fn objective_terms(&self, mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        match self {
            Self::Load(_) | Self::ElectricVehicle(_) => ObjectiveTerms::new(),
            Self::ControllableLoad(load) => load.objective_terms(mask, annuity_scalar),
            Self::Pv(pv) => pv.objective_terms(mask, annuity_scalar),
            Self::Generator(generator) => generator.core.objective_terms(mask, annuity_scalar),
            Self::Chp(chp) => chp.objective_terms(mask, annuity_scalar),
            Self::Battery(battery) => battery.objective_terms(mask, annuity_scalar),
            Self::Chiller(chiller) => chiller.objective_terms(mask, annuity_scalar),
        }
    }

    /// Store the optimal values for the window selected by `mask`
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        match self {
            Self::Load(_) => {}
            Self::ControllableLoad(load) => load.record_solution(mask, solution),
            Self::Pv(pv) => pv.record_solution(mask, solution),
            Self::Generator(generator) => generator.core.record_solution(mask, solution),
            Self::Chp(chp) => chp.record_solution(mask, solution),
            Self::Battery(battery) => battery.record_solution(mask, solution),
            Self::ElectricVehicle(ev) => ev.record_solution(mask, solution),
            Self::Chiller(chiller) => chiller.record_solution(mask, solution),
        }
    }

    /// This technology's results as a time series table
    pub fn timeseries_report(&self, index: &TimeIndex) -> TimeSeriesTable {
        let id = self.unique_tech_id();
        let mut report = TimeSeriesTable::new(index);
        match self {
            Self::Load(load) => load.add_timeseries_columns(&id, &mut report),
            Self::ControllableLoad(load) => load.add_timeseries_columns(&id, &mut report),
            Self::Pv(pv) => pv.add_timeseries_columns(&id, &mut report),
            Self::Generator(generator) => generator.core.add_timeseries_columns(&id, &mut report),
            Self::Chp(chp) => chp.add_timeseries_columns(&id, &mut report),
            Self::Battery(battery) => battery.add_timeseries_columns(&id, &mut report),
            Self::ElectricVehicle(ev) => ev.add_timeseries_columns(&id, &mut report),
            Self::Chiller(chiller) => chiller.add_timeseries_columns(&id, &mut report),
        }
        report
    }

    /// This technology's results summed by month
    pub fn monthly_report(&self, index: &TimeIndex) -> MonthlyTable {
        let id = self.unique_tech_id();
        let mut report = MonthlyTable::new(index);
        match self {
            Self::Generator(generator) => generator.core.add_monthly_columns(&id, index, &mut report),
            Self::Chp(chp) => chp.generator.add_monthly_columns(&id, index, &mut report),
            Self::Pv(pv) => pv.add_monthly_columns(&id, index, &mut report),
            Self::Battery(battery) => battery.add_monthly_columns(&id, index, &mut report),
            _ => {}
        }
        report
    }

    /// Add this technology's results to the system-wide totals
    pub fn accumulate_totals(&self, totals: &mut ReportTotals) {
        let len = totals.len();
        match self {
            Self::Load(load) => {
                totals.original_load.add(load.load.values());
                totals.load.add(load.load.values());
            }
            Self::ControllableLoad(load) => {
                totals.original_load.add(load.original_load.values());
                totals.load.add(&load.load_results(len));
            }
            Self::Pv(pv) => totals.generation.add(&pv.generation_results(len)),
            Self::Generator(generator) => {
                totals.generation.add(&generator.core.elec_results(len));
            }
            Self::Chp(chp) => totals.generation.add(&chp.generator.elec_results(len)),
            Self::Battery(battery) => {
                totals.storage_power.add(&battery.power_results(len));
                totals.state_of_energy.add(&battery.energy_results(len));
            }
            Self::ElectricVehicle(ev) => {
                totals.load.add(&ev.charge_results(len));
                totals.state_of_energy.add(&ev.energy_results(len));
            }
            Self::Chiller(chiller) => {
                let consumption = chiller.consumption_results(len);
                totals.original_load.add(&consumption);
                totals.load.add(&consumption);
            }
        }
    }

    /// The capacity outcome for this technology
    pub fn sizing_summary(&self) -> SizingRow {
        let mut row = SizingRow::new(self.unique_tech_id(), self.technology_type());
        match self {
            Self::Load(_) | Self::ControllableLoad(_) => {}
            Self::Pv(pv) => row.set_power(&pv.rated_capacity),
            Self::Generator(generator) => row.set_power(generator.core.rated_power()),
            Self::Chp(chp) => row.set_power(chp.generator.rated_power()),
            Self::Battery(battery) => {
                row.set_power(&battery.dis_max_rated);
                row.energy_capacity = battery.ene_max_rated.value();
            }
            Self::ElectricVehicle(ev) => {
                row.power_capacity = Some(ev.ch_max_rated);
                row.energy_capacity = Some(ev.ene_target);
            }
            Self::Chiller(chiller) => row.set_power(&chiller.rated_cold),
        }
        row
    }
}

/// Write the values for one window into the rows of a full-length result series.
///
/// The result series is created (filled with NaN) the first time a window is recorded.
pub fn record_series(target: &mut Vec<f64>, mask: &Mask, values: Vec<f64>) {
    if target.len() != mask.len() {
        *target = vec![f64::NAN; mask.len()];
    }
    for (row, value) in mask.rows().zip(values) {
        target[row] = value;
    }
}

/// A full-length result column, or NaN everywhere if no window has been recorded
pub fn result_column(values: &[f64], len: usize) -> Vec<f64> {
    if values.len() == len {
        values.to_vec()
    } else {
        vec![f64::NAN; len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, chp};
    use rstest::rstest;

    #[rstest]
    #[case(Lifecycle::default(), 2017, true)]
    #[case(Lifecycle { operation_year: Some(2018), end_year: None }, 2017, false)]
    #[case(Lifecycle { operation_year: Some(2016), end_year: Some(2017) }, 2017, true)]
    #[case(Lifecycle { operation_year: None, end_year: Some(2016) }, 2017, false)]
    fn test_operational(#[case] lifecycle: Lifecycle, #[case] year: i32, #[case] expected: bool) {
        assert_eq!(lifecycle.operational(year), expected);
    }

    #[rstest]
    fn test_unique_tech_id(chp: Chp) {
        let technology = Technology::Chp(chp);
        assert_eq!(technology.unique_tech_id(), "CHP: chp1");
        assert_eq!(technology.technology_type().to_string(), "Generator");
        assert!(technology.is_hot());
        assert!(!technology.is_cold());
    }

    #[rstest]
    fn test_battery_type(battery: Battery) {
        let technology = Technology::Battery(battery);
        assert_eq!(technology.tag(), "Battery");
        assert_eq!(
            technology.technology_type().to_string(),
            "Energy Storage System"
        );
        assert!(technology.recovered_steam(&Mask::all(1)).is_none());
    }

    #[test]
    fn test_record_series() {
        let mut target = Vec::new();
        record_series(&mut target, &Mask::new(vec![false, true, true]), vec![1.0, 2.0]);
        assert!(target[0].is_nan());
        assert_eq!(target[1..], [1.0, 2.0]);
        assert!(result_column(&[], 2).iter().all(|v| v.is_nan()));
    }
}
