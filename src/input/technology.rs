//! Code for reading technology definitions from `[[technologies]]` tables.
//!
//! Each table is tagged with a `type` field naming the kind of DER. A capacity is fixed if its
//! value is given, otherwise it is sized within the optional `_min` and `_max` bounds.
use super::deserialise_proportion;
use super::time_series::TimeSeriesData;
use crate::technology::battery::{Battery, BatteryParams};
use crate::technology::chiller::Chiller;
use crate::technology::chp::{Chp, ChpThermal};
use crate::technology::electric_vehicle::{ElectricVehicle, ElectricVehicleParams};
use crate::technology::generator::{Generator, GeneratorCore, GeneratorKind, GeneratorParams};
use crate::technology::load::{ControllableLoad, Load};
use crate::technology::pv::Pv;
use crate::technology::rating::{RatedCapacity, Rating};
use crate::technology::{Lifecycle, Technology};
use crate::units::{MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear};
use anyhow::{Context, Result};
use serde::Deserialize;

fn rated(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> RatedCapacity {
    RatedCapacity::new(Rating::from_params(value, min, max))
}

fn default_soc_target() -> f64 {
    0.5
}

fn default_ulsoc() -> f64 {
    1.0
}

/// A fixed site load
#[derive(Debug, Deserialize, PartialEq)]
pub struct LoadRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    load_column: String,
}

/// A site load which can be shifted
#[derive(Debug, Deserialize, PartialEq)]
pub struct ControllableLoadRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    load_column: String,
    power_rating: f64,
}

/// A solar PV system
#[derive(Debug, Deserialize, PartialEq)]
pub struct PvRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    rated_capacity: Option<f64>,
    rated_capacity_min: Option<f64>,
    rated_capacity_max: Option<f64>,
    profile_column: String,
    #[serde(default)]
    curtail: bool,
    #[serde(default)]
    capital_cost: MoneyPerPower,
    #[serde(default)]
    fixed_om: MoneyPerPowerPerYear,
}

/// A fuel-burning generator
#[derive(Debug, Deserialize, PartialEq)]
pub struct GeneratorRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    rated_power: Option<f64>,
    rated_power_min: Option<f64>,
    rated_power_max: Option<f64>,
    #[serde(default)]
    min_power: f64,
    ramp_rate: Option<f64>,
    fuel_cost: f64,
    heat_rate: f64,
    #[serde(default)]
    variable_om: MoneyPerEnergy,
    #[serde(default)]
    fixed_om: MoneyPerPowerPerYear,
    #[serde(default)]
    capital_cost: MoneyPerPower,
}

impl GeneratorRaw {
    fn into_core(self, binary: bool, dt: f64) -> Result<(Lifecycle, GeneratorCore)> {
        let params = GeneratorParams {
            rated_power: rated(self.rated_power, self.rated_power_min, self.rated_power_max),
            min_power: self.min_power,
            ramp_rate: self.ramp_rate,
            fuel_cost: self.fuel_cost,
            heat_rate: self.heat_rate,
            variable_om: self.variable_om,
            fixed_om: self.fixed_om,
            capital_cost: self.capital_cost,
        };
        let core = GeneratorCore::new(&self.name, params, binary, dt)?;
        Ok((self.lifecycle, core))
    }
}

/// A combined heat and power unit
#[derive(Debug, Deserialize, PartialEq)]
pub struct ChpRaw {
    #[serde(flatten)]
    generator: GeneratorRaw,
    electric_heat_ratio: f64,
    max_steam_ratio: f64,
    site_steam_load_column: Option<String>,
    site_hotwater_load_column: Option<String>,
}

/// A battery energy storage system
#[derive(Debug, Deserialize, PartialEq)]
pub struct BatteryRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    charge_power: Option<f64>,
    charge_power_min: Option<f64>,
    charge_power_max: Option<f64>,
    discharge_power: Option<f64>,
    discharge_power_min: Option<f64>,
    discharge_power_max: Option<f64>,
    energy_capacity: Option<f64>,
    energy_capacity_min: Option<f64>,
    energy_capacity_max: Option<f64>,
    #[serde(deserialize_with = "deserialise_proportion")]
    rte: f64,
    #[serde(default, deserialize_with = "deserialise_proportion")]
    llsoc: f64,
    #[serde(default = "default_ulsoc", deserialize_with = "deserialise_proportion")]
    ulsoc: f64,
    #[serde(
        default = "default_soc_target",
        deserialize_with = "deserialise_proportion"
    )]
    soc_target: f64,
    #[serde(default)]
    capital_cost_power: MoneyPerPower,
    #[serde(default)]
    capital_cost_energy: MoneyPerEnergy,
    #[serde(default)]
    fixed_om: MoneyPerPowerPerYear,
    #[serde(default)]
    variable_om: MoneyPerEnergy,
}

/// An electric vehicle which charges while plugged in at the site
#[derive(Debug, Deserialize, PartialEq)]
pub struct ElectricVehicleRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    ch_max_rated: f64,
    ene_target: f64,
    plugin_time: u32,
    plugout_time: u32,
}

/// An electric chiller
#[derive(Debug, Deserialize, PartialEq)]
pub struct ChillerRaw {
    name: String,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    rated_cooling: Option<f64>,
    rated_cooling_min: Option<f64>,
    rated_cooling_max: Option<f64>,
    cop: f64,
    site_cooling_load_column: Option<String>,
    #[serde(default)]
    capital_cost: MoneyPerPower,
    #[serde(default)]
    fixed_om: MoneyPerPowerPerYear,
}

/// One `[[technologies]]` table
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TechnologyRaw {
    /// A fixed site load
    Load(LoadRaw),
    /// A site load which can be shifted
    ControllableLoad(ControllableLoadRaw),
    /// A solar PV system
    #[serde(rename = "PV")]
    Pv(PvRaw),
    /// A combustion turbine
    #[serde(rename = "CT")]
    CombustionTurbine(GeneratorRaw),
    /// A reciprocating internal combustion engine
    #[serde(rename = "ICE")]
    InternalCombustionEngine(GeneratorRaw),
    /// A combined heat and power unit
    #[serde(rename = "CHP")]
    Chp(ChpRaw),
    /// A battery
    Battery(BatteryRaw),
    /// An electric vehicle
    ElectricVehicle(ElectricVehicleRaw),
    /// An electric chiller
    Chiller(ChillerRaw),
}

impl TechnologyRaw {
    /// A label for error messages
    pub fn label(&self) -> String {
        let (kind, name) = match self {
            Self::Load(raw) => ("Load", &raw.name),
            Self::ControllableLoad(raw) => ("ControllableLoad", &raw.name),
            Self::Pv(raw) => ("PV", &raw.name),
            Self::CombustionTurbine(raw) => ("CT", &raw.name),
            Self::InternalCombustionEngine(raw) => ("ICE", &raw.name),
            Self::Chp(raw) => ("CHP", &raw.generator.name),
            Self::Battery(raw) => ("Battery", &raw.name),
            Self::ElectricVehicle(raw) => ("ElectricVehicle", &raw.name),
            Self::Chiller(raw) => ("Chiller", &raw.name),
        };
        format!("{kind} '{name}'")
    }

    /// Build the technology, looking up its time series in `data`.
    ///
    /// # Arguments
    ///
    /// * `data` - Time series for the optimisation years
    /// * `binary` - Whether to use the binary formulation where a technology supports it
    pub fn into_technology(self, data: &TimeSeriesData, binary: bool) -> Result<Technology> {
        let dt = data.index().dt();
        let technology = match self {
            Self::Load(raw) => Technology::Load(Load {
                name: raw.name,
                lifecycle: raw.lifecycle,
                load: data.column(&raw.load_column)?,
            }),
            Self::ControllableLoad(raw) => Technology::ControllableLoad(ControllableLoad::new(
                &raw.name,
                raw.lifecycle,
                data.column(&raw.load_column)?,
                raw.power_rating,
            )?),
            Self::Pv(raw) => {
                let mut pv = Pv::new(
                    &raw.name,
                    raw.lifecycle,
                    rated(
                        raw.rated_capacity,
                        raw.rated_capacity_min,
                        raw.rated_capacity_max,
                    ),
                    data.column(&raw.profile_column)?,
                    raw.curtail,
                );
                pv.capital_cost = raw.capital_cost;
                pv.fixed_om = raw.fixed_om;
                Technology::Pv(pv)
            }
            Self::CombustionTurbine(raw) => {
                generator(GeneratorKind::CombustionTurbine, raw, binary, dt)?
            }
            Self::InternalCombustionEngine(raw) => {
                generator(GeneratorKind::InternalCombustionEngine, raw, binary, dt)?
            }
            Self::Chp(raw) => {
                raw.generator
                    .ramp_rate
                    .context("ramp_rate is required for a CHP unit")?;
                let thermal = ChpThermal::new(
                    raw.electric_heat_ratio,
                    raw.max_steam_ratio,
                    data.thermal_load(raw.site_steam_load_column.as_deref())?,
                    data.thermal_load(raw.site_hotwater_load_column.as_deref())?,
                )?;
                let (lifecycle, generator) = raw.generator.into_core(binary, dt)?;
                Technology::Chp(Chp {
                    lifecycle,
                    generator,
                    thermal,
                })
            }
            Self::Battery(raw) => {
                let params = BatteryParams {
                    ch_max_rated: rated(
                        raw.charge_power,
                        raw.charge_power_min,
                        raw.charge_power_max,
                    ),
                    dis_max_rated: rated(
                        raw.discharge_power,
                        raw.discharge_power_min,
                        raw.discharge_power_max,
                    ),
                    ene_max_rated: rated(
                        raw.energy_capacity,
                        raw.energy_capacity_min,
                        raw.energy_capacity_max,
                    ),
                    rte: raw.rte,
                    llsoc: raw.llsoc,
                    ulsoc: raw.ulsoc,
                    soc_target: raw.soc_target,
                    capital_cost_power: raw.capital_cost_power,
                    capital_cost_energy: raw.capital_cost_energy,
                    fixed_om: raw.fixed_om,
                    variable_om: raw.variable_om,
                };
                Technology::Battery(Battery::new(&raw.name, raw.lifecycle, params, binary, dt)?)
            }
            Self::ElectricVehicle(raw) => {
                let params = ElectricVehicleParams {
                    ch_max_rated: raw.ch_max_rated,
                    ene_target: raw.ene_target,
                    plugin_time: raw.plugin_time,
                    plugout_time: raw.plugout_time,
                };
                Technology::ElectricVehicle(ElectricVehicle::new(
                    &raw.name,
                    raw.lifecycle,
                    params,
                    data.index(),
                )?)
            }
            Self::Chiller(raw) => {
                let mut chiller = Chiller::new(
                    &raw.name,
                    raw.lifecycle,
                    rated(
                        raw.rated_cooling,
                        raw.rated_cooling_min,
                        raw.rated_cooling_max,
                    ),
                    raw.cop,
                    data.thermal_load(raw.site_cooling_load_column.as_deref())?,
                )?;
                chiller.capital_cost = raw.capital_cost;
                chiller.fixed_om = raw.fixed_om;
                Technology::Chiller(chiller)
            }
        };

        Ok(technology)
    }
}

fn generator(kind: GeneratorKind, raw: GeneratorRaw, binary: bool, dt: f64) -> Result<Technology> {
    let (lifecycle, core) = raw.into_core(binary, dt)?;
    Ok(Technology::Generator(Generator {
        lifecycle,
        kind,
        core,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::TimeIndex;
    use chrono::NaiveDate;

    fn data() -> TimeSeriesData {
        let csv = "Datetime,load,steam\n2017-01-01 00:00,10.0,3412.14\n2017-01-01 01:00,20.0,0.0\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeseries.csv");
        std::fs::write(&path, csv).unwrap();
        super::super::time_series::read_time_series(&path, 1.0).unwrap()
    }

    fn parse(toml: &str) -> TechnologyRaw {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_chp_from_table() {
        let raw = parse(
            "type = \"CHP\"
name = \"chp1\"
rated_power = 100.0
ramp_rate = 5.0
fuel_cost = 3.0
heat_rate = 9000.0
electric_heat_ratio = 1.2
max_steam_ratio = 1.5
site_steam_load_column = \"steam\"
",
        );
        assert_eq!(raw.label(), "CHP 'chp1'");
        let Technology::Chp(chp) = raw.into_technology(&data(), false).unwrap() else {
            panic!("Expected a CHP unit");
        };
        assert_eq!(chp.thermal.electric_heat_ratio, 1.2);
        assert!(chp.thermal.site_hotwater_load.is_none());
        // 3412.14 BTU/hr is 1 kW
        let steam = chp.thermal.site_steam_load.unwrap();
        assert!((steam.values()[0] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_chp_requires_ramp_rate() {
        let raw = parse(
            "type = \"CHP\"
name = \"chp1\"
rated_power = 100.0
fuel_cost = 3.0
heat_rate = 9000.0
electric_heat_ratio = 1.2
max_steam_ratio = 1.5
",
        );
        assert!(raw.into_technology(&data(), false).is_err());
    }

    #[test]
    fn test_battery_sized_without_values() {
        let raw = parse(
            "type = \"Battery\"
name = \"ess\"
operation_year = 2017
rte = 0.85
energy_capacity_max = 400.0
charge_power = 100.0
discharge_power = 100.0
",
        );
        let technology = raw.into_technology(&data(), false).unwrap();
        assert!(technology.being_sized());
        assert!(!technology.is_power_sizing());
        assert!(technology.operational(2017));
    }

    #[test]
    fn test_battery_rte_must_be_proportion() {
        let result = toml::from_str::<TechnologyRaw>(
            "type = \"Battery\"
name = \"ess\"
rte = 1.5
",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_generator_kind_from_tag() {
        let raw = parse(
            "type = \"ICE\"
name = \"diesel\"
rated_power = 50.0
fuel_cost = 3.0
heat_rate = 9000.0
",
        );
        let technology = raw.into_technology(&data(), true).unwrap();
        assert_eq!(technology.unique_tech_id(), "ICE: diesel");
    }

    #[test]
    fn test_electric_vehicle_uses_index() {
        let raw = parse(
            "type = \"ElectricVehicle\"
name = \"fleet\"
ch_max_rated = 7.0
ene_target = 10.0
plugin_time = 0
plugout_time = 1
",
        );
        let start = NaiveDate::from_ymd_opt(2017, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(data().index(), &TimeIndex::regular(start, 2, 1.0).unwrap());
        assert!(raw.into_technology(&data(), false).is_ok());
    }
}
