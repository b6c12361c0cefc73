//! Fixtures for tests

use crate::scenario::ScenarioParams;
use crate::technology::Lifecycle;
use crate::technology::battery::{Battery, BatteryParams};
use crate::technology::chp::{Chp, ChpThermal};
use crate::technology::generator::{Generator, GeneratorCore, GeneratorKind, GeneratorParams};
use crate::technology::load::Load;
use crate::technology::pv::Pv;
use crate::technology::rating::RatedCapacity;
use crate::time_series::{TimeIndex, TimeSeries, WindowLevel};
use crate::units::{Dimensionless, MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear};
use chrono::NaiveDate;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// An hourly time index of `len` steps starting at midnight on 1 January 2017
pub fn time_index(len: usize) -> TimeIndex {
    let start = NaiveDate::from_ymd_opt(2017, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    TimeIndex::regular(start, len, 1.0).unwrap()
}

#[fixture]
pub fn scenario_params() -> ScenarioParams {
    ScenarioParams {
        name: "test".into(),
        opt_years: vec![2017],
        window: WindowLevel::Month,
        binary: false,
        discount_rate: Dimensionless(0.0),
        inflation_rate: Dimensionless(0.0),
        start_year: None,
        end_year: None,
    }
}

#[fixture]
pub fn generator_params() -> GeneratorParams {
    GeneratorParams {
        rated_power: RatedCapacity::fixed(100.0),
        min_power: 20.0,
        ramp_rate: Some(10.0),
        fuel_cost: 20.0,
        heat_rate: 10_000.0,
        variable_om: MoneyPerEnergy(0.01),
        fixed_om: MoneyPerPowerPerYear(10.0),
        capital_cost: MoneyPerPower(1000.0),
    }
}

#[fixture]
pub fn generator(generator_params: GeneratorParams) -> Generator {
    Generator {
        lifecycle: Lifecycle::default(),
        kind: GeneratorKind::CombustionTurbine,
        core: GeneratorCore::new("ct1", generator_params, false, 1.0).unwrap(),
    }
}

/// A generator whose power is sized, with an upper bound
pub fn sized_generator_core() -> GeneratorCore {
    let mut params = generator_params();
    params.rated_power = RatedCapacity::sized(0.0, Some(500.0));
    GeneratorCore::new("ct1", params, false, 1.0).unwrap()
}

#[fixture]
pub fn chp(generator_params: GeneratorParams) -> Chp {
    Chp {
        lifecycle: Lifecycle::default(),
        generator: GeneratorCore::new("chp1", generator_params, false, 1.0).unwrap(),
        thermal: ChpThermal::new(0.8, 2.0, Some(TimeSeries::constant(10.0, 2)), None).unwrap(),
    }
}

#[fixture]
pub fn battery_params() -> BatteryParams {
    BatteryParams {
        ch_max_rated: RatedCapacity::fixed(50.0),
        dis_max_rated: RatedCapacity::fixed(50.0),
        ene_max_rated: RatedCapacity::fixed(100.0),
        rte: 0.9,
        llsoc: 0.0,
        ulsoc: 1.0,
        soc_target: 0.5,
        capital_cost_power: MoneyPerPower(0.0),
        capital_cost_energy: MoneyPerEnergy(0.0),
        fixed_om: MoneyPerPowerPerYear(0.0),
        variable_om: MoneyPerEnergy(0.0),
    }
}

#[fixture]
pub fn battery(battery_params: BatteryParams) -> Battery {
    Battery::new("ess", Lifecycle::default(), battery_params, false, 1.0).unwrap()
}

#[fixture]
pub fn pv() -> Pv {
    Pv::new(
        "pv",
        Lifecycle::default(),
        RatedCapacity::fixed(30.0),
        TimeSeries::new(vec![0.0, 1.0]),
        false,
    )
}

#[fixture]
pub fn site_load() -> Load {
    Load {
        name: "site".into(),
        lifecycle: Lifecycle::default(),
        load: TimeSeries::new(vec![20.0, 30.0]),
    }
}
