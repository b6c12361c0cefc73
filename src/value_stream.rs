//! Value streams: the services a site's DERs provide, which drive the objective or sizing.
use crate::optimisation::ObjectiveTerms;
use crate::poi::SystemState;
use crate::report::{MonthlyTable, TimeSeriesTable};
use crate::time_series::{Mask, TimeIndex, TimeSeries};
use crate::units::{Energy, Power};
use indexmap::IndexMap;

/// Label of the energy time shift cost term
pub const ENERGY_CHARGES: &str = "Energy Charges";

/// Power and energy capacity needed to defer an upgrade in a given year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeferralRequirement {
    /// Power capacity requirement
    pub power: Power,
    /// Energy capacity requirement
    pub energy: Energy,
}

/// Paying for imported energy at a retail price which varies over time
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyTimeShift {
    /// Retail energy price, in $/kWh
    pub price: TimeSeries,
}

/// Deferring an upgrade to the grid by installing enough storage
#[derive(Debug, Clone, PartialEq)]
pub struct Deferral {
    /// Number of years the upgrade must be deferred for
    pub min_years: u32,
    /// The capacity required in each year
    pub requirements: IndexMap<i32, DeferralRequirement>,
}

impl Deferral {
    /// The last year in which the upgrade must be deferred, if the first year is `start_year`
    pub fn last_year_to_defer(&self, start_year: i32) -> i32 {
        start_year + i32::try_from(self.min_years).unwrap_or(i32::MAX) - 1
    }
}

/// A service provided by the site's DERs
#[derive(Debug, Clone, PartialEq)]
pub enum ValueStream {
    /// Retail energy time shift
    EnergyTimeShift(EnergyTimeShift),
    /// Upgrade deferral
    Deferral(Deferral),
}

impl ValueStream {
    /// The name used for this value stream in scenario files
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnergyTimeShift(_) => "retailTimeShift",
            Self::Deferral(_) => "Deferral",
        }
    }

    /// Cost terms for the current window.
    ///
    /// # Arguments
    ///
    /// * `mask` - The rows of the time index in the current window
    /// * `state` - The aggregated flows at the POI
    /// * `dt` - Length of a time step, in hours
    /// * `annuity_scalar` - Multiplier projecting one year's costs over the project lifetime
    pub fn objective_terms(
        &self,
        mask: &Mask,
        state: &SystemState,
        dt: f64,
        annuity_scalar: f64,
    ) -> ObjectiveTerms {
        let mut costs = ObjectiveTerms::new();
        if let Self::EnergyTimeShift(ets) = self {
            let price: Vec<_> = ets
                .price
                .masked(mask)
                .into_iter()
                .map(|price| price * dt * annuity_scalar)
                .collect();
            costs.insert(ENERGY_CHARGES.to_string(), state.net_import().dot(&price));
        }
        costs
    }

    /// Add this value stream's inputs to the time series report
    pub fn add_timeseries_columns(&self, report: &mut TimeSeriesTable) {
        if let Self::EnergyTimeShift(ets) = self {
            report.insert("Energy Price ($/kWh)", ets.price.values().to_vec());
        }
    }

    /// Add this value stream's monthly results, given the net import at the POI
    pub fn add_monthly_columns(
        &self,
        index: &TimeIndex,
        net_import: &[f64],
        report: &mut MonthlyTable,
    ) {
        if let Self::EnergyTimeShift(ets) = self {
            let cost: Vec<_> = net_import
                .iter()
                .zip(ets.price.values())
                .map(|(power, price)| power * price)
                .collect();
            report.insert_energy("Energy Charge ($)", index, &cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimisation::{ExprSeries, Variable};
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_energy_charges() {
        let stream = ValueStream::EnergyTimeShift(EnergyTimeShift {
            price: TimeSeries::new(vec![0.1, 0.2, 0.3]),
        });
        let mut state = SystemState::zeros(2);
        state.power_out = ExprSeries::from_variables(&[Variable::new(0), Variable::new(1)]);
        let mask = Mask::new(vec![false, true, true]);

        let costs = stream.objective_terms(&mask, &state, 0.5, 2.0);
        // 0.2 * 0.5 * 2 * 10 + 0.3 * 0.5 * 2 * 20
        assert_approx_eq!(f64, costs[ENERGY_CHARGES].evaluate(&[10.0, 20.0]), 8.0);
    }

    #[test]
    fn test_last_year_to_defer() {
        let deferral = Deferral {
            min_years: 3,
            requirements: IndexMap::new(),
        };
        assert_eq!(deferral.last_year_to_defer(2017), 2019);
        assert!(
            ValueStream::Deferral(deferral)
                .objective_terms(&Mask::all(1), &SystemState::zeros(1), 1.0, 1.0)
                .is_empty()
        );
    }
}
