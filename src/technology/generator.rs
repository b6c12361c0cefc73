//! Dispatchable fuel-burning generators.
//!
//! [`GeneratorCore`] holds everything a fuel-burning generator needs (electric output, optional
//! on/off commitment, ramp limits, fuel and O&M costs, optional power sizing). It is used directly
//! by [`Generator`] and is composed into [`Chp`](super::chp::Chp).
use super::rating::RatedCapacity;
use super::{CAPITAL_COST_SUFFIX, FIXED_OM_SUFFIX, Lifecycle, record_series, result_column};
use crate::optimisation::{
    Constraint, ExprSeries, LinearExpr, ObjectiveTerms, Solution, Variable, VariablePool,
};
use crate::report::{MonthlyTable, TimeSeriesTable};
use crate::time_series::{Mask, TimeIndex};
use crate::units::{MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear};
use anyhow::{Result, ensure};
use log::warn;

/// Cost and operating parameters shared by all fuel-burning generators
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParams {
    /// Rated electric power
    pub rated_power: RatedCapacity,
    /// Minimum electric output when on (only enforced with the binary formulation)
    pub min_power: f64,
    /// Maximum change in electric output, in kW per minute
    pub ramp_rate: Option<f64>,
    /// Fuel price, in $/MMBtu
    pub fuel_cost: f64,
    /// Heat rate, in BTU/kWh
    pub heat_rate: f64,
    /// Variable operation and maintenance cost
    pub variable_om: MoneyPerEnergy,
    /// Fixed operation and maintenance cost
    pub fixed_om: MoneyPerPowerPerYear,
    /// Capital cost, only included in the objective when sizing
    pub capital_cost: MoneyPerPower,
}

impl GeneratorParams {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.min_power.is_finite() && self.min_power >= 0.0,
            "min_power must be a finite, non-negative number"
        );
        if let Some(ramp_rate) = self.ramp_rate {
            ensure!(
                ramp_rate.is_finite() && ramp_rate > 0.0,
                "ramp rate must be a finite number greater than zero"
            );
        }
        ensure!(
            self.heat_rate.is_finite() && self.heat_rate >= 0.0,
            "heat_rate must be a finite, non-negative number"
        );
        ensure!(self.fuel_cost.is_finite(), "fuel_cost must be finite");

        Ok(())
    }
}

/// The decision variables of a generator for one window
#[derive(Debug, Clone, PartialEq)]
struct GeneratorVars {
    elec: Vec<Variable>,
    on: Option<Vec<Variable>>,
}

/// The electric generation capability of a fuel-burning generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorCore {
    name: String,
    params: GeneratorParams,
    binary: bool,
    dt: f64,
    vars: Option<GeneratorVars>,
    elec_results: Vec<f64>,
    on_results: Vec<f64>,
}

impl GeneratorCore {
    /// Create a new [`GeneratorCore`].
    ///
    /// # Arguments
    ///
    /// * `name` - The user-provided name of the technology
    /// * `params` - Operating and cost parameters
    /// * `binary` - Whether the binary (on/off) formulation is used
    /// * `dt` - Length of a time step, in hours
    pub fn new(name: &str, params: GeneratorParams, binary: bool, dt: f64) -> Result<Self> {
        params.validate()?;
        if binary && params.rated_power.is_sized() {
            warn!(
                "{name}: on/off commitment is not modelled while the generator's power is being sized"
            );
        }

        Ok(Self {
            name: name.to_string(),
            params,
            binary,
            dt,
            vars: None,
            elec_results: Vec::new(),
            on_results: Vec::new(),
        })
    }

    /// The user-provided name of the technology
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rated electric power
    pub fn rated_power(&self) -> &RatedCapacity {
        &self.params.rated_power
    }

    /// Whether on/off commitment variables are used
    fn is_committed(&self) -> bool {
        self.binary && !self.params.rated_power.is_sized()
    }

    /// Whether the rated power is being sized
    pub fn being_sized(&self) -> bool {
        self.params.rated_power.is_sized()
    }

    /// Problems with the sizing configuration of this generator
    pub fn sizing_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(err) = self.params.rated_power.validate("rated power") {
            errors.push(err.to_string());
        }
        if self.binary && self.being_sized() && !self.params.rated_power.max_defined() {
            errors.push(
                "rated power is sized with no upper bound, which is not allowed with the binary \
                formulation"
                    .to_string(),
            );
        }
        errors
    }

    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        let name = &self.name;
        self.params
            .rated_power
            .initialize(pool, &format!("{name}-rated_power"));
        let elec = pool.add_nonneg_series(&format!("{name}-elecP"), size);
        let on = self
            .is_committed()
            .then(|| pool.add_binary_series(&format!("{name}-on"), size));
        self.vars = Some(GeneratorVars { elec, on });
    }

    fn vars(&self) -> &GeneratorVars {
        self.vars
            .as_ref()
            .expect("Generator variables have not been initialised")
    }

    /// The electric output variables for the current window
    pub fn elec(&self) -> &[Variable] {
        &self.vars().elec
    }

    /// Electric output as a series of expressions
    pub fn generation(&self) -> ExprSeries {
        ExprSeries::from_variables(self.elec())
    }

    /// Constraints on electric output for the current window
    pub fn constraints(&self, _mask: &Mask) -> Vec<Constraint> {
        let vars = self.vars();
        let name = &self.name;
        let rated = self.params.rated_power.expr();
        let mut constraints = Vec::new();

        if let Some(on) = &vars.on {
            let rated = rated.constant_value();
            let min_power = self.params.min_power;
            constraints.push(Constraint::non_positive(
                format!("{name} max power"),
                vars.elec
                    .iter()
                    .zip(on)
                    .map(|(elec, on)| LinearExpr::from(*elec) - LinearExpr::term(*on, rated))
                    .collect::<ExprSeries>(),
            ));
            constraints.push(Constraint::non_positive(
                format!("{name} min power"),
                vars.elec
                    .iter()
                    .zip(on)
                    .map(|(elec, on)| LinearExpr::term(*on, min_power) - LinearExpr::from(*elec))
                    .collect::<ExprSeries>(),
            ));
        } else {
            constraints.push(Constraint::non_positive(
                format!("{name} max power"),
                vars.elec
                    .iter()
                    .map(|elec| LinearExpr::from(*elec) - rated.clone())
                    .collect::<ExprSeries>(),
            ));
        }

        if let Some(ramp_rate) = self.params.ramp_rate
            && vars.elec.len() > 1
        {
            let max_change = ramp_rate * 60.0 * self.dt;
            let change: ExprSeries = vars
                .elec
                .windows(2)
                .map(|pair| LinearExpr::from(pair[1]) - LinearExpr::from(pair[0]))
                .collect();
            constraints.push(Constraint::non_positive(
                format!("{name} ramp up"),
                change
                    .iter()
                    .map(|expr| expr.clone() - max_change)
                    .collect::<ExprSeries>(),
            ));
            constraints.push(Constraint::non_positive(
                format!("{name} ramp down"),
                change
                    .into_iter()
                    .map(|expr| -expr - max_change)
                    .collect::<ExprSeries>(),
            ));
        }

        constraints
    }

    /// Operating and (when sizing) capital costs
    pub fn objective_terms(&self, _mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        let name = &self.name;
        let params = &self.params;
        let energy = self.generation().total() * self.dt;
        let fuel_cost_per_kwh = params.heat_rate * params.fuel_cost / 1e6;

        let mut costs = ObjectiveTerms::new();
        costs.insert(
            format!("{name} Fuel Cost"),
            &energy * (fuel_cost_per_kwh * annuity_scalar),
        );
        costs.insert(
            format!("{name} Variable O&M Cost"),
            &energy * (params.variable_om.value() * annuity_scalar),
        );
        costs.insert(
            format!("{name} {FIXED_OM_SUFFIX}"),
            params.rated_power.expr() * (params.fixed_om.value() * annuity_scalar),
        );
        if self.being_sized() {
            costs.insert(
                format!("{name} {CAPITAL_COST_SUFFIX}"),
                params.rated_power.expr() * params.capital_cost.value(),
            );
        }

        costs
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        let vars = self.vars().clone();
        record_series(&mut self.elec_results, mask, solution.values(&vars.elec));
        if let Some(on) = &vars.on {
            record_series(&mut self.on_results, mask, solution.values(on));
        }
        self.params.rated_power.record(solution);
    }

    /// Electric output over the whole time index (NaN where no solution is available)
    pub fn elec_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.elec_results, len)
    }

    /// Add this generator's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        let len = report.len();
        report.insert(
            format!("{id} Electric Generation (kW)"),
            self.elec_results(len),
        );
        if self.is_committed() {
            report.insert(
                format!("{id} On (y/n)"),
                result_column(&self.on_results, len),
            );
        }
    }

    /// Add this generator's columns to a monthly report
    pub fn add_monthly_columns(&self, id: &str, index: &TimeIndex, report: &mut MonthlyTable) {
        report.insert_energy(
            format!("{id} Electric Generation (kWh)"),
            index,
            &self.elec_results(index.len()),
        );
    }
}

/// The kind of fuel-burning generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// A combustion turbine
    CombustionTurbine,
    /// A reciprocating internal combustion engine
    InternalCombustionEngine,
}

impl GeneratorKind {
    /// The tag used to label this kind of generator
    pub fn tag(self) -> &'static str {
        match self {
            Self::CombustionTurbine => "CT",
            Self::InternalCombustionEngine => "ICE",
        }
    }
}

/// A generator which only produces electricity
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// The years in which the generator is in service
    pub lifecycle: Lifecycle,
    /// The kind of generator
    pub kind: GeneratorKind,
    /// The generation capability
    pub core: GeneratorCore,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::generator_params;
    use crate::optimisation::solve;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_constraints_fixed_power(generator_params: GeneratorParams) {
        let mut core = GeneratorCore::new("ct1", generator_params, false, 1.0).unwrap();
        let mut pool = VariablePool::default();
        core.initialize_variables(&mut pool, 3);
        let labels: Vec<_> = core
            .constraints(&Mask::all(3))
            .iter()
            .map(|c| c.label().to_string())
            .collect();
        assert_eq!(labels, ["ct1 max power", "ct1 ramp up", "ct1 ramp down"]);
        assert_eq!(pool.len(), 3);
    }

    #[rstest]
    fn test_binary_adds_commitment(generator_params: GeneratorParams) {
        let mut core = GeneratorCore::new("ct1", generator_params, true, 1.0).unwrap();
        let mut pool = VariablePool::default();
        core.initialize_variables(&mut pool, 2);
        assert!(pool.has_integers());
        assert!(
            core.constraints(&Mask::all(2))
                .iter()
                .any(|c| c.label() == "ct1 min power")
        );
    }

    #[rstest]
    fn test_ramp_limit_respected(mut generator_params: GeneratorParams) {
        // Reward output at the second step only; ramp limit stops the generator jumping to full
        generator_params.ramp_rate = Some(1.0); // 60 kW per hourly step
        let mut core = GeneratorCore::new("ct1", generator_params, false, 1.0).unwrap();
        let mut pool = VariablePool::default();
        core.initialize_variables(&mut pool, 2);
        let elec = core.elec().to_vec();
        let objective: ObjectiveTerms = [
            ("reward".to_string(), LinearExpr::term(elec[1], -1.0)),
            ("penalty".to_string(), LinearExpr::term(elec[0], 10.0)),
        ]
        .into_iter()
        .collect();

        let solution = solve(&pool, &objective, &core.constraints(&Mask::all(2))).unwrap();
        assert_approx_eq!(f64, solution.value(elec[0]), 0.0, epsilon = 1e-6);
        assert_approx_eq!(f64, solution.value(elec[1]), 60.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_capital_cost_only_when_sized(mut generator_params: GeneratorParams) {
        let mut core = GeneratorCore::new("ct1", generator_params.clone(), false, 1.0).unwrap();
        let mut pool = VariablePool::default();
        core.initialize_variables(&mut pool, 1);
        let costs = core.objective_terms(&Mask::all(1), 1.0);
        assert!(!costs.contains_key("ct1 Capital Cost"));

        generator_params.rated_power = RatedCapacity::sized(0.0, Some(100.0));
        let mut core = GeneratorCore::new("ct1", generator_params, false, 1.0).unwrap();
        core.initialize_variables(&mut pool, 1);
        let costs = core.objective_terms(&Mask::all(1), 1.0);
        assert!(costs["ct1 Capital Cost"].has_variables());
    }

    #[rstest]
    fn test_invalid_ramp_rate(mut generator_params: GeneratorParams) {
        generator_params.ramp_rate = Some(0.0);
        assert!(GeneratorCore::new("ct1", generator_params, false, 1.0).is_err());
    }
}
