//! Battery energy storage.
use super::rating::RatedCapacity;
use super::{CAPITAL_COST_SUFFIX, FIXED_OM_SUFFIX, Lifecycle, record_series, result_column};
use crate::optimisation::{
    Constraint, ExprSeries, LinearExpr, ObjectiveTerms, Solution, Variable, VariablePool,
};
use crate::report::{MonthlyTable, TimeSeriesTable};
use crate::time_series::{Mask, TimeIndex};
use crate::units::{MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear};
use anyhow::{Result, ensure};
use strum::Display;

/// One of the rated quantities of a battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RatedQuantity {
    /// Maximum charge power
    #[strum(to_string = "charge power")]
    Charge,
    /// Maximum discharge power
    #[strum(to_string = "discharge power")]
    Discharge,
    /// Energy capacity
    #[strum(to_string = "energy")]
    Energy,
}

/// Operating and cost parameters of a battery
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryParams {
    /// Maximum charge power
    pub ch_max_rated: RatedCapacity,
    /// Maximum discharge power
    pub dis_max_rated: RatedCapacity,
    /// Energy capacity
    pub ene_max_rated: RatedCapacity,
    /// Round trip efficiency
    pub rte: f64,
    /// Lower limit on state of charge
    pub llsoc: f64,
    /// Upper limit on state of charge
    pub ulsoc: f64,
    /// State of charge at the start and end of every window
    pub soc_target: f64,
    /// Capital cost of power capacity
    pub capital_cost_power: MoneyPerPower,
    /// Capital cost of energy capacity
    pub capital_cost_energy: MoneyPerEnergy,
    /// Fixed operation and maintenance cost
    pub fixed_om: MoneyPerPowerPerYear,
    /// Variable operation and maintenance cost
    pub variable_om: MoneyPerEnergy,
}

#[derive(Debug, Clone, PartialEq)]
struct BatteryVars {
    ch: Vec<Variable>,
    dis: Vec<Variable>,
    ene: Vec<Variable>,
    on: Option<(Vec<Variable>, Vec<Variable>)>,
}

/// A battery energy storage system
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    /// The user-provided name
    pub name: String,
    /// The years in which the battery is in service
    pub lifecycle: Lifecycle,
    /// Maximum charge power
    pub ch_max_rated: RatedCapacity,
    /// Maximum discharge power
    pub dis_max_rated: RatedCapacity,
    /// Energy capacity
    pub ene_max_rated: RatedCapacity,
    rte: f64,
    llsoc: f64,
    ulsoc: f64,
    soc_target: f64,
    capital_cost_power: MoneyPerPower,
    capital_cost_energy: MoneyPerEnergy,
    fixed_om: MoneyPerPowerPerYear,
    variable_om: MoneyPerEnergy,
    binary: bool,
    dt: f64,
    size_floors: Vec<(RatedQuantity, f64)>,
    vars: Option<BatteryVars>,
    ch_results: Vec<f64>,
    dis_results: Vec<f64>,
    ene_results: Vec<f64>,
}

impl Battery {
    /// Create a new [`Battery`].
    ///
    /// # Arguments
    ///
    /// * `name` - The user-provided name
    /// * `lifecycle` - The years in which the battery is in service
    /// * `params` - Operating and cost parameters
    /// * `binary` - Whether to prevent simultaneous charging and discharging with binary variables
    /// * `dt` - Length of a time step, in hours
    pub fn new(
        name: &str,
        lifecycle: Lifecycle,
        params: BatteryParams,
        binary: bool,
        dt: f64,
    ) -> Result<Self> {
        ensure!(
            params.rte > 0.0 && params.rte <= 1.0,
            "round trip efficiency must be in the range (0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&params.llsoc) && (0.0..=1.0).contains(&params.ulsoc),
            "state of charge limits must be in the range [0, 1]"
        );
        ensure!(
            params.llsoc <= params.ulsoc,
            "lower state of charge limit ({}) is greater than the upper limit ({})",
            params.llsoc,
            params.ulsoc
        );
        ensure!(
            (params.llsoc..=params.ulsoc).contains(&params.soc_target),
            "target state of charge ({}) must lie between the state of charge limits",
            params.soc_target
        );

        Ok(Self {
            name: name.to_string(),
            lifecycle,
            ch_max_rated: params.ch_max_rated,
            dis_max_rated: params.dis_max_rated,
            ene_max_rated: params.ene_max_rated,
            rte: params.rte,
            llsoc: params.llsoc,
            ulsoc: params.ulsoc,
            soc_target: params.soc_target,
            capital_cost_power: params.capital_cost_power,
            capital_cost_energy: params.capital_cost_energy,
            fixed_om: params.fixed_om,
            variable_om: params.variable_om,
            binary,
            dt,
            size_floors: Vec::new(),
            vars: None,
            ch_results: Vec::new(),
            dis_results: Vec::new(),
            ene_results: Vec::new(),
        })
    }

    /// Whether any rated quantity is chosen by the optimisation
    pub fn being_sized(&self) -> bool {
        self.is_power_sizing() || self.ene_max_rated.is_sized()
    }

    /// Whether charge or discharge power is chosen by the optimisation
    pub fn is_power_sizing(&self) -> bool {
        self.ch_max_rated.is_sized() || self.dis_max_rated.is_sized()
    }

    /// Whether both charge and discharge power have an upper bound
    pub fn max_power_defined(&self) -> bool {
        self.ch_max_rated.max_defined() && self.dis_max_rated.max_defined()
    }

    /// Problems with the sizing configuration of this battery
    pub fn sizing_errors(&self) -> Vec<String> {
        [
            (&self.ch_max_rated, RatedQuantity::Charge),
            (&self.dis_max_rated, RatedQuantity::Discharge),
            (&self.ene_max_rated, RatedQuantity::Energy),
        ]
        .into_iter()
        .filter_map(|(rated, quantity)| rated.validate(&format!("rated {quantity}")).err())
        .map(|err| err.to_string())
        .collect()
    }

    fn rated_mut(&mut self, quantity: RatedQuantity) -> &mut RatedCapacity {
        match quantity {
            RatedQuantity::Charge => &mut self.ch_max_rated,
            RatedQuantity::Discharge => &mut self.dis_max_rated,
            RatedQuantity::Energy => &mut self.ene_max_rated,
        }
    }

    fn rated(&self, quantity: RatedQuantity) -> &RatedCapacity {
        match quantity {
            RatedQuantity::Charge => &self.ch_max_rated,
            RatedQuantity::Discharge => &self.dis_max_rated,
            RatedQuantity::Energy => &self.ene_max_rated,
        }
    }

    /// Require the solver to choose at least `min` for one of the rated quantities.
    ///
    /// A floor which the rating already satisfies is not recorded.
    ///
    /// # Returns
    ///
    /// A description of the problem if the rating can never reach `min`.
    pub fn add_size_floor(&mut self, quantity: RatedQuantity, min: f64) -> Result<(), String> {
        let rated = self.rated(quantity);
        if let Some(max) = rated.max()
            && max < min
        {
            return Err(format!(
                "{quantity} rating cannot reach the required minimum of {min} (maximum is {max})"
            ));
        }
        if rated.min() < min {
            self.size_floors.push((quantity, min));
        }

        Ok(())
    }

    /// The size floors added so far
    pub fn size_floors(&self) -> &[(RatedQuantity, f64)] {
        &self.size_floors
    }

    /// Fix one of the rated quantities, removing it from sizing
    pub fn set_rated(&mut self, quantity: RatedQuantity, value: f64) {
        self.rated_mut(quantity).set_fixed(value);
    }

    /// Create the decision variables for a new window
    pub fn initialize_variables(&mut self, pool: &mut VariablePool, size: usize) {
        let name = self.name.clone();
        self.ch_max_rated.initialize(pool, &format!("{name}-ch_max_rated"));
        self.dis_max_rated
            .initialize(pool, &format!("{name}-dis_max_rated"));
        self.ene_max_rated
            .initialize(pool, &format!("{name}-ene_max_rated"));

        let on = (self.binary && !self.is_power_sizing()).then(|| {
            (
                pool.add_binary_series(&format!("{name}-on_c"), size),
                pool.add_binary_series(&format!("{name}-on_d"), size),
            )
        });
        self.vars = Some(BatteryVars {
            ch: pool.add_nonneg_series(&format!("{name}-ch"), size),
            dis: pool.add_nonneg_series(&format!("{name}-dis"), size),
            ene: pool.add_nonneg_series(&format!("{name}-ene"), size),
            on,
        });
    }

    fn vars(&self) -> &BatteryVars {
        self.vars
            .as_ref()
            .expect("Battery variables have not been initialised")
    }

    /// Charging power for the current window
    pub fn charge(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.vars().ch)
    }

    /// Discharging power for the current window
    pub fn discharge(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.vars().dis)
    }

    /// Stored energy for the current window
    pub fn energy(&self) -> ExprSeries {
        ExprSeries::from_variables(&self.vars().ene)
    }

    /// Stored energy at the end of time step `t`, given the energy at its start
    fn energy_after(&self, t: usize) -> LinearExpr {
        let vars = self.vars();
        LinearExpr::from(vars.ene[t])
            + LinearExpr::term(vars.ch[t], self.rte * self.dt)
            - LinearExpr::term(vars.dis[t], self.dt)
    }

    /// Energy balance, state of charge and power limits for the current window
    pub fn constraints(&self, _mask: &Mask) -> Vec<Constraint> {
        let name = &self.name;
        let vars = self.vars();
        let size = vars.ene.len();
        let energy = self.ene_max_rated.expr();
        let target = &energy * self.soc_target;
        let mut constraints = Vec::new();

        if size > 0 {
            constraints.push(Constraint::zero(
                format!("{name} initial state of energy"),
                LinearExpr::from(vars.ene[0]) - target.clone(),
            ));
            constraints.push(Constraint::zero(
                format!("{name} final state of energy"),
                self.energy_after(size - 1) - target.clone(),
            ));
        }
        if size > 1 {
            constraints.push(Constraint::zero(
                format!("{name} energy balance"),
                (0..size - 1)
                    .map(|t| LinearExpr::from(vars.ene[t + 1]) - self.energy_after(t))
                    .collect::<ExprSeries>(),
            ));
        }

        constraints.push(Constraint::non_positive(
            format!("{name} max state of energy"),
            vars.ene
                .iter()
                .map(|ene| LinearExpr::from(*ene) - &energy * self.ulsoc)
                .collect::<ExprSeries>(),
        ));
        constraints.push(Constraint::non_positive(
            format!("{name} min state of energy"),
            vars.ene
                .iter()
                .map(|ene| &energy * self.llsoc - LinearExpr::from(*ene))
                .collect::<ExprSeries>(),
        ));

        if let Some((on_c, on_d)) = &vars.on {
            let ch_max = self.ch_max_rated.expr().constant_value();
            let dis_max = self.dis_max_rated.expr().constant_value();
            constraints.push(Constraint::non_positive(
                format!("{name} max charge"),
                vars.ch
                    .iter()
                    .zip(on_c)
                    .map(|(ch, on)| LinearExpr::from(*ch) - LinearExpr::term(*on, ch_max))
                    .collect::<ExprSeries>(),
            ));
            constraints.push(Constraint::non_positive(
                format!("{name} max discharge"),
                vars.dis
                    .iter()
                    .zip(on_d)
                    .map(|(dis, on)| LinearExpr::from(*dis) - LinearExpr::term(*on, dis_max))
                    .collect::<ExprSeries>(),
            ));
            constraints.push(Constraint::non_positive(
                format!("{name} charge or discharge"),
                on_c.iter()
                    .zip(on_d)
                    .map(|(on_c, on_d)| LinearExpr::from(*on_c) + LinearExpr::from(*on_d) - 1.0)
                    .collect::<ExprSeries>(),
            ));
        } else {
            let ch_max = self.ch_max_rated.expr();
            let dis_max = self.dis_max_rated.expr();
            constraints.push(Constraint::non_positive(
                format!("{name} max charge"),
                vars.ch
                    .iter()
                    .map(|ch| LinearExpr::from(*ch) - ch_max.clone())
                    .collect::<ExprSeries>(),
            ));
            constraints.push(Constraint::non_positive(
                format!("{name} max discharge"),
                vars.dis
                    .iter()
                    .map(|dis| LinearExpr::from(*dis) - dis_max.clone())
                    .collect::<ExprSeries>(),
            ));
        }

        for (quantity, min) in &self.size_floors {
            constraints.push(Constraint::non_positive(
                format!("{name} minimum {quantity} size"),
                LinearExpr::constant(*min) - self.rated(*quantity).expr(),
            ));
        }

        constraints
    }

    /// Operating and (when sizing) capital costs
    pub fn objective_terms(&self, _mask: &Mask, annuity_scalar: f64) -> ObjectiveTerms {
        let name = &self.name;
        let mut costs = ObjectiveTerms::new();
        costs.insert(
            format!("{name} {FIXED_OM_SUFFIX}"),
            self.dis_max_rated.expr() * (self.fixed_om.value() * annuity_scalar),
        );
        costs.insert(
            format!("{name} Variable O&M Cost"),
            self.discharge().total() * (self.dt * self.variable_om.value() * annuity_scalar),
        );
        if self.being_sized() {
            costs.insert(
                format!("{name} {CAPITAL_COST_SUFFIX}"),
                self.dis_max_rated.expr() * self.capital_cost_power.value()
                    + self.ene_max_rated.expr() * self.capital_cost_energy.value(),
            );
        }
        costs
    }

    /// Store the optimal values for the current window
    pub fn record_solution(&mut self, mask: &Mask, solution: &Solution) {
        let vars = self.vars().clone();
        record_series(&mut self.ch_results, mask, solution.values(&vars.ch));
        record_series(&mut self.dis_results, mask, solution.values(&vars.dis));
        record_series(&mut self.ene_results, mask, solution.values(&vars.ene));
        self.ch_max_rated.record(solution);
        self.dis_max_rated.record(solution);
        self.ene_max_rated.record(solution);
    }

    /// Net power out of the battery (discharge minus charge) over the whole time index
    pub fn power_results(&self, len: usize) -> Vec<f64> {
        let ch = result_column(&self.ch_results, len);
        let dis = result_column(&self.dis_results, len);
        dis.iter().zip(ch).map(|(dis, ch)| dis - ch).collect()
    }

    /// Stored energy over the whole time index
    pub fn energy_results(&self, len: usize) -> Vec<f64> {
        result_column(&self.ene_results, len)
    }

    /// Add this battery's columns to a time series report
    pub fn add_timeseries_columns(&self, id: &str, report: &mut TimeSeriesTable) {
        let len = report.len();
        let energy = self.energy_results(len);
        let capacity = self.ene_max_rated.value().unwrap_or(f64::NAN);
        let soc = energy
            .iter()
            .map(|ene| if capacity > 0.0 { ene / capacity } else { f64::NAN })
            .collect();

        report.insert(
            format!("{id} Charge (kW)"),
            result_column(&self.ch_results, len),
        );
        report.insert(
            format!("{id} Discharge (kW)"),
            result_column(&self.dis_results, len),
        );
        report.insert(format!("{id} Power (kW)"), self.power_results(len));
        report.insert(format!("{id} State of Energy (kWh)"), energy);
        report.insert(format!("{id} SOC (%)"), soc);
    }

    /// Add this battery's columns to a monthly report
    pub fn add_monthly_columns(&self, id: &str, index: &TimeIndex, report: &mut MonthlyTable) {
        report.insert_energy(
            format!("{id} Discharge (kWh)"),
            index,
            &result_column(&self.dis_results, index.len()),
        );
        report.insert_energy(
            format!("{id} Charge (kWh)"),
            index,
            &result_column(&self.ch_results, index.len()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, battery_params};
    use crate::optimisation::solve;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_invalid_soc_limits(mut battery_params: BatteryParams) {
        battery_params.llsoc = 0.9;
        battery_params.ulsoc = 0.1;
        assert!(Battery::new("ess", Lifecycle::default(), battery_params, false, 1.0).is_err());
    }

    #[rstest]
    fn test_sizing_flags(mut battery_params: BatteryParams) {
        battery_params.ene_max_rated = RatedCapacity::sized(0.0, None);
        let battery =
            Battery::new("ess", Lifecycle::default(), battery_params, true, 1.0).unwrap();
        assert!(battery.being_sized());
        assert!(!battery.is_power_sizing());
        assert!(battery.max_power_defined());
    }

    #[rstest]
    fn test_size_floor_constraints(mut battery: Battery) {
        battery.ene_max_rated = RatedCapacity::sized(0.0, None);
        battery.add_size_floor(RatedQuantity::Energy, 2000.0).unwrap();
        let mut pool = VariablePool::default();
        battery.initialize_variables(&mut pool, 2);
        let constraints = battery.constraints(&Mask::all(2));
        assert!(
            constraints
                .iter()
                .any(|c| c.label() == "ess minimum energy size")
        );
    }

    #[rstest]
    #[case(RatedCapacity::fixed(100.0), 50.0, Ok(0))]
    #[case(RatedCapacity::fixed(100.0), 100.0, Ok(0))]
    #[case(RatedCapacity::fixed(100.0), 200.0, Err(()))]
    #[case(RatedCapacity::sized(0.0, Some(150.0)), 200.0, Err(()))]
    #[case(RatedCapacity::sized(250.0, None), 200.0, Ok(0))]
    #[case(RatedCapacity::sized(0.0, Some(500.0)), 200.0, Ok(1))]
    fn test_size_floor_against_rating(
        mut battery: Battery,
        #[case] rating: RatedCapacity,
        #[case] floor: f64,
        #[case] expected: Result<usize, ()>,
    ) {
        battery.ene_max_rated = rating;
        let result = battery.add_size_floor(RatedQuantity::Energy, floor);
        assert_eq!(result.map(|()| battery.size_floors().len()).map_err(|_| ()), expected);
    }

    #[rstest]
    fn test_arbitrage_respects_energy_balance(mut battery: Battery) {
        // Cheap power in the first step, expensive in the second
        let mut pool = VariablePool::default();
        battery.initialize_variables(&mut pool, 2);
        let mask = Mask::all(2);
        let net_import = battery.charge() - &battery.discharge();
        let objective: ObjectiveTerms =
            [("energy".to_string(), net_import.dot(&[1.0, 10.0]))].into_iter().collect();

        let solution = solve(&pool, &objective, &battery.constraints(&mask)).unwrap();
        battery.record_solution(&mask, &solution);

        let energy = battery.energy_results(2);
        let power = battery.power_results(2);
        // Starts at the target, charges, then returns to the target
        assert_approx_eq!(f64, energy[0], 50.0, epsilon = 1e-6);
        assert!(power[0] < 0.0);
        assert!(power[1] > 0.0);
        assert_approx_eq!(
            f64,
            energy[0] - power[0].min(0.0) * battery.rte - power[1],
            50.0,
            epsilon = 1e-6
        );
    }
}
