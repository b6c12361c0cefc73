//! General functions related to finance.
use crate::units::Dimensionless;

/// Calculates the annuity scalar for a project.
///
/// The annuity scalar projects one year's costs and benefits over the lifetime of the project,
/// with costs escalating at the inflation rate and discounted at the discount rate. It is only
/// used when sizing; dispatch-only runs use a scalar of one.
///
/// # Arguments
///
/// * `start_year` - First year of the project
/// * `end_year` - Last year of the project
/// * `discount_rate` - Annual discount rate
/// * `inflation_rate` - Annual rate at which costs escalate
pub fn annuity_scalar(
    start_year: i32,
    end_year: i32,
    discount_rate: Dimensionless,
    inflation_rate: Dimensionless,
) -> Dimensionless {
    if end_year < start_year {
        return Dimensionless(0.0);
    }

    let growth = (Dimensionless(1.0) + inflation_rate) / (Dimensionless(1.0) + discount_rate);
    (0..=end_year - start_year)
        .map(|year| growth.powi(year))
        .fold(Dimensionless(0.0), |total, factor| total + factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(2017, 2017, 0.1, 0.03, 1.0)] // Single year
    #[case(2017, 2026, 0.0, 0.0, 10.0)] // No discounting
    #[case(2017, 2018, 0.1, 0.0, 1.0 + 1.0 / 1.1)]
    #[case(2017, 2019, 0.1, 0.1, 3.0)] // Inflation matches discounting
    #[case(2018, 2017, 0.1, 0.0, 0.0)] // Edge case: ends before it starts
    fn test_annuity_scalar(
        #[case] start_year: i32,
        #[case] end_year: i32,
        #[case] discount_rate: f64,
        #[case] inflation_rate: f64,
        #[case] expected: f64,
    ) {
        let result = annuity_scalar(
            start_year,
            end_year,
            Dimensionless(discount_rate),
            Dimensionless(inflation_rate),
        );
        assert_approx_eq!(f64, result.value(), expected, epsilon = 1e-10);
    }
}
