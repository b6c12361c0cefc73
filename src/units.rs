#![allow(missing_docs)]

//! This module defines various unit types and their conversions.
//!
//! Electric power is in kW, energy in kWh and money in dollars.

/// Conversion factor from BTU/hr to kW
pub const KW_PER_BTU_PER_HOUR: f64 = 0.000_293_071;

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            derive_more::Add,
            derive_more::Sub,
            serde::Deserialize,
            serde::Serialize,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl float_cmp::ApproxEq for $name {
            type Margin = float_cmp::F64Margin;

            fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
                float_cmp::ApproxEq::approx_eq(self.0, other.0, margin)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

unit_struct!(Dimensionless);
unit_struct!(Power);
unit_struct!(Energy);
unit_struct!(Money);
unit_struct!(Hours);
unit_struct!(MoneyPerPower);
unit_struct!(MoneyPerEnergy);
unit_struct!(MoneyPerPowerPerYear);

impl Dimensionless {
    pub fn powi(self, rhs: i32) -> Self {
        Dimensionless(self.0.powi(rhs))
    }
}

// Multiplication rules
impl_mul!(Power, Hours, Energy);
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(MoneyPerEnergy, Energy, Money);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_power_times_hours() {
        assert_approx_eq!(Energy, Power(250.0) * Hours(0.5), Energy(125.0));
        assert_approx_eq!(Energy, Hours(2.0) * Power(10.0), Energy(20.0));
    }

    #[test]
    fn test_capital_cost() {
        assert_approx_eq!(Money, MoneyPerPower(1500.0) * Power(2.0), Money(3000.0));
        assert_approx_eq!(Money, MoneyPerEnergy(300.0) * Energy(10.0), Money(3000.0));
    }

    #[test]
    fn test_btu_conversion() {
        // 1 kW is approximately 3412 BTU/hr
        assert_approx_eq!(f64, 3412.14 * KW_PER_BTU_PER_HOUR, 1.0, epsilon = 1e-4);
    }
}
