//! Code for reading the `[value_streams]` table and the deferral requirements file.
use super::time_series::TimeSeriesData;
use super::{input_err_msg, read_csv};
use crate::units::{Energy, Power};
use crate::value_stream::{Deferral, DeferralRequirement, EnergyTimeShift, ValueStream};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Parameters for retail energy time shift
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EnergyTimeShiftRaw {
    price_column: String,
}

/// Parameters for upgrade deferral
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeferralRaw {
    min_years: u32,
    requirements_file: PathBuf,
}

/// The `[value_streams]` table
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ValueStreamsRaw {
    #[serde(rename = "retailTimeShift")]
    retail_time_shift: Option<EnergyTimeShiftRaw>,
    #[serde(rename = "Deferral")]
    deferral: Option<DeferralRaw>,
}

/// One row of the deferral requirements file
#[derive(Debug, Deserialize, PartialEq)]
struct DeferralRequirementRaw {
    year: i32,
    power: Power,
    energy: Energy,
}

fn read_deferral_requirements(file_path: &Path) -> Result<IndexMap<i32, DeferralRequirement>> {
    let mut requirements = IndexMap::new();
    for row in read_csv::<DeferralRequirementRaw>(file_path)? {
        ensure!(
            row.power.value() >= 0.0 && row.energy.value() >= 0.0,
            "Deferral requirements for {} cannot be negative",
            row.year
        );
        let requirement = DeferralRequirement {
            power: row.power,
            energy: row.energy,
        };
        ensure!(
            requirements.insert(row.year, requirement).is_none(),
            "Duplicate deferral requirement for {}",
            row.year
        );
    }

    Ok(requirements)
}

impl ValueStreamsRaw {
    /// Build the value streams.
    ///
    /// # Arguments
    ///
    /// * `scenario_dir` - Folder containing the scenario files
    /// * `data` - Time series for the optimisation years
    pub fn into_value_streams(
        self,
        scenario_dir: &Path,
        data: &TimeSeriesData,
    ) -> Result<Vec<ValueStream>> {
        let mut streams = Vec::new();
        if let Some(raw) = self.retail_time_shift {
            streams.push(ValueStream::EnergyTimeShift(EnergyTimeShift {
                price: data.column(&raw.price_column)?,
            }));
        }
        if let Some(raw) = self.deferral {
            let file_path = scenario_dir.join(&raw.requirements_file);
            let requirements =
                read_deferral_requirements(&file_path).with_context(|| input_err_msg(&file_path))?;
            streams.push(ValueStream::Deferral(Deferral {
                min_years: raw.min_years,
                requirements,
            }));
        }

        Ok(streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_deferral_requirements() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("deferral.csv");
        fs::write(&file_path, "year,power,energy\n2017,100,400\n2018,500,2000\n").unwrap();
        let requirements = read_deferral_requirements(&file_path).unwrap();
        assert_eq!(
            requirements[&2018],
            DeferralRequirement {
                power: Power(500.0),
                energy: Energy(2000.0)
            }
        );
    }

    #[test]
    fn test_duplicate_deferral_year() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("deferral.csv");
        fs::write(&file_path, "year,power,energy\n2017,100,400\n2017,500,2000\n").unwrap();
        assert!(read_deferral_requirements(&file_path).is_err());
    }

    #[test]
    fn test_value_stream_names() {
        let raw: ValueStreamsRaw = toml::from_str(
            "[Deferral]
min_years = 2
requirements_file = \"deferral.csv\"
",
        )
        .unwrap();
        assert!(raw.retail_time_shift.is_none());
        assert_eq!(raw.deferral.unwrap().min_years, 2);
        assert!(toml::from_str::<ValueStreamsRaw>("[DA]\nprice_column = \"p\"").is_err());
    }
}
