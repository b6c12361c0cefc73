//! Common routines for handling input data.
//!
//! A scenario directory contains a `scenario.toml` file describing the scenario, its DERs and
//! value streams, along with CSV files of time series data.
use crate::error::ModelError;
use crate::poi::Poi;
use crate::scenario::{Scenario, ScenarioParams};
use crate::technology::Technology;
use anyhow::{Context, Result, bail};
use itertools::Itertools;
use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

pub mod technology;
use technology::TechnologyRaw;
pub mod time_series;
use time_series::{TimeSeriesData, read_time_series};
pub mod value_stream;
use value_stream::ValueStreamsRaw;

/// The name of the file describing a scenario
pub const SCENARIO_FILE_NAME: &str = "scenario.toml";

/// Default name of the time series CSV file
const DEFAULT_TIME_SERIES_FILE_NAME: &str = "timeseries.csv";

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = csv::Reader::from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }

    Ok(vec.into_iter())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?
    }

    Ok(value)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().to_string_lossy())
}

/// Where to find the time series data and how long each time step is
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct TimeSeriesFile {
    #[serde(default = "default_time_series_file")]
    file: PathBuf,
    /// Length of a time step, in hours
    #[serde(default = "default_dt")]
    dt: f64,
}

fn default_time_series_file() -> PathBuf {
    DEFAULT_TIME_SERIES_FILE_NAME.into()
}

fn default_dt() -> f64 {
    1.0
}

impl Default for TimeSeriesFile {
    fn default() -> Self {
        Self {
            file: default_time_series_file(),
            dt: default_dt(),
        }
    }
}

/// Limits on power flow through the POI
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct PoiParams {
    max_import: Option<f64>,
    max_export: Option<f64>,
}

/// The contents of `scenario.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    scenario: ScenarioParams,
    #[serde(default)]
    time_series: TimeSeriesFile,
    #[serde(default)]
    poi: PoiParams,
    /// Kept as raw tables so that every malformed technology can be reported at once
    #[serde(default)]
    technologies: Vec<toml::Value>,
    #[serde(default)]
    value_streams: ValueStreamsRaw,
}

/// Read a scenario from the specified directory.
///
/// Time series are restricted to the scenario's optimisation years.
///
/// # Arguments
///
/// * `scenario_dir` - Folder containing the scenario files
pub fn load_scenario(scenario_dir: &Path) -> Result<Scenario> {
    let file_path = scenario_dir.join(SCENARIO_FILE_NAME);
    let file: ScenarioFile = read_toml(&file_path)?;
    let params = file.scenario;

    let time_series_path = scenario_dir.join(&file.time_series.file);
    let data = read_time_series(&time_series_path, file.time_series.dt)?
        .for_years(&params.opt_years)
        .with_context(|| input_err_msg(&time_series_path))?;

    let technologies = read_technologies(file.technologies, &data, params.binary)?;
    let value_streams = file.value_streams.into_value_streams(scenario_dir, &data)?;
    let poi = Poi::new(technologies, file.poi.max_import, file.poi.max_export)?;

    Scenario::new(params, data.index().clone(), poi, value_streams)
}

/// Build every technology, collecting all the problems found into one error
fn read_technologies(
    tables: Vec<toml::Value>,
    data: &TimeSeriesData,
    binary: bool,
) -> Result<Vec<Technology>> {
    let mut technologies = Vec::new();
    let mut errors = Vec::new();
    for (i, table) in tables.into_iter().enumerate() {
        let built = table
            .try_into::<TechnologyRaw>()
            .context("Invalid technology definition")
            .and_then(|raw| {
                let label = raw.label();
                raw.into_technology(data, binary)
                    .with_context(|| format!("Invalid parameters for {label}"))
            });
        match built {
            Ok(technology) => technologies.push(technology),
            Err(err) => errors.push(format!("technology {}: {err:#}", i + 1)),
        }
    }

    if !errors.is_empty() {
        return Err(ModelError::Configuration(errors).into());
    }

    Ok(technologies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        value: u32,
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value\nhello,1\nworld,2").unwrap();
        }
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            [
                Record {
                    id: "hello".into(),
                    value: 1
                },
                Record {
                    id: "world".into(),
                    value: 2
                }
            ]
        );

        // File with no data rows
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value").unwrap();
        }
        assert!(read_csv::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "max_import = 100.0").unwrap();
        }
        let params: PoiParams = read_toml(&file_path).unwrap();
        assert_eq!(
            params,
            PoiParams {
                max_import: Some(100.0),
                max_export: None
            }
        );

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "bad toml syntax").unwrap();
        }
        assert!(read_toml::<PoiParams>(&file_path).is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Proportion {
        #[serde(deserialize_with = "deserialise_proportion")]
        value: f64,
    }

    #[test]
    fn test_deserialise_proportion() {
        let parsed: Proportion = toml::from_str("value = 0.5").unwrap();
        assert_eq!(parsed.value, 0.5);
        assert!(toml::from_str::<Proportion>("value = 1.5").is_err());
        assert!(toml::from_str::<Proportion>("value = -0.1").is_err());
    }

    fn write_scenario(dir: &Path, technologies: &str) {
        fs::write(
            dir.join(SCENARIO_FILE_NAME),
            format!(
                "[scenario]
name = \"test\"
opt_years = [2017]

[value_streams.retailTimeShift]
price_column = \"price\"

{technologies}"
            ),
        )
        .unwrap();
        fs::write(
            dir.join(DEFAULT_TIME_SERIES_FILE_NAME),
            "Datetime,site,price
2016-12-31 23:00,1.0,0.1
2017-01-01 00:00,20.0,0.1
2017-01-01 01:00,30.0,0.2
",
        )
        .unwrap();
    }

    #[test]
    fn test_load_scenario() {
        let dir = tempdir().unwrap();
        write_scenario(
            dir.path(),
            "[[technologies]]
type = \"Load\"
name = \"site\"
load_column = \"site\"
",
        );
        let scenario = load_scenario(dir.path()).unwrap();
        assert_eq!(scenario.params().name, "test");
        assert_eq!(scenario.windows().len(), 1);
        assert_eq!(scenario.windows()[0].mask.len(), 2);
    }

    #[test]
    fn test_load_scenario_reports_all_bad_technologies() {
        let dir = tempdir().unwrap();
        write_scenario(
            dir.path(),
            "[[technologies]]
type = \"CHP\"
name = \"chp1\"
rated_power = 100.0
fuel_cost = 3.0
heat_rate = 9000.0
max_steam_ratio = 1.0

[[technologies]]
type = \"Load\"
name = \"site\"
load_column = \"missing\"
",
        );
        let err = load_scenario(dir.path()).unwrap_err();
        let Some(ModelError::Configuration(errors)) = err.downcast_ref::<ModelError>() else {
            panic!("Expected a configuration error");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("electric_heat_ratio"));
        assert!(errors[1].contains("missing"));
    }
}
