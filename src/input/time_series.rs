//! Code for reading the scenario's time series data from a CSV file.
//!
//! The first column holds the timestamps (`YYYY-MM-DD HH:MM`); every other column is a named
//! series of values, one per time step.
use super::input_err_msg;
use crate::time_series::{TimeIndex, TimeSeries};
use crate::units::KW_PER_BTU_PER_HOUR;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::io::Read;
use std::path::Path;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Time series columns sharing one time index
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesData {
    index: TimeIndex,
    columns: IndexMap<String, TimeSeries>,
}

impl TimeSeriesData {
    /// The time index shared by every column
    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Result<TimeSeries> {
        self.columns
            .get(name)
            .cloned()
            .with_context(|| format!("Time series column '{name}' not found"))
    }

    /// Get a column if a name is given
    pub fn optional_column(&self, name: Option<&str>) -> Result<Option<TimeSeries>> {
        name.map(|name| self.column(name)).transpose()
    }

    /// Get a thermal load column given in BTU/hr, converted to kW
    pub fn thermal_load(&self, name: Option<&str>) -> Result<Option<TimeSeries>> {
        Ok(self
            .optional_column(name)?
            .map(|load| load.scaled(KW_PER_BTU_PER_HOUR)))
    }

    /// Keep only the time steps falling in the given years
    pub fn for_years(self, years: &[i32]) -> Result<Self> {
        let (index, rows) = self.index.filter_years(years)?;
        let columns = self
            .columns
            .into_iter()
            .map(|(name, series)| (name, series.take_rows(&rows)))
            .collect();

        Ok(Self { index, columns })
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
        .with_context(|| format!("Invalid timestamp '{value}'"))
}

fn read_time_series_from_reader<R: Read>(reader: R, dt: f64) -> Result<TimeSeriesData> {
    let mut reader = csv::Reader::from_reader(reader);
    let names: Vec<String> = reader
        .headers()?
        .iter()
        .skip(1)
        .map(|name| name.trim().to_string())
        .collect();

    let mut timestamps = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let mut fields = record.iter();
        let timestamp = fields.next().context("Empty row")?;
        timestamps.push(parse_timestamp(timestamp).with_context(|| format!("Row {}", row + 1))?);
        for (column, field) in values.iter_mut().zip(fields) {
            let value = field.trim().parse::<f64>().with_context(|| {
                format!("Invalid value '{field}' on row {}", row + 1)
            })?;
            column.push(value);
        }
    }
    ensure!(
        values.iter().all(|column| column.len() == timestamps.len()),
        "Every row must have a value for every column"
    );

    Ok(TimeSeriesData {
        index: TimeIndex::new(timestamps, dt)?,
        columns: names
            .into_iter()
            .zip(values)
            .map(|(name, values)| (name, TimeSeries::new(values)))
            .collect(),
    })
}

/// Read time series data from a CSV file.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `dt` - Length of each time step, in hours
pub fn read_time_series(file_path: &Path, dt: f64) -> Result<TimeSeriesData> {
    let file = std::fs::File::open(file_path).with_context(|| input_err_msg(file_path))?;
    read_time_series_from_reader(file, dt).with_context(|| input_err_msg(file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    const CSV: &str = "Datetime,Site Load (kW),Site Steam Thermal Load (BTU/hr)
2016-12-31 23:00,5.0,0.0
2017-01-01 00:00,10.0,1000000.0
2017-01-01 01:00:00,20.0,0.0
";

    #[test]
    fn test_read_time_series() {
        let data = read_time_series_from_reader(CSV.as_bytes(), 1.0).unwrap();
        assert_eq!(data.index().len(), 3);
        assert_eq!(data.column("Site Load (kW)").unwrap().values(), [5.0, 10.0, 20.0]);
        assert!(data.column("Nothing").is_err());
        assert_eq!(data.optional_column(None).unwrap(), None);
    }

    #[test]
    fn test_thermal_load_converted_to_kw() {
        let data = read_time_series_from_reader(CSV.as_bytes(), 1.0).unwrap();
        let load = data
            .thermal_load(Some("Site Steam Thermal Load (BTU/hr)"))
            .unwrap()
            .unwrap();
        assert_approx_eq!(f64, load.values()[1], 293.071, epsilon = 1e-9);
    }

    #[test]
    fn test_for_years() {
        let data = read_time_series_from_reader(CSV.as_bytes(), 1.0)
            .unwrap()
            .for_years(&[2017])
            .unwrap();
        assert_eq!(data.index().len(), 2);
        assert_eq!(data.column("Site Load (kW)").unwrap().values(), [10.0, 20.0]);
    }

    #[test]
    fn test_bad_value() {
        let csv = "Datetime,load\n2017-01-01 00:00,abc\n";
        assert!(read_time_series_from_reader(csv.as_bytes(), 1.0).is_err());
    }
}
