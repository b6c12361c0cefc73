//! Result tables produced once a scenario has been solved.
//!
//! Missing values (e.g. for a window which failed to solve) are represented as NaN.
use crate::technology::TechnologyType;
use crate::technology::rating::{RatedCapacity, Rating};
use crate::time_series::{TimeIndex, YearMonth};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;
use std::ops::Index;

/// Label of the column holding the site load before any load shifting
pub const TOTAL_ORIGINAL_LOAD: &str = "Total Original Load (kW)";
/// Label of the column holding the total site load
pub const TOTAL_LOAD: &str = "Total Load (kW)";
/// Label of the column holding total generation
pub const TOTAL_GENERATION: &str = "Total Generation (kW)";
/// Label of the column holding net storage power (discharge minus charge)
pub const TOTAL_STORAGE_POWER: &str = "Total Storage Power (kW)";
/// Label of the column holding the energy stored across all storage
pub const AGGREGATED_STATE_OF_ENERGY: &str = "Aggregated State of Energy (kWh)";
/// Label of the column holding the net load
pub const NET_LOAD: &str = "Net Load (kW)";

/// A table of results with one row per time step
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    timestamps: Vec<NaiveDateTime>,
    columns: IndexMap<String, Vec<f64>>,
}

impl TimeSeriesTable {
    /// An empty table covering `index`
    pub fn new(index: &TimeIndex) -> Self {
        Self {
            timestamps: index.timestamps().to_vec(),
            columns: IndexMap::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The timestamp of each row
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Add or replace a column
    pub fn insert(&mut self, label: impl Into<String>, values: Vec<f64>) {
        let label = label.into();
        assert_eq!(
            values.len(),
            self.len(),
            "Column {label} does not match the length of the table"
        );
        self.columns.insert(label, values);
    }

    /// The values in a column
    pub fn get(&self, label: &str) -> Option<&[f64]> {
        self.columns.get(label).map(Vec::as_slice)
    }

    /// Whether the table has a column called `label`
    pub fn contains(&self, label: &str) -> bool {
        self.columns.contains_key(label)
    }

    /// Remove a column, keeping the order of the others
    pub fn remove(&mut self, label: &str) -> Option<Vec<f64>> {
        self.columns.shift_remove(label)
    }

    /// Iterate over the column labels and values
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(label, values)| (label.as_str(), values.as_slice()))
    }

    /// Append all the columns of `other`
    pub fn extend(&mut self, other: TimeSeriesTable) {
        for (label, values) in other.columns {
            self.insert(label, values);
        }
    }
}

/// A table of results with one row per calendar month
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonthlyTable {
    months: Vec<YearMonth>,
    columns: IndexMap<String, Vec<f64>>,
}

impl MonthlyTable {
    /// An empty table with one row for each month covered by `index`
    pub fn new(index: &TimeIndex) -> Self {
        let mut months: Vec<_> = index.months().collect();
        months.dedup();
        Self {
            months,
            columns: IndexMap::new(),
        }
    }

    /// The (year, month) of each row
    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    /// Add or replace a column with one value per month
    pub fn insert(&mut self, label: impl Into<String>, values: Vec<f64>) {
        let label = label.into();
        assert_eq!(
            values.len(),
            self.months.len(),
            "Column {label} does not have one value per month"
        );
        self.columns.insert(label, values);
    }

    /// Add a column with the energy in each month, given a power series aligned with `index`.
    ///
    /// Missing values are skipped.
    pub fn insert_energy(&mut self, label: impl Into<String>, index: &TimeIndex, power: &[f64]) {
        let mut totals = vec![0.0; self.months.len()];
        for (month, value) in index.months().zip(power) {
            if let Some(row) = self.months.iter().position(|m| *m == month)
                && !value.is_nan()
            {
                totals[row] += value * index.dt();
            }
        }
        self.insert(label, totals);
    }

    /// The values in a column
    pub fn get(&self, label: &str) -> Option<&[f64]> {
        self.columns.get(label).map(Vec::as_slice)
    }

    /// Iterate over the column labels and values
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(label, values)| (label.as_str(), values.as_slice()))
    }

    /// Append all the columns of `other`
    pub fn extend(&mut self, other: MonthlyTable) {
        if self.months.is_empty() {
            self.months = other.months.clone();
        }
        for (label, values) in other.columns {
            self.insert(label, values);
        }
    }
}

/// A running total which one technology after another adds to
#[derive(Debug, Clone, PartialEq)]
pub struct TotalColumn(Vec<f64>);

impl TotalColumn {
    /// Add `values` to the total
    pub fn add(&mut self, values: &[f64]) {
        assert_eq!(values.len(), self.0.len(), "Series length does not match total");
        for (total, value) in self.0.iter_mut().zip(values) {
            *total += value;
        }
    }

    /// The accumulated values
    pub fn into_values(self) -> Vec<f64> {
        self.0
    }
}

/// The system-wide totals included in the merged time series report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTotals {
    /// Site load before any load shifting
    pub original_load: TotalColumn,
    /// Site load, including vehicle charging
    pub load: TotalColumn,
    /// Generation from dispatchable and intermittent sources
    pub generation: TotalColumn,
    /// Net storage power (discharge minus charge)
    pub storage_power: TotalColumn,
    /// Energy stored in batteries and vehicles
    pub state_of_energy: TotalColumn,
}

impl ReportTotals {
    /// Zeroed totals for `len` time steps
    pub fn new(len: usize) -> Self {
        let zeros = TotalColumn(vec![0.0; len]);
        Self {
            original_load: zeros.clone(),
            load: zeros.clone(),
            generation: zeros.clone(),
            storage_power: zeros.clone(),
            state_of_energy: zeros,
        }
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.load.0.len()
    }

    /// Whether there are no time steps
    pub fn is_empty(&self) -> bool {
        self.load.0.is_empty()
    }
}

/// The capacity outcome for one technology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizingRow {
    /// Unique identifier of the technology
    #[serde(rename = "DER")]
    pub der: String,
    /// Category of the technology
    #[serde(rename = "Technology Type")]
    pub technology_type: String,
    /// Rated (or optimal) power
    #[serde(rename = "Power Capacity (kW)")]
    pub power_capacity: Option<f64>,
    /// Rated (or optimal) energy
    #[serde(rename = "Energy Capacity (kWh)")]
    pub energy_capacity: Option<f64>,
    /// Lower bound given for power sizing
    #[serde(rename = "Power Min (kW)")]
    pub power_min: Option<f64>,
    /// Upper bound given for power sizing
    #[serde(rename = "Power Max (kW)")]
    pub power_max: Option<f64>,
}

impl SizingRow {
    /// A row with no capacities filled in
    pub fn new(der: String, technology_type: TechnologyType) -> Self {
        Self {
            der,
            technology_type: technology_type.to_string(),
            power_capacity: None,
            energy_capacity: None,
            power_min: None,
            power_max: None,
        }
    }

    /// Fill in the power columns from a rated capacity
    pub fn set_power(&mut self, rated: &RatedCapacity) {
        self.power_capacity = rated.value();
        if let Rating::Sized { min, max } = rated.rating() {
            self.power_min = Some(min);
            self.power_max = max;
        }
    }
}

/// The capacity outcome for every technology, indexable by DER identifier
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SizingTable(IndexMap<String, SizingRow>);

impl SizingTable {
    /// The row for one technology
    pub fn get(&self, der: &str) -> Option<&SizingRow> {
        self.0.get(der)
    }

    /// Iterate over the rows
    pub fn rows(&self) -> impl Iterator<Item = &SizingRow> {
        self.0.values()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SizingRow> for SizingTable {
    fn from_iter<I: IntoIterator<Item = SizingRow>>(iter: I) -> Self {
        Self(iter.into_iter().map(|row| (row.der.clone(), row)).collect())
    }
}

impl Index<&str> for SizingTable {
    type Output = SizingRow;

    fn index(&self, der: &str) -> &SizingRow {
        self.get(der)
            .unwrap_or_else(|| panic!("No sizing results for {der}"))
    }
}

/// Label of the proforma row holding one-off capital costs
pub const CAPEX_YEAR: &str = "CAPEX Year";
/// Label of the proforma column holding the sum of each row
pub const YEARLY_NET_VALUE: &str = "Yearly Net Value";

/// Costs and benefits by year, with costs shown as negative values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProformaTable {
    columns: Vec<String>,
    rows: IndexMap<String, Vec<f64>>,
}

impl ProformaTable {
    /// An empty table with one column per cost label plus the yearly net value
    pub fn new(labels: impl IntoIterator<Item = String>) -> Self {
        let mut columns: Vec<_> = labels.into_iter().collect();
        columns.push(YEARLY_NET_VALUE.to_string());
        Self {
            columns,
            rows: IndexMap::new(),
        }
    }

    /// Add a row given a value for each cost label (missing labels count as zero)
    pub fn add_row(&mut self, label: impl Into<String>, values: &IndexMap<String, f64>) {
        let labels = &self.columns[..self.columns.len() - 1];
        let mut row: Vec<f64> = labels
            .iter()
            .map(|label| values.get(label).copied().unwrap_or(0.0))
            .collect();
        row.push(row.iter().sum());
        self.rows.insert(label.into(), row);
    }

    /// The column labels
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Iterate over the row labels and values
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.rows
            .iter()
            .map(|(label, values)| (label.as_str(), values.as_slice()))
    }

    /// The value in one cell
    pub fn value(&self, row: &str, column: &str) -> Option<f64> {
        let column = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|values| values[column])
    }
}
