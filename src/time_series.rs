//! Time indexes, masks and optimisation windows.
//!
//! All series in a scenario share one [`TimeIndex`]. An optimisation window is described by a
//! [`Mask`], which selects the rows of the index belonging to that window.
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, NaiveDateTime};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::Error;
use std::fmt::Display;
use std::str::FromStr;

/// A year and month pair, used to label monthly results
pub type YearMonth = (i32, u32);

/// The timestamps of a scenario along with the length of each time step
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndex {
    timestamps: Vec<NaiveDateTime>,
    /// Length of each time step, in hours
    dt: f64,
}

impl TimeIndex {
    /// Create a new [`TimeIndex`].
    ///
    /// Timestamps must be strictly increasing.
    pub fn new(timestamps: Vec<NaiveDateTime>, dt: f64) -> Result<Self> {
        ensure!(!timestamps.is_empty(), "Time index cannot be empty");
        ensure!(
            dt.is_finite() && dt > 0.0,
            "Time step must be a positive number of hours"
        );
        ensure!(
            timestamps.windows(2).all(|pair| pair[0] < pair[1]),
            "Timestamps must be in strictly increasing order"
        );

        Ok(Self { timestamps, dt })
    }

    /// Create an index of `len` evenly spaced time steps starting at `start`
    pub fn regular(start: NaiveDateTime, len: usize, dt: f64) -> Result<Self> {
        let step = chrono::Duration::milliseconds((dt * 3_600_000.0).round() as i64);
        let timestamps = (0..len)
            .map(|i| start + step * i32::try_from(i).unwrap_or(i32::MAX))
            .collect();
        Self::new(timestamps, dt)
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the index has no time steps
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Length of each time step, in hours
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The timestamps in this index
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// The distinct years covered by the index, in order
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.timestamps.iter().map(Datelike::year).collect();
        years.dedup();
        years
    }

    /// The (year, month) of each time step
    pub fn months(&self) -> impl Iterator<Item = YearMonth> + '_ {
        self.timestamps.iter().map(|ts| (ts.year(), ts.month()))
    }

    /// Keep only the time steps falling in one of `years`, along with the matching row numbers
    pub fn filter_years(&self, years: &[i32]) -> Result<(Self, Vec<usize>)> {
        for year in years {
            ensure!(
                self.timestamps.iter().any(|ts| ts.year() == *year),
                "No time series data found for optimisation year {year}"
            );
        }

        let (rows, timestamps): (Vec<_>, Vec<_>) = self
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, ts)| years.contains(&ts.year()))
            .map(|(row, ts)| (row, *ts))
            .unzip();

        Ok((Self::new(timestamps, self.dt)?, rows))
    }

    /// Split the index into optimisation windows
    pub fn windows(&self, level: WindowLevel) -> Vec<Window> {
        let mut groups: IndexMap<String, Vec<bool>> = IndexMap::new();
        for (row, ts) in self.timestamps.iter().enumerate() {
            let label = match level {
                WindowLevel::Year => ts.year().to_string(),
                WindowLevel::Month => format!("{}-{:02}", ts.year(), ts.month()),
                WindowLevel::Steps(steps) => format!("window {}", row / steps + 1),
            };
            groups
                .entry(label)
                .or_insert_with(|| vec![false; self.len()])[row] = true;
        }

        groups
            .into_iter()
            .map(|(label, selected)| {
                let first = selected.iter().position(|s| *s).unwrap_or_default();
                Window {
                    label,
                    year: self.timestamps[first].year(),
                    mask: Mask::new(selected),
                }
            })
            .collect()
    }
}

/// How the time index is split into optimisation windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowLevel {
    /// One window per calendar month
    #[default]
    Month,
    /// One window per calendar year
    Year,
    /// Consecutive windows of a fixed number of time steps
    Steps(usize),
}

impl FromStr for WindowLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => {
                let steps: usize = other
                    .parse()
                    .with_context(|| format!("Invalid window '{s}': expected month, year or a number of time steps"))?;
                ensure!(steps > 0, "Window length must be at least one time step");
                Ok(Self::Steps(steps))
            }
        }
    }
}

impl<'de> Deserialize<'de> for WindowLevel {
    fn deserialize<D>(deserialiser: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserialiser)?;
        s.parse().map_err(|err: anyhow::Error| D::Error::custom(err))
    }
}

impl Display for WindowLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
            Self::Steps(steps) => write!(f, "{steps}"),
        }
    }
}

/// Selects the rows of a [`TimeIndex`] that belong to one optimisation window
#[derive(Debug, Clone, PartialEq)]
pub struct Mask(Vec<bool>);

impl Mask {
    /// Create a new [`Mask`]
    pub fn new(selected: Vec<bool>) -> Self {
        Self(selected)
    }

    /// A mask selecting every row of an index of length `len`
    pub fn all(len: usize) -> Self {
        Self(vec![true; len])
    }

    /// Length of the underlying index
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the underlying index is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of selected rows, i.e. the window size
    pub fn count(&self) -> usize {
        self.0.iter().filter(|s| **s).count()
    }

    /// Iterate over the row numbers of the selected rows
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, selected)| **selected)
            .map(|(row, _)| row)
    }

    /// Pick out the selected values from a full-length slice
    pub fn select<T: Copy>(&self, values: &[T]) -> Vec<T> {
        assert_eq!(values.len(), self.len(), "Series length does not match mask");
        self.rows().map(|row| values[row]).collect()
    }
}

/// One optimisation window
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Human-readable label (e.g. `2017-03`)
    pub label: String,
    /// The year of the first time step in the window
    pub year: i32,
    /// The rows of the index covered by this window
    pub mask: Mask,
}

/// A series of values aligned with the scenario's [`TimeIndex`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries(Vec<f64>);

impl TimeSeries {
    /// Create a new [`TimeSeries`]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// A series of `len` copies of `value`
    pub fn constant(value: f64, len: usize) -> Self {
        Self(vec![value; len])
    }

    /// The underlying values
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the series is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The values that fall inside the window selected by `mask`
    pub fn masked(&self, mask: &Mask) -> Vec<f64> {
        mask.select(&self.0)
    }

    /// Multiply every value by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|v| v * factor).collect())
    }

    /// Keep only the given rows
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self(rows.iter().map(|row| self.0[*row]).collect())
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 1, 31)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_time_index_rejects_unordered() {
        let ts = start();
        assert!(TimeIndex::new(vec![ts, ts], 1.0).is_err());
        assert!(TimeIndex::new(vec![], 1.0).is_err());
        assert!(TimeIndex::new(vec![ts], 0.0).is_err());
    }

    #[test]
    fn test_monthly_windows() {
        let index = TimeIndex::regular(start(), 4, 1.0).unwrap();
        let windows = index.windows(WindowLevel::Month);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].label, "2017-01");
        assert_eq!(windows[0].mask.count(), 2);
        assert_eq!(windows[1].label, "2017-02");
        assert_eq!(windows[1].mask.rows().collect::<Vec<_>>(), [2, 3]);
    }

    #[test]
    fn test_step_windows() {
        let index = TimeIndex::regular(start(), 5, 1.0).unwrap();
        let windows = index.windows(WindowLevel::Steps(2));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].mask.count(), 1);
        assert_eq!(windows[2].year, 2017);
    }

    #[rstest]
    #[case("month", WindowLevel::Month)]
    #[case("Year", WindowLevel::Year)]
    #[case("24", WindowLevel::Steps(24))]
    fn test_window_level_from_str(#[case] input: &str, #[case] expected: WindowLevel) {
        assert_eq!(input.parse::<WindowLevel>().unwrap(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("fortnight")]
    fn test_window_level_from_str_invalid(#[case] input: &str) {
        assert!(input.parse::<WindowLevel>().is_err());
    }

    #[test]
    fn test_masked_series() {
        let series = TimeSeries::new(vec![1.0, 2.0, 3.0]);
        let mask = Mask::new(vec![false, true, true]);
        assert_eq!(series.masked(&mask), [2.0, 3.0]);
    }

    #[test]
    fn test_filter_years() {
        let index = TimeIndex::regular(start(), 3, 1.0).unwrap();
        assert!(index.filter_years(&[2018]).is_err());
        let (filtered, rows) = index.filter_years(&[2017]).unwrap();
        assert_eq!(filtered.len(), 3);
        assert_eq!(rows, [0, 1, 2]);
    }
}
