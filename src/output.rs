//! The module responsible for writing output data to disk.
use crate::report::{MonthlyTable, ProformaTable, SizingTable, TimeSeriesTable};
use crate::scenario::Results;
use anyhow::{Context, Result, ensure};
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which scenario-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "microgrid_results";

/// The output file name for the time series results
const TIMESERIES_FILE_NAME: &str = "timeseries_results.csv";

/// The output file name for the monthly results
const MONTHLY_FILE_NAME: &str = "monthly_data.csv";

/// The output file name for the sizing results
const SIZE_FILE_NAME: &str = "size.csv";

/// The output file name for the proforma
const PROFORMA_FILE_NAME: &str = "pro_forma.csv";

/// Format of the timestamps in the time series results
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Get the default output directory for the scenario in `scenario_dir`
pub fn get_output_dir(scenario_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let scenario_dir = scenario_dir
        .canonicalize()
        .context("Could not resolve path to scenario")?;

    let scenario_name = scenario_dir
        .file_name()
        .context("Scenario cannot be in root folder")?
        .to_str()
        .context("Invalid chars in scenario dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, scenario_name].iter().collect())
}

/// Create a new output directory.
///
/// If the directory already exists and is not empty, it is only reused if `allow_overwrite` is
/// true, in which case its contents are deleted.
///
/// # Returns
///
/// Whether an existing directory's contents were deleted.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let is_empty = match fs::read_dir(output_dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    };
    if !is_empty {
        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
    }

    fs::create_dir_all(output_dir)?;

    Ok(!is_empty)
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn write_timeseries(path: &Path, table: &TimeSeriesTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let columns: Vec<_> = table.columns().collect();
    writer.write_record(
        std::iter::once("Start Datetime (hb)").chain(columns.iter().map(|(label, _)| *label)),
    )?;
    for (row, timestamp) in table.timestamps().iter().enumerate() {
        writer.write_record(
            std::iter::once(timestamp.format(TIMESTAMP_FORMAT).to_string())
                .chain(columns.iter().map(|(_, values)| format_value(values[row]))),
        )?;
    }
    writer.flush()?;

    Ok(())
}

fn write_monthly(path: &Path, table: &MonthlyTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let columns: Vec<_> = table.columns().collect();
    writer.write_record(
        ["Year", "Month"]
            .into_iter()
            .chain(columns.iter().map(|(label, _)| *label)),
    )?;
    for (row, (year, month)) in table.months().iter().enumerate() {
        writer.write_record(
            [year.to_string(), month.to_string()]
                .into_iter()
                .chain(columns.iter().map(|(_, values)| format_value(values[row]))),
        )?;
    }
    writer.flush()?;

    Ok(())
}

fn write_sizing(path: &Path, table: &SizingTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in table.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

fn write_proforma(path: &Path, table: &ProformaTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(
        std::iter::once("").chain(table.columns().iter().map(String::as_str)),
    )?;
    for (label, values) in table.rows() {
        writer.write_record(
            std::iter::once(label.to_string()).chain(values.iter().map(|v| format_value(*v))),
        )?;
    }
    writer.flush()?;

    Ok(())
}

/// Write all of a scenario's results to `output_dir`
pub fn write_results(output_dir: &Path, results: &Results) -> Result<()> {
    let write_file = |file_name: &str, write: &dyn Fn(&Path) -> Result<()>| {
        let path = output_dir.join(file_name);
        write(&path).with_context(|| format!("Failed to write {}", path.display()))
    };

    write_file(TIMESERIES_FILE_NAME, &|path| {
        write_timeseries(path, &results.timeseries)
    })?;
    write_file(MONTHLY_FILE_NAME, &|path| write_monthly(path, &results.monthly))?;
    write_file(SIZE_FILE_NAME, &|path| write_sizing(path, &results.sizing))?;
    write_file(PROFORMA_FILE_NAME, &|path| {
        write_proforma(path, &results.proforma)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::time_index;
    use crate::report::SizingRow;
    use crate::technology::TechnologyType;
    use indexmap::indexmap;
    use tempfile::tempdir;

    #[test]
    fn test_create_output_directory_new_directory() {
        let temp_dir = tempdir().unwrap();
        let output_dir = temp_dir.path().join("new");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_existing_non_empty() {
        let temp_dir = tempdir().unwrap();
        let output_dir = temp_dir.path().join("out");
        fs::create_dir(&output_dir).unwrap();
        fs::write(output_dir.join("file.txt"), "").unwrap();

        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(output_dir.is_dir());
        assert!(!output_dir.join("file.txt").exists());
    }

    fn results() -> Results {
        let index = time_index(2);
        let mut timeseries = TimeSeriesTable::new(&index);
        timeseries.insert("Total Load (kW)", vec![1.5, f64::NAN]);
        let mut monthly = MonthlyTable::new(&index);
        monthly.insert_energy("Energy (kWh)", &index, &[1.0, 2.0]);
        let mut proforma = ProformaTable::new(["Fuel Cost".to_string()]);
        proforma.add_row("2017", &indexmap! {"Fuel Cost".to_string() => -3.0});

        Results {
            sizing: [SizingRow::new("PV: pv".into(), TechnologyType::IntermittentResource)]
                .into_iter()
                .collect(),
            timeseries,
            monthly,
            proforma,
            failed_windows: Vec::new(),
        }
    }

    #[test]
    fn test_write_results() {
        let dir = tempdir().unwrap();
        write_results(dir.path(), &results()).unwrap();

        let timeseries = fs::read_to_string(dir.path().join(TIMESERIES_FILE_NAME)).unwrap();
        assert_eq!(
            timeseries,
            "Start Datetime (hb),Total Load (kW)\n2017-01-01 00:00,1.5\n2017-01-01 01:00,\n"
        );
        let monthly = fs::read_to_string(dir.path().join(MONTHLY_FILE_NAME)).unwrap();
        assert_eq!(monthly, "Year,Month,Energy (kWh)\n2017,1,3\n");
        let proforma = fs::read_to_string(dir.path().join(PROFORMA_FILE_NAME)).unwrap();
        assert_eq!(proforma, ",Fuel Cost,Yearly Net Value\n2017,-3,-3\n");
        let size = fs::read_to_string(dir.path().join(SIZE_FILE_NAME)).unwrap();
        assert!(size.starts_with("DER,Technology Type,"));
        assert!(size.contains("PV: pv,Intermittent Resource"));
    }
}
