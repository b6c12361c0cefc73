//! Integration tests for the `validate` command.
use microgrid::cli::handle_validate_command;
use microgrid::error::ModelError;
use microgrid::log::is_logger_initialised;
use microgrid::settings::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Get the path to a demo scenario.
fn get_scenario_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("MICROGRID_LOG_LEVEL", "off") };

    for demo in ["chp_site", "deferral_sizing"] {
        handle_validate_command(&get_scenario_dir(demo), Some(Settings::default())).unwrap();
    }

    assert!(is_logger_initialised());
}

/// Sizing storage power with the binary formulation is rejected before anything is solved
#[test]
fn test_validate_binary_power_sizing() {
    unsafe { std::env::set_var("MICROGRID_LOG_LEVEL", "off") };

    let source = get_scenario_dir("deferral_sizing");
    let dir = tempdir().unwrap();
    for file_name in ["timeseries.csv", "deferral.csv"] {
        fs::copy(source.join(file_name), dir.path().join(file_name)).unwrap();
    }
    let scenario = fs::read_to_string(source.join("scenario.toml"))
        .unwrap()
        .replace("window = \"year\"", "window = \"year\"\nbinary = true");
    fs::write(dir.path().join("scenario.toml"), scenario).unwrap();

    let err = handle_validate_command(dir.path(), Some(Settings::default())).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelError>(),
        Some(ModelError::FormulationConflict(_))
    ));
}
