//! The command line interface for the program.
use crate::input::load_scenario;
use crate::log;
use crate::output::{create_output_directory, get_output_dir, write_results};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// The command line interface for the program.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Optimise the sizing and dispatch of a scenario's DERs.
    Run {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Check that a scenario can be loaded, without optimising it.
    Validate {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { scenario_dir, opts } => handle_run_command(&scenario_dir, &opts, None),
            Self::Validate { scenario_dir } => handle_validate_command(&scenario_dir, None),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Handle the `run` command.
///
/// # Arguments
///
/// * `scenario_path` - Folder containing the scenario files
/// * `opts` - Options given on the command line
/// * `settings` - Program settings (read from the settings file if `None`)
pub fn handle_run_command(
    scenario_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(scenario_path)?,
    };
    let overwrite = opts.overwrite || settings.overwrite;
    let overwritten = create_output_directory(&output_path, overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    // Logging may already be set up if several scenarios run in one process
    if !log::is_logger_initialised() {
        log::init(settings.log_level.as_deref(), Some(&output_path))
            .context("Failed to initialise logging.")?;
    }

    let scenario = load_scenario(scenario_path).context("Failed to load scenario.")?;
    info!(
        "Loaded scenario '{}' from {}",
        scenario.params().name,
        scenario_path.display()
    );
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwritten {
        warn!("Output folder will be overwritten");
    }

    let results = scenario.run();
    write_results(&output_path, &results)?;
    if results.failed_windows.is_empty() {
        info!("Optimisation complete!");
    } else {
        warn!(
            "Optimisation complete, but these windows could not be solved: {}",
            results
                .failed_windows
                .iter()
                .map(|window| window.label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(scenario_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };

    // We don't save log files when validating
    if !log::is_logger_initialised() {
        log::init(settings.log_level.as_deref(), None).context("Failed to initialise logging.")?;
    }

    load_scenario(scenario_path).context("Failed to validate scenario.")?;
    info!("Scenario validation successful!");

    Ok(())
}
