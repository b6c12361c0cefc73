//! Logging for the microgrid program.
//!
//! Messages below warning level go to stdout and warnings and errors go to stderr, coloured when
//! writing to a terminal. When an output directory is available, the same messages are also
//! written to two log files in it.
use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// Environment variable which overrides the log level in the settings file
pub const LOG_LEVEL_ENV_VAR: &str = "MICROGRID_LOG_LEVEL";

/// Used if no log level is given in the environment or the settings file
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file for messages about normal operation
const LOG_INFO_FILE_NAME: &str = "microgrid_info.log";

/// Log file for warnings and errors
const LOG_ERROR_FILE_NAME: &str = "microgrid_error.log";

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Whether [`init`] has already been called successfully
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Parse a log level name (`off`, `error`, `warn`, `info`, `debug` or `trace`)
pub fn parse_log_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse()
        .ok()
        .with_context(|| format!("Unknown log level: {level}"))
}

/// Choose the log level: the environment variable wins over the settings file
fn choose_log_level(from_env: Option<String>, from_settings: Option<&str>) -> Result<LevelFilter> {
    let level = from_env.unwrap_or_else(|| from_settings.unwrap_or(DEFAULT_LOG_LEVEL).to_string());
    parse_log_level(&level)
}

/// Initialise the program logger.
///
/// # Arguments
///
/// * `log_level_from_settings` - The log level given in `settings.toml`, if any
/// * `log_file_dir` - If given, `microgrid_info.log` and `microgrid_error.log` are created here
pub fn init(log_level_from_settings: Option<&str>, log_file_dir: Option<&Path>) -> Result<()> {
    let log_level = choose_log_level(env::var(LOG_LEVEL_ENV_VAR).ok(), log_level_from_settings)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let colour_stdout = std::io::stdout().is_terminal();
    let colour_stderr = std::io::stderr().is_terminal();

    let mut dispatch = Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, colour_stdout, &colours);
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, colour_stderr, &colours);
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );

    if let Some(dir) = log_file_dir {
        let create = |file_name: &str| {
            let path = dir.join(file_name);
            File::create(&path)
                .with_context(|| format!("Could not create log file {}", path.display()))
        };
        dispatch = dispatch
            .chain(
                Dispatch::new()
                    .filter(|metadata| metadata.level() > LevelFilter::Warn)
                    .format(write_log_plain)
                    .level(log_level.max(LevelFilter::Info))
                    .chain(create(LOG_INFO_FILE_NAME)?),
            )
            .chain(
                Dispatch::new()
                    .format(write_log_plain)
                    .level(LevelFilter::Warn)
                    .chain(create(LOG_ERROR_FILE_NAME)?),
            );
    }

    dispatch.apply().context("Logger already initialised")?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");
    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log_plain(out, message, record);
    }
}
