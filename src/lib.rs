//! Sizing and dispatch optimisation for distributed energy resources (DERs) at a site.
//!
//! A scenario describes the DERs behind one point of interconnection (POI), the site loads they
//! serve and the value streams they earn. The time horizon is split into windows and one linear
//! (or mixed-integer) problem is built and solved for each window with HiGHS.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod error;
pub mod finance;
pub mod input;
pub mod log;
pub mod optimisation;
pub mod output;
pub mod poi;
pub mod report;
pub mod scenario;
pub mod settings;
pub mod technology;
pub mod time_series;
pub mod units;
pub mod value_stream;

#[cfg(test)]
mod fixture;

/// Get the directory where program settings are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("microgrid");
    path
}
