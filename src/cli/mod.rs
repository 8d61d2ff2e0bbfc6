//! Command line interface.

pub mod command;

use std::path::PathBuf;
use std::time::Duration;

use clap::{command, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::SearchCriteria;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory for downloaded and derived data
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the ESGF catalog and download the raw ensemble
    Download {
        /// Search criteria preset
        #[arg(long, value_enum, default_value = "sw")]
        case: Case,
        /// Clear a pre-existing download folder first
        #[arg(long)]
        clear: bool,
        /// Keep only the first variant of each model
        #[arg(long)]
        one_variant_per_model: bool,
    },
    /// Collapse the downloaded series into monthly climatologies
    Climatology {
        #[arg(long, value_enum, default_value = "sw")]
        case: Case,
    },
    /// Regrid the climatology ensemble onto its common coarse grid
    Regrid {
        #[arg(long, value_enum, default_value = "sw")]
        case: Case,
    },
    /// Tabulate area-weighted spatial averages of the regridded ensemble
    Table {
        /// Output parquet file (defaults to a dated file in the home folder)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Search criteria presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Case {
    /// Short-wave aerosol-forcing variables, all complete runs
    Sw,
    /// Same variables, restricted to the Zelinka et al. (2023) runs
    ZelinkaSw,
}

impl Case {
    pub fn criteria(self) -> SearchCriteria {
        match self {
            Case::Sw => SearchCriteria::shortwave(),
            Case::ZelinkaSw => SearchCriteria::zelinka_shortwave(),
        }
    }
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}
