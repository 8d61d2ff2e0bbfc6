pub mod climatology;
pub mod download;
pub mod regrid;
pub mod table;

use std::path::PathBuf;

use chrono::{Datelike, Local};

pub use climatology::climatology;
pub use download::download;
pub use regrid::regrid;
pub use table::table;

/// Sub-folder of the data directory holding the raw downloads.
pub const DOWNLOADS_DIR: &str = "downloads";

/// Sub-folder holding the per-member climatology store.
pub const CLIMATOLOGIES_DIR: &str = "climatologies";

/// Sub-folder holding the regridded store.
pub const REGRIDDED_DIR: &str = "regridded";

/// Root directory for downloaded and derived data when none is given.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cmip6prep-data")
}

pub fn make_table_file_name() -> PathBuf {
    let today = Local::now();
    let file_name = format!(
        "cmip6prep-spatial-averages-{}-{:02}-{:02}.parquet",
        today.year(),
        today.month(),
        today.day()
    );

    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(file_name)
}
