//! pixgain-io: Memory-mapped event I/O and calibration output for pixgain.
//!
//! This crate reads fixed-record binary event files through memmap2 and
//! writes gain maps, spectra, fit diagnostics and JSON reports.
//!

mod config;
mod error;
mod reader;
pub mod record;
mod writer;

pub use config::{load_config, save_config};
pub use error::{Error, Result};
pub use reader::{EventFileReader, MappedFileReader};
pub use record::{EventRecord, RECORD_SIZE};
pub use writer::{
    read_gain_map, write_diagnostics_csv, write_gain_map, write_report_json, write_spectrum,
    EventFileWriter,
};
