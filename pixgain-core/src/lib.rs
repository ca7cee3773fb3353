//! pixgain-core: Core types for pixel detector gain calibration.
//!
//! This crate provides the data model shared by the calibration pipeline:
//! events and event tables, calibration lines, the per-pixel gain map,
//! energy spectra, and run configuration.
//!

pub mod config;
pub mod error;
pub mod event;
pub mod gain;
pub mod line;
pub mod soa;
pub mod spectrum;

pub use config::{CalibrationConfig, DEFAULT_MIN_VALID_TEMPERATURE};
pub use error::{Error, Result};
pub use event::{is_calibration_candidate, is_valid_temperature, Event, Neighborhood, PixelCoord};
pub use gain::{FitDiagnostics, GainMap, GainSummary, PaddedGrid, PixelGain};
pub use line::CalibrationLine;
pub use soa::EventTable;
pub use spectrum::{Spectrum, SpectrumConfig};
