//! pixgain-algorithms: gain calibration of pixelated spectroscopic detectors.
//!
//! The pipeline has three stages:
//! - **Fit** a Gaussian to each pixel's pulse-height histogram around a
//!   known emission line and derive a gain in keV per channel
//! - **Interpolate** missing gains from their fitted 3x3 neighbors
//! - **Reconstruct** event energies from charge spread over a 3x3
//!   neighborhood and histogram them into a spectrum
//!
#![warn(missing_docs)]

mod gaussian;
mod histogram;
mod interpolate;
pub mod lm;
mod pixel_fit;
mod processing;
mod reconstruct;
mod window;

pub use gaussian::{
    fwhm_with_error, FitOutcome, GaussianParams, LevMarFitter, PeakFitter, FWHM_PER_SIGMA,
};
pub use histogram::ChannelHistogram;
pub use interpolate::{GainInterpolator, InterpolationOutcome};
pub use lm::LmConfig;
pub use pixel_fit::{FitError, PeakFit, PixelFitOutput, PixelGainFitter};
pub use processing::{
    calibrate, calibrate_with, reconstruct_spectrum, Calibration, CalibrationReport,
};
pub use reconstruct::{event_energy, SpectrumReconstructor};
pub use window::ValidityWindow;

// Re-export core calibration types
pub use pixgain_core::{CalibrationConfig, CalibrationLine, GainMap, Spectrum, SpectrumConfig};
