//! Calibration run configuration.

use crate::error::{Error, Result};
use crate::spectrum::SpectrumConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default temperature an event must exceed to be valid (°C).
pub const DEFAULT_MIN_VALID_TEMPERATURE: f64 = -20.0;

/// Configuration for a calibration run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalibrationConfig {
    /// Side length of the square pixel grid.
    pub grid_size: usize,
    /// Events are valid while the detector temperature is strictly above this (°C).
    pub min_valid_temperature: f64,
    /// Upper bound of the channel histogram (exclusive).
    pub max_channel: usize,
    /// Channels fitted below the centroid.
    pub fit_window_below: usize,
    /// Channels fitted from the centroid upwards (exclusive).
    pub fit_window_above: usize,
    /// Initial Gaussian width guess (channels).
    pub initial_stddev: f64,
    /// Number of neighbor interpolation passes.
    pub interpolation_passes: usize,
    /// Spectrum binning.
    pub spectrum: SpectrumConfig,
    /// Fit pixels on the rayon thread pool.
    pub parallel: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            grid_size: 32,
            min_valid_temperature: DEFAULT_MIN_VALID_TEMPERATURE,
            max_channel: 10_000,
            fit_window_below: 100,
            fit_window_above: 200,
            initial_stddev: 75.0,
            interpolation_passes: 2,
            spectrum: SpectrumConfig::default(),
            parallel: true,
        }
    }
}

impl CalibrationConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grid size.
    #[must_use]
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Sets the validity temperature threshold.
    #[must_use]
    pub fn with_min_valid_temperature(mut self, temperature: f64) -> Self {
        self.min_valid_temperature = temperature;
        self
    }

    /// Sets the channel histogram bound.
    #[must_use]
    pub fn with_max_channel(mut self, max_channel: usize) -> Self {
        self.max_channel = max_channel;
        self
    }

    /// Sets the fit window around the centroid.
    #[must_use]
    pub fn with_fit_window(mut self, below: usize, above: usize) -> Self {
        self.fit_window_below = below;
        self.fit_window_above = above;
        self
    }

    /// Sets the number of interpolation passes.
    #[must_use]
    pub fn with_interpolation_passes(mut self, passes: usize) -> Self {
        self.interpolation_passes = passes;
        self
    }

    /// Sets the spectrum binning.
    #[must_use]
    pub fn with_spectrum(mut self, spectrum: SpectrumConfig) -> Self {
        self.spectrum = spectrum;
        self
    }

    /// Enables or disables parallel pixel fitting.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns an error for a zero grid, a channel bound that leaves no
    /// histogram bins, an empty fit window, a non-positive initial width, or
    /// invalid spectrum binning.
    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 || self.grid_size > usize::from(u16::MAX) {
            return Err(Error::ConfigError(format!(
                "grid size must be in 1..=65535, got {}",
                self.grid_size
            )));
        }
        if self.max_channel <= 1 {
            return Err(Error::ConfigError(format!(
                "max channel must exceed 1, got {}",
                self.max_channel
            )));
        }
        if self.fit_window_below + self.fit_window_above == 0 {
            return Err(Error::ConfigError("fit window is empty".into()));
        }
        if !(self.initial_stddev.is_finite() && self.initial_stddev > 0.0) {
            return Err(Error::ConfigError(format!(
                "initial stddev must be positive, got {}",
                self.initial_stddev
            )));
        }
        self.spectrum.validate()
    }
}
