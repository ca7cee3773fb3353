//! Calibration line descriptors.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A spectral line of a calibration source.
///
/// The search window bounds where the fitter looks for the line's peak in
/// raw channel units, which rejects other spectral features of the source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationLine {
    source: String,
    energy_kev: f64,
    search_low: usize,
    search_high: usize,
}

impl CalibrationLine {
    /// Names accepted by [`CalibrationLine::preset`].
    pub const PRESET_NAMES: [&'static str; 2] = ["Am241", "Co57"];

    /// Creates a calibration line.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCalibrationLine`] if the energy is not a
    /// positive finite number or the search window is empty.
    pub fn new(
        source: impl Into<String>,
        energy_kev: f64,
        search_low: usize,
        search_high: usize,
    ) -> Result<Self> {
        let line = Self {
            source: source.into(),
            energy_kev,
            search_low,
            search_high,
        };
        line.validate()?;
        Ok(line)
    }

    /// Am-241 59.54 keV line.
    #[must_use]
    pub fn am241() -> Self {
        Self {
            source: "Am241".to_string(),
            energy_kev: 59.54,
            search_low: 3000,
            search_high: 6000,
        }
    }

    /// Co-57 122.06 keV line.
    ///
    /// The search window has seen little use on real data.
    #[must_use]
    pub fn co57() -> Self {
        Self {
            source: "Co57".to_string(),
            energy_kev: 122.06,
            search_low: 5000,
            search_high: 8000,
        }
    }

    /// Looks up a preset by source name (case-insensitive, `-` ignored).
    ///
    /// # Errors
    /// Returns [`Error::UnknownLine`] if no preset matches.
    pub fn preset(name: &str) -> Result<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "am241" | "am" => Ok(Self::am241()),
            "co57" | "co" => Ok(Self::co57()),
            _ => Err(Error::UnknownLine(name.to_string())),
        }
    }

    /// Checks the line invariants.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCalibrationLine`] on a bad energy or window.
    pub fn validate(&self) -> Result<()> {
        if !(self.energy_kev.is_finite() && self.energy_kev > 0.0) {
            return Err(self.invalid(format!(
                "energy must be positive, got {} keV",
                self.energy_kev
            )));
        }
        if self.search_low >= self.search_high {
            return Err(self.invalid(format!(
                "search window [{}, {}) is empty",
                self.search_low, self.search_high
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidCalibrationLine {
            source_name: self.source.clone(),
            reason,
        }
    }

    /// Source name, e.g. `Am241`.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Line energy in keV.
    #[must_use]
    pub fn energy_kev(&self) -> f64 {
        self.energy_kev
    }

    /// Lowest channel searched for the peak (inclusive).
    #[must_use]
    pub fn search_low(&self) -> usize {
        self.search_low
    }

    /// Channel bounding the peak search (exclusive).
    #[must_use]
    pub fn search_high(&self) -> usize {
        self.search_high
    }
}
