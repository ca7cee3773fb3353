//! Energy spectrum types.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Binning of the reconstructed energy spectrum.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpectrumConfig {
    /// Number of equal-width bins.
    pub bins: usize,
    /// Lower edge of the first bin (keV).
    pub energy_low: f64,
    /// Upper edge of the last bin (keV, inclusive).
    pub energy_high: f64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            bins: 10_000,
            energy_low: 0.01,
            energy_high: 120.0,
        }
    }
}

impl SpectrumConfig {
    /// Creates a binning configuration.
    #[must_use]
    pub fn new(bins: usize, energy_low: f64, energy_high: f64) -> Self {
        Self {
            bins,
            energy_low,
            energy_high,
        }
    }

    /// Checks the binning can produce a histogram.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBinning`] for zero bins or an empty/non-finite range.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(Error::InvalidBinning("bin count must be positive".into()));
        }
        if !(self.energy_low.is_finite() && self.energy_high.is_finite()) {
            return Err(Error::InvalidBinning("energy range must be finite".into()));
        }
        if self.energy_low >= self.energy_high {
            return Err(Error::InvalidBinning(format!(
                "energy range ({}, {}) is empty",
                self.energy_low, self.energy_high
            )));
        }
        Ok(())
    }

    /// Width of one bin in keV.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.energy_high - self.energy_low) / self.bins as f64
    }

    /// Bin holding `energy`, or `None` if it falls outside the range.
    ///
    /// Bins are half-open except the last, which also holds `energy_high`.
    #[inline]
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn bin_index(&self, energy: f64) -> Option<usize> {
        if !(energy >= self.energy_low && energy <= self.energy_high) {
            return None;
        }
        if energy == self.energy_high {
            return Some(self.bins - 1);
        }
        let bin = ((energy - self.energy_low) / self.bin_width()) as usize;
        Some(bin.min(self.bins - 1))
    }

    /// Midpoint energy of every bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn midpoints(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..self.bins)
            .map(|i| self.energy_low + (i as f64 + 0.5) * width)
            .collect()
    }
}

/// A histogram of reconstructed event energies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    /// Event count per bin.
    pub counts: Vec<u64>,
    /// Bin midpoint energies in keV, same length as `counts`.
    pub bin_midpoints_kev: Vec<f64>,
}

impl Spectrum {
    /// Histograms `energies` with the given binning.
    ///
    /// Energies outside the range (and NaN) are dropped, never wrapped.
    #[must_use]
    pub fn from_energies<I>(energies: I, config: &SpectrumConfig) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut counts = vec![0u64; config.bins];
        for energy in energies {
            if let Some(bin) = config.bin_index(energy) {
                counts[bin] += 1;
            }
        }
        Self {
            counts,
            bin_midpoints_kev: config.midpoints(),
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if there are no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all bin counts.
    #[must_use]
    pub fn total_counts(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Midpoint of the most populated bin, if any bin is populated.
    #[must_use]
    pub fn peak_energy(&self) -> Option<f64> {
        let (idx, &max) = self
            .counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
        (max > 0).then(|| self.bin_midpoints_kev[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_binning() {
        let config = SpectrumConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bins, 10_000);
        assert_relative_eq!(config.bin_width(), (120.0 - 0.01) / 10_000.0);
    }

    #[test]
    fn test_invalid_binning() {
        assert!(SpectrumConfig::new(0, 0.0, 1.0).validate().is_err());
        assert!(SpectrumConfig::new(10, 1.0, 1.0).validate().is_err());
        assert!(SpectrumConfig::new(10, 2.0, 1.0).validate().is_err());
        assert!(SpectrumConfig::new(10, 0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_bin_index_edges() {
        let config = SpectrumConfig::new(4, 0.0, 4.0);
        assert_eq!(config.bin_index(0.0), Some(0));
        assert_eq!(config.bin_index(0.999), Some(0));
        assert_eq!(config.bin_index(1.0), Some(1));
        assert_eq!(config.bin_index(4.0), Some(3));
        assert_eq!(config.bin_index(-0.1), None);
        assert_eq!(config.bin_index(4.1), None);
        assert_eq!(config.bin_index(f64::NAN), None);
    }

    #[test]
    fn test_from_energies_drops_out_of_range() {
        let config = SpectrumConfig::new(4, 0.0, 4.0);
        let spectrum = Spectrum::from_energies([0.5, 1.5, 1.6, 3.9, 4.0, 7.0, -1.0], &config);
        assert_eq!(spectrum.counts, vec![1, 2, 0, 2]);
        assert_eq!(spectrum.bin_midpoints_kev, vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(spectrum.total_counts(), 5);
        assert_eq!(spectrum.len(), 4);
    }

    #[test]
    fn test_peak_energy() {
        let config = SpectrumConfig::new(4, 0.0, 4.0);
        let spectrum = Spectrum::from_energies([2.2, 2.3, 0.1], &config);
        assert_relative_eq!(spectrum.peak_energy().unwrap(), 2.5);

        let empty = Spectrum::from_energies(std::iter::empty(), &config);
        assert!(empty.peak_energy().is_none());
    }
}
