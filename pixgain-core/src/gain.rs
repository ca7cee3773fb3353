//! Per-pixel gain map.
//!
//! Each pixel moves through a small state machine:
//! `Unfit -> Fit(gain)`, `Unfit -> Interpolated(gain)`, or stays `Unfit`.
//! A pixel that holds a gain is never overwritten.

use crate::error::{Error, Result};
use crate::event::PixelCoord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gain state of a single pixel (keV per channel).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PixelGain {
    /// No gain determined yet.
    #[default]
    Unfit,
    /// Gain derived from a successful peak fit.
    Fit(f64),
    /// Gain averaged from neighboring pixels.
    Interpolated(f64),
}

impl PixelGain {
    /// Gain value, `0.0` for unfit pixels.
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        match *self {
            PixelGain::Unfit => 0.0,
            PixelGain::Fit(gain) | PixelGain::Interpolated(gain) => gain,
        }
    }

    /// Returns true if no gain has been determined.
    #[inline]
    #[must_use]
    pub fn is_unfit(&self) -> bool {
        matches!(self, PixelGain::Unfit)
    }

    /// Short label used in reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            PixelGain::Unfit => "unfit",
            PixelGain::Fit(_) => "fit",
            PixelGain::Interpolated(_) => "interpolated",
        }
    }
}

/// Count of pixels per gain state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GainSummary {
    pub fit: usize,
    pub interpolated: usize,
    pub unfit: usize,
}

/// An `n x n` map of pixel gains stored row-major.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GainMap {
    grid_size: usize,
    cells: Vec<PixelGain>,
}

impl GainMap {
    /// Creates a map with every pixel unfit.
    #[must_use]
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            cells: vec![PixelGain::Unfit; grid_size * grid_size],
        }
    }

    /// Builds a map from row-major gain values, e.g. a previously saved map.
    ///
    /// Zero entries become [`PixelGain::Unfit`]; positive entries are taken
    /// as fitted gains since their provenance is not recorded.
    ///
    /// # Errors
    /// Returns an error if the value count is not `grid_size²` or any value
    /// is negative or not finite.
    pub fn from_values(grid_size: usize, values: &[f64]) -> Result<Self> {
        if values.len() != grid_size * grid_size {
            return Err(Error::ConfigError(format!(
                "gain map needs {} values for a {grid_size}x{grid_size} grid, got {}",
                grid_size * grid_size,
                values.len()
            )));
        }
        let cells = values
            .iter()
            .map(|&value| {
                if !value.is_finite() || value < 0.0 {
                    Err(Error::ConfigError(format!("invalid gain value {value}")))
                } else if value == 0.0 {
                    Ok(PixelGain::Unfit)
                } else {
                    Ok(PixelGain::Fit(value))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { grid_size, cells })
    }

    /// Side length of the grid.
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.grid_size + col
    }

    /// Gain state at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the coordinate lies outside the grid.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> PixelGain {
        assert!(row < self.grid_size && col < self.grid_size);
        self.cells[self.index(row, col)]
    }

    /// Gain value at `(row, col)`, `0.0` if unfit.
    #[inline]
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.get(row, col).value()
    }

    /// Records a fitted gain. Returns false if the pixel already had a gain.
    pub fn set_fit(&mut self, row: usize, col: usize, gain: f64) -> bool {
        self.set_if_unfit(row, col, PixelGain::Fit(gain))
    }

    /// Records an interpolated gain. Returns false if the pixel already had a gain.
    pub fn set_interpolated(&mut self, row: usize, col: usize, gain: f64) -> bool {
        self.set_if_unfit(row, col, PixelGain::Interpolated(gain))
    }

    fn set_if_unfit(&mut self, row: usize, col: usize, state: PixelGain) -> bool {
        let idx = self.index(row, col);
        if self.cells[idx].is_unfit() {
            self.cells[idx] = state;
            true
        } else {
            false
        }
    }

    /// Row-major cell states.
    #[must_use]
    pub fn cells(&self) -> &[PixelGain] {
        &self.cells
    }

    /// Row-major gain values with `0.0` for unfit pixels.
    #[must_use]
    pub fn to_values(&self) -> Vec<f64> {
        self.cells.iter().map(PixelGain::value).collect()
    }

    /// Gain values embedded in a grid with a ring of zeros on every side.
    ///
    /// Pixel `(r, c)` lands at `(r + 1, c + 1)` of the padded grid, so a 3x3
    /// window starting at `(r, c)` in padded coordinates is centered on it.
    #[must_use]
    pub fn padded(&self) -> PaddedGrid {
        let side = self.grid_size + 2;
        let mut values = vec![0.0; side * side];
        for row in 0..self.grid_size {
            let start = (row + 1) * side + 1;
            for col in 0..self.grid_size {
                values[start + col] = self.cells[self.index(row, col)].value();
            }
        }
        PaddedGrid { side, values }
    }

    /// Coordinates of every pixel still unfit.
    #[must_use]
    pub fn unfit_pixels(&self) -> Vec<PixelCoord> {
        self.coords()
            .filter(|&(row, col)| self.get(row, col).is_unfit())
            .filter_map(|(row, col)| {
                Some(PixelCoord::new(row.try_into().ok()?, col.try_into().ok()?))
            })
            .collect()
    }

    /// Counts pixels in each state.
    #[must_use]
    pub fn summary(&self) -> GainSummary {
        let mut summary = GainSummary::default();
        for cell in &self.cells {
            match cell {
                PixelGain::Unfit => summary.unfit += 1,
                PixelGain::Fit(_) => summary.fit += 1,
                PixelGain::Interpolated(_) => summary.interpolated += 1,
            }
        }
        summary
    }

    /// Iterates `(row, col)` over the grid in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = (usize, usize)> {
        let n = self.grid_size;
        (0..n).flat_map(move |row| (0..n).map(move |col| (row, col)))
    }
}

/// Gain values padded by one zero cell on each side.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedGrid {
    side: usize,
    values: Vec<f64>,
}

impl PaddedGrid {
    /// Value at padded coordinate `(row, col)`.
    #[inline]
    #[must_use]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.side + col]
    }

    /// The 3x3 window whose top-left corner is padded `(row, col)`.
    ///
    /// For an unpadded pixel `(r, c)` this is its neighborhood, itself included.
    #[inline]
    #[must_use]
    pub fn window(&self, row: usize, col: usize) -> [[f64; 3]; 3] {
        let mut out = [[0.0; 3]; 3];
        for (i, out_row) in out.iter_mut().enumerate() {
            let start = (row + i) * self.side + col;
            out_row.copy_from_slice(&self.values[start..start + 3]);
        }
        out
    }

    /// Side length including the padding.
    #[must_use]
    pub fn side(&self) -> usize {
        self.side
    }
}

/// Fit diagnostics of one pixel, reported for successful fits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitDiagnostics {
    /// Pixel the fit belongs to.
    pub coord: PixelCoord,
    /// Channel of the highest bin in the search window.
    pub centroid: usize,
    /// Fitted Gaussian amplitude (counts).
    pub amplitude: f64,
    /// Fitted peak position (channels).
    pub mean: f64,
    /// Fitted Gaussian width (channels).
    pub stddev: f64,
    /// Derived gain (keV per channel).
    pub gain: f64,
    /// Peak FWHM converted to keV.
    pub fwhm_kev: f64,
    /// 1-sigma uncertainty of the FWHM in keV.
    pub fwhm_err_kev: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_map_is_unfit() {
        let map = GainMap::new(4);
        assert_eq!(map.cells().len(), 16);
        assert!(map.cells().iter().all(PixelGain::is_unfit));
        assert_eq!(
            map.summary(),
            GainSummary {
                fit: 0,
                interpolated: 0,
                unfit: 16
            }
        );
    }

    #[test]
    fn test_gain_never_overwritten() {
        let mut map = GainMap::new(3);
        assert!(map.set_fit(1, 2, 0.5));
        assert!(!map.set_fit(1, 2, 0.7));
        assert!(!map.set_interpolated(1, 2, 0.9));
        assert_eq!(map.get(1, 2), PixelGain::Fit(0.5));

        assert!(map.set_interpolated(0, 0, 0.25));
        assert_eq!(map.get(0, 0).label(), "interpolated");
    }

    #[test]
    fn test_values_and_unfit_pixels() {
        let mut map = GainMap::new(2);
        map.set_fit(0, 0, 1.5);
        map.set_interpolated(1, 1, 2.5);
        assert_eq!(map.to_values(), vec![1.5, 0.0, 0.0, 2.5]);
        assert_eq!(
            map.unfit_pixels(),
            vec![PixelCoord::new(0, 1), PixelCoord::new(1, 0)]
        );
    }

    #[test]
    fn test_padded_corner_window() {
        let mut map = GainMap::new(3);
        map.set_fit(0, 0, 1.0);
        map.set_fit(0, 1, 2.0);
        map.set_fit(1, 0, 3.0);
        let padded = map.padded();
        assert_eq!(padded.side(), 5);
        assert_relative_eq!(padded.at(0, 0), 0.0);
        assert_relative_eq!(padded.at(1, 1), 1.0);

        let window = padded.window(0, 0);
        assert_eq!(window, [[0.0, 0.0, 0.0], [0.0, 1.0, 2.0], [0.0, 3.0, 0.0]]);

        // Bottom-right corner of a 3x3 map touches only padding and interior zeros.
        let window = padded.window(2, 2);
        assert_eq!(window, [[0.0; 3]; 3]);
    }

    #[test]
    fn test_from_values() {
        let map = GainMap::from_values(2, &[0.0, 0.1, 0.2, 0.0]).unwrap();
        assert!(map.get(0, 0).is_unfit());
        assert_eq!(map.get(0, 1), PixelGain::Fit(0.1));
        assert!(GainMap::from_values(2, &[0.0; 3]).is_err());
        assert!(GainMap::from_values(1, &[-1.0]).is_err());
        assert!(GainMap::from_values(1, &[f64::INFINITY]).is_err());
    }
}
