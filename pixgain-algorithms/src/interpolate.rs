//! Neighbor interpolation of missing gains.

use log::{info, warn};
use pixgain_core::{GainMap, PixelCoord};

/// Outcome of interpolating a gain map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolationOutcome {
    /// Pixels filled by each pass.
    pub filled_per_pass: Vec<usize>,
    /// Pixels that are still unfit after the last pass.
    pub incomplete: Vec<PixelCoord>,
}

impl InterpolationOutcome {
    /// Total number of pixels filled.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.filled_per_pass.iter().sum()
    }

    /// Returns true if every pixel holds a gain.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }
}

/// Fills unfit pixels with the mean of their nonzero 3x3 neighbors.
///
/// Each pass reads a snapshot of the map taken before the pass, so a pixel
/// filled during a pass only feeds its neighbors in the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainInterpolator {
    passes: usize,
}

impl Default for GainInterpolator {
    fn default() -> Self {
        Self { passes: 2 }
    }
}

impl GainInterpolator {
    /// Creates an interpolator running `passes` passes.
    #[must_use]
    pub fn new(passes: usize) -> Self {
        Self { passes }
    }

    /// Number of passes.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Runs a single pass and returns the number of pixels filled.
    pub fn pass(map: &mut GainMap) -> usize {
        let padded = map.padded();
        let mut filled = 0;
        for (row, col) in map.coords().collect::<Vec<_>>() {
            if !map.get(row, col).is_unfit() {
                continue;
            }
            // Padded (row, col) is the top-left of the pixel's 3x3 neighborhood.
            let (sum, count) = padded
                .window(row, col)
                .iter()
                .flatten()
                .filter(|&&gain| gain != 0.0)
                .fold((0.0, 0u32), |(sum, count), &gain| (sum + gain, count + 1));
            if count > 0 && map.set_interpolated(row, col, sum / f64::from(count)) {
                filled += 1;
            }
        }
        filled
    }

    /// Runs all passes over `map`.
    pub fn interpolate(&self, map: &mut GainMap) -> InterpolationOutcome {
        let filled_per_pass: Vec<usize> = (0..self.passes).map(|_| Self::pass(map)).collect();
        let incomplete = map.unfit_pixels();

        info!(
            "interpolation filled {} pixels over {} passes",
            filled_per_pass.iter().sum::<usize>(),
            self.passes
        );
        if !incomplete.is_empty() {
            warn!(
                "{} pixels have no gain after interpolation",
                incomplete.len()
            );
        }

        InterpolationOutcome {
            filled_per_pass,
            incomplete,
        }
    }
}
