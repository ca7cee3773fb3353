//! Per-pixel gain fitting.
//!
//! For each pixel the windowed photon events are histogrammed by channel,
//! the highest bin inside the line's search window seeds a Gaussian fit, and
//! a successful fit yields `gain = line energy / fitted mean`.
#![allow(clippy::missing_errors_doc)]

use crate::gaussian::{fwhm_with_error, GaussianParams, LevMarFitter, PeakFitter};
use crate::histogram::ChannelHistogram;
use crate::window::ValidityWindow;
use log::{debug, info};
use pixgain_core::{
    is_calibration_candidate, CalibrationConfig, CalibrationLine, EventTable, FitDiagnostics,
    GainMap, PixelCoord,
};
use rayon::prelude::*;
use thiserror::Error;

/// Why a pixel could not be fitted. Recovered locally: the pixel stays unfit.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FitError {
    /// No photon events at this pixel.
    #[error("no events")]
    NoEvents,
    /// The search window lies outside the channel histogram.
    #[error("search window outside histogram domain")]
    EmptySearchWindow,
    /// Every bin in the search window is empty.
    #[error("no counts in search window")]
    EmptyPeak,
    /// The optimizer produced no usable covariance.
    #[error("fit did not yield a covariance matrix")]
    NoCovariance,
    /// The fitted mean cannot give a positive gain.
    #[error("fitted mean {0} is not positive")]
    NonPositiveMean(f64),
}

/// Outcome of fitting one pixel's histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFit {
    /// Highest bin inside the search window.
    pub centroid: usize,
    /// Fitted Gaussian.
    pub params: GaussianParams,
    /// Covariance `[amplitude, mean, stddev]`.
    pub covariance: [[f64; 3]; 3],
}

impl PeakFit {
    /// Gain in keV per channel.
    #[must_use]
    pub fn gain(&self, line: &CalibrationLine) -> f64 {
        line.energy_kev() / self.params.mean
    }

    /// FWHM (channels).
    #[must_use]
    pub fn fwhm(&self) -> f64 {
        self.params.fwhm()
    }

    /// Diagnostics for reporting.
    #[must_use]
    pub fn diagnostics(&self, coord: PixelCoord, line: &CalibrationLine) -> FitDiagnostics {
        let (fwhm_kev, fwhm_err_kev) =
            fwhm_with_error(&self.params, &self.covariance, line.energy_kev());
        FitDiagnostics {
            coord,
            centroid: self.centroid,
            amplitude: self.params.amplitude,
            mean: self.params.mean,
            stddev: self.params.stddev,
            gain: self.gain(line),
            fwhm_kev,
            fwhm_err_kev,
        }
    }
}

/// Result of fitting every pixel of a table.
#[derive(Debug, Clone)]
pub struct PixelFitOutput {
    /// Gains of successfully fitted pixels; every other pixel is unfit.
    pub gain_map: GainMap,
    /// Diagnostics of successful fits in row-major pixel order.
    pub diagnostics: Vec<FitDiagnostics>,
    /// Pixels without any photon event.
    pub empty_pixels: usize,
    /// Pixels with events whose fit failed.
    pub failed_fits: usize,
}

/// Derives per-pixel gains from calibration source data.
pub struct PixelGainFitter<F: PeakFitter = LevMarFitter> {
    fitter: F,
    config: CalibrationConfig,
}

impl Default for PixelGainFitter {
    fn default() -> Self {
        Self::new(LevMarFitter::default(), CalibrationConfig::default())
    }
}

impl<F: PeakFitter> PixelGainFitter<F> {
    /// Creates a gain fitter backed by `fitter`.
    pub fn new(fitter: F, config: CalibrationConfig) -> Self {
        Self { fitter, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Fits the peak of one pixel's channel values.
    pub fn fit_pixel(
        &self,
        channels: &[f64],
        line: &CalibrationLine,
    ) -> Result<PeakFit, FitError> {
        if channels.is_empty() {
            return Err(FitError::NoEvents);
        }

        let histogram =
            ChannelHistogram::from_channels(channels.iter().copied(), self.config.max_channel);
        let centroid = histogram
            .peak_in(line.search_low(), line.search_high())
            .ok_or(FitError::EmptySearchWindow)?;
        let peak_counts = histogram.count(centroid);
        if peak_counts == 0 {
            return Err(FitError::EmptyPeak);
        }

        let (x, y) = histogram.points(
            centroid.saturating_sub(self.config.fit_window_below),
            centroid + self.config.fit_window_above,
        );
        #[allow(clippy::cast_precision_loss)]
        let initial = GaussianParams::new(
            f64::from(peak_counts),
            centroid as f64,
            self.config.initial_stddev,
        );
        let outcome = self.fitter.fit(initial, &x, &y);

        let covariance = outcome.covariance.ok_or(FitError::NoCovariance)?;
        let mean = outcome.params.mean;
        if !(mean.is_finite() && mean > 0.0) {
            return Err(FitError::NonPositiveMean(mean));
        }

        Ok(PeakFit {
            centroid,
            params: outcome.params,
            covariance,
        })
    }

    /// Collects the calibration candidates of each pixel inside the window.
    ///
    /// Returns one channel list per pixel in row-major order.
    pub fn pixel_channels(&self, table: &EventTable, window: ValidityWindow) -> Vec<Vec<f64>> {
        let n = self.config.grid_size;
        let mut buckets = vec![Vec::new(); n * n];
        for i in window.range() {
            let (row, col) = (usize::from(table.row[i]), usize::from(table.col[i]));
            let candidate = is_calibration_candidate(table.stim[i], table.channel[i]);
            if candidate && row < n && col < n {
                buckets[row * n + col].push(table.channel[i]);
            }
        }
        buckets
    }

    /// Fits every pixel and returns the partially filled gain map.
    pub fn fit_table(
        &self,
        table: &EventTable,
        window: ValidityWindow,
        line: &CalibrationLine,
    ) -> PixelFitOutput {
        let n = self.config.grid_size;
        let buckets = self.pixel_channels(table, window);

        let fit = |(idx, channels): (usize, &Vec<f64>)| (idx, self.fit_pixel(channels, line));
        let results: Vec<(usize, Result<PeakFit, FitError>)> = if self.config.parallel {
            buckets.par_iter().enumerate().map(fit).collect()
        } else {
            buckets.iter().enumerate().map(fit).collect()
        };

        let mut gain_map = GainMap::new(n);
        let mut diagnostics = Vec::new();
        let mut empty_pixels = 0;
        let mut failed_fits = 0;

        for (idx, result) in results {
            let (row, col) = (idx / n, idx % n);
            match result {
                Ok(peak) => {
                    gain_map.set_fit(row, col, peak.gain(line));
                    #[allow(clippy::cast_possible_truncation)]
                    let coord = PixelCoord::new(row as u16, col as u16);
                    diagnostics.push(peak.diagnostics(coord, line));
                }
                Err(FitError::NoEvents) => empty_pixels += 1,
                Err(err) => {
                    debug!("pixel ({row}, {col}) left unfit: {err}");
                    failed_fits += 1;
                }
            }
        }

        info!(
            "{} line: {} pixels fit, {} failed, {} without events",
            line.source(),
            diagnostics.len(),
            failed_fits,
            empty_pixels
        );

        PixelFitOutput {
            gain_map,
            diagnostics,
            empty_pixels,
            failed_fits,
        }
    }
}
