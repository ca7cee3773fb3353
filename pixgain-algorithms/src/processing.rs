//! High-level calibration pipeline combining fitting, interpolation and
//! reconstruction.

use crate::gaussian::{LevMarFitter, PeakFitter};
use crate::interpolate::GainInterpolator;
use crate::pixel_fit::PixelGainFitter;
use crate::reconstruct::SpectrumReconstructor;
use crate::window::ValidityWindow;
use log::{info, warn};
use pixgain_core::error::{Error, Result};
use pixgain_core::{
    CalibrationConfig, CalibrationLine, EventTable, FitDiagnostics, GainMap, GainSummary,
    PixelCoord, Spectrum, SpectrumConfig,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Run statistics of a calibration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationReport {
    /// Calibration source name.
    pub source: String,
    /// Line energy in keV.
    pub energy_kev: f64,
    /// Events in the table.
    pub total_events: usize,
    /// Events inside the validity window.
    pub window: ValidityWindow,
    /// Pixels with no calibration candidate events.
    pub empty_pixels: usize,
    /// Pixels with events whose fit failed.
    pub failed_fits: usize,
    /// Pixels filled by each interpolation pass.
    pub filled_per_pass: Vec<usize>,
    /// Final gain state counts.
    pub summary: GainSummary,
    /// Pixels still unfit after interpolation.
    pub incomplete: Vec<PixelCoord>,
    /// Per-pixel fit diagnostics, row-major.
    pub diagnostics: Vec<FitDiagnostics>,
}

/// Result of [`calibrate`].
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Fitted and interpolated gains.
    pub gain_map: GainMap,
    /// Reconstructed energy spectrum.
    pub spectrum: Spectrum,
    /// Run statistics.
    pub report: CalibrationReport,
}

fn validate_inputs(
    table: &EventTable,
    line: &CalibrationLine,
    config: &CalibrationConfig,
) -> Result<()> {
    config.validate()?;
    line.validate()?;
    // The histogram covers channels [1, max_channel).
    if line.search_low() >= config.max_channel || line.search_high() <= 1 {
        return Err(Error::InvalidCalibrationLine {
            source_name: line.source().to_string(),
            reason: format!(
                "search window [{}, {}) lies outside the channel histogram [1, {})",
                line.search_low(),
                line.search_high(),
                config.max_channel
            ),
        });
    }
    table.validate(config.grid_size)
}

/// Calibrates the detector against one emission line.
///
/// Inputs are checked before any pixel is processed, so a call either fails
/// early or returns a gain map and spectrum for the whole grid.
pub fn calibrate(
    table: &EventTable,
    line: &CalibrationLine,
    config: &CalibrationConfig,
) -> Result<Calibration> {
    calibrate_with(
        PixelGainFitter::new(LevMarFitter::default(), config.clone()),
        table,
        line,
    )
}

/// Like [`calibrate`] but with a caller-provided peak fitter.
pub fn calibrate_with<F: PeakFitter>(
    fitter: PixelGainFitter<F>,
    table: &EventTable,
    line: &CalibrationLine,
) -> Result<Calibration> {
    let config = fitter.config();
    validate_inputs(table, line, config)?;

    let window = ValidityWindow::from_table(table);
    if window.is_empty() {
        warn!("no valid events in {} records", table.len());
    } else {
        info!(
            "validity window [{}, {}) holds {} of {} events",
            window.start,
            window.end,
            window.len(),
            table.len()
        );
    }

    let fit = fitter.fit_table(table, window, line);
    let mut gain_map = fit.gain_map;

    let interpolation =
        GainInterpolator::new(config.interpolation_passes).interpolate(&mut gain_map);

    let spectrum = SpectrumReconstructor::new(config.spectrum.clone())
        .with_parallel(config.parallel)
        .reconstruct(&gain_map, table, window);

    let summary = gain_map.summary();
    info!(
        "gain map: {} fit, {} interpolated, {} unfit",
        summary.fit, summary.interpolated, summary.unfit
    );

    let report = CalibrationReport {
        source: line.source().to_string(),
        energy_kev: line.energy_kev(),
        total_events: table.len(),
        window,
        empty_pixels: fit.empty_pixels,
        failed_fits: fit.failed_fits,
        filled_per_pass: interpolation.filled_per_pass,
        summary,
        incomplete: interpolation.incomplete,
        diagnostics: fit.diagnostics,
    };

    Ok(Calibration {
        gain_map,
        spectrum,
        report,
    })
}

/// Reconstructs a spectrum from an existing gain map.
///
/// The table is checked against the gain map grid first.
pub fn reconstruct_spectrum(
    table: &EventTable,
    gain_map: &GainMap,
    config: &SpectrumConfig,
) -> Result<Spectrum> {
    config.validate()?;
    table.validate(gain_map.grid_size())?;

    let window = ValidityWindow::from_table(table);
    if window.is_empty() {
        warn!("no valid events in {} records", table.len());
    }
    Ok(SpectrumReconstructor::new(config.clone()).reconstruct(gain_map, table, window))
}
