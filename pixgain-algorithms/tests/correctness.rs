#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
use approx::assert_relative_eq;
use pixgain_algorithms::{
    calibrate, event_energy, CalibrationConfig, CalibrationLine, GainInterpolator, GainMap,
    SpectrumConfig, ValidityWindow,
};
use pixgain_core::{Event, EventTable, PixelGain};

const GRID: usize = 8;
const DEAD: [(usize, usize); 3] = [(0, 0), (3, 4), (7, 7)];

/// Peak position for a pixel, spread over a few hundred channels.
fn true_mean(row: usize, col: usize) -> f64 {
    4200.0 + 40.0 * row as f64 + 15.0 * col as f64
}

/// Events whose pulse heights follow a rounded Gaussian histogram.
fn pixel_events(row: usize, col: usize) -> Vec<Event> {
    let mean = true_mean(row, col);
    let (amplitude, sigma) = (20.0, 25.0);
    let mut events = Vec::new();
    for channel in (mean as usize - 150)..(mean as usize + 150) {
        let dx = channel as f64 - mean;
        let count = (amplitude * (-0.5 * dx * dx / (sigma * sigma)).exp()).round() as usize;
        let event = Event::single_pixel(row as u16, col as u16, channel as f64);
        events.extend((0..count).map(|_| event));
    }
    events
}

fn synthetic_table() -> EventTable {
    let mut events = vec![Event::single_pixel(1, 1, 100.0).with_valid(false); 25];
    for row in 0..GRID {
        for col in 0..GRID {
            if !DEAD.contains(&(row, col)) {
                events.extend(pixel_events(row, col));
            }
        }
    }
    // Stimulus pulses at a fixed channel must not pull the fit.
    events.extend(vec![Event::single_pixel(2, 2, 3500.0).with_stim(true); 400]);
    events.extend(vec![Event::single_pixel(5, 5, 4000.0).with_valid(false); 25]);
    events.into_iter().collect()
}

fn config() -> CalibrationConfig {
    CalibrationConfig::default().with_grid_size(GRID)
}

#[test]
fn test_end_to_end_calibration() {
    let table = synthetic_table();
    let line = CalibrationLine::am241();
    let result = calibrate(&table, &line, &config()).unwrap();

    assert_eq!(result.report.window, ValidityWindow { start: 25, end: table.len() - 25 });
    assert_eq!(result.report.summary.fit, GRID * GRID - DEAD.len());
    assert_eq!(result.report.summary.interpolated, DEAD.len());
    assert_eq!(result.report.summary.unfit, 0);
    assert_eq!(result.report.empty_pixels, DEAD.len());
    assert_eq!(result.report.failed_fits, 0);

    for row in 0..GRID {
        for col in 0..GRID {
            if let PixelGain::Fit(gain) = result.gain_map.get(row, col) {
                assert_relative_eq!(gain, 59.54 / true_mean(row, col), max_relative = 1e-3);
            }
        }
    }

    // (0, 0) only sees (0, 1), (1, 0) and (1, 1).
    let map = &result.gain_map;
    let expected = (map.value(0, 1) + map.value(1, 0) + map.value(1, 1)) / 3.0;
    assert_eq!(result.gain_map.get(0, 0), PixelGain::Interpolated(expected));

    assert!(result.spectrum.total_counts() <= table.len() as u64);
    let peak = result.spectrum.peak_energy().unwrap();
    assert!((peak - 59.54).abs() < 0.5, "peak at {peak} keV");
}

#[test]
fn test_stim_events_do_not_shift_fit() {
    let table = synthetic_table();
    let config = config().with_parallel(false);
    let result = calibrate(&table, &CalibrationLine::am241(), &config).unwrap();
    let diag = result
        .report
        .diagnostics
        .iter()
        .find(|d| (d.coord.row, d.coord.col) == (2, 2))
        .unwrap();
    assert_relative_eq!(diag.mean, true_mean(2, 2), epsilon = 0.5);
    assert!(diag.fwhm_kev > 0.0);
    assert!(diag.fwhm_err_kev.is_finite());
}

#[test]
fn test_wrong_line_leaves_pixels_unfit() {
    // No counts inside the Co57 search window.
    let table = synthetic_table();
    let result = calibrate(&table, &CalibrationLine::co57(), &config()).unwrap();
    assert_eq!(result.report.summary.unfit, GRID * GRID);
    assert_eq!(result.report.failed_fits, GRID * GRID - DEAD.len());
    assert_eq!(result.spectrum.total_counts(), 0);
}

#[test]
fn test_interpolation_idempotent_after_two_passes() {
    let mut map = GainMap::new(GRID);
    for (row, col) in [(0, 0), (0, 1), (4, 4)] {
        map.set_fit(row, col, 0.014);
    }
    GainInterpolator::new(2).interpolate(&mut map);

    let snapshot = map.clone();
    let padded = snapshot.padded();
    GainInterpolator::pass(&mut map);
    for (row, col) in snapshot.coords() {
        let before = snapshot.get(row, col);
        if before.is_unfit() {
            let isolated = padded.window(row, col).iter().flatten().all(|&g| g == 0.0);
            if isolated {
                assert!(map.get(row, col).is_unfit());
            }
        } else {
            assert_eq!(map.get(row, col), before);
        }
    }
}

#[test]
fn test_spectrum_counts_bounded_by_events() {
    let table = synthetic_table();
    let narrow = config().with_spectrum(SpectrumConfig::new(100, 59.0, 60.0));
    let result = calibrate(&table, &CalibrationLine::am241(), &narrow).unwrap();
    assert!(result.spectrum.total_counts() > 0);
    assert!(result.spectrum.total_counts() < result.report.window.len() as u64);
}

#[test]
fn test_corner_reconstruction_uses_in_grid_neighbors() {
    let map = GainMap::from_values(2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let charge = [[10.0; 3]; 3];
    let padded = map.padded();
    assert_relative_eq!(event_energy(&padded, 0, 0, &charge), 100.0);
    assert_relative_eq!(event_energy(&padded, 1, 1, &charge), 100.0);
}
