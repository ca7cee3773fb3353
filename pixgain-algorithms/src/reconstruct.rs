//! Energy reconstruction of charge-sharing events.
//!
//! A photon's charge can spread over several adjacent pixels. The event
//! energy is the sum over its 3x3 neighborhood of each positive charge
//! weighted by the gain of the pixel that collected it.

use crate::window::ValidityWindow;
use log::info;
use pixgain_core::{EventTable, GainMap, Neighborhood, PaddedGrid, Spectrum, SpectrumConfig};
use rayon::prelude::*;

/// Energy of one event from its neighborhood charge.
///
/// `padded` is the gain map padded by one zero ring, so the window whose
/// top-left corner is padded `(row, col)` is centered on pixel `(row, col)`.
/// Non-positive charges and unfit pixels contribute nothing.
#[inline]
#[must_use]
pub fn event_energy(padded: &PaddedGrid, row: usize, col: usize, charge: &Neighborhood) -> f64 {
    let gains = padded.window(row, col);
    charge
        .iter()
        .flatten()
        .zip(gains.iter().flatten())
        .filter(|(&q, _)| q > 0.0)
        .map(|(&q, &gain)| q * gain)
        .sum()
}

/// Applies a gain map to events and histograms their energies.
#[derive(Debug, Clone)]
pub struct SpectrumReconstructor {
    config: SpectrumConfig,
    parallel: bool,
}

impl Default for SpectrumReconstructor {
    fn default() -> Self {
        Self::new(SpectrumConfig::default())
    }
}

impl SpectrumReconstructor {
    /// Creates a reconstructor with the given binning.
    #[must_use]
    pub fn new(config: SpectrumConfig) -> Self {
        Self {
            config,
            parallel: true,
        }
    }

    /// Set whether to use parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the binning.
    #[must_use]
    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Energy of every event in the window, in table order.
    ///
    /// Events outside the gain map grid are skipped.
    #[must_use]
    pub fn energies(
        &self,
        gain_map: &GainMap,
        table: &EventTable,
        window: ValidityWindow,
    ) -> Vec<f64> {
        let padded = gain_map.padded();
        let n = gain_map.grid_size();
        let energy = |i: usize| {
            let (row, col) = (usize::from(table.row[i]), usize::from(table.col[i]));
            (row < n && col < n)
                .then(|| event_energy(&padded, row, col, &table.neighborhood[i]))
        };

        if self.parallel {
            window.range().into_par_iter().filter_map(energy).collect()
        } else {
            window.range().filter_map(energy).collect()
        }
    }

    /// Reconstructs the energy spectrum of the windowed events.
    #[must_use]
    pub fn reconstruct(
        &self,
        gain_map: &GainMap,
        table: &EventTable,
        window: ValidityWindow,
    ) -> Spectrum {
        let energies = self.energies(gain_map, table, window);
        let spectrum = Spectrum::from_energies(energies.iter().copied(), &self.config);
        info!(
            "spectrum: {} of {} events binned",
            spectrum.total_counts(),
            energies.len()
        );
        spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pixgain_core::Event;

    fn uniform_map(n: usize, gain: f64) -> GainMap {
        GainMap::from_values(n, &vec![gain; n * n]).unwrap()
    }

    #[test]
    fn test_charge_sharing_weighted_by_gain() {
        let mut map = GainMap::new(4);
        map.set_fit(1, 1, 0.01);
        map.set_fit(1, 2, 0.02);
        map.set_fit(2, 1, 0.03);
        let padded = map.padded();

        let mut charge = [[0.0; 3]; 3];
        charge[1][1] = 1000.0; // pixel (1, 1)
        charge[1][2] = 500.0; // pixel (1, 2)
        charge[2][1] = -300.0; // pixel (2, 1), negative: ignored
        charge[0][0] = 200.0; // pixel (0, 0), unfit: contributes 0

        let energy = event_energy(&padded, 1, 1, &charge);
        assert_relative_eq!(energy, 1000.0 * 0.01 + 500.0 * 0.02);
    }

    #[test]
    fn test_energies_read_event_neighborhood() {
        let mut map = GainMap::new(4);
        map.set_fit(1, 1, 0.01);
        map.set_fit(1, 2, 0.02);

        let mut charge = [[0.0; 3]; 3];
        charge[1][1] = 1000.0;
        charge[1][2] = 500.0;
        let table: EventTable = [Event::single_pixel(1, 1, 1000.0).with_neighborhood(charge)]
            .into_iter()
            .collect();

        let energies = SpectrumReconstructor::default()
            .with_parallel(false)
            .energies(&map, &table, ValidityWindow::from_table(&table));
        assert_eq!(energies.len(), 1);
        assert_relative_eq!(energies[0], 1000.0 * 0.01 + 500.0 * 0.02);
    }

    #[test]
    fn test_corner_event_reads_padding() {
        let map = uniform_map(3, 1.0);
        let padded = map.padded();
        let charge = [[7.0; 3]; 3];
        // Only the 2x2 block inside the grid contributes.
        assert_relative_eq!(event_energy(&padded, 0, 0, &charge), 4.0 * 7.0);
        assert_relative_eq!(event_energy(&padded, 2, 2, &charge), 4.0 * 7.0);
    }

    #[test]
    fn test_unit_gain_matches_channel_histogram() {
        let config = SpectrumConfig::new(50, 0.0, 100.0);
        let channels = [3.0, 17.5, 17.9, 42.0, 99.0, 100.0, 150.0];
        let table: EventTable = channels
            .iter()
            .enumerate()
            .map(|(i, &ch)| Event::single_pixel((i % 4) as u16, 3, ch))
            .collect();
        let map = uniform_map(4, 1.0);
        let window = ValidityWindow::from_table(&table);

        let spectrum = SpectrumReconstructor::new(config.clone())
            .with_parallel(false)
            .reconstruct(&map, &table, window);
        let direct = Spectrum::from_energies(channels, &config);
        assert_eq!(spectrum, direct);
        assert_eq!(spectrum.total_counts(), 6);
    }

    #[test]
    fn test_only_window_events_counted() {
        let table: EventTable = [
            Event::single_pixel(0, 0, 10.0).with_valid(false),
            Event::single_pixel(0, 0, 20.0),
            Event::single_pixel(0, 0, 30.0).with_valid(false),
            Event::single_pixel(0, 0, 40.0),
            Event::single_pixel(0, 0, 50.0).with_valid(false),
        ]
        .iter()
        .collect();
        let window = ValidityWindow::from_table(&table);
        let reconstructor = SpectrumReconstructor::new(SpectrumConfig::new(10, 0.0, 100.0));
        let energies = reconstructor.energies(&uniform_map(2, 1.0), &table, window);
        assert_eq!(energies, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_empty_window_gives_empty_spectrum() {
        let table: EventTable = [Event::single_pixel(0, 0, 10.0).with_valid(false)]
            .iter()
            .collect();
        let window = ValidityWindow::from_table(&table);
        let spectrum =
            SpectrumReconstructor::default().reconstruct(&uniform_map(2, 1.0), &table, window);
        assert_eq!(spectrum.total_counts(), 0);
        assert_eq!(spectrum.len(), 10_000);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let table: EventTable = (0..500)
            .map(|i| Event::single_pixel((i % 8) as u16, (i / 8 % 8) as u16, f64::from(i)))
            .collect();
        let map = uniform_map(8, 0.1);
        let window = ValidityWindow::from_table(&table);
        let serial = SpectrumReconstructor::default()
            .with_parallel(false)
            .energies(&map, &table, window);
        let parallel = SpectrumReconstructor::default().energies(&map, &table, window);
        assert_eq!(serial, parallel);
    }
}
