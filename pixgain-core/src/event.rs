//! Event types for pixelated detector data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Charge collected in the 3x3 neighborhood around the triggering pixel.
///
/// Indexed `[row offset + 1][col offset + 1]`, so `[1][1]` is the pixel itself.
pub type Neighborhood = [[f64; 3]; 3];

/// Pixel coordinate on the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoord {
    /// Row (detector RAWY).
    pub row: u16,
    /// Column (detector RAWX).
    pub col: u16,
}

impl PixelCoord {
    /// Creates a new pixel coordinate.
    #[inline]
    #[must_use]
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Returns true if the coordinate lies inside an `n x n` grid.
    #[inline]
    #[must_use]
    pub fn in_grid(&self, grid_size: usize) -> bool {
        usize::from(self.row) < grid_size && usize::from(self.col) < grid_size
    }
}

/// A single detector event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Whether the detector was in its valid operating band.
    pub valid: bool,
    /// Triggering pixel.
    pub coord: PixelCoord,
    /// Raw pulse height in channel units.
    pub channel: f64,
    /// Event was injected by the stimulation pulser, not a photon.
    pub stim: bool,
    /// Charge in the 3x3 neighborhood (charge sharing).
    pub neighborhood: Neighborhood,
}

impl Event {
    /// Creates a non-stimulated valid event with all charge in the center pixel.
    #[must_use]
    pub fn single_pixel(row: u16, col: u16, channel: f64) -> Self {
        let mut neighborhood = [[0.0; 3]; 3];
        neighborhood[1][1] = channel;
        Self {
            valid: true,
            coord: PixelCoord::new(row, col),
            channel,
            stim: false,
            neighborhood,
        }
    }

    /// Sets the validity flag.
    #[must_use]
    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Sets the stimulation flag.
    #[must_use]
    pub fn with_stim(mut self, stim: bool) -> Self {
        self.stim = stim;
        self
    }

    /// Replaces the neighborhood charge array.
    #[must_use]
    pub fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    /// Pixel row.
    #[inline]
    #[must_use]
    pub fn row(&self) -> u16 {
        self.coord.row
    }

    /// Pixel column.
    #[inline]
    #[must_use]
    pub fn col(&self) -> u16 {
        self.coord.col
    }
}

/// Whether a detector temperature is inside the operating band.
///
/// The threshold is strict: an event at exactly `min_valid_temperature` is invalid.
#[inline]
#[must_use]
pub fn is_valid_temperature(temperature: f64, min_valid_temperature: f64) -> bool {
    temperature > min_valid_temperature
}

/// Events that may be used to derive gain: photon events with a positive pulse height.
#[inline]
#[must_use]
pub fn is_calibration_candidate(stim: bool, channel: f64) -> bool {
    !stim && channel > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_coord_in_grid() {
        assert!(PixelCoord::new(0, 0).in_grid(32));
        assert!(PixelCoord::new(31, 31).in_grid(32));
        assert!(!PixelCoord::new(32, 0).in_grid(32));
        assert!(!PixelCoord::new(0, 32).in_grid(32));
    }

    #[test]
    fn test_single_pixel_event() {
        let event = Event::single_pixel(3, 7, 4200.0);
        assert_eq!(event.row(), 3);
        assert_eq!(event.col(), 7);
        assert!(event.valid);
        assert!(!event.stim);
        assert!((event.neighborhood[1][1] - 4200.0).abs() < f64::EPSILON);
        let off_center: f64 = event.neighborhood.iter().flatten().sum::<f64>() - 4200.0;
        assert!(off_center.abs() < f64::EPSILON);
    }

    #[test]
    fn test_temperature_threshold_is_strict() {
        assert!(is_valid_temperature(-19.9, -20.0));
        assert!(!is_valid_temperature(-20.0, -20.0));
        assert!(!is_valid_temperature(-35.0, -20.0));
    }

    #[test]
    fn test_calibration_candidate() {
        assert!(is_calibration_candidate(false, 1.0));
        assert!(!is_calibration_candidate(true, 1.0));
        assert!(!is_calibration_candidate(false, 0.0));
        assert!(!is_calibration_candidate(false, -5.0));
    }
}
