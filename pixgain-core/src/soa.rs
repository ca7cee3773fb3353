//! Structure of Arrays (`SoA`) event storage.
//!
//! `EventTable` keeps each event field in its own column. The calibration
//! passes scan one or two columns at a time (coordinates and channel for the
//! fitter, coordinates and neighborhood for the reconstructor), which is
//! friendlier to the cache than walking whole `Event` structs.

use crate::error::{Error, Result};
use crate::event::{Event, Neighborhood, PixelCoord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered table of detector events in columnar layout.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventTable {
    /// Validity flag (detector inside its operating temperature band).
    pub valid: Vec<bool>,
    /// Pixel row (RAWY).
    pub row: Vec<u16>,
    /// Pixel column (RAWX).
    pub col: Vec<u16>,
    /// Pulse height in channels (PH).
    pub channel: Vec<f64>,
    /// Stimulation pulser flag (STIM).
    pub stim: Vec<bool>,
    /// 3x3 neighborhood charge (`PH_COM`).
    pub neighborhood: Vec<Neighborhood>,
}

impl EventTable {
    /// Creates a new empty table with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            valid: Vec::with_capacity(capacity),
            row: Vec::with_capacity(capacity),
            col: Vec::with_capacity(capacity),
            channel: Vec::with_capacity(capacity),
            stim: Vec::with_capacity(capacity),
            neighborhood: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of events in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Appends all events from another table to this one.
    pub fn append(&mut self, other: &EventTable) {
        self.valid.extend_from_slice(&other.valid);
        self.row.extend_from_slice(&other.row);
        self.col.extend_from_slice(&other.col);
        self.channel.extend_from_slice(&other.channel);
        self.stim.extend_from_slice(&other.stim);
        self.neighborhood.extend_from_slice(&other.neighborhood);
    }

    /// Pushes a single event into the table.
    pub fn push(&mut self, event: &Event) {
        self.valid.push(event.valid);
        self.row.push(event.coord.row);
        self.col.push(event.coord.col);
        self.channel.push(event.channel);
        self.stim.push(event.stim);
        self.neighborhood.push(event.neighborhood);
    }

    /// Returns the event at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Event> {
        if index >= self.len() {
            return None;
        }
        Some(Event {
            valid: self.valid[index],
            coord: PixelCoord::new(self.row[index], self.col[index]),
            channel: self.channel[index],
            stim: self.stim[index],
            neighborhood: self.neighborhood[index],
        })
    }

    /// Iterates over events as row structs.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Checks the table is usable for an `n x n` detector.
    ///
    /// # Errors
    /// Returns an error if the table is empty, if its columns disagree in
    /// length, or if any event lies outside the grid.
    pub fn validate(&self, grid_size: usize) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyEventTable);
        }

        let expected = self.valid.len();
        let columns = [
            ("row", self.row.len()),
            ("col", self.col.len()),
            ("channel", self.channel.len()),
            ("stim", self.stim.len()),
            ("neighborhood", self.neighborhood.len()),
        ];
        for (column, actual) in columns {
            if actual != expected {
                return Err(Error::ColumnLengthMismatch {
                    column,
                    expected,
                    actual,
                });
            }
        }

        for (&row, &col) in self.row.iter().zip(self.col.iter()) {
            if !PixelCoord::new(row, col).in_grid(grid_size) {
                return Err(Error::InvalidCoordinate {
                    row,
                    col,
                    grid_size,
                });
            }
        }

        Ok(())
    }
}

impl<'a> FromIterator<&'a Event> for EventTable {
    fn from_iter<I: IntoIterator<Item = &'a Event>>(iter: I) -> Self {
        let mut table = EventTable::default();
        for event in iter {
            table.push(event);
        }
        table
    }
}

impl FromIterator<Event> for EventTable {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut table = EventTable::default();
        for event in iter {
            table.push(&event);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_table_operations() {
        let mut table = EventTable::with_capacity(10);
        assert!(table.is_empty());

        table.push(&Event::single_pixel(10, 20, 4000.0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.row[0], 10);
        assert_eq!(table.col[0], 20);

        table.push(&Event::single_pixel(11, 21, 4001.0).with_stim(true));
        assert_eq!(table.len(), 2);
        assert!(table.stim[1]);

        let event = table.get(1).unwrap();
        assert_eq!(event.coord, PixelCoord::new(11, 21));
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_append() {
        let mut a: EventTable = [Event::single_pixel(0, 0, 1.0)].iter().collect();
        let b: EventTable = vec![Event::single_pixel(1, 1, 2.0), Event::single_pixel(2, 2, 3.0)]
            .into_iter()
            .collect();
        a.append(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.iter().map(|e| e.row()).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_validate_empty() {
        let table = EventTable::default();
        assert_eq!(table.validate(32), Err(Error::EmptyEventTable));
    }

    #[test]
    fn test_validate_out_of_grid() {
        let table: EventTable = [Event::single_pixel(3, 32, 10.0)].iter().collect();
        assert!(matches!(
            table.validate(32),
            Err(Error::InvalidCoordinate { row: 3, col: 32, .. })
        ));
        assert!(table.validate(33).is_ok());
    }

    #[test]
    fn test_validate_column_mismatch() {
        let mut table: EventTable = [Event::single_pixel(0, 0, 10.0)].iter().collect();
        table.channel.push(11.0);
        assert!(matches!(
            table.validate(32),
            Err(Error::ColumnLengthMismatch {
                column: "channel",
                expected: 1,
                actual: 2
            })
        ));
    }
}
