//! Validity window over an event sequence.

use pixgain_core::EventTable;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The contiguous index range `[start, end)` between the first and the last
/// valid event.
///
/// The window only bounds the range. Invalid events between the first and
/// last valid one remain inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidityWindow {
    /// Index of the first valid event.
    pub start: usize,
    /// One past the index of the last valid event.
    pub end: usize,
}

impl ValidityWindow {
    /// Finds the window of a validity signal.
    ///
    /// A signal that never holds yields the empty window `[0, 0)`.
    #[must_use]
    pub fn from_signal(signal: &[bool]) -> Self {
        let Some(start) = signal.iter().position(|&valid| valid) else {
            return Self::default();
        };
        let end = signal.iter().rposition(|&valid| valid).unwrap_or(start) + 1;
        Self { start, end }
    }

    /// Finds the window of an event table's validity column.
    #[must_use]
    pub fn from_table(table: &EventTable) -> Self {
        Self::from_signal(&table.valid)
    }

    /// Index range of the window.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of events inside the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the window holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns true if event `index` is inside the window.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }
}
