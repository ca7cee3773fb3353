//! Per-pixel channel histogram.

/// Histogram of pulse heights with unit-width bins over `[1, max_channel)`.
///
/// Bin `k` counts channels with `k <= channel < k + 1`, so bins are indexed
/// directly by channel number. Index 0 is below the domain and stays empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHistogram {
    counts: Vec<u32>,
}

impl ChannelHistogram {
    /// First channel of the histogram domain.
    pub const MIN_CHANNEL: usize = 1;

    /// Creates an empty histogram.
    #[must_use]
    pub fn new(max_channel: usize) -> Self {
        Self {
            counts: vec![0; max_channel],
        }
    }

    /// Builds a histogram from raw channel values. Values outside the domain are dropped.
    #[must_use]
    pub fn from_channels<I>(channels: I, max_channel: usize) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut histogram = Self::new(max_channel);
        for channel in channels {
            histogram.fill(channel);
        }
        histogram
    }

    /// Adds one channel value.
    #[inline]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn fill(&mut self, channel: f64) {
        if channel >= Self::MIN_CHANNEL as f64 && channel < self.counts.len() as f64 {
            self.counts[channel as usize] += 1;
        }
    }

    /// Upper bound of the domain (exclusive).
    #[must_use]
    pub fn max_channel(&self) -> usize {
        self.counts.len()
    }

    /// Count in the bin of `channel` (0 outside the domain).
    #[must_use]
    pub fn count(&self, channel: usize) -> u32 {
        self.counts.get(channel).copied().unwrap_or(0)
    }

    /// Total number of histogrammed values.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    fn clip(&self, low: usize, high: usize) -> (usize, usize) {
        (low.max(Self::MIN_CHANNEL), high.min(self.max_channel()))
    }

    /// Channel with the highest count inside `[low, high)`.
    ///
    /// Ties resolve to the lowest channel. Returns `None` when the clipped
    /// window is empty.
    #[must_use]
    pub fn peak_in(&self, low: usize, high: usize) -> Option<usize> {
        let (low, high) = self.clip(low, high);
        if low >= high {
            return None;
        }
        let mut best = low;
        for channel in low..high {
            if self.counts[channel] > self.counts[best] {
                best = channel;
            }
        }
        Some(best)
    }

    /// Bin positions and counts over `[low, high)`, clipped to the domain.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn points(&self, low: usize, high: usize) -> (Vec<f64>, Vec<f64>) {
        let (low, high) = self.clip(low, high);
        if low >= high {
            return (Vec::new(), Vec::new());
        }
        let x = (low..high).map(|c| c as f64).collect();
        let y = self.counts[low..high].iter().map(|&c| f64::from(c)).collect();
        (x, y)
    }
}
