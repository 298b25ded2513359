//! Per-channel intensity thresholds.

use std::collections::BTreeMap;

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Threshold actually used for each fluorescence channel, keyed by channel name.
pub type ThresholdMap = BTreeMap<String, f64>;

/// How the threshold of one channel is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ThresholdChoice {
    /// `median + k * IQR` of the channel's own pixels.
    #[default]
    Computed,
    /// Operator-supplied value.
    Fixed(f64),
}

impl ThresholdChoice {
    /// An operator value, clamped into the 8-bit intensity range.
    pub fn fixed(value: f64) -> Self {
        let value = if value.is_nan() { 0.0 } else { value };
        Self::Fixed(value.clamp(0.0, f64::from(u8::MAX)))
    }

    pub fn resolve(&self, image: &GrayImage, iqr_multiplier: f64) -> f64 {
        match *self {
            Self::Computed => default_threshold(image, iqr_multiplier),
            Self::Fixed(value) => value,
        }
    }
}

/// Per-channel overrides. Channels without an entry use [`ThresholdChoice::Computed`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdOverrides(BTreeMap<String, ThresholdChoice>);

impl ThresholdOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, channel: impl Into<String>, choice: ThresholdChoice) {
        self.0.insert(channel.into(), choice);
    }

    pub fn get(&self, channel: &str) -> ThresholdChoice {
        self.0.get(channel).copied().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<S: Into<String>> FromIterator<(S, ThresholdChoice)> for ThresholdOverrides {
    fn from_iter<I: IntoIterator<Item = (S, ThresholdChoice)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// `median + iqr_multiplier * IQR` over all pixels of `image`.
///
/// Quartiles interpolate linearly between order statistics. An empty image
/// yields 0.
pub fn default_threshold(image: &GrayImage, iqr_multiplier: f64) -> f64 {
    let histogram = Histogram::new(image);
    if histogram.total == 0 {
        return 0.0;
    }
    let q1 = histogram.quantile(0.25);
    let median = histogram.quantile(0.5);
    let q3 = histogram.quantile(0.75);
    median + iqr_multiplier * (q3 - q1)
}

struct Histogram {
    cumulative: [u64; 256],
    total: u64,
}

impl Histogram {
    fn new(image: &GrayImage) -> Self {
        let mut counts = [0u64; 256];
        for pixel in image.pixels() {
            counts[pixel.0[0] as usize] += 1;
        }
        let mut cumulative = [0u64; 256];
        let mut running = 0;
        for (slot, count) in cumulative.iter_mut().zip(counts) {
            running += count;
            *slot = running;
        }
        Self {
            cumulative,
            total: running,
        }
    }

    /// The `rank`-th smallest pixel value, 0-based.
    fn order_statistic(&self, rank: u64) -> f64 {
        let value = self.cumulative.partition_point(|&c| c <= rank);
        value.min(255) as f64
    }

    fn quantile(&self, q: f64) -> f64 {
        let position = q * (self.total - 1) as f64;
        let lower = position.floor() as u64;
        let upper = (lower + 1).min(self.total - 1);
        let fraction = position - lower as f64;

        let low = self.order_statistic(lower);
        let high = self.order_statistic(upper);
        low + fraction * (high - low)
    }
}
