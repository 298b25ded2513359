//! Auto-locate: blob detection over every fluorescence channel of a sample.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::LocateConfig;
use crate::directory::ChannelSet;
use crate::raster::RasterSource;
use crate::rect::BoundingBox;
use crate::region_labelling::detect_blobs;
use crate::threshold::{ThresholdMap, ThresholdOverrides};

/// A size-filtered blob, promoted to a selectable target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedObject {
    pub channel: String,
    /// Position within the channel's filtered list.
    pub index: usize,
    pub bbox: BoundingBox,
}

impl LocatedObject {
    /// Selector text, the box centre as `"x, y"`.
    pub fn label(&self) -> String {
        let (x, y) = self.bbox.center();
        format!("{x}, {y}")
    }
}

/// Located objects per fluorescence channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    channels: BTreeMap<String, Vec<LocatedObject>>,
}

impl Catalog {
    pub fn channel(&self, name: &str) -> &[LocatedObject] {
        self.channels.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[LocatedObject])> {
        self.channels
            .iter()
            .map(|(name, objects)| (name.as_str(), objects.as_slice()))
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, channel: &str, boxes: impl IntoIterator<Item = BoundingBox>) {
        let objects = boxes
            .into_iter()
            .enumerate()
            .map(|(index, bbox)| LocatedObject {
                channel: channel.to_string(),
                index,
                bbox,
            })
            .collect();
        self.channels.insert(channel.to_string(), objects);
    }
}

/// A channel left out of an aggregation because its raster could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFailure {
    pub channel: String,
    pub reason: String,
}

/// Outcome of [`aggregate`]. A non-empty `failures` means a partial result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    pub catalog: Catalog,
    pub thresholds_used: ThresholdMap,
    pub failures: Vec<ChannelFailure>,
}

impl Aggregation {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs blob detection on each fluorescence channel and keeps boxes whose area
/// lies strictly between the configured bounds.
///
/// Channels with a [`Fixed`](crate::threshold::ThresholdChoice::Fixed) override
/// use that value; the rest use `median + k * IQR` of their own pixels. Either
/// way the value used is reported in `thresholds_used`. A channel whose raster
/// fails to load is missing from both the catalog and the thresholds and is
/// listed in `failures` instead.
pub fn aggregate(
    channels: &ChannelSet,
    source: &impl RasterSource,
    overrides: &ThresholdOverrides,
    config: &LocateConfig,
) -> Aggregation {
    let mut result = Aggregation::default();

    for (name, path) in channels.fluorescence() {
        let raster = match source.load(path) {
            Ok(raster) => raster,
            Err(err) => {
                warn!("skipping channel {name}: {err}");
                result.failures.push(ChannelFailure {
                    channel: name.to_string(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let threshold = overrides.get(name).resolve(&raster, config.iqr_multiplier);
        let blobs = detect_blobs(&raster, threshold);
        let found = blobs.len();
        let kept: Vec<BoundingBox> = blobs
            .into_iter()
            .filter(|bbox| config.retains_area(bbox.area()))
            .collect();
        debug!(
            "channel {name}: threshold {threshold:.2}, {found} blobs, {} within size bounds",
            kept.len()
        );

        result.thresholds_used.insert(name.to_string(), threshold);
        result.catalog.insert(name, kept);
    }

    info!(
        "located {} objects over {} channels",
        result.catalog.len(),
        result.thresholds_used.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::MemoryRasterSource;
    use crate::threshold::ThresholdChoice;
    use image::{GrayImage, Luma};

    fn fill(image: &mut GrayImage, rows: std::ops::Range<u32>, cols: std::ops::Range<u32>) {
        for y in rows {
            for x in cols.clone() {
                image.put_pixel(x, y, Luma([250]));
            }
        }
    }

    fn sample() -> (ChannelSet, MemoryRasterSource) {
        let mut dapi = GrayImage::from_pixel(200, 200, Luma([5]));
        fill(&mut dapi, 10..15, 10..15); // 25
        fill(&mut dapi, 50..100, 50..150); // 5000
        fill(&mut dapi, 150..160, 20..30); // 100, excluded by the strict bound

        let mut red = GrayImage::from_pixel(200, 200, Luma([5]));
        fill(&mut red, 20..40, 20..40);

        let channels = ChannelSet::new(
            [
                ("Default", "s-Default.tif"),
                ("dapi", "s-dapi.tif"),
                ("red", "s-red.tif"),
            ],
            "Default",
        );
        let source = MemoryRasterSource::new()
            .with("s-Default.tif", GrayImage::from_pixel(200, 200, Luma([255])))
            .with("s-dapi.tif", dapi)
            .with("s-red.tif", red);
        (channels, source)
    }

    #[test]
    fn test_size_filter_and_reference_exclusion() {
        let (channels, source) = sample();
        let result = aggregate(&channels, &source, &ThresholdOverrides::new(), &LocateConfig::default());

        assert!(!result.is_partial());
        assert_eq!(
            result.catalog.channel_names().collect::<Vec<_>>(),
            vec!["dapi", "red"]
        );
        assert_eq!(
            result.thresholds_used.keys().cloned().collect::<Vec<_>>(),
            vec!["dapi", "red"]
        );

        let dapi = result.catalog.channel("dapi");
        assert_eq!(dapi.len(), 1);
        assert_eq!(dapi[0].bbox, BoundingBox::new(50, 100, 50, 150));
        assert_eq!(dapi[0].index, 0);
        assert_eq!(dapi[0].label(), "100, 75");
        assert_eq!(result.catalog.channel("red").len(), 1);
        assert!(result.catalog.channel("Default").is_empty());
    }

    #[test]
    fn test_override_is_recorded_verbatim() {
        let (channels, source) = sample();
        let overrides: ThresholdOverrides = [("red", ThresholdChoice::Fixed(0.0))].into_iter().collect();
        let result = aggregate(&channels, &source, &overrides, &LocateConfig::default());

        assert_eq!(result.thresholds_used["red"], 0.0);
        // Everything is above zero, so red becomes one 200x200 blob.
        assert_eq!(
            result.catalog.channel("red")[0].bbox,
            BoundingBox::new(0, 200, 0, 200)
        );
        // The computed default for a mostly flat background is the background.
        assert_eq!(result.thresholds_used["dapi"], 5.0);
    }

    #[test]
    fn test_unreadable_channel_is_reported() {
        let (_, source) = sample();
        let channels = ChannelSet::new(
            [("dapi", "s-dapi.tif"), ("green", "s-green.tif")],
            "Default",
        );
        let result = aggregate(&channels, &source, &ThresholdOverrides::new(), &LocateConfig::default());

        assert!(result.is_partial());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].channel, "green");
        assert!(!result.thresholds_used.contains_key("green"));
        assert_eq!(result.catalog.channel_names().collect::<Vec<_>>(), vec!["dapi"]);
    }

    #[test]
    fn test_tiny_and_huge_blobs_are_dropped() {
        let mut image = GrayImage::from_pixel(2100, 2100, Luma([0]));
        fill(&mut image, 0..5, 0..5);
        fill(&mut image, 100..2100, 100..2100);
        let channels = ChannelSet::new([("dapi", "x-dapi.tif")], "Default");
        let source = MemoryRasterSource::new().with("x-dapi.tif", image);
        let overrides: ThresholdOverrides = [("dapi", ThresholdChoice::Fixed(100.0))].into_iter().collect();

        let result = aggregate(&channels, &source, &overrides, &LocateConfig::default());
        assert!(result.catalog.channel("dapi").is_empty());
        assert!(result.catalog.is_empty());
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let (channels, source) = sample();
        let config = LocateConfig::default();
        let first = aggregate(&channels, &source, &ThresholdOverrides::new(), &config);
        let second = aggregate(&channels, &source, &ThresholdOverrides::new(), &config);
        assert_eq!(first, second);
    }
}
