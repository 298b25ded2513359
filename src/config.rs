use serde::{Deserialize, Serialize};

/// Smallest located-object area kept in a catalog (exclusive).
pub const MIN_OBJECT_AREA: usize = 100;
/// Largest located-object area kept in a catalog (exclusive).
pub const MAX_OBJECT_AREA: usize = 1_000_000;
/// Default threshold is `median + IQR_MULTIPLIER * IQR`.
pub const IQR_MULTIPLIER: f64 = 3.0;

pub const REFERENCE_CHANNEL: &str = "Default";
pub const TRACKING_CHANNEL: &str = "dapi";

/// Settings shared by directory discovery, auto-locate and the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    pub min_object_area: usize,
    pub max_object_area: usize,
    pub iqr_multiplier: f64,
    /// Brightfield channel, excluded from detection and thresholds.
    pub reference_channel: String,
    /// Channel whose located objects back the tracking target selector.
    pub tracking_channel: String,
    /// A directory is accepted only if some file name contains this.
    pub directory_marker: String,
    pub image_extension: String,
    /// File names containing any of these are not considered sample images.
    pub excluded_name_fragments: Vec<String>,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            min_object_area: MIN_OBJECT_AREA,
            max_object_area: MAX_OBJECT_AREA,
            iqr_multiplier: IQR_MULTIPLIER,
            reference_channel: REFERENCE_CHANNEL.to_string(),
            tracking_channel: TRACKING_CHANNEL.to_string(),
            directory_marker: ".yml".to_string(),
            image_extension: ".tif".to_string(),
            excluded_name_fragments: vec![
                ".yml".to_string(),
                "stitched".to_string(),
                ".jpg".to_string(),
            ],
        }
    }
}

impl LocateConfig {
    /// Whether a box of `area` pixels survives the size filter.
    pub fn retains_area(&self, area: usize) -> bool {
        self.min_object_area < area && area < self.max_object_area
    }
}
