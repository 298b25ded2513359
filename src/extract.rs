//! Cutting annotated regions out of the channel stack.

use image::GrayImage;
use ndarray::{Array3, s};
use serde::{Deserialize, Serialize};

use crate::directory::ChannelSet;
use crate::error::{AnnotatorError, Result};
use crate::raster::RasterSource;
use crate::rect::PixelRect;
use crate::session::{AnnotationKind, MetaAnnotation, Session};

/// Every channel raster of a sample, in channel order.
#[derive(Debug, Clone, Default)]
pub struct ChannelRasters {
    names: Vec<String>,
    rasters: Vec<GrayImage>,
}

impl ChannelRasters {
    /// Loads all channels. Export needs every channel, so any failure is an error.
    pub fn load(channels: &ChannelSet, source: &impl RasterSource) -> Result<Self> {
        let mut result = Self::default();
        for (name, path) in channels.iter() {
            let raster = source.load(path).map_err(|err| AnnotatorError::ChannelLoad {
                channel: name.to_string(),
                source: Box::new(err),
            })?;
            result.push(name, raster);
        }
        Ok(result)
    }

    pub fn push(&mut self, name: impl Into<String>, raster: GrayImage) {
        self.names.push(name.into());
        self.rasters.push(raster);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

/// Stacks the pixels under `rect` from every channel into a
/// `(rows, cols, channels)` volume.
///
/// `rect.x` selects columns and `rect.y` rows. Parts of the rectangle outside a
/// raster read as 0; an empty rectangle gives a volume with a zero-length axis.
pub fn extract_volume(rect: &PixelRect, rasters: &ChannelRasters) -> Array3<u8> {
    let rows = rect.height() as usize;
    let cols = rect.width() as usize;
    let mut volume = Array3::zeros((rows, cols, rasters.len()));

    for (depth, raster) in rasters.rasters.iter().enumerate() {
        let mut plane = volume.slice_mut(s![.., .., depth]);
        let row_end = rect.max_y.min(raster.height());
        let col_end = rect.max_x.min(raster.width());
        for y in rect.min_y..row_end {
            for x in rect.min_x..col_end {
                plane[[(y - rect.min_y) as usize, (x - rect.min_x) as usize]] = raster.get_pixel(x, y).0[0];
            }
        }
    }
    volume
}

/// The annotation volume and, when a meta-annotation is given, the volume of
/// the view it recorded.
pub fn extract(
    rect: &PixelRect,
    rasters: &ChannelRasters,
    meta: Option<&MetaAnnotation>,
) -> (Array3<u8>, Option<Array3<u8>>) {
    let volume = extract_volume(rect, rasters);
    let meta_volume = meta.map(|meta| extract_volume(&meta.viewport, rasters));
    (volume, meta_volume)
}

/// One exported annotation: `(kind, channel names, volume, meta volume)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub kind: AnnotationKind,
    pub channels: Vec<String>,
    pub volume: Array3<u8>,
    pub meta_volume: Option<Array3<u8>>,
}

impl Session {
    /// Export records for all annotations, in drawing order.
    pub fn export(&self, rasters: &ChannelRasters) -> Vec<ExportRecord> {
        self.annotations()
            .iter()
            .enumerate()
            .map(|(index, annotation)| {
                let (volume, meta_volume) = extract(&annotation.rect, rasters, self.meta_for(index));
                ExportRecord {
                    kind: annotation.kind,
                    channels: rasters.names().to_vec(),
                    volume,
                    meta_volume,
                }
            })
            .collect()
    }
}
