//! Loading single-channel rasters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::error::{AnnotatorError, Result};

/// Something that can turn a channel path into an 8-bit intensity raster.
pub trait RasterSource {
    fn load(&self, path: &Path) -> Result<GrayImage>;
}

/// Decodes channel files from disk with [`image::open`].
///
/// Colour or 16-bit files are converted to 8-bit luma.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRasterSource;

impl RasterSource for FileRasterSource {
    fn load(&self, path: &Path) -> Result<GrayImage> {
        let image = image::open(path).map_err(|source| AnnotatorError::Raster {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(image.to_luma8())
    }
}

/// Rasters already held in memory, looked up by the path they stand for.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterSource {
    rasters: HashMap<PathBuf, GrayImage>,
}

impl MemoryRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, raster: GrayImage) {
        self.rasters.insert(path.into(), raster);
    }

    pub fn with(mut self, path: impl Into<PathBuf>, raster: GrayImage) -> Self {
        self.insert(path, raster);
        self
    }
}

impl RasterSource for MemoryRasterSource {
    fn load(&self, path: &Path) -> Result<GrayImage> {
        self.rasters
            .get(path)
            .cloned()
            .ok_or_else(|| AnnotatorError::MissingRaster(path.to_path_buf()))
    }
}
