//! Blob detection on a single channel.
//!
//! A channel is binarised against a threshold, its foreground is split into
//! 8-connected components with [`imageproc::region_labelling`], and each
//! component is reduced to the smallest [`BoundingBox`] enclosing it.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::rect::BoundingBox;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Binarises `image`: a pixel is foreground iff its intensity is strictly
/// greater than `threshold`.
pub fn binarize(image: &GrayImage, threshold: f64) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        if f64::from(pixel.0[0]) > threshold {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    mask
}

/// Finds the bounding boxes of all 8-connected blobs brighter than `threshold`.
///
/// Boxes come back in ascending label order. Labels are handed out in raster
/// scan order, so for a fixed image and threshold the sequence is always the
/// same. An image without foreground yields an empty vector.
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use cell_annotator::region_labelling::detect_blobs;
///
/// let mut image = GrayImage::new(8, 8);
/// for (x, y) in [(1, 1), (2, 2), (6, 6)] {
///     image.put_pixel(x, y, Luma([200]));
/// }
///
/// let boxes = detect_blobs(&image, 100.0);
/// assert_eq!(boxes.len(), 2);
/// // The diagonal pair is one blob under 8-connectivity.
/// assert_eq!((boxes[0].row_start, boxes[0].row_stop), (1, 3));
/// ```
pub fn detect_blobs(image: &GrayImage, threshold: f64) -> Vec<BoundingBox> {
    let mask = binarize(image, threshold);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([BACKGROUND]));
    component_boxes(&labels)
}

/// Computes the enclosing box of every non-background label in a label image.
///
/// Label ids without any pixel are skipped, so sparse labellings are fine.
pub fn component_boxes(labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<BoundingBox> {
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    if max_label == 0 {
        return Vec::new();
    }

    // Indexed by label id; slot 0 is background and stays empty.
    let mut boxes: Vec<Option<BoundingBox>> = vec![None; max_label + 1];

    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0] as usize;
        if label == 0 {
            continue;
        }
        match &mut boxes[label] {
            Some(bbox) => {
                bbox.row_start = bbox.row_start.min(y);
                bbox.row_stop = bbox.row_stop.max(y + 1);
                bbox.col_start = bbox.col_start.min(x);
                bbox.col_stop = bbox.col_stop.max(x + 1);
            }
            slot @ None => *slot = Some(BoundingBox::new(y, y + 1, x, x + 1)),
        }
    }

    boxes.into_iter().flatten().collect()
}
