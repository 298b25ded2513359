use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::catalog::Catalog;
use crate::colors::channel_colors;
use crate::rect::BoundingBox;

const OUTLINE_WIDTH: u32 = 3;

/// Draws every located object onto a colour copy of `background`.
///
/// Each catalog channel gets its own colour (red, green, blue for the usual
/// three). Boxes are outlined `OUTLINE_WIDTH` pixels thick, growing inward.
pub fn draw_catalog(background: &GrayImage, catalog: &Catalog) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(background.clone()).to_rgb8();
    let colors = channel_colors(catalog.channel_names().count());

    for ((_, objects), color) in catalog.iter().zip(colors) {
        for object in objects {
            draw_thick_box(&mut canvas, &object.bbox, color);
        }
    }
    canvas
}

fn draw_thick_box(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    for inset in 0..OUTLINE_WIDTH {
        let (width, height) = (
            bbox.width().saturating_sub(2 * inset),
            bbox.height().saturating_sub(2 * inset),
        );
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((bbox.col_start + inset) as i32, (bbox.row_start + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}
