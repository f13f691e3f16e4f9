use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use segmentation::PointPrompt;

use crate::error::{AnnotationError, Result};

/// Blend weight of the highlight layer.
pub const MASK_ALPHA: f32 = 0.5;

/// Colour of the click markers drawn on top of the composite.
pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Highlight colours cycled per accepted mask, in insertion order.
pub const MASK_PALETTE: [Rgb<u8>; 4] = [
    Rgb([255, 0, 0]),
    Rgb([0, 200, 80]),
    Rgb([40, 110, 255]),
    Rgb([255, 160, 0]),
];

const MARKER_ARM: i32 = 5;
const MARKER_THICKNESS: u32 = 3;

/// Composite a binary mask onto an image.
///
/// A copy of the image is painted with `colour` wherever the mask is
/// non-zero; the painted copy is then blended with the original uniformly
/// over the whole canvas, weight `alpha` for the painted layer. Pixels
/// outside the mask blend with themselves and come out unchanged, so an
/// all-zero mask is the identity.
///
/// Rounding policy: per-channel f32 arithmetic, round half away from zero,
/// saturating cast to u8. Bit-identical output for identical inputs.
pub fn overlay(image: &RgbImage, mask: &GrayImage, colour: Rgb<u8>, alpha: f32) -> Result<RgbImage> {
    ensure_same_dimensions(image, mask)?;

    let mut painted = image.clone();
    for (x, y, pixel) in painted.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] > 0 {
            *pixel = colour;
        }
    }
    for (blended, original) in painted.pixels_mut().zip(image.pixels()) {
        for channel in 0..3 {
            blended[channel] = blend_channel(blended[channel], original[channel], alpha);
        }
    }
    Ok(painted)
}

/// Draw the click marker: an 11 px cross with 3 px thick bars, clipped at
/// the image border.
pub fn draw_marker(image: &mut RgbImage, x: u32, y: u32) {
    let (cx, cy) = (x as i32, y as i32);
    let span = (2 * MARKER_ARM + 1) as u32;
    let half_thickness = (MARKER_THICKNESS / 2) as i32;

    let horizontal = Rect::at(cx - MARKER_ARM, cy - half_thickness).of_size(span, MARKER_THICKNESS);
    draw_filled_rect_mut(image, horizontal, MARKER_COLOR);

    let vertical = Rect::at(cx - half_thickness, cy - MARKER_ARM).of_size(MARKER_THICKNESS, span);
    draw_filled_rect_mut(image, vertical, MARKER_COLOR);
}

/// Rebuild the display buffer from its sources: composite every mask in
/// insertion order (later masks take visual precedence where they overlap),
/// then draw every point's marker in insertion order on top.
///
/// Pure function of `(base, masks, points)`. Alpha blending is not
/// invertible from the composited buffer alone, so undo replays this fold
/// instead of patching the previous display.
pub fn render_display(
    base: &RgbImage,
    masks: &[GrayImage],
    points: &[PointPrompt],
) -> Result<RgbImage> {
    let mut display = base.clone();
    for (index, mask) in masks.iter().enumerate() {
        let colour = MASK_PALETTE[index % MASK_PALETTE.len()];
        display = overlay(&display, mask, colour, MASK_ALPHA)?;
    }
    for point in points {
        draw_marker(&mut display, point.x, point.y);
    }
    Ok(display)
}

fn blend_channel(top: u8, bottom: u8, alpha: f32) -> u8 {
    let value = alpha * top as f32 + (1.0 - alpha) * bottom as f32;
    value.round().clamp(0.0, 255.0) as u8
}

fn ensure_same_dimensions(image: &RgbImage, mask: &GrayImage) -> Result<()> {
    if image.dimensions() != mask.dimensions() {
        return Err(AnnotationError::MaskDimensionMismatch {
            width: image.width(),
            height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }
    Ok(())
}
