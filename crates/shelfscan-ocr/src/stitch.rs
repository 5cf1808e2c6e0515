//! Vertical stitching of several product images into one OCR request.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::OcrError;

pub const BORDER_PX: u32 = 16;
pub const BORDER_COLOR: [u8; 3] = [0x11, 0x11, 0x11];

/// Stacks images top to bottom, centred on the widest one, separated by
/// `border_px` rows of `border_color`. Side padding uses the same colour.
#[must_use]
pub fn stack_vertically(images: &[DynamicImage], border_px: u32, border_color: [u8; 3]) -> RgbaImage {
    let max_width = images.iter().map(DynamicImage::width).max().unwrap_or(0);
    let gaps = u32::try_from(images.len().saturating_sub(1)).unwrap_or(u32::MAX);
    let total_height = images
        .iter()
        .map(DynamicImage::height)
        .fold(0u32, u32::saturating_add)
        .saturating_add(border_px.saturating_mul(gaps));

    let [r, g, b] = border_color;
    let mut canvas = RgbaImage::from_pixel(max_width, total_height, Rgba([r, g, b, 255]));

    let mut y_offset = 0u32;
    for img in images {
        let x_offset = (max_width - img.width()) / 2;
        image::imageops::overlay(
            &mut canvas,
            &img.to_rgba8(),
            i64::from(x_offset),
            i64::from(y_offset),
        );
        y_offset = y_offset
            .saturating_add(img.height())
            .saturating_add(border_px);
    }
    canvas
}

/// Decodes each buffer, stacks them and encodes the result as PNG.
///
/// # Errors
///
/// Returns [`OcrError::Unreadable`] if any buffer is not a decodable image or
/// the stitched image cannot be encoded.
pub fn stitch_png(buffers: &[Vec<u8>]) -> Result<Vec<u8>, OcrError> {
    let images = buffers
        .iter()
        .enumerate()
        .map(|(idx, bytes)| {
            image::load_from_memory(bytes)
                .map_err(|e| OcrError::Unreadable(format!("image {idx} in batch: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stacked = DynamicImage::ImageRgba8(stack_vertically(&images, BORDER_PX, BORDER_COLOR));
    let rgb = DynamicImage::ImageRgb8(stacked.to_rgb8());

    let mut output = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| OcrError::Unreadable(format!("encoding stitched image: {e}")))?;
    Ok(output)
}
