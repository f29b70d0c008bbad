//! PNG through the `image` crate. PNG rows run top to bottom, so rows are
//! flipped on the way in and out.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use rootcause::Report;

use super::TextureError;
use crate::models::texture::{Bitmap, PixelFormat, Rgba};

fn flipped_rows(pixels: &[Rgba], width: usize) -> impl Iterator<Item = &[Rgba]> {
    pixels.chunks(width.max(1)).rev()
}

/// Encode as 8-bit RGB when the source carries no alpha ([`PixelFormat::Rgb24`]
/// or [`PixelFormat::Dxt1`]), RGBA otherwise.
pub fn encode(bitmap: &Bitmap) -> Result<Vec<u8>, Report<TextureError>> {
    super::check_pixel_count(bitmap)?;
    let with_alpha = !matches!(bitmap.format, PixelFormat::Rgb24 | PixelFormat::Dxt1);
    let channels = if with_alpha { 4 } else { 3 };

    let mut raw = Vec::with_capacity(bitmap.pixels.len() * channels);
    for row in flipped_rows(&bitmap.pixels, bitmap.width as usize) {
        for pixel in row {
            raw.extend_from_slice(&pixel[..channels]);
        }
    }

    let color_type = if with_alpha {
        ExtendedColorType::Rgba8
    } else {
        ExtendedColorType::Rgb8
    };

    let mut png_buf = Vec::new();
    PngEncoder::new(&mut png_buf)
        .write_image(&raw, bitmap.width, bitmap.height, color_type)
        .map_err(|e| Report::new(TextureError::Encode(e.to_string())))?;

    Ok(png_buf)
}

/// Decode any image the `image` crate was built to read. Images without an
/// alpha channel come back as [`PixelFormat::Rgb24`].
pub fn decode(data: &[u8]) -> Result<Bitmap, Report<TextureError>> {
    let image = image::load_from_memory(data)
        .map_err(|e| Report::new(TextureError::Decode(e.to_string())))?;

    let format = if image.color().has_alpha() {
        PixelFormat::Rgba32
    } else {
        PixelFormat::Rgb24
    };

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let top_down: Vec<Rgba> = rgba.pixels().map(|p| p.0).collect();
    let pixels = flipped_rows(&top_down, width as usize)
        .flatten()
        .copied()
        .collect();

    Ok(Bitmap::new(width, height, format, pixels))
}
