/// MBM bitmap writer
pub mod mbm;
/// Tangent-space normal map generation
pub mod normal_map;
/// PNG encoding and decoding through the `image` crate
pub mod png;
/// TGA header, decoder and run-length encoder
pub mod tga;

use std::path::Path;

use rootcause::Report;
use thiserror::Error;
use tracing::debug;

use crate::models::texture::Bitmap;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("unsupported image: {0}")]
    UnsupportedFormat(String),
    #[error("malformed image: {0}")]
    MalformedInput(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Reject a bitmap whose pixel buffer does not match its dimensions before
/// it reaches an encoder.
pub fn check_pixel_count(bitmap: &Bitmap) -> Result<(), Report<TextureError>> {
    if bitmap.has_expected_len() {
        return Ok(());
    }
    Err(Report::new(TextureError::MalformedInput(format!(
        "{}x{} bitmap holds {} pixels, expected {}",
        bitmap.width,
        bitmap.height,
        bitmap.pixels.len(),
        bitmap.expected_len()
    ))))
}

/// Decode an image file by extension: TGA through our own decoder, anything
/// else through the `image` crate.
pub fn decode_file(path: &Path) -> Result<Bitmap, Report<TextureError>> {
    let data = std::fs::read(path).map_err(|e| {
        Report::new(TextureError::Io(format!("{}: {e}", path.display())))
    })?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    debug!(path = %path.display(), bytes = data.len(), "decoding texture");
    match ext.as_str() {
        "tga" => tga::decode_image(&data).map_err(|e| Report::new(TextureError::from(&e))),
        _ => png::decode(&data),
    }
}

impl From<&tga::TgaError> for TextureError {
    fn from(e: &tga::TgaError) -> Self {
        match e {
            tga::TgaError::UnsupportedImageType(_) | tga::TgaError::UnsupportedDepth(_) => {
                TextureError::UnsupportedFormat(e.to_string())
            }
            tga::TgaError::TooLarge { .. } => TextureError::Encode(e.to_string()),
            _ => TextureError::MalformedInput(e.to_string()),
        }
    }
}
