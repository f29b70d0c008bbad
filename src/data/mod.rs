/// Little-endian writer with .NET-style strings
pub mod binary_writer;
// Shared winnow primitives
pub mod parser_utils;

use rootcause::Report;

use crate::models::texture::{Bitmap, TextureAsset};
use crate::textures::{self, TextureError};

/// Source of decoded pixels for texture assets. The exporter never touches
/// image files directly; everything goes through a loader so hosts can supply
/// pixels from wherever their assets live.
pub trait TextureLoader {
    fn load(&self, asset: &TextureAsset) -> Result<Bitmap, Report<TextureError>>;
}

/// Reads assets from their path on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTextureLoader;

impl TextureLoader for FileTextureLoader {
    fn load(&self, asset: &TextureAsset) -> Result<Bitmap, Report<TextureError>> {
        let mut bitmap = textures::decode_file(&asset.path)?;
        if let Some(format) = asset.format {
            bitmap.format = format;
        }
        Ok(bitmap)
    }
}

pub struct TextureLoaderWithCallback<F> {
    callback: F,
}

impl<F> TextureLoaderWithCallback<F>
where
    F: Fn(&TextureAsset) -> Result<Bitmap, Report<TextureError>>,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> TextureLoader for TextureLoaderWithCallback<F>
where
    F: Fn(&TextureAsset) -> Result<Bitmap, Report<TextureError>>,
{
    fn load(&self, asset: &TextureAsset) -> Result<Bitmap, Report<TextureError>> {
        (self.callback)(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::texture::PixelFormat;

    #[test]
    fn callback_loader_passes_asset_through() {
        let loader = TextureLoaderWithCallback::new(|asset: &TextureAsset| {
            let shade = asset.name.len() as u8;
            Ok(Bitmap::filled(1, 1, PixelFormat::Rgb24, [shade, 0, 0, 255]))
        });
        let bitmap = loader.load(&TextureAsset::new("abcd", "abcd.png")).unwrap();
        assert_eq!(bitmap.pixels, [[4, 0, 0, 255]]);
    }

    #[test]
    fn file_loader_applies_import_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.tga");
        let bitmap = Bitmap::filled(2, 2, PixelFormat::Rgba32, [1, 2, 3, 4]);
        std::fs::write(&path, textures::tga::encode(&bitmap, true, true).unwrap()).unwrap();

        let mut asset = TextureAsset::from_path(&path);
        assert_eq!(FileTextureLoader.load(&asset).unwrap(), bitmap);

        asset.format = Some(PixelFormat::Dxt5);
        assert_eq!(FileTextureLoader.load(&asset).unwrap().format, PixelFormat::Dxt5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let asset = TextureAsset::new("gone", "/definitely/not/here.png");
        assert!(FileTextureLoader.load(&asset).is_err());
    }
}
