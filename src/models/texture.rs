//! Texture assets and the decoded pixel buffers the image codecs work on.

use std::path::{Path, PathBuf};

/// How a texture is declared by the material slot that references it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureType {
    Texture = 0,
    NormalMap = 1,
}

impl TextureType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(TextureType::Texture),
            1 => Some(TextureType::NormalMap),
            _ => None,
        }
    }
}

/// Storage format of the source texture. The writers decide whether to emit
/// an alpha channel from this rather than from the pixels themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    /// Block-compressed, no alpha in the source asset.
    Dxt1,
    /// Block-compressed with interpolated alpha.
    Dxt5,
}

pub type Rgba = [u8; 4];

/// A decoded image. Pixels are RGBA, row-major, and row 0 is the bottom
/// scanline (TGA's default origin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<Rgba>,
}

impl Bitmap {
    /// The pixel count is not checked here; the encoders reject a bitmap
    /// whose buffer does not match its dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<Rgba>) -> Self {
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    /// A bitmap filled with a single color.
    pub fn filled(width: u32, height: u32, format: PixelFormat, color: Rgba) -> Self {
        Self::new(
            width,
            height,
            format,
            vec![color; width as usize * height as usize],
        )
    }

    /// Number of pixels `width` and `height` call for.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn has_expected_len(&self) -> bool {
        self.pixels.len() == self.expected_len()
    }

    /// Pixels missing from a short buffer read as transparent black.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Sample with repeat wrapping, so out-of-range neighbours read from the
    /// opposite edge.
    pub fn pixel_wrapped(&self, x: i64, y: i64) -> Rgba {
        let x = x.rem_euclid(self.width as i64) as u32;
        let y = y.rem_euclid(self.height as i64) as u32;
        self.pixel(x, y)
    }

    /// Luminance of a pixel in `[0, 1]`.
    pub fn grayscale_wrapped(&self, x: i64, y: i64) -> f32 {
        let [r, g, b, _] = self.pixel_wrapped(x, y);
        0.299 * (r as f32 / 255.0) + 0.587 * (g as f32 / 255.0) + 0.114 * (b as f32 / 255.0)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// A texture referenced by one or more materials. Identity is the shared
/// pointer, never the contents: two assets with the same path are still two
/// textures.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAsset {
    pub name: String,
    pub path: PathBuf,
    /// Set when the asset is a greyscale height map meant to be turned into a
    /// normal map at export time; the value is the heightmap scale.
    pub convert_to_normal_map: Option<f32>,
    /// Storage format the asset is imported with. When unset the format of the
    /// decoded file is used.
    pub format: Option<PixelFormat>,
}

impl TextureAsset {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            convert_to_normal_map: None,
            format: None,
        }
    }

    /// Name the asset after its file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, path)
    }

    /// Lowercased source extension, without the dot.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}
