//! Texture table resolution for an export.
//!
//! Each unique texture is either referenced by its asset name, copied next
//! to the model, or re-encoded into one of the engine's image formats.
//! "Smallest" policies write every candidate, keep the smallest file and
//! delete the rest.

use std::fs;
use std::path::{Path, PathBuf};

use rootcause::prelude::*;
use tracing::{debug, info};

use super::{ExportError, ExportOptions, TextureFormat, io_report};
use crate::data::TextureLoader;
use crate::models::texture::{Bitmap, PixelFormat, TextureType};
use crate::mu::writer::{TextureRecord, TextureResolver};
use crate::textures::{self, mbm, normal_map, png, tga};

/// One of the file encodings a texture can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Mbm,
    TgaRaw,
    TgaRunLength,
    Png,
}

impl Encoding {
    /// Extension the candidate is written under while it competes.
    fn temp_extension(self) -> &'static str {
        match self {
            Encoding::Mbm => "mbm",
            Encoding::TgaRaw => "tga_temp0",
            Encoding::TgaRunLength => "tga_temp1",
            Encoding::Png => "png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Encoding::Mbm => "mbm",
            Encoding::TgaRaw | Encoding::TgaRunLength => "tga",
            Encoding::Png => "png",
        }
    }

    /// Pick the encoding for an output file extension.
    pub fn from_extension(extension: &str, run_length: bool) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mbm" => Some(Encoding::Mbm),
            "tga" if run_length => Some(Encoding::TgaRunLength),
            "tga" => Some(Encoding::TgaRaw),
            "png" => Some(Encoding::Png),
            _ => None,
        }
    }
}

/// Index of the smallest size. Ties go to the earliest entry, so candidate
/// order doubles as the tie-break priority.
pub fn pick_smallest(sizes: &[u64]) -> Option<usize> {
    sizes
        .iter()
        .enumerate()
        .min_by_key(|(_, size)| **size)
        .map(|(idx, _)| idx)
}

/// Resolves texture table entries by copying or converting texture files
/// into the output directory.
pub struct TextureExporter<'a> {
    options: &'a ExportOptions,
    loader: &'a dyn TextureLoader,
    file_names: Vec<String>,
}

impl<'a> TextureExporter<'a> {
    pub fn new(options: &'a ExportOptions, loader: &'a dyn TextureLoader) -> Self {
        Self {
            options,
            loader,
            file_names: Vec::new(),
        }
    }

    /// File names resolved so far, in table order.
    pub fn into_file_names(self) -> Vec<String> {
        self.file_names
    }

    fn target(&self, file_name: &str) -> PathBuf {
        self.options.output_directory.join(file_name)
    }

    fn stem(&self, index: usize) -> String {
        format!("{}{index:03}", self.options.output_filename)
    }

    fn copy(&self, index: usize, record: &TextureRecord) -> Result<String, Report<ExportError>> {
        let asset = &record.texture;
        let file_name = if self.options.rename_textures {
            format!("{}.{}", self.stem(index), asset.extension())
        } else {
            format!("{}.{}", asset.name, asset.extension())
        };

        let target = self.target(&file_name);
        fs::copy(&asset.path, &target).map_err(|e| io_report(&asset.path, e))?;

        if record.texture_type == TextureType::NormalMap {
            if let Some(strength) = asset.convert_to_normal_map {
                info!(path = %target.display(), "converting height map to a normal map");
                regenerate_normal_map(&target, strength).context(ExportError::Texture {
                    name: asset.name.clone(),
                })?;
            }
        }

        Ok(file_name)
    }

    fn convert(
        &self,
        index: usize,
        record: &TextureRecord,
    ) -> Result<String, Report<ExportError>> {
        let asset = &record.texture;
        let bitmap = self
            .loader
            .load(asset)
            .context(ExportError::Texture {
                name: asset.name.clone(),
            })?;
        let prepared = PreparedTexture::new(
            &bitmap,
            record.texture_type,
            record.texture.convert_to_normal_map,
        )
        .context(ExportError::Texture {
            name: asset.name.clone(),
        })?;

        let candidates: &[Encoding] = match self.options.texture_format {
            TextureFormat::Mbm => &[Encoding::Mbm],
            TextureFormat::TgaCompressed => &[Encoding::TgaRunLength],
            TextureFormat::TgaUncompressed => &[Encoding::TgaRaw],
            TextureFormat::TgaSmallest => &[Encoding::TgaRaw, Encoding::TgaRunLength],
            TextureFormat::Png => &[Encoding::Png],
            TextureFormat::Smallest => &[
                Encoding::Mbm,
                Encoding::TgaRaw,
                Encoding::TgaRunLength,
                Encoding::Png,
            ],
        };

        let stem = self.stem(index);
        if let [only] = candidates {
            let file_name = format!("{stem}.{}", only.extension());
            let data = prepared.encode(*only).context(ExportError::Texture {
                name: asset.name.clone(),
            })?;
            let target = self.target(&file_name);
            fs::write(&target, data).map_err(|e| io_report(&target, e))?;
            return Ok(file_name);
        }

        let mut written = Vec::with_capacity(candidates.len());
        for encoding in candidates {
            let data = prepared.encode(*encoding).context(ExportError::Texture {
                name: asset.name.clone(),
            })?;
            let path = self.target(&format!("{stem}.{}", encoding.temp_extension()));
            fs::write(&path, &data).map_err(|e| io_report(&path, e))?;
            written.push((*encoding, path));
        }

        let mut sizes = Vec::with_capacity(written.len());
        for (_, path) in &written {
            let len = fs::metadata(path).map_err(|e| io_report(path, e))?.len();
            sizes.push(len);
        }
        let winner = pick_smallest(&sizes).unwrap_or_default();
        debug!(?sizes, winner = ?written[winner].0, "picked smallest encoding");

        for (idx, (_, path)) in written.iter().enumerate() {
            if idx != winner {
                fs::remove_file(path).map_err(|e| io_report(path, e))?;
            }
        }

        let (encoding, path) = &written[winner];
        let file_name = format!("{stem}.{}", encoding.extension());
        let target = self.target(&file_name);
        if *path != target {
            if target.exists() {
                fs::remove_file(&target).map_err(|e| io_report(&target, e))?;
            }
            fs::rename(path, &target).map_err(|e| io_report(path, e))?;
        }
        Ok(file_name)
    }
}

impl TextureResolver for TextureExporter<'_> {
    fn resolve(
        &mut self,
        index: usize,
        record: &TextureRecord,
    ) -> Result<String, Report<ExportError>> {
        let file_name = if !self.options.copy_textures {
            record.texture.name.clone()
        } else {
            let file_name = if self.options.convert_textures {
                self.convert(index, record)?
            } else {
                self.copy(index, record)?
            };
            info!(
                source = %record.texture.path.display(),
                target = %file_name,
                "exported texture"
            );
            file_name
        };

        self.file_names.push(file_name.clone());
        Ok(file_name)
    }
}

/// Replace a copied height map with a generic normal map encoded as PNG. The
/// file keeps the name it was copied under.
fn regenerate_normal_map(path: &Path, strength: f32) -> Result<(), Report<textures::TextureError>> {
    let height_map = textures::decode_file(path)?;
    let normals = normal_map::height_to_normal_map(&height_map, strength);
    let data = png::encode(&normals)?;
    fs::write(path, data)
        .map_err(|e| Report::new(textures::TextureError::Io(format!("{}: {e}", path.display()))))
}

/// Pixels prepared for each writer from one loaded texture.
pub struct PreparedTexture<'a> {
    source: &'a Bitmap,
    texture_type: TextureType,
    /// Engine-encoded normal map generated from a height map.
    engine_normals: Option<Bitmap>,
}

impl<'a> PreparedTexture<'a> {
    /// `height_scale` marks `source` as a height map to be turned into a
    /// normal map; it only applies to normal map slots.
    pub fn new(
        source: &'a Bitmap,
        texture_type: TextureType,
        height_scale: Option<f32>,
    ) -> Result<Self, Report<textures::TextureError>> {
        textures::check_pixel_count(source)?;
        let engine_normals = match (texture_type, height_scale) {
            (TextureType::NormalMap, Some(strength)) => Some(
                normal_map::greyscale_to_engine_normal_map(source, strength),
            ),
            _ => None,
        };
        Ok(Self {
            source,
            texture_type,
            engine_normals,
        })
    }

    /// Engine-encoded pixels: the generated normal map, or the source as is.
    fn engine_pixels(&self) -> &Bitmap {
        self.engine_normals.as_ref().unwrap_or(self.source)
    }

    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, Report> {
        let normal_map = self.texture_type == TextureType::NormalMap;
        let data = match encoding {
            Encoding::Mbm => mbm::encode(self.engine_pixels(), self.texture_type)?,
            Encoding::TgaRaw | Encoding::TgaRunLength => {
                let run_length = encoding == Encoding::TgaRunLength;
                if normal_map {
                    let generic = normal_map::engine_to_generic(self.engine_pixels());
                    tga::encode(&generic, false, run_length)?
                } else {
                    let with_alpha = matches!(
                        self.source.format,
                        PixelFormat::Rgba32 | PixelFormat::Dxt1 | PixelFormat::Dxt5
                    );
                    tga::encode(self.source, with_alpha, run_length)?
                }
            }
            Encoding::Png => {
                if normal_map {
                    png::encode(&normal_map::engine_to_generic(self.engine_pixels()))?
                } else {
                    png::encode(self.source)?
                }
            }
        };
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rc;
    use crate::data::TextureLoaderWithCallback;
    use crate::models::texture::TextureAsset;
    use crate::textures::TextureError;

    fn noisy_bitmap() -> Bitmap {
        let pixels = (0..64u8).map(|i| [i, i * 3, 255 - i, 255]).collect();
        Bitmap::new(8, 8, PixelFormat::Rgb24, pixels)
    }

    fn options(dir: &Path, format: TextureFormat) -> ExportOptions {
        ExportOptions::builder()
            .output_directory(dir)
            .output_filename("part")
            .convert_textures(true)
            .texture_format(format)
            .build()
    }

    fn record(texture_type: TextureType) -> TextureRecord {
        TextureRecord {
            texture: Rc::new(TextureAsset::new("panel", "panel.png")),
            texture_type,
        }
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn smallest_size_wins_with_first_on_ties() {
        assert_eq!(pick_smallest(&[120, 80, 150]), Some(1));
        assert_eq!(pick_smallest(&[80, 80, 80, 80]), Some(0));
        assert_eq!(pick_smallest(&[90, 80, 80, 100]), Some(1));
        assert_eq!(pick_smallest(&[]), None);
    }

    #[test]
    fn flat_texture_picks_run_length_tga() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), TextureFormat::TgaSmallest);
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| {
            Ok::<_, Report<TextureError>>(Bitmap::filled(16, 16, PixelFormat::Rgb24, [9, 9, 9, 255]))
        });
        let mut exporter = TextureExporter::new(&options, &loader);

        let name = exporter.resolve(3, &record(TextureType::Texture)).unwrap();
        assert_eq!(name, "part003.tga");
        assert_eq!(dir_names(dir.path()), ["part003.tga"]);

        let data = fs::read(dir.path().join("part003.tga")).unwrap();
        let header = tga::TgaHeader::parse(&data).unwrap();
        assert!(header.image_type.known().is_some_and(|t| t.is_run_length()));
    }

    #[test]
    fn mismatched_pixel_buffer_fails_the_texture() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), TextureFormat::Png);
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| {
            Ok::<_, Report<TextureError>>(Bitmap {
                width: 16,
                height: 16,
                format: PixelFormat::Rgb24,
                pixels: vec![[1, 2, 3, 255]; 20],
            })
        });
        let mut exporter = TextureExporter::new(&options, &loader);

        let err = exporter
            .resolve(0, &record(TextureType::NormalMap))
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            ExportError::Texture { name } if name == "panel"
        ));
        assert!(dir_names(dir.path()).is_empty());
    }

    #[test]
    fn noisy_texture_keeps_raw_tga() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), TextureFormat::TgaSmallest);
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| {
            Ok::<_, Report<TextureError>>(noisy_bitmap())
        });
        let mut exporter = TextureExporter::new(&options, &loader);

        exporter.resolve(0, &record(TextureType::Texture)).unwrap();
        let data = fs::read(dir.path().join("part000.tga")).unwrap();
        let header = tga::TgaHeader::parse(&data).unwrap();
        assert!(!header.image_type.known().is_some_and(|t| t.is_run_length()));
        assert_eq!(header.pixel_depth, 24);
    }

    #[test]
    fn smallest_leaves_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), TextureFormat::Smallest);
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| {
            Ok::<_, Report<TextureError>>(Bitmap::filled(32, 32, PixelFormat::Rgba32, [1, 2, 3, 4]))
        });
        let mut exporter = TextureExporter::new(&options, &loader);

        let name = exporter.resolve(0, &record(TextureType::Texture)).unwrap();
        assert_eq!(dir_names(dir.path()), [name]);
        assert!(!dir.path().join("part000.tga_temp0").exists());
        assert!(!dir.path().join("part000.tga_temp1").exists());
    }

    #[test]
    fn normal_maps_are_written_as_generic_rgb_tga() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), TextureFormat::TgaUncompressed);
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| {
            Ok::<_, Report<TextureError>>(Bitmap::filled(2, 2, PixelFormat::Rgba32, [10, 20, 30, 40]))
        });
        let mut exporter = TextureExporter::new(&options, &loader);

        exporter.resolve(0, &record(TextureType::NormalMap)).unwrap();
        let bitmap = tga::decode(&fs::read(dir.path().join("part000.tga")).unwrap()).unwrap();
        assert_eq!(bitmap.format, PixelFormat::Rgb24);
        assert_eq!(bitmap.pixels[0], [40, 10, 255, 255]);
    }

    #[test]
    fn converted_height_map_becomes_engine_normal_map_in_mbm() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), TextureFormat::Mbm);
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| {
            Ok::<_, Report<TextureError>>(Bitmap::filled(2, 2, PixelFormat::Rgb24, [128, 128, 128, 255]))
        });
        let mut exporter = TextureExporter::new(&options, &loader);

        let mut record = record(TextureType::NormalMap);
        let mut asset = (*record.texture).clone();
        asset.convert_to_normal_map = Some(0.25);
        record.texture = Rc::new(asset);

        exporter.resolve(0, &record).unwrap();
        let data = fs::read(dir.path().join("part000.mbm")).unwrap();
        // magic (4) + width, height, type, depth
        assert_eq!(&data[12..16], &(TextureType::NormalMap as i32).to_le_bytes());
        assert_eq!(&data[16..20], &32i32.to_le_bytes());
        // a flat height map yields (0, 1, 0), remapped to (0.5, 1, 0.5)
        assert_eq!(&data[20..24], &[0, 128, 255, 128]);
    }

    #[test]
    fn copy_keeps_extension_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("Panel.TGA");
        fs::write(&source, b"not really a tga").unwrap();

        let options = ExportOptions::builder()
            .output_directory(dir.path())
            .output_filename("part")
            .build();
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| -> Result<Bitmap, Report<TextureError>> {
            panic!("copying never decodes")
        });
        let mut exporter = TextureExporter::new(&options, &loader);
        let record = TextureRecord {
            texture: Rc::new(TextureAsset::from_path(&source)),
            texture_type: TextureType::Texture,
        };

        assert_eq!(exporter.resolve(7, &record).unwrap(), "part007.tga");
        assert_eq!(
            fs::read(dir.path().join("part007.tga")).unwrap(),
            b"not really a tga"
        );

        let options = ExportOptions {
            rename_textures: false,
            ..options
        };
        let mut exporter = TextureExporter::new(&options, &loader);
        assert_eq!(exporter.resolve(7, &record).unwrap(), "Panel.tga");
    }

    #[test]
    fn copied_height_map_is_regenerated_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("bumps.tga");
        let height = Bitmap::filled(4, 4, PixelFormat::Rgb24, [200, 200, 200, 255]);
        fs::write(&source, tga::encode(&height, false, false).unwrap()).unwrap();

        let options = ExportOptions::builder()
            .output_directory(dir.path())
            .output_filename("part")
            .build();
        let loader = TextureLoaderWithCallback::new(|_: &TextureAsset| -> Result<Bitmap, Report<TextureError>> {
            panic!("copying never decodes through the loader")
        });
        let mut exporter = TextureExporter::new(&options, &loader);
        let mut asset = TextureAsset::from_path(&source);
        asset.convert_to_normal_map = Some(1.0);
        let record = TextureRecord {
            texture: Rc::new(asset),
            texture_type: TextureType::NormalMap,
        };

        assert_eq!(exporter.resolve(0, &record).unwrap(), "part000.tga");
        let data = fs::read(dir.path().join("part000.tga")).unwrap();
        let normals = png::decode(&data).unwrap();
        assert_eq!(normals.format, PixelFormat::Rgb24);
        assert_eq!(normals.width, 4);
    }
}
