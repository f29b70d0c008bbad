/// Texture table resolution: copying, renaming and re-encoding texture files
pub mod texture;

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bon::Builder;
use rootcause::Report;
use thiserror::Error;
use tracing::{error, info};

use crate::data::TextureLoader;
use crate::models::scene::SceneNode;
use crate::mu::writer::{ExportContext, write_model};

pub use texture::{Encoding, PreparedTexture, TextureExporter};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("failed to export texture `{name}`")]
    Texture { name: String },
    #[error("invalid export options: {0}")]
    Options(String),
}

pub(crate) fn io_report(path: &Path, e: std::io::Error) -> Report<ExportError> {
    Report::new(ExportError::Io(format!("{}: {e}", path.display())))
}

/// Target format for converted textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureFormat {
    #[cfg_attr(feature = "serde", serde(rename = "TGA_Compressed"))]
    TgaCompressed,
    #[cfg_attr(feature = "serde", serde(rename = "TGA_Uncompressed"))]
    TgaUncompressed,
    /// Raw and run-length TGA, whichever file is smaller.
    #[cfg_attr(feature = "serde", serde(rename = "TGA_Smallest"))]
    TgaSmallest,
    #[cfg_attr(feature = "serde", serde(rename = "MBM"))]
    Mbm,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "PNG"))]
    Png,
    /// MBM, both TGA variants and PNG, whichever file is smallest.
    Smallest,
}

impl TextureFormat {
    pub const ALL: [TextureFormat; 6] = [
        TextureFormat::TgaCompressed,
        TextureFormat::TgaUncompressed,
        TextureFormat::TgaSmallest,
        TextureFormat::Mbm,
        TextureFormat::Png,
        TextureFormat::Smallest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextureFormat::TgaCompressed => "TGA_Compressed",
            TextureFormat::TgaUncompressed => "TGA_Uncompressed",
            TextureFormat::TgaSmallest => "TGA_Smallest",
            TextureFormat::Mbm => "MBM",
            TextureFormat::Png => "PNG",
            TextureFormat::Smallest => "Smallest",
        }
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextureFormat {
    type Err = ExportError;

    /// Accepts the canonical names case-insensitively, with `-` or `_` as
    /// separator (`tga-smallest`, `TGA_Smallest`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|format| format.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| ExportError::Options(format!("unknown texture format `{s}`")))
    }
}

/// Everything that controls where and how a model is written.
#[derive(Debug, Clone, PartialEq, Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ExportOptions {
    /// Name stored in the model header.
    #[builder(into, default = "NewModel".to_string())]
    pub model_name: String,
    #[builder(into, default = PathBuf::from("Parts/NewPart/"))]
    pub output_directory: PathBuf,
    /// Model file stem, also the prefix of renamed and converted textures.
    #[builder(into, default = "model".to_string())]
    pub output_filename: String,
    #[builder(into, default = ".mu".to_string())]
    pub output_extension: String,
    #[builder(default = true)]
    pub copy_textures: bool,
    #[builder(default)]
    pub convert_textures: bool,
    #[builder(default = true)]
    pub rename_textures: bool,
    #[builder(default)]
    pub texture_format: TextureFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExportOptions {
    pub fn model_path(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}{}", self.output_filename, self.output_extension))
    }

    pub(crate) fn validate(&self) -> Result<(), Report<ExportError>> {
        if self.output_filename.is_empty() {
            return Err(Report::new(ExportError::Options(
                "output filename is empty".to_string(),
            )));
        }
        Ok(())
    }
}

/// What one export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub model_path: PathBuf,
    pub material_count: usize,
    /// File name stored for each texture table entry, in table order.
    pub textures: Vec<String>,
}

/// Write `root` as a mu model plus its textures, as configured by `options`.
///
/// Texture pixels come from `loader`; texture files are only read or written
/// when copying is enabled. Nothing is rolled back when a step fails.
pub fn export_model(
    root: &SceneNode,
    options: &ExportOptions,
    loader: &dyn TextureLoader,
) -> Result<ExportSummary, Report<ExportError>> {
    write_export(root, options, loader).inspect_err(|e| {
        error!(
            model = %options.model_name,
            path = %options.model_path().display(),
            "export failed, files already written are left in place: {e}"
        )
    })
}

fn write_export(
    root: &SceneNode,
    options: &ExportOptions,
    loader: &dyn TextureLoader,
) -> Result<ExportSummary, Report<ExportError>> {
    options.validate()?;
    fs::create_dir_all(&options.output_directory)
        .map_err(|e| io_report(&options.output_directory, e))?;

    let model_path = options.model_path();
    info!(
        model = %options.model_name,
        path = %model_path.display(),
        textures = %options.texture_format,
        "exporting model"
    );

    let file = File::create(&model_path).map_err(|e| io_report(&model_path, e))?;
    let mut context = ExportContext::new();
    let mut exporter = TextureExporter::new(options, loader);
    write_model(
        BufWriter::new(file),
        root,
        &options.model_name,
        &mut context,
        &mut exporter,
    )?;

    let summary = ExportSummary {
        model_path,
        material_count: context.materials().len(),
        textures: exporter.into_file_names(),
    };
    info!(
        materials = summary.material_count,
        textures = summary.textures.len(),
        "export finished"
    );
    Ok(summary)
}
