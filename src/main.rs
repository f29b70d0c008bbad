use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use itertools::Itertools;
use rootcause::prelude::*;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mutools::data::FileTextureLoader;
use mutools::export::{Encoding, ExportOptions, PreparedTexture, TextureFormat, export_model};
use mutools::models::scene_file::load_scene;
use mutools::models::texture::TextureType;
use mutools::mu::reader::{MuCollider, MuNode, MuRenderer, read_model};
use mutools::props::{discover_props, internal_config, placements};
use mutools::textures::{self, normal_map, png, tga};

/// Build and inspect mu models and their textures
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export scene files to mu models, copying or converting their textures
    Export {
        /// Scene JSON file(s)
        #[arg(required = true)]
        scenes: Vec<PathBuf>,

        /// JSON file with export options. Flags below override it.
        #[arg(short, long)]
        options: Option<PathBuf>,

        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,

        /// Model file stem. Defaults to each scene's file stem when several
        /// scenes are exported at once.
        #[arg(short, long)]
        filename: Option<String>,

        #[arg(long)]
        extension: Option<String>,

        #[arg(short, long)]
        model_name: Option<String>,

        /// TGA_Compressed, TGA_Uncompressed, TGA_Smallest, MBM, PNG or Smallest
        #[arg(short, long)]
        texture_format: Option<TextureFormat>,

        #[arg(long)]
        no_copy_textures: bool,

        #[arg(long)]
        convert_textures: bool,

        #[arg(long)]
        no_rename_textures: bool,
    },
    /// Re-encode an image; the output format follows the output extension
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Treat the input as an engine-encoded normal map
        #[arg(long)]
        normal_map: bool,

        /// Run-length encode TGA output
        #[arg(long)]
        rle: bool,
    },
    /// Generate a tangent-space normal map from a height map
    NormalMap {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long, default_value_t = 1.0)]
        strength: f32,
    },
    /// Print a TGA file's header
    TgaInfo { file: PathBuf },
    /// Print the node tree, materials and textures of a mu file
    Inspect { file: PathBuf },
    /// List the props under a prop root
    Props {
        root: PathBuf,

        /// Write a sample INTERNAL config for the props placed in this scene
        #[arg(long, requires = "write_config")]
        scene: Option<PathBuf>,

        #[arg(long, requires = "scene")]
        write_config: Option<PathBuf>,
    },
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn load_options(path: Option<&Path>) -> Result<ExportOptions, Report> {
    let Some(path) = path else {
        return Ok(ExportOptions::default());
    };
    let text = fs::read_to_string(path)
        .context_with(|| format!("failed to read options file {}", path.display()))?;
    let options = serde_json::from_str(&text)
        .context_with(|| format!("failed to parse options file {}", path.display()))?;
    Ok(options)
}

#[allow(clippy::too_many_arguments)]
fn export(
    scenes: &[PathBuf],
    options_path: Option<&Path>,
    output_dir: Option<PathBuf>,
    filename: Option<String>,
    extension: Option<String>,
    model_name: Option<String>,
    texture_format: Option<TextureFormat>,
    no_copy_textures: bool,
    convert_textures: bool,
    no_rename_textures: bool,
) -> Result<(), Report> {
    let mut options = load_options(options_path)?;
    if let Some(dir) = output_dir {
        options.output_directory = dir;
    }
    if let Some(extension) = extension {
        options.output_extension = extension;
    }
    if let Some(name) = model_name {
        options.model_name = name;
    }
    if let Some(format) = texture_format {
        options.texture_format = format;
    }
    options.copy_textures &= !no_copy_textures;
    options.convert_textures |= convert_textures;
    options.rename_textures &= !no_rename_textures;

    for scene in scenes {
        let mut scene_options = options.clone();
        match (&filename, scenes.len()) {
            (Some(filename), _) => scene_options.output_filename = filename.clone(),
            (None, 1) => {}
            (None, _) => {
                if let Some(stem) = scene.file_stem() {
                    scene_options.output_filename = stem.to_string_lossy().into_owned();
                }
            }
        }

        let root = load_scene(scene)
            .context_with(|| format!("failed to load scene {}", scene.display()))?;
        let summary = export_model(&root, &scene_options, &FileTextureLoader)
            .context_with(|| format!("failed to export {}", scene.display()))?;
        println!(
            "{} -> {} ({} materials, {} textures)",
            scene.display(),
            summary.model_path.display(),
            summary.material_count,
            summary.textures.len()
        );
    }
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), Report> {
    fs::write(path, data).context_with(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = data.len(), "wrote file");
    Ok(())
}

fn convert(input: &Path, output: &Path, normal_map: bool, rle: bool) -> Result<(), Report> {
    let ext = extension_of(output);
    let encoding = Encoding::from_extension(&ext, rle)
        .ok_or_else(|| rootcause::report!("unsupported output extension `{ext}`"))?;
    let bitmap = textures::decode_file(input)
        .context_with(|| format!("failed to decode {}", input.display()))?;
    let texture_type = if normal_map {
        TextureType::NormalMap
    } else {
        TextureType::Texture
    };
    let data = PreparedTexture::new(&bitmap, texture_type, None)?.encode(encoding)?;
    write_file(output, &data)
}

fn generate_normal_map(input: &Path, output: &Path, strength: f32) -> Result<(), Report> {
    let height_map = textures::decode_file(input)
        .context_with(|| format!("failed to decode {}", input.display()))?;
    let normals = normal_map::height_to_normal_map(&height_map, strength);
    let data = match extension_of(output).as_str() {
        "png" => png::encode(&normals)?,
        "tga" => tga::encode(&normals, false, false)?,
        ext => return Err(rootcause::report!("normal maps can only be written as png or tga, not `{ext}`")),
    };
    write_file(output, &data)
}

fn tga_info(path: &Path) -> Result<(), Report> {
    let data = fs::read(path).context_with(|| format!("failed to read {}", path.display()))?;
    let header = tga::TgaHeader::parse(&data)?;
    let image_type = match header.image_type.known() {
        Some(t) => format!("{t:?}"),
        None => format!("unknown ({})", header.image_type.unknown().copied().unwrap_or_default()),
    };
    println!("{}", path.display());
    println!("  image type:   {image_type}");
    println!("  size:         {}x{}", header.width, header.height);
    println!("  pixel depth:  {}", header.pixel_depth);
    println!("  id length:    {}", header.id_length);
    println!("  color map:    {}", header.has_color_map);
    println!("  origin:       {}, {}", header.x_origin, header.y_origin);
    println!("  descriptor:   {:#04x}", header.image_descriptor);
    Ok(())
}

fn describe_node(node: &MuNode) -> String {
    let mut parts = Vec::new();
    if let Some(mesh) = &node.mesh {
        parts.push(format!("mesh {}v/{}s", mesh.vertex_count(), mesh.submeshes.len()));
    }
    match &node.renderer {
        Some(MuRenderer::Mesh { materials, .. }) => {
            parts.push(format!("renderer [{}]", materials.iter().join(", ")))
        }
        Some(MuRenderer::Skinned {
            materials, bones, ..
        }) => parts.push(format!(
            "skinned [{}] {} bones",
            materials.iter().join(", "),
            bones.len()
        )),
        None => {}
    }
    if let Some(collider) = &node.collider {
        parts.push(
            match collider {
                MuCollider::Mesh { .. } => "mesh collider",
                MuCollider::Box(_) => "box collider",
                MuCollider::Capsule(_) => "capsule collider",
                MuCollider::Sphere(_) => "sphere collider",
                MuCollider::Wheel(_) => "wheel collider",
            }
            .to_string(),
        );
    }
    if let Some(animation) = &node.animation {
        parts.push(format!("{} clips", animation.clips.len()));
    }
    if node.light.is_some() {
        parts.push("light".to_string());
    }
    if node.camera.is_some() {
        parts.push("camera".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join("; "))
    }
}

fn print_tree(node: &MuNode, depth: usize) {
    println!("{}{}{}", "  ".repeat(depth), node.name, describe_node(node));
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn inspect(path: &Path) -> Result<(), Report> {
    let data = fs::read(path).context_with(|| format!("failed to read {}", path.display()))?;
    let model = read_model(&data).context_with(|| format!("failed to read {}", path.display()))?;

    println!(
        "{} (version {}, {} nodes)",
        model.name,
        model.version,
        model.root.node_count()
    );
    print_tree(&model.root, 1);

    if !model.materials.is_empty() {
        println!("materials:");
        for (i, material) in model.materials.iter().enumerate() {
            println!(
                "  {i}: {} {:?} [{}]",
                material.name,
                material.shader,
                material.properties.iter().map(|(name, _)| name).join(", ")
            );
        }
    }
    if !model.textures.is_empty() {
        println!("textures:");
        for (i, texture) in model.textures.iter().enumerate() {
            println!("  {i}: {} ({:?})", texture.file_name, texture.texture_type);
        }
    }
    Ok(())
}

fn props(root: &Path, scene: Option<&Path>, write_config: Option<&Path>) -> Result<(), Report> {
    for prop in discover_props(root)? {
        println!(
            "{} ({}/{}): {} proxies",
            prop.name,
            prop.directory,
            prop.config_name,
            prop.proxies.len()
        );
    }

    if let (Some(scene), Some(out)) = (scene, write_config) {
        let root = load_scene(scene)
            .context_with(|| format!("failed to load scene {}", scene.display()))?;
        let config = internal_config(&placements(&root))?;
        write_file(out, config.as_bytes())?;
    }
    Ok(())
}

fn main() -> Result<(), Report> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,mutools=info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Export {
            scenes,
            options,
            output_dir,
            filename,
            extension,
            model_name,
            texture_format,
            no_copy_textures,
            convert_textures,
            no_rename_textures,
        } => export(
            &scenes,
            options.as_deref(),
            output_dir,
            filename,
            extension,
            model_name,
            texture_format,
            no_copy_textures,
            convert_textures,
            no_rename_textures,
        ),
        Command::Convert {
            input,
            output,
            normal_map,
            rle,
        } => convert(&input, &output, normal_map, rle),
        Command::NormalMap {
            input,
            output,
            strength,
        } => generate_normal_map(&input, &output, strength),
        Command::TgaInfo { file } => tga_info(&file),
        Command::Inspect { file } => inspect(&file),
        Command::Props {
            root,
            scene,
            write_config,
        } => props(&root, scene.as_deref(), write_config.as_deref()),
    }
}
