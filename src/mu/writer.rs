//! Serializes a [`SceneNode`] tree into a mu stream.
//!
//! The tree is written depth-first. Materials met on the way are collected
//! into an [`ExportContext`] and appended after the tree, followed by the
//! textures those materials reference.

use std::io::{self, Write};

use rootcause::Report;
use tracing::{debug, trace};

use super::shader::{Property, ShaderModel};
use super::{EntryType, FILE_TYPE, FILE_VERSION};
use crate::Rc;
use crate::data::binary_writer::BinaryWriter;
use crate::export::ExportError;
use crate::models::material::Material;
use crate::models::mesh::Mesh;
use crate::models::scene::{
    Animation, Bounds, Camera, Collider, Color, Light, Renderer, SceneNode, Transform,
    WheelFriction,
};
use crate::models::texture::{TextureAsset, TextureType};

/// A texture table entry: the asset and the slot type it was first seen in.
#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub texture: Rc<TextureAsset>,
    pub texture_type: TextureType,
}

/// Deduplication tables for one export. Entries are compared by pointer, so
/// two equal-looking materials are still two entries.
#[derive(Debug, Default)]
pub struct ExportContext {
    materials: Vec<Rc<Material>>,
    textures: Vec<TextureRecord>,
}

impl ExportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material_index(&mut self, material: &Rc<Material>) -> usize {
        if let Some(idx) = self.materials.iter().position(|m| Rc::ptr_eq(m, material)) {
            return idx;
        }
        self.materials.push(material.clone());
        self.materials.len() - 1
    }

    /// Index of `texture` in the table. The declared type is fixed by the
    /// first slot that references the texture.
    pub fn texture_index(&mut self, texture: &Rc<TextureAsset>, texture_type: TextureType) -> usize {
        if let Some(idx) = self
            .textures
            .iter()
            .position(|t| Rc::ptr_eq(&t.texture, texture))
        {
            return idx;
        }
        self.textures.push(TextureRecord {
            texture: texture.clone(),
            texture_type,
        });
        self.textures.len() - 1
    }

    pub fn materials(&self) -> &[Rc<Material>] {
        &self.materials
    }

    pub fn textures(&self) -> &[TextureRecord] {
        &self.textures
    }
}

/// Decides the file name stored for each texture table entry, producing any
/// texture files on the way.
pub trait TextureResolver {
    fn resolve(&mut self, index: usize, record: &TextureRecord)
    -> Result<String, Report<ExportError>>;
}

/// Stores each texture under its asset name without touching any files.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetNameResolver;

impl TextureResolver for AssetNameResolver {
    fn resolve(
        &mut self,
        _index: usize,
        record: &TextureRecord,
    ) -> Result<String, Report<ExportError>> {
        Ok(record.texture.name.clone())
    }
}

fn io_error(e: io::Error) -> Report<ExportError> {
    Report::new(ExportError::Io(e.to_string()))
}

/// Write a complete mu stream for `root` and return the underlying writer.
pub fn write_model<W: Write>(
    out: W,
    root: &SceneNode,
    model_name: &str,
    context: &mut ExportContext,
    resolver: &mut dyn TextureResolver,
) -> Result<W, Report<ExportError>> {
    let mut writer = MuWriter {
        out: BinaryWriter::new(out),
        context,
    };

    writer.write_header(model_name).map_err(io_error)?;
    writer.write_node(root).map_err(io_error)?;

    if !writer.context.materials.is_empty() {
        writer.write_materials().map_err(io_error)?;
        if !writer.context.textures.is_empty() {
            writer.write_textures(resolver)?;
        }
    }

    writer.out.flush().map_err(io_error)?;
    Ok(writer.out.into_inner())
}

struct MuWriter<'a, W> {
    out: BinaryWriter<W>,
    context: &'a mut ExportContext,
}

impl<W: Write> MuWriter<'_, W> {
    fn tag(&mut self, tag: EntryType) -> io::Result<()> {
        self.out.write_i32(tag as i32)
    }

    fn write_header(&mut self, model_name: &str) -> io::Result<()> {
        self.out.write_i32(FILE_TYPE)?;
        self.out.write_i32(FILE_VERSION)?;
        self.out.write_string(model_name)
    }

    fn write_node(&mut self, node: &SceneNode) -> io::Result<()> {
        trace!(name = %node.name, "writing node");

        self.write_transform(&node.name, &node.transform)?;

        self.tag(EntryType::TagAndLayer)?;
        self.out.write_string(&node.tag)?;
        self.out.write_i32(node.layer)?;

        if let Some(collider) = &node.collider {
            self.write_collider(collider)?;
        }
        if let Some(mesh) = &node.mesh {
            self.tag(EntryType::MeshFilter)?;
            self.write_mesh(mesh)?;
        }
        if let Some(renderer) = &node.renderer {
            self.write_renderer(renderer)?;
        }
        if let Some(animation) = node.animation.as_ref().filter(|a| !a.clips.is_empty()) {
            self.write_animation(animation)?;
        }
        if let Some(light) = &node.light {
            self.write_light(light)?;
        }
        if let Some(camera) = &node.camera {
            self.write_camera(camera)?;
        }

        for child in node.exported_children() {
            self.tag(EntryType::ChildTransformStart)?;
            self.write_node(child)?;
            self.tag(EntryType::ChildTransformEnd)?;
        }

        self.out.flush()
    }

    /// The transform record has no tag of its own. Scale X is stored twice.
    fn write_transform(&mut self, name: &str, transform: &Transform) -> io::Result<()> {
        self.out.write_string(name)?;
        self.out.write_floats(&transform.position)?;
        self.out.write_floats(&transform.rotation)?;
        self.out.write_floats(&transform.scale)?;
        self.out.write_f32(transform.scale[0])
    }

    fn write_bounds(&mut self, bounds: &Bounds) -> io::Result<()> {
        self.out.write_floats(&bounds.center)?;
        self.out.write_floats(&bounds.size)
    }

    fn write_color(&mut self, color: &Color) -> io::Result<()> {
        self.out.write_floats(color)
    }

    fn write_friction(&mut self, friction: &WheelFriction) -> io::Result<()> {
        self.out.write_floats(&[
            friction.extremum_slip,
            friction.extremum_value,
            friction.asymptote_slip,
            friction.asymptote_value,
            friction.stiffness,
        ])
    }

    fn write_collider(&mut self, collider: &Collider) -> io::Result<()> {
        match collider {
            Collider::Mesh(c) => {
                self.tag(EntryType::MeshCollider2)?;
                self.out.write_bool(c.is_trigger)?;
                self.out.write_bool(c.convex)?;
                self.write_mesh(&c.mesh)
            }
            Collider::Box(c) => {
                self.tag(EntryType::BoxCollider2)?;
                self.out.write_bool(c.is_trigger)?;
                self.out.write_floats(&c.size)?;
                self.out.write_floats(&c.center)
            }
            Collider::Capsule(c) => {
                self.tag(EntryType::CapsuleCollider2)?;
                self.out.write_bool(c.is_trigger)?;
                self.out.write_f32(c.radius)?;
                self.out.write_f32(c.height)?;
                self.out.write_i32(c.direction)?;
                self.out.write_floats(&c.center)
            }
            Collider::Sphere(c) => {
                self.tag(EntryType::SphereCollider2)?;
                self.out.write_bool(c.is_trigger)?;
                self.out.write_f32(c.radius)?;
                self.out.write_floats(&c.center)
            }
            Collider::Wheel(c) => {
                self.tag(EntryType::WheelCollider)?;
                self.out.write_f32(c.mass)?;
                self.out.write_f32(c.radius)?;
                self.out.write_f32(c.suspension_distance)?;
                self.out.write_floats(&c.center)?;
                self.out.write_f32(c.spring)?;
                self.out.write_f32(c.damper)?;
                self.out.write_f32(c.target_position)?;
                self.write_friction(&c.forward_friction)?;
                self.write_friction(&c.sideways_friction)
            }
        }
    }

    fn write_material_indices(&mut self, materials: &[Rc<Material>]) -> io::Result<()> {
        self.out.write_len(materials.len())?;
        for material in materials {
            let idx = self.context.material_index(material);
            self.out.write_len(idx)?;
        }
        Ok(())
    }

    fn write_renderer(&mut self, renderer: &Renderer) -> io::Result<()> {
        match renderer {
            Renderer::Mesh(r) => {
                self.tag(EntryType::MeshRenderer)?;
                self.out.write_bool(r.cast_shadows)?;
                self.out.write_bool(r.receive_shadows)?;
                self.write_material_indices(&r.materials)
            }
            Renderer::Skinned(r) => {
                self.tag(EntryType::SkinnedMeshRenderer)?;
                self.write_material_indices(&r.materials)?;
                self.write_bounds(&r.local_bounds)?;
                self.out.write_i32(r.quality as i32)?;
                self.out.write_bool(r.update_when_offscreen)?;
                self.out.write_len(r.bones.len())?;
                for bone in &r.bones {
                    self.out.write_string(bone)?;
                }
                self.write_mesh(&r.mesh)
            }
        }
    }

    fn write_animation(&mut self, animation: &Animation) -> io::Result<()> {
        self.tag(EntryType::Animation)?;
        self.out.write_len(animation.clips.len())?;

        for clip in &animation.clips {
            self.out.write_string(&clip.name)?;
            self.write_bounds(&clip.local_bounds)?;
            self.out.write_i32(clip.wrap_mode as i32)?;

            self.out.write_len(clip.curves.len())?;
            for curve in &clip.curves {
                self.out.write_string(&curve.path)?;
                self.out.write_string(&curve.property)?;
                self.out.write_i32(curve.target as i32)?;
                self.out.write_i32(curve.pre_wrap as i32)?;
                self.out.write_i32(curve.post_wrap as i32)?;

                self.out.write_len(curve.keys.len())?;
                for key in &curve.keys {
                    self.out
                        .write_floats(&[key.time, key.value, key.in_tangent, key.out_tangent])?;
                    self.out.write_i32(key.tangent_mode)?;
                }
            }
        }

        self.out
            .write_string(animation.default_clip.as_deref().unwrap_or(""))?;
        self.out.write_bool(animation.play_automatically)
    }

    fn write_light(&mut self, light: &Light) -> io::Result<()> {
        self.tag(EntryType::Light)?;
        self.out.write_i32(light.light_type as i32)?;
        self.out.write_f32(light.intensity)?;
        self.out.write_f32(light.range)?;
        self.write_color(&light.color)?;
        self.out.write_i32(light.culling_mask)?;
        self.out.write_f32(light.spot_angle)
    }

    fn write_camera(&mut self, camera: &Camera) -> io::Result<()> {
        self.tag(EntryType::Camera)?;
        self.out.write_i32(camera.clear_flags as i32)?;
        self.write_color(&camera.background_color)?;
        self.out.write_i32(camera.culling_mask)?;
        self.out.write_bool(camera.orthographic)?;
        self.out
            .write_floats(&[camera.fov, camera.near, camera.far, camera.depth])
    }

    /// Optional per-vertex blocks are only written when they cover every
    /// vertex; a reader tells which ones are present from their tags.
    fn write_mesh(&mut self, mesh: &Mesh) -> io::Result<()> {
        let vertex_count = mesh.vertex_count();

        self.tag(EntryType::MeshStart)?;
        self.out.write_len(vertex_count)?;
        self.out.write_len(mesh.submeshes.len())?;

        self.tag(EntryType::MeshVerts)?;
        for v in &mesh.vertices {
            self.out.write_floats(v)?;
        }

        if mesh.matches_vertices(mesh.uv.len()) {
            self.tag(EntryType::MeshUV)?;
            for uv in &mesh.uv {
                self.out.write_floats(uv)?;
            }
        }
        if mesh.matches_vertices(mesh.uv2.len()) {
            self.tag(EntryType::MeshUV2)?;
            for uv in &mesh.uv2 {
                self.out.write_floats(uv)?;
            }
        }
        if mesh.matches_vertices(mesh.normals.len()) {
            self.tag(EntryType::MeshNormals)?;
            for n in &mesh.normals {
                self.out.write_floats(n)?;
            }
        }
        if mesh.matches_vertices(mesh.tangents.len()) {
            self.tag(EntryType::MeshTangents)?;
            for t in &mesh.tangents {
                self.out.write_floats(t)?;
            }
        }
        if mesh.matches_vertices(mesh.bone_weights.len()) {
            self.tag(EntryType::MeshBoneWeights)?;
            for w in &mesh.bone_weights {
                for (index, weight) in w.indices.iter().zip(&w.weights) {
                    self.out.write_i32(*index)?;
                    self.out.write_f32(*weight)?;
                }
            }
        }

        if !mesh.bind_poses.is_empty() {
            self.tag(EntryType::MeshBindPoses)?;
            self.out.write_len(mesh.bind_poses.len())?;
            for pose in &mesh.bind_poses {
                for row in pose {
                    self.out.write_floats(row)?;
                }
            }
        }

        for triangles in &mesh.submeshes {
            self.tag(EntryType::MeshTriangles)?;
            self.out.write_len(triangles.len())?;
            for idx in triangles {
                self.out.write_i32(*idx)?;
            }
        }

        self.tag(EntryType::MeshEnd)
    }

    fn write_materials(&mut self) -> io::Result<()> {
        let materials = self.context.materials.clone();
        debug!(count = materials.len(), "writing material table");

        self.tag(EntryType::Materials)?;
        self.out.write_len(materials.len())?;
        for material in &materials {
            self.write_material(material)?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn write_material(&mut self, material: &Material) -> io::Result<()> {
        let model = ShaderModel::for_shader_name(&material.shader);
        trace!(name = %material.name, shader = %material.shader, ?model, "writing material");

        self.out.write_string(&material.name)?;
        self.out.write_i32(model as i32)?;

        for property in model.layout() {
            match *property {
                Property::Texture(name, texture_type) => {
                    let slot = material.texture(name);
                    let index = match &slot.texture {
                        Some(texture) => self.context.texture_index(texture, texture_type) as i32,
                        None => -1,
                    };
                    self.out.write_i32(index)?;
                    self.out.write_floats(&slot.scale)?;
                    self.out.write_floats(&slot.offset)?;
                }
                Property::Color(name) => self.write_color(&material.color(name))?,
                Property::Float(name) => self.out.write_f32(material.float(name))?,
            }
        }
        Ok(())
    }

    fn write_textures(
        &mut self,
        resolver: &mut dyn TextureResolver,
    ) -> Result<(), Report<ExportError>> {
        let textures = self.context.textures.clone();
        debug!(count = textures.len(), "writing texture table");

        self.tag(EntryType::Textures).map_err(io_error)?;
        self.out.write_len(textures.len()).map_err(io_error)?;
        for (index, record) in textures.iter().enumerate() {
            let file_name = resolver.resolve(index, record)?;
            self.out.write_string(&file_name).map_err(io_error)?;
            self.out
                .write_i32(record.texture_type as i32)
                .map_err(io_error)?;
        }
        self.out.flush().map_err(io_error)
    }
}
