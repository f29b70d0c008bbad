//! Decodes a mu stream back into a document tree.
//!
//! Material and texture references stay as table indices; nothing is
//! resolved against files on disk.

use rootcause::Report;
use thiserror::Error;
use tracing::warn;
use winnow::error::{ContextError, ErrMode};

use super::shader::{Property, ShaderModel};
use super::{EntryType, FILE_TYPE, FILE_VERSION};
use crate::data::parser_utils::{
    WResult, offset_in, read_array, read_bool, read_f32, read_i32, read_string, read_vec2,
    read_vec3, read_vec4,
};
use crate::models::mesh::{BoneWeight, Matrix4x4, Mesh, Vec2};
use crate::models::scene::{
    Animation, AnimationClip, AnimationCurve, AnimationTarget, Bounds, BoxCollider, Camera,
    CapsuleCollider, ClearFlags, Color, Keyframe, Light, LightType, SkinQuality, SphereCollider,
    Transform, WheelCollider, WheelFriction, WrapMode,
};
use crate::models::texture::TextureType;
use crate::recognized::Recognized;

/// Deepest child nesting accepted before the stream is rejected.
pub const MAX_NODE_DEPTH: usize = 128;

#[derive(Debug, Error)]
pub enum MuReadError {
    #[error("not a mu file: file type {0}, expected {FILE_TYPE}")]
    BadFileType(i32),
    #[error("unexpected end of data at offset 0x{offset:X}")]
    UnexpectedEof { offset: usize },
    #[error("unexpected tag {tag} at offset 0x{offset:X}")]
    UnexpectedTag {
        tag: Recognized<EntryType, i32>,
        offset: usize,
    },
    #[error("superseded collider tag {tag:?} at offset 0x{offset:X}")]
    LegacyCollider { tag: EntryType, offset: usize },
    #[error("node at offset 0x{offset:X} is nested deeper than {MAX_NODE_DEPTH} levels")]
    TooDeep { offset: usize },
    #[error("invalid {what} value {value} at offset 0x{offset:X}")]
    InvalidValue {
        what: &'static str,
        value: i32,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MuModel {
    pub name: String,
    pub version: i32,
    pub root: MuNode,
    pub materials: Vec<MuMaterial>,
    pub textures: Vec<MuTexture>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MuNode {
    pub name: String,
    pub transform: Transform,
    pub tag: String,
    pub layer: i32,
    pub collider: Option<MuCollider>,
    pub mesh: Option<Mesh>,
    pub renderer: Option<MuRenderer>,
    pub animation: Option<Animation>,
    pub light: Option<Light>,
    pub camera: Option<Camera>,
    pub children: Vec<MuNode>,
}

impl MuNode {
    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MuNode::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MuCollider {
    Mesh {
        is_trigger: bool,
        convex: bool,
        mesh: Mesh,
    },
    Box(BoxCollider),
    Capsule(CapsuleCollider),
    Sphere(SphereCollider),
    Wheel(WheelCollider),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MuRenderer {
    Mesh {
        cast_shadows: bool,
        receive_shadows: bool,
        materials: Vec<i32>,
    },
    Skinned {
        materials: Vec<i32>,
        local_bounds: Bounds,
        quality: SkinQuality,
        update_when_offscreen: bool,
        bones: Vec<String>,
        mesh: Mesh,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Texture {
        /// Index into the texture table, `-1` when the slot is empty.
        index: i32,
        scale: Vec2,
        offset: Vec2,
    },
    Color(Color),
    Float(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MuMaterial {
    pub name: String,
    pub shader: ShaderModel,
    /// Properties in record order, keyed by shader property name.
    pub properties: Vec<(&'static str, PropertyValue)>,
}

impl MuMaterial {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuTexture {
    pub file_name: String,
    pub texture_type: TextureType,
}

/// Decode a complete mu stream.
pub fn read_model(data: &[u8]) -> Result<MuModel, Report<MuReadError>> {
    MuReader::new(data).read_model().map_err(Report::new)
}

struct MuReader<'a> {
    data: &'a [u8],
    input: &'a [u8],
}

impl<'a> MuReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, input: data }
    }

    fn offset(&self) -> usize {
        offset_in(self.data, self.input)
    }

    /// Run a winnow primitive, mapping failure to an end-of-data error at the
    /// position the primitive started from.
    fn parse<T>(&mut self, parser: fn(&mut &'a [u8]) -> WResult<T>) -> Result<T, MuReadError> {
        let offset = self.offset();
        parser(&mut self.input)
            .map_err(|_: ErrMode<ContextError>| MuReadError::UnexpectedEof { offset })
    }

    fn array<T>(
        &mut self,
        count: usize,
        item: fn(&mut &[u8]) -> WResult<T>,
    ) -> Result<Vec<T>, MuReadError> {
        let offset = self.offset();
        read_array(&mut self.input, count, item)
            .map_err(|_: ErrMode<ContextError>| MuReadError::UnexpectedEof { offset })
    }

    fn i32(&mut self) -> Result<i32, MuReadError> {
        self.parse(read_i32)
    }

    fn f32(&mut self) -> Result<f32, MuReadError> {
        self.parse(read_f32)
    }

    fn bool(&mut self) -> Result<bool, MuReadError> {
        self.parse(read_bool)
    }

    fn string(&mut self) -> Result<String, MuReadError> {
        self.parse(read_string)
    }

    fn vec3(&mut self) -> Result<[f32; 3], MuReadError> {
        self.parse(read_vec3)
    }

    fn vec4(&mut self) -> Result<[f32; 4], MuReadError> {
        self.parse(read_vec4)
    }

    fn count(&mut self, what: &'static str) -> Result<usize, MuReadError> {
        let offset = self.offset();
        let value = self.i32()?;
        usize::try_from(value).map_err(|_| MuReadError::InvalidValue {
            what,
            value,
            offset,
        })
    }

    fn enum_value<T>(
        &mut self,
        what: &'static str,
        convert: fn(i32) -> Option<T>,
    ) -> Result<T, MuReadError> {
        let offset = self.offset();
        let value = self.i32()?;
        convert(value).ok_or(MuReadError::InvalidValue {
            what,
            value,
            offset,
        })
    }

    fn peek_tag(&self) -> Option<Recognized<EntryType, i32>> {
        let mut lookahead = self.input;
        read_i32(&mut lookahead).ok().map(EntryType::from_i32)
    }

    fn expect_tag(&mut self, expected: EntryType) -> Result<(), MuReadError> {
        let offset = self.offset();
        let tag = EntryType::from_i32(self.i32()?);
        if tag == Recognized::Known(expected) {
            Ok(())
        } else {
            Err(MuReadError::UnexpectedTag { tag, offset })
        }
    }

    fn read_model(mut self) -> Result<MuModel, MuReadError> {
        let file_type = self.i32()?;
        if file_type != FILE_TYPE {
            return Err(MuReadError::BadFileType(file_type));
        }
        let version = self.i32()?;
        if version != FILE_VERSION {
            warn!(version, "unexpected mu file version");
        }
        let name = self.string()?;

        let root = self.read_node(0)?;

        let mut materials = Vec::new();
        let mut textures = Vec::new();
        while !self.input.is_empty() {
            let offset = self.offset();
            match EntryType::from_i32(self.i32()?) {
                Recognized::Known(EntryType::Materials) => {
                    let count = self.count("material count")?;
                    for _ in 0..count {
                        materials.push(self.read_material()?);
                    }
                }
                Recognized::Known(EntryType::Textures) => {
                    let count = self.count("texture count")?;
                    for _ in 0..count {
                        let file_name = self.string()?;
                        let texture_type = self.enum_value("texture type", TextureType::from_i32)?;
                        textures.push(MuTexture {
                            file_name,
                            texture_type,
                        });
                    }
                }
                tag => return Err(MuReadError::UnexpectedTag { tag, offset }),
            }
        }

        Ok(MuModel {
            name,
            version,
            root,
            materials,
            textures,
        })
    }

    fn read_node(&mut self, depth: usize) -> Result<MuNode, MuReadError> {
        if depth > MAX_NODE_DEPTH {
            return Err(MuReadError::TooDeep {
                offset: self.offset(),
            });
        }
        let mut node = MuNode {
            name: self.string()?,
            ..Default::default()
        };
        node.transform = Transform {
            position: self.vec3()?,
            rotation: self.vec4()?,
            scale: self.vec3()?,
        };
        // duplicate of scale.x
        self.f32()?;

        while let Some(tag) = self.peek_tag() {
            let offset = self.offset();
            let entry = match tag {
                Recognized::Known(entry) => entry,
                Recognized::Unknown(_) => return Err(MuReadError::UnexpectedTag { tag, offset }),
            };

            if matches!(
                entry,
                EntryType::ChildTransformEnd | EntryType::Materials | EntryType::Textures
            ) {
                break;
            }
            if entry.is_legacy_collider() {
                return Err(MuReadError::LegacyCollider { tag: entry, offset });
            }

            self.i32()?;
            match entry {
                EntryType::ChildTransformStart => {
                    let child = self.read_node(depth + 1)?;
                    self.expect_tag(EntryType::ChildTransformEnd)?;
                    node.children.push(child);
                }
                EntryType::TagAndLayer => {
                    node.tag = self.string()?;
                    node.layer = self.i32()?;
                }
                EntryType::MeshCollider2 => {
                    let is_trigger = self.bool()?;
                    let convex = self.bool()?;
                    let mesh = self.read_mesh()?;
                    node.collider = Some(MuCollider::Mesh {
                        is_trigger,
                        convex,
                        mesh,
                    });
                }
                EntryType::BoxCollider2 => {
                    node.collider = Some(MuCollider::Box(BoxCollider {
                        is_trigger: self.bool()?,
                        size: self.vec3()?,
                        center: self.vec3()?,
                    }));
                }
                EntryType::CapsuleCollider2 => {
                    node.collider = Some(MuCollider::Capsule(CapsuleCollider {
                        is_trigger: self.bool()?,
                        radius: self.f32()?,
                        height: self.f32()?,
                        direction: self.i32()?,
                        center: self.vec3()?,
                    }));
                }
                EntryType::SphereCollider2 => {
                    node.collider = Some(MuCollider::Sphere(SphereCollider {
                        is_trigger: self.bool()?,
                        radius: self.f32()?,
                        center: self.vec3()?,
                    }));
                }
                EntryType::WheelCollider => {
                    node.collider = Some(MuCollider::Wheel(self.read_wheel()?));
                }
                EntryType::MeshFilter => node.mesh = Some(self.read_mesh()?),
                EntryType::MeshRenderer => {
                    node.renderer = Some(MuRenderer::Mesh {
                        cast_shadows: self.bool()?,
                        receive_shadows: self.bool()?,
                        materials: self.read_material_indices()?,
                    });
                }
                EntryType::SkinnedMeshRenderer => {
                    node.renderer = Some(self.read_skinned_renderer()?);
                }
                EntryType::Animation => node.animation = Some(self.read_animation()?),
                EntryType::Light => node.light = Some(self.read_light()?),
                EntryType::Camera => node.camera = Some(self.read_camera()?),
                _ => return Err(MuReadError::UnexpectedTag { tag, offset }),
            }
        }

        Ok(node)
    }

    fn read_friction(&mut self) -> Result<WheelFriction, MuReadError> {
        Ok(WheelFriction {
            extremum_slip: self.f32()?,
            extremum_value: self.f32()?,
            asymptote_slip: self.f32()?,
            asymptote_value: self.f32()?,
            stiffness: self.f32()?,
        })
    }

    fn read_wheel(&mut self) -> Result<WheelCollider, MuReadError> {
        Ok(WheelCollider {
            mass: self.f32()?,
            radius: self.f32()?,
            suspension_distance: self.f32()?,
            center: self.vec3()?,
            spring: self.f32()?,
            damper: self.f32()?,
            target_position: self.f32()?,
            forward_friction: self.read_friction()?,
            sideways_friction: self.read_friction()?,
        })
    }

    fn read_material_indices(&mut self) -> Result<Vec<i32>, MuReadError> {
        let count = self.count("material count")?;
        self.array(count, read_i32)
    }

    fn read_bounds(&mut self) -> Result<Bounds, MuReadError> {
        Ok(Bounds {
            center: self.vec3()?,
            size: self.vec3()?,
        })
    }

    fn read_skinned_renderer(&mut self) -> Result<MuRenderer, MuReadError> {
        let materials = self.read_material_indices()?;
        let local_bounds = self.read_bounds()?;
        let quality = self.enum_value("skin quality", SkinQuality::from_i32)?;
        let update_when_offscreen = self.bool()?;
        let bone_count = self.count("bone count")?;
        let bones = self.array(bone_count, read_string)?;
        let mesh = self.read_mesh()?;
        Ok(MuRenderer::Skinned {
            materials,
            local_bounds,
            quality,
            update_when_offscreen,
            bones,
            mesh,
        })
    }

    fn read_animation(&mut self) -> Result<Animation, MuReadError> {
        let clip_count = self.count("clip count")?;
        let mut clips = Vec::new();
        for _ in 0..clip_count {
            let name = self.string()?;
            let local_bounds = self.read_bounds()?;
            let wrap_mode = self.enum_value("wrap mode", WrapMode::from_i32)?;

            let curve_count = self.count("curve count")?;
            let mut curves = Vec::new();
            for _ in 0..curve_count {
                let path = self.string()?;
                let property = self.string()?;
                let target = self.enum_value("animation target", AnimationTarget::from_i32)?;
                let pre_wrap = self.enum_value("wrap mode", WrapMode::from_i32)?;
                let post_wrap = self.enum_value("wrap mode", WrapMode::from_i32)?;

                let key_count = self.count("key count")?;
                let mut keys = Vec::new();
                for _ in 0..key_count {
                    keys.push(Keyframe {
                        time: self.f32()?,
                        value: self.f32()?,
                        in_tangent: self.f32()?,
                        out_tangent: self.f32()?,
                        tangent_mode: self.i32()?,
                    });
                }

                curves.push(AnimationCurve {
                    path,
                    property,
                    target,
                    pre_wrap,
                    post_wrap,
                    keys,
                });
            }

            clips.push(AnimationClip {
                name,
                local_bounds,
                wrap_mode,
                curves,
            });
        }

        let default_clip = Some(self.string()?).filter(|name| !name.is_empty());
        let play_automatically = self.bool()?;

        Ok(Animation {
            clips,
            default_clip,
            play_automatically,
        })
    }

    fn read_light(&mut self) -> Result<Light, MuReadError> {
        Ok(Light {
            light_type: self.enum_value("light type", LightType::from_i32)?,
            intensity: self.f32()?,
            range: self.f32()?,
            color: self.vec4()?,
            culling_mask: self.i32()?,
            spot_angle: self.f32()?,
        })
    }

    fn read_camera(&mut self) -> Result<Camera, MuReadError> {
        Ok(Camera {
            clear_flags: self.enum_value("clear flags", ClearFlags::from_i32)?,
            background_color: self.vec4()?,
            culling_mask: self.i32()?,
            orthographic: self.bool()?,
            fov: self.f32()?,
            near: self.f32()?,
            far: self.f32()?,
            depth: self.f32()?,
        })
    }

    fn read_mesh(&mut self) -> Result<Mesh, MuReadError> {
        self.expect_tag(EntryType::MeshStart)?;
        let vertex_count = self.count("vertex count")?;
        let submesh_count = self.count("submesh count")?;

        let mut mesh = Mesh::default();
        loop {
            let offset = self.offset();
            let tag = EntryType::from_i32(self.i32()?);
            match tag {
                Recognized::Known(EntryType::MeshVerts) => {
                    mesh.vertices = self.array(vertex_count, read_vec3)?;
                }
                Recognized::Known(EntryType::MeshUV) => {
                    mesh.uv = self.array(vertex_count, read_vec2)?;
                }
                Recognized::Known(EntryType::MeshUV2) => {
                    mesh.uv2 = self.array(vertex_count, read_vec2)?;
                }
                Recognized::Known(EntryType::MeshNormals) => {
                    mesh.normals = self.array(vertex_count, read_vec3)?;
                }
                Recognized::Known(EntryType::MeshTangents) => {
                    mesh.tangents = self.array(vertex_count, read_vec4)?;
                }
                Recognized::Known(EntryType::MeshBoneWeights) => {
                    mesh.bone_weights = self.array(vertex_count, read_bone_weight)?;
                }
                Recognized::Known(EntryType::MeshBindPoses) => {
                    let count = self.count("bind pose count")?;
                    mesh.bind_poses = self.array(count, read_matrix)?;
                }
                Recognized::Known(EntryType::MeshTriangles) => {
                    let count = self.count("index count")?;
                    mesh.submeshes.push(self.array(count, read_i32)?);
                }
                Recognized::Known(EntryType::MeshEnd) => break,
                tag => return Err(MuReadError::UnexpectedTag { tag, offset }),
            }
        }

        if mesh.submeshes.len() != submesh_count {
            warn!(
                declared = submesh_count,
                found = mesh.submeshes.len(),
                "submesh count mismatch"
            );
        }
        Ok(mesh)
    }

    fn read_material(&mut self) -> Result<MuMaterial, MuReadError> {
        let name = self.string()?;
        let offset = self.offset();
        let value = self.i32()?;
        let shader = ShaderModel::from_i32(value).ok_or_else(|value| MuReadError::InvalidValue {
            what: "shader model",
            value,
            offset,
        })?;

        let mut properties = Vec::with_capacity(shader.layout().len());
        for property in shader.layout() {
            let value = match property {
                Property::Texture(..) => PropertyValue::Texture {
                    index: self.i32()?,
                    scale: self.parse(read_vec2)?,
                    offset: self.parse(read_vec2)?,
                },
                Property::Color(_) => PropertyValue::Color(self.vec4()?),
                Property::Float(_) => PropertyValue::Float(self.f32()?),
            };
            properties.push((property.name(), value));
        }

        Ok(MuMaterial {
            name,
            shader,
            properties,
        })
    }
}

fn read_bone_weight(input: &mut &[u8]) -> WResult<BoneWeight> {
    let mut weight = BoneWeight::default();
    for slot in 0..4 {
        weight.indices[slot] = read_i32(input)?;
        weight.weights[slot] = read_f32(input)?;
    }
    Ok(weight)
}

fn read_matrix(input: &mut &[u8]) -> WResult<Matrix4x4> {
    Ok([
        read_vec4(input)?,
        read_vec4(input)?,
        read_vec4(input)?,
        read_vec4(input)?,
    ])
}
