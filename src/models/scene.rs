//! The engine-independent scene graph the mu writer walks.

use variantly::Variantly;

use crate::Rc;
use crate::models::material::Material;
use crate::models::mesh::{Mesh, Vec3, Vec4};

pub type Color = [f32; 4];

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Transform {
    pub position: Vec3,
    /// Quaternion, xyzw.
    pub rotation: Vec4,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

/// Axis-aligned bounds given as center and full size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Bounds {
    pub center: Vec3,
    pub size: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshCollider {
    pub is_trigger: bool,
    pub convex: bool,
    pub mesh: Rc<Mesh>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BoxCollider {
    pub is_trigger: bool,
    pub size: Vec3,
    pub center: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CapsuleCollider {
    pub is_trigger: bool,
    pub radius: f32,
    pub height: f32,
    /// Capsule axis: 0 = X, 1 = Y, 2 = Z.
    pub direction: i32,
    pub center: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SphereCollider {
    pub is_trigger: bool,
    pub radius: f32,
    pub center: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WheelFriction {
    pub extremum_slip: f32,
    pub extremum_value: f32,
    pub asymptote_slip: f32,
    pub asymptote_value: f32,
    pub stiffness: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WheelCollider {
    pub mass: f32,
    pub radius: f32,
    pub suspension_distance: f32,
    pub center: Vec3,
    pub spring: f32,
    pub damper: f32,
    pub target_position: f32,
    pub forward_friction: WheelFriction,
    pub sideways_friction: WheelFriction,
}

/// At most one collider is attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Collider {
    Mesh(MeshCollider),
    Box(BoxCollider),
    Capsule(CapsuleCollider),
    Sphere(SphereCollider),
    Wheel(WheelCollider),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshRenderer {
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub materials: Vec<Rc<Material>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SkinQuality {
    #[default]
    Auto = 0,
    Bone1 = 1,
    Bone2 = 2,
    Bone4 = 4,
}

impl SkinQuality {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(SkinQuality::Auto),
            1 => Some(SkinQuality::Bone1),
            2 => Some(SkinQuality::Bone2),
            4 => Some(SkinQuality::Bone4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedMeshRenderer {
    pub materials: Vec<Rc<Material>>,
    pub local_bounds: Bounds,
    pub quality: SkinQuality,
    pub update_when_offscreen: bool,
    /// Names of the bone transforms, in bone index order.
    pub bones: Vec<String>,
    pub mesh: Rc<Mesh>,
}

#[derive(Debug, Clone, PartialEq, Variantly)]
pub enum Renderer {
    Mesh(MeshRenderer),
    Skinned(SkinnedMeshRenderer),
}

impl Renderer {
    pub fn materials(&self) -> &[Rc<Material>] {
        match self {
            Renderer::Mesh(r) => &r.materials,
            Renderer::Skinned(r) => &r.materials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    #[default]
    Default = 0,
    Once = 1,
    Loop = 2,
    PingPong = 4,
    ClampForever = 8,
}

impl WrapMode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(WrapMode::Default),
            1 => Some(WrapMode::Once),
            2 => Some(WrapMode::Loop),
            4 => Some(WrapMode::PingPong),
            8 => Some(WrapMode::ClampForever),
            _ => None,
        }
    }
}

/// Component type an animation curve drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnimationTarget {
    #[default]
    Transform = 0,
    Material = 1,
    Light = 2,
    AudioSource = 3,
}

impl AnimationTarget {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(AnimationTarget::Transform),
            1 => Some(AnimationTarget::Material),
            2 => Some(AnimationTarget::Light),
            3 => Some(AnimationTarget::AudioSource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
    pub tangent_mode: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnimationCurve {
    /// Path of the animated transform relative to the animation's node.
    pub path: String,
    pub property: String,
    pub target: AnimationTarget,
    pub pre_wrap: WrapMode,
    pub post_wrap: WrapMode,
    pub keys: Vec<Keyframe>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnimationClip {
    pub name: String,
    pub local_bounds: Bounds,
    pub wrap_mode: WrapMode,
    pub curves: Vec<AnimationCurve>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Animation {
    pub clips: Vec<AnimationClip>,
    /// Name of the clip played by default.
    pub default_clip: Option<String>,
    pub play_automatically: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightType {
    Spot = 0,
    Directional = 1,
    #[default]
    Point = 2,
    Area = 3,
}

impl LightType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(LightType::Spot),
            1 => Some(LightType::Directional),
            2 => Some(LightType::Point),
            3 => Some(LightType::Area),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Light {
    pub light_type: LightType,
    pub intensity: f32,
    pub range: f32,
    pub color: Color,
    pub culling_mask: i32,
    pub spot_angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClearFlags {
    #[default]
    Skybox = 1,
    SolidColor = 2,
    Depth = 3,
    Nothing = 4,
}

impl ClearFlags {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(ClearFlags::Skybox),
            2 => Some(ClearFlags::SolidColor),
            3 => Some(ClearFlags::Depth),
            4 => Some(ClearFlags::Nothing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Camera {
    pub clear_flags: ClearFlags,
    pub background_color: Color,
    pub culling_mask: i32,
    pub orthographic: bool,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub depth: f32,
}

/// Marks a node that belongs to prop tooling rather than to the model. Marked
/// nodes and their subtrees are never exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeMarker {
    PropCollider,
    PropObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub tag: String,
    pub layer: i32,
    pub mesh: Option<Rc<Mesh>>,
    pub collider: Option<Collider>,
    pub renderer: Option<Renderer>,
    pub animation: Option<Animation>,
    pub light: Option<Light>,
    pub camera: Option<Camera>,
    pub marker: Option<NodeMarker>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            tag: "Untagged".to_string(),
            layer: 0,
            mesh: None,
            collider: None,
            renderer: None,
            animation: None,
            light: None,
            camera: None,
            marker: None,
            children: Vec::new(),
        }
    }

    /// Children that take part in export.
    pub fn exported_children(&self) -> impl Iterator<Item = &SceneNode> {
        self.children.iter().filter(|child| child.marker.is_none())
    }

    /// Depth-first pre-order walk over the exported part of the tree.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode)) {
        visit(self);
        for child in self.exported_children() {
            child.walk(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_children_are_not_walked() {
        let mut root = SceneNode::new("root");
        let mut prop = SceneNode::new("prop");
        prop.marker = Some(NodeMarker::PropObject);
        prop.children.push(SceneNode::new("inside_prop"));
        root.children.push(prop);
        root.children.push(SceneNode::new("hull"));

        let mut names = Vec::new();
        root.walk(&mut |node| names.push(node.name.as_str()));
        assert_eq!(names, ["root", "hull"]);
    }

    #[test]
    fn renderer_exposes_materials_for_both_kinds() {
        let material = Rc::new(Material::new("hull", "KSP/Diffuse"));
        let renderer = Renderer::Mesh(MeshRenderer {
            cast_shadows: true,
            receive_shadows: true,
            materials: vec![material.clone(), material],
        });
        assert!(renderer.is_mesh());
        assert_eq!(renderer.materials().len(), 2);
    }
}
