/// Decoder for mu streams
pub mod reader;
/// Shader models and their material record layouts
pub mod shader;
/// Scene graph serializer
pub mod writer;

use crate::recognized::Recognized;

/// Magic number at the start of every mu file.
pub const FILE_TYPE: i32 = 76543;
pub const FILE_VERSION: i32 = 2;

/// Tags that introduce each record in a mu stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    ChildTransformStart = 0,
    ChildTransformEnd = 1,
    Animation = 2,
    /// Superseded by [`EntryType::MeshCollider2`]; never written.
    MeshCollider = 3,
    /// Superseded by [`EntryType::SphereCollider2`]; never written.
    SphereCollider = 4,
    /// Superseded by [`EntryType::CapsuleCollider2`]; never written.
    CapsuleCollider = 5,
    /// Superseded by [`EntryType::BoxCollider2`]; never written.
    BoxCollider = 6,
    MeshFilter = 7,
    MeshRenderer = 8,
    SkinnedMeshRenderer = 9,
    Materials = 10,
    Material = 11,
    Textures = 12,
    MeshStart = 13,
    MeshVerts = 14,
    MeshUV = 15,
    MeshUV2 = 16,
    MeshNormals = 17,
    MeshTangents = 18,
    MeshTriangles = 19,
    MeshBoneWeights = 20,
    MeshBindPoses = 21,
    MeshEnd = 22,
    Light = 23,
    TagAndLayer = 24,
    MeshCollider2 = 25,
    SphereCollider2 = 26,
    CapsuleCollider2 = 27,
    BoxCollider2 = 28,
    WheelCollider = 29,
    Camera = 30,
}

impl EntryType {
    const ALL: [EntryType; 31] = [
        EntryType::ChildTransformStart,
        EntryType::ChildTransformEnd,
        EntryType::Animation,
        EntryType::MeshCollider,
        EntryType::SphereCollider,
        EntryType::CapsuleCollider,
        EntryType::BoxCollider,
        EntryType::MeshFilter,
        EntryType::MeshRenderer,
        EntryType::SkinnedMeshRenderer,
        EntryType::Materials,
        EntryType::Material,
        EntryType::Textures,
        EntryType::MeshStart,
        EntryType::MeshVerts,
        EntryType::MeshUV,
        EntryType::MeshUV2,
        EntryType::MeshNormals,
        EntryType::MeshTangents,
        EntryType::MeshTriangles,
        EntryType::MeshBoneWeights,
        EntryType::MeshBindPoses,
        EntryType::MeshEnd,
        EntryType::Light,
        EntryType::TagAndLayer,
        EntryType::MeshCollider2,
        EntryType::SphereCollider2,
        EntryType::CapsuleCollider2,
        EntryType::BoxCollider2,
        EntryType::WheelCollider,
        EntryType::Camera,
    ];

    pub fn from_i32(value: i32) -> Recognized<Self, i32> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .map_or(Recognized::Unknown(value), Recognized::Known)
    }

    pub fn is_legacy_collider(self) -> bool {
        matches!(
            self,
            EntryType::MeshCollider
                | EntryType::SphereCollider
                | EntryType::CapsuleCollider
                | EntryType::BoxCollider
        )
    }
}
