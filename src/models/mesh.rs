//! Mesh geometry as handed to the mu writer.

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Row-major 4x4 matrix, indexed `m[row][col]`.
pub type Matrix4x4 = [[f32; 4]; 4];

/// Four bone influences for one vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneWeight {
    pub indices: [i32; 4],
    pub weights: [f32; 4],
}

/// Vertex data plus one triangle index list per submesh.
///
/// Per-vertex arrays other than `vertices` are optional. An array whose
/// length differs from the vertex count is treated as absent when written.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub uv: Vec<Vec2>,
    pub uv2: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub bone_weights: Vec<BoneWeight>,
    pub bind_poses: Vec<Matrix4x4>,
    pub submeshes: Vec<Vec<i32>>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Whether a per-vertex array of `len` entries lines up with the vertices.
    pub fn matches_vertices(&self, len: usize) -> bool {
        len == self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.len() / 3).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_triangles_across_submeshes() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]; 4],
            submeshes: vec![vec![0, 1, 2], vec![0, 2, 3, 1, 2, 3]],
            ..Default::default()
        };
        assert_eq!(mesh.triangle_count(), 3);
        assert!(mesh.matches_vertices(4));
        assert!(!mesh.matches_vertices(3));
    }
}
