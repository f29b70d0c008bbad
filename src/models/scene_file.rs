//! JSON scene descriptions.
//!
//! A scene file lists textures, materials and meshes by id and describes the
//! node tree with references to those ids. Every id is resolved into a single
//! shared pointer, so two nodes naming the same material share one entry in
//! the exported material table.
//!
//! ```json
//! {
//!   "textures": { "hull": { "path": "textures/hull.png" } },
//!   "materials": {
//!     "hull": { "shader": "KSP/Diffuse", "textures": { "_MainTex": { "texture": "hull" } } }
//!   },
//!   "meshes": { "quad": { "vertices": [[0,0,0],[1,0,0],[1,1,0]], "submeshes": [[0,1,2]] } },
//!   "root": {
//!     "name": "part",
//!     "mesh": "quad",
//!     "renderer": { "type": "mesh", "materials": ["hull"] }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rootcause::Report;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::Rc;
use crate::models::material::{Material, MaterialTexture};
use crate::models::mesh::{Mesh, Vec2};
use crate::models::scene::{
    Animation, Bounds, BoxCollider, Camera, CapsuleCollider, Collider, Color, Light,
    MeshCollider, MeshRenderer, NodeMarker, Renderer, SceneNode, SkinQuality,
    SkinnedMeshRenderer, SphereCollider, Transform, WheelCollider,
};
use crate::models::texture::{PixelFormat, TextureAsset};

#[derive(Debug, Error)]
pub enum SceneFileError {
    #[error("failed to read scene file {0}")]
    Io(String),
    #[error("invalid scene description: {0}")]
    Json(String),
    #[error("unknown {kind} id `{id}`")]
    UnknownId { kind: &'static str, id: String },
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    #[serde(default)]
    textures: HashMap<String, TextureDef>,
    #[serde(default)]
    materials: HashMap<String, MaterialDef>,
    #[serde(default)]
    meshes: HashMap<String, Mesh>,
    root: NodeDef,
}

#[derive(Debug, Deserialize)]
struct TextureDef {
    path: PathBuf,
    /// Defaults to the file stem.
    name: Option<String>,
    /// Marks a greyscale height map to be converted into a normal map.
    normal_map_strength: Option<f32>,
    format: Option<PixelFormat>,
}

#[derive(Debug, Deserialize)]
struct TextureSlotDef {
    texture: Option<String>,
    scale: Option<Vec2>,
    offset: Option<Vec2>,
}

#[derive(Debug, Deserialize)]
struct MaterialDef {
    /// Defaults to the material id.
    name: Option<String>,
    shader: String,
    #[serde(default)]
    textures: HashMap<String, TextureSlotDef>,
    #[serde(default)]
    colors: HashMap<String, Color>,
    #[serde(default)]
    floats: HashMap<String, f32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ColliderDef {
    Mesh {
        #[serde(default)]
        is_trigger: bool,
        #[serde(default)]
        convex: bool,
        mesh: String,
    },
    Box(BoxCollider),
    Capsule(CapsuleCollider),
    Sphere(SphereCollider),
    Wheel(WheelCollider),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RendererDef {
    Mesh {
        #[serde(default = "default_true")]
        cast_shadows: bool,
        #[serde(default = "default_true")]
        receive_shadows: bool,
        #[serde(default)]
        materials: Vec<String>,
    },
    Skinned {
        #[serde(default)]
        materials: Vec<String>,
        #[serde(default)]
        local_bounds: Bounds,
        #[serde(default)]
        quality: SkinQuality,
        #[serde(default)]
        update_when_offscreen: bool,
        #[serde(default)]
        bones: Vec<String>,
        mesh: String,
    },
}

#[derive(Debug, Deserialize)]
struct NodeDef {
    name: String,
    #[serde(default)]
    transform: Transform,
    tag: Option<String>,
    #[serde(default)]
    layer: i32,
    mesh: Option<String>,
    collider: Option<ColliderDef>,
    renderer: Option<RendererDef>,
    animation: Option<Animation>,
    light: Option<Light>,
    camera: Option<Camera>,
    marker: Option<NodeMarker>,
    #[serde(default)]
    children: Vec<NodeDef>,
}

/// Load a scene file. Relative texture paths resolve against the directory
/// the file lives in.
pub fn load_scene(path: &Path) -> Result<SceneNode, Report<SceneFileError>> {
    let json = fs::read_to_string(path).map_err(|e| {
        Report::new(SceneFileError::Io(format!("{}: {e}", path.display())))
    })?;
    let base_dir = path.parent().unwrap_or(Path::new(""));
    parse_scene(&json, base_dir)
}

/// Build a scene from a JSON description, resolving relative texture paths
/// against `base_dir`.
pub fn parse_scene(json: &str, base_dir: &Path) -> Result<SceneNode, Report<SceneFileError>> {
    let file: SceneFile = serde_json::from_str(json)
        .map_err(|e| Report::new(SceneFileError::Json(e.to_string())))?;
    debug!(
        textures = file.textures.len(),
        materials = file.materials.len(),
        meshes = file.meshes.len(),
        "parsed scene file"
    );

    let textures = file
        .textures
        .into_iter()
        .map(|(id, def)| {
            let path = if def.path.is_absolute() {
                def.path
            } else {
                base_dir.join(def.path)
            };
            let mut asset = match def.name {
                Some(name) => TextureAsset::new(name, path),
                None => TextureAsset::from_path(path),
            };
            asset.convert_to_normal_map = def.normal_map_strength;
            asset.format = def.format;
            (id, Rc::new(asset))
        })
        .collect();

    let mut resolver = Resolver {
        textures,
        materials: HashMap::new(),
        meshes: file
            .meshes
            .into_iter()
            .map(|(id, mesh)| (id, Rc::new(mesh)))
            .collect(),
    };

    for (id, def) in file.materials {
        let material = resolver.material(&id, def)?;
        resolver.materials.insert(id, Rc::new(material));
    }

    resolver.node(file.root)
}

struct Resolver {
    textures: HashMap<String, Rc<TextureAsset>>,
    materials: HashMap<String, Rc<Material>>,
    meshes: HashMap<String, Rc<Mesh>>,
}

fn lookup<T>(
    table: &HashMap<String, Rc<T>>,
    kind: &'static str,
    id: &str,
) -> Result<Rc<T>, Report<SceneFileError>> {
    table.get(id).cloned().ok_or_else(|| {
        Report::new(SceneFileError::UnknownId {
            kind,
            id: id.to_string(),
        })
    })
}

impl Resolver {
    fn material(&self, id: &str, def: MaterialDef) -> Result<Material, Report<SceneFileError>> {
        let mut material = Material::new(def.name.unwrap_or_else(|| id.to_string()), def.shader);
        for (property, slot) in def.textures {
            let texture = slot
                .texture
                .map(|texture_id| lookup(&self.textures, "texture", &texture_id))
                .transpose()?;
            let defaults = MaterialTexture::default();
            material.textures.insert(
                property,
                MaterialTexture {
                    texture,
                    scale: slot.scale.unwrap_or(defaults.scale),
                    offset: slot.offset.unwrap_or(defaults.offset),
                },
            );
        }
        material.colors = def.colors;
        material.floats = def.floats;
        Ok(material)
    }

    fn materials(&self, ids: &[String]) -> Result<Vec<Rc<Material>>, Report<SceneFileError>> {
        ids.iter()
            .map(|id| lookup(&self.materials, "material", id))
            .collect()
    }

    fn node(&self, def: NodeDef) -> Result<SceneNode, Report<SceneFileError>> {
        let mut node = SceneNode::new(def.name);
        node.transform = def.transform;
        if let Some(tag) = def.tag {
            node.tag = tag;
        }
        node.layer = def.layer;
        node.mesh = def
            .mesh
            .map(|id| lookup(&self.meshes, "mesh", &id))
            .transpose()?;

        node.collider = match def.collider {
            None => None,
            Some(ColliderDef::Mesh {
                is_trigger,
                convex,
                mesh,
            }) => Some(Collider::Mesh(MeshCollider {
                is_trigger,
                convex,
                mesh: lookup(&self.meshes, "mesh", &mesh)?,
            })),
            Some(ColliderDef::Box(c)) => Some(Collider::Box(c)),
            Some(ColliderDef::Capsule(c)) => Some(Collider::Capsule(c)),
            Some(ColliderDef::Sphere(c)) => Some(Collider::Sphere(c)),
            Some(ColliderDef::Wheel(c)) => Some(Collider::Wheel(c)),
        };

        node.renderer = match def.renderer {
            None => None,
            Some(RendererDef::Mesh {
                cast_shadows,
                receive_shadows,
                materials,
            }) => Some(Renderer::Mesh(MeshRenderer {
                cast_shadows,
                receive_shadows,
                materials: self.materials(&materials)?,
            })),
            Some(RendererDef::Skinned {
                materials,
                local_bounds,
                quality,
                update_when_offscreen,
                bones,
                mesh,
            }) => Some(Renderer::Skinned(SkinnedMeshRenderer {
                materials: self.materials(&materials)?,
                local_bounds,
                quality,
                update_when_offscreen,
                bones,
                mesh: lookup(&self.meshes, "mesh", &mesh)?,
            })),
        };

        node.animation = def.animation;
        node.light = def.light;
        node.camera = def.camera;
        node.marker = def.marker;
        node.children = def
            .children
            .into_iter()
            .map(|child| self.node(child))
            .collect::<Result<_, _>>()?;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "textures": {
            "hull": { "path": "textures/hull.png" },
            "bumps": { "path": "/abs/bumps.tga", "name": "hull_height", "normal_map_strength": 0.5 }
        },
        "materials": {
            "hull": {
                "shader": "KSP/Bumped",
                "textures": {
                    "_MainTex": { "texture": "hull", "scale": [2, 2] },
                    "_BumpMap": { "texture": "bumps" }
                }
            }
        },
        "meshes": {
            "tri": { "vertices": [[0,0,0],[1,0,0],[0,1,0]], "submeshes": [[0,1,2]] }
        },
        "root": {
            "name": "part",
            "mesh": "tri",
            "renderer": { "type": "mesh", "materials": ["hull"] },
            "children": [
                {
                    "name": "door",
                    "layer": 2,
                    "transform": { "position": [0, 1, 0] },
                    "mesh": "tri",
                    "collider": { "type": "mesh", "convex": true, "mesh": "tri" },
                    "renderer": { "type": "mesh", "cast_shadows": false, "materials": ["hull", "hull"] }
                },
                {
                    "name": "prop_proxy",
                    "marker": "PropCollider",
                    "collider": { "type": "box", "size": [1, 1, 1] }
                }
            ]
        }
    }"#;

    #[test]
    fn ids_resolve_to_shared_pointers() {
        let root = parse_scene(SCENE, Path::new("/scenes")).unwrap();

        let root_materials = root.renderer.as_ref().unwrap().materials();
        let door = &root.children[0];
        let door_materials = door.renderer.as_ref().unwrap().materials();
        assert!(Rc::ptr_eq(&root_materials[0], &door_materials[0]));
        assert!(Rc::ptr_eq(&door_materials[0], &door_materials[1]));
        assert!(Rc::ptr_eq(
            root.mesh.as_ref().unwrap(),
            door.mesh.as_ref().unwrap()
        ));

        let material = &root_materials[0];
        assert_eq!(material.name, "hull");
        let main = material.texture("_MainTex");
        assert_eq!(main.scale, [2.0, 2.0]);
        assert_eq!(main.offset, [0.0, 0.0]);
        let main = main.texture.unwrap();
        assert_eq!(main.path, Path::new("/scenes/textures/hull.png"));
        assert_eq!(main.name, "hull");

        let bump = material.texture("_BumpMap").texture.unwrap();
        assert_eq!(bump.name, "hull_height");
        assert_eq!(bump.path, Path::new("/abs/bumps.tga"));
        assert_eq!(bump.convert_to_normal_map, Some(0.5));
    }

    #[test]
    fn node_fields_and_defaults() {
        let root = parse_scene(SCENE, Path::new("")).unwrap();
        assert_eq!(root.tag, "Untagged");
        assert_eq!(root.transform, Transform::default());

        let door = &root.children[0];
        assert_eq!(door.layer, 2);
        assert_eq!(door.transform.position, [0.0, 1.0, 0.0]);
        assert_eq!(door.transform.scale, [1.0, 1.0, 1.0]);
        assert!(matches!(&door.collider, Some(Collider::Mesh(c)) if c.convex && !c.is_trigger));
        assert!(matches!(
            &door.renderer,
            Some(Renderer::Mesh(r)) if !r.cast_shadows && r.receive_shadows
        ));

        let proxy = &root.children[1];
        assert_eq!(proxy.marker, Some(NodeMarker::PropCollider));
        assert_eq!(root.exported_children().count(), 1);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let json = r#"{ "root": { "name": "n", "mesh": "missing" } }"#;
        assert!(parse_scene(json, Path::new("")).is_err());

        let json = r#"{
            "materials": { "m": { "shader": "KSP/Diffuse", "textures": { "_MainTex": { "texture": "nope" } } } },
            "root": { "name": "n" }
        }"#;
        assert!(parse_scene(json, Path::new("")).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_scene("{ \"root\": ", Path::new("")).is_err());
        assert!(load_scene(Path::new("/definitely/not/a/scene.json")).is_err());
    }
}
