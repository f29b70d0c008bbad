pub mod material;
pub mod mesh;
pub mod scene;
/// JSON scene descriptions that build a [`scene::SceneNode`] tree from files on disk
#[cfg(feature = "json")]
pub mod scene_file;
pub mod texture;
