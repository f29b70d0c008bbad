use std::collections::HashMap;

use crate::Rc;
use crate::models::mesh::Vec2;
use crate::models::scene::Color;
use crate::models::texture::TextureAsset;

/// A texture bound to a material property, with its UV transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTexture {
    pub texture: Option<Rc<TextureAsset>>,
    pub scale: Vec2,
    pub offset: Vec2,
}

impl Default for MaterialTexture {
    fn default() -> Self {
        Self {
            texture: None,
            scale: [1.0, 1.0],
            offset: [0.0, 0.0],
        }
    }
}

impl MaterialTexture {
    pub fn new(texture: Rc<TextureAsset>) -> Self {
        Self {
            texture: Some(texture),
            ..Default::default()
        }
    }
}

/// Shader name plus its property values, keyed by shader property name
/// (`_MainTex`, `_SpecColor`, ...).
///
/// Materials are shared between renderers through [`Rc`]; the exporter
/// deduplicates them by pointer identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader: String,
    pub textures: HashMap<String, MaterialTexture>,
    pub colors: HashMap<String, Color>,
    pub floats: HashMap<String, f32>,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader: shader.into(),
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, property: &str, texture: MaterialTexture) -> Self {
        self.textures.insert(property.to_string(), texture);
        self
    }

    pub fn with_color(mut self, property: &str, color: Color) -> Self {
        self.colors.insert(property.to_string(), color);
        self
    }

    pub fn with_float(mut self, property: &str, value: f32) -> Self {
        self.floats.insert(property.to_string(), value);
        self
    }

    /// The texture slot for `property`; unset slots read as an empty slot with
    /// unit scale.
    pub fn texture(&self, property: &str) -> MaterialTexture {
        self.textures.get(property).cloned().unwrap_or_default()
    }

    pub fn color(&self, property: &str) -> Color {
        self.colors.get(property).copied().unwrap_or([0.0; 4])
    }

    pub fn float(&self, property: &str) -> f32 {
        self.floats.get(property).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_properties_read_as_defaults() {
        let material = Material::new("hull", "KSP/Specular");
        let slot = material.texture("_MainTex");
        assert!(slot.texture.is_none());
        assert_eq!(slot.scale, [1.0, 1.0]);
        assert_eq!(slot.offset, [0.0, 0.0]);
        assert_eq!(material.color("_SpecColor"), [0.0; 4]);
        assert_eq!(material.float("_Shininess"), 0.0);
    }

    #[test]
    fn set_properties_are_returned() {
        let material = Material::new("hull", "KSP/Specular")
            .with_color("_SpecColor", [1.0, 0.5, 0.25, 1.0])
            .with_float("_Shininess", 0.078);
        assert_eq!(material.color("_SpecColor"), [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(material.float("_Shininess"), 0.078);
    }
}
