//! The fixed set of shader models a material record can describe, and the
//! property sequence each one serializes.

use crate::models::texture::TextureType;
use crate::recognized::Recognized;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderModel {
    Custom = 0,
    Diffuse = 1,
    Specular = 2,
    Bumped = 3,
    BumpedSpecular = 4,
    Emissive = 5,
    EmissiveSpecular = 6,
    EmissiveBumpedSpecular = 7,
    AlphaCutout = 8,
    AlphaCutoutBumped = 9,
    Alpha = 10,
    AlphaSpecular = 11,
    AlphaUnlit = 12,
    Unlit = 13,
}

/// One serialized material property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Texture index, scale and offset.
    Texture(&'static str, TextureType),
    /// RGBA color.
    Color(&'static str),
    Float(&'static str),
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::Texture(name, _) | Property::Color(name) | Property::Float(name) => name,
        }
    }
}

const MAIN_TEX: Property = Property::Texture("_MainTex", TextureType::Texture);
const BUMP_MAP: Property = Property::Texture("_BumpMap", TextureType::NormalMap);
const SPEC_COLOR: Property = Property::Color("_SpecColor");
const SHININESS: Property = Property::Float("_Shininess");
const EMISSIVE: Property = Property::Texture("_Emissive", TextureType::Texture);
const EMISSIVE_COLOR: Property = Property::Color("_EmissiveColor");
const CUTOFF: Property = Property::Float("_Cutoff");
const GLOSS: Property = Property::Float("_Gloss");
const COLOR: Property = Property::Color("_Color");

impl ShaderModel {
    pub const ALL: [ShaderModel; 14] = [
        ShaderModel::Custom,
        ShaderModel::Diffuse,
        ShaderModel::Specular,
        ShaderModel::Bumped,
        ShaderModel::BumpedSpecular,
        ShaderModel::Emissive,
        ShaderModel::EmissiveSpecular,
        ShaderModel::EmissiveBumpedSpecular,
        ShaderModel::AlphaCutout,
        ShaderModel::AlphaCutoutBumped,
        ShaderModel::Alpha,
        ShaderModel::AlphaSpecular,
        ShaderModel::AlphaUnlit,
        ShaderModel::Unlit,
    ];

    pub fn from_i32(value: i32) -> Recognized<Self, i32> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .map_or(Recognized::Unknown(value), Recognized::Known)
    }

    /// Match a shader by its asset name, e.g. `KSP/Bumped Specular`.
    pub fn from_shader_name(name: &str) -> Recognized<Self> {
        let model = match name {
            "KSP/Diffuse" => ShaderModel::Diffuse,
            "KSP/Specular" => ShaderModel::Specular,
            "KSP/Bumped" => ShaderModel::Bumped,
            "KSP/Bumped Specular" => ShaderModel::BumpedSpecular,
            "KSP/Emissive/Diffuse" => ShaderModel::Emissive,
            "KSP/Emissive/Specular" => ShaderModel::EmissiveSpecular,
            "KSP/Emissive/Bumped Specular" => ShaderModel::EmissiveBumpedSpecular,
            "KSP/Alpha/Cutoff" => ShaderModel::AlphaCutout,
            "KSP/Alpha/Cutoff Bumped" => ShaderModel::AlphaCutoutBumped,
            "KSP/Alpha/Translucent" => ShaderModel::Alpha,
            "KSP/Alpha/Translucent Specular" => ShaderModel::AlphaSpecular,
            "KSP/Alpha/Unlit Transparent" => ShaderModel::AlphaUnlit,
            "KSP/Unlit" => ShaderModel::Unlit,
            other => return Recognized::Unknown(other.to_string()),
        };
        Recognized::Known(model)
    }

    /// The model a material is written as. Unrecognized shaders are written
    /// as diffuse.
    pub fn for_shader_name(name: &str) -> Self {
        Self::from_shader_name(name).unwrap_or(ShaderModel::Diffuse)
    }

    /// Properties in the order the material record stores them.
    pub fn layout(self) -> &'static [Property] {
        match self {
            ShaderModel::Custom => &[],
            ShaderModel::Diffuse => &[MAIN_TEX],
            ShaderModel::Specular => &[MAIN_TEX, SPEC_COLOR, SHININESS],
            ShaderModel::Bumped => &[MAIN_TEX, BUMP_MAP],
            ShaderModel::BumpedSpecular => &[MAIN_TEX, BUMP_MAP, SPEC_COLOR, SHININESS],
            ShaderModel::Emissive => &[MAIN_TEX, EMISSIVE, EMISSIVE_COLOR],
            ShaderModel::EmissiveSpecular => {
                &[MAIN_TEX, SPEC_COLOR, SHININESS, EMISSIVE, EMISSIVE_COLOR]
            }
            ShaderModel::EmissiveBumpedSpecular => &[
                MAIN_TEX,
                BUMP_MAP,
                SPEC_COLOR,
                SHININESS,
                EMISSIVE,
                EMISSIVE_COLOR,
            ],
            ShaderModel::AlphaCutout => &[MAIN_TEX, CUTOFF],
            ShaderModel::AlphaCutoutBumped => &[MAIN_TEX, BUMP_MAP, CUTOFF],
            ShaderModel::Alpha => &[MAIN_TEX],
            ShaderModel::AlphaSpecular => &[MAIN_TEX, GLOSS, SPEC_COLOR, SHININESS],
            ShaderModel::AlphaUnlit => &[MAIN_TEX, COLOR],
            ShaderModel::Unlit => &[MAIN_TEX, COLOR],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(model: ShaderModel) -> Vec<&'static str> {
        model.layout().iter().map(Property::name).collect()
    }

    #[test]
    fn unknown_shaders_fall_back_to_diffuse() {
        assert!(!ShaderModel::from_shader_name("Legacy Shaders/Diffuse").is_known());
        assert_eq!(
            ShaderModel::for_shader_name("Legacy Shaders/Diffuse"),
            ShaderModel::Diffuse
        );
        assert_eq!(names(ShaderModel::Diffuse), ["_MainTex"]);
    }

    #[test]
    fn emissive_bumped_specular_layout() {
        let model = ShaderModel::for_shader_name("KSP/Emissive/Bumped Specular");
        assert_eq!(model as i32, 7);
        assert_eq!(
            names(model),
            [
                "_MainTex",
                "_BumpMap",
                "_SpecColor",
                "_Shininess",
                "_Emissive",
                "_EmissiveColor"
            ]
        );
    }

    #[test]
    fn bump_maps_are_the_only_normal_map_slots() {
        for model in ShaderModel::ALL {
            for property in model.layout() {
                if let Property::Texture(name, kind) = property {
                    assert_eq!(*name == "_BumpMap", *kind == TextureType::NormalMap);
                }
            }
        }
    }

    #[test]
    fn model_values_round_trip() {
        for model in ShaderModel::ALL {
            assert_eq!(ShaderModel::from_i32(model as i32), Recognized::Known(model));
        }
        assert!(!ShaderModel::from_i32(14).is_known());
    }

    #[test]
    fn translucent_specular_reads_gloss_first() {
        let model = ShaderModel::for_shader_name("KSP/Alpha/Translucent Specular");
        assert_eq!(names(model), ["_MainTex", "_Gloss", "_SpecColor", "_Shininess"]);
    }
}
