//! Player skins decoded from login client data.

use crate::network::{ClientData, SkinAnimation};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Which part of the model an animation applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnimationKind {
    #[default]
    Unset,
    Head,
    Body32x32,
    Body128x128,
}

impl AnimationKind {
    /// Maps the protocol tag. Unknown tags become [`AnimationKind::Unset`].
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            1 => Self::Head,
            2 => Self::Body32x32,
            3 => Self::Body128x128,
            _ => Self::Unset,
        }
    }
}

/// One animated skin layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub frame_count: u32,
    pub kind: AnimationKind,
}

/// Geometry names selected by the skin's resource patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub default: String,
    pub animated_face: String,
}

#[derive(Deserialize)]
struct ResourcePatch {
    #[serde(default)]
    geometry: ModelConfig,
}

impl ModelConfig {
    /// Decodes a resource patch such as
    /// `{"geometry":{"default":"geometry.humanoid.custom"}}`.
    pub fn decode(patch: &[u8]) -> Result<Self, serde_json::Error> {
        let patch: ResourcePatch = serde_json::from_slice(patch)?;
        Ok(patch.geometry)
    }
}

/// A player skin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub model: Vec<u8>,
    pub model_config: ModelConfig,
    pub animations: Vec<Animation>,
}

impl Skin {
    /// Builds a skin from login client data.
    ///
    /// The transport has already validated sizes and encodings, so each
    /// field is decoded on its own and anything undecodable is left empty.
    pub fn from_client_data(data: &ClientData) -> Self {
        let model_config = STANDARD
            .decode(&data.skin_resource_patch)
            .ok()
            .and_then(|patch| ModelConfig::decode(&patch).ok())
            .unwrap_or_default();

        Self {
            width: data.skin_image_width,
            height: data.skin_image_height,
            pixels: STANDARD.decode(&data.skin_data).unwrap_or_default(),
            model: STANDARD.decode(&data.skin_geometry).unwrap_or_default(),
            model_config,
            animations: data.animated_image_data.iter().map(animation).collect(),
        }
    }
}

fn animation(data: &SkinAnimation) -> Animation {
    Animation {
        width: data.image_width,
        height: data.image_height,
        pixels: STANDARD.decode(&data.image).unwrap_or_default(),
        frame_count: data.frames as u32,
        kind: AnimationKind::from_tag(data.animation_type),
    }
}
