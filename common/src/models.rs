//! Model family types shared by the registry, caches and orchestrator.
//!
//! Every base model belongs to exactly one [`PipelineFamily`]; conditioning
//! models are only usable with a base model of the same family.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Architecture family of a diffusion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineFamily {
    #[serde(rename = "stable-diffusion")]
    StableDiffusion,

    #[serde(rename = "stable-diffusion-xl")]
    StableDiffusionXL,

    #[serde(rename = "latent-consistency")]
    LatentConsistency,

    #[serde(rename = "latent-consistency-xl")]
    LatentConsistencyXL,

    #[serde(rename = "instaflow")]
    InstaFlow,
}

impl PipelineFamily {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::StableDiffusion => "stable-diffusion",
            Self::StableDiffusionXL => "stable-diffusion-xl",
            Self::LatentConsistency => "latent-consistency",
            Self::LatentConsistencyXL => "latent-consistency-xl",
            Self::InstaFlow => "instaflow",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "stable-diffusion" | "sd" => Some(Self::StableDiffusion),
            "stable-diffusion-xl" | "sdxl" => Some(Self::StableDiffusionXL),
            "latent-consistency" | "lcm" => Some(Self::LatentConsistency),
            "latent-consistency-xl" | "lcm-sdxl" => Some(Self::LatentConsistencyXL),
            "instaflow" => Some(Self::InstaFlow),
            _ => None,
        }
    }

    /// XL families carry a second tokenizer/text-encoder pair
    pub fn is_xl(&self) -> bool {
        matches!(self, Self::StableDiffusionXL | Self::LatentConsistencyXL)
    }
}

impl fmt::Display for PipelineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// Role of a base model within its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Base,
    Refiner,
    Turbo,
}

/// Generation kinds a base model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffuserType {
    TextToImage,
    ImageToImage,
    ImageInpaint,
    ImageInpaintLegacy,
    ControlNet,
    ControlNetImage,
}

impl DiffuserType {
    /// Whether this kind needs an input image
    pub fn requires_input_image(&self) -> bool {
        matches!(
            self,
            Self::ImageToImage | Self::ImageInpaint | Self::ImageInpaintLegacy | Self::ControlNetImage
        )
    }

    pub fn is_control_net(&self) -> bool {
        matches!(self, Self::ControlNet | Self::ControlNetImage)
    }
}

/// Conditioning signal a ControlNet model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlNetType {
    Canny,
    Depth,
    Hed,
    Inpaint,
    LineArt,
    Mlsd,
    Normal,
    OpenPose,
    Qr,
    Scribble,
    Segmentation,
    Tile,
}

/// Template describing how a model folder is laid out and which defaults apply.
///
/// Built-in templates live in the registry's catalog; user templates come from
/// [`crate::Settings::templates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTemplate {
    pub name: String,
    pub family: PipelineFamily,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
    pub diffusers: Vec<DiffuserType>,
}

fn default_sample_size() -> u32 {
    512
}

impl ModelTemplate {
    pub fn new(
        name: impl Into<String>,
        family: PipelineFamily,
        model_type: ModelType,
        sample_size: u32,
        diffusers: Vec<DiffuserType>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            model_type,
            sample_size,
            diffusers,
        }
    }

    /// Whether the template expects a ControlNet-enabled unet
    pub fn supports_control_net(&self) -> bool {
        self.diffusers.iter().any(DiffuserType::is_control_net)
    }
}
