//! Model descriptors: what the engine needs to initialise a model instance.
//!
//! Descriptors are created by the registry and never mutated afterwards;
//! editing a model replaces its descriptor wholesale.

use common::{
    ControlNetType, DiffuserType, ExecutionSettings, ModelKey, ModelType, PipelineFamily,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single ONNX graph on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxModelConfig {
    pub path: PathBuf,
}

impl OnnxModelConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub path: PathBuf,
    /// Embedding width produced by the paired text encoder
    pub length: usize,
    pub pad_token_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaeConfig {
    pub path: PathBuf,
    pub scale_factor: f32,
}

/// Sub-components of a base diffusion model.
///
/// Optional parts are absent for families or model types that do not use
/// them (an XL refiner has no primary tokenizer; a model without a VAE
/// encoder cannot do image-to-image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseModelConfig {
    pub family: PipelineFamily,
    pub model_type: ModelType,
    pub sample_size: u32,
    pub diffusers: Vec<DiffuserType>,
    pub unet: OnnxModelConfig,
    pub tokenizer: Option<TokenizerConfig>,
    pub tokenizer_2: Option<TokenizerConfig>,
    pub text_encoder: Option<OnnxModelConfig>,
    pub text_encoder_2: Option<OnnxModelConfig>,
    pub vae_decoder: VaeConfig,
    pub vae_encoder: Option<VaeConfig>,
}

impl BaseModelConfig {
    pub fn supports(&self, diffuser: DiffuserType) -> bool {
        self.diffusers.contains(&diffuser)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlNetConfig {
    pub control_type: ControlNetType,
    /// Base family this conditioning model was trained against
    pub family: PipelineFamily,
    pub model: OnnxModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractorConfig {
    pub model: OnnxModelConfig,
    pub normalize: bool,
    pub sample_size: u32,
    pub channels: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscalerConfig {
    pub model: OnnxModelConfig,
    pub channels: u32,
    pub sample_size: u32,
    pub scale_factor: u32,
}

/// Category-specific part of a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum DescriptorKind {
    Base(BaseModelConfig),
    ControlNet(ControlNetConfig),
    FeatureExtractor(FeatureExtractorConfig),
    Upscaler(UpscalerConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelCategory {
    Base,
    ControlNet,
    FeatureExtractor,
    Upscaler,
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Base => "base",
            Self::ControlNet => "controlnet",
            Self::FeatureExtractor => "feature-extractor",
            Self::Upscaler => "upscaler",
        };
        write!(f, "{}", name)
    }
}

/// Everything needed to initialise one model instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub execution: ExecutionSettings,
    #[serde(flatten)]
    pub kind: DescriptorKind,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, execution: ExecutionSettings, kind: DescriptorKind) -> Self {
        Self {
            name: name.into(),
            execution,
            kind,
        }
    }

    /// Case-insensitive identity used by every cache
    pub fn key(&self) -> ModelKey {
        ModelKey::new(&self.name)
    }

    pub fn category(&self) -> ModelCategory {
        match &self.kind {
            DescriptorKind::Base(_) => ModelCategory::Base,
            DescriptorKind::ControlNet(_) => ModelCategory::ControlNet,
            DescriptorKind::FeatureExtractor(_) => ModelCategory::FeatureExtractor,
            DescriptorKind::Upscaler(_) => ModelCategory::Upscaler,
        }
    }

    /// Pipeline family for base and ControlNet models
    pub fn family(&self) -> Option<PipelineFamily> {
        match &self.kind {
            DescriptorKind::Base(base) => Some(base.family),
            DescriptorKind::ControlNet(control) => Some(control.family),
            _ => None,
        }
    }

    pub fn as_base(&self) -> Option<&BaseModelConfig> {
        match &self.kind {
            DescriptorKind::Base(base) => Some(base),
            _ => None,
        }
    }

    pub fn as_control_net(&self) -> Option<&ControlNetConfig> {
        match &self.kind {
            DescriptorKind::ControlNet(control) => Some(control),
            _ => None,
        }
    }

    pub fn as_feature_extractor(&self) -> Option<&FeatureExtractorConfig> {
        match &self.kind {
            DescriptorKind::FeatureExtractor(extractor) => Some(extractor),
            _ => None,
        }
    }

    pub fn as_upscaler(&self) -> Option<&UpscalerConfig> {
        match &self.kind {
            DescriptorKind::Upscaler(upscaler) => Some(upscaler),
            _ => None,
        }
    }

    /// Every file this descriptor references
    pub fn files(&self) -> Vec<&Path> {
        match &self.kind {
            DescriptorKind::Base(base) => {
                let mut files = vec![base.unet.path.as_path(), base.vae_decoder.path.as_path()];
                files.extend(base.tokenizer.iter().map(|t| t.path.as_path()));
                files.extend(base.tokenizer_2.iter().map(|t| t.path.as_path()));
                files.extend(base.text_encoder.iter().map(|t| t.path.as_path()));
                files.extend(base.text_encoder_2.iter().map(|t| t.path.as_path()));
                files.extend(base.vae_encoder.iter().map(|v| v.path.as_path()));
                files
            }
            DescriptorKind::ControlNet(control) => vec![control.model.path.as_path()],
            DescriptorKind::FeatureExtractor(extractor) => vec![extractor.model.path.as_path()],
            DescriptorKind::Upscaler(upscaler) => vec![upscaler.model.path.as_path()],
        }
    }
}
