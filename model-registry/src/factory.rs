//! Builds descriptors from model folders and templates.
//!
//! The factory only resolves paths and applies family defaults; it does not
//! check for name collisions. [`crate::ModelRegistry`] validates and stores
//! what the factory builds.

use crate::templates::{TemplateCatalog, UpscaleTemplate};
use common::{ControlNetType, ExecutionSettings, ModelTemplate, ModelType, PipelineFamily, Settings};
use easel_engine::{
    BaseModelConfig, ControlNetConfig, DescriptorKind, FeatureExtractorConfig, ModelDescriptor,
    OnnxModelConfig, TokenizerConfig, UpscalerConfig, VaeConfig,
};
use easel_execution_providers::resolve_supported;
use std::path::{Path, PathBuf};

const MODEL_FILE: &str = "model.onnx";

const XL_VAE_SCALE: f32 = 0.13025;
const SD_VAE_SCALE: f32 = 0.18215;
const XL_TOKENIZER_2_LENGTH: usize = 1280;
const SD_TOKENIZER_LENGTH: usize = 768;
const TURBO_TOKENIZER_LENGTH: usize = 1024;
const XL_PAD_TOKEN_ID: i64 = 1;
const CLIP_PAD_TOKEN_ID: i64 = 49407;

/// Descriptor builder seeded with the default execution settings.
#[derive(Debug, Clone)]
pub struct ModelFactory {
    execution: ExecutionSettings,
    default_tokenizer: Option<PathBuf>,
    templates: TemplateCatalog,
}

impl ModelFactory {
    pub fn new(settings: &Settings) -> Self {
        let mut execution = settings.execution.clone();
        execution.provider = resolve_supported(execution.provider);

        Self {
            execution,
            default_tokenizer: settings.default_tokenizer_path.clone(),
            templates: TemplateCatalog::with_user_templates(&settings.templates),
        }
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn execution(&self) -> &ExecutionSettings {
        &self.execution
    }

    fn component(folder: &Path, component: &str) -> PathBuf {
        folder.join(component).join(MODEL_FILE)
    }

    /// Tokenizer inside the folder, else the shared default when one is configured
    fn tokenizer_path(&self, folder: &Path, component: &str) -> PathBuf {
        let path = Self::component(folder, component);
        if path.is_file() {
            return path;
        }
        match &self.default_tokenizer {
            Some(default) => default.clone(),
            None => path,
        }
    }

    /// Resolve the sub-component layout of a base model folder.
    pub fn create_base(&self, name: &str, folder: &Path, template: &ModelTemplate) -> ModelDescriptor {
        // Some repositories keep the ControlNet unet under controlnet/
        let mut unet = Self::component(folder, "unet");
        let control_unet = Self::component(folder, "controlnet");
        if template.supports_control_net() && control_unet.is_file() {
            unet = control_unet;
        }

        let tokenizer_path = self.tokenizer_path(folder, "tokenizer");
        let tokenizer_2_path = self.tokenizer_path(folder, "tokenizer_2");
        let text_encoder = OnnxModelConfig::new(Self::component(folder, "text_encoder"));
        let text_encoder_2 = OnnxModelConfig::new(Self::component(folder, "text_encoder_2"));
        let vae_decoder = Self::component(folder, "vae_decoder");
        let vae_encoder_path = Self::component(folder, "vae_encoder");
        // The encoder is optional; without it the model is text-to-image only
        let vae_encoder = |scale_factor| {
            vae_encoder_path.is_file().then(|| VaeConfig {
                path: vae_encoder_path.clone(),
                scale_factor,
            })
        };

        let config = if template.family.is_xl() {
            let tokenizer_2 = Some(TokenizerConfig {
                path: tokenizer_2_path,
                length: XL_TOKENIZER_2_LENGTH,
                pad_token_id: XL_PAD_TOKEN_ID,
            });
            let is_refiner = template.model_type == ModelType::Refiner;
            BaseModelConfig {
                family: template.family,
                model_type: template.model_type,
                sample_size: template.sample_size,
                diffusers: template.diffusers.clone(),
                unet: OnnxModelConfig::new(unet),
                tokenizer: (!is_refiner).then(|| TokenizerConfig {
                    path: tokenizer_path,
                    length: SD_TOKENIZER_LENGTH,
                    pad_token_id: XL_PAD_TOKEN_ID,
                }),
                tokenizer_2,
                text_encoder: (!is_refiner).then_some(text_encoder),
                text_encoder_2: Some(text_encoder_2),
                vae_decoder: VaeConfig {
                    path: vae_decoder,
                    scale_factor: XL_VAE_SCALE,
                },
                vae_encoder: vae_encoder(XL_VAE_SCALE),
            }
        } else {
            let length = match template.model_type {
                ModelType::Turbo => TURBO_TOKENIZER_LENGTH,
                _ => SD_TOKENIZER_LENGTH,
            };
            BaseModelConfig {
                family: template.family,
                model_type: template.model_type,
                sample_size: template.sample_size,
                diffusers: template.diffusers.clone(),
                unet: OnnxModelConfig::new(unet),
                tokenizer: Some(TokenizerConfig {
                    path: tokenizer_path,
                    length,
                    pad_token_id: CLIP_PAD_TOKEN_ID,
                }),
                tokenizer_2: None,
                text_encoder: Some(text_encoder),
                text_encoder_2: None,
                vae_decoder: VaeConfig {
                    path: vae_decoder,
                    scale_factor: SD_VAE_SCALE,
                },
                vae_encoder: vae_encoder(SD_VAE_SCALE),
            }
        };

        ModelDescriptor::new(name, self.execution.clone(), DescriptorKind::Base(config))
    }

    pub fn create_control_net(
        &self,
        name: &str,
        control_type: ControlNetType,
        family: PipelineFamily,
        file: &Path,
    ) -> ModelDescriptor {
        ModelDescriptor::new(
            name,
            self.execution.clone(),
            DescriptorKind::ControlNet(ControlNetConfig {
                control_type,
                family,
                model: OnnxModelConfig::new(file),
            }),
        )
    }

    pub fn create_feature_extractor(
        &self,
        name: &str,
        file: &Path,
        normalize: bool,
        sample_size: u32,
        channels: u32,
    ) -> ModelDescriptor {
        ModelDescriptor::new(
            name,
            self.execution.clone(),
            DescriptorKind::FeatureExtractor(FeatureExtractorConfig {
                model: OnnxModelConfig::new(file),
                normalize,
                sample_size,
                channels,
            }),
        )
    }

    pub fn create_upscaler(&self, name: &str, file: &Path, template: &UpscaleTemplate) -> ModelDescriptor {
        ModelDescriptor::new(
            name,
            self.execution.clone(),
            DescriptorKind::Upscaler(UpscalerConfig {
                model: OnnxModelConfig::new(file),
                channels: 3,
                sample_size: template.sample_size,
                scale_factor: template.scale_factor,
            }),
        )
    }
}
