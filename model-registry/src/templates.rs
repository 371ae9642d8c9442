//! Built-in and user model templates.

use common::{DiffuserType, ModelKey, ModelTemplate, ModelType, PipelineFamily};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geometry of an upscaler model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleTemplate {
    pub name: String,
    pub sample_size: u32,
    pub scale_factor: u32,
}

/// Template lookup by case-insensitive name.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    models: BTreeMap<ModelKey, ModelTemplate>,
    upscalers: BTreeMap<ModelKey, UpscaleTemplate>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// Catalog with only the built-in templates
    pub fn builtin() -> Self {
        use DiffuserType::*;
        use PipelineFamily::*;

        let models = [
            ModelTemplate::new("SD", StableDiffusion, ModelType::Base, 512, vec![TextToImage, ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("SD-Inpaint", StableDiffusion, ModelType::Base, 512, vec![ImageInpaint]),
            ModelTemplate::new("SD-Turbo", StableDiffusion, ModelType::Turbo, 512, vec![TextToImage, ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("SD-ControlNet", StableDiffusion, ModelType::Base, 512, vec![ControlNet, ControlNetImage]),
            ModelTemplate::new("SDXL", StableDiffusionXL, ModelType::Base, 1024, vec![TextToImage, ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("SDXL-Refiner", StableDiffusionXL, ModelType::Refiner, 1024, vec![ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("SDXL-Turbo", StableDiffusionXL, ModelType::Turbo, 512, vec![TextToImage, ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("LCM", LatentConsistency, ModelType::Base, 512, vec![TextToImage, ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("LCM-SDXL", LatentConsistencyXL, ModelType::Base, 1024, vec![TextToImage, ImageToImage, ImageInpaintLegacy]),
            ModelTemplate::new("InstaFlow", InstaFlow, ModelType::Base, 512, vec![TextToImage]),
        ];

        let upscalers = [
            UpscaleTemplate { name: "Upscale-2x".to_string(), sample_size: 512, scale_factor: 2 },
            UpscaleTemplate { name: "Upscale-4x".to_string(), sample_size: 512, scale_factor: 4 },
        ];

        Self {
            models: models.into_iter().map(|t| (ModelKey::new(&t.name), t)).collect(),
            upscalers: upscalers.into_iter().map(|t| (ModelKey::new(&t.name), t)).collect(),
        }
    }

    /// Built-ins plus user templates; a user template replaces a built-in of the same name.
    pub fn with_user_templates(templates: &[ModelTemplate]) -> Self {
        let mut catalog = Self::builtin();
        for template in templates {
            catalog.insert(template.clone());
        }
        catalog
    }

    pub fn insert(&mut self, template: ModelTemplate) {
        self.models.insert(ModelKey::new(&template.name), template);
    }

    pub fn get(&self, name: &str) -> Option<&ModelTemplate> {
        self.models.get(&ModelKey::new(name))
    }

    pub fn upscaler(&self, name: &str) -> Option<&UpscaleTemplate> {
        self.upscalers.get(&ModelKey::new(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.values().map(|t| t.name.as_str())
    }
}
