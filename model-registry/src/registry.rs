//! In-memory descriptor store with case-insensitive name uniqueness.

use crate::error::{RegistryError, Result};
use crate::factory::ModelFactory;
use common::{ControlNetType, ModelKey, ModelTemplate, PipelineFamily, Settings};
use easel_engine::{ModelCategory, ModelDescriptor};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 49;

/// Model Descriptor Registry
///
/// Creates descriptors through [`ModelFactory`], validates them and stores
/// them by [`ModelKey`]. Every `create_*` call checks the name and every
/// referenced file and fails with [`RegistryError::Validation`] without
/// registering anything.
///
/// # Example
///
/// ```no_run
/// use common::Settings;
/// use easel_model_registry::ModelRegistry;
/// use std::path::Path;
///
/// let registry = ModelRegistry::new(&Settings::default());
/// let descriptor = registry
///     .create_from_template_name("sdxl-base", Path::new("/models/sdxl"), "SDXL")
///     .unwrap();
/// assert!(registry.contains("SDXL-Base"));
/// # let _ = descriptor;
/// ```
pub struct ModelRegistry {
    factory: ModelFactory,
    descriptors: RwLock<BTreeMap<ModelKey, Arc<ModelDescriptor>>>,
}

impl ModelRegistry {
    pub fn new(settings: &Settings) -> Self {
        Self::with_factory(ModelFactory::new(settings))
    }

    pub fn with_factory(factory: ModelFactory) -> Self {
        Self {
            factory,
            descriptors: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn factory(&self) -> &ModelFactory {
        &self.factory
    }

    /// Create and register a base model from a folder laid out per `template`.
    pub fn create(&self, name: &str, folder: &Path, template: &ModelTemplate) -> Result<Arc<ModelDescriptor>> {
        if !folder.try_exists()? {
            return Err(RegistryError::Validation(format!(
                "model folder {} does not exist",
                folder.display()
            )));
        }
        let descriptor = self.factory.create_base(name.trim(), folder, template);
        self.insert(descriptor)
    }

    /// Like [`Self::create`], looking the template up by name.
    pub fn create_from_template_name(
        &self,
        name: &str,
        folder: &Path,
        template_name: &str,
    ) -> Result<Arc<ModelDescriptor>> {
        let template = self
            .factory
            .templates()
            .get(template_name)
            .cloned()
            .ok_or_else(|| RegistryError::Validation(format!("Unknown template '{}'", template_name)))?;
        self.create(name, folder, &template)
    }

    pub fn create_control_net(
        &self,
        name: &str,
        control_type: ControlNetType,
        family: PipelineFamily,
        file: &Path,
    ) -> Result<Arc<ModelDescriptor>> {
        let descriptor = self.factory.create_control_net(name.trim(), control_type, family, file);
        self.insert(descriptor)
    }

    pub fn create_feature_extractor(
        &self,
        name: &str,
        file: &Path,
        normalize: bool,
        sample_size: u32,
        channels: u32,
    ) -> Result<Arc<ModelDescriptor>> {
        let descriptor = self
            .factory
            .create_feature_extractor(name.trim(), file, normalize, sample_size, channels);
        self.insert(descriptor)
    }

    pub fn create_upscaler(&self, name: &str, file: &Path, template_name: &str) -> Result<Arc<ModelDescriptor>> {
        let template = self
            .factory
            .templates()
            .upscaler(template_name)
            .cloned()
            .ok_or_else(|| RegistryError::Validation(format!("Unknown template '{}'", template_name)))?;
        let descriptor = self.factory.create_upscaler(name.trim(), file, &template);
        self.insert(descriptor)
    }

    /// Validate and register an externally built descriptor.
    pub fn insert(&self, descriptor: ModelDescriptor) -> Result<Arc<ModelDescriptor>> {
        validate_name(&descriptor.name)?;
        validate_files(&descriptor)?;

        let key = descriptor.key();
        let mut descriptors = self.descriptors.write();
        if descriptors.contains_key(&key) {
            return Err(RegistryError::Validation(format!(
                "a model named '{}' already exists",
                descriptor.name
            )));
        }

        let descriptor = Arc::new(descriptor);
        descriptors.insert(key, descriptor.clone());
        info!("Registered {} model '{}'", descriptor.category(), descriptor.name);
        Ok(descriptor)
    }

    /// Replace an existing descriptor wholesale. The name identifies the
    /// descriptor being replaced, so it cannot change through an update.
    pub fn update(&self, descriptor: ModelDescriptor) -> Result<Arc<ModelDescriptor>> {
        validate_files(&descriptor)?;

        let key = descriptor.key();
        let mut descriptors = self.descriptors.write();
        let Some(existing) = descriptors.get(&key) else {
            return Err(RegistryError::NotFound(descriptor.name.clone()));
        };
        if existing.category() != descriptor.category() {
            return Err(RegistryError::Validation(format!(
                "cannot change '{}' from {} to {}",
                descriptor.name,
                existing.category(),
                descriptor.category()
            )));
        }

        let descriptor = Arc::new(descriptor);
        descriptors.insert(key, descriptor.clone());
        debug!("Updated model '{}'", descriptor.name);
        Ok(descriptor)
    }

    pub fn remove(&self, name: &str) -> Result<Arc<ModelDescriptor>> {
        let removed = self
            .descriptors
            .write()
            .remove(&ModelKey::new(name))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        info!("Removed model '{}'", removed.name);
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.descriptors.read().get(&ModelKey::new(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.read().contains_key(&ModelKey::new(name))
    }

    /// Descriptors of one category, ordered by key
    pub fn list(&self, category: ModelCategory) -> Vec<Arc<ModelDescriptor>> {
        self.descriptors
            .read()
            .values()
            .filter(|d| d.category() == category)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(RegistryError::Validation(format!(
            "model name '{}' must be {}-{} characters",
            name, MIN_NAME_LEN, MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_files(descriptor: &ModelDescriptor) -> Result<()> {
    let missing: Vec<String> = descriptor
        .files()
        .into_iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();

    if !missing.is_empty() {
        return Err(RegistryError::Validation(format!(
            "model '{}' is missing {}",
            descriptor.name,
            missing.join(", ")
        )));
    }
    Ok(())
}
