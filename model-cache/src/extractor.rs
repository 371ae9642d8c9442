//! Single-slot cache for feature extractors (ControlNet annotators).

use crate::error::{CacheError, Result};
use crate::residency::Constructor;
use common::{MemoryMode, ModelKey};
use easel_engine::{FeatureExtractorHandle, MediaInput, ModelCategory, ModelDescriptor};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct ActiveExtractor {
    descriptor: Arc<ModelDescriptor>,
    handle: Arc<dyn FeatureExtractorHandle>,
}

/// Holds zero or one feature extractor.
///
/// The slot loads lazily on first use, swaps when a request names a
/// different extractor, and in [`MemoryMode::Minimum`] unloads right after
/// every run.
pub struct FeatureExtractorSlot {
    constructor: Constructor<dyn FeatureExtractorHandle>,
    active: Mutex<Option<ActiveExtractor>>,
}

impl FeatureExtractorSlot {
    pub fn new(constructor: Constructor<dyn FeatureExtractorHandle>) -> Self {
        Self {
            constructor,
            active: Mutex::new(None),
        }
    }

    /// Key of the resident extractor, if any
    pub async fn active(&self) -> Option<ModelKey> {
        self.active.lock().await.as_ref().map(|a| a.descriptor.key())
    }

    /// Run `descriptor` over `input`, loading or swapping it in first.
    pub async fn run(&self, descriptor: &Arc<ModelDescriptor>, input: &MediaInput) -> Result<MediaInput> {
        if descriptor.category() != ModelCategory::FeatureExtractor {
            return Err(CacheError::WrongCategory {
                name: descriptor.name.clone(),
                expected: ModelCategory::FeatureExtractor,
                actual: descriptor.category(),
            });
        }

        let mut active = self.active.lock().await;

        let key = descriptor.key();
        if active.as_ref().is_some_and(|a| a.descriptor.key() != key) {
            if let Some(previous) = active.take() {
                Self::release(previous).await;
            }
        }

        let handle = match active.as_ref() {
            Some(current) => current.handle.clone(),
            None => {
                info!("Loading feature extractor '{}'", descriptor.name);
                let handle = (self.constructor)(descriptor.as_ref())?;
                if let Err(e) = handle.load().await {
                    let _ = handle.unload().await;
                    return Err(e.into());
                }
                *active = Some(ActiveExtractor {
                    descriptor: descriptor.clone(),
                    handle: handle.clone(),
                });
                handle
            }
        };

        let output = match input {
            MediaInput::Image(image) => handle.run_image(image).await.map(MediaInput::Image),
            MediaInput::Video(video) => handle.run_video(video).await.map(MediaInput::Video),
        };

        if descriptor.execution.memory_mode == MemoryMode::Minimum {
            if let Some(current) = active.take() {
                debug!("Minimum memory mode, releasing '{}'", current.descriptor.name);
                Self::release(current).await;
            }
        }

        Ok(output?)
    }

    /// Unload whatever is resident. Returns true if something was unloaded.
    pub async fn force_unload(&self) -> bool {
        match self.active.lock().await.take() {
            Some(current) => {
                Self::release(current).await;
                true
            }
            None => false,
        }
    }

    async fn release(extractor: ActiveExtractor) {
        match extractor.handle.unload().await {
            Ok(()) => info!("Unloaded feature extractor '{}'", extractor.descriptor.name),
            Err(e) => warn!("Error unloading feature extractor '{}': {}", extractor.descriptor.name, e),
        }
    }
}
