//! Residency cache for engine model instances.
//!
//! Holds at most one instance per descriptor identity. Lookups go straight
//! to the [`DashMap`]; every mutation (load, unload, eviction) runs under a
//! per-cache async gate so two loads of the same model never construct two
//! instances.

use crate::error::{CacheError, Result};
use common::{ModelKey, ResidencyPolicy};
use dashmap::DashMap;
use easel_engine::{EngineResult, ModelCategory, ModelDescriptor, ModelHandle};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Creates an unloaded handle for a descriptor
pub type Constructor<H> = Arc<dyn Fn(&ModelDescriptor) -> EngineResult<Arc<H>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidencyState {
    /// Engine `load` is in flight
    Loading,
    Loaded,
}

/// A descriptor paired with its engine instance.
pub struct LoadedPipeline<H: ?Sized> {
    descriptor: Arc<ModelDescriptor>,
    handle: Arc<H>,
    state: RwLock<ResidencyState>,
}

impl<H: ?Sized> LoadedPipeline<H> {
    fn new(descriptor: Arc<ModelDescriptor>, handle: Arc<H>) -> Self {
        Self {
            descriptor,
            handle,
            state: RwLock::new(ResidencyState::Loading),
        }
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }

    pub fn state(&self) -> ResidencyState {
        *self.state.read()
    }

    fn mark_loaded(&self) {
        *self.state.write() = ResidencyState::Loaded;
    }
}

/// What a successful [`ResidencyCache::load`] did
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// The model was already resident; the engine was not called
    pub already_resident: bool,
    /// Models unloaded to satisfy [`ResidencyPolicy::Single`]
    pub evicted: Vec<Arc<ModelDescriptor>>,
}

/// Residency cache for one model category.
///
/// ```ignore
/// let cache = ResidencyCache::new(ModelCategory::Base, ResidencyPolicy::Single, {
///     let engine = engine.clone();
///     Arc::new(move |d: &ModelDescriptor| engine.create_pipeline(d))
/// });
/// cache.load(&descriptor).await?;
/// assert!(cache.is_loaded(&descriptor.key()));
/// ```
pub struct ResidencyCache<H: ?Sized + ModelHandle> {
    category: ModelCategory,
    policy: RwLock<ResidencyPolicy>,
    entries: DashMap<ModelKey, Arc<LoadedPipeline<H>>>,
    gate: Mutex<()>,
    constructor: Constructor<H>,
}

impl<H: ?Sized + ModelHandle> ResidencyCache<H> {
    pub fn new(category: ModelCategory, policy: ResidencyPolicy, constructor: Constructor<H>) -> Self {
        Self {
            category,
            policy: RwLock::new(policy),
            entries: DashMap::new(),
            gate: Mutex::new(()),
            constructor,
        }
    }

    pub fn category(&self) -> ModelCategory {
        self.category
    }

    pub fn policy(&self) -> ResidencyPolicy {
        *self.policy.read()
    }

    /// Takes effect on the next load; resident models are kept.
    pub fn set_policy(&self, policy: ResidencyPolicy) {
        *self.policy.write() = policy;
    }

    /// Make `descriptor` resident.
    ///
    /// Idempotent: a resident model returns immediately without touching the
    /// engine. Under [`ResidencyPolicy::Single`] every other resident model is
    /// unloaded first. A failed load leaves no entry behind.
    pub async fn load(&self, descriptor: &Arc<ModelDescriptor>) -> Result<LoadOutcome> {
        if descriptor.category() != self.category {
            return Err(CacheError::WrongCategory {
                name: descriptor.name.clone(),
                expected: self.category,
                actual: descriptor.category(),
            });
        }

        let key = descriptor.key();
        let _gate = self.gate.lock().await;

        if self.state(&key) == Some(ResidencyState::Loaded) {
            debug!("{} model '{}' already loaded", self.category, descriptor.name);
            return Ok(LoadOutcome {
                already_resident: true,
                evicted: Vec::new(),
            });
        }
        // A Loading entry here belongs to a load that was dropped mid-flight
        if let Some((_, stale)) = self.entries.remove(&key) {
            warn!("Discarding interrupted load of '{}'", stale.descriptor.name);
            let _ = stale.handle.unload().await;
        }

        let mut evicted = Vec::new();
        if self.policy() == ResidencyPolicy::Single {
            for other in self.keys() {
                if let Some(descriptor) = self.remove_and_unload(&other).await {
                    info!("Evicted {} model '{}'", self.category, descriptor.name);
                    evicted.push(descriptor);
                }
            }
        }

        info!("Loading {} model '{}'", self.category, descriptor.name);
        let handle = (self.constructor)(descriptor.as_ref())?;
        let entry = Arc::new(LoadedPipeline::new(descriptor.clone(), handle.clone()));
        self.entries.insert(key.clone(), entry.clone());

        if let Err(e) = handle.load().await {
            self.entries.remove(&key);
            let _ = handle.unload().await;
            warn!("Failed to load {} model '{}': {}", self.category, descriptor.name, e);
            return Err(e.into());
        }

        entry.mark_loaded();
        info!("✅ {} model '{}' loaded successfully", self.category, descriptor.name);
        Ok(LoadOutcome {
            already_resident: false,
            evicted,
        })
    }

    /// Unload one model. Returns the descriptor if it was resident.
    pub async fn unload(&self, key: &ModelKey) -> Result<Option<Arc<ModelDescriptor>>> {
        let _gate = self.gate.lock().await;

        let Some((_, entry)) = self.entries.remove(key) else {
            return Ok(None);
        };
        entry.handle.unload().await?;
        info!("Unloaded {} model '{}'", self.category, entry.descriptor.name);
        Ok(Some(entry.descriptor.clone()))
    }

    /// Unload every resident model matching `predicate`.
    pub async fn unload_where<F>(&self, predicate: F) -> Vec<Arc<ModelDescriptor>>
    where
        F: Fn(&ModelDescriptor) -> bool,
    {
        let _gate = self.gate.lock().await;

        let matching: Vec<ModelKey> = self
            .entries
            .iter()
            .filter(|entry| predicate(entry.value().descriptor.as_ref()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut unloaded = Vec::new();
        for key in matching {
            if let Some(descriptor) = self.remove_and_unload(&key).await {
                info!("Unloaded {} model '{}'", self.category, descriptor.name);
                unloaded.push(descriptor);
            }
        }
        unloaded
    }

    pub async fn unload_all(&self) -> Vec<Arc<ModelDescriptor>> {
        self.unload_where(|_| true).await
    }

    /// Resident and fully loaded
    pub fn is_loaded(&self, key: &ModelKey) -> bool {
        self.state(key) == Some(ResidencyState::Loaded)
    }

    pub fn state(&self, key: &ModelKey) -> Option<ResidencyState> {
        self.entries.get(key).map(|entry| entry.state())
    }

    /// Handle of a loaded model
    pub fn get(&self, key: &ModelKey) -> Option<Arc<H>> {
        self.entry(key).map(|entry| entry.handle.clone())
    }

    /// Entry of a loaded model
    pub fn entry(&self, key: &ModelKey) -> Option<Arc<LoadedPipeline<H>>> {
        self.entries
            .get(key)
            .filter(|entry| entry.state() == ResidencyState::Loaded)
            .map(|entry| entry.value().clone())
    }

    /// Descriptors of every loaded model
    pub fn resident(&self) -> Vec<Arc<ModelDescriptor>> {
        self.entries
            .iter()
            .filter(|entry| entry.state() == ResidencyState::Loaded)
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn keys(&self) -> Vec<ModelKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Caller holds the gate. Unload failures are logged; the entry is gone either way.
    async fn remove_and_unload(&self, key: &ModelKey) -> Option<Arc<ModelDescriptor>> {
        let (_, entry) = self.entries.remove(key)?;
        if let Err(e) = entry.handle.unload().await {
            warn!("Error unloading {} model '{}': {}", self.category, entry.descriptor.name, e);
        }
        Some(entry.descriptor.clone())
    }
}
