//! Diffusion service: residency of every model category plus generation.
//!
//! Coordinates the model lifecycle: descriptor → cache → load → generate → unload.

use crate::error::{DiffusionError, Result};
use crate::realtime::RealtimeSession;
use crate::request::{ExecutionMode, GenerationOutput, GenerationRequest, UpscaleOutput};
use crate::state::{GenerationContext, GenerationState};
use common::{ModelKey, PipelineFamily, ResidencyPolicy, Settings};
use easel_engine::{
    random_seed, BatchOptions, ControlNetHandle, DiffusionPipeline, GenerateParams, GeneratedMedia,
    ImageTensor, InferenceEngine, MediaKind, ModelCategory, ModelDescriptor, UpscalerHandle,
};
use easel_execution_providers::dispatch_for;
use easel_model_cache::{FeatureExtractorSlot, LoadOutcome, ResidencyCache};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Resolved inputs for one engine call
struct Prepared {
    pipeline: Arc<dyn DiffusionPipeline>,
    params: GenerateParams,
}

/// Diffusion Service
///
/// Owns the residency caches for base pipelines, ControlNets and upscalers,
/// the single feature-extractor slot, and runs generation in single, batch
/// and realtime mode against whatever is resident.
///
/// Generation never loads a model: callers load first, then generate.
pub struct DiffusionService {
    pipelines: ResidencyCache<dyn DiffusionPipeline>,
    control_nets: ResidencyCache<dyn ControlNetHandle>,
    upscalers: ResidencyCache<dyn UpscalerHandle>,
    extractor: FeatureExtractorSlot,
    refresh_rate: RwLock<Duration>,
}

impl DiffusionService {
    pub fn new(engine: Arc<dyn InferenceEngine>, settings: &Settings) -> Self {
        info!(
            "Initializing DiffusionService (models: {:?}, control nets: {:?})",
            settings.model_residency, settings.control_net_residency
        );

        let pipelines: ResidencyCache<dyn DiffusionPipeline> = {
            let engine = engine.clone();
            ResidencyCache::new(
                ModelCategory::Base,
                settings.model_residency,
                Arc::new(move |d: &ModelDescriptor| engine.create_pipeline(d)),
            )
        };
        let control_nets: ResidencyCache<dyn ControlNetHandle> = {
            let engine = engine.clone();
            ResidencyCache::new(
                ModelCategory::ControlNet,
                settings.control_net_residency,
                Arc::new(move |d: &ModelDescriptor| engine.create_control_net(d)),
            )
        };
        let upscalers: ResidencyCache<dyn UpscalerHandle> = {
            let engine = engine.clone();
            ResidencyCache::new(
                ModelCategory::Upscaler,
                settings.model_residency,
                Arc::new(move |d: &ModelDescriptor| engine.create_upscaler(d)),
            )
        };
        let extractor =
            FeatureExtractorSlot::new(Arc::new(move |d: &ModelDescriptor| engine.create_feature_extractor(d)));

        Self {
            pipelines,
            control_nets,
            upscalers,
            extractor,
            refresh_rate: RwLock::new(settings.realtime_refresh_rate()),
        }
    }

    // ---- Base models ----

    /// Load a base model. Idempotent.
    ///
    /// Under [`ResidencyPolicy::Single`] this evicts the resident model, the
    /// active feature extractor, and every ControlNet left without a base of
    /// its family.
    pub async fn load_model(&self, descriptor: &Arc<ModelDescriptor>) -> Result<LoadOutcome> {
        let key = descriptor.key();
        let swapping = !self.pipelines.is_loaded(&key)
            && self.pipelines.policy() == ResidencyPolicy::Single
            && !self.pipelines.is_empty();
        if swapping && self.extractor.force_unload().await {
            debug!("Released feature extractor before swapping to '{}'", descriptor.name);
        }

        // Diagnostic only; the engine places the session itself
        match dispatch_for(&descriptor.execution).select() {
            Ok(provider) => debug!("Model '{}' runs on {}", descriptor.name, provider.name()),
            Err(e) => warn!("Model '{}': {}", descriptor.name, e),
        }

        let outcome = self.pipelines.load(descriptor).await?;
        if !outcome.evicted.is_empty() {
            self.release_orphaned_control_nets().await;
        }
        Ok(outcome)
    }

    /// Unload a base model. Returns false if it was not resident.
    ///
    /// The feature extractor is always released. Orphaned ControlNets are
    /// released even when the engine fails to unload the model; the model
    /// leaves the cache either way and the engine error is returned.
    pub async fn unload_model(&self, key: &ModelKey) -> Result<bool> {
        self.extractor.force_unload().await;
        let unloaded = self.pipelines.unload(key).await;
        self.release_orphaned_control_nets().await;
        Ok(unloaded?.is_some())
    }

    pub fn is_model_loaded(&self, key: &ModelKey) -> bool {
        self.pipelines.is_loaded(key)
    }

    pub fn loaded_models(&self) -> Vec<Arc<ModelDescriptor>> {
        self.pipelines.resident()
    }

    pub fn set_model_residency(&self, policy: ResidencyPolicy) {
        self.pipelines.set_policy(policy);
        self.upscalers.set_policy(policy);
    }

    // ---- ControlNets ----

    pub async fn load_control_net(&self, descriptor: &Arc<ModelDescriptor>) -> Result<LoadOutcome> {
        Ok(self.control_nets.load(descriptor).await?)
    }

    /// Unload a ControlNet, releasing the feature extractor first.
    pub async fn unload_control_net(&self, key: &ModelKey) -> Result<bool> {
        self.extractor.force_unload().await;
        Ok(self.control_nets.unload(key).await?.is_some())
    }

    pub fn is_control_net_loaded(&self, key: &ModelKey) -> bool {
        self.control_nets.is_loaded(key)
    }

    pub fn loaded_control_nets(&self) -> Vec<Arc<ModelDescriptor>> {
        self.control_nets.resident()
    }

    pub fn set_control_net_residency(&self, policy: ResidencyPolicy) {
        self.control_nets.set_policy(policy);
    }

    // ---- Upscalers ----

    pub async fn load_upscaler(&self, descriptor: &Arc<ModelDescriptor>) -> Result<LoadOutcome> {
        Ok(self.upscalers.load(descriptor).await?)
    }

    pub async fn unload_upscaler(&self, key: &ModelKey) -> Result<bool> {
        Ok(self.upscalers.unload(key).await?.is_some())
    }

    pub fn is_upscaler_loaded(&self, key: &ModelKey) -> bool {
        self.upscalers.is_loaded(key)
    }

    // ---- Feature extractor ----

    pub async fn active_feature_extractor(&self) -> Option<ModelKey> {
        self.extractor.active().await
    }

    pub async fn unload_feature_extractor(&self) -> bool {
        self.extractor.force_unload().await
    }

    // ---- Settings ----

    pub fn realtime_refresh_rate(&self) -> Duration {
        *self.refresh_rate.read()
    }

    pub fn set_realtime_refresh_rate(&self, period: Duration) {
        *self.refresh_rate.write() = period;
    }

    /// Unload everything, feature extractor first
    pub async fn shutdown(&self) {
        info!("Shutting down DiffusionService");
        self.extractor.force_unload().await;
        self.control_nets.unload_all().await;
        self.pipelines.unload_all().await;
        self.upscalers.unload_all().await;
    }

    // ---- Generation ----

    /// Check that `request` can run against the resident models.
    pub fn validate(&self, request: &GenerationRequest) -> Result<()> {
        let pipeline = self
            .pipelines
            .get(&request.model.key())
            .ok_or_else(|| DiffusionError::PipelineNotLoaded(request.model.name.clone()))?;

        if let Some(control_net) = &request.control_net {
            if !self.control_nets.is_loaded(&control_net.key()) {
                return Err(DiffusionError::ControlNetNotLoaded(control_net.name.clone()));
            }
            let family = pipeline.family();
            if control_net.family() != Some(family) {
                return Err(DiffusionError::Validation(format!(
                    "ControlNet '{}' does not match pipeline family {}",
                    control_net.name, family
                )));
            }
        }

        pipeline
            .validate_inputs(&request.prompt, &request.scheduler)
            .map_err(|e| DiffusionError::Validation(e.to_string()))
    }

    pub async fn generate_image(
        &self,
        request: &GenerationRequest,
        ctx: &GenerationContext,
    ) -> Result<GenerationOutput> {
        let result = self.execute(MediaKind::Image, request, ctx).await;
        settle(ctx, &result);
        result
    }

    pub async fn generate_video(
        &self,
        request: &GenerationRequest,
        ctx: &GenerationContext,
    ) -> Result<GenerationOutput> {
        let result = self.execute(MediaKind::Video, request, ctx).await;
        settle(ctx, &result);
        result
    }

    /// Lazily generate one output per item of the batch sweep.
    ///
    /// Cancellation between items ends the stream without an error. An
    /// engine failure is yielded once and ends the stream.
    pub fn generate_batch<'a>(
        &'a self,
        kind: MediaKind,
        request: GenerationRequest,
        batch: BatchOptions,
        ctx: &'a GenerationContext,
    ) -> BoxStream<'a, Result<GenerationOutput>> {
        async_stream::stream! {
            let prepared = match self.prepare(&request, ctx).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    settle_error(ctx, &e);
                    if !e.is_cancelled() {
                        yield Err(e);
                    }
                    return;
                }
            };

            let pipeline = prepared.pipeline;
            let mut items = pipeline.run_batch(
                kind,
                &batch,
                prepared.params,
                ctx.engine_progress(),
                ctx.cancellation_token().clone(),
            );

            let mut started = Instant::now();
            loop {
                if ctx.is_cancelled() {
                    info!("[{}] Batch cancelled", ctx.id());
                    ctx.transition(GenerationState::Cancelled);
                    break;
                }
                ctx.transition(GenerationState::Generating);

                match items.next().await {
                    None => {
                        ctx.transition(GenerationState::Idle);
                        break;
                    }
                    Some(Ok(item)) => {
                        ctx.transition(GenerationState::Streaming);
                        let elapsed = started.elapsed();
                        yield Ok(GenerationOutput {
                            media: item.media,
                            scheduler: item.scheduler,
                            elapsed,
                        });
                        started = Instant::now();
                    }
                    Some(Err(e)) if e.is_cancelled() => {
                        info!("[{}] Batch cancelled", ctx.id());
                        ctx.transition(GenerationState::Cancelled);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("[{}] Batch item failed: {}", ctx.id(), e);
                        ctx.transition(GenerationState::Failed);
                        yield Err(e.into());
                        break;
                    }
                }
            }
        }
        .boxed()
    }

    /// Regenerate `session` whenever it changes, at most once per refresh period.
    ///
    /// Runs until the context is cancelled. A failed frame is yielded as an
    /// error and the loop carries on.
    pub fn generate_realtime<'a>(
        &'a self,
        kind: MediaKind,
        session: Arc<RealtimeSession>,
        ctx: &'a GenerationContext,
    ) -> BoxStream<'a, Result<GenerationOutput>> {
        let period = self.realtime_refresh_rate();

        async_stream::stream! {
            info!("[{}] Realtime generation started ({}ms refresh)", ctx.id(), period.as_millis());
            loop {
                if ctx.is_cancelled() {
                    break;
                }

                let started = Instant::now();
                match session.next_request() {
                    None => debug!("[{}] Realtime tick skipped, nothing changed", ctx.id()),
                    Some(request) => match self.execute(kind, &request, ctx).await {
                        Ok(output) => {
                            ctx.transition(GenerationState::Streaming);
                            yield Ok(output);
                        }
                        Err(e) if e.is_cancelled() => break,
                        Err(e) => {
                            warn!("[{}] Realtime frame failed: {}", ctx.id(), e);
                            ctx.transition(GenerationState::Failed);
                            yield Err(e);
                        }
                    },
                }

                let remaining = period.saturating_sub(started.elapsed());
                let cancelled = tokio::select! {
                    _ = ctx.cancellation_token().cancelled() => true,
                    _ = tokio::time::sleep(remaining) => false,
                };
                if cancelled {
                    break;
                }
            }
            ctx.transition(GenerationState::Cancelled);
            info!("[{}] Realtime generation stopped", ctx.id());
        }
        .boxed()
    }

    /// Run `mode` as one result stream.
    pub fn generate<'a>(
        &'a self,
        kind: MediaKind,
        mode: ExecutionMode,
        ctx: &'a GenerationContext,
    ) -> BoxStream<'a, Result<GenerationOutput>> {
        match mode {
            ExecutionMode::Single(request) => async_stream::stream! {
                let result = match kind {
                    MediaKind::Image => self.generate_image(&request, ctx).await,
                    MediaKind::Video => self.generate_video(&request, ctx).await,
                };
                match result {
                    Err(e) if e.is_cancelled() => {}
                    result => yield result,
                }
            }
            .boxed(),
            ExecutionMode::Batch(request, batch) => self.generate_batch(kind, request, batch, ctx),
            ExecutionMode::Realtime(session) => self.generate_realtime(kind, session, ctx),
        }
    }

    /// Upscale `image` with a resident upscaler.
    pub async fn upscale(
        &self,
        descriptor: &Arc<ModelDescriptor>,
        image: &ImageTensor,
        ctx: &GenerationContext,
    ) -> Result<UpscaleOutput> {
        let result = self.run_upscale(descriptor, image, ctx).await;
        settle(ctx, &result);
        result
    }

    async fn run_upscale(
        &self,
        descriptor: &Arc<ModelDescriptor>,
        image: &ImageTensor,
        ctx: &GenerationContext,
    ) -> Result<UpscaleOutput> {
        ctx.transition(GenerationState::Validating);
        let config = descriptor.as_upscaler().ok_or_else(|| {
            DiffusionError::Validation(format!("'{}' is not an upscaler", descriptor.name))
        })?;

        ctx.transition(GenerationState::Resolving);
        let upscaler = self
            .upscalers
            .get(&descriptor.key())
            .ok_or_else(|| DiffusionError::UpscalerNotLoaded(descriptor.name.clone()))?;

        if ctx.is_cancelled() {
            return Err(DiffusionError::Cancelled);
        }
        ctx.transition(GenerationState::Generating);
        let started = Instant::now();
        let image = upscaler
            .upscale(image, &ctx.engine_progress(), ctx.cancellation_token())
            .await?;
        Ok(UpscaleOutput {
            image,
            scale_factor: config.scale_factor,
            elapsed: started.elapsed(),
        })
    }

    async fn execute(
        &self,
        kind: MediaKind,
        request: &GenerationRequest,
        ctx: &GenerationContext,
    ) -> Result<GenerationOutput> {
        let started = Instant::now();
        let prepared = self.prepare(request, ctx).await?;

        if ctx.is_cancelled() {
            return Err(DiffusionError::Cancelled);
        }
        ctx.transition(GenerationState::Generating);
        debug!(
            "[{}] Generating {:?} with '{}' (seed {})",
            ctx.id(),
            kind,
            request.model.name,
            prepared.params.scheduler.seed
        );

        let progress = ctx.engine_progress();
        let cancel = ctx.cancellation_token();
        let media = match kind {
            MediaKind::Image => prepared
                .pipeline
                .generate_image(&prepared.params, &progress, cancel)
                .await
                .map(GeneratedMedia::Image),
            MediaKind::Video => prepared
                .pipeline
                .generate_video(&prepared.params, &progress, cancel)
                .await
                .map(GeneratedMedia::Video),
        }?;

        Ok(GenerationOutput {
            media,
            scheduler: prepared.params.scheduler,
            elapsed: started.elapsed(),
        })
    }

    /// Validate, resolve handles, run the feature extractor and fix the seed.
    async fn prepare(&self, request: &GenerationRequest, ctx: &GenerationContext) -> Result<Prepared> {
        if ctx.is_cancelled() {
            return Err(DiffusionError::Cancelled);
        }
        ctx.transition(GenerationState::Validating);
        self.validate(request)?;

        ctx.transition(GenerationState::Resolving);
        let pipeline = self
            .pipelines
            .get(&request.model.key())
            .ok_or_else(|| DiffusionError::PipelineNotLoaded(request.model.name.clone()))?;
        let control_net = match &request.control_net {
            Some(descriptor) => Some(
                self.control_nets
                    .get(&descriptor.key())
                    .ok_or_else(|| DiffusionError::ControlNetNotLoaded(descriptor.name.clone()))?,
            ),
            None => None,
        };

        let mut prompt = request.prompt.clone();
        let extracted = match (&request.feature_extractor, &prompt.control) {
            (Some(extractor), Some(control)) => {
                if ctx.is_cancelled() {
                    return Err(DiffusionError::Cancelled);
                }
                Some(self.extractor.run(extractor, control).await?)
            }
            _ => None,
        };
        if extracted.is_some() {
            prompt.control = extracted;
        }

        let mut scheduler = request.scheduler.clone();
        if scheduler.seed == 0 {
            scheduler.seed = random_seed();
        }

        let mut params = GenerateParams::new(prompt, scheduler);
        if let Some(control_net) = control_net {
            params = params.with_control_net(control_net);
        }
        Ok(Prepared { pipeline, params })
    }

    /// Unload ControlNets whose family no longer has a resident base model.
    async fn release_orphaned_control_nets(&self) {
        let families: Vec<PipelineFamily> = self
            .pipelines
            .resident()
            .iter()
            .filter_map(|d| d.family())
            .collect();

        let released = self
            .control_nets
            .unload_where(|d| d.family().is_some_and(|family| !families.contains(&family)))
            .await;
        for descriptor in released {
            info!("Released ControlNet '{}' with its base model", descriptor.name);
        }
    }
}

/// Move `ctx` to the state a finished call leaves it in
fn settle<T>(ctx: &GenerationContext, result: &Result<T>) {
    match result {
        Ok(_) => ctx.transition(GenerationState::Idle),
        Err(e) => settle_error(ctx, e),
    }
}

fn settle_error(ctx: &GenerationContext, error: &DiffusionError) {
    if error.is_cancelled() {
        info!("[{}] Generation cancelled", ctx.id());
        ctx.transition(GenerationState::Cancelled);
    } else {
        warn!("[{}] Generation failed: {}", ctx.id(), error);
        ctx.transition(GenerationState::Failed);
    }
}
