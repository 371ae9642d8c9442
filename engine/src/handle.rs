//! Handles to engine model instances and the factory that creates them.
//!
//! A handle is created unloaded by [`InferenceEngine`]; the residency caches
//! call [`ModelHandle::load`] and [`ModelHandle::unload`] around its
//! lifetime. Generation methods take a cancellation token and a progress sink
//! and are expected to check the token between denoising steps.

use crate::descriptor::ModelDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::media::{GeneratedMedia, ImageTensor, MediaKind, VideoFrames};
use crate::options::{validate_options, BatchOptions, PromptOptions, SchedulerOptions};
use crate::progress::ProgressSink;
use async_trait::async_trait;
use common::{ControlNetType, PipelineFamily};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle shared by every engine model instance
#[async_trait]
pub trait ModelHandle: Send + Sync {
    /// Descriptor name this instance was created from
    fn name(&self) -> &str;

    /// Initialise sessions and allocate device memory
    async fn load(&self) -> EngineResult<()>;

    /// Release device memory. Must be safe to call on a handle that failed to load.
    async fn unload(&self) -> EngineResult<()>;
}

/// A loaded ControlNet model
pub trait ControlNetHandle: ModelHandle {
    fn family(&self) -> PipelineFamily;
    fn control_type(&self) -> ControlNetType;
}

/// Parameters for one engine generation call
#[derive(Clone)]
pub struct GenerateParams {
    pub prompt: PromptOptions,
    pub scheduler: SchedulerOptions,
    pub control_net: Option<Arc<dyn ControlNetHandle>>,
}

impl GenerateParams {
    pub fn new(prompt: PromptOptions, scheduler: SchedulerOptions) -> Self {
        Self {
            prompt,
            scheduler,
            control_net: None,
        }
    }

    pub fn with_control_net(mut self, control_net: Arc<dyn ControlNetHandle>) -> Self {
        self.control_net = Some(control_net);
        self
    }
}

/// One batch item as produced by [`DiffusionPipeline::run_batch`]
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub scheduler: SchedulerOptions,
    pub media: GeneratedMedia,
}

/// A base diffusion pipeline
#[async_trait]
pub trait DiffusionPipeline: ModelHandle {
    fn family(&self) -> PipelineFamily;

    /// Reject requests the pipeline cannot run
    fn validate_inputs(&self, prompt: &PromptOptions, scheduler: &SchedulerOptions) -> EngineResult<()> {
        validate_options(prompt, scheduler)
    }

    async fn generate_image(
        &self,
        params: &GenerateParams,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<ImageTensor>;

    async fn generate_video(
        &self,
        params: &GenerateParams,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<VideoFrames>;

    /// Lazily generate one item per entry of the batch sweep.
    ///
    /// The default runs the items one at a time through `generate_image` /
    /// `generate_video`; engines with native batching override it. Nothing
    /// is generated until the stream is polled.
    fn run_batch<'a>(
        &'a self,
        kind: MediaKind,
        batch: &BatchOptions,
        params: GenerateParams,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> BoxStream<'a, EngineResult<BatchResult>> {
        let items = match batch.expand(&params.scheduler) {
            Ok(items) => items,
            Err(e) => return futures::stream::once(async move { Err(e) }).boxed(),
        };
        let total = items.len();

        async_stream::stream! {
            for (index, scheduler) in items.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    yield Err(EngineError::Cancelled);
                    break;
                }

                tracing::debug!("Batch item {}/{} (seed {})", index + 1, total, scheduler.seed);
                let item = GenerateParams { scheduler, ..params.clone() };
                let item_progress = progress.with_batch(index + 1, total);
                let media = match kind {
                    MediaKind::Image => self
                        .generate_image(&item, &item_progress, &cancel)
                        .await
                        .map(GeneratedMedia::Image),
                    MediaKind::Video => self
                        .generate_video(&item, &item_progress, &cancel)
                        .await
                        .map(GeneratedMedia::Video),
                };

                match media {
                    Ok(media) => yield Ok(BatchResult { scheduler: item.scheduler, media }),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
        .boxed()
    }
}

/// Preprocessor that turns a control image into a conditioning map
/// (edges, depth, pose, ...)
#[async_trait]
pub trait FeatureExtractorHandle: ModelHandle {
    async fn run_image(&self, image: &ImageTensor) -> EngineResult<ImageTensor>;

    /// Runs the extractor frame by frame
    async fn run_video(&self, video: &VideoFrames) -> EngineResult<VideoFrames> {
        let mut frames = Vec::with_capacity(video.len());
        for frame in &video.frames {
            frames.push(self.run_image(frame).await?);
        }
        Ok(VideoFrames::new(frames, video.fps))
    }
}

/// Super-resolution model
#[async_trait]
pub trait UpscalerHandle: ModelHandle {
    async fn upscale(
        &self,
        image: &ImageTensor,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<ImageTensor>;
}

/// Creates unloaded handles from descriptors.
///
/// Implementations should fail with [`EngineError::Unsupported`] when handed
/// a descriptor of the wrong category.
pub trait InferenceEngine: Send + Sync {
    fn create_pipeline(&self, descriptor: &ModelDescriptor) -> EngineResult<Arc<dyn DiffusionPipeline>>;

    fn create_control_net(&self, descriptor: &ModelDescriptor) -> EngineResult<Arc<dyn ControlNetHandle>>;

    fn create_feature_extractor(
        &self,
        descriptor: &ModelDescriptor,
    ) -> EngineResult<Arc<dyn FeatureExtractorHandle>>;

    fn create_upscaler(&self, descriptor: &ModelDescriptor) -> EngineResult<Arc<dyn UpscalerHandle>>;
}
