//! Interface to the native diffusion inference engine.
//!
//! The engine itself (tokenization, denoising, VAE encode/decode) lives
//! outside this workspace. This crate defines what the orchestrator consumes
//! from it:
//!
//! - [`ModelDescriptor`]: what a model instance is initialised from
//! - [`InferenceEngine`]: factory creating unloaded handles from descriptors
//! - [`DiffusionPipeline`], [`ControlNetHandle`], [`FeatureExtractorHandle`],
//!   [`UpscalerHandle`]: async handles with `load`/`unload` plus their work
//! - [`PromptOptions`], [`SchedulerOptions`], [`BatchOptions`]: request shape
//! - [`ProgressSink`]: non-blocking progress reporting
//!
//! # Example
//!
//! ```rust
//! use easel_engine::{BatchOptions, ProgressEvent, ProgressSink, SchedulerOptions};
//!
//! let (sink, _rx) = ProgressSink::channel();
//! sink.report(ProgressEvent::step(1, 30));
//!
//! let items = BatchOptions::seeds(4).expand(&SchedulerOptions::default()).unwrap();
//! assert_eq!(items.len(), 4);
//! ```

pub mod descriptor;
pub mod error;
pub mod handle;
pub mod media;
pub mod options;
pub mod progress;

pub use descriptor::{
    BaseModelConfig, ControlNetConfig, DescriptorKind, FeatureExtractorConfig, ModelCategory,
    ModelDescriptor, OnnxModelConfig, TokenizerConfig, UpscalerConfig, VaeConfig,
};
pub use error::{EngineError, EngineResult};
pub use handle::{
    BatchResult, ControlNetHandle, DiffusionPipeline, FeatureExtractorHandle, GenerateParams,
    InferenceEngine, ModelHandle, UpscalerHandle,
};
pub use media::{GeneratedMedia, ImageTensor, MediaInput, MediaKind, VideoFrames};
pub use options::{
    random_seed, validate_options, BatchOptionType, MAX_BATCH_ITEMS, BatchOptions, BetaScheduleType, PredictionType,
    PromptOptions, SchedulerOptions, SchedulerType, TimestepSpacingType,
};
pub use progress::{ProgressEvent, ProgressSink};
