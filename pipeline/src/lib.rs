//! Generation orchestrator for diffusion models.
//!
//! [`DiffusionService`] keeps base pipelines, ControlNets, upscalers and the
//! active feature extractor resident according to the configured policies,
//! and runs generation against them in three modes:
//!
//! - **Single**: one image or video per call
//! - **Batch**: a lazy stream over a seed/step/guidance/strength sweep
//! - **Realtime**: an unbounded stream that regenerates whenever the shared
//!   [`RealtimeSession`] changes, throttled to the refresh rate
//!
//! # Architecture
//!
//! ```text
//! ModelRegistry (descriptors) ──▶ DiffusionService ──▶ ResidencyCache ──▶ InferenceEngine
//!                                       │
//!                                       └── GenerationContext (cancel, progress, state)
//! ```
//!
//! Generation never loads models on demand. A request naming a model that is
//! not resident fails with [`DiffusionError::PipelineNotLoaded`] or
//! [`DiffusionError::ControlNetNotLoaded`].
//!
//! # Example
//!
//! ```ignore
//! let service = DiffusionService::new(engine, &settings);
//! service.load_model(&descriptor).await?;
//!
//! let ctx = GenerationContext::new().with_progress(sink);
//! let request = GenerationRequest::new(descriptor, PromptOptions::new("a lighthouse"), SchedulerOptions::default());
//! let output = service.generate_image(&request, &ctx).await?;
//! ```

pub mod error;
pub mod realtime;
pub mod request;
pub mod service;
pub mod state;

pub use error::{DiffusionError, Result};
pub use realtime::RealtimeSession;
pub use request::{ExecutionMode, GenerationOutput, GenerationRequest, UpscaleOutput};
pub use service::DiffusionService;
pub use state::{GenerationContext, GenerationState};
