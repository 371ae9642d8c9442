//! Request and result types of the orchestrator.

use crate::realtime::RealtimeSession;
use easel_engine::{BatchOptions, GeneratedMedia, ImageTensor, ModelDescriptor, PromptOptions, SchedulerOptions};
use std::sync::Arc;
use std::time::Duration;

/// One generation request.
///
/// Model references are descriptors; the models themselves must already be
/// resident in the service's caches.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: Arc<ModelDescriptor>,
    pub control_net: Option<Arc<ModelDescriptor>>,
    /// Preprocesses `prompt.control` before it reaches the ControlNet
    pub feature_extractor: Option<Arc<ModelDescriptor>>,
    pub prompt: PromptOptions,
    pub scheduler: SchedulerOptions,
}

impl GenerationRequest {
    pub fn new(model: Arc<ModelDescriptor>, prompt: PromptOptions, scheduler: SchedulerOptions) -> Self {
        Self {
            model,
            control_net: None,
            feature_extractor: None,
            prompt,
            scheduler,
        }
    }

    pub fn with_control_net(mut self, control_net: Arc<ModelDescriptor>) -> Self {
        self.control_net = Some(control_net);
        self
    }

    pub fn with_feature_extractor(mut self, feature_extractor: Arc<ModelDescriptor>) -> Self {
        self.feature_extractor = Some(feature_extractor);
        self
    }
}

/// Result of one generation
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub media: GeneratedMedia,
    /// Scheduler options actually used, with the seed resolved
    pub scheduler: SchedulerOptions,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct UpscaleOutput {
    pub image: ImageTensor,
    pub scale_factor: u32,
    pub elapsed: Duration,
}

/// How a generation call unfolds
#[derive(Clone)]
pub enum ExecutionMode {
    Single(GenerationRequest),
    Batch(GenerationRequest, BatchOptions),
    /// Regenerates whenever the shared session changes
    Realtime(Arc<RealtimeSession>),
}
