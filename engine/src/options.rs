//! Request options: prompt, scheduler parameters and batch sweeps.

use crate::error::{EngineError, EngineResult};
use crate::media::MediaInput;
use common::DiffuserType;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prompt side of a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOptions {
    pub prompt: String,
    pub negative_prompt: String,
    pub diffuser_type: DiffuserType,
    /// Source media for image-to-image, inpaint and video-to-video
    pub input: Option<MediaInput>,
    /// Conditioning media for ControlNet diffusers
    pub control: Option<MediaInput>,
    pub video_input_fps: f32,
    pub video_output_fps: f32,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            diffuser_type: DiffuserType::TextToImage,
            input: None,
            control: None,
            video_input_fps: 15.0,
            video_output_fps: 15.0,
        }
    }
}

impl PromptOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    pub fn with_diffuser_type(mut self, diffuser_type: DiffuserType) -> Self {
        self.diffuser_type = diffuser_type;
        self
    }

    pub fn with_input(mut self, input: MediaInput) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_control(mut self, control: MediaInput) -> Self {
        self.control = Some(control);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SchedulerType {
    #[default]
    LMS,
    Euler,
    EulerAncestral,
    DDPM,
    DDIM,
    KDPM2,
    LCM,
    InstaFlow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BetaScheduleType {
    Linear,
    #[default]
    ScaledLinear,
    SquaredCosCapV2,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimestepSpacingType {
    #[default]
    Linspace,
    Leading,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PredictionType {
    #[default]
    Epsilon,
    VariablePrediction,
    Sample,
}

/// Scheduler parameters for one generation.
///
/// A `seed` of 0 means "pick a random seed"; the orchestrator resolves it
/// before the request reaches the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    pub width: u32,
    pub height: u32,
    pub seed: u32,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub strength: f32,
    pub conditioning_scale: f32,
    pub scheduler_type: SchedulerType,
    pub train_timesteps: u32,
    pub beta_start: f32,
    pub beta_end: f32,
    pub beta_schedule: BetaScheduleType,
    pub timestep_spacing: TimestepSpacingType,
    pub steps_offset: u32,
    pub use_karras_sigmas: bool,
    pub prediction_type: PredictionType,
    pub original_inference_steps: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            seed: 0,
            inference_steps: 30,
            guidance_scale: 7.5,
            strength: 0.75,
            conditioning_scale: 1.0,
            scheduler_type: SchedulerType::default(),
            train_timesteps: 1000,
            beta_start: 0.00085,
            beta_end: 0.012,
            beta_schedule: BetaScheduleType::default(),
            timestep_spacing: TimestepSpacingType::default(),
            steps_offset: 0,
            use_karras_sigmas: false,
            prediction_type: PredictionType::default(),
            original_inference_steps: 100,
        }
    }
}

impl SchedulerOptions {
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.inference_steps = steps;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Draw a seed in `1..=i32::MAX`. Never returns 0, which means "random".
pub fn random_seed() -> u32 {
    rand::rng().random_range(1..=i32::MAX as u32)
}

/// Field-level checks every engine applies before generating.
pub fn validate_options(prompt: &PromptOptions, scheduler: &SchedulerOptions) -> EngineResult<()> {
    if prompt.prompt.trim().is_empty() {
        return Err(EngineError::InvalidInput("prompt is empty".to_string()));
    }
    if scheduler.width == 0 || scheduler.height == 0 || scheduler.width % 8 != 0 || scheduler.height % 8 != 0 {
        return Err(EngineError::InvalidInput(format!(
            "output size {}x{} must be a non-zero multiple of 8",
            scheduler.width, scheduler.height
        )));
    }
    if scheduler.inference_steps == 0 {
        return Err(EngineError::InvalidInput("inference steps must be at least 1".to_string()));
    }
    if !(0.0..=1.0).contains(&scheduler.strength) {
        return Err(EngineError::InvalidInput(format!(
            "strength {} is outside 0..=1",
            scheduler.strength
        )));
    }
    if prompt.diffuser_type.requires_input_image() && prompt.input.is_none() {
        return Err(EngineError::InvalidInput(format!(
            "{:?} requires an input image",
            prompt.diffuser_type
        )));
    }
    if prompt.diffuser_type.is_control_net() && prompt.control.is_none() {
        return Err(EngineError::InvalidInput(format!(
            "{:?} requires a control image",
            prompt.diffuser_type
        )));
    }
    Ok(())
}

/// Upper bound on the items one batch may expand to
pub const MAX_BATCH_ITEMS: usize = 10_000;

/// Scheduler parameter a batch sweeps over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchOptionType {
    /// `value_to` random seeds
    Seed,
    Step,
    Guidance,
    Strength,
}

/// Definition of a batch sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOptions {
    pub option_type: BatchOptionType,
    pub value_from: f32,
    pub value_to: f32,
    pub increment: f32,
}

impl BatchOptions {
    /// `count` items with random seeds
    pub fn seeds(count: usize) -> Self {
        Self {
            option_type: BatchOptionType::Seed,
            value_from: 0.0,
            value_to: count as f32,
            increment: 1.0,
        }
    }

    pub fn sweep(option_type: BatchOptionType, from: f32, to: f32, increment: f32) -> Self {
        Self {
            option_type,
            value_from: from,
            value_to: to,
            increment,
        }
    }

    /// Number of items the sweep produces
    pub fn item_count(&self) -> EngineResult<usize> {
        let count = match self.option_type {
            BatchOptionType::Seed => self.value_to.max(0.0).floor(),
            _ if self.increment > 0.0 && self.value_to >= self.value_from => {
                ((self.value_to - self.value_from) / self.increment + 1e-4).floor() + 1.0
            }
            _ => 1.0,
        };
        if !count.is_finite() || count > MAX_BATCH_ITEMS as f32 {
            return Err(EngineError::InvalidInput(format!(
                "Batch of {} items exceeds the limit of {}",
                count, MAX_BATCH_ITEMS
            )));
        }
        Ok(count as usize)
    }

    fn sweep_values(&self, count: usize) -> Vec<f32> {
        (0..count)
            .map(|i| self.value_from + self.increment * i as f32)
            .collect()
    }

    /// One scheduler configuration per batch item, derived from `base`.
    ///
    /// Fails with [`EngineError::InvalidInput`] when the sweep would produce
    /// more than [`MAX_BATCH_ITEMS`] items.
    pub fn expand(&self, base: &SchedulerOptions) -> EngineResult<Vec<SchedulerOptions>> {
        let count = self.item_count()?;
        let items = match self.option_type {
            BatchOptionType::Seed => (0..count)
                .map(|_| base.clone().with_seed(random_seed()))
                .collect(),
            BatchOptionType::Step => self
                .sweep_values(count)
                .into_iter()
                .map(|v| base.clone().with_steps(v.round().max(1.0) as u32))
                .collect(),
            BatchOptionType::Guidance => self
                .sweep_values(count)
                .into_iter()
                .map(|v| SchedulerOptions {
                    guidance_scale: v,
                    ..base.clone()
                })
                .collect(),
            BatchOptionType::Strength => self
                .sweep_values(count)
                .into_iter()
                .map(|v| SchedulerOptions {
                    strength: v.clamp(0.0, 1.0),
                    ..base.clone()
                })
                .collect(),
        };
        Ok(items)
    }
}
