//! Scripted inference engine for orchestrator tests.
//!
//! Handles do no real work: generation sleeps briefly, reports one progress
//! event per step and returns blank tensors. Every call is recorded so tests
//! can assert exactly what reached the engine.

#![allow(dead_code)]

use async_trait::async_trait;
use common::{ControlNetType, ExecutionSettings, MemoryMode, ModelType, PipelineFamily};
use easel_engine::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct Calls {
    created: Mutex<HashMap<String, usize>>,
    loaded: Mutex<HashMap<String, usize>>,
    unloaded: Mutex<HashMap<String, usize>>,
    generations: Mutex<Vec<(String, Instant, u32)>>,
    extractor_runs: Mutex<Vec<String>>,
    fail_generate: AtomicBool,
    failing_unloads: Mutex<Vec<String>>,
}

impl Calls {
    fn bump(map: &Mutex<HashMap<String, usize>>, name: &str) {
        *map.lock().unwrap().entry(name.to_string()).or_default() += 1;
    }

    fn count(map: &Mutex<HashMap<String, usize>>, name: &str) -> usize {
        map.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn created(&self, name: &str) -> usize {
        Self::count(&self.created, name)
    }

    pub fn loaded(&self, name: &str) -> usize {
        Self::count(&self.loaded, name)
    }

    pub fn unloaded(&self, name: &str) -> usize {
        Self::count(&self.unloaded, name)
    }

    pub fn generation_count(&self) -> usize {
        self.generations.lock().unwrap().len()
    }

    /// Start time of every generation, in call order
    pub fn generation_times(&self) -> Vec<Instant> {
        self.generations.lock().unwrap().iter().map(|(_, at, _)| *at).collect()
    }

    pub fn generation_seeds(&self) -> Vec<u32> {
        self.generations.lock().unwrap().iter().map(|(_, _, seed)| *seed).collect()
    }

    pub fn extractor_runs(&self) -> Vec<String> {
        self.extractor_runs.lock().unwrap().clone()
    }

    pub fn fail_generations(&self, fail: bool) {
        self.fail_generate.store(fail, Ordering::SeqCst);
    }

    /// Make the engine refuse to unload `name`
    pub fn fail_unload(&self, name: &str) {
        self.failing_unloads.lock().unwrap().push(name.to_string());
    }
}

pub struct MockEngine {
    pub calls: Arc<Calls>,
    generate_delay: Duration,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::from_millis(1))
    }

    pub fn with_delay(generate_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(Calls::default()),
            generate_delay,
        })
    }

    fn handle(&self, descriptor: &ModelDescriptor) -> MockHandle {
        Calls::bump(&self.calls.created, &descriptor.name);
        MockHandle {
            name: descriptor.name.clone(),
            family: descriptor.family().unwrap_or(PipelineFamily::StableDiffusion),
            scale_factor: descriptor.as_upscaler().map(|u| u.scale_factor).unwrap_or(1),
            calls: self.calls.clone(),
            generate_delay: self.generate_delay,
        }
    }

    fn expect(descriptor: &ModelDescriptor, category: ModelCategory) -> EngineResult<()> {
        if descriptor.category() != category {
            return Err(EngineError::Unsupported(format!(
                "'{}' is a {} model",
                descriptor.name,
                descriptor.category()
            )));
        }
        Ok(())
    }
}

impl InferenceEngine for MockEngine {
    fn create_pipeline(&self, descriptor: &ModelDescriptor) -> EngineResult<Arc<dyn DiffusionPipeline>> {
        Self::expect(descriptor, ModelCategory::Base)?;
        Ok(Arc::new(self.handle(descriptor)))
    }

    fn create_control_net(&self, descriptor: &ModelDescriptor) -> EngineResult<Arc<dyn ControlNetHandle>> {
        Self::expect(descriptor, ModelCategory::ControlNet)?;
        Ok(Arc::new(self.handle(descriptor)))
    }

    fn create_feature_extractor(
        &self,
        descriptor: &ModelDescriptor,
    ) -> EngineResult<Arc<dyn FeatureExtractorHandle>> {
        Self::expect(descriptor, ModelCategory::FeatureExtractor)?;
        Ok(Arc::new(self.handle(descriptor)))
    }

    fn create_upscaler(&self, descriptor: &ModelDescriptor) -> EngineResult<Arc<dyn UpscalerHandle>> {
        Self::expect(descriptor, ModelCategory::Upscaler)?;
        Ok(Arc::new(self.handle(descriptor)))
    }
}

pub struct MockHandle {
    name: String,
    family: PipelineFamily,
    scale_factor: u32,
    calls: Arc<Calls>,
    generate_delay: Duration,
}

impl MockHandle {
    async fn generate(
        &self,
        params: &GenerateParams,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<ImageTensor> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.calls
            .generations
            .lock()
            .unwrap()
            .push((self.name.clone(), Instant::now(), params.scheduler.seed));

        let steps = params.scheduler.inference_steps as usize;
        for step in 1..=steps {
            progress.report(ProgressEvent::step(step, steps));
        }
        tokio::time::sleep(self.generate_delay).await;

        if self.calls.fail_generate.load(Ordering::SeqCst) {
            return Err(EngineError::Failed("scripted failure".to_string()));
        }
        Ok(ImageTensor::zeros(3, 8, 8))
    }
}

#[async_trait]
impl ModelHandle for MockHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> EngineResult<()> {
        Calls::bump(&self.calls.loaded, &self.name);
        Ok(())
    }

    async fn unload(&self) -> EngineResult<()> {
        Calls::bump(&self.calls.unloaded, &self.name);
        if self.calls.failing_unloads.lock().unwrap().contains(&self.name) {
            return Err(EngineError::Failed(format!("could not release '{}'", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl DiffusionPipeline for MockHandle {
    fn family(&self) -> PipelineFamily {
        self.family
    }

    async fn generate_image(
        &self,
        params: &GenerateParams,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<ImageTensor> {
        self.generate(params, progress, cancel).await
    }

    async fn generate_video(
        &self,
        params: &GenerateParams,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<VideoFrames> {
        let frame = self.generate(params, progress, cancel).await?;
        Ok(VideoFrames::new(vec![frame.clone(), frame], params.prompt.video_output_fps))
    }
}

impl ControlNetHandle for MockHandle {
    fn family(&self) -> PipelineFamily {
        self.family
    }

    fn control_type(&self) -> ControlNetType {
        ControlNetType::Canny
    }
}

#[async_trait]
impl FeatureExtractorHandle for MockHandle {
    async fn run_image(&self, image: &ImageTensor) -> EngineResult<ImageTensor> {
        self.calls.extractor_runs.lock().unwrap().push(self.name.clone());
        Ok(ImageTensor::zeros(1, image.height(), image.width()))
    }
}

#[async_trait]
impl UpscalerHandle for MockHandle {
    async fn upscale(
        &self,
        image: &ImageTensor,
        _progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<ImageTensor> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let scale = self.scale_factor as usize;
        Ok(ImageTensor::zeros(image.channels(), image.height() * scale, image.width() * scale))
    }
}

// ---- Descriptors ----

pub fn base(name: &str, family: PipelineFamily) -> Arc<ModelDescriptor> {
    Arc::new(ModelDescriptor::new(
        name,
        ExecutionSettings::default(),
        DescriptorKind::Base(BaseModelConfig {
            family,
            model_type: ModelType::Base,
            sample_size: 512,
            diffusers: vec![common::DiffuserType::TextToImage, common::DiffuserType::ControlNet],
            unet: OnnxModelConfig::new(format!("/models/{name}/unet/model.onnx")),
            tokenizer: None,
            tokenizer_2: None,
            text_encoder: None,
            text_encoder_2: None,
            vae_decoder: VaeConfig {
                path: format!("/models/{name}/vae_decoder/model.onnx").into(),
                scale_factor: 0.18215,
            },
            vae_encoder: None,
        }),
    ))
}

pub fn control_net(name: &str, family: PipelineFamily) -> Arc<ModelDescriptor> {
    Arc::new(ModelDescriptor::new(
        name,
        ExecutionSettings::default(),
        DescriptorKind::ControlNet(ControlNetConfig {
            control_type: ControlNetType::Canny,
            family,
            model: OnnxModelConfig::new(format!("/models/{name}.onnx")),
        }),
    ))
}

pub fn extractor(name: &str, memory_mode: MemoryMode) -> Arc<ModelDescriptor> {
    Arc::new(ModelDescriptor::new(
        name,
        ExecutionSettings {
            memory_mode,
            ..Default::default()
        },
        DescriptorKind::FeatureExtractor(FeatureExtractorConfig {
            model: OnnxModelConfig::new(format!("/models/{name}.onnx")),
            normalize: true,
            sample_size: 512,
            channels: 1,
        }),
    ))
}

pub fn upscaler(name: &str, scale_factor: u32) -> Arc<ModelDescriptor> {
    Arc::new(ModelDescriptor::new(
        name,
        ExecutionSettings::default(),
        DescriptorKind::Upscaler(UpscalerConfig {
            model: OnnxModelConfig::new(format!("/models/{name}.onnx")),
            channels: 3,
            sample_size: 512,
            scale_factor,
        }),
    ))
}
