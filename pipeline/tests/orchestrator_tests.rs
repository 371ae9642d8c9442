//! Integration tests for the diffusion service
//!
//! Runs the orchestrator against the scripted engine in `support`.

mod support;

use common::{DiffuserType, MemoryMode, PipelineFamily, ResidencyPolicy, Settings};
use easel_engine::{
    BatchOptionType, BatchOptions, GeneratedMedia, ImageTensor, MediaInput, MediaKind, ProgressSink,
    PromptOptions, SchedulerOptions,
};
use easel_pipeline::*;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use support::{base, control_net, extractor, upscaler, MockEngine};

fn service_with(settings: Settings) -> (Arc<MockEngine>, DiffusionService) {
    let engine = MockEngine::new();
    let service = DiffusionService::new(engine.clone(), &settings);
    (engine, service)
}

fn service() -> (Arc<MockEngine>, DiffusionService) {
    service_with(Settings::default())
}

fn request(model: &Arc<easel_engine::ModelDescriptor>) -> GenerationRequest {
    GenerationRequest::new(
        model.clone(),
        PromptOptions::new("a lighthouse on a cliff"),
        SchedulerOptions::default().with_steps(4),
    )
}

fn control_request(
    model: &Arc<easel_engine::ModelDescriptor>,
    control_net: &Arc<easel_engine::ModelDescriptor>,
) -> GenerationRequest {
    let prompt = PromptOptions::new("a lighthouse on a cliff")
        .with_diffuser_type(DiffuserType::ControlNet)
        .with_control(MediaInput::Image(ImageTensor::zeros(3, 64, 64)));
    GenerationRequest::new(model.clone(), prompt, SchedulerOptions::default().with_steps(4))
        .with_control_net(control_net.clone())
}

// ---- Residency ----

#[tokio::test]
async fn test_load_model_is_idempotent() {
    println!("\n🧪 Testing idempotent model load...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);

    let first = service.load_model(&sd).await.unwrap();
    let second = service.load_model(&sd).await.unwrap();

    assert!(!first.already_resident);
    assert!(second.already_resident);
    assert_eq!(engine.calls.created("sd-base"), 1);
    assert_eq!(engine.calls.loaded("sd-base"), 1);
    assert_eq!(service.loaded_models().len(), 1);
    println!("✅ Engine load invoked once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_model_loads_construct_once() {
    let (engine, service) = service();
    let service = Arc::new(service);
    let sd = base("sd-base", PipelineFamily::StableDiffusion);

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let service = service.clone();
            let sd = sd.clone();
            tokio::spawn(async move { service.load_model(&sd).await.map(|_| ()) })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(engine.calls.created("sd-base"), 1);
    assert_eq!(engine.calls.loaded("sd-base"), 1);
}

#[tokio::test]
async fn test_single_policy_swap_releases_dependents() {
    println!("\n🧪 Testing Single residency swap...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let xl = base("xl-base", PipelineFamily::StableDiffusionXL);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    let annotator = extractor("canny-annotator", MemoryMode::Maximum);

    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();
    let request = control_request(&sd, &canny).with_feature_extractor(annotator.clone());
    service.generate_image(&request, &GenerationContext::new()).await.unwrap();
    assert_eq!(service.active_feature_extractor().await, Some(annotator.key()));

    let outcome = service.load_model(&xl).await.unwrap();

    assert_eq!(outcome.evicted.len(), 1);
    assert_eq!(outcome.evicted[0].name, "sd-base");
    assert!(!service.is_model_loaded(&sd.key()));
    assert!(service.is_model_loaded(&xl.key()));
    assert!(!service.is_control_net_loaded(&canny.key()));
    assert_eq!(service.active_feature_extractor().await, None);
    assert_eq!(engine.calls.unloaded("sd-base"), 1);
    assert_eq!(engine.calls.unloaded("sd-canny"), 1);
    assert_eq!(engine.calls.unloaded("canny-annotator"), 1);
    println!("✅ Evicted base, ControlNet and feature extractor");
}

#[tokio::test]
async fn test_control_net_kept_while_family_resident() {
    let (_engine, service) = service_with(Settings {
        model_residency: ResidencyPolicy::Multiple,
        ..Default::default()
    });
    let first = base("sd-first", PipelineFamily::StableDiffusion);
    let second = base("sd-second", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);

    service.load_model(&first).await.unwrap();
    service.load_model(&second).await.unwrap();
    service.load_control_net(&canny).await.unwrap();
    assert_eq!(service.loaded_models().len(), 2);

    assert!(service.unload_model(&first.key()).await.unwrap());
    assert!(service.is_control_net_loaded(&canny.key()));

    assert!(service.unload_model(&second.key()).await.unwrap());
    assert!(!service.is_control_net_loaded(&canny.key()));
    assert!(!service.unload_model(&second.key()).await.unwrap());
}

#[tokio::test]
async fn test_failed_unload_still_releases_control_nets() {
    println!("\n🧪 Testing unload failure cascade...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();
    engine.calls.fail_unload("sd-base");

    let result = service.unload_model(&sd.key()).await;

    assert!(matches!(result, Err(DiffusionError::Engine(_))));
    assert!(!service.is_model_loaded(&sd.key()));
    assert!(!service.is_control_net_loaded(&canny.key()));
    assert_eq!(engine.calls.unloaded("sd-canny"), 1);
    println!("✅ ControlNet released despite engine error");
}

#[tokio::test]
async fn test_control_net_residency_is_independent() {
    let (_engine, service) = service_with(Settings {
        control_net_residency: ResidencyPolicy::Multiple,
        ..Default::default()
    });
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    let depth = control_net("sd-depth", PipelineFamily::StableDiffusion);

    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();
    service.load_control_net(&depth).await.unwrap();
    assert_eq!(service.loaded_control_nets().len(), 2);

    service.set_control_net_residency(ResidencyPolicy::Single);
    service.unload_control_net(&depth.key()).await.unwrap();
    service.load_control_net(&depth).await.unwrap();
    assert_eq!(service.loaded_control_nets().len(), 1);
    assert!(service.is_control_net_loaded(&depth.key()));
}

// ---- Validation ----

#[tokio::test]
async fn test_generate_requires_resident_pipeline() {
    println!("\n🧪 Testing PipelineNotLoaded...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let ctx = GenerationContext::new();

    let result = service.generate_image(&request(&sd), &ctx).await;

    assert!(matches!(result, Err(DiffusionError::PipelineNotLoaded(name)) if name == "sd-base"));
    assert_eq!(ctx.state(), GenerationState::Failed);
    assert_eq!(engine.calls.generation_count(), 0);
    println!("✅ Rejected before reaching the engine");
}

#[tokio::test]
async fn test_generate_requires_resident_control_net() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let result = service
        .generate_image(&control_request(&sd, &canny), &GenerationContext::new())
        .await;

    assert!(matches!(result, Err(DiffusionError::ControlNetNotLoaded(name)) if name == "sd-canny"));
    assert_eq!(engine.calls.generation_count(), 0);
}

#[tokio::test]
async fn test_control_net_family_mismatch() {
    let (_engine, service) = service();
    let xl = base("xl-base", PipelineFamily::StableDiffusionXL);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    service.load_model(&xl).await.unwrap();
    service.load_control_net(&canny).await.unwrap();

    let result = service.validate(&control_request(&xl, &canny));
    assert!(matches!(result, Err(DiffusionError::Validation(_))));
}

#[tokio::test]
async fn test_engine_input_validation() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let mut empty_prompt = request(&sd);
    empty_prompt.prompt.prompt = "   ".to_string();
    let result = service.generate_image(&empty_prompt, &GenerationContext::new()).await;

    assert!(matches!(result, Err(DiffusionError::Validation(message)) if message.contains("prompt")));
    assert_eq!(engine.calls.generation_count(), 0);
}

// ---- Single generation ----

#[tokio::test]
async fn test_generate_image_reports_progress() {
    println!("\n🧪 Testing single image generation...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let (sink, mut rx) = ProgressSink::channel();
    let ctx = GenerationContext::new().with_progress(sink);
    let output = service.generate_image(&request(&sd), &ctx).await.unwrap();

    assert!(matches!(output.media, GeneratedMedia::Image(_)));
    assert_ne!(output.scheduler.seed, 0, "seed 0 is resolved before the engine call");
    assert_eq!(engine.calls.generation_seeds(), vec![output.scheduler.seed]);
    assert!(output.elapsed > Duration::ZERO);
    assert_eq!(ctx.state(), GenerationState::Idle);

    let mut steps = Vec::new();
    while let Ok(event) = rx.try_recv() {
        steps.push(event.step);
    }
    assert_eq!(steps, vec![1, 2, 3, 4]);
    println!("✅ Generated in {:?}", output.elapsed);
}

#[tokio::test]
async fn test_generate_video() {
    let (_engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let output = service
        .generate_video(&request(&sd), &GenerationContext::new())
        .await
        .unwrap();

    let video = output.media.as_video().unwrap();
    assert_eq!(video.len(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let (sink, mut rx) = ProgressSink::channel();
    let ctx = GenerationContext::new().with_progress(sink);
    ctx.cancel();
    let result = service.generate_image(&request(&sd), &ctx).await;

    assert!(matches!(result, Err(DiffusionError::Cancelled)));
    assert_eq!(ctx.state(), GenerationState::Cancelled);
    assert_eq!(engine.calls.generation_count(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_engine_failure_surfaces() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();
    engine.calls.fail_generations(true);

    let ctx = GenerationContext::new();
    let result = service.generate_image(&request(&sd), &ctx).await;

    assert!(matches!(result, Err(DiffusionError::Engine(_))));
    assert_eq!(ctx.state(), GenerationState::Failed);
}

// ---- Feature extractor ----

#[tokio::test]
async fn test_feature_extractor_preprocesses_control() {
    println!("\n🧪 Testing feature extractor...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    let annotator = extractor("canny-annotator", MemoryMode::Maximum);
    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();

    let request = control_request(&sd, &canny).with_feature_extractor(annotator.clone());
    service.generate_image(&request, &GenerationContext::new()).await.unwrap();
    service.generate_image(&request, &GenerationContext::new()).await.unwrap();

    assert_eq!(engine.calls.extractor_runs().len(), 2);
    assert_eq!(engine.calls.loaded("canny-annotator"), 1);
    assert_eq!(service.active_feature_extractor().await, Some(annotator.key()));

    assert!(service.unload_feature_extractor().await);
    assert_eq!(service.active_feature_extractor().await, None);
    println!("✅ Extractor loaded once and reused");
}

#[tokio::test]
async fn test_unload_control_net_releases_feature_extractor() {
    println!("\n🧪 Testing ControlNet unload with active extractor...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    let annotator = extractor("canny-annotator", MemoryMode::Maximum);
    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();

    let request = control_request(&sd, &canny).with_feature_extractor(annotator.clone());
    service.generate_image(&request, &GenerationContext::new()).await.unwrap();
    assert_eq!(service.active_feature_extractor().await, Some(annotator.key()));

    assert!(service.unload_control_net(&canny.key()).await.unwrap());
    assert_eq!(service.active_feature_extractor().await, None);
    assert_eq!(engine.calls.unloaded("canny-annotator"), 1);
    assert!(service.is_model_loaded(&sd.key()));
    println!("✅ Extractor released with the ControlNet");
}

#[tokio::test]
async fn test_unload_absent_model_releases_feature_extractor() {
    let (_engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    let annotator = extractor("canny-annotator", MemoryMode::Maximum);
    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();

    let request = control_request(&sd, &canny).with_feature_extractor(annotator);
    service.generate_image(&request, &GenerationContext::new()).await.unwrap();

    let ghost = base("ghost", PipelineFamily::StableDiffusion);
    assert!(!service.unload_model(&ghost.key()).await.unwrap());
    assert_eq!(service.active_feature_extractor().await, None);
    assert!(service.is_control_net_loaded(&canny.key()));
}

#[tokio::test]
async fn test_feature_extractor_minimum_memory() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    let canny = control_net("sd-canny", PipelineFamily::StableDiffusion);
    let annotator = extractor("depth-annotator", MemoryMode::Minimum);
    service.load_model(&sd).await.unwrap();
    service.load_control_net(&canny).await.unwrap();

    let request = control_request(&sd, &canny).with_feature_extractor(annotator);
    service.generate_image(&request, &GenerationContext::new()).await.unwrap();

    assert_eq!(engine.calls.extractor_runs(), vec!["depth-annotator".to_string()]);
    assert_eq!(engine.calls.unloaded("depth-annotator"), 1);
    assert_eq!(service.active_feature_extractor().await, None);
}

// ---- Batch ----

#[tokio::test]
async fn test_batch_yields_every_item() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let ctx = GenerationContext::new();
    let outputs: Vec<_> = service
        .generate_batch(MediaKind::Image, request(&sd), BatchOptions::seeds(3), &ctx)
        .collect()
        .await;

    assert_eq!(outputs.len(), 3);
    assert!(outputs.iter().all(|o| o.is_ok()));
    assert_eq!(engine.calls.generation_count(), 3);
    assert_eq!(ctx.state(), GenerationState::Idle);
}

#[tokio::test]
async fn test_batch_cancelled_after_second_item() {
    println!("\n🧪 Testing batch cancellation...");
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let ctx = GenerationContext::new();
    let mut stream = service.generate_batch(MediaKind::Image, request(&sd), BatchOptions::seeds(5), &ctx);

    let mut results = Vec::new();
    while let Some(item) = stream.next().await {
        results.push(item);
        if results.len() == 2 {
            ctx.cancel();
        }
    }
    drop(stream);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(engine.calls.generation_count(), 2);
    assert_eq!(ctx.state(), GenerationState::Cancelled);
    println!("✅ Batch stopped after 2 of 5 items");
}

#[tokio::test]
async fn test_batch_failure_ends_stream() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();
    engine.calls.fail_generations(true);

    let ctx = GenerationContext::new();
    let outputs: Vec<_> = service
        .generate_batch(MediaKind::Image, request(&sd), BatchOptions::seeds(4), &ctx)
        .collect()
        .await;

    assert_eq!(outputs.len(), 1);
    assert!(matches!(outputs[0], Err(DiffusionError::Engine(_))));
    assert_eq!(engine.calls.generation_count(), 1);
    assert_eq!(ctx.state(), GenerationState::Failed);
}

#[tokio::test]
async fn test_batch_without_pipeline() {
    let (_engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);

    let ctx = GenerationContext::new();
    let outputs: Vec<_> = service
        .generate_batch(MediaKind::Image, request(&sd), BatchOptions::seeds(2), &ctx)
        .collect()
        .await;

    assert_eq!(outputs.len(), 1);
    assert!(matches!(outputs[0], Err(DiffusionError::PipelineNotLoaded(_))));
}

#[tokio::test]
async fn test_oversized_batch_fails_without_generating() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let ctx = GenerationContext::new();
    let sweep = BatchOptions::sweep(BatchOptionType::Guidance, 0.0, f32::MAX, 1e-30);
    let outputs: Vec<_> = service
        .generate_batch(MediaKind::Image, request(&sd), sweep, &ctx)
        .collect()
        .await;

    assert_eq!(outputs.len(), 1);
    assert!(matches!(
        outputs[0],
        Err(DiffusionError::Engine(easel_engine::EngineError::InvalidInput(_)))
    ));
    assert_eq!(engine.calls.generation_count(), 0);
    assert_eq!(ctx.state(), GenerationState::Failed);
}

// ---- Realtime ----

#[tokio::test]
async fn test_realtime_respects_refresh_rate() {
    println!("\n🧪 Testing realtime refresh rate...");
    let (engine, service) = service_with(Settings {
        realtime_refresh_rate_ms: 100,
        ..Default::default()
    });
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let session = Arc::new(RealtimeSession::new(request(&sd)));
    let ctx = GenerationContext::new();
    let mut stream = service.generate_realtime(MediaKind::Image, session.clone(), &ctx);

    for frame in 0..3 {
        let output = stream.next().await.unwrap();
        assert!(output.is_ok());
        session.update_prompt(|p| p.prompt = format!("a lighthouse, frame {}", frame + 1));
    }
    ctx.cancel();
    assert!(stream.next().await.is_none());
    drop(stream);

    let times = engine.calls.generation_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= Duration::from_millis(95), "frames only {:?} apart", gap);
    }
    assert_eq!(ctx.state(), GenerationState::Cancelled);
    println!("✅ Frames spaced by the refresh period");
}

#[tokio::test]
async fn test_realtime_skips_unchanged_session() {
    let (engine, service) = service_with(Settings {
        realtime_refresh_rate_ms: 50,
        ..Default::default()
    });
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let session = Arc::new(RealtimeSession::new(GenerationRequest::new(
        sd.clone(),
        PromptOptions::new("a lighthouse on a cliff"),
        SchedulerOptions::default().with_seed(42),
    )));
    let ctx = GenerationContext::new();
    let mut stream = service.generate_realtime(MediaKind::Image, session, &ctx);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.scheduler.seed, 42);

    let idle = tokio::time::timeout(Duration::from_millis(300), stream.next()).await;
    assert!(idle.is_err(), "nothing changed, nothing should be generated");
    assert_eq!(engine.calls.generation_count(), 1);
}

#[tokio::test]
async fn test_realtime_random_seed_is_stable() {
    let (engine, service) = service_with(Settings {
        realtime_refresh_rate_ms: 10,
        ..Default::default()
    });
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let session = Arc::new(RealtimeSession::new(request(&sd)));
    let ctx = GenerationContext::new();
    let mut stream = service.generate_realtime(MediaKind::Image, session.clone(), &ctx);

    stream.next().await.unwrap().unwrap();
    session.update_scheduler(|s| s.guidance_scale = 5.0);
    stream.next().await.unwrap().unwrap();

    let seeds = engine.calls.generation_seeds();
    assert_eq!(seeds.len(), 2);
    assert_ne!(seeds[0], 0);
    assert_eq!(seeds[0], seeds[1]);
}

#[tokio::test]
async fn test_realtime_failure_continues() {
    let (engine, service) = service_with(Settings {
        realtime_refresh_rate_ms: 10,
        ..Default::default()
    });
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();
    engine.calls.fail_generations(true);

    let session = Arc::new(RealtimeSession::new(request(&sd)));
    let ctx = GenerationContext::new();
    let mut stream = service.generate_realtime(MediaKind::Image, session.clone(), &ctx);

    assert!(matches!(stream.next().await, Some(Err(DiffusionError::Engine(_)))));

    engine.calls.fail_generations(false);
    session.update_prompt(|p| p.prompt = "a lighthouse at night".to_string());
    assert!(matches!(stream.next().await, Some(Ok(_))));
}

// ---- Mode dispatch ----

#[tokio::test]
async fn test_generate_dispatches_modes() {
    let (engine, service) = service();
    let sd = base("sd-base", PipelineFamily::StableDiffusion);
    service.load_model(&sd).await.unwrap();

    let ctx = GenerationContext::new();
    let single: Vec<_> = service
        .generate(MediaKind::Image, ExecutionMode::Single(request(&sd)), &ctx)
        .collect()
        .await;
    assert_eq!(single.len(), 1);

    let ctx = GenerationContext::new();
    let batch: Vec<_> = service
        .generate(
            MediaKind::Video,
            ExecutionMode::Batch(request(&sd), BatchOptions::seeds(2)),
            &ctx,
        )
        .collect()
        .await;
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|o| matches!(o, Ok(out) if out.media.kind() == MediaKind::Video)));
    assert_eq!(engine.calls.generation_count(), 3);
}

// ---- Upscale ----

#[tokio::test]
async fn test_upscale() {
    let (_engine, service) = service();
    let x2 = upscaler("upscale-2x", 2);
    let image = ImageTensor::zeros(3, 8, 8);

    let missing = service.upscale(&x2, &image, &GenerationContext::new()).await;
    assert!(matches!(missing, Err(DiffusionError::UpscalerNotLoaded(_))));

    service.load_upscaler(&x2).await.unwrap();
    assert!(service.is_upscaler_loaded(&x2.key()));
    let output = service.upscale(&x2, &image, &GenerationContext::new()).await.unwrap();

    assert_eq!(output.scale_factor, 2);
    assert_eq!((output.image.height(), output.image.width()), (16, 16));
}

// ---- End to end ----

#[tokio::test]
async fn test_registry_to_generation() -> anyhow::Result<()> {
    println!("\n🧪 Testing registry → load → generate → unload...");
    let dir = tempfile::tempdir()?;
    for component in [
        "unet",
        "tokenizer",
        "tokenizer_2",
        "text_encoder",
        "text_encoder_2",
        "vae_decoder",
        "vae_encoder",
    ] {
        std::fs::create_dir_all(dir.path().join(component))?;
        std::fs::write(dir.path().join(component).join("model.onnx"), b"stub")?;
    }

    let settings = Settings::default();
    let registry = easel_model_registry::ModelRegistry::new(&settings);
    let descriptor = registry.create_from_template_name("sdxl-base", dir.path(), "SDXL")?;

    let (_engine, service) = service_with(settings);
    service.load_model(&descriptor).await?;

    let request = GenerationRequest::new(
        descriptor.clone(),
        PromptOptions::new("a lighthouse on a cliff"),
        SchedulerOptions::default().with_size(1024, 1024).with_steps(2),
    );
    let output = service.generate_image(&request, &GenerationContext::new()).await?;
    assert!(output.elapsed > Duration::ZERO);

    assert!(service.unload_model(&descriptor.key()).await?);
    let result = service.generate_image(&request, &GenerationContext::new()).await;
    assert!(matches!(result, Err(DiffusionError::PipelineNotLoaded(_))));
    println!("✅ Full lifecycle completed");
    Ok(())
}
