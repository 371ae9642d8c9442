//! The execution providers a diffusion model can run on.

use crate::options::*;
use crate::{DynExecutionProvider, ExecutionProvider, Result};
use common::{ExecutionProviderKind, ExecutionSettings, MemoryMode};
use std::sync::Arc;

macro_rules! define_provider {
    ($(#[$meta:meta])* $provider:ident, $label:literal, $kind:expr, supported: $supported:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $provider {
            options: SessionOptions,
        }

        impl $provider {
            pub fn with_options(options: SessionOptions) -> Self {
                Self { options }
            }

            pub fn build(self) -> DynExecutionProvider {
                Arc::new(self)
            }
        }

        impl ExecutionProvider for $provider {
            fn name(&self) -> &'static str {
                $label
            }

            fn kind(&self) -> ExecutionProviderKind {
                $kind
            }

            fn supported_by_platform(&self) -> bool {
                $supported
            }

            fn options(&self) -> &SessionOptions {
                &self.options
            }

            fn is_available(&self) -> Result<bool> {
                Ok(self.supported_by_platform() && self.runtime_present())
            }
        }
    };
}

define_provider!(
    /// Always-available fallback
    CpuProvider,
    "CPUExecutionProvider",
    ExecutionProviderKind::Cpu,
    supported: true
);

define_provider!(
    CudaProvider,
    "CUDAExecutionProvider",
    ExecutionProviderKind::Cuda,
    supported: cfg!(any(target_os = "windows", target_os = "linux"))
);

define_provider!(
    /// Builds FP16 engines for the UNet and caches them next to the model
    TensorRtProvider,
    "TensorrtExecutionProvider",
    ExecutionProviderKind::TensorRT,
    supported: cfg!(any(target_os = "windows", target_os = "linux"))
);

define_provider!(
    DirectMlProvider,
    "DmlExecutionProvider",
    ExecutionProviderKind::DirectML,
    supported: cfg!(target_os = "windows")
);

define_provider!(
    CoreMlProvider,
    "CoreMLExecutionProvider",
    ExecutionProviderKind::CoreML,
    supported: cfg!(target_os = "macos")
);

define_provider!(
    OpenVinoProvider,
    "OpenVINOExecutionProvider",
    ExecutionProviderKind::OpenVino,
    supported: cfg!(any(target_os = "windows", target_os = "linux"))
);

impl CpuProvider {
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = SessionOptions::from_settings(settings);
        options.set(ENABLE_CPU_MEM_ARENA, settings.memory_mode != MemoryMode::Minimum);
        Self::with_options(options)
    }

    fn runtime_present(&self) -> bool {
        true
    }
}

impl CudaProvider {
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = SessionOptions::from_settings(settings);
        options.set(DEVICE_ID, settings.device_id);
        // Exhaustive search allocates large scratch buffers while benchmarking
        let search = match settings.memory_mode {
            MemoryMode::Maximum => "EXHAUSTIVE",
            MemoryMode::Minimum => "HEURISTIC",
        };
        options.set(CUDNN_CONV_ALGO_SEARCH, search);
        Self::with_options(options)
    }

    fn runtime_present(&self) -> bool {
        cuda_toolkit_present()
    }
}

impl TensorRtProvider {
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = SessionOptions::from_settings(settings);
        options.set(DEVICE_ID, settings.device_id);
        options.set(TRT_FP16_ENABLE, true);
        options.set(TRT_ENGINE_CACHE_ENABLE, true);
        Self::with_options(options)
    }

    fn runtime_present(&self) -> bool {
        cuda_toolkit_present()
    }
}

impl DirectMlProvider {
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = SessionOptions::from_settings(settings);
        options.set(DEVICE_ID, settings.device_id);
        options.set(ENABLE_METACOMMANDS, true);
        Self::with_options(options)
    }

    /// Ships with Windows 10 and later
    fn runtime_present(&self) -> bool {
        true
    }
}

impl CoreMlProvider {
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = SessionOptions::from_settings(settings);
        options.set(COREML_COMPUTE_UNITS, "ALL");
        Self::with_options(options)
    }

    fn runtime_present(&self) -> bool {
        true
    }
}

impl OpenVinoProvider {
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = SessionOptions::from_settings(settings);
        options.set(OPENVINO_DEVICE_TYPE, "AUTO");
        Self::with_options(options)
    }

    fn runtime_present(&self) -> bool {
        std::env::var_os("INTEL_OPENVINO_DIR").is_some()
    }
}

fn cuda_toolkit_present() -> bool {
    std::env::var_os("CUDA_PATH").is_some()
        || std::env::var_os("CUDA_HOME").is_some()
        || std::path::Path::new("/usr/local/cuda").exists()
}
