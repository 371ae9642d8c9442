//! Session options handed to the native engine alongside a provider.

use common::{ExecutionSettings, MemoryMode, SessionExecutionMode};
use std::collections::BTreeMap;

// Session-wide keys
pub const INTER_OP_NUM_THREADS: &str = "inter_op_num_threads";
pub const INTRA_OP_NUM_THREADS: &str = "intra_op_num_threads";
pub const EXECUTION_MODE: &str = "execution_mode";
pub const ENABLE_MEM_PATTERN: &str = "enable_mem_pattern";

// Provider keys
pub const DEVICE_ID: &str = "device_id";
pub const ARENA_EXTEND_STRATEGY: &str = "arena_extend_strategy";
pub const ENABLE_CPU_MEM_ARENA: &str = "enable_cpu_mem_arena";
pub const CUDNN_CONV_ALGO_SEARCH: &str = "cudnn_conv_algo_search";
pub const TRT_FP16_ENABLE: &str = "trt_fp16_enable";
pub const TRT_ENGINE_CACHE_ENABLE: &str = "trt_engine_cache_enable";
pub const ENABLE_METACOMMANDS: &str = "enable_metacommands";
pub const COREML_COMPUTE_UNITS: &str = "compute_units";
pub const OPENVINO_DEVICE_TYPE: &str = "device_type";

/// Flat string options, ordered so logs and tests are stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    options: BTreeMap<String, String>,
}

impl SessionOptions {
    /// Options every provider shares, derived from a model's execution settings.
    ///
    /// Zero thread counts are left unset so the engine picks its own.
    /// [`MemoryMode::Minimum`] trades speed for a smaller footprint: no
    /// memory pattern planning and arenas that grow only as requested.
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        let mut options = Self::default();
        if settings.inter_op_threads > 0 {
            options.set(INTER_OP_NUM_THREADS, settings.inter_op_threads);
        }
        if settings.intra_op_threads > 0 {
            options.set(INTRA_OP_NUM_THREADS, settings.intra_op_threads);
        }
        let mode = match settings.execution_mode {
            SessionExecutionMode::Sequential => "sequential",
            SessionExecutionMode::Parallel => "parallel",
        };
        options.set(EXECUTION_MODE, mode);

        if settings.memory_mode == MemoryMode::Minimum {
            options.set(ENABLE_MEM_PATTERN, false);
            options.set(ARENA_EXTEND_STRATEGY, "kSameAsRequested");
        }
        options
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.options.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
