//! Easel Execution Providers
//!
//! Hardware backends a diffusion model can be initialised on. Every model
//! descriptor carries [`ExecutionSettings`](common::ExecutionSettings); this crate turns them into a
//! prioritised [`ProviderDispatch`] with the [`SessionOptions`] the native
//! engine consumes, and falls back to a supported provider when the
//! configured one cannot run on this platform.
//!
//! # Examples
//!
//! ```rust
//! use common::{ExecutionProviderKind, ExecutionSettings, MemoryMode};
//! use easel_execution_providers::{dispatch_for, options::DEVICE_ID};
//!
//! let settings = ExecutionSettings {
//!     provider: ExecutionProviderKind::Cuda,
//!     device_id: 1,
//!     memory_mode: MemoryMode::Minimum,
//!     ..Default::default()
//! };
//!
//! let dispatch = dispatch_for(&settings);
//! let primary = dispatch.primary().unwrap();
//! assert_eq!(primary.name(), "CUDAExecutionProvider");
//! assert_eq!(primary.options().get(DEVICE_ID), Some("1"));
//! assert_eq!(dispatch.providers().len(), 2); // CPU fallback
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use common::ExecutionProviderKind;

pub mod dispatch;
pub mod error;
pub mod options;
pub mod providers;

pub use dispatch::{dispatch_for, platform_default, provider_for, resolve_supported, ProviderDispatch};
pub use error::{ProviderError, Result};
pub use options::SessionOptions;
pub use providers::{CoreMlProvider, CpuProvider, CudaProvider, DirectMlProvider, OpenVinoProvider, TensorRtProvider};

/// A backend the native engine can place a session on.
///
/// Describes the backend without binding to any engine; the engine maps
/// `name()` and `options()` onto its own session builder.
pub trait ExecutionProvider: Send + Sync + Debug {
    /// Engine-facing name, e.g. "CUDAExecutionProvider"
    fn name(&self) -> &'static str;

    fn kind(&self) -> ExecutionProviderKind;

    /// Compile-time check
    fn supported_by_platform(&self) -> bool;

    fn options(&self) -> &SessionOptions;

    /// Runtime check for the backend's libraries
    fn is_available(&self) -> Result<bool>;
}

pub type DynExecutionProvider = Arc<dyn ExecutionProvider>;
