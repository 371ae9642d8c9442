//! Model residency caches.
//!
//! - [`ResidencyCache`]: one instance per descriptor, Single/Multiple policy.
//!   Used for base pipelines, ControlNets and upscalers alike.
//! - [`FeatureExtractorSlot`]: at most one feature extractor, swapped on demand.
//!
//! Both construct handles through an engine-provided [`Constructor`].

pub mod error;
pub mod extractor;
pub mod residency;

pub use error::{CacheError, Result};
pub use extractor::FeatureExtractorSlot;
pub use residency::{Constructor, LoadOutcome, LoadedPipeline, ResidencyCache, ResidencyState};
