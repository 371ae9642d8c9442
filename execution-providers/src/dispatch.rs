use crate::providers::*;
use crate::{DynExecutionProvider, ProviderError, Result};
use common::{ExecutionProviderKind, ExecutionSettings};
use tracing::{debug, warn};

/// Providers in priority order. The engine tries them front to back.
#[derive(Debug, Clone)]
pub struct ProviderDispatch {
    providers: Vec<DynExecutionProvider>,
}

impl ProviderDispatch {
    pub fn new(providers: Vec<DynExecutionProvider>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[DynExecutionProvider] {
        &self.providers
    }

    pub fn primary(&self) -> Option<&DynExecutionProvider> {
        self.providers.first()
    }

    pub fn available(&self) -> Vec<DynExecutionProvider> {
        self.providers
            .iter()
            .filter(|p| p.is_available().unwrap_or(false))
            .cloned()
            .collect()
    }

    /// First provider that can actually run here.
    pub fn select(&self) -> Result<DynExecutionProvider> {
        for provider in &self.providers {
            match provider.is_available() {
                Ok(true) => return Ok(provider.clone()),
                Ok(false) => debug!("{} unavailable, trying next provider", provider.name()),
                Err(e) => warn!("Availability check for {} failed: {}", provider.name(), e),
            }
        }
        let tried: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        Err(ProviderError::NotAvailable(tried.join(", ")))
    }
}

pub fn provider_for(kind: ExecutionProviderKind, settings: &ExecutionSettings) -> DynExecutionProvider {
    match kind {
        ExecutionProviderKind::Cpu => CpuProvider::from_settings(settings).build(),
        ExecutionProviderKind::Cuda => CudaProvider::from_settings(settings).build(),
        ExecutionProviderKind::TensorRT => TensorRtProvider::from_settings(settings).build(),
        ExecutionProviderKind::DirectML => DirectMlProvider::from_settings(settings).build(),
        ExecutionProviderKind::CoreML => CoreMlProvider::from_settings(settings).build(),
        ExecutionProviderKind::OpenVino => OpenVinoProvider::from_settings(settings).build(),
    }
}

/// The configured provider first, CPU last.
pub fn dispatch_for(settings: &ExecutionSettings) -> ProviderDispatch {
    let mut providers = vec![provider_for(settings.provider, settings)];
    if settings.provider != ExecutionProviderKind::Cpu {
        providers.push(provider_for(ExecutionProviderKind::Cpu, settings));
    }
    ProviderDispatch::new(providers)
}

/// The accelerated provider this platform is expected to have
pub fn platform_default() -> ExecutionProviderKind {
    if cfg!(target_os = "windows") {
        ExecutionProviderKind::DirectML
    } else if cfg!(target_os = "macos") {
        ExecutionProviderKind::CoreML
    } else {
        ExecutionProviderKind::Cpu
    }
}

/// `kind` when it can run on this platform, otherwise [`platform_default`].
pub fn resolve_supported(kind: ExecutionProviderKind) -> ExecutionProviderKind {
    if provider_for(kind, &ExecutionSettings::default()).supported_by_platform() {
        return kind;
    }

    let fallback = platform_default();
    warn!(
        "Execution provider {} is not supported on this platform, falling back to {}",
        kind, fallback
    );
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_appends_cpu_once() {
        let cpu_only = dispatch_for(&ExecutionSettings::default());
        assert_eq!(cpu_only.providers().len(), 1);

        let cuda = dispatch_for(&ExecutionSettings {
            provider: ExecutionProviderKind::Cuda,
            ..Default::default()
        });
        let kinds: Vec<_> = cuda.providers().iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, vec![ExecutionProviderKind::Cuda, ExecutionProviderKind::Cpu]);
    }

    #[test]
    fn test_select_falls_back_to_cpu() {
        let dispatch = dispatch_for(&ExecutionSettings {
            provider: ExecutionProviderKind::OpenVino,
            ..Default::default()
        });
        let selected = dispatch.select().unwrap();
        assert!(selected.is_available().unwrap());
    }

    #[test]
    fn test_empty_dispatch_has_nothing_to_select() {
        let dispatch = ProviderDispatch::new(Vec::new());
        assert!(matches!(dispatch.select(), Err(ProviderError::NotAvailable(_))));
    }
}
