//! Provider registry
//!
//! Maps provider identifiers to concrete adapters. Adapters are constructed
//! lazily on first resolution, so a missing credential surfaces as an auth
//! `Provider` error at that point rather than at process start, and cached
//! as shared trait objects for concurrent use by many jobs.

pub mod ark;
pub mod deepseek;
pub mod gemini;
pub mod mock;

use crate::config::ForgeConfig;
use crate::provider::{Capability, Provider};
use forge_core::{ForgeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Create a provider by identifier with configuration
pub fn create_provider(id: &str, config: &ForgeConfig) -> Result<Arc<dyn Provider>> {
    match id {
        "mock" => Ok(Arc::new(mock::MockProvider::new())),
        "deepseek" => Ok(Arc::new(deepseek::DeepSeekProvider::from_config(config)?)),
        "gemini" => Ok(Arc::new(gemini::GeminiProvider::from_config(config)?)),
        "ark" => Ok(Arc::new(ark::ArkProvider::from_config(config)?)),
        _ => Err(ForgeError::ProviderNotFound(format!(
            "Unknown provider '{}'. Available: mock, deepseek, gemini, ark",
            id
        ))),
    }
}

/// List all registered provider identifiers
pub fn available_providers() -> Vec<&'static str> {
    vec!["mock", "deepseek", "gemini", "ark"]
}

/// Lazily constructing, capability-checking provider resolver
pub struct ProviderRegistry {
    config: ForgeConfig,
    cache: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new(config: ForgeConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an adapter by identifier, requiring the given capability.
    ///
    /// Unknown identifiers are `ProviderNotFound`; known identifiers that
    /// lack the capability are `UnsupportedCapability`; construction
    /// failures (typically missing credentials) are classified `Provider`
    /// errors and are not cached, so a later call after configuration is
    /// fixed can succeed.
    pub fn resolve(&self, id: &str, capability: Capability) -> Result<Arc<dyn Provider>> {
        let cached = {
            let cache = self.cache.read().expect("provider cache lock poisoned");
            cache.get(id).cloned()
        };

        let provider = match cached {
            Some(p) => p,
            None => {
                let provider = create_provider(id, &self.config)?;
                let mut cache = self.cache.write().expect("provider cache lock poisoned");
                cache.entry(id.to_string()).or_insert(provider).clone()
            }
        };

        if !provider.supports(capability) {
            return Err(ForgeError::UnsupportedCapability {
                provider: id.to_string(),
                capability: capability.to_string(),
            });
        }

        Ok(provider)
    }

    /// Register a pre-built adapter under its own id, replacing any cached
    /// instance. Lets callers plug in stub providers without a factory entry.
    pub fn register(&self, provider: Arc<dyn Provider>) {
        let mut cache = self.cache.write().expect("provider cache lock poisoned");
        cache.insert(provider.id().to_string(), provider);
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }
}

/// Build a ureq agent with a global transport timeout.
///
/// This timeout bounds a single HTTP round trip, not a remote generation
/// task; long-running work is polled across many requests.
pub(crate) fn build_agent(timeout_secs: u64) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(timeout_secs)))
        .build();
    config.into()
}

/// Classify a transport-level failure into the provider error taxonomy.
///
/// One classification, no retry: 401/403 are auth, 429 is rate limiting,
/// 400/422 are payload rejections, 5xx and connection-level failures are
/// transient, anything else is unknown.
pub(crate) fn classify_http_error(provider: &str, err: &ureq::Error) -> ForgeError {
    use forge_core::ProviderErrorKind;

    let kind = match err {
        ureq::Error::StatusCode(code) => match code {
            401 | 403 => ProviderErrorKind::Auth,
            429 => ProviderErrorKind::RateLimit,
            400 | 422 => ProviderErrorKind::InvalidInputRejected,
            code if (500..=599).contains(code) => ProviderErrorKind::TransientNetwork,
            _ => ProviderErrorKind::Unknown,
        },
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => ProviderErrorKind::TransientNetwork,
        _ => ProviderErrorKind::Unknown,
    };

    ForgeError::provider(kind, format!("{} request failed: {}", provider, err))
}

/// Error for a response body that could not be read as JSON
pub(crate) fn malformed_response(provider: &str, err: impl std::fmt::Display) -> ForgeError {
    ForgeError::GenerationFailed(format!("Failed to parse {} response: {}", provider, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TextOptions;

    #[test]
    fn test_unknown_provider_is_not_found() {
        let err = create_provider("nonexistent", &ForgeConfig::default()).unwrap_err();
        assert!(matches!(err, ForgeError::ProviderNotFound(_)));
    }

    #[test]
    fn test_mock_needs_no_config() {
        let provider = create_provider("mock", &ForgeConfig::default()).unwrap();
        assert_eq!(provider.id(), "mock");
    }

    #[test]
    fn test_missing_api_key_is_auth_error() {
        let err = create_provider("deepseek", &ForgeConfig::default()).unwrap_err();
        match err {
            ForgeError::Provider { kind, .. } => {
                assert_eq!(kind, forge_core::ProviderErrorKind::Auth)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_registry_capability_check() {
        let registry = ProviderRegistry::new(ForgeConfig::default());
        // mock supports everything
        assert!(registry.resolve("mock", Capability::Text).is_ok());
        assert!(registry.resolve("mock", Capability::Model).is_ok());
    }

    #[test]
    fn test_registry_caches_instances() {
        let registry = ProviderRegistry::new(ForgeConfig::default());
        let a = registry.resolve("mock", Capability::Text).unwrap();
        let b = registry.resolve("mock", Capability::Image).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registry_register_stub() {
        #[derive(Debug)]
        struct Stub;
        impl Provider for Stub {
            fn id(&self) -> &str {
                "stub"
            }
            fn capabilities(&self) -> &[Capability] {
                &[Capability::Text]
            }
            fn generate_text(&self, _p: &str, _o: &TextOptions) -> Result<String> {
                Ok("stubbed".to_string())
            }
        }

        let registry = ProviderRegistry::new(ForgeConfig::default());
        registry.register(Arc::new(Stub));
        let provider = registry.resolve("stub", Capability::Text).unwrap();
        assert_eq!(
            provider
                .generate_text("x", &TextOptions::default())
                .unwrap(),
            "stubbed"
        );
        // but not for a capability the stub lacks
        let err = registry.resolve("stub", Capability::Model).unwrap_err();
        assert!(matches!(err, ForgeError::UnsupportedCapability { .. }));
    }
}
