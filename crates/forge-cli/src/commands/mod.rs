//! CLI command implementations

pub mod associate;
pub mod batch;
pub mod generate;
pub mod providers;

use anyhow::Result;
use forge_gen::{ForgeConfig, MemoryStore, PipelineSettings, ProviderRegistry};
use std::sync::Arc;

/// Shared setup: load config, build the registry/store pair and the
/// pipeline settings (with optional provider overrides)
pub(crate) fn bootstrap(
    text_provider: Option<&str>,
    image_provider: Option<&str>,
    model_provider: Option<&str>,
) -> Result<(Arc<ProviderRegistry>, Arc<MemoryStore>, PipelineSettings)> {
    let config = ForgeConfig::load()?;
    let mut settings = PipelineSettings::from_config(&config);
    if let Some(id) = text_provider {
        settings.text_provider = id.to_string();
    }
    if let Some(id) = image_provider {
        settings.image_provider = id.to_string();
    }
    if let Some(id) = model_provider {
        settings.model_provider = id.to_string();
    }

    let registry = Arc::new(ProviderRegistry::new(config));
    let store = Arc::new(MemoryStore::new());
    Ok((registry, store, settings))
}
