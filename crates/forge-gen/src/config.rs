//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `FORGE_{PROVIDER}_API_KEY`
//! 2. Project-local: `.forge/config.toml`
//! 3. Global: `~/.forge/config.toml`

use crate::provider::{FileFormat, MeshQuality};
use forge_core::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Model name override for providers that host several models
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_text_provider")]
    pub text_provider: String,
    #[serde(default = "default_image_provider")]
    pub image_provider: String,
    #[serde(default = "default_model_provider")]
    pub model_provider: String,
    #[serde(default)]
    pub mesh_quality: MeshQuality,
    #[serde(default)]
    pub file_format: FileFormat,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_association_count")]
    pub association_count: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            text_provider: default_text_provider(),
            image_provider: default_image_provider(),
            model_provider: default_model_provider(),
            mesh_quality: MeshQuality::default(),
            file_format: FileFormat::default(),
            max_parallel: default_max_parallel(),
            association_count: default_association_count(),
        }
    }
}

fn default_text_provider() -> String {
    "deepseek".to_string()
}
fn default_image_provider() -> String {
    "gemini".to_string()
}
fn default_model_provider() -> String {
    "ark".to_string()
}
fn default_max_parallel() -> usize {
    3
}
fn default_association_count() -> usize {
    10
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgeConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    /// Absent when a layer doesn't touch generation defaults
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct ForgeConfig {
    pub providers: HashMap<String, ProviderSettings>,
    pub generation: GenerationConfig,
}

impl ForgeConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = ForgeConfigFile::default();

        // Layer 1: Global config (~/.forge/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        // Layer 2: Project-local config (.forge/config.toml)
        let local_path = PathBuf::from(".forge/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        // Layer 3: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(ForgeConfig {
            providers: config.providers,
            generation: config.generation.unwrap_or_default(),
        })
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(ForgeConfig {
            providers: config.providers,
            generation: config.generation.unwrap_or_default(),
        })
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_id: &str) -> Option<&str> {
        self.providers
            .get(provider_id)
            .and_then(|p| p.api_key.as_deref())
    }

    /// Get API URL for a provider (or its default)
    pub fn api_url(&self, provider_id: &str) -> Option<&str> {
        self.providers
            .get(provider_id)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Get configured model name for a provider
    pub fn model(&self, provider_id: &str) -> Option<&str> {
        self.providers
            .get(provider_id)
            .and_then(|p| p.model.as_deref())
    }

    /// Check if a provider is enabled
    pub fn is_enabled(&self, provider_id: &str) -> bool {
        self.providers
            .get(provider_id)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".forge").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<ForgeConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: ForgeConfigFile = toml::from_str(&content).map_err(|e| {
            ForgeError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut ForgeConfigFile, overlay: ForgeConfigFile) {
        for (id, provider) in overlay.providers {
            let entry = base.providers.entry(id).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            if provider.model.is_some() {
                entry.model = provider.model;
            }
            entry.enabled = provider.enabled;
        }

        if overlay.generation.is_some() {
            base.generation = overlay.generation;
        }
    }

    fn apply_env_overrides(config: &mut ForgeConfigFile) {
        let provider_ids = ["deepseek", "gemini", "ark"];
        for id in &provider_ids {
            let env_key = format!("FORGE_{}_API_KEY", id.to_uppercase());
            if let Ok(key) = std::env::var(&env_key) {
                let entry = config.providers.entry(id.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("forge_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_file() {
        std::env::remove_var("FORGE_DEEPSEEK_API_KEY");

        let config_str = r#"
[providers.deepseek]
api_key = "test-key-123"
api_url = "https://api.example.com/v1"
enabled = true

[providers.ark]
api_key = "ark_test"
enabled = false

[generation]
text_provider = "deepseek"
mesh_quality = "high"
max_parallel = 5
"#;
        let path = temp_config(config_str);
        let config = ForgeConfig::load_from_file(&path).unwrap();

        assert!(config.is_enabled("deepseek"));
        assert!(!config.is_enabled("ark"));
        assert_eq!(config.api_key("deepseek"), Some("test-key-123"));
        assert_eq!(config.api_url("deepseek"), Some("https://api.example.com/v1"));
        assert_eq!(config.generation.mesh_quality, MeshQuality::High);
        assert_eq!(config.generation.max_parallel, 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.generation.image_provider, "gemini");
        assert_eq!(config.generation.association_count, 10);

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_var_override() {
        let config_str = r#"
[providers.gemini]
api_key = "file-key"
"#;
        let path = temp_config(config_str);

        std::env::set_var("FORGE_GEMINI_API_KEY", "env-key-override");

        let config = ForgeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.api_key("gemini"), Some("env-key-override"));

        std::env::remove_var("FORGE_GEMINI_API_KEY");
        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.generation.text_provider, "deepseek");
        assert_eq!(config.generation.image_provider, "gemini");
        assert_eq!(config.generation.model_provider, "ark");
        assert_eq!(config.generation.max_parallel, 3);
        assert_eq!(config.generation.mesh_quality, MeshQuality::Medium);
        assert_eq!(config.generation.file_format, FileFormat::Glb);
    }

    #[test]
    fn test_missing_provider_returns_none() {
        let config = ForgeConfig::default();
        assert_eq!(config.api_key("nonexistent"), None);
        assert!(config.is_enabled("nonexistent")); // defaults to true
    }
}
