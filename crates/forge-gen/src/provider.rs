//! Generation provider trait and request option types

use forge_core::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A generation capability a provider may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Text,
    Image,
    Model,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Text => write!(f, "text"),
            Capability::Image => write!(f, "image"),
            Capability::Model => write!(f, "model"),
        }
    }
}

/// Mesh face-count tier for 3D generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshQuality {
    /// ~10k faces, distant props and bulk generation
    Low,
    /// ~30k faces, standard display
    Medium,
    /// ~50k faces, close-up hero assets
    High,
}

impl Default for MeshQuality {
    fn default() -> Self {
        MeshQuality::Medium
    }
}

impl fmt::Display for MeshQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshQuality::Low => write!(f, "low"),
            MeshQuality::Medium => write!(f, "medium"),
            MeshQuality::High => write!(f, "high"),
        }
    }
}

impl FromStr for MeshQuality {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(MeshQuality::Low),
            "medium" => Ok(MeshQuality::Medium),
            "high" => Ok(MeshQuality::High),
            other => Err(ForgeError::InvalidArgument(format!(
                "Unknown mesh quality '{}'. Expected: low, medium, high",
                other
            ))),
        }
    }
}

/// Output file format for generated models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Glb,
    Obj,
    Fbx,
}

impl Default for FileFormat {
    fn default() -> Self {
        FileFormat::Glb
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Glb => write!(f, "glb"),
            FileFormat::Obj => write!(f, "obj"),
            FileFormat::Fbx => write!(f, "fbx"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "glb" => Ok(FileFormat::Glb),
            "obj" => Ok(FileFormat::Obj),
            "fbx" => Ok(FileFormat::Fbx),
            other => Err(ForgeError::InvalidArgument(format!(
                "Unknown file format '{}'. Expected: glb, obj, fbx",
                other
            ))),
        }
    }
}

/// Options for a text-generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextOptions {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Model name override; provider default when unset
    #[serde(default)]
    pub model: Option<String>,
}

/// Options for an image-generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageOptions {
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Options for a 3D-model generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub quality: MeshQuality,
    #[serde(default)]
    pub format: FileFormat,
}

/// Trait implemented by each generation provider (DeepSeek, Gemini, Ark, Mock).
///
/// A provider exposes the subset of capabilities it supports; calls outside
/// that subset fall through to the default bodies and fail with
/// `UnsupportedCapability` rather than silently doing nothing. Adapters hold
/// no per-call mutable state and are shared across concurrently running jobs.
///
/// Every method may block on remote I/O for a long time and may fail with a
/// classified `Provider` error. Retrying is the caller's decision; this layer
/// performs exactly one attempt per call.
pub trait Provider: Send + Sync + fmt::Debug {
    /// Provider identifier (e.g. "deepseek", "gemini", "ark", "mock")
    fn id(&self) -> &str;

    /// Capabilities this provider offers
    fn capabilities(&self) -> &[Capability];

    /// Generate free-form text from a prompt
    fn generate_text(&self, _prompt: &str, _options: &TextOptions) -> Result<String> {
        Err(self.unsupported(Capability::Text))
    }

    /// Generate an image from a prompt, returning a reference to it
    /// (a file path, URL, or data URL)
    fn generate_image(&self, _prompt: &str, _options: &ImageOptions) -> Result<String> {
        Err(self.unsupported(Capability::Image))
    }

    /// Generate a 3D model from an image reference, returning a reference
    /// to the produced model file
    fn generate_model(&self, _image_ref: &str, _options: &ModelOptions) -> Result<String> {
        Err(self.unsupported(Capability::Model))
    }

    /// Whether this provider offers the given capability
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    #[doc(hidden)]
    fn unsupported(&self, capability: Capability) -> ForgeError {
        ForgeError::UnsupportedCapability {
            provider: self.id().to_string(),
            capability: capability.to_string(),
        }
    }
}
