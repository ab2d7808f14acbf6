//! Error types for Forge

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed remote provider call.
///
/// The `Display` form is wire-stable: it is what status pollers see in a
/// failed job's error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderErrorKind {
    /// Missing or rejected credentials
    Auth,
    /// The remote service throttled the request
    RateLimit,
    /// Connection, timeout, or 5xx-class failure
    TransientNetwork,
    /// The remote service rejected the request payload
    InvalidInputRejected,
    Unknown,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::RateLimit => "rate-limit",
            ProviderErrorKind::TransientNetwork => "transient-network",
            ProviderErrorKind::InvalidInputRejected => "invalid-input-rejected",
            ProviderErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for Forge operations
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Provider '{provider}' does not support {capability} generation")]
    UnsupportedCapability { provider: String, capability: String },

    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Shorthand for a classified provider failure
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ForgeError::Provider {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for Forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;
