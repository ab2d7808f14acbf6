//! Forge Core - Foundational types for the Forge generation pipeline
//!
//! This crate provides the types that all other Forge crates depend on:
//! - `ForgeError` - The error enum shared across the pipeline
//! - `ProviderErrorKind` - Classification of remote provider failures
//! - `Result<T>` - Result alias

mod error;

pub use error::{ForgeError, ProviderErrorKind, Result};
