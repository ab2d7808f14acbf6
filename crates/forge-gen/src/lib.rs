//! Forge Gen - description-to-3D-model generation pipeline
//!
//! Provides a pluggable provider framework (DeepSeek, Gemini, Ark) behind a
//! capability-tagged trait, a three-stage pipeline orchestrator
//! (prompt -> image -> model), category association, and a bounded-parallel
//! batch runner with cooperative cancellation and live status aggregation.

pub mod association;
pub mod batch;
pub mod config;
pub mod job;
pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod store;

pub use association::{AssociationGenerator, AssociationMode, AssociationResult, Variant};
pub use batch::{Batch, BatchConfig, BatchRunner, BatchState, BatchStatus, JobSummary};
pub use config::{ForgeConfig, GenerationConfig, ProviderSettings};
pub use job::{Job, JobError, JobState, Stage};
pub use pipeline::{CancelToken, GenerateRequest, Pipeline, PipelineSettings};
pub use provider::{
    Capability, FileFormat, ImageOptions, MeshQuality, ModelOptions, Provider, TextOptions,
};
pub use providers::{available_providers, create_provider, ProviderRegistry};
pub use store::{GenerationStore, MemoryStore};
