//! Job model for one description-to-3D-model generation unit
//!
//! A job is created `pending` and driven forward by exactly one pipeline
//! executor; status pollers read snapshots concurrently. State only moves
//! forward along the stage order, with `failed` and `cancelled` terminal.

use crate::provider::{FileFormat, MeshQuality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    GeneratingPrompt,
    GeneratingImage,
    GeneratingModel,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Whether the job is actively executing a stage
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::GeneratingPrompt | JobState::GeneratingImage | JobState::GeneratingModel
        )
    }

    fn order(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::GeneratingPrompt => 1,
            JobState::GeneratingImage => 2,
            JobState::GeneratingModel => 3,
            JobState::Completed => 4,
            JobState::Failed | JobState::Cancelled => 5,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::GeneratingPrompt => "generating_prompt",
            JobState::GeneratingImage => "generating_image",
            JobState::GeneratingModel => "generating_model",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One of the three sequential pipeline stages
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prompt,
    Image,
    Model,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prompt => write!(f, "prompt"),
            Stage::Image => write!(f, "image"),
            Stage::Model => write!(f, "model"),
        }
    }
}

/// Terminal error recorded on a failed job.
///
/// `kind` carries the wire-stable provider error classification
/// ("auth", "rate-limit", ...) or "generation-failed" for unusable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: String,
    pub message: String,
}

impl JobError {
    pub fn from_error(err: &forge_core::ForgeError) -> Self {
        use forge_core::ForgeError;
        match err {
            ForgeError::Provider { kind, message } => JobError {
                kind: kind.to_string(),
                message: message.clone(),
            },
            ForgeError::GenerationFailed(msg) => JobError {
                kind: "generation-failed".to_string(),
                message: msg.clone(),
            },
            other => JobError {
                kind: "unknown".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// A tracked generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID (UUID)
    pub id: String,
    /// Input description (immutable)
    pub description: String,
    /// Optional industry/domain hint
    #[serde(default)]
    pub domain: Option<String>,
    /// Optional render style hint
    #[serde(default)]
    pub style: Option<String>,
    /// Mesh face-count tier
    pub quality: MeshQuality,
    /// Output model format
    pub format: FileFormat,
    /// Pre-made image prompt; skips the prompt stage's provider call
    #[serde(default)]
    pub custom_prompt: Option<String>,
    /// Current state
    pub state: JobState,
    /// Artifact reference per successfully completed stage
    #[serde(default)]
    pub stage_outputs: BTreeMap<Stage, String>,
    /// Negative prompt produced by the prompt stage
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Domain the prompt stage detected in the description
    #[serde(default)]
    pub detected_domain: Option<String>,
    /// Prompt stage's confidence in the detected domain
    #[serde(default)]
    pub confidence: Option<String>,
    /// Error record, present only when failed
    #[serde(default)]
    pub error: Option<JobError>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 timestamp of the last state transition
    pub updated_at: String,
}

impl Job {
    /// Create a new pending job
    pub fn new(description: &str) -> Self {
        let now = now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            domain: None,
            style: None,
            quality: MeshQuality::default(),
            format: FileFormat::default(),
            custom_prompt: None,
            state: JobState::Pending,
            stage_outputs: BTreeMap::new(),
            negative_prompt: None,
            detected_domain: None,
            confidence: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Advance to a new state, refreshing `updated_at`.
    ///
    /// Transitions are forward-only; an attempt to move backwards or out of
    /// a terminal state is ignored (the record stays as-is), which keeps a
    /// late writer from clobbering a terminal result.
    pub fn transition(&mut self, next: JobState) {
        if self.state.is_terminal() || next.order() <= self.state.order() {
            return;
        }
        self.state = next;
        self.updated_at = now_rfc3339();
    }

    /// Record a stage's artifact after its call succeeded
    pub fn record_output(&mut self, stage: Stage, reference: impl Into<String>) {
        self.stage_outputs.insert(stage, reference.into());
        self.updated_at = now_rfc3339();
    }

    /// Terminate as failed with a classified error
    pub fn fail(&mut self, error: JobError) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.error = Some(error);
        self.updated_at = now_rfc3339();
    }

    /// Terminate as cancelled
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Cancelled;
        self.updated_at = now_rfc3339();
    }
}

/// Current UTC time as an RFC 3339 string
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
