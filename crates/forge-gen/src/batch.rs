//! Batch orchestrator
//!
//! Runs many jobs concurrently under a per-batch concurrency cap. Jobs are
//! admitted FIFO from a channel into a fixed set of worker threads; one
//! job's failure never touches its siblings. Aggregate status is recomputed
//! from the live job records on every poll.

use crate::association::AssociationResult;
use crate::job::{Job, JobError, JobState};
use crate::pipeline::{CancelToken, GenerateRequest, Pipeline, PipelineSettings};
use crate::provider::{Capability, FileFormat, MeshQuality};
use crate::providers::ProviderRegistry;
use crate::store::GenerationStore;
use forge_core::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Per-batch execution settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Concurrency cap: at most this many jobs execute at once
    pub max_parallel: usize,
    /// Mesh quality override; pipeline default when unset
    pub quality: Option<MeshQuality>,
    /// File format override; pipeline default when unset
    pub format: Option<FileFormat>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: 3,
            quality: None,
            format: None,
        }
    }
}

/// A tracked batch of jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Unique batch ID (UUID)
    pub id: String,
    /// Member job IDs in creation order; fixed after creation
    pub job_ids: Vec<String>,
    /// Concurrency cap this batch runs under
    pub max_parallel: usize,
    /// Whether cancellation has been requested
    #[serde(default)]
    pub cancel_requested: bool,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

impl Batch {
    pub fn new(job_ids: Vec<String>, max_parallel: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_ids,
            max_parallel,
            cancel_requested: false,
            created_at: crate::job::now_rfc3339(),
        }
    }
}

/// Aggregate state of a batch, derived from its jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Running,
    Completed,
    PartiallyFailed,
    Cancelled,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::PartiallyFailed => "partially_failed",
            BatchState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Per-job line in a batch status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub description: String,
    pub state: JobState,
    #[serde(default)]
    pub error: Option<JobError>,
}

impl JobSummary {
    fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            description: job.description.clone(),
            state: job.state,
            error: job.error.clone(),
        }
    }
}

/// Aggregate view of a batch, recomputed on every status call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: String,
    pub state: BatchState,
    pub total: usize,
    pub pending: usize,
    /// Jobs currently in a `generating_*` stage
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Fraction of jobs in a terminal state, 0.0..=1.0
    pub progress: f64,
    pub jobs: Vec<JobSummary>,
}

impl BatchStatus {
    fn compute(batch: &Batch, jobs: &[Job]) -> Self {
        let total = jobs.len();
        let pending = jobs.iter().filter(|j| j.state == JobState::Pending).count();
        let active = jobs.iter().filter(|j| j.state.is_active()).count();
        let completed = jobs
            .iter()
            .filter(|j| j.state == JobState::Completed)
            .count();
        let failed = jobs.iter().filter(|j| j.state == JobState::Failed).count();
        let cancelled = jobs
            .iter()
            .filter(|j| j.state == JobState::Cancelled)
            .count();

        let terminal = completed + failed + cancelled;
        let progress = if total > 0 {
            terminal as f64 / total as f64
        } else {
            0.0
        };

        Self {
            batch_id: batch.id.clone(),
            state: aggregate_state(jobs, batch.cancel_requested),
            total,
            pending,
            active,
            completed,
            failed,
            cancelled,
            progress,
            jobs: jobs.iter().map(JobSummary::from_job).collect(),
        }
    }
}

/// Derive the batch-level state from member job states.
///
/// A batch whose jobs all completed stays `completed` even under a late
/// cancellation request; cancellation only names the aggregate when it
/// actually stopped at least one job.
fn aggregate_state(jobs: &[Job], cancel_requested: bool) -> BatchState {
    if jobs.iter().any(|j| !j.state.is_terminal()) {
        return BatchState::Running;
    }
    if jobs.iter().all(|j| j.state == JobState::Completed) {
        return BatchState::Completed;
    }
    if cancel_requested && jobs.iter().any(|j| j.state == JobState::Cancelled) {
        return BatchState::Cancelled;
    }
    BatchState::PartiallyFailed
}

/// Creates and supervises batches of jobs
pub struct BatchRunner {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn GenerationStore>,
    settings: PipelineSettings,
    cancels: Mutex<HashMap<String, CancelToken>>,
}

impl BatchRunner {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn GenerationStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            store,
            settings,
            cancels: Mutex::new(HashMap::new()),
        }
    }

    /// Create one job per request, start execution under the concurrency
    /// cap, and return the batch record immediately.
    ///
    /// All validation and provider resolution happens before any job or
    /// batch record is stored; a rejected call leaves nothing behind.
    pub fn create(&self, requests: Vec<GenerateRequest>, config: &BatchConfig) -> Result<Batch> {
        if requests.is_empty() {
            return Err(ForgeError::InvalidArgument(
                "Batch needs at least one description".to_string(),
            ));
        }
        if config.max_parallel == 0 {
            return Err(ForgeError::InvalidArgument(
                "max_parallel must be a positive integer".to_string(),
            ));
        }
        if requests.iter().any(|r| r.description.trim().is_empty()) {
            return Err(ForgeError::InvalidArgument(
                "Batch descriptions must not be empty".to_string(),
            ));
        }

        let mut settings = self.settings.clone();
        if let Some(quality) = config.quality {
            settings.quality = quality;
        }
        if let Some(format) = config.format {
            settings.format = format;
        }

        // Resolve up front so a misconfigured provider rejects the whole
        // request before any state exists
        self.registry
            .resolve(&settings.text_provider, Capability::Text)?;
        self.registry
            .resolve(&settings.image_provider, Capability::Image)?;
        self.registry
            .resolve(&settings.model_provider, Capability::Model)?;

        let pipeline = Pipeline::new(self.registry.clone(), self.store.clone(), settings);

        let mut job_ids = Vec::with_capacity(requests.len());
        for request in requests {
            job_ids.push(pipeline.prepare(request)?);
        }

        let batch = Batch::new(job_ids, config.max_parallel);
        self.store.insert_batch(batch.clone());

        let token = CancelToken::new();
        self.cancels
            .lock()
            .expect("cancel map lock poisoned")
            .insert(batch.id.clone(), token.clone());

        self.spawn_workers(&batch, pipeline, token);
        log::info!(
            "Batch {} started: {} jobs, max_parallel {}",
            batch.id,
            batch.job_ids.len(),
            batch.max_parallel
        );

        Ok(batch)
    }

    /// Convenience: one job per association variant
    pub fn create_from_association(
        &self,
        association: &AssociationResult,
        config: &BatchConfig,
    ) -> Result<Batch> {
        let requests = association
            .variants
            .iter()
            .map(|v| GenerateRequest::new(&v.description))
            .collect();
        self.create(requests, config)
    }

    fn spawn_workers(&self, batch: &Batch, pipeline: Pipeline, token: CancelToken) {
        let (sender, receiver) = crossbeam_channel::unbounded::<String>();
        for job_id in &batch.job_ids {
            // Receiver outlives this loop; send cannot fail here
            let _ = sender.send(job_id.clone());
        }
        drop(sender);

        let worker_count = batch.max_parallel.min(batch.job_ids.len());
        for worker_id in 0..worker_count {
            let receiver = receiver.clone();
            let pipeline = pipeline.clone();
            let token = token.clone();
            let batch_id = batch.id.clone();

            std::thread::spawn(move || {
                log::debug!("Batch {} worker {} started", batch_id, worker_id);
                while let Ok(job_id) = receiver.recv() {
                    if token.is_cancelled() {
                        // Not yet started: straight to cancelled
                        if let Err(err) = pipeline.store().update_job(&job_id, &|j| j.cancel()) {
                            log::error!("Batch {} job {}: {}", batch_id, job_id, err);
                        }
                        continue;
                    }
                    if let Err(err) = pipeline.execute(&job_id, &token) {
                        log::error!("Batch {} job {} executor error: {}", batch_id, job_id, err);
                    }
                }
                log::debug!("Batch {} worker {} finished", batch_id, worker_id);
            });
        }
    }

    /// Aggregate view, recomputed from current job records
    pub fn status(&self, batch_id: &str) -> Result<BatchStatus> {
        let batch = self.store.batch(batch_id)?;
        let jobs = self.store.jobs(&batch.job_ids);
        Ok(BatchStatus::compute(&batch, &jobs))
    }

    /// Request cooperative cancellation.
    ///
    /// Pending jobs are cancelled instead of started; a job mid-flight
    /// finishes its current stage and stops at the next boundary. Jobs that
    /// already completed stay completed.
    pub fn cancel(&self, batch_id: &str) -> Result<()> {
        self.store.request_batch_cancel(batch_id)?;
        if let Some(token) = self
            .cancels
            .lock()
            .expect("cancel map lock poisoned")
            .get(batch_id)
        {
            token.cancel();
        }
        log::info!("Batch {} cancellation requested", batch_id);
        Ok(())
    }
}
