//! Process-wide job/batch registry
//!
//! Records live for the process lifetime only. Each job record has exactly
//! one writer (the pipeline executor driving it); status pollers read cloned
//! snapshots concurrently and never observe a partially written record.
//!
//! The orchestrators talk to the `GenerationStore` trait rather than the
//! concrete map so a durable backend can be swapped in later.

use crate::batch::Batch;
use crate::job::Job;
use forge_core::{ForgeError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Narrow store surface used by the pipeline and batch orchestrators
pub trait GenerationStore: Send + Sync {
    fn insert_job(&self, job: Job);

    /// Snapshot of a job by id
    fn job(&self, id: &str) -> Result<Job>;

    /// Apply a mutation to a job under the write lock, returning the
    /// updated snapshot
    fn update_job(&self, id: &str, mutate: &dyn Fn(&mut Job)) -> Result<Job>;

    /// Snapshots of the given jobs, in the given order
    fn jobs(&self, ids: &[String]) -> Vec<Job>;

    fn insert_batch(&self, batch: Batch);

    /// Snapshot of a batch by id
    fn batch(&self, id: &str) -> Result<Batch>;

    /// Flag a batch as cancellation-requested
    fn request_batch_cancel(&self, id: &str) -> Result<()>;
}

/// In-memory store backing the registry
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, Job>>,
    batches: RwLock<HashMap<String, Batch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GenerationStore for MemoryStore {
    fn insert_job(&self, job: Job) {
        self.jobs
            .write()
            .expect("job map lock poisoned")
            .insert(job.id.clone(), job);
    }

    fn job(&self, id: &str) -> Result<Job> {
        self.jobs
            .read()
            .expect("job map lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("Job not found: {}", id)))
    }

    fn update_job(&self, id: &str, mutate: &dyn Fn(&mut Job)) -> Result<Job> {
        let mut jobs = self.jobs.write().expect("job map lock poisoned");
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| ForgeError::NotFound(format!("Job not found: {}", id)))?;
        mutate(job);
        Ok(job.clone())
    }

    fn jobs(&self, ids: &[String]) -> Vec<Job> {
        let jobs = self.jobs.read().expect("job map lock poisoned");
        ids.iter().filter_map(|id| jobs.get(id).cloned()).collect()
    }

    fn insert_batch(&self, batch: Batch) {
        self.batches
            .write()
            .expect("batch map lock poisoned")
            .insert(batch.id.clone(), batch);
    }

    fn batch(&self, id: &str) -> Result<Batch> {
        self.batches
            .read()
            .expect("batch map lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("Batch not found: {}", id)))
    }

    fn request_batch_cancel(&self, id: &str) -> Result<()> {
        let mut batches = self.batches.write().expect("batch map lock poisoned");
        let batch = batches
            .get_mut(id)
            .ok_or_else(|| ForgeError::NotFound(format!("Batch not found: {}", id)))?;
        batch.cancel_requested = true;
        Ok(())
    }
}
