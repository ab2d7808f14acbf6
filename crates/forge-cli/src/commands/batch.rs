//! Batch generation command
//!
//! Creates the batch, then polls aggregate status until it reaches a
//! terminal state, printing progress as jobs finish. Ctrl+C requests
//! cooperative cancellation instead of killing the process.

use anyhow::{bail, Result};
use forge_gen::{
    AssociationGenerator, BatchConfig, BatchRunner, BatchState, FileFormat, GenerateRequest,
    JobState, MeshQuality,
};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct BatchArgs {
    pub descriptions: Vec<String>,
    pub from_category: Option<String>,
    pub count: Option<usize>,
    pub mode: String,
    pub max_parallel: Option<usize>,
    pub quality: Option<String>,
    pub format: Option<String>,
}

pub fn run(args: BatchArgs) -> Result<()> {
    let (registry, store, settings) = super::bootstrap(None, None, None)?;
    let generation = registry.config().generation.clone();

    let mut config = BatchConfig {
        max_parallel: args.max_parallel.unwrap_or(generation.max_parallel),
        quality: None,
        format: None,
    };
    if let Some(quality) = args.quality.as_deref() {
        config.quality = Some(quality.parse::<MeshQuality>()?);
    }
    if let Some(format) = args.format.as_deref() {
        config.format = Some(format.parse::<FileFormat>()?);
    }

    let runner = Arc::new(BatchRunner::new(registry.clone(), store, settings.clone()));

    let batch = match args.from_category {
        Some(category) => {
            let count = args.count.unwrap_or(generation.association_count);
            let mode = args.mode.parse()?;
            let generator = AssociationGenerator::new(registry, &settings.text_provider);
            println!("Expanding '{}' into {} variants...", category, count);
            let association = generator.generate(&category, count, mode)?;
            println!("Got {} variants", association.variants.len());
            runner.create_from_association(&association, &config)?
        }
        None => {
            let requests: Vec<GenerateRequest> = args
                .descriptions
                .iter()
                .map(|d| GenerateRequest::new(d))
                .collect();
            runner.create(requests, &config)?
        }
    };

    println!(
        "Batch {} started: {} jobs, max_parallel {}",
        batch.id,
        batch.job_ids.len(),
        batch.max_parallel
    );

    {
        let runner = runner.clone();
        let batch_id = batch.id.clone();
        ctrlc::set_handler(move || {
            eprintln!("Cancelling batch {}...", batch_id);
            if let Err(err) = runner.cancel(&batch_id) {
                eprintln!("Cancel failed: {}", err);
            }
        })?;
    }

    let status = loop {
        let status = runner.status(&batch.id)?;
        println!(
            "  {:>3.0}%  pending {}  active {}  completed {}  failed {}",
            status.progress * 100.0,
            status.pending,
            status.active,
            status.completed,
            status.failed
        );
        if status.state != BatchState::Running {
            break status;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    println!(
        "\nBatch {}: {} ({} completed, {} failed, {} cancelled)",
        batch.id, status.state, status.completed, status.failed, status.cancelled
    );

    for job in status.jobs.iter().filter(|j| j.state == JobState::Failed) {
        let reason = job
            .error
            .as_ref()
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_else(|| "unknown".to_string());
        println!("  FAILED {} ({}): {}", job.id, job.description, reason);
    }

    if status.state == BatchState::PartiallyFailed {
        bail!("{} of {} jobs failed", status.failed, status.total);
    }

    Ok(())
}
