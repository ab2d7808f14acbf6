//! Single-model generation command

use anyhow::{bail, Result};
use forge_gen::{FileFormat, GenerateRequest, JobState, MeshQuality, Pipeline};

pub struct GenerateArgs {
    pub description: String,
    pub domain: Option<String>,
    pub style: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub prompt: Option<String>,
    pub text_provider: Option<String>,
    pub image_provider: Option<String>,
    pub model_provider: Option<String>,
    pub json: bool,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let (registry, store, settings) = super::bootstrap(
        args.text_provider.as_deref(),
        args.image_provider.as_deref(),
        args.model_provider.as_deref(),
    )?;

    let mut request = GenerateRequest::new(&args.description);
    request.domain = args.domain;
    request.style = args.style;
    request.custom_prompt = args.prompt;
    if let Some(quality) = args.quality.as_deref() {
        request.quality = Some(quality.parse::<MeshQuality>()?);
    }
    if let Some(format) = args.format.as_deref() {
        request.format = Some(format.parse::<FileFormat>()?);
    }

    let pipeline = Pipeline::new(registry, store, settings);
    println!("Generating model for: {}", args.description);
    let job = pipeline.run(request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        println!("Job {}: {}", job.id, job.state);
        for (stage, reference) in &job.stage_outputs {
            println!("  {}: {}", stage, reference);
        }
        if let Some(domain) = &job.detected_domain {
            println!("  detected domain: {}", domain);
        }
    }

    if job.state == JobState::Failed {
        let error = job
            .error
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_else(|| "unknown".to_string());
        bail!("Generation failed ({})", error);
    }

    Ok(())
}
