//! Pipeline orchestrator
//!
//! Drives one job through its three stages in order: prompt generation,
//! image generation, model generation. Each stage's state transition is
//! written to the store before the blocking provider call, so concurrent
//! status polls always see which stage a job is in. A failed stage
//! terminates the job; later stages never run.

use crate::job::{Job, JobError, JobState, Stage};
use crate::provider::{
    Capability, FileFormat, ImageOptions, MeshQuality, ModelOptions, Provider, TextOptions,
};
use crate::providers::ProviderRegistry;
use crate::store::GenerationStore;
use forge_core::{ForgeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Negative prompt applied when the caller supplies a pre-made prompt and
/// the prompt stage is skipped
const DEFAULT_NEGATIVE_PROMPT: &str =
    "cartoon, anime, stylized, fantasy, damaged, rusty, low quality, blurry";

/// Cooperative cancellation flag, checked between stages and before a
/// queued job starts. Never interrupts an in-flight remote call.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A request to generate one model from a description
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub description: String,
    pub domain: Option<String>,
    pub style: Option<String>,
    /// Mesh quality override; pipeline default when unset
    pub quality: Option<MeshQuality>,
    /// File format override; pipeline default when unset
    pub format: Option<FileFormat>,
    /// Pre-made image prompt; skips the prompt stage's provider call
    pub custom_prompt: Option<String>,
}

impl GenerateRequest {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }
}

/// Provider selection and generation defaults for a pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub text_provider: String,
    pub image_provider: String,
    pub model_provider: String,
    pub quality: MeshQuality,
    pub format: FileFormat,
}

impl PipelineSettings {
    pub fn from_config(config: &crate::config::ForgeConfig) -> Self {
        Self {
            text_provider: config.generation.text_provider.clone(),
            image_provider: config.generation.image_provider.clone(),
            model_provider: config.generation.model_provider.clone(),
            quality: config.generation.mesh_quality,
            format: config.generation.file_format,
        }
    }

    /// Route every stage through one provider (mock, typically)
    pub fn single_provider(id: &str) -> Self {
        Self {
            text_provider: id.to_string(),
            image_provider: id.to_string(),
            model_provider: id.to_string(),
            quality: MeshQuality::default(),
            format: FileFormat::default(),
        }
    }
}

/// What the prompt stage produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub detected_domain: Option<String>,
    pub confidence: Option<String>,
}

/// Orchestrates single jobs against resolved providers
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn GenerationStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn GenerationStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn GenerationStore> {
        &self.store
    }

    /// Run one job to its terminal state, blocking the caller.
    ///
    /// Request validation and provider resolution failures are returned as
    /// errors before any job record exists; stage failures terminate the
    /// job and are reported through the returned record, not as `Err`.
    pub fn run(&self, request: GenerateRequest) -> Result<Job> {
        let job_id = self.prepare(request)?;
        self.execute(&job_id, &CancelToken::new())
    }

    /// Validate, create the job record, and execute it on a background
    /// thread, returning the job id immediately for status polling.
    pub fn submit(&self, request: GenerateRequest) -> Result<String> {
        let job_id = self.prepare(request)?;
        let pipeline = self.clone();
        let id = job_id.clone();
        std::thread::spawn(move || {
            if let Err(err) = pipeline.execute(&id, &CancelToken::new()) {
                log::error!("Job {} executor error: {}", id, err);
            }
        });
        Ok(job_id)
    }

    /// Validate a request, resolve all three providers, and store the
    /// pending job. No state is created when validation or resolution fails.
    pub fn prepare(&self, request: GenerateRequest) -> Result<String> {
        if request.description.trim().is_empty() {
            return Err(ForgeError::InvalidArgument(
                "Description must not be empty".to_string(),
            ));
        }

        self.registry
            .resolve(&self.settings.text_provider, Capability::Text)?;
        self.registry
            .resolve(&self.settings.image_provider, Capability::Image)?;
        self.registry
            .resolve(&self.settings.model_provider, Capability::Model)?;

        let mut job = Job::new(request.description.trim());
        job.domain = request.domain;
        job.style = request.style;
        job.quality = request.quality.unwrap_or(self.settings.quality);
        job.format = request.format.unwrap_or(self.settings.format);
        job.custom_prompt = request.custom_prompt;

        let job_id = job.id.clone();
        self.store.insert_job(job);
        Ok(job_id)
    }

    /// Drive an existing stored job through its stages, honoring the
    /// cancellation token at stage boundaries. Returns the terminal record.
    pub fn execute(&self, job_id: &str, cancel: &CancelToken) -> Result<Job> {
        if let Err(err) = self.run_stages(job_id, cancel) {
            log::warn!("Job {} failed: {}", job_id, err);
            let job_error = JobError::from_error(&err);
            self.store.update_job(job_id, &|j| j.fail(job_error.clone()))?;
        }
        self.store.job(job_id)
    }

    fn run_stages(&self, job_id: &str, cancel: &CancelToken) -> Result<()> {
        let text_provider = self
            .registry
            .resolve(&self.settings.text_provider, Capability::Text)?;
        let image_provider = self
            .registry
            .resolve(&self.settings.image_provider, Capability::Image)?;
        let model_provider = self
            .registry
            .resolve(&self.settings.model_provider, Capability::Model)?;

        // Immutable generation parameters
        let job = self.store.job(job_id)?;

        // Stage 1: prompt
        if self.check_cancelled(job_id, cancel)? {
            return Ok(());
        }
        self.store
            .update_job(job_id, &|j| j.transition(JobState::GeneratingPrompt))?;
        log::info!("Job {}: generating prompt", job_id);

        let spec = match &job.custom_prompt {
            Some(custom) => PromptSpec {
                prompt: custom.clone(),
                negative_prompt: Some(DEFAULT_NEGATIVE_PROMPT.to_string()),
                detected_domain: job.domain.clone(),
                confidence: None,
            },
            None => {
                let instruction = build_prompt_instruction(
                    &job.description,
                    job.domain.as_deref(),
                    job.style.as_deref(),
                );
                let raw = text_provider.generate_text(
                    &instruction,
                    &TextOptions {
                        temperature: Some(0.7),
                        ..Default::default()
                    },
                )?;
                parse_prompt_response(&raw)
            }
        };
        self.store.update_job(job_id, &|j| {
            j.negative_prompt = spec.negative_prompt.clone();
            j.detected_domain = spec.detected_domain.clone();
            j.confidence = spec.confidence.clone();
            j.record_output(Stage::Prompt, spec.prompt.clone());
        })?;

        // Stage 2: image
        if self.check_cancelled(job_id, cancel)? {
            return Ok(());
        }
        self.store
            .update_job(job_id, &|j| j.transition(JobState::GeneratingImage))?;
        log::info!("Job {}: generating image", job_id);

        let image_ref = image_provider.generate_image(
            &spec.prompt,
            &ImageOptions {
                negative_prompt: spec.negative_prompt.clone(),
                model: None,
            },
        )?;
        self.store
            .update_job(job_id, &|j| j.record_output(Stage::Image, image_ref.clone()))?;

        // Stage 3: model
        if self.check_cancelled(job_id, cancel)? {
            return Ok(());
        }
        self.store
            .update_job(job_id, &|j| j.transition(JobState::GeneratingModel))?;
        log::info!("Job {}: generating model", job_id);

        let model_ref = model_provider.generate_model(
            &image_ref,
            &ModelOptions {
                quality: job.quality,
                format: job.format,
            },
        )?;
        self.store.update_job(job_id, &|j| {
            j.record_output(Stage::Model, model_ref.clone());
            j.transition(JobState::Completed);
        })?;
        log::info!("Job {}: completed", job_id);

        Ok(())
    }

    fn check_cancelled(&self, job_id: &str, cancel: &CancelToken) -> Result<bool> {
        if cancel.is_cancelled() {
            log::info!("Job {}: cancelled", job_id);
            self.store.update_job(job_id, &|j| j.cancel())?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Build the instruction sent to the text provider to turn a description
/// into an image-generation prompt
pub fn build_prompt_instruction(
    description: &str,
    domain: Option<&str>,
    style: Option<&str>,
) -> String {
    let mut instruction = String::from(
        "You are an expert prompt engineer for photorealistic 3D-model reference imagery. \
         Turn the object description below into one detailed image-generation prompt: \
         describe the object's shape, materials, colors and key components, then specify \
         a three-quarter front view, soft studio lighting and a clean neutral background.\n\n",
    );
    instruction.push_str(&format!("Description: {}\n", description));
    if let Some(domain) = domain {
        instruction.push_str(&format!("Industry domain: {}\n", domain));
    }
    if let Some(style) = style {
        instruction.push_str(&format!("Render style: {}\n", style));
    }
    instruction.push_str(
        "\nRespond with a JSON object with these fields:\n\
         {\"prompt\": \"...\", \"negative_prompt\": \"...\", \
         \"detected_domain\": \"...\", \"confidence\": \"high|medium|low\"}\n\
         Output the JSON object only.",
    );
    instruction
}

/// Parse the text provider's response into a prompt spec.
///
/// Accepts a bare JSON object or a fenced/wrapped one; as a fallback the
/// whole response is treated as the prompt itself.
pub fn parse_prompt_response(raw: &str) -> PromptSpec {
    let candidate = extract_json_object(raw);
    if let Some(text) = candidate {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(prompt) = value.get("prompt").and_then(|p| p.as_str()) {
                let field = |key: &str| {
                    value
                        .get(key)
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                };
                return PromptSpec {
                    prompt: prompt.to_string(),
                    negative_prompt: field("negative_prompt"),
                    detected_domain: field("detected_domain"),
                    confidence: field("confidence"),
                };
            }
        }
    }

    PromptSpec {
        prompt: raw.trim().to_string(),
        negative_prompt: None,
        detected_domain: None,
        confidence: None,
    }
}

fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(raw[start..=end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForgeConfig;
    use crate::provider::Provider;
    use crate::store::MemoryStore;
    use forge_core::ProviderErrorKind;

    /// Text provider returning a fixed JSON prompt spec
    #[derive(Debug)]
    struct StubText;
    impl Provider for StubText {
        fn id(&self) -> &str {
            "stub-text"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Text]
        }
        fn generate_text(&self, _p: &str, _o: &TextOptions) -> Result<String> {
            Ok(r#"{"prompt": "a wooden chair, studio render", "negative_prompt": "blurry", "detected_domain": "furniture", "confidence": "high"}"#.to_string())
        }
    }

    #[derive(Debug)]
    struct StubImage;
    impl Provider for StubImage {
        fn id(&self) -> &str {
            "stub-image"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Image]
        }
        fn generate_image(&self, _p: &str, _o: &ImageOptions) -> Result<String> {
            Ok("stub://image/1.png".to_string())
        }
    }

    #[derive(Debug)]
    struct StubModel;
    impl Provider for StubModel {
        fn id(&self) -> &str {
            "stub-model"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Model]
        }
        fn generate_model(&self, _i: &str, _o: &ModelOptions) -> Result<String> {
            Ok("stub://model/1.glb".to_string())
        }
    }

    /// Model provider that always rejects its input
    #[derive(Debug)]
    struct RejectingModel;
    impl Provider for RejectingModel {
        fn id(&self) -> &str {
            "stub-model"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Model]
        }
        fn generate_model(&self, _i: &str, _o: &ModelOptions) -> Result<String> {
            Err(ForgeError::provider(
                ProviderErrorKind::InvalidInputRejected,
                "image rejected by remote service",
            ))
        }
    }

    fn stub_settings() -> PipelineSettings {
        PipelineSettings {
            text_provider: "stub-text".to_string(),
            image_provider: "stub-image".to_string(),
            model_provider: "stub-model".to_string(),
            quality: MeshQuality::Medium,
            format: FileFormat::Glb,
        }
    }

    fn stub_pipeline(model_provider: Arc<dyn Provider>) -> Pipeline {
        let registry = Arc::new(ProviderRegistry::new(ForgeConfig::default()));
        registry.register(Arc::new(StubText));
        registry.register(Arc::new(StubImage));
        registry.register(model_provider);
        Pipeline::new(registry, Arc::new(MemoryStore::new()), stub_settings())
    }

    #[test]
    fn test_successful_run_records_all_stages() {
        let pipeline = stub_pipeline(Arc::new(StubModel));
        let job = pipeline
            .run(GenerateRequest::new("测试椅子"))
            .unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(
            job.stage_outputs.get(&Stage::Prompt).unwrap(),
            "a wooden chair, studio render"
        );
        assert_eq!(
            job.stage_outputs.get(&Stage::Image).unwrap(),
            "stub://image/1.png"
        );
        assert_eq!(
            job.stage_outputs.get(&Stage::Model).unwrap(),
            "stub://model/1.glb"
        );
        assert_eq!(job.negative_prompt.as_deref(), Some("blurry"));
        assert_eq!(job.detected_domain.as_deref(), Some("furniture"));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_model_stage_failure_stops_pipeline() {
        let pipeline = stub_pipeline(Arc::new(RejectingModel));
        let job = pipeline
            .run(GenerateRequest::new("测试椅子"))
            .unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert!(job.stage_outputs.contains_key(&Stage::Prompt));
        assert!(job.stage_outputs.contains_key(&Stage::Image));
        assert!(!job.stage_outputs.contains_key(&Stage::Model));

        let error = job.error.unwrap();
        assert_eq!(error.kind, "invalid-input-rejected");
        assert!(!error.message.is_empty());
    }

    #[test]
    fn test_failing_prompt_stage_runs_nothing_else() {
        #[derive(Debug)]
        struct FailingText;
        impl Provider for FailingText {
            fn id(&self) -> &str {
                "stub-text"
            }
            fn capabilities(&self) -> &[Capability] {
                &[Capability::Text]
            }
            fn generate_text(&self, _p: &str, _o: &TextOptions) -> Result<String> {
                Err(ForgeError::provider(
                    ProviderErrorKind::RateLimit,
                    "throttled",
                ))
            }
        }

        let registry = Arc::new(ProviderRegistry::new(ForgeConfig::default()));
        registry.register(Arc::new(FailingText));
        registry.register(Arc::new(StubImage));
        registry.register(Arc::new(StubModel));
        let pipeline = Pipeline::new(registry, Arc::new(MemoryStore::new()), stub_settings());

        let job = pipeline.run(GenerateRequest::new("anything")).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.stage_outputs.is_empty());
        assert_eq!(job.error.unwrap().kind, "rate-limit");
    }

    #[test]
    fn test_empty_description_rejected_without_state() {
        let pipeline = stub_pipeline(Arc::new(StubModel));
        let err = pipeline.run(GenerateRequest::new("   ")).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_provider_rejected_before_job_exists() {
        let registry = Arc::new(ProviderRegistry::new(ForgeConfig::default()));
        let settings = PipelineSettings {
            text_provider: "no-such-provider".to_string(),
            ..stub_settings()
        };
        let pipeline = Pipeline::new(registry, Arc::new(MemoryStore::new()), settings);
        let err = pipeline.run(GenerateRequest::new("a chair")).unwrap_err();
        assert!(matches!(err, ForgeError::ProviderNotFound(_)));
    }

    #[test]
    fn test_custom_prompt_skips_text_provider() {
        #[derive(Debug)]
        struct PanickyText;
        impl Provider for PanickyText {
            fn id(&self) -> &str {
                "stub-text"
            }
            fn capabilities(&self) -> &[Capability] {
                &[Capability::Text]
            }
            fn generate_text(&self, _p: &str, _o: &TextOptions) -> Result<String> {
                Err(ForgeError::provider(
                    ProviderErrorKind::Unknown,
                    "should not be called",
                ))
            }
        }

        let registry = Arc::new(ProviderRegistry::new(ForgeConfig::default()));
        registry.register(Arc::new(PanickyText));
        registry.register(Arc::new(StubImage));
        registry.register(Arc::new(StubModel));
        let pipeline = Pipeline::new(registry, Arc::new(MemoryStore::new()), stub_settings());

        let mut request = GenerateRequest::new("a chair");
        request.custom_prompt = Some("hand-written prompt".to_string());
        let job = pipeline.run(request).unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(
            job.stage_outputs.get(&Stage::Prompt).unwrap(),
            "hand-written prompt"
        );
    }

    #[test]
    fn test_pre_cancelled_token_cancels_before_first_stage() {
        let pipeline = stub_pipeline(Arc::new(StubModel));
        let job_id = pipeline.prepare(GenerateRequest::new("a chair")).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let job = pipeline.execute(&job_id, &token).unwrap();

        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.stage_outputs.is_empty());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_submit_returns_id_and_completes() {
        let pipeline = stub_pipeline(Arc::new(StubModel));
        let job_id = pipeline.submit(GenerateRequest::new("a chair")).unwrap();

        // Poll until the background executor finishes
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            let job = pipeline.store().job(&job_id).unwrap();
            if job.state.is_terminal() {
                assert_eq!(job.state, JobState::Completed);
                break;
            }
            assert!(std::time::Instant::now() < deadline, "job never finished");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    #[test]
    fn test_parse_prompt_response_json() {
        let spec = parse_prompt_response(
            r#"```json
{"prompt": "p", "negative_prompt": "n", "detected_domain": "furniture", "confidence": "high"}
```"#,
        );
        assert_eq!(spec.prompt, "p");
        assert_eq!(spec.negative_prompt.as_deref(), Some("n"));
        assert_eq!(spec.confidence.as_deref(), Some("high"));
    }

    #[test]
    fn test_parse_prompt_response_raw_fallback() {
        let spec = parse_prompt_response("just a plain prompt line\n");
        assert_eq!(spec.prompt, "just a plain prompt line");
        assert!(spec.negative_prompt.is_none());
    }

    #[test]
    fn test_build_prompt_instruction_includes_hints() {
        let instruction =
            build_prompt_instruction("a transformer", Some("power_grid"), Some("industrial"));
        assert!(instruction.contains("a transformer"));
        assert!(instruction.contains("power_grid"));
        assert!(instruction.contains("industrial"));
        assert!(instruction.contains("JSON object"));
    }
}
