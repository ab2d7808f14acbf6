//! Volcano Engine Ark image-to-3D provider
//!
//! 3D generation is long-running (minutes), so `generate_model` submits a
//! task and polls until the remote side reports a terminal status, then
//! returns the produced model file URL as the reference.

use crate::config::ForgeConfig;
use crate::provider::{Capability, ModelOptions, Provider};
use crate::providers::{build_agent, classify_http_error, malformed_response};
use forge_core::{ForgeError, ProviderErrorKind, Result};

const DEFAULT_ARK_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
const DEFAULT_MODEL: &str = "doubao-seed3d-1-0-250928";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const POLL_INTERVAL_SECS: u64 = 15;
const MAX_POLL_ATTEMPTS: u32 = 60;

/// Ark provider for AI 3D model generation
#[derive(Debug)]
pub struct ArkProvider {
    api_key: String,
    api_url: String,
    model: String,
}

impl ArkProvider {
    /// Create a new ArkProvider from config
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let api_key = config
            .api_key("ark")
            .ok_or_else(|| {
                ForgeError::provider(
                    ProviderErrorKind::Auth,
                    "Ark API key not configured. Set FORGE_ARK_API_KEY or add to .forge/config.toml",
                )
            })?
            .to_string();

        let api_url = config.api_url("ark").unwrap_or(DEFAULT_ARK_URL).to_string();
        let model = config.model("ark").unwrap_or(DEFAULT_MODEL).to_string();

        Ok(Self {
            api_key,
            api_url,
            model,
        })
    }

    /// Submit an image-to-3D task and return the remote task ID
    fn submit_task(&self, image_ref: &str, options: &ModelOptions) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "content": [
                {
                    "type": "text",
                    "text": format!(
                        "--meshquality {} --fileformat {}",
                        options.quality, options.format
                    )
                },
                {
                    "type": "image_url",
                    "image_url": { "url": image_ref }
                }
            ]
        });

        let url = format!("{}/contents/generations/tasks", self.api_url);
        let agent = build_agent(REQUEST_TIMEOUT_SECS);
        let mut response = agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(&payload)
            .map_err(|e| classify_http_error("Ark", &e))?;

        let body: serde_json::Value = response
            .body_mut()
            .read_json()
            .map_err(|e| malformed_response("Ark", e))?;

        parse_task_id(&body)
    }

    /// Poll the status of a submitted task
    fn poll_task(&self, task_id: &str) -> Result<ArkTaskStatus> {
        let url = format!("{}/contents/generations/tasks/{}", self.api_url, task_id);
        let agent = build_agent(REQUEST_TIMEOUT_SECS);
        let mut response = agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .call()
            .map_err(|e| classify_http_error("Ark", &e))?;

        let body: serde_json::Value = response
            .body_mut()
            .read_json()
            .map_err(|e| malformed_response("Ark", e))?;

        Ok(parse_task_status(&body))
    }
}

/// Remote task status, as reported by the polling endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArkTaskStatus {
    Processing,
    Succeeded { file_url: Option<String> },
    Failed(String),
}

impl Provider for ArkProvider {
    fn id(&self) -> &str {
        "ark"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Model]
    }

    fn generate_model(&self, image_ref: &str, options: &ModelOptions) -> Result<String> {
        let task_id = self.submit_task(image_ref, options)?;
        log::debug!("Submitted Ark task {}", task_id);

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if attempts > MAX_POLL_ATTEMPTS {
                return Err(ForgeError::GenerationFailed(format!(
                    "Ark task {} still running after {} poll attempts",
                    task_id, MAX_POLL_ATTEMPTS
                )));
            }

            std::thread::sleep(std::time::Duration::from_secs(POLL_INTERVAL_SECS));

            match self.poll_task(&task_id)? {
                ArkTaskStatus::Processing => {
                    log::debug!("Ark task {} still processing", task_id);
                }
                ArkTaskStatus::Succeeded { file_url } => {
                    return file_url.ok_or_else(|| {
                        ForgeError::GenerationFailed(format!(
                            "Ark task {} succeeded without a file URL",
                            task_id
                        ))
                    });
                }
                ArkTaskStatus::Failed(message) => {
                    return Err(ForgeError::GenerationFailed(format!(
                        "Ark task {} failed: {}",
                        task_id, message
                    )));
                }
            }
        }
    }
}

/// Extract the task ID from a submit response
pub fn parse_task_id(body: &serde_json::Value) -> Result<String> {
    body.get("id")
        .and_then(|id| id.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ForgeError::GenerationFailed(format!(
                "Unexpected Ark submit response: {}",
                serde_json::to_string(body).unwrap_or_default()
            ))
        })
}

/// Interpret a poll response
pub fn parse_task_status(body: &serde_json::Value) -> ArkTaskStatus {
    let status = body
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown");

    match status {
        "succeeded" => {
            let file_url = body
                .get("content")
                .and_then(|c| c.get("file_url"))
                .and_then(|u| u.as_str())
                .map(|s| s.to_string());
            ArkTaskStatus::Succeeded { file_url }
        }
        "failed" | "cancelled" => {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            ArkTaskStatus::Failed(message)
        }
        _ => ArkTaskStatus::Processing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_id() {
        let body = serde_json::json!({ "id": "cgt-2026-abcdef" });
        assert_eq!(parse_task_id(&body).unwrap(), "cgt-2026-abcdef");
    }

    #[test]
    fn test_parse_task_id_missing() {
        let body = serde_json::json!({ "error": { "message": "bad request" } });
        assert!(parse_task_id(&body).is_err());
    }

    #[test]
    fn test_parse_task_status_running() {
        let body = serde_json::json!({ "status": "running" });
        assert_eq!(parse_task_status(&body), ArkTaskStatus::Processing);
    }

    #[test]
    fn test_parse_task_status_succeeded() {
        let body = serde_json::json!({
            "status": "succeeded",
            "content": { "file_url": "https://example.com/model.zip" }
        });
        assert_eq!(
            parse_task_status(&body),
            ArkTaskStatus::Succeeded {
                file_url: Some("https://example.com/model.zip".to_string())
            }
        );
    }

    #[test]
    fn test_parse_task_status_failed() {
        let body = serde_json::json!({
            "status": "failed",
            "error": { "message": "image resolution too low" }
        });
        assert_eq!(
            parse_task_status(&body),
            ArkTaskStatus::Failed("image resolution too low".to_string())
        );
    }
}
