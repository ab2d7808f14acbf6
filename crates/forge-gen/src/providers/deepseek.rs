//! DeepSeek text generation provider
//!
//! Speaks the OpenAI-compatible `/chat/completions` API.

use crate::config::ForgeConfig;
use crate::provider::{Capability, Provider, TextOptions};
use crate::providers::{build_agent, classify_http_error, malformed_response};
use forge_core::{ForgeError, ProviderErrorKind, Result};

const DEFAULT_DEEPSEEK_URL: &str = "https://api.deepseek.com/v1";
const DEFAULT_MODEL: &str = "deepseek-chat";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// DeepSeek chat-completion provider
#[derive(Debug)]
pub struct DeepSeekProvider {
    api_key: String,
    api_url: String,
    model: String,
}

impl DeepSeekProvider {
    /// Create a new DeepSeekProvider from config
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let api_key = config
            .api_key("deepseek")
            .ok_or_else(|| {
                ForgeError::provider(
                    ProviderErrorKind::Auth,
                    "DeepSeek API key not configured. Set FORGE_DEEPSEEK_API_KEY or add to .forge/config.toml",
                )
            })?
            .to_string();

        let api_url = config
            .api_url("deepseek")
            .unwrap_or(DEFAULT_DEEPSEEK_URL)
            .to_string();

        let model = config
            .model("deepseek")
            .unwrap_or(DEFAULT_MODEL)
            .to_string();

        Ok(Self {
            api_key,
            api_url,
            model,
        })
    }
}

impl Provider for DeepSeekProvider {
    fn id(&self) -> &str {
        "deepseek"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Text]
    }

    fn generate_text(&self, prompt: &str, options: &TextOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.model);

        let mut payload = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = options.temperature {
            payload["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            payload["max_tokens"] = serde_json::json!(max_tokens);
        }

        let url = format!("{}/chat/completions", self.api_url);
        let agent = build_agent(REQUEST_TIMEOUT_SECS);
        let mut response = agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(&payload)
            .map_err(|e| classify_http_error("DeepSeek", &e))?;

        let body: serde_json::Value = response
            .body_mut()
            .read_json()
            .map_err(|e| malformed_response("DeepSeek", e))?;

        parse_chat_response(&body)
    }
}

/// Extract the assistant message from an OpenAI-compatible chat response
pub fn parse_chat_response(body: &serde_json::Value) -> Result<String> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("");

    if content.is_empty() {
        return Err(ForgeError::GenerationFailed(
            "DeepSeek returned an empty completion".to_string(),
        ));
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let body = serde_json::json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "a red chair" },
                "finish_reason": "stop"
            }],
            "model": "deepseek-chat"
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "a red chair");
    }

    #[test]
    fn test_parse_empty_completion_fails() {
        let body = serde_json::json!({ "choices": [] });
        let err = parse_chat_response(&body).unwrap_err();
        assert!(matches!(err, ForgeError::GenerationFailed(_)));
    }

    #[test]
    fn test_from_config_without_key() {
        let err = DeepSeekProvider::from_config(&ForgeConfig::default()).unwrap_err();
        match err {
            ForgeError::Provider { kind, .. } => assert_eq!(kind, ProviderErrorKind::Auth),
            other => panic!("unexpected error: {}", other),
        }
    }
}
