//! Gemini text and image generation provider
//!
//! Speaks the native `generateContent` API. Image output arrives as inline
//! base64 data and is returned as a data URL reference, which the Ark
//! provider accepts directly as image input.

use crate::config::ForgeConfig;
use crate::provider::{Capability, ImageOptions, Provider, TextOptions};
use crate::providers::{build_agent, classify_http_error, malformed_response};
use forge_core::{ForgeError, ProviderErrorKind, Result};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const TEXT_MODEL: &str = "gemini-2.0-flash";
const IMAGE_MODEL: &str = "gemini-2.0-flash-exp-image-generation";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Gemini provider for text and image generation
#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    api_url: String,
}

impl GeminiProvider {
    /// Create a new GeminiProvider from config
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let api_key = config
            .api_key("gemini")
            .ok_or_else(|| {
                ForgeError::provider(
                    ProviderErrorKind::Auth,
                    "Gemini API key not configured. Set FORGE_GEMINI_API_KEY or add to .forge/config.toml",
                )
            })?
            .to_string();

        let api_url = config
            .api_url("gemini")
            .unwrap_or(DEFAULT_GEMINI_URL)
            .to_string();

        Ok(Self { api_key, api_url })
    }

    fn generate_content(
        &self,
        model: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/models/{}:generateContent", self.api_url, model);
        let agent = build_agent(REQUEST_TIMEOUT_SECS);
        let mut response = agent
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send_json(payload)
            .map_err(|e| classify_http_error("Gemini", &e))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| malformed_response("Gemini", e))
    }
}

impl Provider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Text, Capability::Image]
    }

    fn generate_text(&self, prompt: &str, options: &TextOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(TEXT_MODEL);

        let mut payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if options.temperature.is_some() || options.max_tokens.is_some() {
            let mut generation_config = serde_json::Map::new();
            if let Some(t) = options.temperature {
                generation_config.insert("temperature".to_string(), serde_json::json!(t));
            }
            if let Some(m) = options.max_tokens {
                generation_config.insert("maxOutputTokens".to_string(), serde_json::json!(m));
            }
            payload["generationConfig"] = serde_json::Value::Object(generation_config);
        }

        let body = self.generate_content(model, &payload)?;
        parse_text_parts(&body)
    }

    fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(IMAGE_MODEL);

        // The image model takes the negative prompt inline, not as a
        // separate parameter
        let full_prompt = match &options.negative_prompt {
            Some(neg) => format!("{}\n\nNegative: {}", prompt, neg),
            None => prompt.to_string(),
        };

        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": full_prompt }] }],
            "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] },
        });

        let body = self.generate_content(model, &payload)?;
        parse_inline_image(&body)
    }
}

fn response_parts(body: &serde_json::Value) -> Option<&Vec<serde_json::Value>> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()
}

/// Concatenate the text parts of a `generateContent` response
pub fn parse_text_parts(body: &serde_json::Value) -> Result<String> {
    let text: String = response_parts(body)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ForgeError::GenerationFailed(
            "Gemini returned no text content".to_string(),
        ));
    }

    Ok(text)
}

/// Extract the first inline image of a `generateContent` response as a
/// data URL
pub fn parse_inline_image(body: &serde_json::Value) -> Result<String> {
    let parts = response_parts(body).ok_or_else(|| {
        ForgeError::GenerationFailed("Gemini response has no content parts".to_string())
    })?;

    for part in parts {
        if let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) {
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(|m| m.as_str())
                .unwrap_or("image/png");
            if let Some(data) = inline.get("data").and_then(|d| d.as_str()) {
                return Ok(format!("data:{};base64,{}", mime, data));
            }
        }
    }

    Err(ForgeError::GenerationFailed(
        "Gemini response contained no image data".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "A tall " }, { "text": "oak chair" }] }
            }]
        });
        assert_eq!(parse_text_parts(&body).unwrap(), "A tall oak chair");
    }

    #[test]
    fn test_parse_text_parts_empty_fails() {
        let body = serde_json::json!({ "candidates": [] });
        assert!(matches!(
            parse_text_parts(&body).unwrap_err(),
            ForgeError::GenerationFailed(_)
        ));
    }

    #[test]
    fn test_parse_inline_image() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your image." },
                        { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
                    ]
                }
            }]
        });
        let reference = parse_inline_image(&body).unwrap();
        assert_eq!(reference, "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_parse_inline_image_snake_case_fields() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "inline_data": { "mime_type": "image/jpeg", "data": "YWJj" } }
                    ]
                }
            }]
        });
        let reference = parse_inline_image(&body).unwrap();
        assert_eq!(reference, "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn test_parse_inline_image_text_only_fails() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "no image, sorry" }] }
            }]
        });
        assert!(matches!(
            parse_inline_image(&body).unwrap_err(),
            ForgeError::GenerationFailed(_)
        ));
    }
}
