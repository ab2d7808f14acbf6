//! Mock provider for dry runs and testing
//!
//! Produces deterministic references derived from the input without any
//! network calls. Text output echoes a condensed prompt; when the
//! instruction asks for a JSON array (the association contract), a small
//! canned variant list is returned instead so dry runs stay parseable.

use crate::provider::{Capability, ImageOptions, ModelOptions, Provider, TextOptions};
use forge_core::Result;

/// A mock provider implementing all three capabilities locally
#[derive(Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

fn reference_hash(input: &str) -> u32 {
    input
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

impl Provider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Text, Capability::Image, Capability::Model]
    }

    fn generate_text(&self, prompt: &str, _options: &TextOptions) -> Result<String> {
        if prompt.contains("JSON array") {
            return Ok(serde_json::json!([
                {
                    "name": "Modern variant",
                    "description": "A clean-lined modern interpretation with matte surfaces and slim proportions",
                    "attributes": { "material": "aluminum", "color": "matte black" }
                },
                {
                    "name": "Classic variant",
                    "description": "A traditional interpretation in solid oak with carved detailing",
                    "attributes": { "material": "oak", "color": "walnut brown" }
                },
                {
                    "name": "Industrial variant",
                    "description": "A rugged workshop interpretation with exposed steel framing and rivets",
                    "attributes": { "material": "steel", "color": "gunmetal gray" }
                }
            ])
            .to_string());
        }

        Ok(format!(
            "{}, photorealistic product render, studio lighting, neutral gradient background",
            prompt.lines().next().unwrap_or(prompt).trim()
        ))
    }

    fn generate_image(&self, prompt: &str, _options: &ImageOptions) -> Result<String> {
        Ok(format!("mock://image/{:08x}.png", reference_hash(prompt)))
    }

    fn generate_model(&self, image_ref: &str, options: &ModelOptions) -> Result<String> {
        Ok(format!(
            "mock://model/{:08x}.{}",
            reference_hash(image_ref),
            options.format
        ))
    }
}
