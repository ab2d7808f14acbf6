//! Association generator
//!
//! Expands one category ("chair", "transformer") into many concrete variant
//! descriptions along a chosen dimension, via a single structured
//! text-generation round trip. Each variant description must stand on its
//! own as direct pipeline input.

use crate::provider::{Capability, Provider, TextOptions};
use crate::providers::ProviderRegistry;
use forge_core::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Dimension along which variants are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationMode {
    Style,
    Spec,
    Purpose,
    Material,
    Era,
    Region,
    Comprehensive,
}

impl AssociationMode {
    fn dimension_description(&self) -> &'static str {
        match self {
            AssociationMode::Style => {
                "distinct design styles: modern, classical, industrial, minimalist, retro, futuristic, ethnic"
            }
            AssociationMode::Spec => {
                "distinct specifications: physical size, power rating, capacity, precision class"
            }
            AssociationMode::Purpose => {
                "distinct usage scenarios: household, commercial, industrial, outdoor, medical, educational"
            }
            AssociationMode::Material => {
                "distinct primary materials: wood, metal, plastic, glass, ceramic, fabric, leather"
            }
            AssociationMode::Era => {
                "distinct historical eras: ancient, early-industrial, contemporary, science-fiction"
            }
            AssociationMode::Region => {
                "distinct regional characters: Chinese, Japanese, European, American, Nordic, Mediterranean"
            }
            AssociationMode::Comprehensive => {
                "a balanced mix of styles, specifications, purposes and materials"
            }
        }
    }
}

impl fmt::Display for AssociationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssociationMode::Style => "style",
            AssociationMode::Spec => "spec",
            AssociationMode::Purpose => "purpose",
            AssociationMode::Material => "material",
            AssociationMode::Era => "era",
            AssociationMode::Region => "region",
            AssociationMode::Comprehensive => "comprehensive",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AssociationMode {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "style" => Ok(AssociationMode::Style),
            "spec" => Ok(AssociationMode::Spec),
            "purpose" => Ok(AssociationMode::Purpose),
            "material" => Ok(AssociationMode::Material),
            "era" => Ok(AssociationMode::Era),
            "region" => Ok(AssociationMode::Region),
            "comprehensive" => Ok(AssociationMode::Comprehensive),
            other => Err(ForgeError::InvalidArgument(format!(
                "Unknown association mode '{}'. Expected: style, spec, purpose, material, era, region, comprehensive",
                other
            ))),
        }
    }
}

/// One generated variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    /// Self-contained description, usable directly as pipeline input
    pub description: String,
    /// Key distinguishing attributes (material, color, size, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of one association call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationResult {
    pub category: String,
    pub mode: AssociationMode,
    /// How many variants were asked for; `variants.len()` is how many the
    /// provider actually produced
    pub requested: usize,
    pub variants: Vec<Variant>,
}

/// Expands categories into variant lists through a text provider
pub struct AssociationGenerator {
    registry: Arc<ProviderRegistry>,
    provider_id: String,
}

impl AssociationGenerator {
    pub fn new(registry: Arc<ProviderRegistry>, provider_id: &str) -> Self {
        Self {
            registry,
            provider_id: provider_id.to_string(),
        }
    }

    /// Generate `count` variants of `category` along `mode`.
    ///
    /// Fewer than `count` parseable variants is tolerated and observable
    /// through the result; zero is `GenerationFailed`. Duplicate names are
    /// passed through untouched.
    pub fn generate(
        &self,
        category: &str,
        count: usize,
        mode: AssociationMode,
    ) -> Result<AssociationResult> {
        if category.trim().is_empty() {
            return Err(ForgeError::InvalidArgument(
                "Category must not be empty".to_string(),
            ));
        }
        if count == 0 {
            return Err(ForgeError::InvalidArgument(
                "Variant count must be a positive integer".to_string(),
            ));
        }

        let provider = self.registry.resolve(&self.provider_id, Capability::Text)?;
        let instruction = build_association_instruction(category.trim(), count, mode);
        let response = provider.generate_text(
            &instruction,
            &TextOptions {
                // Higher temperature for variant diversity
                temperature: Some(0.8),
                max_tokens: Some(8000),
                model: None,
            },
        )?;

        let variants = parse_variants(&response);
        if variants.is_empty() {
            return Err(ForgeError::GenerationFailed(format!(
                "Association for '{}' returned no parseable variants",
                category
            )));
        }
        if variants.len() < count {
            log::warn!(
                "Association for '{}' produced {}/{} variants",
                category,
                variants.len(),
                count
            );
        }

        Ok(AssociationResult {
            category: category.trim().to_string(),
            mode,
            requested: count,
            variants,
        })
    }
}

/// Build the structured instruction for the text provider
pub fn build_association_instruction(
    category: &str,
    count: usize,
    mode: AssociationMode,
) -> String {
    format!(
        "You are a product designer enumerating concrete instances of an object category \
         for 3D modeling.\n\n\
         Category: {category}\n\
         Produce exactly {count} clearly different items, varied across {dimension}.\n\n\
         Rules:\n\
         - Every item is a specific, buildable object, not an abstract concept.\n\
         - Every description is fully self-contained: it names the object and its \
         appearance without referring back to the category or to other items.\n\
         - Descriptions cover shape, materials, colors and key components in 50-100 words.\n\n\
         Respond with a JSON array only. Each element:\n\
         {{\"name\": \"specific item name\", \"description\": \"self-contained appearance \
         description\", \"attributes\": {{\"material\": \"...\", \"color\": \"...\", \
         \"size\": \"...\"}}, \"tags\": [\"tag1\", \"tag2\"]}}",
        category = category,
        count = count,
        dimension = mode.dimension_description(),
    )
}

/// Parse the provider's response into variants.
///
/// Accepts a bare JSON array or one embedded in surrounding prose/fences.
/// Entries missing a name or description are dropped; nothing is padded.
pub fn parse_variants(response: &str) -> Vec<Variant> {
    let value = match serde_json::from_str::<serde_json::Value>(response) {
        Ok(v) => Some(v),
        Err(_) => extract_json_array(response)
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok()),
    };

    let items = match value.as_ref().and_then(|v| v.as_array()) {
        Some(items) => items,
        None => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim();
            let description = item.get("description")?.as_str()?.trim();
            if name.is_empty() || description.is_empty() {
                return None;
            }

            let attributes = item
                .get("attributes")
                .or_else(|| item.get("specifications"))
                .and_then(|a| a.as_object())
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| {
                            let rendered = match v.as_str() {
                                Some(s) => s.to_string(),
                                None => v.to_string(),
                            };
                            (k.clone(), rendered)
                        })
                        .collect()
                })
                .unwrap_or_default();

            let tags = item
                .get("tags")
                .and_then(|t| t.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|t| t.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();

            Some(Variant {
                name: name.to_string(),
                description: description.to_string(),
                attributes,
                tags,
            })
        })
        .collect()
}

fn extract_json_array(raw: &str) -> Option<String> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
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

    #[derive(Debug)]
    struct FixedText(String);
    impl Provider for FixedText {
        fn id(&self) -> &str {
            "stub-text"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Text]
        }
        fn generate_text(&self, _p: &str, _o: &TextOptions) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn generator_with(response: &str) -> AssociationGenerator {
        let registry = Arc::new(ProviderRegistry::new(ForgeConfig::default()));
        registry.register(Arc::new(FixedText(response.to_string())));
        AssociationGenerator::new(registry, "stub-text")
    }

    const TWO_CHAIRS: &str = r#"[
        {"name": "Modern office chair", "description": "A swivel office chair with a black mesh back, contoured foam seat, polished five-star aluminum base and smooth casters", "attributes": {"material": "mesh and aluminum", "color": "black"}, "tags": ["office"]},
        {"name": "Oak dining chair", "description": "A solid oak dining chair with a carved vertical-slat backrest, tapered legs and a warm walnut stain", "attributes": {"material": "oak", "color": "walnut brown"}}
    ]"#;

    #[test]
    fn test_generate_returns_variants() {
        let generator = generator_with(TWO_CHAIRS);
        let result = generator.generate("椅子", 5, AssociationMode::Style).unwrap();

        assert_eq!(result.mode, AssociationMode::Style);
        assert_eq!(result.category, "椅子");
        assert_eq!(result.requested, 5);
        // Under-count is tolerated and observable
        assert_eq!(result.variants.len(), 2);
        for variant in &result.variants {
            assert!(!variant.name.is_empty());
            assert!(variant.description.len() > 20);
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        let generator = generator_with(TWO_CHAIRS);
        let err = generator
            .generate("椅子", 0, AssociationMode::Style)
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_category_rejected() {
        let generator = generator_with(TWO_CHAIRS);
        let err = generator
            .generate("  ", 5, AssociationMode::Style)
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_unparseable_response_is_generation_failed() {
        let generator = generator_with("Sorry, I cannot help with that.");
        let err = generator
            .generate("chair", 3, AssociationMode::Material)
            .unwrap_err();
        assert!(matches!(err, ForgeError::GenerationFailed(_)));
    }

    #[test]
    fn test_parse_variants_fenced_array() {
        let response = format!("Here you go:\n```json\n{}\n```", TWO_CHAIRS);
        let variants = parse_variants(&response);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].name, "Modern office chair");
        assert_eq!(
            variants[0].attributes.get("material").unwrap(),
            "mesh and aluminum"
        );
        assert_eq!(variants[0].tags, vec!["office"]);
    }

    #[test]
    fn test_parse_variants_drops_incomplete_entries() {
        let response = r#"[
            {"name": "Complete", "description": "A fully described green item with a steel frame"},
            {"name": "", "description": "Nameless"},
            {"description": "No name field at all"},
            {"name": "No description"}
        ]"#;
        let variants = parse_variants(response);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].name, "Complete");
    }

    #[test]
    fn test_parse_variants_coerces_non_string_attributes() {
        let response = r#"[
            {"name": "Item", "description": "An item with numeric specs and a sturdy base", "attributes": {"weight_kg": 12.5, "legs": 4}}
        ]"#;
        let variants = parse_variants(response);
        assert_eq!(variants[0].attributes.get("weight_kg").unwrap(), "12.5");
        assert_eq!(variants[0].attributes.get("legs").unwrap(), "4");
    }

    #[test]
    fn test_duplicate_names_are_observable() {
        let response = r#"[
            {"name": "Twin", "description": "A red-painted item with rounded corners and a gloss finish"},
            {"name": "Twin", "description": "A blue-painted item with square corners and a matte finish"}
        ]"#;
        let variants = parse_variants(response);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].name, variants[1].name);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(
            "comprehensive".parse::<AssociationMode>().unwrap(),
            AssociationMode::Comprehensive
        );
        assert!(matches!(
            "vibes".parse::<AssociationMode>().unwrap_err(),
            ForgeError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_instruction_contains_contract() {
        let instruction =
            build_association_instruction("transformer", 7, AssociationMode::Spec);
        assert!(instruction.contains("transformer"));
        assert!(instruction.contains("exactly 7"));
        assert!(instruction.contains("JSON array"));
    }
}
