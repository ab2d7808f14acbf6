//! Category association command

use anyhow::Result;
use forge_gen::{AssociationGenerator, AssociationMode, ForgeConfig, ProviderRegistry};
use std::sync::Arc;

pub fn run(
    category: String,
    count: Option<usize>,
    mode: String,
    provider: Option<String>,
    json: bool,
) -> Result<()> {
    let config = ForgeConfig::load()?;
    let count = count.unwrap_or(config.generation.association_count);
    let provider_id = provider.unwrap_or_else(|| config.generation.text_provider.clone());
    let mode = mode.parse::<AssociationMode>()?;

    let registry = Arc::new(ProviderRegistry::new(config));
    let generator = AssociationGenerator::new(registry, &provider_id);

    println!(
        "Expanding '{}' into {} variants ({} mode) via {}...",
        category, count, mode, provider_id
    );
    let result = generator.generate(&category, count, mode)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "Got {}/{} variants:",
        result.variants.len(),
        result.requested
    );
    for (i, variant) in result.variants.iter().enumerate() {
        println!("\n{}. {}", i + 1, variant.name);
        println!("   {}", variant.description);
        if !variant.attributes.is_empty() {
            let attrs: Vec<String> = variant
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("   [{}]", attrs.join(", "));
        }
    }

    Ok(())
}
