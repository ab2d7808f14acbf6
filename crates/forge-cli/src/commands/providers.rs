//! Provider listing command

use anyhow::Result;
use forge_core::{ForgeError, ProviderErrorKind};
use forge_gen::{available_providers, create_provider, ForgeConfig, Provider};

pub fn run() -> Result<()> {
    let config = ForgeConfig::load()?;

    println!("Registered providers:");
    for id in available_providers() {
        match create_provider(id, &config) {
            Ok(provider) => {
                let capabilities: Vec<String> = provider
                    .capabilities()
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                let enabled = if config.is_enabled(id) { "" } else { "  (disabled)" };
                println!("  {:<10} [{}]{}", id, capabilities.join(", "), enabled);
            }
            Err(ForgeError::Provider {
                kind: ProviderErrorKind::Auth,
                ..
            }) => {
                println!("  {:<10} missing API key (FORGE_{}_API_KEY)", id, id.to_uppercase());
            }
            Err(err) => {
                println!("  {:<10} error: {}", id, err);
            }
        }
    }

    Ok(())
}
