//! Forge CLI - Command-line interface for the generation pipeline

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{associate, batch, generate, providers};

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Turn object descriptions into 3D model assets via AI providers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one model from a description
    Generate {
        /// Object description (Chinese or English)
        description: String,

        /// Industry domain hint (e.g. furniture, power_grid)
        #[arg(long)]
        domain: Option<String>,

        /// Render style hint (e.g. photorealistic, industrial)
        #[arg(long)]
        style: Option<String>,

        /// Mesh quality: low, medium, high
        #[arg(long)]
        quality: Option<String>,

        /// Model file format: glb, obj, fbx
        #[arg(long)]
        format: Option<String>,

        /// Pre-made image prompt; skips the prompt-generation stage
        #[arg(long)]
        prompt: Option<String>,

        /// Text provider override
        #[arg(long)]
        text_provider: Option<String>,

        /// Image provider override
        #[arg(long)]
        image_provider: Option<String>,

        /// 3D model provider override
        #[arg(long)]
        model_provider: Option<String>,

        /// Print the full job record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Expand a category into concrete variant descriptions
    Associate {
        /// Object category (e.g. "椅子", "transformer")
        category: String,

        /// Number of variants to request
        #[arg(long)]
        count: Option<usize>,

        /// Association mode: style, spec, purpose, material, era, region,
        /// comprehensive
        #[arg(long, default_value = "comprehensive")]
        mode: String,

        /// Text provider override
        #[arg(long)]
        provider: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate many models concurrently
    Batch {
        /// Object descriptions, one job each
        descriptions: Vec<String>,

        /// Expand this category via association instead of passing
        /// descriptions
        #[arg(long)]
        from_category: Option<String>,

        /// Variant count when expanding a category
        #[arg(long)]
        count: Option<usize>,

        /// Association mode when expanding a category
        #[arg(long, default_value = "comprehensive")]
        mode: String,

        /// Concurrency cap
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Mesh quality: low, medium, high
        #[arg(long)]
        quality: Option<String>,

        /// Model file format: glb, obj, fbx
        #[arg(long)]
        format: Option<String>,
    },

    /// List registered providers and their configuration state
    Providers,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            description,
            domain,
            style,
            quality,
            format,
            prompt,
            text_provider,
            image_provider,
            model_provider,
            json,
        } => generate::run(generate::GenerateArgs {
            description,
            domain,
            style,
            quality,
            format,
            prompt,
            text_provider,
            image_provider,
            model_provider,
            json,
        }),
        Commands::Associate {
            category,
            count,
            mode,
            provider,
            json,
        } => associate::run(category, count, mode, provider, json),
        Commands::Batch {
            descriptions,
            from_category,
            count,
            mode,
            max_parallel,
            quality,
            format,
        } => batch::run(batch::BatchArgs {
            descriptions,
            from_category,
            count,
            mode,
            max_parallel,
            quality,
            format,
        }),
        Commands::Providers => providers::run(),
    }
}

fn init_logging() {
    // The fmt subscriber's log bridge forwards the library's `log` records
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
