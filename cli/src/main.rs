//! Easel command line.
//!
//! Inspects settings and templates, and builds model descriptors from model
//! folders so a layout can be checked before it is handed to the service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{logging::init_tracing, Settings};
use easel_model_registry::ModelRegistry;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "easel")]
#[command(about = "Easel - diffusion model registry and residency tooling")]
#[command(version)]
struct CliArgs {
    /// Settings file (TOML); defaults apply when absent
    #[arg(long, short = 's', env = "EASEL_SETTINGS")]
    settings: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved settings
    Settings,

    /// List model templates, built-in and user-defined
    Templates,

    /// Build a base model descriptor from a model folder
    Register {
        /// Unique model name
        name: String,
        /// Folder containing unet/, vae_decoder/, ...
        folder: PathBuf,
        /// Template name, e.g. "SDXL"
        #[arg(long, short = 't', default_value = "SD")]
        template: String,
    },

    /// Build an upscaler descriptor from a model file
    Upscaler {
        name: String,
        file: PathBuf,
        #[arg(long, short = 't', default_value = "Upscale-2x")]
        template: String,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path).with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_level);

    let settings = load_settings(args.settings.as_ref())?;
    let provider = easel_execution_providers::resolve_supported(settings.execution.provider);
    info!("Execution provider: {}", provider);

    let registry = ModelRegistry::new(&settings);
    match args.command {
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Templates => {
            for name in registry.factory().templates().names() {
                println!("{}", name);
            }
        }
        Command::Register { name, folder, template } => {
            let descriptor = registry
                .create_from_template_name(&name, &folder, &template)
                .with_context(|| format!("Failed to register '{}'", name))?;
            println!("{}", serde_json::to_string_pretty(descriptor.as_ref())?);
        }
        Command::Upscaler { name, file, template } => {
            let descriptor = registry
                .create_upscaler(&name, &file, &template)
                .with_context(|| format!("Failed to register upscaler '{}'", name))?;
            println!("{}", serde_json::to_string_pretty(descriptor.as_ref())?);
        }
    }
    Ok(())
}
