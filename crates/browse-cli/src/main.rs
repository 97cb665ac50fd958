//! # browse-cli
//!
//! Binary entry point for Browse.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Configuration and provider setup
//! - The interactive session loop (`browse`)
//! - One-shot runs with optional JSON output (`browse run`)

mod interactive;
mod one_shot;

use anyhow::{Context, Result};
use browse_adapters::{AzureOpenAiModel, ProcessEngine, ProcessEngineConfig};
use browse_core::{BrowseConfig, EngineConfig, ProviderConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{IsTerminal, stdout};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Returns true if colors should be used based on mode and terminal detection.
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// Browse - AI browser automation with a human in the loop
#[derive(Parser, Debug)]
#[command(name = "browse", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "browse.yml", global = true)]
    config: PathBuf,

    /// Verbose output (detailed step logs and debug diagnostics)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single task and exit (interactive session if no subcommand given)
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// The task to carry out
    task: String,

    /// Print the result as JSON on stdout; everything else goes to stderr
    #[arg(long)]
    json: bool,
}

/// Everything a run needs that is set up once per process.
pub struct Setup {
    pub config: BrowseConfig,
    pub model: AzureOpenAiModel,
    pub deployment: String,
}

impl Setup {
    /// Fresh engine bridge for one task.
    pub fn engine(&self) -> ProcessEngine {
        build_engine(&self.config.engine)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so they never mix with prompts or JSON output
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    colored::control::set_override(cli.color.should_use_colors());

    let config = load_config(&cli.config, |name| std::env::var(name).ok())?;
    let provider =
        ProviderConfig::from_env().context("Language model provider is not configured")?;
    debug!(?provider, "Provider configured");

    let model = AzureOpenAiModel::new(
        provider.endpoint.clone(),
        provider.api_key.clone(),
        provider.deployment.clone(),
        provider.api_version.clone(),
    )
    .context("Failed to set up the language model client")?;

    let setup = Setup {
        config,
        model,
        deployment: provider.deployment,
    };

    match cli.command {
        Some(Commands::Run(args)) => {
            let success = one_shot::run(&setup, &args.task, args.json).await?;
            if !success {
                std::process::exit(1);
            }
            Ok(())
        }
        None => {
            tokio::select! {
                result = interactive::run(&setup, cli.verbose) => result,
                _ = tokio::signal::ctrl_c() => exit_on_interrupt(),
            }
        }
    }
}

/// Says goodbye after Ctrl+C and ends the process.
///
/// Exits directly: a prompt's blocking stdin read would otherwise keep the
/// runtime from shutting down.
fn exit_on_interrupt() -> ! {
    let _ = crossterm::terminal::disable_raw_mode();
    println!();
    println!("Goodbye!");
    std::process::exit(0);
}

/// Loads the config file if present, applies environment overrides, and
/// validates the result.
fn load_config<F>(path: &Path, lookup: F) -> Result<BrowseConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if path.exists() {
        BrowseConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?
    } else {
        warn!("Config file {:?} not found, using defaults", path);
        BrowseConfig::default()
    };

    config.apply_env(lookup);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_engine(config: &EngineConfig) -> ProcessEngine {
    ProcessEngine::new(ProcessEngineConfig::new(
        config.command.clone(),
        config.args.clone(),
    ))
}
