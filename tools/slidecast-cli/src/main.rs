//! Slidecast CLI: command-line interface for lecture video export.
//!
//! Usage:
//!   slidecast export <DRAFT>     Render a draft to a WebM recording
//!   slidecast validate <DRAFT>   Check a draft for structural issues
//!   slidecast info <DRAFT>       Show draft information
//!   slidecast check              Check codecs, fonts, and PDF support

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slidecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "slidecast",
    about = "Turn narrated lecture drafts into recorded slide videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a lecture draft to video
    Export {
        /// Path to the draft JSON file
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output width (config default when omitted)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (config default when omitted)
        #[arg(long)]
        height: Option<u32>,

        /// Output frame rate (config default when omitted)
        #[arg(long)]
        fps: Option<u32>,

        /// On-screen time for slides without narration, in milliseconds
        #[arg(long)]
        slide_duration_ms: Option<u64>,

        /// Print progress as JSON lines instead of a progress line
        #[arg(long)]
        json_progress: bool,
    },

    /// Validate a lecture draft
    Validate {
        /// Path to the draft JSON file
        path: PathBuf,
    },

    /// Show draft information
    Info {
        /// Path to the draft JSON file
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    slidecast_common::logging::init_logging(&logging);
    tracing::debug!(
        path = %cli
            .config
            .clone()
            .unwrap_or_else(slidecast_common::config::config_file_path)
            .display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Export {
            path,
            output,
            width,
            height,
            fps,
            slide_duration_ms,
            json_progress,
        } => {
            let overrides = commands::export::Overrides {
                width,
                height,
                fps,
                slide_duration_ms,
            };
            commands::export::run(&config, path, output, overrides, json_progress).await
        }
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path } => commands::info::run(path),
        Commands::Check => commands::check::run(&config),
    }
}
