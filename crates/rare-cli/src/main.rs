//! rare-cli - Command-line tool for rare event detection
//!
//! Talks to a rare event detection backend: uploads the captioned reference
//! set, classifies and describes images, and generates new ones from text.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rare_client::{RareClient, RareClientError};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

/// Connect timeout for all requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "rare-cli")]
#[command(author, version, about = "Rare Event Detection CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Backend URL [default: http://localhost:8000]
    #[arg(short, long, env = "RARE_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "RARE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format [default: table]
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Request timeout in seconds [default: 120]
    #[arg(long)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is running
    Health,

    /// Show the backend's API banner and endpoints
    Info,

    /// Upload the 4 reference images with captions
    Upload {
        /// Reference image path (repeat 4 times, in order)
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,

        /// Caption for the matching --image (repeat 4 times, in order)
        #[arg(long = "caption", value_name = "TEXT")]
        captions: Vec<String>,

        /// TOML manifest with [[reference]] image/caption entries
        #[arg(long, conflicts_with_all = ["images", "captions"])]
        manifest: Option<PathBuf>,
    },

    /// Classify an image as Rare Event or Normal
    Classify {
        /// Image file
        file: PathBuf,
    },

    /// Generate a description for an image
    Describe {
        /// Image file
        file: PathBuf,
    },

    /// Generate a synthetic image from a caption
    Generate {
        /// Text caption
        caption: String,

        /// Write the generated image to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Exercise every endpoint with synthetic images
    Smoke {
        /// Directory to write the generated image into
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Phrase used in "Failed to ..." messages
    fn action(&self) -> &'static str {
        match self {
            Commands::Health => "reach the backend",
            Commands::Info => "fetch API info",
            Commands::Upload { .. } => "upload references",
            Commands::Classify { .. } => "classify image",
            Commands::Describe { .. } => "describe image",
            Commands::Generate { .. } => "generate image",
            Commands::Smoke { .. } => "run smoke test",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let action = cli.command.action();
    let no_color = cli.no_color;

    if let Err(err) = run(cli).await {
        let message = match err.downcast_ref::<RareClientError>() {
            Some(client_err) => commands::failure_message(client_err, action),
            None => format!("{:#}", err),
        };
        tracing::debug!(error = ?err, "command failed");
        OutputContext::new(OutputFormat::Table, no_color, false).error(&message);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.output.map(|o| o.as_str()),
        cli.no_color,
        cli.timeout,
    );

    let ctx = OutputContext::new(
        OutputFormat::from_config(&merged.output),
        merged.no_color,
        cli.quiet,
    );

    let client = create_client(&merged.server, merged.timeout)?;

    match &cli.command {
        Commands::Health => commands::health(&client, &ctx).await?,

        Commands::Info => commands::info(&client, &ctx).await?,

        Commands::Upload {
            images,
            captions,
            manifest,
        } => {
            commands::upload(&client, images, captions, manifest.as_deref(), &ctx).await?;
        }

        Commands::Classify { file } => commands::classify(&client, file, &ctx).await?,

        Commands::Describe { file } => commands::describe(&client, file, &ctx).await?,

        Commands::Generate { caption, save } => {
            commands::generate(&client, caption, save.as_deref(), &ctx).await?;
        }

        Commands::Smoke { save_dir } => {
            commands::smoke(&client, save_dir.as_deref(), &ctx).await?;
        }
    }

    Ok(())
}

/// Create a client for the given backend URL
fn create_client(server: &str, timeout: Duration) -> Result<RareClient> {
    RareClient::with_config(server, timeout, CONNECT_TIMEOUT)
        .with_context(|| format!("Failed to create client for {}", server))
}
