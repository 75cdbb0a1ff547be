//! MRI Insight CLI - brain MRI tumor classification with Grad-CAM overlays
//!
//! Command-line host for the inference service.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

use commands::batch::BatchCommand;
use commands::check::CheckCommand;
use commands::predict::PredictCommand;

#[derive(Parser)]
#[command(
    name = "mri-insight",
    version,
    about = "Brain MRI tumor classification with visual explanations",
    long_about = "Classify a brain MRI slice into a tumor category, explain the decision with a\n\
                  Grad-CAM heatmap overlay, and gate implausible inputs before they reach the model.",
    after_help = "EXAMPLES:\n  \
                  # Classify one image and save the overlay\n  \
                  mri-insight predict scan.png --overlay scan_overlay.png\n\n  \
                  # Skip the plausibility gate\n  \
                  mri-insight predict scan.jpg --force\n\n  \
                  # Classify many images in parallel\n  \
                  mri-insight batch --output-dir ./overlays scans/*.png\n\n  \
                  # Only run the plausibility gate\n  \
                  mri-insight check scan.png\n\n\
                  The model directory defaults to $MRI_INSIGHT_MODEL_DIR or models/brain-mri."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one image and print the JSON outcome
    Predict(PredictCommand),

    /// Classify several images in parallel, one JSON line per image
    Batch(BatchCommand),

    /// Run only the plausibility gate
    Check(CheckCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // RUST_LOG takes precedence over --verbose
    let installed = match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
        }
        Err(_) => tracing::subscriber::set_global_default(builder.finish()),
    };
    installed.context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Predict(cmd) => cmd.execute(),
        Commands::Batch(cmd) => cmd.execute(),
        Commands::Check(cmd) => cmd.execute(),
    }
}
