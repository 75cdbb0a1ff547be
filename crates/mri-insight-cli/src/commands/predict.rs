//! Single-image inference

use super::{read_image, ModelArgs};
use anyhow::{Context as _, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct PredictCommand {
    /// Input image (PNG, JPEG, ...)
    #[arg(value_name = "IMAGE")]
    input: PathBuf,

    /// Skip the plausibility gate
    #[arg(long)]
    force: bool,

    /// Write the overlay PNG here
    #[arg(long, value_name = "PNG")]
    overlay: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,
}

impl PredictCommand {
    pub fn execute(self) -> Result<()> {
        let service = self.model.build_service()?;
        let bytes = read_image(&self.input)?;
        let outcome = service
            .infer(&bytes, self.force)
            .with_context(|| format!("Inference failed for {}", self.input.display()))?;

        if let (Some(path), Some(result)) = (&self.overlay, outcome.prediction()) {
            std::fs::write(path, &result.overlay_image_bytes)
                .with_context(|| format!("Failed to write overlay {}", path.display()))?;
            info!("Overlay written to {}", path.display());
        }

        println!("{}", serde_json::to_string_pretty(&outcome)?);
        Ok(())
    }
}
