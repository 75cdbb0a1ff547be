//! Batch mode - many images in parallel over one shared service

use super::{read_image, ModelArgs};
use anyhow::{Context as _, Result};
use clap::Args;
use mri_insight_orchestrator::{InferenceOutcome, InferenceService};
use rayon::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Args)]
pub struct BatchCommand {
    /// Input images
    #[arg(value_name = "IMAGES", required = true)]
    inputs: Vec<PathBuf>,

    /// Skip the plausibility gate
    #[arg(long)]
    force: bool,

    /// Directory for `<stem>_overlay.png` files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,
}

impl BatchCommand {
    pub fn execute(self) -> Result<()> {
        info!("Batch: {} input images", self.inputs.len());

        let valid_inputs: Vec<&PathBuf> = self
            .inputs
            .iter()
            .filter(|path| {
                if path.exists() {
                    true
                } else {
                    warn!("Skipping non-existent file: {}", path.display());
                    false
                }
            })
            .collect();
        if valid_inputs.is_empty() {
            anyhow::bail!("No valid input files found");
        }

        if let Some(dir) = &self.output_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let service = self.model.build_service()?;
        let start = Instant::now();
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        valid_inputs.par_iter().for_each(|path| {
            match self.process(&service, path) {
                Ok(outcome) => {
                    completed.fetch_add(1, Ordering::Relaxed);
                    println!("{}", json!({ "file": path.display().to_string(), "outcome": outcome }));
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    error!("{}: {:#}", path.display(), e);
                    println!(
                        "{}",
                        json!({ "file": path.display().to_string(), "error": format!("{e:#}") })
                    );
                }
            }
        });

        let failed = failed.load(Ordering::Relaxed);
        info!(
            "Batch complete: {} succeeded, {} failed in {:.2?}",
            completed.load(Ordering::Relaxed),
            failed,
            start.elapsed()
        );
        if failed > 0 {
            anyhow::bail!("{failed} image(s) failed");
        }
        Ok(())
    }

    fn process(&self, service: &InferenceService, path: &Path) -> Result<InferenceOutcome> {
        let bytes = read_image(path)?;
        let outcome = service.infer(&bytes, self.force)?;

        if let (Some(dir), Some(result)) = (&self.output_dir, outcome.prediction()) {
            let out = dir.join(overlay_name(path));
            std::fs::write(&out, &result.overlay_image_bytes)
                .with_context(|| format!("Failed to write overlay {}", out.display()))?;
        }
        Ok(outcome)
    }
}

fn overlay_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}_overlay.png")
}
