//! Plausibility gate only; no model is loaded

use super::{load_config, read_image};
use anyhow::{Context as _, Result};
use clap::Args;
use mri_insight_orchestrator::check_bytes;
use mri_insight_plausibility::{PlausibilityGate, PlausibilityVerdict};
use serde_json::json;
use std::path::PathBuf;

#[derive(Args)]
pub struct CheckCommand {
    /// Input image
    #[arg(value_name = "IMAGE")]
    input: PathBuf,

    /// YAML inference configuration (only the gate section is used)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl CheckCommand {
    pub fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let gate = PlausibilityGate::new(config.gate);
        let bytes = read_image(&self.input)?;
        let verdict = check_bytes(&gate, &bytes)
            .with_context(|| format!("Failed to check {}", self.input.display()))?;

        let output = match verdict {
            PlausibilityVerdict::Pass => json!({ "ok": true }),
            PlausibilityVerdict::Warning(warning) => json!({ "warning": warning }),
        };
        println!("{output}");
        Ok(())
    }
}
