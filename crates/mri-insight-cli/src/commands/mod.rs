pub mod batch;
pub mod check;
pub mod predict;

use anyhow::{Context as _, Result};
use clap::Args;
use mri_insight_orchestrator::{InferenceConfig, InferenceService};
use std::path::{Path, PathBuf};

/// Model and configuration flags shared by the inference commands
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Directory holding backbone.onnx, head.safetensors and label_map.json
    #[arg(long, env = "MRI_INSIGHT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// YAML inference configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Load the YAML config (or defaults)
pub fn load_config(path: Option<&Path>) -> Result<InferenceConfig> {
    match path {
        Some(path) => InferenceConfig::from_yaml(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(InferenceConfig::default()),
    }
}

impl ModelArgs {
    /// YAML config with `--model-dir` (or its env var) applied on top
    pub fn resolve_config(&self) -> Result<InferenceConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(dir) = &self.model_dir {
            config.model.dir = dir.clone();
        }
        Ok(config)
    }

    pub fn build_service(&self) -> Result<InferenceService> {
        let config = self.resolve_config()?;
        InferenceService::load(&config).with_context(|| {
            format!(
                "Failed to start inference service from {}",
                config.model.dir.display()
            )
        })
    }
}

pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}
