//! ONNX Runtime session construction for the classifier backbone
//!
//! Sessions get full graph optimization, intra-op threads sized to the
//! physical cores, and the best available execution provider (CoreML on
//! macOS, CUDA on NVIDIA GPUs, CPU otherwise).

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Environment variable overriding the intra-op thread count
pub const THREADS_ENV: &str = "MRI_INSIGHT_THREADS";

/// Error type for ONNX operations
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error("Failed to create session builder: {0}")]
    SessionBuilderError(String),

    #[error("Failed to load ONNX model from {path}: {error}")]
    ModelLoadError { path: String, error: String },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),
}

fn intra_threads() -> usize {
    std::env::var(THREADS_ENV)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(num_cpus::get_physical)
}

/// Create an optimized ONNX Runtime session
///
/// If CoreML fails to compile the graph the session is rebuilt with CUDA and
/// CPU only.
///
/// # Errors
/// Returns `ModelNotFound` if the file is missing, otherwise
/// `SessionBuilderError` / `ModelLoadError`
pub fn create_optimized_session(model_path: &Path) -> Result<Session, OnnxError> {
    if !model_path.exists() {
        return Err(OnnxError::ModelNotFound(model_path.display().to_string()));
    }

    let num_threads = intra_threads();
    let start = Instant::now();

    let session = Session::builder()
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_intra_threads(num_threads)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_execution_providers([
            CoreMLExecutionProvider::default().build(),
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ])
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .commit_from_file(model_path);

    match session {
        Ok(s) => {
            debug!(
                "Session created for {} in {:.3}s ({} intra-op threads)",
                model_path.display(),
                start.elapsed().as_secs_f64(),
                num_threads
            );
            Ok(s)
        }
        Err(e) => {
            let error_msg = e.to_string();
            if !(error_msg.contains("CoreML") || error_msg.contains("MLModel")) {
                return Err(OnnxError::ModelLoadError {
                    path: model_path.display().to_string(),
                    error: error_msg,
                });
            }

            warn!(
                "CoreML failed for {}: {}; retrying with CUDA/CPU only",
                model_path.display(),
                error_msg
            );
            create_cpu_cuda_session(model_path, num_threads)
        }
    }
}

fn create_cpu_cuda_session(model_path: &Path, num_threads: usize) -> Result<Session, OnnxError> {
    Session::builder()
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_intra_threads(num_threads)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_execution_providers([
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ])
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| OnnxError::ModelLoadError {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })
}
