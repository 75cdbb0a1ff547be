//! Artifact discovery and startup validation, without an ONNX backbone

use mri_insight_classifier::head::{BIAS_KEY, TEMPERATURE_KEY, WEIGHT_KEY};
use mri_insight_classifier::{ClassifierError, LinearHead, ModelPaths, OnnxClassifier, OnnxError};
use safetensors::tensor::TensorView;
use safetensors::Dtype;
use std::path::Path;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Head with `classes` rows over 4 features
fn write_head(dir: &Path, classes: usize, temperature: f32) {
    let w = f32_bytes(&vec![0.1; classes * 4]);
    let b = f32_bytes(&vec![0.0; classes]);
    let t = f32_bytes(&[temperature]);
    let tensors = vec![
        (WEIGHT_KEY, TensorView::new(Dtype::F32, vec![classes, 4], &w).unwrap()),
        (BIAS_KEY, TensorView::new(Dtype::F32, vec![classes], &b).unwrap()),
        (TEMPERATURE_KEY, TensorView::new(Dtype::F32, vec![1], &t).unwrap()),
    ];
    let bytes = safetensors::serialize(tensors, &None).unwrap();
    std::fs::write(dir.join("head.safetensors"), bytes).unwrap();
}

fn write_labels(dir: &Path, classes: &[&str]) {
    let json = serde_json::json!({ "classes": classes }).to_string();
    std::fs::write(dir.join("label_map.json"), json).unwrap();
}

#[test]
fn test_head_loads_from_model_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_head(dir.path(), 4, 1.3);
    let paths = ModelPaths::from_dir(dir.path());

    let head = LinearHead::from_safetensors(&paths.head).unwrap();
    assert_eq!(head.num_classes(), 4);
    assert_eq!(head.in_features(), 4);
    assert!((head.temperature() - 1.3).abs() < 1e-6);
}

#[test]
fn test_missing_label_map() {
    let dir = tempfile::tempdir().unwrap();
    write_head(dir.path(), 4, 1.0);
    let err = OnnxClassifier::load(&ModelPaths::from_dir(dir.path()), "features").unwrap_err();
    assert!(matches!(err, ClassifierError::ArtifactNotFound(_)));
}

#[test]
fn test_label_count_must_match_head() {
    let dir = tempfile::tempdir().unwrap();
    write_head(dir.path(), 4, 1.0);
    write_labels(dir.path(), &["glioma", "meningioma", "no_tumor"]);
    let err = OnnxClassifier::load(&ModelPaths::from_dir(dir.path()), "features").unwrap_err();
    assert!(matches!(err, ClassifierError::InvalidHead(_)));
}

#[test]
fn test_missing_backbone() {
    let dir = tempfile::tempdir().unwrap();
    write_head(dir.path(), 4, 1.0);
    write_labels(dir.path(), &["glioma", "meningioma", "no_tumor", "pituitary"]);
    let err = OnnxClassifier::load(&ModelPaths::from_dir(dir.path()), "features").unwrap_err();
    assert!(matches!(err, ClassifierError::Onnx(OnnxError::ModelNotFound(_))));
}

#[test]
fn test_non_positive_temperature_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_head(dir.path(), 4, 0.0);
    let err = LinearHead::from_safetensors(&dir.path().join("head.safetensors")).unwrap_err();
    assert!(matches!(err, ClassifierError::InvalidHead(_)));
}
