//! Class label map (`{"classes": [...]}`), index-aligned with the head rows

use crate::ClassifierError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    pub classes: Vec<String>,
}

impl LabelMap {
    /// Load and validate a label map from disk
    ///
    /// # Errors
    /// Returns an error if the file is missing, malformed or lists no classes
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ArtifactNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ClassifierError::ArtifactRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&contents)
    }

    /// # Errors
    /// Returns `InvalidLabelMap` for malformed JSON, no classes, or blank names
    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        let map: LabelMap =
            serde_json::from_str(json).map_err(|e| ClassifierError::InvalidLabelMap(e.to_string()))?;

        if map.classes.is_empty() {
            return Err(ClassifierError::InvalidLabelMap("no classes listed".to_string()));
        }
        if map.classes.iter().any(|c| c.trim().is_empty()) {
            return Err(ClassifierError::InvalidLabelMap("blank class name".to_string()));
        }
        Ok(map)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
