//! Detection model records and import validation.
//!
//! Models are opaque to the client: it only lists, inspects, imports and
//! deletes them, and uses the confidence threshold to filter auto-label
//! predictions.

use serde::{Deserialize, Serialize};

use crate::annotation::EditorAnnotation;
use crate::error::CoreError;
use crate::threshold_validation::validate_unit_range;
use crate::types::{deserialize_id, EntityId};

/// Default confidence threshold when the backend omits one.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Default IoU threshold when the backend omits one.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.45;

/// File extensions accepted for imported model weights.
pub const VALID_WEIGHT_EXTENSIONS: &[&str] = &["pt", "onnx", "weights"];

/// Maximum length of a model name.
pub const MAX_MODEL_NAME_LENGTH: usize = 200;

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_iou_threshold() -> f64 {
    DEFAULT_IOU_THRESHOLD
}

/// A model as returned by `GET /models/` and `GET /models/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub model_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f64,
    #[serde(default)]
    pub is_custom: bool,
}

impl ModelRecord {
    /// Only user-imported models may be deleted; pre-trained ones are
    /// shipped with the backend.
    pub fn can_delete(&self) -> bool {
        self.is_custom
    }

    /// Check that both thresholds lie in `[0, 1]`.
    pub fn validate_thresholds(&self) -> Result<(), CoreError> {
        validate_unit_range(self.confidence_threshold, "confidence_threshold")?;
        validate_unit_range(self.iou_threshold, "iou_threshold")
    }

    /// Keep predictions at or above this model's confidence threshold.
    pub fn filter_predictions(&self, predictions: Vec<EditorAnnotation>) -> Vec<EditorAnnotation> {
        predictions
            .into_iter()
            .filter(|p| p.confidence >= self.confidence_threshold)
            .collect()
    }
}

/// Body of `GET /models/types`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelTypesResponse {
    #[serde(default)]
    pub model_types: Vec<String>,
}

/// A model weights upload, sent as multipart form data.
#[derive(Debug, Clone)]
pub struct ModelImport {
    pub name: String,
    pub description: Option<String>,
    pub model_type: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ModelImport {
    /// Validate the import before uploading.
    ///
    /// `supported_types` is the list from `GET /models/types`; an empty list
    /// skips the type check.
    pub fn validate(&self, supported_types: &[String]) -> Result<(), CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("model name is required".to_string()));
        }
        if name.chars().count() > MAX_MODEL_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "model name must be at most {MAX_MODEL_NAME_LENGTH} characters"
            )));
        }
        validate_weight_file_name(&self.file_name)?;
        if self.bytes.is_empty() {
            return Err(CoreError::Validation("model file is empty".to_string()));
        }
        if !supported_types.is_empty() && !supported_types.iter().any(|t| t == &self.model_type) {
            return Err(CoreError::Validation(format!(
                "Invalid model type '{}'. Must be one of: {}",
                self.model_type,
                supported_types.join(", ")
            )));
        }
        Ok(())
    }
}

/// Validate that a weights file carries one of [`VALID_WEIGHT_EXTENSIONS`].
pub fn validate_weight_file_name(file_name: &str) -> Result<(), CoreError> {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext {
        Some(ext) if VALID_WEIGHT_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "Invalid model file '{file_name}'. Must end in one of: .{}",
            VALID_WEIGHT_EXTENSIONS.join(", .")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use serde_json::json;

    fn record(threshold: f64) -> ModelRecord {
        ModelRecord {
            id: "m1".to_string(),
            name: "yolov8n".to_string(),
            model_type: "yolov8".to_string(),
            description: None,
            classes: vec!["person".to_string()],
            format: Some("pt".to_string()),
            confidence_threshold: threshold,
            iou_threshold: 0.45,
            is_custom: false,
        }
    }

    fn import(name: &str, file_name: &str) -> ModelImport {
        ModelImport {
            name: name.to_string(),
            description: None,
            model_type: "yolov8".to_string(),
            file_name: file_name.to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn model_record_parses_with_defaults() {
        let m: ModelRecord = serde_json::from_value(json!({
            "id": 1,
            "name": "custom",
            "type": "yolov8",
            "is_custom": true
        }))
        .unwrap();
        assert_eq!(m.model_type, "yolov8");
        assert_eq!(m.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert!(m.can_delete());
        assert!(m.validate_thresholds().is_ok());
    }

    #[test]
    fn pretrained_model_cannot_be_deleted() {
        assert!(!record(0.5).can_delete());
    }

    #[test]
    fn thresholds_out_of_range_rejected() {
        let mut m = record(1.2);
        assert!(m.validate_thresholds().is_err());
        m.confidence_threshold = 0.3;
        m.iou_threshold = -0.1;
        assert!(m.validate_thresholds().is_err());
    }

    #[test]
    fn predictions_below_threshold_dropped() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let preds = vec![
            EditorAnnotation::bbox(b, 0).with_prediction(0.95),
            EditorAnnotation::bbox(b, 1).with_prediction(0.40),
            EditorAnnotation::bbox(b, 2).with_prediction(0.60),
        ];
        let kept = record(0.6).filter_predictions(preds);
        let classes: Vec<i64> = kept.iter().map(|a| a.class_index).collect();
        assert_eq!(classes, vec![0, 2]);
    }

    #[test]
    fn import_accepts_known_extensions() {
        assert!(import("det", "best.pt").validate(&[]).is_ok());
        assert!(import("det", "model.ONNX").validate(&[]).is_ok());
        assert!(import("det", "yolo.weights").validate(&[]).is_ok());
    }

    #[test]
    fn import_rejects_bad_extension() {
        let err = import("det", "model.zip").validate(&[]).unwrap_err();
        assert!(err.to_string().contains("Invalid model file"));
        assert!(import("det", "noext").validate(&[]).is_err());
    }

    #[test]
    fn import_rejects_blank_name() {
        assert!(import("  ", "best.pt").validate(&[]).is_err());
    }

    #[test]
    fn import_rejects_unsupported_type() {
        let supported = vec!["yolov5".to_string()];
        let err = import("det", "best.pt").validate(&supported).unwrap_err();
        assert!(err.to_string().contains("Invalid model type 'yolov8'"));
    }

    #[test]
    fn import_rejects_empty_file() {
        let mut imp = import("det", "best.pt");
        imp.bytes.clear();
        assert!(imp.validate(&[]).is_err());
    }
}
