//! Dataset and image records, labeling progress and image navigation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{deserialize_id, EntityId, Timestamp};

/// Maximum length of a dataset name.
pub const MAX_DATASET_NAME_LENGTH: usize = 100;

/// Maximum length of a dataset description.
pub const MAX_DATASET_DESCRIPTION_LENGTH: usize = 500;

/// A dataset as listed by `GET /datasets/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_count: Option<u64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// One image of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: EntityId,
    pub original_filename: String,
    /// Server-relative URL of the image file.
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub is_labeled: bool,
}

/// Body of `GET /datasets/{id}/images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetImagesResponse {
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

/// Body of `PUT /datasets/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DatasetUpdate {
    /// Name is trimmed and required; both fields are length-limited.
    pub fn validate(&self) -> Result<(), CoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("dataset name is required".to_string()));
        }
        if name.chars().count() > MAX_DATASET_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "dataset name must be at most {MAX_DATASET_NAME_LENGTH} characters"
            )));
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DATASET_DESCRIPTION_LENGTH)
        {
            return Err(CoreError::Validation(format!(
                "dataset description must be at most {MAX_DATASET_DESCRIPTION_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Labeling progress over a dataset's images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelingStats {
    pub total: usize,
    pub annotated: usize,
    pub pending: usize,
}

impl LabelingStats {
    pub fn from_images(images: &[ImageRecord]) -> Self {
        let total = images.len();
        let annotated = images.iter().filter(|img| img.is_labeled).count();
        Self {
            total,
            annotated,
            pending: total - annotated,
        }
    }

    /// Fraction of labeled images in `[0, 1]`; `0` for an empty dataset.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.annotated as f64 / self.total as f64
        }
    }
}

/// Direction of image navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Index reached by stepping once from `current` in a list of `len` images.
///
/// Clamped to the ends of the list, so stepping past either end returns
/// `current` unchanged. Returns `None` for an empty list.
pub fn step_index(current: usize, len: usize, direction: Direction) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = current.min(len - 1);
    Some(match direction {
        Direction::Next => (current + 1).min(len - 1),
        Direction::Previous => current.saturating_sub(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(id: &str, is_labeled: bool) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            original_filename: format!("{id}.jpg"),
            url: format!("/files/{id}.jpg"),
            width: Some(640),
            height: Some(480),
            is_labeled,
        }
    }

    #[test]
    fn stats_count_labeled_images() {
        let images = vec![image("a", true), image("b", false), image("c", true)];
        let stats = LabelingStats::from_images(&images);
        assert_eq!(
            stats,
            LabelingStats {
                total: 3,
                annotated: 2,
                pending: 1
            }
        );
        assert!((stats.progress() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn stats_of_empty_dataset() {
        let stats = LabelingStats::from_images(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.progress(), 0.0);
    }

    #[test]
    fn step_clamps_at_ends() {
        assert_eq!(step_index(0, 3, Direction::Previous), Some(0));
        assert_eq!(step_index(2, 3, Direction::Next), Some(2));
        assert_eq!(step_index(1, 3, Direction::Next), Some(2));
        assert_eq!(step_index(1, 3, Direction::Previous), Some(0));
        assert_eq!(step_index(0, 0, Direction::Next), None);
    }

    #[test]
    fn image_record_parses_backend_shape() {
        let resp: DatasetImagesResponse = serde_json::from_value(json!({
            "images": [{
                "id": 3,
                "original_filename": "street.png",
                "url": "/uploads/street.png",
                "width": 1920,
                "height": 1080,
                "is_labeled": false
            }]
        }))
        .unwrap();
        assert_eq!(resp.images[0].id, "3");
        assert_eq!(resp.images[0].width, Some(1920));
    }

    #[test]
    fn dataset_update_requires_name() {
        let update = DatasetUpdate {
            name: "   ".to_string(),
            description: None,
        };
        assert!(update.validate().is_err());

        let update = DatasetUpdate {
            name: "Night drives".to_string(),
            description: Some("x".repeat(MAX_DATASET_DESCRIPTION_LENGTH + 1)),
        };
        assert!(update.validate().is_err());

        let update = DatasetUpdate {
            name: "Night drives".to_string(),
            description: Some("Low light".to_string()),
        };
        assert!(update.validate().is_ok());
    }
}
