//! Editor and persisted annotation shapes and the adapter between them.
//!
//! The canvas works with [`EditorAnnotation`]s: a box as top-left corner
//! plus extent, or a polygon as an ordered vertex list, each tagged with an
//! index into the active [`ClassList`]. The backend stores
//! [`PersistedAnnotation`]s: opposite-corner boxes (always present, derived
//! for polygons) plus an optional flat `segmentation` array.
//!
//! [`to_persisted`] and [`to_editor`] are pure and infallible. Stale class
//! indices resolve to [`UNKNOWN_CLASS_NAME`] and degenerate geometry passes
//! through unchanged; callers that want to reject bad shapes use
//! [`validate_editor_annotation`] first.

use serde::{Deserialize, Serialize};

use crate::classes::{ClassList, UNKNOWN_CLASS_NAME};
use crate::error::CoreError;
use crate::geometry::{
    flatten_points, pair_points, polygon_area, polygon_bounds, BoundingBox, Corners, Point,
};
use crate::threshold_validation::validate_unit_range;
use crate::types::{deserialize_opt_id, EntityId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Confidence assigned to manually drawn annotations.
pub const MANUAL_CONFIDENCE: f64 = 1.0;

/// Minimum number of vertices for a polygon to enclose an area.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Maximum number of vertices accepted for a single polygon.
pub const MAX_POLYGON_POINTS: usize = 5000;

fn default_confidence() -> f64 {
    MANUAL_CONFIDENCE
}

// ---------------------------------------------------------------------------
// Editor shape
// ---------------------------------------------------------------------------

/// Who produced an annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    #[default]
    Manual,
    Ai,
}

/// Geometry of an editor annotation, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Bbox { bbox: BoundingBox },
    Polygon { points: Vec<Point> },
}

impl Shape {
    /// The `type` tag as a string slice.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bbox { .. } => "bbox",
            Self::Polygon { .. } => "polygon",
        }
    }
}

/// In-memory annotation in canvas pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorAnnotation {
    #[serde(flatten)]
    pub shape: Shape,
    /// Position in the active class list; not a stable identifier.
    pub class_index: i64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: AnnotationSource,
}

impl EditorAnnotation {
    /// A manually drawn box.
    pub fn bbox(bbox: BoundingBox, class_index: i64) -> Self {
        Self {
            shape: Shape::Bbox { bbox },
            class_index,
            confidence: MANUAL_CONFIDENCE,
            source: AnnotationSource::Manual,
        }
    }

    /// A manually drawn polygon.
    pub fn polygon(points: Vec<Point>, class_index: i64) -> Self {
        Self {
            shape: Shape::Polygon { points },
            class_index,
            confidence: MANUAL_CONFIDENCE,
            source: AnnotationSource::Manual,
        }
    }

    /// Mark this annotation as machine-generated with the given confidence.
    pub fn with_prediction(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self.source = AnnotationSource::Ai;
        self
    }

    /// Convert to the backend shape, resolving the class name from `classes`.
    pub fn to_persisted(&self, classes: &ClassList) -> PersistedAnnotation {
        let (bbox, segmentation) = match &self.shape {
            Shape::Bbox { bbox } => (bbox.to_corners(), None),
            Shape::Polygon { points } => (polygon_bounds(points), Some(flatten_points(points))),
        };

        PersistedAnnotation {
            id: None,
            class_name: classes.name_for(self.class_index).to_string(),
            class_id: self.class_index,
            confidence: self.confidence,
            bbox,
            segmentation,
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted shape
// ---------------------------------------------------------------------------

/// Annotation as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAnnotation {
    /// Backend identifier; present on load, omitted on save.
    #[serde(
        default,
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<EntityId>,
    #[serde(default = "unknown_class_name")]
    pub class_name: String,
    #[serde(default)]
    pub class_id: i64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// `[x_min, y_min, x_max, y_max]`.
    pub bbox: Corners,
    /// Flat `[x1, y1, x2, y2, ...]` for polygons, `null` for boxes.
    #[serde(default)]
    pub segmentation: Option<Vec<f64>>,
}

fn unknown_class_name() -> String {
    UNKNOWN_CLASS_NAME.to_string()
}

impl PersistedAnnotation {
    /// Convert back to the editor shape.
    ///
    /// The backend does not store the annotation source, so anything below
    /// full confidence is treated as a prediction.
    pub fn to_editor(&self) -> EditorAnnotation {
        let shape = match &self.segmentation {
            Some(flat) => Shape::Polygon {
                points: pair_points(flat),
            },
            None => Shape::Bbox {
                bbox: BoundingBox::from_corners(self.bbox),
            },
        };

        let source = if self.confidence < MANUAL_CONFIDENCE {
            AnnotationSource::Ai
        } else {
            AnnotationSource::Manual
        };

        EditorAnnotation {
            shape,
            class_index: self.class_id,
            confidence: self.confidence,
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Convert editor annotations to the backend shape, preserving order.
pub fn to_persisted(annotations: &[EditorAnnotation], classes: &ClassList) -> Vec<PersistedAnnotation> {
    annotations.iter().map(|a| a.to_persisted(classes)).collect()
}

/// Rebuild editor annotations from a backend response, preserving order.
pub fn to_editor(annotations: &[PersistedAnnotation]) -> Vec<EditorAnnotation> {
    annotations.iter().map(PersistedAnnotation::to_editor).collect()
}

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

/// Body of `GET /annotations/{image_id}/annotations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationsResponse {
    #[serde(default)]
    pub annotations: Vec<PersistedAnnotation>,
}

/// Body of `POST /annotations/{image_id}/annotations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnnotationsRequest {
    pub annotations: Vec<PersistedAnnotation>,
}

/// Reply to a save; only `count` is relied upon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnnotationsResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub image_id: Option<EntityId>,
    #[serde(default)]
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject degenerate or malformed editor annotations.
///
/// Boxes must have finite coordinates and a non-zero area; polygons need
/// between [`MIN_POLYGON_POINTS`] and [`MAX_POLYGON_POINTS`] finite vertices
/// enclosing a non-zero area. Confidence must lie in `[0, 1]`.
pub fn validate_editor_annotation(annotation: &EditorAnnotation) -> Result<(), CoreError> {
    validate_unit_range(annotation.confidence, "confidence")?;

    match &annotation.shape {
        Shape::Bbox { bbox } => {
            if !bbox.is_finite() {
                return Err(CoreError::Validation(
                    "bbox coordinates must be finite numbers".to_string(),
                ));
            }
            if bbox.area() == 0.0 {
                return Err(CoreError::Validation(format!(
                    "bbox has zero area ({}x{})",
                    bbox.width, bbox.height
                )));
            }
        }
        Shape::Polygon { points } => {
            if points.len() < MIN_POLYGON_POINTS {
                return Err(CoreError::Validation(format!(
                    "polygon needs at least {MIN_POLYGON_POINTS} points, got {}",
                    points.len()
                )));
            }
            if points.len() > MAX_POLYGON_POINTS {
                return Err(CoreError::Validation(format!(
                    "polygon has {} points, maximum is {MAX_POLYGON_POINTS}",
                    points.len()
                )));
            }
            if let Some(i) = points.iter().position(|p| !p.is_finite()) {
                return Err(CoreError::Validation(format!(
                    "polygon point {i} has non-finite coordinates"
                )));
            }
            if polygon_area(points) == 0.0 {
                return Err(CoreError::Validation(
                    "polygon encloses zero area".to_string(),
                ));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
