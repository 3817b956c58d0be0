//! Domain errors shared by every labelforge crate.

use crate::types::EntityId;

/// Failures raised by domain logic before or instead of any network call.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An image, annotation or model index/id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: EntityId },

    /// Malformed geometry, names, thresholds or uploads.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate class names, or deleting a model that may not be deleted.
    #[error("Conflict: {0}")]
    Conflict(String),
}
