//! Auto-labeling seam.
//!
//! The session asks an [`AutoLabeler`] for predictions on the current image
//! and filters them by the model's confidence threshold. Real inference lives
//! outside this crate; [`SimulatedAutoLabeler`] returns a fixed pair of
//! detections after a delay.

use std::time::Duration;

use async_trait::async_trait;

use labelforge_core::annotation::EditorAnnotation;
use labelforge_core::dataset::ImageRecord;
use labelforge_core::geometry::{BoundingBox, Point};
use labelforge_core::model::ModelRecord;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Source of machine-generated annotations for one image.
#[async_trait]
pub trait AutoLabeler: Send + Sync {
    /// Predict annotations for `image` using `model`.
    ///
    /// Returned annotations should be tagged with
    /// [`EditorAnnotation::with_prediction`]; thresholding is left to the
    /// caller.
    async fn predict(
        &self,
        model: &ModelRecord,
        image: &ImageRecord,
    ) -> ClientResult<Vec<EditorAnnotation>>;
}

/// Stand-in labeler that waits `delay` and returns one box and one polygon.
#[derive(Debug, Clone)]
pub struct SimulatedAutoLabeler {
    delay: Duration,
}

impl SimulatedAutoLabeler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Use the delay configured by `AUTO_LABEL_DELAY_MS`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.auto_label_delay())
    }
}

impl Default for SimulatedAutoLabeler {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl AutoLabeler for SimulatedAutoLabeler {
    async fn predict(
        &self,
        model: &ModelRecord,
        image: &ImageRecord,
    ) -> ClientResult<Vec<EditorAnnotation>> {
        tracing::debug!(
            model = %model.name,
            image_id = %image.id,
            delay_ms = self.delay.as_millis() as u64,
            "Simulating auto-label inference"
        );
        tokio::time::sleep(self.delay).await;

        let detection =
            EditorAnnotation::bbox(BoundingBox::new(100.0, 100.0, 200.0, 150.0), 0).with_prediction(0.95);
        let outline = EditorAnnotation::polygon(
            vec![
                Point::new(400.0, 200.0),
                Point::new(500.0, 180.0),
                Point::new(520.0, 280.0),
                Point::new(450.0, 300.0),
                Point::new(380.0, 250.0),
            ],
            1,
        )
        .with_prediction(0.87);

        Ok(vec![detection, outline])
    }
}
