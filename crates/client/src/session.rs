//! Per-session annotation context.
//!
//! An [`AnnotationSession`] owns everything the labeling screen works on:
//! the open dataset's image list, the current image, that image's editor
//! annotations and the active class list. Loads degrade to an empty list on
//! failure; saves are sequenced per image through a shared
//! [`SaveSequencer`] so a late response never overrides a newer one.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;

use labelforge_core::annotation::{
    to_editor, to_persisted, validate_editor_annotation, AnnotationSource, EditorAnnotation,
    PersistedAnnotation,
};
use labelforge_core::classes::{clamp_selection, reindex_after_removal, ClassDefinition, ClassList};
use labelforge_core::dataset::{step_index, Direction, ImageRecord, LabelingStats};
use labelforge_core::error::CoreError;
use labelforge_core::export::ExportDocument;
use labelforge_core::model::ModelRecord;
use labelforge_core::sequence::{Completion, SaveSequencer, SaveTicket};
use labelforge_core::types::EntityId;

use crate::api::BackendClient;
use crate::autolabel::AutoLabeler;
use crate::error::{ClientError, ClientResult};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What caused a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// The user pressed save.
    Explicit,
    /// Leaving the image for another one.
    Navigation,
    /// An annotation was created, edited or deleted.
    Change,
    /// Predictions were appended by the auto-labeler.
    AutoLabel,
}

/// Result of loading the current image's annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    /// The request failed; the editor starts from an empty list.
    Fallback { warning: String },
    /// The dataset has no images.
    NoImage,
}

/// Result of one save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The backend stored `count` annotations.
    Persisted { count: usize },
    /// A newer save for the same image completed first.
    Stale,
    /// The request failed. Annotations stay in local state.
    ///
    /// `warning` is set for backend (5xx) failures, which are meant to be
    /// shown to the user; other failures are only logged.
    Failed { warning: Option<String> },
    /// No image is selected.
    Skipped,
}

/// A finished save, as produced by [`AnnotationSession::spawn_save`] tasks.
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub ticket: SaveTicket,
    pub trigger: SaveTrigger,
    /// Local edit revision the payload was taken from.
    pub revision: u64,
    pub outcome: SaveOutcome,
}

/// Result of [`AnnotationSession::auto_label`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLabelReport {
    /// Predictions kept after thresholding.
    pub added: usize,
    /// Predictions dropped for falling below the model's threshold.
    pub filtered: usize,
    pub save: SaveOutcome,
}

/// A spawned save with the ticket it was issued.
struct InFlightSave {
    ticket: SaveTicket,
    handle: JoinHandle<SaveReport>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Labeling state for one user working through one dataset.
///
/// Mutated only through `&mut self`; spawned saves share the client and the
/// sequencer and report back through [`flush`](Self::flush).
pub struct AnnotationSession {
    client: Arc<BackendClient>,
    sequencer: Arc<SaveSequencer>,
    dataset_id: Option<EntityId>,
    images: Vec<ImageRecord>,
    current: Option<usize>,
    annotations: Vec<EditorAnnotation>,
    classes: ClassList,
    /// Class assigned to newly drawn shapes; `None` when the list is empty.
    selected_class: Option<usize>,
    /// Bumped on every local mutation; never reset.
    revision: u64,
    /// Highest revision known to be stored for the current image.
    saved_revision: u64,
    in_flight: Vec<InFlightSave>,
}

impl AnnotationSession {
    /// Create a session with the default class list.
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self::with_classes(client, ClassList::default())
    }

    pub fn with_classes(client: Arc<BackendClient>, classes: ClassList) -> Self {
        let selected_class = clamp_selection(0, classes.len());
        Self {
            client,
            sequencer: Arc::new(SaveSequencer::new()),
            dataset_id: None,
            images: Vec::new(),
            current: None,
            annotations: Vec::new(),
            classes,
            selected_class,
            revision: 0,
            saved_revision: 0,
            in_flight: Vec::new(),
        }
    }

    // ---- accessors ----

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_image(&self) -> Option<&ImageRecord> {
        self.current.and_then(|i| self.images.get(i))
    }

    pub fn annotations(&self) -> &[EditorAnnotation] {
        &self.annotations
    }

    pub fn classes(&self) -> &ClassList {
        &self.classes
    }

    pub fn selected_class(&self) -> Option<usize> {
        self.selected_class
    }

    /// Whether the current image has edits not yet confirmed by the backend.
    pub fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }

    /// Number of spawned saves not yet collected by [`flush`](Self::flush).
    pub fn pending_saves(&self) -> usize {
        self.in_flight.len()
    }

    /// Labeling progress over the open dataset.
    pub fn stats(&self) -> LabelingStats {
        LabelingStats::from_images(&self.images)
    }

    // ---- loading ----

    /// Load a dataset's images and the first image's annotations.
    ///
    /// Unsaved edits on the current image are saved, and every save still in
    /// flight for the previous dataset is awaited first.
    pub async fn open_dataset(&mut self, dataset_id: &str) -> ClientResult<LoadOutcome> {
        if self.is_dirty() {
            self.spawn_save(SaveTrigger::Navigation).await;
        }
        self.flush().await;

        let images = self.client.list_dataset_images(dataset_id).await?;
        tracing::info!(dataset_id, image_count = images.len(), "Opened dataset");

        self.dataset_id = Some(dataset_id.to_string());
        self.images = images;
        self.current = if self.images.is_empty() { None } else { Some(0) };
        Ok(self.load_current().await)
    }

    /// Replace the local annotations with the backend's copy for the
    /// current image.
    ///
    /// Any failure falls back to an empty list so the image can still be
    /// labeled.
    pub async fn load_current(&mut self) -> LoadOutcome {
        self.annotations.clear();
        self.saved_revision = self.revision;

        let Some(image_id) = self.current_image().map(|img| img.id.clone()) else {
            return LoadOutcome::NoImage;
        };

        match self.client.get_annotations(&image_id).await {
            Ok(persisted) => {
                self.annotations = to_editor(&persisted);
                tracing::info!(
                    image_id = %image_id,
                    count = self.annotations.len(),
                    "Loaded annotations"
                );
                LoadOutcome::Loaded {
                    count: self.annotations.len(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    image_id = %image_id,
                    error = %e,
                    "Failed to load annotations, starting empty"
                );
                LoadOutcome::Fallback {
                    warning: e.to_string(),
                }
            }
        }
    }

    // ---- editing ----
    //
    // Edits only touch local state and mark it dirty. Callers persist them
    // with `spawn_save(SaveTrigger::Change)` (or `save_current`); navigation
    // and dataset switches save dirty state on their own.

    /// Append a validated annotation and return its position.
    pub fn add_annotation(&mut self, annotation: EditorAnnotation) -> Result<usize, CoreError> {
        validate_editor_annotation(&annotation)?;
        tracing::debug!(
            kind = annotation.shape.kind(),
            class_index = annotation.class_index,
            "Added annotation"
        );
        self.annotations.push(annotation);
        self.touch();
        Ok(self.annotations.len() - 1)
    }

    /// Replace the whole list, e.g. after the canvas moved or resized shapes.
    pub fn replace_annotations(&mut self, annotations: Vec<EditorAnnotation>) {
        self.annotations = annotations;
        self.touch();
    }

    pub fn remove_annotation(&mut self, index: usize) -> Result<EditorAnnotation, CoreError> {
        if index >= self.annotations.len() {
            return Err(CoreError::NotFound {
                entity: "Annotation",
                id: index.to_string(),
            });
        }
        let removed = self.annotations.remove(index);
        self.touch();
        Ok(removed)
    }

    pub fn add_class(&mut self, name: &str) -> Result<&ClassDefinition, CoreError> {
        let added = self.classes.add_class(name)?;
        if self.selected_class.is_none() {
            self.selected_class = Some(0);
        }
        Ok(added)
    }

    /// Choose the class for newly drawn shapes.
    pub fn select_class(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.classes.len() {
            return Err(CoreError::NotFound {
                entity: "Class",
                id: index.to_string(),
            });
        }
        self.selected_class = Some(index);
        Ok(())
    }

    /// Remove a class and shift later class indices of the current image's
    /// annotations down by one.
    ///
    /// Annotations of the removed class keep their index; their positions
    /// are returned. The selected class follows the same shift and stays
    /// inside the shortened list.
    pub fn remove_class(&mut self, index: usize) -> Result<(ClassDefinition, Vec<usize>), CoreError> {
        let removed = self.classes.remove_class(index)?;
        let orphaned = reindex_after_removal(&mut self.annotations, index);
        self.selected_class = self.selected_class.and_then(|selected| {
            let shifted = if selected > index { selected - 1 } else { selected };
            clamp_selection(shifted, self.classes.len())
        });
        if !orphaned.is_empty() {
            tracing::warn!(
                class = %removed.name,
                orphaned = orphaned.len(),
                "Removed class still referenced by annotations"
            );
        }
        if !self.annotations.is_empty() {
            self.touch();
        }
        Ok((removed, orphaned))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // ---- saving ----

    /// Save the current image and wait for the response.
    ///
    /// The full list replaces the backend's set, including an empty list.
    pub async fn save_current(&mut self, trigger: SaveTrigger) -> SaveOutcome {
        self.collect_finished().await;

        let Some(job) = self.prepare_save(trigger).await else {
            return SaveOutcome::Skipped;
        };
        let report = job.run().await;
        self.apply_save_report(&report);
        report.outcome
    }

    /// Start a save in the background and return its ticket.
    ///
    /// The payload is taken now; later edits are not included. Reports are
    /// applied by [`flush`](Self::flush) or by the next save.
    pub async fn spawn_save(&mut self, trigger: SaveTrigger) -> Option<SaveTicket> {
        let job = self.prepare_save(trigger).await?;
        let ticket = job.ticket.clone();
        self.in_flight.push(InFlightSave {
            ticket: ticket.clone(),
            handle: tokio::spawn(job.run()),
        });
        Some(ticket)
    }

    /// Await every spawned save and apply their reports in spawn order.
    pub async fn flush(&mut self) -> Vec<SaveReport> {
        let pending = std::mem::take(&mut self.in_flight);
        self.join_saves(pending).await
    }

    async fn join_saves(&mut self, saves: Vec<InFlightSave>) -> Vec<SaveReport> {
        let mut reports = Vec::with_capacity(saves.len());
        for save in saves {
            match save.handle.await {
                Ok(report) => {
                    self.apply_save_report(&report);
                    reports.push(report);
                }
                Err(e) => tracing::error!(
                    image_id = %save.ticket.image_id,
                    sequence = save.ticket.sequence,
                    error = %e,
                    "Save task panicked"
                ),
            }
        }
        reports
    }

    /// Await the spawned saves of `image_id` so a following load sees them.
    async fn settle_image(&mut self, image_id: &str) {
        let outstanding = self.sequencer.outstanding(image_id).await;
        if outstanding == 0 {
            return;
        }
        let (waiting, others): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|save| save.ticket.image_id == image_id);
        self.in_flight = others;

        tracing::debug!(
            image_id,
            outstanding,
            waiting = waiting.len(),
            "Waiting for saves before loading image"
        );
        self.join_saves(waiting).await;
    }

    /// Apply the local side effects of a finished save.
    ///
    /// Stale and failed saves change nothing. A stored save updates the
    /// image's labeled flag and, when it covers the latest edits of the
    /// current image, clears the dirty state.
    pub fn apply_save_report(&mut self, report: &SaveReport) {
        let SaveOutcome::Persisted { count } = report.outcome else {
            return;
        };

        if let Some(image) = self
            .images
            .iter_mut()
            .find(|img| img.id == report.ticket.image_id)
        {
            image.is_labeled = count > 0;
        }

        let is_current = self
            .current_image()
            .is_some_and(|img| img.id == report.ticket.image_id);
        if is_current {
            self.saved_revision = self.saved_revision.max(report.revision);
        }
    }

    async fn prepare_save(&self, trigger: SaveTrigger) -> Option<SaveJob> {
        let image_id = self.current_image()?.id.clone();
        let ticket = self.sequencer.issue(&image_id).await;
        Some(SaveJob {
            client: Arc::clone(&self.client),
            sequencer: Arc::clone(&self.sequencer),
            payload: to_persisted(&self.annotations, &self.classes),
            ticket,
            trigger,
            revision: self.revision,
        })
    }

    async fn collect_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|save| save.handle.is_finished());
        self.in_flight = running;
        self.join_saves(finished).await;
    }

    // ---- navigation ----

    /// Step to the neighbouring image.
    ///
    /// Returns `None` at either end of the list. Unsaved edits are saved in
    /// the background before moving. Saves still running for the target
    /// image are awaited so its load reflects them.
    pub async fn navigate(&mut self, direction: Direction) -> Option<LoadOutcome> {
        let current = self.current?;
        let target = step_index(current, self.images.len(), direction)?;
        if target == current {
            return None;
        }
        Some(self.move_to(target).await)
    }

    /// Jump to the image at `index`, saving unsaved edits first.
    pub async fn select_image(&mut self, index: usize) -> Result<LoadOutcome, CoreError> {
        if index >= self.images.len() {
            return Err(CoreError::NotFound {
                entity: "Image",
                id: index.to_string(),
            });
        }
        if self.current == Some(index) {
            return Ok(LoadOutcome::Loaded {
                count: self.annotations.len(),
            });
        }
        Ok(self.move_to(index).await)
    }

    async fn move_to(&mut self, index: usize) -> LoadOutcome {
        self.collect_finished().await;
        if self.is_dirty() {
            self.spawn_save(SaveTrigger::Navigation).await;
        }
        self.current = Some(index);
        if let Some(image_id) = self.current_image().map(|img| img.id.clone()) {
            self.settle_image(&image_id).await;
        }
        self.load_current().await
    }

    // ---- auto-labeling ----

    /// Run `labeler` on the current image, keep predictions at or above the
    /// model's confidence threshold, append them and save immediately.
    pub async fn auto_label(
        &mut self,
        labeler: &dyn AutoLabeler,
        model: &ModelRecord,
    ) -> ClientResult<AutoLabelReport> {
        model.validate_thresholds()?;
        let image = self
            .current_image()
            .cloned()
            .ok_or_else(|| CoreError::Validation("no image selected".to_string()))?;

        let predictions = labeler.predict(model, &image).await?;
        let total = predictions.len();
        let kept: Vec<EditorAnnotation> = model
            .filter_predictions(predictions)
            .into_iter()
            .map(|mut p| {
                p.source = AnnotationSource::Ai;
                p
            })
            .collect();
        let added = kept.len();

        tracing::info!(
            image_id = %image.id,
            model = %model.name,
            added,
            filtered = total - added,
            "Auto-labeled image"
        );

        if added > 0 {
            self.annotations.extend(kept);
            self.touch();
        }
        let save = self.save_current(SaveTrigger::AutoLabel).await;

        Ok(AutoLabelReport {
            added,
            filtered: total - added,
            save,
        })
    }

    // ---- export ----

    /// Build an export of every image in the open dataset.
    ///
    /// The current image uses the in-memory list; others are fetched
    /// concurrently, with failures exported as empty.
    pub async fn export(&self) -> ExportDocument {
        let client = &self.client;
        let fetches = self.images.iter().enumerate().map(|(i, image)| async move {
            if Some(i) == self.current {
                return self.annotations.clone();
            }
            match client.get_annotations(&image.id).await {
                Ok(persisted) => to_editor(&persisted),
                Err(e) => {
                    tracing::warn!(
                        image_id = %image.id,
                        error = %e,
                        "Failed to fetch annotations for export"
                    );
                    Vec::new()
                }
            }
        });
        let annotations = futures::future::join_all(fetches).await;

        let mut doc = ExportDocument::new(self.classes.clone());
        for (image, annotations) in self.images.iter().zip(annotations) {
            doc.push_image(image.original_filename.clone(), annotations);
        }
        doc
    }

    /// Build the export and write it to `path` as indented JSON.
    pub async fn write_export(&self, path: &Path) -> ClientResult<ExportDocument> {
        let doc = self.export().await;
        let json = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(path, json).await?;
        tracing::info!(
            path = %path.display(),
            images = doc.images.len(),
            annotations = doc.annotation_count(),
            "Wrote export"
        );
        Ok(doc)
    }
}

// ---------------------------------------------------------------------------
// Save job
// ---------------------------------------------------------------------------

/// Everything a save needs, detached from the session so it can be spawned.
struct SaveJob {
    client: Arc<BackendClient>,
    sequencer: Arc<SaveSequencer>,
    payload: Vec<PersistedAnnotation>,
    ticket: SaveTicket,
    trigger: SaveTrigger,
    revision: u64,
}

impl SaveJob {
    async fn run(self) -> SaveReport {
        let image_id = self.ticket.image_id.clone();
        let sequence = self.ticket.sequence;

        let outcome = match self.client.save_annotations(&self.ticket, self.payload).await {
            Ok(response) => match self.sequencer.complete(&self.ticket).await {
                Completion::Current => {
                    tracing::info!(
                        image_id = %image_id,
                        sequence,
                        count = response.count,
                        trigger = ?self.trigger,
                        "Saved annotations"
                    );
                    SaveOutcome::Persisted {
                        count: response.count,
                    }
                }
                Completion::Stale { .. } => SaveOutcome::Stale,
            },
            Err(e) => failure_outcome(&image_id, sequence, self.trigger, &e),
        };

        SaveReport {
            ticket: self.ticket,
            trigger: self.trigger,
            revision: self.revision,
            outcome,
        }
    }
}

/// Map a failed save to its outcome.
///
/// Transport failures and 5xx responses are always surfaced. Other rejections
/// are surfaced for saves the user asked for (explicit and auto-label) and
/// only logged for background change and navigation saves.
fn failure_outcome(
    image_id: &str,
    sequence: u64,
    trigger: SaveTrigger,
    error: &ClientError,
) -> SaveOutcome {
    let user_requested = matches!(trigger, SaveTrigger::Explicit | SaveTrigger::AutoLabel);
    if error.is_transient() || user_requested {
        tracing::warn!(image_id, sequence, trigger = ?trigger, error = %error, "Failed to save annotations");
        SaveOutcome::Failed {
            warning: Some(format!("Failed to save annotations: {error}")),
        }
    } else {
        tracing::debug!(image_id, sequence, trigger = ?trigger, error = %error, "Annotation save rejected");
        SaveOutcome::Failed { warning: None }
    }
}
