//! JSON export of a dataset's annotations.
//!
//! The document lists every image by file name with its editor-shape
//! annotations, followed by the class list the indices refer to. Writing
//! it out is left to the caller.

use serde::{Deserialize, Serialize};

use crate::annotation::EditorAnnotation;
use crate::classes::ClassList;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportImage {
    pub name: String,
    pub annotations: Vec<EditorAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub images: Vec<ExportImage>,
    pub classes: ClassList,
}

impl ExportDocument {
    pub fn new(classes: ClassList) -> Self {
        Self {
            images: Vec::new(),
            classes,
        }
    }

    pub fn push_image(&mut self, name: impl Into<String>, annotations: Vec<EditorAnnotation>) {
        self.images.push(ExportImage {
            name: name.into(),
            annotations,
        });
    }

    /// Total number of annotations across all images.
    pub fn annotation_count(&self) -> usize {
        self.images.iter().map(|img| img.annotations.len()).sum()
    }
}
