//! Active class list for an annotation session.
//!
//! Annotations refer to classes by their position in this list
//! (`classIndex` in the editor, `class_id` on the wire). Positions are not
//! stable identifiers: deleting a class shifts every later class down, so
//! [`reindex_after_removal`] must be applied to existing annotations.

use serde::{Deserialize, Serialize};

use crate::annotation::EditorAnnotation;
use crate::error::CoreError;

/// Name substituted when an index does not resolve to a live class.
pub const UNKNOWN_CLASS_NAME: &str = "unknown";

/// Colours handed out to new classes, cycling by list length.
pub const CLASS_PALETTE: &[&str] = &[
    "#ff4d4f", "#52c41a", "#1890ff", "#fa8c16", "#722ed1", "#eb2f96", "#13c2c2",
];

/// Maximum length of a class name after trimming.
pub const MAX_CLASS_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    pub color: String,
}

/// Ordered list of annotation classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassList {
    classes: Vec<ClassDefinition>,
}

impl Default for ClassList {
    /// The starter classes offered before a user edits the list.
    fn default() -> Self {
        Self::from_names(["Person", "Car", "Bicycle", "Dog", "Cat"])
    }
}

impl ClassList {
    pub fn new(classes: Vec<ClassDefinition>) -> Self {
        Self { classes }
    }

    /// Build a list from bare names, assigning palette colours in order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ClassDefinition {
                name: name.into(),
                color: palette_color(i).to_string(),
            })
            .collect();
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.iter()
    }

    /// Look up a class by (possibly stale or negative) index.
    pub fn get(&self, index: i64) -> Option<&ClassDefinition> {
        usize::try_from(index).ok().and_then(|i| self.classes.get(i))
    }

    /// Resolve a class name, substituting [`UNKNOWN_CLASS_NAME`] for indices
    /// that no longer point at a class.
    pub fn name_for(&self, index: i64) -> &str {
        self.get(index)
            .map(|c| c.name.as_str())
            .unwrap_or(UNKNOWN_CLASS_NAME)
    }

    /// Position of the first class with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Append a class. The name is trimmed; blank, over-long and duplicate
    /// names are rejected.
    pub fn add_class(&mut self, name: &str) -> Result<&ClassDefinition, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation(
                "class name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_CLASS_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "class name must be at most {MAX_CLASS_NAME_LENGTH} characters"
            )));
        }
        if self.index_of(name).is_some() {
            return Err(CoreError::Conflict(format!("class '{name}' already exists")));
        }

        let color = palette_color(self.classes.len()).to_string();
        self.classes.push(ClassDefinition {
            name: name.to_string(),
            color,
        });
        Ok(&self.classes[self.classes.len() - 1])
    }

    /// Remove the class at `index` and return it.
    pub fn remove_class(&mut self, index: usize) -> Result<ClassDefinition, CoreError> {
        if index >= self.classes.len() {
            return Err(CoreError::Validation(format!(
                "class index {index} out of range (have {} classes)",
                self.classes.len()
            )));
        }
        Ok(self.classes.remove(index))
    }
}

/// Palette colour for the `i`-th class.
pub fn palette_color(i: usize) -> &'static str {
    CLASS_PALETTE[i % CLASS_PALETTE.len()]
}

/// Shift annotation class indices after the class at `removed` was deleted.
///
/// Annotations of later classes move down by one so they keep their label.
/// Annotations of the removed class keep their index, which now points at a
/// different class or past the end; they are returned so the caller can
/// surface them instead of silently relabeling.
pub fn reindex_after_removal(annotations: &mut [EditorAnnotation], removed: usize) -> Vec<usize> {
    let removed = removed as i64;
    let mut orphaned = Vec::new();
    for (pos, ann) in annotations.iter_mut().enumerate() {
        if ann.class_index > removed {
            ann.class_index -= 1;
        } else if ann.class_index == removed {
            orphaned.push(pos);
        }
    }
    orphaned
}

/// Keep a selected class index inside a list of `len` classes.
///
/// Returns `None` when the list is empty.
pub fn clamp_selection(selected: usize, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else {
        Some(selected.min(len - 1))
    }
}
