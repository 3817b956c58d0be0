//! Domain logic for the labelforge annotation client.
//!
//! Everything in this crate is pure: geometry, the editor/persisted
//! annotation shapes and the adapter between them, class lists, dataset and
//! model records, labeling statistics, the export document and save
//! sequencing. Network I/O lives in `labelforge-client`.

pub mod annotation;
pub mod classes;
pub mod dataset;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod sequence;
pub mod threshold_validation;
pub mod types;
