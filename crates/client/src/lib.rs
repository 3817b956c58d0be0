//! Annotation client library.
//!
//! Provides the REST client for the annotation backend, the per-session
//! annotation context with sequenced fire-and-forget saves, the auto-label
//! seam, and environment-based configuration. The export binary lives in
//! `main.rs`.

pub mod api;
pub mod autolabel;
pub mod config;
pub mod error;
pub mod session;
