//! Application layer - use cases and orchestration.
//!
//! This layer contains the export run coordinator and the pure helpers it
//! composes: output naming, template substitution and locale lookup.

pub mod export_service;
pub mod locale;
pub mod naming;
pub mod templates;

pub use export_service::{ExportConfig, Exporter};
