//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod backup_reader;
pub mod config;
pub mod downloader;
pub mod resources;

pub use backup_reader::SqliteBackupReader;
pub use config::{ensure_config_exists, load_config};
