//! Domain layer - core business logic and types.
//!
//! This layer contains pure domain models, error types and the collaborator
//! interfaces the export coordinator consumes, without any external
//! dependencies (DB, IO, etc.).

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use models::{
    stable_hash, Account, ClientInfo, Contact, ContactSet, Conversation, ExportOptions,
    MessageUnit, RenderedMessage, RunState,
};
pub use ports::{
    AccountStore, BackupReader, ExportNotifier, MediaSink, MessageSink, NullNotifier,
    RenderContext,
};
