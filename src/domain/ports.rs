//! Collaborator interfaces consumed by the export coordinator.
//!
//! The coordinator drives the run; everything format-specific (backup index
//! parsing, database decoding, message rendering) and everything transport-
//! specific (media fetching) sits behind these traits.

use std::path::Path;

use crate::domain::models::MessageUnit;
use crate::domain::{
    Account, ClientInfo, ContactSet, Conversation, ExportOptions, Result,
};

/// Batch callback handed to [`AccountStore::render_messages`]. Returns `true`
/// when cancellation has been requested, letting the renderer stop early
/// without raising an error.
pub type MessageSink<'a> = dyn FnMut(Vec<MessageUnit>) -> bool + 'a;

/// Opens the backup index for a source root.
pub trait BackupReader: Send + Sync {
    /// Load the backup index and return a store over its accounts.
    ///
    /// In preview mode the implementation may apply a coarse path filter
    /// that skips heavy media subtrees; a full export run must not.
    ///
    /// # Errors
    /// Fails when the primary index cannot be loaded. A missing or broken
    /// secondary (shared) index is not an error.
    fn open(&self, preview: bool) -> Result<Box<dyn AccountStore>>;
}

/// Read access to one opened backup: accounts, their content, and message
/// rendering.
pub trait AccountStore: Send {
    /// Client-version metadata, if the backup carries any.
    fn client_info(&self) -> Option<ClientInfo>;

    /// All accounts present in the primary index.
    ///
    /// # Errors
    /// Fails when the account list cannot be decoded.
    fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Contact set and conversation list for one account. With
    /// `detailed = false` contact parsing is skipped entirely and the
    /// conversations carry listing metadata only. Sort order is the
    /// caller's concern.
    ///
    /// # Errors
    /// Fails when the account's databases cannot be read.
    fn load_account_content(
        &self,
        account: &Account,
        detailed: bool,
    ) -> Result<(ContactSet, Vec<Conversation>)>;

    /// Stream the conversation's messages as batches of template-ready
    /// units to `on_batch`, in message order. Returns the number of
    /// messages handled, which is authoritative for index inclusion.
    ///
    /// # Errors
    /// Fails when the message database cannot be opened or read.
    fn render_messages(
        &self,
        ctx: &RenderContext<'_>,
        conversation: &Conversation,
        on_batch: &mut MessageSink<'_>,
    ) -> Result<usize>;
}

/// Everything a message renderer is bound to for one conversation.
pub struct RenderContext<'a> {
    /// The owning account.
    pub account: &'a Account,
    /// Contact set used to resolve sender names and avatars. Always
    /// contains the account's own identifier.
    pub contacts: &'a ContactSet,
    /// Run option flags.
    pub options: ExportOptions,
    /// Sink for media copy/download tasks discovered while rendering.
    pub media: &'a dyn MediaSink,
    /// Conversation-specific asset directory (`<name>_files/`).
    pub assets_dir: &'a Path,
}

/// Accepts (source locator, destination path, priority) media tasks.
/// Enqueueing is fire-and-forget; ordering of document text never depends
/// on it.
pub trait MediaSink: Sync {
    fn enqueue(&self, source: &str, dest: &Path, priority: u32);
}

/// Receives run lifecycle events. `on_start` and `on_complete` fire exactly
/// once per run; `on_progress` never fires after `on_complete`.
pub trait ExportNotifier: Send + Sync {
    fn on_start(&self) {}

    fn on_progress(&self, done: u32, total: u32) {
        let _ = (done, total);
    }

    fn on_complete(&self, cancelled: bool) {
        let _ = cancelled;
    }
}

/// Notifier that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl ExportNotifier for NullNotifier {}
