//! Domain models for backup chat data.
//!
//! These models represent the entities the export pipeline works on:
//! accounts found in a backup, their contacts and conversations, and the
//! template-ready message units produced by the renderer.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hex digest of the default hasher, used as the stable fallback name for
/// identifiers that cannot be used as filesystem names directly.
#[must_use]
pub fn stable_hash(input: &str) -> String {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// A messaging-application identity found in the backup; the unit of
/// top-level export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Canonical account identifier.
    pub id: String,
    /// Display name, may be empty.
    #[serde(default)]
    pub display_name: String,
    /// Content hash of the identifier; stable fallback folder name.
    pub hash: String,
    /// Avatar source locator, empty if none.
    #[serde(default)]
    pub avatar: String,
    /// Output folder name assigned by the name resolver during a run.
    #[serde(skip)]
    pub output_name: String,
}

impl Account {
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let id = id.into();
        let hash = stable_hash(&id);
        Self {
            id,
            display_name: display_name.into(),
            hash,
            avatar: String::new(),
            output_name: String::new(),
        }
    }

    /// Local filename the account's own avatar is stored under.
    #[must_use]
    pub fn local_avatar_name(&self) -> String {
        format!("{}.jpg", self.hash)
    }

    /// Display name with the identifier as fallback.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

/// A known participant within one account's address book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
}

impl Contact {
    /// Local filename this contact's avatar is stored under.
    #[must_use]
    pub fn local_avatar_name(&self) -> String {
        format!("{}.jpg", stable_hash(&self.id))
    }
}

/// Per-account collection of known participants, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    contacts: HashMap<String, Contact>,
}

impl ContactSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Contact> {
        self.contacts.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.contacts.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Make sure the account's own identity is resolvable during rendering.
    /// Synthesizes a contact from the account when the loader did not
    /// supply one.
    pub fn ensure_self(&mut self, account: &Account) {
        if !self.contains(&account.id) {
            self.insert(Contact {
                id: account.id.clone(),
                display_name: account.display_name.clone(),
                avatar: account.avatar.clone(),
            });
        }
    }
}

/// A single chat belonging to an account; the unit of per-document export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier, scoped to the owning account.
    pub id: String,
    /// Display name, may be empty until backfilled from the contact set.
    #[serde(default)]
    pub display_name: String,
    /// Avatar source locator, empty if none.
    #[serde(default)]
    pub avatar: String,
    /// Subscription/broadcast feeds are listed but never exported.
    #[serde(default)]
    pub subscription: bool,
    /// Logical path of the message database inside the backup; empty means
    /// there is nothing to export.
    #[serde(default)]
    pub db_path: String,
    /// Approximate record count, a buffer-sizing hint only.
    #[serde(default)]
    pub record_count: usize,
    /// Timestamp of the most recent message; the sort key.
    pub last_message_time: Option<DateTime<Utc>>,
    /// Output file/folder base name assigned by the name resolver.
    #[serde(skip)]
    pub output_name: String,
}

impl Conversation {
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar: String::new(),
            subscription: false,
            db_path: String::new(),
            record_count: 0,
            last_message_time: None,
            output_name: String::new(),
        }
    }

    #[must_use]
    pub fn local_avatar_name(&self) -> String {
        format!("{}.jpg", stable_hash(&self.id))
    }

    #[must_use]
    pub fn has_messages(&self) -> bool {
        !self.db_path.is_empty()
    }

    /// Display name with the identifier as fallback.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

/// One logical message, rendered by the backend into an ordered list of
/// (template id, field values) pairs ready for markup substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Template identifier, e.g. `msg`, `image`, `system`.
    pub template: String,
    /// `(placeholder, value)` pairs, applied in order.
    pub fields: Vec<(String, String)>,
}

impl RenderedMessage {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((placeholder.into(), value.into()));
        self
    }
}

/// One logical message: an ordered sequence of template fragments the
/// coordinator flattens into a single markup string.
pub type MessageUnit = Vec<RenderedMessage>;

/// Client-version metadata parsed from the backup, used to derive the
/// download user-agent. Best effort; absence never blocks a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub os_version: String,
}

impl ClientInfo {
    #[must_use]
    pub fn build_user_agent(&self) -> String {
        format!(
            "chat-backup-exporter/{} (OS {})",
            if self.app_version.is_empty() {
                "unknown"
            } else {
                &self.app_version
            },
            if self.os_version.is_empty() {
                "unknown"
            } else {
                &self.os_version
            }
        )
    }
}

/// Lifecycle state of the export run controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Cancellation requested; layered on Running until the worker exits.
    Cancelling,
    Completed,
    CompletedCancelled,
}

impl RunState {
    /// Whether a background worker is currently active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }
}

/// Independently toggleable export option flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions(u32);

impl ExportOptions {
    /// Suppress pagination, embed everything inline.
    pub const TEXT_MODE: u32 = 1 << 0;
    /// Sort conversations newest-first instead of oldest-first.
    pub const DESC_ORDER: u32 = 1 << 1;
    /// Place session icons under the session's own folder.
    pub const FILES_IN_SESSION: u32 = 1 << 2;
    /// Skip avatar download and placeholder creation.
    pub const SKIP_AVATARS: u32 = 1 << 3;
    /// Skip emoji asset folder creation.
    pub const SKIP_EMOJI: u32 = 1 << 4;
    /// Insert links and labels raw, without URL-encoding/HTML-escaping.
    pub const RAW_MARKUP: u32 = 1 << 5;

    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u32, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[must_use]
    pub const fn text_mode(self) -> bool {
        self.contains(Self::TEXT_MODE)
    }

    #[must_use]
    pub const fn descending(self) -> bool {
        self.contains(Self::DESC_ORDER)
    }

    #[must_use]
    pub const fn files_in_session(self) -> bool {
        self.contains(Self::FILES_IN_SESSION)
    }

    #[must_use]
    pub const fn skip_avatars(self) -> bool {
        self.contains(Self::SKIP_AVATARS)
    }

    #[must_use]
    pub const fn skip_emoji(self) -> bool {
        self.contains(Self::SKIP_EMOJI)
    }

    #[must_use]
    pub const fn raw_markup(self) -> bool {
        self.contains(Self::RAW_MARKUP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash_deterministic() {
        assert_eq!(stable_hash("u1"), stable_hash("u1"));
        assert_ne!(stable_hash("u1"), stable_hash("u2"));
        assert_eq!(stable_hash("u1").len(), 16);
    }

    #[test]
    fn test_contact_set_ensure_self() {
        let account = Account::new("u1", "Alice");
        let mut contacts = ContactSet::new();
        assert!(!contacts.contains("u1"));

        contacts.ensure_self(&account);
        assert_eq!(contacts.get("u1").map(|c| c.display_name.as_str()), Some("Alice"));

        // An existing entry is not overwritten.
        let mut contacts = ContactSet::new();
        contacts.insert(Contact {
            id: "u1".into(),
            display_name: "Alice (work)".into(),
            avatar: String::new(),
        });
        contacts.ensure_self(&account);
        assert_eq!(
            contacts.get("u1").map(|c| c.display_name.as_str()),
            Some("Alice (work)")
        );
    }

    #[test]
    fn test_options_toggle_independently() {
        let mut options = ExportOptions::new();
        assert!(!options.text_mode());

        options.set(ExportOptions::TEXT_MODE, true);
        options.set(ExportOptions::SKIP_AVATARS, true);
        assert!(options.text_mode());
        assert!(options.skip_avatars());
        assert!(!options.descending());

        options.set(ExportOptions::TEXT_MODE, false);
        assert!(!options.text_mode());
        assert!(options.skip_avatars());
    }

    #[test]
    fn test_run_state_activity() {
        assert!(RunState::Running.is_active());
        assert!(RunState::Cancelling.is_active());
        assert!(!RunState::Idle.is_active());
        assert!(!RunState::Completed.is_active());
        assert!(!RunState::CompletedCancelled.is_active());
    }

    #[test]
    fn test_user_agent_fallbacks() {
        let info = ClientInfo::default();
        assert!(info.build_user_agent().contains("unknown"));

        let info = ClientInfo {
            app_version: "8.0.2".into(),
            os_version: "14.1".into(),
        };
        assert_eq!(
            info.build_user_agent(),
            "chat-backup-exporter/8.0.2 (OS 14.1)"
        );
    }
}
