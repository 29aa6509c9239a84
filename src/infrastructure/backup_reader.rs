//! Reference backup backend over sqlite.
//!
//! A backup snapshot is a directory with a `manifest.db` index mapping
//! `(domain, relative path)` pairs to content-addressed physical files
//! stored under two-level fan-out directories (`<backup>/ab/abcdef...`).
//! Inside the app domain live the account list (`Documents/accounts.db`),
//! optional client metadata (`Documents/client_info.json`) and one folder
//! per account hash with `contacts.db`, `sessions.db` and the per-session
//! message databases.
//!
//! This module implements the discovery/loading/rendering interfaces the
//! coordinator consumes; the proprietary formats of real messengers are out
//! of scope and would be alternative implementations of the same traits.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::domain::config::BackupConfig;
use crate::domain::{
    Account, AccountStore, AppError, BackupReader, ClientInfo, Contact, ContactSet, Conversation,
    MessageSink, RenderContext, RenderedMessage, Result,
};

/// Rows per batch handed to the message sink.
const MESSAGE_BATCH: usize = 100;

/// Opens sqlite-backed backup snapshots.
pub struct SqliteBackupReader {
    backup_dir: PathBuf,
    domains: BackupConfig,
}

impl SqliteBackupReader {
    #[must_use]
    pub fn new(backup_dir: impl Into<PathBuf>, domains: BackupConfig) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            domains,
        }
    }
}

impl BackupReader for SqliteBackupReader {
    fn open(&self, preview: bool) -> Result<Box<dyn AccountStore>> {
        let filter = preview.then_some(is_heavy_media_path as fn(&str) -> bool);

        let primary = ManifestIndex::load(&self.backup_dir, &self.domains.app_domain, filter)?;

        let shared = self.domains.shared_domain.as_ref().and_then(|domain| {
            match ManifestIndex::load(&self.backup_dir, domain, filter) {
                Ok(index) => Some(index),
                Err(err) => {
                    tracing::debug!(domain, error = %err, "shared manifest domain unavailable");
                    None
                }
            }
        });

        Ok(Box::new(SqliteAccountStore {
            backup_dir: self.backup_dir.clone(),
            primary,
            shared,
        }))
    }
}

/// Media subtrees skipped when only metadata is needed.
fn is_heavy_media_path(relative_path: &str) -> bool {
    ["/Audio/", "/Img/", "/OpenData/", "/Video/"]
        .iter()
        .any(|subtree| relative_path.contains(subtree))
}

/// Logical path → physical file id for one manifest domain.
struct ManifestIndex {
    files: HashMap<String, String>,
}

impl ManifestIndex {
    fn load(backup_dir: &Path, domain: &str, filter: Option<fn(&str) -> bool>) -> Result<Self> {
        let manifest = backup_dir.join("manifest.db");
        let conn = Connection::open_with_flags(&manifest, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| AppError::backup_index(&manifest, e))?;

        let mut stmt = conn
            .prepare("SELECT file_id, relative_path FROM files WHERE domain = ?1")
            .map_err(|e| AppError::backup_index(&manifest, e))?;

        let mut files = HashMap::new();
        let rows = stmt
            .query_map([domain], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(AppError::database)?;
        for row in rows {
            let (file_id, relative_path) = row.map_err(AppError::database)?;
            if filter.is_some_and(|skip| skip(&relative_path)) {
                continue;
            }
            files.insert(relative_path, file_id);
        }

        Ok(Self { files })
    }

    /// Physical location of a logical file, two-level fan-out by file id.
    fn real_path(&self, backup_dir: &Path, relative_path: &str) -> Option<PathBuf> {
        let file_id = self.files.get(relative_path)?;
        let fanout = file_id.get(0..2)?;
        Some(backup_dir.join(fanout).join(file_id))
    }
}

struct SqliteAccountStore {
    backup_dir: PathBuf,
    primary: ManifestIndex,
    shared: Option<ManifestIndex>,
}

impl SqliteAccountStore {
    fn real_path(&self, relative_path: &str) -> Option<PathBuf> {
        self.primary
            .real_path(&self.backup_dir, relative_path)
            .or_else(|| {
                self.shared
                    .as_ref()
                    .and_then(|shared| shared.real_path(&self.backup_dir, relative_path))
            })
    }

    fn open_db(&self, relative_path: &str) -> Result<Connection> {
        let path = self.real_path(relative_path).ok_or_else(|| AppError::InvalidData {
            message: format!("{relative_path} is not in the backup manifest"),
        })?;
        Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(AppError::database)
    }
}

impl AccountStore for SqliteAccountStore {
    fn client_info(&self) -> Option<ClientInfo> {
        let path = self.real_path("Documents/client_info.json")?;
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(info) => Some(info),
            Err(err) => {
                tracing::debug!(error = %err, "client metadata unparsable");
                None
            }
        }
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.open_db("Documents/accounts.db")?;
        let mut stmt = conn
            .prepare("SELECT id, display_name, avatar FROM accounts ORDER BY id")
            .map_err(AppError::database)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(AppError::database)?;

        let mut accounts = Vec::new();
        for row in rows {
            let (id, display_name, avatar) = row.map_err(AppError::database)?;
            let mut account = Account::new(id, display_name.unwrap_or_default());
            account.avatar = avatar.unwrap_or_default();
            accounts.push(account);
        }
        Ok(accounts)
    }

    fn load_account_content(
        &self,
        account: &Account,
        detailed: bool,
    ) -> Result<(ContactSet, Vec<Conversation>)> {
        let base = format!("Documents/{}", account.hash);

        let mut contacts = ContactSet::new();
        if detailed {
            match self.open_db(&format!("{base}/contacts.db")) {
                Ok(conn) => {
                    let mut stmt = conn
                        .prepare("SELECT id, display_name, avatar FROM contacts")
                        .map_err(AppError::database)?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok(Contact {
                                id: row.get(0)?,
                                display_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                                avatar: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                            })
                        })
                        .map_err(AppError::database)?;
                    for row in rows {
                        contacts.insert(row.map_err(AppError::database)?);
                    }
                }
                Err(err) => {
                    tracing::debug!(account = %account.id, error = %err, "no contact database");
                }
            }
        }

        let conn = self.open_db(&format!("{base}/sessions.db"))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, display_name, avatar, kind, record_count, last_message_time, db_name \
                 FROM sessions",
            )
            .map_err(AppError::database)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .map_err(AppError::database)?;

        let mut conversations = Vec::new();
        for row in rows {
            let (id, display_name, avatar, kind, record_count, last_time, db_name) =
                row.map_err(AppError::database)?;
            let mut conversation = Conversation::new(id, display_name.unwrap_or_default());
            conversation.avatar = avatar.unwrap_or_default();
            conversation.subscription = kind == 1;
            conversation.last_message_time =
                last_time.and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));
            if let Some(db_name) = db_name.filter(|name| !name.is_empty()) {
                conversation.db_path = format!("{base}/{db_name}");
            }
            conversation.record_count =
                record_count.and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
            conversations.push(conversation);
        }

        Ok((contacts, conversations))
    }

    fn render_messages(
        &self,
        ctx: &RenderContext<'_>,
        conversation: &Conversation,
        on_batch: &mut MessageSink<'_>,
    ) -> Result<usize> {
        let conn = self.open_db(&conversation.db_path)?;
        let mut stmt = conn
            .prepare(
                "SELECT sender_id, timestamp, kind, content, asset FROM messages \
                 ORDER BY timestamp, id",
            )
            .map_err(AppError::database)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MessageRow {
                    sender_id: row.get(0)?,
                    timestamp: row.get::<_, Option<i64>>(1)?,
                    kind: row.get::<_, i64>(2)?,
                    content: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    asset: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            })
            .map_err(AppError::database)?;

        let mut count = 0usize;
        let mut batch = Vec::with_capacity(MESSAGE_BATCH);
        let mut stopped = false;

        for row in rows {
            let row = row.map_err(AppError::database)?;
            batch.push(self.render_row(ctx, &row));
            if batch.len() == MESSAGE_BATCH {
                count += batch.len();
                if on_batch(std::mem::take(&mut batch)) {
                    stopped = true;
                    break;
                }
            }
        }

        if !stopped && !batch.is_empty() {
            count += batch.len();
            on_batch(batch);
        }

        Ok(count)
    }
}

struct MessageRow {
    sender_id: String,
    timestamp: Option<i64>,
    kind: i64,
    content: String,
    asset: String,
}

impl SqliteAccountStore {
    fn render_row(&self, ctx: &RenderContext<'_>, row: &MessageRow) -> Vec<RenderedMessage> {
        let contact = ctx.contacts.get(&row.sender_id);
        let name = contact.map_or(row.sender_id.as_str(), |c| {
            if c.display_name.is_empty() {
                c.id.as_str()
            } else {
                c.display_name.as_str()
            }
        });
        let time = row
            .timestamp
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let avatar = contact.map_or_else(String::new, |c| {
            if !ctx.options.skip_avatars() && !c.avatar.is_empty() {
                // Avatar locators may be manifest paths or external URLs;
                // unresolved ones are passed through for the fetcher.
                let source = self
                    .real_path(&c.avatar)
                    .map_or_else(|| c.avatar.clone(), |p| p.to_string_lossy().into_owned());
                ctx.media.enqueue(
                    &source,
                    &ctx.assets_dir.join("Portrait").join(c.local_avatar_name()),
                    0,
                );
            }
            format!("{}/Portrait/{}", assets_prefix(ctx.assets_dir), c.local_avatar_name())
        });

        let escaped_content = if ctx.options.raw_markup() {
            row.content.clone()
        } else {
            crate::application::templates::safe_html(&row.content)
        };

        match row.kind {
            // Image: the asset is copied into the conversation's asset
            // folder and referenced relatively.
            1 => {
                let file_name = Path::new(&row.asset)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if let Some(source) = self.real_path(&row.asset) {
                    ctx.media
                        .enqueue(&source.to_string_lossy(), &ctx.assets_dir.join(&file_name), 1);
                } else {
                    tracing::debug!(asset = %row.asset, "image asset not in manifest");
                }
                vec![RenderedMessage::new("image")
                    .field("%%AVATAR%%", avatar)
                    .field("%%NAME%%", safe_name(name, ctx))
                    .field("%%TIME%%", time)
                    .field(
                        "%%IMGPATH%%",
                        format!("{}/{}", assets_prefix(ctx.assets_dir), file_name),
                    )]
            }
            // System notice: no sender attribution.
            2 => vec![RenderedMessage::new("system")
                .field("%%TIME%%", time)
                .field("%%MESSAGE%%", escaped_content)],
            _ => vec![RenderedMessage::new("msg")
                .field("%%AVATAR%%", avatar)
                .field("%%NAME%%", safe_name(name, ctx))
                .field("%%TIME%%", time)
                .field("%%MESSAGE%%", escaped_content)],
        }
    }
}

fn safe_name(name: &str, ctx: &RenderContext<'_>) -> String {
    if ctx.options.raw_markup() {
        name.to_string()
    } else {
        crate::application::templates::safe_html(name)
    }
}

/// Relative prefix transcript documents use to reach the asset folder.
fn assets_prefix(assets_dir: &Path) -> String {
    assets_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{stable_hash, ExportOptions, MediaSink};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct RecordingSink {
        tasks: Mutex<Vec<(String, PathBuf)>>,
    }

    impl MediaSink for RecordingSink {
        fn enqueue(&self, source: &str, dest: &Path, _priority: u32) {
            self.tasks
                .lock()
                .unwrap()
                .push((source.to_string(), dest.to_path_buf()));
        }
    }

    /// Builds backup fixtures: a manifest plus content-addressed files.
    struct FixtureBackup {
        _dir: TempDir,
        root: PathBuf,
        manifest: Connection,
    }

    impl FixtureBackup {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let root = dir.path().to_path_buf();
            let manifest = Connection::open(root.join("manifest.db")).unwrap();
            manifest
                .execute_batch(
                    "CREATE TABLE files (
                        file_id TEXT PRIMARY KEY,
                        domain TEXT NOT NULL,
                        relative_path TEXT NOT NULL
                    );",
                )
                .unwrap();
            Self {
                _dir: dir,
                root,
                manifest,
            }
        }

        /// Register a logical path and return the physical path to fill in.
        fn register(&self, domain: &str, relative: &str) -> PathBuf {
            let file_id = stable_hash(&format!("{domain}:{relative}"));
            self.manifest
                .execute(
                    "INSERT INTO files (file_id, domain, relative_path) VALUES (?1, ?2, ?3)",
                    (&file_id, domain, relative),
                )
                .unwrap();
            let dir = self.root.join(&file_id[0..2]);
            std::fs::create_dir_all(&dir).unwrap();
            dir.join(&file_id)
        }

        fn reader(&self) -> SqliteBackupReader {
            SqliteBackupReader::new(&self.root, BackupConfig::default())
        }
    }

    const APP: &str = "AppDomain-com.example.chat";

    fn seed_account(backup: &FixtureBackup, id: &str, name: &str) -> Account {
        let accounts_db = backup.register(APP, "Documents/accounts.db");
        let conn = Connection::open(&accounts_db).unwrap();
        conn.execute_batch(
            "CREATE TABLE accounts (id TEXT PRIMARY KEY, display_name TEXT, avatar TEXT);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO accounts (id, display_name, avatar) VALUES (?1, ?2, NULL)",
            (id, name),
        )
        .unwrap();
        Account::new(id, name)
    }

    fn seed_sessions(backup: &FixtureBackup, account: &Account, rows: &[(&str, &str, i64, i64, &str)]) {
        let path = backup.register(APP, &format!("Documents/{}/sessions.db", account.hash));
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE sessions (
                id TEXT PRIMARY KEY, display_name TEXT, avatar TEXT, kind INTEGER,
                record_count INTEGER, last_message_time INTEGER, db_name TEXT
            );",
        )
        .unwrap();
        for (id, name, kind, time, db_name) in rows {
            conn.execute(
                "INSERT INTO sessions (id, display_name, avatar, kind, record_count, last_message_time, db_name) \
                 VALUES (?1, ?2, NULL, ?3, 2, ?4, ?5)",
                (id, name, kind, time, db_name),
            )
            .unwrap();
        }
    }

    fn seed_messages(
        backup: &FixtureBackup,
        account: &Account,
        db_name: &str,
        rows: &[(&str, i64, i64, &str)],
    ) {
        let path = backup.register(APP, &format!("Documents/{}/{db_name}", account.hash));
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE messages (
                id INTEGER PRIMARY KEY, sender_id TEXT, timestamp INTEGER,
                kind INTEGER, content TEXT, asset TEXT
            );",
        )
        .unwrap();
        for (sender, timestamp, kind, content) in rows {
            conn.execute(
                "INSERT INTO messages (sender_id, timestamp, kind, content, asset) \
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                (sender, timestamp, kind, content),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_list_accounts() {
        let backup = FixtureBackup::new();
        seed_account(&backup, "u1", "Alice");

        let store = backup.reader().open(false).unwrap();
        let accounts = store.list_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, "u1");
        assert_eq!(accounts[0].display_name, "Alice");
        assert_eq!(accounts[0].hash, stable_hash("u1"));
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let dir = tempdir().unwrap();
        let reader = SqliteBackupReader::new(dir.path(), BackupConfig::default());
        assert!(matches!(
            reader.open(false),
            Err(AppError::BackupIndex { .. })
        ));
    }

    #[test]
    fn test_load_account_content() {
        let backup = FixtureBackup::new();
        let account = seed_account(&backup, "u1", "Alice");

        let contacts_db =
            backup.register(APP, &format!("Documents/{}/contacts.db", account.hash));
        let conn = Connection::open(&contacts_db).unwrap();
        conn.execute_batch(
            "CREATE TABLE contacts (id TEXT PRIMARY KEY, display_name TEXT, avatar TEXT);
             INSERT INTO contacts VALUES ('c1', 'Bob', NULL);",
        )
        .unwrap();

        seed_sessions(
            &backup,
            &account,
            &[
                ("c1", "Bob", 0, 200, "message_1.sqlite"),
                ("feed", "Newsfeed", 1, 100, ""),
            ],
        );

        let store = backup.reader().open(false).unwrap();
        let (contacts, conversations) = store.load_account_content(&account, true).unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts.get("c1").map(|c| c.display_name.as_str()), Some("Bob"));

        assert_eq!(conversations.len(), 2);
        let bob = conversations.iter().find(|c| c.id == "c1").unwrap();
        assert!(bob.has_messages());
        assert!(!bob.subscription);
        assert_eq!(bob.record_count, 2);
        let feed = conversations.iter().find(|c| c.id == "feed").unwrap();
        assert!(feed.subscription);
        assert!(!feed.has_messages());

        // Lightweight mode skips contact parsing but keeps listing metadata.
        let (contacts, conversations) = store.load_account_content(&account, false).unwrap();
        assert!(contacts.is_empty());
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].record_count, 2);
    }

    #[test]
    fn test_render_messages_in_order_with_sender_resolution() {
        let backup = FixtureBackup::new();
        let account = seed_account(&backup, "u1", "Alice");
        seed_sessions(&backup, &account, &[("c1", "Bob", 0, 300, "message_1.sqlite")]);
        seed_messages(
            &backup,
            &account,
            "message_1.sqlite",
            &[
                ("c1", 100, 0, "hello"),
                ("u1", 200, 0, "hi <Bob>"),
                ("c1", 300, 2, "call ended"),
            ],
        );

        let store = backup.reader().open(false).unwrap();
        let (_, conversations) = store.load_account_content(&account, true).unwrap();
        let conversation = &conversations[0];

        let mut contacts = ContactSet::new();
        contacts.insert(Contact {
            id: "c1".to_string(),
            display_name: "Bob".to_string(),
            avatar: String::new(),
        });
        contacts.ensure_self(&account);

        let sink = RecordingSink::default();
        let assets_dir = PathBuf::from("/out/Bob_files");
        let ctx = RenderContext {
            account: &account,
            contacts: &contacts,
            options: ExportOptions::new(),
            media: &sink,
            assets_dir: &assets_dir,
        };

        let mut units = Vec::new();
        let count = store
            .render_messages(&ctx, conversation, &mut |batch| {
                units.extend(batch);
                false
            })
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0][0].template, "msg");
        assert!(units[0][0].fields.contains(&("%%NAME%%".to_string(), "Bob".to_string())));
        // Sender display names resolve through the contact set, own id included.
        assert!(units[1][0].fields.contains(&("%%NAME%%".to_string(), "Alice".to_string())));
        // Markup-significant characters in content are escaped.
        assert!(units[1][0]
            .fields
            .contains(&("%%MESSAGE%%".to_string(), "hi &lt;Bob&gt;".to_string())));
        assert_eq!(units[2][0].template, "system");
    }

    #[test]
    fn test_render_messages_batches_and_early_stop() {
        let backup = FixtureBackup::new();
        let account = seed_account(&backup, "u1", "Alice");
        seed_sessions(&backup, &account, &[("c1", "Bob", 0, 300, "message_1.sqlite")]);

        let rows: Vec<(String, i64, i64, String)> = (0..250)
            .map(|i| ("c1".to_string(), i64::from(i), 0i64, format!("m{i}")))
            .collect();
        let borrowed: Vec<(&str, i64, i64, &str)> = rows
            .iter()
            .map(|(s, t, k, c)| (s.as_str(), *t, *k, c.as_str()))
            .collect();
        seed_messages(&backup, &account, "message_1.sqlite", &borrowed);

        let store = backup.reader().open(false).unwrap();
        let (_, conversations) = store.load_account_content(&account, true).unwrap();

        let contacts = ContactSet::new();
        let sink = RecordingSink::default();
        let assets_dir = PathBuf::from("/out/Bob_files");
        let ctx = RenderContext {
            account: &account,
            contacts: &contacts,
            options: ExportOptions::new(),
            media: &sink,
            assets_dir: &assets_dir,
        };

        // Stop after the first batch: exactly one batch is delivered.
        let mut batches = 0;
        let count = store
            .render_messages(&ctx, &conversations[0], &mut |_batch| {
                batches += 1;
                true
            })
            .unwrap();
        assert_eq!(batches, 1);
        assert_eq!(count, 100);

        // Without early stop all 250 rows arrive, tail batch included.
        let mut sizes = Vec::new();
        let count = store
            .render_messages(&ctx, &conversations[0], &mut |batch| {
                sizes.push(batch.len());
                false
            })
            .unwrap();
        assert_eq!(count, 250);
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_image_message_enqueues_asset() {
        let backup = FixtureBackup::new();
        let account = seed_account(&backup, "u1", "Alice");
        seed_sessions(&backup, &account, &[("c1", "Bob", 0, 300, "message_1.sqlite")]);

        let msg_db = backup.register(APP, &format!("Documents/{}/message_1.sqlite", account.hash));
        let conn = Connection::open(&msg_db).unwrap();
        conn.execute_batch(
            "CREATE TABLE messages (
                id INTEGER PRIMARY KEY, sender_id TEXT, timestamp INTEGER,
                kind INTEGER, content TEXT, asset TEXT
            );",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO messages (sender_id, timestamp, kind, content, asset) \
             VALUES ('c1', 100, 1, NULL, ?1)",
            [&format!("Documents/{}/Img/photo.jpg", account.hash)],
        )
        .unwrap();
        let img = backup.register(APP, &format!("Documents/{}/Img/photo.jpg", account.hash));
        std::fs::write(&img, b"jpeg").unwrap();

        let store = backup.reader().open(false).unwrap();
        let (_, conversations) = store.load_account_content(&account, true).unwrap();

        let contacts = ContactSet::new();
        let sink = RecordingSink::default();
        let assets_dir = PathBuf::from("/out/Bob_files");
        let ctx = RenderContext {
            account: &account,
            contacts: &contacts,
            options: ExportOptions::new(),
            media: &sink,
            assets_dir: &assets_dir,
        };

        let mut units = Vec::new();
        store
            .render_messages(&ctx, &conversations[0], &mut |batch| {
                units.extend(batch);
                false
            })
            .unwrap();

        assert_eq!(units[0][0].template, "image");
        assert!(units[0][0]
            .fields
            .contains(&("%%IMGPATH%%".to_string(), "Bob_files/photo.jpg".to_string())));

        let tasks = sink.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].1, assets_dir.join("photo.jpg"));
        assert_eq!(tasks[0].0, img.to_string_lossy());
    }

    #[test]
    fn test_preview_filter_skips_media_subtrees() {
        let backup = FixtureBackup::new();
        let account = seed_account(&backup, "u1", "Alice");
        let img_logical = format!("Documents/{}/Img/photo.jpg", account.hash);
        backup.register(APP, &img_logical);

        let full = ManifestIndex::load(&backup.root, APP, None).unwrap();
        assert!(full.real_path(&backup.root, &img_logical).is_some());

        let filtered =
            ManifestIndex::load(&backup.root, APP, Some(is_heavy_media_path)).unwrap();
        assert!(filtered.real_path(&backup.root, &img_logical).is_none());
        // Non-media paths survive the filter.
        assert!(filtered
            .real_path(&backup.root, "Documents/accounts.db")
            .is_some());
    }
}
