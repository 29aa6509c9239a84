//! Export pipeline coordinator.
//!
//! Owns the run lifecycle: discovers accounts in the backup, drives the
//! per-account and per-conversation export steps, resolves collision-safe
//! output names, paginates rendered transcripts, manages one media download
//! pool per account and reports start/progress/completion. The run executes
//! on a single background worker; cancellation is a cooperative flag checked
//! at account, conversation and message-batch boundaries.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::domain::{
    stable_hash, Account, AccountStore, AppError, BackupReader, ContactSet, Conversation,
    ExportNotifier, ExportOptions, MessageUnit, NullNotifier, RenderContext, Result, RunState,
};
use crate::infrastructure::downloader::{DownloadPool, LocalMediaFetcher, MediaFetcher};
use crate::infrastructure::resources;

use super::locale::LocaleMap;
use super::naming::NameRegistry;
use super::templates::{encode_url, safe_html, TemplateSet};

/// Messages embedded inline per transcript document; the rest goes into the
/// lazy-load payload.
const PAGE_SIZE: usize = 1000;

/// Immutable description of one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding the `res/` templates and locale resources.
    pub work_dir: PathBuf,
    /// Root of the device backup to read.
    pub backup_dir: PathBuf,
    /// Root of the generated document tree.
    pub output_dir: PathBuf,
    /// Option flags.
    pub options: ExportOptions,
    /// Extension of generated documents.
    pub extension: String,
    /// Name of the template set under `res/`.
    pub template_set: String,
    /// Account id → allowed conversation ids. An empty map exports
    /// everything; an empty set keeps every conversation of that account.
    pub filter: HashMap<String, HashSet<String>>,
    /// Worker threads per account download pool.
    pub download_workers: usize,
}

impl ExportConfig {
    #[must_use]
    pub fn new(
        work_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            backup_dir: backup_dir.into(),
            output_dir: output_dir.into(),
            options: ExportOptions::new(),
            extension: "html".to_string(),
            template_set: "templates".to_string(),
            filter: HashMap::new(),
            download_workers: 4,
        }
    }
}

/// Cloneable handle for requesting cancellation of the active run.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    state: Arc<Mutex<RunState>>,
}

impl CancelHandle {
    /// One-way flag transition; never blocks and does not abort in-flight
    /// downloads by itself.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        let mut state = lock_state(&self.state);
        if *state == RunState::Running {
            *state = RunState::Cancelling;
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// The export run controller.
pub struct Exporter {
    config: ExportConfig,
    reader: Arc<dyn BackupReader>,
    fetcher: Arc<dyn MediaFetcher>,
    notifier: Arc<dyn ExportNotifier>,
    state: Arc<Mutex<RunState>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Exporter {
    #[must_use]
    pub fn new(config: ExportConfig, reader: Arc<dyn BackupReader>) -> Self {
        Self {
            config,
            reader,
            fetcher: Arc::new(LocalMediaFetcher),
            notifier: Arc::new(NullNotifier),
            state: Arc::new(Mutex::new(RunState::Idle)),
            cancelled: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *lock_state(&self.state)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Handle for cancelling from another thread (signal handlers, UI).
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
            state: Arc::clone(&self.state),
        }
    }

    /// Request cooperative cancellation of the active run.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    fn ensure_not_running(&self) -> Result<()> {
        if self.is_running() {
            return Err(AppError::ConfigureWhileRunning);
        }
        Ok(())
    }

    /// Replace the completion notifier. Rejected while a run is active.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_notifier(&mut self, notifier: Arc<dyn ExportNotifier>) -> Result<()> {
        self.ensure_not_running()?;
        self.notifier = notifier;
        Ok(())
    }

    /// Replace the media fetcher used by per-account download pools.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_fetcher(&mut self, fetcher: Arc<dyn MediaFetcher>) -> Result<()> {
        self.ensure_not_running()?;
        self.fetcher = fetcher;
        Ok(())
    }

    /// Toggle text mode (suppresses pagination).
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_text_mode(&mut self, on: bool) -> Result<()> {
        self.set_option(ExportOptions::TEXT_MODE, on)
    }

    /// Conversation sort order; `asc = false` lists newest first.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_order(&mut self, asc: bool) -> Result<()> {
        self.set_option(ExportOptions::DESC_ORDER, !asc)
    }

    /// Place session icons under the session's own folder.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_files_in_session(&mut self, on: bool) -> Result<()> {
        self.set_option(ExportOptions::FILES_IN_SESSION, on)
    }

    /// Skip avatar download and placeholder creation.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_skip_avatars(&mut self, on: bool) -> Result<()> {
        self.set_option(ExportOptions::SKIP_AVATARS, on)
    }

    /// Skip emoji asset folder creation.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_skip_emoji(&mut self, on: bool) -> Result<()> {
        self.set_option(ExportOptions::SKIP_EMOJI, on)
    }

    /// Insert links and labels raw, without URL-encoding/HTML-escaping.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_raw_markup(&mut self, on: bool) -> Result<()> {
        self.set_option(ExportOptions::RAW_MARKUP, on)
    }

    fn set_option(&mut self, flag: u32, on: bool) -> Result<()> {
        self.ensure_not_running()?;
        self.config.options.set(flag, on);
        Ok(())
    }

    /// Output document extension.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_extension(&mut self, extension: impl Into<String>) -> Result<()> {
        self.ensure_not_running()?;
        self.config.extension = extension.into();
        Ok(())
    }

    /// Template set name under the work directory.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_template_set(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_not_running()?;
        self.config.template_set = name.into();
        Ok(())
    }

    /// Restrict the run to the given account → conversation-id sets. An
    /// empty map exports everything; an empty set for an account keeps all
    /// of its conversations.
    ///
    /// # Errors
    /// Returns [`AppError::ConfigureWhileRunning`] mid-run.
    pub fn set_filter(&mut self, filter: HashMap<String, HashSet<String>>) -> Result<()> {
        self.ensure_not_running()?;
        self.config.filter = filter;
        Ok(())
    }

    /// Launch the run on a background worker and return immediately.
    ///
    /// Accepted from Idle and from both terminal states; a new run resets
    /// the cancellation flag.
    ///
    /// # Errors
    /// Returns [`AppError::ExportRunning`] while a run is active and
    /// [`AppError::OutputInaccessible`] when the output root is not a
    /// writable directory.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = lock_state(&self.state);
            if state.is_active() {
                tracing::warn!("previous export task has not completed");
                return Err(AppError::ExportRunning);
            }

            if !self.config.output_dir.is_dir() {
                tracing::error!(path = %self.config.output_dir.display(), "output directory inaccessible");
                return Err(AppError::OutputInaccessible {
                    path: self.config.output_dir.clone(),
                });
            }

            self.cancelled.store(false, Ordering::Relaxed);
            *state = RunState::Running;
        }

        // A finished but never-awaited worker from a previous run.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let worker = RunWorker {
            config: self.config.clone(),
            reader: Arc::clone(&self.reader),
            fetcher: Arc::clone(&self.fetcher),
            notifier: Arc::clone(&self.notifier),
            state: Arc::clone(&self.state),
            cancelled: Arc::clone(&self.cancelled),
        };

        let spawned = std::thread::Builder::new()
            .name("export-run".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                *lock_state(&self.state) = RunState::Idle;
                Err(AppError::io("Failed to spawn export worker", err))
            }
        }
    }

    /// Block the caller until the background run finishes. No-op when no
    /// run is active.
    pub fn wait_for_completion(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("export worker panicked");
                *lock_state(&self.state) = RunState::Completed;
            }
        }
    }

    /// Lightweight, read-only enumeration of accounts and conversations for
    /// a selection UI. Uses the discovery/loader collaborators in their
    /// cheap mode and never mutates run state.
    ///
    /// # Errors
    /// Fails when the primary backup index cannot be loaded.
    pub fn load_preview(&self) -> Result<Vec<(Account, Vec<Conversation>)>> {
        let store = self.reader.open(true)?;
        if let Some(info) = store.client_info() {
            tracing::debug!(app = %info.app_version, os = %info.os_version, "client metadata");
        }

        let accounts = store.list_accounts()?;
        let mut preview = Vec::with_capacity(accounts.len());
        for account in accounts {
            let conversations = match store.load_account_content(&account, false) {
                Ok((_, mut conversations)) => {
                    sort_conversations(&mut conversations, self.config.options);
                    conversations
                }
                Err(err) => {
                    tracing::warn!(account = %account.id, error = %err, "preview load failed for account");
                    Vec::new()
                }
            };
            preview.push((account, conversations));
        }
        Ok(preview)
    }
}

/// Everything the background worker owns for one run.
struct RunWorker {
    config: ExportConfig,
    reader: Arc<dyn BackupReader>,
    fetcher: Arc<dyn MediaFetcher>,
    notifier: Arc<dyn ExportNotifier>,
    state: Arc<Mutex<RunState>>,
    cancelled: Arc<AtomicBool>,
}

struct AccountSummary {
    /// Folder actually used, which is the hash when the preferred name
    /// could not be created.
    folder: String,
    exported_conversations: usize,
}

impl RunWorker {
    fn run(self) {
        let started = Instant::now();
        self.notifier.on_start();

        // Registries are run-scoped: reloaded on every run.
        let locale = resources::load_locale(&self.config.work_dir);

        if let Err(err) = self.execute(&locale) {
            tracing::error!(error = %err, "{}", locale.resolve("Export aborted."));
        }

        let was_cancelled = self.cancelled.load(Ordering::Relaxed);
        *lock_state(&self.state) = if was_cancelled {
            RunState::CompletedCancelled
        } else {
            RunState::Completed
        };

        let elapsed = format_duration(started.elapsed());
        if was_cancelled {
            tracing::info!(elapsed = %elapsed, "{}", locale.resolve("Cancelled."));
        } else {
            tracing::info!(elapsed = %elapsed, "{}", locale.resolve("Completed."));
        }
        self.notifier.on_complete(was_cancelled);
    }

    fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn execute(&self, locale: &LocaleMap) -> Result<()> {
        let templates = resources::load_template_set(&self.config.work_dir, &self.config.template_set);

        tracing::info!(backup = %self.config.backup_dir.display(), "{}", locale.resolve("Reading backup."));
        let store = self.reader.open(false).map_err(|err| {
            tracing::error!(path = %self.config.backup_dir.display(), "{}", locale.resolve("Failed to parse the backup data."));
            err
        })?;

        if let Some(info) = store.client_info() {
            tracing::info!(app = %info.app_version, os = %info.os_version, "{}", locale.resolve("Client version."));
        }

        tracing::info!("{}", locale.resolve("Finding accounts..."));
        let mut accounts = store.list_accounts()?;
        tracing::info!(count = accounts.len(), "{}", locale.resolve("Accounts found."));

        let total = u32::try_from(accounts.len()).unwrap_or(u32::MAX);
        let mut done = 0u32;
        let mut index_body = String::new();
        let mut account_names = NameRegistry::new();

        for account in &mut accounts {
            if self.cancelled() {
                break;
            }

            if !self.config.filter.is_empty() && !self.config.filter.contains_key(&account.id) {
                continue;
            }

            let Some(name) =
                account_names.resolve(&[&account.display_name, &account.id, &account.hash])
            else {
                tracing::warn!(account = %account.id, "{}", locale.resolve("Can't build directory name for account. Skip it."));
                continue;
            };
            account.output_name = name;

            match self.export_account(store.as_ref(), account, &templates, locale) {
                Ok(summary) => {
                    tracing::info!(
                        account = %account.label(),
                        conversations = summary.exported_conversations,
                        "{}",
                        locale.resolve("Finished handling account.")
                    );
                    index_body.push_str(&self.account_list_item(&templates, account, &summary));
                }
                Err(err) => {
                    tracing::warn!(account = %account.id, error = %err, "{}", locale.resolve("Skipped account."));
                }
            }

            done += 1;
            self.notifier.on_progress(done, total);
        }

        let html = templates.render(
            "listframe",
            &[
                ("%%USERNAME%%".to_string(), String::new()),
                ("%%TBODY%%".to_string(), index_body),
            ],
        );
        let index_path = self
            .config
            .output_dir
            .join(format!("index.{}", self.config.extension));
        write_file(&index_path, &html)?;

        Ok(())
    }

    /// Export one account: folder + assets, content load, conversation loop,
    /// account index document, pool drain. The account is skipped entirely
    /// when its folder cannot be created under either naming candidate.
    fn export_account(
        &self,
        store: &dyn AccountStore,
        account: &Account,
        templates: &TemplateSet,
        locale: &LocaleMap,
    ) -> Result<AccountSummary> {
        let options = self.config.options;

        let mut folder = account.output_name.clone();
        let mut base = self.config.output_dir.join(&folder);
        if let Err(err) = fs::create_dir_all(&base) {
            tracing::warn!(folder = %folder, error = %err, "account folder failed, retrying with hash");
            folder = account.hash.clone();
            base = self.config.output_dir.join(&folder);
            fs::create_dir_all(&base).map_err(|e| {
                AppError::io(format!("Failed to create account folder {}", base.display()), e)
            })?;
        }

        self.prepare_asset_dirs(&base, true)?;

        tracing::info!(account = %account.label(), id = %account.id, "{}", locale.resolve("Handling account."));

        let (mut contacts, mut conversations) = store.load_account_content(account, true)?;
        contacts.ensure_self(account);
        sort_conversations(&mut conversations, options);
        tracing::info!(count = conversations.len(), "{}", locale.resolve("Chats found."));

        let user_agent = store
            .client_info()
            .map(|info| info.build_user_agent())
            .unwrap_or_default();
        let pool = DownloadPool::new(
            self.config.download_workers,
            Arc::clone(&self.fetcher),
            user_agent,
        );

        if !options.skip_avatars() && !account.avatar.is_empty() {
            pool.add_task(
                &account.avatar,
                &base.join("Portrait").join(account.local_avatar_name()),
                0,
            );
        }

        let account_filter = self.config.filter.get(&account.id);
        let mut session_names = NameRegistry::new();
        let mut body = String::new();
        let mut exported = 0usize;
        let total = conversations.len();

        for (idx, conversation) in conversations.iter_mut().enumerate() {
            if self.cancelled() {
                break;
            }

            if !self.config.filter.is_empty()
                && !account_filter.is_some_and(|allowed| {
                    allowed.is_empty() || allowed.contains(&conversation.id)
                })
            {
                // Normal filtering, not a fault.
                continue;
            }

            if conversation.display_name.is_empty() {
                if let Some(contact) = contacts.get(&conversation.id) {
                    conversation.display_name = contact.display_name.clone();
                }
            }

            tracing::info!(
                current = idx + 1,
                total,
                chat = %conversation.label(),
                "{}",
                locale.resolve("Handling chat.")
            );

            if conversation.subscription {
                tracing::info!(chat = %conversation.label(), "{}", locale.resolve("Skip subscription."));
                continue;
            }

            let Some(name) = session_names.resolve(&[
                &conversation.display_name,
                &conversation.id,
                &stable_hash(&conversation.id),
            ]) else {
                tracing::warn!(chat = %conversation.id, "{}", locale.resolve("Can't build directory name for chat. Skip it."));
                continue;
            };
            conversation.output_name = name;

            if !options.skip_avatars() && !conversation.avatar.is_empty() {
                pool.add_task(
                    &conversation.avatar,
                    &base.join("Portrait").join(conversation.local_avatar_name()),
                    0,
                );
            }

            let count =
                match self.export_conversation(store, account, &contacts, conversation, &base, &pool, templates)
                {
                    Ok(count) => count,
                    Err(err) => {
                        tracing::warn!(chat = %conversation.id, error = %err, "{}", locale.resolve("Skipped chat."));
                        continue;
                    }
                };

            tracing::info!(messages = count, "{}", locale.resolve("Succeeded handling messages."));

            if count > 0 {
                body.push_str(&self.conversation_list_item(templates, conversation));
                exported += 1;
            }
        }

        let username = if options.raw_markup() {
            account.label().to_string()
        } else {
            safe_html(account.label())
        };
        let html = templates.render(
            "listframe",
            &[
                ("%%USERNAME%%".to_string(), format!(" - {username}")),
                ("%%TBODY%%".to_string(), body),
            ],
        );
        write_file(&base.join(format!("index.{}", self.config.extension)), &html)?;

        if self.cancelled() {
            pool.request_cancel();
        } else {
            let pending = pool.running_count();
            if pending > 0 {
                tracing::info!(pending, "{}", locale.resolve("Waiting for media downloads."));
            }
        }
        pool.drain();

        Ok(AccountSummary {
            folder,
            exported_conversations: exported,
        })
    }

    /// Export one conversation transcript. Returns the renderer's message
    /// count; zero means "exclude from the account index".
    fn export_conversation(
        &self,
        store: &dyn AccountStore,
        account: &Account,
        contacts: &ContactSet,
        conversation: &Conversation,
        out_base: &Path,
        pool: &DownloadPool,
        templates: &TemplateSet,
    ) -> Result<usize> {
        if !conversation.has_messages() {
            return Ok(0);
        }

        let assets_dir = out_base.join(format!("{}_files", conversation.output_name));
        self.prepare_asset_dirs(&assets_dir, false)?;

        let mut messages: Vec<String> = Vec::with_capacity(conversation.record_count);
        let cancelled = Arc::clone(&self.cancelled);
        let mut on_batch = |batch: Vec<MessageUnit>| -> bool {
            for unit in batch {
                let markup: String = unit
                    .iter()
                    .map(|fragment| templates.render(&fragment.template, &fragment.fields))
                    .collect();
                messages.push(markup);
            }
            cancelled.load(Ordering::Relaxed)
        };

        let ctx = RenderContext {
            account,
            contacts,
            options: self.config.options,
            media: pool,
            assets_dir: &assets_dir,
        };
        let count = store.render_messages(&ctx, conversation, &mut on_batch)?;

        if count > 0 && !messages.is_empty() {
            if count != messages.len() {
                tracing::debug!(
                    reported = count,
                    buffered = messages.len(),
                    "renderer count differs from buffered messages"
                );
            }

            let (inline, payload) = paginate(&messages, self.config.options.text_mode())?;
            let display = if self.config.options.raw_markup() {
                conversation.label().to_string()
            } else {
                safe_html(conversation.label())
            };
            let html = templates.render(
                "frame",
                &[
                    ("%%DISPLAYNAME%%".to_string(), display),
                    ("%%BODY%%".to_string(), inline),
                    ("%%JSONDATA%%".to_string(), payload),
                ],
            );
            let path = out_base.join(format!(
                "{}.{}",
                conversation.output_name, self.config.extension
            ));
            write_file(&path, &html)?;
        }

        Ok(count)
    }

    /// Create `Portrait/` and `Emoji/` asset folders under `base` according
    /// to the avatar/emoji/files-in-session policies, and copy the default
    /// avatar placeholder.
    fn prepare_asset_dirs(&self, base: &Path, account_level: bool) -> Result<()> {
        let options = self.config.options;

        if !options.skip_avatars() {
            let portrait = base.join("Portrait");
            fs::create_dir_all(&portrait)
                .map_err(|e| AppError::io("Failed to create Portrait folder", e))?;
            let placeholder = resources::default_avatar_path(&self.config.work_dir);
            let dest = portrait.join(resources::DEFAULT_AVATAR_FILE);
            if let Err(err) = fs::copy(&placeholder, &dest) {
                tracing::debug!(error = %err, "default avatar not copied");
            }
        }

        let emoji_suppressed = if account_level {
            options.files_in_session() && options.skip_emoji()
        } else {
            options.skip_emoji()
        };
        if !emoji_suppressed {
            fs::create_dir_all(base.join("Emoji"))
                .map_err(|e| AppError::io("Failed to create Emoji folder", e))?;
        }

        Ok(())
    }

    fn account_list_item(
        &self,
        templates: &TemplateSet,
        account: &Account,
        summary: &AccountSummary,
    ) -> String {
        let folder = &summary.folder;
        let pic = format!("{folder}/Portrait/{}", account.local_avatar_name());
        let (link, text) = if self.config.options.raw_markup() {
            (
                format!("{folder}/index.{}", self.config.extension),
                account.label().to_string(),
            )
        } else {
            (
                format!("{}/index.{}", encode_url(folder), self.config.extension),
                safe_html(account.label()),
            )
        };
        render_list_item(templates, pic, link, text)
    }

    fn conversation_list_item(
        &self,
        templates: &TemplateSet,
        conversation: &Conversation,
    ) -> String {
        let pic = format!("Portrait/{}", conversation.local_avatar_name());
        let (link, text) = if self.config.options.raw_markup() {
            (
                format!("{}.{}", conversation.output_name, self.config.extension),
                conversation.label().to_string(),
            )
        } else {
            (
                format!(
                    "{}.{}",
                    encode_url(&conversation.output_name),
                    self.config.extension
                ),
                safe_html(conversation.label()),
            )
        };
        render_list_item(templates, pic, link, text)
    }
}

fn render_list_item(templates: &TemplateSet, pic: String, link: String, text: String) -> String {
    templates.render(
        "listitem",
        &[
            ("%%ITEMPICPATH%%".to_string(), pic),
            ("%%ITEMLINK%%".to_string(), link),
            ("%%ITEMTEXT%%".to_string(), text),
        ],
    )
}

/// Sort conversations by last-message timestamp according to the configured
/// order. Invoked by the coordinator, never a loader side effect.
pub(crate) fn sort_conversations(conversations: &mut [Conversation], options: ExportOptions) {
    conversations.sort_by(|a, b| {
        let ord = a.last_message_time.cmp(&b.last_message_time);
        if options.descending() {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Split flattened messages into the inline page and the lazy-load payload.
/// Text mode and short conversations embed everything inline with an
/// empty-array sentinel payload.
fn paginate(messages: &[String], text_mode: bool) -> Result<(String, String)> {
    let inline_end = if text_mode || messages.len() <= PAGE_SIZE {
        messages.len()
    } else {
        PAGE_SIZE
    };
    let inline = messages[..inline_end].concat();
    let payload = if inline_end == messages.len() {
        "[]".to_string()
    } else {
        serde_json::to_string(&messages[inline_end..]).map_err(AppError::json_parse)?
    };
    Ok((inline, payload))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}

fn format_duration(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn lock_state(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
