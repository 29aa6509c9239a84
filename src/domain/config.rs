//! Application configuration models.
//!
//! Persisted settings: which manifest domains to read from a backup, the
//! export defaults applied when the command line leaves them out, and the
//! work-directory location that holds templates and locale resources.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Manifest-domain configuration for the backup backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Manifest domain holding the messaging app's own files.
    #[serde(default = "default_app_domain")]
    pub app_domain: String,

    /// Optional shared-container domain checked as a fallback.
    #[serde(default = "default_shared_domain")]
    pub shared_domain: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            app_domain: default_app_domain(),
            shared_domain: default_shared_domain(),
        }
    }
}

fn default_app_domain() -> String {
    "AppDomain-com.example.chat".to_string()
}

fn default_shared_domain() -> Option<String> {
    Some("AppDomainGroup-group.com.example.chat".to_string())
}

/// Export defaults, overridable per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Output document extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Template set directory name under `<work>/res/`.
    #[serde(default = "default_template_set")]
    pub template_set: String,

    /// Media download worker count.
    #[serde(default = "default_workers")]
    pub download_workers: usize,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            template_set: default_template_set(),
            download_workers: default_workers(),
        }
    }
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_template_set() -> String {
    "templates".to_string()
}

const fn default_workers() -> usize {
    4
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory holding config and resources.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backup backend configuration.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Export defaults.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Path configuration.
    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chat-backup-exporter")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// Work directory holding `res/` templates and locale files. The data
    /// directory doubles as the work directory.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.data_dir()
    }
}
