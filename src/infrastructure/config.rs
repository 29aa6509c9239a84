//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Chat Backup Exporter Configuration
# Auto-generated - edit as needed

[backup]
# Manifest domain holding the messaging app's files
app_domain = "AppDomain-com.example.chat"

# Shared-container domain checked as fallback (optional)
shared_domain = "AppDomainGroup-group.com.example.chat"

[export]
# Output document extension, without the dot
extension = "html"

# Template set directory under <data_dir>/res/
template_set = "templates"

# Media download worker threads
download_workers = 4

[paths]
# Custom data directory (optional, defaults to ~/.chat-backup-exporter)
# data_dir = "/custom/path"
"#;

/// Load configuration from file or create default.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = AppConfig::default_data_dir().join("config.toml");

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<()> {
    let config_path = AppConfig::default_data_dir().join("config.toml");

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.export.extension, "html");
        assert_eq!(config.export.download_workers, 4);
        assert_eq!(
            config.backup.shared_domain.as_deref(),
            Some("AppDomainGroup-group.com.example.chat")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let config = AppConfig::default();

        let content = toml::to_string_pretty(&config).unwrap();
        fs::write(&config_path, content).unwrap();

        let loaded = load_config_from_file(&config_path).unwrap();

        assert_eq!(loaded.export.extension, config.export.extension);
        assert_eq!(loaded.backup.app_domain, config.backup.app_domain);
    }

    #[test]
    fn test_broken_config_is_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "not = [valid").unwrap();

        assert!(matches!(
            load_config_from_file(&config_path),
            Err(AppError::Config { .. })
        ));
    }
}
