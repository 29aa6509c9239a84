//! Work-directory resource loading.
//!
//! Templates and locale strings ship as plain files under `<work>/res/` and
//! are loaded once per run. Missing or broken resources degrade (empty
//! markup, key-echo locale) instead of failing the run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::application::locale::LocaleMap;
use crate::application::templates::TemplateSet;

/// Template fragments a template set directory is expected to provide.
const TEMPLATE_NAMES: &[&str] = &[
    "frame", "listframe", "listitem", "msg", "image", "video", "audio", "system", "notice",
];

/// Filename of the placeholder avatar copied into every `Portrait/` folder.
pub const DEFAULT_AVATAR_FILE: &str = "default_avatar.png";

/// Path of the bundled placeholder avatar under the work directory.
#[must_use]
pub fn default_avatar_path(work_dir: &Path) -> PathBuf {
    work_dir.join("res").join(DEFAULT_AVATAR_FILE)
}

/// Load the named template set from `<work>/res/<set>/<name>.html`.
///
/// A missing fragment is logged and mapped to an empty string, matching the
/// registry's degrade-to-empty contract.
#[must_use]
pub fn load_template_set(work_dir: &Path, set_name: &str) -> TemplateSet {
    let base = work_dir.join("res").join(set_name);
    let mut templates = HashMap::with_capacity(TEMPLATE_NAMES.len());

    for name in TEMPLATE_NAMES {
        let path = base.join(format!("{name}.html"));
        let markup = match fs::read_to_string(&path) {
            Ok(markup) => markup,
            Err(err) => {
                tracing::warn!(template = name, path = %path.display(), error = %err, "template not loaded");
                String::new()
            }
        };
        templates.insert((*name).to_string(), markup);
    }

    TemplateSet::new(templates)
}

/// Load locale strings from `<work>/res/locale.json`, a JSON array of
/// `{"key": ..., "value": ...}` objects. Duplicate keys are tolerated, last
/// write wins. A missing or unparsable file yields an empty map.
#[must_use]
pub fn load_locale(work_dir: &Path) -> LocaleMap {
    let path = work_dir.join("res").join("locale.json");
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no locale resource, using source strings");
            return LocaleMap::default();
        }
    };

    let entries: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "locale resource unparsable");
            return LocaleMap::default();
        }
    };

    LocaleMap::from_pairs(entries.iter().filter_map(|entry| {
        let key = entry.get("key")?.as_str()?;
        let value = entry.get("value")?.as_str()?;
        Some((key.to_string(), value.to_string()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_template_set() {
        let dir = tempdir().unwrap();
        let set_dir = dir.path().join("res/templates");
        fs::create_dir_all(&set_dir).unwrap();
        fs::write(set_dir.join("frame.html"), "<html>%%BODY%%</html>").unwrap();
        fs::write(set_dir.join("msg.html"), "<p>%%TEXT%%</p>").unwrap();

        let set = load_template_set(dir.path(), "templates");
        assert_eq!(set.get("frame"), "<html>%%BODY%%</html>");
        assert_eq!(set.get("msg"), "<p>%%TEXT%%</p>");
        // Files that are not on disk degrade to empty markup.
        assert_eq!(set.get("listframe"), "");
    }

    #[test]
    fn test_load_locale_with_duplicates() {
        let dir = tempdir().unwrap();
        let res = dir.path().join("res");
        fs::create_dir_all(&res).unwrap();
        fs::write(
            res.join("locale.json"),
            r#"[
                {"key": "Completed in %s.", "value": "Fertig in %s."},
                {"key": "dup", "value": "one"},
                {"key": "dup", "value": "two"}
            ]"#,
        )
        .unwrap();

        let locale = load_locale(dir.path());
        assert_eq!(locale.resolve("Completed in %s."), "Fertig in %s.");
        assert_eq!(locale.resolve("dup"), "two");
        assert_eq!(locale.resolve("missing"), "missing");
    }

    #[test]
    fn test_missing_resources_degrade() {
        let dir = tempdir().unwrap();
        let locale = load_locale(dir.path());
        assert!(locale.is_empty());

        let set = load_template_set(dir.path(), "nope");
        assert_eq!(set.get("frame"), "");
    }
}
