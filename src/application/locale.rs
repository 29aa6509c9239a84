//! User-facing message lookup.
//!
//! A fixed key→string map loaded once per run. Unknown keys resolve to the
//! key itself, so a missing or partial locale resource degrades to English
//! source strings instead of failing the run.

use std::collections::HashMap;

/// Fixed key→string map, immutable after load.
#[derive(Debug, Default, Clone)]
pub struct LocaleMap {
    strings: HashMap<String, String>,
}

impl LocaleMap {
    #[must_use]
    pub fn new(strings: HashMap<String, String>) -> Self {
        Self { strings }
    }

    /// Build from `(key, value)` pairs; duplicate keys are tolerated, last
    /// write wins.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut strings = HashMap::new();
        for (key, value) in pairs {
            strings.insert(key, value);
        }
        Self { strings }
    }

    /// Mapped value if present, else the key itself verbatim.
    #[must_use]
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.strings.get(key).map_or(key, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
