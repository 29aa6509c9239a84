//! Markup template registry.
//!
//! Templates are named markup fragments with `%%NAME%%` placeholder tokens.
//! Rendering substitutes supplied field values in order as plain literal
//! text replacement, then strips any placeholder that received no value.

use std::collections::HashMap;

/// Reserved marker delimiting placeholder tokens.
const MARKER: &str = "%%";

/// Fixed set of named markup fragments, loaded once per run and immutable
/// thereafter.
#[derive(Debug, Default, Clone)]
pub struct TemplateSet {
    templates: HashMap<String, String>,
}

impl TemplateSet {
    #[must_use]
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    /// Raw markup for a template id; unknown ids yield an empty string and
    /// never fail the run.
    #[must_use]
    pub fn get(&self, id: &str) -> &str {
        self.templates.get(id).map_or("", String::as_str)
    }

    /// Substitute `(placeholder, value)` pairs into the template, strictly
    /// in the given order, then remove every unfilled marker pair.
    ///
    /// Only placeholders beginning with the reserved marker character are
    /// applied; replacement is literal, not recursive.
    #[must_use]
    pub fn render(&self, id: &str, fields: &[(String, String)]) -> String {
        let mut content = self.get(id).to_string();
        for (placeholder, value) in fields {
            if placeholder.starts_with('%') {
                content = content.replace(placeholder.as_str(), value);
            }
        }
        strip_unfilled(&content)
    }
}

/// Delete every paired `%% ... %%` span left in the markup. Scanning stops
/// once an opening marker has no matching closing marker.
fn strip_unfilled(content: &str) -> String {
    let mut result = content.to_string();
    let mut pos = 0;
    while let Some(start) = result[pos..].find(MARKER).map(|i| i + pos) {
        let Some(end) = result[start + MARKER.len()..]
            .find(MARKER)
            .map(|i| i + start + MARKER.len())
        else {
            break;
        };
        result.replace_range(start..end + MARKER.len(), "");
        pos = start;
    }
    result
}

/// Escape markup-significant characters for safe insertion into a document.
#[must_use]
pub fn safe_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Percent-encode a path segment for use in a link.
#[must_use]
pub fn encode_url(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            }
        }
    }
    encoded
}
