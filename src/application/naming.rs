//! Collision-safe output name resolution.
//!
//! Accounts and conversations get deterministic filesystem names derived
//! from an ordered candidate list (display name, identifier, identifier
//! hash). Collisions within one scope are resolved with `_2`, `_3`, ...
//! suffixes, first seen keeps the bare name.

use std::collections::HashSet;

/// Characters rejected for output file and folder names.
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Set of names already assigned within one scope (all accounts, or the
/// conversations of a single account). Discarded at end of scope.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a unique name from the candidates, in priority order.
    ///
    /// The first candidate that survives invalid-character stripping becomes
    /// the base name; an already-used base name gets the first free integer
    /// suffix starting at `_2`. Returns `None` only when no candidate yields
    /// a non-empty valid base name.
    pub fn resolve(&mut self, candidates: &[&str]) -> Option<String> {
        let base = candidates
            .iter()
            .map(|candidate| sanitize(candidate))
            .find(|name| is_valid_name(name))?;

        let name = if self.used.contains(&base) {
            let mut suffix = 2usize;
            loop {
                let numbered = format!("{base}_{suffix}");
                if !self.used.contains(&numbered) {
                    break numbered;
                }
                suffix += 1;
            }
        } else {
            base
        };

        self.used.insert(name.clone());
        Some(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Strip characters invalid for the target filesystem, including control
/// characters, and trim surrounding whitespace and trailing dots.
fn sanitize(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c) && !c.is_control())
        .collect();

    stripped.trim().trim_end_matches('.').to_string()
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}
