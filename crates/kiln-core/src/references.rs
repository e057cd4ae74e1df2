//! Style-guide reference snippets
//!
//! A reference directory holds `*.example` files. A spec named `crud` gets
//! `crud.example` when it exists; otherwise every snippet is offered,
//! concatenated in file-name order.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};

const EXTENSION: &str = "example";

/// Loaded reference snippets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceLibrary {
    snippets: BTreeMap<String, String>,
}

impl ReferenceLibrary {
    /// Create empty library
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.example` file of a directory
    ///
    /// A missing directory yields an empty library.
    ///
    /// # Errors
    /// Returns error if the directory exists but a file cannot be read
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "reference directory not found, continuing without snippets");
            return Ok(Self::new());
        }

        let mut library = Self::new();
        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io_error(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| ConfigError::io_error(dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text =
                std::fs::read_to_string(&path).map_err(|e| ConfigError::io_error(&path, e))?;
            library.insert(stem, text);
        }
        debug!(dir = %dir.display(), snippets = library.len(), "reference snippets loaded");
        Ok(library)
    }

    /// Add a snippet under a spec name
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.snippets.insert(name.into(), text.into());
    }

    /// Number of snippets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// Check if no snippet is loaded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippet for a spec
    #[must_use]
    pub fn snippet_for(&self, spec_name: &str) -> Option<String> {
        if let Some(text) = self.snippets.get(spec_name) {
            return Some(text.clone());
        }
        if self.snippets.is_empty() {
            return None;
        }
        let mut combined = String::new();
        for (name, text) in &self.snippets {
            let file = format!("{name}.{EXTENSION}");
            let _ = writeln!(combined, "--- START: {file} ---");
            combined.push_str(text.trim_end());
            let _ = writeln!(combined, "\n--- END: {file} ---\n");
        }
        Some(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crud.example"), "def get(db): ...\n").unwrap();
        std::fs::write(dir.path().join("model.example"), "class A: ...\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = ReferenceLibrary::load(dir.path()).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.snippet_for("crud").unwrap(), "def get(db): ...\n");
    }

    #[test]
    fn falls_back_to_all_snippets_in_name_order() {
        let mut library = ReferenceLibrary::new();
        library.insert("model", "class A: ...");
        library.insert("crud", "def get(db): ...");

        let text = library.snippet_for("endpoint").unwrap();
        let crud = text.find("--- START: crud.example ---").unwrap();
        let model = text.find("--- START: model.example ---").unwrap();
        assert!(crud < model);
        assert!(text.contains("def get(db): ...\n--- END: crud.example ---"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let library = ReferenceLibrary::load(dir.path().join("absent")).unwrap();
        assert!(library.is_empty());
        assert_eq!(library.snippet_for("crud"), None);
    }
}
