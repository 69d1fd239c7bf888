//! The publish index: what the host knows about already-published notes.
//!
//! The index is supplied by the surrounding publish workflow (usually as
//! JSON) and is read-only here. Entry order is preserved exactly as given;
//! wikilink resolution is "first match in index order", so a stable order
//! in means stable links out.

use crate::error::PublishError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One indexed note.
///
/// ```json
/// {
///   "displayName": "Rust Ownership",
///   "path": "notes/rust/ownership.md",
///   "primaryUrl": "https://blog.example/rust-ownership",
///   "localizedUrls": { "fr": "https://blog.example/fr/propriete" },
///   "secondaryUrl": "https://mirror.example/ownership",
///   "links": ["Borrowing", "rust/lifetimes"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// The note's own name, matched case-insensitively.
    #[serde(default)]
    pub display_name: String,
    /// Vault-relative path, matched exactly or by suffix.
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_url: Option<String>,
    /// Language key → URL on the primary platform.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub localized_urls: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_url: Option<String>,
    /// Raw wikilink targets found in this note.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

impl IndexEntry {
    pub fn new(display_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_primary_url(mut self, url: impl Into<String>) -> Self {
        self.primary_url = Some(url.into());
        self
    }

    pub fn with_localized_url(mut self, lang: impl Into<String>, url: impl Into<String>) -> Self {
        self.localized_urls.insert(lang.into(), url.into());
        self
    }

    pub fn with_secondary_url(mut self, url: impl Into<String>) -> Self {
        self.secondary_url = Some(url.into());
        self
    }

    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links = links.into_iter().map(Into::into).collect();
        self
    }

    /// Pick the destination URL: primary, then primary localized for
    /// `lang`, then secondary. Empty strings count as absent.
    pub fn best_url(&self, lang: &str) -> Option<&str> {
        fn present(url: Option<&String>) -> Option<&str> {
            url.map(|u| u.trim()).filter(|u| !u.is_empty())
        }
        present(self.primary_url.as_ref())
            .or_else(|| present(self.localized_urls.get(lang)))
            .or_else(|| present(self.secondary_url.as_ref()))
    }

    /// True if the note has any destination URL at all.
    pub fn is_published(&self) -> bool {
        let nonempty = |u: &String| !u.trim().is_empty();
        self.primary_url.as_ref().is_some_and(nonempty)
            || self.secondary_url.as_ref().is_some_and(nonempty)
            || self.localized_urls.values().any(nonempty)
    }
}

/// A validated, ordered collection of [`IndexEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PublishIndex {
    entries: Vec<IndexEntry>,
}

impl PublishIndex {
    /// Validate and wrap `entries`.
    ///
    /// # Errors
    /// [`PublishError::InvalidIndexEntry`] for the first entry with an empty
    /// `displayName` or `path`.
    pub fn new(entries: Vec<IndexEntry>) -> Result<Self, PublishError> {
        for (position, entry) in entries.iter().enumerate() {
            if entry.display_name.trim().is_empty() {
                return Err(PublishError::InvalidIndexEntry {
                    position,
                    field: "displayName",
                });
            }
            if entry.path.trim().is_empty() {
                return Err(PublishError::InvalidIndexEntry {
                    position,
                    field: "path",
                });
            }
        }
        Ok(Self { entries })
    }

    /// Decode a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, PublishError> {
        let entries: Vec<IndexEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Read and decode a JSON index file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PublishError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PublishError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => PublishError::InvalidInput {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;
        Self::from_json(&json)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry whose path is exactly `path`.
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}
