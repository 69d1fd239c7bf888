//! Error types for the notepress library.
//!
//! Most malformed author input is *not* an error here. An unresolved
//! wikilink becomes plain text, a bilingual source without a title yields
//! `None`, and an unterminated fence passes through unconverted. Those are
//! degradations, reported through `tracing` warnings and the stats in
//! [`crate::output::ConversionStats`].
//!
//! [`PublishError`] is reserved for the cases the caller must act on:
//!
//! * the input could not be read at all,
//! * a collaborator broke its contract (a publish index entry without a
//!   required field),
//! * the pipeline violated its own placeholder invariant,
//! * the output could not be written,
//! * the configuration is invalid.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the notepress library.
#[derive(Debug, Error)]
pub enum PublishError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be read as UTF-8 text.
    #[error("Could not read '{path}' as UTF-8 text: {detail}")]
    InvalidInput { path: PathBuf, detail: String },

    // ── Publish index errors ──────────────────────────────────────────────
    /// An index entry is missing a field the resolver cannot work without.
    #[error("Publish index entry #{position} has no '{field}'\nEvery entry needs a non-empty displayName and path.")]
    InvalidIndexEntry { position: usize, field: &'static str },

    /// The publish index could not be decoded.
    #[error("Failed to parse publish index: {0}")]
    IndexParse(#[from] serde_json::Error),

    // ── Pipeline invariant errors ─────────────────────────────────────────
    /// A placeholder token was lost, duplicated, or survived restoration.
    #[error("Placeholder '{token}' found {occurrences} time(s) during restoration, expected exactly once")]
    PlaceholderMismatch { token: String, occurrences: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_index_entry_display() {
        let e = PublishError::InvalidIndexEntry {
            position: 3,
            field: "path",
        };
        let msg = e.to_string();
        assert!(msg.contains("#3"), "got: {msg}");
        assert!(msg.contains("'path'"), "got: {msg}");
    }

    #[test]
    fn placeholder_mismatch_display() {
        let e = PublishError::PlaceholderMismatch {
            token: "CODE4".into(),
            occurrences: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("CODE4"));
        assert!(msg.contains("2 time(s)"));
    }

    #[test]
    fn index_parse_from_serde() {
        let err = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
        let e: PublishError = err.into();
        assert!(e.to_string().starts_with("Failed to parse publish index"));
    }

    #[test]
    fn file_not_found_display() {
        let e = PublishError::FileNotFound {
            path: PathBuf::from("notes/missing.md"),
        };
        assert!(e.to_string().contains("notes/missing.md"));
    }
}
