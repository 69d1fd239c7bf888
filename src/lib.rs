//! # notepress
//!
//! Convert personal-knowledge-base notes into publishable markup.
//!
//! ## Why this crate?
//!
//! Notes written for a personal vault lean on syntax no publishing platform
//! understands: `[[wikilinks]]` to other notes, callouts, math, mermaid
//! diagrams, bilingual callout pairs. A naive regex pass over that text
//! mangles code samples and formulae, because the same characters mean
//! emphasis in prose and something else inside a fence. This crate lifts
//! every such span out first, converts the prose around it, and puts the
//! spans back untouched.
//!
//! ## Pipeline Overview
//!
//! ```text
//! note
//!  │
//!  ├─ 1. Normalize   line endings, invisible characters
//!  ├─ 2. Protect     code, math, diagrams → placeholder tokens
//!  ├─ 3. Blocks      headings, lists, tables, quotes, rules
//!  ├─ 4. Paragraphs  state machine over lines, spacer blocks
//!  ├─ 5. Wikilinks   publish-index lookup → anchors
//!  ├─ 6. Inline      emphasis, images, links
//!  └─ 7. Restore     every token back, exactly once
//! ```
//!
//! [`OutputFormat::Markdown`] runs only steps 1, 2, 5 and 7, for
//! destinations that take markdown.
//!
//! ## Quick Start
//!
//! ```rust
//! use notepress::{convert_with_resolver, ConversionConfig, IndexEntry, PublishIndex, WikilinkResolver};
//!
//! let index = PublishIndex::new(vec![
//!     IndexEntry::new("Ownership", "rust/ownership.md")
//!         .with_primary_url("https://blog.example/ownership"),
//! ])?;
//! let mut resolver = WikilinkResolver::new(index, "fr");
//!
//! let out = convert_with_resolver(
//!     "Read [[Ownership|this]] first.",
//!     &ConversionConfig::default(),
//!     &mut resolver,
//! )?;
//! assert_eq!(
//!     out.markup,
//!     "<p>Read <a href=\"https://blog.example/ownership\">this</a> first.</p>"
//! );
//! # Ok::<(), notepress::PublishError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notepress` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! notepress = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bilingual;
pub mod config;
pub mod convert;
pub mod error;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod wikilink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bilingual::{BilingualDocument, Language, LanguageDocument};
pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat};
pub use convert::{
    convert, convert_bilingual, convert_file, convert_to_file, convert_with_resolver, write_atomic,
};
pub use error::PublishError;
pub use index::{IndexEntry, PublishIndex};
pub use output::{BilingualOutput, ConversionOutput, ConversionStats, LanguageOutput};
pub use pipeline::protect::{RegionKind, RenderMode};
pub use wikilink::{WikiLink, WikilinkResolver};
