//! Pipeline stages for note-to-markup conversion.
//!
//! Each submodule implements exactly one transformation step. The stages
//! are chained through typed values so a stage can only be reached from
//! the one it depends on: inline conversion needs paragraphs, paragraphs
//! need blocks, and everything after protection carries the [`Regions`]
//! that restoration will consume.
//!
//! ## Data Flow
//!
//! ```text
//! Html:
//! raw ──▶ normalize ──▶ protect ──▶ blocks ──▶ paragraphs ──▶ wikilinks ──▶ inline ──▶ restore
//!         Normalized    Protected   Structured Paragraphed    Linked        Inlined    Rendered
//!
//! Markdown:
//! raw ──▶ normalize ──▶ protect ──▶ wikilinks ──▶ restore
//! ```
//!
//! 1. [`normalize`]  : line endings, invisible characters, sentinel chars
//! 2. [`protect`]    : lift code, math and diagrams into placeholder tokens
//! 3. [`blocks`]     : headings, lists, tables, quotes, rules
//! 4. [`paragraphs`] : state machine grouping loose lines into paragraphs
//! 5. wikilinks      : [`crate::wikilink`], before inline so `[[...]]` is
//!    never mistaken for a markdown link
//! 6. [`inline`]     : emphasis, images, links
//! 7. restore        : swap every token back, checked for totality

pub mod blocks;
pub mod inline;
pub mod normalize;
pub mod paragraphs;
pub mod protect;

use crate::config::OutputFormat;
use crate::error::PublishError;
use crate::wikilink::{degrade_wikilinks, LinkStats, WikilinkResolver};
use blocks::BlockElement;
use protect::{RenderMode, Regions};
use tracing::debug;

/// How the wikilink stage treats `[[...]]`.
pub enum Linker<'r> {
    /// Look targets up in the publish index.
    Resolve(&'r mut WikilinkResolver),
    /// Replace every link with its display text.
    Degrade,
}

impl Linker<'_> {
    fn apply(&mut self, text: &str, format: OutputFormat) -> (String, LinkStats) {
        match self {
            Linker::Resolve(resolver) => resolver.rewrite(text, format),
            Linker::Degrade => degrade_wikilinks(text),
        }
    }
}

/// Paragraph and spacer counts from the reconstruction stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    pub paragraphs: usize,
    pub spacers: usize,
}

// ── Stage values ─────────────────────────────────────────────────────────────

/// Clean author text. Entry point of the chain.
#[derive(Debug)]
pub struct Normalized {
    text: String,
}

/// Text with every protected span replaced by a token.
#[derive(Debug)]
pub struct Protected {
    text: String,
    regions: Regions,
}

/// Block constructs converted, one block per line.
#[derive(Debug)]
pub struct Structured {
    text: String,
    regions: Regions,
}

/// Paragraphs rebuilt.
#[derive(Debug)]
pub struct Paragraphed {
    text: String,
    regions: Regions,
    layout: Layout,
}

/// Wikilinks rewritten into anchors, ready for inline conversion.
#[derive(Debug)]
pub struct Linked {
    text: String,
    regions: Regions,
    layout: Layout,
    links: LinkStats,
}

/// Inline markup applied; only restoration is left.
#[derive(Debug)]
pub struct Inlined {
    text: String,
    regions: Regions,
    layout: Layout,
    links: LinkStats,
}

/// Wikilinks rewritten as markdown links; only restoration is left.
#[derive(Debug)]
pub struct MarkdownLinked {
    text: String,
    regions: Regions,
    links: LinkStats,
}

/// Final output of the chain.
#[derive(Debug)]
pub struct Rendered {
    pub text: String,
    pub regions: Regions,
    pub layout: Layout,
    pub links: LinkStats,
}

// ── Transitions ──────────────────────────────────────────────────────────────

impl Normalized {
    pub fn new(raw: &str) -> Self {
        Self {
            text: normalize::normalize(raw),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn protect(self, mode: RenderMode) -> Protected {
        let (text, regions) = protect::extract(&self.text, mode);
        debug!(regions = regions.len(), ?mode, "Protected regions extracted");
        Protected { text, regions }
    }
}

impl Protected {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    pub fn structure(self) -> Structured {
        let text = blocks::convert_blocks(&self.text);
        debug!("Block constructs converted");
        Structured {
            text,
            regions: self.regions,
        }
    }

    /// Markdown destinations: rewrite wikilinks and nothing else.
    pub fn link_markdown(self, linker: &mut Linker<'_>) -> MarkdownLinked {
        let (text, links) = linker.apply(&self.text, OutputFormat::Markdown);
        debug!(resolved = links.resolved, unresolved = links.unresolved, "Wikilinks rewritten");
        MarkdownLinked {
            text,
            regions: self.regions,
            links,
        }
    }

    /// Put every region straight back.
    pub fn restore(self) -> Result<String, PublishError> {
        self.regions.restore(&self.text)
    }
}

impl Structured {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn paragraphs(self, spacers: bool) -> Paragraphed {
        let elements = paragraphs::reconstruct(&self.text, spacers);
        let layout = Layout {
            paragraphs: elements
                .iter()
                .filter(|b| matches!(b, BlockElement::Paragraph { .. }))
                .count(),
            spacers: elements.iter().filter(|b| **b == BlockElement::Spacer).count(),
        };
        debug!(
            blocks = elements.len(),
            paragraphs = layout.paragraphs,
            spacers = layout.spacers,
            "Paragraphs reconstructed"
        );
        Paragraphed {
            text: paragraphs::render(&elements),
            regions: self.regions,
            layout,
        }
    }
}

impl Paragraphed {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn link(self, linker: &mut Linker<'_>) -> Linked {
        let (text, links) = linker.apply(&self.text, OutputFormat::Html);
        debug!(resolved = links.resolved, unresolved = links.unresolved, "Wikilinks rewritten");
        Linked {
            text,
            regions: self.regions,
            layout: self.layout,
            links,
        }
    }
}

impl Linked {
    pub fn inline(self) -> Inlined {
        Inlined {
            text: inline::convert_inline(&self.text),
            regions: self.regions,
            layout: self.layout,
            links: self.links,
        }
    }
}

impl Inlined {
    pub fn restore(self) -> Result<Rendered, PublishError> {
        let text = self.regions.restore(&self.text)?;
        Ok(Rendered {
            text,
            regions: self.regions,
            layout: self.layout,
            links: self.links,
        })
    }
}

impl MarkdownLinked {
    pub fn restore(self) -> Result<Rendered, PublishError> {
        let text = self.regions.restore(&self.text)?;
        Ok(Rendered {
            text,
            regions: self.regions,
            layout: Layout::default(),
            links: self.links,
        })
    }
}

/// Run the whole chain for `format`.
pub fn run(
    raw: &str,
    format: OutputFormat,
    spacers: bool,
    linker: &mut Linker<'_>,
) -> Result<Rendered, PublishError> {
    let normalized = Normalized::new(raw);
    match format {
        OutputFormat::Html => normalized
            .protect(RenderMode::Html)
            .structure()
            .paragraphs(spacers)
            .link(linker)
            .inline()
            .restore(),
        OutputFormat::Markdown => normalized
            .protect(RenderMode::Verbatim)
            .link_markdown(linker)
            .restore(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexEntry, PublishIndex};

    #[test]
    fn test_protect_then_restore_is_identity() {
        let raw = "Text with `code`, $x^2$ and\n```rust\nlet a = 1;\n```\n";
        let out = Normalized::new(raw)
            .protect(RenderMode::Verbatim)
            .restore()
            .unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_html_chain() {
        let out = run(
            "# Title\n\nSome **bold** text.\n\n\n\nAfter the gap.",
            OutputFormat::Html,
            true,
            &mut Linker::Degrade,
        )
        .unwrap();
        assert_eq!(
            out.text,
            "<h1>Title</h1>\n<p>Some <strong>bold</strong> text.</p>\n<p><br></p>\n<p>After the gap.</p>"
        );
        assert_eq!(out.layout, Layout { paragraphs: 2, spacers: 1 });
    }

    #[test]
    fn test_code_survives_inline_pass() {
        let out = run(
            "Use `**not bold**` here.",
            OutputFormat::Html,
            true,
            &mut Linker::Degrade,
        )
        .unwrap();
        assert_eq!(out.text, "<p>Use <code>**not bold**</code> here.</p>");
    }

    #[test]
    fn test_markdown_chain_only_rewrites_links() {
        let index = PublishIndex::new(vec![
            IndexEntry::new("Other", "other.md").with_primary_url("https://x.test/other")
        ])
        .unwrap();
        let mut resolver = WikilinkResolver::new(index, "fr");
        let raw = "# Keep\n\nSee [[Other]] but not `[[Other]]`.";
        let out = run(raw, OutputFormat::Markdown, true, &mut Linker::Resolve(&mut resolver)).unwrap();
        assert_eq!(
            out.text,
            "# Keep\n\nSee [Other](https://x.test/other) but not `[[Other]]`."
        );
        assert_eq!(out.links.resolved, 1);
    }

    #[test]
    fn test_wikilink_alias_not_taken_as_markdown_link() {
        let out = run("[[Missing|shown]](x)", OutputFormat::Html, true, &mut Linker::Degrade).unwrap();
        assert_eq!(out.text, "<p>shown(x)</p>");
    }
}
