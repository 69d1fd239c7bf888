//! Output types returned by the conversion entry points.

use crate::bilingual::LanguageDocument;
use crate::pipeline::protect::RegionKind;
use crate::pipeline::Rendered;
use serde::Serialize;
use std::time::Duration;

/// Result of converting one document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The converted document.
    pub markup: String,
    pub stats: ConversionStats,
    /// Designated image supplied alongside the body, passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl ConversionOutput {
    pub fn with_image_path(mut self, path: Option<String>) -> Self {
        self.image_path = path;
        self
    }
}

/// What one conversion did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub code_blocks: usize,
    pub inline_code: usize,
    pub display_math: usize,
    pub inline_math: usize,
    pub diagrams: usize,
    /// Always 0 for markdown output, which skips paragraph reconstruction.
    pub paragraphs: usize,
    pub spacers: usize,
    pub wikilinks_resolved: usize,
    pub wikilinks_unresolved: usize,
    /// Wall-clock time for the whole conversion.
    pub duration_us: u64,
}

impl ConversionStats {
    pub(crate) fn from_rendered(rendered: &Rendered, elapsed: Duration) -> Self {
        let regions = &rendered.regions;
        Self {
            code_blocks: regions.count(RegionKind::CodeBlock),
            inline_code: regions.count(RegionKind::InlineCode),
            display_math: regions.count(RegionKind::MathDisplay),
            inline_math: regions.count(RegionKind::MathInline),
            diagrams: regions.count(RegionKind::Diagram),
            paragraphs: rendered.layout.paragraphs,
            spacers: rendered.layout.spacers,
            wikilinks_resolved: rendered.links.resolved,
            wikilinks_unresolved: rendered.links.unresolved,
            duration_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        }
    }

    /// Total protected regions of every kind.
    pub fn protected_regions(&self) -> usize {
        self.code_blocks + self.inline_code + self.display_math + self.inline_math + self.diagrams
    }
}

/// One converted language of a bilingual note.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageOutput {
    /// Metadata plus the unconverted body.
    pub document: LanguageDocument,
    pub markup: String,
    pub stats: ConversionStats,
}

/// Both converted languages.
#[derive(Debug, Clone, Serialize)]
pub struct BilingualOutput {
    pub fr: LanguageOutput,
    pub en: LanguageOutput,
}
