//! Configuration types for note conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is plain data (`Clone`,
//! serde-serialisable) so the CLI, tests, and embedding hosts can all build
//! one the same way and log it verbatim.

use crate::error::PublishError;
use serde::{Deserialize, Serialize};

/// Configuration for a single conversion call.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use notepress::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .format(OutputFormat::Markdown)
///     .localized_language("fr")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Destination format. Default: [`OutputFormat::Html`].
    ///
    /// `Html` runs the whole block/paragraph/inline pipeline. `Markdown`
    /// keeps the text as markdown and only rewrites wikilinks, for
    /// destinations that render markdown themselves.
    pub format: OutputFormat,

    /// Look wikilinks up in the publish index. Default: true.
    ///
    /// When false every `[[target]]` degrades to its display text.
    pub resolve_wikilinks: bool,

    /// Emit a spacer block for runs of two or more blank lines. Default: true.
    pub spacers: bool,

    /// Language key used for the localized-URL step of wikilink resolution.
    /// Default: `"fr"`.
    pub localized_language: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            resolve_wikilinks: true,
            spacers: true,
            localized_language: "fr".to_string(),
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn resolve_wikilinks(mut self, v: bool) -> Self {
        self.config.resolve_wikilinks = v;
        self
    }

    pub fn spacers(mut self, v: bool) -> Self {
        self.config.spacers = v;
        self
    }

    pub fn localized_language(mut self, lang: impl Into<String>) -> Self {
        self.config.localized_language = lang.into().trim().to_ascii_lowercase();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PublishError> {
        let lang = &self.config.localized_language;
        if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PublishError::InvalidConfig(format!(
                "localized language must be an alphabetic tag like \"fr\", got {:?}",
                lang
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Destination format for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structural + inline markup (`<h1>`, `<p>`, `<a href>`, …). (default)
    #[default]
    Html,
    /// Markdown that continues downstream as markdown; wikilinks become
    /// `[text](url)` links and nothing else is rewritten.
    Markdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.format, OutputFormat::Html);
        assert!(c.resolve_wikilinks);
        assert!(c.spacers);
        assert_eq!(c.localized_language, "fr");
    }

    #[test]
    fn builder_normalises_language() {
        let c = ConversionConfig::builder()
            .localized_language(" EN ")
            .build()
            .unwrap();
        assert_eq!(c.localized_language, "en");
    }

    #[test]
    fn builder_rejects_bad_language() {
        let err = ConversionConfig::builder()
            .localized_language("f-r")
            .build()
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidConfig(_)));

        assert!(ConversionConfig::builder()
            .localized_language("")
            .build()
            .is_err());
    }

    #[test]
    fn format_serialises_lowercase() {
        let json = serde_json::to_string(&OutputFormat::Markdown).unwrap();
        assert_eq!(json, "\"markdown\"");
    }
}
