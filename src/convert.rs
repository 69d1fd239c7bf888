//! Conversion entry points.
//!
//! Everything here is synchronous and in-memory apart from
//! [`convert_file`] and [`convert_to_file`]. Wikilinks are resolved only
//! when a [`WikilinkResolver`] is supplied and
//! [`ConversionConfig::resolve_wikilinks`] is on; otherwise they degrade to
//! their display text.

use crate::bilingual::{self, Language};
use crate::config::ConversionConfig;
use crate::error::PublishError;
use crate::output::{BilingualOutput, ConversionOutput, ConversionStats, LanguageOutput};
use crate::pipeline::{self, Linker};
use crate::wikilink::WikilinkResolver;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Convert one note, degrading every wikilink to plain text.
///
/// # Example
/// ```rust
/// use notepress::{convert, ConversionConfig};
///
/// let out = convert("# Hello\n\nSome *text*.", &ConversionConfig::default()).unwrap();
/// assert_eq!(out.markup, "<h1>Hello</h1>\n<p>Some <em>text</em>.</p>");
/// ```
///
/// # Errors
/// Only [`PublishError::PlaceholderMismatch`], which means the pipeline
/// itself is broken. Malformed author input never fails.
pub fn convert(text: &str, config: &ConversionConfig) -> Result<ConversionOutput, PublishError> {
    run(text, config, &mut Linker::Degrade)
}

/// Convert one note, resolving wikilinks through `resolver`.
///
/// The resolver's localized language is set from the config first.
pub fn convert_with_resolver(
    text: &str,
    config: &ConversionConfig,
    resolver: &mut WikilinkResolver,
) -> Result<ConversionOutput, PublishError> {
    let mut linker = linker_for(config, Some(resolver), &config.localized_language);
    run(text, config, &mut linker)
}

/// Split a bilingual note and convert both bodies independently.
///
/// Returns `Ok(None)` when the text is not a complete bilingual note; the
/// caller is expected to fall back to [`convert`]. `image_path` fills
/// `imagePath` for any language whose metadata lacks one.
///
/// When resolving, each body looks up localized URLs in its own language.
pub fn convert_bilingual(
    text: &str,
    config: &ConversionConfig,
    mut resolver: Option<&mut WikilinkResolver>,
    image_path: Option<&str>,
) -> Result<Option<BilingualOutput>, PublishError> {
    let Some(doc) = bilingual::parse(text) else {
        return Ok(None);
    };

    let mut convert_one = |lang: Language| -> Result<LanguageOutput, PublishError> {
        let mut document = doc.get(lang).clone();
        if document.image_path.is_none() {
            document.image_path = image_path.map(str::to_string);
        }
        let mut linker = linker_for(config, resolver.as_deref_mut(), lang.code());
        let out = run(&document.body, config, &mut linker)?;
        Ok(LanguageOutput {
            document,
            markup: out.markup,
            stats: out.stats,
        })
    };

    let fr = convert_one(Language::Fr)?;
    let en = convert_one(Language::En)?;
    if let Some(resolver) = resolver {
        resolver.set_localized_language(&config.localized_language);
    }
    info!(fr = %fr.document.title, en = %en.document.title, "Bilingual conversion complete");
    Ok(Some(BilingualOutput { fr, en }))
}

/// Read a UTF-8 note from disk and convert it.
pub fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
    resolver: Option<&mut WikilinkResolver>,
) -> Result<ConversionOutput, PublishError> {
    let text = read_note(path.as_ref())?;
    let mut linker = linker_for(config, resolver, &config.localized_language);
    run(&text, config, &mut linker)
}

/// Convert a note file and write the markup to `output_path`.
///
/// Uses atomic write (temp file in the destination directory + rename) so
/// a reader never sees a partial file.
pub fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    resolver: Option<&mut WikilinkResolver>,
) -> Result<ConversionStats, PublishError> {
    let output = convert_file(input_path, config, resolver)?;
    write_atomic(output_path, &output.markup)?;
    Ok(output.stats)
}

/// Write `contents` to `path` through a temp file in the same directory,
/// renamed into place. Missing parent directories are created.
pub fn write_atomic(path: impl AsRef<Path>, contents: &str) -> Result<(), PublishError> {
    let path = path.as_ref();
    let write_failed = |source: std::io::Error| PublishError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(contents.as_bytes()).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn linker_for<'r>(
    config: &ConversionConfig,
    resolver: Option<&'r mut WikilinkResolver>,
    lang: &str,
) -> Linker<'r> {
    match resolver {
        Some(resolver) if config.resolve_wikilinks => {
            resolver.set_localized_language(lang);
            Linker::Resolve(resolver)
        }
        _ => Linker::Degrade,
    }
}

fn run(
    text: &str,
    config: &ConversionConfig,
    linker: &mut Linker<'_>,
) -> Result<ConversionOutput, PublishError> {
    let start = Instant::now();
    let rendered = pipeline::run(text, config.format, config.spacers, linker)?;
    let stats = ConversionStats::from_rendered(&rendered, start.elapsed());

    if stats.wikilinks_unresolved > 0 {
        warn!(
            "{} wikilink(s) left unresolved and rendered as plain text",
            stats.wikilinks_unresolved
        );
    }
    info!(
        "Converted {} bytes → {} bytes ({} regions, {} paragraphs) in {}µs",
        text.len(),
        rendered.text.len(),
        stats.protected_regions(),
        stats.paragraphs,
        stats.duration_us
    );

    Ok(ConversionOutput {
        markup: rendered.text,
        stats,
        image_path: None,
    })
}

fn read_note(path: &Path) -> Result<String, PublishError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PublishError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => PublishError::InvalidInput {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;
    String::from_utf8(bytes).map_err(|e| PublishError::InvalidInput {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
