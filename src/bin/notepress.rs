//! CLI binary for notepress.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use notepress::{
    convert_bilingual, convert_file, convert_to_file, write_atomic, ConversionConfig,
    ConversionOutput, ConversionStats, OutputFormat, PublishIndex, WikilinkResolver,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a note to HTML (stdout)
  notepress note.md

  # Resolve wikilinks against the publish index, write to a file
  notepress note.md --index published.json -o note.html

  # Keep markdown, only rewrite wikilinks into [text](url)
  notepress note.md --index published.json --format markdown

  # Bilingual note: both languages + metadata as JSON
  notepress note.md --bilingual --image cover.png

  # Which published notes link to this one?
  notepress --index published.json --backlinks notes/rust/ownership.md

PUBLISH INDEX FORMAT (JSON array):
  [
    {
      "displayName": "Ownership",
      "path": "notes/rust/ownership.md",
      "primaryUrl": "https://blog.example/ownership",
      "localizedUrls": { "fr": "https://blog.example/fr/propriete" },
      "secondaryUrl": "https://mirror.example/ownership",
      "links": ["Borrowing"]
    }
  ]

  URL priority: primaryUrl → localizedUrls[<language>] → secondaryUrl.

ENVIRONMENT VARIABLES:
  NOTEPRESS_INDEX               Publish index file
  NOTEPRESS_FORMAT              html | markdown
  NOTEPRESS_LOCALIZED_LANGUAGE  Language key for localizedUrls (default: fr)
  RUST_LOG                      Override log filter (e.g. notepress=debug)
"#;

/// Convert knowledge-base notes into publish-ready markup.
#[derive(Parser, Debug)]
#[command(
    name = "notepress",
    version,
    about = "Convert knowledge-base notes into publish-ready markup",
    long_about = "Convert notes with code, math, diagrams, callouts and wikilinks into \
structural markup (or link-resolved markdown). Protected spans are never touched by \
the markup rules, and wikilinks resolve against an externally supplied publish index.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Note file to convert (UTF-8 markdown, front matter already stripped).
    #[arg(required_unless_present = "backlinks")]
    input: Option<PathBuf>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "NOTEPRESS_OUTPUT")]
    output: Option<PathBuf>,

    /// Publish index (JSON) used to resolve wikilinks.
    #[arg(long, env = "NOTEPRESS_INDEX")]
    index: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "NOTEPRESS_FORMAT", value_enum, default_value = "html")]
    format: FormatArg,

    /// Treat the note as a 🇫🇷/🇬🇧 bilingual note; output is JSON.
    #[arg(long, env = "NOTEPRESS_BILINGUAL")]
    bilingual: bool,

    /// Designated image path passed alongside the body.
    #[arg(long, env = "NOTEPRESS_IMAGE")]
    image: Option<String>,

    /// Language key for the localized-URL step of wikilink resolution.
    #[arg(long, env = "NOTEPRESS_LOCALIZED_LANGUAGE", default_value = "fr")]
    localized_language: String,

    /// Do not emit spacer blocks for runs of blank lines.
    #[arg(long, env = "NOTEPRESS_NO_SPACERS")]
    no_spacers: bool,

    /// Render every wikilink as plain text, without index lookups.
    #[arg(long, env = "NOTEPRESS_NO_WIKILINKS")]
    no_wikilinks: bool,

    /// List published notes linking to PATH (needs --index), then exit.
    #[arg(long, value_name = "PATH")]
    backlinks: Option<String>,

    /// Output structured JSON (ConversionOutput) instead of markup.
    #[arg(long, env = "NOTEPRESS_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTEPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTEPRESS_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Html,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let mut resolver = load_resolver(&cli, &config)?;

    // ── Backlinks mode ───────────────────────────────────────────────────
    if let Some(ref path) = cli.backlinks {
        let Some(ref resolver) = resolver else {
            bail!("--backlinks needs a publish index (--index or NOTEPRESS_INDEX)");
        };
        let entries = resolver.backlinks(path);
        if cli.json {
            let json = serde_json::to_string_pretty(&entries)
                .context("Failed to serialise backlinks")?;
            println!("{json}");
        } else {
            for entry in &entries {
                println!("{}\t{}", entry.path, entry.display_name);
            }
            if !cli.quiet {
                eprintln!(
                    "{} {} published note(s) link to {}",
                    cyan("◆"),
                    bold(&entries.len().to_string()),
                    path
                );
            }
        }
        return Ok(());
    }

    let Some(ref input) = cli.input else {
        bail!("No input note given");
    };

    // ── Bilingual mode ───────────────────────────────────────────────────
    if cli.bilingual {
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let output = convert_bilingual(&text, &config, resolver.as_mut(), cli.image.as_deref())
            .context("Bilingual conversion failed")?;
        match output {
            Some(output) => {
                let json = serde_json::to_string_pretty(&output)
                    .context("Failed to serialise output")?;
                emit(&cli, &json)?;
                if !cli.quiet {
                    eprintln!(
                        "{} bilingual note  {} / {}",
                        green("✔"),
                        bold(&output.fr.document.title),
                        bold(&output.en.document.title)
                    );
                }
                return Ok(());
            }
            None => warn!(
                "{} is not a complete bilingual note, converting as a single document",
                input.display()
            ),
        }
    }

    // ── Single-document conversion ───────────────────────────────────────
    if let (Some(output_path), false) = (&cli.output, cli.json) {
        let stats = convert_to_file(input, output_path, &config, resolver.as_mut())
            .context("Conversion failed")?;
        summary(&cli, &stats, Some(output_path.as_path()));
        return Ok(());
    }

    let output: ConversionOutput = convert_file(input, &config, resolver.as_mut())
        .context("Conversion failed")?
        .with_image_path(cli.image.clone());
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        emit(&cli, &json)?;
    } else {
        emit(&cli, &output.markup)?;
    }
    summary(&cli, &output.stats, cli.output.as_deref());
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    ConversionConfig::builder()
        .format(cli.format.into())
        .resolve_wikilinks(!cli.no_wikilinks)
        .spacers(!cli.no_spacers)
        .localized_language(&cli.localized_language)
        .build()
        .context("Invalid configuration")
}

fn load_resolver(cli: &Cli, config: &ConversionConfig) -> Result<Option<WikilinkResolver>> {
    let Some(ref path) = cli.index else {
        return Ok(None);
    };
    let index = PublishIndex::from_file(path)
        .with_context(|| format!("Failed to load publish index {}", path.display()))?;
    tracing::debug!("Loaded publish index with {} entries", index.len());
    Ok(Some(WikilinkResolver::new(index, config.localized_language.clone())))
}

/// Write to `--output` (atomically) if given, else stdout with a trailing newline.
fn emit(cli: &Cli, text: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        return write_atomic(path, text)
            .with_context(|| format!("Failed to write {}", path.display()));
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn summary(cli: &Cli, stats: &ConversionStats, output: Option<&Path>) {
    if cli.quiet {
        return;
    }
    let target = output.map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
    eprintln!(
        "{}  {} paragraphs  {} protected  {}µs  →  {}",
        green("✔"),
        stats.paragraphs,
        stats.protected_regions(),
        stats.duration_us,
        bold(&target),
    );
    if stats.wikilinks_resolved + stats.wikilinks_unresolved > 0 {
        eprintln!(
            "   {} wikilinks resolved  /  {} unresolved",
            dim(&stats.wikilinks_resolved.to_string()),
            dim(&stats.wikilinks_unresolved.to_string()),
        );
    }
}
