//! Bilingual notes: one source, two parallel language documents.
//!
//! A bilingual note carries each language in its own callout, marked by a
//! flag in the header line:
//!
//! ```text
//! > [!info]- 🇫🇷 Français
//! > **Title:** Bonjour
//! > **Tags:** rust, #web
//! > ---
//! > Le corps de l'article…
//!
//! > [!info]- 🇬🇧 English
//! > **Title:** Hello
//! > ---
//! > The article body…
//! ```
//!
//! Each language's span runs from the line after its header to the other
//! header, or to the end of the text, so the callouts may come in either
//! order. The span is de-quoted one level. Bold-keyed metadata lines are
//! read up to a `---` / `***` separator; everything after it is the body.
//!
//! A result is never partial: if either language has no title (from
//! metadata or, failing that, the body's first `# ` heading) the whole
//! parse is `None` and the caller falls back to single-language handling.

use once_cell::sync::Lazy;
use regex::{Match, Regex};
use serde::{Deserialize, Serialize};

/// The two languages of a bilingual note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    En,
}

impl Language {
    pub fn flag(self) -> &'static str {
        match self {
            Self::Fr => "🇫🇷",
            Self::En => "🇬🇧",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
        }
    }

    fn header_regex(self) -> &'static Regex {
        match self {
            Self::Fr => &RE_HEADER_FR,
            Self::En => &RE_HEADER_EN,
        }
    }
}

/// Metadata and body for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDocument {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Markdown body, fed through the conversion pipeline on its own.
    pub body: String,
}

/// Both language documents. Never built with only one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualDocument {
    pub fr: LanguageDocument,
    pub en: LanguageDocument,
}

impl BilingualDocument {
    pub fn get(&self, lang: Language) -> &LanguageDocument {
        match lang {
            Language::Fr => &self.fr,
            Language::En => &self.en,
        }
    }
}

// ── Header detection ─────────────────────────────────────────────────────────

fn header_pattern(flag: &str) -> Regex {
    Regex::new(&format!(
        r"(?m)^>[ \t]*\[![^\]\n]+\][+-]?[^\n]*{}[^\n]*$",
        regex::escape(flag)
    ))
    .unwrap()
}

static RE_HEADER_FR: Lazy<Regex> = Lazy::new(|| header_pattern(Language::Fr.flag()));
static RE_HEADER_EN: Lazy<Regex> = Lazy::new(|| header_pattern(Language::En.flag()));

/// True if `text` has exactly one French and exactly one English callout
/// header, on different lines.
pub fn detect(text: &str) -> bool {
    let fr: Vec<Match<'_>> = RE_HEADER_FR.find_iter(text).collect();
    let en: Vec<Match<'_>> = RE_HEADER_EN.find_iter(text).collect();
    fr.len() == 1 && en.len() == 1 && fr[0].start() != en[0].start()
}

/// Split `text` into its two language documents.
///
/// Only the first header for each flag is used; a repeated flag is not an
/// error here (see [`detect`] for the strict check).
pub fn parse(text: &str) -> Option<BilingualDocument> {
    let fr = Language::Fr.header_regex().find(text)?;
    let en = Language::En.header_regex().find(text)?;
    if fr.start() == en.start() {
        return None;
    }
    let fr_doc = parse_language(span(text, fr, en))?;
    let en_doc = parse_language(span(text, en, fr))?;
    Some(BilingualDocument {
        fr: fr_doc,
        en: en_doc,
    })
}

/// Text after `own`'s header line, up to `other`'s header if that comes
/// later.
fn span<'t>(text: &'t str, own: Match<'t>, other: Match<'t>) -> &'t str {
    let end = if other.start() > own.start() {
        other.start()
    } else {
        text.len()
    };
    text.get(own.end()..end).unwrap_or_default()
}

// ── Per-language extraction ──────────────────────────────────────────────────

static RE_QUOTE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>[ \t]?").unwrap());

static RE_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+*][ \t]+)?\*\*\s*([^*:]+?)\s*(?::\s*\*\*|\*\*\s*:)\s*(.*?)\s*$").unwrap()
});

static RE_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[ \t]+(.+?)[ \t#]*$").unwrap());

fn dequote(line: &str) -> &str {
    match RE_QUOTE_MARKER.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

fn is_separator(line: &str) -> bool {
    matches!(line.trim(), "---" | "***")
}

fn parse_language(span: &str) -> Option<LanguageDocument> {
    let lines: Vec<&str> = span.lines().map(dequote).collect();

    // The first separator that only metadata (or nothing) precedes.
    let separator = lines.iter().position(|l| is_separator(l)).filter(|&sep| {
        lines[..sep]
            .iter()
            .all(|l| l.trim().is_empty() || RE_META.is_match(l.trim()))
    });

    // Without a separator, metadata is the leading run of recognised keys.
    let (meta_lines, body_lines) = match separator {
        Some(sep) => (&lines[..sep], &lines[sep + 1..]),
        None => {
            let end = lines
                .iter()
                .position(|l| !(l.trim().is_empty() || is_known_meta(l)))
                .unwrap_or(lines.len());
            lines.split_at(end)
        }
    };

    let mut doc = LanguageDocument {
        body: body_lines.join("\n").trim_matches('\n').to_string(),
        ..LanguageDocument::default()
    };
    for line in meta_lines {
        if let Some(caps) = RE_META.captures(line.trim()) {
            apply_meta(&mut doc, &caps[1], &caps[2]);
        }
    }

    if doc.title.is_empty() {
        doc.title = first_h1(&doc.body)?;
    }
    Some(doc)
}

const META_KEYS: [&str; 12] = [
    "title",
    "subtitle",
    "excerpt",
    "description",
    "slug",
    "focus keyword",
    "focus keyphrase",
    "keyword",
    "tags",
    "image",
    "image path",
    "featured image",
];

fn is_known_meta(line: &str) -> bool {
    RE_META
        .captures(line.trim())
        .is_some_and(|caps| META_KEYS.contains(&caps[1].trim().to_lowercase().as_str()))
}

fn apply_meta(doc: &mut LanguageDocument, key: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let some = || Some(value.to_string());
    match key.trim().to_lowercase().as_str() {
        "title" => doc.title = value.to_string(),
        "subtitle" => doc.subtitle = some(),
        "excerpt" | "description" => doc.excerpt = some(),
        "slug" => doc.slug = some(),
        "focus keyword" | "focus keyphrase" | "keyword" => doc.focus_keyword = some(),
        "tags" => {
            let tags: Vec<String> = value
                .split(',')
                .map(|t| t.trim().trim_start_matches('#').trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            doc.tags = (!tags.is_empty()).then_some(tags);
        }
        "image" | "image path" | "featured image" => doc.image_path = some(),
        _ => {}
    }
}

/// First level-1 heading outside fenced code.
fn first_h1(body: &str) -> Option<String> {
    let mut in_fence = false;
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = RE_H1.captures(line) {
            return Some(caps[1].to_string());
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────────────────────
