//! Wikilink resolution against the publish index.
//!
//! `[[target]]`, `[[target|alias]]`, `[[target#Heading]]` and embeds
//! `![[target]]` are rewritten into real links when the target is already
//! published, and into their display text when it is not. Raw bracket
//! syntax never reaches the output.
//!
//! ## Lookup order
//!
//! 1. exact path (`notes/a.md`, or `notes/a` with `.md` implied)
//! 2. display name, case-insensitive
//! 3. path suffix, for nested references (`rust/ownership`)
//!
//! Within each step the first entry in index order wins. Two notes sharing
//! a display name are not disambiguated further.
//!
//! ## URL priority
//!
//! primary → primary localized (for the configured language) → secondary.
//! See [`IndexEntry::best_url`].

use crate::config::OutputFormat;
use crate::index::{IndexEntry, PublishIndex};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

// Single balanced brackets may appear inside, as in `[[Notes [draft]]]`.
static RE_WIKILINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(!?)\[\[((?:[^\[\]\n]|\[[^\[\]\n]*\])+?)\]\]").unwrap()
});

/// One parsed wikilink occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// The note part, trimmed. Empty for same-page links like `[[#Intro]]`.
    pub target: String,
    pub heading: Option<String>,
    /// Alias if one was given, otherwise the raw text before any `|`.
    pub display: String,
    pub embed: bool,
    pub resolved_url: Option<String>,
}

impl WikiLink {
    /// Parse the text between `[[` and `]]`.
    pub fn parse(inner: &str, embed: bool) -> Self {
        let (raw, alias) = match inner.split_once('|') {
            // `\|` is how a pipe is escaped inside a table cell.
            Some((raw, alias)) => (raw.trim_end_matches('\\'), Some(alias.trim())),
            None => (inner, None),
        };
        let (target, heading) = match raw.split_once('#') {
            Some((t, h)) => (t.trim(), Some(h.trim()).filter(|h| !h.is_empty())),
            None => (raw.trim(), None),
        };
        let display = match (alias.filter(|a| !a.is_empty()), heading) {
            (Some(alias), _) => alias.to_string(),
            (None, Some(h)) if target.is_empty() => h.to_string(),
            _ => raw.trim().to_string(),
        };
        Self {
            target: target.to_string(),
            heading: heading.map(str::to_string),
            display,
            embed,
            resolved_url: None,
        }
    }

    /// The final href: resolved URL plus heading fragment.
    fn href(&self) -> Option<String> {
        let fragment = self.heading.as_deref().map(|h| format!("#{}", slugify(h)));
        match (&self.resolved_url, fragment) {
            (Some(url), Some(f)) => Some(format!("{url}{f}")),
            (Some(url), None) => Some(url.clone()),
            (None, Some(f)) if self.target.is_empty() => Some(f),
            _ => None,
        }
    }

    fn render(&self, format: OutputFormat) -> String {
        let Some(href) = self.href() else {
            return self.display.clone();
        };
        match format {
            OutputFormat::Html => format!(
                "<a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(&href),
                self.display
            ),
            OutputFormat::Markdown if href.contains(' ') => {
                format!("[{}](<{}>)", self.display, href)
            }
            OutputFormat::Markdown => format!("[{}]({})", self.display, href),
        }
    }
}

/// Resolved / unresolved counts for one rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub resolved: usize,
    pub unresolved: usize,
}

/// Heading text → URL fragment: lowercase, words joined by `-`,
/// punctuation dropped.
pub fn slugify(heading: &str) -> String {
    let mut slug = String::with_capacity(heading.len());
    for c in heading.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Resolves wikilinks against one publish index snapshot.
///
/// Lookups are memoized per raw target, negative results included. The
/// cache lives as long as the resolver; call [`clear_cache`] after the
/// index the host holds has changed.
///
/// [`clear_cache`]: WikilinkResolver::clear_cache
#[derive(Debug)]
pub struct WikilinkResolver {
    index: PublishIndex,
    localized_language: String,
    cache: HashMap<String, Option<String>>,
}

impl WikilinkResolver {
    pub fn new(index: PublishIndex, localized_language: impl Into<String>) -> Self {
        Self {
            index,
            localized_language: localized_language.into(),
            cache: HashMap::new(),
        }
    }

    pub fn index(&self) -> &PublishIndex {
        &self.index
    }

    pub fn localized_language(&self) -> &str {
        &self.localized_language
    }

    /// Switch the localized-URL language. Cached URLs were picked for the
    /// old language, so the cache is dropped when it changes.
    pub fn set_localized_language(&mut self, lang: &str) {
        if self.localized_language != lang {
            self.localized_language = lang.to_string();
            self.cache.clear();
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The index entry `target` refers to, if any.
    pub fn find_entry(&self, target: &str) -> Option<&IndexEntry> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        let with_ext = format!("{target}.md");
        let lower = target.to_lowercase();
        let suffix = format!("/{target}");
        let suffix_ext = format!("/{with_ext}");

        let entries = self.index.entries();
        entries
            .iter()
            .find(|e| e.path == target || e.path == with_ext)
            .or_else(|| entries.iter().find(|e| e.display_name.to_lowercase() == lower))
            .or_else(|| {
                entries
                    .iter()
                    .find(|e| e.path.ends_with(&suffix) || e.path.ends_with(&suffix_ext))
            })
    }

    /// Destination URL for `target`, or `None` if it is unknown or not
    /// published yet.
    pub fn resolve(&mut self, target: &str) -> Option<String> {
        let key = target.trim();
        if let Some(hit) = self.cache.get(key) {
            return hit.clone();
        }
        let url = self
            .find_entry(key)
            .and_then(|e| e.best_url(&self.localized_language))
            .map(str::to_string);
        debug!(link = key, url = ?url, "Resolved wikilink");
        self.cache.insert(key.to_string(), url.clone());
        url
    }

    /// Rewrite every wikilink in `text` for `format`.
    pub fn rewrite(&mut self, text: &str, format: OutputFormat) -> (String, LinkStats) {
        let mut stats = LinkStats::default();
        let out = RE_WIKILINK
            .replace_all(text, |caps: &Captures<'_>| {
                let mut link = WikiLink::parse(&caps[2], !caps[1].is_empty());
                if !link.target.is_empty() {
                    link.resolved_url = self.resolve(&link.target);
                }
                if link.href().is_some() {
                    stats.resolved += 1;
                } else {
                    stats.unresolved += 1;
                    warn!(link = %link.target, "Unresolved wikilink, keeping display text");
                }
                link.render(format)
            })
            .into_owned();
        (out, stats)
    }

    /// Published entries, other than `path` itself, that link to `path`.
    ///
    /// Returned in index order. Republishing them is up to the caller.
    pub fn backlinks(&self, path: &str) -> Vec<&IndexEntry> {
        let Some(target) = self.index.get(path) else {
            return Vec::new();
        };
        self.index
            .iter()
            .filter(|e| e.path != target.path && e.is_published())
            .filter(|e| {
                e.links.iter().any(|raw| {
                    let link = WikiLink::parse(raw, false);
                    self.find_entry(&link.target)
                        .is_some_and(|hit| hit.path == target.path)
                })
            })
            .collect()
    }
}

/// Replace every wikilink with its display text, without any lookup.
///
/// Used when no resolver is available or resolution is switched off.
pub fn degrade_wikilinks(text: &str) -> (String, LinkStats) {
    let mut stats = LinkStats::default();
    let out = RE_WIKILINK
        .replace_all(text, |caps: &Captures<'_>| {
            stats.unresolved += 1;
            WikiLink::parse(&caps[2], !caps[1].is_empty()).display
        })
        .into_owned();
    (out, stats)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PublishIndex {
        PublishIndex::new(vec![
            IndexEntry::new("Ownership", "notes/rust/ownership.md")
                .with_primary_url("https://blog.test/ownership"),
            IndexEntry::new("Lifetimes", "notes/rust/lifetimes.md")
                .with_localized_url("fr", "https://blog.test/fr/durees")
                .with_secondary_url("https://mirror.test/lifetimes"),
            IndexEntry::new("Draft", "drafts/draft.md"),
            IndexEntry::new("Borrowing", "notes/rust/borrowing.md")
                .with_secondary_url("https://mirror.test/borrowing")
                .with_links(["Ownership", "Lifetimes|lt"]),
            IndexEntry::new("Unpublished fan", "notes/fan.md").with_links(["Ownership"]),
        ])
        .unwrap()
    }

    fn resolver() -> WikilinkResolver {
        WikilinkResolver::new(index(), "fr")
    }

    #[test]
    fn test_parse_variants() {
        let l = WikiLink::parse("Note|Shown", false);
        assert_eq!((l.target.as_str(), l.display.as_str()), ("Note", "Shown"));

        let l = WikiLink::parse("Note#Some Heading", false);
        assert_eq!(l.heading.as_deref(), Some("Some Heading"));
        assert_eq!(l.display, "Note#Some Heading");

        let l = WikiLink::parse("#Intro", false);
        assert_eq!(l.target, "");
        assert_eq!(l.display, "Intro");

        let l = WikiLink::parse("Note\\|alias", false);
        assert_eq!(l.target, "Note");
        assert_eq!(l.display, "alias");
    }

    #[test]
    fn test_lookup_order() {
        let r = resolver();
        assert_eq!(
            r.find_entry("notes/rust/ownership.md").unwrap().display_name,
            "Ownership"
        );
        assert_eq!(
            r.find_entry("notes/rust/ownership").unwrap().display_name,
            "Ownership"
        );
        assert_eq!(r.find_entry("oWnErShIp").unwrap().display_name, "Ownership");
        assert_eq!(r.find_entry("rust/lifetimes").unwrap().display_name, "Lifetimes");
        assert!(r.find_entry("nothing").is_none());
        assert!(r.find_entry("").is_none());
    }

    #[test]
    fn test_first_match_wins_on_shared_name() {
        let index = PublishIndex::new(vec![
            IndexEntry::new("Same", "a/same.md").with_primary_url("https://a"),
            IndexEntry::new("Same", "b/same.md").with_primary_url("https://b"),
        ])
        .unwrap();
        let mut r = WikilinkResolver::new(index, "fr");
        assert_eq!(r.resolve("same").as_deref(), Some("https://a"));
    }

    #[test]
    fn test_url_priority_through_resolver() {
        let mut r = resolver();
        assert_eq!(r.resolve("Ownership").as_deref(), Some("https://blog.test/ownership"));
        assert_eq!(r.resolve("Lifetimes").as_deref(), Some("https://blog.test/fr/durees"));
        assert_eq!(r.resolve("Draft"), None);
    }

    #[test]
    fn test_language_switch_clears_cache() {
        let mut r = resolver();
        r.resolve("Lifetimes");
        assert_eq!(r.cache_len(), 1);
        r.set_localized_language("en");
        assert_eq!(r.cache_len(), 0);
        assert_eq!(
            r.resolve("Lifetimes").as_deref(),
            Some("https://mirror.test/lifetimes")
        );
    }

    #[test]
    fn test_cache_memoizes_misses() {
        let mut r = resolver();
        assert_eq!(r.resolve("Ghost"), None);
        assert_eq!(r.resolve("Ghost"), None);
        assert_eq!(r.resolve("Ownership").as_deref(), Some("https://blog.test/ownership"));
        assert_eq!(r.cache_len(), 2);
        r.clear_cache();
        assert_eq!(r.cache_len(), 0);
    }

    #[test]
    fn test_rewrite_html() {
        let mut r = resolver();
        let (out, stats) = r.rewrite("See [[Ownership|this note]] and [[Ghost]].", OutputFormat::Html);
        assert_eq!(
            out,
            "See <a href=\"https://blog.test/ownership\">this note</a> and Ghost."
        );
        assert_eq!(stats, LinkStats { resolved: 1, unresolved: 1 });
    }

    #[test]
    fn test_rewrite_markdown_with_heading() {
        let mut r = resolver();
        let (out, _) = r.rewrite("[[Ownership#Move Semantics]]", OutputFormat::Markdown);
        assert_eq!(
            out,
            "[Ownership#Move Semantics](https://blog.test/ownership#move-semantics)"
        );
    }

    #[test]
    fn test_same_page_heading_link() {
        let mut r = resolver();
        let (out, stats) = r.rewrite("[[#Getting Started]]", OutputFormat::Html);
        assert_eq!(out, "<a href=\"#getting-started\">Getting Started</a>");
        assert_eq!(stats.resolved, 1);
    }

    #[test]
    fn test_embed_never_left_raw() {
        let mut r = resolver();
        let (out, _) = r.rewrite("![[diagram.png]]", OutputFormat::Html);
        assert_eq!(out, "diagram.png");
    }

    #[test]
    fn test_degrade_without_resolver() {
        let (out, stats) = degrade_wikilinks("[[A]] and [[B|bee]]");
        assert_eq!(out, "A and bee");
        assert_eq!(stats.unresolved, 2);
    }

    #[test]
    fn test_single_brackets_inside_link() {
        let (out, stats) = degrade_wikilinks("[[a [b] c]] and x");
        assert_eq!(out, "a [b] c and x");
        assert_eq!(stats.unresolved, 1);

        let (out, _) = degrade_wikilinks("[[Notes [draft]]]");
        assert_eq!(out, "Notes [draft]");
    }

    #[test]
    fn test_backlinks_only_published() {
        let r = resolver();
        let names: Vec<&str> = r
            .backlinks("notes/rust/ownership.md")
            .into_iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Borrowing"]);
        assert!(r.backlinks("nope.md").is_empty());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Move Semantics!"), "move-semantics");
        assert_eq!(slugify("  A -- B  "), "a-b");
        assert_eq!(slugify("Élan vital"), "élan-vital");
    }
}
