//! Inline conversion: emphasis, images and links inside already-built blocks.
//!
//! ## Rule Order
//!
//! Images, links and `<url>` autolinks run first, so their targets are
//! taken from the author text before any emphasis marker inside a URL is
//! rewritten. Images run before links: an image is a link preceded by `!`,
//! and the link pass would otherwise eat it and leave a stray `!`.
//!
//! Emphasis then runs longest marker first. `***x***` must become
//! `<strong><em>x</em></strong>` before the `**` pass sees it, and `**x**`
//! must be gone before the single-`*` pass, or the nesting breaks. Every
//! tag is shielded during these passes, so `href`, `src` and `alt` values
//! (including anchors from the wikilink stage) are never touched.
//!
//! Bare URLs run last, with whole anchors and all other tags shielded, so a
//! URL inside link text or an attribute is never linked twice.
//!
//! Wikilinks are not handled here; see [`crate::wikilink`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Sentinels around a shielded span. Stripped from author input by
/// [`super::normalize`].
pub(crate) const SHIELD_OPEN: char = '\u{E002}';
pub(crate) const SHIELD_CLOSE: char = '\u{E003}';

type Pass = fn(&str) -> String;

const LINK_PASSES: [Pass; 3] = [convert_images, convert_links, convert_angle_autolinks];

const EMPHASIS_PASSES: [Pass; 4] = [
    convert_bold_italic,
    convert_bold,
    convert_italic,
    convert_strikethrough,
];

/// Apply every inline pass to `text`.
pub fn convert_inline(text: &str) -> String {
    let text = apply(text.to_string(), &LINK_PASSES);
    let text = Shielded::new(&text, &RE_TAG)
        .apply(&EMPHASIS_PASSES)
        .restore();
    Shielded::new(&text, &RE_ANCHOR_OR_TAG)
        .apply(&[convert_bare_urls])
        .restore()
}

fn apply(text: String, passes: &[Pass]) -> String {
    passes.iter().fold(text, |text, pass| pass(&text))
}

// ── Shielding ────────────────────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").unwrap());

static RE_ANCHOR_OR_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<a\s[^>]*>.*?</a>|</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").unwrap()
});

static RE_SHIELD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E002}([0-9]+)\u{E003}").unwrap());

/// Text with markup spans swapped out for numbered sentinels.
struct Shielded {
    text: String,
    spans: Vec<String>,
}

impl Shielded {
    fn new(text: &str, re: &Regex) -> Self {
        let mut spans = Vec::new();
        let text = re
            .replace_all(text, |caps: &Captures<'_>| {
                spans.push(caps[0].to_string());
                format!("{}{}{}", SHIELD_OPEN, spans.len() - 1, SHIELD_CLOSE)
            })
            .into_owned();
        Self { text, spans }
    }

    fn apply(mut self, passes: &[Pass]) -> Self {
        self.text = apply(self.text, passes);
        self
    }

    fn restore(self) -> String {
        RE_SHIELD_TOKEN
            .replace_all(&self.text, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.spans.get(i))
                    .map_or_else(|| caps[0].to_string(), Clone::clone)
            })
            .into_owned()
    }
}

// ── Emphasis ─────────────────────────────────────────────────────────────────

static RE_BOLD_ITALIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*(\S(?:[^\n]*?\S)?)\*\*\*|___(\S(?:[^\n]*?\S)?)___").unwrap()
});

static RE_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(\S(?:[^\n]*?\S)?)\*\*|__(\S(?:[^\n]*?\S)?)__").unwrap());

static RE_ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*?[^*\s])?)\*").unwrap());

// `\b` keeps snake_case identifiers intact.
static RE_ITALIC_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b_([^_\s](?:[^_\n]*?[^_\s])?)_\b").unwrap());

static RE_STRIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~(\S(?:[^~\n]*?\S)?)~~").unwrap());

/// Content of whichever alternative matched.
fn either<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str())
}

fn convert_bold_italic(text: &str) -> String {
    RE_BOLD_ITALIC
        .replace_all(text, |caps: &Captures<'_>| {
            format!("<strong><em>{}</em></strong>", either(caps))
        })
        .into_owned()
}

fn convert_bold(text: &str) -> String {
    RE_BOLD
        .replace_all(text, |caps: &Captures<'_>| format!("<strong>{}</strong>", either(caps)))
        .into_owned()
}

fn convert_italic(text: &str) -> String {
    let s = RE_ITALIC_STAR.replace_all(text, "<em>$1</em>");
    RE_ITALIC_UNDERSCORE
        .replace_all(&s, "<em>$1</em>")
        .into_owned()
}

fn convert_strikethrough(text: &str) -> String {
    RE_STRIKE.replace_all(text, "<del>$1</del>").into_owned()
}

// ── Images and links ─────────────────────────────────────────────────────────

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]\n]*)\]\(([^)\s]+)(?:[ \t]+"([^"\n]*)")?\)"#).unwrap()
});

static RE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\]\n]+)\]\(([^)\s]+)(?:[ \t]+"([^"\n]*)")?\)"#).unwrap()
});

fn title_attr(caps: &Captures<'_>) -> String {
    caps.get(3)
        .map(|t| {
            format!(
                " title=\"{}\"",
                html_escape::encode_double_quoted_attribute(t.as_str())
            )
        })
        .unwrap_or_default()
}

fn convert_images(text: &str) -> String {
    RE_IMAGE
        .replace_all(text, |caps: &Captures<'_>| {
            format!(
                "<img src=\"{}\" alt=\"{}\"{}>",
                html_escape::encode_double_quoted_attribute(&caps[2]),
                html_escape::encode_double_quoted_attribute(&caps[1]),
                title_attr(caps)
            )
        })
        .into_owned()
}

fn convert_links(text: &str) -> String {
    RE_LINK
        .replace_all(text, |caps: &Captures<'_>| {
            format!(
                "<a href=\"{}\"{}>{}</a>",
                html_escape::encode_double_quoted_attribute(&caps[2]),
                title_attr(caps),
                &caps[1]
            )
        })
        .into_owned()
}

// ── Plain URLs ───────────────────────────────────────────────────────────────

static RE_ANGLE_AUTOLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(https?://[^>\s]+)>").unwrap());

// A URL counts as bare when it starts the text or follows whitespace, `(`
// or a shielded tag.
static RE_BARE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "(^|[\\s(\u{E003}])(https?://[^\\s<>()\"\u{E002}\u{E003}]+[^\\s<>()\".,;:!?\u{E002}\u{E003}])",
    )
    .unwrap()
});

fn convert_angle_autolinks(text: &str) -> String {
    RE_ANGLE_AUTOLINK
        .replace_all(text, |caps: &Captures<'_>| anchor(&caps[1]))
        .into_owned()
}

fn convert_bare_urls(text: &str) -> String {
    RE_BARE_URL
        .replace_all(text, |caps: &Captures<'_>| format!("{}{}", &caps[1], anchor(&caps[2])))
        .into_owned()
}

fn anchor(url: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        html_escape::encode_double_quoted_attribute(url),
        url
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_italic_nests() {
        assert_eq!(
            convert_inline("***bold-italic***"),
            "<strong><em>bold-italic</em></strong>"
        );
        assert_eq!(
            convert_inline("___both___"),
            "<strong><em>both</em></strong>"
        );
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(convert_inline("**b** and *i*"), "<strong>b</strong> and <em>i</em>");
        assert_eq!(convert_inline("__b__ and _i_"), "<strong>b</strong> and <em>i</em>");
    }

    #[test]
    fn test_italic_inside_bold() {
        assert_eq!(
            convert_inline("**a *b* c**"),
            "<strong>a <em>b</em> c</strong>"
        );
    }

    #[test]
    fn test_snake_case_untouched() {
        assert_eq!(convert_inline("call some_func_name now"), "call some_func_name now");
    }

    #[test]
    fn test_arithmetic_stars_untouched() {
        assert_eq!(convert_inline("2 * 3 * 4"), "2 * 3 * 4");
    }

    #[test]
    fn test_strikethrough() {
        assert_eq!(convert_inline("~~old~~ new"), "<del>old</del> new");
    }

    #[test]
    fn test_image_before_link() {
        assert_eq!(
            convert_inline("![a cat](https://x.test/cat.png)"),
            "<img src=\"https://x.test/cat.png\" alt=\"a cat\">"
        );
    }

    #[test]
    fn test_link_with_title() {
        assert_eq!(
            convert_inline("[docs](https://x.test \"Read me\")"),
            "<a href=\"https://x.test\" title=\"Read me\">docs</a>"
        );
    }

    #[test]
    fn test_linked_image() {
        assert_eq!(
            convert_inline("[![logo](l.png)](https://x.test)"),
            "<a href=\"https://x.test\"><img src=\"l.png\" alt=\"logo\"></a>"
        );
    }

    #[test]
    fn test_autolinks() {
        assert_eq!(
            convert_inline("see <https://x.test/a>"),
            "see <a href=\"https://x.test/a\">https://x.test/a</a>"
        );
        assert_eq!(
            convert_inline("visit https://x.test/b."),
            "visit <a href=\"https://x.test/b\">https://x.test/b</a>."
        );
    }

    #[test]
    fn test_bare_url_at_paragraph_start() {
        assert_eq!(
            convert_inline("<p>https://x.test</p>"),
            "<p><a href=\"https://x.test\">https://x.test</a></p>"
        );
    }

    #[test]
    fn test_link_target_keeps_emphasis_markers() {
        assert_eq!(
            convert_inline("[c](https://x.test/__init__)"),
            "<a href=\"https://x.test/__init__\">c</a>"
        );
        assert_eq!(
            convert_inline("![a](img/_x_.png)"),
            "<img src=\"img/_x_.png\" alt=\"a\">"
        );
    }

    #[test]
    fn test_existing_anchor_attributes_untouched() {
        let anchor = "<a href=\"https://blog.test/_drafts_/post\">Post</a>";
        assert_eq!(convert_inline(anchor), anchor);
        let starred = "<a href=\"https://b.test/a*b*c\">x</a>";
        assert_eq!(convert_inline(starred), starred);
    }

    #[test]
    fn test_emphasis_around_link() {
        assert_eq!(
            convert_inline("**[a](https://x.test)** and [*b*](https://y.test)"),
            "<strong><a href=\"https://x.test\">a</a></strong> and <a href=\"https://y.test\"><em>b</em></a>"
        );
    }

    #[test]
    fn test_bare_url_in_alt_text_untouched() {
        assert_eq!(
            convert_inline("![see https://x.test/a](i.png)"),
            "<img src=\"i.png\" alt=\"see https://x.test/a\">"
        );
    }

    #[test]
    fn test_bare_url_in_link_text_not_nested() {
        assert_eq!(
            convert_inline("[see https://x.test](https://y.test)"),
            "<a href=\"https://y.test\">see https://x.test</a>"
        );
    }

    #[test]
    fn test_bare_url_after_emphasis() {
        assert_eq!(
            convert_inline("**https://x.test**"),
            "<strong><a href=\"https://x.test\">https://x.test</a></strong>"
        );
    }

    #[test]
    fn test_link_href_not_relinked() {
        let out = convert_inline("[x](https://x.test/c)");
        assert_eq!(out.matches("<a ").count(), 1, "got: {out}");
    }
}
