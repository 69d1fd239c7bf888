//! Protected regions: lift opaque spans out of the text before any lossy
//! rewriting happens, and put them back at the very end.
//!
//! Code, math and diagrams must survive the block, paragraph and inline
//! passes untouched: a `*` inside a code block is not emphasis, and a `|`
//! inside inline code is not a table cell boundary. Each such span is
//! replaced by a placeholder token and remembered in [`Regions`].
//!
//! ## Extraction order
//!
//! The order is load-bearing:
//!
//! 1. diagram fences (```` ```mermaid ````), which are not generic code
//! 2. quote-wrapped fences (every line prefixed with `>`)
//! 3. ordinary fences
//! 4. inline code, never spanning a line
//! 5. display math `$$…$$`
//! 6. inline math `$…$`, never touching another `$`
//!
//! An unterminated fence matches nothing and is left in the text. Later
//! stages may mangle it; that is accepted, not an error.
//!
//! ## Tokens
//!
//! A token is `U+E000 KIND INDEX U+E001`. The sentinels are private-use
//! characters stripped from author input by [`super::normalize`], and none
//! of the characters involved is markdown syntax.

use crate::error::PublishError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

pub(crate) const TOKEN_OPEN: char = '\u{E000}';
pub(crate) const TOKEN_CLOSE: char = '\u{E001}';

static RE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([A-Z]+)([0-9]+)\u{E001}").unwrap());

static RE_BLOCK_TOKEN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^\u{E000}(?:DIAGRAM|CODE|DMATH)[0-9]+\u{E001}$").unwrap());

/// The kinds of opaque span the engine protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionKind {
    Diagram,
    CodeBlock,
    InlineCode,
    MathDisplay,
    MathInline,
}

impl RegionKind {
    fn tag(self) -> &'static str {
        match self {
            RegionKind::Diagram => "DIAGRAM",
            RegionKind::CodeBlock => "CODE",
            RegionKind::InlineCode => "ICODE",
            RegionKind::MathDisplay => "DMATH",
            RegionKind::MathInline => "IMATH",
        }
    }
}

/// How a region is written back on restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Put back exactly what was lifted.
    Verbatim,
    /// Code and diagrams become escaped `<pre>`/`<code>` markup; math is
    /// left literal for the destination's math renderer.
    Html,
}

/// One lifted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRegion {
    pub kind: RegionKind,
    /// Unique within one conversion, assigned in extraction order.
    pub index: usize,
    /// The source text exactly as it appeared in the input.
    pub original: String,
    /// What restoration writes in place of the token.
    pub rendered: String,
}

impl ProtectedRegion {
    /// The placeholder standing in for this region.
    pub fn token(&self) -> String {
        format!("{}{}{}{}", TOKEN_OPEN, self.kind.tag(), self.index, TOKEN_CLOSE)
    }

    fn label(&self) -> String {
        format!("{}{}", self.kind.tag(), self.index)
    }
}

/// Every region lifted during one conversion, in extraction order.
///
/// Threaded by value through each extraction step and through the later
/// pipeline stages, then consumed by [`Regions::restore`].
#[derive(Debug, Clone, Default)]
pub struct Regions {
    regions: Vec<ProtectedRegion>,
}

impl Regions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a region and return its token.
    fn push(&mut self, kind: RegionKind, original: &str, rendered: String) -> String {
        let region = ProtectedRegion {
            kind,
            index: self.regions.len(),
            original: original.to_string(),
            rendered,
        };
        let token = region.token();
        self.regions.push(region);
        token
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtectedRegion> {
        self.regions.iter()
    }

    /// Original snippets of one kind, in extraction order.
    pub fn of_kind(&self, kind: RegionKind) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.original.as_str())
            .collect()
    }

    pub fn count(&self, kind: RegionKind) -> usize {
        self.regions.iter().filter(|r| r.kind == kind).count()
    }

    /// Substitute every token with its region's rendered text.
    ///
    /// Regions are restored newest first: a later region (display math,
    /// say) may have swallowed an earlier token (inline code inside it),
    /// which then reappears and is restored on a later iteration.
    ///
    /// Each token must be present exactly once when its turn comes, and no
    /// token may survive. Anything else means a stage dropped or duplicated
    /// a placeholder.
    pub fn restore(&self, text: &str) -> Result<String, PublishError> {
        let mut out = text.to_string();
        for region in self.regions.iter().rev() {
            let token = region.token();
            let occurrences = out.matches(token.as_str()).count();
            if occurrences != 1 {
                return Err(PublishError::PlaceholderMismatch {
                    token: region.label(),
                    occurrences,
                });
            }
            out = out.replacen(token.as_str(), &region.rendered, 1);
        }
        if let Some(caps) = RE_TOKEN.captures(&out) {
            return Err(PublishError::PlaceholderMismatch {
                token: format!("{}{}", &caps[1], &caps[2]),
                occurrences: 1,
            });
        }
        Ok(out)
    }
}

/// True if `line` is nothing but a block-level placeholder (code block,
/// diagram or display math), i.e. it must not be wrapped in a paragraph.
pub(crate) fn is_block_token_line(line: &str) -> bool {
    RE_BLOCK_TOKEN_LINE.is_match(line.trim())
}

// ── Extraction ───────────────────────────────────────────────────────────────

type Step = fn(&str, Regions, RenderMode) -> (String, Regions);

/// The extraction steps, in the order they must run.
const STEPS: [Step; 6] = [
    extract_diagrams,
    extract_quoted_fences,
    extract_fences,
    extract_inline_code,
    extract_display_math,
    extract_inline_math,
];

/// Lift every protected span out of `text`.
///
/// Returns the scrubbed text and the regions it references.
pub fn extract(text: &str, mode: RenderMode) -> (String, Regions) {
    STEPS
        .iter()
        .fold((text.to_string(), Regions::new()), |(text, regions), step| {
            step(&text, regions, mode)
        })
}

// ── Step 1: Diagram fences ───────────────────────────────────────────────────

static RE_DIAGRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^```mermaid[ \t]*\n(.*?)^```[ \t]*$").unwrap());

fn extract_diagrams(text: &str, mut regions: Regions, mode: RenderMode) -> (String, Regions) {
    let out = RE_DIAGRAM
        .replace_all(text, |caps: &Captures<'_>| {
            let rendered = match mode {
                RenderMode::Verbatim => caps[0].to_string(),
                RenderMode::Html => render_diagram(&caps[1]),
            };
            regions.push(RegionKind::Diagram, &caps[0], rendered)
        })
        .into_owned();
    (out, regions)
}

// ── Step 2: Quote-wrapped fences ─────────────────────────────────────────────
//
// The whole fence lives inside a blockquote. The content is de-quoted and
// rendered like any other fence; the quote marker is put back in front of
// the token so the block stays inside its quote.

static RE_QUOTED_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(>[ \t]?)```([^\n`]*)\n((?:>[^\n]*\n)*?)>[ \t]?```[ \t]*$").unwrap()
});

static RE_QUOTE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>[ \t]?").unwrap());

fn extract_quoted_fences(text: &str, mut regions: Regions, mode: RenderMode) -> (String, Regions) {
    let out = RE_QUOTED_FENCE
        .replace_all(text, |caps: &Captures<'_>| {
            let lang = caps[2].trim();
            let kind = if lang == "mermaid" {
                RegionKind::Diagram
            } else {
                RegionKind::CodeBlock
            };
            match mode {
                RenderMode::Verbatim => regions.push(kind, &caps[0], caps[0].to_string()),
                RenderMode::Html => {
                    let body = RE_QUOTE_PREFIX.replace_all(&caps[3], "");
                    let rendered = match kind {
                        RegionKind::Diagram => render_diagram(&body),
                        _ => render_code_block(lang, &body),
                    };
                    let token = regions.push(kind, &caps[0], rendered);
                    requote(&token, &caps[1])
                }
            }
        })
        .into_owned();
    (out, regions)
}

/// Prefix every line of `text` with `marker`.
pub(crate) fn requote(text: &str, marker: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", marker, line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Step 3: Ordinary fences ──────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^```([^\n`]*)\n(.*?)^```[ \t]*$").unwrap());

fn extract_fences(text: &str, mut regions: Regions, mode: RenderMode) -> (String, Regions) {
    let out = RE_FENCE
        .replace_all(text, |caps: &Captures<'_>| {
            let rendered = match mode {
                RenderMode::Verbatim => caps[0].to_string(),
                RenderMode::Html => render_code_block(caps[1].trim(), &caps[2]),
            };
            regions.push(RegionKind::CodeBlock, &caps[0], rendered)
        })
        .into_owned();
    (out, regions)
}

// ── Step 4: Inline code ──────────────────────────────────────────────────────
//
// Single line only: a stray backtick must not swallow the rest of the note.

static RE_INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"``([^\n]+?)``|`([^`\n]+)`").unwrap());

fn extract_inline_code(text: &str, mut regions: Regions, mode: RenderMode) -> (String, Regions) {
    let out = RE_INLINE_CODE
        .replace_all(text, |caps: &Captures<'_>| {
            let rendered = match mode {
                RenderMode::Verbatim => caps[0].to_string(),
                RenderMode::Html => {
                    let code = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                    format!("<code>{}</code>", html_escape::encode_text(code.trim()))
                }
            };
            regions.push(RegionKind::InlineCode, &caps[0], rendered)
        })
        .into_owned();
    (out, regions)
}

// ── Step 5: Display math ─────────────────────────────────────────────────────

static RE_DISPLAY_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());

fn extract_display_math(text: &str, mut regions: Regions, _mode: RenderMode) -> (String, Regions) {
    let out = RE_DISPLAY_MATH
        .replace_all(text, |caps: &Captures<'_>| {
            regions.push(RegionKind::MathDisplay, &caps[0], caps[0].to_string())
        })
        .into_owned();
    (out, regions)
}

// ── Step 6: Inline math ──────────────────────────────────────────────────────
//
// `$…$` on one line. Neither delimiter may touch another `$`, the content
// may not start or end with whitespace, and `\$` is never a delimiter, so
// prices like "$5 and $10" stay text.

fn extract_inline_math(text: &str, mut regions: Regions, _mode: RenderMode) -> (String, Regions) {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if is_math_open(bytes, i) {
            if let Some(close) = find_math_close(bytes, i) {
                out.push_str(&text[copied..i]);
                let span = &text[i..=close];
                out.push_str(&regions.push(RegionKind::MathInline, span, span.to_string()));
                copied = close + 1;
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    (out, regions)
}

fn is_math_open(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'$'
        && (i == 0 || (bytes[i - 1] != b'$' && bytes[i - 1] != b'\\'))
        && bytes
            .get(i + 1)
            .is_some_and(|&b| b != b'$' && !b.is_ascii_whitespace())
}

fn find_math_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut j = open + 2;
    while j < bytes.len() && bytes[j] != b'\n' {
        if bytes[j] == b'$'
            && bytes[j - 1] != b'\\'
            && bytes[j - 1] != b'$'
            && !bytes[j - 1].is_ascii_whitespace()
            && bytes.get(j + 1) != Some(&b'$')
        {
            return Some(j);
        }
        j += 1;
    }
    None
}

// ── Rendering ────────────────────────────────────────────────────────────────

fn render_code_block(lang: &str, body: &str) -> String {
    let code = html_escape::encode_text(body.strip_suffix('\n').unwrap_or(body));
    if lang.is_empty() {
        format!("<pre><code>{}</code></pre>", code)
    } else {
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            html_escape::encode_double_quoted_attribute(lang),
            code
        )
    }
}

fn render_diagram(body: &str) -> String {
    format!(
        "<pre class=\"mermaid\">{}</pre>",
        html_escape::encode_text(body.strip_suffix('\n').unwrap_or(body))
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) {
        let (scrubbed, regions) = extract(input, RenderMode::Verbatim);
        let restored = regions.restore(&scrubbed).unwrap();
        assert_eq!(restored, input, "extract/restore changed the text");
    }

    #[test]
    fn test_verbatim_restore_is_identity() {
        roundtrip("");
        roundtrip("plain text, no regions at all");
        roundtrip("```rust\nfn main() { println!(\"<hi>\"); }\n```\n");
        roundtrip("a `b` c ``d`e`` f");
        roundtrip("$$\n\\int_0^1 x\\,dx\n$$ and $a+b$ and $$x$$");
        roundtrip("```mermaid\ngraph TD\nA-->B\n```\n");
        roundtrip("> ```py\n> print(1)\n> ```\n");
        roundtrip("```\nunterminated fence with `code` and $x$");
        roundtrip("math with code inside $$ a `b` $$ done");
    }

    #[test]
    fn test_extraction_order_diagram_before_code() {
        let (text, regions) = extract("```mermaid\ngraph TD\n```\n\n```sh\nls\n```", RenderMode::Html);
        assert_eq!(regions.count(RegionKind::Diagram), 1);
        assert_eq!(regions.count(RegionKind::CodeBlock), 1);
        assert!(text.contains("DIAGRAM0"));
        assert!(text.contains("CODE1"));
    }

    #[test]
    fn test_code_is_escaped() {
        let (text, regions) = extract("```html\n<b>&</b>\n```", RenderMode::Html);
        let out = regions.restore(&text).unwrap();
        assert_eq!(
            out,
            "<pre><code class=\"language-html\">&lt;b&gt;&amp;&lt;/b&gt;</code></pre>"
        );
    }

    #[test]
    fn test_code_without_language() {
        let (text, regions) = extract("```\nx\n```", RenderMode::Html);
        assert_eq!(regions.restore(&text).unwrap(), "<pre><code>x</code></pre>");
    }

    #[test]
    fn test_inline_code_does_not_span_lines() {
        let (text, regions) = extract("a `b\nc` d", RenderMode::Html);
        assert!(regions.is_empty());
        assert_eq!(text, "a `b\nc` d");
    }

    #[test]
    fn test_inline_code_protects_markup() {
        let (text, regions) = extract("use `a|*b*` here", RenderMode::Html);
        assert!(!text.contains('*'));
        assert_eq!(regions.of_kind(RegionKind::InlineCode), vec!["`a|*b*`"]);
        assert_eq!(
            regions.restore(&text).unwrap(),
            "use <code>a|*b*</code> here"
        );
    }

    #[test]
    fn test_quoted_fence_is_requoted() {
        let input = "> ```js\n> let a = 1 < 2;\n> ```";
        let (text, regions) = extract(input, RenderMode::Html);
        assert!(text.starts_with("> "), "token must stay quoted: {text:?}");
        assert_eq!(text.lines().count(), 1);
        let out = regions.restore(&text).unwrap();
        assert_eq!(
            out,
            "> <pre><code class=\"language-js\">let a = 1 &lt; 2;</code></pre>"
        );
    }

    #[test]
    fn test_inline_math_rules() {
        let (_, regions) = extract("costs $5 and $10 today", RenderMode::Html);
        assert_eq!(regions.count(RegionKind::MathInline), 0);

        let (_, regions) = extract("area is $\\pi r^2$.", RenderMode::Html);
        assert_eq!(regions.of_kind(RegionKind::MathInline), vec!["$\\pi r^2$"]);

        let (_, regions) = extract("escaped \\$x$ is not math", RenderMode::Html);
        assert_eq!(regions.count(RegionKind::MathInline), 0);
    }

    #[test]
    fn test_display_math_before_inline() {
        let (text, regions) = extract("$$E=mc^2$$", RenderMode::Html);
        assert_eq!(regions.count(RegionKind::MathDisplay), 1);
        assert_eq!(regions.count(RegionKind::MathInline), 0);
        assert!(is_block_token_line(&text));
        assert_eq!(regions.restore(&text).unwrap(), "$$E=mc^2$$");
    }

    #[test]
    fn test_indices_unique_and_monotonic() {
        let (_, regions) = extract("`a` `b` $c$ ```\nd\n```", RenderMode::Html);
        let indices: Vec<usize> = regions.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..regions.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_restore_detects_lost_token() {
        let (text, regions) = extract("keep `this`", RenderMode::Html);
        let damaged = text.replace(&regions.iter().next().unwrap().token(), "");
        let err = regions.restore(&damaged).unwrap_err();
        assert!(matches!(
            err,
            PublishError::PlaceholderMismatch { occurrences: 0, .. }
        ));
    }

    #[test]
    fn test_restore_detects_duplicated_token() {
        let (text, regions) = extract("`x`", RenderMode::Html);
        let doubled = format!("{text}{text}");
        assert!(regions.restore(&doubled).is_err());
    }

    #[test]
    fn test_no_token_survives_many_regions() {
        let mut input = String::new();
        for n in 0..5 {
            input.push_str(&format!(
                "`c{n}` $m{n}$ $$d{n}$$\n```\nblock {n}\n```\n```mermaid\ng{n}\n```\n"
            ));
        }
        let (text, regions) = extract(&input, RenderMode::Html);
        assert_eq!(regions.len(), 25);
        let out = regions.restore(&text).unwrap();
        assert!(!RE_TOKEN.is_match(&out));
    }
}
