//! Block conversion: line-anchored markdown constructs become structural
//! markup before paragraphs are rebuilt.
//!
//! Runs on text whose code, math and diagrams are already placeholders, so
//! every regex here can assume it only sees author prose.
//!
//! ## Rule Order
//!
//! 1. Quote-wrapped tables (de-quoted, converted, re-quoted)
//! 2. Plain tables
//! 3. Headings
//! 4. Horizontal rules, before lists so `***` is never an item
//! 5. List items, tagged one by one, then merged into containers
//! 6. Blockquotes, one per line, then merged with their neighbours
//!
//! Every construct renders to a single output line. The paragraph stage
//! relies on that: one line of markup is one block.

use super::protect::requote;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A structural element of the converted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockElement {
    Heading { level: u8, content: String },
    List { ordered: bool, items: Vec<String> },
    Table(Table),
    Blockquote { content: String },
    Rule,
    Paragraph { lines: Vec<String> },
    /// Deliberate vertical gap left by a run of blank lines.
    Spacer,
    /// A line that is already markup (or a block placeholder), passed
    /// through untouched.
    Markup(String),
}

/// Line-break marker joining the lines of one paragraph or quote.
pub const LINE_BREAK: &str = "<br>";

/// The explicit empty-paragraph marker emitted for a spacer.
pub const SPACER: &str = "<p><br></p>";

/// What an empty `>` line becomes before quotes are merged.
pub const EMPTY_QUOTE: &str = "<blockquote></blockquote>";

impl BlockElement {
    /// Render this element as one line of markup.
    pub fn render(&self) -> String {
        match self {
            BlockElement::Heading { level, content } => {
                format!("<h{level}>{content}</h{level}>")
            }
            BlockElement::List { ordered, items } => {
                let tag = if *ordered { "ol" } else { "ul" };
                let items: String = items.iter().map(|i| format!("<li>{i}</li>")).collect();
                format!("<{tag}>{items}</{tag}>")
            }
            BlockElement::Table(table) => table.render(),
            BlockElement::Blockquote { content } if content.is_empty() => EMPTY_QUOTE.to_string(),
            BlockElement::Blockquote { content } => format!("<blockquote>{content}</blockquote>"),
            BlockElement::Rule => "<hr>".to_string(),
            BlockElement::Paragraph { lines } => format!("<p>{}</p>", lines.join(LINE_BREAK)),
            BlockElement::Spacer => SPACER.to_string(),
            BlockElement::Markup(line) => line.clone(),
        }
    }
}

/// Convert every block construct in `text`.
pub fn convert_blocks(text: &str) -> String {
    let s = convert_tables(text, TableVariant::Quoted);
    let s = convert_tables(&s, TableVariant::Plain);
    let s = convert_headings(&s);
    let s = convert_rules(&s);
    let s = convert_lists(&s);
    convert_blockquotes(&s)
}

// ── Rules 1–2: Tables ────────────────────────────────────────────────────────

/// Column alignment taken from the separator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
}

impl Alignment {
    fn from_separator_cell(cell: &str) -> Self {
        match (cell.starts_with(':'), cell.ends_with(':') && cell.len() > 1) {
            (true, true) => Alignment::Center,
            (true, false) => Alignment::Left,
            (false, true) => Alignment::Right,
            (false, false) => Alignment::None,
        }
    }

    fn style(self) -> &'static str {
        match self {
            Alignment::None => "",
            Alignment::Left => " style=\"text-align: left\"",
            Alignment::Center => " style=\"text-align: center\"",
            Alignment::Right => " style=\"text-align: right\"",
        }
    }
}

/// A parsed table. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub alignments: Vec<Alignment>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from its header row, separator row and data rows.
    ///
    /// Short rows are padded with empty cells; long rows keep only the
    /// first `headers.len()` cells.
    pub fn parse(header: &str, separator: &str, rows: &[&str]) -> Self {
        let headers = split_cells(header);
        let width = headers.len();

        let mut alignments: Vec<Alignment> = split_cells(separator)
            .iter()
            .map(|c| Alignment::from_separator_cell(c))
            .collect();
        alignments.resize(width, Alignment::None);

        let rows = rows
            .iter()
            .map(|row| {
                let mut cells = split_cells(row);
                cells.resize(width, String::new());
                cells
            })
            .collect();

        Self {
            headers,
            alignments,
            rows,
        }
    }

    fn render(&self) -> String {
        let mut out = String::from("<table><thead><tr>");
        for (cell, align) in self.headers.iter().zip(&self.alignments) {
            out.push_str(&format!("<th{}>{}</th>", align.style(), cell));
        }
        out.push_str("</tr></thead><tbody>");
        for row in &self.rows {
            out.push_str("<tr>");
            for (cell, align) in row.iter().zip(&self.alignments) {
                out.push_str(&format!("<td{}>{}</td>", align.style(), cell));
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table>");
        out
    }
}

/// Split a table row on `|`, trimming cells and dropping the empty
/// segments produced by the row's outer pipes.
///
/// `\|` is a literal pipe. Pipes inside `[[...]]` never split, and keep
/// their escape so the wikilink stage can still see the alias.
fn split_cells(row: &str) -> Vec<String> {
    let trimmed = row.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_wikilink = 0usize;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some('|')) => {
                if in_wikilink > 0 {
                    cell.push('\\');
                }
                cell.push('|');
                chars.next();
            }
            ('[', Some('[')) => {
                in_wikilink += 1;
                cell.push_str("[[");
                chars.next();
            }
            (']', Some(']')) if in_wikilink > 0 => {
                in_wikilink -= 1;
                cell.push_str("]]");
                chars.next();
            }
            ('|', _) if in_wikilink == 0 => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.contains('|')
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ' || c == '\t')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableVariant {
    Plain,
    Quoted,
}

static RE_QUOTE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>[ \t]?").unwrap());

/// Scan for tables of one variant and render each in place.
///
/// A table is a header row, a separator row, and at least one data row.
/// Anything less is left as text.
fn convert_tables(text: &str, variant: TableVariant) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    // For the quoted variant each line is viewed through its `>` marker.
    let view = |line: &str| -> Option<(String, String)> {
        match variant {
            TableVariant::Plain if line.starts_with('>') => None,
            TableVariant::Plain => Some((String::new(), line.to_string())),
            TableVariant::Quoted => RE_QUOTE_MARKER.find(line).map(|m| {
                (m.as_str().to_string(), line[m.end()..].to_string())
            }),
        }
    };

    while i < lines.len() {
        let header = view(lines[i]);
        let separator = lines.get(i + 1).copied().and_then(view);
        let first_row = lines.get(i + 2).copied().and_then(view);

        if let (Some((marker, header)), Some((_, separator)), Some((_, first_row))) =
            (header, separator, first_row)
        {
            if is_table_row(&header)
                && !is_separator_row(&header)
                && is_separator_row(&separator)
                && is_table_row(&first_row)
            {
                let mut rows = vec![first_row];
                let mut j = i + 3;
                while let Some((_, row)) = lines.get(j).copied().and_then(view) {
                    if !is_table_row(&row) {
                        break;
                    }
                    rows.push(row);
                    j += 1;
                }
                let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
                let rendered = BlockElement::Table(Table::parse(&header, &separator, &row_refs))
                    .render();
                result.push(match variant {
                    TableVariant::Plain => rendered,
                    TableVariant::Quoted => requote(&rendered, &marker),
                });
                i = j;
                continue;
            }
        }

        result.push(lines[i].to_string());
        i += 1;
    }

    rejoin(result, text)
}

/// Join lines back together, keeping the input's trailing newline.
fn rejoin(lines: Vec<String>, original: &str) -> String {
    let mut out = lines.join("\n");
    if original.ends_with('\n') {
        out.push('\n');
    }
    out
}

// ── Rule 3: Headings ─────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.*?)[ \t]*$").unwrap());

fn convert_headings(text: &str) -> String {
    RE_HEADING
        .replace_all(text, |caps: &Captures<'_>| {
            BlockElement::Heading {
                level: caps[1].len() as u8,
                content: caps[2].to_string(),
            }
            .render()
        })
        .into_owned()
}

// ── Rule 4: Horizontal rules ─────────────────────────────────────────────────

static RE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:-{3,}|\*{3,}|_{3,})[ \t]*$").unwrap());

fn convert_rules(text: &str) -> String {
    RE_RULE
        .replace_all(text, BlockElement::Rule.render().as_str())
        .into_owned()
}

// ── Rule 5: Lists ────────────────────────────────────────────────────────────
//
// Items are tagged individually, then each run of consecutive tags becomes
// one container. Ordered items carry their own `<oli>` tag during the merge
// so the unordered pass cannot capture them, and are renamed to `<li>` when
// their `<ol>` is built.

static RE_UNORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+(.*?)[ \t]*$").unwrap());

static RE_ORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[0-9]{1,9}[.)][ \t]+(.*?)[ \t]*$").unwrap());

static RE_UNORDERED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^<li>.*</li>(?:\n|$))+").unwrap());

static RE_ORDERED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^<oli>.*</oli>(?:\n|$))+").unwrap());

fn convert_lists(text: &str) -> String {
    let s = RE_UNORDERED_ITEM.replace_all(text, "<li>$1</li>");
    let s = RE_ORDERED_ITEM.replace_all(&s, "<oli>$1</oli>");
    let s = merge_runs(&s, &RE_UNORDERED_RUN, "li", false);
    merge_runs(&s, &RE_ORDERED_RUN, "oli", true)
}

fn merge_runs(text: &str, run: &Regex, tag: &str, ordered: bool) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    run.replace_all(text, |caps: &Captures<'_>| {
        let items = caps[0]
            .lines()
            .filter_map(|l| l.strip_prefix(open.as_str())?.strip_suffix(close.as_str()))
            .map(str::to_string)
            .collect();
        let mut rendered = BlockElement::List { ordered, items }.render();
        if caps[0].ends_with('\n') {
            rendered.push('\n');
        }
        rendered
    })
    .into_owned()
}

// ── Rule 6: Blockquotes ──────────────────────────────────────────────────────

static RE_QUOTE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>[ \t]?(.*?)[ \t]*$").unwrap());

static RE_QUOTE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</blockquote>(?:\n|<br>)<blockquote>").unwrap());

static RE_CALLOUT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[![A-Za-z0-9_-]+\][+-]?[ \t]*(.*)$").unwrap());

fn convert_blockquotes(text: &str) -> String {
    let s = RE_QUOTE_LINE.replace_all(text, |caps: &Captures<'_>| quote_line(&caps[1]));
    merge_quotes(&s)
}

/// Render the content of one `>` line, recursing into nested quotes.
fn quote_line(content: &str) -> String {
    let content = if let Some(rest) = content.strip_prefix('>') {
        quote_line(rest.trim_start())
    } else if let Some(caps) = RE_CALLOUT_MARKER.captures(content) {
        // Callout header: keep its title, drop the `[!type]` marker.
        if caps[1].is_empty() {
            String::new()
        } else {
            format!("<strong>{}</strong>", &caps[1])
        }
    } else {
        content.to_string()
    };
    BlockElement::Blockquote { content }.render()
}

/// Remove every boundary between a closing quote and the next opening one.
///
/// Repeats until stable: merging the outer level of two nested quotes
/// exposes the boundary between their inner levels.
fn merge_quotes(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = RE_QUOTE_BOUNDARY.replace_all(&current, LINE_BREAK).into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_levels() {
        assert_eq!(convert_headings("# One"), "<h1>One</h1>");
        assert_eq!(convert_headings("###### Six"), "<h6>Six</h6>");
        assert_eq!(convert_headings("####### Seven"), "####### Seven");
        assert_eq!(convert_headings("#tag not heading"), "#tag not heading");
    }

    #[test]
    fn test_heading_content_verbatim() {
        assert_eq!(convert_headings("## A *b* #"), "<h2>A *b* #</h2>");
    }

    #[test]
    fn test_table_basic() {
        let input = "| A | B |\n| --- | :-: |\n| 1 | 2 |";
        assert_eq!(
            convert_blocks(input),
            "<table><thead><tr><th>A</th><th style=\"text-align: center\">B</th></tr></thead>\
             <tbody><tr><td>1</td><td style=\"text-align: center\">2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_table_short_row_padded() {
        let t = Table::parse("| A | B | C |", "|---|---|---|", &["| 1 | 2 |"]);
        assert_eq!(t.rows, vec![vec!["1".to_string(), "2".into(), String::new()]]);
    }

    #[test]
    fn test_table_long_row_truncated() {
        let t = Table::parse("| A | B | C |", "|---|---|---|", &["| 1 | 2 | 3 | 4 |"]);
        assert_eq!(t.rows, vec![vec!["1".to_string(), "2".into(), "3".into()]]);
    }

    #[test]
    fn test_table_escaped_pipes() {
        let t = Table::parse("| A | B |", "|---|---|", &[r"| a \| b | [[Note\|alias]] |"]);
        assert_eq!(t.rows[0], vec!["a | b", r"[[Note\|alias]]"]);
    }

    #[test]
    fn test_table_without_outer_pipes() {
        let t = Table::parse("A | B", "--|--", &["1 | 2"]);
        assert_eq!(t.headers, vec!["A", "B"]);
        assert_eq!(t.rows[0], vec!["1", "2"]);
    }

    #[test]
    fn test_table_needs_data_row() {
        let input = "| A | B |\n| --- | --- |\n\ntext";
        assert_eq!(convert_tables(input, TableVariant::Plain), input);
    }

    #[test]
    fn test_quoted_table_stays_quoted() {
        let input = "> | A |\n> |---|\n> | 1 |\nafter";
        let out = convert_tables(input, TableVariant::Quoted);
        assert_eq!(
            out,
            "> <table><thead><tr><th>A</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table>\nafter"
        );
        let full = convert_blocks(input);
        assert!(full.starts_with("<blockquote><table>"), "got: {full}");
        assert!(full.contains("</table></blockquote>"));
    }

    #[test]
    fn test_plain_pass_ignores_quoted_table() {
        let input = "> | A |\n> |---|\n> | 1 |";
        assert_eq!(convert_tables(input, TableVariant::Plain), input);
    }

    #[test]
    fn test_rules() {
        assert_eq!(convert_rules("---"), "<hr>");
        assert_eq!(convert_rules("*****"), "<hr>");
        assert_eq!(convert_rules("___"), "<hr>");
        assert_eq!(convert_rules("--"), "--");
        assert_eq!(convert_rules("-*-"), "-*-");
    }

    #[test]
    fn test_unordered_list_merged() {
        assert_eq!(
            convert_lists("- a\n* b\n+ c\n"),
            "<ul><li>a</li><li>b</li><li>c</li></ul>\n"
        );
    }

    #[test]
    fn test_ordered_list_not_captured_by_unordered_merge() {
        let out = convert_lists("- a\n- b\n1. one\n2) two");
        assert_eq!(
            out,
            "<ul><li>a</li><li>b</li></ul>\n<ol><li>one</li><li>two</li></ol>"
        );
    }

    #[test]
    fn test_separate_lists_stay_separate() {
        let out = convert_lists("- a\n\n- b");
        assert_eq!(out, "<ul><li>a</li></ul>\n\n<ul><li>b</li></ul>");
    }

    #[test]
    fn test_blockquote_merge() {
        assert_eq!(
            convert_blockquotes("> a\n> b"),
            "<blockquote>a<br>b</blockquote>"
        );
    }

    #[test]
    fn test_empty_quote_line() {
        assert_eq!(convert_blockquotes(">"), EMPTY_QUOTE);
        assert_eq!(
            convert_blockquotes("> a\n>\n> b"),
            "<blockquote>a<br><br>b</blockquote>"
        );
    }

    #[test]
    fn test_nested_quotes() {
        assert_eq!(
            convert_blockquotes("> > a\n> > b"),
            "<blockquote><blockquote>a<br>b</blockquote></blockquote>"
        );
    }

    #[test]
    fn test_quotes_separated_by_blank_line() {
        assert_eq!(
            convert_blockquotes("> a\n\n> b"),
            "<blockquote>a</blockquote>\n\n<blockquote>b</blockquote>"
        );
    }

    #[test]
    fn test_callout_header_in_quote() {
        assert_eq!(
            convert_blockquotes("> [!note]- Heads up\n> body"),
            "<blockquote><strong>Heads up</strong><br>body</blockquote>"
        );
    }

    #[test]
    fn test_rule_before_list() {
        assert_eq!(convert_blocks("***"), "<hr>");
    }
}
