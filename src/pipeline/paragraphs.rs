//! Paragraph reconstruction: group loose text lines into paragraphs.
//!
//! After block conversion the text is a mix of single-line markup blocks
//! and plain author lines. This stage folds a small state machine over the
//! lines:
//!
//! ```text
//!            plain line                      <pre> without </pre>
//! Outside ─────────────▶ InParagraph    Outside ────────────────▶ InPreformatted
//!    ▲                       │                                        │
//!    └── blank / block / EOF ┘                 line with </pre> ──────┘
//! ```
//!
//! * A plain line opens a paragraph or extends the open one.
//! * A blank line or a block line closes the open paragraph.
//! * Inside preformatted markup every line passes through verbatim.
//! * A run of two or more blank lines outside preformatted markup emits
//!   exactly one spacer, whatever the run length.
//!
//! Spacers before the first and after the last real block are dropped, so a
//! document always starts with its first real content.

use super::blocks::BlockElement;
use super::protect::is_block_token_line;
use once_cell::sync::Lazy;
use regex::Regex;

/// Line prefixes that mark an already-converted (or author-written) block.
static RE_BLOCK_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^<(?:/?(?:h[1-6]|ul|ol|li|table|thead|tbody|tr|blockquote|pre|div|p|figure|figcaption|details|summary|section|aside|iframe|video|audio)\b|hr\b|!--)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Blank,
    PreformattedOpen,
    Block,
    Text,
}

fn classify(line: &str) -> LineClass {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineClass::Blank
    } else if trimmed.starts_with("<pre") && !trimmed.contains("</pre>") {
        LineClass::PreformattedOpen
    } else if RE_BLOCK_START.is_match(trimmed) || is_block_token_line(trimmed) {
        LineClass::Block
    } else {
        LineClass::Text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Outside,
    InParagraph(Vec<String>),
    InPreformatted,
}

/// The folded machine: current state, blank-run length, and output so far.
#[derive(Debug)]
struct Reconstructor {
    state: State,
    blank_run: usize,
    spacers: bool,
    blocks: Vec<BlockElement>,
}

impl Reconstructor {
    fn new(spacers: bool) -> Self {
        Self {
            state: State::Outside,
            blank_run: 0,
            spacers,
            blocks: Vec::new(),
        }
    }

    /// Close the open paragraph, if any.
    fn flush(&mut self) {
        if let State::InParagraph(lines) = std::mem::replace(&mut self.state, State::Outside) {
            self.blocks.push(BlockElement::Paragraph { lines });
        }
    }

    fn step(mut self, line: &str) -> Self {
        if self.state == State::InPreformatted {
            self.blocks.push(BlockElement::Markup(line.to_string()));
            if line.contains("</pre>") {
                self.state = State::Outside;
            }
            return self;
        }

        let class = classify(line);
        if class != LineClass::Blank {
            self.blank_run = 0;
        }

        match class {
            LineClass::Blank => {
                self.flush();
                self.blank_run += 1;
                if self.blank_run == 2 && self.spacers {
                    self.blocks.push(BlockElement::Spacer);
                }
            }
            LineClass::PreformattedOpen => {
                self.flush();
                self.blocks.push(BlockElement::Markup(line.to_string()));
                self.state = State::InPreformatted;
            }
            LineClass::Block => {
                self.flush();
                self.blocks.push(BlockElement::Markup(line.to_string()));
            }
            LineClass::Text => match &mut self.state {
                State::InParagraph(lines) => lines.push(line.trim().to_string()),
                _ => self.state = State::InParagraph(vec![line.trim().to_string()]),
            },
        }
        self
    }

    fn finish(mut self) -> Vec<BlockElement> {
        self.flush();
        let mut blocks = self.blocks;
        let lead = blocks
            .iter()
            .take_while(|b| **b == BlockElement::Spacer)
            .count();
        blocks.drain(..lead);
        while blocks.last() == Some(&BlockElement::Spacer) {
            blocks.pop();
        }
        blocks
    }
}

/// Group the lines of `text` into blocks.
pub fn reconstruct(text: &str, spacers: bool) -> Vec<BlockElement> {
    text.lines()
        .fold(Reconstructor::new(spacers), Reconstructor::step)
        .finish()
}

/// Render reconstructed blocks, one per line.
pub fn render(blocks: &[BlockElement]) -> String {
    blocks
        .iter()
        .map(BlockElement::render)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ────────────────────────────────────────────────────────────────────
