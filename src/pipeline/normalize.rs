//! Input normalisation: the first stage of every conversion.
//!
//! Authors paste from everywhere, so the raw note may carry Windows line
//! endings or invisible Unicode picked up from web pages. Every later stage
//! matches line-anchored regexes, so these are cleaned up before anything
//! else runs.
//!
//! The private-use characters that delimit placeholder tokens and inline
//! shields are also removed here. After this stage no author text can spell
//! either.

use super::inline::{SHIELD_CLOSE, SHIELD_OPEN};
use super::protect::{TOKEN_CLOSE, TOKEN_OPEN};

/// Apply all normalisation rules to raw author text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 3. Strip placeholder sentinel characters
pub fn normalize(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    remove_sentinels(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Remove placeholder sentinels ────────────────────────────────────

fn remove_sentinels(input: &str) -> String {
    input.replace([TOKEN_OPEN, TOKEN_CLOSE, SHIELD_OPEN, SHIELD_CLOSE], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_zero_width_joiner_kept_for_emoji() {
        // ZWJ glues multi-codepoint emoji together; stripping it splits them.
        let family = "\u{1F468}\u{200D}\u{1F469}";
        assert_eq!(remove_invisible_chars(family), family);
    }

    #[test]
    fn test_sentinels_removed() {
        let forged = format!("{}CODE0{}", TOKEN_OPEN, TOKEN_CLOSE);
        assert_eq!(normalize(&forged), "CODE0");
        let shield = format!("{}0{}", SHIELD_OPEN, SHIELD_CLOSE);
        assert_eq!(normalize(&shield), "0");
    }
}
