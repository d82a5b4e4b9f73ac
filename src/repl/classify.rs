//! Input classification.
//!
//! Pure functions over submitted-so-far text: whether the UI should
//! keep accepting lines, whether the block is the EOF sentinel, and
//! whether it is a shell escape. None of these touch the namespace, so
//! classifying the same text twice always agrees with itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// Typing this character (Ctrl-Z) as the whole input ends the session.
pub const EOF_SENTINEL: char = '\x1a';

/// Short string literals, removed before bracket counting so bracket
/// characters inside strings don't confuse the scan.
static STRING_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"('[^']*'|"[^"]*")"#).expect("static regex"));

/// Triple-quote delimiters of either flavor.
static TRIPLE_QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'{3}|"{3}"#).expect("static regex"));

/// True when the block is the session-termination sentinel.
pub fn is_eof_sentinel(text: &str) -> bool {
    text.trim_start().starts_with(EOF_SENTINEL)
}

/// A block whose first non-space character is `!` runs in the system
/// shell; returns the command text after the marker.
pub fn shell_command(text: &str) -> Option<&str> {
    text.trim_start().strip_prefix('!')
}

/// Decide whether the UI should keep accepting input lines before
/// submitting the block.
///
/// Structural cues, per the classic Python REPL: unclosed brackets, a
/// trailing block-opening colon, a trailing line-continuation
/// backslash, or an unterminated triple-quoted string. Once the entry
/// has gone multi-line it continues until the user submits a blank
/// line.
pub fn needs_more_input(text: &str) -> bool {
    if is_eof_sentinel(text) || shell_command(text).is_some() {
        return false;
    }

    if in_unterminated_triple_quote(text) {
        return true;
    }

    if let Some((_, last_line)) = text.rsplit_once('\n') {
        // Multi-line entry: a blank final line submits it.
        return !last_line.trim().is_empty();
    }

    let trimmed = text.trim_end();
    trimmed.ends_with(':') || trimmed.ends_with('\\') || has_unclosed_brackets(text)
}

/// Starting at the end of the string: is there an opening bracket we
/// never saw a closing one for?
pub fn has_unclosed_brackets(text: &str) -> bool {
    let stripped = STRING_LITERAL.replace_all(text, "");
    let mut stack: Vec<char> = Vec::new();

    for c in stripped.chars().rev() {
        match c {
            ']' | ')' | '}' => stack.push(c),
            '[' | '(' | '{' => {
                let expected = match c {
                    '[' => ']',
                    '(' => ')',
                    _ => '}',
                };
                if stack.last() == Some(&expected) {
                    stack.pop();
                } else if stack.is_empty() {
                    // Opening bracket without a closing one.
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// True when the text ends inside a triple-quoted string.
fn in_unterminated_triple_quote(text: &str) -> bool {
    let mut opening: Option<&str> = None;
    for delim in TRIPLE_QUOTE.find_iter(text) {
        match opening {
            None => opening = Some(delim.as_str()),
            Some(open) if open == delim.as_str() => opening = None,
            Some(_) => {}
        }
    }
    opening.is_some()
}
