//! Lexer for Rill source code.
//!
//! Hand-written over `Peekable<Chars>`. Blocks are indentation-based:
//! the lexer emits `Indent`/`Dedent` tokens Python-style, suppresses
//! newlines inside brackets (implicit line joining), and joins lines
//! ending in a backslash.

use std::iter::Peekable;
use std::str::Chars;

use super::token::{Token, TokenKind};

/// Lexer error
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal starting at line {line}")]
    UnterminatedString { line: u32 },
    #[error("invalid escape sequence '\\{sequence}' at line {line}")]
    InvalidEscape { sequence: char, line: u32 },
    #[error("invalid number literal '{literal}' at line {line}")]
    InvalidNumber { literal: String, line: u32 },
    #[error("unexpected character '{ch}' at line {line}, column {col}")]
    UnexpectedChar { ch: char, line: u32, col: u32 },
    #[error("inconsistent indentation at line {line}")]
    BadIndent { line: u32 },
}

impl LexError {
    /// Line the error was detected on.
    pub fn line(&self) -> u32 {
        match *self {
            LexError::UnterminatedString { line }
            | LexError::InvalidEscape { line, .. }
            | LexError::InvalidNumber { line, .. }
            | LexError::UnexpectedChar { line, .. }
            | LexError::BadIndent { line } => line,
        }
    }

    /// Column the error was detected at, when known.
    pub fn col(&self) -> Option<u32> {
        match *self {
            LexError::UnexpectedChar { col, .. } => Some(col),
            _ => None,
        }
    }
}

/// Tokenize source code.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    col: u32,
    /// Open bracket depth; newlines and indentation are ignored inside.
    bracket_depth: usize,
    /// Indentation stack, always starts with 0.
    indents: Vec<usize>,
    /// True right after a newline, before indentation was measured.
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
            bracket_depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                if !self.handle_indentation()? {
                    break;
                }
            }
            match self.chars.peek().copied() {
                None => break,
                Some(c) => self.lex_one(c)?,
            }
        }

        // Close the last logical line and any open blocks.
        if !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline)
        ) {
            self.push(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent);
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    /// Measure leading whitespace and emit Indent/Dedent tokens.
    /// Returns false when the input is exhausted.
    fn handle_indentation(&mut self) -> Result<bool, LexError> {
        loop {
            let mut width = 0usize;
            while let Some(&c) = self.chars.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width += 8 - width % 8,
                    _ => break,
                }
                self.advance();
            }
            match self.chars.peek() {
                None => return Ok(false),
                // Blank and comment-only lines do not affect indentation.
                Some('\n') => {
                    self.advance();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {
                    self.at_line_start = false;
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        self.push(TokenKind::Indent);
                    } else if width < current {
                        while *self.indents.last().unwrap_or(&0) > width {
                            self.indents.pop();
                            self.push(TokenKind::Dedent);
                        }
                        if *self.indents.last().unwrap_or(&0) != width {
                            return Err(LexError::BadIndent { line: self.line });
                        }
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn lex_one(&mut self, c: char) -> Result<(), LexError> {
        match c {
            ' ' | '\t' | '\r' => {
                self.advance();
            }
            '\n' => {
                self.advance();
                if self.bracket_depth == 0 {
                    if !matches!(
                        self.tokens.last().map(|t| &t.kind),
                        None | Some(TokenKind::Newline) | Some(TokenKind::Indent)
                    ) {
                        self.tokens
                            .push(Token::new(TokenKind::Newline, self.line - 1, self.col));
                    }
                    self.at_line_start = true;
                }
            }
            '#' => self.skip_comment(),
            '\\' => {
                // Explicit line joining: backslash immediately before a newline.
                self.advance();
                match self.chars.peek() {
                    Some('\n') => {
                        self.advance();
                    }
                    Some('\r') => {
                        self.advance();
                        if self.chars.peek() == Some(&'\n') {
                            self.advance();
                        }
                    }
                    _ => {
                        return Err(LexError::UnexpectedChar {
                            ch: '\\',
                            line: self.line,
                            col: self.col - 1,
                        })
                    }
                }
            }
            '"' | '\'' => self.lex_string(c)?,
            '0'..='9' => self.lex_number()?,
            c if unicode_ident::is_xid_start(c) || c == '_' => self.lex_ident(),
            _ => self.lex_operator(c)?,
        }
        Ok(())
    }

    fn lex_operator(&mut self, c: char) -> Result<(), LexError> {
        let (line, col) = (self.line, self.col);
        self.advance();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '(' => {
                self.bracket_depth += 1;
                TokenKind::LParen
            }
            ')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RParen
            }
            '[' => {
                self.bracket_depth += 1;
                TokenKind::LBracket
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBracket
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    return Err(LexError::UnexpectedChar { ch: c, line, col });
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            _ => return Err(LexError::UnexpectedChar { ch: c, line, col }),
        };
        self.tokens.push(Token::new(kind, line, col));
        Ok(())
    }

    fn lex_ident(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if unicode_ident::is_xid_continue(c) || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident));
        self.tokens.push(Token::new(kind, line, col));
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let (line, col) = (self.line, self.col);
        let mut literal = String::new();
        let mut is_float = false;
        while let Some(&c) = self.chars.peek() {
            match c {
                '0'..='9' => {
                    literal.push(c);
                    self.advance();
                }
                '.' if !is_float => {
                    is_float = true;
                    literal.push(c);
                    self.advance();
                }
                '_' => {
                    self.advance();
                }
                _ => break,
            }
        }
        let kind = if is_float {
            let value = literal.parse::<f64>().map_err(|_| LexError::InvalidNumber {
                literal: literal.clone(),
                line,
            })?;
            TokenKind::Float(value)
        } else {
            let value = literal.parse::<i64>().map_err(|_| LexError::InvalidNumber {
                literal: literal.clone(),
                line,
            })?;
            TokenKind::Int(value)
        };
        self.tokens.push(Token::new(kind, line, col));
        Ok(())
    }

    fn lex_string(&mut self, quote: char) -> Result<(), LexError> {
        let (line, col) = (self.line, self.col);
        self.advance();

        // Triple-quoted strings may span lines.
        let triple = if self.chars.peek() == Some(&quote) {
            self.advance();
            if self.chars.peek() == Some(&quote) {
                self.advance();
                true
            } else {
                // Empty short string.
                self.tokens
                    .push(Token::new(TokenKind::Str(String::new()), line, col));
                return Ok(());
            }
        } else {
            false
        };

        let mut value = String::new();
        loop {
            let c = match self.chars.peek().copied() {
                Some(c) => c,
                None => return Err(LexError::UnterminatedString { line }),
            };
            match c {
                '\\' => {
                    self.advance();
                    let esc = self
                        .chars
                        .peek()
                        .copied()
                        .ok_or(LexError::UnterminatedString { line })?;
                    self.advance();
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        '0' => value.push('\0'),
                        '\n' => {} // escaped newline inside a string
                        _ => {
                            return Err(LexError::InvalidEscape {
                                sequence: esc,
                                line: self.line,
                            })
                        }
                    }
                }
                '\n' if !triple => return Err(LexError::UnterminatedString { line }),
                c if c == quote => {
                    self.advance();
                    if !triple {
                        break;
                    }
                    if self.chars.peek() == Some(&quote) {
                        self.advance();
                        if self.chars.peek() == Some(&quote) {
                            self.advance();
                            break;
                        }
                        value.push(quote);
                        value.push(quote);
                    } else {
                        value.push(quote);
                    }
                }
                c => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        self.tokens.push(Token::new(TokenKind::Str(value), line, col));
        Ok(())
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(c) = self.chars.next() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.line, self.col));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_arithmetic() {
        assert_eq!(
            kinds("1 + 2.5"),
            vec![
                TokenKind::Int(1),
                TokenKind::Plus,
                TokenKind::Float(2.5),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_idents() {
        assert_eq!(
            kinds("while x_1"),
            vec![
                TokenKind::While,
                TokenKind::Ident("x_1".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn emits_indent_and_dedent() {
        let toks = kinds("if x:\n    pass\ny");
        assert!(toks.contains(&TokenKind::Indent));
        assert!(toks.contains(&TokenKind::Dedent));
    }

    #[test]
    fn newlines_suppressed_inside_brackets() {
        let toks = kinds("[1,\n 2]");
        let newlines = toks
            .iter()
            .filter(|k| matches!(k, TokenKind::Newline))
            .count();
        assert_eq!(newlines, 1); // only the final logical-line terminator
    }

    #[test]
    fn backslash_joins_lines() {
        let toks = kinds("1 + \\\n2");
        let newlines = toks
            .iter()
            .filter(|k| matches!(k, TokenKind::Newline))
            .count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn triple_quoted_string_spans_lines() {
        let toks = kinds("\"\"\"a\nb\"\"\"");
        assert_eq!(toks[0], TokenKind::Str("a\nb".into()));
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn string_escapes() {
        let toks = kinds(r#""a\nb\"c""#);
        assert_eq!(toks[0], TokenKind::Str("a\nb\"c".into()));
    }

    #[test]
    fn comment_only_line_is_blank() {
        let toks = kinds("# hello\nx");
        assert_eq!(toks[0], TokenKind::Ident("x".into()));
    }
}
