//! Token definitions for the Rill lexer.

/// A single token with its source position (1-based line and column).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind and payload
    pub kind: TokenKind,
    /// Line the token starts on
    pub line: u32,
    /// Column the token starts at
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32, col: u32) -> Self {
        Self { kind, line, col }
    }
}

/// Token kind
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Keywords
    Nil,
    True,
    False,
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    While,
    Fn,
    Return,
    Pass,
    Await,

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,       // =
    EqEq,     // ==
    NotEq,    // !=
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// Map an identifier to its keyword kind, if it is one.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "nil" => TokenKind::Nil,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "fn" => TokenKind::Fn,
            "return" => TokenKind::Return,
            "pass" => TokenKind::Pass,
            "await" => TokenKind::Await,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable name for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Int(_) => "integer literal",
            TokenKind::Float(_) => "float literal",
            TokenKind::Str(_) => "string literal",
            TokenKind::Ident(_) => "identifier",
            TokenKind::Nil => "'nil'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::If => "'if'",
            TokenKind::Elif => "'elif'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Fn => "'fn'",
            TokenKind::Return => "'return'",
            TokenKind::Pass => "'pass'",
            TokenKind::Await => "'await'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Eq => "'='",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Newline => "end of line",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Eof => "end of input",
        }
    }
}
