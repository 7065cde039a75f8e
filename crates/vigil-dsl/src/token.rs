/// The kinds of token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    Eof,

    // Literals
    Ident,
    Int,
    Float,
    Str,

    // Keywords
    When,
    If,

    // Operators
    Assign,
    Eq,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Asterisk,
    Slash,

    // Delimiters
    Comma,
    Semicolon,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,

    // Unit suffixes
    Megabytes,
    Gigabytes,
    Millis,
    Seconds,
    Minutes,
}

impl TokenKind {
    pub fn is_unit(self) -> bool {
        matches!(
            self,
            TokenKind::Megabytes
                | TokenKind::Gigabytes
                | TokenKind::Millis
                | TokenKind::Seconds
                | TokenKind::Minutes
        )
    }

    /// Keyword and unit-word lookup applied after scanning an identifier.
    pub fn lookup_ident(ident: &str) -> TokenKind {
        match ident {
            "when" => TokenKind::When,
            "if" => TokenKind::If,
            "MB" => TokenKind::Megabytes,
            "GB" => TokenKind::Gigabytes,
            "ms" => TokenKind::Millis,
            "s" => TokenKind::Seconds,
            "m" => TokenKind::Minutes,
            _ => TokenKind::Ident,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
            TokenKind::Ident => "IDENT",
            TokenKind::Int => "INT",
            TokenKind::Float => "FLOAT",
            TokenKind::Str => "STRING",
            TokenKind::When => "when",
            TokenKind::If => "if",
            TokenKind::Assign => "=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Lte => "<=",
            TokenKind::Gte => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Megabytes => "MB",
            TokenKind::Gigabytes => "GB",
            TokenKind::Millis => "ms",
            TokenKind::Seconds => "s",
            TokenKind::Minutes => "m",
        };
        f.write_str(s)
    }
}

/// A single lexical unit with its position in the source text.
///
/// `position` is the byte offset; `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        literal: impl Into<String>,
        position: usize,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            kind,
            literal: literal.into(),
            position,
            line,
            column,
        }
    }

    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self::new(TokenKind::Eof, "", position, line, column)
    }
}
