use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32) -> Token {
        Token { kind, line }
    }

    pub fn is(&self, kind: &TokenKind) -> bool {
        self.kind.same_kind(kind)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, line {})", self.kind, self.line)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Fn,
    Use,
    If,
    Else,

    Identifier(Box<str>),
    Typename(Box<str>),
    Number(u64),
    /// The exact bytes between the quotes. Escapes are *not* interpreted here.
    String(Box<[u8]>),

    Plus,
    Minus,
    Star,
    Slash,
    /// `=`
    Equals,
    /// `->`
    Arrow,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,

    /// Yielded when looking behind the first token.
    StartOfUnit,
    /// Yielded when looking past the last token.
    EndOfUnit,
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "fn" => TokenKind::Fn,
    "use" => TokenKind::Use,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
};

impl TokenKind {
    /// Compares the tags of both kinds, ignoring any payload.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The literal character of arithmetic operators.
    pub fn operator_char(&self) -> Option<char> {
        match self {
            TokenKind::Plus => Some('+'),
            TokenKind::Minus => Some('-'),
            TokenKind::Star => Some('*'),
            TokenKind::Slash => Some('/'),
            _ => None,
        }
    }

    /// Returns the source text of this token, or `None` for sentinels.
    pub fn render(&self) -> Option<String> {
        use TokenKind::*;
        let text = match self {
            Fn => "fn".into(),
            Use => "use".into(),
            If => "if".into(),
            Else => "else".into(),
            Identifier(name) | Typename(name) => name.to_string(),
            Number(n) => n.to_string(),
            String(bytes) => format!("\"{}\"", std::string::String::from_utf8_lossy(bytes)),
            Plus => "+".into(),
            Minus => "-".into(),
            Star => "*".into(),
            Slash => "/".into(),
            Equals => "=".into(),
            Arrow => "->".into(),
            LParen => "(".into(),
            RParen => ")".into(),
            LBrace => "{".into(),
            RBrace => "}".into(),
            Comma => ",".into(),
            Semicolon => ";".into(),
            StartOfUnit | EndOfUnit => return None,
        };
        Some(text)
    }
}

/// The human readable name of the token kind, as used in diagnostics.
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let name = match self {
            Fn => "keyword 'fn'",
            Use => "keyword 'use'",
            If => "keyword 'if'",
            Else => "keyword 'else'",
            Identifier(_) => "identifier",
            Typename(_) => "typename",
            Number(_) => "numeric literal",
            String(_) => "string literal",
            Plus => "operator '+'",
            Minus => "operator '-'",
            Star => "operator '*'",
            Slash => "operator '/'",
            Equals => "operator '='",
            Arrow => "operator '->'",
            LParen => "opening parentheses '('",
            RParen => "closing parentheses ')'",
            LBrace => "opening brace '{'",
            RBrace => "closing brace '}'",
            Comma => "comma ','",
            Semicolon => "semicolon ';'",
            StartOfUnit => "start of unit",
            EndOfUnit => "end of unit",
        };
        f.write_str(name)
    }
}

/// Renders a token sequence back into source text, one space between tokens.
pub fn render_tokens<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> String {
    let mut out = std::string::String::new();
    for token in tokens {
        let Some(text) = token.kind.render() else {
            continue;
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&text);
    }
    out
}
