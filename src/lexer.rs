use std::fmt;

use tracing::warn;

use crate::{
    config::Config,
    token::{Token, TokenKind, KEYWORDS},
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// What the lexer reports besides the tokens themselves.
#[derive(Debug, Default)]
pub struct Summary {
    /// Number of input lines.
    pub lines: usize,
    /// Recoverable defects. The offending input was skipped.
    pub defects: Vec<Defect>,
}

/// Lexes the provided source, producing the tokens into the provided buffer.
pub fn lex(src: &[u8], config: &Config, tokens: &mut Vec<Token>) -> Summary {
    Lexer::new(src, config, tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &[u8], config: &Config) -> (Vec<Token>, Summary) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    let summary = lex(src, config, &mut tokens);
    (tokens, summary)
}

struct Lexer<'src, 'tok, 'cfg> {
    src: &'src [u8],
    config: &'cfg Config,
    cursor: usize,
    current_lo: usize,
    line: u32,
    current_line: u32,
    tokens: &'tok mut Vec<Token>,
    defects: Vec<Defect>,
}

impl Lexer<'_, '_, '_> {
    /// Scans the source until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) -> Summary {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let current = self.mark_advance();
            if current == b'\0' {
                break;
            }
            if let Some(kind) = self.scan_token_kind(current) {
                self.produce(kind);
            }
        }
        Summary {
            lines: self.count_lines(),
            defects: self.defects,
        }
    }

    /// Scans the token that starts with the provided byte. Returns `None` for
    /// skipped input (whitespace and defects).
    fn scan_token_kind(&mut self, current: u8) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match current {
            b' ' | b'\t' | b'\r' => return None,
            b'\n' => {
                self.line += 1;
                return None;
            }
            b'-' => match self.peek() {
                b'>' => self.advance_with(Arrow),
                _ => Minus,
            },
            b'+' => Plus,
            b'*' => Star,
            b'/' => Slash,
            b'=' => Equals,
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b',' => Comma,
            b';' => Semicolon,
            b'"' => return self.string(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => return self.number(),
            other => {
                self.defect(DefectKind::UnexpectedChar(other));
                return None;
            }
        };
        Some(kind)
    }

    /// Seeks the closing quotation mark. The payload is kept verbatim; escape
    /// sequences are only interpreted by the code generator.
    ///
    /// If the input ends first, only the opening quotation mark is skipped and
    /// scanning resumes right after it.
    fn string(&mut self) -> Option<TokenKind> {
        let start = self.cursor;
        let Some(len) = self.src[start..].iter().position(|&b| b == b'"') else {
            self.defect(DefectKind::UnterminatedString);
            return None;
        };
        let bytes = &self.src[start..start + len];
        let line_breaks = bytes.iter().filter(|&&b| b == b'\n').count();
        self.line += u32::try_from(line_breaks).unwrap();
        self.cursor = start + len + 1;
        Some(TokenKind::String(bytes.into()))
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: u8| c.is_ascii_alphanumeric() || c == b'_';

        while valid_identifier_suffix(self.peek()) {
            self.advance();
        }
        let substr = self.substr();
        if let Some(keyword) = KEYWORDS.get(substr) {
            return keyword.clone();
        }
        if self.config.is_typename(substr) {
            TokenKind::Typename(substr.into())
        } else {
            TokenKind::Identifier(substr.into())
        }
    }

    fn number(&mut self) -> Option<TokenKind> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let substr = self.substr();
        match substr.parse() {
            Ok(value) => Some(TokenKind::Number(value)),
            Err(_) => {
                let substr: Box<str> = substr.into();
                self.defect(DefectKind::NumberOutOfRange(substr));
                None
            }
        }
    }

    fn count_lines(&self) -> usize {
        let breaks = (self.line - 1) as usize;
        match self.src.last() {
            Some(b'\n') | None => breaks,
            Some(_) => breaks + 1,
        }
    }
}

impl Lexer<'_, '_, '_> {
    /// Constructs a new lexer with the default state.
    ///
    /// A NUL byte ends the input.
    fn new<'src, 'tok, 'cfg>(
        src: &'src [u8],
        config: &'cfg Config,
        tokens: &'tok mut Vec<Token>,
    ) -> Lexer<'src, 'tok, 'cfg> {
        let end = src.iter().position(|&b| b == b'\0').unwrap_or(src.len());
        Lexer {
            src: &src[..end],
            config,
            cursor: 0,
            current_lo: 0,
            line: 1,
            current_line: 1,
            tokens,
            defects: Vec::new(),
        }
    }

    /// Starts a new token "mark" and advances.
    fn mark_advance(&mut self) -> u8 {
        self.current_lo = self.cursor;
        self.current_line = self.line;
        self.advance()
    }

    /// Returns the next byte and advances.
    fn advance(&mut self) -> u8 {
        let current = self.peek();
        if self.cursor < self.src.len() {
            self.cursor += 1;
        }
        current
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next byte without advancing.
    fn peek(&self) -> u8 {
        self.src.get(self.cursor).copied().unwrap_or(b'\0')
    }

    /// Returns the text of the current marked bounds. Only called for runs of
    /// ASCII letters, digits and underscores.
    fn substr(&self) -> &str {
        std::str::from_utf8(&self.src[self.current_lo..self.cursor])
            .expect("identifier and number runs are ASCII")
    }

    /// Produces a token on the line where the current mark started.
    fn produce(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.current_line));
    }

    fn defect(&mut self, kind: DefectKind) {
        let defect = Defect {
            line: self.current_line,
            kind,
        };
        warn!("{defect}");
        self.defects.push(defect);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Defect {
    pub line: u32,
    pub kind: DefectKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefectKind {
    UnterminatedString,
    UnexpectedChar(u8),
    NumberOutOfRange(Box<str>),
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            DefectKind::UnterminatedString => {
                write!(f, "end of file before end of string literal")
            }
            DefectKind::UnexpectedChar(c) => {
                write!(f, "couldn't parse character '{}'", c.escape_ascii())
            }
            DefectKind::NumberOutOfRange(text) => {
                write!(f, "numeric literal {text} is out of range")
            }
        }
    }
}
