use std::fmt::Write;

/// The data section of a unit: string literals, each followed by a symbol
/// holding its length.
#[derive(Debug, Default)]
pub struct Data {
    prefix: String,
    lines: Vec<String>,
    count: usize,
}

impl Data {
    pub fn new(prefix: impl Into<String>) -> Data {
        Data {
            prefix: prefix.into(),
            lines: Vec::new(),
            count: 0,
        }
    }

    /// Adds a string literal, as written between the quotes, returning the
    /// label of its first byte. The length symbol is the label with `_len`
    /// appended.
    ///
    /// The stored bytes are followed by a NUL which the length doesn't count.
    pub fn push_string(&mut self, raw: &[u8]) -> String {
        let label = format!("{}_str{}", self.prefix, self.count);
        self.count += 1;

        let bytes = unescape(raw);
        self.lines.push(format!("{label}: db {}", db_operands(&bytes)));
        self.lines.push(format!("{label}_len: dq {}", bytes.len()));
        label
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Interprets the escapes `\n`, `\t`, `\0`, `\\` and `\"`. Any other
/// backslash is kept as is.
pub fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let escaped = match iter.peek() {
            Some(b'n') => b'\n',
            Some(b't') => b'\t',
            Some(b'0') => b'\0',
            Some(b'\\') => b'\\',
            Some(b'"') => b'"',
            _ => {
                out.push(b);
                continue;
            }
        };
        iter.next();
        out.push(escaped);
    }
    out
}

/// NASM doesn't interpret escapes inside double quotes, so everything that
/// isn't printable (and the quote itself) is written as a number.
fn db_operands(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut quoted = false;
    for &b in bytes {
        let printable = (b' '..=b'~').contains(&b) && b != b'"';
        match (printable, quoted) {
            (true, true) => out.push(b as char),
            (true, false) => {
                if !out.is_empty() {
                    out.push_str(", ");
                }
                out.push('"');
                out.push(b as char);
                quoted = true;
            }
            (false, was_quoted) => {
                if was_quoted {
                    out.push('"');
                    quoted = false;
                }
                if !out.is_empty() {
                    out.push_str(", ");
                }
                _ = write!(out, "{b}");
            }
        }
    }
    if quoted {
        out.push('"');
    }
    if !out.is_empty() {
        out.push_str(", ");
    }
    out.push('0');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(br"a\nb"), b"a\nb");
        assert_eq!(unescape(br"\t\0\\"), b"\t\0\\");
        assert_eq!(unescape(br#"say \"hi\""#), b"say \"hi\"");
        assert_eq!(unescape(br"\q"), br"\q");
        assert_eq!(unescape(br"trailing\"), br"trailing\");
    }

    #[test]
    fn test_db_operands() {
        assert_eq!(db_operands(b""), "0");
        assert_eq!(db_operands(b"hello"), "\"hello\", 0");
        assert_eq!(db_operands(b"a\nb"), "\"a\", 10, \"b\", 0");
        assert_eq!(db_operands(b"\n\n"), "10, 10, 0");
        assert_eq!(db_operands(b"x\"y"), "\"x\", 34, \"y\", 0");
    }

    #[test]
    fn entries_hold_escaped_length() {
        let mut data = Data::new("arith_asm");
        assert!(data.is_empty());
        assert_eq!(data.push_string(br"a\nb"), "arith_asm_str0");
        assert_eq!(data.push_string(b""), "arith_asm_str1");
        assert_eq!(
            data.lines(),
            [
                "arith_asm_str0: db \"a\", 10, \"b\", 0",
                "arith_asm_str0_len: dq 3",
                "arith_asm_str1: db 0",
                "arith_asm_str1_len: dq 0",
            ]
        );
    }
}
