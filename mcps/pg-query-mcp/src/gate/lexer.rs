//! Comment stripping for PostgreSQL query text
//!
//! A single left-to-right scan that recognizes the lexical constructs able
//! to contain comment markers without being comments:
//!
//! - `'...'` string literals (doubled `''` quotes, and backslash escapes
//!   for `E'...'` strings)
//! - `"..."` quoted identifiers
//! - `$tag$...$tag$` dollar-quoted strings
//!
//! Everything else that starts with `--` or `/*` is a comment. Each comment
//! is replaced by a single space so neighbouring tokens never merge, which
//! also makes stripping idempotent.

/// Remove `--` line comments and `/* */` block comments from `sql`.
///
/// Line comments run to the first `\n` or `\r` (the line break itself is
/// kept) or to the end of input. Block comments nest, and an unterminated block
/// comment runs to the end of input, matching the server's lexer.
pub fn strip_comments(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut copied_from = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                out.push_str(&sql[copied_from..i]);
                out.push(' ');
                i = sql[i..].find(['\n', '\r']).map_or(len, |offset| i + offset);
                copied_from = i;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out.push_str(&sql[copied_from..i]);
                out.push(' ');
                i = skip_block_comment(bytes, i);
                copied_from = i;
            }
            b'\'' => {
                let backslash_escapes = is_escape_string_prefix(bytes, i);
                i = skip_quoted(bytes, i, b'\'', backslash_escapes);
            }
            b'"' => i = skip_quoted(bytes, i, b'"', false),
            b'$' => match dollar_tag_end(bytes, i) {
                Some(tag_end) => i = skip_dollar_quoted(sql, i, tag_end),
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    out.push_str(&sql[copied_from..]);
    out
}

/// Bytes that may continue an identifier (non-ASCII bytes included)
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Returns the index just past the block comment opening at `start`
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }

    bytes.len()
}

/// `E'...'` / `e'...'` strings honour backslash escapes
fn is_escape_string_prefix(bytes: &[u8], quote: usize) -> bool {
    if quote == 0 || !matches!(bytes[quote - 1], b'e' | b'E') {
        return false;
    }
    quote < 2 || !is_ident_byte(bytes[quote - 2])
}

/// Returns the index just past the closing quote, or end of input
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;

    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
        } else if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }

    bytes.len()
}

/// If a dollar-quote delimiter opens at `start`, returns the index just past it.
///
/// `$1` style parameters and `$` inside identifiers are not delimiters.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && is_ident_byte(bytes[start - 1]) {
        return None;
    }

    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'$' {
            return Some(i + 1);
        }
        let valid = if i == start + 1 {
            b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
        } else {
            b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
        };
        if !valid {
            return None;
        }
        i += 1;
    }

    None
}

fn skip_dollar_quoted(sql: &str, start: usize, tag_end: usize) -> usize {
    let delimiter = &sql[start..tag_end];
    sql[tag_end..]
        .find(delimiter)
        .map_or(sql.len(), |offset| tag_end + offset + delimiter.len())
}
