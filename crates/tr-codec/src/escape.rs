//! Quoting shared by the command-line and CSV forms.
//!
//! Inside quotes every byte outside `0x20..=0x7e` is written as an escape, so
//! an encoded payload is pure printable ASCII.

use std::fmt::Write;

use crate::error::{CodecError, Result};

/// Bytes that may appear in an unquoted command-line token.
pub(crate) fn is_bare_byte(b: u8) -> bool {
    matches!(b, 0x21..=0x7e) && b != b'"' && b != b'\\'
}

pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Append `bytes` to `out` as a double-quoted, escaped string.
pub(crate) fn quote_into(out: &mut String, bytes: &[u8]) {
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0 => out.push_str("\\0"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push('"');
}

/// Decode the quoted string whose opening quote is at `start`.
///
/// Returns the unescaped bytes and the offset just past the closing quote.
pub(crate) fn unquote(input: &[u8], start: usize) -> Result<(Vec<u8>, usize)> {
    debug_assert_eq!(input.get(start), Some(&b'"'));
    let mut out = Vec::new();
    let mut pos = start + 1;
    loop {
        let Some(&b) = input.get(pos) else {
            return Err(CodecError::malformed(start, "unterminated quoted string"));
        };
        match b {
            b'"' => return Ok((out, pos + 1)),
            b'\\' => {
                let Some(&esc) = input.get(pos + 1) else {
                    return Err(CodecError::malformed(pos, "dangling escape at end of input"));
                };
                match esc {
                    b'"' => out.push(b'"'),
                    b'\\' => out.push(b'\\'),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'0' => out.push(0),
                    b'x' => {
                        let hi = input.get(pos + 2).copied().and_then(hex_value);
                        let lo = input.get(pos + 3).copied().and_then(hex_value);
                        match (hi, lo) {
                            (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
                            _ => {
                                return Err(CodecError::malformed(
                                    pos,
                                    "\\x escape needs two hex digits",
                                ))
                            }
                        }
                        pos += 2;
                    }
                    other => {
                        return Err(CodecError::malformed(
                            pos,
                            format!("unknown escape \\{}", other.escape_ascii()),
                        ))
                    }
                }
                pos += 2;
            }
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted(bytes: &[u8]) -> String {
        let mut s = String::new();
        quote_into(&mut s, bytes);
        s
    }

    #[test]
    fn test_quote_escapes_control_and_high_bytes() {
        assert_eq!(quoted(b"a b"), "\"a b\"");
        assert_eq!(quoted(b"\x00\xc0\n\t\""), r#""\0\xc0\n\t\"""#);
        assert_eq!(quoted(b""), "\"\"");
    }

    #[test]
    fn test_unquote_reverses_quote() {
        let raw = b"\x00\xc0\n\t\x00\xbem\x06\x89Z(\x00\n";
        let text = quoted(raw);
        let (bytes, end) = unquote(text.as_bytes(), 0).unwrap();
        assert_eq!(bytes, raw);
        assert_eq!(end, text.len());
    }

    #[test]
    fn test_unquote_accepts_uppercase_hex() {
        let (bytes, _) = unquote(br#""\xFF""#, 0).unwrap();
        assert_eq!(bytes, vec![0xff]);
    }

    #[test]
    fn test_unquote_errors() {
        assert!(matches!(
            unquote(br#""abc"#, 0),
            Err(CodecError::Malformed { offset: 0, .. })
        ));
        assert!(unquote(br#""\q""#, 0).is_err());
        assert!(unquote(br#""\x1""#, 0).is_err());
        assert!(unquote(br#""\"#, 0).is_err());
    }
}
