//! Command-line form: space-separated byte strings.
//!
//! `SET a 1` stays as written. A token is quoted when it is empty or contains
//! a space, quote, backslash or any byte outside printable ASCII.

use crate::error::{CodecError, Result};
use crate::escape::{is_bare_byte, is_space, quote_into, unquote};

/// Join arguments into a single command line.
pub fn to_command_line<I, T>(args: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut out = String::new();
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let bytes = arg.as_ref();
        if !bytes.is_empty() && bytes.iter().copied().all(is_bare_byte) {
            // All bytes are printable ASCII here.
            out.extend(bytes.iter().map(|&b| b as char));
        } else {
            quote_into(&mut out, bytes);
        }
    }
    out
}

/// Split a command line back into its arguments.
///
/// Runs of whitespace between tokens are accepted. A quote may only open a
/// token, and a closing quote must be followed by whitespace or end of input.
pub fn parse_command_line(text: &str) -> Result<Vec<Vec<u8>>> {
    let input = text.as_bytes();
    let mut args = Vec::new();
    let mut pos = 0;
    loop {
        while input.get(pos).copied().is_some_and(is_space) {
            pos += 1;
        }
        let Some(&first) = input.get(pos) else {
            return Ok(args);
        };
        if first == b'"' {
            let (bytes, end) = unquote(input, pos)?;
            if input.get(end).is_some_and(|&b| !is_space(b)) {
                return Err(CodecError::malformed(
                    end,
                    "closing quote must end the argument",
                ));
            }
            args.push(bytes);
            pos = end;
        } else {
            let start = pos;
            while let Some(&b) = input.get(pos) {
                if is_space(b) {
                    break;
                }
                if b == b'"' {
                    return Err(CodecError::malformed(pos, "quote inside unquoted argument"));
                }
                pos += 1;
            }
            args.push(input[start..pos].to_vec());
        }
    }
}

/// Like [`parse_command_line`], requiring every argument to be UTF-8.
pub fn parse_command_line_utf8(text: &str) -> Result<Vec<String>> {
    parse_command_line(text)?
        .into_iter()
        .map(|arg| {
            String::from_utf8(arg).map_err(|_| CodecError::TypeMismatch {
                expected: "utf-8 string",
                found: "binary string",
            })
        })
        .collect()
}
