//! CSV-like form for typed, possibly nested value lists.
//!
//! Grammar (whitespace between tokens is ignored when parsing):
//!
//! ```text
//! list   := "" | value ("," value)*
//! value  := quoted | "[" list "]" | "nil" | "true" | "false" | number
//! ```
//!
//! The decoder never guesses a type from text shape: a quoted `"1"` is always
//! a string and a bare `1` is always an integer. Floats are written in Rust's
//! shortest round-trip form, which always contains `.`, an exponent, `inf` or
//! `NaN`, so they never decode as integers.

use std::fmt::Write;

use crate::error::{CodecError, Result};
use crate::escape::{is_space, quote_into, unquote};
use crate::value::Value;

/// Deepest list nesting [`parse_csv`] accepts.
pub const MAX_DEPTH: usize = 128;

/// Encode a value list. An empty list encodes to the empty string.
pub fn to_csv(values: &[Value]) -> String {
    let mut out = String::new();
    write_items(&mut out, values);
    out
}

/// Decode text produced by [`to_csv`].
pub fn parse_csv(text: &str) -> Result<Vec<Value>> {
    let mut parser = Parser {
        input: text.as_bytes(),
        pos: 0,
        depth: 0,
    };
    parser.skip_space();
    if parser.at_end() {
        return Ok(Vec::new());
    }
    parser.items(None)
}

fn write_items(out: &mut String, values: &[Value]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_value(out, v);
    }
}

pub(crate) fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f:?}");
        }
        Value::Str(bytes) => quote_into(out, bytes),
        Value::List(items) => {
            out.push('[');
            write_items(out, items);
            out.push(']');
        }
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    /// Parse comma-separated values up to `close` (not consumed) or end of input.
    fn items(&mut self, close: Option<u8>) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            items.push(self.value()?);
            self.skip_space();
            match self.peek() {
                Some(b',') => self.pos += 1,
                None if close.is_none() => return Ok(items),
                None => return Err(CodecError::malformed(self.pos, "unterminated list")),
                Some(c) if Some(c) == close => return Ok(items),
                Some(c) => {
                    return Err(CodecError::malformed(
                        self.pos,
                        format!("unexpected '{}'", c.escape_ascii()),
                    ))
                }
            }
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_space();
        match self.peek() {
            Some(b'"') => {
                let (bytes, end) = unquote(self.input, self.pos)?;
                self.pos = end;
                Ok(Value::Str(bytes))
            }
            Some(b'[') => {
                let open = self.pos;
                if self.depth >= MAX_DEPTH {
                    return Err(CodecError::malformed(open, "nesting too deep"));
                }
                self.pos += 1;
                self.skip_space();
                if self.peek() == Some(b']') {
                    self.pos += 1;
                    return Ok(Value::List(Vec::new()));
                }
                self.depth += 1;
                let items = self.items(Some(b']'));
                self.depth -= 1;
                let items = items?;
                if self.peek() != Some(b']') {
                    return Err(CodecError::malformed(open, "unbalanced '['"));
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            None | Some(b',') | Some(b']') => Err(CodecError::malformed(self.pos, "missing value")),
            Some(_) => self.scalar(),
        }
    }

    fn scalar(&mut self) -> Result<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b != b',' && b != b']' && b != b'[' && b != b'"' && !is_space(b))
        {
            self.pos += 1;
        }
        let token = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| CodecError::malformed(start, "non-ASCII bare token"))?;
        match token {
            "" => Err(CodecError::malformed(start, "missing value")),
            "nil" => Ok(Value::Nil),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => {
                if let Ok(i) = token.parse::<i64>() {
                    Ok(Value::Int(i))
                } else if let Ok(f) = token.parse::<f64>() {
                    Ok(Value::Float(f))
                } else {
                    Err(CodecError::malformed(
                        start,
                        format!("unquoted token {token:?} is not a number"),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_mixed_types() {
        let v = values![1, "2", 3];
        let text = to_csv(&v);
        assert_eq!(text, r#"1,"2",3"#);
        assert_eq!(parse_csv(&text).unwrap(), v);
    }

    #[test]
    fn test_numeric_looking_string_stays_string() {
        let parsed = parse_csv(r#""42",42,42.0"#).unwrap();
        assert_eq!(parsed, vec![Value::from("42"), Value::Int(42), Value::Float(42.0)]);
    }

    #[test]
    fn test_empty_forms_are_distinct() {
        assert_eq!(to_csv(&[]), "");
        assert_eq!(parse_csv("").unwrap(), Vec::<Value>::new());
        assert_eq!(to_csv(&values![""]), r#""""#);
        assert_eq!(parse_csv(r#""""#).unwrap(), values![""]);
        assert_eq!(to_csv(&[Value::List(vec![])]), "[]");
        assert_eq!(parse_csv("[]").unwrap(), vec![Value::List(vec![])]);
    }

    #[test]
    fn test_nested_lists_and_keywords() {
        let v = vec![
            Value::Nil,
            Value::List(vec![Value::from(true), Value::List(vec![Value::from("x")])]),
            Value::from(-7),
        ];
        let text = to_csv(&v);
        assert_eq!(text, r#"nil,[true,["x"]],-7"#);
        assert_eq!(parse_csv(&text).unwrap(), v);
    }

    #[test]
    fn test_binary_payload() {
        let raw: &[u8] = b"\x00\xc0\n\t\x00\xbem\x06\x89Z(\x00\n";
        let v = values!["a", "b", "c", 3, "d", raw];
        let text = to_csv(&v);
        assert!(text.is_ascii());
        assert_eq!(parse_csv(&text).unwrap(), v);
    }

    #[test]
    fn test_special_floats() {
        let text = to_csv(&values![f64::INFINITY, f64::NEG_INFINITY, 1e300, -0.0]);
        let parsed = parse_csv(&text).unwrap();
        assert_eq!(parsed[0], Value::Float(f64::INFINITY));
        assert_eq!(parsed[1], Value::Float(f64::NEG_INFINITY));
        assert_eq!(parsed[2], Value::Float(1e300));
        assert!(parsed[3].as_float().unwrap().is_sign_negative());

        let nan = parse_csv(&to_csv(&values![f64::NAN])).unwrap();
        assert!(nan[0].as_float().unwrap().is_nan());
    }

    #[test]
    fn test_whitespace_tolerated() {
        assert_eq!(
            parse_csv(r#" 1 , "a" , [ 2 , 3 ] "#).unwrap(),
            vec![
                Value::Int(1),
                Value::from("a"),
                Value::List(vec![Value::Int(2), Value::Int(3)])
            ]
        );
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let err = parse_csv(&"[".repeat(200_000)).unwrap_err();
        assert!(
            matches!(err, CodecError::Malformed { offset, .. } if offset == MAX_DEPTH),
            "{err:?}"
        );

        let too_deep = format!("{}1{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert!(matches!(parse_csv(&too_deep), Err(CodecError::Malformed { .. })));

        let deepest = format!("{}1{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        let mut value = &parse_csv(&deepest).unwrap()[0];
        for _ in 1..MAX_DEPTH {
            value = &value.as_list().unwrap()[0];
        }
        assert_eq!(value.as_list().unwrap(), &[Value::Int(1)]);
        assert_eq!(to_csv(&parse_csv(&deepest).unwrap()), deepest);
    }

    #[test]
    fn test_malformed_inputs() {
        for bad in [
            "abc",
            r#""unterminated"#,
            "[1,2",
            "1,,2",
            "1,",
            "]",
            "[1]]",
            r#""a"b"#,
            r#""\z""#,
        ] {
            assert!(
                matches!(parse_csv(bad), Err(CodecError::Malformed { .. })),
                "expected malformed for {bad:?}"
            );
        }
    }
}
