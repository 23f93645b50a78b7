//! Binary-safe text codecs for recorded traffic.
//!
//! Recorded payloads and matching keys are kept as printable text so that a
//! serialized session stays human-inspectable, yet any byte string (NUL,
//! control bytes, invalid UTF-8) survives a round trip unchanged.
//!
//! Two forms are provided:
//!
//! - **Command line**: space-separated byte strings, e.g. `SET a 1`. Tokens
//!   that are empty or contain anything other than printable ASCII are quoted
//!   and escaped.
//! - **CSV**: comma-separated typed values, e.g. `1,"2",3` or `nil,[1,"a"]`.
//!   The syntax itself carries the type: quoted tokens are strings, bare
//!   tokens are `nil`, `true`/`false`, integers or floats, brackets are lists.
//!
//! ```
//! use tr_codec::{parse_csv, to_csv, values, Value};
//!
//! let text = to_csv(&values![1, "2", 3]);
//! assert_eq!(text, r#"1,"2",3"#);
//! assert_eq!(parse_csv(&text).unwrap()[1], Value::from("2"));
//! ```
//!
//! [`flat_slice`] projects decoded values into an ordered [`FieldMap`] for
//! structural comparison.

pub mod command_line;
pub mod csv;
pub mod error;
mod escape;
pub mod flat;
pub mod value;

pub use command_line::{parse_command_line, parse_command_line_utf8, to_command_line};
pub use csv::{parse_csv, to_csv};
pub use error::{CodecError, Result};
pub use flat::{flat_command_line, flat_csv, flat_slice, FieldMap};
pub use value::Value;

/// Build a `Vec<Value>` from heterogeneous literals.
///
/// ```
/// let v = tr_codec::values![1, "two", 3.5, tr_codec::Value::Nil];
/// assert_eq!(v.len(), 4);
/// ```
#[macro_export]
macro_rules! values {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($v)),+]
    };
}
