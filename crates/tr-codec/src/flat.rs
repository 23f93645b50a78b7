//! Flattening decoded payloads into comparable field maps.

use std::collections::HashMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::command_line::parse_command_line;
use crate::csv::parse_csv;
use crate::error::Result;
use crate::value::Value;

/// Ordered string-keyed fields.
///
/// Iteration follows insertion order so reports are stable across runs;
/// equality for matching purposes is order-independent (see
/// [`FieldMap::same_fields`]).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<(String, String)>,
    /// Key → position in `fields`.
    index: HashMap<String, usize>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing the value in place if the key exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => self.fields[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.fields.len());
                self.fields.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.fields[i].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Same keys with the same values, regardless of order.
    pub fn same_fields(&self, other: &FieldMap) -> bool {
        self.len() == other.len() && self.matching_fields(other) == self.len()
    }

    /// Number of keys present in both maps with equal values.
    pub fn matching_fields(&self, other: &FieldMap) -> usize {
        self.iter()
            .filter(|(k, v)| other.get(k) == Some(*v))
            .count()
    }
}

impl FromIterator<(String, String)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Debug for FieldMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Serializes as a map in insertion order.
impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Project a value list into positional fields.
///
/// Elements are keyed `[0]`, `[1]`, …; nested list elements extend the key
/// (`[2][0]`). Scalars are rendered in their CSV token form, so the string
/// `"1"` and the integer `1` produce different field values. An empty nested
/// list becomes a single `[]` field.
pub fn flat_slice(values: &[Value]) -> FieldMap {
    let mut map = FieldMap::new();
    flat_into(&mut map, "", values);
    map
}

fn flat_into(map: &mut FieldMap, prefix: &str, values: &[Value]) {
    for (i, value) in values.iter().enumerate() {
        let key = format!("{prefix}[{i}]");
        match value {
            Value::List(items) if !items.is_empty() => flat_into(map, &key, items),
            other => map.insert(key, other.to_string()),
        }
    }
}

/// Parse a command line and flatten its arguments as strings.
pub fn flat_command_line(text: &str) -> Result<FieldMap> {
    let args: Vec<Value> = parse_command_line(text)?
        .into_iter()
        .map(Value::Str)
        .collect();
    Ok(flat_slice(&args))
}

/// Parse a CSV payload and flatten it.
pub fn flat_csv(text: &str) -> Result<FieldMap> {
    Ok(flat_slice(&parse_csv(text)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_positional_keys() {
        let map = flat_slice(&values![1, "2", 3]);
        let fields: Vec<_> = map.iter().collect();
        assert_eq!(fields, vec![("[0]", "1"), ("[1]", "\"2\""), ("[2]", "3")]);
    }

    #[test]
    fn test_nested_keys() {
        let v = vec![
            Value::from("a"),
            Value::List(vec![Value::from(1), Value::List(vec![Value::Nil])]),
            Value::List(vec![]),
        ];
        let map = flat_slice(&v);
        assert_eq!(map.get("[0]"), Some("\"a\""));
        assert_eq!(map.get("[1][0]"), Some("1"));
        assert_eq!(map.get("[1][1][0]"), Some("nil"));
        assert_eq!(map.get("[2]"), Some("[]"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_same_fields_ignores_order() {
        let a: FieldMap = [("x", "1"), ("y", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut b = FieldMap::new();
        b.insert("y", "2");
        b.insert("x", "1");
        assert!(a.same_fields(&b));

        b.insert("x", "3");
        assert!(!a.same_fields(&b));
        assert_eq!(a.matching_fields(&b), 1);

        let mut c = b.clone();
        c.insert("z", "0");
        assert!(!b.same_fields(&c));
    }

    #[test]
    fn test_large_map_keeps_order_and_replaces_in_place() {
        let mut map: FieldMap = (0..50_000)
            .map(|i| (format!("$.k{i}"), i.to_string()))
            .collect();
        map.insert("$.k7", "seven");
        assert_eq!(map.len(), 50_000);
        assert_eq!(map.get("$.k7"), Some("seven"));
        assert_eq!(map.get("$.k49999"), Some("49999"));
        assert_eq!(map.keys().nth(7), Some("$.k7"));
        assert_eq!(map.clone().into_iter().last().unwrap().0, "$.k49999");
        assert!(map.same_fields(&map.clone()));
    }

    #[test]
    fn test_flat_command_line() {
        let map = flat_command_line("SET a 1").unwrap();
        assert_eq!(map.get("[0]"), Some("\"SET\""));
        assert_eq!(map.get("[2]"), Some("\"1\""));
        assert!(flat_command_line("SET \"a").is_err());
    }

    #[test]
    fn test_serialize_preserves_order() {
        let mut map = FieldMap::new();
        map.insert("b", "1");
        map.insert("a", "2");
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"b":"1","a":"2"}"#);
    }
}
