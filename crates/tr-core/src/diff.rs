//! Field-level views of sessions for comparing recorded and live traffic.

use std::fmt;

use serde::Serialize;
use tr_codec::FieldMap;
use tr_common::{Result, SessionId};

use crate::action::Action;
use crate::protocol::ProtocolRegistry;
use crate::session::Session;

/// One key that differs between a recorded and a live field map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum FieldDiff {
    /// Present live, absent in the recording.
    Added { key: String, live: String },
    /// Present in the recording, absent live.
    Removed { key: String, recorded: String },
    Changed {
        key: String,
        recorded: String,
        live: String,
    },
}

impl FieldDiff {
    pub fn key(&self) -> &str {
        match self {
            FieldDiff::Added { key, .. }
            | FieldDiff::Removed { key, .. }
            | FieldDiff::Changed { key, .. } => key,
        }
    }
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDiff::Added { key, live } => write!(f, "+{key}={live}"),
            FieldDiff::Removed { key, recorded } => write!(f, "-{key}={recorded}"),
            FieldDiff::Changed {
                key,
                recorded,
                live,
            } => write!(f, "~{key}: {recorded} -> {live}"),
        }
    }
}

/// Keys that differ between `recorded` and `live`.
///
/// Recorded keys come first in recorded order, then keys only present live.
pub fn diff_fields(recorded: &FieldMap, live: &FieldMap) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    for (key, was) in recorded.iter() {
        match live.get(key) {
            Some(now) if now == was => {}
            Some(now) => diffs.push(FieldDiff::Changed {
                key: key.to_string(),
                recorded: was.to_string(),
                live: now.to_string(),
            }),
            None => diffs.push(FieldDiff::Removed {
                key: key.to_string(),
                recorded: was.to_string(),
            }),
        }
    }
    for (key, now) in live.iter() {
        if recorded.get(key).is_none() {
            diffs.push(FieldDiff::Added {
                key: key.to_string(),
                live: now.to_string(),
            });
        }
    }
    diffs
}

/// Flattened payload, or why it could not be flattened.
///
/// Serialized as `{"fields": {..}}` or `{"error": ".."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatFields {
    Fields(FieldMap),
    Error(String),
}

impl FlatFields {
    fn from_result(result: tr_codec::Result<FieldMap>) -> Self {
        match result {
            Ok(fields) => FlatFields::Fields(fields),
            Err(e) => FlatFields::Error(e.to_string()),
        }
    }

    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            FlatFields::Fields(fields) => Some(fields),
            FlatFields::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FlatFields::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatAction {
    pub protocol: String,
    pub timestamp: i64,
    pub request: FlatFields,
    pub response: FlatFields,
}

/// Printable field-level view of a [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatSession {
    pub session: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound: Option<FlatAction>,
    pub actions: Vec<FlatAction>,
}

impl FlatSession {
    pub fn pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of payloads that failed to flatten.
    pub fn error_count(&self) -> usize {
        self.inbound
            .iter()
            .chain(self.actions.iter())
            .map(|a| usize::from(a.request.is_error()) + usize::from(a.response.is_error()))
            .sum()
    }
}

fn flat_action(action: &Action, registry: &ProtocolRegistry, inbound: bool) -> Option<FlatAction> {
    let (request, response) = match registry.get(&action.protocol) {
        Ok(plugin) => {
            if !inbound && !plugin.should_diff() {
                return None;
            }
            (
                FlatFields::from_result(plugin.flat_request(action.request.data())),
                FlatFields::from_result(plugin.flat_response(action.response.data())),
            )
        }
        Err(e) => {
            let error = e.to_string();
            (FlatFields::Error(error.clone()), FlatFields::Error(error))
        }
    };
    Some(FlatAction {
        protocol: action.protocol.clone(),
        timestamp: action.timestamp,
        request,
        response,
    })
}

impl Session {
    /// Flatten the inbound action and every outbound action whose protocol
    /// diffs. Failures, including an unregistered protocol, are recorded per
    /// payload; the session is not modified.
    pub fn flat(&self, registry: &ProtocolRegistry) -> FlatSession {
        FlatSession {
            session: self.session.clone(),
            inbound: self
                .inbound
                .as_ref()
                .and_then(|a| flat_action(a, registry, true)),
            actions: self
                .actions
                .iter()
                .filter_map(|a| flat_action(a, registry, false))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;
    use std::sync::Arc;
    use tr_codec::{flat_command_line, flat_csv};

    struct Kv {
        diff: bool,
    }

    impl Protocol for Kv {
        fn should_diff(&self) -> bool {
            self.diff
        }

        fn label(&self, request: &str) -> String {
            request.chars().take(4).collect()
        }

        fn flat_request(&self, request: &str) -> tr_codec::Result<FieldMap> {
            flat_command_line(request)
        }

        fn flat_response(&self, response: &str) -> tr_codec::Result<FieldMap> {
            flat_csv(response)
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_diff_fields_classifies() {
        let recorded = fields(&[("[0]", "\"SET\""), ("[1]", "\"a\""), ("[2]", "\"1\"")]);
        let live = fields(&[("[0]", "\"SET\""), ("[1]", "\"b\""), ("[3]", "x")]);
        let diffs = diff_fields(&recorded, &live);
        assert_eq!(diffs.len(), 3);
        assert_eq!(diffs[0].key(), "[1]");
        assert!(matches!(diffs[1], FieldDiff::Removed { .. }));
        assert!(matches!(diffs[2], FieldDiff::Added { .. }));
        assert_eq!(diffs[0].to_string(), "~[1]: \"a\" -> \"b\"");
        assert!(diff_fields(&recorded, &recorded).is_empty());
    }

    #[test]
    fn test_flat_skips_non_diff_and_annotates_errors() {
        let registry = ProtocolRegistry::new();
        registry.register("KV", Arc::new(Kv { diff: true }));
        registry.register("LOG", Arc::new(Kv { diff: false }));

        let session = Session::new(SessionId::new())
            .with_inbound(Action::new("KV", "GET a".into(), "1".into()))
            .with_action(Action::new("KV", "SET a 1".into(), "\"OK\"".into()))
            .with_action(Action::new("LOG", "x".into(), "y".into()))
            .with_action(Action::new("KV", "SET \"a".into(), "\"OK\"".into()))
            .with_action(Action::new("NOPE", "x".into(), "y".into()));

        let flat = session.flat(&registry);
        assert!(flat.inbound.is_some());
        assert_eq!(flat.actions.len(), 3);
        assert_eq!(
            flat.actions[0].request.fields().unwrap().get("[2]"),
            Some("\"1\"")
        );
        assert!(flat.actions[1].request.is_error());
        assert!(!flat.actions[1].response.is_error());
        assert!(flat.actions[2].request.is_error());
        assert_eq!(flat.error_count(), 3);
    }

    #[test]
    fn test_error_annotation_distinct_from_error_field() {
        let mut only_error_key = FieldMap::new();
        only_error_key.insert("error", "boom");
        let fields = serde_json::to_value(FlatFields::Fields(only_error_key)).unwrap();
        let failure = serde_json::to_value(FlatFields::Error("boom".to_string())).unwrap();
        assert_ne!(fields, failure);
        assert_eq!(fields["fields"]["error"], "boom");
        assert_eq!(failure["error"], "boom");
    }

    #[test]
    fn test_flat_is_idempotent() {
        let registry = ProtocolRegistry::new();
        registry.register("KV", Arc::new(Kv { diff: true }));
        let session = Session::new(SessionId::new())
            .with_action(Action::new("KV", "HGET a".into(), "[1,\"b\"]".into()));
        let first = session.flat(&registry);
        let second = session.flat(&registry);
        assert_eq!(first, second);
        assert_eq!(first.pretty().unwrap(), second.pretty().unwrap());
    }
}
