//! One recorded request/response exchange.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// A single exchange over one protocol.
///
/// `label` is derived from the request by the protocol plugin when the action
/// is captured; replay recomputes it from the request text, so an empty label
/// in a hand-written session is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Registered protocol name (see [`crate::protocol`]).
    pub protocol: String,

    /// Unix nanoseconds; orders repeated identical calls.
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    pub request: Message,

    pub response: Message,
}

impl Action {
    pub fn new(protocol: impl Into<String>, request: Message, response: Message) -> Self {
        Self {
            protocol: protocol.into(),
            timestamp: 0,
            label: String::new(),
            request,
            response,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Pretty JSON for logs and test output.
    pub fn pretty(&self) -> tr_common::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let action = Action::new("redis", "SET a 1".into(), "\"OK\"".into()).with_timestamp(42);
        let value: serde_json::Value = serde_json::from_str(&action.pretty().unwrap()).unwrap();
        assert_eq!(value["protocol"], "redis");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["request"], "SET a 1");
        assert_eq!(value["response"], "\"OK\"");
        assert!(value.get("label").is_none());
    }

    #[test]
    fn test_label_and_timestamp_default_when_absent() {
        let action: Action =
            serde_json::from_str(r#"{"protocol":"http","request":"GET /","response":"200"}"#)
                .unwrap();
        assert_eq!(action.timestamp, 0);
        assert!(action.label.is_empty());
        assert_eq!(action.request.data(), "GET /");
    }
}
