//! Captured sessions and their serialized form.
//!
//! A [`Session`] is one captured call tree: an optional inbound action (the
//! outer call that triggered the capture) plus the outbound actions it made.
//! [`RawSession`] is the serialized text of a session: pretty-printed JSON
//! tagged with a schema version.
//!
//! Payload text is stored as JSON strings, and payloads produced by
//! `tr_codec` are printable ASCII, so binary content survives the round trip
//! byte for byte.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tr_common::schema::{is_compatible, SCHEMA_VERSION};
use tr_common::{Error, Result, SessionId};

use crate::action::Action;

/// One captured call tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque id; must be non-empty.
    pub session: SessionId,

    /// Unix nanoseconds at which capture started.
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<Action>,

    /// Outbound actions in ascending timestamp order.
    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct RawSessionOut<'a> {
    schema_version: &'static str,
    #[serde(flatten)]
    session: &'a Session,
}

#[derive(Deserialize)]
struct RawSessionIn {
    #[serde(default = "default_schema_version")]
    schema_version: String,
    #[serde(flatten)]
    session: Session,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Session {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            timestamp: tr_common::now_nanos(),
            inbound: None,
            actions: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_inbound(mut self, inbound: Action) -> Self {
        self.inbound = Some(inbound);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.session.is_empty() {
            return Err(Error::InvalidSession("session id is empty".to_string()));
        }
        Ok(())
    }

    /// Stable-sort outbound actions by timestamp.
    pub fn sort_actions(&mut self) {
        self.actions.sort_by_key(|a| a.timestamp);
    }

    /// Serialize to the RawSession text form.
    pub fn pretty(&self) -> Result<RawSession> {
        let doc = RawSessionOut {
            schema_version: SCHEMA_VERSION,
            session: self,
        };
        Ok(RawSession(serde_json::to_string_pretty(&doc)?))
    }

    /// Parse RawSession text back into a session.
    pub fn parse(raw: &RawSession) -> Result<Session> {
        let doc: RawSessionIn = serde_json::from_str(raw.as_str())?;
        if !is_compatible(&doc.schema_version) {
            return Err(Error::IncompatibleSchema {
                found: doc.schema_version,
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        doc.session.validate()?;
        Ok(doc.session)
    }
}

/// Serialized text of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSession(String);

impl RawSession {
    pub fn new(text: impl Into<String>) -> Self {
        RawSession(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for RawSession {
    fn from(text: String) -> Self {
        RawSession(text)
    }
}

impl fmt::Display for RawSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
