//! Session identity type.
//!
//! A session id is opaque and supplied by whoever starts the capture. The only
//! structural rule is that it is non-empty; uniqueness across concurrently
//! active replays is the caller's responsibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session ID for one captured call tree.
///
/// Format of generated ids: 32 lowercase hex characters
/// Example: `39fc5c13443f47da9ff320cc4b02c789`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse an existing session ID string. Empty strings are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            None
        } else {
            Some(SessionId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A deserialized id can still be empty; callers storing sessions check this.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let sid = SessionId::new();
        assert_eq!(sid.0.len(), 32);
        assert!(sid.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(sid, SessionId::new());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(SessionId::parse("").is_none());
        assert_eq!(
            SessionId::parse("39fc5c13443f47da9ff320cc4b02c789").unwrap().as_str(),
            "39fc5c13443f47da9ff320cc4b02c789"
        );
    }

    #[test]
    fn test_serde_transparent() {
        let sid = SessionId::parse("abc").unwrap();
        assert_eq!(serde_json::to_string(&sid).unwrap(), "\"abc\"");
    }
}
