//! Error types for traffic capture and replay.

use thiserror::Error;

/// Result type alias for traffic replay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for traffic capture and replay.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Lookup errors (20-29)
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("no recorded {protocol} action matches label {label:?} in session {session_id}{}", near_miss_suffix(.near_miss))]
    ActionNotFound {
        session_id: String,
        protocol: String,
        label: String,
        near_miss: Option<String>,
    },

    #[error("no unconsumed inbound action in session {session_id}")]
    InboundNotFound { session_id: String },

    #[error("protocol not registered: {0}")]
    ProtocolNotFound(String),

    // Decoding errors (30-39)
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("raw session schema version {found} is not compatible (expected {expected})")]
    IncompatibleSchema { found: String, expected: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Type errors (40-49)
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    // Usage errors (50-59)
    #[error("no session id bound in context")]
    SessionIdUnbound,

    #[error("duplicate key {0}")]
    DuplicateKey(String),

    #[error("context store uninitialized")]
    ContextUninitialized,

    #[error("replay mode is not enabled")]
    ReplayDisabled,

    #[error("invalid session: {0}")]
    InvalidSession(String),

    // Capture errors (60-69)
    #[error("capture failed: {0}")]
    CaptureFailure(String),
}

fn near_miss_suffix(near_miss: &Option<String>) -> String {
    match near_miss {
        Some(m) => format!(" (nearest: {m})"),
        None => String::new(),
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    NotFound,
    Malformed,
    TypeMismatch,
    Usage,
    Capture,
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::SessionNotFound { .. } => 20,
            Error::ActionNotFound { .. } => 21,
            Error::InboundNotFound { .. } => 22,
            Error::ProtocolNotFound(_) => 23,
            Error::Malformed(_) => 30,
            Error::IncompatibleSchema { .. } => 31,
            Error::Json(_) => 32,
            Error::TypeMismatch { .. } => 40,
            Error::SessionIdUnbound => 50,
            Error::DuplicateKey(_) => 51,
            Error::ContextUninitialized => 52,
            Error::ReplayDisabled => 53,
            Error::InvalidSession(_) => 54,
            Error::CaptureFailure(_) => 60,
        }
    }

    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self.code() {
            10..=19 => ErrorKind::Config,
            20..=29 => ErrorKind::NotFound,
            30..=39 => ErrorKind::Malformed,
            40..=49 => ErrorKind::TypeMismatch,
            50..=59 => ErrorKind::Usage,
            _ => ErrorKind::Capture,
        }
    }

    /// True for any of the lookup failures.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
