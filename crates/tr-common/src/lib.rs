//! Traffic replay common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the tr-* crates:
//! - Session identity
//! - The process-wide capture/replay mode
//! - The unified error type and its taxonomy
//! - Schema versioning for recorded sessions

pub mod error;
pub mod id;
pub mod mode;
pub mod schema;

pub use error::{Error, ErrorKind, Result};
pub use id::SessionId;
pub use mode::Mode;
pub use schema::SCHEMA_VERSION;

/// Current wall-clock time as Unix nanoseconds.
///
/// Saturates at `i64::MAX` for dates past 2262.
pub fn now_nanos() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX)
}
