//! Traffic capture and deterministic replay.
//!
//! In record mode, outbound calls made while serving an inbound request are
//! captured as [`Action`]s into a [`Session`]; the finished session is
//! serialized with [`Session::pretty`]. In replay mode, a parsed session is
//! stored in the [`Replayer`] and live calls are answered from it: each
//! recorded action is handed out at most once, and repeated identical calls
//! receive their responses in recorded order.
//!
//! Protocol-specific knowledge (how to label and flatten a payload) lives in
//! [`Protocol`] plugins registered by name. The active session travels with
//! the call tree in a [`Context`].
//!
//! ```
//! use tr_core::{Context, Engine, Session, RawSession};
//! use tr_common::{Mode, SessionId};
//!
//! let engine = Engine::new();
//! engine.set_mode(Mode::Replay);
//! let raw = RawSession::new(r#"{"session":"s1","inbound":{"protocol":"APCU","request":"k","response":"::empty::"}}"#);
//! engine.replayer().store(Session::parse(&raw).unwrap()).unwrap();
//!
//! let (ctx, _) = Context::background().with_store();
//! ctx.bind_session_id(&SessionId::parse("s1").unwrap()).unwrap();
//! assert!(engine.replayer().replay_inbound(&ctx, "::empty::").is_ok());
//! ```

pub mod action;
pub mod cache;
pub mod context;
pub mod diff;
pub mod engine;
pub mod logging;
pub mod message;
pub mod mode;
pub mod protocol;
pub mod recorder;
pub mod replayer;
pub mod session;

pub use action::Action;
pub use cache::{ApcuProtocol, CacheValue, LocalCache, EMPTY_VALUE};
pub use context::Context;
pub use diff::{diff_fields, FieldDiff, FlatAction, FlatFields, FlatSession};
pub use engine::Engine;
pub use logging::init_logging;
pub use message::Message;
pub use mode::ModeSwitch;
pub use protocol::{Protocol, ProtocolRegistry, APCU, HTTP, REDIS};
pub use recorder::{Recorder, SessionSink};
pub use replayer::Replayer;
pub use session::{RawSession, Session};
