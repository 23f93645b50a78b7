//! Capture-mode write path.
//!
//! Outbound calls are appended to the session bound to the caller's
//! [`Context`]; the inbound call that owns the tree finalizes it. Nothing here
//! is allowed to fail the real call: every problem is logged and the affected
//! action is dropped.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use tr_common::{Error, Result, SessionId};
use tr_config::RecorderSettings;

use crate::action::Action;
use crate::context::Context;
use crate::mode::ModeSwitch;
use crate::protocol::{Protocol, ProtocolRegistry};
use crate::session::Session;

/// Receives each session as it is finalized.
pub type SessionSink = Arc<dyn Fn(&Session) + Send + Sync>;

/// Recently finalized session ids, oldest evicted first.
struct FinalizedIds {
    ids: HashSet<SessionId>,
    order: VecDeque<SessionId>,
    capacity: usize,
}

impl FinalizedIds {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, id: &SessionId) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: SessionId) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

pub struct Recorder {
    mode: Arc<ModeSwitch>,
    registry: Arc<ProtocolRegistry>,
    settings: RecorderSettings,
    /// Lock order: a `pending` shard, then `finalized`.
    pending: DashMap<SessionId, Session>,
    open: AtomicUsize,
    finalized: Mutex<FinalizedIds>,
    finished: Mutex<Vec<Session>>,
    sink: RwLock<Option<SessionSink>>,
}

impl Recorder {
    pub fn new(
        mode: Arc<ModeSwitch>,
        registry: Arc<ProtocolRegistry>,
        settings: RecorderSettings,
    ) -> Self {
        let finalized = FinalizedIds::new(settings.max_pending_sessions);
        Self {
            mode,
            registry,
            settings,
            pending: DashMap::new(),
            open: AtomicUsize::new(0),
            finalized: Mutex::new(finalized),
            finished: Mutex::new(Vec::new()),
            sink: RwLock::new(None),
        }
    }

    /// Install (or replace) the sink called for every finalized session.
    pub fn set_sink(&self, sink: SessionSink) {
        *self.sink.write() = Some(sink);
    }

    pub fn clear_sink(&self) {
        *self.sink.write() = None;
    }

    /// Append an outbound action to the session bound to `ctx`, starting one
    /// if none is bound. No-op outside record mode.
    ///
    /// Actions arriving after the session was finalized are dropped.
    pub fn record_action(&self, ctx: &Context, action: Action) {
        if !self.mode.is_record() {
            return;
        }
        let protocol = action.protocol.clone();
        if let Err(e) = self.capture_action(ctx, action) {
            warn!(protocol = %protocol, error = %e, code = e.code(), "action not recorded");
        }
    }

    fn capture_action(&self, ctx: &Context, action: Action) -> Result<()> {
        let action = self.prepare(action)?;
        let session_id = bind_session(ctx)?;
        match self.pending.entry(session_id.clone()) {
            Entry::Occupied(mut e) => e.get_mut().actions.push(action),
            Entry::Vacant(e) => {
                if self.finalized.lock().contains(&session_id) {
                    return Err(Error::CaptureFailure(format!(
                        "session {session_id} already finalized"
                    )));
                }
                let open = self.open.load(Ordering::Acquire);
                if open >= self.settings.max_pending_sessions {
                    return Err(Error::CaptureFailure(format!(
                        "{open} sessions already open"
                    )));
                }
                self.open.fetch_add(1, Ordering::AcqRel);
                let mut session = Session::new(session_id);
                session.actions.push(action);
                e.insert(session);
            }
        }
        Ok(())
    }

    /// Attach the inbound action and finalize the session bound to `ctx`.
    ///
    /// Returns the finalized session id. Outside record mode, or when the
    /// inbound action cannot be captured, returns `None`.
    pub fn record_inbound(&self, ctx: &Context, action: Action) -> Option<SessionId> {
        if !self.mode.is_record() {
            return None;
        }
        let protocol = action.protocol.clone();
        match self.finalize(ctx, action) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(protocol = %protocol, error = %e, code = e.code(), "inbound not recorded");
                None
            }
        }
    }

    fn finalize(&self, ctx: &Context, action: Action) -> Result<SessionId> {
        let action = self.prepare(action)?;
        let session_id = bind_session(ctx)?;
        let taken = match self.pending.entry(session_id.clone()) {
            Entry::Occupied(e) => {
                self.finalized.lock().insert(session_id.clone());
                self.open.fetch_sub(1, Ordering::AcqRel);
                e.remove()
            }
            Entry::Vacant(_) => {
                let mut finalized = self.finalized.lock();
                if finalized.contains(&session_id) {
                    return Err(Error::CaptureFailure(format!(
                        "session {session_id} already finalized"
                    )));
                }
                finalized.insert(session_id.clone());
                Session::new(session_id.clone())
            }
        };
        let mut session = taken;
        session.inbound = Some(action);
        session.sort_actions();

        info!(
            session_id = %session_id,
            actions = session.actions.len(),
            "session recorded"
        );
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink(&session);
        }
        self.finished.lock().push(session);
        Ok(session_id)
    }

    /// Label, timestamp and optionally validate an action before it is kept.
    fn prepare(&self, mut action: Action) -> Result<Action> {
        let plugin = self.registry.get(&action.protocol)?;
        action.label = plugin.label(action.request.data());
        if action.timestamp == 0 {
            action.timestamp = tr_common::now_nanos();
        }
        if self.settings.validate_payloads && plugin.should_diff() {
            validate(plugin.as_ref(), &action)?;
        }
        Ok(action)
    }

    /// Take every finalized session, oldest first.
    pub fn drain_finished(&self) -> Vec<Session> {
        std::mem::take(&mut *self.finished.lock())
    }

    /// Sessions started but not yet finalized.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop an open session without finalizing it.
    pub fn discard(&self, session_id: &SessionId) -> bool {
        let removed = self.pending.remove(session_id).is_some();
        if removed {
            self.open.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }
}

/// The session id bound to `ctx`, binding a new one if there is none.
/// Concurrent first binds in one tree agree on the winner's id.
fn bind_session(ctx: &Context) -> Result<SessionId> {
    if let Some(id) = ctx.session_id() {
        return Ok(id);
    }
    let id = SessionId::new();
    match ctx.bind_session_id(&id) {
        Ok(()) => {
            debug!(session_id = %id, "session started");
            Ok(id)
        }
        Err(Error::DuplicateKey(_)) => ctx.session_id().ok_or(Error::SessionIdUnbound),
        Err(e) => Err(e),
    }
}

fn validate(plugin: &dyn Protocol, action: &Action) -> Result<()> {
    plugin
        .flat_request(action.request.data())
        .map_err(|e| Error::CaptureFailure(format!("request does not flatten: {e}")))?;
    plugin
        .flat_response(action.response.data())
        .map_err(|e| Error::CaptureFailure(format!("response does not flatten: {e}")))?;
    Ok(())
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("pending", &self.pending.len())
            .field("finished", &self.finished.lock().len())
            .finish()
    }
}
