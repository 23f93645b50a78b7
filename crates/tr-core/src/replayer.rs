//! Replay-mode read path.
//!
//! Stored sessions are indexed by session id. Each recorded action carries an
//! `AtomicBool` consumption flag; a matcher claims an action with a
//! compare-and-swap, so when two callers race for the same action exactly one
//! wins and the other moves on to the next candidate. Candidates are scanned in
//! ascending timestamp order (ties by position), which makes repeated
//! identical calls receive their recorded responses in recorded order.

use std::cmp::Reverse;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use tr_codec::FieldMap;
use tr_common::{Error, Result, SessionId};
use tr_config::ReplaySettings;

use crate::action::Action;
use crate::context::Context;
use crate::diff::diff_fields;
use crate::mode::ModeSwitch;
use crate::protocol::{Protocol, ProtocolRegistry};
use crate::session::Session;

struct StoredSession {
    session: Session,
    /// Indices into `session.actions`, sorted by (timestamp, index).
    order: Vec<usize>,
    consumed: Vec<AtomicBool>,
    inbound_consumed: AtomicBool,
}

impl StoredSession {
    fn new(session: Session) -> Self {
        let mut order: Vec<usize> = (0..session.actions.len()).collect();
        order.sort_by_key(|&i| session.actions[i].timestamp);
        let consumed = session
            .actions
            .iter()
            .map(|_| AtomicBool::new(false))
            .collect();
        Self {
            session,
            order,
            consumed,
            inbound_consumed: AtomicBool::new(false),
        }
    }

    fn claim(&self, index: usize) -> bool {
        self.consumed[index]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_consumed(&self, index: usize) -> bool {
        self.consumed[index].load(Ordering::Acquire)
    }
}

pub struct Replayer {
    mode: Arc<ModeSwitch>,
    registry: Arc<ProtocolRegistry>,
    settings: ReplaySettings,
    sessions: DashMap<SessionId, Arc<StoredSession>>,
}

impl Replayer {
    pub fn new(
        mode: Arc<ModeSwitch>,
        registry: Arc<ProtocolRegistry>,
        settings: ReplaySettings,
    ) -> Self {
        Self {
            mode,
            registry,
            settings,
            sessions: DashMap::new(),
        }
    }

    /// Install a session for replay with every action unconsumed. Storing the
    /// same id again replaces the earlier session.
    pub fn store(&self, session: Session) -> Result<()> {
        session.validate()?;
        let id = session.session.clone();
        let actions = session.actions.len();
        let previous = self
            .sessions
            .insert(id.clone(), Arc::new(StoredSession::new(session)));
        if previous.is_some() {
            warn!(session_id = %id, "replay session replaced");
        }
        debug!(session_id = %id, actions, "replay session stored");
        Ok(())
    }

    /// Stop serving a session. Returns whether it was stored.
    pub fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of actions in a stored session not yet handed out.
    pub fn remaining(&self, session_id: &SessionId) -> Option<usize> {
        self.sessions.get(session_id).map(|stored| {
            stored
                .consumed
                .iter()
                .filter(|c| !c.load(Ordering::Acquire))
                .count()
        })
    }

    fn resolve(&self, ctx: &Context) -> Result<(SessionId, Arc<StoredSession>)> {
        if !self.mode.is_replay() {
            return Err(Error::ReplayDisabled);
        }
        let id = ctx.session_id().ok_or(Error::SessionIdUnbound)?;
        let stored = self
            .sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::SessionNotFound {
                session_id: id.to_string(),
            })?;
        Ok((id, stored))
    }

    /// Serve the earliest unconsumed recorded action matching `request`.
    pub fn replay_action(&self, ctx: &Context, protocol: &str, request: &str) -> Result<Action> {
        let (id, stored) = self.resolve(ctx)?;
        let plugin = self.registry.get(protocol)?;
        let label = plugin.label(request);
        let live = if plugin.should_diff() {
            Some(plugin.flat_request(request)?)
        } else {
            None
        };

        for &index in &stored.order {
            let recorded = &stored.session.actions[index];
            if recorded.protocol != protocol || stored.is_consumed(index) {
                continue;
            }
            if plugin.label(recorded.request.data()) != label {
                continue;
            }
            if let Some(live) = &live {
                match plugin.flat_request(recorded.request.data()) {
                    Ok(fields) if fields.same_fields(live) => {}
                    _ => continue,
                }
            }
            if stored.claim(index) {
                debug!(
                    session_id = %id,
                    protocol,
                    label = %label,
                    timestamp = recorded.timestamp,
                    "replayed action"
                );
                return Ok(recorded.clone());
            }
        }

        let near_miss = if self.settings.near_miss_diagnostics {
            near_miss(&stored, plugin.as_ref(), protocol, &label, live.as_ref())
        } else {
            None
        };
        Err(Error::ActionNotFound {
            session_id: id.to_string(),
            protocol: protocol.to_string(),
            label,
            near_miss,
        })
    }

    /// Consume the session's inbound action. The live `response` is compared
    /// with the recorded one and differences are logged.
    pub fn replay_inbound(&self, ctx: &Context, response: &str) -> Result<Action> {
        let (id, stored) = self.resolve(ctx)?;
        let not_found = || Error::InboundNotFound {
            session_id: id.to_string(),
        };
        let inbound = stored.session.inbound.as_ref().ok_or_else(not_found)?;
        if stored
            .inbound_consumed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(not_found());
        }

        if inbound.response.data() != response {
            self.report_inbound_mismatch(&id, inbound, response);
        }
        Ok(inbound.clone())
    }

    fn report_inbound_mismatch(&self, id: &SessionId, inbound: &Action, live: &str) {
        let diff = self
            .registry
            .get(&inbound.protocol)
            .ok()
            .filter(|plugin| plugin.should_diff())
            .and_then(|plugin| {
                let recorded = plugin.flat_response(inbound.response.data()).ok()?;
                let live = plugin.flat_response(live).ok()?;
                Some(diff_fields(&recorded, &live))
            });
        match diff {
            Some(diffs) => {
                let rendered: Vec<String> = diffs.iter().map(ToString::to_string).collect();
                warn!(
                    session_id = %id,
                    protocol = %inbound.protocol,
                    diff = %rendered.join(", "),
                    "inbound response differs from recording"
                );
            }
            None => warn!(
                session_id = %id,
                protocol = %inbound.protocol,
                recorded = %inbound.response.data(),
                live = %live,
                "inbound response differs from recording"
            ),
        }
    }
}

/// Closest recorded action of `protocol`, rendered for an error message.
///
/// Same label scores highest, then the number of matching request fields;
/// unconsumed actions beat consumed ones, earlier beats later.
fn near_miss(
    stored: &StoredSession,
    plugin: &dyn Protocol,
    protocol: &str,
    label: &str,
    live: Option<&FieldMap>,
) -> Option<String> {
    let (_, index, fields) = stored
        .order
        .iter()
        .enumerate()
        .filter(|(_, i)| stored.session.actions[**i].protocol == protocol)
        .map(|(rank, &i)| {
            let recorded = &stored.session.actions[i];
            let same_label = plugin.label(recorded.request.data()) == label;
            let fields = live.and_then(|_| plugin.flat_request(recorded.request.data()).ok());
            let matching = match (live, &fields) {
                (Some(live), Some(fields)) => fields.matching_fields(live),
                _ => 0,
            };
            let key = (same_label, matching, !stored.is_consumed(i), Reverse(rank));
            (key, i, fields)
        })
        .max_by(|a, b| a.0.cmp(&b.0))?;

    let recorded = &stored.session.actions[index];
    let mut out = format!("#{index} {:?}", recorded.request.data());
    if stored.is_consumed(index) {
        out.push_str(" (consumed)");
    }
    if let (Some(live), Some(fields)) = (live, fields) {
        let diffs: Vec<String> = diff_fields(&fields, live)
            .iter()
            .map(ToString::to_string)
            .collect();
        if !diffs.is_empty() {
            out.push_str(" differs: ");
            out.push_str(&diffs.join(", "));
        }
    }
    Some(out)
}

impl fmt::Debug for Replayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replayer")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
