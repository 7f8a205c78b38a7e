//! Session arbitration
//!
//! The [`SessionArbiter`] decides which call session is the single
//! authoritative *current* session while notifications for up to two
//! candidate sessions (one incoming, one outgoing) race each other.
//!
//! # Slot automaton
//!
//! ```text
//!   new_session          connecting (outgoing)             failed / ended
//! ─────────────► candidate ──────────────────────► current ───────────────► none
//!                    │      accepted / confirmed      │
//!                    │      from remote (incoming)    │ hang_up()
//!                    │                                ▼
//!                    └──────── failed / ended ──────► none
//! ```
//!
//! Promotion only happens while `current` is empty; the first promotion wins
//! and later accepted/confirmed/connecting notifications are only observed.
//!
//! # Media
//!
//! Tracks arriving on a session's peer connection are routed to the remote
//! sink whether or not that session is current yet. Evicting the current
//! session, or hanging it up, releases the remote sink.
//!
//! # Errors
//!
//! No method here returns an error or panics on bad input: each reports an
//! outcome value and publishes status events for the user.

mod slots;
mod subscriptions;


pub use slots::{ArbiterSlots, PlaceError, Slot};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CallMediaConstraints;
use crate::error::{CaptureError, MediaError, SessionError};
use crate::events::{StatusEvent, StatusKind, StatusSink};
use crate::media::{MediaBinder, MediaSource, SinkKind};
use crate::session::{
    CallOptions, CallSession, Originator, PeerConnectionId, SessionEvent, SessionId, SessionRole, SessionState,
};

use subscriptions::SubscriptionTable;

/// Result of offering a new session to the arbiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewSessionOutcome {
    /// Stored in its candidate slot and subscribed
    Candidate {
        role: SessionRole,
        /// Incoming sessions only: whether `answer` was accepted by the session
        answered: bool,
    },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// One candidate per role; another one is still pending
    SlotOccupied { role: SessionRole, existing: SessionId },
    /// The same session was announced twice
    AlreadyTracked { slot: Option<Slot> },
}

/// Result of delivering one session notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// No open subscription for the session; the notification was dropped
    Unsubscribed,
    /// Recorded, no slot changed
    Observed,
    /// The given session moved from its candidate slot to `current`
    Promoted(SessionId),
    /// Terminal notification; the session left `slot` (if it held one)
    Evicted { slot: Option<Slot>, remote_detached: bool },
}

/// Result of a track arriving on a peer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Attached(SessionId),
    /// No subscribed session owns this peer connection
    Unrouted,
    /// The owning session was hung up locally
    Disarmed(SessionId),
    Failed(MediaError),
}

/// Result of [`SessionArbiter::hang_up`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HangUpOutcome {
    NoCurrentSession,
    Terminated {
        session_id: SessionId,
        remote_detached: bool,
    },
    /// `current` was still cleared and the remote sink released
    TerminateFailed {
        session_id: SessionId,
        remote_detached: bool,
        error: SessionError,
    },
}

/// One subscribed session as seen by the arbiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub role: SessionRole,
    pub state: SessionState,
    pub slot: Option<Slot>,
    pub peer: Option<PeerConnectionId>,
    /// The external layer still holds the session object
    pub alive: bool,
}

/// Point-in-time view of the arbiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbiterSnapshot {
    pub slots: ArbiterSlots,
    pub local_source: Option<MediaSource>,
    pub remote_source: Option<MediaSource>,
    pub sessions: Vec<SessionSummary>,
}

/// Owner of the three arbitration slots and the media sinks
pub struct SessionArbiter {
    call_media: CallMediaConstraints,
    slots: ArbiterSlots,
    subscriptions: SubscriptionTable,
    media: MediaBinder,
    status: Arc<dyn StatusSink>,
    /// Session whose track is attached to the remote sink
    remote_owner: Option<SessionId>,
}

impl std::fmt::Debug for SessionArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionArbiter")
            .field("slots", &self.slots)
            .field("subscriptions", &self.subscriptions.len())
            .field("media", &self.media)
            .field("remote_owner", &self.remote_owner)
            .finish()
    }
}

impl SessionArbiter {
    pub fn new(call_media: CallMediaConstraints, media: MediaBinder, status: Arc<dyn StatusSink>) -> Self {
        Self {
            call_media,
            slots: ArbiterSlots::new(),
            subscriptions: SubscriptionTable::new(),
            media,
            status,
            remote_owner: None,
        }
    }

    /// Offer a session created by the signaling layer.
    ///
    /// Incoming sessions are answered immediately with the configured media
    /// constraints and whatever local source is bound at this moment.
    /// Outgoing sessions wait for `connecting`. A same-role candidate whose
    /// session has already been dropped is forgotten first.
    pub fn on_new_session(&mut self, role: SessionRole, session: Arc<dyn CallSession>) -> NewSessionOutcome {
        let id = session.id().clone();

        if self.subscriptions.is_subscribed(&id) {
            warn!(session_id = %id, %role, "Ignoring session announced twice");
            return NewSessionOutcome::Rejected(RejectReason::AlreadyTracked {
                slot: self.slots.slot_of(&id),
            });
        }

        if let Some(existing) = self.slots.candidate(role).cloned() {
            if self.subscriptions.upgrade(&existing).is_none() {
                self.forget_dropped(&existing);
            }
        }

        match self.slots.place_candidate(role, id.clone()) {
            Ok(()) => {}
            Err(PlaceError::Occupied(existing)) => {
                warn!(
                    session_id = %id,
                    %role,
                    pending = %existing,
                    "Ignoring new session: a candidate with this role is already pending"
                );
                return NewSessionOutcome::Rejected(RejectReason::SlotOccupied { role, existing });
            }
            Err(PlaceError::Duplicate(slot)) => {
                warn!(session_id = %id, ?slot, "Ignoring new session: already holds a slot");
                return NewSessionOutcome::Rejected(RejectReason::AlreadyTracked { slot: Some(slot) });
            }
        }

        self.subscriptions.subscribe(id.clone(), role, &session);
        info!(session_id = %id, %role, "New session stored as candidate");

        let answered = match role {
            SessionRole::Incoming => self.answer_incoming(&id, session.as_ref()),
            SessionRole::Outgoing => false,
        };

        self.check_invariants();
        NewSessionOutcome::Candidate { role, answered }
    }

    /// Deliver one notification from a session's event stream
    pub fn on_session_event(&mut self, id: &SessionId, event: SessionEvent) -> NotificationOutcome {
        let Some(subscription) = self.subscriptions.get_mut(id) else {
            debug!(session_id = %id, event = event.name(), "Dropping notification for unsubscribed session");
            return NotificationOutcome::Unsubscribed;
        };

        let previous = subscription.state;
        subscription.state = previous.advance(&event);
        if subscription.state != previous {
            debug!(session_id = %id, from = %previous, to = %subscription.state, "Session state changed");
        }

        let outcome = match event {
            SessionEvent::Progress { originator, response } => self.on_progress(id, originator, response),
            SessionEvent::Connecting => self.on_connecting(id),
            SessionEvent::Accepted { originator } => self.on_established(id, "accepted", originator),
            SessionEvent::Confirmed { originator } => {
                self.status
                    .publish(StatusEvent::for_session(StatusKind::CallConfirmed, id));
                self.on_established(id, "confirmed", originator)
            }
            SessionEvent::Sdp { originator, kind } => {
                debug!(session_id = %id, ?originator, ?kind, "Session description exchanged");
                NotificationOutcome::Observed
            }
            SessionEvent::PeerConnectionReady { peer } => self.on_peerconnection_ready(id, peer),
            SessionEvent::Failed { originator, cause } => {
                self.on_terminated(id, originator, StatusKind::CallFailed { cause })
            }
            SessionEvent::Ended { originator, cause } => {
                self.on_terminated(id, originator, StatusKind::CallEnded { cause })
            }
        };

        self.check_invariants();
        outcome
    }

    /// Route a track that arrived on `peer` to the remote sink
    pub fn on_track_arrived(&mut self, peer: &PeerConnectionId, source: MediaSource) -> TrackOutcome {
        let Some(id) = self.subscriptions.session_for_peer(peer).cloned() else {
            debug!(%peer, "Track arrived on a peer connection nobody subscribed to");
            return TrackOutcome::Unrouted;
        };

        let armed = self
            .subscriptions
            .get(&id)
            .map(|s| s.remote_binding_armed && !s.terminated_locally)
            .unwrap_or(false);
        if !armed {
            debug!(session_id = %id, %peer, "Ignoring track for a session that was hung up");
            return TrackOutcome::Disarmed(id);
        }

        match self.media.attach_remote(source) {
            Ok(()) => {
                debug!(session_id = %id, %peer, "Remote track bound");
                self.remote_owner = Some(id.clone());
                TrackOutcome::Attached(id)
            }
            Err(e) => {
                self.status.publish(StatusEvent::for_session(
                    StatusKind::MediaFailed {
                        sink: SinkKind::Remote,
                        reason: e.reason().to_string(),
                    },
                    &id,
                ));
                TrackOutcome::Failed(e)
            }
        }
    }

    /// Completion of local capture acquisition. Returns true if the local
    /// sink now holds the source.
    pub fn on_local_media(&mut self, result: Result<MediaSource, CaptureError>) -> bool {
        match result {
            Ok(source) => match self.media.attach_local(source) {
                Ok(()) => {
                    self.status.publish(StatusEvent::new(StatusKind::LocalMediaReady));
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Local source could not be rendered");
                    self.status.publish(StatusEvent::new(StatusKind::MediaFailed {
                        sink: SinkKind::Local,
                        reason: e.reason().to_string(),
                    }));
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, "Local capture failed; calls continue without a local source");
                self.status
                    .publish(StatusEvent::new(StatusKind::CaptureFailed { reason: e.to_string() }));
                false
            }
        }
    }

    /// Terminate the current session.
    ///
    /// Clears `current` and releases the remote sink even if the session
    /// refuses to terminate. With no current session this does nothing.
    pub fn hang_up(&mut self) -> HangUpOutcome {
        let Some(id) = self.slots.take_current() else {
            debug!("Hang-up requested with no current session");
            return HangUpOutcome::NoCurrentSession;
        };

        if let Some(subscription) = self.subscriptions.get_mut(&id) {
            subscription.terminated_locally = true;
            subscription.remote_binding_armed = false;
        }

        let result = match self.subscriptions.upgrade(&id) {
            Some(session) => session.terminate(),
            None => Err(SessionError::Gone { session_id: id.clone() }),
        };
        let remote_detached = self.release_remote();
        self.check_invariants();

        match result {
            Ok(()) => {
                info!(session_id = %id, "Hung up current session");
                HangUpOutcome::Terminated {
                    session_id: id,
                    remote_detached,
                }
            }
            Err(error) => {
                warn!(session_id = %id, error = %error, "Terminate failed; current session released anyway");
                HangUpOutcome::TerminateFailed {
                    session_id: id,
                    remote_detached,
                    error,
                }
            }
        }
    }

    /// Hang up and release both sinks
    pub fn shutdown(&mut self) -> HangUpOutcome {
        let outcome = self.hang_up();
        self.release_remote();
        self.media.detach_local();
        outcome
    }

    pub fn slots(&self) -> &ArbiterSlots {
        &self.slots
    }

    pub fn media(&self) -> &MediaBinder {
        &self.media
    }

    /// Local source used for answers and outgoing calls
    pub fn local_source(&self) -> Option<&MediaSource> {
        self.media.local_source()
    }

    /// Options for placing an outgoing call right now
    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            media_constraints: self.call_media,
            local_source: self.media.local_source().cloned(),
        }
    }

    pub fn current_session(&self) -> Option<Arc<dyn CallSession>> {
        self.slots.current().and_then(|id| self.subscriptions.upgrade(id))
    }

    pub fn session_state(&self, id: &SessionId) -> Option<SessionState> {
        self.subscriptions.get(id).map(|s| s.state)
    }

    pub fn is_subscribed(&self, id: &SessionId) -> bool {
        self.subscriptions.is_subscribed(id)
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        let mut sessions: Vec<_> = self
            .subscriptions
            .iter()
            .map(|(id, s)| {
                (
                    s.subscribed_at,
                    SessionSummary {
                        session_id: id.clone(),
                        role: s.role,
                        state: s.state,
                        slot: self.slots.slot_of(id),
                        peer: s.peer.clone(),
                        alive: s.session.strong_count() > 0,
                    },
                )
            })
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.session_id.0.cmp(&b.1.session_id.0)));

        ArbiterSnapshot {
            slots: self.slots.clone(),
            local_source: self.media.local_source().cloned(),
            remote_source: self.media.remote_source().cloned(),
            sessions: sessions.into_iter().map(|(_, s)| s).collect(),
        }
    }

    /// Slots never repeat a session, and every slotted session is subscribed
    /// and not terminal.
    pub fn invariants_hold(&self) -> bool {
        if !self.slots.is_consistent() {
            return false;
        }
        [Slot::Current, Slot::IncomingCandidate, Slot::OutgoingCandidate]
            .into_iter()
            .filter_map(|slot| self.slots.get(slot))
            .all(|id| self.session_state(id).map(|s| !s.is_terminal()).unwrap_or(false))
    }

    fn answer_incoming(&mut self, id: &SessionId, session: &dyn CallSession) -> bool {
        let options = self.call_options();
        if options.local_source.is_none() {
            debug!(session_id = %id, "Answering without a local source");
        }

        if let Err(e) = session.answer(&options) {
            warn!(session_id = %id, error = %e, "Failed to answer incoming session");
            return false;
        }
        info!(session_id = %id, "Answered incoming session");

        // Without a peer yet, routing is armed by `peerconnection_ready`
        if let Some(peer) = session.connection() {
            self.subscriptions.bind_peer(id, peer);
        }
        true
    }

    fn on_progress(&mut self, id: &SessionId, originator: Originator, response: Option<String>) -> NotificationOutcome {
        match (originator, response) {
            (Originator::Remote, Some(response)) => {
                debug!(session_id = %id, response = %response, "Call in progress")
            }
            _ => debug!(session_id = %id, ?originator, "Call in progress"),
        }
        self.status
            .publish(StatusEvent::for_session(StatusKind::CallProgress, id));
        NotificationOutcome::Observed
    }

    fn on_connecting(&mut self, id: &SessionId) -> NotificationOutcome {
        if self.slots.slot_of(id) != Some(Slot::OutgoingCandidate) {
            debug!(session_id = %id, "Connecting observed for a session that is not the outgoing candidate");
            return NotificationOutcome::Observed;
        }

        match self.slots.promote(SessionRole::Outgoing) {
            Some(promoted) => {
                info!(session_id = %promoted, "Outgoing session connecting; promoted to current");
                NotificationOutcome::Promoted(promoted)
            }
            None => {
                warn!(
                    session_id = %id,
                    current = ?self.slots.current(),
                    "Outgoing session connecting while another session is current; left as candidate"
                );
                NotificationOutcome::Observed
            }
        }
    }

    fn on_established(&mut self, id: &SessionId, what: &'static str, originator: Originator) -> NotificationOutcome {
        if originator != Originator::Remote {
            debug!(session_id = %id, event = what, ?originator, "Locally originated; no promotion");
            return NotificationOutcome::Observed;
        }
        if let Some(current) = self.slots.current() {
            debug!(session_id = %id, event = what, current = %current, "Current already chosen; not re-promoting");
            return NotificationOutcome::Observed;
        }

        match self.slots.promote(SessionRole::Incoming) {
            Some(promoted) => {
                info!(session_id = %id, promoted = %promoted, event = what, "Promoted incoming candidate to current");
                NotificationOutcome::Promoted(promoted)
            }
            None => {
                debug!(session_id = %id, event = what, "No incoming candidate to promote");
                NotificationOutcome::Observed
            }
        }
    }

    fn on_peerconnection_ready(&mut self, id: &SessionId, peer: PeerConnectionId) -> NotificationOutcome {
        debug!(session_id = %id, %peer, "Peer connection ready; subscribing to tracks");
        self.subscriptions.bind_peer(id, peer);
        if let Some(subscription) = self.subscriptions.get_mut(id) {
            if subscription.terminated_locally {
                subscription.remote_binding_armed = false;
            }
        }
        self.status
            .publish(StatusEvent::for_session(StatusKind::PeerConnection, id));
        NotificationOutcome::Observed
    }

    fn on_terminated(&mut self, id: &SessionId, originator: Originator, kind: StatusKind) -> NotificationOutcome {
        let slot = self.slots.evict(id);
        let owns_remote = self.remote_owner.as_ref() == Some(id);
        let remote_detached = if slot == Some(Slot::Current) || owns_remote {
            self.release_remote()
        } else {
            false
        };
        self.subscriptions.unsubscribe(id);

        info!(session_id = %id, ?originator, ?slot, remote_detached, "Session terminated: {}", kind.message());
        self.status.publish(StatusEvent::for_session(kind, id));

        NotificationOutcome::Evicted { slot, remote_detached }
    }

    /// Free the slot of a session the external layer dropped without a
    /// terminal notification
    fn forget_dropped(&mut self, id: &SessionId) {
        let slot = self.slots.evict(id);
        let remote_detached = self.remote_owner.as_ref() == Some(id) && self.release_remote();
        self.subscriptions.unsubscribe(id);
        warn!(session_id = %id, ?slot, remote_detached, "Forgetting candidate session dropped without a terminal notification");
    }

    fn release_remote(&mut self) -> bool {
        self.remote_owner = None;
        self.media.detach_remote()
    }

    fn check_invariants(&self) {
        debug_assert!(self.invariants_hold(), "arbiter invariants violated: {:?}", self.slots);
    }
}
