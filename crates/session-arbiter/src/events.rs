//! Status events for the presentation layer
//!
//! The arbiter never renders UI. Everything a user should see (registration
//! changes, call progress, terminal call outcomes, media problems) is published
//! as a [`StatusEvent`] to a [`StatusSink`].
//!
//! # Sinks
//!
//! - [`BroadcastStatusSink`] - fans events out over a tokio broadcast channel
//! - [`CollectingStatusSink`] - keeps events in memory, for tests and replays
//!
//! ```rust
//! use rvoip_session_arbiter::events::{BroadcastStatusSink, StatusEvent, StatusKind, StatusSink};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = BroadcastStatusSink::new(16);
//! let mut rx = sink.subscribe();
//!
//! sink.publish(StatusEvent::new(StatusKind::RegistrationExpiring));
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.message, "registration expiring");
//! # }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::media::SinkKind;
use crate::registration::RegistrationState;
use crate::session::SessionId;

/// Event priority levels for filtering and display
///
/// ```rust
/// use rvoip_session_arbiter::events::EventPriority;
///
/// assert!(EventPriority::Critical > EventPriority::High);
/// assert!(EventPriority::Normal > EventPriority::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventPriority::Low => "low",
            EventPriority::Normal => "normal",
            EventPriority::High => "high",
            EventPriority::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// What a status event reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusKind {
    Registering,
    Registered { status_code: u16, reason: String },
    RegistrationFailed { cause: String },
    RegistrationExpiring,
    Unregistered,
    /// Local capture attached to the local sink
    LocalMediaReady,
    CaptureFailed { reason: String },
    /// A sink refused a source
    MediaFailed { sink: SinkKind, reason: String },
    CallProgress,
    CallConfirmed,
    PeerConnection,
    /// Negotiation never completed
    CallFailed { cause: String },
    /// Call completed, then terminated
    CallEnded { cause: String },
}

impl StatusKind {
    pub fn priority(&self) -> EventPriority {
        match self {
            StatusKind::CallProgress | StatusKind::PeerConnection | StatusKind::Registering => EventPriority::Low,
            StatusKind::Registered { .. }
            | StatusKind::Unregistered
            | StatusKind::LocalMediaReady
            | StatusKind::CallConfirmed
            | StatusKind::CallEnded { .. } => EventPriority::Normal,
            StatusKind::RegistrationExpiring | StatusKind::CallFailed { .. } => EventPriority::High,
            StatusKind::RegistrationFailed { .. }
            | StatusKind::CaptureFailed { .. }
            | StatusKind::MediaFailed { .. } => EventPriority::Critical,
        }
    }

    /// Human-readable message shown to the user
    pub fn message(&self) -> String {
        match self {
            StatusKind::Registering => "registering".to_string(),
            StatusKind::Registered { status_code, reason } => {
                format!("registered: {} {}", status_code, reason)
            }
            StatusKind::RegistrationFailed { cause } => format!("registration failed: {}", cause),
            StatusKind::RegistrationExpiring => "registration expiring".to_string(),
            StatusKind::Unregistered => "unregistered".to_string(),
            StatusKind::LocalMediaReady => "Received local media stream".to_string(),
            StatusKind::CaptureFailed { reason } => format!("Get User Media Error: {}", reason),
            StatusKind::MediaFailed { sink, reason } => {
                format!("{} media unavailable: {}", sink, reason)
            }
            StatusKind::CallProgress => "call is in progress".to_string(),
            StatusKind::CallConfirmed => "call confirmed".to_string(),
            StatusKind::PeerConnection => "on peerconnection".to_string(),
            StatusKind::CallFailed { cause } => format!("call failed: {}", cause),
            StatusKind::CallEnded { cause } => format!("call ended: {}", cause),
        }
    }

    /// Terminal call outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusKind::CallFailed { .. } | StatusKind::CallEnded { .. })
    }

    /// Registration state this event reports, if it is a registration event
    pub fn registration_state(&self) -> Option<RegistrationState> {
        match self {
            StatusKind::Registering => Some(RegistrationState::Registering),
            StatusKind::Registered { .. } => Some(RegistrationState::Registered),
            StatusKind::RegistrationFailed { .. } => Some(RegistrationState::Failed),
            StatusKind::RegistrationExpiring => Some(RegistrationState::Expiring),
            StatusKind::Unregistered => Some(RegistrationState::Unregistered),
            _ => None,
        }
    }
}

/// One user-observable status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub kind: StatusKind,
    pub message: String,
    pub session_id: Option<SessionId>,
    pub priority: EventPriority,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(kind: StatusKind) -> Self {
        Self {
            message: kind.message(),
            priority: kind.priority(),
            kind,
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_session(kind: StatusKind, session_id: &SessionId) -> Self {
        let mut event = Self::new(kind);
        event.session_id = Some(session_id.clone());
        event
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session_id {
            Some(id) => write!(f, "[{}] {} ({})", self.priority, self.message, id),
            None => write!(f, "[{}] {}", self.priority, self.message),
        }
    }
}

/// Receiver of status events
pub trait StatusSink: Send + Sync {
    fn publish(&self, event: StatusEvent);
}

/// Status sink backed by a broadcast channel
///
/// Publishing never blocks; with no subscribers events are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastStatusSink {
    tx: broadcast::Sender<StatusEvent>,
}

impl BroadcastStatusSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl StatusSink for BroadcastStatusSink {
    fn publish(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }
}

/// Status sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingStatusSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl CollectingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<StatusKind> {
        self.events.lock().iter().map(|e| e.kind.clone()).collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_terminal()).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<StatusEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl StatusSink for CollectingStatusSink {
    fn publish(&self, event: StatusEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let registered = StatusKind::Registered { status_code: 200, reason: "OK".into() };
        assert_eq!(registered.message(), "registered: 200 OK");
        assert_eq!(StatusKind::CallFailed { cause: "Busy".into() }.message(), "call failed: Busy");
        assert_eq!(StatusKind::PeerConnection.message(), "on peerconnection");
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(StatusKind::CallFailed { cause: "x".into() }.is_terminal());
        assert!(StatusKind::CallEnded { cause: "x".into() }.is_terminal());
        assert!(!StatusKind::CallConfirmed.is_terminal());
    }

    #[test]
    fn test_failures_outrank_progress() {
        assert!(StatusKind::CaptureFailed { reason: "x".into() }.priority() > StatusKind::CallProgress.priority());
        assert_eq!(StatusKind::RegistrationExpiring.priority(), EventPriority::High);
    }

    #[test]
    fn test_display_includes_session() {
        let event = StatusEvent::for_session(StatusKind::CallConfirmed, &SessionId::from("s1"));
        assert_eq!(event.to_string(), "[normal] call confirmed (s1)");
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingStatusSink::new();
        sink.publish(StatusEvent::new(StatusKind::CallProgress));
        sink.publish(StatusEvent::new(StatusKind::CallEnded { cause: "BYE".into() }));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.terminal_count(), 1);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_does_not_fail() {
        let sink = BroadcastStatusSink::new(4);
        sink.publish(StatusEvent::new(StatusKind::Unregistered));

        let mut rx = sink.subscribe();
        sink.publish(StatusEvent::new(StatusKind::Registering));
        assert_eq!(rx.recv().await.unwrap().kind, StatusKind::Registering);
    }
}
