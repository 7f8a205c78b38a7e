//! Call session model
//!
//! A [`CallSession`] is one negotiation attempt owned by the external
//! signaling/media layer. The arbiter only ever holds it through a weak
//! reference and learns about its progress from the [`SessionEvent`] stream
//! the external layer delivers for it.
//!
//! # Per-session state
//!
//! ```text
//! Created ──► Progressing ──► Accepted ◄──► Confirmed ──► Ended
//!    │             │              │             │
//!    └─────────────┴──────────────┴─────────────┴──────► Failed
//! ```
//!
//! Accepted and Confirmed may arrive in either order, or one of them may be
//! skipped. Ended and Failed are absorbing.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CallMediaConstraints;
use crate::error::SessionError;
use crate::media::MediaSource;

/// Identifier of a call session, assigned by the signaling layer
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
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

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of the peer connection carrying a session's media
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PeerConnectionId(pub String);

impl fmt::Display for PeerConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which side created the session. Fixed at creation.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Created by a remote INVITE
    Incoming,
    /// Created by a local call request
    Outgoing,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Incoming => write!(f, "incoming"),
            SessionRole::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// Party that caused a session notification
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Originator {
    Local,
    Remote,
    /// Raised by the signaling stack itself (timeouts, transport errors)
    System,
}

/// Kind of session description carried by an `sdp` notification
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Lifecycle state of one call session
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    Progressing,
    Accepted,
    Confirmed,
    /// Completed negotiation, then terminated
    Ended,
    /// Negotiation never completed
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Failed)
    }

    pub fn is_established(&self) -> bool {
        matches!(self, SessionState::Accepted | SessionState::Confirmed)
    }

    /// State after observing `event`. Never moves backwards.
    pub fn advance(self, event: &SessionEvent) -> SessionState {
        if self.is_terminal() {
            return self;
        }

        match event {
            SessionEvent::Progress { .. } | SessionEvent::Connecting => match self {
                SessionState::Created => SessionState::Progressing,
                other => other,
            },
            SessionEvent::Accepted { .. } => match self {
                SessionState::Created | SessionState::Progressing => SessionState::Accepted,
                other => other,
            },
            SessionEvent::Confirmed { .. } => SessionState::Confirmed,
            SessionEvent::Failed { .. } => SessionState::Failed,
            SessionEvent::Ended { .. } => SessionState::Ended,
            SessionEvent::Sdp { .. } | SessionEvent::PeerConnectionReady { .. } => self,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "Created",
            SessionState::Progressing => "Progressing",
            SessionState::Accepted => "Accepted",
            SessionState::Confirmed => "Confirmed",
            SessionState::Ended => "Ended",
            SessionState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// Notifications emitted by a call session, in per-session delivery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Provisional response sent or received
    Progress {
        originator: Originator,
        /// Summary of the provisional response, when the peer sent one
        #[serde(default)]
        response: Option<String>,
    },
    /// Outgoing request has been handed to the transport
    Connecting,
    Accepted {
        originator: Originator,
    },
    Confirmed {
        originator: Originator,
    },
    Sdp {
        originator: Originator,
        kind: SdpKind,
    },
    /// The session created its peer connection; tracks may now arrive on it
    PeerConnectionReady {
        peer: PeerConnectionId,
    },
    Failed {
        originator: Originator,
        cause: String,
    },
    Ended {
        originator: Originator,
        cause: String,
    },
}

impl SessionEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Progress { .. } => "progress",
            SessionEvent::Connecting => "connecting",
            SessionEvent::Accepted { .. } => "accepted",
            SessionEvent::Confirmed { .. } => "confirmed",
            SessionEvent::Sdp { .. } => "sdp",
            SessionEvent::PeerConnectionReady { .. } => "peerconnection",
            SessionEvent::Failed { .. } => "failed",
            SessionEvent::Ended { .. } => "ended",
        }
    }
}

/// Media options passed when answering or placing a call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    pub media_constraints: CallMediaConstraints,
    /// Local source to send, if capture has completed
    pub local_source: Option<MediaSource>,
}

/// Handle to one call negotiation owned by the external signaling layer.
///
/// Methods must not block: implementations that need to await the network
/// start the work and report progress through the session's event stream.
pub trait CallSession: Send + Sync + fmt::Debug {
    fn id(&self) -> &SessionId;

    /// Accept an incoming session
    fn answer(&self, options: &CallOptions) -> Result<(), SessionError>;

    /// Terminate the session, whatever its state
    fn terminate(&self) -> Result<(), SessionError>;

    /// Peer connection already created for this session, if any
    fn connection(&self) -> Option<PeerConnectionId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed() -> SessionEvent {
        SessionEvent::Confirmed { originator: Originator::Remote }
    }

    fn accepted() -> SessionEvent {
        SessionEvent::Accepted { originator: Originator::Local }
    }

    #[test]
    fn test_accepted_and_confirmed_in_either_order() {
        let s = SessionState::Created.advance(&accepted()).advance(&confirmed());
        assert_eq!(s, SessionState::Confirmed);

        let s = SessionState::Created.advance(&confirmed()).advance(&accepted());
        assert_eq!(s, SessionState::Confirmed);
    }

    #[test]
    fn test_confirmed_without_accepted() {
        let s = SessionState::Progressing.advance(&confirmed());
        assert_eq!(s, SessionState::Confirmed);
        assert!(s.is_established());
    }

    #[test]
    fn test_terminal_states_absorb() {
        let failed = SessionEvent::Failed { originator: Originator::Remote, cause: "Busy".into() };
        let ended = SessionEvent::Ended { originator: Originator::Remote, cause: "BYE".into() };

        let s = SessionState::Progressing.advance(&failed);
        assert_eq!(s, SessionState::Failed);
        assert_eq!(s.advance(&ended), SessionState::Failed);
        assert_eq!(s.advance(&confirmed()), SessionState::Failed);
    }

    #[test]
    fn test_progress_does_not_regress() {
        let progress = SessionEvent::Progress { originator: Originator::Remote, response: None };
        assert_eq!(SessionState::Accepted.advance(&progress), SessionState::Accepted);
        assert_eq!(SessionState::Created.advance(&SessionEvent::Connecting), SessionState::Progressing);
    }

    #[test]
    fn test_event_serde_shape() {
        let json = r#"{"event":"failed","originator":"remote","cause":"Busy"}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            SessionEvent::Failed { originator: Originator::Remote, cause: "Busy".to_string() }
        );

        let json = r#"{"event":"peer_connection_ready","peer":"pc-1"}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.name(), "peerconnection");
    }
}
