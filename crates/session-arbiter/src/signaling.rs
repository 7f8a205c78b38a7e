//! Boundary with the signaling client and the capture device
//!
//! The signaling protocol itself lives outside this crate. It is consumed
//! through [`SignalingClient`] and reports back with [`SignalingEvent`]s posted
//! to the coordinator. Local capture acquisition is consumed through
//! [`CaptureSource`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CaptureConstraints, Credentials, SignalingEndpoint};
use crate::error::{CaptureError, SignalingError};
use crate::media::MediaSource;
use crate::session::{CallOptions, CallSession, Originator, SessionRole};

/// Client of the signaling server.
///
/// Methods start work and return immediately; results come back as
/// [`SignalingEvent`]s.
pub trait SignalingClient: Send + Sync {
    /// Start the client and register `credentials` through `endpoint`
    fn register(&self, credentials: &Credentials, endpoint: &SignalingEndpoint) -> Result<(), SignalingError>;

    /// Start an outgoing call. The session arrives later as
    /// `NewSession { role: Outgoing, .. }`.
    fn call(&self, target: &str, options: &CallOptions) -> Result<(), SignalingError>;

    /// Unregister and close the transport
    fn stop(&self);
}

/// Notifications emitted by the signaling client
#[derive(Clone)]
pub enum SignalingEvent {
    Registered {
        status_code: u16,
        reason: String,
    },
    RegistrationFailed {
        cause: String,
    },
    RegistrationExpiring,
    /// A session was created locally or by a remote INVITE
    NewSession {
        role: SessionRole,
        session: Arc<dyn CallSession>,
    },
    /// Out-of-dialog MESSAGE sent or received
    NewMessage {
        originator: Originator,
        request: String,
    },
}

impl fmt::Debug for SignalingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalingEvent::Registered { status_code, reason } => f
                .debug_struct("Registered")
                .field("status_code", status_code)
                .field("reason", reason)
                .finish(),
            SignalingEvent::RegistrationFailed { cause } => {
                f.debug_struct("RegistrationFailed").field("cause", cause).finish()
            }
            SignalingEvent::RegistrationExpiring => write!(f, "RegistrationExpiring"),
            SignalingEvent::NewSession { role, session } => f
                .debug_struct("NewSession")
                .field("role", role)
                .field("session_id", session.id())
                .finish(),
            SignalingEvent::NewMessage { originator, request } => f
                .debug_struct("NewMessage")
                .field("originator", originator)
                .field("request", request)
                .finish(),
        }
    }
}

/// One-shot acquisition of the local capture source
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<MediaSource, CaptureError>;
}
