//! Session-arbiter: call-session coordination for a WebRTC SIP endpoint
//!
//! This crate sits between an external signaling client (SIP over
//! WebSocket) and the presentation layer. It decides which of up to two
//! racing call sessions (one incoming, one outgoing) is the authoritative
//! *current* session, keeps the local and remote media sinks bound to the
//! right sources, and tracks the registration lifecycle.
//!
//! ## Layering
//! ```text
//! presentation (StatusSink, MediaRenderer)
//!         ▲
//!   Coordinator ── RegistrationLifecycle
//!         │
//!   SessionArbiter ── MediaBinder
//!         │
//! signaling client / call sessions / capture device (external)
//! ```
//!
//! The signaling protocol, SDP negotiation and media transport are not
//! implemented here; they are consumed through the traits in [`signaling`]
//! and [`session`].

pub mod arbiter;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod media;
pub mod registration;
pub mod session;
pub mod signaling;

pub use arbiter::{
    ArbiterSlots, ArbiterSnapshot, HangUpOutcome, NewSessionOutcome, NotificationOutcome, RejectReason,
    SessionArbiter, SessionSummary, Slot, TrackOutcome,
};
pub use config::{
    ArbiterConfig, AudioCaptureConstraints, CallMediaConstraints, CaptureConstraints, Credentials, SignalingEndpoint,
};
pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorSnapshot};
pub use error::{ArbiterError, ArbiterResult, CaptureError, MediaError, SessionError, SignalingError};
pub use events::{BroadcastStatusSink, CollectingStatusSink, EventPriority, StatusEvent, StatusKind, StatusSink};
pub use media::{MediaBinder, MediaRenderer, MediaSource, NullRenderer, SinkKind};
pub use registration::{RegistrationInfo, RegistrationLifecycle, RegistrationState};
pub use session::{
    CallOptions, CallSession, Originator, PeerConnectionId, SdpKind, SessionEvent, SessionId, SessionRole,
    SessionState,
};
pub use signaling::{CaptureSource, SignalingClient, SignalingEvent};

/// Re-export of common types
pub mod prelude {
    pub use super::{
        ArbiterConfig, ArbiterError, ArbiterResult, BroadcastStatusSink, CallOptions, CallSession, CaptureSource,
        Coordinator, CoordinatorHandle, Credentials, MediaRenderer, MediaSource, NullRenderer, Originator,
        PeerConnectionId, SessionEvent, SessionId, SessionRole, SignalingClient, SignalingEvent, StatusEvent,
        StatusKind, StatusSink,
    };
}

/// Session-arbiter version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
