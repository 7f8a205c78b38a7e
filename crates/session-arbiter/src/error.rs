//! Error types for the session arbiter
//!
//! Notification handlers on [`SessionArbiter`](crate::arbiter::SessionArbiter)
//! never return errors: they report what happened through outcome values. The
//! types in this module describe failures of the *collaborators* the arbiter
//! drives (signaling client, call sessions, media renderer, capture device)
//! and of caller-issued commands on the coordinator.
//!
//! # Error Categories
//!
//! - **Registration Errors** - the registrar refused us or the transport failed
//! - **Call Errors** - a call could not be placed, answered or terminated
//! - **Media Errors** - a sink could not render a source, capture failed
//! - **Configuration Errors** - invalid settings, fix the config and retry
//! - **Runtime Errors** - the coordinator loop is gone
//!
//! # Example
//!
//! ```rust
//! use rvoip_session_arbiter::ArbiterError;
//!
//! let err = ArbiterError::invalid_configuration("credentials.uri", "must start with sip:");
//! assert_eq!(err.category(), "configuration");
//! assert!(!err.is_recoverable());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::SinkKind;
use crate::session::SessionId;

/// Result type alias for arbiter operations
pub type ArbiterResult<T> = Result<T, ArbiterError>;

/// Crate-wide error type
#[derive(Error, Debug, Clone)]
pub enum ArbiterError {
    #[error("Registration failed: {reason}")]
    RegistrationFailed { reason: String },

    #[error("Call setup failed: {reason}")]
    CallSetupFailed { reason: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Coordinator is not running")]
    CoordinatorClosed,
}

impl ArbiterError {
    /// Create a registration failed error
    pub fn registration_failed(reason: impl Into<String>) -> Self {
        Self::RegistrationFailed { reason: reason.into() }
    }

    /// Create a call setup failed error
    pub fn call_setup_failed(reason: impl Into<String>) -> Self {
        Self::CallSetupFailed { reason: reason.into() }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing configuration error
    pub fn missing_configuration(field: impl Into<String>) -> Self {
        Self::MissingConfiguration { field: field.into() }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ArbiterError::RegistrationFailed { .. } | ArbiterError::CallSetupFailed { .. } => true,
            ArbiterError::Signaling(e) => matches!(e, SignalingError::Unavailable { .. }),
            ArbiterError::Capture(e) => !matches!(e, CaptureError::PermissionDenied),
            ArbiterError::InvalidConfiguration { .. }
            | ArbiterError::MissingConfiguration { .. }
            | ArbiterError::CoordinatorClosed => false,
            _ => false,
        }
    }

    /// Error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            ArbiterError::RegistrationFailed { .. } => "registration",
            ArbiterError::CallSetupFailed { .. } | ArbiterError::Session(_) => "call",
            ArbiterError::Signaling(_) => "signaling",
            ArbiterError::Media(_) | ArbiterError::Capture(_) => "media",
            ArbiterError::InvalidConfiguration { .. }
            | ArbiterError::MissingConfiguration { .. } => "configuration",
            ArbiterError::CoordinatorClosed => "runtime",
        }
    }
}

/// Failures reported by the signaling client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    #[error("Signaling transport unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Invalid call target: {target}")]
    InvalidTarget { target: String },
}

/// Failures of an operation issued against a call session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session {session_id}: {operation} failed: {reason}")]
    OperationFailed {
        session_id: SessionId,
        operation: &'static str,
        reason: String,
    },

    /// The external layer already dropped the session object
    #[error("Session {session_id} is no longer alive")]
    Gone { session_id: SessionId },
}

impl SessionError {
    pub fn answer_failed(session_id: SessionId, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            session_id,
            operation: "answer",
            reason: reason.into(),
        }
    }

    pub fn terminate_failed(session_id: SessionId, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            session_id,
            operation: "terminate",
            reason: reason.into(),
        }
    }
}

/// Failures of the presentation-side media renderer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Failed to render {sink} sink: {reason}")]
    RenderFailed { sink: SinkKind, reason: String },
}

impl MediaError {
    /// Renderer-supplied reason, without the sink prefix
    pub fn reason(&self) -> &str {
        match self {
            MediaError::RenderFailed { reason, .. } => reason,
        }
    }
}

/// Failures of local capture acquisition
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureError {
    #[error("Permission to capture audio was denied")]
    PermissionDenied,

    #[error("No capture device found")]
    DeviceNotFound,

    #[error("Capture failed: {reason}")]
    Failed { reason: String },
}
