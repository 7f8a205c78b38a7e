//! Registration lifecycle
//!
//! Tracks the state of our registration with the signaling server, as reported
//! by the signaling client. Every transition yields a [`StatusEvent`] for the
//! presentation layer and has no effect on calls.
//!
//! # State Transitions
//!
//! ```text
//!                 register()           registered
//! Unregistered ──────────────► Registering ─────────► Registered
//!                                   │                   │    ▲
//!                  registrationFailed│   expiring        ▼    │ registered
//!                                   ▼                Expiring ┘
//!                                Failed ──── registered ────► Registered
//! ```
//!
//! `Failed` and `Expiring` are not terminal. Retrying is the signaling
//! client's business; this module only records what it reports.
//!
//! ```rust
//! use rvoip_session_arbiter::registration::{RegistrationLifecycle, RegistrationState};
//!
//! let mut lifecycle = RegistrationLifecycle::new();
//! lifecycle.on_registration_failed("408 Request Timeout");
//! assert_eq!(lifecycle.state(), RegistrationState::Failed);
//!
//! let event = lifecycle.on_registered(200, "OK");
//! assert_eq!(lifecycle.state(), RegistrationState::Registered);
//! assert_eq!(event.message, "registered: 200 OK");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{StatusEvent, StatusKind};

/// Current state of the registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationState {
    Unregistered,
    /// REGISTER sent, no final response yet
    Registering,
    Registered,
    /// Registered, but the binding is about to expire
    Expiring,
    /// Last attempt was rejected or timed out
    Failed,
}

impl RegistrationState {
    /// Whether the server currently holds a binding for us
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationState::Registered | RegistrationState::Expiring)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::Unregistered => write!(f, "Unregistered"),
            RegistrationState::Registering => write!(f, "Registering"),
            RegistrationState::Registered => write!(f, "Registered"),
            RegistrationState::Expiring => write!(f, "Expiring"),
            RegistrationState::Failed => write!(f, "Failed"),
        }
    }
}

/// Registration details kept alongside the state
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationInfo {
    /// Identifier of this lifecycle, stable across re-registrations
    pub id: Uuid,
    pub state: RegistrationState,
    /// Status code of the last successful REGISTER
    pub status_code: Option<u16>,
    /// Reason phrase of the last successful REGISTER
    pub reason: Option<String>,
    /// Cause of the last failure
    pub last_failure: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Registration state machine driven by signaling client notifications
#[derive(Debug, Clone)]
pub struct RegistrationLifecycle {
    info: RegistrationInfo,
}

impl Default for RegistrationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationLifecycle {
    pub fn new() -> Self {
        Self {
            info: RegistrationInfo {
                id: Uuid::new_v4(),
                state: RegistrationState::Unregistered,
                status_code: None,
                reason: None,
                last_failure: None,
                registered_at: None,
                updated_at: Utc::now(),
            },
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.info.state
    }

    pub fn info(&self) -> &RegistrationInfo {
        &self.info
    }

    /// A REGISTER is about to be sent on our behalf
    pub fn on_register_requested(&mut self) -> StatusEvent {
        self.transition(RegistrationState::Registering);
        StatusEvent::new(StatusKind::Registering)
    }

    pub fn on_registered(&mut self, status_code: u16, reason: impl Into<String>) -> StatusEvent {
        let reason = reason.into();
        info!(status_code, reason = %reason, "Registered");

        let now = Utc::now();
        self.transition(RegistrationState::Registered);
        self.info.status_code = Some(status_code);
        self.info.reason = Some(reason.clone());
        self.info.registered_at = Some(now);
        self.info.last_failure = None;

        StatusEvent::new(StatusKind::Registered { status_code, reason })
    }

    pub fn on_registration_failed(&mut self, cause: impl Into<String>) -> StatusEvent {
        let cause = cause.into();
        warn!(cause = %cause, "Registration failed");

        self.transition(RegistrationState::Failed);
        self.info.last_failure = Some(cause.clone());

        StatusEvent::new(StatusKind::RegistrationFailed { cause })
    }

    pub fn on_registration_expiring(&mut self) -> StatusEvent {
        warn!("Registration expiring");
        self.transition(RegistrationState::Expiring);
        StatusEvent::new(StatusKind::RegistrationExpiring)
    }

    /// The signaling client stopped and dropped its binding
    pub fn on_unregistered(&mut self) -> StatusEvent {
        self.transition(RegistrationState::Unregistered);
        self.info.registered_at = None;
        StatusEvent::new(StatusKind::Unregistered)
    }

    fn transition(&mut self, next: RegistrationState) {
        let previous = self.info.state;
        self.info.state = next;
        self.info.updated_at = Utc::now();
        if previous != next {
            info!(from = %previous, to = %next, "Registration state changed");
        }
    }
}
