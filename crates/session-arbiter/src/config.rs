//! Arbiter configuration
//!
//! [`ArbiterConfig`] gathers everything the coordinator needs to talk to the
//! signaling server and to negotiate audio: credentials, the WebSocket
//! endpoint, capture constraints for the local device and the media
//! constraints offered when answering or placing calls.
//!
//! # Example
//!
//! ```rust
//! use rvoip_session_arbiter::config::{ArbiterConfig, Credentials};
//!
//! let config = ArbiterConfig::new(
//!     Credentials::new("sip:alice@example.com").with_password("secret"),
//!     "wss://sip.example.com:7443",
//! )
//! .with_register(true);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.outbound_proxy(), "wss://sip.example.com:7443");
//! assert!(config.call_media.audio);
//! assert!(!config.call_media.video);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ArbiterError, ArbiterResult};

/// Identity used to register with the signaling server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Address of record, e.g. `sip:alice@example.com`
    pub uri: String,
    /// Digest password; never logged
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Where and how to reach the signaling server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingEndpoint {
    /// WebSocket URI of the server (`ws://` or `wss://`)
    pub uri: String,
    /// Outbound proxy; the endpoint URI when unset
    #[serde(default)]
    pub outbound_proxy: Option<String>,
    /// Negotiate SIP session timers
    #[serde(default)]
    pub session_timers: bool,
}

/// Audio processing requested from the capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioCaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for AudioCaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Constraints for acquiring the local capture source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub audio: AudioCaptureConstraints,
    pub video: bool,
}

/// Media offered when answering or placing a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallMediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for CallMediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// Top-level configuration for the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterConfig {
    pub credentials: Credentials,
    pub endpoint: SignalingEndpoint,
    /// Register with the server as soon as the coordinator starts
    #[serde(default = "default_true")]
    pub register: bool,
    /// Acquire the local capture source as soon as the coordinator starts
    #[serde(default = "default_true")]
    pub acquire_local_media: bool,
    #[serde(default)]
    pub capture: CaptureConstraints,
    #[serde(default)]
    pub call_media: CallMediaConstraints,
    /// Capacity of the status broadcast channel
    #[serde(default = "default_status_capacity")]
    pub status_channel_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_status_capacity() -> usize {
    64
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self::new(Credentials::default(), "")
    }
}

impl ArbiterConfig {
    pub fn new(credentials: Credentials, endpoint_uri: impl Into<String>) -> Self {
        Self {
            credentials,
            endpoint: SignalingEndpoint {
                uri: endpoint_uri.into(),
                outbound_proxy: None,
                session_timers: false,
            },
            register: true,
            acquire_local_media: true,
            capture: CaptureConstraints::default(),
            call_media: CallMediaConstraints::default(),
            status_channel_capacity: default_status_capacity(),
        }
    }

    pub fn with_register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    pub fn with_outbound_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.endpoint.outbound_proxy = Some(proxy.into());
        self
    }

    pub fn with_session_timers(mut self, enabled: bool) -> Self {
        self.endpoint.session_timers = enabled;
        self
    }

    pub fn with_capture(mut self, capture: CaptureConstraints) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_call_media(mut self, call_media: CallMediaConstraints) -> Self {
        self.call_media = call_media;
        self
    }

    pub fn with_local_media(mut self, acquire: bool) -> Self {
        self.acquire_local_media = acquire;
        self
    }

    /// Effective outbound proxy
    pub fn outbound_proxy(&self) -> &str {
        self.endpoint
            .outbound_proxy
            .as_deref()
            .unwrap_or(&self.endpoint.uri)
    }

    /// Check the configuration before it is used to register or call
    pub fn validate(&self) -> ArbiterResult<()> {
        if self.credentials.uri.trim().is_empty() {
            return Err(ArbiterError::missing_configuration("credentials.uri"));
        }
        if !(self.credentials.uri.starts_with("sip:") || self.credentials.uri.starts_with("sips:")) {
            return Err(ArbiterError::invalid_configuration(
                "credentials.uri",
                format!("expected a sip: or sips: URI, got '{}'", self.credentials.uri),
            ));
        }

        if self.endpoint.uri.trim().is_empty() {
            return Err(ArbiterError::missing_configuration("endpoint.uri"));
        }
        for (field, uri) in [
            ("endpoint.uri", Some(self.endpoint.uri.as_str())),
            ("endpoint.outbound_proxy", self.endpoint.outbound_proxy.as_deref()),
        ] {
            if let Some(uri) = uri {
                if !(uri.starts_with("ws://") || uri.starts_with("wss://")) {
                    return Err(ArbiterError::invalid_configuration(
                        field,
                        format!("expected a ws:// or wss:// URI, got '{}'", uri),
                    ));
                }
            }
        }

        if !self.call_media.audio && !self.call_media.video {
            return Err(ArbiterError::invalid_configuration(
                "call_media",
                "at least one of audio or video must be enabled",
            ));
        }
        if self.status_channel_capacity == 0 {
            return Err(ArbiterError::invalid_configuration(
                "status_channel_capacity",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}
