//! Replay scripts
//!
//! A script is a JSON document listing the notifications the signaling layer
//! would deliver and the commands a user would issue, in order:
//!
//! ```json
//! {
//!   "name": "incoming wins",
//!   "steps": [
//!     { "op": "registered", "status_code": 200, "reason": "OK" },
//!     { "op": "new_session", "session": "s1", "role": "incoming" },
//!     { "op": "session", "session": "s1", "event": "peer_connection_ready", "peer": "p1" },
//!     { "op": "track", "peer": "p1", "source": "remote-audio" },
//!     { "op": "session", "session": "s1", "event": "confirmed", "originator": "remote" },
//!     { "op": "hang_up" }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use rvoip_session_arbiter::{Originator, SessionEvent, SessionRole};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Ask the coordinator to register now
    Register,
    Registered {
        #[serde(default = "default_status_code")]
        status_code: u16,
        #[serde(default = "default_reason")]
        reason: String,
    },
    RegistrationFailed {
        cause: String,
    },
    RegistrationExpiring,
    /// The signaling layer created a session
    NewSession {
        session: String,
        role: SessionRole,
        /// Peer connection the session already owns
        #[serde(default)]
        peer: Option<String>,
    },
    /// One notification from a session
    Session {
        session: String,
        #[serde(flatten)]
        event: SessionEvent,
    },
    Track {
        peer: String,
        source: String,
    },
    NewMessage {
        originator: Originator,
        request: String,
    },
    PlaceCall {
        target: String,
    },
    HangUp,
    /// The signaling layer forgets a session without notifying
    DropSession {
        session: String,
    },
    Snapshot,
    Sleep {
        ms: u64,
    },
}

fn default_status_code() -> u16 {
    200
}

fn default_reason() -> String {
    "OK".to_string()
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid script {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvoip_session_arbiter::PeerConnectionId;

    #[test]
    fn test_parse_mixed_steps() {
        let script = Script::parse(
            r#"{
                "steps": [
                    { "op": "registered" },
                    { "op": "new_session", "session": "s2", "role": "outgoing" },
                    { "op": "session", "session": "s2", "event": "connecting" },
                    { "op": "session", "session": "s2", "event": "peer_connection_ready", "peer": "p2" },
                    { "op": "session", "session": "s2", "event": "ended", "originator": "remote", "cause": "BYE" },
                    { "op": "hang_up" }
                ]
            }"#,
        )
        .unwrap();

        assert!(script.name.is_none());
        assert_eq!(
            script.steps[0],
            Step::Registered { status_code: 200, reason: "OK".to_string() }
        );
        assert_eq!(
            script.steps[2],
            Step::Session { session: "s2".to_string(), event: SessionEvent::Connecting }
        );
        assert_eq!(
            script.steps[3],
            Step::Session {
                session: "s2".to_string(),
                event: SessionEvent::PeerConnectionReady { peer: PeerConnectionId::from("p2") },
            }
        );
        assert_eq!(script.steps[5], Step::HangUp);
    }

    #[test]
    fn test_demo_scripts_parse() {
        for text in [
            include_str!("../../../demos/incoming-wins.json"),
            include_str!("../../../demos/outgoing-call.json"),
        ] {
            let script = Script::parse(text).unwrap();
            assert!(script.name.is_some());
            assert!(!script.steps.is_empty());
        }
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(Script::parse(r#"{ "steps": [ { "op": "transfer" } ] }"#).is_err());
    }
}
