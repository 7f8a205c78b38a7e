use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use rvoip_session_arbiter::{
    ArbiterConfig, CaptureSource, Coordinator, CoordinatorHandle, CoordinatorSnapshot, MediaSource,
    PeerConnectionId, SessionId, SignalingEvent,
};

use crate::loopback::{LoopbackCapture, LoopbackSession, LoopbackSignaling, TracingRenderer};
use crate::output;
use crate::script::{Script, Step};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    pub deny_capture: bool,
    /// Print snapshots as JSON instead of tables
    pub json: bool,
    /// Print status events as they are published
    pub print_status: bool,
}

#[derive(Debug)]
pub struct ReplaySummary {
    /// State after the last step, before shutdown
    pub snapshot: CoordinatorSnapshot,
    pub placed_calls: Vec<String>,
    pub rejected_commands: usize,
}

/// Sessions the loopback signaling layer still holds
type SessionTable = HashMap<String, Arc<LoopbackSession>>;

pub async fn run(config: ArbiterConfig, script: Script, options: ReplayOptions) -> Result<ReplaySummary> {
    let signaling = Arc::new(LoopbackSignaling::default());
    let capture: Arc<dyn CaptureSource> = Arc::new(LoopbackCapture::new(options.deny_capture));
    let (coordinator, handle, status) =
        Coordinator::with_broadcast(config, signaling.clone(), Some(capture), Arc::new(TracingRenderer))?;

    let mut rx = status.subscribe();
    drop(status);
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if options.print_status {
                        println!("{}", output::status_line(&event));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Status printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    let task = coordinator.spawn();

    info!(
        name = script.name.as_deref().unwrap_or("unnamed"),
        steps = script.steps.len(),
        "Replaying script"
    );

    let mut sessions = SessionTable::new();
    let mut rejected_commands = 0;
    for (index, step) in script.steps.into_iter().enumerate() {
        debug!(index, ?step, "Replay step");
        if !apply(&handle, &mut sessions, step, options).await? {
            rejected_commands += 1;
        }
    }

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await?;
    task.await.context("coordinator task failed")?;
    printer.await.context("status printer failed")?;

    Ok(ReplaySummary {
        snapshot,
        placed_calls: signaling.placed_calls(),
        rejected_commands,
    })
}

/// Returns false when the coordinator rejected a command
async fn apply(
    handle: &CoordinatorHandle,
    sessions: &mut SessionTable,
    step: Step,
    options: ReplayOptions,
) -> Result<bool> {
    match step {
        Step::Register => {
            if let Err(e) = handle.register().await {
                warn!(error = %e, "Register rejected");
                return Ok(false);
            }
        }
        Step::Registered { status_code, reason } => {
            handle.signaling(SignalingEvent::Registered { status_code, reason })?;
        }
        Step::RegistrationFailed { cause } => {
            handle.signaling(SignalingEvent::RegistrationFailed { cause })?;
        }
        Step::RegistrationExpiring => {
            handle.signaling(SignalingEvent::RegistrationExpiring)?;
        }
        Step::NewSession { session, role, peer } => {
            let peer = peer.as_deref().map(PeerConnectionId::from);
            let call = Arc::new(LoopbackSession::new(session.clone(), peer));
            sessions.insert(session, call.clone());
            handle.signaling(SignalingEvent::NewSession { role, session: call })?;
        }
        Step::Session { session, event } => {
            handle.session_event(SessionId::from(session), event)?;
        }
        Step::Track { peer, source } => {
            handle.track_arrived(PeerConnectionId::from(peer.as_str()), MediaSource::new(source))?;
        }
        Step::NewMessage { originator, request } => {
            handle.signaling(SignalingEvent::NewMessage { originator, request })?;
        }
        Step::PlaceCall { target } => {
            if let Err(e) = handle.place_call(target).await {
                warn!(error = %e, "Call rejected");
                return Ok(false);
            }
        }
        Step::HangUp => {
            let outcome = handle.hang_up().await?;
            info!(?outcome, "Hang-up");
        }
        Step::DropSession { session } => {
            if sessions.remove(&session).is_none() {
                warn!(session, "No such session to drop");
            }
        }
        Step::Snapshot => {
            let snapshot = handle.snapshot().await?;
            if options.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", output::snapshot_table(&snapshot));
            }
        }
        Step::Sleep { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvoip_session_arbiter::{Credentials, RegistrationState};

    fn config() -> ArbiterConfig {
        ArbiterConfig::new(Credentials::new("sip:alice@example.com"), "wss://sip.example.com")
            .with_local_media(false)
    }

    #[tokio::test]
    async fn test_replay_incoming_call() {
        let script = Script::parse(
            r#"{ "steps": [
                { "op": "registered" },
                { "op": "new_session", "session": "s1", "role": "incoming", "peer": "p1" },
                { "op": "track", "peer": "p1", "source": "remote-audio" },
                { "op": "session", "session": "s1", "event": "confirmed", "originator": "remote" }
            ] }"#,
        )
        .unwrap();

        let summary = run(config(), script, ReplayOptions::default()).await.unwrap();
        let arbiter = &summary.snapshot.arbiter;
        assert_eq!(summary.snapshot.registration.state, RegistrationState::Registered);
        assert_eq!(arbiter.slots.current(), Some(&SessionId::from("s1")));
        assert_eq!(arbiter.remote_source, Some(MediaSource::new("remote-audio")));
    }

    #[tokio::test]
    async fn test_replay_counts_rejected_calls() {
        let script = Script::parse(
            r#"{ "steps": [
                { "op": "place_call", "target": "sip:bob@example.com" },
                { "op": "new_session", "session": "s2", "role": "outgoing" },
                { "op": "place_call", "target": "sip:carol@example.com" },
                { "op": "place_call", "target": "bob" }
            ] }"#,
        )
        .unwrap();

        let summary = run(config(), script, ReplayOptions::default()).await.unwrap();
        assert_eq!(summary.placed_calls, vec!["sip:bob@example.com"]);
        assert_eq!(summary.rejected_commands, 2);
    }

    #[tokio::test]
    async fn test_dropped_session_reported_as_gone() {
        let script = Script::parse(
            r#"{ "steps": [
                { "op": "new_session", "session": "s1", "role": "incoming" },
                { "op": "session", "session": "s1", "event": "accepted", "originator": "remote" },
                { "op": "drop_session", "session": "s1" },
                { "op": "hang_up" }
            ] }"#,
        )
        .unwrap();

        let summary = run(config(), script, ReplayOptions::default()).await.unwrap();
        assert!(summary.snapshot.arbiter.slots.current().is_none());
        assert!(!summary.snapshot.arbiter.sessions[0].alive);
    }
}
