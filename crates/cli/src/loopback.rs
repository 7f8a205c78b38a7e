//! In-process collaborators used when replaying a script
//!
//! Nothing here touches the network or an audio device; every call is logged
//! so a replay shows what a real signaling client would have been asked.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use rvoip_session_arbiter::{
    CallOptions, CallSession, CaptureConstraints, CaptureError, CaptureSource, Credentials, MediaError,
    MediaRenderer, MediaSource, PeerConnectionId, SessionError, SessionId, SignalingClient, SignalingEndpoint,
    SignalingError, SinkKind,
};

#[derive(Default)]
pub struct LoopbackSignaling {
    calls: Mutex<Vec<String>>,
}

impl LoopbackSignaling {
    pub fn placed_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl SignalingClient for LoopbackSignaling {
    fn register(&self, credentials: &Credentials, endpoint: &SignalingEndpoint) -> Result<(), SignalingError> {
        info!(uri = %credentials.uri, endpoint = %endpoint.uri, "loopback: REGISTER");
        Ok(())
    }

    fn call(&self, target: &str, options: &CallOptions) -> Result<(), SignalingError> {
        if !target.starts_with("sip:") && !target.starts_with("sips:") {
            return Err(SignalingError::InvalidTarget { target: target.to_string() });
        }
        info!(
            target,
            audio = options.media_constraints.audio,
            video = options.media_constraints.video,
            local_source = ?options.local_source.as_ref().map(|s| s.id.as_str()),
            "loopback: INVITE"
        );
        self.calls.lock().push(target.to_string());
        Ok(())
    }

    fn stop(&self) {
        info!("loopback: signaling stopped");
    }
}

#[derive(Debug)]
pub struct LoopbackSession {
    id: SessionId,
    peer: Option<PeerConnectionId>,
}

impl LoopbackSession {
    pub fn new(id: impl Into<SessionId>, peer: Option<PeerConnectionId>) -> Self {
        Self { id: id.into(), peer }
    }
}

impl CallSession for LoopbackSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn answer(&self, options: &CallOptions) -> Result<(), SessionError> {
        info!(session_id = %self.id, with_local_source = options.local_source.is_some(), "loopback: answer");
        Ok(())
    }

    fn terminate(&self) -> Result<(), SessionError> {
        info!(session_id = %self.id, "loopback: terminate");
        Ok(())
    }

    fn connection(&self) -> Option<PeerConnectionId> {
        self.peer.clone()
    }
}

/// Capture device that grants a fixed source or is denied
pub struct LoopbackCapture {
    deny: bool,
}

impl LoopbackCapture {
    pub fn new(deny: bool) -> Self {
        Self { deny }
    }
}

#[async_trait]
impl CaptureSource for LoopbackCapture {
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<MediaSource, CaptureError> {
        if self.deny {
            warn!("loopback: capture denied");
            return Err(CaptureError::PermissionDenied);
        }
        info!(
            echo_cancellation = constraints.audio.echo_cancellation,
            noise_suppression = constraints.audio.noise_suppression,
            "loopback: capture granted"
        );
        Ok(MediaSource::new("loopback-mic").with_label("Loopback microphone"))
    }
}

/// Renderer that logs instead of playing
pub struct TracingRenderer;

impl MediaRenderer for TracingRenderer {
    fn render(&self, sink: SinkKind, source: &MediaSource) -> Result<(), MediaError> {
        info!(%sink, source = %source, "loopback: play");
        Ok(())
    }

    fn release(&self, sink: SinkKind) {
        info!(%sink, "loopback: pause");
    }
}
