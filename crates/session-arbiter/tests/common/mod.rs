#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use rvoip_session_arbiter::{
    ArbiterConfig, CallOptions, CallSession, CaptureConstraints, CaptureError, CaptureSource, Credentials,
    MediaError, MediaRenderer, MediaSource, PeerConnectionId, SessionError, SessionId, SignalingClient,
    SignalingError, SinkKind, StatusEvent, StatusKind, SignalingEndpoint,
};

pub fn test_config() -> ArbiterConfig {
    ArbiterConfig::new(
        Credentials::new("sip:alice@example.com").with_password("secret"),
        "wss://sip.example.com:7443",
    )
}

/// Signaling client that records what it was asked to do
#[derive(Default)]
pub struct MockSignaling {
    pub registrations: Mutex<Vec<(Credentials, SignalingEndpoint)>>,
    pub calls: Mutex<Vec<(String, CallOptions)>>,
    pub stops: Mutex<usize>,
    pub fail_register: Mutex<Option<String>>,
}

impl MockSignaling {
    pub fn failing_register(reason: &str) -> Self {
        Self {
            fail_register: Mutex::new(Some(reason.to_string())),
            ..Default::default()
        }
    }

    pub fn stop_count(&self) -> usize {
        *self.stops.lock()
    }
}

impl SignalingClient for MockSignaling {
    fn register(&self, credentials: &Credentials, endpoint: &SignalingEndpoint) -> Result<(), SignalingError> {
        if let Some(reason) = self.fail_register.lock().clone() {
            return Err(SignalingError::Unavailable { reason });
        }
        self.registrations
            .lock()
            .push((credentials.clone(), endpoint.clone()));
        Ok(())
    }

    fn call(&self, target: &str, options: &CallOptions) -> Result<(), SignalingError> {
        self.calls.lock().push((target.to_string(), options.clone()));
        Ok(())
    }

    fn stop(&self) {
        *self.stops.lock() += 1;
    }
}

#[derive(Debug, Default)]
pub struct MockSession {
    pub id: SessionId,
    pub answers: Mutex<Vec<CallOptions>>,
    pub terminates: Mutex<usize>,
    pub peer: Option<PeerConnectionId>,
}

impl MockSession {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::from(id),
            ..Default::default()
        })
    }

    pub fn terminate_count(&self) -> usize {
        *self.terminates.lock()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.lock().len()
    }
}

impl CallSession for MockSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn answer(&self, options: &CallOptions) -> Result<(), SessionError> {
        self.answers.lock().push(options.clone());
        Ok(())
    }

    fn terminate(&self) -> Result<(), SessionError> {
        *self.terminates.lock() += 1;
        Ok(())
    }

    fn connection(&self) -> Option<PeerConnectionId> {
        self.peer.clone()
    }
}

/// Capture device returning a fixed result
pub struct MockCapture {
    result: Result<MediaSource, CaptureError>,
    pub requests: Mutex<Vec<CaptureConstraints>>,
}

impl MockCapture {
    pub fn granting(id: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(MediaSource::new(id).with_label("microphone")),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            result: Err(CaptureError::PermissionDenied),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CaptureSource for MockCapture {
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<MediaSource, CaptureError> {
        self.requests.lock().push(constraints.clone());
        self.result.clone()
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub log: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn releases(&self, sink: SinkKind) -> usize {
        let needle = format!("release {}", sink);
        self.log.lock().iter().filter(|l| **l == needle).count()
    }
}

impl MediaRenderer for RecordingRenderer {
    fn render(&self, sink: SinkKind, source: &MediaSource) -> Result<(), MediaError> {
        self.log.lock().push(format!("render {} {}", sink, source.id));
        Ok(())
    }

    fn release(&self, sink: SinkKind) {
        self.log.lock().push(format!("release {}", sink));
    }
}

/// Wait for the first status event matching `pred`
pub async fn wait_for_status(
    rx: &mut broadcast::Receiver<StatusEvent>,
    pred: impl Fn(&StatusKind) -> bool,
) -> StatusEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event.kind) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("status channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for status event")
}

/// Route library logs to the test harness; later calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rvoip_session_arbiter=debug")
        .with_test_writer()
        .try_init();
}
