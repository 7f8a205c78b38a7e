//! Single-task event loop around the arbiter
//!
//! Every notification (signaling, per-session, track arrival, capture
//! completion) and every caller command is posted as one
//! [`CoordinatorEvent`] into an unbounded channel drained by one tokio task.
//! That task owns the [`RegistrationLifecycle`] and the [`SessionArbiter`], so
//! neither needs a lock.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use rvoip_session_arbiter::prelude::*;
//! # async fn demo(signaling: Arc<dyn SignalingClient>, config: ArbiterConfig) -> ArbiterResult<()> {
//! let (coordinator, handle, status) =
//!     Coordinator::with_broadcast(config, signaling, None, Arc::new(NullRenderer))?;
//! let mut events = status.subscribe();
//! coordinator.spawn();
//!
//! handle.place_call("sip:bob@example.com").await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::arbiter::{ArbiterSnapshot, HangUpOutcome, SessionArbiter};
use crate::config::ArbiterConfig;
use crate::error::{ArbiterError, ArbiterResult, CaptureError, SignalingError};
use crate::events::{BroadcastStatusSink, StatusSink};
use crate::media::{MediaBinder, MediaRenderer, MediaSource};
use crate::registration::{RegistrationInfo, RegistrationLifecycle, RegistrationState};
use crate::session::{PeerConnectionId, SessionEvent, SessionId, SessionRole};
use crate::signaling::{CaptureSource, SignalingClient, SignalingEvent};

/// Message processed by the coordinator task
#[derive(Debug)]
pub(crate) enum CoordinatorEvent {
    Signaling(SignalingEvent),
    Session {
        session_id: SessionId,
        event: SessionEvent,
    },
    Track {
        peer: PeerConnectionId,
        source: MediaSource,
    },
    LocalMedia(Result<MediaSource, CaptureError>),
    Command(Command),
}

#[derive(Debug)]
pub(crate) enum Command {
    Register {
        reply: oneshot::Sender<ArbiterResult<()>>,
    },
    PlaceCall {
        target: String,
        reply: oneshot::Sender<ArbiterResult<()>>,
    },
    HangUp {
        reply: oneshot::Sender<HangUpOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<CoordinatorSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Registration and arbitration state at one point of the event stream
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub registration: RegistrationInfo,
    pub arbiter: ArbiterSnapshot,
}

/// Owner of the registration lifecycle and the session arbiter
pub struct Coordinator {
    config: ArbiterConfig,
    signaling: Arc<dyn SignalingClient>,
    capture: Option<Arc<dyn CaptureSource>>,
    status: Arc<dyn StatusSink>,
    registration: RegistrationLifecycle,
    arbiter: SessionArbiter,
    tx: mpsc::WeakUnboundedSender<CoordinatorEvent>,
    rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    /// A call was placed and its outgoing session has not been announced yet
    call_pending: Option<String>,
    stopped: bool,
}

impl Coordinator {
    /// Build a coordinator and the handle used to feed it.
    ///
    /// Nothing happens until [`run`](Self::run) or [`spawn`](Self::spawn).
    pub fn new(
        config: ArbiterConfig,
        signaling: Arc<dyn SignalingClient>,
        capture: Option<Arc<dyn CaptureSource>>,
        renderer: Arc<dyn MediaRenderer>,
        status: Arc<dyn StatusSink>,
    ) -> ArbiterResult<(Self, CoordinatorHandle)> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let arbiter = SessionArbiter::new(config.call_media, MediaBinder::new(renderer), status.clone());

        let coordinator = Self {
            config,
            signaling,
            capture,
            status,
            registration: RegistrationLifecycle::new(),
            arbiter,
            tx: tx.downgrade(),
            rx,
            call_pending: None,
            stopped: false,
        };
        Ok((coordinator, CoordinatorHandle { tx }))
    }

    /// Like [`new`](Self::new), publishing status events on a broadcast
    /// channel sized by `status_channel_capacity`
    pub fn with_broadcast(
        config: ArbiterConfig,
        signaling: Arc<dyn SignalingClient>,
        capture: Option<Arc<dyn CaptureSource>>,
        renderer: Arc<dyn MediaRenderer>,
    ) -> ArbiterResult<(Self, CoordinatorHandle, BroadcastStatusSink)> {
        let status = BroadcastStatusSink::new(config.status_channel_capacity);
        let (coordinator, handle) = Self::new(config, signaling, capture, renderer, Arc::new(status.clone()))?;
        Ok((coordinator, handle, status))
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!(
            uri = %self.config.credentials.uri,
            endpoint = %self.config.endpoint.uri,
            "Session coordinator started"
        );
        self.start();

        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        self.teardown();
        info!("Session coordinator stopped");
    }

    fn start(&mut self) {
        if self.config.acquire_local_media {
            self.acquire_local_media();
        }
        if self.config.register {
            if let Err(e) = self.register() {
                warn!(error = %e, "Initial registration failed");
            }
        }
    }

    fn acquire_local_media(&self) {
        let Some(capture) = self.capture.clone() else {
            debug!("No capture source; calls proceed without local media");
            return;
        };
        let Some(tx) = self.tx.upgrade() else {
            return;
        };

        let constraints = self.config.capture.clone();
        tokio::spawn(async move {
            let result = capture.acquire(&constraints).await;
            let _ = tx.send(CoordinatorEvent::LocalMedia(result));
        });
    }

    /// Returns false once the loop should stop
    fn handle_event(&mut self, event: CoordinatorEvent) -> bool {
        match event {
            CoordinatorEvent::Signaling(event) => self.on_signaling(event),
            CoordinatorEvent::Session { session_id, event } => {
                let name = event.name();
                let outcome = self.arbiter.on_session_event(&session_id, event);
                debug!(session_id = %session_id, event = name, ?outcome, "Session notification handled");
            }
            CoordinatorEvent::Track { peer, source } => {
                let outcome = self.arbiter.on_track_arrived(&peer, source);
                debug!(%peer, ?outcome, "Track handled");
            }
            CoordinatorEvent::LocalMedia(result) => {
                self.arbiter.on_local_media(result);
            }
            CoordinatorEvent::Command(command) => return self.on_command(command),
        }
        true
    }

    fn on_signaling(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Registered { status_code, reason } => {
                self.status.publish(self.registration.on_registered(status_code, reason));
            }
            SignalingEvent::RegistrationFailed { cause } => {
                self.status.publish(self.registration.on_registration_failed(cause));
            }
            SignalingEvent::RegistrationExpiring => {
                self.status.publish(self.registration.on_registration_expiring());
            }
            SignalingEvent::NewSession { role, session } => {
                if role == SessionRole::Outgoing {
                    self.call_pending = None;
                }
                let session_id = session.id().clone();
                let outcome = self.arbiter.on_new_session(role, session);
                debug!(session_id = %session_id, %role, ?outcome, "New session handled");
            }
            SignalingEvent::NewMessage { originator, request } => {
                debug!(?originator, request = %request, "New message");
            }
        }
    }

    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Register { reply } => {
                let _ = reply.send(self.register());
            }
            Command::PlaceCall { target, reply } => {
                let _ = reply.send(self.place_call(&target));
            }
            Command::HangUp { reply } => {
                let _ = reply.send(self.arbiter.hang_up());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn register(&mut self) -> ArbiterResult<()> {
        self.config.validate()?;

        self.status.publish(self.registration.on_register_requested());
        debug!(
            uri = %self.config.credentials.uri,
            outbound_proxy = %self.config.outbound_proxy(),
            session_timers = self.config.endpoint.session_timers,
            "Sending registration"
        );

        if let Err(e) = self
            .signaling
            .register(&self.config.credentials, &self.config.endpoint)
        {
            let cause = e.to_string();
            self.status.publish(self.registration.on_registration_failed(cause.clone()));
            return Err(ArbiterError::registration_failed(cause));
        }
        Ok(())
    }

    fn place_call(&mut self, target: &str) -> ArbiterResult<()> {
        let target = target.trim();
        if target.is_empty() {
            return Err(SignalingError::InvalidTarget {
                target: target.to_string(),
            }
            .into());
        }
        if let Some(pending) = self.arbiter.slots().candidate(SessionRole::Outgoing) {
            warn!(target, pending = %pending, "Refusing to place a call while another is pending");
            return Err(ArbiterError::call_setup_failed(format!(
                "outgoing session {} is still pending",
                pending
            )));
        }
        if let Some(pending) = &self.call_pending {
            warn!(target, pending = %pending, "Refusing to place a call before the previous one was announced");
            return Err(ArbiterError::call_setup_failed(format!(
                "call to {} has not produced a session yet",
                pending
            )));
        }

        let options = self.arbiter.call_options();
        self.signaling.call(target, &options)?;
        self.call_pending = Some(target.to_string());
        info!(target, with_local_source = options.local_source.is_some(), "Placing outgoing call");
        Ok(())
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            registration: self.registration.info().clone(),
            arbiter: self.arbiter.snapshot(),
        }
    }

    fn teardown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let outcome = self.arbiter.shutdown();
        debug!(?outcome, "Released current session");

        self.signaling.stop();
        if self.registration.state() != RegistrationState::Unregistered {
            self.status.publish(self.registration.on_unregistered());
        }
    }
}

/// Cloneable entry point into a running [`Coordinator`]
///
/// Notification methods only enqueue and return immediately. Command methods
/// wait for the coordinator's reply. Everything fails with
/// [`ArbiterError::CoordinatorClosed`] once the loop has stopped.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub fn signaling(&self, event: SignalingEvent) -> ArbiterResult<()> {
        self.post(CoordinatorEvent::Signaling(event))
    }

    pub fn session_event(&self, session_id: SessionId, event: SessionEvent) -> ArbiterResult<()> {
        self.post(CoordinatorEvent::Session { session_id, event })
    }

    pub fn track_arrived(&self, peer: PeerConnectionId, source: MediaSource) -> ArbiterResult<()> {
        self.post(CoordinatorEvent::Track { peer, source })
    }

    pub async fn register(&self) -> ArbiterResult<()> {
        self.request(|reply| Command::Register { reply }).await?
    }

    pub async fn place_call(&self, target: impl Into<String>) -> ArbiterResult<()> {
        let target = target.into();
        self.request(|reply| Command::PlaceCall { target, reply }).await?
    }

    pub async fn hang_up(&self) -> ArbiterResult<HangUpOutcome> {
        self.request(|reply| Command::HangUp { reply }).await
    }

    pub async fn snapshot(&self) -> ArbiterResult<CoordinatorSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Hang up, stop the signaling client and end the loop
    pub async fn shutdown(&self) -> ArbiterResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn post(&self, event: CoordinatorEvent) -> ArbiterResult<()> {
        self.tx.send(event).map_err(|_| ArbiterError::CoordinatorClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> ArbiterResult<T> {
        let (reply, rx) = oneshot::channel();
        self.post(CoordinatorEvent::Command(command(reply)))?;
        rx.await.map_err(|_| ArbiterError::CoordinatorClosed)
    }
}
