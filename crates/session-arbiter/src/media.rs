//! Media binding
//!
//! The [`MediaBinder`] owns the two named sinks (local preview and remote
//! playback) and keeps at most one source attached to each. It never produces
//! media on its own: local sources come from capture acquisition, remote
//! sources from track-arrival notifications.
//!
//! Actually playing or previewing a source is the job of the presentation
//! layer, reached through the [`MediaRenderer`] trait.
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_session_arbiter::media::{MediaBinder, MediaSource, NullRenderer, SinkKind};
//!
//! let mut binder = MediaBinder::new(Arc::new(NullRenderer));
//! binder.attach_remote(MediaSource::new("stream-1")).unwrap();
//! assert_eq!(binder.source(SinkKind::Remote).map(|s| s.id.as_str()), Some("stream-1"));
//!
//! assert!(binder.detach_remote());
//! assert!(!binder.detach_remote()); // already empty
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::MediaError;

/// Opaque reference to a media stream produced by capture or by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSource {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl MediaSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.id, label),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Named media destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Local preview of the capture source
    Local,
    /// Playback of the peer's audio
    Remote,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Local => write!(f, "local"),
            SinkKind::Remote => write!(f, "remote"),
        }
    }
}

/// Presentation-side output for a sink
pub trait MediaRenderer: Send + Sync {
    /// Start presenting `source` on `sink`
    fn render(&self, sink: SinkKind, source: &MediaSource) -> Result<(), MediaError>;

    /// Stop presenting whatever `sink` shows
    fn release(&self, sink: SinkKind);
}

/// Renderer for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl MediaRenderer for NullRenderer {
    fn render(&self, _sink: SinkKind, _source: &MediaSource) -> Result<(), MediaError> {
        Ok(())
    }

    fn release(&self, _sink: SinkKind) {}
}

/// One sink and the source currently attached to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaBinding {
    pub sink: SinkKind,
    pub source: Option<MediaSource>,
    pub attached_at: Option<DateTime<Utc>>,
}

impl MediaBinding {
    fn new(sink: SinkKind) -> Self {
        Self {
            sink,
            source: None,
            attached_at: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }
}

/// Keeps the local and remote sinks bound to at most one source each
pub struct MediaBinder {
    renderer: Arc<dyn MediaRenderer>,
    local: MediaBinding,
    remote: MediaBinding,
}

impl fmt::Debug for MediaBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBinder")
            .field("renderer", &"<renderer>")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish()
    }
}

impl MediaBinder {
    pub fn new(renderer: Arc<dyn MediaRenderer>) -> Self {
        Self {
            renderer,
            local: MediaBinding::new(SinkKind::Local),
            remote: MediaBinding::new(SinkKind::Remote),
        }
    }

    pub fn attach_local(&mut self, source: MediaSource) -> Result<(), MediaError> {
        self.attach(SinkKind::Local, source)
    }

    pub fn attach_remote(&mut self, source: MediaSource) -> Result<(), MediaError> {
        self.attach(SinkKind::Remote, source)
    }

    pub fn detach_local(&mut self) -> bool {
        self.detach(SinkKind::Local)
    }

    pub fn detach_remote(&mut self) -> bool {
        self.detach(SinkKind::Remote)
    }

    /// Attach `source` to `sink`, detaching any previous source first.
    ///
    /// On a render failure the sink is left unattached.
    pub fn attach(&mut self, sink: SinkKind, source: MediaSource) -> Result<(), MediaError> {
        if self.binding(sink).source.as_ref() == Some(&source) {
            debug!(%sink, source = %source, "Source already attached");
            return Ok(());
        }

        self.detach(sink);

        if let Err(e) = self.renderer.render(sink, &source) {
            warn!(%sink, source = %source, error = %e, "Failed to attach media source");
            return Err(e);
        }

        info!(%sink, source = %source, "Attached media source");
        let binding = self.binding_mut(sink);
        binding.source = Some(source);
        binding.attached_at = Some(Utc::now());
        Ok(())
    }

    /// Detach whatever `sink` holds. Returns false if it was already empty.
    pub fn detach(&mut self, sink: SinkKind) -> bool {
        let binding = self.binding_mut(sink);
        let Some(previous) = binding.source.take() else {
            return false;
        };
        binding.attached_at = None;

        self.renderer.release(sink);
        info!(%sink, source = %previous, "Detached media source");
        true
    }

    pub fn source(&self, sink: SinkKind) -> Option<&MediaSource> {
        self.binding(sink).source.as_ref()
    }

    pub fn local_source(&self) -> Option<&MediaSource> {
        self.source(SinkKind::Local)
    }

    pub fn remote_source(&self) -> Option<&MediaSource> {
        self.source(SinkKind::Remote)
    }

    pub fn binding(&self, sink: SinkKind) -> &MediaBinding {
        match sink {
            SinkKind::Local => &self.local,
            SinkKind::Remote => &self.remote,
        }
    }

    fn binding_mut(&mut self, sink: SinkKind) -> &mut MediaBinding {
        match sink {
            SinkKind::Local => &mut self.local,
            SinkKind::Remote => &mut self.remote,
        }
    }
}
