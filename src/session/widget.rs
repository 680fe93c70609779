//! External RTC widget seam.
//!
//! The widget is a black box: it is built for one room and display name,
//! emits lifecycle events through subscriptions, and accepts fire-and-forget
//! commands. Every event it delivers is tagged with the `HandleId` of the
//! handle that produced it, so a session can tell live events from late ones.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Toolbar controls enabled in the embedded widget.
pub const TOOLBAR_BUTTONS: &[&str] = &[
    "microphone",
    "camera",
    "desktop",
    "fullscreen",
    "fodeviceselection",
    "hangup",
    "chat",
    "settings",
    "raisehand",
    "videoquality",
    "filmstrip",
    "tileview",
];

/// Toolbar auto-hide timeout once the call is running.
pub const TOOLBAR_TIMEOUT_MS: u64 = 4000;

/// Toolbar auto-hide timeout right after joining.
pub const INITIAL_TOOLBAR_TIMEOUT_MS: u64 = 20000;

/// Cap on lines retained by a `Surface`.
const MAX_SURFACE_LINES: usize = 200;

/// Identity of one widget handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First uuid group is enough to tell handles apart in logs.
        let s = self.0.to_string();
        f.write_str(s.split('-').next().unwrap_or(&s))
    }
}

/// Event kinds a widget can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ReadyToClose,
    ParticipantJoined,
    ParticipantLeft,
    AudioMuteStatusChanged,
    VideoMuteStatusChanged,
    ConferenceJoined,
    ConferenceLeft,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::ReadyToClose,
        EventKind::ParticipantJoined,
        EventKind::ParticipantLeft,
        EventKind::AudioMuteStatusChanged,
        EventKind::VideoMuteStatusChanged,
        EventKind::ConferenceJoined,
        EventKind::ConferenceLeft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ReadyToClose => "ready-to-close",
            EventKind::ParticipantJoined => "participant-joined",
            EventKind::ParticipantLeft => "participant-left",
            EventKind::AudioMuteStatusChanged => "audio-mute-status-changed",
            EventKind::VideoMuteStatusChanged => "video-mute-status-changed",
            EventKind::ConferenceJoined => "conference-joined",
            EventKind::ConferenceLeft => "conference-left",
        }
    }
}

/// Event emitted by the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    ReadyToClose,
    ParticipantJoined { id: String },
    ParticipantLeft { id: String },
    AudioMuteStatusChanged { muted: bool },
    VideoMuteStatusChanged { muted: bool },
    ConferenceJoined,
    ConferenceLeft,
}

impl WidgetEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WidgetEvent::ReadyToClose => EventKind::ReadyToClose,
            WidgetEvent::ParticipantJoined { .. } => EventKind::ParticipantJoined,
            WidgetEvent::ParticipantLeft { .. } => EventKind::ParticipantLeft,
            WidgetEvent::AudioMuteStatusChanged { .. } => EventKind::AudioMuteStatusChanged,
            WidgetEvent::VideoMuteStatusChanged { .. } => EventKind::VideoMuteStatusChanged,
            WidgetEvent::ConferenceJoined => EventKind::ConferenceJoined,
            WidgetEvent::ConferenceLeft => EventKind::ConferenceLeft,
        }
    }
}

/// Command sent to the widget. No reply is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetCommand {
    ToggleAudio,
    ToggleVideo,
    Hangup,
}

impl WidgetCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetCommand::ToggleAudio => "toggle-audio",
            WidgetCommand::ToggleVideo => "toggle-video",
            WidgetCommand::Hangup => "hangup",
        }
    }
}

/// An event tagged with the handle that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetMessage {
    pub handle: HandleId,
    pub event: WidgetEvent,
}

pub type MessageSender = mpsc::UnboundedSender<WidgetMessage>;
pub type MessageReceiver = mpsc::UnboundedReceiver<WidgetMessage>;

/// Where a widget delivers events for one handle.
#[derive(Clone)]
pub struct EventSink {
    handle: HandleId,
    tx: MessageSender,
}

impl EventSink {
    pub fn new(handle: HandleId, tx: MessageSender) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Deliver an event. Returns false if the receiving side is gone.
    pub fn deliver(&self, event: WidgetEvent) -> bool {
        self.tx
            .send(WidgetMessage {
                handle: self.handle,
                event,
            })
            .is_ok()
    }
}

/// A cancellable registration for one event kind.
///
/// Cancelling is synchronous: once `cancel` returns, the widget will not
/// deliver through this registration again.
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

struct Listener {
    kind: EventKind,
    active: Arc<AtomicBool>,
    sink: EventSink,
}

/// Widget-side listener registry.
///
/// Clones share the same registry, so a widget can hand a clone to its
/// background tasks.
#[derive(Clone, Default)]
pub struct ListenerSet {
    inner: Arc<Mutex<Vec<Listener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EventKind, sink: EventSink) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(Listener {
            kind,
            active: Arc::clone(&active),
            sink,
        });
        Subscription { kind, active }
    }

    /// Fan an event out to every active listener of its kind.
    ///
    /// Cancelled listeners are pruned. Returns the number of deliveries.
    pub fn emit(&self, event: &WidgetEvent) -> usize {
        let kind = event.kind();
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.retain(|l| l.active.load(Ordering::SeqCst));

        let mut delivered = 0;
        for listener in guard.iter().filter(|l| l.kind == kind) {
            if listener.sink.deliver(event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Cancel and drop every listener.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for listener in guard.iter() {
            listener.active.store(false, Ordering::SeqCst);
        }
        guard.clear();
    }

    pub fn active_count(&self) -> usize {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .iter()
            .filter(|l| l.active.load(Ordering::SeqCst))
            .count()
    }
}

/// Rendering surface lent to a widget for the lifetime of its handle.
///
/// The widget writes into it; the host reads snapshots; the session clears it
/// when it reclaims the surface on disposal.
#[derive(Clone, Default)]
pub struct Surface {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_line(&self, line: impl Into<String>) {
        let mut guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        while guard.len() >= MAX_SURFACE_LINES {
            guard.pop_front();
        }
        guard.push_back(line.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        let guard = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        guard.iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

/// Fixed construction config. Nothing here is derived from domain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub toolbar_buttons: Vec<String>,
    pub start_with_audio_muted: bool,
    pub start_with_video_muted: bool,
    pub show_watermark: bool,
    pub show_brand_watermark: bool,
    pub show_watermark_for_guests: bool,
    pub toolbar_timeout_ms: u64,
    pub initial_toolbar_timeout_ms: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            toolbar_buttons: TOOLBAR_BUTTONS.iter().map(|s| s.to_string()).collect(),
            start_with_audio_muted: false,
            start_with_video_muted: false,
            show_watermark: false,
            show_brand_watermark: false,
            show_watermark_for_guests: false,
            toolbar_timeout_ms: TOOLBAR_TIMEOUT_MS,
            initial_toolbar_timeout_ms: INITIAL_TOOLBAR_TIMEOUT_MS,
        }
    }
}

/// Everything a factory needs to build one handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetParams {
    pub room_name: String,
    pub display_name: String,
    pub config: WidgetConfig,
}

impl WidgetParams {
    pub fn new(room_name: &str, display_name: &str) -> Self {
        Self {
            room_name: room_name.to_string(),
            display_name: display_name.to_string(),
            config: WidgetConfig::default(),
        }
    }

    /// Options object in the shape the embed SDK expects.
    pub fn to_options(&self) -> serde_json::Value {
        let c = &self.config;
        serde_json::json!({
            "roomName": self.room_name,
            "userInfo": { "displayName": self.display_name },
            "configOverwrite": {
                "startWithAudioMuted": c.start_with_audio_muted,
                "startWithVideoMuted": c.start_with_video_muted,
            },
            "interfaceConfigOverwrite": {
                "TOOLBAR_BUTTONS": c.toolbar_buttons,
                "SHOW_JITSI_WATERMARK": c.show_watermark,
                "SHOW_BRAND_WATERMARK": c.show_brand_watermark,
                "SHOW_WATERMARK_FOR_GUESTS": c.show_watermark_for_guests,
                "TOOLBAR_TIMEOUT": c.toolbar_timeout_ms,
                "INITIAL_TOOLBAR_TIMEOUT": c.initial_toolbar_timeout_ms,
            },
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    #[error("SDK not available: {0}")]
    SdkUnavailable(String),

    #[error("construction failed: {0}")]
    Construction(String),
}

/// One live connection to the external RTC SDK.
pub trait RtcWidget: Send {
    /// Register for one event kind.
    fn subscribe(&mut self, kind: EventKind, sink: EventSink) -> Subscription;

    /// Forward a command. Fire and forget.
    fn execute(&mut self, command: WidgetCommand);

    /// Release media and any UI injected into the surface.
    fn dispose(&mut self);
}

/// Builds widget handles.
pub trait WidgetFactory: Send {
    fn create(
        &mut self,
        params: &WidgetParams,
        surface: Surface,
    ) -> Result<Box<dyn RtcWidget>, WidgetError>;
}
