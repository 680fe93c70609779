//! `CallSession`: lifecycle of one embedded call room.
//!
//! State machine:
//!
//! ```text
//! Idle ──open──> Connecting ──joined──> Active
//!                    │                    │
//!                    └──left / ready-to-close / end_call──> Ended
//! ```
//!
//! A widget handle exists exactly while the session is Connecting or Active.
//! Entering Ended disposes the handle and fires the host's end-call callback
//! once. `close()` and `Drop` dispose without firing it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::widget::{
    EventKind, EventSink, HandleId, MessageReceiver, MessageSender, RtcWidget, Subscription,
    Surface, WidgetCommand, WidgetEvent, WidgetFactory, WidgetMessage, WidgetParams,
};
use super::{CallError, CallProps, LifecycleState, Role};

/// Host callback fired when the call ends.
pub type EndCallback = Box<dyn FnMut() + Send>;

/// The one live widget handle and everything registered against it.
struct LiveWidget {
    id: HandleId,
    room: String,
    display_name: String,
    widget: Box<dyn RtcWidget>,
    subscriptions: Vec<Subscription>,
}

pub struct CallSession {
    factory: Box<dyn WidgetFactory>,
    on_end_call: EndCallback,
    surface: Surface,
    tx: MessageSender,
    live: Option<LiveWidget>,
    state: LifecycleState,
    room: String,
    display_name: String,
    role: Role,
    audio_muted: bool,
    video_muted: bool,
    /// Remote participant ids currently in the room.
    participants: BTreeSet<String>,
    joined_at: Option<DateTime<Utc>>,
    last_props: Option<CallProps>,
    discarded: u64,
}

impl CallSession {
    /// Create an idle session.
    ///
    /// Returns the receiver on which widget events arrive; feed them back
    /// through `handle_message` (or `pump`).
    pub fn new(factory: Box<dyn WidgetFactory>, on_end_call: EndCallback) -> (Self, MessageReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            factory,
            on_end_call,
            surface: Surface::new(),
            tx,
            live: None,
            state: LifecycleState::Idle,
            room: String::new(),
            display_name: String::new(),
            role: Role::default(),
            audio_muted: false,
            video_muted: false,
            participants: BTreeSet::new(),
            joined_at: None,
            last_props: None,
            discarded: 0,
        };
        (session, rx)
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn audio_muted(&self) -> bool {
        self.audio_muted
    }

    pub fn video_muted(&self) -> bool {
        self.video_muted
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(String::as_str)
    }

    /// Time since the conference was joined, while Active.
    pub fn call_duration(&self) -> Option<chrono::Duration> {
        match (&self.state, self.joined_at) {
            (LifecycleState::Active, Some(t)) => Some(Utc::now() - t),
            _ => None,
        }
    }

    pub fn has_widget(&self) -> bool {
        self.live.is_some()
    }

    pub fn handle_id(&self) -> Option<HandleId> {
        self.live.as_ref().map(|l| l.id)
    }

    /// Surface the widget renders into.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Number of events dropped because they came from a disposed handle.
    pub fn discarded_events(&self) -> u64 {
        self.discarded
    }

    /// Open the call room.
    ///
    /// Re-opening the same room under the same name while a handle is live is
    /// a no-op. Anything else disposes the current handle before building the
    /// next one.
    pub fn open(&mut self, room: &str, display_name: &str, role: Role) -> Result<(), CallError> {
        let room = room.trim();
        let display_name = display_name.trim();
        if room.is_empty() || display_name.is_empty() {
            tracing::warn!(
                "Refusing to open call: room={:?} display_name={:?}",
                room,
                display_name
            );
            return Err(CallError::InvalidParams {
                room: room.to_string(),
                display_name: display_name.to_string(),
            });
        }

        if let Some(ref live) = self.live {
            if live.room == room && live.display_name == display_name {
                tracing::debug!("Call for room {} already open, ignoring re-open", room);
                self.role = role;
                return Ok(());
            }
        }

        self.dispose_widget();
        self.reset_call_fields();
        self.room = room.to_string();
        self.display_name = display_name.to_string();
        self.role = role;

        let params = WidgetParams::new(room, display_name);
        let mut widget = match self.factory.create(&params, self.surface.clone()) {
            Ok(w) => w,
            Err(e) => {
                tracing::error!("Failed to create call widget for room {}: {}", room, e);
                self.surface.clear();
                self.set_state(LifecycleState::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        let id = HandleId::new();
        let subscriptions = EventKind::ALL
            .iter()
            .map(|kind| widget.subscribe(*kind, EventSink::new(id, self.tx.clone())))
            .collect::<Vec<_>>();
        tracing::debug!(
            "Widget {} created for room {} ({} subscriptions)",
            id,
            room,
            subscriptions.len()
        );

        self.live = Some(LiveWidget {
            id,
            room: room.to_string(),
            display_name: display_name.to_string(),
            widget,
            subscriptions,
        });
        self.set_state(LifecycleState::Connecting);
        Ok(())
    }

    /// Host-initiated close. Disposes unconditionally and returns to Idle
    /// without firing the end-call callback.
    pub fn close(&mut self) {
        if self.live.is_none() && self.state == LifecycleState::Idle {
            return;
        }
        self.dispose_widget();
        self.reset_call_fields();
        self.room.clear();
        self.display_name.clear();
        self.set_state(LifecycleState::Idle);
    }

    /// Reconcile with host props. Only acts when the props changed since the
    /// last successful apply, so rejected props report their error again.
    pub fn apply(&mut self, props: &CallProps) -> Result<(), CallError> {
        if self.last_props.as_ref() == Some(props) {
            return Ok(());
        }

        let result = if props.is_open {
            self.open(&props.room, &props.display_name, props.role)
        } else {
            self.close();
            Ok(())
        };
        self.last_props = result.is_ok().then(|| props.clone());
        result
    }

    /// Ask the widget to toggle the microphone.
    ///
    /// `audio_muted` only changes once the widget confirms.
    pub fn toggle_audio(&mut self) -> Result<(), CallError> {
        self.send_command(WidgetCommand::ToggleAudio)
    }

    /// Ask the widget to toggle the camera.
    pub fn toggle_video(&mut self) -> Result<(), CallError> {
        self.send_command(WidgetCommand::ToggleVideo)
    }

    /// Hang up and end the call immediately.
    ///
    /// Does not wait for the widget to report that it left: widgets do not
    /// reliably confirm a local hangup. If the widget silently fails to hang
    /// up, local state still says Ended; the handle is disposed regardless.
    pub fn end_call(&mut self) -> Result<(), CallError> {
        self.send_command(WidgetCommand::Hangup)?;
        self.enter_ended("local hangup");
        Ok(())
    }

    /// Apply one widget event. Returns whether observable state changed.
    ///
    /// Events from any handle other than the live one are discarded.
    pub fn handle_message(&mut self, msg: WidgetMessage) -> bool {
        let is_live = self.live.as_ref().is_some_and(|l| l.id == msg.handle);
        if !is_live {
            self.discarded += 1;
            tracing::debug!(
                "Discarding {} from stale widget {}",
                msg.event.kind().as_str(),
                msg.handle
            );
            return false;
        }

        match msg.event {
            WidgetEvent::ConferenceJoined => self.mark_joined(),
            WidgetEvent::ParticipantJoined { id } => {
                let added = self.participants.insert(id.clone());
                if added {
                    tracing::info!("Participant {} joined", id);
                }
                // Joined and counted may both change; evaluate both.
                let joined = self.mark_joined();
                added || joined
            }
            WidgetEvent::ParticipantLeft { id } => {
                let removed = self.participants.remove(&id);
                if removed {
                    tracing::info!("Participant {} left", id);
                }
                removed
            }
            WidgetEvent::AudioMuteStatusChanged { muted } => {
                let changed = self.audio_muted != muted;
                self.audio_muted = muted;
                changed
            }
            WidgetEvent::VideoMuteStatusChanged { muted } => {
                let changed = self.video_muted != muted;
                self.video_muted = muted;
                changed
            }
            WidgetEvent::ConferenceLeft => {
                self.enter_ended("conference-left");
                true
            }
            WidgetEvent::ReadyToClose => {
                self.enter_ended("ready-to-close");
                true
            }
        }
    }

    /// Drain every queued widget message. Returns how many changed state.
    pub fn pump(&mut self, rx: &mut MessageReceiver) -> usize {
        let mut changed = 0;
        while let Ok(msg) = rx.try_recv() {
            if self.handle_message(msg) {
                changed += 1;
            }
        }
        changed
    }

    fn send_command(&mut self, command: WidgetCommand) -> Result<(), CallError> {
        let Some(live) = self.live.as_mut() else {
            tracing::warn!("Ignoring {}: no call widget", command.as_str());
            return Err(CallError::NotConnected);
        };
        tracing::debug!("Sending {} to widget {}", command.as_str(), live.id);
        live.widget.execute(command);
        Ok(())
    }

    fn mark_joined(&mut self) -> bool {
        if self.state != LifecycleState::Connecting {
            return false;
        }
        self.joined_at = Some(Utc::now());
        self.set_state(LifecycleState::Active);
        true
    }

    fn enter_ended(&mut self, reason: &str) {
        if self.state == LifecycleState::Ended {
            return;
        }
        tracing::info!("Call in room {} ended ({})", self.room, reason);
        self.dispose_widget();
        self.joined_at = None;
        self.set_state(LifecycleState::Ended);
        (self.on_end_call)();
    }

    /// Cancel every subscription, then release the handle and reclaim the
    /// surface.
    fn dispose_widget(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        for sub in &live.subscriptions {
            sub.cancel();
        }
        live.widget.dispose();
        self.surface.clear();
        tracing::debug!(
            "Disposed widget {} ({} subscriptions cancelled)",
            live.id,
            live.subscriptions.len()
        );
    }

    fn reset_call_fields(&mut self) {
        self.audio_muted = false;
        self.video_muted = false;
        self.participants.clear();
        self.joined_at = None;
    }

    fn set_state(&mut self, next: LifecycleState) {
        if self.state != next {
            tracing::info!("Call state: {} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        self.dispose_widget();
    }
}
