//! Loopback widget — an in-process stand-in for the embedded RTC SDK.
//!
//! Joins after a configurable delay, confirms every toggle with the matching
//! mute-status event, and reports `conference-left` + `ready-to-close` on
//! hangup. No media is involved.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::widget::{
    EventKind, EventSink, ListenerSet, RtcWidget, Subscription, Surface, WidgetCommand,
    WidgetError, WidgetEvent, WidgetFactory, WidgetParams,
};

/// Builds loopback widgets.
#[derive(Debug, Clone)]
pub struct LoopbackFactory {
    join_delay: Duration,
    remote_participants: Vec<String>,
    /// When set, every construction fails with this reason.
    unavailable: Option<String>,
}

impl LoopbackFactory {
    pub fn new(join_delay: Duration, remote_participants: Vec<String>) -> Self {
        Self {
            join_delay,
            remote_participants,
            unavailable: None,
        }
    }

    /// A factory whose SDK never loads.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            join_delay: Duration::ZERO,
            remote_participants: Vec::new(),
            unavailable: Some(reason.into()),
        }
    }
}

impl WidgetFactory for LoopbackFactory {
    fn create(
        &mut self,
        params: &WidgetParams,
        surface: Surface,
    ) -> Result<Box<dyn RtcWidget>, WidgetError> {
        if let Some(ref reason) = self.unavailable {
            return Err(WidgetError::SdkUnavailable(reason.clone()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| WidgetError::SdkUnavailable("no async runtime".to_string()))?;

        tracing::debug!("Loopback widget options: {}", params.to_options());
        surface.write_line(format!(
            "Joining {} as {}...",
            params.room_name, params.display_name
        ));

        let listeners = ListenerSet::new();
        let connect = runtime.spawn(connect(
            listeners.clone(),
            surface.clone(),
            self.join_delay,
            self.remote_participants.clone(),
        ));

        Ok(Box::new(LoopbackWidget {
            listeners,
            surface,
            audio_muted: params.config.start_with_audio_muted,
            video_muted: params.config.start_with_video_muted,
            tasks: vec![connect],
            disposed: false,
        }))
    }
}

/// Simulated connection: join, then let the remote side arrive.
async fn connect(
    listeners: ListenerSet,
    surface: Surface,
    join_delay: Duration,
    remote_participants: Vec<String>,
) {
    tokio::time::sleep(join_delay).await;
    surface.write_line("Connected.");
    listeners.emit(&WidgetEvent::ConferenceJoined);

    for id in remote_participants {
        tokio::time::sleep(join_delay / 2).await;
        surface.write_line(format!("{} joined the room", id));
        listeners.emit(&WidgetEvent::ParticipantJoined { id });
    }
}

struct LoopbackWidget {
    listeners: ListenerSet,
    surface: Surface,
    audio_muted: bool,
    video_muted: bool,
    tasks: Vec<JoinHandle<()>>,
    disposed: bool,
}

impl RtcWidget for LoopbackWidget {
    fn subscribe(&mut self, kind: EventKind, sink: EventSink) -> Subscription {
        self.listeners.register(kind, sink)
    }

    fn execute(&mut self, command: WidgetCommand) {
        if self.disposed {
            return;
        }
        match command {
            WidgetCommand::ToggleAudio => {
                self.audio_muted = !self.audio_muted;
                self.surface.write_line(if self.audio_muted {
                    "Microphone muted"
                } else {
                    "Microphone on"
                });
                self.listeners.emit(&WidgetEvent::AudioMuteStatusChanged {
                    muted: self.audio_muted,
                });
            }
            WidgetCommand::ToggleVideo => {
                self.video_muted = !self.video_muted;
                self.surface.write_line(if self.video_muted {
                    "Camera off"
                } else {
                    "Camera on"
                });
                self.listeners.emit(&WidgetEvent::VideoMuteStatusChanged {
                    muted: self.video_muted,
                });
            }
            WidgetCommand::Hangup => {
                self.surface.write_line("Hanging up...");
                self.listeners.emit(&WidgetEvent::ConferenceLeft);
                self.listeners.emit(&WidgetEvent::ReadyToClose);
            }
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.listeners.clear();
    }
}

impl Drop for LoopbackWidget {
    fn drop(&mut self) {
        self.dispose();
    }
}
