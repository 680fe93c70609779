//! TUI host state and main event loop
//!
//! The terminal plays the host application: it owns the props, forwards key
//! presses as session commands, renders the widget surface, and closes the
//! call when the session reports that it ended.

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use std::time::Duration;
use tokio::sync::mpsc;

use super::log_capture::LogBuffer;
use super::log_pane::LogPaneState;
use super::ui;
use crate::session::widget::{MessageReceiver, WidgetFactory};
use crate::session::{CallError, CallProps, CallSession, LifecycleState};

/// Redraw interval (~30 fps), keeps the call timer moving.
const FRAME_DURATION_MS: u64 = 33;

/// Notices the session's callbacks post back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostNotice {
    CallEnded,
}

/// Receivers the event loop selects on.
pub struct AppChannels {
    pub widget_rx: MessageReceiver,
    pub host_rx: mpsc::UnboundedReceiver<HostNotice>,
}

pub struct App {
    pub session: CallSession,
    pub props: CallProps,
    pub log_pane: LogPaneState,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub should_exit: bool,
}

impl App {
    pub fn new(
        props: CallProps,
        factory: Box<dyn WidgetFactory>,
        log_buffer: LogBuffer,
    ) -> (Self, AppChannels) {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (session, widget_rx) = CallSession::new(
            factory,
            Box::new(move || {
                let _ = host_tx.send(HostNotice::CallEnded);
            }),
        );
        let app = Self {
            session,
            props,
            log_pane: LogPaneState::new(log_buffer),
            status_message: None,
            status_is_error: false,
            should_exit: false,
        };
        (app, AppChannels { widget_rx, host_rx })
    }

    /// Push the current props into the session.
    pub fn sync_props(&mut self) {
        let result = self.session.apply(&self.props);
        self.report(result);
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_exit = true,
            KeyCode::Char('a') => {
                let result = self.session.toggle_audio();
                self.report(result);
            }
            KeyCode::Char('v') => {
                let result = self.session.toggle_video();
                self.report(result);
            }
            KeyCode::Char('h') => {
                let result = self.session.end_call();
                self.report(result);
            }
            KeyCode::Char('o') => {
                self.props.is_open = !self.props.is_open;
                self.status_message = None;
                self.sync_props();
            }
            KeyCode::Char('l') => self.log_pane.toggle(),
            KeyCode::Up if self.log_pane.visible => self.log_pane.scroll_up(1),
            KeyCode::Down if self.log_pane.visible => self.log_pane.scroll_down(1),
            KeyCode::PageUp if self.log_pane.visible => self.log_pane.scroll_up(10),
            KeyCode::PageDown if self.log_pane.visible => self.log_pane.scroll_down(10),
            _ => {}
        }
    }

    pub fn on_notice(&mut self, notice: HostNotice) {
        match notice {
            HostNotice::CallEnded => {
                // Keys queued ahead of the notice may already have reopened
                // the room; only an ended call is closed.
                if *self.session.state() != LifecycleState::Ended {
                    tracing::debug!(
                        "Ignoring end-call notice, call is {}",
                        self.session.state().as_str()
                    );
                    return;
                }
                tracing::info!("Host received end-call, closing the call view");
                self.props.is_open = false;
                self.sync_props();
                self.status_message = Some("Call ended. Press o to start again.".to_string());
                self.status_is_error = false;
            }
        }
    }

    fn report(&mut self, result: Result<(), CallError>) {
        if let Err(e) = result {
            self.status_message = Some(e.to_string());
            self.status_is_error = true;
        }
    }

    pub fn render(&self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }
}

/// Run the TUI host. The terminal is restored even if the loop fails.
pub async fn run(
    props: CallProps,
    factory: Box<dyn WidgetFactory>,
    log_buffer: LogBuffer,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, props, factory, log_buffer).await;
    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    props: CallProps,
    factory: Box<dyn WidgetFactory>,
    log_buffer: LogBuffer,
) -> Result<()> {
    let (mut app, mut channels) = App::new(props, factory, log_buffer);
    app.sync_props();

    let mut events = EventStream::new();
    let mut frame_tick = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));

    while !app.should_exit {
        app.log_pane.refresh();
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key.code);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => app.should_exit = true,
            },
            Some(msg) = channels.widget_rx.recv() => {
                app.session.handle_message(msg);
            }
            Some(notice) = channels.host_rx.recv() => {
                app.on_notice(notice);
            }
            _ = frame_tick.tick() => {}
        }
    }

    app.session.close();
    Ok(())
}
