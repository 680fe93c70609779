//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

use super::app::App;
use super::log_pane;
use crate::session::{CallSession, LifecycleState};

/// Symbol and color for a lifecycle state
fn state_indicator(state: &LifecycleState) -> (&'static str, Color) {
    match state {
        LifecycleState::Idle => ("o", Color::Gray),
        LifecycleState::Connecting => ("~", Color::Yellow),
        LifecycleState::Active => ("*", Color::Green),
        LifecycleState::Ended => ("x", Color::Blue),
        LifecycleState::Failed(_) => ("!", Color::Red),
    }
}

/// Format a call duration as mm:ss (h:mm:ss past the hour).
pub fn format_duration(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let log_height = if app.log_pane.visible {
        log_pane::LOG_PANE_HEIGHT
    } else {
        0
    };
    let [header_area, call_area, log_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(log_height),
        Constraint::Length(1),
    ])
    .areas(area);

    let buf = frame.buffer_mut();
    render_header(header_area, buf, app);
    render_call(call_area, buf, &app.session);
    if app.log_pane.visible {
        log_pane::render(log_area, buf, &app.log_pane);
    }
    render_status(status_area, buf, app);
}

/// Render the header bar
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " Consultation Call";
    let who = format!(
        "{}: {} ",
        app.props.role.label(),
        if app.props.display_name.is_empty() {
            "(no name)"
        } else {
            app.props.display_name.as_str()
        }
    );
    let padding = area
        .width
        .saturating_sub((title.len() + who.len()) as u16) as usize;

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(who, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the call panel: the widget surface plus a state-specific hint.
fn render_call(area: Rect, buf: &mut Buffer, session: &CallSession) {
    let (symbol, color) = state_indicator(session.state());
    let room = if session.room().is_empty() {
        "no room".to_string()
    } else {
        format!("room {}", session.room())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Span::styled(
            format!(" {} {} [{}] ", symbol, room, session.state().as_str()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));

    let mut lines: Vec<Line> = session
        .surface()
        .snapshot()
        .into_iter()
        .map(Line::from)
        .collect();

    let hint = match session.state() {
        LifecycleState::Idle => Some(("Call closed. Press o to open.".to_string(), Color::Gray)),
        LifecycleState::Connecting => Some(("Waiting for the conference...".to_string(), Color::Yellow)),
        LifecycleState::Failed(reason) => Some((format!("Call unavailable: {}", reason), Color::Red)),
        LifecycleState::Ended => Some(("Call ended.".to_string(), Color::Blue)),
        LifecycleState::Active => None,
    };
    if let Some((text, color)) = hint {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(text, Style::default().fg(color))));
    }

    // Keep the newest surface lines in view.
    let inner_height = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(inner_height);
    let lines: Vec<Line> = lines.into_iter().skip(skip).collect();

    Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let session = &app.session;
    let sep = Span::styled(" | ", Style::default().fg(Color::Gray));
    let flag = |label: &str, off: bool| {
        if off {
            Span::styled(format!("{} off", label), Style::default().fg(Color::Red))
        } else {
            Span::styled(format!("{} on", label), Style::default().fg(Color::Green))
        }
    };

    let mut spans = vec![
        Span::raw(" "),
        flag("mic", session.audio_muted()),
        sep.clone(),
        flag("cam", session.video_muted()),
        sep.clone(),
        Span::styled(
            format!(
                "{} {}",
                session.participant_count(),
                session.role().counterpart_label().to_lowercase()
            ),
            Style::default().fg(Color::Yellow),
        ),
    ];
    if let Some(d) = session.call_duration() {
        spans.push(sep.clone());
        spans.push(Span::styled(format_duration(d), Style::default().fg(Color::Cyan)));
    }
    spans.push(sep);
    spans.push(Span::styled(
        "a mic  v cam  h hang up  o open/close  l log  q quit",
        Style::default().fg(Color::Gray),
    ));

    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
