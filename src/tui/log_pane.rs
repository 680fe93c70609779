//! Log pane: captured tracing output, toggled with `l`.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// Scrollback kept by the pane.
const MAX_HISTORY: usize = 1000;

/// Rows the pane takes when visible.
pub const LOG_PANE_HEIGHT: u16 = 10;

pub struct LogPaneState {
    source: LogBuffer,
    history: Vec<String>,
    pub visible: bool,
    /// Lines scrolled back from the newest (0 = follow tail).
    offset: usize,
}

impl LogPaneState {
    pub fn new(source: LogBuffer) -> Self {
        Self {
            source,
            history: Vec::new(),
            visible: false,
            offset: 0,
        }
    }

    /// Pull new lines from the capture buffer. Call once per frame.
    pub fn refresh(&mut self) {
        self.history.extend(self.source.drain());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
            self.offset = self.offset.saturating_sub(excess);
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.offset = 0;
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        let max = self.history.len().saturating_sub(1);
        self.offset = (self.offset + n).min(max);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.history.len()
    }
}

pub fn render(area: Rect, buf: &mut Buffer, state: &LogPaneState) {
    let dropped = state.source.dropped();
    let title = if dropped > 0 {
        format!(" Log ({} dropped) ", dropped)
    } else {
        " Log ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let end = state.history.len().saturating_sub(state.offset);
    let start = end.saturating_sub(inner.height as usize);
    let lines: Vec<Line> = state.history[start..end]
        .iter()
        .map(|l| level_line(l))
        .collect();

    Paragraph::new(lines).render(inner, buf);
}

/// Color a fmt-layer line by its level.
fn level_line(line: &str) -> Line<'static> {
    let color = if line.contains("ERROR") {
        Color::Red
    } else if line.contains(" WARN") {
        Color::Yellow
    } else if line.contains(" INFO") {
        Color::Green
    } else if line.contains("DEBUG") || line.contains("TRACE") {
        Color::DarkGray
    } else {
        Color::White
    };
    Line::from(Span::styled(line.to_owned(), Style::default().fg(color)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_accumulates() {
        let source = LogBuffer::new();
        source.push("a".to_string());
        let mut pane = LogPaneState::new(source.clone());
        assert_eq!(pane.len(), 0);

        pane.refresh();
        source.push("b".to_string());
        pane.refresh();
        assert_eq!(pane.len(), 2);
    }

    #[test]
    fn test_toggle_resets_scroll() {
        let source = LogBuffer::new();
        for i in 0..10 {
            source.push(format!("line {}", i));
        }
        let mut pane = LogPaneState::new(source);
        pane.refresh();
        pane.toggle();
        pane.scroll_up(4);
        assert_eq!(pane.offset, 4);

        pane.toggle();
        pane.toggle();
        assert!(pane.visible);
        assert_eq!(pane.offset, 0);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let source = LogBuffer::new();
        for i in 0..5 {
            source.push(format!("line {}", i));
        }
        let mut pane = LogPaneState::new(source);
        pane.refresh();

        pane.scroll_up(50);
        assert_eq!(pane.offset, 4);
        pane.scroll_down(50);
        assert_eq!(pane.offset, 0);
    }

    #[test]
    fn test_render_shows_newest_lines() {
        let source = LogBuffer::new();
        for i in 0..20 {
            source.push(format!("line {}", i));
        }
        let mut pane = LogPaneState::new(source);
        pane.refresh();

        let area = Rect::new(0, 0, 30, 5);
        let mut buf = Buffer::empty(area);
        render(area, &mut buf, &pane);

        let row: String = (1..29)
            .map(|x| buf[(x, 3)].symbol().to_string())
            .collect();
        assert!(row.starts_with("line 19"), "got {:?}", row);
    }
}
