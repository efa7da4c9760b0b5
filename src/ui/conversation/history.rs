//! Chat transcript panel

use crate::chat::{ChatMessage, ChatRole, Transcript};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Scroll state of the transcript panel.
///
/// The panel follows the newest message; scrolling back is undone as soon as
/// the transcript changes.
#[derive(Debug, Default)]
pub struct ChatHistory {
    scroll_back: usize,
    revision: u64,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump back to the newest message if `transcript` moved on
    pub fn observe(&mut self, transcript: &Transcript) {
        if transcript.revision() != self.revision {
            self.revision = transcript.revision();
            self.scroll_to_bottom();
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    pub fn view<'a>(&self, transcript: &'a Transcript, working: bool) -> HistoryView<'a> {
        HistoryView {
            transcript,
            scroll_back: self.scroll_back,
            working,
        }
    }
}

pub struct HistoryView<'a> {
    transcript: &'a Transcript,
    scroll_back: usize,
    working: bool,
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Great Hotel support");

        let inner_area = block.inner(area);
        block.render(area, buf);

        let width = inner_area.width.saturating_sub(2) as usize;
        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.transcript.iter() {
            all_lines.extend(render_message(message, width));
            // spacing between messages
            all_lines.push(Line::default());
        }
        if self.working {
            all_lines.push(Line::from(Span::styled(
                "🤖 Assistant is typing…",
                Style::default().fg(Color::DarkGray),
            )));
        }

        // bottom-anchored window, shifted up by the scroll-back offset
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_back = total.saturating_sub(height);
        let end = total - self.scroll_back.min(max_back);
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn render_message(message: &ChatMessage, width: usize) -> Vec<Line<'static>> {
    let header = match message.role {
        ChatRole::User => Span::styled(
            "🧑‍💻 You",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        ChatRole::Assistant => Span::styled(
            "🤖 Assistant",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
    };

    let mut lines = vec![Line::from(header)];
    for source_line in message.content.lines() {
        for wrapped in wrap_text(source_line, width) {
            lines.push(markdown_line(&wrapped));
        }
    }
    lines
}

/// Minimal markdown: headings, bullets and `**bold**` spans
fn markdown_line(text: &str) -> Line<'static> {
    let trimmed = text.trim_start();
    if let Some(heading) = trimmed.strip_prefix('#') {
        let heading = heading.trim_start_matches('#').trim_start();
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }

    let (prefix, body) = match trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        Some(rest) => ("  • ", rest),
        None => ("  ", text),
    };

    let mut spans = vec![Span::raw(prefix)];
    for (i, part) in body.split("**").enumerate() {
        if part.is_empty() {
            continue;
        }
        if i % 2 == 1 {
            spans.push(Span::styled(
                part.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::raw(part.to_string()));
        }
    }
    Line::from(spans)
}

/// Wrap text to fit within the given width
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        let needed = current_line.chars().count() + word.chars().count() + 1;
        if current_line.is_empty() || needed <= width {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}
