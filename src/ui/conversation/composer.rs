use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    None,
}

/// Single-line message input.
///
/// While disabled (a turn is in flight) every key is ignored, so nothing can
/// be submitted until the gate is idle again.
#[derive(Debug, Clone)]
pub struct Composer {
    content: String,
    /// Cursor position in characters, not bytes
    cursor: usize,
    placeholder: String,
    enabled: bool,
}

impl Composer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            placeholder: placeholder.into(),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[cfg(test)]
    fn content(&self) -> &str {
        &self.content
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if !self.enabled || key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if !self.content.trim().is_empty() {
                    let content = std::mem::take(&mut self.content);
                    self.cursor = 0;
                    return ComposerResult::Submitted(content);
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_offset(self.cursor);
                self.content.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_offset(self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.char_count() {
                    let at = self.byte_offset(self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
            }
            KeyCode::Home => {
                self.cursor = 0;
            }
            KeyCode::End => {
                self.cursor = self.char_count();
            }
            _ => {}
        }

        ComposerResult::None
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.content
            .char_indices()
            .nth(chars)
            .map(|(offset, _)| offset)
            .unwrap_or(self.content.len())
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (title, border) = if self.enabled {
            ("Message", Style::default().fg(Color::Cyan))
        } else {
            ("Message (waiting for reply)", Style::default().fg(Color::DarkGray))
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        let line = if self.content.is_empty() {
            Line::from(Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            let before: String = self.content.chars().take(self.cursor).collect();
            let after: String = self.content.chars().skip(self.cursor).collect();
            let cursor = if self.enabled { "▋" } else { "" };
            Line::from(vec![
                Span::raw(before),
                Span::styled(cursor, Style::default().fg(Color::Yellow)),
                Span::raw(after),
            ])
        };
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}
