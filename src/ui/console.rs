use crate::config::UiConfig;
use crate::session::{Session, SubmitOutcome};
use crate::ui::bookings::BookingTable;
use crate::ui::conversation::{ChatHistory, Composer, ComposerResult};
use anyhow::{Context, Result};
use crossterm::{
    cursor::Show,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use std::io;
use std::time::Duration;

const PAGE: usize = 5;

/// Run the two-panel console until the operator quits
pub async fn run(session: Session, config: &UiConfig) -> Result<()> {
    install_panic_hook();
    enable_raw_mode().context("Failed to enable raw mode")?;
    // restores the terminal on every exit path, unwinding included
    let _restore = RestoreGuard::new(|| {
        if let Err(e) = restore_terminal() {
            tracing::warn!(error = %e, "failed to restore terminal");
        }
    });
    execute!(io::stdout(), EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    Console::new(session, config).event_loop(&mut terminal).await
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}

/// Leave raw mode before the panic message is printed, otherwise it lands on
/// the alternate screen and is lost.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}

/// Runs `restore` when dropped
struct RestoreGuard<F: FnMut()> {
    restore: F,
}

impl<F: FnMut()> RestoreGuard<F> {
    fn new(restore: F) -> Self {
        Self { restore }
    }
}

impl<F: FnMut()> Drop for RestoreGuard<F> {
    fn drop(&mut self) {
        (self.restore)();
    }
}

struct Console {
    session: Session,
    history: ChatHistory,
    composer: Composer,
    booking_panel_percent: u16,
    tick_rate: Duration,
    should_quit: bool,
}

impl Console {
    fn new(session: Session, config: &UiConfig) -> Self {
        Self {
            session,
            history: ChatHistory::new(),
            composer: Composer::new("Ask about a booking…"),
            booking_panel_percent: config.booking_panel_percent.clamp(10, 90),
            tick_rate: Duration::from_millis(config.tick_rate_ms.max(10)),
            should_quit: false,
        }
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let mut events = EventStream::new();
        let mut tick = tokio::time::interval(self.tick_rate);
        let mut transcript = self.session.subscribe_transcript();

        loop {
            self.session.pump();
            self.composer.set_enabled(!self.session.is_working());
            if transcript.has_changed().unwrap_or(false) {
                self.history.observe(&transcript.borrow_and_update());
            }

            terminal.draw(|frame| self.draw(frame))?;

            if self.should_quit {
                return Ok(());
            }

            tokio::select! {
                _ = tick.tick() => {}
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) => self.on_key(key),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("Failed to read terminal event"),
                    None => return Ok(()),
                },
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Esc => self.should_quit = true,
            KeyCode::PageUp => self.history.scroll_up(PAGE),
            KeyCode::PageDown => self.history.scroll_down(PAGE),
            _ => {
                if let ComposerResult::Submitted(text) = self.composer.handle_key(key) {
                    match self.session.submit(&text) {
                        SubmitOutcome::Accepted => self.composer.set_enabled(false),
                        outcome => tracing::debug!(?outcome, "submission not sent"),
                    }
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(1)])
            .split(frame.size());

        let panels = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(self.booking_panel_percent),
                Constraint::Percentage(100 - self.booking_panel_percent),
            ])
            .split(rows[0]);

        frame.render_widget(BookingTable::new(self.session.board().records()), panels[0]);
        self.draw_chat(frame, panels[1]);

        let status = Line::from(vec![
            Span::styled(
                format!(" {} ", self.session.gate_state()),
                Style::default().fg(Color::Black).bg(if self.session.is_working() {
                    Color::Yellow
                } else {
                    Color::Green
                }),
            ),
            Span::styled(
                format!(
                    "  conversation {}  ·  Enter send  ·  PgUp/PgDn scroll  ·  Esc quit",
                    self.session.conversation()
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(Paragraph::new(status), rows[1]);
    }

    fn draw_chat(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // History
                Constraint::Length(3), // Composer
            ])
            .split(area);

        let transcript = self.session.transcript();
        frame.render_widget(
            self.history.view(&transcript, self.session.is_working()),
            chunks[0],
        );
        frame.render_widget(&self.composer, chunks[1]);
    }
}
