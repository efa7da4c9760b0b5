use crate::bookings::BookingRecord;
use crate::chat::{ChatRole, Transcript, TurnStatus};
use crate::config::Config;
use crate::session::{Session, SubmitOutcome};
use crate::ui::bookings::{COLUMNS, row_cells};
use anyhow::{Result, bail};
use std::io::{self, Write};
use std::path::Path;

/// Run one turn without the TUI: stream the reply to stdout, then print the
/// refreshed bookings table.
pub async fn ask(session: &mut Session, message: &str) -> Result<()> {
    session.await_refreshes().await;

    match session.submit(message) {
        SubmitOutcome::Accepted => {}
        SubmitOutcome::Blank => bail!("Message is empty"),
        SubmitOutcome::Busy => bail!("A reply is already streaming"),
    }

    let mut transcript = session.subscribe_transcript();
    let mut printer = ReplyPrinter::new(session.transcript().len());
    println!("🤖 Assistant:");

    let outcome = {
        let turn = session.await_turn();
        tokio::pin!(turn);
        loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                Ok(()) = transcript.changed() => {
                    printer.print_new(&transcript.borrow_and_update())?;
                }
            }
        }
    };
    printer.print_new(&session.transcript())?;
    println!();

    if let Some(outcome) = outcome {
        if let TurnStatus::Failed(reason) = outcome.status {
            eprintln!("⚠️  The assistant stream ended early: {}", reason);
        } else if !outcome.reply_created {
            println!("(no reply)");
        }
    }

    session.await_refreshes().await;
    println!();
    print_bookings(session.board().records());
    Ok(())
}

/// Print the bookings table once
pub async fn list_bookings(session: &mut Session) -> Result<()> {
    session.await_refreshes().await;
    print_bookings(session.board().records());
    Ok(())
}

/// Write the effective configuration to `path` unless a file is already there
pub fn init_config(config: &Config, path: &Path) -> Result<()> {
    if path.exists() {
        println!("📄 Config already exists at {}", path.display());
        return Ok(());
    }

    config.save(path)?;
    println!("✅ Wrote config to {}", path.display());
    Ok(())
}

/// Prints the assistant reply as it grows.
///
/// The reply is the message at `index`, the first one after the user's turn;
/// content only ever grows at the end, so a byte offset marks what is printed.
struct ReplyPrinter {
    index: usize,
    printed: usize,
}

impl ReplyPrinter {
    fn new(index: usize) -> Self {
        Self { index, printed: 0 }
    }

    fn print_new(&mut self, transcript: &Transcript) -> Result<()> {
        let Some(message) = transcript.get(self.index) else {
            return Ok(());
        };
        if message.role != ChatRole::Assistant || message.content.len() <= self.printed {
            return Ok(());
        }

        let mut stdout = io::stdout();
        write!(stdout, "{}", &message.content[self.printed..])?;
        stdout.flush()?;
        self.printed = message.content.len();
        Ok(())
    }
}

fn print_bookings(records: &[BookingRecord]) {
    if records.is_empty() {
        println!("📭 No bookings available.");
        return;
    }

    let rows: Vec<[String; 9]> = records.iter().map(row_cells).collect();
    let widths: Vec<usize> = (0..COLUMNS.len())
        .map(|column| {
            rows.iter()
                .map(|row| row[column].chars().count())
                .chain(std::iter::once(COLUMNS[column].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header: Vec<String> = COLUMNS.iter().map(|title| title.to_string()).collect();
    println!("📋 Hotel Bookings Database");
    println!("{}", format_row(&header));
    println!("{}", "=".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    for row in &rows {
        println!("{}", format_row(row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, MessageLog};

    #[test]
    fn printer_only_advances_on_the_reply() {
        let mut log = MessageLog::seeded(ChatMessage::assistant("Welcome"));
        log.append(ChatMessage::user("Hi"));
        let mut printer = ReplyPrinter::new(log.len());

        printer.print_new(&log.snapshot()).unwrap();
        assert_eq!(printer.printed, 0);

        log.append(ChatMessage::assistant("Hel"));
        printer.print_new(&log.snapshot()).unwrap();
        assert_eq!(printer.printed, 3);

        log.append_chunk_to_last("lo!");
        printer.print_new(&log.snapshot()).unwrap();
        assert_eq!(printer.printed, 6);
    }

    #[test]
    fn init_config_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"http://kept\"").unwrap();

        init_config(&Config::default(), &path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap().api_url, "http://kept");
    }
}
