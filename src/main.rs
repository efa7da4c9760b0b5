use anyhow::Result;
use booking_console::bookings::{BookingSource, HttpBookingSource};
use booking_console::commands;
use booking_console::config::Config;
use booking_console::demo::DemoDesk;
use booking_console::llm::{ChatService, HttpChatService};
use booking_console::logging::{self, LogTarget};
use booking_console::session::Session;
use booking_console::ui;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "booking-console")]
#[command(version = "0.1.0")]
#[command(about = "Hotel bookings table beside a streaming support chat", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.booking-console/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding config and environment
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Use the built-in offline assistant and bookings
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the streamed reply and the bookings
    Ask { message: String },
    /// Print the bookings table
    Bookings,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load(&config_path)?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    if let Some(Commands::Init) = cli.command {
        return commands::init_config(&config, &config_path);
    }

    match &cli.command {
        None => logging::init(LogTarget::File(&config.log_path()?))?,
        Some(_) => logging::init(LogTarget::Stderr)?,
    }

    let (chat, bookings): (Arc<dyn ChatService>, Arc<dyn BookingSource>) = if cli.demo {
        tracing::info!("using the offline demo desk");
        let desk = Arc::new(DemoDesk::new(config.token_delay()));
        let chat: Arc<dyn ChatService> = desk.clone();
        let bookings: Arc<dyn BookingSource> = desk;
        (chat, bookings)
    } else {
        tracing::info!(api_url = %config.api_url, "connecting to backend");
        let chat: Arc<dyn ChatService> =
            Arc::new(HttpChatService::new(&config.api_url, config.request_timeout())?);
        let bookings: Arc<dyn BookingSource> =
            Arc::new(HttpBookingSource::new(&config.api_url, config.request_timeout())?);
        (chat, bookings)
    };

    let mut session = Session::new(chat, bookings, config.welcome_message.clone());

    match cli.command {
        None => ui::run(session, &config.ui).await,
        Some(Commands::Ask { message }) => commands::ask(&mut session, &message).await,
        Some(Commands::Bookings) => commands::list_bookings(&mut session).await,
        Some(Commands::Init) => Ok(()),
    }
}
