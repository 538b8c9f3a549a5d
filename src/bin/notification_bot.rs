//! Notification transport host. The menu/keyboard chat-bot UI itself is out
//! of scope; this entry point only proves out the
//! `send_alert(text) -> {ok, message_id?}` primitive the core depends on
//! and keeps a process alive for it until shutdown.

use clap::Parser;
use tracing::info;
use venue_scanner_backend::notifier::{LoggingTransport, NotificationTransport};

#[derive(Parser, Debug)]
#[command(name = "notification_bot", about = "Host the notification transport")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Args::parse();
    venue_scanner_backend::init_tracing();

    let transport = LoggingTransport;
    let outcome = transport.send_alert("notification_bot: transport online").await;
    info!(?outcome, "startup heartbeat sent");

    let _ = tokio::signal::ctrl_c().await;
    info!("notification_bot: SIGINT received, shutting down");
    std::process::exit(0);
}
