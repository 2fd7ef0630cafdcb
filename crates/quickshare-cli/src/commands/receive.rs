//! Receive command implementation.

use anyhow::Result;

use quickshare_core::progress::ApplyOutcome;
use quickshare_core::session::Endpoint;

use super::{ReceiveArgs, Runtime};
use crate::ui::print_peer_files;

/// Run the receive command.
pub async fn run(args: ReceiveArgs, engine: Option<&str>) -> Result<()> {
    let config = super::load_config();
    let mut session = Runtime::open(&config, engine, false)?;

    if !args.json {
        println!();
        println!("QuickShare v{}", quickshare_core::VERSION);
        println!("{}", "-".repeat(37));
        println!();
        println!("  Connecting to {}...", args.code_or_url.trim());
        println!();
    }

    session.app.connect(&args.code_or_url).await?;
    let view = session.app.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        if let Some(message) = &view.session.message {
            println!("  {message}");
            println!();
        }
        match &view.session.endpoint {
            Some(Endpoint::PeerListing(files)) => {
                println!("  {} file(s) available:", files.len());
                println!();
                print_peer_files(files);
            }
            Some(Endpoint::RoomCode(code)) => println!("  Joined room {code}"),
            Some(Endpoint::ShareLink(url)) => println!("  Opened {url}"),
            None => {}
        }
        println!();
    }

    if matches!(view.session.endpoint, Some(Endpoint::RoomCode(_))) && session.events.is_some() {
        if !args.json {
            println!("  Receiving. Press Ctrl-C to leave the room.");
            println!();
        }
        loop {
            tokio::select! {
                event = session.next_event() => {
                    let Some(event) = event else { break };
                    if session.app.handle_event(event) == ApplyOutcome::StatsUpdated && !args.json {
                        if let Some(stats) = session.app.snapshot().stats {
                            println!("  {} received at {}", stats.total_sent, stats.speed);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    session.app.stop().await?;
    Ok(())
}
