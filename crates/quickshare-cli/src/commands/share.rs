//! Share command implementation.

use anyhow::{bail, Result};

use quickshare_core::progress::{ApplyOutcome, EngineEvent};
use quickshare_core::session::{Endpoint, SessionMode};
use quickshare_core::Orchestrator;

use super::{Runtime, ShareArgs};
use crate::ui::{print_items, CodeBox};

/// Run the share command.
pub async fn run(args: ShareArgs, engine: Option<&str>) -> Result<()> {
    let config = super::load_config();
    let mut session = Runtime::open(&config, engine, true)?;

    let paths = args
        .paths
        .iter()
        .map(|p| {
            std::fs::canonicalize(p)
                .unwrap_or_else(|_| p.clone())
                .display()
                .to_string()
        })
        .collect();

    session.app.add_from_drop(paths).await?;
    if session.app.manifest().is_empty() {
        bail!("none of the given paths could be added");
    }

    if args.cloud {
        session.app.start_cloud_share().await?;
    } else {
        session.app.start_direct_share().await?;
    }

    display_share_info(&session.app, &args)?;

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else {
                    tracing::warn!("engine closed the event stream");
                    break;
                };
                if report_event(&mut session.app, event, &args) && all_finished(&session.app) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if !args.json {
                    println!();
                    println!("  Stopping...");
                }
                break;
            }
        }
    }

    session.app.stop().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&session.app.snapshot())?);
    } else {
        println!();
        let view = session.app.snapshot();
        print_items(&view.items, &view.empty_state_text);
        println!();
    }
    Ok(())
}

fn display_share_info(app: &Orchestrator, args: &ShareArgs) -> Result<()> {
    let view = app.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!();
    println!("QuickShare v{}", quickshare_core::VERSION);
    println!("{}", "-".repeat(37));
    println!();
    println!("  Sharing {} item(s)", view.items.len());
    println!();
    print_items(&view.items, &view.empty_state_text);
    println!();

    match (&view.session.mode, &view.session.endpoint) {
        (SessionMode::P2p, Some(Endpoint::RoomCode(code))) => {
            CodeBox::new(code)
                .with_caption("quickshare receive <code>")
                .display();
        }
        (_, Some(Endpoint::ShareLink(url))) => {
            println!("  Link: {url}");
        }
        _ => {}
    }
    if !view.engine_attached {
        println!();
        println!("  (no engine attached, showing mock answers)");
    }
    println!();
    println!("  Press Ctrl-C to stop sharing.");
    println!();
    Ok(())
}

/// Apply and print one event. Returns whether an item reached a final status.
fn report_event(app: &mut Orchestrator, event: EngineEvent, args: &ShareArgs) -> bool {
    let outcome = app.handle_event(event);
    if args.json {
        return matches!(outcome, ApplyOutcome::Applied { became_terminal: true, .. });
    }
    match outcome {
        ApplyOutcome::Applied {
            index,
            became_terminal,
            ..
        } => {
            if let Some(item) = app.manifest().get(index) {
                println!(
                    "  {:<32} {:>3}%  {}",
                    item.name, item.progress_percent, item.status_label
                );
            }
            became_terminal
        }
        ApplyOutcome::StatsUpdated => {
            if let Some(stats) = app.snapshot().stats {
                println!("  {} sent at {}", stats.total_sent, stats.speed);
            }
            false
        }
        ApplyOutcome::OutOfRange | ApplyOutcome::Stale => false,
    }
}

fn all_finished(app: &Orchestrator) -> bool {
    let items = app.manifest().items();
    !items.is_empty() && items.iter().all(|item| item.status.is_terminal())
}
