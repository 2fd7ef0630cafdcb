//! History command implementation.

use anyhow::Result;

use quickshare_core::history::{HistoryStore, Outcome};

use super::HistoryArgs;

/// Run the history command.
pub async fn run(args: HistoryArgs) -> Result<()> {
    let config = super::load_config();
    let mut store = HistoryStore::load(config.history)?;

    if args.clear {
        store.clear()?;
        println!("History cleared.");
        return Ok(());
    }

    let records = store.recent(args.limit, None);

    if args.json {
        let output = serde_json::json!({
            "transfers": records,
            "summary": store.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("Recent Transfers:");
    println!("{}", "─".repeat(72));
    println!(
        "  {:16}  {:6}  {:8}  {}",
        "Date", "Method", "Outcome", "File"
    );
    println!("{}", "─".repeat(72));

    if records.is_empty() {
        println!("  (no transfer history)");
    }
    for record in &records {
        let outcome = match record.outcome {
            Outcome::Success => "ok",
            Outcome::Failed => "failed",
        };
        println!(
            "  {:16}  {:6}  {:8}  {} ({})",
            record.local_time(),
            record.method.label(),
            outcome,
            record.name,
            record.size_display
        );
        if let Some(detail) = &record.detail {
            println!("  {:16}  {detail}", "");
        }
    }

    println!("{}", "─".repeat(72));
    let summary = store.summary();
    println!(
        "  {} total ({} p2p, {} cloud), {} ok, {} failed",
        summary.total, summary.p2p, summary.cloud, summary.succeeded, summary.failed
    );
    println!();

    Ok(())
}
