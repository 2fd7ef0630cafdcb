//! Config command implementation.

use anyhow::Result;

use quickshare_core::config::{format_timeout, Config};

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Show => {
            let config = Config::load()?;
            println!();
            println!("QuickShare Configuration");
            println!("{}", "─".repeat(50));
            println!();
            println!("[engine]");
            match &config.engine.command {
                Some(command) => println!("  command = \"{}\"", command),
                None => println!("  command = (none, mock answers)"),
            }
            println!("  args = {:?}", config.engine.args);
            println!(
                "  request_timeout = \"{}\"",
                format_timeout(config.engine.request_timeout)
            );
            println!();
            println!("[history]");
            println!("  enabled = {}", config.history.enabled);
            println!("  max_entries = {}", config.history.max_entries);
            match config.history.auto_clear_days {
                Some(days) => println!("  auto_clear_days = {}", days),
                None => println!("  auto_clear_days = (never)"),
            }
            println!();
            println!("[ui]");
            println!("  empty_state_text = \"{}\"", config.ui.empty_state_text);
            println!("  pending_label = \"{}\"", config.ui.pending_label);
            println!();
        }
    }

    Ok(())
}
