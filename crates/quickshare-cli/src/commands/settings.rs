//! Settings command implementation.

use anyhow::Result;

use quickshare_core::settings::SettingsDocument;

use super::{Runtime, SettingsAction, SettingsArgs};

/// Run the settings command.
pub async fn run(args: SettingsArgs, engine: Option<&str>) -> Result<()> {
    let config = super::load_config();
    let mut session = Runtime::open(&config, engine, false)?;

    match args.action {
        SettingsAction::Show { json } => {
            let doc = session.app.load_settings().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                display(&doc);
            }
        }

        SettingsAction::Set { field, value } => {
            let mut doc = session.app.load_settings().await?;
            doc.set_field(&field, &value)?;
            let message = session.app.save_settings(&doc).await?;
            if message.is_empty() {
                println!("Set {} = {}", field, value);
            } else {
                println!("{message}");
            }
        }
    }

    Ok(())
}

fn display(doc: &SettingsDocument) {
    println!();
    println!("Engine Settings");
    println!("{}", "─".repeat(50));
    println!();
    println!("  signaling_url   = \"{}\"", doc.signaling_url);
    println!("  cf_tunnel_url   = \"{}\"", doc.tunnel_url);
    println!("  cf_tunnel_token = \"{}\"", mask(&doc.tunnel_token));
    println!("  duckdns_domain  = \"{}\"", doc.duck_dns_domain);
    println!("  duckdns_token   = \"{}\"", mask(&doc.duck_dns_token));
    println!("  use_duckdns     = {}", doc.use_duck_dns);
    println!();
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "*".repeat(secret.chars().count().min(8))
    }
}
