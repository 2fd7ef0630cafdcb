//! Settings document and its load/save cycle against the engine's store.
//!
//! The engine owns persistence. The core never caches a document between
//! operations: [`SettingsSync::load`] always returns a fresh copy and
//! [`SettingsSync::save`] always sends the document it is handed.

use serde::{Deserialize, Serialize};

use crate::engine::TransferEngine;
use crate::error::{Error, Result};

/// Tunnel and signaling settings kept by the engine.
///
/// Field names on the wire follow the engine's store format. Missing fields
/// deserialize to empty strings and `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDocument {
    /// Signaling server for P2P rooms
    pub signaling_url: String,
    /// Cloudflare tunnel token
    #[serde(rename = "cf_tunnel_token")]
    pub tunnel_token: String,
    /// Fixed Cloudflare tunnel URL
    #[serde(rename = "cf_tunnel_url")]
    pub tunnel_url: String,
    /// DuckDNS domain
    #[serde(rename = "duckdns_domain")]
    pub duck_dns_domain: String,
    /// DuckDNS token
    #[serde(rename = "duckdns_token")]
    pub duck_dns_token: String,
    /// Whether DuckDNS updates are enabled
    #[serde(rename = "use_duckdns")]
    pub use_duck_dns: bool,
}

/// Names accepted by [`SettingsDocument::set_field`].
pub const FIELD_NAMES: [&str; 6] = [
    "signaling_url",
    "cf_tunnel_token",
    "cf_tunnel_url",
    "duckdns_domain",
    "duckdns_token",
    "use_duckdns",
];

impl SettingsDocument {
    /// Set one field by its wire name.
    ///
    /// `use_duckdns` accepts `true`/`false`/`1`/`0`/`yes`/`no`.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "signaling_url" => self.signaling_url = value.to_string(),
            "cf_tunnel_token" => self.tunnel_token = value.to_string(),
            "cf_tunnel_url" => self.tunnel_url = value.to_string(),
            "duckdns_domain" => self.duck_dns_domain = value.to_string(),
            "duckdns_token" => self.duck_dns_token = value.to_string(),
            "use_duckdns" => {
                self.use_duck_dns = match value.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    other => {
                        return Err(Error::Validation(format!(
                            "use_duckdns expects a boolean, got '{other}'"
                        )))
                    }
                };
            }
            other => {
                return Err(Error::Validation(format!(
                    "unknown setting '{other}' (expected one of: {})",
                    FIELD_NAMES.join(", ")
                )))
            }
        }
        Ok(())
    }
}

/// Feedback for the last save, for optimistic UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SaveStatus {
    /// Nothing saved yet
    #[default]
    Idle,
    /// A save request is in flight
    Saving,
    /// The store accepted the document; engine message verbatim
    Saved(String),
    /// The store rejected the document; engine message verbatim
    Failed(String),
}

/// Load/save cycle for [`SettingsDocument`].
#[derive(Debug, Default)]
pub struct SettingsSync {
    status: SaveStatus,
}

impl SettingsSync {
    /// Create a new settings synchronizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the document from the engine's store.
    ///
    /// A missing document is not an error and yields defaults.
    pub async fn load(&self, engine: &dyn TransferEngine) -> Result<SettingsDocument> {
        let doc = engine.get_settings().await?;
        if doc.is_none() {
            tracing::debug!("engine returned no settings, using defaults");
        }
        Ok(doc.unwrap_or_default())
    }

    /// Send `doc` to the engine's store exactly as given.
    ///
    /// Returns the store's confirmation message.
    pub async fn save(
        &mut self,
        engine: &dyn TransferEngine,
        doc: &SettingsDocument,
    ) -> Result<String> {
        self.status = SaveStatus::Saving;
        match engine.save_settings(doc).await {
            Ok(message) => {
                tracing::info!("settings saved");
                self.status = SaveStatus::Saved(message.clone());
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, "settings save failed");
                self.status = SaveStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Status of the most recent save.
    #[must_use]
    pub fn status(&self) -> &SaveStatus {
        &self.status
    }
}
