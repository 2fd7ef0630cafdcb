//! The external transfer engine contract.
//!
//! The orchestration layer never talks to pickers, tunnels or peers itself.
//! It issues one request per user intent through [`TransferEngine`] and
//! adopts whatever the engine answers. Three implementations exist and one is
//! picked when the [`Orchestrator`](crate::Orchestrator) is built:
//!
//! - [`BridgeEngine`] - line-delimited JSON over a child process or any
//!   byte stream
//! - [`MemoryEngine`] - in-memory engine double with scripted behavior
//! - [`MissingHostEngine`] - no engine attached; documented mock answers or
//!   [`Error::MissingHost`](crate::Error::MissingHost)

pub mod bridge;
pub mod memory;
pub mod missing;

pub use bridge::{BridgeEngine, BridgeProcess};
pub use memory::MemoryEngine;
pub use missing::MissingHostEngine;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{ConnectOutcome, ItemSnapshot, ShareOutcome};
use crate::settings::SettingsDocument;

/// Request/response API of the transfer engine.
///
/// Every method is one round trip. Snapshot-returning calls answer with the
/// complete resulting file list, never a delta.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Open the native file picker; returns the full resulting list.
    async fn select_files(&self) -> Result<Vec<ItemSnapshot>>;

    /// Open the native folder picker; returns the full resulting list.
    async fn select_folder(&self) -> Result<Vec<ItemSnapshot>>;

    /// Add dropped local paths; unusable paths are skipped engine-side.
    async fn add_files_from_drop(&self, paths: Vec<String>) -> Result<Vec<ItemSnapshot>>;

    /// Clear the selection; returns the (empty) list.
    async fn clear_files(&self) -> Result<Vec<ItemSnapshot>>;

    /// Start sharing the selection through a public web link.
    async fn start_cloud_share(&self) -> Result<ShareOutcome>;

    /// Start sharing the selection through a P2P room.
    async fn start_direct_share(&self) -> Result<ShareOutcome>;

    /// Stop whatever share or connection is running.
    async fn stop_share(&self) -> Result<()>;

    /// Join a P2P room or resolve a cloud link. Input is already trimmed.
    async fn connect_to_peer(&self, code_or_url: &str) -> Result<ConnectOutcome>;

    /// Fetch the settings document; `None` when the store is empty.
    async fn get_settings(&self) -> Result<Option<SettingsDocument>>;

    /// Persist the settings document; returns the store's message.
    async fn save_settings(&self, settings: &SettingsDocument) -> Result<String>;

    /// Whether a real engine is behind this handle.
    fn is_attached(&self) -> bool {
        true
    }
}
