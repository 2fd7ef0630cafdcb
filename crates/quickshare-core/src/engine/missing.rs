//! Stand-in used when no transfer engine is attached.
//!
//! | Call | Behavior |
//! |------|----------|
//! | `select_files` | one sample file, `test_file.txt` |
//! | `add_files_from_drop` | one entry per distinct path, sized from local metadata |
//! | `clear_files` | empty list |
//! | `start_direct_share` | mock room `482910` |
//! | `stop_share` | acknowledged |
//! | `connect_to_peer` | mock P2P room named after the input |
//! | `get_settings` | empty store |
//! | everything else | [`Error::MissingHost`] |

use std::path::Path;

use async_trait::async_trait;

use super::TransferEngine;
use crate::error::{Error, Result};
use crate::format::format_size;
use crate::protocol::{ConnectOutcome, ItemSnapshot, ShareOutcome};
use crate::settings::SettingsDocument;

/// Room code handed out by the mock direct share.
pub const MOCK_ROOM_CODE: &str = "482910";

/// Engine handle with nothing behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingHostEngine;

#[async_trait]
impl TransferEngine for MissingHostEngine {
    async fn select_files(&self) -> Result<Vec<ItemSnapshot>> {
        tracing::debug!("no engine attached, returning sample selection");
        Ok(vec![ItemSnapshot::file("test_file.txt", "15.00 MB")])
    }

    async fn select_folder(&self) -> Result<Vec<ItemSnapshot>> {
        Err(Error::MissingHost("select_folder"))
    }

    async fn add_files_from_drop(&self, paths: Vec<String>) -> Result<Vec<ItemSnapshot>> {
        tracing::debug!(count = paths.len(), "no engine attached, listing dropped paths");
        let mut items: Vec<ItemSnapshot> = Vec::with_capacity(paths.len());
        for path in paths {
            if items.iter().any(|item| item.path.as_deref() == Some(path.as_str())) {
                continue;
            }
            items.push(dropped_entry(path));
        }
        Ok(items)
    }

    async fn clear_files(&self) -> Result<Vec<ItemSnapshot>> {
        Ok(Vec::new())
    }

    async fn start_cloud_share(&self) -> Result<ShareOutcome> {
        Err(Error::MissingHost("start_cloud_share"))
    }

    async fn start_direct_share(&self) -> Result<ShareOutcome> {
        Ok(ShareOutcome::Direct {
            code: MOCK_ROOM_CODE.to_string(),
        })
    }

    async fn stop_share(&self) -> Result<()> {
        Ok(())
    }

    async fn connect_to_peer(&self, code_or_url: &str) -> Result<ConnectOutcome> {
        Ok(ConnectOutcome::Direct {
            code: code_or_url.to_string(),
            message: Some(format!("mock P2P connection: {code_or_url}")),
        })
    }

    async fn get_settings(&self) -> Result<Option<SettingsDocument>> {
        Ok(None)
    }

    async fn save_settings(&self, _settings: &SettingsDocument) -> Result<String> {
        Err(Error::MissingHost("save_settings"))
    }

    fn is_attached(&self) -> bool {
        false
    }
}

fn dropped_entry(path: String) -> ItemSnapshot {
    let local = Path::new(&path);
    let name = local
        .file_name()
        .map_or_else(|| path.clone(), |n| n.to_string_lossy().into_owned());
    let mut item = match std::fs::metadata(local) {
        Ok(meta) if meta.is_dir() => ItemSnapshot::folder(name, "-"),
        Ok(meta) => ItemSnapshot::file(name, format_size(meta.len())),
        Err(_) => ItemSnapshot::file(name, "-"),
    };
    item.path = Some(path);
    item
}
