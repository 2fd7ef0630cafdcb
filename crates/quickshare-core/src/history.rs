//! Transfer history.
//!
//! One record per item this machine shared that reached a final status.
//! Records live in a JSON file in append order; the oldest are dropped
//! once `max_entries` is exceeded and, if configured, anything older than
//! `auto_clear_days` is pruned when the file is opened.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::session::SessionMode;

const HISTORY_FILE: &str = "history.json";

/// Transport a record went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Direct room
    P2p,
    /// Public link
    Cloud,
}

impl Method {
    /// Transport of a session mode; `None` while idle.
    #[must_use]
    pub const fn of(mode: SessionMode) -> Option<Self> {
        match mode {
            SessionMode::P2p => Some(Self::P2p),
            SessionMode::Cloud => Some(Self::Cloud),
            SessionMode::None => None,
        }
    }

    /// Short label for listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::P2p => "p2p",
            Self::Cloud => "cloud",
        }
    }
}

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Went through
    Success,
    /// Engine reported a failure
    Failed,
}

/// A single finished outgoing transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Record id
    pub id: Uuid,
    /// When the item finished
    pub recorded_at: DateTime<Utc>,
    /// File name as listed in the manifest
    pub name: String,
    /// Size as the engine displayed it
    pub size_display: String,
    /// Room or link
    pub method: Method,
    /// Room code or link of the session
    pub endpoint: String,
    /// Final outcome
    pub outcome: Outcome,
    /// Engine status label of a failed item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TransferRecord {
    /// A successful outgoing transfer, stamped now.
    #[must_use]
    pub fn sent(
        method: Method,
        endpoint: impl Into<String>,
        name: impl Into<String>,
        size_display: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            name: name.into(),
            size_display: size_display.into(),
            method,
            endpoint: endpoint.into(),
            outcome: Outcome::Success,
            detail: None,
        }
    }

    /// Turn the record into a failure carrying the engine's label.
    #[must_use]
    pub fn failed(mut self, detail: impl Into<String>) -> Self {
        self.outcome = Outcome::Failed;
        self.detail = Some(detail.into());
        self
    }

    /// Local time of the record, minute precision.
    #[must_use]
    pub fn local_time(&self) -> String {
        self.recorded_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

/// Counts over the stored records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    /// All records
    pub total: usize,
    /// Records shared through a P2P room
    pub p2p: usize,
    /// Records shared through a cloud link
    pub cloud: usize,
    /// Successful records
    pub succeeded: usize,
    /// Failed records
    pub failed: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    transfers: Vec<TransferRecord>,
}

/// File-backed transfer history.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    /// Oldest first
    records: Vec<TransferRecord>,
    config: HistoryConfig,
}

impl HistoryStore {
    /// Open the store in the platform data directory.
    pub fn load(config: HistoryConfig) -> Result<Self> {
        let path = Self::default_path().unwrap_or_else(|| PathBuf::from(HISTORY_FILE));
        Self::open(path, config)
    }

    /// Open the store at `path`.
    ///
    /// A missing file is an empty history. So is an unreadable one: the
    /// damage is logged and the file is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>, config: HistoryConfig) -> Result<Self> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HistoryFile>(&bytes) {
                Ok(file) => file.transfers,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable history");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut store = Self {
            path,
            records,
            config,
        };
        store.prune_expired();
        Ok(store)
    }

    /// `<data dir>/history.json`, if the platform has a data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "quickshare", "QuickShare")
            .map(|dirs| dirs.data_dir().join(HISTORY_FILE))
    }

    /// Append a record, trim the oldest past `max_entries` and persist.
    /// Disabled history ignores the call.
    pub fn record(&mut self, record: TransferRecord) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        self.records.push(record);
        let excess = self.records.len().saturating_sub(self.config.max_entries);
        self.records.drain(..excess);
        self.persist()
    }

    /// Up to `limit` records, newest first, optionally for one method.
    #[must_use]
    pub fn recent(&self, limit: Option<usize>, method: Option<Method>) -> Vec<&TransferRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| method.is_none_or(|m| r.method == m))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// The most recent record.
    #[must_use]
    pub fn last(&self) -> Option<&TransferRecord> {
        self.records.last()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counts by method and outcome.
    #[must_use]
    pub fn summary(&self) -> HistorySummary {
        let mut summary = HistorySummary {
            total: self.records.len(),
            ..HistorySummary::default()
        };
        for record in &self.records {
            match record.method {
                Method::P2p => summary.p2p += 1,
                Method::Cloud => summary.cloud += 1,
            }
            match record.outcome {
                Outcome::Success => summary.succeeded += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Drop every record and persist.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.persist()
    }

    /// Write through a sibling temp file so a crash never leaves half a file.
    fn persist(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let body = serde_json::to_vec_pretty(&HistoryFile {
            transfers: self.records.clone(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn prune_expired(&mut self) {
        let Some(days) = self.config.auto_clear_days else {
            return;
        };
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let before = self.records.len();
        self.records.retain(|r| r.recorded_at >= cutoff);
        let removed = before - self.records.len();
        if removed > 0 {
            tracing::debug!(removed, days, "pruned expired history records");
        }
    }
}
