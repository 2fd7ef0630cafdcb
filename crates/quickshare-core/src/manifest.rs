//! Ordered list of locally selected items and their transfer status.
//!
//! The manifest is never edited in place by selection operations. Every
//! mutating call is a round trip through the engine and the manifest adopts
//! the snapshot the engine returns, so a file the engine failed to open can
//! never show up as added.
//!
//! Items are addressed by index, the same way the engine addresses them in
//! progress events. Each adopted snapshot bumps a generation counter that
//! lets stale events be told apart from current ones.

use serde::Serialize;

use crate::engine::TransferEngine;
use crate::error::Result;
use crate::protocol::ItemSnapshot;

/// Label shown for items the engine has not reported on yet.
pub const DEFAULT_PENDING_LABEL: &str = "Waiting";

/// Matched against [`fold_label`] output, so ASCII only.
const FAILURE_MARKERS: [&str; 6] = ["fail", "error", "cancel", "hata", "basarisiz", "iptal"];

/// Lowercase with Turkish dotted/dotless `i` merged and diacritics dropped.
fn fold_label(label: &str) -> String {
    label
        .chars()
        .flat_map(char::to_lowercase)
        .filter_map(|c| match c {
            '\u{307}' => None,
            'ı' => Some('i'),
            'ş' => Some('s'),
            'ğ' => Some('g'),
            'ç' => Some('c'),
            'ö' => Some('o'),
            'ü' => Some('u'),
            other => Some(other),
        })
        .collect()
}

/// Transfer status kind of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Selected, nothing transferred yet
    #[default]
    Pending,
    /// Transfer underway
    InProgress,
    /// Transfer finished (terminal)
    Done,
    /// Transfer failed (terminal)
    Failed,
}

impl ItemStatus {
    /// Classify an engine status label and percentage.
    ///
    /// `100` is always [`ItemStatus::Done`], whatever the label says.
    #[must_use]
    pub fn classify(label: &str, percent: u8) -> Self {
        if percent >= 100 {
            return Self::Done;
        }
        let folded = fold_label(label);
        if FAILURE_MARKERS.iter().any(|m| folded.contains(m)) {
            Self::Failed
        } else if percent == 0 {
            Self::Pending
        } else {
            Self::InProgress
        }
    }

    /// Whether no further progress is expected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in progress"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One selected file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Base name
    pub name: String,
    /// Pre-formatted size
    pub size_display: String,
    /// Whether the item is a folder
    pub is_folder: bool,
    /// Status kind
    pub status: ItemStatus,
    /// Free-text status label as last reported
    pub status_label: String,
    /// Progress, 0..=100
    pub progress_percent: u8,
}

impl Item {
    fn from_snapshot(snapshot: ItemSnapshot, pending_label: &str) -> Self {
        Self {
            name: snapshot.name,
            size_display: snapshot.size_display,
            is_folder: snapshot.is_folder,
            status: ItemStatus::Pending,
            status_label: snapshot
                .status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| pending_label.to_string()),
            progress_percent: 0,
        }
    }

    /// Apply one progress report. Last write wins.
    pub fn apply_progress(&mut self, label: &str, percent: u8) {
        self.status = ItemStatus::classify(label, percent);
        self.status_label = label.to_string();
        self.progress_percent = percent;
    }
}

/// Ordered collection of selected items.
#[derive(Debug, Clone)]
pub struct FileManifest {
    items: Vec<Item>,
    generation: u64,
    pending_label: String,
}

impl Default for FileManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl FileManifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pending_label(DEFAULT_PENDING_LABEL)
    }

    /// Create an empty manifest with a custom label for fresh items.
    #[must_use]
    pub fn with_pending_label(label: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
            pending_label: label.into(),
        }
    }

    /// Replace the whole manifest with an engine snapshot.
    pub fn adopt(&mut self, snapshot: Vec<ItemSnapshot>) {
        self.items = snapshot
            .into_iter()
            .map(|s| Item::from_snapshot(s, &self.pending_label))
            .collect();
        self.generation += 1;
        tracing::debug!(
            items = self.items.len(),
            generation = self.generation,
            "adopted engine file list"
        );
    }

    /// Open the engine's file picker and adopt the resulting list.
    pub async fn select_files(&mut self, engine: &dyn TransferEngine) -> Result<()> {
        let snapshot = engine.select_files().await?;
        self.adopt(snapshot);
        Ok(())
    }

    /// Open the engine's folder picker and adopt the resulting list.
    pub async fn select_folder(&mut self, engine: &dyn TransferEngine) -> Result<()> {
        let snapshot = engine.select_folder().await?;
        self.adopt(snapshot);
        Ok(())
    }

    /// Forward dropped paths to the engine and adopt the resulting list.
    ///
    /// An empty drop issues no request.
    pub async fn add_from_drop(
        &mut self,
        engine: &dyn TransferEngine,
        paths: Vec<String>,
    ) -> Result<()> {
        if paths.is_empty() {
            tracing::debug!("ignoring empty drop");
            return Ok(());
        }
        let snapshot = engine.add_files_from_drop(paths).await?;
        self.adopt(snapshot);
        Ok(())
    }

    /// Ask the engine to clear its selection and adopt the (empty) result.
    pub async fn clear(&mut self, engine: &dyn TransferEngine) -> Result<()> {
        let snapshot = engine.clear_files().await?;
        self.adopt(snapshot);
        Ok(())
    }

    /// Read-only projection of the current items.
    #[must_use]
    pub fn render(&self) -> Vec<Item> {
        self.items.clone()
    }

    /// Borrow the current items.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Get one item by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.items.get_mut(index)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the manifest should show its empty state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current snapshot generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}
