//! Single owner of all orchestration state.
//!
//! [`Orchestrator`] holds the manifest, the session, the progress router and
//! the settings synchronizer behind one `&mut self` API. Presentation code
//! reads [`ViewState`] projections and invokes operations; it never touches
//! the state directly.
//!
//! ```rust,ignore
//! use quickshare_core::{engine::MemoryEngine, Orchestrator};
//!
//! let mut app = Orchestrator::new(MemoryEngine::new().with_file("/tmp/a.txt", 1024));
//! app.add_from_drop(vec!["/tmp/a.txt".into()]).await?;
//! app.start_direct_share().await?;
//! println!("{:?}", app.snapshot().session.room_code_or_url());
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::engine::TransferEngine;
use crate::error::{Error, Result};
use crate::history::{HistoryStore, Method, TransferRecord};
use crate::manifest::{FileManifest, Item, ItemStatus};
use crate::progress::{ApplyOutcome, EngineEvent, ProgressRouter, SessionStats};
use crate::session::{Session, SessionController, SessionRole, SessionState};
use crate::settings::{SaveStatus, SettingsDocument, SettingsSync};

/// Number of notices kept.
pub const NOTICE_LIMIT: usize = 32;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Something failed
    Error,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text, verbatim from the engine where it came from there
    pub message: String,
    /// When it was raised
    pub at: DateTime<Utc>,
}

/// Read-only projection for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    /// Current manifest
    pub items: Vec<Item>,
    /// Whether the empty state should be shown
    pub is_empty: bool,
    /// Text for the empty state
    pub empty_state_text: String,
    /// Current session
    pub session: Session,
    /// Last reported session-wide stats
    pub stats: Option<SessionStats>,
    /// Most recent notice
    pub notice: Option<Notice>,
    /// Status of the last settings save
    pub save_status: SaveStatus,
    /// Whether a real engine is attached
    pub engine_attached: bool,
}

/// Owns the manifest, the session and everything that mutates them.
pub struct Orchestrator {
    engine: Box<dyn TransferEngine>,
    manifest: FileManifest,
    session: SessionController,
    router: ProgressRouter,
    settings: SettingsSync,
    history: Option<HistoryStore>,
    notices: VecDeque<Notice>,
    empty_state_text: String,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("engine_attached", &self.engine.is_attached())
            .field("manifest", &self.manifest)
            .field("session", self.session.session())
            .field("history", &self.history.as_ref().map(HistoryStore::len))
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over `engine` with default display texts.
    pub fn new(engine: impl TransferEngine + 'static) -> Self {
        Self::with_config(engine, &Config::default())
    }

    /// Create an orchestrator using the display texts from `config`.
    pub fn with_config(engine: impl TransferEngine + 'static, config: &Config) -> Self {
        Self::from_boxed(Box::new(engine), config)
    }

    /// Create an orchestrator over an already boxed engine.
    pub fn from_boxed(engine: Box<dyn TransferEngine>, config: &Config) -> Self {
        if !engine.is_attached() {
            tracing::warn!("no transfer engine attached, running with mock answers");
        }
        Self {
            engine,
            manifest: FileManifest::with_pending_label(config.ui.pending_label.clone()),
            session: SessionController::new(),
            router: ProgressRouter::new(),
            settings: SettingsSync::new(),
            history: None,
            notices: VecDeque::with_capacity(NOTICE_LIMIT),
            empty_state_text: config.ui.empty_state_text.clone(),
        }
    }

    /// Record finished transfers into `store`.
    #[must_use]
    pub fn with_history(mut self, store: HistoryStore) -> Self {
        self.history = Some(store);
        self
    }

    // ----- file list -----

    /// Open the file picker and adopt the engine's list.
    pub async fn select_files(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        let result = self.manifest.select_files(self.engine.as_ref()).await;
        self.report(result)
    }

    /// Open the folder picker and adopt the engine's list.
    pub async fn select_folder(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        let result = self.manifest.select_folder(self.engine.as_ref()).await;
        self.report(result)
    }

    /// Forward dropped paths and adopt the engine's list.
    pub async fn add_from_drop(&mut self, paths: Vec<String>) -> Result<()> {
        self.ensure_unlocked()?;
        let result = self.manifest.add_from_drop(self.engine.as_ref(), paths).await;
        self.report(result)
    }

    /// Clear the selection engine-side and adopt the empty list.
    pub async fn clear_files(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        let result = self.manifest.clear(self.engine.as_ref()).await;
        self.report(result)
    }

    // ----- session -----

    /// Start a cloud share of the current selection.
    pub async fn start_cloud_share(&mut self) -> Result<()> {
        let result = self.session.start_cloud_share(self.engine.as_ref()).await;
        self.after_start(result)
    }

    /// Start a direct P2P share of the current selection.
    pub async fn start_direct_share(&mut self) -> Result<()> {
        let result = self.session.start_direct_share(self.engine.as_ref()).await;
        self.after_start(result)
    }

    /// Join a room or open a cloud link.
    pub async fn connect(&mut self, code_or_url: &str) -> Result<()> {
        let result = self.session.connect(self.engine.as_ref(), code_or_url).await;
        self.after_start(result)
    }

    /// Stop the session. A no-op while idle.
    pub async fn stop(&mut self) -> Result<()> {
        let was_live = self.session.session().is_live();
        let result = self.session.stop(self.engine.as_ref()).await;
        if was_live {
            self.router.reset_stats();
            if result.is_ok() {
                self.notify(NoticeLevel::Info, "session stopped".to_string());
            }
        }
        self.report(result)
    }

    fn after_start(&mut self, result: Result<()>) -> Result<()> {
        if result.is_ok() {
            self.router.reset_stats();
            let session = self.session.session();
            let message = session.message.clone().unwrap_or_else(|| {
                match (session.room_code_or_url(), session.peer_files()) {
                    (Some(target), _) => format!("session active: {target}"),
                    (None, Some(files)) => format!("{} file(s) available", files.len()),
                    (None, None) => "session active".to_string(),
                }
            });
            self.notify(NoticeLevel::Info, message);
        }
        self.report(result)
    }

    // ----- settings -----

    /// Fetch the engine's settings document.
    pub async fn load_settings(&mut self) -> Result<SettingsDocument> {
        let result = self.settings.load(self.engine.as_ref()).await;
        self.report(result)
    }

    /// Send `doc` to the engine's store as given.
    pub async fn save_settings(&mut self, doc: &SettingsDocument) -> Result<String> {
        let result = self.settings.save(self.engine.as_ref(), doc).await;
        if let Ok(message) = &result {
            if !message.is_empty() {
                self.notify(NoticeLevel::Info, message.clone());
            }
        }
        self.report(result)
    }

    // ----- engine events -----

    /// Apply one engine-pushed event.
    ///
    /// Events for unknown indices are ignored. An item that reaches a
    /// terminal status during an active sending session is recorded in the
    /// history, if one is attached.
    pub fn handle_event(&mut self, event: EngineEvent) -> ApplyOutcome {
        let outcome = self.router.apply(&mut self.manifest, event);
        if let ApplyOutcome::Applied {
            index,
            status,
            became_terminal: true,
        } = outcome
        {
            self.record_finished(index, status);
        }
        outcome
    }

    fn record_finished(&mut self, index: usize, status: ItemStatus) {
        let session = self.session.session();
        if session.state != SessionState::Active || session.role != Some(SessionRole::Sender) {
            return;
        }
        let (Some(store), Some(item), Some(method)) = (
            self.history.as_mut(),
            self.manifest.get(index),
            Method::of(session.mode),
        ) else {
            return;
        };

        let mut record = TransferRecord::sent(
            method,
            session.room_code_or_url().unwrap_or_default(),
            item.name.as_str(),
            item.size_display.as_str(),
        );
        if status != ItemStatus::Done {
            record = record.failed(item.status_label.as_str());
        }

        if let Err(e) = store.record(record) {
            tracing::warn!(error = %e, "failed to record transfer history");
        }
    }

    // ----- projection -----

    /// Read-only projection of the whole state.
    pub fn snapshot(&self) -> ViewState {
        ViewState {
            items: self.manifest.render(),
            is_empty: self.manifest.is_empty(),
            empty_state_text: self.empty_state_text.clone(),
            session: self.session.session().clone(),
            stats: self.router.stats().cloned(),
            notice: self.notices.back().cloned(),
            save_status: self.settings.status().clone(),
            engine_attached: self.engine.is_attached(),
        }
    }

    /// The manifest.
    pub fn manifest(&self) -> &FileManifest {
        &self.manifest
    }

    /// The session.
    pub fn session(&self) -> &Session {
        self.session.session()
    }

    /// Attached history, if any.
    pub fn history(&self) -> Option<&HistoryStore> {
        self.history.as_ref()
    }

    /// Notices, oldest first.
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Whether a real engine is attached.
    pub fn is_attached(&self) -> bool {
        self.engine.is_attached()
    }

    fn ensure_unlocked(&mut self) -> Result<()> {
        if self.session.session().is_live() {
            return self.report(Err(Error::ManifestLocked));
        }
        Ok(())
    }

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_user_facing() {
                self.notify(NoticeLevel::Error, e.to_string());
            } else {
                tracing::warn!(error = %e, "operation failed");
            }
        }
        result
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Info => tracing::info!(%message, "notice"),
            NoticeLevel::Error => tracing::warn!(%message, "notice"),
        }
        if self.notices.len() == NOTICE_LIMIT {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, MissingHostEngine};
    use crate::session::SessionMode;

    fn engine() -> MemoryEngine {
        MemoryEngine::new()
            .with_file("/tmp/a.txt", 10 * 1024 * 1024)
            .with_file("/tmp/b.txt", 2048)
            .with_room_code("482910")
    }

    #[tokio::test]
    async fn test_manifest_locked_while_sharing() {
        let engine = engine();
        let mut app = Orchestrator::new(engine.clone());
        app.add_from_drop(vec!["/tmp/a.txt".to_string()]).await.unwrap();
        app.start_direct_share().await.unwrap();

        let calls = engine.call_count();
        assert!(matches!(app.clear_files().await, Err(Error::ManifestLocked)));
        assert_eq!(engine.call_count(), calls);
        assert_eq!(app.manifest().len(), 1);

        app.stop().await.unwrap();
        app.clear_files().await.unwrap();
        assert!(app.snapshot().is_empty);
    }

    #[tokio::test]
    async fn test_engine_error_becomes_notice() {
        let mut app = Orchestrator::new(engine());
        let err = app.start_cloud_share().await.unwrap_err();
        assert_eq!(err.to_string(), "no files selected");

        let view = app.snapshot();
        assert_eq!(view.session.state, SessionState::Idle);
        let notice = view.notice.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "no files selected");
    }

    #[tokio::test]
    async fn test_notice_log_is_bounded() {
        let mut app = Orchestrator::new(engine());
        for _ in 0..(NOTICE_LIMIT + 5) {
            let _ = app.connect(" ").await;
        }
        assert_eq!(app.notices().count(), NOTICE_LIMIT);
    }

    #[tokio::test]
    async fn test_stats_reset_on_stop() {
        let mut app = Orchestrator::new(engine());
        app.add_from_drop(vec!["/tmp/b.txt".to_string()]).await.unwrap();
        app.start_direct_share().await.unwrap();
        app.handle_event(EngineEvent::Stats(crate::progress::StatsEvent {
            speed: "1.00 MB/s".to_string(),
            total_sent: "1.00 MB".to_string(),
        }));
        assert!(app.snapshot().stats.is_some());

        app.stop().await.unwrap();
        assert!(app.snapshot().stats.is_none());
        assert_eq!(app.snapshot().session.mode, SessionMode::None);
    }

    #[tokio::test]
    async fn test_missing_host_degrades() {
        let mut app = Orchestrator::new(MissingHostEngine);
        assert!(!app.snapshot().engine_attached);

        app.select_files().await.unwrap();
        assert_eq!(app.manifest().len(), 1);

        assert!(matches!(
            app.select_folder().await,
            Err(Error::MissingHost("select_folder"))
        ));

        app.start_direct_share().await.unwrap();
        assert_eq!(app.session().room_code_or_url(), Some("482910"));
        app.stop().await.unwrap();

        let doc = app.load_settings().await.unwrap();
        assert_eq!(doc, SettingsDocument::default());
    }
}
