//! In-memory transfer engine.
//!
//! Behaves like the external engine as seen through its API: it keeps a
//! de-duplicated list of selected paths over a virtual file system, hands out
//! 6-digit room codes, tells cloud links from room codes by their scheme and
//! stores one settings document. Picker results, remote listings and failures
//! are scripted up front, and every request is logged so tests can assert on
//! what reached the engine.
//!
//! Handles are cheap to clone and share state, so a test can keep one while
//! the [`Orchestrator`](crate::Orchestrator) owns another.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;

use super::TransferEngine;
use crate::error::{Error, Result};
use crate::format::{format_size, format_speed};
use crate::progress::{EngineEvent, ProgressEvent, StatsEvent};
use crate::protocol::{ConnectOutcome, EngineCall, ItemSnapshot, PeerFile, ResponseBody, ShareOutcome};
use crate::settings::SettingsDocument;

/// Public link handed out by cloud shares unless overridden.
pub const DEFAULT_PUBLIC_URL: &str = "https://quickshare.trycloudflare.com";

const NO_FILES_SELECTED: &str = "no files selected";
const SHARE_ALREADY_ACTIVE: &str = "a share is already active";

#[derive(Debug, Clone, Copy)]
struct VirtualEntry {
    size: u64,
    is_folder: bool,
}

#[derive(Debug)]
struct State {
    fs: BTreeMap<String, VirtualEntry>,
    file_picks: VecDeque<Vec<String>>,
    folder_picks: VecDeque<String>,
    selection: Vec<String>,
    share: Option<ShareOutcome>,
    room_code: Option<String>,
    public_url: String,
    remote_listings: HashMap<String, Vec<PeerFile>>,
    settings: Option<SettingsDocument>,
    failures: HashMap<&'static str, String>,
    calls: Vec<EngineCall>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            fs: BTreeMap::new(),
            file_picks: VecDeque::new(),
            folder_picks: VecDeque::new(),
            selection: Vec::new(),
            share: None,
            room_code: None,
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            remote_listings: HashMap::new(),
            settings: None,
            failures: HashMap::new(),
            calls: Vec::new(),
            events: None,
        }
    }
}

impl State {
    fn select(&mut self, path: &str) -> bool {
        if self.selection.iter().any(|p| p == path) {
            return false;
        }
        if !self.fs.contains_key(path) {
            tracing::debug!(path, "skipping unknown path");
            return false;
        }
        self.selection.push(path.to_string());
        true
    }

    fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.selection
            .iter()
            .filter_map(|path| {
                let entry = self.fs.get(path)?;
                let name = Path::new(path)
                    .file_name()
                    .map_or_else(|| path.clone(), |n| n.to_string_lossy().into_owned());
                let size = format_size(entry.size);
                let mut item = if entry.is_folder {
                    ItemSnapshot::folder(name, size)
                } else {
                    ItemSnapshot::file(name, size)
                };
                item.path = Some(path.clone());
                Some(item)
            })
            .collect()
    }

    fn share_precondition(&self) -> Option<ResponseBody> {
        if self.selection.is_empty() {
            Some(ResponseBody::failure(NO_FILES_SELECTED))
        } else if self.share.is_some() {
            Some(ResponseBody::failure(SHARE_ALREADY_ACTIVE))
        } else {
            None
        }
    }
}

/// Scriptable in-memory [`TransferEngine`].
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<State>>,
}

impl MemoryEngine {
    /// Create an engine with an empty virtual file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a file in the virtual file system.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, size: u64) -> Self {
        self.lock().fs.insert(
            path.into(),
            VirtualEntry {
                size,
                is_folder: false,
            },
        );
        self
    }

    /// Register a folder with its total size.
    #[must_use]
    pub fn with_folder(self, path: impl Into<String>, size: u64) -> Self {
        self.lock().fs.insert(
            path.into(),
            VirtualEntry {
                size,
                is_folder: true,
            },
        );
        self
    }

    /// Use a fixed room code instead of a random one.
    #[must_use]
    pub fn with_room_code(self, code: impl Into<String>) -> Self {
        self.lock().room_code = Some(code.into());
        self
    }

    /// Use a different public link for cloud shares.
    #[must_use]
    pub fn with_public_url(self, url: impl Into<String>) -> Self {
        self.lock().public_url = url.into();
        self
    }

    /// Make a cloud link resolvable to the given listing.
    #[must_use]
    pub fn with_remote_listing(self, url: impl Into<String>, files: Vec<PeerFile>) -> Self {
        self.lock().remote_listings.insert(url.into(), files);
        self
    }

    /// Pre-populate the settings store.
    #[must_use]
    pub fn with_settings(self, settings: SettingsDocument) -> Self {
        self.lock().settings = Some(settings);
        self
    }

    /// Queue the paths the next file picker will return.
    ///
    /// With nothing queued the picker behaves as if the user cancelled it.
    pub fn queue_file_pick<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .file_picks
            .push_back(paths.into_iter().map(Into::into).collect());
    }

    /// Queue the path the next folder picker will return.
    pub fn queue_folder_pick(&self, path: impl Into<String>) {
        self.lock().folder_picks.push_back(path.into());
    }

    /// Make the next request named `call` fail with `message`.
    pub fn fail_next(&self, call: &'static str, message: impl Into<String>) {
        self.lock().failures.insert(call, message.into());
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// The settings document currently stored.
    #[must_use]
    pub fn stored_settings(&self) -> Option<SettingsDocument> {
        self.lock().settings.clone()
    }

    /// Whether a share is running engine-side.
    #[must_use]
    pub fn is_sharing(&self) -> bool {
        self.lock().share.is_some()
    }

    /// Open the event stream. A new subscription replaces the previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().events = Some(tx);
        rx
    }

    /// Push an event to the subscriber. Returns `false` when nobody listens.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.lock()
            .events
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Push a progress event for one item.
    pub fn push_progress(&self, index: i64, status: impl Into<String>, percent: i64) -> bool {
        self.emit(EngineEvent::Progress(ProgressEvent::new(index, status, percent)))
    }

    /// Push a stats event.
    pub fn push_stats(&self, speed: impl Into<String>, total_sent: impl Into<String>) -> bool {
        self.emit(EngineEvent::Stats(StatsEvent {
            speed: speed.into(),
            total_sent: total_sent.into(),
        }))
    }

    /// Push a stats event from raw numbers, formatted the way the engine
    /// formats them.
    pub fn push_rate(&self, bytes_per_second: f64, sent_bytes: u64) -> bool {
        self.push_stats(format_speed(bytes_per_second), format_size(sent_bytes))
    }

    fn handle<T>(&self, call: EngineCall, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        let name = call.name();
        tracing::trace!(call = name, "memory engine request");
        state.calls.push(call);
        if let Some(message) = state.failures.remove(name) {
            return Err(Error::Engine(message));
        }
        f(&mut state)
    }
}

#[async_trait]
impl TransferEngine for MemoryEngine {
    async fn select_files(&self) -> Result<Vec<ItemSnapshot>> {
        self.handle(EngineCall::SelectFiles, |state| {
            if let Some(paths) = state.file_picks.pop_front() {
                for path in &paths {
                    state.select(path);
                }
            }
            Ok(state.snapshot())
        })
    }

    async fn select_folder(&self) -> Result<Vec<ItemSnapshot>> {
        self.handle(EngineCall::SelectFolder, |state| {
            if let Some(path) = state.folder_picks.pop_front() {
                if state.fs.get(&path).is_some_and(|e| e.is_folder) {
                    state.select(&path);
                }
            }
            Ok(state.snapshot())
        })
    }

    async fn add_files_from_drop(&self, paths: Vec<String>) -> Result<Vec<ItemSnapshot>> {
        self.handle(
            EngineCall::AddFilesFromDrop {
                paths: paths.clone(),
            },
            |state| {
                for path in &paths {
                    state.select(path);
                }
                Ok(state.snapshot())
            },
        )
    }

    async fn clear_files(&self) -> Result<Vec<ItemSnapshot>> {
        self.handle(EngineCall::ClearFiles, |state| {
            state.selection.clear();
            Ok(state.snapshot())
        })
    }

    async fn start_cloud_share(&self) -> Result<ShareOutcome> {
        self.handle(EngineCall::StartCloudShare, |state| {
            let body = state
                .share_precondition()
                .unwrap_or_else(|| ResponseBody::cloud_link(state.public_url.clone()));
            let outcome = body.into_share()?;
            state.share = Some(outcome.clone());
            Ok(outcome)
        })
    }

    async fn start_direct_share(&self) -> Result<ShareOutcome> {
        self.handle(EngineCall::StartDirectShare, |state| {
            let body = state.share_precondition().unwrap_or_else(|| {
                let code = state.room_code.clone().unwrap_or_else(|| {
                    rand::thread_rng()
                        .gen_range(100_000..1_000_000u32)
                        .to_string()
                });
                ResponseBody::p2p(code)
            });
            let outcome = body.into_share()?;
            state.share = Some(outcome.clone());
            Ok(outcome)
        })
    }

    async fn stop_share(&self) -> Result<()> {
        self.handle(EngineCall::StopShare, |state| {
            state.share = None;
            ResponseBody::with_message("share stopped")
                .into_message()
                .map(|_| ())
        })
    }

    async fn connect_to_peer(&self, code_or_url: &str) -> Result<ConnectOutcome> {
        let target = code_or_url.to_string();
        self.handle(
            EngineCall::ConnectToPeer {
                code_or_url: target.clone(),
            },
            |state| {
                let body = if target.starts_with("http://") || target.starts_with("https://") {
                    state.remote_listings.get(&target).map_or_else(
                        || ResponseBody::failure(format!("could not reach {target}")),
                        |files| ResponseBody::cloud_listing(target.clone(), files.clone()),
                    )
                } else {
                    let mut body = ResponseBody::p2p(target.clone());
                    body.message = Some(format!("joined room {target}"));
                    body
                };
                body.into_connect()
            },
        )
    }

    async fn get_settings(&self) -> Result<Option<SettingsDocument>> {
        self.handle(EngineCall::GetSettings, |state| Ok(state.settings.clone()))
    }

    async fn save_settings(&self, settings: &SettingsDocument) -> Result<String> {
        self.handle(
            EngineCall::SaveSettings {
                settings: settings.clone(),
            },
            |state| {
                state.settings = Some(settings.clone());
                ResponseBody::with_message("settings saved").into_message()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MemoryEngine {
        MemoryEngine::new()
            .with_file("/home/u/a.txt", 10 * 1024 * 1024)
            .with_file("/home/u/b.bin", 512)
            .with_folder("/home/u/photos", 3 * 1024 * 1024 * 1024)
    }

    #[tokio::test]
    async fn test_drop_dedups_and_skips_unknown() {
        let engine = engine();
        let list = engine
            .add_files_from_drop(vec![
                "/home/u/a.txt".to_string(),
                "/nope".to_string(),
                "/home/u/a.txt".to_string(),
                "/home/u/photos".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "a.txt");
        assert_eq!(list[0].size_display, "10.00 MB");
        assert!(list[1].is_folder);
        assert_eq!(list[1].size_display, "3.00 GB");
    }

    #[tokio::test]
    async fn test_cancelled_picker_keeps_selection() {
        let engine = engine();
        engine.queue_file_pick(["/home/u/b.bin"]);
        assert_eq!(engine.select_files().await.unwrap().len(), 1);
        assert_eq!(engine.select_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_share_preconditions() {
        let engine = engine().with_room_code("482910");
        let err = engine.start_direct_share().await.unwrap_err();
        assert_eq!(err.to_string(), NO_FILES_SELECTED);

        engine.queue_file_pick(["/home/u/a.txt"]);
        engine.select_files().await.unwrap();
        assert_eq!(
            engine.start_direct_share().await.unwrap(),
            ShareOutcome::Direct {
                code: "482910".to_string()
            }
        );
        let err = engine.start_cloud_share().await.unwrap_err();
        assert_eq!(err.to_string(), SHARE_ALREADY_ACTIVE);

        engine.stop_share().await.unwrap();
        assert!(!engine.is_sharing());
        assert!(matches!(
            engine.start_cloud_share().await.unwrap(),
            ShareOutcome::Cloud { .. }
        ));
    }

    #[tokio::test]
    async fn test_random_room_code_is_six_digits() {
        let engine = engine();
        engine.add_files_from_drop(vec!["/home/u/b.bin".to_string()]).await.unwrap();
        match engine.start_direct_share().await.unwrap() {
            ShareOutcome::Direct { code } => {
                assert_eq!(code.len(), 6);
                assert!(code.chars().all(|c| c.is_ascii_digit()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_routes_by_scheme() {
        let files = vec![PeerFile {
            name: "x.zip".to_string(),
            size_display: "1.00 MB".to_string(),
            raw_size: Some(1_048_576),
        }];
        let engine = MemoryEngine::new().with_remote_listing("https://peer.example", files.clone());

        assert!(matches!(
            engine.connect_to_peer("https://peer.example").await.unwrap(),
            ConnectOutcome::Cloud { files: ref f, .. } if f == &files
        ));
        assert!(matches!(
            engine.connect_to_peer("123456").await.unwrap(),
            ConnectOutcome::Direct { ref code, .. } if code == "123456"
        ));
        assert!(matches!(
            engine.connect_to_peer("http://gone.example").await,
            Err(Error::Engine(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let engine = engine();
        engine.fail_next("clear_files", "disk on fire");
        assert!(engine.clear_files().await.is_err());
        assert!(engine.clear_files().await.is_ok());
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn test_events_reach_subscriber() {
        let engine = MemoryEngine::new();
        assert!(!engine.push_stats("1.00 MB/s", "2.00 MB"));
        let mut rx = engine.subscribe();
        assert!(engine.push_progress(0, "Gönderiliyor", 10));
        assert!(matches!(rx.recv().await, Some(EngineEvent::Progress(_))));
    }
}
