//! Common test utilities for `QuickShare` integration tests.

#![allow(dead_code)]

use quickshare_core::engine::MemoryEngine;
use quickshare_core::protocol::PeerFile;
use quickshare_core::Orchestrator;

/// Room code used by engines built with [`engine_with_files`].
pub const ROOM_CODE: &str = "482910";

/// Paths registered by [`engine_with_files`].
pub const A_TXT: &str = "/home/user/a.txt";
pub const B_TXT: &str = "/home/user/b.txt";
pub const PHOTOS: &str = "/home/user/photos";

/// Cloud link with a registered remote listing.
pub const REMOTE_URL: &str = "https://remote.trycloudflare.com";

/// Create a temporary directory for test files.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// An in-memory engine with two files, a folder and a fixed room code.
pub fn engine_with_files() -> MemoryEngine {
    MemoryEngine::new()
        .with_file(A_TXT, 10 * 1024 * 1024)
        .with_file(B_TXT, 3 * 1024)
        .with_folder(PHOTOS, 2 * 1024 * 1024 * 1024)
        .with_room_code(ROOM_CODE)
        .with_remote_listing(REMOTE_URL, remote_listing())
}

/// Files offered at [`REMOTE_URL`].
pub fn remote_listing() -> Vec<PeerFile> {
    vec![
        PeerFile {
            name: "slides.pdf".to_string(),
            size_display: "4.20 MB".to_string(),
            raw_size: Some(4_404_019),
        },
        PeerFile {
            name: "notes.md".to_string(),
            size_display: "1.00 KB".to_string(),
            raw_size: None,
        },
    ]
}

/// An orchestrator over a fresh [`engine_with_files`], plus a handle to it.
pub fn orchestrator() -> (Orchestrator, MemoryEngine) {
    let engine = engine_with_files();
    (Orchestrator::new(engine.clone()), engine)
}

/// Select `paths` through the file picker.
pub async fn pick(app: &mut Orchestrator, engine: &MemoryEngine, paths: &[&str]) {
    engine.queue_file_pick(paths.iter().copied());
    app.select_files().await.expect("select_files failed");
}
