//! # QuickShare Core Library
//!
//! `quickshare-core` is the client-side orchestration layer of a
//! peer-to-peer / cloud file-sharing application. It keeps the list of
//! selected files, drives one share or connect session through its
//! lifecycle and folds the transfer engine's asynchronous answers and
//! progress pushes back into observable state.
//!
//! The transfer engine itself (pickers, tunnels, signaling, uploads) is an
//! external collaborator reached through the [`engine::TransferEngine`]
//! contract.
//!
//! ## Modules
//!
//! - [`config`] - Local configuration management
//! - [`engine`] - Engine contract plus bridge, in-memory and missing-host engines
//! - [`error`] - Error taxonomy
//! - [`format`] - Size and speed display strings
//! - [`history`] - Transfer history tracking and persistence
//! - [`manifest`] - Selected files and their per-item status
//! - [`orchestrator`] - Single owner of all state, with a read-only projection
//! - [`progress`] - Routing of engine-pushed progress and stats
//! - [`protocol`] - Engine wire types and typed outcomes
//! - [`session`] - Share/connect session state machine
//! - [`settings`] - Settings document load/save cycle
//!
//! ## Example
//!
//! ```rust,ignore
//! use quickshare_core::{engine::MemoryEngine, Orchestrator};
//!
//! let engine = MemoryEngine::new().with_file("/tmp/report.pdf", 2048);
//! let mut app = Orchestrator::new(engine);
//! app.add_from_drop(vec!["/tmp/report.pdf".into()]).await?;
//! app.start_direct_share().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod history;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod settings;

pub use error::{Error, Result};
pub use orchestrator::{Notice, NoticeLevel, Orchestrator, ViewState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
