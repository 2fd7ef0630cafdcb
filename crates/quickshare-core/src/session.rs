//! Share/connect session state machine.
//!
//! ```text
//! Idle --start_*/connect--> Starting --ok--> Active --stop--> Stopping --ack--> Idle
//!                              |                                  ^
//!                              +------------- error --------------+-> Idle
//! ```
//!
//! At most one session is live. Starting or connecting while a session is
//! `Starting`, `Active` or `Stopping` is rejected with
//! [`Error::SessionAlreadyActive`] and leaves the live session untouched.
//!
//! Each engine round trip is split into a `begin_*` step that moves the
//! machine and hands out a [`StartTicket`], and a `complete_*` continuation
//! that consumes the ticket together with the engine's typed answer. A
//! ticket outlived by a `stop()` is discarded instead of resurrecting the
//! session.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::TransferEngine;
use crate::error::{Error, Result};
use crate::protocol::{ConnectOutcome, PeerFile, ShareOutcome};

/// Transport used by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No session
    #[default]
    None,
    /// Cloud upload / web link
    Cloud,
    /// Direct peer-to-peer room
    P2p,
}

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Start or connect request in flight
    Starting,
    /// Session running
    Active,
    /// Stop request in flight
    Stopping,
}

/// Which side of the transfer this client is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Offering the local manifest
    Sender,
    /// Joined someone else's share
    Receiver,
}

/// What the session exposes to the presentation layer.
///
/// Exactly one variant is populated for an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Endpoint {
    /// P2P room code
    RoomCode(String),
    /// Public cloud link
    ShareLink(String),
    /// Files offered by a remote cloud source
    PeerListing(Vec<PeerFile>),
}

/// The live (or idle) session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Transport
    pub mode: SessionMode,
    /// Lifecycle state
    pub state: SessionState,
    /// Side of the transfer, once known
    pub role: Option<SessionRole>,
    /// Code, link or listing, once active
    pub endpoint: Option<Endpoint>,
    /// Engine status line, if any
    pub message: Option<String>,
    /// When the session became active
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Room code (P2P) or web link (cloud sender) to display.
    #[must_use]
    pub fn room_code_or_url(&self) -> Option<&str> {
        match &self.endpoint {
            Some(Endpoint::RoomCode(s) | Endpoint::ShareLink(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Listing offered by a remote cloud source.
    #[must_use]
    pub fn peer_files(&self) -> Option<&[PeerFile]> {
        match &self.endpoint {
            Some(Endpoint::PeerListing(files)) => Some(files.as_slice()),
            _ => None,
        }
    }

    /// Whether the session is anything but idle.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state != SessionState::Idle
    }
}

/// Kind of request a ticket was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// `start_cloud_share`
    CloudShare,
    /// `start_direct_share`
    DirectShare,
    /// `connect_to_peer`
    Connect,
}

/// Proof that a start/connect request was admitted.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a start ticket must be completed"]
pub struct StartTicket {
    id: u64,
    kind: StartKind,
}

impl StartTicket {
    /// The request this ticket belongs to.
    pub const fn kind(&self) -> StartKind {
        self.kind
    }
}

/// How a continuation was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The session is now active
    Activated,
    /// The ticket was outlived by a stop and the engine refused anyway;
    /// nothing is running
    Discarded,
    /// The ticket was outlived by a stop but the engine did start. Its share
    /// or room is running untracked and must be ended with `stop_share`,
    /// e.g. through [`release_orphan`].
    Orphaned,
}

/// Drives the single [`Session`].
#[derive(Debug, Default)]
pub struct SessionController {
    session: Session,
    next_ticket: u64,
    pending: Option<u64>,
}

impl SessionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Start a cloud share of the engine's current selection.
    pub async fn start_cloud_share(&mut self, engine: &dyn TransferEngine) -> Result<()> {
        let ticket = self.begin(StartKind::CloudShare)?;
        let answer = engine.start_cloud_share().await;
        let completion = self.complete_share(ticket, answer)?;
        release_orphan(engine, completion).await
    }

    /// Start a direct P2P share of the engine's current selection.
    pub async fn start_direct_share(&mut self, engine: &dyn TransferEngine) -> Result<()> {
        let ticket = self.begin(StartKind::DirectShare)?;
        let answer = engine.start_direct_share().await;
        let completion = self.complete_share(ticket, answer)?;
        release_orphan(engine, completion).await
    }

    /// Join a P2P room or open a cloud link.
    ///
    /// Blank input is rejected locally and never reaches the engine.
    pub async fn connect(&mut self, engine: &dyn TransferEngine, code_or_url: &str) -> Result<()> {
        let target = validate_target(code_or_url)?;
        let ticket = self.begin(StartKind::Connect)?;
        let answer = engine.connect_to_peer(target).await;
        let completion = self.complete_connect(ticket, answer)?;
        release_orphan(engine, completion).await
    }

    /// Stop the session. A no-op while idle.
    ///
    /// The session returns to `Idle` even if the engine reports an error;
    /// the error is still returned.
    pub async fn stop(&mut self, engine: &dyn TransferEngine) -> Result<()> {
        if !self.begin_stop() {
            tracing::debug!("stop requested while idle");
            return Ok(());
        }
        let answer = engine.stop_share().await;
        self.complete_stop(answer)
    }

    /// Admit a start/connect request: `Idle -> Starting`.
    pub fn begin(&mut self, kind: StartKind) -> Result<StartTicket> {
        if self.session.is_live() {
            tracing::warn!(state = ?self.session.state, ?kind, "rejecting start, session is live");
            return Err(Error::SessionAlreadyActive);
        }

        self.next_ticket += 1;
        let id = self.next_ticket;
        self.pending = Some(id);
        self.session = Session {
            mode: match kind {
                StartKind::CloudShare => SessionMode::Cloud,
                StartKind::DirectShare => SessionMode::P2p,
                StartKind::Connect => SessionMode::None,
            },
            state: SessionState::Starting,
            role: Some(if kind == StartKind::Connect {
                SessionRole::Receiver
            } else {
                SessionRole::Sender
            }),
            ..Session::default()
        };
        tracing::debug!(ticket = id, ?kind, "session starting");
        Ok(StartTicket { id, kind })
    }

    /// Apply the engine's answer to a share start.
    pub fn complete_share(
        &mut self,
        ticket: StartTicket,
        answer: Result<ShareOutcome>,
    ) -> Result<Completion> {
        if !self.take_pending(&ticket) {
            return discard(answer);
        }
        match answer {
            Ok(ShareOutcome::Direct { code }) => {
                self.activate(SessionMode::P2p, Endpoint::RoomCode(code), None);
                Ok(Completion::Activated)
            }
            Ok(ShareOutcome::Cloud { url }) => {
                self.activate(SessionMode::Cloud, Endpoint::ShareLink(url), None);
                Ok(Completion::Activated)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Apply the engine's answer to a connect.
    pub fn complete_connect(
        &mut self,
        ticket: StartTicket,
        answer: Result<ConnectOutcome>,
    ) -> Result<Completion> {
        if !self.take_pending(&ticket) {
            return discard(answer);
        }
        match answer {
            Ok(ConnectOutcome::Direct { code, message }) => {
                self.activate(SessionMode::P2p, Endpoint::RoomCode(code), message);
                Ok(Completion::Activated)
            }
            Ok(ConnectOutcome::Cloud { files, message }) => {
                self.activate(SessionMode::Cloud, Endpoint::PeerListing(files), message);
                Ok(Completion::Activated)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Request a stop: `Starting | Active -> Stopping`.
    ///
    /// Returns `false` when there is nothing to stop. Any pending start
    /// ticket is invalidated.
    pub fn begin_stop(&mut self) -> bool {
        match self.session.state {
            SessionState::Idle | SessionState::Stopping => false,
            SessionState::Starting | SessionState::Active => {
                self.pending = None;
                self.session.state = SessionState::Stopping;
                tracing::debug!(mode = ?self.session.mode, "session stopping");
                true
            }
        }
    }

    /// Apply the engine's stop acknowledgement: `Stopping -> Idle`.
    pub fn complete_stop(&mut self, answer: Result<()>) -> Result<()> {
        self.session = Session::default();
        match answer {
            Ok(()) => {
                tracing::info!("session stopped");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "engine reported an error while stopping");
                Err(e)
            }
        }
    }

    fn take_pending(&mut self, ticket: &StartTicket) -> bool {
        if self.pending == Some(ticket.id) && self.session.state == SessionState::Starting {
            self.pending = None;
            true
        } else {
            tracing::warn!(ticket = ticket.id, kind = ?ticket.kind, "dropping answer for a superseded request");
            false
        }
    }

    fn activate(&mut self, mode: SessionMode, endpoint: Endpoint, message: Option<String>) {
        self.session.mode = mode;
        self.session.state = SessionState::Active;
        self.session.endpoint = Some(endpoint);
        self.session.message = message;
        self.session.started_at = Some(Utc::now());
        tracing::info!(?mode, role = ?self.session.role, "session active");
    }

    fn fail(&mut self, error: Error) -> Error {
        tracing::warn!(error = %error, "session start failed");
        self.session = Session::default();
        error
    }
}

fn discard<T>(answer: Result<T>) -> Result<Completion> {
    match answer {
        Ok(_) => Ok(Completion::Orphaned),
        Err(e) => {
            tracing::debug!(error = %e, "superseded request failed");
            Ok(Completion::Discarded)
        }
    }
}

/// Send `stop_share` for an [`Completion::Orphaned`] start. Other
/// completions need nothing. A failing stop is logged, not returned.
pub async fn release_orphan(engine: &dyn TransferEngine, completion: Completion) -> Result<()> {
    if completion == Completion::Orphaned {
        tracing::info!("stopping an engine share that outlived its request");
        if let Err(e) = engine.stop_share().await {
            tracing::warn!(error = %e, "could not stop orphaned share");
        }
    }
    Ok(())
}

/// Trim a room code or link, rejecting blank input.
pub fn validate_target(code_or_url: &str) -> Result<&str> {
    let trimmed = code_or_url.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("enter a room code or link".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_direct() -> SessionController {
        let mut controller = SessionController::new();
        let ticket = controller.begin(StartKind::DirectShare).unwrap();
        controller
            .complete_share(
                ticket,
                Ok(ShareOutcome::Direct {
                    code: "482910".to_string(),
                }),
            )
            .unwrap();
        controller
    }

    #[test]
    fn test_direct_share_becomes_active() {
        let controller = active_direct();
        let session = controller.session();
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.mode, SessionMode::P2p);
        assert_eq!(session.role, Some(SessionRole::Sender));
        assert_eq!(session.room_code_or_url(), Some("482910"));
        assert!(session.peer_files().is_none());
        assert!(session.started_at.is_some());
    }

    #[test]
    fn test_begin_while_active_is_rejected() {
        let mut controller = active_direct();
        let before = controller.session().clone();
        for kind in [StartKind::CloudShare, StartKind::DirectShare, StartKind::Connect] {
            assert!(matches!(
                controller.begin(kind),
                Err(Error::SessionAlreadyActive)
            ));
        }
        assert_eq!(controller.session(), &before);
    }

    #[test]
    fn test_begin_while_starting_is_rejected() {
        let mut controller = SessionController::new();
        let _ticket = controller.begin(StartKind::CloudShare).unwrap();
        assert_eq!(controller.state(), SessionState::Starting);
        assert!(matches!(
            controller.begin(StartKind::DirectShare),
            Err(Error::SessionAlreadyActive)
        ));
        assert_eq!(controller.session().mode, SessionMode::Cloud);
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let mut controller = SessionController::new();
        let ticket = controller.begin(StartKind::CloudShare).unwrap();
        let err = controller
            .complete_share(ticket, Err(Error::Engine("tunnel timeout".to_string())))
            .unwrap_err();
        assert_eq!(err.to_string(), "tunnel timeout");
        assert_eq!(controller.session(), &Session::default());
    }

    #[test]
    fn test_connect_cloud_listing() {
        let mut controller = SessionController::new();
        let ticket = controller.begin(StartKind::Connect).unwrap();
        let files = vec![PeerFile {
            name: "report.pdf".to_string(),
            size_display: "2.00 MB".to_string(),
            raw_size: None,
        }];
        controller
            .complete_connect(
                ticket,
                Ok(ConnectOutcome::Cloud {
                    files: files.clone(),
                    message: None,
                }),
            )
            .unwrap();
        let session = controller.session();
        assert_eq!(session.mode, SessionMode::Cloud);
        assert_eq!(session.role, Some(SessionRole::Receiver));
        assert_eq!(session.peer_files(), Some(files.as_slice()));
        assert!(session.room_code_or_url().is_none());
    }

    #[test]
    fn test_stop_while_starting_discards_late_answer() {
        let mut controller = SessionController::new();
        let ticket = controller.begin(StartKind::DirectShare).unwrap();
        assert!(controller.begin_stop());
        controller.complete_stop(Ok(())).unwrap();

        let completion = controller
            .complete_share(
                ticket,
                Ok(ShareOutcome::Direct {
                    code: "111111".to_string(),
                }),
            )
            .unwrap();
        assert_eq!(completion, Completion::Orphaned);
        assert_eq!(controller.state(), SessionState::Idle);

        let ticket = controller.begin(StartKind::Connect).unwrap();
        assert!(controller.begin_stop());
        controller.complete_stop(Ok(())).unwrap();
        let completion = controller
            .complete_connect(ticket, Err(Error::Engine("room not found".to_string())))
            .unwrap();
        assert_eq!(completion, Completion::Discarded);
    }

    #[tokio::test]
    async fn test_orphaned_share_is_stopped() {
        use crate::engine::MemoryEngine;

        let engine = MemoryEngine::new().with_file("/tmp/a.txt", 10);
        engine
            .add_files_from_drop(vec!["/tmp/a.txt".to_string()])
            .await
            .unwrap();

        let mut controller = SessionController::new();
        let ticket = controller.begin(StartKind::DirectShare).unwrap();
        assert!(controller.begin_stop());
        controller.complete_stop(Ok(())).unwrap();

        let answer = engine.start_direct_share().await;
        assert!(engine.is_sharing());
        let completion = controller.complete_share(ticket, answer).unwrap();
        release_orphan(&engine, completion).await.unwrap();
        assert!(!engine.is_sharing());
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_begin_stop_is_noop_when_idle() {
        let mut controller = SessionController::new();
        assert!(!controller.begin_stop());
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_stop_error_still_resets() {
        let mut controller = active_direct();
        assert!(controller.begin_stop());
        assert_eq!(controller.state(), SessionState::Stopping);
        assert!(controller
            .complete_stop(Err(Error::Engine("already stopped".to_string())))
            .is_err());
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_validate_target() {
        assert!(matches!(validate_target(""), Err(Error::Validation(_))));
        assert!(matches!(validate_target("   \t"), Err(Error::Validation(_))));
        assert_eq!(validate_target("  482910 ").unwrap(), "482910");
    }
}
