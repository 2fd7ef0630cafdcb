//! Error types for QuickShare.
//!
//! Every fallible orchestration operation returns [`Result`]. Remote failures
//! reported by the transfer engine keep their message verbatim in
//! [`Error::Engine`] so the presentation layer can show exactly what the
//! engine said.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for QuickShare operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for QuickShare.
#[derive(Error, Debug)]
pub enum Error {
    /// Local input rejected before any engine request was issued
    #[error("{0}")]
    Validation(String),

    /// The transfer engine answered `{success: false, error}`
    #[error("{0}")]
    Engine(String),

    /// A share or connect session is already starting or active
    #[error("a session is already active")]
    SessionAlreadyActive,

    /// The file list cannot change while a session is live
    #[error("the file list is locked while a session is active; stop it first")]
    ManifestLocked,

    /// No transfer engine is attached to the application
    #[error("no transfer engine attached: '{0}' is unavailable")]
    MissingHost(&'static str),

    /// The bridge transport to the engine failed or closed
    #[error("engine transport error: {0}")]
    Transport(String),

    /// The engine did not answer within the request timeout, in milliseconds
    #[error("engine request timed out after {0} ms")]
    Timeout(u64),

    /// A frame or response body did not match the expected shape
    #[error("invalid engine message: {0}")]
    Protocol(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns whether the error should be surfaced to the user as a notice.
    ///
    /// Local configuration and I/O failures are logged but not shown as
    /// session notices.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Engine(_)
                | Self::SessionAlreadyActive
                | Self::ManifestLocked
                | Self::MissingHost(_)
                | Self::Transport(_)
                | Self::Timeout(_)
                | Self::Protocol(_)
        )
    }

    /// Returns whether the failure originated on the engine side of the call.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Engine(_) | Self::Transport(_) | Self::Timeout(_) | Self::Protocol(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
