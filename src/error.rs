//! Centralized error types for mailpluck.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailpluck library.
///
/// Variants split into three groups: fatal for the whole run (`Io`,
/// `Connect`, `Auth`, `Folder`, `Search`), recoverable per message
/// (`Fetch`, `Parse`) and recoverable per attachment (write `Io` and
/// `CollisionOverflow`). The run orchestrator decides continuation from
/// the variant, not from where the error surfaced.
#[derive(Error, Debug)]
pub enum PluckError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Could not reach or negotiate with the IMAP server.
    #[error("could not connect to {server}: {reason}")]
    Connect { server: String, reason: String },

    /// Login was rejected.
    #[error("authentication failed for '{user}': {reason}")]
    Auth { user: String, reason: String },

    /// The requested mailbox folder could not be selected.
    #[error("could not select folder '{folder}': {reason}")]
    Folder { folder: String, reason: String },

    /// The server rejected the search request.
    #[error("search failed: {reason}")]
    Search { reason: String },

    /// One message could not be downloaded.
    #[error("could not fetch message {id}: {reason}")]
    Fetch { id: u32, reason: String },

    /// One message's raw bytes could not be parsed as a mail message.
    #[error("could not parse message {index}")]
    Parse { index: usize },

    /// No unused filename was found within the candidate limit.
    #[error("no unused filename found for '{name}'")]
    CollisionOverflow { name: String },
}

/// Convenience alias for `Result<T, PluckError>`.
pub type Result<T> = std::result::Result<T, PluckError>;

impl PluckError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
