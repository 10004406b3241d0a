//! Error taxonomy for the sync client.
//!
//! | Kind | Where it stops |
//! |------|----------------|
//! | [`SyncError::Transport`] | returned to the caller (one-shot requests) |
//! | [`SyncError::Rejected`] | returned verbatim, never retried |
//! | [`SyncError::Validation`] | raised before any network call |
//! | [`ProtocolError`] | logged and discarded by the router |
//!
//! Channel-level failures never surface here: the driver retries them forever
//! and only reports online/offline transitions.

use crate::protocol::ProtocolError;

/// Client-side precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("No document selected")]
    NoDocumentSelected,

    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Errors surfaced by document operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// The request never produced a usable response.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The document service answered with a reason.
    #[error("Service rejected request: {reason}")]
    Rejected {
        status: Option<u16>,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SyncError {
    pub fn rejected(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            reason: reason.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::rejected(Some(status.as_u16()), e.to_string()),
            None => Self::Transport(e.to_string()),
        }
    }
}
