//! Error types for the authentication orchestrator.
//!
//! Three layers:
//!
//! - [`ProviderError`]: what a collaborator (backend, Google client, session
//!   manager, offline cache) reports. Flows through actions, so it is `Clone`.
//! - [`StorageError`]: what the key-value storage adapter reports.
//! - [`AuthError`]: what the [`AuthOrchestrator`](crate::AuthOrchestrator)
//!   facade returns to callers.

use crate::state::{ErrorInfo, ErrorKind, OperationKind, UnknownFormField};
use scholarlens_runtime::StoreError;
use thiserror::Error;

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Result type alias for collaborator calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failure reported by a collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The collaborator refused the request for a known reason.
    #[error("{message}")]
    Rejected {
        /// Failure category
        kind: ErrorKind,
        /// Raw message from the collaborator
        message: String,
    },

    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// A structured rejection.
    #[must_use]
    pub fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            message: message.into(),
        }
    }

    /// The user dismissed the provider's sign-in sheet.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::rejected(ErrorKind::UserCancelled, "sign-in cancelled by user")
    }

    /// Failure category. Transport and internal failures are `Unknown`.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected { kind, .. } => *kind,
            Self::Transport(_) | Self::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// Raw message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } | Self::Transport(message) | Self::Internal(message) => {
                message
            },
        }
    }
}

impl From<StorageError> for ProviderError {
    fn from(error: StorageError) -> Self {
        Self::Internal(error.to_string())
    }
}

/// Failure of the key-value storage adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Error returned by facade operations.
///
/// The orchestrator state is updated before any of these is returned, so a
/// caller may ignore the error and render from state instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// The operation failed; the error is visible in state.
    #[error("{0}")]
    Failed(ErrorInfo),

    /// The operation failed, but the error policy hides this kind from the user.
    #[error("suppressed error: {0}")]
    Suppressed(ErrorInfo),

    /// The user cancelled the federated sign-in.
    #[error("sign-in was cancelled")]
    Cancelled,

    /// Another credential operation is still running.
    #[error("{in_flight} is already in progress")]
    Busy {
        /// The running operation
        in_flight: OperationKind,
    },

    /// Sign-out started while this operation was running; its result was discarded.
    #[error("operation was superseded by sign-out")]
    Superseded,

    /// The form field name is not known.
    #[error(transparent)]
    UnknownField(#[from] UnknownFormField),

    /// The store rejected the action or the operation timed out.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Resolved error details, for failed and suppressed operations.
    #[must_use]
    pub const fn info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Failed(info) | Self::Suppressed(info) => Some(info),
            _ => None,
        }
    }

    /// Failure category, for failed and suppressed operations.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.info().map(|info| info.kind)
    }
}
