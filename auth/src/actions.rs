//! Authentication actions.
//!
//! Commands come from the facade, results come back from effects, and session
//! events are forwarded from the session manager. Every command that starts
//! an operation ends with exactly one [`AuthAction::OperationFinished`]
//! carrying the command's [`OperationId`].

use crate::error::{AuthError, ProviderError, ProviderResult};
use crate::providers::AuthGrant;
use crate::state::{CurrentUser, ErrorInfo, ErrorKind, FormField, OperationId, OperationKind, Secret};

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Succeeded.
    Completed,

    /// Failed with a visible error.
    Failed(ErrorInfo),

    /// Failed, but the error policy hides the error.
    Suppressed(ErrorInfo),

    /// The user dismissed the federated sign-in sheet.
    Cancelled,

    /// Not started because another operation was running.
    Rejected {
        /// The running operation
        in_flight: OperationKind,
    },

    /// Discarded because sign-out started while it was running.
    Superseded,
}

impl Outcome {
    /// Outcome name as used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
            Self::Suppressed(_) => "suppressed",
            Self::Cancelled => "cancelled",
            Self::Rejected { .. } => "rejected",
            Self::Superseded => "superseded",
        }
    }

    /// Map to the facade result.
    ///
    /// # Errors
    ///
    /// Every outcome except [`Outcome::Completed`] is an error.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::Completed => Ok(()),
            Self::Failed(info) => Err(AuthError::Failed(info)),
            Self::Suppressed(info) => Err(AuthError::Suppressed(info)),
            Self::Cancelled => Err(AuthError::Cancelled),
            Self::Rejected { in_flight } => Err(AuthError::Busy { in_flight }),
            Self::Superseded => Err(AuthError::Superseded),
        }
    }
}

/// Which tier of the status check restored the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusResolution {
    /// A valid session whose token the backend accepted.
    Session(CurrentUser),

    /// The offline cache.
    Offline(CurrentUser),

    /// Silent federated sign-in.
    Silent(AuthGrant),

    /// Nothing to restore.
    NoSession,
}

/// A user and the token to cache for offline sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    /// The updated user.
    pub user: CurrentUser,

    /// Access token of the current session.
    pub access_token: String,
}

/// Authentication actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════
    /// Initialize the collaborators.
    Initialize {
        /// Correlation id
        op: OperationId,
    },

    /// Collaborator initialization finished.
    Initialized {
        /// Correlation id
        op: OperationId,
        /// First failure, if any
        result: ProviderResult<()>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Credential Commands
    // ═══════════════════════════════════════════════════════════════════════
    /// Create an email account.
    SignUpWithEmail {
        /// Correlation id
        op: OperationId,
        /// Email address
        email: String,
        /// New password
        password: Secret,
        /// Display name
        name: String,
        /// Persist the session
        remember_me: bool,
    },

    /// Sign in with email and password.
    SignInWithEmail {
        /// Correlation id
        op: OperationId,
        /// Email address
        email: String,
        /// Password
        password: Secret,
        /// Persist the session
        remember_me: bool,
    },

    /// Sign in (or up) with Google.
    SignInWithGoogle {
        /// Correlation id
        op: OperationId,
        /// Persist the session
        remember_me: bool,
    },

    /// Link Google to the signed-in account.
    LinkGoogleAccount {
        /// Correlation id
        op: OperationId,
    },

    /// Merge a Google identity into an email account.
    MergeGoogleAccount {
        /// Correlation id
        op: OperationId,
        /// Email of the existing account
        email: String,
        /// Password of the existing account
        password: Secret,
        /// Persist the session
        remember_me: bool,
    },

    /// Request a password reset email.
    ResetPassword {
        /// Correlation id
        op: OperationId,
        /// Email address
        email: String,
    },

    /// Restore a previous session.
    CheckAuthenticationStatus {
        /// Correlation id
        op: OperationId,
    },

    /// Sign out. Supersedes any running operation.
    SignOut {
        /// Correlation id
        op: OperationId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Form Commands
    // ═══════════════════════════════════════════════════════════════════════
    /// Validate a form field as the user types.
    UpdateFormField {
        /// Field
        field: FormField,
        /// Current value
        value: String,
    },

    /// Clear all form validation.
    ResetForm,

    /// Dismiss the visible error.
    ClearError,

    // ═══════════════════════════════════════════════════════════════════════
    // Effect Results
    // ═══════════════════════════════════════════════════════════════════════
    /// A sign-up, sign-in or merge returned.
    CredentialsResolved {
        /// Correlation id
        op: OperationId,
        /// Operation that produced the result
        kind: OperationKind,
        /// Grant or failure
        result: ProviderResult<AuthGrant>,
        /// Persist the session
        remember_me: bool,
    },

    /// Account linking returned.
    GoogleLinkResolved {
        /// Correlation id
        op: OperationId,
        /// Updated account or failure
        result: ProviderResult<LinkedAccount>,
    },

    /// The password reset request returned.
    PasswordResetResolved {
        /// Correlation id
        op: OperationId,
        /// Success or failure
        result: ProviderResult<()>,
    },

    /// The status check settled on a tier.
    StatusResolved {
        /// Correlation id
        op: OperationId,
        /// Winning tier
        resolution: StatusResolution,
    },

    /// Remote sign-out steps finished.
    SignOutFinished {
        /// Correlation id
        op: OperationId,
        /// Steps that failed, for logging
        failures: Vec<String>,
    },

    /// Background session start / offline caching finished.
    SessionSyncFinished {
        /// User the sync was for
        user_id: String,
        /// Whether a session was started
        session_started: bool,
        /// Steps that failed, for logging
        failures: Vec<String>,
    },

    /// A session started after sign-out was ended again.
    OrphanSessionEnded {
        /// Failure of `end_session`, if any
        error: Option<ProviderError>,
    },

    /// The facade stopped waiting for `op`. Releases it if it still runs;
    /// its result, should one arrive later, is discarded.
    OperationTimedOut {
        /// Correlation id
        op: OperationId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Session Events
    // ═══════════════════════════════════════════════════════════════════════
    /// The session manager reported the session (in)active.
    SessionStateChanged {
        /// Whether a session is active
        active: bool,
    },

    /// The session manager reported a session failure.
    SessionErrorReceived {
        /// Failure kind
        kind: ErrorKind,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Terminal
    // ═══════════════════════════════════════════════════════════════════════
    /// An operation ended.
    OperationFinished {
        /// Correlation id
        op: OperationId,
        /// The operation
        kind: OperationKind,
        /// How it ended
        outcome: Outcome,
    },
}

impl AuthAction {
    /// Whether this is the terminal action of `op`.
    #[must_use]
    pub fn finishes(&self, op: OperationId) -> bool {
        matches!(self, Self::OperationFinished { op: id, .. } if *id == op)
    }
}
