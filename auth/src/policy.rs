//! Error policy.
//!
//! Decides, per [`ErrorKind`], what the user sees when an operation fails:
//! a canonical message or the collaborator's raw one, whether the error is
//! shown at all, and whether it is retryable or forces a new sign-in.

use crate::state::{ErrorInfo, ErrorKind, OperationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one error kind is presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRule {
    /// Canonical message; `None` passes the raw message through.
    pub message: Option<String>,

    /// Whether retrying may succeed.
    pub retryable: bool,

    /// Whether the user must sign in again.
    pub requires_reauth: bool,

    /// Whether the error becomes visible.
    pub show_to_user: bool,
}

impl ErrorRule {
    /// A shown, retryable rule with a canonical message.
    #[must_use]
    pub fn shown(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            retryable: true,
            requires_reauth: false,
            show_to_user: true,
        }
    }

    /// Mark the rule as not retryable.
    #[must_use]
    pub const fn not_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    /// Mark the rule as requiring a new sign-in.
    #[must_use]
    pub const fn reauth(mut self) -> Self {
        self.retryable = false;
        self.requires_reauth = true;
        self
    }

    /// Hide errors of this kind.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.show_to_user = false;
        self
    }

    /// Built-in rule for `kind`.
    #[must_use]
    pub fn default_for(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => Self {
                message: None,
                retryable: true,
                requires_reauth: false,
                show_to_user: true,
            },
            ErrorKind::InvalidCredentials => Self::shown("Invalid email or password."),
            ErrorKind::TokenInvalid => {
                Self::shown("Your session is no longer valid. Please sign in again.").reauth()
            },
            ErrorKind::SessionTerminated => {
                Self::shown("Your session has ended. Please sign in again.").reauth()
            },
            ErrorKind::GoogleSignInFailed => Self::shown("Google sign-in failed. Please try again."),
            ErrorKind::AccountExistsWithDifferentCredential => Self::shown(
                "An account already exists with this email using a different sign-in method.",
            )
            .not_retryable(),
            ErrorKind::UserCancelled => Self::shown("Sign-in was cancelled.").hidden(),
            ErrorKind::Unknown => Self::shown("Something went wrong. Please try again."),
        }
    }
}

/// Per-kind error rules. Kinds without an explicit rule use
/// [`ErrorRule::default_for`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    rules: BTreeMap<ErrorKind, ErrorRule>,
}

impl ErrorPolicy {
    /// Override the rule for `kind`.
    #[must_use]
    pub fn with_rule(mut self, kind: ErrorKind, rule: ErrorRule) -> Self {
        self.rules.insert(kind, rule);
        self
    }

    /// Effective rule for `kind`.
    #[must_use]
    pub fn rule(&self, kind: ErrorKind) -> ErrorRule {
        self.rules
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ErrorRule::default_for(kind))
    }

    /// Whether errors of `kind` become visible.
    #[must_use]
    pub fn should_show(&self, kind: ErrorKind) -> bool {
        self.rule(kind).show_to_user
    }

    /// Turn a raw failure into the error the user sees.
    ///
    /// The raw message is used when the rule has no canonical message; an
    /// empty raw message falls back to the built-in one.
    #[must_use]
    pub fn resolve(
        &self,
        kind: ErrorKind,
        raw_message: &str,
        context: Option<OperationKind>,
    ) -> ErrorInfo {
        let rule = self.rule(kind);
        let message = rule
            .message
            .filter(|message| !message.is_empty())
            .or_else(|| (!raw_message.trim().is_empty()).then(|| raw_message.to_string()))
            .or_else(|| ErrorRule::default_for(kind).message)
            .unwrap_or_else(|| "Something went wrong. Please try again.".to_string());

        ErrorInfo {
            kind,
            message,
            context,
            metadata: BTreeMap::new(),
            retryable: rule.retryable,
            requires_reauth: rule.requires_reauth,
        }
    }
}
