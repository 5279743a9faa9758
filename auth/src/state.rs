//! Authentication state types.
//!
//! [`AuthState`] is the single source of truth the UI observes: who is signed
//! in, which error is visible, whether an operation is running, and the
//! real-time form validation results.
//!
//! # Invariant
//!
//! `status == Authenticated` if and only if `current_user` is present. Every
//! transition goes through the helpers on [`AuthState`], which keep the two in
//! step. An error raised while a user is signed in becomes the visible
//! `error` without leaving `Authenticated`; `Error` status always means "no
//! user, visible error".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════

/// Correlation id of one orchestrator operation.
///
/// Every command carries one; its terminal
/// [`AuthAction::OperationFinished`](crate::actions::AuthAction::OperationFinished)
/// carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    /// Generate a new random operation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A credential that must never show up in logs.
///
/// `Debug` prints a placeholder; read the value with [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The wrapped value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// User
// ═══════════════════════════════════════════════════════════════════════

/// How the current user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthProvider {
    /// Email and password against the auth backend.
    EmailPassword,
    /// Federated Google sign-in.
    Google,
}

impl AuthProvider {
    /// Provider name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmailPassword => "email_password",
            Self::Google => "google",
        }
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user id.
    pub id: String,

    /// Primary email address.
    pub email: String,

    /// Display name, if the user set one.
    pub display_name: Option<String>,

    /// Sign-in method.
    pub provider: AuthProvider,
}

impl CurrentUser {
    /// Create a user record.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>, provider: AuthProvider) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            provider,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Status & Errors
// ═══════════════════════════════════════════════════════════════════════

/// Authentication status. Cyclic; loading is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationState {
    /// No user signed in.
    #[default]
    Unauthenticated,
    /// A user is signed in.
    Authenticated,
    /// No user signed in and an error is visible.
    Error,
}

/// Category of an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Local input validation failed.
    #[serde(rename = "validationError")]
    Validation,
    /// Wrong email or password.
    InvalidCredentials,
    /// The session token is no longer accepted.
    TokenInvalid,
    /// The session was ended elsewhere.
    SessionTerminated,
    /// The federated provider failed.
    GoogleSignInFailed,
    /// The email is registered with another sign-in method.
    AccountExistsWithDifferentCredential,
    /// The user dismissed the provider's sign-in sheet.
    UserCancelled,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Validation,
        Self::InvalidCredentials,
        Self::TokenInvalid,
        Self::SessionTerminated,
        Self::GoogleSignInFailed,
        Self::AccountExistsWithDifferentCredential,
        Self::UserCancelled,
        Self::Unknown,
    ];

    /// Kind name as used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::InvalidCredentials => "invalid_credentials",
            Self::TokenInvalid => "token_invalid",
            Self::SessionTerminated => "session_terminated",
            Self::GoogleSignInFailed => "google_sign_in_failed",
            Self::AccountExistsWithDifferentCredential => "account_exists_with_different_credential",
            Self::UserCancelled => "user_cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The orchestrator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    /// Collaborator initialization at start-up.
    Initialize,
    /// Email sign-up.
    SignUpWithEmail,
    /// Email sign-in.
    SignInWithEmail,
    /// Google sign-in (also used for Google sign-up).
    SignInWithGoogle,
    /// Link Google to the signed-in account.
    LinkGoogleAccount,
    /// Merge a Google identity into an existing email account.
    MergeGoogleAccount,
    /// Sign-out.
    SignOut,
    /// Password reset request.
    ResetPassword,
    /// Restore a previous session on start-up.
    CheckAuthenticationStatus,
}

impl OperationKind {
    /// Operation name as used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SignUpWithEmail => "sign_up_with_email",
            Self::SignInWithEmail => "sign_in_with_email",
            Self::SignInWithGoogle => "sign_in_with_google",
            Self::LinkGoogleAccount => "link_google_account",
            Self::MergeGoogleAccount => "merge_google_account",
            Self::SignOut => "sign_out",
            Self::ResetPassword => "reset_password",
            Self::CheckAuthenticationStatus => "check_authentication_status",
        }
    }

    /// Whether the operation goes through the federated provider's sign-in sheet.
    #[must_use]
    pub const fn is_federated(&self) -> bool {
        matches!(
            self,
            Self::SignInWithGoogle | Self::LinkGoogleAccount | Self::MergeGoogleAccount
        )
    }

    /// Whether a successful run caches the user for offline sign-in.
    #[must_use]
    pub const fn caches_offline(&self) -> bool {
        matches!(self, Self::SignInWithGoogle | Self::MergeGoogleAccount)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata key holding the conflicting address of an account-conflict error.
pub const METADATA_EMAIL: &str = "email";

/// A resolved, user-facing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error category.
    pub kind: ErrorKind,

    /// Message to display.
    pub message: String,

    /// Operation that produced the error, if any.
    pub context: Option<OperationKind>,

    /// Extra details, e.g. [`METADATA_EMAIL`].
    pub metadata: BTreeMap<String, String>,

    /// Whether retrying the same operation may succeed.
    pub retryable: bool,

    /// Whether the user has to sign in again.
    pub requires_reauth: bool,
}

impl ErrorInfo {
    /// The conflicting email of an account-conflict error.
    #[must_use]
    pub fn conflicting_email(&self) -> Option<&str> {
        self.metadata.get(METADATA_EMAIL).map(String::as_str)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Form Validation
// ═══════════════════════════════════════════════════════════════════════

/// Form fields validated in real time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    /// Email address.
    Email,
    /// Password.
    Password,
    /// Display name.
    Name,
    /// Password confirmation.
    ConfirmPassword,
}

impl FormField {
    /// Field name as used by the UI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Password => "password",
            Self::Name => "name",
            Self::ConfirmPassword => "confirmPassword",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown field name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown form field: {0}")]
pub struct UnknownFormField(pub String);

impl FromStr for FormField {
    type Err = UnknownFormField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "password" => Ok(Self::Password),
            "name" => Ok(Self::Name),
            "confirmPassword" | "confirm_password" => Ok(Self::ConfirmPassword),
            other => Err(UnknownFormField(other.to_string())),
        }
    }
}

/// Result of validating one field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Whether the value is acceptable.
    pub is_valid: bool,

    /// Why it is not, if it is not.
    pub message: Option<String>,

    /// Whether the UI should display `message` yet.
    pub show_error: bool,
}

impl FieldValidation {
    /// A passing validation.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
            show_error: false,
        }
    }

    /// A failing validation.
    #[must_use]
    pub fn invalid(message: impl Into<String>, show_error: bool) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            show_error,
        }
    }
}

/// Last value and validation of a field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldState {
    /// Raw value as typed.
    pub value: String,

    /// Validation of `value`.
    pub validation: FieldValidation,
}

/// Real-time validation state of the sign-in/sign-up forms.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormValidationState {
    fields: BTreeMap<FormField, FieldState>,
}

impl FormValidationState {
    /// State of a field, if it has been edited.
    #[must_use]
    pub fn field(&self, field: FormField) -> Option<&FieldState> {
        self.fields.get(&field)
    }

    /// Last value of a field (empty if never edited).
    #[must_use]
    pub fn value(&self, field: FormField) -> &str {
        self.fields.get(&field).map_or("", |state| state.value.as_str())
    }

    /// Last validation of a field.
    #[must_use]
    pub fn validation(&self, field: FormField) -> Option<&FieldValidation> {
        self.fields.get(&field).map(|state| &state.validation)
    }

    /// Whether every edited field is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(|state| state.validation.is_valid)
    }

    /// Whether no field has been edited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn set(&mut self, field: FormField, value: String, validation: FieldValidation) {
        self.fields.insert(field, FieldState { value, validation });
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Auth State
// ═══════════════════════════════════════════════════════════════════════

/// The single running credential operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight {
    /// Correlation id.
    pub id: OperationId,

    /// What is running.
    pub kind: OperationKind,

    /// Visible error before the operation cleared it.
    pub prior_error: Option<ErrorInfo>,

    /// Status before the operation started.
    pub prior_status: AuthenticationState,
}

/// Authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthState {
    /// Current status.
    pub status: AuthenticationState,

    /// Signed-in user.
    pub current_user: Option<CurrentUser>,

    /// Error currently shown to the user.
    pub error: Option<ErrorInfo>,

    /// Most recent error, including suppressed ones.
    pub last_error: Option<ErrorInfo>,

    /// Most recent background session sync failure.
    pub last_sync_error: Option<String>,

    /// Whether the session should survive restarts.
    pub remember_me: bool,

    /// Whether the user was restored from the offline cache.
    pub offline_mode: bool,

    /// Whether a background session sync is still running.
    pub session_sync_pending: bool,

    /// Running credential operation.
    pub in_flight: Option<InFlight>,

    /// Real-time form validation.
    pub form: FormValidationState,

    /// Whether collaborator initialization succeeded.
    pub initialized: bool,
}

impl AuthState {
    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthenticationState::Authenticated)
    }

    /// Whether an operation is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Kind of the visible error.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }

    /// Message of the visible error.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }

    /// Whether status and user agree.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.is_authenticated() == self.current_user.is_some()
            && !(matches!(self.status, AuthenticationState::Error) && self.error.is_none())
    }

    /// Sign `user` in and clear the visible error.
    pub(crate) fn authenticate(&mut self, user: CurrentUser) {
        self.current_user = Some(user);
        self.status = AuthenticationState::Authenticated;
        self.error = None;
    }

    /// Forget the user.
    pub(crate) fn clear_session(&mut self) {
        self.current_user = None;
        self.status = AuthenticationState::Unauthenticated;
        self.offline_mode = false;
    }

    /// Record `kind` as running and clear the visible error.
    pub(crate) fn begin(&mut self, id: OperationId, kind: OperationKind) {
        self.in_flight = Some(InFlight {
            id,
            kind,
            prior_error: self.error.take(),
            prior_status: self.status,
        });
        if self.status == AuthenticationState::Error {
            self.status = AuthenticationState::Unauthenticated;
        }
    }

    /// Take the in-flight record if it belongs to `id`.
    ///
    /// Returns `None` for a stale completion, leaving the current record alone.
    pub(crate) fn complete(&mut self, id: OperationId) -> Option<InFlight> {
        if self.in_flight.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            self.in_flight.take()
        } else {
            None
        }
    }

    /// Show `error`. Moves to `Error` status unless a user is signed in.
    pub(crate) fn surface(&mut self, error: ErrorInfo) {
        self.last_error = Some(error.clone());
        self.error = Some(error);
        if self.current_user.is_none() {
            self.status = AuthenticationState::Error;
        }
    }

    /// Put back what an operation cleared when it started.
    pub(crate) fn restore(&mut self, in_flight: InFlight) {
        self.error = in_flight.prior_error;
        if in_flight.prior_status != AuthenticationState::Authenticated
            && self.current_user.is_none()
        {
            self.status = in_flight.prior_status;
        }
    }

    /// Clear the visible error. Returns `false` if there was none.
    pub(crate) fn clear_error(&mut self) -> bool {
        if self.error.take().is_none() {
            return false;
        }
        self.status = if self.current_user.is_some() {
            AuthenticationState::Authenticated
        } else {
            AuthenticationState::Unauthenticated
        };
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> CurrentUser {
        CurrentUser::new("u-1", "ada@example.com", AuthProvider::EmailPassword)
    }

    fn error(kind: ErrorKind) -> ErrorInfo {
        ErrorInfo {
            kind,
            message: "boom".to_string(),
            context: None,
            metadata: BTreeMap::new(),
            retryable: true,
            requires_reauth: false,
        }
    }

    #[test]
    fn test_default_state_is_signed_out() {
        let state = AuthState::default();
        assert_eq!(state.status, AuthenticationState::Unauthenticated);
        assert!(!state.is_authenticated());
        assert!(!state.is_loading());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_surface_without_user_enters_error_status() {
        let mut state = AuthState::default();
        state.surface(error(ErrorKind::InvalidCredentials));

        assert_eq!(state.status, AuthenticationState::Error);
        assert_eq!(state.error_kind(), Some(ErrorKind::InvalidCredentials));
        assert_eq!(state.last_error, state.error);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_surface_with_user_keeps_authenticated() {
        let mut state = AuthState::default();
        state.authenticate(user());
        state.surface(error(ErrorKind::GoogleSignInFailed));

        assert_eq!(state.status, AuthenticationState::Authenticated);
        assert!(state.error.is_some());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_begin_leaves_error_status_and_remembers_prior_error() {
        let mut state = AuthState::default();
        state.surface(error(ErrorKind::Unknown));

        let id = OperationId::new();
        state.begin(id, OperationKind::SignInWithGoogle);

        assert_eq!(state.status, AuthenticationState::Unauthenticated);
        assert!(state.error.is_none());
        assert!(state.is_loading());

        let in_flight = state.complete(id).unwrap();
        state.restore(in_flight);
        assert_eq!(state.status, AuthenticationState::Error);
        assert_eq!(state.error_kind(), Some(ErrorKind::Unknown));
    }

    #[test]
    fn test_complete_ignores_stale_ids() {
        let mut state = AuthState::default();
        let current = OperationId::new();
        state.begin(current, OperationKind::SignInWithEmail);

        assert!(state.complete(OperationId::new()).is_none());
        assert!(state.is_loading());
        assert!(state.complete(current).is_some());
        assert!(!state.is_loading());
    }

    #[test]
    fn test_clear_error_routes_by_user_presence() {
        let mut state = AuthState::default();
        assert!(!state.clear_error());

        state.surface(error(ErrorKind::Unknown));
        assert!(state.clear_error());
        assert_eq!(state.status, AuthenticationState::Unauthenticated);

        state.authenticate(user());
        state.surface(error(ErrorKind::Unknown));
        assert!(state.clear_error());
        assert_eq!(state.status, AuthenticationState::Authenticated);
    }

    #[test]
    fn test_form_field_parsing() {
        assert_eq!("email".parse::<FormField>().unwrap(), FormField::Email);
        assert_eq!(
            "confirmPassword".parse::<FormField>().unwrap(),
            FormField::ConfirmPassword
        );
        assert_eq!(
            "phone".parse::<FormField>().unwrap_err(),
            UnknownFormField("phone".to_string())
        );
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter22");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter22");
    }

    #[test]
    fn test_error_kind_serializes_in_camel_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::Validation).unwrap(),
            "\"validationError\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::AccountExistsWithDifferentCredential).unwrap(),
            "\"accountExistsWithDifferentCredential\""
        );
    }
}
