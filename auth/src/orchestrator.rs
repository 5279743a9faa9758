//! The authentication facade.
//!
//! [`AuthOrchestrator`] owns the store running [`AuthReducer`] and turns each
//! operation into "send a command, wait for its `OperationFinished`". Views
//! read state through the accessors and re-render on
//! [`AuthOrchestrator::subscribe_changes`].
//!
//! # Example
//!
//! ```
//! use scholarlens_auth::mocks::test_environment;
//! use scholarlens_auth::{AuthConfig, AuthOrchestrator, AuthenticationState};
//!
//! # tokio_test::block_on(async {
//! let auth = AuthOrchestrator::start(AuthConfig::default(), test_environment()).await;
//!
//! auth.sign_in_with_email("ada@example.com", "abc12345", false).await?;
//! assert_eq!(auth.status().await, AuthenticationState::Authenticated);
//!
//! auth.sign_out().await?;
//! assert!(!auth.is_authenticated().await);
//! # Ok::<(), scholarlens_auth::AuthError>(())
//! # });
//! ```

use crate::actions::AuthAction;
use crate::config::AuthConfig;
use crate::environment::AuthEnvironment;
use crate::error::Result;
use crate::providers::{AuthBackend, FederatedIdentity, OfflineAuth, OfflineStatus, SessionManager};
use crate::reducers::AuthReducer;
use crate::state::{
    AuthState, AuthenticationState, CurrentUser, ErrorInfo, ErrorKind, FieldValidation, FormField,
    FormValidationState, OperationId, Secret,
};
use scholarlens_runtime::{Store, StoreConfig, StoreError};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Store running the authentication reducer.
pub type AuthStore<S, B, F, O> =
    Store<AuthState, AuthAction, AuthEnvironment<S, B, F, O>, AuthReducer<S, B, F, O>>;

/// Forwards session manager events into the store until dropped.
#[derive(Debug)]
struct EventForwarder(JoinHandle<()>);

impl Drop for EventForwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Authentication session orchestrator.
///
/// Cheap to clone; clones drive the same store.
pub struct AuthOrchestrator<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    store: AuthStore<S, B, F, O>,
    config: Arc<AuthConfig>,
    forwarder: Arc<EventForwarder>,
}

impl<S, B, F, O> Clone for AuthOrchestrator<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: Arc::clone(&self.config),
            forwarder: Arc::clone(&self.forwarder),
        }
    }
}

impl<S, B, F, O> AuthOrchestrator<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    /// Build the store, start forwarding session events and initialize the
    /// collaborators.
    ///
    /// Initialization failures are recorded as an `Unknown` error in state;
    /// the orchestrator is usable either way.
    pub async fn start(config: AuthConfig, environment: AuthEnvironment<S, B, F, O>) -> Self {
        let states = environment.sessions.subscribe_state();
        let errors = environment.sessions.subscribe_errors();

        let store = Store::with_config(
            AuthState::default(),
            AuthReducer::new(config.error_policy.clone()),
            environment,
            StoreConfig::default().with_broadcast_capacity(config.action_broadcast_capacity),
        );
        let forwarder = EventForwarder(spawn_forwarder(store.clone(), states, errors));

        let orchestrator = Self {
            store,
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
        };

        match orchestrator.run(|op| AuthAction::Initialize { op }).await {
            Ok(()) => tracing::info!("Authentication orchestrator started"),
            Err(error) => tracing::error!(%error, "Authentication initialization failed"),
        }
        orchestrator
    }

    /// Send the command built by `build` and wait for it to finish.
    #[tracing::instrument(skip_all)]
    async fn run(&self, build: impl FnOnce(OperationId) -> AuthAction) -> Result<()> {
        let op = OperationId::new();
        let finished = match self
            .store
            .send_and_wait_for(build(op), |action| action.finishes(op), self.config.operation_timeout)
            .await
        {
            Ok(finished) => finished,
            Err(StoreError::Timeout) => {
                tracing::warn!(%op, timeout = ?self.config.operation_timeout, "Operation timed out");
                self.store.send(AuthAction::OperationTimedOut { op }).await?;
                return Err(StoreError::Timeout.into());
            },
            Err(error) => return Err(error.into()),
        };

        match finished {
            AuthAction::OperationFinished { outcome, .. } => outcome.into_result(),
            // `finishes` only matches `OperationFinished`
            _ => Ok(()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Credential Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Create an email account and sign it in.
    ///
    /// # Errors
    ///
    /// [`AuthError::Failed`](crate::AuthError::Failed) with a `Validation` error when a field is
    /// invalid, or the backend's error; [`AuthError::Busy`](crate::AuthError::Busy) while another
    /// operation runs.
    pub async fn sign_up_with_email(
        &self,
        email: &str,
        password: &str,
        name: &str,
        remember_me: bool,
    ) -> Result<()> {
        self.run(|op| AuthAction::SignUpWithEmail {
            op,
            email: email.to_string(),
            password: Secret::new(password),
            name: name.to_string(),
            remember_me,
        })
        .await
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// [`AuthError::Failed`](crate::AuthError::Failed) for invalid input or rejected credentials;
    /// [`AuthError::Busy`](crate::AuthError::Busy) while another operation runs.
    pub async fn sign_in_with_email(&self, email: &str, password: &str, remember_me: bool) -> Result<()> {
        self.run(|op| AuthAction::SignInWithEmail {
            op,
            email: email.to_string(),
            password: Secret::new(password),
            remember_me,
        })
        .await
    }

    /// Sign in with Google.
    ///
    /// # Errors
    ///
    /// [`AuthError::Cancelled`](crate::AuthError::Cancelled) when the user dismisses the sheet (the visible
    /// error is left as it was); [`AuthError::Failed`](crate::AuthError::Failed) otherwise.
    pub async fn sign_in_with_google(&self, remember_me: bool) -> Result<()> {
        self.run(|op| AuthAction::SignInWithGoogle { op, remember_me }).await
    }

    /// Sign up with Google. The provider creates the account on first sign-in.
    ///
    /// # Errors
    ///
    /// See [`AuthOrchestrator::sign_in_with_google`].
    pub async fn sign_up_with_google(&self, remember_me: bool) -> Result<()> {
        self.sign_in_with_google(remember_me).await
    }

    /// Link Google to the signed-in account.
    ///
    /// # Errors
    ///
    /// `Validation` failure when nobody is signed in, the session has no valid
    /// token, or the account is not eligible; provider errors otherwise.
    pub async fn link_google_account(&self) -> Result<()> {
        self.run(|op| AuthAction::LinkGoogleAccount { op }).await
    }

    /// Merge the Google identity into the email account `email`.
    ///
    /// # Errors
    ///
    /// Validation, provider or backend failures.
    pub async fn merge_google_account(&self, email: &str, password: &str, remember_me: bool) -> Result<()> {
        self.run(|op| AuthAction::MergeGoogleAccount {
            op,
            email: email.to_string(),
            password: Secret::new(password),
            remember_me,
        })
        .await
    }

    /// Sign out. Local state is cleared before any remote call.
    ///
    /// # Errors
    ///
    /// Only store failures. Remote sign-out failures are logged.
    pub async fn sign_out(&self) -> Result<()> {
        self.run(|op| AuthAction::SignOut { op }).await
    }

    /// Request a password reset email.
    ///
    /// # Errors
    ///
    /// [`AuthError::Failed`](crate::AuthError::Failed) for an invalid address or a backend failure.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.run(|op| AuthAction::ResetPassword {
            op,
            email: email.to_string(),
        })
        .await
    }

    /// Restore a previous session: stored session, then offline cache, then
    /// silent Google sign-in.
    ///
    /// Finding nothing is not an error; the status ends `Unauthenticated`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Busy`](crate::AuthError::Busy) while another operation runs.
    pub async fn check_authentication_status(&self) -> Result<()> {
        self.run(|op| AuthAction::CheckAuthenticationStatus { op }).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Form & Errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Validate a form field and return its validation.
    ///
    /// # Errors
    ///
    /// Only store failures.
    pub async fn update_form_field(&self, field: FormField, value: &str) -> Result<FieldValidation> {
        self.store
            .send(AuthAction::UpdateFormField {
                field,
                value: value.to_string(),
            })
            .await?;
        Ok(self
            .store
            .state(|state| state.form.validation(field).cloned())
            .await
            .unwrap_or_default())
    }

    /// [`AuthOrchestrator::update_form_field`] by wire name (`"confirmPassword"`).
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownField`](crate::AuthError::UnknownField) for a name that is not a form field.
    pub async fn update_form_field_named(&self, field: &str, value: &str) -> Result<FieldValidation> {
        self.update_form_field(field.parse::<FormField>()?, value).await
    }

    /// Dismiss the visible error.
    ///
    /// # Errors
    ///
    /// Only store failures.
    pub async fn clear_error(&self) -> Result<()> {
        self.store.send(AuthAction::ClearError).await?;
        Ok(())
    }

    /// Clear form validation.
    ///
    /// # Errors
    ///
    /// Only store failures.
    pub async fn reset_form(&self) -> Result<()> {
        self.store.send(AuthAction::ResetForm).await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Offline
    // ═══════════════════════════════════════════════════════════════════════

    /// Report a connectivity change to the offline cache.
    ///
    /// Leaving offline mode takes a new status check.
    pub async fn connectivity_changed(&self, is_online: bool) {
        tracing::debug!(is_online, "Connectivity changed");
        self.store
            .environment()
            .offline
            .on_connectivity_changed(is_online)
            .await;
    }

    /// What the offline cache holds.
    pub async fn offline_status(&self) -> OfflineStatus {
        self.store.environment().offline.offline_status().await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // State
    // ═══════════════════════════════════════════════════════════════════════

    /// Copy of the whole state.
    pub async fn snapshot(&self) -> AuthState {
        self.store.state(Clone::clone).await
    }

    /// Read state through `f`.
    pub async fn state<T>(&self, f: impl FnOnce(&AuthState) -> T) -> T {
        self.store.state(f).await
    }

    /// Current status.
    pub async fn status(&self) -> AuthenticationState {
        self.store.state(|state| state.status).await
    }

    /// Signed-in user.
    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.store.state(|state| state.current_user.clone()).await
    }

    /// Visible error.
    pub async fn error(&self) -> Option<ErrorInfo> {
        self.store.state(|state| state.error.clone()).await
    }

    /// Kind of the visible error.
    pub async fn error_kind(&self) -> Option<ErrorKind> {
        self.store.state(AuthState::error_kind).await
    }

    /// Whether an operation is running.
    pub async fn is_loading(&self) -> bool {
        self.store.state(AuthState::is_loading).await
    }

    /// Whether a user is signed in.
    pub async fn is_authenticated(&self) -> bool {
        self.store.state(AuthState::is_authenticated).await
    }

    /// Whether the session survives restarts.
    pub async fn remember_me(&self) -> bool {
        self.store.state(|state| state.remember_me).await
    }

    /// Whether the user was restored from the offline cache.
    pub async fn is_offline_mode(&self) -> bool {
        self.store.state(|state| state.offline_mode).await
    }

    /// Form validation state.
    pub async fn form_state(&self) -> FormValidationState {
        self.store.state(|state| state.form.clone()).await
    }

    /// Revision counter bumped after every state change.
    #[must_use]
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.store.subscribe_changes()
    }

    /// Every action produced by an effect, after it has been applied.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<AuthAction> {
        self.store.subscribe_actions()
    }

    /// Stop forwarding session events and drain running effects.
    ///
    /// # Errors
    ///
    /// [`AuthError::Store`](crate::AuthError::Store) if effects are still running after the configured
    /// shutdown timeout.
    pub async fn shutdown(&self) -> Result<()> {
        self.forwarder.0.abort();
        self.store.shutdown(self.config.shutdown_timeout).await?;
        Ok(())
    }
}

impl<S, B, F, O> std::fmt::Debug for AuthOrchestrator<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Forward session state and error events into `store` as actions.
fn spawn_forwarder<S, B, F, O>(
    store: AuthStore<S, B, F, O>,
    mut states: broadcast::Receiver<bool>,
    mut errors: broadcast::Receiver<ErrorKind>,
) -> JoinHandle<()>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    tokio::spawn(async move {
        loop {
            let action = tokio::select! {
                event = states.recv() => match event {
                    Ok(active) => AuthAction::SessionStateChanged { active },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed session state events");
                        continue;
                    },
                    Err(RecvError::Closed) => break,
                },
                event = errors.recv() => match event {
                    Ok(kind) => AuthAction::SessionErrorReceived { kind },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed session error events");
                        continue;
                    },
                    Err(RecvError::Closed) => break,
                },
            };

            if let Err(error) = store.send(action).await {
                tracing::debug!(%error, "Stopped forwarding session events");
                break;
            }
        }
    })
}
