//! Authentication reducers.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
//! Collaborator calls only happen inside the returned effects.
//!
//! - [`CredentialsReducer`]: email, Google, linking, merging, password reset
//! - [`SessionReducer`]: initialization, status check, sign-out, session events
//! - [`FormReducer`]: real-time form validation and error dismissal
//!
//! # Operation protocol
//!
//! A credential command is *admitted* only when nothing else is running;
//! otherwise it finishes immediately as [`Outcome::Rejected`] without touching
//! state. An admitted command records itself in `in_flight`, clears the
//! visible error, and returns an effect. The effect's result action
//! completes the operation if it still owns `in_flight`; a result whose
//! operation was superseded by sign-out is discarded.

pub mod credentials;
pub mod form;
pub mod session;

pub use credentials::CredentialsReducer;
pub use form::FormReducer;
pub use session::SessionReducer;

use crate::actions::{AuthAction, Outcome};
use crate::environment::AuthEnvironment;
use crate::error::ProviderError;
use crate::policy::ErrorPolicy;
use crate::providers::{
    AuthBackend, AuthGrant, FederatedIdentity, OfflineAuth, SessionManager, StartSession,
};
use crate::state::{AuthState, CurrentUser, ErrorKind, METADATA_EMAIL, OperationId, OperationKind};
use crate::validation::extract_email;
use scholarlens_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use std::sync::Arc;

/// Terminal action of `op`.
pub(crate) fn finished(op: OperationId, kind: OperationKind, outcome: Outcome) -> Effect<AuthAction> {
    Effect::dispatch(AuthAction::OperationFinished { op, kind, outcome })
}

/// Transition helpers shared by the sub-reducers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Transitions {
    policy: Arc<ErrorPolicy>,
}

impl Transitions {
    pub(crate) fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub(crate) fn policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    /// Start `kind` unless another operation is running.
    ///
    /// Returns the rejection to emit when it cannot start.
    pub(crate) fn admit(
        state: &mut AuthState,
        op: OperationId,
        kind: OperationKind,
    ) -> Option<Effect<AuthAction>> {
        if let Some(running) = &state.in_flight {
            tracing::warn!(
                operation = %kind,
                in_flight = %running.kind,
                "Rejecting operation: another one is in progress"
            );
            return Some(finished(
                op,
                kind,
                Outcome::Rejected {
                    in_flight: running.kind,
                },
            ));
        }

        tracing::debug!(%op, operation = %kind, "Operation started");
        state.begin(op, kind);
        None
    }

    /// Finish `op` after it lost `in_flight` to sign-out.
    pub(crate) fn superseded(op: OperationId, kind: OperationKind) -> Effect<AuthAction> {
        tracing::info!(%op, operation = %kind, "Discarding result of superseded operation");
        finished(op, kind, Outcome::Superseded)
    }

    /// Fail `op` with a validation message.
    pub(crate) fn invalid(
        &self,
        state: &mut AuthState,
        op: OperationId,
        kind: OperationKind,
        message: String,
    ) -> Effect<AuthAction> {
        self.fail(state, op, kind, &ProviderError::rejected(ErrorKind::Validation, message))
    }

    /// Single failure path of every operation.
    pub(crate) fn fail(
        &self,
        state: &mut AuthState,
        op: OperationId,
        kind: OperationKind,
        error: &ProviderError,
    ) -> Effect<AuthAction> {
        let Some(in_flight) = state.complete(op) else {
            return Self::superseded(op, kind);
        };

        let mut info = self.policy.resolve(error.kind(), error.message(), Some(kind));

        if info.kind == ErrorKind::UserCancelled && kind.is_federated() {
            tracing::info!(%op, operation = %kind, "Federated sign-in cancelled by user");
            state.last_error = Some(info);
            state.restore(in_flight);
            return finished(op, kind, Outcome::Cancelled);
        }

        if info.kind == ErrorKind::AccountExistsWithDifferentCredential {
            if let Some(email) = extract_email(error.message()) {
                info.metadata.insert(METADATA_EMAIL.to_string(), email);
            }
        }

        if self.policy.should_show(info.kind) {
            tracing::warn!(
                %op,
                operation = %kind,
                error_kind = %info.kind,
                %error,
                "Operation failed"
            );
            state.surface(info.clone());
            finished(op, kind, Outcome::Failed(info))
        } else {
            tracing::debug!(
                %op,
                operation = %kind,
                error_kind = %info.kind,
                %error,
                "Operation failed (suppressed)"
            );
            state.last_error = Some(info.clone());
            finished(op, kind, Outcome::Suppressed(info))
        }
    }
}

/// Apply a successful credential exchange.
///
/// Authenticates immediately; session start (and offline caching when asked)
/// happens in the returned background effect.
pub(crate) fn establish<S, B, F, O>(
    state: &mut AuthState,
    env: &AuthEnvironment<S, B, F, O>,
    grant: AuthGrant,
    remember_me: bool,
    cache_offline: bool,
) -> Effect<AuthAction>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    let AuthGrant { user, tokens } = grant;

    tracing::info!(user_id = %user.id, provider = user.provider.as_str(), "Signed in");
    state.authenticate(user.clone());
    state.remember_me = remember_me;
    state.offline_mode = false;

    let Some(tokens) = tokens else {
        tracing::debug!(user_id = %user.id, "Grant carried no tokens, skipping session start");
        return Effect::None;
    };

    state.session_sync_pending = true;
    let sessions = env.sessions.clone();
    let offline = env.offline.clone();

    Effect::future(async move {
        let mut failures = Vec::new();

        let request = StartSession {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token,
            user_id: user.id.clone(),
            remember_me,
        };
        if let Err(error) = sessions.start_session(request).await {
            failures.push(format!("start session: {error}"));
        }

        if cache_offline {
            if let Err(error) = offline.cache_user_data(&user, &tokens.access_token).await {
                failures.push(format!("cache offline user: {error}"));
            }
        }

        Some(AuthAction::SessionSyncFinished {
            user_id: user.id,
            session_started: true,
            failures,
        })
    })
}

/// Refresh the offline snapshot in the background.
pub(crate) fn refresh_offline_cache<S, B, F, O>(
    state: &mut AuthState,
    env: &AuthEnvironment<S, B, F, O>,
    user: CurrentUser,
    access_token: String,
) -> Effect<AuthAction>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    state.session_sync_pending = true;
    let offline = env.offline.clone();

    Effect::future(async move {
        let failures = match offline.cache_user_data(&user, &access_token).await {
            Ok(()) => Vec::new(),
            Err(error) => vec![format!("cache offline user: {error}")],
        };

        Some(AuthAction::SessionSyncFinished {
            user_id: user.id,
            session_started: false,
            failures,
        })
    })
}

/// Unified authentication reducer.
///
/// Routes actions to the sub-reducer that owns them and records operation
/// outcomes.
#[derive(Clone, Debug)]
pub struct AuthReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    credentials: CredentialsReducer<S, B, F, O>,
    session: SessionReducer<S, B, F, O>,
    form: FormReducer<AuthEnvironment<S, B, F, O>>,
}

impl<S, B, F, O> AuthReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    /// Create a reducer using `policy` to present errors.
    #[must_use]
    pub fn new(policy: ErrorPolicy) -> Self {
        let transitions = Transitions::new(policy);
        Self {
            credentials: CredentialsReducer::with_transitions(transitions.clone()),
            session: SessionReducer::with_transitions(transitions),
            form: FormReducer::new(),
        }
    }
}

impl<S, B, F, O> Default for AuthReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    fn default() -> Self {
        Self::new(ErrorPolicy::default())
    }
}

impl<S, B, F, O> Reducer for AuthReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    type State = AuthState;
    type Action = AuthAction;
    type Environment = AuthEnvironment<S, B, F, O>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let effects = match action {
            // Credential operations
            AuthAction::SignUpWithEmail { .. }
            | AuthAction::SignInWithEmail { .. }
            | AuthAction::SignInWithGoogle { .. }
            | AuthAction::LinkGoogleAccount { .. }
            | AuthAction::MergeGoogleAccount { .. }
            | AuthAction::ResetPassword { .. }
            | AuthAction::CredentialsResolved { .. }
            | AuthAction::GoogleLinkResolved { .. }
            | AuthAction::PasswordResetResolved { .. } => self.credentials.reduce(state, action, env),

            // Session lifecycle
            AuthAction::Initialize { .. }
            | AuthAction::Initialized { .. }
            | AuthAction::CheckAuthenticationStatus { .. }
            | AuthAction::StatusResolved { .. }
            | AuthAction::SignOut { .. }
            | AuthAction::SignOutFinished { .. }
            | AuthAction::SessionSyncFinished { .. }
            | AuthAction::OrphanSessionEnded { .. }
            | AuthAction::OperationTimedOut { .. }
            | AuthAction::SessionStateChanged { .. }
            | AuthAction::SessionErrorReceived { .. } => self.session.reduce(state, action, env),

            // Form
            AuthAction::UpdateFormField { .. } | AuthAction::ResetForm | AuthAction::ClearError => {
                self.form.reduce(state, action, env)
            },

            AuthAction::OperationFinished { op, kind, outcome } => {
                metrics::counter!(
                    "auth.operations.total",
                    "operation" => kind.as_str(),
                    "outcome" => outcome.as_str()
                )
                .increment(1);
                tracing::debug!(%op, operation = %kind, outcome = outcome.as_str(), "Operation finished");
                smallvec![Effect::None]
            },
        };

        debug_assert!(
            state.is_consistent(),
            "status {:?} disagrees with user presence",
            state.status
        );
        effects
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::test_environment;
    use crate::state::{AuthenticationState, Secret};
    use scholarlens_testing::{ReducerTest, assertions};

    #[test]
    fn test_second_credential_operation_is_rejected_without_touching_state() {
        let env = test_environment();
        let running = OperationId::new();

        ReducerTest::new(AuthReducer::default())
            .with_env(env)
            .given_state(AuthState::default())
            .when_action(AuthAction::SignInWithGoogle {
                op: running,
                remember_me: false,
            })
            .when_action(AuthAction::SignInWithEmail {
                op: OperationId::new(),
                email: "ada@example.com".to_string(),
                password: Secret::new("pw"),
                remember_me: false,
            })
            .then_state(move |state| {
                let in_flight = state.in_flight.as_ref().unwrap();
                assert_eq!(in_flight.id, running);
                assert_eq!(in_flight.kind, OperationKind::SignInWithGoogle);
                assert_eq!(state.status, AuthenticationState::Unauthenticated);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn test_operation_finished_has_no_effects() {
        let env = test_environment();

        ReducerTest::new(AuthReducer::default())
            .with_env(env)
            .given_state(AuthState::default())
            .when_action(AuthAction::OperationFinished {
                op: OperationId::new(),
                kind: OperationKind::SignOut,
                outcome: Outcome::Completed,
            })
            .then_state(|state| assert_eq!(*state, AuthState::default()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_account_conflict_records_email_metadata() {
        let transitions = Transitions::default();
        let mut state = AuthState::default();
        let op = OperationId::new();
        state.begin(op, OperationKind::SignInWithGoogle);

        let _ = transitions.fail(
            &mut state,
            op,
            OperationKind::SignInWithGoogle,
            &ProviderError::rejected(
                ErrorKind::AccountExistsWithDifferentCredential,
                "An account already exists for grace@example.com",
            ),
        );

        let error = state.error.unwrap();
        assert_eq!(error.conflicting_email(), Some("grace@example.com"));
        assert_eq!(state.status, AuthenticationState::Error);
    }

    #[test]
    fn test_suppressed_failure_only_updates_last_error() {
        let transitions = Transitions::new(ErrorPolicy::default().with_rule(
            ErrorKind::Unknown,
            crate::policy::ErrorRule::default_for(ErrorKind::Unknown).hidden(),
        ));
        let mut state = AuthState::default();
        let op = OperationId::new();
        state.begin(op, OperationKind::ResetPassword);

        let _ = transitions.fail(
            &mut state,
            op,
            OperationKind::ResetPassword,
            &ProviderError::Transport("timeout".to_string()),
        );

        assert!(state.error.is_none());
        assert_eq!(state.status, AuthenticationState::Unauthenticated);
        assert_eq!(state.last_error.as_ref().unwrap().kind, ErrorKind::Unknown);
        assert!(!state.is_loading());
    }
}
