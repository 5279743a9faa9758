//! Session reducer.
//!
//! Owns everything that is not a credential exchange: collaborator
//! initialization, restoring a previous session on start-up, sign-out,
//! background session sync results, and the session manager's events.

use super::{Transitions, establish, finished};
use crate::actions::{AuthAction, Outcome, StatusResolution};
use crate::environment::AuthEnvironment;
use crate::error::ProviderError;
use crate::providers::{AuthBackend, FederatedIdentity, OfflineAuth, SessionManager};
use crate::state::{AuthProvider, AuthState, AuthenticationState, InFlight, OperationKind};
use scholarlens_core::effect::Effect;
use scholarlens_core::reducer::Reducer;
use scholarlens_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Session reducer.
#[derive(Clone, Debug)]
pub struct SessionReducer<S, B, F, O> {
    transitions: Transitions,
    _env: PhantomData<(S, B, F, O)>,
}

impl<S, B, F, O> SessionReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    /// Create a session reducer with the default error policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transitions(Transitions::default())
    }

    pub(crate) const fn with_transitions(transitions: Transitions) -> Self {
        Self {
            transitions,
            _env: PhantomData,
        }
    }
}

impl<S, B, F, O> Default for SessionReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Try each way of restoring a user, first success wins.
async fn resolve_status<S, B, F, O>(env: &AuthEnvironment<S, B, F, O>) -> StatusResolution
where
    S: SessionManager + Clone,
    B: AuthBackend + Clone,
    F: FederatedIdentity + Clone,
    O: OfflineAuth + Clone,
{
    if env.sessions.is_session_valid().await {
        if let Some(token) = env.sessions.valid_access_token().await {
            match env.backend.current_user(&token).await {
                Ok(user) => return StatusResolution::Session(user),
                Err(error) => tracing::info!(%error, "Backend rejected the stored session"),
            }
        }
    }

    if env.offline.is_offline_auth_available().await {
        match env.offline.authenticate_offline().await {
            Ok(user) => return StatusResolution::Offline(user),
            Err(error) => tracing::info!(%error, "Offline sign-in failed"),
        }
    }

    match env.federated.sign_in_silently().await {
        Ok(Some(grant)) => StatusResolution::Silent(grant),
        Ok(None) => StatusResolution::NoSession,
        Err(error) => {
            tracing::info!(%error, "Silent Google sign-in failed");
            StatusResolution::NoSession
        },
    }
}

impl<S, B, F, O> Reducer for SessionReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    type State = AuthState;
    type Action = AuthAction;
    type Environment = AuthEnvironment<S, B, F, O>;

    #[allow(clippy::too_many_lines)] // one arm per lifecycle step
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════════
            // Initialization
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::Initialize { op } => {
                let kind = OperationKind::Initialize;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                let env = env.clone();
                smallvec![Effect::future(async move {
                    let mut result = env.sessions.initialize().await;
                    if result.is_ok() {
                        result = env.federated.initialize().await;
                    }
                    if result.is_ok() {
                        result = env.offline.initialize().await;
                    }
                    Some(AuthAction::Initialized { op, result })
                })]
            },

            AuthAction::Initialized { op, result } => {
                let kind = OperationKind::Initialize;
                match result {
                    Ok(()) => {
                        if state.complete(op).is_none() {
                            return smallvec![Transitions::superseded(op, kind)];
                        }
                        tracing::info!("Authentication collaborators initialized");
                        state.initialized = true;
                        smallvec![finished(op, kind, Outcome::Completed)]
                    },
                    // Whatever went wrong, start-up reports it as an unknown error
                    Err(error) => {
                        let error = ProviderError::Internal(error.message().to_string());
                        smallvec![self.transitions.fail(state, op, kind, &error)]
                    },
                }
            },

            // ═══════════════════════════════════════════════════════════════════
            // Status Check
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::CheckAuthenticationStatus { op } => {
                if let Some(rejected) =
                    Transitions::admit(state, op, OperationKind::CheckAuthenticationStatus)
                {
                    return smallvec![rejected];
                }

                let env = env.clone();
                smallvec![Effect::future(async move {
                    let resolution = resolve_status(&env).await;
                    Some(AuthAction::StatusResolved { op, resolution })
                })]
            },

            AuthAction::StatusResolved { op, resolution } => {
                let kind = OperationKind::CheckAuthenticationStatus;
                if state.complete(op).is_none() {
                    return smallvec![Transitions::superseded(op, kind)];
                }

                let sync = match resolution {
                    StatusResolution::Session(user) => {
                        tracing::info!(user_id = %user.id, "Restored session");
                        state.authenticate(user);
                        state.offline_mode = false;
                        Effect::None
                    },
                    StatusResolution::Offline(user) => {
                        tracing::info!(user_id = %user.id, "Restored user from offline cache");
                        state.authenticate(user);
                        state.offline_mode = true;
                        Effect::None
                    },
                    StatusResolution::Silent(grant) => {
                        tracing::info!(user_id = %grant.user.id, "Restored user by silent Google sign-in");
                        establish(state, env, grant, true, true)
                    },
                    StatusResolution::NoSession => {
                        tracing::debug!("No session to restore");
                        state.clear_session();
                        Effect::None
                    },
                };

                smallvec![finished(op, kind, Outcome::Completed), sync]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Sign-Out
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::SignOut { op } => {
                let outgoing = state.current_user.take();
                if let Some(running) = state.in_flight.take() {
                    tracing::info!(superseded = %running.kind, "Sign-out supersedes running operation");
                }

                tracing::info!(
                    user_id = outgoing.as_ref().map(|user| user.id.as_str()),
                    "Signing out"
                );
                state.clear_session();
                state.error = None;
                state.remember_me = false;
                state.session_sync_pending = false;
                state.form.clear();
                state.in_flight = Some(InFlight {
                    id: op,
                    kind: OperationKind::SignOut,
                    prior_error: None,
                    prior_status: AuthenticationState::Unauthenticated,
                });

                let was_google = outgoing.is_some_and(|user| user.provider == AuthProvider::Google);
                let env = env.clone();

                smallvec![Effect::future(async move {
                    let mut failures = Vec::new();

                    if let Err(error) = env.backend.sign_out().await {
                        failures.push(format!("backend sign-out: {error}"));
                    }
                    if was_google {
                        if let Err(error) = env.federated.sign_out().await {
                            failures.push(format!("Google sign-out: {error}"));
                        }
                    }
                    if let Err(error) = env.sessions.end_session().await {
                        failures.push(format!("end session: {error}"));
                    }
                    if let Err(error) = env.offline.clear_cached_data().await {
                        failures.push(format!("clear offline cache: {error}"));
                    }

                    Some(AuthAction::SignOutFinished { op, failures })
                })]
            },

            AuthAction::SignOutFinished { op, failures } => {
                let kind = OperationKind::SignOut;
                if state.complete(op).is_none() {
                    return smallvec![Transitions::superseded(op, kind)];
                }

                for failure in &failures {
                    tracing::warn!(%failure, "Sign-out step failed");
                }
                metrics::counter!("auth.sign_out.step_failures").increment(failures.len() as u64);
                tracing::info!(failed_steps = failures.len(), "Signed out");

                smallvec![finished(op, kind, Outcome::Completed)]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Background Sync
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::SessionSyncFinished {
                user_id,
                session_started,
                failures,
            } => {
                state.session_sync_pending = false;

                if failures.is_empty() {
                    tracing::debug!(%user_id, "Session sync finished");
                    state.last_sync_error = None;
                } else {
                    for failure in &failures {
                        tracing::warn!(%user_id, %failure, "Session sync step failed");
                    }
                    state.last_sync_error = Some(failures.join("; "));
                }

                // The user left while the session was being established
                if session_started && state.current_user.is_none() {
                    tracing::warn!(%user_id, "Ending session started after sign-out");
                    let sessions = env.sessions.clone();
                    return smallvec![Effect::future(async move {
                        let error = sessions.end_session().await.err();
                        Some(AuthAction::OrphanSessionEnded { error })
                    })];
                }

                smallvec![Effect::None]
            },

            AuthAction::OrphanSessionEnded { error } => {
                if let Some(error) = error {
                    tracing::warn!(%error, "Failed to end orphaned session");
                }
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Timeouts
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::OperationTimedOut { op } => {
                let Some(kind) = state
                    .in_flight
                    .as_ref()
                    .filter(|in_flight| in_flight.id == op)
                    .map(|in_flight| in_flight.kind)
                else {
                    tracing::debug!(%op, "Timed-out operation already finished");
                    return smallvec![Effect::None];
                };

                metrics::counter!("auth.operations.timed_out", "operation" => kind.as_str()).increment(1);
                let error = ProviderError::Internal(format!("{kind} did not finish in time"));
                smallvec![self.transitions.fail(state, op, kind, &error)]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Session Events
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::SessionStateChanged { active } => {
                if !active && state.is_authenticated() {
                    tracing::info!("Session ended externally, signing out locally");
                    state.clear_session();
                    state.error = None;
                }
                smallvec![Effect::None]
            },

            AuthAction::SessionErrorReceived { kind } => {
                let info = self.transitions.policy().resolve(kind, "", None);
                tracing::warn!(error_kind = %kind, requires_reauth = info.requires_reauth, "Session error");

                if info.requires_reauth {
                    state.clear_session();
                }
                state.last_error = Some(info.clone());
                state.error = Some(info);
                state.status = if state.current_user.is_some() {
                    AuthenticationState::Authenticated
                } else if state.error.as_ref().is_some_and(|error| error.requires_reauth) {
                    AuthenticationState::Unauthenticated
                } else {
                    AuthenticationState::Error
                };

                smallvec![Effect::None]
            },

            // Other actions are not handled by the session reducer
            _ => smallvec![Effect::None],
        }
    }
}
