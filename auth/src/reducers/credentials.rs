//! Credential reducer.
//!
//! # Flows
//!
//! ```text
//! SignUpWithEmail / SignInWithEmail ─┐
//! SignInWithGoogle                   ├─▶ effect ─▶ CredentialsResolved ─▶ Authenticated
//! MergeGoogleAccount                ─┘                                   + background session sync
//! LinkGoogleAccount  ─▶ effect ─▶ GoogleLinkResolved    ─▶ user replaced, offline cache refreshed
//! ResetPassword      ─▶ effect ─▶ PasswordResetResolved ─▶ status unchanged
//! ```
//!
//! Input is validated before any collaborator is called; a validation failure
//! finishes the operation in the same reduction.

use super::{Transitions, establish, finished, refresh_offline_cache};
use crate::actions::{AuthAction, LinkedAccount, Outcome};
use crate::environment::AuthEnvironment;
use crate::error::ProviderError;
use crate::providers::{AuthBackend, FederatedIdentity, OfflineAuth, SessionManager};
use crate::state::{AuthState, ErrorKind, OperationKind};
use crate::validation::{validate_email, validate_name, validate_password, validate_sign_in_password};
use scholarlens_core::effect::Effect;
use scholarlens_core::reducer::Reducer;
use scholarlens_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Message when Google sign-in cannot run on this device.
const PLAY_SERVICES_UNAVAILABLE: &str = "Google Play services are not available on this device";

/// Credential reducer.
#[derive(Clone, Debug)]
pub struct CredentialsReducer<S, B, F, O> {
    transitions: Transitions,
    _env: PhantomData<(S, B, F, O)>,
}

impl<S, B, F, O> CredentialsReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    /// Create a credential reducer with the default error policy.
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

impl<S, B, F, O> Default for CredentialsReducer<S, B, F, O>
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

impl<S, B, F, O> Reducer for CredentialsReducer<S, B, F, O>
where
    S: SessionManager + Clone + 'static,
    B: AuthBackend + Clone + 'static,
    F: FederatedIdentity + Clone + 'static,
    O: OfflineAuth + Clone + 'static,
{
    type State = AuthState;
    type Action = AuthAction;
    type Environment = AuthEnvironment<S, B, F, O>;

    #[allow(clippy::too_many_lines)] // one arm per credential flow
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════════
            // Email
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::SignUpWithEmail {
                op,
                email,
                password,
                name,
                remember_me,
            } => {
                let kind = OperationKind::SignUpWithEmail;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                let email = email.trim().to_string();
                let name = name.trim().to_string();
                if let Some(message) = validate_email(&email)
                    .or_else(|| validate_password(password.expose()))
                    .or_else(|| validate_name(&name))
                {
                    return smallvec![self.transitions.invalid(state, op, kind, message)];
                }

                tracing::info!(%op, "Signing up with email");
                let backend = env.backend.clone();

                smallvec![Effect::future(async move {
                    let result = backend
                        .sign_up_with_email(&email, password.expose(), &name)
                        .await;
                    Some(AuthAction::CredentialsResolved {
                        op,
                        kind,
                        result,
                        remember_me,
                    })
                })]
            },

            AuthAction::SignInWithEmail {
                op,
                email,
                password,
                remember_me,
            } => {
                let kind = OperationKind::SignInWithEmail;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                let email = email.trim().to_string();
                if let Some(message) =
                    validate_email(&email).or_else(|| validate_sign_in_password(password.expose()))
                {
                    return smallvec![self.transitions.invalid(state, op, kind, message)];
                }

                tracing::info!(%op, "Signing in with email");
                let backend = env.backend.clone();

                smallvec![Effect::future(async move {
                    let result = backend.sign_in_with_email(&email, password.expose()).await;
                    Some(AuthAction::CredentialsResolved {
                        op,
                        kind,
                        result,
                        remember_me,
                    })
                })]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Google
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::SignInWithGoogle { op, remember_me } => {
                let kind = OperationKind::SignInWithGoogle;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                tracing::info!(%op, "Signing in with Google");
                let federated = env.federated.clone();

                smallvec![Effect::future(async move {
                    let result = if federated.is_play_services_available().await {
                        federated.sign_in_with_google().await
                    } else {
                        Err(ProviderError::rejected(
                            ErrorKind::GoogleSignInFailed,
                            PLAY_SERVICES_UNAVAILABLE,
                        ))
                    };
                    Some(AuthAction::CredentialsResolved {
                        op,
                        kind,
                        result,
                        remember_me,
                    })
                })]
            },

            AuthAction::MergeGoogleAccount {
                op,
                email,
                password,
                remember_me,
            } => {
                let kind = OperationKind::MergeGoogleAccount;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                let email = email.trim().to_string();
                if let Some(message) =
                    validate_email(&email).or_else(|| validate_sign_in_password(password.expose()))
                {
                    return smallvec![self.transitions.invalid(state, op, kind, message)];
                }

                tracing::info!(%op, "Merging Google account into email account");
                let federated = env.federated.clone();

                smallvec![Effect::future(async move {
                    let result = async {
                        if !federated.is_play_services_available().await {
                            return Err(ProviderError::rejected(
                                ErrorKind::GoogleSignInFailed,
                                PLAY_SERVICES_UNAVAILABLE,
                            ));
                        }
                        let google = federated.sign_in_with_google().await?;
                        let tokens = google.tokens.ok_or_else(|| {
                            ProviderError::rejected(
                                ErrorKind::GoogleSignInFailed,
                                "Google sign-in returned no credentials to merge",
                            )
                        })?;
                        federated
                            .merge_google_account(&email, password.expose(), &tokens)
                            .await
                    }
                    .await;

                    Some(AuthAction::CredentialsResolved {
                        op,
                        kind,
                        result,
                        remember_me,
                    })
                })]
            },

            AuthAction::LinkGoogleAccount { op } => {
                let kind = OperationKind::LinkGoogleAccount;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                let Some(user) = state.current_user.clone() else {
                    return smallvec![self.transitions.invalid(
                        state,
                        op,
                        kind,
                        "You must be signed in to link a Google account".to_string(),
                    )];
                };

                tracing::info!(%op, user_id = %user.id, "Linking Google account");
                let sessions = env.sessions.clone();
                let federated = env.federated.clone();

                smallvec![Effect::future(async move {
                    let result = async {
                        let access_token = sessions.valid_access_token().await.ok_or_else(|| {
                            ProviderError::rejected(
                                ErrorKind::Validation,
                                "Your session has expired. Sign in again to link a Google account",
                            )
                        })?;

                        if !federated
                            .can_link_google_account(&user.email, &access_token)
                            .await?
                        {
                            return Err(ProviderError::rejected(
                                ErrorKind::Validation,
                                "This account cannot be linked to a Google account",
                            ));
                        }

                        let user = federated.link_google_account(&access_token).await?;
                        Ok::<_, ProviderError>(LinkedAccount { user, access_token })
                    }
                    .await;

                    Some(AuthAction::GoogleLinkResolved { op, result })
                })]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Password Reset
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::ResetPassword { op, email } => {
                let kind = OperationKind::ResetPassword;
                if let Some(rejected) = Transitions::admit(state, op, kind) {
                    return smallvec![rejected];
                }

                let email = email.trim().to_string();
                if let Some(message) = validate_email(&email) {
                    return smallvec![self.transitions.invalid(state, op, kind, message)];
                }

                tracing::info!(%op, "Requesting password reset");
                let backend = env.backend.clone();

                smallvec![Effect::future(async move {
                    let result = backend.request_password_reset(&email).await;
                    Some(AuthAction::PasswordResetResolved { op, result })
                })]
            },

            // ═══════════════════════════════════════════════════════════════════
            // Results
            // ═══════════════════════════════════════════════════════════════════
            AuthAction::CredentialsResolved {
                op,
                kind,
                result,
                remember_me,
            } => match result {
                Ok(grant) => {
                    if state.complete(op).is_none() {
                        return smallvec![Transitions::superseded(op, kind)];
                    }
                    let sync = establish(state, env, grant, remember_me, kind.caches_offline());
                    smallvec![finished(op, kind, Outcome::Completed), sync]
                },
                Err(error) => smallvec![self.transitions.fail(state, op, kind, &error)],
            },

            AuthAction::GoogleLinkResolved { op, result } => {
                let kind = OperationKind::LinkGoogleAccount;
                match result {
                    Ok(LinkedAccount { user, access_token }) => {
                        if state.complete(op).is_none() || !state.is_authenticated() {
                            return smallvec![Transitions::superseded(op, kind)];
                        }
                        tracing::info!(user_id = %user.id, "Google account linked");
                        state.authenticate(user.clone());
                        let sync = refresh_offline_cache(state, env, user, access_token);
                        smallvec![finished(op, kind, Outcome::Completed), sync]
                    },
                    Err(error) => smallvec![self.transitions.fail(state, op, kind, &error)],
                }
            },

            AuthAction::PasswordResetResolved { op, result } => {
                let kind = OperationKind::ResetPassword;
                match result {
                    Ok(()) => {
                        if state.complete(op).is_none() {
                            return smallvec![Transitions::superseded(op, kind)];
                        }
                        tracing::info!(%op, "Password reset email requested");
                        smallvec![finished(op, kind, Outcome::Completed)]
                    },
                    Err(error) => smallvec![self.transitions.fail(state, op, kind, &error)],
                }
            },

            // Other actions are not handled by the credential reducer
            _ => smallvec![Effect::None],
        }
    }
}
