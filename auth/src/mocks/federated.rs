//! Mock Google sign-in client.

use super::{CallLog, Failures};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{AuthGrant, FederatedIdentity, TokenPair};
use crate::state::{AuthProvider, CurrentUser};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct Script {
    play_services: AtomicBool,
    can_link: AtomicBool,
    silent: Mutex<Option<AuthGrant>>,
    delay: Mutex<Option<Duration>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            play_services: AtomicBool::new(true),
            can_link: AtomicBool::new(true),
            silent: Mutex::new(None),
            delay: Mutex::new(None),
        }
    }
}

/// Mock Google client.
///
/// Play services are available, interactive sign-in returns the Google user
/// `grace@gmail.com`, no account is remembered for silent sign-in, and every
/// account may link.
#[derive(Debug, Clone, Default)]
pub struct MockFederatedIdentity {
    calls: CallLog,
    failures: Failures,
    script: Arc<Script>,
}

impl MockFederatedIdentity {
    /// Email of the Google account the mock signs in.
    pub const GOOGLE_EMAIL: &'static str = "grace@gmail.com";

    /// Create a client where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The grant interactive sign-in returns.
    #[must_use]
    pub fn google_grant() -> AuthGrant {
        AuthGrant::new(
            CurrentUser::new("google-grace", Self::GOOGLE_EMAIL, AuthProvider::Google)
                .with_display_name("Grace"),
            TokenPair::access_only("google-access"),
        )
    }

    /// Slow every call down by `delay`.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.script.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    /// Remember `grant` for silent sign-in.
    #[must_use]
    pub fn with_silent_user(self, grant: AuthGrant) -> Self {
        *self.script.silent.lock().unwrap_or_else(PoisonError::into_inner) = Some(grant);
        self
    }

    /// Report play services as missing.
    pub fn play_services_unavailable(&self) {
        self.script.play_services.store(false, Ordering::SeqCst);
    }

    /// Refuse to link any account.
    pub fn deny_linking(&self) {
        self.script.can_link.store(false, Ordering::SeqCst);
    }

    /// Fail interactive sign-in with `error`.
    pub fn fail_sign_in(&self, error: ProviderError) {
        self.failures.set("sign_in_with_google", error);
    }

    /// Have the user dismiss the sign-in sheet.
    pub fn cancel_sign_in(&self) {
        self.fail_sign_in(ProviderError::cancelled());
    }

    /// Fail SDK initialization with `error`.
    pub fn fail_initialize(&self, error: ProviderError) {
        self.failures.set("initialize", error);
    }

    /// Fail Google sign-out with `error`.
    pub fn fail_sign_out(&self, error: ProviderError) {
        self.failures.set("sign_out", error);
    }

    /// Fail account merging with `error`.
    pub fn fail_merge(&self, error: ProviderError) {
        self.failures.set("merge_google_account", error);
    }

    /// How often `method` was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.calls.count(method)
    }

    fn call<T>(
        &self,
        method: &'static str,
        ok: T,
    ) -> impl Future<Output = ProviderResult<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.calls.record(method);
        let failure = self.failures.get(method);
        let delay = *self.script.delay.lock().unwrap_or_else(PoisonError::into_inner);

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            failure.map_or(Ok(ok), Err)
        }
    }
}

impl FederatedIdentity for MockFederatedIdentity {
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.call("initialize", ())
    }

    fn is_play_services_available(&self) -> impl Future<Output = bool> + Send {
        self.calls.record("is_play_services_available");
        let available = self.script.play_services.load(Ordering::SeqCst);
        async move { available }
    }

    fn sign_in_with_google(&self) -> impl Future<Output = ProviderResult<AuthGrant>> + Send {
        self.call("sign_in_with_google", Self::google_grant())
    }

    fn sign_in_silently(&self) -> impl Future<Output = ProviderResult<Option<AuthGrant>>> + Send {
        let grant = self
            .script
            .silent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.call("sign_in_silently", grant)
    }

    fn sign_out(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.call("sign_out", ())
    }

    fn can_link_google_account(
        &self,
        _email: &str,
        _access_token: &str,
    ) -> impl Future<Output = ProviderResult<bool>> + Send {
        let allowed = self.script.can_link.load(Ordering::SeqCst);
        self.call("can_link_google_account", allowed)
    }

    fn link_google_account(
        &self,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<CurrentUser>> + Send {
        let email = access_token.strip_prefix("access-").unwrap_or(Self::GOOGLE_EMAIL);
        let user = CurrentUser::new(format!("user-{email}"), email, AuthProvider::Google);
        self.call("link_google_account", user)
    }

    fn merge_google_account(
        &self,
        email: &str,
        _password: &str,
        provider_tokens: &TokenPair,
    ) -> impl Future<Output = ProviderResult<AuthGrant>> + Send {
        let grant = AuthGrant::new(
            CurrentUser::new(format!("user-{email}"), email, AuthProvider::Google),
            TokenPair::access_only(format!("merged-{}", provider_tokens.access_token)),
        );
        self.call("merge_google_account", grant)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::ErrorKind;

    #[tokio::test]
    async fn test_defaults() {
        let client = MockFederatedIdentity::new();

        assert!(client.is_play_services_available().await);
        assert_eq!(client.sign_in_silently().await.unwrap(), None);
        assert_eq!(
            client.sign_in_with_google().await.unwrap().user.email,
            MockFederatedIdentity::GOOGLE_EMAIL
        );
    }

    #[tokio::test]
    async fn test_cancel_sign_in() {
        let client = MockFederatedIdentity::new();
        client.cancel_sign_in();

        let error = client.sign_in_with_google().await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::UserCancelled);
        assert_eq!(client.calls("sign_in_with_google"), 1);
    }
}
