//! Mock auth backend.

use super::{CallLog, Failures};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{AuthBackend, AuthGrant, TokenPair};
use crate::state::{AuthProvider, CurrentUser};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Mock backend.
///
/// Accepts every request by default. A signed-in user's id is
/// `user-<email>` and the access token `access-<email>`.
#[derive(Debug, Clone, Default)]
pub struct MockAuthBackend {
    calls: CallLog,
    failures: Failures,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockAuthBackend {
    /// Create a backend that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slow every call down by `delay`.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    /// Fail sign-in with `error`.
    pub fn fail_sign_in(&self, error: ProviderError) {
        self.failures.set("sign_in_with_email", error);
    }

    /// Fail sign-up with `error`.
    pub fn fail_sign_up(&self, error: ProviderError) {
        self.failures.set("sign_up_with_email", error);
    }

    /// Fail remote sign-out with `error`.
    pub fn fail_sign_out(&self, error: ProviderError) {
        self.failures.set("sign_out", error);
    }

    /// Fail password reset requests with `error`.
    pub fn fail_reset(&self, error: ProviderError) {
        self.failures.set("request_password_reset", error);
    }

    /// Reject token lookups with `error`.
    pub fn fail_current_user(&self, error: ProviderError) {
        self.failures.set("current_user", error);
    }

    /// How often `method` was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.calls.count(method)
    }

    fn grant(email: &str, name: Option<&str>) -> AuthGrant {
        let mut user = CurrentUser::new(format!("user-{email}"), email, AuthProvider::EmailPassword);
        if let Some(name) = name {
            user = user.with_display_name(name);
        }
        AuthGrant::new(
            user,
            TokenPair {
                access_token: format!("access-{email}"),
                refresh_token: Some(format!("refresh-{email}")),
            },
        )
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
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            failure.map_or(Ok(ok), Err)
        }
    }
}

impl AuthBackend for MockAuthBackend {
    fn sign_up_with_email(
        &self,
        email: &str,
        _password: &str,
        name: &str,
    ) -> impl Future<Output = ProviderResult<AuthGrant>> + Send {
        self.call("sign_up_with_email", Self::grant(email, Some(name)))
    }

    fn sign_in_with_email(
        &self,
        email: &str,
        _password: &str,
    ) -> impl Future<Output = ProviderResult<AuthGrant>> + Send {
        self.call("sign_in_with_email", Self::grant(email, None))
    }

    fn sign_out(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.call("sign_out", ())
    }

    fn request_password_reset(&self, _email: &str) -> impl Future<Output = ProviderResult<()>> + Send {
        self.call("request_password_reset", ())
    }

    fn current_user(
        &self,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<CurrentUser>> + Send {
        let email = access_token.strip_prefix("access-").unwrap_or(access_token);
        let user = CurrentUser::new(format!("user-{email}"), email, AuthProvider::EmailPassword);
        self.call("current_user", user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::ErrorKind;

    #[tokio::test]
    async fn test_sign_up_uses_name_as_display_name() {
        let backend = MockAuthBackend::new();

        let grant = backend
            .sign_up_with_email("ada@example.com", "abc12345", "Ada")
            .await
            .unwrap();

        assert_eq!(grant.user.id, "user-ada@example.com");
        assert_eq!(grant.user.display_name.as_deref(), Some("Ada"));
        assert_eq!(backend.calls("sign_up_with_email"), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = MockAuthBackend::new();
        backend.fail_sign_in(ProviderError::rejected(ErrorKind::InvalidCredentials, "nope"));

        let result = backend.sign_in_with_email("ada@example.com", "pw").await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidCredentials);
    }
}
