//! Remote authentication backend.

use crate::error::ProviderResult;
use crate::providers::AuthGrant;
use crate::state::CurrentUser;
use std::future::Future;

/// The remote auth API (email accounts, password resets, user lookup).
///
/// # Implementation Notes
///
/// - Wrong credentials are reported as
///   `ProviderError::Rejected { kind: InvalidCredentials, .. }`
/// - Expired or revoked tokens as `Rejected { kind: TokenInvalid, .. }`
/// - Network failures as `ProviderError::Transport`
pub trait AuthBackend: Send + Sync {
    /// Create an email account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns error if the email is taken, the password is rejected, or the
    /// request fails.
    fn sign_up_with_email(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> impl Future<Output = ProviderResult<AuthGrant>> + Send;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for a wrong email/password pair, or a
    /// transport error.
    fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = ProviderResult<AuthGrant>> + Send;

    /// End the backend session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn sign_out(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Send a password reset email.
    ///
    /// # Errors
    ///
    /// Returns error if the address is unknown or the request fails.
    fn request_password_reset(&self, email: &str) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Look up the user owning `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` if the token is not accepted, or a transport error.
    fn current_user(
        &self,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<CurrentUser>> + Send;
}
