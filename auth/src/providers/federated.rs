//! Federated (Google) identity client.

use crate::error::ProviderResult;
use crate::providers::{AuthGrant, TokenPair};
use crate::state::CurrentUser;
use std::future::Future;

/// Google sign-in, account linking and account merging.
///
/// A dismissed sign-in sheet is reported as
/// `ProviderError::Rejected { kind: UserCancelled, .. }`; an email that is
/// already registered with a password as
/// `Rejected { kind: AccountExistsWithDifferentCredential, .. }`, ideally with
/// the address somewhere in the message.
pub trait FederatedIdentity: Send + Sync {
    /// Prepare the SDK.
    ///
    /// # Errors
    ///
    /// Returns error if the SDK cannot be configured.
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Whether the device can run the Google sign-in flow.
    fn is_play_services_available(&self) -> impl Future<Output = bool> + Send;

    /// Interactive sign-in. Creates the account on first use.
    ///
    /// # Errors
    ///
    /// Returns `UserCancelled`, `AccountExistsWithDifferentCredential`,
    /// `GoogleSignInFailed` or a transport error.
    fn sign_in_with_google(&self) -> impl Future<Output = ProviderResult<AuthGrant>> + Send;

    /// Non-interactive sign-in with a previously authorized account.
    ///
    /// Returns `Ok(None)` when no account is remembered.
    ///
    /// # Errors
    ///
    /// Returns error if the SDK call fails.
    fn sign_in_silently(&self) -> impl Future<Output = ProviderResult<Option<AuthGrant>>> + Send;

    /// Forget the Google account on this device.
    ///
    /// # Errors
    ///
    /// Returns error if the SDK call fails.
    fn sign_out(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Whether the account behind `email` may link a Google identity.
    ///
    /// # Errors
    ///
    /// Returns error if the eligibility check fails.
    fn can_link_google_account(
        &self,
        email: &str,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<bool>> + Send;

    /// Link a Google identity to the account owning `access_token`.
    ///
    /// Returns the updated user.
    ///
    /// # Errors
    ///
    /// Returns `UserCancelled`, `GoogleSignInFailed` or a transport error.
    fn link_google_account(
        &self,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<CurrentUser>> + Send;

    /// Merge the Google identity behind `provider_tokens` into the email
    /// account identified by `email`/`password`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for a wrong password, or a provider error.
    fn merge_google_account(
        &self,
        email: &str,
        password: &str,
        provider_tokens: &TokenPair,
    ) -> impl Future<Output = ProviderResult<AuthGrant>> + Send;
}
