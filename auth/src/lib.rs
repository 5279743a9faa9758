//! # ScholarLens Authentication
//!
//! The authentication session orchestrator of the ScholarLens client: email
//! sign-up and sign-in, Google sign-in with account linking and merging,
//! session restore (stored session, offline cache, silent Google sign-in),
//! sign-out, password reset and real-time form validation.
//!
//! ## Architecture
//!
//! Authentication runs as a reducer over [`AuthState`]; collaborator calls are
//! effect descriptions executed by the store:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! [`AuthOrchestrator`] is the facade. Each operation sends a command and
//! waits for its terminal [`AuthAction::OperationFinished`]. Only one
//! credential operation runs at a time; sign-out supersedes whatever is
//! running.
//!
//! Collaborators are injected through [`AuthEnvironment`]:
//!
//! - [`providers::AuthBackend`]: the remote auth API
//! - [`providers::FederatedIdentity`]: the Google sign-in client
//! - [`providers::SessionManager`]: token lifetime and session events
//!   ([`providers::LocalSessionManager`] ships with the crate)
//! - [`providers::OfflineAuth`]: cached credentials for offline sign-in
//!   ([`providers::CachedOfflineAuth`] ships with the crate)
//!
//! ## Example
//!
//! ```
//! use scholarlens_auth::mocks::test_environment;
//! use scholarlens_auth::{AuthConfig, AuthOrchestrator, ErrorKind};
//!
//! # tokio_test::block_on(async {
//! let auth = AuthOrchestrator::start(AuthConfig::default(), test_environment()).await;
//!
//! let result = auth.sign_in_with_email("not-an-email", "secret", false).await;
//!
//! assert!(result.is_err());
//! assert_eq!(auth.error_kind().await, Some(ErrorKind::Validation));
//! # });
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod providers;
pub mod reducers;
pub mod state;
pub mod validation;

// Test utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::{AuthAction, Outcome};
pub use config::{AuthConfig, ConfigError, OfflineConfig, SessionConfig};
pub use environment::AuthEnvironment;
pub use error::{AuthError, ProviderError, ProviderResult, Result, StorageError};
pub use orchestrator::{AuthOrchestrator, AuthStore};
pub use policy::{ErrorPolicy, ErrorRule};
pub use reducers::AuthReducer;
pub use state::{
    AuthProvider, AuthState, AuthenticationState, CurrentUser, ErrorInfo, ErrorKind,
    FieldValidation, FormField, FormValidationState, OperationId, OperationKind, Secret,
};
