//! Authentication collaborators.
//!
//! Every external dependency of the orchestrator sits behind a trait, so the
//! reducer can be driven by mocks in tests and by real services in the app.
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────┐
//! │ AuthReducer          │─────▶│ AuthBackend              │  remote auth API
//! │ (pure transitions,   │      │ FederatedIdentity        │  Google sign-in SDK
//! │  effect descriptions)│      │ SessionManager           │  token lifecycle
//! └──────────────────────┘      │ OfflineAuth              │  cached credentials
//!                               └────────────┬─────────────┘
//!                                            │ (local impls)
//!                                            ▼
//!                               ┌──────────────────────────┐
//!                               │ KeyValueStore            │  secure storage
//!                               └──────────────────────────┘
//! ```
//!
//! The backend and Google client are trait-only here. The session manager
//! and offline cache come with local implementations
//! ([`LocalSessionManager`], [`CachedOfflineAuth`]) over a [`KeyValueStore`].

use crate::state::CurrentUser;
use serde::{Deserialize, Serialize};

pub mod backend;
pub mod federated;
pub mod offline;
pub mod session;
pub mod storage;

pub use backend::AuthBackend;
pub use federated::FederatedIdentity;
pub use offline::{CachedOfflineAuth, OfflineAuth, OfflineStatus};
pub use session::{LocalSessionManager, Session, SessionManager, StartSession};
pub use storage::{KeyValueStore, MemoryKeyValueStore};

/// Tokens issued on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,

    /// Refresh token, if the issuer hands one out.
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Access token without a refresh token.
    #[must_use]
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }
}

/// Result of a successful credential exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    /// The authenticated user.
    pub user: CurrentUser,

    /// Tokens for a new session. Absent when the issuer keeps the session itself.
    pub tokens: Option<TokenPair>,
}

impl AuthGrant {
    /// A grant with tokens.
    #[must_use]
    pub const fn new(user: CurrentUser, tokens: TokenPair) -> Self {
        Self {
            user,
            tokens: Some(tokens),
        }
    }
}
