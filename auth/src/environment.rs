//! Authentication environment.
//!
//! Bundles the collaborators the reducer's effects call into.

use crate::providers::{AuthBackend, FederatedIdentity, OfflineAuth, SessionManager};

/// Authentication environment.
///
/// # Type Parameters
///
/// - `S`: Session manager
/// - `B`: Auth backend
/// - `F`: Federated (Google) identity client
/// - `O`: Offline auth cache
#[derive(Clone, Debug)]
pub struct AuthEnvironment<S, B, F, O>
where
    S: SessionManager + Clone,
    B: AuthBackend + Clone,
    F: FederatedIdentity + Clone,
    O: OfflineAuth + Clone,
{
    /// Session manager.
    pub sessions: S,

    /// Remote auth backend.
    pub backend: B,

    /// Google sign-in client.
    pub federated: F,

    /// Offline credential cache.
    pub offline: O,
}

impl<S, B, F, O> AuthEnvironment<S, B, F, O>
where
    S: SessionManager + Clone,
    B: AuthBackend + Clone,
    F: FederatedIdentity + Clone,
    O: OfflineAuth + Clone,
{
    /// Create a new auth environment.
    #[must_use]
    pub const fn new(sessions: S, backend: B, federated: F, offline: O) -> Self {
        Self {
            sessions,
            backend,
            federated,
            offline,
        }
    }
}
