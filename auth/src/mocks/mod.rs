//! Mock collaborators for testing.
//!
//! In-memory implementations of every provider trait. Each mock is cheap to
//! clone and clones share state, so a test can keep one handle to script
//! failures and count calls while the orchestrator owns another.

pub mod backend;
pub mod federated;
pub mod offline;
pub mod session;

pub use backend::MockAuthBackend;
pub use federated::MockFederatedIdentity;
pub use offline::MockOfflineAuth;
pub use session::MockSessionManager;

use crate::environment::AuthEnvironment;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Environment wired with the mocks.
pub type MockEnvironment =
    AuthEnvironment<MockSessionManager, MockAuthBackend, MockFederatedIdentity, MockOfflineAuth>;

/// Fresh mock environment where every collaborator succeeds.
#[must_use]
pub fn test_environment() -> MockEnvironment {
    AuthEnvironment::new(
        MockSessionManager::new(),
        MockAuthBackend::new(),
        MockFederatedIdentity::new(),
        MockOfflineAuth::new(),
    )
}

/// Shared per-method call counter.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog {
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl CallLog {
    pub(crate) fn record(&self, method: &'static str) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        *calls.entry(method).or_default() += 1;
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or_default()
    }
}

/// Scripted failures keyed by method name.
#[derive(Debug, Clone, Default)]
pub(crate) struct Failures {
    scripted: Arc<Mutex<HashMap<&'static str, crate::error::ProviderError>>>,
}

impl Failures {
    pub(crate) fn set(&self, method: &'static str, error: crate::error::ProviderError) {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method, error);
    }

    pub(crate) fn get(&self, method: &str) -> Option<crate::error::ProviderError> {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_log_is_shared_between_clones() {
        let log = CallLog::default();
        let handle = log.clone();

        log.record("sign_out");
        log.record("sign_out");

        assert_eq!(handle.count("sign_out"), 2);
        assert_eq!(handle.count("sign_in_with_email"), 0);
    }
}
