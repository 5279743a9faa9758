//! Mock offline credential cache.

use super::CallLog;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{OfflineAuth, OfflineStatus};
use crate::state::{CurrentUser, ErrorKind};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
struct Inner {
    cached: Mutex<Option<CurrentUser>>,
    online: AtomicBool,
    fail_all: AtomicBool,
}

/// Mock offline cache. Snapshots never expire.
#[derive(Debug, Clone)]
pub struct MockOfflineAuth {
    calls: CallLog,
    inner: Arc<Inner>,
}

impl MockOfflineAuth {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
            inner: Arc::new(Inner {
                cached: Mutex::new(None),
                online: AtomicBool::new(true),
                fail_all: AtomicBool::new(false),
            }),
        }
    }

    /// Start with `user` cached.
    #[must_use]
    pub fn with_cached_user(self, user: CurrentUser) -> Self {
        *self.inner.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
        self
    }

    /// Make every fallible call fail.
    pub fn fail_all(&self) {
        self.inner.fail_all.store(true, Ordering::SeqCst);
    }

    /// The cached user, if any.
    #[must_use]
    pub fn cached_user(&self) -> Option<CurrentUser> {
        self.inner
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How often `method` was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.calls.count(method)
    }

    fn failure(&self) -> ProviderResult<()> {
        if self.inner.fail_all.load(Ordering::SeqCst) {
            Err(ProviderError::Internal("offline cache unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn set_cached(&self, user: Option<CurrentUser>) {
        *self.inner.cached.lock().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

impl Default for MockOfflineAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineAuth for MockOfflineAuth {
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.calls.record("initialize");
        let result = self.failure();
        async move { result }
    }

    fn cache_user_data(
        &self,
        user: &CurrentUser,
        _access_token: &str,
    ) -> impl Future<Output = ProviderResult<()>> + Send {
        self.calls.record("cache_user_data");
        let result = self.failure().map(|()| self.set_cached(Some(user.clone())));
        async move { result }
    }

    fn clear_cached_data(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.calls.record("clear_cached_data");
        let result = self.failure().map(|()| self.set_cached(None));
        async move { result }
    }

    fn is_offline_auth_available(&self) -> impl Future<Output = bool> + Send {
        self.calls.record("is_offline_auth_available");
        let available = self.cached_user().is_some();
        async move { available }
    }

    fn authenticate_offline(&self) -> impl Future<Output = ProviderResult<CurrentUser>> + Send {
        self.calls.record("authenticate_offline");
        let result = self.failure().and_then(|()| {
            self.cached_user().ok_or_else(|| {
                ProviderError::rejected(
                    ErrorKind::TokenInvalid,
                    "No cached credentials available for offline sign-in",
                )
            })
        });
        async move { result }
    }

    fn offline_status(&self) -> impl Future<Output = OfflineStatus> + Send {
        let cached = self.cached_user();
        let status = OfflineStatus {
            is_online: self.inner.online.load(Ordering::SeqCst),
            has_cached_user: cached.is_some(),
            cached_email: cached.map(|user| user.email),
            cached_at: None,
            expires_at: None,
        };
        async move { status }
    }

    fn on_connectivity_changed(&self, is_online: bool) -> impl Future<Output = ()> + Send {
        self.calls.record("on_connectivity_changed");
        self.inner.online.store(is_online, Ordering::SeqCst);
        async {}
    }
}
