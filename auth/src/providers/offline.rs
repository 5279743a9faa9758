//! Offline authentication.
//!
//! Keeps a snapshot of the last signed-in user so the app can open without
//! connectivity. A snapshot older than `max_offline_age` is treated as absent
//! and purged the first time it is looked at.

use crate::config::OfflineConfig;
use crate::error::{ProviderError, ProviderResult, StorageError};
use crate::providers::KeyValueStore;
use crate::state::{CurrentUser, ErrorKind};
use chrono::{DateTime, Utc};
use scholarlens_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the offline cache currently knows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfflineStatus {
    /// Last reported connectivity.
    pub is_online: bool,

    /// Whether a fresh snapshot exists.
    pub has_cached_user: bool,

    /// Email of the cached user.
    pub cached_email: Option<String>,

    /// When the snapshot was taken.
    pub cached_at: Option<DateTime<Utc>>,

    /// When the snapshot stops being usable.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Cached credentials for offline sign-in.
pub trait OfflineAuth: Send + Sync {
    /// Load and age-check the snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read.
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Replace the snapshot with `user`.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be stored.
    fn cache_user_data(
        &self,
        user: &CurrentUser,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Delete the snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be written.
    fn clear_cached_data(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Whether a fresh snapshot exists.
    fn is_offline_auth_available(&self) -> impl Future<Output = bool> + Send;

    /// The cached user.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` if there is no fresh snapshot.
    fn authenticate_offline(&self) -> impl Future<Output = ProviderResult<CurrentUser>> + Send;

    /// Snapshot and connectivity summary.
    fn offline_status(&self) -> impl Future<Output = OfflineStatus> + Send;

    /// Record a connectivity change.
    fn on_connectivity_changed(&self, is_online: bool) -> impl Future<Output = ()> + Send;
}

#[derive(Clone, Serialize, Deserialize)]
struct Snapshot {
    user: CurrentUser,
    access_token: String,
    cached_at: DateTime<Utc>,
}

/// [`OfflineAuth`] storing a JSON snapshot in a [`KeyValueStore`].
pub struct CachedOfflineAuth<K, C> {
    inner: Arc<Inner<K, C>>,
}

struct Inner<K, C> {
    storage: K,
    clock: C,
    config: OfflineConfig,
    online: AtomicBool,
}

impl<K, C> CachedOfflineAuth<K, C>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// Create an offline cache. Connectivity starts as online.
    #[must_use]
    pub fn new(storage: K, clock: C, config: OfflineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                clock,
                config,
                online: AtomicBool::new(true),
            }),
        }
    }
}

impl<K, C> Inner<K, C>
where
    K: KeyValueStore,
    C: Clock,
{
    fn max_age(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.max_offline_age)
            .unwrap_or_else(|_| chrono::Duration::days(30))
    }

    /// When a snapshot cached at `cached_at` goes stale. `None` past the end of time.
    fn expires_at(&self, cached_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        cached_at.checked_add_signed(self.max_age())
    }

    /// The snapshot if it is still fresh. Stale or unreadable snapshots are purged.
    async fn fresh_snapshot(&self) -> ProviderResult<Option<Snapshot>> {
        let key = &self.config.storage_key;
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot)
                if self
                    .expires_at(snapshot.cached_at)
                    .is_some_and(|expires_at| expires_at > self.clock.now()) =>
            {
                Ok(Some(snapshot))
            },
            Ok(snapshot) => {
                tracing::info!(
                    cached_at = %snapshot.cached_at,
                    "Purging stale offline snapshot"
                );
                self.storage.remove(key).await?;
                Ok(None)
            },
            Err(error) => {
                tracing::warn!(%error, "Purging unreadable offline snapshot");
                self.storage.remove(key).await?;
                Ok(None)
            },
        }
    }
}

impl<K, C> OfflineAuth for CachedOfflineAuth<K, C>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
{
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let snapshot = inner.fresh_snapshot().await?;
            tracing::debug!(cached = snapshot.is_some(), "Offline cache initialized");
            Ok(())
        }
    }

    fn cache_user_data(
        &self,
        user: &CurrentUser,
        access_token: &str,
    ) -> impl Future<Output = ProviderResult<()>> + Send {
        let inner = Arc::clone(&self.inner);
        let snapshot = Snapshot {
            user: user.clone(),
            access_token: access_token.to_string(),
            cached_at: self.inner.clock.now(),
        };

        async move {
            let json = serde_json::to_string(&snapshot).map_err(StorageError::from)?;
            inner.storage.set(&inner.config.storage_key, json).await?;
            tracing::debug!(user_id = %snapshot.user.id, "Cached user for offline sign-in");
            Ok(())
        }
    }

    fn clear_cached_data(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            inner.storage.remove(&inner.config.storage_key).await?;
            Ok(())
        }
    }

    fn is_offline_auth_available(&self) -> impl Future<Output = bool> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            match inner.fresh_snapshot().await {
                Ok(snapshot) => snapshot.is_some(),
                Err(error) => {
                    tracing::warn!(%error, "Offline cache unreadable");
                    false
                },
            }
        }
    }

    fn authenticate_offline(&self) -> impl Future<Output = ProviderResult<CurrentUser>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            inner
                .fresh_snapshot()
                .await?
                .map(|snapshot| snapshot.user)
                .ok_or_else(|| {
                    ProviderError::rejected(
                        ErrorKind::TokenInvalid,
                        "No cached credentials available for offline sign-in",
                    )
                })
        }
    }

    fn offline_status(&self) -> impl Future<Output = OfflineStatus> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let is_online = inner.online.load(Ordering::Acquire);
            let snapshot = inner.fresh_snapshot().await.unwrap_or_else(|error| {
                tracing::warn!(%error, "Offline cache unreadable");
                None
            });

            match snapshot {
                Some(snapshot) => OfflineStatus {
                    is_online,
                    has_cached_user: true,
                    cached_email: Some(snapshot.user.email),
                    cached_at: Some(snapshot.cached_at),
                    expires_at: inner.expires_at(snapshot.cached_at),
                },
                None => OfflineStatus {
                    is_online,
                    ..OfflineStatus::default()
                },
            }
        }
    }

    fn on_connectivity_changed(&self, is_online: bool) -> impl Future<Output = ()> + Send {
        let previous = self.inner.online.swap(is_online, Ordering::AcqRel);
        if previous != is_online {
            tracing::info!(is_online, "Connectivity changed");
        }
        async {}
    }
}

impl<K, C> Clone for CachedOfflineAuth<K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, C> fmt::Debug for CachedOfflineAuth<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedOfflineAuth")
            .field("storage_key", &self.inner.config.storage_key)
            .field("max_offline_age", &self.inner.config.max_offline_age)
            .field("online", &self.inner.online.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::providers::MemoryKeyValueStore;
    use crate::state::AuthProvider;
    use scholarlens_testing::{ManualClock, test_epoch};

    fn offline() -> (
        CachedOfflineAuth<MemoryKeyValueStore, ManualClock>,
        MemoryKeyValueStore,
        ManualClock,
    ) {
        let storage = MemoryKeyValueStore::new();
        let clock = ManualClock::new(test_epoch());
        (
            CachedOfflineAuth::new(storage.clone(), clock.clone(), OfflineConfig::default()),
            storage,
            clock,
        )
    }

    fn user() -> CurrentUser {
        CurrentUser::new("g-1", "ada@gmail.com", AuthProvider::Google)
    }

    #[tokio::test]
    async fn test_nothing_cached() {
        let (offline, _, _) = offline();
        offline.initialize().await.unwrap();

        assert!(!offline.is_offline_auth_available().await);
        let error = offline.authenticate_offline().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TokenInvalid);
    }

    #[tokio::test]
    async fn test_cached_user_authenticates_offline() {
        let (offline, _, _) = offline();
        offline.cache_user_data(&user(), "access-1").await.unwrap();

        assert!(offline.is_offline_auth_available().await);
        assert_eq!(offline.authenticate_offline().await.unwrap(), user());

        let status = offline.offline_status().await;
        assert!(status.has_cached_user);
        assert_eq!(status.cached_email.as_deref(), Some("ada@gmail.com"));
        assert_eq!(status.expires_at, Some(test_epoch() + chrono::Duration::days(30)));
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_purged() {
        let (offline, storage, clock) = offline();
        offline.cache_user_data(&user(), "access-1").await.unwrap();

        clock.advance(chrono::Duration::days(30));

        assert!(!offline.is_offline_auth_available().await);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_expiring_past_the_calendar_is_purged() {
        let (offline, storage, _) = offline();
        let snapshot = Snapshot {
            user: user(),
            access_token: "access-1".to_string(),
            cached_at: DateTime::<Utc>::MAX_UTC,
        };
        storage
            .set("scholarlens.offline_user", serde_json::to_string(&snapshot).unwrap())
            .await
            .unwrap();

        assert!(!offline.is_offline_auth_available().await);
        assert!(storage.is_empty());

        storage
            .set("scholarlens.offline_user", serde_json::to_string(&snapshot).unwrap())
            .await
            .unwrap();
        let status = offline.offline_status().await;
        assert!(!status.has_cached_user);
        assert_eq!(status.expires_at, None);
    }

    #[tokio::test]
    async fn test_clear_cached_data() {
        let (offline, _, _) = offline();
        offline.cache_user_data(&user(), "access-1").await.unwrap();
        offline.clear_cached_data().await.unwrap();

        assert!(!offline.is_offline_auth_available().await);
    }

    #[tokio::test]
    async fn test_connectivity_is_reported_in_status() {
        let (offline, _, _) = offline();
        assert!(offline.offline_status().await.is_online);

        offline.on_connectivity_changed(false).await;
        let status = offline.offline_status().await;
        assert!(!status.is_online);
        assert!(!status.has_cached_user);
    }
}
