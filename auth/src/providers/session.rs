//! Session manager.
//!
//! Owns the token lifecycle after a successful sign-in: the current session,
//! its expiry, persistence for "remember me", and two broadcast streams the
//! orchestrator listens to (session active/inactive, session errors).

use crate::config::SessionConfig;
use crate::error::{ProviderError, ProviderResult, StorageError};
use crate::providers::KeyValueStore;
use crate::state::ErrorKind;
use chrono::{DateTime, Utc};
use scholarlens_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Request to establish a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSession {
    /// Access token.
    pub access_token: String,

    /// Refresh token, if any.
    pub refresh_token: Option<String>,

    /// Owner of the session.
    pub user_id: String,

    /// Persist the session across restarts.
    pub remember_me: bool,
}

/// An established session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Access token.
    pub access_token: String,

    /// Refresh token, if any.
    pub refresh_token: Option<String>,

    /// Owner of the session.
    pub user_id: String,

    /// Whether the session is persisted.
    pub remember_me: bool,

    /// When the session started.
    pub created_at: DateTime<Utc>,

    /// When the access token stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has a token that has not expired at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at > now
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("remember_me", &self.remember_me)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Session lifecycle.
pub trait SessionManager: Send + Sync {
    /// Restore state from storage.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read.
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Establish a session, replacing any current one.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be persisted. The session is
    /// active in memory even then.
    fn start_session(&self, request: StartSession)
    -> impl Future<Output = ProviderResult<()>> + Send;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns error if the persisted session cannot be removed.
    fn end_session(&self) -> impl Future<Output = ProviderResult<()>> + Send;

    /// Whether a non-expired session exists.
    fn is_session_valid(&self) -> impl Future<Output = bool> + Send;

    /// Access token of the current session, if it is still valid.
    ///
    /// An expired session is ended and reported on the error stream.
    fn valid_access_token(&self) -> impl Future<Output = Option<String>> + Send;

    /// Session active/inactive transitions.
    fn subscribe_state(&self) -> broadcast::Receiver<bool>;

    /// Session failures detected outside of any operation.
    fn subscribe_errors(&self) -> broadcast::Receiver<ErrorKind>;
}

/// [`SessionManager`] that keeps the session in memory and persists it to a
/// [`KeyValueStore`] when remember-me is set.
pub struct LocalSessionManager<K, C> {
    inner: Arc<Inner<K, C>>,
}

struct Inner<K, C> {
    storage: K,
    clock: C,
    config: SessionConfig,
    current: Mutex<Option<Session>>,
    state_tx: broadcast::Sender<bool>,
    error_tx: broadcast::Sender<ErrorKind>,
}

impl<K, C> LocalSessionManager<K, C>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// Create a session manager.
    #[must_use]
    pub fn new(storage: K, clock: C, config: SessionConfig) -> Self {
        let (state_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (error_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                storage,
                clock,
                config,
                current: Mutex::new(None),
                state_tx,
                error_tx,
            }),
        }
    }

    /// The current session, expired or not.
    pub async fn current_session(&self) -> Option<Session> {
        self.inner.current.lock().await.clone()
    }
}

impl<K, C> Inner<K, C>
where
    K: KeyValueStore,
    C: Clock,
{
    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.access_token_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }

    async fn persist(&self, session: &Session) -> ProviderResult<()> {
        let key = &self.config.storage_key;
        if session.remember_me {
            let json = serde_json::to_string(session).map_err(StorageError::from)?;
            self.storage.set(key, json).await?;
        } else {
            // A previously remembered session must not come back on restart
            self.storage.remove(key).await?;
        }
        Ok(())
    }

    fn publish_state(&self, active: bool) {
        // No receivers is not an error
        let _ = self.state_tx.send(active);
    }
}

impl<K, C> SessionManager for LocalSessionManager<K, C>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
{
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let key = &inner.config.storage_key;
            let Some(raw) = inner.storage.get(key).await? else {
                return Ok(());
            };

            match serde_json::from_str::<Session>(&raw) {
                Ok(session) if session.is_valid_at(inner.clock.now()) => {
                    tracing::debug!(user_id = %session.user_id, "Restored persisted session");
                    *inner.current.lock().await = Some(session);
                },
                Ok(session) => {
                    tracing::info!(user_id = %session.user_id, "Discarding expired persisted session");
                    inner.storage.remove(key).await?;
                },
                Err(error) => {
                    tracing::warn!(%error, "Discarding unreadable persisted session");
                    inner.storage.remove(key).await?;
                },
            }
            Ok(())
        }
    }

    fn start_session(
        &self,
        request: StartSession,
    ) -> impl Future<Output = ProviderResult<()>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let now = inner.clock.now();
            let Some(expires_at) = now.checked_add_signed(inner.ttl()) else {
                return Err(ProviderError::Internal(
                    "access token lifetime runs past the end of the calendar".to_string(),
                ));
            };
            let session = Session {
                access_token: request.access_token,
                refresh_token: request.refresh_token,
                user_id: request.user_id,
                remember_me: request.remember_me,
                created_at: now,
                expires_at,
            };

            let mut current = inner.current.lock().await;
            let persisted = inner.persist(&session).await;
            tracing::debug!(
                user_id = %session.user_id,
                remember_me = session.remember_me,
                expires_at = %session.expires_at,
                "Session started"
            );
            *current = Some(session);
            drop(current);

            inner.publish_state(true);
            persisted
        }
    }

    fn end_session(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let mut current = inner.current.lock().await;
            let ended = current.take();
            let removed = inner.storage.remove(&inner.config.storage_key).await;
            drop(current);

            if let Some(session) = ended {
                tracing::debug!(user_id = %session.user_id, "Session ended");
                inner.publish_state(false);
            }
            removed.map_err(Into::into)
        }
    }

    fn is_session_valid(&self) -> impl Future<Output = bool> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let now = inner.clock.now();
            inner
                .current
                .lock()
                .await
                .as_ref()
                .is_some_and(|session| session.is_valid_at(now))
        }
    }

    fn valid_access_token(&self) -> impl Future<Output = Option<String>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let now = inner.clock.now();
            let mut current = inner.current.lock().await;

            match current.as_ref().map(|session| session.is_valid_at(now)) {
                None => return None,
                Some(true) => return current.as_ref().map(|session| session.access_token.clone()),
                Some(false) => {},
            }
            let expired = current.take();

            if let Err(error) = inner.storage.remove(&inner.config.storage_key).await {
                tracing::warn!(%error, "Failed to remove expired session from storage");
            }
            drop(current);

            if let Some(session) = expired {
                tracing::info!(user_id = %session.user_id, "Access token expired, ending session");
            }
            inner.publish_state(false);
            let _ = inner.error_tx.send(ErrorKind::TokenInvalid);
            None
        }
    }

    fn subscribe_state(&self) -> broadcast::Receiver<bool> {
        self.inner.state_tx.subscribe()
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<ErrorKind> {
        self.inner.error_tx.subscribe()
    }
}

impl<K, C> Clone for LocalSessionManager<K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, C> fmt::Debug for LocalSessionManager<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSessionManager")
            .field("storage_key", &self.inner.config.storage_key)
            .field("access_token_ttl", &self.inner.config.access_token_ttl)
            .finish_non_exhaustive()
    }
}
