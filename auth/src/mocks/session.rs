//! Mock session manager.

use super::CallLog;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{SessionManager, StartSession};
use crate::state::ErrorKind;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

#[derive(Debug)]
struct Inner {
    token: Mutex<Option<String>>,
    started: Mutex<Vec<StartSession>>,
    fail_all: AtomicBool,
    state_tx: broadcast::Sender<bool>,
    error_tx: broadcast::Sender<ErrorKind>,
}

/// Mock session manager.
///
/// Holds at most one access token in memory. Events are only emitted when a
/// test calls [`MockSessionManager::emit_state`] or
/// [`MockSessionManager::emit_error`].
#[derive(Debug, Clone)]
pub struct MockSessionManager {
    calls: CallLog,
    inner: Arc<Inner>,
}

impl MockSessionManager {
    /// Create a manager with no session.
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(16);
        let (error_tx, _) = broadcast::channel(16);
        Self {
            calls: CallLog::default(),
            inner: Arc::new(Inner {
                token: Mutex::new(None),
                started: Mutex::new(Vec::new()),
                fail_all: AtomicBool::new(false),
                state_tx,
                error_tx,
            }),
        }
    }

    /// Start with a valid session holding `access_token`.
    #[must_use]
    pub fn with_valid_session(self, access_token: impl Into<String>) -> Self {
        *self.inner.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(access_token.into());
        self
    }

    /// Make every fallible call fail.
    pub fn fail_all(&self) {
        self.inner.fail_all.store(true, Ordering::SeqCst);
    }

    /// Sessions started so far.
    #[must_use]
    pub fn started(&self) -> Vec<StartSession> {
        self.inner
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Emit a session state event.
    pub fn emit_state(&self, active: bool) {
        let _ = self.inner.state_tx.send(active);
    }

    /// Emit a session error event.
    pub fn emit_error(&self, kind: ErrorKind) {
        let _ = self.inner.error_tx.send(kind);
    }

    /// How often `method` was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.calls.count(method)
    }

    fn failure(&self) -> ProviderResult<()> {
        if self.inner.fail_all.load(Ordering::SeqCst) {
            Err(ProviderError::Internal("session storage unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MockSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager for MockSessionManager {
    fn initialize(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.calls.record("initialize");
        let result = self.failure();
        async move { result }
    }

    fn start_session(&self, request: StartSession) -> impl Future<Output = ProviderResult<()>> + Send {
        self.calls.record("start_session");
        let result = self.failure().map(|()| {
            *self.inner.token.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(request.access_token.clone());
            self.inner
                .started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);
        });
        async move { result }
    }

    fn end_session(&self) -> impl Future<Output = ProviderResult<()>> + Send {
        self.calls.record("end_session");
        let result = self.failure().map(|()| {
            self.inner
                .token
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        });
        async move { result }
    }

    fn is_session_valid(&self) -> impl Future<Output = bool> + Send {
        self.calls.record("is_session_valid");
        let valid = self.is_active();
        async move { valid }
    }

    fn valid_access_token(&self) -> impl Future<Output = Option<String>> + Send {
        self.calls.record("valid_access_token");
        let token = self
            .inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        async move { token }
    }

    fn subscribe_state(&self) -> broadcast::Receiver<bool> {
        self.inner.state_tx.subscribe()
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<ErrorKind> {
        self.inner.error_tx.subscribe()
    }
}
