//! End-to-end tests with the bundled session manager and offline cache.

#![allow(clippy::unwrap_used)]

use scholarlens_auth::mocks::{MockAuthBackend, MockFederatedIdentity};
use scholarlens_auth::providers::{
    CachedOfflineAuth, KeyValueStore, LocalSessionManager, MemoryKeyValueStore,
};
use scholarlens_auth::{
    AuthConfig, AuthEnvironment, AuthOrchestrator, AuthProvider, AuthenticationState, OfflineConfig,
    SessionConfig,
};
use scholarlens_testing::{ManualClock, init_test_tracing, test_epoch};
use std::future::Future;
use std::time::Duration;

type Sessions = LocalSessionManager<MemoryKeyValueStore, ManualClock>;
type Offline = CachedOfflineAuth<MemoryKeyValueStore, ManualClock>;
type TestOrchestrator = AuthOrchestrator<Sessions, MockAuthBackend, MockFederatedIdentity, Offline>;

/// Device storage and clock that outlive an orchestrator, like an app restart.
struct Device {
    storage: MemoryKeyValueStore,
    clock: ManualClock,
    federated: MockFederatedIdentity,
    config: AuthConfig,
}

impl Device {
    fn new() -> Self {
        init_test_tracing();
        Self {
            storage: MemoryKeyValueStore::new(),
            clock: ManualClock::new(test_epoch()),
            federated: MockFederatedIdentity::new(),
            config: AuthConfig::default()
                .with_session(SessionConfig::default().with_access_token_ttl(Duration::from_secs(3600)))
                .with_offline(
                    OfflineConfig::default().with_max_offline_age(Duration::from_secs(7 * 24 * 3600)),
                ),
        }
    }

    async fn launch(&self) -> TestOrchestrator {
        let env = AuthEnvironment::new(
            LocalSessionManager::new(
                self.storage.clone(),
                self.clock.clone(),
                self.config.session.clone(),
            ),
            MockAuthBackend::new(),
            self.federated.clone(),
            CachedOfflineAuth::new(
                self.storage.clone(),
                self.clock.clone(),
                self.config.offline.clone(),
            ),
        );
        AuthOrchestrator::start(self.config.clone(), env).await
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

async fn settle(auth: &TestOrchestrator) {
    eventually(|| async { !auth.state(|state| state.session_sync_pending).await }).await;
}

#[tokio::test]
async fn test_remembered_session_is_restored_after_restart() {
    let device = Device::new();

    let first = device.launch().await;
    first
        .sign_in_with_email("ada@example.com", "pw", true)
        .await
        .unwrap();
    settle(&first).await;
    first.shutdown().await.unwrap();

    let second = device.launch().await;
    second.check_authentication_status().await.unwrap();

    assert_eq!(second.status().await, AuthenticationState::Authenticated);
    assert!(!second.is_offline_mode().await);
    assert_eq!(
        second.current_user().await.unwrap().email,
        "ada@example.com"
    );
    assert_eq!(device.federated.calls("sign_in_silently"), 0);
}

#[tokio::test]
async fn test_session_without_remember_me_is_not_restored() {
    let device = Device::new();

    let first = device.launch().await;
    first
        .sign_in_with_email("ada@example.com", "pw", false)
        .await
        .unwrap();
    settle(&first).await;
    first.shutdown().await.unwrap();

    let second = device.launch().await;
    second.check_authentication_status().await.unwrap();

    assert_eq!(second.status().await, AuthenticationState::Unauthenticated);
    assert_eq!(device.federated.calls("sign_in_silently"), 1);
}

#[tokio::test]
async fn test_google_user_can_restart_offline() {
    let device = Device::new();

    let first = device.launch().await;
    first.sign_in_with_google(false).await.unwrap();
    settle(&first).await;
    first.shutdown().await.unwrap();

    let second = device.launch().await;
    second.connectivity_changed(false).await;
    second.check_authentication_status().await.unwrap();

    let user = second.current_user().await.unwrap();
    assert_eq!(user.provider, AuthProvider::Google);
    assert!(second.is_offline_mode().await);
    let status = second.offline_status().await;
    assert!(!status.is_online);
    assert_eq!(status.cached_email.as_deref(), Some(user.email.as_str()));
}

#[tokio::test]
async fn test_stale_offline_snapshot_is_not_used() {
    let device = Device::new();

    let first = device.launch().await;
    first.sign_in_with_google(false).await.unwrap();
    settle(&first).await;
    first.shutdown().await.unwrap();

    device.clock.advance(chrono::Duration::days(8));

    let second = device.launch().await;
    second.check_authentication_status().await.unwrap();

    assert_eq!(second.status().await, AuthenticationState::Unauthenticated);
    assert!(!second.offline_status().await.has_cached_user);
}

#[tokio::test]
async fn test_sign_out_removes_persisted_session_and_offline_snapshot() {
    let device = Device::new();

    let auth = device.launch().await;
    auth.sign_in_with_google(true).await.unwrap();
    settle(&auth).await;
    assert!(!device.storage.is_empty());

    auth.sign_out().await.unwrap();

    let session_key = &device.config.session.storage_key;
    let offline_key = &device.config.offline.storage_key;
    assert_eq!(device.storage.get(session_key).await.unwrap(), None);
    assert_eq!(device.storage.get(offline_key).await.unwrap(), None);
}

#[tokio::test]
async fn test_expired_token_signs_the_user_out() {
    let device = Device::new();

    let auth = device.launch().await;
    auth.sign_in_with_email("ada@example.com", "pw", true)
        .await
        .unwrap();
    settle(&auth).await;

    device.clock.advance(chrono::Duration::hours(2));

    // Linking asks for the access token, which has expired by now
    assert!(auth.link_google_account().await.is_err());
    eventually(|| async { auth.current_user().await.is_none() }).await;

    assert!(!auth.is_authenticated().await);
    assert!(!auth.is_loading().await);
    assert_eq!(
        device
            .storage
            .get(&device.config.session.storage_key)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_snapshot_from_the_far_future_does_not_wedge_the_status_check() {
    let device = Device::new();

    let first = device.launch().await;
    first.sign_in_with_google(false).await.unwrap();
    settle(&first).await;
    first.shutdown().await.unwrap();

    let key = &device.config.offline.storage_key;
    let mut snapshot: serde_json::Value =
        serde_json::from_str(&device.storage.get(key).await.unwrap().unwrap()).unwrap();
    snapshot["cached_at"] = serde_json::Value::from("+262142-12-30T00:00:00Z");
    device.storage.set(key, snapshot.to_string()).await.unwrap();

    let second = device.launch().await;
    second.check_authentication_status().await.unwrap();

    assert!(!second.is_loading().await);
    assert_eq!(second.status().await, AuthenticationState::Unauthenticated);
    assert_eq!(device.storage.get(key).await.unwrap(), None);

    second
        .sign_in_with_email("ada@example.com", "pw", false)
        .await
        .unwrap();
    assert!(second.is_authenticated().await);
}
