//! Tests for overlapping operations and the loading flag.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use scholarlens_auth::mocks::{
    MockAuthBackend, MockFederatedIdentity, MockOfflineAuth, MockSessionManager, test_environment,
};
use scholarlens_auth::{
    AuthAction, AuthConfig, AuthEnvironment, AuthError, AuthOrchestrator, AuthProvider,
    AuthenticationState, ErrorKind, OperationKind, Outcome,
};
use scholarlens_runtime::StoreError;
use scholarlens_testing::init_test_tracing;
use std::time::Duration;

type TestOrchestrator =
    AuthOrchestrator<MockSessionManager, MockAuthBackend, MockFederatedIdentity, MockOfflineAuth>;

const BACKEND_DELAY: Duration = Duration::from_millis(150);

async fn start_with_slow_backend() -> TestOrchestrator {
    init_test_tracing();
    let env = AuthEnvironment::new(
        MockSessionManager::new(),
        MockAuthBackend::new().with_delay(BACKEND_DELAY),
        MockFederatedIdentity::new(),
        MockOfflineAuth::new(),
    );
    AuthOrchestrator::start(AuthConfig::default(), env).await
}

/// Wait until the orchestrator reports an operation in flight.
async fn wait_for_loading(auth: &TestOrchestrator) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !auth.is_loading().await {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_loading_spans_only_the_await() {
    let auth = start_with_slow_backend().await;
    assert!(!auth.is_loading().await);

    let running = tokio::spawn({
        let auth = auth.clone();
        async move { auth.sign_in_with_email("ada@example.com", "pw", false).await }
    });
    wait_for_loading(&auth).await;

    running.await.unwrap().unwrap();
    assert!(!auth.is_loading().await);
    assert!(auth.is_authenticated().await);
}

#[tokio::test]
async fn test_loading_cleared_on_failure_path() {
    init_test_tracing();
    let env = AuthEnvironment::new(
        MockSessionManager::new(),
        MockAuthBackend::new().with_delay(BACKEND_DELAY),
        MockFederatedIdentity::new(),
        MockOfflineAuth::new(),
    );
    env.backend
        .fail_reset(scholarlens_auth::ProviderError::Transport("timeout".to_string()));
    let auth = AuthOrchestrator::start(AuthConfig::default(), env).await;

    let running = tokio::spawn({
        let auth = auth.clone();
        async move { auth.reset_password("ada@example.com").await }
    });
    wait_for_loading(&auth).await;

    assert!(running.await.unwrap().is_err());
    assert!(!auth.is_loading().await);
    assert_eq!(auth.status().await, AuthenticationState::Error);
}

#[tokio::test]
async fn test_second_operation_is_rejected_while_first_runs() {
    let auth = start_with_slow_backend().await;

    let first = tokio::spawn({
        let auth = auth.clone();
        async move { auth.sign_in_with_email("ada@example.com", "pw", false).await }
    });
    wait_for_loading(&auth).await;

    let second = auth.sign_in_with_email("grace@example.com", "pw", false).await;

    assert_eq!(
        second,
        Err(AuthError::Busy {
            in_flight: OperationKind::SignInWithEmail
        })
    );
    first.await.unwrap().unwrap();
    assert_eq!(
        auth.current_user().await.unwrap().email,
        "ada@example.com"
    );
}

#[tokio::test]
async fn test_sign_out_supersedes_running_sign_in() {
    let auth = start_with_slow_backend().await;
    let mut actions = auth.subscribe_actions();

    let sign_in = tokio::spawn({
        let auth = auth.clone();
        async move { auth.sign_in_with_email("ada@example.com", "pw", false).await }
    });
    wait_for_loading(&auth).await;

    auth.sign_out().await.unwrap();

    assert_eq!(sign_in.await.unwrap(), Err(AuthError::Superseded));
    assert_eq!(auth.status().await, AuthenticationState::Unauthenticated);
    assert!(auth.current_user().await.is_none());
    assert!(!auth.is_loading().await);

    let mut superseded = false;
    while let Ok(action) = actions.try_recv() {
        if let AuthAction::OperationFinished {
            kind: OperationKind::SignInWithEmail,
            outcome,
            ..
        } = action
        {
            superseded = outcome == Outcome::Superseded;
        }
    }
    assert!(superseded);
}

#[tokio::test]
async fn test_form_updates_are_allowed_during_an_operation() {
    let auth = start_with_slow_backend().await;

    let running = tokio::spawn({
        let auth = auth.clone();
        async move { auth.sign_in_with_email("ada@example.com", "pw", false).await }
    });
    wait_for_loading(&auth).await;

    let validation = auth
        .update_form_field_named("email", "ada@example.com")
        .await
        .unwrap();

    assert!(validation.is_valid);
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_timed_out_operation_releases_the_orchestrator() {
    init_test_tracing();
    let env = AuthEnvironment::new(
        MockSessionManager::new(),
        MockAuthBackend::new().with_delay(Duration::from_millis(400)),
        MockFederatedIdentity::new(),
        MockOfflineAuth::new(),
    );
    let config = AuthConfig::default().with_operation_timeout(Duration::from_millis(100));
    let auth = AuthOrchestrator::start(config, env).await;
    let mut actions = auth.subscribe_actions();

    let result = auth.sign_in_with_email("ada@example.com", "pw", false).await;

    assert!(matches!(result, Err(AuthError::Store(StoreError::Timeout))));
    assert!(!auth.is_loading().await);
    assert_eq!(auth.status().await, AuthenticationState::Error);
    assert_eq!(auth.error_kind().await, Some(ErrorKind::Unknown));

    // Usable again straight away
    auth.sign_in_with_google(false).await.unwrap();
    assert_eq!(auth.current_user().await.unwrap().provider, AuthProvider::Google);

    // The slow backend's late answer does not replace the Google user
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(auth.current_user().await.unwrap().provider, AuthProvider::Google);
    assert!(!auth.is_loading().await);

    let mut outcomes = Vec::new();
    while let Ok(action) = actions.try_recv() {
        if let AuthAction::OperationFinished {
            kind: OperationKind::SignInWithEmail,
            outcome,
            ..
        } = action
        {
            outcomes.push(outcome.as_str());
        }
    }
    assert_eq!(outcomes, ["failed", "superseded"]);
}

#[tokio::test]
async fn test_timed_out_sign_out_still_leaves_the_user_signed_out() {
    init_test_tracing();
    let env = AuthEnvironment::new(
        MockSessionManager::new(),
        MockAuthBackend::new().with_delay(Duration::from_millis(300)),
        MockFederatedIdentity::new(),
        MockOfflineAuth::new(),
    );
    let config = AuthConfig::default().with_operation_timeout(Duration::from_millis(100));
    let auth = AuthOrchestrator::start(config, env).await;
    auth.sign_in_with_google(false).await.unwrap();

    let result = auth.sign_out().await;

    assert!(matches!(result, Err(AuthError::Store(StoreError::Timeout))));
    assert!(auth.current_user().await.is_none());
    assert!(!auth.is_loading().await);
    assert_eq!(auth.sign_in_with_google(false).await, Ok(()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_valid_sign_up_authenticates(
        local in "[a-z][a-z0-9]{0,11}",
        domain in "[a-z]{2,10}",
        letters in "[a-zA-Z]{4,12}",
        digits in "[0-9]{4,8}",
        name in "[A-Z][a-z]{1,20}",
    ) {
        let email = format!("{local}@{domain}.com");
        let password = format!("{letters}{digits}");

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let authenticated = runtime.block_on(async {
            let auth = AuthOrchestrator::start(AuthConfig::default(), test_environment()).await;
            auth.sign_up_with_email(&email, &password, &name, false).await.unwrap();
            auth.is_authenticated().await
        });

        prop_assert!(authenticated);
    }
}
