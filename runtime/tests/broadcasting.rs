//! Integration tests for Store action broadcasting
//!
//! Tests the action observation features the auth facade relies on:
//! request-response waits keyed by a correlation id, and the guarantee that a
//! broadcast action has already been reduced.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use scholarlens_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use scholarlens_runtime::{Store, StoreConfig, StoreError};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Start a multi-step job with correlation ID
    Start { id: u64 },
    /// Job step completed
    StepCompleted { id: u64, step: u32 },
    /// Job finished (terminal action)
    Finished { id: u64 },
    /// Never produced
    Failed { id: u64 },
    /// Simple increment command
    Increment,
    /// Incremented event
    Incremented { value: u32 },
}

#[derive(Debug, Clone, Default)]
struct TestState {
    counter: u32,
    steps: Vec<u32>,
    finished: Vec<u64>,
}

#[derive(Clone)]
struct TestEnvironment;

#[derive(Clone)]
struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = TestEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TestAction::Start { id } => {
                state.steps.clear();
                smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some(TestAction::StepCompleted { id, step: 1 })
                })]
            }

            TestAction::StepCompleted { id, step } => {
                state.steps.push(step);

                if step < 3 {
                    smallvec![Effect::future(async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Some(TestAction::StepCompleted { id, step: step + 1 })
                    })]
                } else {
                    smallvec![Effect::dispatch(TestAction::Finished { id })]
                }
            }

            TestAction::Finished { id } => {
                state.finished.push(id);
                smallvec![Effect::None]
            }

            TestAction::Failed { .. } | TestAction::Incremented { .. } => smallvec![Effect::None],

            TestAction::Increment => {
                state.counter += 1;
                let value = state.counter;
                smallvec![Effect::dispatch(TestAction::Incremented { value })]
            }
        }
    }
}

fn new_store() -> Store<TestState, TestAction, TestEnvironment, TestReducer> {
    Store::with_config(
        TestState::default(),
        TestReducer,
        TestEnvironment,
        StoreConfig::default(),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_send_and_wait_for_immediate() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Increment,
            |action| matches!(action, TestAction::Incremented { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, TestAction::Incremented { value: 1 });
}

/// The terminal action is broadcast only after the reducer has seen it.
#[tokio::test]
async fn test_broadcast_happens_after_reduction() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Start { id: 42 },
            |action| matches!(action, TestAction::Finished { id: 42 }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, TestAction::Finished { id: 42 });
    let (steps, finished) = store.state(|s| (s.steps.clone(), s.finished.clone())).await;
    assert_eq!(steps, vec![1, 2, 3]);
    assert_eq!(finished, vec![42]);
}

#[tokio::test]
async fn test_send_and_wait_for_timeout() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Start { id: 99 },
            |action| matches!(action, TestAction::Failed { id: 99 }),
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(result.unwrap_err(), StoreError::Timeout);
}

/// Concurrent waiters filter by correlation id without stealing each other's result.
#[tokio::test]
async fn test_correlation_id_filtering() {
    let store = new_store();

    let first = store.send_and_wait_for(
        TestAction::Start { id: 1 },
        |action| matches!(action, TestAction::Finished { id: 1 }),
        Duration::from_secs(1),
    );
    let second = store.send_and_wait_for(
        TestAction::Start { id: 2 },
        |action| matches!(action, TestAction::Finished { id: 2 }),
        Duration::from_secs(1),
    );

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap(), TestAction::Finished { id: 1 });
    assert_eq!(second.unwrap(), TestAction::Finished { id: 2 });
}

#[tokio::test]
async fn test_initial_actions_not_broadcast() {
    let store = new_store();
    let mut rx = store.subscribe_actions();

    store.send(TestAction::Increment).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, TestAction::Incremented { value: 1 });
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_change_subscribers_see_effect_actions() {
    let store = new_store();
    let mut changes = store.subscribe_changes();

    let _ = store
        .send_and_wait_for(
            TestAction::Increment,
            |action| matches!(action, TestAction::Incremented { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    // Increment and Incremented were both reduced
    assert_eq!(*changes.borrow_and_update(), 2);
}

#[tokio::test]
async fn test_send_after_shutdown_fails_fast() {
    let store = new_store();
    store.shutdown(Duration::from_secs(1)).await.unwrap();

    let result = store
        .send_and_wait_for(
            TestAction::Increment,
            |_| true,
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(result.unwrap_err(), StoreError::ShutdownInProgress);
}
