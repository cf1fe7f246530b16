mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

use common::{deadlock_bank, test_config, write_bank_file, ScriptedCompletion};
use quiz_backend::config::Config;
use quiz_backend::error::Error;
use quiz_backend::models::question::Difficulty;
use quiz_backend::models::quiz::{Origin, QuizRequest};
use quiz_backend::services::dispatch_service::Dispatcher;
use quiz_backend::services::llm_service::Backends;

fn request() -> QuizRequest {
    QuizRequest {
        subject: "Operating Systems".to_string(),
        topic: "Deadlock".to_string(),
        difficulty: Difficulty::Hard,
    }
}

fn dispatcher(config: &Config, backend: std::sync::Arc<ScriptedCompletion>) -> Dispatcher {
    Dispatcher::new(config, Backends::new(Some(backend), None))
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_falls_back_while_run_keeps_the_slot() {
    let bank = tempfile::tempdir().unwrap();
    write_bank_file(bank.path(), "OS_JSON", "Operating_Systems_Deadlock_Hard_set1.json", &deadlock_bank());
    let config = test_config(bank.path());
    let backend = ScriptedCompletion::new(Duration::from_secs(30));
    let dispatcher = dispatcher(&config, backend.clone());

    let started = Instant::now();
    let result = dispatcher.dispatch(request()).await.unwrap();
    let waited = started.elapsed();
    assert_eq!(result.origin, Origin::Fallback);
    assert_eq!(result.fallback, Some(true));
    assert_eq!(result.quiz.len(), 3);
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(30));

    // The abandoned run is still inside its first backend call.
    assert!(dispatcher.health().locked);

    // Three phases of 30s each, then the permit is released.
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(!dispatcher.health().locked);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn cancelling_abandoned_runs_stops_them_at_the_next_attempt() {
    let bank = tempfile::tempdir().unwrap();
    let mut config = test_config(bank.path());
    config.dispatch.cancel_abandoned_runs = true;
    let backend = ScriptedCompletion::new(Duration::from_secs(30));
    let dispatcher = dispatcher(&config, backend.clone());

    let result = dispatcher.dispatch(request()).await.unwrap();
    assert_eq!(result.fallback, Some(true));

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(!dispatcher.health().locked);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_never_overlap_backend_calls() {
    let bank = tempfile::tempdir().unwrap();
    let mut config = test_config(bank.path());
    config.dispatch.generation_timeout = Duration::from_secs(60);
    let backend = ScriptedCompletion::new(Duration::from_secs(1));
    let dispatcher = dispatcher(&config, backend.clone());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(request()).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.origin, Origin::Authoritative);
        assert_eq!(result.quiz.len(), 20);
    }

    assert_eq!(backend.calls.load(Ordering::SeqCst), 12);
    assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn waiting_past_the_slot_timeout_reports_busy() {
    let bank = tempfile::tempdir().unwrap();
    let mut config = test_config(bank.path());
    config.dispatch.generation_timeout = Duration::from_secs(120);
    config.dispatch.slot_wait_timeout = Duration::from_secs(5);
    let backend = ScriptedCompletion::new(Duration::from_secs(20));
    let dispatcher = dispatcher(&config, backend.clone());

    let holder = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(request()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(dispatcher.health().locked);

    let started = Instant::now();
    let err = dispatcher.dispatch(request()).await.unwrap_err();
    assert!(matches!(err, Error::Busy(_)));
    assert!(started.elapsed() >= Duration::from_secs(5));

    let first = holder.await.unwrap().unwrap();
    assert_eq!(first.origin, Origin::Authoritative);
}

#[tokio::test(start_paused = true)]
async fn cancel_fails_pending_acquisition_and_rebind_clears_it() {
    let bank = tempfile::tempdir().unwrap();
    let mut config = test_config(bank.path());
    config.dispatch.generation_timeout = Duration::from_secs(120);
    let backend = ScriptedCompletion::new(Duration::from_secs(20));
    let dispatcher = dispatcher(&config, backend.clone());

    let holder = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(request()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let waiter = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            (dispatcher.dispatch(request()).await, started.elapsed())
        })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    dispatcher.cancel();

    let (outcome, waited) = waiter.await.unwrap();
    assert!(matches!(outcome, Err(Error::Busy(_))));
    assert!(waited < config.dispatch.slot_wait_timeout);
    assert!(dispatcher.health().cancelled);

    // The holder stops at its next attempt boundary and falls back.
    let first = holder.await.unwrap().unwrap();
    assert_eq!(first.origin, Origin::Fallback);

    dispatcher.rebind(Backends::new(Some(backend.clone()), None));
    assert!(!dispatcher.health().cancelled);
    let result = dispatcher.dispatch(request()).await.unwrap();
    assert_eq!(result.origin, Origin::Authoritative);
}

#[tokio::test]
async fn demo_mode_never_touches_the_slot() {
    let bank = tempfile::tempdir().unwrap();
    let mut config = test_config(bank.path());
    config.demo_mode = true;
    let backend = ScriptedCompletion::new(Duration::ZERO);
    let dispatcher = dispatcher(&config, backend.clone());

    dispatcher.cancel();
    let result = tokio_test::assert_ok!(dispatcher.dispatch(request()).await);
    assert_eq!(result.demo, Some(true));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}
