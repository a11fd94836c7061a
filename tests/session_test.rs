mod common;

use common::{high_risk_result, numbered_result, wait_until, Behavior, MockService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use txrisk_client::error::AppError;
use txrisk_client::presentation::RiskColor;
use txrisk_client::session::SnapshotCause;
use txrisk_client::{AnalysisController, LifecycleState, Notice, Preset, QueryField, Session};

fn start(service: Arc<MockService>, timeout: Duration) -> txrisk_client::SessionHandle {
    let (session, handle) = Session::new(AnalysisController::default(), service, timeout);
    tokio::spawn(session.run());
    handle
}

#[tokio::test]
async fn test_second_trigger_while_in_flight_is_ignored() {
    let gate = Arc::new(Semaphore::new(0));
    let service = Arc::new(MockService::gated(
        Behavior::Score(high_risk_result),
        gate.clone(),
    ));
    let handle = start(service.clone(), Duration::from_secs(30));
    let mut rx = handle.subscribe();

    handle.analyze().unwrap();
    handle.analyze().unwrap();

    let ignored = wait_until(&mut rx, |s| s.cause == SnapshotCause::TriggerIgnored).await;
    assert_eq!(ignored.state, LifecycleState::InFlight);
    assert_eq!(ignored.requests_issued, 1);
    assert!(ignored.current.is_none());

    gate.add_permits(1);
    let done = wait_until(&mut rx, |s| s.cause == SnapshotCause::Completed).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(done.state, LifecycleState::Idle);
    assert_eq!(done.history.len(), 1);

    let current = done.current.unwrap();
    assert_eq!(current.color, RiskColor::Red);
    assert_eq!(current.progress_fraction, 0.92);
}

#[tokio::test]
async fn test_unresolved_request_keeps_session_in_flight() {
    let service = Arc::new(MockService::new(Behavior::Hang));
    let handle = start(service.clone(), Duration::from_secs(3600));
    let mut rx = handle.subscribe();

    handle.analyze().unwrap();
    wait_until(&mut rx, |s| s.cause == SnapshotCause::AnalysisStarted).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, LifecycleState::InFlight);
    assert!(snapshot.current.is_none());
    assert!(snapshot.history.is_empty());

    handle.shutdown().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_session_to_idle() {
    let service = Arc::new(MockService::new(Behavior::Hang));
    let handle = start(service.clone(), Duration::from_secs(2));
    let mut rx = handle.subscribe();

    handle.analyze().unwrap();
    let failed = wait_until(&mut rx, |s| s.cause == SnapshotCause::Failed).await;

    assert_eq!(failed.state, LifecycleState::Idle);
    assert!(failed.current.is_none());
    assert!(failed.history.is_empty());
    assert!(matches!(failed.notice, Some(Notice::RequestFailed { .. })));
}

#[tokio::test]
async fn test_current_and_history_are_published_together() {
    let service = Arc::new(MockService::new(Behavior::Score(numbered_result)));
    let handle = start(service.clone(), Duration::from_secs(30));
    let mut rx = handle.subscribe();

    let mut last_revision = 0;
    for n in 1..=6usize {
        handle.analyze().unwrap();
        let done = wait_until(&mut rx, |s| {
            s.cause == SnapshotCause::Completed && s.revision > last_revision
        })
        .await;
        last_revision = done.revision;

        let current = done.current.expect("completed snapshot carries a result");
        assert_eq!(done.history.len(), n.min(5));
        assert_eq!(done.history[0].risk_score, current.risk_score);
        assert_eq!(done.history[0].explanation, format!("result {}", n));
    }

    let sequences: Vec<u64> = handle.snapshot().history.iter().map(|h| h.sequence).collect();
    assert_eq!(sequences, vec![6, 5, 4, 3, 2]);
    assert_eq!(service.calls(), 6);
}

#[tokio::test]
async fn test_rejected_input_surfaces_notice() {
    let service = Arc::new(MockService::new(Behavior::Score(high_risk_result)));
    let handle = start(service.clone(), Duration::from_secs(30));
    let mut rx = handle.subscribe();

    handle.edit(QueryField::Amount, "twenty").unwrap();
    handle.analyze().unwrap();
    let rejected = wait_until(&mut rx, |s| s.cause == SnapshotCause::InputRejected).await;

    assert_eq!(rejected.state, LifecycleState::Idle);
    assert_eq!(rejected.requests_issued, 0);
    assert!(matches!(
        rejected.notice,
        Some(Notice::InvalidInput { ref field, .. }) if field == "amount"
    ));

    handle.load_preset(Preset::HighRisk).unwrap();
    handle.analyze().unwrap();
    let done = wait_until(&mut rx, |s| s.cause == SnapshotCause::Completed).await;
    assert!(done.notice.is_none());
    assert_eq!(done.form.get(QueryField::Amount), "20000");
    assert_eq!(service.requests()[0].amount, 20000.0);
}

#[tokio::test]
async fn test_shutdown_ends_run_and_returns_controller() {
    let service = Arc::new(MockService::new(Behavior::Score(numbered_result)));
    let (session, handle) =
        Session::new(AnalysisController::default(), service, Duration::from_secs(30));
    let task = tokio::spawn(session.run());
    let mut rx = handle.subscribe();

    handle.analyze().unwrap();
    wait_until(&mut rx, |s| s.cause == SnapshotCause::Completed).await;
    handle.shutdown().unwrap();

    let controller = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(controller.requests_issued(), 1);
    assert_eq!(controller.history().len(), 1);
    assert!(matches!(handle.analyze(), Err(AppError::SessionClosed)));
}
