//! Cancellation and failure reporting.

mod helpers;

use designcopy_engine::{CallbackProgress, NullProgress, ReplicationState};
use helpers::{Fixture, PROJECT_ID, orchestrator};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_cancelled_before_start_copies_nothing() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orch
        .execute(fixture.request(), &NullProgress, cancel)
        .await
        .expect("result");

    assert!(!result.success);
    assert_eq!(result.final_state, ReplicationState::Failed);
    assert_eq!(result.files_copied, 0);
    assert!(result.error_message.is_some());
    assert_eq!(orch.metrics().snapshot().runs_cancelled, 1);
}

#[tokio::test]
async fn test_cancelled_mid_run_keeps_partial_counts() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let sink = CallbackProgress::new(
        move |percent, _message: &str| {
            if percent >= 72 {
                trigger.cancel();
            }
        },
        |_message: &str, _severity| {},
    );

    let result = orch
        .execute(fixture.request(), &sink, cancel)
        .await
        .expect("result");

    assert!(!result.success);
    assert_eq!(result.final_state, ReplicationState::Failed);
    assert!(result.files_copied >= 4);
    assert!(fixture.dst(&format!("{PROJECT_ID}.iam")).exists());
    assert!(!fixture.dst("Orphan.ipt").exists());
    assert!(!fixture.dst("notes.txt").exists());
}

#[tokio::test]
async fn test_failed_run_restores_original_workspace() {
    let fixture = Fixture::new();
    std::fs::write(fixture.src("Module_2024.ipj"), "<workspace/>").expect("write");
    let original = fixture.temp.path().join("original.ipj");
    std::fs::write(&original, "<workspace/>").expect("write");

    let orch = orchestrator(fixture.config()).await;
    orch.session()
        .switch_workspace_context(&original)
        .await
        .expect("switch");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let sink = CallbackProgress::new(
        move |percent, _message: &str| {
            if percent >= 72 {
                trigger.cancel();
            }
        },
        |_message: &str, _severity| {},
    );

    let result = orch
        .execute(fixture.request(), &sink, cancel)
        .await
        .expect("result");

    assert!(!result.success);
    assert_eq!(result.final_state, ReplicationState::Failed);
    assert!(result.log.iter().any(|entry| entry.message.contains("Activated workspace")));
    assert_eq!(
        orch.session().active_workspace_context().await.expect("context"),
        Some(original)
    );
}

#[tokio::test]
async fn test_orchestrator_is_reusable_after_failure() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let first = orch
        .execute(fixture.request(), &NullProgress, cancel)
        .await
        .expect("result");
    assert!(!first.success);

    let second = orch
        .execute(fixture.request(), &NullProgress, CancellationToken::new())
        .await
        .expect("result");
    assert!(second.success);

    let snapshot = orch.metrics().snapshot();
    assert_eq!(snapshot.runs_started, 2);
    assert_eq!(snapshot.runs_succeeded, 1);
}
