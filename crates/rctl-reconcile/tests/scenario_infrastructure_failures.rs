//! Scenario: transient infrastructure failures around the action.
//!
//! # Invariants under test
//!
//! 1. A transport failure is a retryable error; status stays RUNNING.
//! 2. A failed final status write is a retryable error; the next attempt
//!    re-runs the remote action (at-least-once) and then records DONE.
//! 3. A dependency lookup failure aborts before any status write.
//! 4. A failure loading the resource itself is an error, not "absent".

mod common;

use common::{key, rig, NS};
use rctl_reconcile::{Outcome, ReconcileError};
use rctl_schemas::{Kind, KindResource, Phase, Require};
use rctl_testkit::{fixtures, FakeResponse};

#[test]
fn transport_failure_leaves_running_then_recovers() {
    let rig = rig();
    rig.seed([
        fixtures::host(NS, "h1", "10.0.0.11").into_object(),
        fixtures::command(NS, "c1", "h1", "systemctl restart nginx", vec![]).into_object(),
    ]);
    rig.exec.on_times(
        "systemctl",
        1,
        FakeResponse::Unreachable("connection refused".to_string()),
    );
    let c1 = key(Kind::Command, "c1");

    let err = rig.reconcile(&c1).unwrap_err();
    assert!(matches!(err, ReconcileError::Transport { .. }));
    assert!(err.is_retryable());
    assert_eq!(rig.phase(&c1), Phase::Running);

    let r = rig.reconcile(&c1).unwrap();
    assert_eq!(r.outcome, Outcome::Done);
    assert_eq!(rig.exec.call_count(), 2);
}

#[test]
fn lost_done_write_repeats_the_action() {
    let rig = rig();
    rig.seed([
        fixtures::host(NS, "h1", "10.0.0.11").into_object(),
        fixtures::command(NS, "c1", "h1", "useradd app", vec![]).into_object(),
    ]);
    rig.flaky.fail_settled_status_writes(1);
    let c1 = key(Kind::Command, "c1");

    let err = rig.reconcile(&c1).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::StatusWrite {
            phase: Phase::Done,
            ..
        }
    ));
    assert_eq!(rig.phase(&c1), Phase::Running);
    assert!(!rig.object(&c1).is_done());
    assert_eq!(rig.exec.call_count(), 1);

    let r = rig.reconcile(&c1).unwrap();
    assert_eq!(r.outcome, Outcome::Done);
    assert_eq!(rig.exec.calls_matching("useradd app"), 2);
    assert!(rig.object(&c1).is_done());
}

#[test]
fn running_write_failure_prevents_the_action() {
    let rig = rig();
    rig.seed([
        fixtures::host(NS, "h1", "10.0.0.11").into_object(),
        fixtures::command(NS, "c1", "h1", "true", vec![]).into_object(),
    ]);
    rig.flaky.fail_status_writes(1);

    let err = rig.reconcile(&key(Kind::Command, "c1")).unwrap_err();
    assert_eq!(err.stage(), "status_write");
    assert_eq!(rig.exec.call_count(), 0);
}

#[test]
fn dependency_lookup_error_aborts_without_writes() {
    let rig = rig();
    rig.seed([
        fixtures::host(NS, "h1", "10.0.0.11").into_object(),
        fixtures::command(NS, "dep", "h1", "true", vec![]).into_object(),
        fixtures::command(NS, "c1", "h1", "true", vec![Require::command("dep")]).into_object(),
    ]);
    rig.flaky.fail_gets(key(Kind::Command, "dep"), 1);
    let c1 = key(Kind::Command, "c1");

    let err = rig.reconcile(&c1).unwrap_err();
    assert_eq!(err.stage(), "dependency");
    assert_eq!(rig.phase(&c1), Phase::None);
    assert_eq!(rig.flaky.status_write_attempts(), 0);
}

#[test]
fn load_error_is_not_absence() {
    let rig = rig();
    rig.seed([fixtures::command(NS, "c1", "h1", "true", vec![]).into_object()]);
    let c1 = key(Kind::Command, "c1");
    rig.flaky.fail_gets(c1.clone(), 1);

    let err = rig.reconcile(&c1).unwrap_err();
    assert_eq!(err.stage(), "load");
    assert_eq!(err.key(), &c1);
}
