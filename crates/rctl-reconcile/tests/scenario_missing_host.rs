//! Scenario: a resource whose Host does not exist.
//!
//! # Invariants under test
//!
//! 1. Reconcile returns a retryable error naming the host.
//! 2. Status stays RUNNING (requires were satisfied), never DONE.
//! 3. Once the Host appears, the next attempt succeeds.

mod common;

use common::{key, rig, NS};
use rctl_reconcile::{Outcome, ReconcileError};
use rctl_schemas::{Kind, KindResource, Phase};
use rctl_testkit::fixtures;

#[test]
fn missing_host_is_retryable_and_heals() {
    let rig = rig();
    rig.seed([fixtures::command(NS, "c2", "h-missing", "true", vec![]).into_object()]);
    let c2 = key(Kind::Command, "c2");

    let err = rig.reconcile(&c2).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.stage(), "host");
    assert!(matches!(&err, ReconcileError::Host { host, .. } if host == "h-missing"));
    assert!(err.to_string().contains("h-missing"), "{err}");
    assert_eq!(rig.phase(&c2), Phase::Running);
    assert!(!rig.object(&c2).is_done());
    assert_eq!(rig.exec.call_count(), 0);

    // A second failing attempt does not rewrite RUNNING.
    let v = rig.version(&c2);
    assert!(rig.reconcile(&c2).is_err());
    assert_eq!(rig.version(&c2), v);

    rig.seed([fixtures::host(NS, "h-missing", "10.0.0.99").into_object()]);
    let r = rig.reconcile(&c2).unwrap();
    assert_eq!(r.outcome, Outcome::Done);
    assert_eq!(rig.exec.calls()[0].target.address, "10.0.0.99");
}

#[test]
fn missing_credential_is_retryable() {
    let rig = rig();
    let mut h = fixtures::host(NS, "h1", "10.0.0.11");
    h.spec.ssh_key_secret = "absent-key".to_string();
    rig.seed([
        h.into_object(),
        fixtures::command(NS, "c1", "h1", "true", vec![]).into_object(),
    ]);
    let c1 = key(Kind::Command, "c1");

    let err = rig.reconcile(&c1).unwrap_err();
    assert_eq!(err.stage(), "credential");
    assert!(err.to_string().contains("absent-key"));
    assert_eq!(rig.phase(&c1), Phase::Running);
    assert_eq!(rig.exec.call_count(), 0);
}
