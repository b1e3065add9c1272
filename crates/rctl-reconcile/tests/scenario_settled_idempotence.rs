//! Scenario: re-delivering a finished resource never acts again, for every
//! kind.
//!
//! # Invariants under test
//!
//! 1. Host, Command, FileContent and File each reach DONE once.
//! 2. Every further pass returns `AlreadySettled` with no requeue.
//! 3. Those passes make no executor call and no status write.

mod common;

use common::{key, rig, NS};
use rctl_reconcile::{Outcome, Reconciled};
use rctl_schemas::{Kind, KindResource, Phase, Require};
use rctl_testkit::{fixtures, FakeResponse};

#[test]
fn done_resources_of_every_kind_are_left_alone() {
    let rig = rig();
    rig.seed([
        fixtures::host(NS, "h1", "10.0.0.11").into_object(),
        fixtures::command(NS, "c1", "h1", "systemctl enable nginx", vec![]).into_object(),
        fixtures::file_content(NS, "fc1", "h1", "/etc/hostname").into_object(),
        fixtures::file(NS, "f1", "h1", "/etc/motd", "hi\n", vec![Require::command("c1")])
            .into_object(),
        fixtures::file_from(NS, "f2", "h1", "/etc/hostname.bak", "fc1").into_object(),
    ]);
    rig.exec.on("cat '/etc/hostname'", FakeResponse::ok("h1\n"));

    let keys = [
        key(Kind::Host, "h1"),
        key(Kind::Command, "c1"),
        key(Kind::FileContent, "fc1"),
        key(Kind::File, "f1"),
        key(Kind::File, "f2"),
    ];
    for k in &keys {
        assert_eq!(rig.reconcile(k).unwrap().outcome, Outcome::Done, "{k}");
        assert!(rig.object(k).is_done(), "{k}");
    }
    let calls = rig.exec.call_count();
    assert_eq!(calls, keys.len());

    for k in &keys {
        let version = rig.version(k);
        for _ in 0..3 {
            let r = rig.reconcile(k).unwrap();
            assert_eq!(r, Reconciled::finished(Outcome::AlreadySettled), "{k}");
        }
        assert_eq!(rig.version(k), version, "{k} was rewritten");
        assert_eq!(rig.phase(k), Phase::Done, "{k}");
    }
    assert_eq!(rig.exec.call_count(), calls, "a settled resource ran a command");
}
