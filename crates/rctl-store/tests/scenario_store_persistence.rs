//! Scenario: a persisted store survives a restart and feeds watchers.
//!
//! # Invariants under test
//!
//! 1. Objects and statuses written through one `MemoryStore` are visible to a
//!    fresh store opened on the same state file.
//! 2. Resource versions keep increasing across the reopen.
//! 3. Watchers see create, status and delete events in order.

use rctl_schemas::{FileContent, FileContentSpec, Kind, KindResource, Phase, ResourceKey};
use rctl_store::{get_as, update_status_as, ChangeType, MemoryStore, ResourceStore};

fn fc(name: &str) -> FileContent {
    FileContent::new(
        "web",
        name,
        FileContentSpec {
            host: "web-1".to_string(),
            path: "/etc/hostname".to_string(),
            requires: None,
        },
    )
}

#[test]
fn reopen_restores_objects_and_versions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("store.json");

    {
        let store = MemoryStore::open(&path).unwrap();
        assert!(store.is_empty());
        store.apply(fc("hostname").into_object()).unwrap();

        let mut r: FileContent = get_as(&store, "web", "hostname").unwrap();
        r.status.done = true;
        r.status.content = "web-1\n".to_string();
        r.status.status_string = Phase::Done;
        update_status_as(&store, &r).unwrap();
    }

    let store = MemoryStore::open(&path).unwrap();
    let r: FileContent = get_as(&store, "web", "hostname").unwrap();
    assert!(r.status.done);
    assert_eq!(r.status.content, "web-1\n");
    assert_eq!(r.metadata.resource_version, 2);

    let created = store.apply(fc("other").into_object()).unwrap();
    assert_eq!(created.object().meta().resource_version, 3);
}

#[test]
fn namespace_and_kind_filters_apply() {
    let store = MemoryStore::new();
    store.apply(fc("a").into_object()).unwrap();
    store.apply(fc("b").into_object()).unwrap();

    assert_eq!(store.list(Some("web"), None).unwrap().len(), 2);
    assert_eq!(store.list(Some("db"), None).unwrap().len(), 0);
    assert_eq!(store.list(None, Some(Kind::Command)).unwrap().len(), 0);
    assert_eq!(store.list(None, Some(Kind::FileContent)).unwrap().len(), 2);
}

#[tokio::test]
async fn watchers_receive_changes_in_order() {
    let store = MemoryStore::new();
    let mut rx = store.watch();

    store.apply(fc("a").into_object()).unwrap();
    let mut r: FileContent = get_as(&store, "web", "a").unwrap();
    r.status.done = true;
    update_status_as(&store, &r).unwrap();
    store
        .delete(&ResourceKey::new("web", "a", Kind::FileContent))
        .unwrap();

    let e1 = rx.recv().await.unwrap();
    let e2 = rx.recv().await.unwrap();
    let e3 = rx.recv().await.unwrap();
    assert_eq!(e1.change, ChangeType::Created);
    assert_eq!(e2.change, ChangeType::StatusUpdated);
    assert!(e2.done);
    assert_eq!(e3.change, ChangeType::Deleted);
    assert_eq!(e3.key.name, "a");
}
