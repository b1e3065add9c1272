//! In-process scenario tests for rctl-daemon HTTP endpoints.
//!
//! Each test builds the router with `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no socket is bound.
//!
//! # Invariants under test
//!
//! 1. Health and status answer 200 with the documented fields.
//! 2. POST applies an object (201), re-posting it is a no-op (200), and a
//!    changed spec is refused (409).
//! 3. Client-supplied status is discarded on apply.
//! 4. Unknown kinds are 400; missing objects are 404.
//! 5. With the controller running, applied resources converge and the
//!    result is visible through the API.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rctl_daemon::{routes, state};
use rctl_reconcile::{EngineSettings, Reconciler};
use rctl_runtime::{BackoffPolicy, Controller, RuntimeSettings};
use rctl_store::{MemoryStore, ResourceStore};
use rctl_testkit::{test_credentials, FakeExecutor, TEST_KEY_SECRET};
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    state: Arc<state::AppState>,
    exec: Arc<FakeExecutor>,
}

fn fixture() -> Fixture {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let exec = Arc::new(FakeExecutor::new());
    let engine = Reconciler::new(
        store.clone(),
        Arc::new(test_credentials(&["default", "web"])),
        exec.clone(),
        EngineSettings {
            dependency_poll: Duration::from_millis(50),
            ..EngineSettings::default()
        },
    );
    let controller = Controller::new(
        engine,
        RuntimeSettings {
            workers: 2,
            backoff: BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(100)),
        },
    );
    Fixture {
        state: Arc::new(state::AppState::new(store, controller).with_config_hash("abc123")),
        exec,
    }
}

fn make_router(f: &Fixture) -> axum::Router {
    routes::build_router(Arc::clone(&f.state))
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn host_doc(name: &str) -> Value {
    json!({
        "kind": "Host",
        "metadata": { "name": name, "namespace": "web" },
        "spec": { "sshkeysecret": TEST_KEY_SECRET, "ipaddress": "10.1.0.5", "port": 2222 }
    })
}

fn command_doc(name: &str, cmd: &str) -> Value {
    json!({
        "kind": "Command",
        "metadata": { "name": name, "namespace": "web" },
        "spec": { "host": "web-1", "command": cmd }
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let f = fixture();
    let (status, body) = call(make_router(&f), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "rctl-daemon");
}

#[tokio::test]
async fn status_reports_queue_and_phase_counts() {
    let f = fixture();
    let (status, _) = call(make_router(&f), post_json("/v1/resources", &host_doc("web-1"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(make_router(&f), get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["config_hash"], "abc123");
    assert_eq!(json["resources"], 1);
    assert_eq!(json["phases"]["NONE"], 1);
    assert_eq!(json["stats"]["reconciles"], 0);
    assert!(json["queue_depth"].is_u64());
}

// ---------------------------------------------------------------------------
// /v1/resources
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apply_is_idempotent_and_spec_is_immutable() {
    let f = fixture();
    let doc = command_doc("install", "apt-get install -y nginx");

    let (status, body) = call(make_router(&f), post_json("/v1/resources", &doc)).await;
    assert_eq!(status, StatusCode::CREATED);
    let json = parse_json(body);
    assert_eq!(json["result"], "created");
    assert_eq!(json["object"]["metadata"]["resourceVersion"], 1);

    let (status, body) = call(make_router(&f), post_json("/v1/resources", &doc)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["result"], "unchanged");

    let changed = command_doc("install", "apt-get install -y apache2");
    let (status, body) = call(make_router(&f), post_json("/v1/resources", &changed)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["code"], "spec_immutable");
}

#[tokio::test]
async fn client_status_is_discarded() {
    let f = fixture();
    let mut doc = command_doc("sneaky", "true");
    doc["status"] = json!({ "done": true, "status_string": "DONE", "exitcode": 0 });

    let (status, body) = call(make_router(&f), post_json("/v1/resources", &doc)).await;
    assert_eq!(status, StatusCode::CREATED);
    let json = parse_json(body);
    assert_eq!(json["object"]["status"]["done"], false);
    assert_eq!(json["object"]["status"]["status_string"], "");
}

#[tokio::test]
async fn list_filters_and_get_by_key() {
    let f = fixture();
    for doc in [host_doc("web-1"), command_doc("a", "true"), command_doc("b", "true")] {
        let (status, _) = call(make_router(&f), post_json("/v1/resources", &doc)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(make_router(&f), get("/v1/resources?namespace=web&kind=command")).await;
    assert_eq!(status, StatusCode::OK);
    let items = parse_json(body)["items"].as_array().unwrap().clone();
    let names: Vec<&str> = items
        .iter()
        .map(|o| o["metadata"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    let (status, body) = call(make_router(&f), get("/v1/resources?namespace=other")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse_json(body)["items"].as_array().unwrap().is_empty());

    let (status, body) = call(make_router(&f), get("/v1/resources/web/Host/web-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["spec"]["port"], 2222);
}

#[tokio::test]
async fn unknown_kind_is_400_and_missing_is_404() {
    let f = fixture();
    let (status, body) = call(make_router(&f), get("/v1/resources?kind=pod")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["code"], "bad_request");

    let (status, _) = call(make_router(&f), get("/v1/resources/web/Pod/x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(make_router(&f), get("/v1/resources/web/Command/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["code"], "not_found");
}

// ---------------------------------------------------------------------------
// End to end with the controller running
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn applied_resources_converge() {
    let f = fixture();
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let run = tokio::spawn(Arc::clone(&f.state.controller).run(stop_rx));

    let mut dependent = command_doc("restart", "systemctl restart nginx");
    dependent["spec"]["requires"] = json!([{ "command": { "name": "install" } }]);
    for doc in [
        host_doc("web-1"),
        dependent,
        command_doc("install", "apt-get install -y nginx"),
    ] {
        let (status, _) = call(make_router(&f), post_json("/v1/resources", &doc)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let status = loop {
        let (_, body) = call(make_router(&f), get("/v1/status")).await;
        let json = parse_json(body);
        if json["phases"]["DONE"] == 3 {
            break json;
        }
        assert!(tokio::time::Instant::now() < deadline, "not converged: {json}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    assert!(status["stats"]["reconciles"].as_u64().unwrap() >= 3);

    let (_, body) = call(make_router(&f), get("/v1/resources/web/Command/restart")).await;
    let restart = parse_json(body);
    assert_eq!(restart["status"]["done"], true);
    assert_eq!(restart["status"]["exitcode"], 0);

    let calls = f.exec.calls();
    assert!(calls.iter().all(|c| c.target.port == 2222));
    assert_eq!(f.exec.calls_matching("systemctl restart nginx"), 1);

    stop_tx.send(true).unwrap();
    run.await.unwrap().unwrap();
}
