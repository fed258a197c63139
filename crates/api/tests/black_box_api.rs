use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use todoflow_api::app::{build_app, AppServices};
use todoflow_core::AggregateId;
use todoflow_events::LoopbackPublisher;
use todoflow_infra::config::ServiceConfig;
use todoflow_infra::read_model::{Decide, StoreError, TodoRow, TodoStore, Transition};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = ServiceConfig::from_lookup(|name| match name {
            "TRANSFORMER_SECRET" => Some(SECRET.to_string()),
            "READ_WAIT_MS" => Some("2000".to_string()),
            _ => None,
        })
        .expect("test config");

        // Same router as prod (in-memory store + loopback delivery), on an ephemeral port.
        Self::serve(Arc::new(AppServices::in_process(&config))).await
    }

    async fn serve(services: Arc<AppServices>) -> Self {
        let app = build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The create path is eventually consistent; poll until the projection catches up.
async fn get_todo_eventually(client: &reqwest::Client, srv: &TestServer, id: &str) -> Value {
    let mut delay = std::time::Duration::from_millis(5);
    for _ in 0..40 {
        let res = client
            .get(srv.url(&format!("/api/todos/{id}")))
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(std::time::Duration::from_millis(50));
    }

    panic!("todo did not become visible in projection within timeout");
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn todo_lifecycle_create_complete_rename_delete() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/todos"))
        .json(&json!({ "title": "Buy milk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["title"], "Buy milk");
    assert_eq!(created["done"], false);
    let id = created["id"].as_str().unwrap().to_string();

    let row = get_todo_eventually(&client, &srv, &id).await;
    assert_eq!(row, json!({ "id": id, "title": "Buy milk", "description": "", "done": false }));

    let res = client
        .put(srv.url(&format!("/api/todos/{id}")))
        .json(&json!({ "done": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let row: Value = res.json().await.unwrap();
    assert_eq!(row["done"], true);

    let res = client
        .put(srv.url(&format!("/api/todos/{id}")))
        .json(&json!({ "title": "Buy oat milk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let row: Value = res.json().await.unwrap();
    assert_eq!(row["title"], "Buy oat milk");
    assert_eq!(row["done"], true);

    let res = client
        .delete(srv.url(&format!("/api/todos/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "success": true }));

    // Deletion is asynchronous too.
    let id_parsed = id.parse().unwrap();
    let mut gone = false;
    for _ in 0..40 {
        if srv.services.store.get(&id_parsed).await.unwrap().is_none() {
            gone = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(gone, "row still present after delete");

    // A late Completed delivery is accepted but recreates nothing.
    let res = client
        .post(srv.url("/api/transformer"))
        .header("x-secret", SECRET)
        .json(&json!({ "eventType": "todo-item.completed.v0", "payload": { "id": id } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client
        .get(srv.url(&format!("/api/todos/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_is_ordered_by_id() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for id in ["b", "c", "a"] {
        let res = client
            .post(srv.url("/api/transformer/"))
            .header("x-secret", SECRET)
            .json(&json!({
                "flowType": "todo-items",
                "eventType": "todo-item.created.v0",
                "payload": { "id": id, "title": format!("todo {id}"), "description": "", "done": false }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "OK");
    }

    let rows: Vec<Value> = client
        .get(srv.url("/api/todos"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn webhook_rejects_wrong_secret_without_mutation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = json!({ "eventType": "todo-item.created.v0", "payload": { "id": "x", "title": "x" } });
    for secret in [Some("wrong"), None] {
        let mut req = client.post(srv.url("/api/transformer")).json(&body);
        if let Some(s) = secret {
            req = req.header("x-secret", s);
        }
        let res = req.send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "unauthorized");
    }

    let rows: Vec<Value> = client
        .get(srv.url("/api/todos"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn webhook_rejects_unknown_event_type_and_bad_payload() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let cases = [
        (json!({ "eventType": "todo-item.archived.v0", "payload": { "id": "x" } }), "unknown_event_type"),
        (json!({ "eventType": "todo-item.created.v0", "payload": { "id": "x", "title": 3 } }), "invalid_payload"),
        (json!({ "flowType": "billing", "eventType": "todo-item.deleted.v0", "payload": { "id": "x" } }), "flow_mismatch"),
    ];

    for (body, code) in cases {
        let res = client
            .post(srv.url("/api/transformer"))
            .header("x-secret", SECRET)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], code);
    }

    let res = client
        .post(srv.url("/api/transformer"))
        .header("x-secret", SECRET)
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

struct Unreachable;

#[async_trait]
impl TodoStore for Unreachable {
    async fn get(&self, _id: &AggregateId) -> Result<Option<TodoRow>, StoreError> {
        Err(StoreError::database("get", "connection refused"))
    }

    async fn list(&self) -> Result<Vec<TodoRow>, StoreError> {
        Err(StoreError::database("list", "connection refused"))
    }

    async fn transact(&self, _id: &AggregateId, _decide: Decide<'_>) -> Result<Transition, StoreError> {
        Err(StoreError::database("transact", "connection refused"))
    }
}

#[tokio::test]
async fn webhook_fails_delivery_when_store_is_down() {
    let services = AppServices::new(
        Arc::new(Unreachable),
        Arc::new(LoopbackPublisher::new()),
        SECRET,
        Duration::from_secs(1),
        Duration::from_millis(50),
    );
    let srv = TestServer::serve(Arc::new(services)).await;

    let res = reqwest::Client::new()
        .post(srv.url("/api/transformer"))
        .header("x-secret", SECRET)
        .json(&json!({ "eventType": "todo-item.created.v0", "payload": { "id": "x", "title": "x" } }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "database_error");
}

#[tokio::test]
async fn create_validates_title() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for body in [json!({}), json!({ "title": 42 }), json!({ "title": "" })] {
        let res = client
            .post(srv.url("/api/todos"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
    }
}

#[tokio::test]
async fn unknown_todo_is_404() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/api/todos/does-not-exist")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, srv.url("/api/todos"))
        .header("origin", "http://example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
