//! Integration tests for the REST store client.
//!
//! Runs `HttpTaskStore` against an in-process axum backend that mimics the
//! real API: `_id`/`id` identifiers, populated or bare assignees, bearer
//! auth and `{message}` error bodies.
//!
//! Verification command: `cargo test --test http_store`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use taskboard::config::ApiConfig;
use taskboard::controller::TaskController;
use taskboard::store::http::HttpTaskStore;
use taskboard::store::{StoreError, TaskStore};
use taskboard_proto::{Priority, TaskDraft, TaskId, TaskStatus, UserId};

// =============================================================================
// Fake backend
// =============================================================================

const TOKEN: &str = "jwt-1";

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    auth: Option<String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct Backend {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Backend {
    fn record(&self, path: String, headers: &HeaderMap, body: Option<Value>) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().push(Seen { path, auth, body });
    }

    fn last(&self) -> Seen {
        self.seen.lock().last().cloned().expect("a request was made")
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn ada() -> Value {
    json!({ "_id": "u1", "id": "legacy-u1", "name": "Ada", "email": "ada@example.com" })
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({ "token": TOKEN, "user": ada() })).into_response()
    } else {
        reject(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == "taken@example.com" {
        return reject(StatusCode::BAD_REQUEST, "User already exists");
    }
    Json(json!({
        "token": TOKEN,
        "user": { "_id": "u3", "name": body["name"], "email": body["email"] }
    }))
    .into_response()
}

async fn list_tasks(State(b): State<Backend>, headers: HeaderMap) -> Response {
    b.record("/tasks".into(), &headers, None);
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Token is not valid");
    }
    Json(json!([
        {
            "_id": "t1",
            "id": "legacy-t1",
            "title": "Spec",
            "description": "Write it down",
            "status": "todo",
            "priority": "high",
            "dueDate": "2024-06-01T00:00:00.000Z",
            "assignees": [ada()],
            "createdAt": "2024-05-01T10:00:00.000Z",
            "updatedAt": "2024-05-02T10:00:00.000Z"
        },
        {
            "id": "t2",
            "title": "Only plain id",
            "status": "done",
            "priority": "low",
            "assignees": ["u1"]
        }
    ]))
    .into_response()
}

async fn create_task(
    State(b): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record("/tasks".into(), &headers, Some(body.clone()));
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Token is not valid");
    }
    if body["title"].as_str().is_none_or(str::is_empty) {
        return reject(StatusCode::BAD_REQUEST, "Title is required");
    }
    let mut task = body;
    task["_id"] = json!("t9");
    (StatusCode::CREATED, Json(task)).into_response()
}

async fn update_task(
    State(b): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record(format!("/tasks/{id}"), &headers, Some(body.clone()));
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Token is not valid");
    }
    match id.as_str() {
        "missing" => reject(StatusCode::NOT_FOUND, "Task not found"),
        "boom" => reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error"),
        _ => Json(json!({
            "_id": id,
            "title": "Spec",
            "status": body.get("status").cloned().unwrap_or_else(|| json!("todo")),
            "priority": "high",
            "dueDate": "2024-06-01",
            "assignees": []
        }))
        .into_response(),
    }
}

async fn delete_task(
    State(b): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    b.record(format!("/tasks/{id}"), &headers, None);
    if id == "missing" {
        return reject(StatusCode::NOT_FOUND, "Task not found");
    }
    Json(json!({ "message": "Task deleted" })).into_response()
}

async fn list_users(State(b): State<Backend>, headers: HeaderMap) -> Response {
    b.record("/users".into(), &headers, None);
    Json(json!([
        { "_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "Engineer" },
        { "id": "u2", "name": "Grace", "email": "grace@example.com", "skills": ["COBOL"] }
    ]))
    .into_response()
}

async fn start_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .route("/api/users", get(list_users))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn api(addr: SocketAddr) -> ApiConfig {
    ApiConfig {
        base_url: Url::parse(&format!("http://{addr}/api")).unwrap(),
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
    }
}

async fn authed_store() -> (HttpTaskStore, Backend) {
    let (addr, backend) = start_backend().await;
    let store = HttpTaskStore::new(&api(addr))
        .unwrap()
        .with_token(Some(TOKEN.to_string()));
    (store, backend)
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn login_returns_normalized_grant() {
    let (addr, _) = start_backend().await;
    let store = HttpTaskStore::new(&api(addr)).unwrap();
    let grant = store.login("ada@example.com", "secret").await.unwrap();
    assert_eq!(grant.token, TOKEN);
    assert_eq!(grant.user.id, UserId::new("u1"));
    assert_eq!(grant.user.name, "Ada");
}

#[tokio::test]
async fn wrong_password_is_auth_error() {
    let (addr, _) = start_backend().await;
    let store = HttpTaskStore::new(&api(addr)).unwrap();
    let err = store.login("ada@example.com", "nope").await.unwrap_err();
    assert_eq!(err, StoreError::Auth("Invalid credentials".into()));
}

#[tokio::test]
async fn duplicate_registration_is_validation_error() {
    let (addr, _) = start_backend().await;
    let store = HttpTaskStore::new(&api(addr)).unwrap();
    let err = store
        .register("Someone", "taken@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("User already exists".into()));

    let grant = store
        .register("Grace", "grace@example.com", "pw")
        .await
        .unwrap();
    assert_eq!(grant.user.id, UserId::new("u3"));
}

#[tokio::test]
async fn stale_token_is_auth_error() {
    let (addr, _) = start_backend().await;
    let store = HttpTaskStore::new(&api(addr))
        .unwrap()
        .with_token(Some("stale".into()));
    assert!(matches!(
        store.list_tasks().await,
        Err(StoreError::Auth(_))
    ));
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn list_sends_bearer_and_normalizes_ids() {
    let (store, backend) = authed_store().await;
    let tasks = store.list_tasks().await.unwrap();

    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["t1", "t2"]);
    assert_eq!(backend.last().auth.as_deref(), Some("Bearer jwt-1"));

    let first = &tasks[0];
    assert_eq!(first.priority, Priority::High);
    assert_eq!(first.due_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    assert_eq!(first.assignees[0].id, UserId::new("u1"));
    assert_eq!(first.assignees[0].name, "Ada");
    assert!(first.created_at.is_some());

    let plain = &tasks[1];
    assert_eq!(plain.status, TaskStatus::Done);
    assert_eq!(plain.assignees[0].id, UserId::new("u1"));
    assert!(plain.assignees[0].name.is_empty());
}

#[tokio::test]
async fn create_posts_camel_case_draft() {
    let (store, backend) = authed_store().await;
    let draft = TaskDraft::new("Spec", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .with_priority(Priority::High)
        .with_assignees(vec![UserId::new("u1")]);
    let task = store.create_task(&draft).await.unwrap();

    assert_eq!(task.id, TaskId::new("t9"));
    assert_eq!(task.status, TaskStatus::Todo);
    let body = backend.last().body.unwrap();
    assert_eq!(body["dueDate"], "2024-06-01");
    assert_eq!(body["priority"], "high");
    assert_eq!(body["status"], "todo");
    assert_eq!(body["assignees"], json!(["u1"]));
}

#[tokio::test]
async fn rejected_create_is_validation_error() {
    let (store, _) = authed_store().await;
    let draft = TaskDraft::new("", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    let err = store.create_task(&draft).await.unwrap_err();
    assert_eq!(err, StoreError::Validation("Title is required".into()));
}

#[tokio::test]
async fn status_patch_sends_only_status() {
    let (store, backend) = authed_store().await;
    let task = store
        .update_task(
            &TaskId::new("t1"),
            &taskboard_proto::TaskPatch::status(TaskStatus::InProgress),
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    let seen = backend.last();
    assert_eq!(seen.path, "/tasks/t1");
    assert_eq!(seen.body.unwrap(), json!({ "status": "in-progress" }));
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let (store, _) = authed_store().await;
    let id = TaskId::new("missing");
    let patch = taskboard_proto::TaskPatch::status(TaskStatus::Done);
    assert_eq!(
        store.update_task(&id, &patch).await.unwrap_err(),
        StoreError::NotFound(id.clone())
    );
    assert_eq!(
        store.delete_task(&id).await.unwrap_err(),
        StoreError::NotFound(id)
    );
}

#[tokio::test]
async fn server_error_is_network_error() {
    let (store, _) = authed_store().await;
    let err = store
        .update_task(
            &TaskId::new("boom"),
            &taskboard_proto::TaskPatch::status(TaskStatus::Done),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Network(_)));
}

#[tokio::test]
async fn delete_is_acknowledged() {
    let (store, backend) = authed_store().await;
    store.delete_task(&TaskId::new("t1")).await.unwrap();
    assert_eq!(backend.last().path, "/tasks/t1");
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = HttpTaskStore::new(&api(addr))
        .unwrap()
        .with_token(Some(TOKEN.into()));
    assert!(matches!(
        store.list_tasks().await,
        Err(StoreError::Network(_))
    ));
}

#[tokio::test]
async fn users_are_normalized() {
    let (store, _) = authed_store().await;
    let users = store.list_users().await.unwrap();
    assert_eq!(users[0].id, UserId::new("u1"));
    assert_eq!(users[0].role.as_deref(), Some("Engineer"));
    assert_eq!(users[1].id, UserId::new("u2"));
    assert_eq!(users[1].skills, ["COBOL"]);
}

// =============================================================================
// Controller over HTTP
// =============================================================================

#[tokio::test]
async fn controller_moves_task_through_http_store() {
    let (store, _) = authed_store().await;
    let controller = TaskController::new(store);
    assert_eq!(controller.load().await.unwrap(), 2);

    controller
        .move_task(&TaskId::new("t1"), TaskStatus::Done)
        .await
        .unwrap();
    let snap = controller.snapshot();
    assert!(snap[0].tasks.is_empty());
    let done: Vec<&str> = snap[2].tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(done, ["t1", "t2"]);
}

#[tokio::test]
async fn controller_keeps_board_on_http_404() {
    let (store, _) = authed_store().await;
    let controller = TaskController::new(store);
    controller.load().await.unwrap();
    let before = controller.snapshot();

    let err = controller.delete(&TaskId::new("missing")).await.unwrap_err();
    assert_eq!(err.source, StoreError::NotFound(TaskId::new("missing")));
    assert_eq!(controller.snapshot(), before);
}
