//! Common test infrastructure
//!
//! A mock chat server answering canned JSON, plus a temporary store directory
//! with the mock server registered.

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use notification_hydrator::remote::ServerCredentials;
use notification_hydrator::{
    HttpRemoteFetcher, NotificationProcessor, ProcessorSettings, SerializationGate,
    SqliteStoreProvider,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-session-token";
pub const CURRENT_USER_ID: &str = "me";

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<String>>,
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>) {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let key = format!("{} {}", method, target);
    state.requests.lock().unwrap().push(if body.is_empty() {
        key.clone()
    } else {
        format!("{} {}", key, body)
    });

    let authorized = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(|h| h == format!("Bearer {}", TOKEN))
        .unwrap_or(false);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"id": "api.context.session_expired.app_error",
                        "message": "Invalid or expired session", "status_code": 401})),
        );
    }

    match state.routes.lock().unwrap().get(&key) {
        Some(value) => (StatusCode::OK, Json(value.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"id": "app.not_found", "message": "Not found", "status_code": 404})),
        ),
    }
}

/// Mock server on a random local port. Shuts down when dropped.
pub struct MockChatServer {
    pub base_url: String,
    state: Arc<MockState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockChatServer {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn on_get(&self, path_and_query: &str, response: Value) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(format!("GET {}", path_and_query), response);
    }

    pub fn on_post(&self, path: &str, response: Value) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(format!("POST {}", path), response);
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Routes for an open channel `c1` of team `t1` with two posts.
    pub fn with_open_channel(&self) {
        self.on_get(
            "/api/v4/channels/c1",
            json!({"id": "c1", "team_id": "t1", "type": "O", "name": "town-square",
                   "display_name": "Town Square", "last_post_at": 200}),
        );
        self.on_get(
            "/api/v4/channels/c1/members/me",
            json!({"channel_id": "c1", "user_id": CURRENT_USER_ID, "msg_count": 2,
                   "mention_count": 1}),
        );
        self.on_get(
            "/api/v4/channels/c1/posts?page=0&per_page=60&collapsedThreads=false&collapsedThreadsExtended=false",
            json!({
                "order": ["p2", "p1"],
                "posts": {
                    "p1": {"id": "p1", "channel_id": "c1", "user_id": "u1", "create_at": 100,
                           "message": "hello"},
                    "p2": {"id": "p2", "channel_id": "c1", "user_id": "u2", "create_at": 200,
                           "message": "hi @alice"}
                },
                "prev_post_id": ""
            }),
        );
        self.on_post(
            "/api/v4/users/ids",
            json!([
                {"id": "u1", "username": "alice"},
                {"id": "u2", "username": "bob"}
            ]),
        );
    }
}

/// Store directory with the mock server registered, and a gate wired to both.
pub struct TestEnv {
    pub server: MockChatServer,
    pub stores: Arc<SqliteStoreProvider>,
    pub gate: SerializationGate,
    _db_dir: TempDir,
}

impl TestEnv {
    pub async fn new(token: &str) -> Self {
        let server = MockChatServer::spawn().await;
        let db_dir = TempDir::new().expect("Failed to create temp dir");

        let stores =
            Arc::new(SqliteStoreProvider::new(db_dir.path()).expect("Failed to open app db"));
        stores
            .register_server(&server.base_url, "Mock")
            .expect("Failed to register server");
        stores
            .open_server(&server.base_url)
            .expect("Failed to open server db")
            .expect("Server not registered")
            .set_current_user_id(CURRENT_USER_ID)
            .expect("Failed to set current user");

        let remote = HttpRemoteFetcher::new(
            &[ServerCredentials {
                url: server.base_url.clone(),
                token: token.to_string(),
            }],
            5,
        )
        .expect("Failed to build remote fetcher");

        let processor =
            NotificationProcessor::new(Arc::new(remote), stores.clone(), ProcessorSettings::default());

        Self {
            server,
            stores,
            gate: SerializationGate::new(Arc::new(processor)),
            _db_dir: db_dir,
        }
    }
}
