//! Integration test: serve a mock analysis backend on a free port and drive a
//! session against it through the real HTTP client.

use analyst::api::{AnalystClient, RawFile};
use analyst::chat::ChatRole;
use analyst::config::ChatConfig;
use analyst::session::{Intent, Session, READY_MESSAGE};
use analyst::upload::UploadStatus;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    uploads: AtomicUsize,
    chats: AtomicUsize,
    /// (part name, file name) of every part of the last upload.
    last_parts: Mutex<Vec<(String, Option<String>)>>,
    last_password: Mutex<Option<String>>,
    reject_upload: bool,
    slow_chat: bool,
}

async fn upload(
    State(state): State<Arc<MockState>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    state.uploads.fetch_add(1, Ordering::SeqCst);
    let mut parts = Vec::new();
    let mut password = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let data = field.bytes().await.unwrap_or_default();
        if name == "password" {
            password = Some(String::from_utf8_lossy(&data).to_string());
        }
        parts.push((name, file_name));
    }
    let files = parts.iter().filter(|(n, _)| n == "files").count();
    *state.last_parts.lock().unwrap() = parts;
    *state.last_password.lock().unwrap() = password;
    if state.reject_upload {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Failed to parse 'stmt.pdf': encrypted" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": format!("Successfully loaded {} file(s)", files),
            "rows": 120
        })),
    )
}

async fn chat(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.chats.fetch_add(1, Ordering::SeqCst);
    if state.slow_chat {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or("");
    if message == "break" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "agent failed" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "response": "$420 total",
            "debug_logs": [
                { "step": 1, "type": "tool_call", "content": "sum_transactions" }
            ]
        })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "running" }))
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn start_mock(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .route("/health", get(health))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn client(base_url: String, timeout_secs: u64) -> AnalystClient {
    AnalystClient::new(Some(base_url), Duration::from_secs(timeout_secs)).expect("build client")
}

fn upload_intent(names: &[&str], password: Option<&str>) -> Intent {
    Intent::Upload {
        files: names
            .iter()
            .map(|n| RawFile::new(*n, b"date,description,amount\n".to_vec()))
            .collect(),
        password: password.map(String::from),
    }
}

#[tokio::test]
async fn upload_and_chat_against_mock_backend() {
    let state = Arc::new(MockState::default());
    let url = start_mock(state.clone()).await;
    let mut session = Session::new(client(url, 10), ChatConfig::default().quick_actions);

    session.handle(upload_intent(&["stmt.csv"], None)).await;
    let st = session.state();
    assert_eq!(
        st.upload.status(),
        &UploadStatus::Success("Successfully loaded 1 file(s)".into())
    );
    assert_eq!(st.upload.files().len(), 1);
    assert_eq!(st.upload.files()[0].estimated_row_share, 120);
    assert!(st.can_chat());
    assert_eq!(st.chat.messages().last().map(|m| m.text.as_str()), Some(READY_MESSAGE));

    session.handle(Intent::Send("total spend?".into())).await;
    let st = session.state();
    let ai = st.chat.messages().last().unwrap();
    assert_eq!(ai.role, ChatRole::Ai);
    assert_eq!(ai.text, "$420 total");
    assert_eq!(st.debug.entries().len(), 1);
    assert_eq!(st.debug.entries()[0].header, "Step 1 • TOOL_CALL");
    assert!(st.can_chat());
    assert_eq!(state.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(state.chats.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn multipart_carries_every_file_and_password() {
    let state = Arc::new(MockState::default());
    let url = start_mock(state.clone()).await;
    let mut session = Session::new(client(url, 10), Vec::new());

    session
        .handle(upload_intent(&["jan.csv", "feb.PDF"], Some("s3cret")))
        .await;
    let parts = state.last_parts.lock().unwrap().clone();
    let files: Vec<Option<String>> = parts
        .iter()
        .filter(|(n, _)| n == "files")
        .map(|(_, f)| f.clone())
        .collect();
    assert_eq!(files, vec![Some("jan.csv".into()), Some("feb.PDF".into())]);
    assert_eq!(state.last_password.lock().unwrap().as_deref(), Some("s3cret"));
    assert_eq!(session.state().upload.files()[1].estimated_row_share, 60);

    session.handle(upload_intent(&["mar.csv"], Some(""))).await;
    assert!(state.last_password.lock().unwrap().is_none());
    assert_eq!(session.state().upload.files().len(), 1);
}

#[tokio::test]
async fn invalid_extension_never_reaches_server() {
    let state = Arc::new(MockState::default());
    let url = start_mock(state.clone()).await;
    let mut session = Session::new(client(url, 10), Vec::new());

    session
        .handle(upload_intent(&["ok.csv", "photo.png"], None))
        .await;
    assert_eq!(state.uploads.load(Ordering::SeqCst), 0);
    assert_eq!(
        session.state().upload.status().text(),
        "❌ Invalid file: \"photo.png\". Only .csv and .pdf allowed."
    );
}

#[tokio::test]
async fn server_rejection_keeps_previous_upload() {
    let url = start_mock(Arc::new(MockState::default())).await;
    let mut session = Session::new(client(url, 10), Vec::new());
    session.handle(upload_intent(&["a.csv", "b.csv"], None)).await;

    let rejecting = Arc::new(MockState {
        reject_upload: true,
        ..MockState::default()
    });
    let bad_url = start_mock(rejecting).await;
    let mut other = Session::new(client(bad_url, 10), Vec::new());
    other.handle(upload_intent(&["stmt.pdf"], Some("pw"))).await;
    assert_eq!(
        other.state().upload.status().text(),
        "❌ Error: Failed to parse 'stmt.pdf': encrypted"
    );
    assert!(other.state().upload.files().is_empty());
    assert!(!other.state().can_chat());

    assert_eq!(session.state().upload.files().len(), 2);
}

#[tokio::test]
async fn chat_server_error_becomes_system_message() {
    let url = start_mock(Arc::new(MockState::default())).await;
    let mut session = Session::new(client(url, 10), Vec::new());
    session.handle(upload_intent(&["stmt.csv"], None)).await;
    session.handle(Intent::Send("break".into())).await;

    let st = session.state();
    let last = st.chat.messages().last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert_eq!(last.text, "❌ Error: agent failed");
    assert!(last.timestamp.is_none());
    assert!(st.chat.messages().iter().all(|m| !m.is_pending));
    assert!(st.can_chat());
}

#[tokio::test]
async fn upload_transport_failure_is_reported() {
    let url = format!("http://127.0.0.1:{}", free_port());
    let mut session = Session::new(client(url, 5), Vec::new());
    session.handle(upload_intent(&["stmt.csv"], None)).await;
    let text = session.state().upload.status().text();
    assert!(text.starts_with("❌ Upload failed:"), "status was {:?}", text);
    assert!(!session.state().upload.is_busy());
    assert!(session.state().upload.files().is_empty());
}

#[tokio::test]
async fn hung_chat_times_out_and_reenables_input() {
    let state = Arc::new(MockState {
        slow_chat: true,
        ..MockState::default()
    });
    let url = start_mock(state).await;
    let mut session = Session::new(client(url, 1), Vec::new());
    session.handle(upload_intent(&["stmt.csv"], None)).await;
    session.handle(Intent::Send("total spend?".into())).await;

    let st = session.state();
    let last = st.chat.messages().last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert!(last.text.starts_with("❌ Connection error:"), "got {:?}", last.text);
    assert!(st.can_chat());
}

#[tokio::test]
async fn health_reports_running() {
    let url = start_mock(Arc::new(MockState::default())).await;
    let status = client(url, 5).health().await.expect("health");
    assert_eq!(status.status, "running");
}
