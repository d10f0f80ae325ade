use anyhow::{anyhow, Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;

use crate::data_url::{guess_mime_from_name, is_image_mime, DataUrl};
use crate::main_ui_html::build_main_ui_html;
use crate::prompt_client::PromptProvider;
use crate::renderer::{render_history_grid, render_result_panel};
use crate::session::{GenerationState, SessionError, SessionPhase};
use crate::workspace::{run_generation, Workspace};

pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub workspace: Mutex<Workspace>,
    pub provider: Arc<dyn PromptProvider>,
    pub min_generating: Duration,
    pub confirm_clear: bool,
    pub server_port: AtomicU16,
    /// Bumped on every state change; the page polls it to know when to re-render.
    pub revision: AtomicU64,
}

type ApiResponse = (StatusCode, Json<Value>);

impl AppState {
    pub fn new(
        workspace: Workspace,
        provider: Arc<dyn PromptProvider>,
        min_generating: Duration,
        confirm_clear: bool,
    ) -> Self {
        Self {
            workspace: Mutex::new(workspace),
            provider,
            min_generating,
            confirm_clear,
            server_port: AtomicU16::new(0),
            revision: AtomicU64::new(0),
        }
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct AppServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl AppServer {
    /// Serves on `preferred_port` or the next free one; `0` picks any free port.
    pub fn start(state: Arc<AppState>, preferred_port: u16) -> Result<Self> {
        let listener = bind_listener(preferred_port)?;
        let port = listener
            .local_addr()
            .context("failed to inspect server local address")?
            .port();
        listener
            .set_nonblocking(true)
            .context("failed to set listener non-blocking")?;

        state.server_port.store(port, Ordering::Relaxed);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread_handle = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();
            let runtime = match runtime {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("failed to build server runtime: {err}");
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        log::error!("failed to adopt listener: {err}");
                        return;
                    }
                };

                let app = build_router(state);
                let server = axum::serve(listener, app).with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });
                if let Err(err) = server.await {
                    log::error!("server stopped with error: {err}");
                }
            });
        });

        log::info!("serving UI on http://127.0.0.1:{port}/");
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            thread_handle: Some(thread_handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            log::info!("server on port {} stopped", self.port);
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Serialize)]
struct UiSnapshot {
    phase: SessionPhase,
    generation: GenerationState,
    image_name: Option<String>,
    panel_html: String,
    history_html: String,
    history_count: usize,
    confirm_clear: bool,
    revision: u64,
}

#[derive(Debug, Deserialize)]
struct ClearHistoryReq {
    #[serde(default)]
    confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct CopyReq {
    prompt: String,
}

fn build_router(state: Arc<AppState>) -> Router {
    let port = state.server_port.load(Ordering::Relaxed);
    let mut origins = vec![HeaderValue::from_static("null")];
    for host in ["127.0.0.1", "localhost"] {
        if let Ok(origin) = HeaderValue::from_str(&format!("http://{host}:{port}")) {
            origins.push(origin);
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(get_main_page))
        .route("/ping", get(get_ping))
        .route("/app/init", get(get_app_init))
        .route("/app/revision", get(get_app_revision))
        .route("/app/select", post(post_app_select))
        .route("/app/generate", post(post_app_generate))
        .route("/app/reset", post(post_app_reset))
        .route("/app/history/clear", post(post_app_clear_history))
        .route("/app/copy", post(post_app_copy))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 200_000))
        .layer(cors)
        .with_state(state)
}

async fn get_main_page() -> Html<String> {
    Html(build_main_ui_html())
}

async fn get_ping() -> ApiResponse {
    ok_json(json!({}))
}

async fn get_app_init(State(state): State<Arc<AppState>>) -> ApiResponse {
    let snapshot = {
        let workspace = match lock_workspace(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        build_ui_snapshot(&state, &workspace)
    };

    ok_snapshot(snapshot)
}

async fn get_app_revision(State(state): State<Arc<AppState>>) -> ApiResponse {
    let revision = state.revision.load(Ordering::Relaxed);
    ok_json(json!({ "revision": revision }))
}

async fn post_app_select(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResponse {
    let mut file_name = String::new();
    let mut content_type = String::new();
    let mut file_data = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                file_name = field.file_name().unwrap_or_default().to_string();
                content_type = field.content_type().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file_data = bytes.to_vec(),
                    Err(_) => return err_json(StatusCode::BAD_REQUEST, "invalid file"),
                }
            }
            Ok(None) => break,
            Err(_) => return err_json(StatusCode::BAD_REQUEST, "invalid multipart request"),
        }
    }

    if file_data.is_empty() {
        return err_json(StatusCode::BAD_REQUEST, "file is required");
    }
    if file_data.len() > MAX_IMAGE_BYTES {
        return err_json(StatusCode::BAD_REQUEST, "file size exceeds 20MB");
    }

    let mime_type = if is_image_mime(&content_type) {
        content_type
    } else if content_type.is_empty() || content_type == "application/octet-stream" {
        guess_mime_from_name(&file_name)
            .unwrap_or_default()
            .to_string()
    } else {
        content_type
    };

    if !is_image_mime(&mime_type) {
        let shown = if !mime_type.is_empty() {
            mime_type.as_str()
        } else if !file_name.is_empty() {
            file_name.as_str()
        } else {
            "unknown"
        };
        return err_json(
            StatusCode::BAD_REQUEST,
            &format!("unsupported file type: {shown} (images only)"),
        );
    }

    let image = match DataUrl::from_bytes(&mime_type, &file_data) {
        Ok(image) => image,
        Err(err) => return err_json(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let snapshot = {
        let mut workspace = match lock_workspace(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        workspace.select_image(&file_name, &image);
        state.bump_revision();
        build_ui_snapshot(&state, &workspace)
    };

    ok_snapshot(snapshot)
}

async fn post_app_generate(State(state): State<Arc<AppState>>) -> ApiResponse {
    let (ticket, snapshot) = {
        let mut workspace = match lock_workspace(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        let ticket = match workspace.begin_generation() {
            Ok(ticket) => ticket,
            Err(err @ SessionError::AlreadyGenerating) => {
                return err_json(StatusCode::CONFLICT, &err.to_string())
            }
            Err(err) => return err_json(StatusCode::BAD_REQUEST, &err.to_string()),
        };
        state.bump_revision();
        (ticket, build_ui_snapshot(&state, &workspace))
    };

    let task_state = state.clone();
    tokio::spawn(async move {
        let request_id = ticket.request_id;
        if let Err(err) = run_generation(
            &task_state.workspace,
            task_state.provider.as_ref(),
            ticket,
            task_state.min_generating,
        )
        .await
        {
            log::error!("generation #{request_id} could not be applied: {err:#}");
        }
        task_state.bump_revision();
    });

    ok_snapshot(snapshot)
}

async fn post_app_reset(State(state): State<Arc<AppState>>) -> ApiResponse {
    let snapshot = {
        let mut workspace = match lock_workspace(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        workspace.reset();
        state.bump_revision();
        build_ui_snapshot(&state, &workspace)
    };

    ok_snapshot(snapshot)
}

async fn post_app_clear_history(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ClearHistoryReq>,
) -> ApiResponse {
    let snapshot = {
        let mut workspace = match lock_workspace(&state) {
            Ok(guard) => guard,
            Err(resp) => return resp,
        };
        match workspace.clear_history(payload.confirmed) {
            Ok(true) => {
                state.bump_revision();
            }
            Ok(false) => {}
            Err(err) => {
                return err_json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("clear failed: {err:#}"),
                )
            }
        }
        build_ui_snapshot(&state, &workspace)
    };

    ok_snapshot(snapshot)
}

async fn post_app_copy(Json(payload): Json<CopyReq>) -> ApiResponse {
    let prompt = payload.prompt.trim().to_string();
    if prompt.is_empty() {
        return ok_json(json!({ "skipped": true }));
    }

    if let Err(err) = copy_to_system_clipboard(&prompt) {
        return err_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("clipboard error: {err}"),
        );
    }

    ok_json(json!({ "skipped": false }))
}

fn lock_workspace(
    state: &AppState,
) -> std::result::Result<MutexGuard<'_, Workspace>, ApiResponse> {
    state
        .workspace
        .lock()
        .map_err(|_| err_json(StatusCode::INTERNAL_SERVER_ERROR, "workspace lock error"))
}

fn ok_json(payload: Value) -> ApiResponse {
    let mut body = serde_json::Map::new();
    body.insert("ok".to_string(), Value::Bool(true));

    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            body.insert(key.clone(), value.clone());
        }
    } else if !payload.is_null() {
        body.insert("data".to_string(), payload);
    }

    (StatusCode::OK, Json(Value::Object(body)))
}

fn ok_snapshot(snapshot: UiSnapshot) -> ApiResponse {
    match serde_json::to_value(snapshot) {
        Ok(payload) => ok_json(payload),
        Err(err) => err_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("snapshot error: {err}"),
        ),
    }
}

fn err_json(status: StatusCode, message: &str) -> ApiResponse {
    (
        status,
        Json(json!({
            "ok": false,
            "error": message,
        })),
    )
}

fn build_ui_snapshot(state: &AppState, workspace: &Workspace) -> UiSnapshot {
    let session = workspace.state();
    let history = workspace.history();

    UiSnapshot {
        phase: session.phase(),
        generation: session.generation_state(),
        image_name: session.image().map(|image| image.name.clone()),
        panel_html: render_result_panel(session),
        history_html: render_history_grid(history.items(), history.capacity()),
        history_count: history.len(),
        confirm_clear: state.confirm_clear,
        revision: state.revision.load(Ordering::Relaxed),
    }
}

fn bind_listener(preferred_port: u16) -> Result<TcpListener> {
    if preferred_port == 0 {
        return TcpListener::bind(("127.0.0.1", 0)).context("failed to bind server port");
    }

    for offset in 0..200u16 {
        let port = preferred_port.saturating_add(offset);
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok(listener);
        }
    }

    Err(anyhow!("failed to bind server port"))
}

#[cfg(target_os = "windows")]
fn copy_to_system_clipboard(text: &str) -> Result<()> {
    clipboard_win::set_clipboard_string(text)
        .map_err(|err| anyhow!("failed to write clipboard: {err}"))
}

#[cfg(not(target_os = "windows"))]
fn copy_to_system_clipboard(_text: &str) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AppServer, AppState};
    use crate::history_store::HistoryStore;
    use crate::prompt_client::{PromptError, PromptProvider};
    use crate::storage::MemoryStorage;
    use crate::workspace::Workspace;
    use async_trait::async_trait;
    use reqwest::multipart::{Form, Part};
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    struct ScriptedProvider {
        delay: Duration,
        reply: Result<String, PromptError>,
    }

    #[async_trait]
    impl PromptProvider for ScriptedProvider {
        async fn generate(&self, _image: &str, _mime_type: &str) -> Result<String, PromptError> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn start_server(delay: Duration, reply: Result<String, PromptError>) -> (AppServer, String) {
        let workspace = Workspace::new(HistoryStore::load(Box::new(MemoryStorage::new()), 20));
        let provider: Arc<dyn PromptProvider> = Arc::new(ScriptedProvider { delay, reply });
        let state = Arc::new(AppState::new(
            workspace,
            provider,
            Duration::from_millis(50),
            true,
        ));
        let server = AppServer::start(state, 0).expect("start server");
        let base = format!("http://127.0.0.1:{}", server.port());
        (server, base)
    }

    fn image_form(name: &str, mime: &str) -> Form {
        let part = Part::bytes(b"\x89PNG fake".to_vec())
            .file_name(name.to_string())
            .mime_str(mime)
            .expect("mime");
        Form::new().part("file", part)
    }

    async fn wait_for_phase(client: &reqwest::Client, base: &str, phase: &str) -> Value {
        for _ in 0..200 {
            let snapshot: Value = client
                .get(format!("{base}/app/init"))
                .send()
                .await
                .expect("init")
                .json()
                .await
                .expect("init json");
            if snapshot["phase"] == phase {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("phase {phase} never reached");
    }

    #[tokio::test]
    async fn upload_generate_and_record_history() {
        let (_server, base) = start_server(Duration::ZERO, Ok("A fluffy orange cat...".to_string()));
        let client = reqwest::Client::new();

        let selected: Value = client
            .post(format!("{base}/app/select"))
            .multipart(image_form("cat.png", "image/png"))
            .send()
            .await
            .expect("select")
            .json()
            .await
            .expect("select json");
        assert_eq!(selected["phase"], "ready");
        assert_eq!(selected["image_name"], "cat.png");

        let generating: Value = client
            .post(format!("{base}/app/generate"))
            .send()
            .await
            .expect("generate")
            .json()
            .await
            .expect("generate json");
        assert_eq!(generating["phase"], "generating");
        assert_eq!(generating["generation"]["isGenerating"], true);

        let done = wait_for_phase(&client, &base, "succeeded").await;
        assert_eq!(done["generation"]["currentPrompt"], "A fluffy orange cat...");
        assert_eq!(done["history_count"], 1);
        assert!(done["history_html"]
            .as_str()
            .unwrap_or_default()
            .contains("cat.png"));
    }

    #[tokio::test]
    async fn rejects_non_image_upload_and_generate_without_image() {
        let (_server, base) = start_server(Duration::ZERO, Ok("x".to_string()));
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/app/select"))
            .multipart(image_form("notes.txt", "text/plain"))
            .send()
            .await
            .expect("select");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = client
            .post(format!("{base}/app/generate"))
            .send()
            .await
            .expect("generate");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn untyped_upload_with_unknown_extension_names_the_file() {
        let (_server, base) = start_server(Duration::ZERO, Ok("x".to_string()));
        let client = reqwest::Client::new();

        let part = Part::bytes(b"BM fake".to_vec()).file_name("x.bmp".to_string());
        let resp = client
            .post(format!("{base}/app/select"))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .expect("select");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.expect("error json");
        assert_eq!(body["error"], "unsupported file type: x.bmp (images only)");
    }

    #[tokio::test]
    async fn second_generate_conflicts_and_reset_discards_result() {
        let (_server, base) = start_server(Duration::from_millis(300), Ok("late".to_string()));
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/app/select"))
            .multipart(image_form("a.png", "image/png"))
            .send()
            .await
            .expect("select");
        client
            .post(format!("{base}/app/generate"))
            .send()
            .await
            .expect("generate");

        let resp = client
            .post(format!("{base}/app/generate"))
            .send()
            .await
            .expect("second generate");
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let reset: Value = client
            .post(format!("{base}/app/reset"))
            .send()
            .await
            .expect("reset")
            .json()
            .await
            .expect("reset json");
        assert_eq!(reset["phase"], "idle");

        tokio::time::sleep(Duration::from_millis(600)).await;
        let after = wait_for_phase(&client, &base, "idle").await;
        assert_eq!(after["history_count"], 0);
    }

    #[tokio::test]
    async fn clear_history_requires_confirmation() {
        let (_server, base) = start_server(Duration::ZERO, Ok("p".to_string()));
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/app/select"))
            .multipart(image_form("a.png", "image/png"))
            .send()
            .await
            .expect("select");
        client
            .post(format!("{base}/app/generate"))
            .send()
            .await
            .expect("generate");
        wait_for_phase(&client, &base, "succeeded").await;

        let denied: Value = client
            .post(format!("{base}/app/history/clear"))
            .json(&json!({ "confirmed": false }))
            .send()
            .await
            .expect("clear denied")
            .json()
            .await
            .expect("json");
        assert_eq!(denied["history_count"], 1);

        let cleared: Value = client
            .post(format!("{base}/app/history/clear"))
            .json(&json!({ "confirmed": true }))
            .send()
            .await
            .expect("clear")
            .json()
            .await
            .expect("json");
        assert_eq!(cleared["history_count"], 0);
        assert_eq!(cleared["history_html"], "");
    }
}
