//! Test utilities for rare-client
//!
//! [`TestServer`] runs any axum router on a loopback port and hands back a
//! client pointed at it. [`MockBackend`] is a router that speaks the backend's
//! HTTP contract with canned model output, so client code can be exercised
//! end to end without the real models.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::types::{LABEL_NORMAL, LABEL_RARE_EVENT, RARE_EVENT_THRESHOLD};
use crate::{DataUri, RareClient, Result};

/// 5x5 red-dot PNG returned by the mock `/generate` endpoint
pub const MOCK_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAUAAAAFCAYAAACNbyblAAAAHElEQVQI12P4//8/w38GIAXDIBKE0DHxgljNBAAO9TXL0Y4OHwAAAABJRU5ErkJggg==";

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: RareClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use rare_client::testing::{MockBackend, TestServer};
    ///
    /// let server = TestServer::start(MockBackend::new().router()).await?;
    /// let health = server.client.health().await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Start a server backed by the given mock
    pub async fn mock(backend: &MockBackend) -> Result<Self> {
        Self::start(backend.router()).await
    }

    /// Create a new test server with custom timeouts
    pub async fn start_with_timeout<S>(
        router: axum::Router<S>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let base_url = format!("http://{}", addr);
        let client = RareClient::with_config(&base_url, timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A loopback URL with nothing listening on it
pub fn unreachable_base_url() -> Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

// =============================================================================
// Mock Backend
// =============================================================================

/// Reference recorded by the mock on upload
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReference {
    pub file_name: String,
    pub size: usize,
    pub caption: String,
}

#[derive(Debug)]
struct MockState {
    device: String,
    similarities: Vec<f64>,
    description: String,
    references: Vec<StoredReference>,
    failures: HashMap<String, (StatusCode, String)>,
    hits: HashMap<String, usize>,
}

/// In-memory stand-in for the detection backend
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<RwLock<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                device: "cpu".to_string(),
                similarities: vec![0.82, 0.41, 0.37, 0.55],
                description: "a close up of a fire burning in the dark".to_string(),
                references: Vec::new(),
                failures: HashMap::new(),
                hits: HashMap::new(),
            })),
        }
    }

    /// Device name reported by `/health`
    pub fn with_device(self, device: &str) -> Self {
        self.state.write().device = device.to_string();
        self
    }

    /// Per-reference similarities returned by `/classify`, cycled if shorter
    /// than the reference set
    pub fn with_similarities(self, similarities: Vec<f64>) -> Self {
        self.state.write().similarities = similarities;
        self
    }

    /// Caption returned by `/describe`
    pub fn with_description(self, description: &str) -> Self {
        self.state.write().description = description.to_string();
        self
    }

    /// Make `path` answer with `status` and `{"detail": detail}`
    pub fn fail_endpoint(&self, path: &str, status: StatusCode, detail: &str) {
        self.state
            .write()
            .failures
            .insert(path.to_string(), (status, detail.to_string()));
    }

    /// Undo [`fail_endpoint`](Self::fail_endpoint)
    pub fn restore_endpoint(&self, path: &str) {
        self.state.write().failures.remove(path);
    }

    /// References stored by the last successful upload
    pub fn references(&self) -> Vec<StoredReference> {
        self.state.read().references.clone()
    }

    /// Number of requests that reached `path`
    pub fn hits(&self, path: &str) -> usize {
        self.state.read().hits.get(path).copied().unwrap_or(0)
    }

    /// Build the axum router serving this mock
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(api_info))
            .route("/health", get(health))
            .route("/upload_references", post(upload_references))
            .route("/classify", post(classify))
            .route("/describe", post(describe))
            .route("/generate", post(generate))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.clone())
    }

    /// Count the request and return the configured failure, if any
    fn enter(&self, path: &str) -> Option<Response> {
        let mut state = self.state.write();
        *state.hits.entry(path.to_string()).or_insert(0) += 1;
        state
            .failures
            .get(path)
            .map(|(status, detail)| detail_response(*status, detail))
    }

    fn classify_current(&self) -> Option<(Vec<f64>, f64)> {
        let state = self.state.read();
        if state.references.is_empty() || state.similarities.is_empty() {
            return None;
        }
        let all: Vec<f64> = state
            .similarities
            .iter()
            .cycle()
            .take(state.references.len())
            .copied()
            .collect();
        let max = all.iter().copied().fold(f64::MIN, f64::max);
        Some((all, max))
    }
}

fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

/// Shape of a request validation failure for a missing form field
fn missing_field(field: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "detail": [{
                "loc": ["body", field],
                "msg": "field required",
                "type": "value_error.missing"
            }]
        })),
    )
        .into_response()
}

#[derive(Default)]
struct ParsedForm {
    files: Vec<(String, usize)>,
    texts: HashMap<String, Vec<String>>,
}

async fn read_form(mut multipart: Multipart) -> std::result::Result<ParsedForm, Response> {
    let mut form = ParsedForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(detail_response(StatusCode::BAD_REQUEST, e.to_string())),
        };

        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| detail_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                form.files.push((file_name, bytes.len()));
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| detail_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                form.texts.entry(name).or_default().push(text);
            }
        }
    }

    Ok(form)
}

async fn api_info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Rare Event Detection API",
        "version": "1.0.0",
        "endpoints": [
            "/upload_references - POST: Upload reference images with captions",
            "/classify - POST: Classify an image as Rare Event or Normal",
            "/describe - POST: Generate description for an image",
            "/generate - POST: Generate synthetic image from caption",
            "/health - GET: Health check"
        ]
    }))
}

async fn health(State(mock): State<MockBackend>) -> Response {
    if let Some(failure) = mock.enter("/health") {
        return failure;
    }
    let state = mock.state.read();
    Json(json!({
        "status": "healthy",
        "device": state.device,
        "models_loaded": {
            "clip": true,
            "blip": true,
            "stable_diffusion": true
        },
        "reference_count": state.references.len()
    }))
    .into_response()
}

async fn upload_references(State(mock): State<MockBackend>, multipart: Multipart) -> Response {
    if let Some(failure) = mock.enter("/upload_references") {
        return failure;
    }
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let captions = form.texts.get("captions").cloned().unwrap_or_default();
    if form.files.is_empty() {
        return missing_field("files");
    }
    if captions.is_empty() {
        return missing_field("captions");
    }
    if form.files.len() != captions.len() {
        return detail_response(
            StatusCode::BAD_REQUEST,
            "Number of files must match number of captions",
        );
    }

    let references: Vec<StoredReference> = form
        .files
        .into_iter()
        .zip(captions)
        .map(|((file_name, size), caption)| StoredReference {
            file_name,
            size,
            caption,
        })
        .collect();
    let count = references.len();
    mock.state.write().references = references;

    Json(json!({
        "status": "success",
        "count": count,
        "message": format!("Successfully uploaded {} reference images", count)
    }))
    .into_response()
}

async fn classify(State(mock): State<MockBackend>, multipart: Multipart) -> Response {
    if let Some(failure) = mock.enter("/classify") {
        return failure;
    }
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    if form.files.is_empty() {
        return missing_field("file");
    }

    let Some((all, max)) = mock.classify_current() else {
        return detail_response(
            StatusCode::BAD_REQUEST,
            "No reference images uploaded. Please upload references first.",
        );
    };

    let label = if max > RARE_EVENT_THRESHOLD {
        LABEL_RARE_EVENT
    } else {
        LABEL_NORMAL
    };

    Json(json!({
        "label": label,
        "similarity": max,
        "all_similarities": all
    }))
    .into_response()
}

async fn describe(State(mock): State<MockBackend>, multipart: Multipart) -> Response {
    if let Some(failure) = mock.enter("/describe") {
        return failure;
    }
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    if form.files.is_empty() {
        return missing_field("file");
    }

    let description = mock.state.read().description.clone();
    Json(json!({ "description": description })).into_response()
}

async fn generate(State(mock): State<MockBackend>, multipart: Multipart) -> Response {
    if let Some(failure) = mock.enter("/generate") {
        return failure;
    }
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let Some(caption) = form.texts.get("caption").and_then(|c| c.first()).cloned() else {
        return missing_field("caption");
    };

    Json(json!({
        "image": format!("data:image/png;base64,{}", MOCK_PNG_BASE64),
        "caption": caption
    }))
    .into_response()
}

/// Decoded bytes of [`MOCK_PNG_BASE64`]
pub fn mock_png() -> Vec<u8> {
    DataUri::parse(&format!("data:image/png;base64,{}", MOCK_PNG_BASE64))
        .map(|uri| uri.data)
        .unwrap_or_default()
}
