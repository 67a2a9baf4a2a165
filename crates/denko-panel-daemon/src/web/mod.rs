//! JSON control API.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use denko_panel_core::{
    preview_strip, Color, Content, Error, FailureKind, JobSnapshot, SendError, MAX_FRAMES,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::state::{AppState, SettingsUpdate};

/// Upper bound for a multipart request of [`MAX_FRAMES`] images.
const UPLOAD_LIMIT: usize = MAX_FRAMES * 2 * 1024 * 1024;

const DEFAULT_PREVIEW_SCALE: u32 = 8;
const MAX_PREVIEW_SCALE: u32 = 32;

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/settings", get(settings_get).post(settings_set))
        .route("/link", get(link_get))
        .route("/preview/text", post(preview_text))
        .route("/preview/images", post(preview_images))
        .route("/send/text", post(send_text))
        .route("/send/images", post(send_images))
        .route("/job", get(job_get))
        .route("/job/cancel", post(job_cancel))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON error body with a status code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::bad_request(e)
    }
}

impl From<SendError> for ApiError {
    fn from(e: SendError) -> Self {
        let status = match e.kind() {
            FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::Busy => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

/// GET /settings - Current panel settings
async fn settings_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.settings())
}

/// POST /settings - Update panel settings
async fn settings_set(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.update_settings(update)?))
}

#[derive(Deserialize)]
struct LinkQuery {
    base: String,
}

/// GET /link?base= - Share link carrying the device address
async fn link_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinkQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let link = state.share_link(&query.base)?;
    Ok(Json(json!({ "link": link })))
}

/// Text content with optional color overrides.
#[derive(Deserialize)]
struct TextRequest {
    text: String,
    #[serde(default)]
    foreground: Option<Color>,
    #[serde(default)]
    background: Option<Color>,
}

#[derive(Deserialize)]
struct PreviewQuery {
    scale: Option<u32>,
}

impl PreviewQuery {
    fn scale(&self) -> u32 {
        self.scale
            .unwrap_or(DEFAULT_PREVIEW_SCALE)
            .clamp(1, MAX_PREVIEW_SCALE)
    }
}

/// Reads every file field of a multipart body, in order.
async fn read_images(mut multipart: Multipart) -> Result<Vec<Vec<u8>>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        files.push(data.to_vec());
    }
    Ok(files)
}

async fn preview(state: &AppState, content: &Content, scale: u32) -> Result<Response, ApiError> {
    let frames = state.render(content).await?;
    let png = preview_strip(&frames, scale)?.encode_png()?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        png,
    )
        .into_response())
}

/// POST /preview/text - Text rendered as a PNG strip
async fn preview_text(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
    Json(request): Json<TextRequest>,
) -> Result<Response, ApiError> {
    let content = state.text_content(request.text, request.foreground, request.background);
    preview(&state, &content, query.scale()).await
}

/// POST /preview/images - Uploaded images rendered as a PNG strip
async fn preview_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let content = Content::Images(read_images(multipart).await?);
    preview(&state, &content, query.scale()).await
}

async fn start(state: &AppState, content: &Content) -> Result<Response, ApiError> {
    match state.start_send(content).await {
        Ok(frames) => Ok((StatusCode::ACCEPTED, Json(json!({ "frames": frames }))).into_response()),
        Err(e) => {
            warn!("Send rejected: {}", e);
            Err(e.into())
        }
    }
}

/// POST /send/text - Start sending text
async fn send_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TextRequest>,
) -> Result<Response, ApiError> {
    let content = state.text_content(request.text, request.foreground, request.background);
    start(&state, &content).await
}

/// POST /send/images - Start sending uploaded images
async fn send_images(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let content = Content::Images(read_images(multipart).await?);
    start(&state, &content).await
}

/// Job snapshot with its percentage.
#[derive(Serialize)]
struct JobStatus {
    #[serde(flatten)]
    snapshot: JobSnapshot,
    percent: u8,
}

impl From<JobSnapshot> for JobStatus {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            percent: snapshot.percent(),
            snapshot,
        }
    }
}

/// GET /job - Current job progress
async fn job_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(JobStatus::from(state.job()))
}

/// POST /job/cancel - Cancel the active job
async fn job_cancel(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    if state.cancel_job() {
        Ok(Json(JobStatus::from(state.job())))
    } else {
        Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: "No active job".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::extract::Path;
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Daemon {
        addr: SocketAddr,
        dir: PathBuf,
    }

    impl Daemon {
        async fn spawn(name: &str) -> Self {
            Self::spawn_with(name, Config::default()).await
        }

        async fn spawn_with(name: &str, config: Config) -> Self {
            let dir = std::env::temp_dir().join(format!("denko-web-{}-{}", name, std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            let config = Config {
                state_dir: dir.to_string_lossy().to_string(),
                ..config
            };
            let state = Arc::new(AppState::new(config).unwrap());
            let app = create_router(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self { addr, dir }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        /// Points the stored settings at `device`.
        async fn use_device(&self, client: &reqwest::Client, device: SocketAddr) {
            let response = client
                .post(self.url("/settings"))
                .json(&json!({ "address": device.to_string(), "preset": 3, "interval_ms": 500 }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
        }

        /// Polls `/job` until the running job has recorded an outcome.
        async fn wait_idle(&self, client: &reqwest::Client) -> Value {
            for _ in 0..250 {
                let job: Value = client
                    .get(self.url("/job"))
                    .send()
                    .await
                    .unwrap()
                    .json()
                    .await
                    .unwrap();
                if job["phase"] == "idle" && !job["last_outcome"].is_null() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("job did not finish");
        }
    }

    impl Drop for Daemon {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    /// Panel endpoints that record what they receive.
    #[derive(Clone, Default)]
    struct Device {
        /// Time each frame upload takes to acknowledge
        delay: Duration,
        frames: Arc<Mutex<Vec<String>>>,
        presets: Arc<Mutex<Vec<(u8, Value)>>>,
    }

    impl Device {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        async fn serve(&self) -> SocketAddr {
            let app = Router::new()
                .route("/presets/:id/frames", post(device_frame))
                .route("/presets/:id", post(device_preset))
                .with_state(self.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            addr
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        fn presets(&self) -> Vec<(u8, Value)> {
            self.presets.lock().unwrap().clone()
        }
    }

    async fn device_frame(
        State(device): State<Device>,
        mut multipart: Multipart,
    ) -> StatusCode {
        let mut index = String::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("frameIndex") {
                index = field.text().await.unwrap();
            } else {
                field.bytes().await.unwrap();
            }
        }
        tokio::time::sleep(device.delay).await;
        device.frames.lock().unwrap().push(index);
        StatusCode::OK
    }

    async fn device_preset(
        State(device): State<Device>,
        Path(id): Path<u8>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        device.presets.lock().unwrap().push((id, body));
        StatusCode::OK
    }

    fn fast() -> Config {
        Config {
            throttle_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let daemon = Daemon::spawn("settings").await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(daemon.url("/settings"))
            .json(&json!({ "address": "10.0.0.7", "preset": 2, "foreground": "#00ff00" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["address"], "10.0.0.7");
        assert_eq!(body["preset"], 2);
        assert_eq!(body["foreground"], "#00ff00");

        let body: Value = client
            .get(daemon.url("/settings"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["interval_ms"], 1000);
        assert_eq!(body["address"], "10.0.0.7");
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let daemon = Daemon::spawn("badsettings").await;
        let response = reqwest::Client::new()
            .post(daemon.url("/settings"))
            .json(&json!({ "loop_count": 21 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_preview_text_returns_strip() {
        let daemon = Daemon::spawn("preview").await;
        let response = reqwest::Client::new()
            .post(daemon.url("/preview/text?scale=2"))
            .json(&json!({ "text": "  AB  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let png = response.bytes().await.unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_send_text_requires_address() {
        let daemon = Daemon::spawn("noaddr").await;
        let response = reqwest::Client::new()
            .post(daemon.url("/send/text"))
            .json(&json!({ "text": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_send_empty_text_rejected() {
        let daemon = Daemon::spawn("empty").await;
        let client = reqwest::Client::new();
        client
            .post(daemon.url("/settings"))
            .json(&json!({ "address": "127.0.0.1:1" }))
            .send()
            .await
            .unwrap();

        let response = client
            .post(daemon.url("/send/text"))
            .json(&json!({ "text": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let job: Value = client
            .get(daemon.url("/job"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(job["phase"], "idle");
        assert_eq!(job["last_outcome"], Value::Null);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_not_found() {
        let daemon = Daemon::spawn("cancel").await;
        let response = reqwest::Client::new()
            .post(daemon.url("/job/cancel"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_link_for_stored_address() {
        let daemon = Daemon::spawn("link").await;
        let client = reqwest::Client::new();
        client
            .post(daemon.url("/settings"))
            .json(&json!({ "address": "192.168.4.1" }))
            .send()
            .await
            .unwrap();

        let body: Value = client
            .get(daemon.url("/link?base=http://panel.local/"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["link"], "http://panel.local/?esp-ip=192.168.4.1");
    }

    #[tokio::test]
    async fn test_preview_scale_is_clamped() {
        let daemon = Daemon::spawn("bigscale").await;
        let response = reqwest::Client::new()
            .post(daemon.url("/preview/text?scale=4294967295"))
            .json(&json!({ "text": "A" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        // IHDR width and height follow the signature and chunk header
        let png = response.bytes().await.unwrap();
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        assert_eq!((width, height), (20 * 32, 20 * 32));
    }

    #[tokio::test]
    async fn test_send_text_completes() {
        let device = Device::slow(Duration::from_millis(100));
        let device_addr = device.serve().await;
        let daemon = Daemon::spawn_with("complete", fast()).await;
        let client = reqwest::Client::new();
        daemon.use_device(&client, device_addr).await;

        let response = client
            .post(daemon.url("/send/text"))
            .json(&json!({ "text": "AB" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["frames"], 2);

        // The first job is still uploading, so a second send is refused.
        let response = client
            .post(daemon.url("/send/text"))
            .json(&json!({ "text": "CD" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 409);

        let job = daemon.wait_idle(&client).await;
        assert_eq!(job["last_outcome"]["status"], "completed");
        assert_eq!(job["last_outcome"]["total"], 2);
        assert_eq!(job["acknowledged"], 2);
        assert_eq!(job["total"], 2);
        assert_eq!(job["percent"], 100);

        assert_eq!(device.frames(), vec!["0", "1"]);
        let presets = device.presets();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].0, 3);
        assert_eq!(presets[0].1["totalFrames"], 2);
        assert_eq!(presets[0].1["interval"], 500);
    }

    #[tokio::test]
    async fn test_cancel_running_send() {
        let device = Device::slow(Duration::from_secs(5));
        let device_addr = device.serve().await;
        let daemon = Daemon::spawn_with("cancelrun", fast()).await;
        let client = reqwest::Client::new();
        daemon.use_device(&client, device_addr).await;

        let response = client
            .post(daemon.url("/send/text"))
            .json(&json!({ "text": "ABC" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);

        let response = client.post(daemon.url("/job/cancel")).send().await.unwrap();
        assert_eq!(response.status(), 200);

        let job = daemon.wait_idle(&client).await;
        assert_eq!(job["last_outcome"]["status"], "cancelled");
        assert_eq!(job["last_outcome"]["acknowledged"], 0);
        assert_eq!(job["last_outcome"]["total"], 3);
        assert!(device.presets().is_empty());

        let response = client.post(daemon.url("/job/cancel")).send().await.unwrap();
        assert_eq!(response.status(), 404);
    }
}
