//! HTTP API
//!
//! JSON endpoints for metadata, streamed job endpoints for video, audio and
//! screenshots, and file retrieval from finished sessions.
//!
//! Job endpoints answer with `text/event-stream` bodies made of
//! `data: <json>\n\n` frames. The first frame carries the `job_id` that
//! `POST /api/jobs/{id}/cancel` accepts. Dropping the connection cancels the job.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use tubecore::core::config;
use tubecore::core::error::{AppError, AppResult};
use tubecore::core::utils::expand_folder;
use tubecore::download::options::{AudioMode, Container, PostProcessing, QualityPreset};
use tubecore::download::{AudioArtifact, AudioRequest, VideoArtifact, VideoRequest};
use tubecore::screenshots::{ScreenshotArtifact, ScreenshotRequest};
use tubecore::{Engine, JobEvent, JobOutcome, RunningJob, SessionOutput};

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// Shared state for the API.
#[derive(Clone)]
pub struct AppState {
    engine: Engine,
    /// Cancellation tokens of jobs whose stream is still open
    jobs: Arc<DashMap<Uuid, CancellationToken>>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            jobs: Arc::new(DashMap::new()),
        }
    }
}

// ============================================================================
// Request models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UrlBody {
    #[serde(default)]
    pub url: String,
}

/// Shared by the three job endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommonOptions {
    pub ffmpeg_path: Option<String>,
    pub save_to_folder: bool,
    pub user_folder: Option<String>,
    pub use_aria2c: bool,
    pub archive_enable: bool,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub write_subs: bool,
    pub embed_subs: bool,
    pub split_chapters: bool,
    pub write_info_json: bool,
}

impl CommonOptions {
    /// Copy destination, `None` unless `save_to_folder` is set.
    fn save_folder(&self) -> Option<PathBuf> {
        if !self.save_to_folder {
            return None;
        }
        let folder = self
            .user_folder
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(config::DOWNLOAD_FOLDER.as_str());
        Some(expand_folder(folder))
    }

    fn post(&self) -> PostProcessing {
        PostProcessing {
            embed_metadata: self.embed_metadata,
            embed_thumbnail: self.embed_thumbnail,
            write_subtitles: self.write_subs,
            embed_subtitles: self.embed_subs,
            split_chapters: self.split_chapters,
            write_info_json: self.write_info_json,
        }
    }

    fn ffmpeg_override(&self) -> Option<String> {
        self.ffmpeg_path.clone().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenshotsBody {
    pub url: String,
    pub image_res_label: String,
    pub interval: f64,
    pub mode_fast: bool,
    /// Accepted for compatibility, screenshots always use a progressive MP4
    pub quality_preset: String,
    pub container_pref: String,
    #[serde(flatten)]
    pub common: CommonOptions,
}

impl Default for ScreenshotsBody {
    fn default() -> Self {
        Self {
            url: String::new(),
            image_res_label: "Best available".to_string(),
            interval: 10.0,
            mode_fast: false,
            quality_preset: QualityPreset::default().to_string(),
            container_pref: Container::default().to_string(),
            common: CommonOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioBody {
    pub url: String,
    pub audio_mode: String,
    pub bitrate_label: String,
    #[serde(flatten)]
    pub common: CommonOptions,
}

impl Default for AudioBody {
    fn default() -> Self {
        Self {
            url: String::new(),
            audio_mode: AudioMode::ORIGINAL_LABEL.to_string(),
            bitrate_label: "320 kbps".to_string(),
            common: CommonOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoBody {
    pub url: String,
    pub video_res_label: String,
    pub quality_preset: String,
    pub container_pref: String,
    #[serde(flatten)]
    pub common: CommonOptions,
}

impl Default for VideoBody {
    fn default() -> Self {
        Self {
            url: String::new(),
            video_res_label: "Best available (MP4)".to_string(),
            quality_preset: QualityPreset::default().to_string(),
            container_pref: Container::default().to_string(),
            common: CommonOptions::default(),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Builds the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/video-info", post(video_info_handler))
        .route("/api/resolutions", post(resolutions_handler))
        .route("/api/header", post(header_handler))
        .route("/api/screenshots", post(screenshots_handler))
        .route("/api/audio", post(audio_handler))
        .route("/api/video", post(video_handler))
        .route("/api/jobs/{id}/cancel", post(cancel_handler))
        .route("/api/download/{filename}", get(download_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP API and serve until Ctrl-C.
pub async fn start_web_server(port: u16, engine: Engine) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let sessions = engine.sessions().clone();
    let sweeper = sessions.spawn_sweeper(config::session::ttl(), config::session::sweep_interval());
    let app = create_router(AppState::new(engine));

    log::info!("Starting API server on http://{}", addr);
    log::info!("  POST /api/video-info             - Title, thumbnail, resolutions");
    log::info!("  POST /api/screenshots            - Screenshot job (event stream)");
    log::info!("  POST /api/audio                  - Audio job (event stream)");
    log::info!("  POST /api/video                  - Video job (event stream)");
    log::info!("  POST /api/jobs/{{id}}/cancel       - Cancel a running job");
    log::info!("  GET  /api/download/{{filename}}    - Fetch a finished file");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown requested");
        })
        .await?;

    sweeper.abort();
    sessions.discard_all();
    Ok(())
}

// ============================================================================
// JSON endpoints
// ============================================================================

/// GET /
async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "tubegrab API",
        "status": "running",
    }))
}

/// GET /api/health
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

/// POST /api/video-info
async fn video_info_handler(State(state): State<AppState>, Json(body): Json<UrlBody>) -> Json<Value> {
    match state.engine.video_details(&body.url).await {
        Ok(details) => Json(json!({
            "success": true,
            "title": details.title,
            "thumbnail": details.thumbnail.clone().unwrap_or_default(),
            "videoResolutions": details.video_labels(),
            "imageResolutions": details.image_labels(),
        })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

/// POST /api/resolutions
async fn resolutions_handler(State(state): State<AppState>, Json(body): Json<UrlBody>) -> Response {
    match state.engine.video_details(&body.url).await {
        Ok(details) => Json(json!({
            "videoResolutions": details.video_labels(),
            "imageResolutions": details.image_labels(),
        }))
        .into_response(),
        Err(e) => bad_request(e),
    }
}

/// POST /api/header
async fn header_handler(State(state): State<AppState>, Json(body): Json<UrlBody>) -> Response {
    match state.engine.video_details(&body.url).await {
        Ok(details) => Json(json!({
            "title": details.title,
            "thumbnail": details.thumbnail.unwrap_or_default(),
        }))
        .into_response(),
        Err(e) => bad_request(e),
    }
}

fn bad_request(e: AppError) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
}

/// POST /api/jobs/{id}/cancel
async fn cancel_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let token = Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.jobs.get(&id).map(|t| t.value().clone()));
    match token {
        Some(token) => {
            log::info!("Cancel requested for job {}", id);
            token.cancel();
            Json(json!({ "job_id": id, "cancelled": true })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Job not found" }))).into_response(),
    }
}

/// GET /api/download/{filename}
async fn download_handler(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let Some(path) = state.engine.sessions().find_file(&filename) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "File not found" }))).into_response();
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            log::error!("Failed to open {}: {}", path.display(), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": e.to_string() }))).into_response();
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', "_"));
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

// ============================================================================
// Streamed job endpoints
// ============================================================================

/// POST /api/screenshots
async fn screenshots_handler(State(state): State<AppState>, Json(body): Json<ScreenshotsBody>) -> Response {
    let mut request = ScreenshotRequest::new(body.url.clone(), body.interval).with_resolution_label(&body.image_res_label);
    request.fast = body.mode_fast;
    request.use_aria2c = body.common.use_aria2c;
    request.save_folder = body.common.save_folder();
    let ffmpeg = body.common.ffmpeg_override();

    let engine = state.engine.clone();
    let started = start_blocking(move || engine.start_screenshots(request, ffmpeg.as_deref())).await;
    respond(&state, started, screenshots_complete)
}

/// POST /api/audio
async fn audio_handler(State(state): State<AppState>, Json(body): Json<AudioBody>) -> Response {
    let mode = match AudioMode::from_labels(&body.audio_mode, &body.bitrate_label) {
        Ok(mode) => mode,
        Err(e) => return error_stream(AppError::from(e)).into_response(),
    };
    let mut request = AudioRequest::new(body.url.clone(), mode);
    request.post = body.common.post();
    request.use_aria2c = body.common.use_aria2c;
    request.use_archive = body.common.archive_enable;
    request.save_folder = body.common.save_folder();
    let ffmpeg = body.common.ffmpeg_override();

    let engine = state.engine.clone();
    let started = start_blocking(move || engine.start_audio(request, ffmpeg.as_deref())).await;
    respond(&state, started, audio_complete)
}

/// POST /api/video
async fn video_handler(State(state): State<AppState>, Json(body): Json<VideoBody>) -> Response {
    let mut request = VideoRequest::new(body.url.clone()).with_resolution_label(&body.video_res_label);
    request.container = Container::from_label(&body.container_pref);
    request.quality = QualityPreset::from_label(&body.quality_preset);
    request.post = body.common.post();
    request.use_aria2c = body.common.use_aria2c;
    request.use_archive = body.common.archive_enable;
    request.save_folder = body.common.save_folder();
    let ffmpeg = body.common.ffmpeg_override();

    let engine = state.engine.clone();
    let started = start_blocking(move || engine.start_video(request, ffmpeg.as_deref())).await;
    respond(&state, started, video_complete)
}

/// Runs a job constructor off the async threads (ffmpeg lookup spawns processes).
async fn start_blocking<T, F>(start: F) -> AppResult<RunningJob<T>>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<RunningJob<T>> + Send + 'static,
{
    tokio::task::spawn_blocking(start)
        .await
        .unwrap_or_else(|e| Err(AppError::Anyhow(anyhow::anyhow!("Job start panicked: {}", e))))
}

fn respond<T, F>(state: &AppState, started: AppResult<RunningJob<T>>, complete: F) -> Response
where
    T: Send + 'static,
    F: Fn(&T) -> Value + Send + 'static,
{
    match started {
        Ok(job) => Sse::new(job_stream(state, job, complete)).keep_alive(KeepAlive::default()).into_response(),
        Err(e) => error_stream(e).into_response(),
    }
}

fn error_stream(e: AppError) -> Sse<EventStream> {
    log::warn!("Job rejected: {}", e);
    let frame = json!({ "error": e.to_string() });
    Sse::new(stream::once(async move { Ok(Event::default().data(frame.to_string())) }).boxed())
}

/// Unregisters the job when its stream ends and cancels it if the client went away.
struct JobGuard {
    id: Uuid,
    jobs: Arc<DashMap<Uuid, CancellationToken>>,
    finished: bool,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if let Some((_, token)) = self.jobs.remove(&self.id) {
            if !self.finished {
                log::info!("Client disconnected, cancelling job {}", self.id);
                token.cancel();
            }
        }
    }
}

struct StreamState<T, F> {
    job: RunningJob<T>,
    guard: JobGuard,
    complete: F,
    first: bool,
}

fn job_stream<T, F>(state: &AppState, job: RunningJob<T>, complete: F) -> EventStream
where
    T: Send + 'static,
    F: Fn(&T) -> Value + Send + 'static,
{
    let id = job.id();
    state.jobs.insert(id, job.cancel_token());
    let initial = StreamState {
        job,
        guard: JobGuard {
            id,
            jobs: Arc::clone(&state.jobs),
            finished: false,
        },
        complete,
        first: true,
    };

    stream::unfold(Some(initial), |current| async move {
        let mut current = current?;
        let event = current.job.next_event().await?;

        let mut frame = match &event {
            JobEvent::Finished(outcome) => {
                current.guard.finished = true;
                terminal_frame(outcome, &current.complete)
            }
            other => progress_frame(other),
        };
        if current.first {
            current.first = false;
            frame["job_id"] = json!(current.guard.id.to_string());
        }

        let next = match event {
            JobEvent::Finished(_) => None,
            _ => Some(current),
        };
        Some((Ok(Event::default().data(frame.to_string())), next))
    })
    .boxed()
}

fn path_strings(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.to_string_lossy().to_string()).collect()
}

fn progress_frame<T>(event: &JobEvent<T>) -> Value {
    match event {
        JobEvent::Progress { percent, status } => json!({ "status": status, "progress": percent }),
        JobEvent::Frames { percent, status, images } => json!({
            "status": status,
            "progress": percent,
            "images": path_strings(images),
        }),
        JobEvent::Finished(_) => json!({}),
    }
}

fn terminal_frame<T, F>(outcome: &JobOutcome<T>, complete: &F) -> Value
where
    F: Fn(&T) -> Value,
{
    match outcome {
        JobOutcome::Succeeded(output) => complete(output),
        JobOutcome::Cancelled => json!({ "status": "Cancelled.", "cancelled": true }),
        JobOutcome::Errored(message) => json!({ "error": message }),
    }
}

/// `/api/download/<name>` for a file in a session directory.
pub fn download_url(file: &FsPath) -> String {
    let name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    format!("/api/download/{}", urlencoding::encode(&name))
}

fn screenshots_complete(output: &SessionOutput<ScreenshotArtifact>) -> Value {
    let artifact = &output.artifact;
    json!({
        "status": artifact.summary,
        "progress": 100,
        "complete": true,
        "images": path_strings(&artifact.frames),
        "zip_file": artifact.zip.to_string_lossy(),
        "download_url": download_url(&artifact.zip),
    })
}

fn audio_complete(output: &SessionOutput<AudioArtifact>) -> Value {
    let artifact = &output.artifact;
    json!({
        "status": artifact.summary,
        "progress": 100,
        "complete": true,
        "audio_file": artifact.file.to_string_lossy(),
        "download_url": download_url(&artifact.file),
        "preview_file": artifact.preview.to_string_lossy(),
        "preview_url": download_url(&artifact.preview),
    })
}

fn video_complete(output: &SessionOutput<VideoArtifact>) -> Value {
    let artifact = &output.artifact;
    json!({
        "status": artifact.summary,
        "progress": 100,
        "complete": true,
        "video_file": artifact.file.to_string_lossy(),
        "download_url": download_url(&artifact.file),
    })
}
