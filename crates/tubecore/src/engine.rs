//! Job entry points shared by the CLI and the HTTP API
//!
//! Each `start_*` call validates the request, resolves ffmpeg and creates a
//! session directory before anything touches the network. Only then is the
//! worker spawned. A failed or cancelled job deletes its session; a
//! successful one is kept for retrieval until the sweeper expires it.

use std::sync::Arc;

use crate::conversion::{resolve_ffmpeg, FfmpegTools, FFMPEG_NOT_FOUND};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::session::{Session, SessionKind, SessionRegistry};
use crate::core::url::VideoRef;
use crate::core::validation::{require_url, validate_interval};
use crate::download::audio::{download_audio, AudioArtifact, AudioRequest};
use crate::download::metadata::{MetadataResolver, VideoDetails};
use crate::download::source::MediaExtractor;
use crate::download::video::{download_video, VideoArtifact, VideoRequest};
use crate::download::ytdlp::YtDlp;
use crate::jobs::{spawn_job, JobContext, JobResult, RunningJob};
use crate::screenshots::{extract_screenshots, DecodeSampler, ScreenshotArtifact, ScreenshotRequest, StreamSampler};

/// Finds ffmpeg for a job.
pub trait FfmpegLocator: Send + Sync {
    /// `override_path` comes from the request; `None` means use the default lookup.
    fn locate(&self, override_path: Option<&str>) -> Option<FfmpegTools>;
}

/// Request override, then `FFMPEG_PATH`, then `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFfmpeg;

impl FfmpegLocator for SystemFfmpeg {
    fn locate(&self, override_path: Option<&str>) -> Option<FfmpegTools> {
        let override_path = override_path
            .filter(|p| !p.trim().is_empty())
            .or(config::FFMPEG_PATH.as_deref());
        resolve_ffmpeg(override_path)
    }
}

/// A job result together with the session directory that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutput<T> {
    pub session: Session,
    pub artifact: T,
}

/// Orchestration entry point.
#[derive(Clone)]
pub struct Engine {
    extractor: Arc<dyn MediaExtractor>,
    ffmpeg: Arc<dyn FfmpegLocator>,
    sessions: SessionRegistry,
    metadata: MetadataResolver,
}

impl Engine {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        ffmpeg: Arc<dyn FfmpegLocator>,
        sessions: SessionRegistry,
    ) -> AppResult<Self> {
        let metadata = MetadataResolver::new(Arc::clone(&extractor))?;
        Ok(Self {
            extractor,
            ffmpeg,
            sessions,
            metadata,
        })
    }

    /// yt-dlp, system ffmpeg and sessions under `TEMP_FILES_DIR`.
    pub fn from_env() -> AppResult<Self> {
        Self::new(
            Arc::new(YtDlp::new()),
            Arc::new(SystemFfmpeg),
            SessionRegistry::new(config::TEMP_FILES_DIR.clone()),
        )
    }

    /// Replaces the metadata resolver (tests point it at local servers).
    pub fn with_metadata(mut self, metadata: MetadataResolver) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn extractor(&self) -> Arc<dyn MediaExtractor> {
        Arc::clone(&self.extractor)
    }

    /// Title, thumbnail and heights for the header and resolution pickers.
    pub async fn video_details(&self, url: &str) -> AppResult<VideoDetails> {
        let url = require_url(url)?;
        Ok(self.metadata.resolve(url).await)
    }

    pub fn require_ffmpeg(&self, override_path: Option<&str>) -> AppResult<FfmpegTools> {
        self.ffmpeg
            .locate(override_path)
            .ok_or_else(|| AppError::MissingDependency(FFMPEG_NOT_FOUND.to_string()))
    }

    pub fn start_video(
        &self,
        mut request: VideoRequest,
        ffmpeg_override: Option<&str>,
    ) -> AppResult<RunningJob<SessionOutput<VideoArtifact>>> {
        request.url = video_ref(&request.url)?.url;
        let tools = self.require_ffmpeg(ffmpeg_override)?;
        let extractor = self.extractor();
        self.run_in_session(SessionKind::Video, move |session, ctx| {
            download_video(&request, extractor.as_ref(), &tools, &session.dir, ctx)
        })
    }

    pub fn start_audio(
        &self,
        mut request: AudioRequest,
        ffmpeg_override: Option<&str>,
    ) -> AppResult<RunningJob<SessionOutput<AudioArtifact>>> {
        request.url = video_ref(&request.url)?.url;
        let tools = self.require_ffmpeg(ffmpeg_override)?;
        let extractor = self.extractor();
        self.run_in_session(SessionKind::Audio, move |session, ctx| {
            download_audio(&request, extractor.as_ref(), &tools, &session.dir, ctx)
        })
    }

    pub fn start_screenshots(
        &self,
        mut request: ScreenshotRequest,
        ffmpeg_override: Option<&str>,
    ) -> AppResult<RunningJob<SessionOutput<ScreenshotArtifact>>> {
        request.url = video_ref(&request.url)?.url;
        request.interval = validate_interval(request.interval)?;
        let tools = self.require_ffmpeg(ffmpeg_override)?;
        let fast = StreamSampler::new(self.extractor(), tools.clone());
        let precise = DecodeSampler::new(self.extractor(), tools);
        self.run_in_session(SessionKind::Screenshots, move |session, ctx| {
            extract_screenshots(&request, Some(&fast), &precise, &session.dir, ctx)
        })
    }

    /// Creates a session and runs `work` in it as a job.
    fn run_in_session<T, F>(&self, kind: SessionKind, work: F) -> AppResult<RunningJob<SessionOutput<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&Session, &JobContext) -> JobResult<T> + Send + 'static,
    {
        let session = self.sessions.create(kind)?;
        let registry = self.sessions.clone();
        let job = spawn_job(move |ctx| match work(&session, &ctx) {
            Ok(artifact) => {
                registry.finish(session.id);
                Ok(SessionOutput { session, artifact })
            }
            Err(e) => {
                registry.discard(session.id);
                Err(e)
            }
        });
        log::info!("Job {} started ({:?})", job.id(), kind);
        Ok(job)
    }
}

/// Rejects blank links and canonicalizes the rest.
fn video_ref(url: &str) -> AppResult<VideoRef> {
    let video = VideoRef::new(require_url(url)?);
    match &video.id {
        Some(id) => log::debug!("Resolved video id {}", id),
        None => log::debug!("No video id in {}, passing the link through", video.url),
    }
    Ok(video)
}
