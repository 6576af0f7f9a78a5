//! Fakes for driving the API without yt-dlp or ffmpeg

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tubecore::conversion::FfmpegTools;
use tubecore::core::error::{AppError, AppResult};
use tubecore::core::session::SessionRegistry;
use tubecore::download::options::DownloadOptions;
use tubecore::download::source::{DownloadOutcome, FormatDescriptor, MediaExtractor, VideoInfo};
use tubecore::download::MetadataResolver;
use tubecore::jobs::{JobContext, JobResult};
use tubecore::{Engine, FfmpegLocator};
use tubegrab::web_server::{create_router, AppState};

/// Address nothing listens on, so title lookups fail fast.
pub const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

/// Writes `<title>.<ext>` after ten progress steps.
pub struct FakeExtractor {
    pub title: String,
    pub ext: String,
    pub heights: Vec<u32>,
    pub step_delay: Duration,
}

impl FakeExtractor {
    pub fn new(title: &str, ext: &str) -> Self {
        Self {
            title: title.to_string(),
            ext: ext.to_string(),
            heights: vec![1080, 720, 480],
            step_delay: Duration::from_millis(5),
        }
    }
}

impl MediaExtractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    fn probe(&self, _url: &str) -> AppResult<VideoInfo> {
        Ok(VideoInfo {
            title: Some(self.title.clone()),
            thumbnail: Some("https://i.example/thumb.jpg".to_string()),
            formats: self
                .heights
                .iter()
                .map(|h| FormatDescriptor {
                    height: Some(*h),
                    vcodec: Some("avc1".to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
    }

    fn download(&self, _url: &str, options: &DownloadOptions, ctx: &JobContext) -> JobResult<DownloadOutcome> {
        for step in 1..=10u8 {
            ctx.check_cancelled()?;
            std::thread::sleep(self.step_delay);
            ctx.set_progress(step * 10);
        }
        let path = options.output_dir.join(format!("{}.{}", self.title, self.ext));
        std::fs::write(&path, b"media").map_err(AppError::from)?;
        Ok(DownloadOutcome {
            filepath: Some(path),
            title: Some(self.title.clone()),
            ext: Some(self.ext.clone()),
        })
    }
}

/// Reports an ffmpeg that is never executed.
pub struct FixedFfmpeg;

impl FfmpegLocator for FixedFfmpeg {
    fn locate(&self, _override_path: Option<&str>) -> Option<FfmpegTools> {
        Some(FfmpegTools {
            ffmpeg: PathBuf::from("/nonexistent/bin/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/bin/ffprobe"),
        })
    }
}

pub fn engine(extractor: FakeExtractor, sessions_root: &Path) -> Engine {
    let extractor: Arc<dyn MediaExtractor> = Arc::new(extractor);
    let metadata = MetadataResolver::new(Arc::clone(&extractor))
        .unwrap()
        .with_oembed_endpoint(format!("{}/oembed", DEAD_ENDPOINT));
    Engine::new(extractor, Arc::new(FixedFfmpeg), SessionRegistry::new(sessions_root))
        .unwrap()
        .with_metadata(metadata)
}

/// Serves the API on an ephemeral port and returns its base URL.
pub async fn spawn_server(engine: Engine) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(AppState::new(engine));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// JSON payloads of the `data:` frames in an event-stream body.
pub fn frames(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter_map(|chunk| chunk.lines().find_map(|line| line.strip_prefix("data:").map(str::trim_start)))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}
