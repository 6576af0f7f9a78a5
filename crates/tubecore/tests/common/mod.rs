//! Shared fakes for tubecore integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tubecore::conversion::FfmpegTools;
use tubecore::core::error::{AppError, AppResult};
use tubecore::download::options::DownloadOptions;
use tubecore::download::source::{DownloadOutcome, FormatDescriptor, MediaExtractor, VideoInfo};
use tubecore::engine::FfmpegLocator;
use tubecore::jobs::{JobContext, JobResult};

/// Extractor that "downloads" by writing `<title>.<ext>` in ten progress steps.
pub struct FakeExtractor {
    pub info: Option<VideoInfo>,
    pub ext: String,
    pub step_delay: Duration,
    pub fail_with: Option<String>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn new(title: &str, ext: &str) -> Self {
        Self {
            info: Some(VideoInfo {
                title: Some(title.to_string()),
                ..Default::default()
            }),
            ext: ext.to_string(),
            step_delay: Duration::from_millis(5),
            fail_with: None,
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_heights(mut self, heights: &[u32]) -> Self {
        if let Some(info) = self.info.as_mut() {
            info.formats = heights
                .iter()
                .map(|h| FormatDescriptor {
                    height: Some(*h),
                    vcodec: Some("avc1".to_string()),
                    ext: Some("mp4".to_string()),
                    ..Default::default()
                })
                .collect();
        }
        self
    }

    pub fn unreachable() -> Self {
        let mut fake = Self::new("", "mp4");
        fake.info = None;
        fake
    }

    pub fn seen_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl MediaExtractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    fn probe(&self, url: &str) -> AppResult<VideoInfo> {
        self.urls.lock().unwrap().push(url.to_string());
        self.info
            .clone()
            .ok_or_else(|| AppError::Download("Unable to extract video data".to_string()))
    }

    fn download(&self, url: &str, options: &DownloadOptions, ctx: &JobContext) -> JobResult<DownloadOutcome> {
        self.urls.lock().unwrap().push(url.to_string());
        for step in 1..=10u8 {
            ctx.check_cancelled()?;
            std::thread::sleep(self.step_delay);
            ctx.set_progress(step * 10);
        }
        if let Some(message) = &self.fail_with {
            return Err(AppError::Download(message.clone()).into());
        }
        let title = self
            .info
            .as_ref()
            .and_then(|i| i.title.clone())
            .unwrap_or_else(|| "video".to_string());
        let path = options.output_dir.join(format!("{}.{}", title, self.ext));
        std::fs::write(&path, b"media").map_err(AppError::from)?;
        Ok(DownloadOutcome {
            filepath: Some(path),
            title: Some(title),
            ext: Some(self.ext.clone()),
        })
    }
}

/// ffmpeg that "exists" at a path nobody runs.
pub struct FixedFfmpeg(pub Option<FfmpegTools>);

impl FixedFfmpeg {
    pub fn present() -> Self {
        Self(Some(FfmpegTools {
            ffmpeg: PathBuf::from("/nonexistent/bin/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/bin/ffprobe"),
        }))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl FfmpegLocator for FixedFfmpeg {
    fn locate(&self, _override_path: Option<&str>) -> Option<FfmpegTools> {
        self.0.clone()
    }
}
