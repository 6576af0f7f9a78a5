//! Extraction backend abstraction.
//!
//! Provides the `MediaExtractor` trait the orchestrators talk to. The only
//! production backend is yt-dlp ([`crate::download::ytdlp::YtDlp`]); tests
//! substitute in-memory fakes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::error::AppResult;
use crate::download::options::DownloadOptions;
use crate::jobs::{JobContext, JobResult};

/// One retrievable stream variant reported by a probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatDescriptor {
    pub format_id: Option<String>,
    pub height: Option<u32>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub protocol: Option<String>,
    pub url: Option<String>,
}

impl FormatDescriptor {
    /// True when the variant carries a video stream.
    pub fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(codec) if codec != "none")
    }

    /// Plain HTTP(S) MP4/WebM, which ffmpeg can read without manifest handling.
    pub fn is_plain_http(&self) -> bool {
        matches!(self.protocol.as_deref(), Some("https") | Some("http"))
            && matches!(self.ext.as_deref(), Some("mp4") | Some("webm"))
    }

    /// Sort key for stream sampling, lower is better.
    ///
    /// Tallest height within the ceiling wins; heights above it rank last.
    /// Ties prefer plain HTTP(S) transports.
    pub fn stream_score(&self, ceiling: Option<u32>) -> (i64, u8) {
        let height = i64::from(self.height.unwrap_or(0));
        let within = match ceiling {
            None => true,
            Some(max) => height <= i64::from(max),
        };
        let height_rank = if within { -height } else { 1_000_000 };
        let transport_penalty = if self.is_plain_http() { 0 } else { 1 };
        (height_rank, transport_penalty)
    }
}

/// Metadata-only probe result (no media downloaded).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub formats: Vec<FormatDescriptor>,
    pub http_headers: BTreeMap<String, String>,
}

impl VideoInfo {
    /// Distinct heights of video-bearing formats, tallest first.
    pub fn available_heights(&self) -> Vec<u32> {
        let mut heights: Vec<u32> = self
            .formats
            .iter()
            .filter(|f| f.has_video())
            .filter_map(|f| f.height)
            .filter(|h| *h > 0)
            .collect();
        heights.sort_unstable_by(|a, b| b.cmp(a));
        heights.dedup();
        heights
    }

    /// Best stream for direct frame sampling under a height ceiling.
    pub fn pick_stream(&self, ceiling: Option<u32>) -> Option<&FormatDescriptor> {
        self.formats
            .iter()
            .filter(|f| f.has_video())
            .min_by_key(|f| f.stream_score(ceiling))
    }
}

/// What a finished download run reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOutcome {
    pub filepath: Option<PathBuf>,
    pub title: Option<String>,
    pub ext: Option<String>,
}

impl DownloadOutcome {
    /// The reported file if it exists, else the first file in `dir` whose name
    /// starts with `stem` and ends with `.ext`.
    pub fn locate(&self, dir: &Path, stem: &str, ext: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = self.filepath.as_ref().filter(|p| p.exists()) {
            return Some(path.clone());
        }
        find_downloaded_file(dir, stem, ext)
    }
}

/// Containers the downloader can leave behind as the main output.
pub const MEDIA_EXTENSIONS: [&str; 11] = ["mp4", "mkv", "webm", "mov", "m4a", "opus", "ogg", "mp3", "wav", "flac", "aac"];

/// Scans `dir` for a file produced by the downloader.
///
/// Without an explicit `ext` only [`MEDIA_EXTENSIONS`] match, so subtitle,
/// thumbnail and info-JSON sidecars are never mistaken for the download.
pub fn find_downloaded_file(dir: &Path, stem: &str, ext: Option<&str>) -> Option<PathBuf> {
    let stem = stem.to_lowercase();
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
            let ext_ok = match ext {
                Some(ext) => name.ends_with(&format!(".{}", ext.to_lowercase())),
                None => name
                    .rsplit_once('.')
                    .is_some_and(|(_, e)| MEDIA_EXTENSIONS.contains(&e)),
            };
            name.starts_with(&stem) && ext_ok
        })
        .collect();
    matches.sort();
    matches.pop()
}

/// Extraction backend used by every orchestrator.
///
/// Both methods block; they are called from job workers or through
/// `spawn_blocking`.
pub trait MediaExtractor: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Metadata-only lookup.
    fn probe(&self, url: &str) -> AppResult<VideoInfo>;

    /// Downloads according to `options`, updating `ctx` progress and stopping
    /// with [`crate::jobs::JobError::Cancelled`] once `ctx` is cancelled.
    fn download(&self, url: &str, options: &DownloadOptions, ctx: &JobContext) -> JobResult<DownloadOutcome>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory extractor for orchestrator tests.

    use super::*;
    use crate::core::error::AppError;
    use std::sync::Mutex;

    /// Writes `<title>.<ext>` into the output dir, reporting a few progress steps.
    pub struct FakeExtractor {
        pub info: VideoInfo,
        pub ext: String,
        pub fail_with: Option<String>,
        pub report_path: bool,
        pub calls: Mutex<Vec<DownloadOptions>>,
    }

    impl FakeExtractor {
        pub fn new(title: &str, ext: &str) -> Self {
            Self {
                info: VideoInfo {
                    title: Some(title.to_string()),
                    ..Default::default()
                },
                ext: ext.to_string(),
                fail_with: None,
                report_path: true,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MediaExtractor for FakeExtractor {
        fn name(&self) -> &str {
            "fake"
        }

        fn probe(&self, _url: &str) -> AppResult<VideoInfo> {
            Ok(self.info.clone())
        }

        fn download(&self, _url: &str, options: &DownloadOptions, ctx: &JobContext) -> JobResult<DownloadOutcome> {
            self.calls.lock().unwrap().push(options.clone());
            for pct in [10u8, 50, 90] {
                ctx.check_cancelled()?;
                ctx.set_progress(pct);
            }
            if let Some(message) = &self.fail_with {
                return Err(AppError::Download(message.clone()).into());
            }
            let title = self.info.title.clone().unwrap_or_default();
            let path = options.output_dir.join(format!("{}.{}", title, self.ext));
            std::fs::write(&path, b"media").map_err(AppError::from)?;
            Ok(DownloadOutcome {
                filepath: self.report_path.then_some(path),
                title: Some(title),
                ext: Some(self.ext.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn format(height: u32, ext: &str, protocol: &str) -> FormatDescriptor {
        FormatDescriptor {
            format_id: Some(format!("{}-{}-{}", height, ext, protocol)),
            height: Some(height),
            ext: Some(ext.to_string()),
            vcodec: Some("avc1".to_string()),
            acodec: Some("none".to_string()),
            protocol: Some(protocol.to_string()),
            url: Some(format!("https://cdn.example/{}", height)),
        }
    }

    fn audio_only() -> FormatDescriptor {
        FormatDescriptor {
            ext: Some("m4a".to_string()),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a".to_string()),
            protocol: Some("https".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_available_heights() {
        let info = VideoInfo {
            formats: vec![
                format(720, "mp4", "https"),
                format(1080, "webm", "https"),
                format(480, "mp4", "m3u8_native"),
                format(1080, "mp4", "https"),
                audio_only(),
                FormatDescriptor {
                    vcodec: Some("avc1".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(info.available_heights(), vec![1080, 720, 480]);
    }

    #[test]
    fn test_pick_stream_respects_ceiling() {
        let info = VideoInfo {
            formats: vec![
                format(2160, "webm", "https"),
                format(1080, "mp4", "m3u8_native"),
                format(1080, "mp4", "https"),
                format(720, "mp4", "https"),
                audio_only(),
            ],
            ..Default::default()
        };

        let best = info.pick_stream(None).unwrap();
        assert_eq!(best.height, Some(2160));

        let capped = info.pick_stream(Some(1080)).unwrap();
        assert_eq!(capped.height, Some(1080));
        assert_eq!(capped.protocol.as_deref(), Some("https"));

        let below_all = info.pick_stream(Some(360)).unwrap();
        assert!(below_all.has_video());
    }

    #[test]
    fn test_pick_stream_without_video() {
        let info = VideoInfo {
            formats: vec![audio_only()],
            ..Default::default()
        };
        assert!(info.pick_stream(None).is_none());
    }

    #[test]
    fn test_video_info_parses_ytdlp_json() {
        let json = r#"{
            "id": "abc123",
            "title": "Sample Video",
            "thumbnail": "https://i.ytimg.com/vi/abc123/maxresdefault.jpg",
            "duration": 212.0,
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "protocol": "https", "height": null},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "protocol": "https", "height": 1080, "fps": 30}
            ],
            "http_headers": {"User-Agent": "Mozilla/5.0", "Accept": "*/*"},
            "extra": {"ignored": true}
        }"#;

        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title.as_deref(), Some("Sample Video"));
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.available_heights(), vec![1080]);
        assert_eq!(info.http_headers.get("Accept").map(String::as_str), Some("*/*"));
    }

    #[test]
    fn test_find_downloaded_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song Title.webm.part"), b"").unwrap();
        std::fs::write(dir.path().join("Song Title.info.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("Song Title.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("Other.mp3"), b"x").unwrap();

        let found = find_downloaded_file(dir.path(), "song title", Some("mp3")).unwrap();
        assert_eq!(found.file_name().unwrap(), "Song Title.mp3");

        let any = find_downloaded_file(dir.path(), "Song Title", None).unwrap();
        assert_eq!(any.file_name().unwrap(), "Song Title.mp3");

        assert!(find_downloaded_file(dir.path(), "missing", None).is_none());
    }

    #[test]
    fn test_unreported_path_skips_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        for sidecar in ["Clip.en.srt", "Clip.webp", "Clip.info.json", "Clip.mkv.part"] {
            std::fs::write(dir.path().join(sidecar), b"x").unwrap();
        }
        let outcome = DownloadOutcome::default();
        assert_eq!(outcome.locate(dir.path(), "", None), None);

        std::fs::write(dir.path().join("Clip.webm"), b"x").unwrap();
        let found = outcome.locate(dir.path(), "", None).unwrap();
        assert_eq!(found.file_name().unwrap(), "Clip.webm");
    }
}
