//! Video download orchestration
//!
//! Runs one yt-dlp video download into a session directory and renames the
//! result to `<title>-<resolution>-<timestamp>.<container>`.

use std::path::{Path, PathBuf};

use crate::conversion::FfmpegTools;
use crate::core::error::AppError;
use crate::core::utils::{copy_into_folder, move_file, now_tag, safe_name, safe_title, unique_path};
use crate::download::options::{
    archive_path, height_label, parse_height_from_label, Container, DownloadOptionsBuilder, MediaSelection,
    PostProcessing, QualityPreset,
};
use crate::download::source::MediaExtractor;
use crate::jobs::{JobContext, JobResult};

/// A validated video job.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub url: String,
    /// Height ceiling, `None` for best available
    pub height: Option<u32>,
    pub container: Container,
    pub quality: QualityPreset,
    pub post: PostProcessing,
    pub use_aria2c: bool,
    pub use_archive: bool,
    /// Extra copy destination
    pub save_folder: Option<PathBuf>,
}

impl VideoRequest {
    /// Request with defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            height: None,
            container: Container::default(),
            quality: QualityPreset::default(),
            post: PostProcessing::default(),
            use_aria2c: false,
            use_archive: false,
            save_folder: None,
        }
    }

    /// Reads the ceiling from a picker label such as `1080p (Full HD)`.
    pub fn with_resolution_label(mut self, label: &str) -> Self {
        self.height = parse_height_from_label(label);
        self
    }
}

/// A finished video job.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoArtifact {
    pub file: PathBuf,
    pub saved_copy: Option<PathBuf>,
    pub summary: String,
}

/// Downloads `request` into `work_dir`.
///
/// Progress and cancellation flow through `ctx`; the extractor is expected to
/// observe the token during the transfer.
pub fn download_video(
    request: &VideoRequest,
    extractor: &dyn MediaExtractor,
    tools: &FfmpegTools,
    work_dir: &Path,
    ctx: &JobContext,
) -> JobResult<VideoArtifact> {
    ctx.check_cancelled()?;
    let options = DownloadOptionsBuilder::new(
        work_dir,
        MediaSelection::Video {
            height: request.height,
            container: request.container,
            quality: request.quality,
        },
    )
    .post_processing(request.post)
    .ffmpeg_location(tools.location_dir())
    .use_aria2c(request.use_aria2c)
    .archive(request.use_archive.then(|| archive_path(request.save_folder.as_deref())))
    .build();

    log::info!(
        "Video download via {}: {} at {}",
        extractor.name(),
        request.url,
        height_label(request.height)
    );
    let outcome = extractor.download(&request.url, &options, ctx)?;
    ctx.check_cancelled()?;

    let ext = request.container.extension();
    let produced = outcome
        .locate(work_dir, "", Some(ext))
        .or_else(|| outcome.locate(work_dir, "", None))
        .ok_or_else(|| {
            if request.use_archive {
                AppError::Download("Nothing downloaded: the video is already listed in the download archive".to_string())
            } else {
                AppError::Download("Download finished but the output file was not found".to_string())
            }
        })?;

    let final_ext = produced
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| ext.to_string());
    let title = safe_title(outcome.title.as_deref(), "video");
    let label = safe_name(&height_label(request.height));
    let target = unique_path(work_dir, &format!("{}-{}-{}", title, label, now_tag()), &final_ext)
        .map_err(AppError::from)?;
    move_file(&produced, &target).map_err(AppError::from)?;
    log::info!("Video saved as {}", target.display());

    let saved_copy = match &request.save_folder {
        Some(folder) => Some(copy_into_folder(&target, folder).map_err(AppError::from)?),
        None => None,
    };

    let mut summary = format!("Video ready at {}.", height_label(request.height));
    if let Some(folder) = &request.save_folder {
        summary.push_str(&format!(" Saved to: {}", folder.display()));
    }

    Ok(VideoArtifact {
        file: target,
        saved_copy,
        summary,
    })
}
