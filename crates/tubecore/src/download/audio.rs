//! Audio download orchestration
//!
//! One yt-dlp audio run (original stream, MP3 or WAV), renamed to
//! `<title>-<mode suffix>-<timestamp>.<ext>`, plus a 44.1 kHz stereo WAV
//! preview that any browser can play.

use std::path::{Path, PathBuf};

use crate::conversion::audio::render_preview;
use crate::conversion::FfmpegTools;
use crate::core::error::AppError;
use crate::core::utils::{copy_into_folder, move_file, now_tag, safe_title, unique_path};
use crate::download::options::{archive_path, AudioMode, DownloadOptionsBuilder, MediaSelection, PostProcessing};
use crate::download::source::MediaExtractor;
use crate::jobs::{JobContext, JobResult};

/// A validated audio job.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    pub url: String,
    pub mode: AudioMode,
    pub post: PostProcessing,
    pub use_aria2c: bool,
    pub use_archive: bool,
    pub save_folder: Option<PathBuf>,
}

impl AudioRequest {
    pub fn new(url: impl Into<String>, mode: AudioMode) -> Self {
        Self {
            url: url.into(),
            mode,
            post: PostProcessing::default(),
            use_aria2c: false,
            use_archive: false,
            save_folder: None,
        }
    }
}

/// A finished audio job.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub file: PathBuf,
    /// Browser-playable render; the file itself when it already is WAV or the render failed
    pub preview: PathBuf,
    pub saved_copy: Option<PathBuf>,
    pub summary: String,
}

pub fn download_audio(
    request: &AudioRequest,
    extractor: &dyn MediaExtractor,
    tools: &FfmpegTools,
    work_dir: &Path,
    ctx: &JobContext,
) -> JobResult<AudioArtifact> {
    ctx.check_cancelled()?;
    let options = DownloadOptionsBuilder::new(work_dir, MediaSelection::Audio { mode: request.mode })
        .post_processing(request.post)
        .ffmpeg_location(tools.location_dir())
        .use_aria2c(request.use_aria2c)
        .archive(request.use_archive.then(|| archive_path(request.save_folder.as_deref())))
        .build();

    log::info!(
        "Audio download via {}: {} as {}",
        extractor.name(),
        request.url,
        request.mode.suffix()
    );
    let outcome = extractor.download(&request.url, &options, ctx)?;
    ctx.check_cancelled()?;

    let produced = outcome
        .locate(work_dir, "", request.mode.extension())
        .ok_or_else(|| {
            if request.use_archive {
                AppError::Download("Nothing downloaded: the audio is already listed in the download archive".to_string())
            } else {
                AppError::Download("Download finished but the output file was not found".to_string())
            }
        })?;

    let ext = match request.mode.extension() {
        Some(ext) => ext.to_string(),
        None => produced
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .or_else(|| outcome.ext.clone())
            .unwrap_or_else(|| "webm".to_string()),
    };
    let title = safe_title(outcome.title.as_deref(), "audio");
    let target = unique_path(work_dir, &format!("{}-{}-{}", title, request.mode.suffix(), now_tag()), &ext)
        .map_err(AppError::from)?;
    move_file(&produced, &target).map_err(AppError::from)?;
    log::info!("Audio saved as {}", target.display());

    ctx.check_cancelled()?;
    let preview = match render_preview(tools, &target) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Preview render for {} failed, serving the file itself: {}", target.display(), e);
            target.clone()
        }
    };

    let saved_copy = match &request.save_folder {
        Some(folder) => Some(copy_into_folder(&target, folder).map_err(AppError::from)?),
        None => None,
    };

    let mut summary = format!("Audio ready ({}).", ext.to_uppercase());
    if let Some(folder) = &request.save_folder {
        summary.push_str(&format!(" Saved to: {}", folder.display()));
    }

    Ok(AudioArtifact {
        file: target,
        preview,
        saved_copy,
        summary,
    })
}
