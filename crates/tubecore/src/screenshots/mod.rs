//! Periodic screenshot extraction
//!
//! Two [`FrameSampler`]s do the actual work:
//! - [`stream::StreamSampler`] reads frames straight from the network stream (fast mode),
//! - [`decode::DecodeSampler`] downloads a progressive file first (default, more compatible).
//!
//! A failing fast run falls back to the decode sampler. The frames end up in
//! `<session>/screenshots/` and are zipped into the session directory.

pub mod archive;
pub mod decode;
pub mod sampler;
pub mod stream;

use std::path::{Path, PathBuf};

use crate::core::error::AppError;
use crate::core::utils::copy_into_folder;
use crate::download::options::parse_height_from_label;
use crate::jobs::{JobContext, JobError, JobResult};
pub use decode::DecodeSampler;
pub use sampler::{FrameSampler, SampleSpec};
pub use stream::StreamSampler;

/// Subdirectory of the session holding the frames
pub const FRAMES_DIR: &str = "screenshots";

/// A validated screenshot job.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotRequest {
    pub url: String,
    pub interval: f64,
    pub height: Option<u32>,
    /// Try stream sampling first
    pub fast: bool,
    pub use_aria2c: bool,
    pub save_folder: Option<PathBuf>,
}

impl ScreenshotRequest {
    pub fn new(url: impl Into<String>, interval: f64) -> Self {
        Self {
            url: url.into(),
            interval,
            height: None,
            fast: false,
            use_aria2c: false,
            save_folder: None,
        }
    }

    /// Reads the frame height from a picker label such as `720p (HD)`.
    pub fn with_resolution_label(mut self, label: &str) -> Self {
        self.height = parse_height_from_label(label);
        self
    }

    fn sample_spec(&self) -> SampleSpec {
        SampleSpec {
            url: self.url.clone(),
            interval: self.interval,
            height: self.height,
            use_aria2c: self.use_aria2c,
        }
    }
}

/// A finished screenshot job.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotArtifact {
    pub zip: PathBuf,
    pub frames: Vec<PathBuf>,
    pub saved_copy: Option<PathBuf>,
    /// True when fast mode failed and the decode sampler produced the frames
    pub used_fallback: bool,
    pub summary: String,
}

fn clear_frames(frames_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(frames_dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to clear partial frames in {}: {}", frames_dir.display(), e);
        }
    }
}

/// Runs the screenshot job in `session_dir`.
///
/// `fast` is only used when the request asks for it. Its failure (or an empty
/// result) is reported as a status line, its partial frames are removed and
/// `precise` runs instead. Cancellation is never turned into a fallback.
pub fn extract_screenshots(
    request: &ScreenshotRequest,
    fast: Option<&dyn FrameSampler>,
    precise: &dyn FrameSampler,
    session_dir: &Path,
    ctx: &JobContext,
) -> JobResult<ScreenshotArtifact> {
    ctx.check_cancelled()?;
    let spec = request.sample_spec();
    let frames_dir = session_dir.join(FRAMES_DIR);

    let mut used_fallback = false;
    let fast_result = match fast.filter(|_| request.fast) {
        Some(sampler) => {
            log::info!("Screenshots for {} via {} sampler", request.url, sampler.name());
            match sampler.sample(&spec, session_dir, &frames_dir, ctx) {
                Ok(frames) if !frames.is_empty() => Some(frames),
                Ok(_) => {
                    used_fallback = true;
                    fall_back(ctx, &frames_dir, "no frames were produced");
                    None
                }
                Err(JobError::Cancelled) => return Err(JobError::Cancelled),
                Err(JobError::Failed(e)) => {
                    used_fallback = true;
                    fall_back(ctx, &frames_dir, &e.to_string());
                    None
                }
            }
        }
        None => None,
    };

    let frames = match fast_result {
        Some(frames) => frames,
        None => {
            log::info!("Screenshots for {} via {} sampler", request.url, precise.name());
            precise.sample(&spec, session_dir, &frames_dir, ctx)?
        }
    };
    if frames.is_empty() {
        return Err(AppError::Download("No screenshots were extracted.".to_string()).into());
    }
    ctx.check_cancelled()?;

    let zip = archive::archive_path(session_dir)?;
    archive::zip_files(&frames, &zip)?;
    log::info!("Packed {} screenshot(s) into {}", frames.len(), zip.display());

    let saved_copy = match &request.save_folder {
        Some(folder) => Some(copy_into_folder(&zip, folder).map_err(AppError::from)?),
        None => None,
    };

    let mut summary = format!("Done. Extracted {} screenshot(s).", frames.len());
    if let Some(folder) = &request.save_folder {
        summary.push_str(&format!(" Saved to: {}", folder.display()));
    }

    Ok(ScreenshotArtifact {
        zip,
        frames,
        saved_copy,
        used_fallback,
        summary,
    })
}

fn fall_back(ctx: &JobContext, frames_dir: &Path, reason: &str) {
    log::warn!("Stream extraction failed ({}), falling back to local decoding", reason);
    clear_frames(frames_dir);
    ctx.report_frames(
        ctx.progress(),
        Vec::new(),
        format!("Stream extraction failed ({}); falling back…", reason),
    );
}
