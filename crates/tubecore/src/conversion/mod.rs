//! ffmpeg/ffprobe discovery and the small conversions tubegrab runs itself.
//!
//! Every heavy conversion is done by yt-dlp's postprocessors; this module only
//! locates the binaries, probes durations and renders audio previews.

pub mod audio;

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::{AppError, AppResult};
use crate::core::process::{last_stderr_line, run_blocking_with_timeout, FFPROBE_TIMEOUT, VERSION_CHECK_TIMEOUT};

/// Message shown when no usable ffmpeg exists.
pub const FFMPEG_NOT_FOUND: &str = "FFmpeg not found. Install ffmpeg or pass its location.";

/// Resolved ffmpeg and its sibling ffprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    /// Directory to hand to `yt-dlp --ffmpeg-location`, when ffmpeg was found by path.
    pub fn location_dir(&self) -> Option<&Path> {
        self.ffmpeg.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

fn exe_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

/// Turns an override (a binary or a directory containing one) into the binary path.
fn candidate_from_override(override_path: &str) -> Option<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(override_path.trim()).to_string());
    if expanded.is_dir() {
        let exe = expanded.join(exe_name("ffmpeg"));
        exe.is_file().then_some(exe)
    } else if expanded.is_file() {
        Some(expanded)
    } else {
        None
    }
}

fn runs_version(exe: &Path) -> bool {
    let mut cmd = Command::new(exe);
    cmd.arg("-version");
    run_blocking_with_timeout(&mut cmd, VERSION_CHECK_TIMEOUT)
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Finds a working ffmpeg.
///
/// The override wins when it points at a binary (or a directory holding one)
/// that answers `-version`; otherwise `ffmpeg` from `PATH` is tried. The
/// matching ffprobe is expected next to the chosen ffmpeg.
pub fn resolve_ffmpeg(override_path: Option<&str>) -> Option<FfmpegTools> {
    let from_override = override_path
        .filter(|p| !p.trim().is_empty())
        .and_then(candidate_from_override)
        .filter(|exe| runs_version(exe))
        .map(|exe| std::fs::canonicalize(&exe).unwrap_or(exe));

    let ffmpeg = match from_override {
        Some(exe) => exe,
        None => {
            if let Some(path) = override_path.filter(|p| !p.trim().is_empty()) {
                log::warn!("FFmpeg override {} is not usable, falling back to PATH", path);
            }
            let exe = PathBuf::from(exe_name("ffmpeg"));
            if !runs_version(&exe) {
                return None;
            }
            exe
        }
    };

    let ffprobe = match ffmpeg.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.join(exe_name("ffprobe")),
        None => PathBuf::from(exe_name("ffprobe")),
    };

    Some(FfmpegTools { ffmpeg, ffprobe })
}

/// [`resolve_ffmpeg`] that reports a missing binary as a fatal error.
pub fn require_ffmpeg(override_path: Option<&str>) -> AppResult<FfmpegTools> {
    resolve_ffmpeg(override_path).ok_or_else(|| AppError::MissingDependency(FFMPEG_NOT_FOUND.to_string()))
}

/// Duration of a media file in seconds, read with ffprobe.
pub fn probe_duration_seconds(tools: &FfmpegTools, path: &Path) -> AppResult<f64> {
    let mut cmd = Command::new(&tools.ffprobe);
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(path);

    let output = run_blocking_with_timeout(&mut cmd, FFPROBE_TIMEOUT)?;
    if !output.status.success() {
        return Err(AppError::Ffmpeg(last_stderr_line(&output)));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| AppError::Ffmpeg("Failed to parse duration".to_string()))
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// First line of `ffmpeg -version`, for startup diagnostics and `tubegrab check`.
pub async fn ffmpeg_version(tools: &FfmpegTools) -> Option<String> {
    let mut cmd = tokio::process::Command::new(&tools.ffmpeg);
    cmd.arg("-version");
    let output = crate::core::process::run_with_timeout(&mut cmd, VERSION_CHECK_TIMEOUT).await.ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).lines().next().map(str::to_string)
}
