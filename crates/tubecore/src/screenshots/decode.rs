//! Local decoding: download a progressive MP4, then grab one frame per sample time.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::conversion::{probe_duration_seconds, FfmpegTools};
use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::{last_stderr_line, run_blocking_with_timeout, FFMPEG_TIMEOUT};
use crate::core::utils::{human_ts, unique_path};
use crate::download::options::{DownloadOptionsBuilder, MediaSelection};
use crate::download::source::MediaExtractor;
use crate::jobs::{JobContext, JobResult};
use crate::screenshots::sampler::{saved_status, FrameSampler, SampleSpec};

/// Samples frames from a fully downloaded progressive file.
pub struct DecodeSampler {
    extractor: Arc<dyn MediaExtractor>,
    tools: FfmpegTools,
}

impl DecodeSampler {
    pub fn new(extractor: Arc<dyn MediaExtractor>, tools: FfmpegTools) -> Self {
        Self { extractor, tools }
    }
}

/// ffmpeg arguments that write the frame at `seconds` to `output`.
pub fn grab_args(input: &Path, seconds: f64, height: Option<u32>, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", seconds),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
    ];
    if let Some(h) = height {
        args.push("-vf".to_string());
        args.push(format!("scale=-2:{}:flags=bicubic", h));
    }
    args.push("-y".to_string());
    args.push(output.to_string_lossy().to_string());
    args
}

/// Sample times `0, interval, 2*interval, ...` up to the duration.
fn sample_count(duration: f64, interval: f64) -> usize {
    ((duration + 1e-3) / interval).floor() as usize + 1
}

/// Progress once `done` of `expected` frames exist: the decode band above the download share.
pub fn decode_percent(done: usize, expected: usize) -> u8 {
    let base = usize::from(config::screenshots::DECODE_DOWNLOAD_SHARE);
    let span = 99 - base;
    (base + done * span / expected.max(1)).min(99) as u8
}

impl DecodeSampler {
    fn grab(&self, input: &Path, seconds: f64, height: Option<u32>, output: &Path) -> Result<bool, AppError> {
        let mut cmd = Command::new(&self.tools.ffmpeg);
        cmd.args(grab_args(input, seconds, height, output));
        let result = run_blocking_with_timeout(&mut cmd, FFMPEG_TIMEOUT)?;
        if !result.status.success() {
            log::debug!("No frame at {:.3}s: {}", seconds, last_stderr_line(&result));
            return Ok(false);
        }
        Ok(std::fs::metadata(output).map(|m| m.len() > 0).unwrap_or(false))
    }
}

impl FrameSampler for DecodeSampler {
    fn name(&self) -> &str {
        "decode"
    }

    fn sample(&self, spec: &SampleSpec, work_dir: &Path, frames_dir: &Path, ctx: &JobContext) -> JobResult<Vec<PathBuf>> {
        ctx.check_cancelled()?;
        let options = DownloadOptionsBuilder::new(work_dir, MediaSelection::Progressive)
            .ffmpeg_location(self.tools.location_dir())
            .use_aria2c(spec.use_aria2c)
            .build();
        let download_ctx = ctx.scaled(0, config::screenshots::DECODE_DOWNLOAD_SHARE);
        let outcome = self.extractor.download(&spec.url, &options, &download_ctx)?;
        ctx.check_cancelled()?;

        let video = outcome
            .locate(work_dir, "", Some("mp4"))
            .or_else(|| outcome.locate(work_dir, "", None))
            .ok_or_else(|| AppError::Download("Downloaded video file not found".to_string()))?;
        let duration = probe_duration_seconds(&self.tools, &video)?;
        let expected = sample_count(duration, spec.interval);
        log::info!(
            "Decoding {} ({:.1}s) every {}s, up to {} frame(s)",
            video.display(),
            duration,
            spec.interval,
            expected
        );

        std::fs::create_dir_all(frames_dir).map_err(AppError::from)?;
        let mut frames: Vec<PathBuf> = Vec::new();
        let mut last_ok: Option<f64> = None;

        for index in 0..expected {
            ctx.check_cancelled()?;
            let seconds = index as f64 * spec.interval;
            let label = human_ts(seconds).replace(':', "-");
            let output = unique_path(frames_dir, &format!("screenshot_{}", label), "png").map_err(AppError::from)?;

            if self.grab(&video, seconds, spec.height, &output)? {
                frames.push(output);
                last_ok = Some(seconds);
                ctx.report_frames(decode_percent(frames.len(), expected), frames.clone(), saved_status(frames.len()));
            } else {
                let _ = std::fs::remove_file(&output);
                if last_ok.is_some_and(|ok| seconds - ok > spec.interval) {
                    break;
                }
            }
        }

        if frames.is_empty() {
            return Err(AppError::Download("No screenshots were extracted.".to_string()).into());
        }
        Ok(frames)
    }
}
