//! Stream sampling: ffmpeg reads frames straight from the remote stream URL.

use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::conversion::FfmpegTools;
use crate::core::config;
use crate::core::error::AppError;
use crate::download::source::MediaExtractor;
use crate::jobs::{JobContext, JobError, JobResult};
use crate::screenshots::sampler::{list_frames, saved_status, FrameSampler, SampleSpec};

const FRAME_PREFIX: &str = "shot_";

/// Samples frames with ffmpeg directly from the best matching stream.
pub struct StreamSampler {
    extractor: Arc<dyn MediaExtractor>,
    tools: FfmpegTools,
}

impl StreamSampler {
    pub fn new(extractor: Arc<dyn MediaExtractor>, tools: FfmpegTools) -> Self {
        Self { extractor, tools }
    }
}

/// ffmpeg arguments for periodic sampling from `stream_url` into `pattern`.
pub fn stream_args(
    stream_url: &str,
    headers: &BTreeMap<String, String>,
    interval: f64,
    height: Option<u32>,
    pattern: &Path,
) -> Vec<String> {
    let mut filters = vec![format!(
        "fps=1/{}",
        interval.max(config::screenshots::MIN_STREAM_INTERVAL_SECS)
    )];
    if let Some(h) = height {
        filters.push(format!("scale=-1:{}:flags=bicubic", h));
    }

    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if !headers.is_empty() {
        let joined: String = headers.iter().map(|(k, v)| format!("{}: {}\r\n", k, v)).collect();
        args.push("-headers".to_string());
        args.push(joined);
    }
    args.push("-i".to_string());
    args.push(stream_url.to_string());
    args.push("-vf".to_string());
    args.push(filters.join(","));
    args.push(pattern.to_string_lossy().to_string());
    args
}

/// Progress for `count` frames of unknown total.
pub fn stream_percent(count: usize) -> u8 {
    let per_frame = config::screenshots::STREAM_PERCENT_PER_FRAME as usize;
    count.saturating_mul(per_frame).clamp(1, 99) as u8
}

/// Asks ffmpeg to quit via stdin, then kills it after the grace period.
fn terminate(child: &mut Child) {
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(b"q");
        let _ = stdin.flush();
    }
    drop(child.stdin.take());

    let deadline = Instant::now() + config::screenshots::terminate_grace();
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => std::thread::sleep(std::time::Duration::from_millis(50)),
            Err(_) => break,
        }
    }
    log::warn!("ffmpeg did not stop within the grace period, killing");
    let _ = child.kill();
    let _ = child.wait();
}

impl FrameSampler for StreamSampler {
    fn name(&self) -> &str {
        "stream"
    }

    fn sample(
        &self,
        spec: &SampleSpec,
        _work_dir: &Path,
        frames_dir: &Path,
        ctx: &JobContext,
    ) -> JobResult<Vec<PathBuf>> {
        ctx.check_cancelled()?;
        let info = self.extractor.probe(&spec.url)?;
        let format = info
            .pick_stream(spec.height)
            .ok_or_else(|| AppError::Download("No streamable video formats found.".to_string()))?;
        let stream_url = format
            .url
            .as_deref()
            .ok_or_else(|| AppError::Download("Failed to resolve video stream URL.".to_string()))?;
        log::info!(
            "Sampling {} every {}s from format {}",
            spec.url,
            spec.interval,
            format.format_id.as_deref().unwrap_or("?")
        );
        ctx.check_cancelled()?;

        std::fs::create_dir_all(frames_dir).map_err(AppError::from)?;
        let pattern = frames_dir.join(format!("{}%05d.png", FRAME_PREFIX));
        let args = stream_args(stream_url, &info.http_headers, spec.interval, spec.height, &pattern);

        let mut child = Command::new(&self.tools.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Ffmpeg(format!("Failed to start ffmpeg: {}", e)))?;

        let stderr_lines = Arc::new(Mutex::new(VecDeque::<String>::new()));
        if let Some(stderr) = child.stderr.take() {
            let stderr_lines = Arc::clone(&stderr_lines);
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    log::debug!("ffmpeg stderr: {}", line);
                    if let Ok(mut lines) = stderr_lines.lock() {
                        lines.push_back(line);
                        if lines.len() > 50 {
                            lines.pop_front();
                        }
                    }
                }
            });
        }

        let mut last_count = 0usize;
        let status: ExitStatus = loop {
            if ctx.is_cancelled() {
                log::info!("Stopping stream sampling of {}", spec.url);
                terminate(&mut child);
                return Err(JobError::Cancelled);
            }
            std::thread::sleep(config::screenshots::stream_poll_interval());

            let frames = list_frames(frames_dir, FRAME_PREFIX);
            if frames.len() != last_count {
                last_count = frames.len();
                ctx.report_frames(stream_percent(last_count), frames, saved_status(last_count));
            }

            if let Some(status) = child.try_wait().map_err(AppError::from)? {
                break status;
            }
        };

        let frames = list_frames(frames_dir, FRAME_PREFIX);
        if frames.len() != last_count {
            ctx.report_frames(stream_percent(frames.len()), frames.clone(), saved_status(frames.len()));
        }

        if frames.is_empty() {
            let reason = stderr_lines
                .lock()
                .ok()
                .and_then(|lines| lines.back().cloned())
                .unwrap_or_else(|| format!("ffmpeg exited with {}", status));
            return Err(AppError::Ffmpeg(reason).into());
        }
        if !status.success() {
            log::warn!("ffmpeg exited with {} after {} frame(s), keeping them", status, frames.len());
        }
        Ok(frames)
    }
}
