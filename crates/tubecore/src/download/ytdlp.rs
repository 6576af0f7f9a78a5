//! yt-dlp backend
//!
//! Drives the `yt-dlp` executable: `-J` for probes, a line-streamed download
//! run for everything else. The download runner reads progress from stdout,
//! keeps the stderr tail for error reporting, and kills the child as soon as
//! the job is cancelled.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::process::Command as TokioCommand;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{last_stderr_line, run_blocking_with_timeout, run_with_timeout, VERSION_CHECK_TIMEOUT};
use crate::download::options::{AudioMode, DownloadOptions, MediaSelection, PROGRESSIVE_FORMAT};
use crate::download::progress::parse_progress;
use crate::download::source::{DownloadOutcome, MediaExtractor, VideoInfo};
use crate::jobs::{JobContext, JobError, JobResult};

/// Prefix of the line yt-dlp prints once the final file is in place.
const RESULT_MARKER: &str = "TUBEGRAB_RESULT ";

/// How many stderr lines are kept for the error message
const STDERR_TAIL_LINES: usize = 200;

/// How often the runner wakes up to check for cancellation
const CANCEL_POLL: Duration = Duration::from_millis(200);

/// yt-dlp driven through its command line.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    /// Uses `YTDL_BIN` (or `yt-dlp` from PATH).
    pub fn new() -> Self {
        Self::with_binary(config::YTDL_BIN.as_str())
    }

    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn binary(&self) -> &str {
        &self.bin
    }

    /// `yt-dlp --version`, `None` when the binary cannot be run.
    pub async fn version(&self) -> Option<String> {
        let mut cmd = TokioCommand::new(&self.bin);
        cmd.arg("--version");
        match run_with_timeout(&mut cmd, VERSION_CHECK_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(output) => {
                log::warn!("yt-dlp --version failed: {}", last_stderr_line(&output));
                None
            }
            Err(e) => {
                log::warn!("Failed to run {}: {}", self.bin, e);
                None
            }
        }
    }
}

/// Arguments shared by probes and downloads: single item, low retry counts, quiet.
pub fn common_args() -> Vec<String> {
    vec![
        "--no-playlist".to_string(),
        "--retries".to_string(),
        config::download::RETRIES.to_string(),
        "--extractor-retries".to_string(),
        config::download::EXTRACTOR_RETRIES.to_string(),
        "--socket-timeout".to_string(),
        config::download::SOCKET_TIMEOUT_SECS.to_string(),
        "--no-warnings".to_string(),
    ]
}

/// Output template: `<dir>/<title truncated to N bytes>.<ext>`.
fn output_template(options: &DownloadOptions) -> String {
    options
        .output_dir
        .join(format!("%(title).{}B.%(ext)s", config::download::TITLE_MAX_BYTES))
        .to_string_lossy()
        .to_string()
}

/// Full argument list for a download run, URL last.
pub fn build_download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    let mut args = common_args();
    args.extend([
        "--newline".to_string(),
        "--progress".to_string(),
        "--print".to_string(),
        format!(
            "after_move:{}{{\"filepath\":%(filepath)j,\"title\":%(title)j,\"ext\":%(ext)j}}",
            RESULT_MARKER
        ),
        "-o".to_string(),
        output_template(options),
    ]);

    match options.selection {
        MediaSelection::Video {
            height,
            container,
            quality,
        } => {
            args.push("-f".to_string());
            args.push(crate::download::options::build_format_string(height, container.is_mp4()));
            args.push("-S".to_string());
            args.push(quality.format_sort().to_string());
            args.push("--merge-output-format".to_string());
            args.push(container.extension().to_string());
        }
        MediaSelection::Audio { mode } => {
            args.push("-f".to_string());
            args.push("bestaudio/best".to_string());
            match mode {
                AudioMode::Original => {}
                AudioMode::Mp3 { bitrate_kbps } => {
                    args.extend([
                        "-x".to_string(),
                        "--audio-format".to_string(),
                        "mp3".to_string(),
                        "--audio-quality".to_string(),
                        format!("{}K", bitrate_kbps),
                    ]);
                }
                AudioMode::Wav => {
                    args.extend(["-x".to_string(), "--audio-format".to_string(), "wav".to_string()]);
                }
            }
        }
        MediaSelection::Progressive => {
            args.push("-f".to_string());
            args.push(PROGRESSIVE_FORMAT.to_string());
        }
    }

    let post = &options.post;
    if post.embed_metadata {
        args.push("--embed-metadata".to_string());
    }
    if post.embed_thumbnail {
        args.push("--embed-thumbnail".to_string());
    }
    if post.write_subtitles {
        args.extend(["--write-subs".to_string(), "--sub-format".to_string(), "srt".to_string()]);
    }
    if post.embed_subtitles {
        args.push("--embed-subs".to_string());
    }
    if post.split_chapters {
        args.push("--split-chapters".to_string());
    }
    if post.write_info_json {
        args.push("--write-info-json".to_string());
    }
    if let Some(archive) = &options.archive {
        args.push("--download-archive".to_string());
        args.push(archive.to_string_lossy().to_string());
    }
    if options.use_aria2c {
        args.push("--downloader".to_string());
        args.push("aria2c".to_string());
    }
    if let Some(dir) = &options.ffmpeg_location {
        args.push("--ffmpeg-location".to_string());
        args.push(dir.to_string_lossy().to_string());
    }

    args.push(url.to_string());
    args
}

/// Parses the `after_move` print line.
pub fn parse_result_line(line: &str) -> Option<DownloadOutcome> {
    let json = line.trim().strip_prefix(RESULT_MARKER)?;
    serde_json::from_str(json).ok()
}

/// Picks the most useful line out of yt-dlp's stderr tail.
///
/// `ERROR:` lines win; their `[extractor] id:` prefix is dropped.
pub fn summarize_stderr(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if let Some(error) = lines.iter().rev().find_map(|l| l.strip_prefix("ERROR:")) {
        let error = error.trim();
        let error = match error.strip_prefix('[') {
            Some(rest) => rest
                .split_once("] ")
                .map(|(_, msg)| msg.split_once(": ").map(|(_, m)| m).unwrap_or(msg))
                .unwrap_or(error),
            None => error,
        };
        return error.trim().to_string();
    }
    lines.last().map(|l| l.to_string()).unwrap_or_else(|| "unknown error".to_string())
}

fn kill_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl MediaExtractor for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn probe(&self, url: &str) -> AppResult<VideoInfo> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(common_args()).args(["-J", "--skip-download", url]);
        log::debug!("Probing {} with {}", url, self.bin);

        let output = run_blocking_with_timeout(&mut cmd, config::download::probe_timeout())?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Download(summarize_stderr(&stderr)));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn download(&self, url: &str, options: &DownloadOptions, ctx: &JobContext) -> JobResult<DownloadOutcome> {
        ctx.check_cancelled()?;
        let args = build_download_args(url, options);
        log::info!("Starting yt-dlp download of {} into {}", url, options.output_dir.display());
        log::debug!("yt-dlp args: {:?}", args);

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Download(format!("Failed to start {}: {}", self.bin, e)))?;

        let stderr_lines = Arc::new(Mutex::new(VecDeque::<String>::new()));
        if let Some(stderr_stream) = child.stderr.take() {
            let stderr_lines = Arc::clone(&stderr_lines);
            std::thread::spawn(move || {
                let reader = BufReader::new(stderr_stream);
                for line in reader.lines().map_while(Result::ok) {
                    log::debug!("yt-dlp stderr: {}", line);
                    if let Ok(mut lines) = stderr_lines.lock() {
                        lines.push_back(line);
                        if lines.len() > STDERR_TAIL_LINES {
                            lines.pop_front();
                        }
                    }
                }
            });
        }

        let (line_tx, line_rx) = mpsc::channel::<String>();
        if let Some(stdout_stream) = child.stdout.take() {
            std::thread::spawn(move || {
                let reader = BufReader::new(stdout_stream);
                for line in reader.lines().map_while(Result::ok) {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        let timeout = config::download::ytdlp_timeout();
        let deadline = Instant::now() + timeout;
        let mut outcome: Option<DownloadOutcome> = None;

        loop {
            if ctx.is_cancelled() {
                log::info!("Cancelling yt-dlp download of {}", url);
                kill_child(&mut child);
                return Err(JobError::Cancelled);
            }
            if Instant::now() >= deadline {
                log::error!("yt-dlp process timed out after {}s, killing", timeout.as_secs());
                kill_child(&mut child);
                return Err(AppError::Download(format!("yt-dlp timed out after {}s", timeout.as_secs())).into());
            }

            match line_rx.recv_timeout(CANCEL_POLL) {
                Ok(line) => {
                    if let Some(result) = parse_result_line(&line) {
                        outcome = Some(result);
                    } else if let Some(percent) = parse_progress(&line) {
                        ctx.set_progress(percent);
                    } else {
                        log::debug!("yt-dlp stdout: {}", line);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // stdout closed, the process is exiting
        let status = loop {
            if ctx.is_cancelled() {
                kill_child(&mut child);
                return Err(JobError::Cancelled);
            }
            match child.try_wait().map_err(AppError::Io)? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    kill_child(&mut child);
                    return Err(AppError::Download(format!("yt-dlp timed out after {}s", timeout.as_secs())).into());
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        };

        if !status.success() {
            let stderr_text = stderr_lines
                .lock()
                .map(|mut lines| lines.make_contiguous().join("\n"))
                .unwrap_or_default();
            log::error!("yt-dlp failed for {}: {}", url, stderr_text);
            return Err(AppError::Download(summarize_stderr(&stderr_text)).into());
        }

        let outcome = outcome.unwrap_or_default();
        log::info!(
            "yt-dlp finished {}: {}",
            url,
            outcome
                .filepath
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unreported path>".to_string())
        );
        Ok(outcome)
    }
}
