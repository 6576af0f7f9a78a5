//! CLI subcommands
//!
//! Every job runs in a session directory owned by the [`Engine`]. The CLI
//! copies the artifacts into its output folder and deletes the session as
//! soon as the job ends, so nothing is left in `TEMP_FILES_DIR`.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use tubecore::conversion::{ffmpeg_version, require_ffmpeg};
use tubecore::core::config;
use tubecore::core::utils::{copy_into_folder, expand_folder};
use tubecore::download::options::{AudioMode, Container, PostProcessing, QualityPreset, BITRATE_CHOICES};
use tubecore::download::{AudioRequest, VideoRequest, YtDlp};
use tubecore::screenshots::ScreenshotRequest;
use tubecore::{Engine, JobEvent, JobOutcome, RunningJob, SessionOutput};

use crate::cli::JobArgs;

/// Output folder from `--output`, else `DOWNLOAD_FOLDER`.
pub fn output_folder(output: Option<&str>) -> PathBuf {
    expand_folder(output.unwrap_or(config::DOWNLOAD_FOLDER.as_str()))
}

/// Prints progress until the job ends. Ctrl-C cancels it.
pub async fn drive_job<T>(mut job: RunningJob<T>) -> JobOutcome<T> {
    let mut cancel_requested = false;
    let mut last_status = String::new();

    loop {
        tokio::select! {
            event = job.next_event() => match event {
                Some(JobEvent::Finished(outcome)) => return outcome,
                Some(JobEvent::Progress { status, .. }) | Some(JobEvent::Frames { status, .. }) => {
                    if status != last_status {
                        println!("{}", status);
                        last_status = status;
                    }
                }
                None => return JobOutcome::Errored("Job supervisor stopped unexpectedly".to_string()),
            },
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                log::info!("Ctrl-C received, cancelling job {}", job.id());
                cancel_requested = true;
                job.cancel();
            }
        }
    }
}

/// Turns a terminal outcome into the artifact or a printable error.
fn finish<T>(outcome: JobOutcome<SessionOutput<T>>) -> Result<SessionOutput<T>> {
    match outcome {
        JobOutcome::Succeeded(output) => Ok(output),
        JobOutcome::Cancelled => {
            println!("Cancelled.");
            Err(anyhow!("Cancelled by user"))
        }
        JobOutcome::Errored(message) => Err(anyhow!("Error: {}", message)),
    }
}

/// Copies `file` into `folder` unless the job already saved it there.
fn deliver(file: &Path, saved_copy: Option<&Path>, folder: &Path) -> Result<PathBuf> {
    if let Some(copy) = saved_copy {
        return Ok(copy.to_path_buf());
    }
    copy_into_folder(file, folder).map_err(|e| anyhow!("Failed to copy {} into {}: {}", file.display(), folder.display(), e))
}

/// `tubegrab info`
pub async fn run_info(engine: &Engine, url: &str, json: bool) -> Result<()> {
    let details = engine.video_details(url).await?;

    if json {
        let value = serde_json::json!({
            "title": details.title,
            "thumbnail": details.thumbnail,
            "heights": details.heights,
            "videoResolutions": details.video_labels(),
            "imageResolutions": details.image_labels(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let title = if details.title.is_empty() {
        "(unknown)"
    } else {
        details.title.as_str()
    };
    println!("Title: {}", title);
    if let Some(thumbnail) = &details.thumbnail {
        println!("Thumbnail: {}", thumbnail);
    }
    println!("Video resolutions: {}", details.video_labels().join(", "));
    println!("Screenshot resolutions: {}", details.image_labels().join(", "));
    println!("MP3 bitrates: {}", BITRATE_CHOICES.join(", "));
    Ok(())
}

/// `tubegrab video`
pub async fn run_video(
    engine: &Engine,
    url: String,
    resolution: &str,
    container: &str,
    quality: &str,
    common: JobArgs,
    post: PostProcessing,
) -> Result<()> {
    let folder = output_folder(common.output.as_deref());
    let mut request = VideoRequest::new(url).with_resolution_label(resolution);
    request.container = Container::from_label(container);
    request.quality = QualityPreset::from_label(quality);
    request.post = post;
    request.use_aria2c = common.aria2c;
    request.use_archive = common.archive;
    if common.archive {
        request.save_folder = Some(folder.clone());
    }

    println!("Downloading video (tubegrab)");
    println!("URL: {}", request.url);
    println!("Resolution: {}", resolution);

    let job = engine.start_video(request, common.ffmpeg.as_deref())?;
    let output = finish(drive_job(job).await)?;
    let result = deliver(&output.artifact.file, output.artifact.saved_copy.as_deref(), &folder);
    engine.sessions().discard(output.session.id);

    let saved = result?;
    println!("{}", output.artifact.summary);
    println!("Saved: {}", saved.display());
    Ok(())
}

/// `tubegrab audio`
pub async fn run_audio(
    engine: &Engine,
    url: String,
    mode: &str,
    bitrate: &str,
    common: JobArgs,
    post: PostProcessing,
) -> Result<()> {
    let folder = output_folder(common.output.as_deref());
    let mode = AudioMode::from_labels(mode, bitrate)?;
    let mut request = AudioRequest::new(url, mode);
    request.post = post;
    request.use_aria2c = common.aria2c;
    request.use_archive = common.archive;
    if common.archive {
        request.save_folder = Some(folder.clone());
    }

    println!("Downloading audio (tubegrab)");
    println!("URL: {}", request.url);
    println!("Mode: {}", mode.suffix());

    let job = engine.start_audio(request, common.ffmpeg.as_deref())?;
    let output = finish(drive_job(job).await)?;
    let result = deliver(&output.artifact.file, output.artifact.saved_copy.as_deref(), &folder);
    engine.sessions().discard(output.session.id);

    let saved = result?;
    println!("{}", output.artifact.summary);
    println!("Saved: {}", saved.display());
    Ok(())
}

/// `tubegrab screenshots`
pub async fn run_screenshots(
    engine: &Engine,
    url: String,
    interval: f64,
    resolution: &str,
    fast: bool,
    common: JobArgs,
) -> Result<()> {
    let folder = output_folder(common.output.as_deref());
    let mut request = ScreenshotRequest::new(url, interval).with_resolution_label(resolution);
    request.fast = fast;
    request.use_aria2c = common.aria2c;

    println!("Extracting screenshots (tubegrab)");
    println!("URL: {}", request.url);
    println!("Every {}s, {}", interval, if fast { "stream sampling" } else { "local decoding" });

    let job = engine.start_screenshots(request, common.ffmpeg.as_deref())?;
    let output = finish(drive_job(job).await)?;
    let result = deliver(&output.artifact.zip, output.artifact.saved_copy.as_deref(), &folder);
    engine.sessions().discard(output.session.id);

    let saved = result?;
    if output.artifact.used_fallback {
        println!("Stream sampling failed, local decoding was used instead.");
    }
    println!("{}", output.artifact.summary);
    println!("Saved: {}", saved.display());
    Ok(())
}

/// `tubegrab check`
pub async fn run_check(ffmpeg_override: Option<&str>) -> Result<()> {
    let ytdlp = YtDlp::new();
    let ytdlp_version = ytdlp.version().await;
    match &ytdlp_version {
        Some(version) => println!("✅ yt-dlp ({}): {}", ytdlp.binary(), version),
        None => println!("❌ yt-dlp ({}) could not be run", ytdlp.binary()),
    }

    let ffmpeg_ok = match require_ffmpeg(ffmpeg_override.or(config::FFMPEG_PATH.as_deref())) {
        Ok(tools) => {
            let version = ffmpeg_version(&tools).await.unwrap_or_default();
            println!("✅ ffmpeg ({}): {}", tools.ffmpeg.display(), version);
            println!("   ffprobe: {}", tools.ffprobe.display());
            true
        }
        Err(e) => {
            println!("❌ {}", e);
            false
        }
    };

    if ytdlp_version.is_none() || !ffmpeg_ok {
        return Err(anyhow!("Required tools are missing"));
    }
    Ok(())
}
