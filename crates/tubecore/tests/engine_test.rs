//! End-to-end job tests with fake extractor and ffmpeg

mod common;

use common::{FakeExtractor, FixedFfmpeg};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tubecore::core::error::AppError;
use tubecore::core::session::SessionRegistry;
use tubecore::download::options::AudioMode;
use tubecore::download::{AudioRequest, VideoRequest};
use tubecore::jobs::{JobContext, JobError, JobResult};
use tubecore::screenshots::{extract_screenshots, FrameSampler, SampleSpec, ScreenshotRequest};
use tubecore::{Engine, JobEvent, JobOutcome, RunningJob};

fn engine(extractor: FakeExtractor, ffmpeg: FixedFfmpeg, root: &Path) -> (Engine, Arc<FakeExtractor>) {
    let extractor = Arc::new(extractor);
    let engine = Engine::new(extractor.clone(), Arc::new(ffmpeg), SessionRegistry::new(root)).unwrap();
    (engine, extractor)
}

async fn collect<T>(mut job: RunningJob<T>) -> Vec<JobEvent<T>> {
    let mut events = Vec::new();
    while let Some(event) = job.next_event().await {
        events.push(event);
    }
    events
}

fn percents<T>(events: &[JobEvent<T>]) -> Vec<u8> {
    events.iter().filter_map(JobEvent::percent).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

#[tokio::test]
async fn test_video_job_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let (engine, extractor) = engine(FakeExtractor::new("Sample Video", "mkv"), FixedFfmpeg::present(), root.path());

    let request = VideoRequest::new("https://youtu.be/abc123").with_resolution_label("1080p (Full HD)");
    let events = collect(engine.start_video(request, None).unwrap()).await;

    let pcts = percents(&events);
    assert_eq!(pcts.first(), Some(&0));
    assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "{:?}", pcts);

    let output = match events.last() {
        Some(JobEvent::Finished(JobOutcome::Succeeded(output))) => output.clone(),
        other => panic!("unexpected terminal event: {:?}", other),
    };
    let name = file_name(&output.artifact.file);
    assert!(name.starts_with("Sample Video-1080p (Full HD)-"), "{}", name);
    assert!(name.ends_with(".mkv"));
    assert_eq!(output.artifact.summary, "Video ready at 1080p (Full HD).");

    // the short link reached the extractor in canonical form
    assert_eq!(extractor.seen_urls(), vec!["https://www.youtube.com/watch?v=abc123".to_string()]);

    // finished sessions stay retrievable by file name
    assert_eq!(engine.sessions().find_file(&name), Some(output.artifact.file.clone()));
}

#[tokio::test]
async fn test_audio_mp3_job_naming() {
    let root = tempfile::tempdir().unwrap();
    let (engine, _) = engine(FakeExtractor::new("Song", "mp3"), FixedFfmpeg::present(), root.path());

    let mode = AudioMode::from_labels("MP3", "192 kbps").unwrap();
    let job = engine.start_audio(AudioRequest::new("https://www.youtube.com/watch?v=x", mode), None).unwrap();

    let output = match job.wait().await {
        JobOutcome::Succeeded(output) => output,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let name = file_name(&output.artifact.file);
    assert!(name.contains("MP3-192kbps"), "{}", name);
    assert!(regex::Regex::new(r"-\d{8}-\d{6}\.mp3$").unwrap().is_match(&name), "{}", name);
    assert_eq!(output.artifact.summary, "Audio ready (MP3).");
}

#[tokio::test]
async fn test_cancel_yields_cancelled_and_removes_session() {
    let root = tempfile::tempdir().unwrap();
    let mut slow = FakeExtractor::new("Slow", "mkv");
    slow.step_delay = Duration::from_millis(300);
    let (engine, _) = engine(slow, FixedFfmpeg::present(), root.path());

    let mut job = engine.start_video(VideoRequest::new("https://youtu.be/slow"), None).unwrap();
    assert_eq!(engine.sessions().len(), 1);

    while let Some(event) = job.next_event().await {
        if matches!(&event, JobEvent::Progress { status, .. } if status.starts_with("Downloading")) {
            job.cancel();
            break;
        }
    }
    let after_cancel = collect(job).await;

    assert_eq!(after_cancel.last(), Some(&JobEvent::Finished(JobOutcome::Cancelled)));
    // nothing but the cancelling notice may precede the terminal event
    assert!(after_cancel[..after_cancel.len() - 1]
        .iter()
        .all(|e| matches!(e, JobEvent::Progress { status, .. } if status == "Cancelling…")));
    assert!(engine.sessions().is_empty());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_extractor_error_is_errored_outcome() {
    let root = tempfile::tempdir().unwrap();
    let mut failing = FakeExtractor::new("Broken", "mkv");
    failing.fail_with = Some("Private video".to_string());
    let (engine, _) = engine(failing, FixedFfmpeg::present(), root.path());

    let outcome = engine
        .start_video(VideoRequest::new("https://youtu.be/x"), None)
        .unwrap()
        .wait()
        .await;

    assert_eq!(outcome, JobOutcome::Errored("Download error: Private video".to_string()));
    assert!(engine.sessions().is_empty());
}

#[tokio::test]
async fn test_non_positive_interval_rejected_before_any_work() {
    let root = tempfile::tempdir().unwrap();
    let (engine, extractor) = engine(FakeExtractor::new("Clip", "mp4"), FixedFfmpeg::present(), root.path());

    for interval in [0.0, -5.0, f64::NAN] {
        let err = engine
            .start_screenshots(ScreenshotRequest::new("https://youtu.be/abc", interval), None)
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err.to_string(), "Interval must be > 0 seconds");
    }
    assert!(engine.sessions().is_empty());
    assert!(extractor.seen_urls().is_empty());
}

#[tokio::test]
async fn test_empty_url_rejected() {
    let root = tempfile::tempdir().unwrap();
    let (engine, _) = engine(FakeExtractor::new("Clip", "mp4"), FixedFfmpeg::present(), root.path());

    let err = engine.start_video(VideoRequest::new("   "), None).map(|_| ()).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.to_string(), "Please provide a valid YouTube URL");
}

#[tokio::test]
async fn test_missing_ffmpeg_is_fatal_before_network() {
    let root = tempfile::tempdir().unwrap();
    let (engine, extractor) = engine(FakeExtractor::new("Clip", "mp3"), FixedFfmpeg::missing(), root.path());

    let err = engine
        .start_audio(AudioRequest::new("https://youtu.be/x", AudioMode::Wav), None)
        .map(|_| ())
        .unwrap_err();

    assert_eq!(err.to_string(), "FFmpeg not found. Install ffmpeg or pass its location.");
    assert!(extractor.seen_urls().is_empty());
    assert!(engine.sessions().is_empty());
}

/// Sampler writing `count` frames or failing with `error`.
struct Scripted {
    prefix: &'static str,
    count: usize,
    error: Option<&'static str>,
}

impl FrameSampler for Scripted {
    fn name(&self) -> &str {
        self.prefix
    }

    fn sample(&self, _spec: &SampleSpec, _work: &Path, frames_dir: &Path, ctx: &JobContext) -> JobResult<Vec<PathBuf>> {
        if let Some(error) = self.error {
            return Err(JobError::Failed(AppError::Ffmpeg(error.to_string())));
        }
        std::fs::create_dir_all(frames_dir).unwrap();
        let mut frames = Vec::new();
        for i in 0..self.count {
            let frame = frames_dir.join(format!("{}_{}.png", self.prefix, i));
            std::fs::write(&frame, b"png").unwrap();
            frames.push(frame);
            ctx.report_frames(50, frames.clone(), format!("Saved {} screenshot(s)…", frames.len()));
        }
        Ok(frames)
    }
}

#[tokio::test]
async fn test_stream_failure_falls_back_to_decode() {
    let session = tempfile::tempdir().unwrap();
    let session_dir = session.path().to_path_buf();
    let mut request = ScreenshotRequest::new("https://www.youtube.com/watch?v=abc123", 5.0);
    request.fast = true;

    let job = tubecore::jobs::spawn_job(move |ctx| {
        let fast = Scripted {
            prefix: "shot",
            count: 0,
            error: Some("Server returned 403 Forbidden"),
        };
        let precise = Scripted {
            prefix: "screenshot",
            count: 3,
            error: None,
        };
        extract_screenshots(&request, Some(&fast), &precise, &session_dir, &ctx)
    });
    let events = collect(job).await;

    assert!(events.iter().any(|e| matches!(
        e,
        JobEvent::Frames { status, .. } if status.starts_with("Stream extraction failed (FFmpeg error: Server returned 403 Forbidden)")
    )));
    match events.last() {
        Some(JobEvent::Finished(JobOutcome::Succeeded(artifact))) => {
            assert!(artifact.used_fallback);
            assert_eq!(artifact.frames.len(), 3);
            assert!(artifact.zip.exists());
        }
        other => panic!("unexpected terminal event: {:?}", other),
    }
}
