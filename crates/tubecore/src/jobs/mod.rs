//! Background jobs with progress polling and cooperative cancellation
//!
//! A job is a blocking closure run on tokio's blocking pool. It talks back
//! through a [`JobContext`]:
//! - a [`ProgressCell`] it alone writes,
//! - a cancellation token it must check at every progress point,
//! - a channel for incremental frame lists (screenshot jobs).
//!
//! Its terminal result travels on a oneshot channel. A supervisor task polls
//! all three at a fixed interval and turns them into an ordered stream of
//! [`JobEvent`]s ending with exactly one [`JobEvent::Finished`].

pub mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config;
use crate::core::error::AppError;
pub use progress::ProgressCell;

/// Why a job stopped without a result
#[derive(Debug, Error)]
pub enum JobError {
    /// The cancellation token was observed set
    #[error("Cancelled by user")]
    Cancelled,

    /// Anything else; the message is shown to the user verbatim
    #[error(transparent)]
    Failed(#[from] AppError),
}

pub type JobResult<T> = Result<T, JobError>;

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<T> {
    Succeeded(T),
    Cancelled,
    Errored(String),
}

/// Incremental screenshot report sent by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub percent: u8,
    pub images: Vec<PathBuf>,
    pub status: String,
}

/// What a supervisor reports to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent<T> {
    Progress { percent: u8, status: String },
    Frames { percent: u8, status: String, images: Vec<PathBuf> },
    Finished(JobOutcome<T>),
}

impl<T> JobEvent<T> {
    /// Percentage carried by a progress-type event.
    pub fn percent(&self) -> Option<u8> {
        match self {
            JobEvent::Progress { percent, .. } | JobEvent::Frames { percent, .. } => Some(*percent),
            JobEvent::Finished(_) => None,
        }
    }
}

/// Worker side of a job.
#[derive(Debug, Clone)]
pub struct JobContext {
    progress: Arc<ProgressCell>,
    cancel: CancellationToken,
    frames: mpsc::UnboundedSender<FrameUpdate>,
    band: (u8, u8),
}

impl JobContext {
    fn new(
        progress: Arc<ProgressCell>,
        cancel: CancellationToken,
        frames: mpsc::UnboundedSender<FrameUpdate>,
    ) -> Self {
        Self {
            progress,
            cancel,
            frames,
            band: (0, 100),
        }
    }

    /// A context nobody listens to, for running workers outside [`spawn_job`].
    pub fn detached(cancel: CancellationToken) -> Self {
        let (frames, _) = mpsc::unbounded_channel();
        Self::new(Arc::new(ProgressCell::new()), cancel, frames)
    }

    /// Same job, but `set_progress(0..=100)` lands in `lo..=hi` of the parent range.
    ///
    /// Used when one phase (e.g. a download) is only part of the job.
    pub fn scaled(&self, lo: u8, hi: u8) -> Self {
        Self {
            band: (self.map_percent(lo), self.map_percent(hi.max(lo))),
            ..self.clone()
        }
    }

    pub fn set_progress(&self, percent: u8) {
        self.progress.advance(self.map_percent(percent));
    }

    fn map_percent(&self, percent: u8) -> u8 {
        let (lo, hi) = self.band;
        let span = u32::from(hi.saturating_sub(lo));
        lo + (u32::from(percent.min(100)) * span / 100) as u8
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns [`JobError::Cancelled`] once cancellation was requested.
    pub fn check_cancelled(&self) -> JobResult<()> {
        if self.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Publishes the frames produced so far, then advances the progress cell.
    pub fn report_frames(&self, percent: u8, images: Vec<PathBuf>, status: impl Into<String>) {
        let _ = self.frames.send(FrameUpdate {
            percent,
            images,
            status: status.into(),
        });
        self.progress.advance(percent);
    }
}

/// Caller side of a job.
#[derive(Debug)]
pub struct RunningJob<T> {
    id: Uuid,
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<JobEvent<T>>,
}

impl<T> RunningJob<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, `None` after [`JobEvent::Finished`] was delivered.
    pub async fn next_event(&mut self) -> Option<JobEvent<T>> {
        self.events.recv().await
    }

    /// Drains the events and returns the terminal outcome.
    pub async fn wait(mut self) -> JobOutcome<T> {
        while let Some(event) = self.events.recv().await {
            if let JobEvent::Finished(outcome) = event {
                return outcome;
            }
        }
        JobOutcome::Errored("Job supervisor stopped unexpectedly".to_string())
    }
}

/// Runs `work` on the blocking pool and supervises it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_job<T, F>(work: F) -> RunningJob<T>
where
    T: Send + 'static,
    F: FnOnce(JobContext) -> JobResult<T> + Send + 'static,
{
    spawn_job_with_token(CancellationToken::new(), work)
}

/// [`spawn_job`] with a caller-provided cancellation token.
pub fn spawn_job_with_token<T, F>(cancel: CancellationToken, work: F) -> RunningJob<T>
where
    T: Send + 'static,
    F: FnOnce(JobContext) -> JobResult<T> + Send + 'static,
{
    let id = Uuid::new_v4();
    let progress = Arc::new(ProgressCell::new());
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = oneshot::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let ctx = JobContext::new(Arc::clone(&progress), cancel.clone(), frames_tx);
    tokio::task::spawn_blocking(move || {
        let result = work(ctx);
        let _ = result_tx.send(result);
    });

    tokio::spawn(supervise(id, progress, cancel.clone(), frames_rx, result_rx, events_tx));

    RunningJob {
        id,
        cancel,
        events: events_rx,
    }
}

async fn supervise<T>(
    id: Uuid,
    progress: Arc<ProgressCell>,
    cancel: CancellationToken,
    mut frames: mpsc::UnboundedReceiver<FrameUpdate>,
    mut result: oneshot::Receiver<JobResult<T>>,
    events: mpsc::UnboundedSender<JobEvent<T>>,
) {
    let mut last_pct: u8 = 0;
    let mut announced_cancel = false;

    let emit = |event: JobEvent<T>| {
        if events.send(event).is_err() && !cancel.is_cancelled() {
            log::info!("Job {} lost its listener, cancelling", id);
            cancel.cancel();
        }
    };

    emit(JobEvent::Progress {
        percent: 0,
        status: "Starting… 0%".to_string(),
    });

    let mut ticker = tokio::time::interval(config::jobs::poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if events.is_closed() && !cancel.is_cancelled() {
            log::info!("Job {} lost its listener, cancelling", id);
            cancel.cancel();
        }

        while let Ok(update) = frames.try_recv() {
            if cancel.is_cancelled() {
                continue;
            }
            last_pct = last_pct.max(update.percent);
            emit(JobEvent::Frames {
                percent: last_pct,
                status: update.status,
                images: update.images,
            });
        }

        match result.try_recv() {
            Ok(outcome) => {
                let outcome = match outcome {
                    Ok(value) => JobOutcome::Succeeded(value),
                    Err(JobError::Cancelled) => JobOutcome::Cancelled,
                    Err(_) if cancel.is_cancelled() => JobOutcome::Cancelled,
                    Err(JobError::Failed(e)) => JobOutcome::Errored(e.to_string()),
                };
                if matches!(outcome, JobOutcome::Succeeded(_)) {
                    while let Ok(update) = frames.try_recv() {
                        last_pct = last_pct.max(update.percent);
                        emit(JobEvent::Frames {
                            percent: last_pct,
                            status: update.status,
                            images: update.images,
                        });
                    }
                }
                match &outcome {
                    JobOutcome::Succeeded(_) => log::info!("Job {} succeeded", id),
                    JobOutcome::Cancelled => log::info!("Job {} cancelled", id),
                    JobOutcome::Errored(msg) => log::error!("Job {} failed: {}", id, msg),
                }
                emit(JobEvent::Finished(outcome));
                return;
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                log::error!("Job {} worker stopped without a result", id);
                let outcome = if cancel.is_cancelled() {
                    JobOutcome::Cancelled
                } else {
                    JobOutcome::Errored("Job worker stopped unexpectedly".to_string())
                };
                emit(JobEvent::Finished(outcome));
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        if cancel.is_cancelled() {
            if !announced_cancel {
                announced_cancel = true;
                emit(JobEvent::Progress {
                    percent: last_pct,
                    status: "Cancelling…".to_string(),
                });
            }
        } else {
            let pct = progress.get();
            if pct > last_pct {
                last_pct = pct;
                emit(JobEvent::Progress {
                    percent: pct,
                    status: format!("Downloading… {}%", pct),
                });
            }
        }

        ticker.tick().await;
    }
}
