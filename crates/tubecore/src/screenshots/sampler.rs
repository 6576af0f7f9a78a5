//! Frame sampler abstraction

use std::path::{Path, PathBuf};

use crate::jobs::{JobContext, JobResult};

/// What to sample and how often.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSpec {
    pub url: String,
    /// Seconds between frames, validated positive
    pub interval: f64,
    /// Output height, `None` keeps the source size
    pub height: Option<u32>,
    pub use_aria2c: bool,
}

/// Produces frame images for a video.
///
/// Implementations report every new frame through
/// [`JobContext::report_frames`] and stop with
/// [`crate::jobs::JobError::Cancelled`] once the context is cancelled,
/// terminating any child process they started.
pub trait FrameSampler: Send + Sync {
    fn name(&self) -> &str;

    /// Writes frames into `frames_dir`; `work_dir` takes any intermediate files.
    fn sample(&self, spec: &SampleSpec, work_dir: &Path, frames_dir: &Path, ctx: &JobContext)
        -> JobResult<Vec<PathBuf>>;
}

/// Status line shown while frames accumulate.
pub fn saved_status(count: usize) -> String {
    format!("Saved {} screenshot(s)…", count)
}

/// Image files in `dir` whose names start with `prefix`, sorted by name.
pub fn list_frames(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut frames: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .map(|n| {
                            let n = n.to_string_lossy();
                            n.starts_with(prefix) && n.ends_with(".png")
                        })
                        .unwrap_or(false)
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    frames.sort();
    frames
}
