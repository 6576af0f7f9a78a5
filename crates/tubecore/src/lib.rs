//! tubecore - YouTube media retrieval orchestration
//!
//! Normalizes watch URLs, resolves titles and available resolutions, and runs
//! video, audio and screenshot jobs on top of yt-dlp and ffmpeg with progress
//! reporting and cooperative cancellation.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, sessions, URL and file name helpers
//! - `conversion`: ffmpeg discovery and audio previews
//! - `download`: metadata, yt-dlp adapter, video and audio orchestrators
//! - `jobs`: background workers, progress polling, cancellation
//! - `screenshots`: frame samplers, fallback logic, archives
//! - `engine`: the job entry points used by the CLI and the HTTP API

pub mod conversion;
pub mod core;
pub mod download;
pub mod engine;
pub mod jobs;
pub mod screenshots;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use engine::{Engine, FfmpegLocator, SessionOutput, SystemFfmpeg};
pub use jobs::{JobEvent, JobOutcome, RunningJob};
