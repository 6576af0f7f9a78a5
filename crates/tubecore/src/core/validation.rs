//! Request validation
//!
//! Everything here runs before a job is started, so a rejected request never
//! touches the network or spawns a process:
//! - URL presence
//! - Screenshot interval sanity
//! - Bare file names requested through the download endpoint

use std::path::{Component, Path};
use thiserror::Error;

/// Validation errors, worded for direct display to the user
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Empty or whitespace-only URL
    #[error("Please provide a valid YouTube URL")]
    EmptyUrl,

    /// Screenshot interval of zero, below zero or not a number
    #[error("Interval must be > 0 seconds")]
    NonPositiveInterval,

    /// Audio mode label that maps to no known mode
    #[error("Unsupported audio mode: {0}")]
    UnsupportedAudioMode(String),

    /// Bitrate label that does not contain a number
    #[error("Unsupported bitrate: {0}")]
    InvalidBitrate(String),

    /// File name that is not a single plain path component
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
}

/// Returns the trimmed URL, or [`ValidationError::EmptyUrl`] when nothing is left.
///
/// # Examples
/// ```
/// use tubecore::core::validation::require_url;
///
/// assert_eq!(require_url("  https://youtu.be/abc  ").unwrap(), "https://youtu.be/abc");
/// assert!(require_url("   ").is_err());
/// ```
pub fn require_url(url: &str) -> Result<&str, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    Ok(trimmed)
}

/// Checks a screenshot interval in seconds.
///
/// `NaN` and infinities are rejected together with zero and negative values.
pub fn validate_interval(interval: f64) -> Result<f64, ValidationError> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(ValidationError::NonPositiveInterval);
    }
    Ok(interval)
}

/// Validates a file name requested from a session directory.
///
/// # Security
/// Only a single normal path component is accepted: no separators, no `..`,
/// no root or drive prefixes. The name is then joined onto a known session
/// directory, so anything else could escape it.
///
/// # Examples
/// ```
/// use tubecore::core::validation::validate_file_name;
///
/// assert!(validate_file_name("screenshots-20250101-120000.zip").is_ok());
/// assert!(validate_file_name("../etc/passwd").is_err());
/// assert!(validate_file_name("a/b.mp4").is_err());
/// ```
pub fn validate_file_name(name: &str) -> Result<&str, ValidationError> {
    let invalid = || ValidationError::InvalidFileName(name.to_string());

    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(invalid()),
    }
}
