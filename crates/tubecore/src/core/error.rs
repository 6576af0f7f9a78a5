use thiserror::Error;

use crate::core::validation::ValidationError;

/// Centralized error type for the core library
///
/// Every fallible operation outside of job execution returns this enum.
/// Job workers wrap it into [`crate::jobs::JobError`] so that cancellation
/// stays distinguishable from failure.
///
/// # Example
///
/// ```no_run
/// use tubecore::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// yt-dlp reported a failure or produced no usable file
    #[error("Download error: {0}")]
    Download(String),

    /// ffmpeg/ffprobe failures
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// A required external binary is not available
    #[error("{0}")]
    MissingDependency(String),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answers from oEmbed or the watch page
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding errors (yt-dlp probe output, oEmbed responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive creation errors
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Request validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
