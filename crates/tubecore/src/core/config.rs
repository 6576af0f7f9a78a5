use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Default ffmpeg location (binary or directory containing it)
/// Read from FFMPEG_PATH environment variable; per-request overrides win over it.
/// When unset, ffmpeg is looked up on PATH.
pub static FFMPEG_PATH: Lazy<Option<String>> =
    Lazy::new(|| env::var("FFMPEG_PATH").ok().filter(|p| !p.trim().is_empty()));

/// Directory under which per-job session directories are created
/// Read from TEMP_FILES_DIR environment variable
/// Defaults to the system temp directory, supports tilde (~) expansion
pub static TEMP_FILES_DIR: Lazy<PathBuf> = Lazy::new(|| match env::var("TEMP_FILES_DIR") {
    Ok(dir) if !dir.trim().is_empty() => PathBuf::from(shellexpand::tilde(&dir).to_string()),
    _ => env::temp_dir(),
});

/// Output folder used by the CLI when no --output is given
/// Read from DOWNLOAD_FOLDER environment variable
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/Downloads/tubegrab".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: tubegrab.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tubegrab.log".to_string()));

/// HTTP API port
/// Read from WEB_PORT environment variable
/// Default: 8000
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000)
});

/// Title lookup endpoint (oEmbed)
/// Read from OEMBED_ENDPOINT environment variable
pub static OEMBED_ENDPOINT: Lazy<String> = Lazy::new(|| {
    env::var("OEMBED_ENDPOINT").unwrap_or_else(|_| "https://www.youtube.com/oembed".to_string())
});

/// Job supervision configuration
pub mod jobs {
    use super::Duration;

    /// Interval between progress polls (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 200;

    /// Progress poll interval duration
    pub fn poll_interval() -> Duration {
        Duration::from_millis(POLL_INTERVAL_MS)
    }
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// yt-dlp internal retry counters (kept low, retries are not ours to manage)
    pub const RETRIES: u32 = 1;
    pub const EXTRACTOR_RETRIES: u32 = 1;

    /// yt-dlp socket timeout (in seconds)
    pub const SOCKET_TIMEOUT_SECS: u64 = 15;

    /// Hard ceiling for a single yt-dlp download run (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 3 * 60 * 60;

    /// Hard ceiling for a metadata-only probe (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 60;

    /// Maximum length of the title part of yt-dlp output templates (in bytes)
    pub const TITLE_MAX_BYTES: usize = 200;

    /// yt-dlp download timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    /// yt-dlp probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }
}

/// Metadata resolution configuration
pub mod metadata {
    use super::Duration;

    /// Desktop browser User-Agent sent with title lookups
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    /// Consent cookie that skips the regional consent interstitial
    pub const CONSENT_COOKIE: &str = "CONSENT=YES+1";

    /// oEmbed request timeout (in seconds)
    pub const OEMBED_TIMEOUT_SECS: u64 = 6;

    /// Watch page request timeout (in seconds)
    pub const PAGE_TIMEOUT_SECS: u64 = 10;

    pub fn oembed_timeout() -> Duration {
        Duration::from_secs(OEMBED_TIMEOUT_SECS)
    }

    pub fn page_timeout() -> Duration {
        Duration::from_secs(PAGE_TIMEOUT_SECS)
    }
}

/// Screenshot extraction configuration
pub mod screenshots {
    use super::Duration;

    /// Interval between checks for newly written frames (in milliseconds)
    pub const STREAM_POLL_MS: u64 = 300;

    /// Grace period between asking ffmpeg to quit and killing it (in seconds)
    pub const TERMINATE_GRACE_SECS: u64 = 2;

    /// Smallest sampling interval passed to the fps filter (in seconds)
    pub const MIN_STREAM_INTERVAL_SECS: f64 = 0.1;

    /// Progress points per saved frame in stream mode
    pub const STREAM_PERCENT_PER_FRAME: u32 = 4;

    /// Share of the progress bar spent on the progressive download in local-decode mode
    pub const DECODE_DOWNLOAD_SHARE: u8 = 30;

    pub fn stream_poll_interval() -> Duration {
        Duration::from_millis(STREAM_POLL_MS)
    }

    pub fn terminate_grace() -> Duration {
        Duration::from_secs(TERMINATE_GRACE_SECS)
    }
}

/// Session workspace retention
pub mod session {
    use super::Duration;
    use std::env;

    /// How long finished sessions stay downloadable (in seconds)
    /// Read from SESSION_TTL_SECS environment variable
    pub fn ttl() -> Duration {
        Duration::from_secs(read_secs("SESSION_TTL_SECS", 15 * 60))
    }

    /// Interval between expiry sweeps (in seconds)
    /// Read from SESSION_SWEEP_SECS environment variable
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(read_secs("SESSION_SWEEP_SECS", 60).max(1))
    }

    fn read_secs(var: &str, default: u64) -> u64 {
        env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}
