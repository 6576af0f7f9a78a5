//! Logging initialization and startup diagnostics
//!
//! - Logger initialization (console + file)
//! - External tool configuration check

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::conversion::resolve_ffmpeg;
use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs where yt-dlp, ffmpeg and the session directories come from.
///
/// Returns false when ffmpeg is missing, in which case every job will fail.
pub fn log_tools_configuration() -> bool {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("External tools");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("YTDL_BIN: {}", config::YTDL_BIN.as_str());

    if let Some(path) = config::FFMPEG_PATH.as_deref() {
        log::info!("FFMPEG_PATH: {}", path);
    } else {
        log::info!("FFMPEG_PATH: not set, using PATH lookup");
    }

    let ffmpeg_ok = match resolve_ffmpeg(config::FFMPEG_PATH.as_deref()) {
        Some(tools) => {
            log::info!("✅ ffmpeg: {}", tools.ffmpeg.display());
            log::info!("   ffprobe: {}", tools.ffprobe.display());
            true
        }
        None => {
            log::error!("❌ ffmpeg not found, every job will fail until it is installed");
            false
        }
    };

    log::info!("Session directories under {}", config::TEMP_FILES_DIR.display());
    log::info!(
        "Sessions kept for {}s, swept every {}s",
        config::session::ttl().as_secs(),
        config::session::sweep_interval().as_secs()
    );
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    ffmpeg_ok
}
