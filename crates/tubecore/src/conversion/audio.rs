//! Browser-safe audio previews
//!
//! Every audio job also renders a 44.1 kHz stereo 16-bit PCM WAV next to the
//! download unless the download already is a WAV, so any browser can play it.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::FfmpegTools;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{last_stderr_line, run_blocking_with_timeout};
use crate::core::utils::unique_path;

/// Long tracks take a while to decode; keep a generous ceiling.
const PREVIEW_TIMEOUT: Duration = Duration::from_secs(600);

/// True when `path` already is in the preview format.
pub fn is_wav(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// ffmpeg arguments of the preview render.
pub fn preview_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-ar".to_string(),
        "44100".to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Renders `<stem>-preview.wav` next to `input` and returns its path.
///
/// WAV inputs are returned unchanged.
pub fn render_preview(tools: &FfmpegTools, input: &Path) -> AppResult<PathBuf> {
    if is_wav(input) {
        return Ok(input.to_path_buf());
    }

    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let output = unique_path(dir, &format!("{}-preview", stem), "wav")?;

    let mut cmd = Command::new(&tools.ffmpeg);
    cmd.args(preview_args(input, &output));

    let result = run_blocking_with_timeout(&mut cmd, PREVIEW_TIMEOUT);
    match result {
        Ok(out) if out.status.success() => Ok(output),
        Ok(out) => {
            let _ = std::fs::remove_file(&output);
            Err(AppError::Ffmpeg(last_stderr_line(&out)))
        }
        Err(e) => {
            let _ = std::fs::remove_file(&output);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_wav() {
        assert!(is_wav(Path::new("/tmp/a.wav")));
        assert!(is_wav(Path::new("/tmp/a.WAV")));
        assert!(!is_wav(Path::new("/tmp/a.mp3")));
        assert!(!is_wav(Path::new("/tmp/wav")));
    }

    #[test]
    fn test_preview_args() {
        let args = preview_args(Path::new("in.webm"), Path::new("in-preview.wav"));
        let joined = args.join(" ");
        assert!(joined.contains("-i in.webm"));
        assert!(joined.contains("-ar 44100 -ac 2 -acodec pcm_s16le in-preview.wav"));
        assert!(args.contains(&"-y".to_string()));
    }

    #[test]
    fn test_wav_input_is_its_own_preview() {
        let tools = FfmpegTools {
            ffmpeg: PathBuf::from("ffmpeg-missing"),
            ffprobe: PathBuf::from("ffprobe-missing"),
        };
        let path = Path::new("/tmp/song-WAV-lossless-20250101-000000.wav");
        assert_eq!(render_preview(&tools, path).unwrap(), path);
    }
}
