//! Typed download options and the label vocabulary of the UI/API.
//!
//! Requests arrive as human-readable labels ("1080p (Full HD)", "MP3",
//! "320 kbps"). They are parsed once into the types below, and everything
//! downstream works with the types only.

use lazy_regex::regex_captures;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display, EnumString};

use crate::core::validation::ValidationError;

/// Heights offered when a probe yields nothing.
pub const FALLBACK_HEIGHTS: [u32; 5] = [4320, 2160, 1440, 1080, 720];

/// First entry of every video resolution picker.
pub const BEST_VIDEO_LABEL: &str = "Best available (MP4)";

/// First entry of every image resolution picker.
pub const BEST_IMAGE_LABEL: &str = "Best available";

/// Bitrates offered for MP3 extraction.
pub const BITRATE_CHOICES: [&str; 4] = ["320 kbps", "256 kbps", "192 kbps", "128 kbps"];

/// Name of the yt-dlp download archive file.
pub const ARCHIVE_FILE_NAME: &str = "download_archive.txt";

/// Human label of a height ceiling.
///
/// ```
/// use tubecore::download::options::height_label;
///
/// assert_eq!(height_label(Some(2160)), "2160p (4K)");
/// assert_eq!(height_label(Some(480)), "480p");
/// assert_eq!(height_label(None), "Best available");
/// ```
pub fn height_label(height: Option<u32>) -> String {
    match height {
        None => BEST_IMAGE_LABEL.to_string(),
        Some(4320) => "4320p (8K)".to_string(),
        Some(2160) => "2160p (4K)".to_string(),
        Some(1440) => "1440p (QHD)".to_string(),
        Some(1080) => "1080p (Full HD)".to_string(),
        Some(720) => "720p (HD)".to_string(),
        Some(h) => format!("{}p", h),
    }
}

/// Height ceiling encoded in a resolution label; `None` means "best available".
pub fn parse_height_from_label(label: &str) -> Option<u32> {
    if label.contains("Best") {
        return None;
    }
    let (_, digits) = regex_captures!(r"(\d{3,4})p", label)?;
    digits.parse().ok()
}

/// Labels for the video resolution picker.
pub fn video_resolution_labels(heights: &[u32]) -> Vec<String> {
    std::iter::once(BEST_VIDEO_LABEL.to_string())
        .chain(heights.iter().map(|h| height_label(Some(*h))))
        .collect()
}

/// Labels for the screenshot resolution picker.
pub fn image_resolution_labels(heights: &[u32]) -> Vec<String> {
    std::iter::once(BEST_IMAGE_LABEL.to_string())
        .chain(heights.iter().map(|h| height_label(Some(*h))))
        .collect()
}

/// Format-sort priority presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
pub enum QualityPreset {
    #[strum(to_string = "Best quality (modern)")]
    BestModern,
    #[strum(to_string = "MP4 compatibility")]
    Mp4Compat,
    #[default]
    #[strum(to_string = "Balanced")]
    Balanced,
}

impl QualityPreset {
    /// Unknown labels fall back to [`QualityPreset::Balanced`].
    pub fn from_label(label: &str) -> Self {
        label.trim().parse().unwrap_or_default()
    }

    /// Value of yt-dlp's `-S` option.
    pub fn format_sort(&self) -> &'static str {
        match self {
            QualityPreset::BestModern => "res,fps,hdr,codec:av01:vp9.2:vp9:h264,acodec:opus:m4a,br",
            QualityPreset::Mp4Compat => "res,fps,codec:h264,acodec:m4a,br",
            QualityPreset::Balanced => "res,fps,hdr,br",
        }
    }
}

/// Merge container of video downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
pub enum Container {
    #[strum(to_string = "MP4")]
    Mp4,
    #[default]
    #[strum(to_string = "Auto (MKV)")]
    Mkv,
}

impl Container {
    /// "MP4" selects MP4; every other label means MKV.
    pub fn from_label(label: &str) -> Self {
        if label.trim() == "MP4" {
            Container::Mp4
        } else {
            Container::Mkv
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
        }
    }

    /// MP4 output restricts stream selection to MP4/M4A sources.
    pub fn is_mp4(&self) -> bool {
        matches!(self, Container::Mp4)
    }
}

/// What an audio job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// Best audio stream as served, no transcode
    #[default]
    Original,
    /// MP3 at the given bitrate
    Mp3 { bitrate_kbps: u32 },
    /// Lossless WAV
    Wav,
}

impl AudioMode {
    pub const ORIGINAL_LABEL: &'static str = "Original (OPUS/WebM)";

    /// Parses the mode label and, for MP3, the bitrate label.
    pub fn from_labels(mode: &str, bitrate: &str) -> Result<Self, ValidationError> {
        match mode.trim() {
            Self::ORIGINAL_LABEL => Ok(AudioMode::Original),
            "MP3" => Ok(AudioMode::Mp3 {
                bitrate_kbps: parse_bitrate_label(bitrate)?,
            }),
            "WAV" => Ok(AudioMode::Wav),
            other => Err(ValidationError::UnsupportedAudioMode(other.to_string())),
        }
    }

    /// Descriptive part of the output file name.
    pub fn suffix(&self) -> String {
        match self {
            AudioMode::Original => "ORIGINAL".to_string(),
            AudioMode::Mp3 { bitrate_kbps } => format!("MP3-{}kbps", bitrate_kbps),
            AudioMode::Wav => "WAV-lossless".to_string(),
        }
    }

    /// Extension of the extracted file, `None` when the source container is kept.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            AudioMode::Original => None,
            AudioMode::Mp3 { .. } => Some("mp3"),
            AudioMode::Wav => Some("wav"),
        }
    }
}

/// `"320 kbps"` → `320`.
pub fn parse_bitrate_label(label: &str) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidBitrate(label.to_string());
    let (_, digits) = regex_captures!(r"(\d+)", label).ok_or_else(invalid)?;
    digits.parse::<u32>().ok().filter(|b| *b > 0).ok_or_else(invalid)
}

/// yt-dlp `-f` expression for a video download.
///
/// ```
/// use tubecore::download::options::build_format_string;
///
/// assert_eq!(build_format_string(Some(720), true), "bestvideo[ext=mp4][height<=720]+bestaudio[ext=m4a]/best");
/// assert_eq!(build_format_string(None, false), "bestvideo+bestaudio/best");
/// ```
pub fn build_format_string(height: Option<u32>, mp4_compat: bool) -> String {
    let mut video = String::from("bestvideo");
    let mut audio = String::from("bestaudio");
    if mp4_compat {
        video.push_str("[ext=mp4]");
        audio.push_str("[ext=m4a]");
    }
    if let Some(h) = height {
        video.push_str(&format!("[height<={}]", h));
    }
    format!("{}+{}/best", video, audio)
}

/// Single-file, pre-muxed MP4 suitable for local frame decoding.
pub const PROGRESSIVE_FORMAT: &str = "best[ext=mp4][acodec!=none][vcodec!=none]";

/// yt-dlp postprocessing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostProcessing {
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
    pub write_subtitles: bool,
    pub embed_subtitles: bool,
    pub split_chapters: bool,
    pub write_info_json: bool,
}

/// Which streams to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSelection {
    Video {
        height: Option<u32>,
        container: Container,
        quality: QualityPreset,
    },
    Audio {
        mode: AudioMode,
    },
    /// Pre-muxed MP4 for screenshot decoding
    Progressive,
}

/// Everything a single yt-dlp download run needs
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub selection: MediaSelection,
    pub post: PostProcessing,
    pub ffmpeg_location: Option<PathBuf>,
    pub use_aria2c: bool,
    pub archive: Option<PathBuf>,
}

/// Builder for [`DownloadOptions`].
///
/// # Example
///
/// ```
/// use tubecore::download::options::{AudioMode, DownloadOptionsBuilder, MediaSelection};
///
/// let options = DownloadOptionsBuilder::new("/tmp/session", MediaSelection::Audio { mode: AudioMode::Wav })
///     .use_aria2c(true)
///     .build();
/// assert!(options.use_aria2c);
/// ```
pub struct DownloadOptionsBuilder {
    options: DownloadOptions,
}

impl DownloadOptionsBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, selection: MediaSelection) -> Self {
        Self {
            options: DownloadOptions {
                output_dir: output_dir.into(),
                selection,
                post: PostProcessing::default(),
                ffmpeg_location: None,
                use_aria2c: false,
                archive: None,
            },
        }
    }

    /// Set the postprocessing switches.
    pub fn post_processing(mut self, post: PostProcessing) -> Self {
        self.options.post = post;
        self
    }

    /// Directory holding the ffmpeg binary yt-dlp should use.
    pub fn ffmpeg_location(mut self, dir: Option<&Path>) -> Self {
        self.options.ffmpeg_location = dir.map(Path::to_path_buf);
        self
    }

    /// Hand transfers to aria2c.
    pub fn use_aria2c(mut self, enabled: bool) -> Self {
        self.options.use_aria2c = enabled;
        self
    }

    /// Record finished downloads in (and skip those listed in) an archive file.
    pub fn archive(mut self, path: Option<PathBuf>) -> Self {
        self.options.archive = path;
        self
    }

    pub fn build(self) -> DownloadOptions {
        self.options
    }
}

/// Archive location: inside the save folder when one is used, else the working directory.
pub fn archive_path(save_folder: Option<&Path>) -> PathBuf {
    match save_folder {
        Some(folder) => folder.join(ARCHIVE_FILE_NAME),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(ARCHIVE_FILE_NAME),
    }
}
