//! Metadata lookup and download orchestration

pub mod audio;
pub mod metadata;
pub mod options;
pub mod progress;
pub mod source;
pub mod video;
pub mod ytdlp;

// Re-exports for convenience
pub use audio::{download_audio, AudioArtifact, AudioRequest};
pub use metadata::{MetadataResolver, VideoDetails};
pub use source::{DownloadOutcome, FormatDescriptor, MediaExtractor, VideoInfo};
pub use video::{download_video, VideoArtifact, VideoRequest};
pub use ytdlp::YtDlp;
