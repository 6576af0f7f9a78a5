use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubegrab")]
#[command(author, version, about = "Download YouTube video, audio and periodic screenshots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (defaults to WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show title, thumbnail and available resolutions
    Info {
        /// Video URL
        url: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a video
    Video {
        /// Video URL
        url: String,

        /// Resolution label or height, e.g. "1080p (Full HD)" or "720p"
        #[arg(short, long, default_value = "Best available (MP4)")]
        resolution: String,

        /// Merge container: "MP4" or "Auto (MKV)"
        #[arg(short, long, default_value = "Auto (MKV)")]
        container: String,

        /// Format sorting: "Best quality (modern)", "MP4 compatibility" or "Balanced"
        #[arg(short, long, default_value = "Balanced")]
        quality: String,

        #[command(flatten)]
        common: JobArgs,

        #[command(flatten)]
        post: PostArgs,
    },

    /// Download audio
    Audio {
        /// Video URL
        url: String,

        /// "Original (OPUS/WebM)", "MP3" or "WAV"
        #[arg(short, long, default_value = "Original (OPUS/WebM)")]
        mode: String,

        /// MP3 bitrate label, e.g. "192 kbps"
        #[arg(short, long, default_value = "320 kbps")]
        bitrate: String,

        #[command(flatten)]
        common: JobArgs,

        #[command(flatten)]
        post: PostArgs,
    },

    /// Extract one screenshot every N seconds into a zip archive
    Screenshots {
        /// Video URL
        url: String,

        /// Seconds between screenshots
        #[arg(short, long, default_value_t = 10.0)]
        interval: f64,

        /// Frame height label, e.g. "720p (HD)" or "Best available"
        #[arg(short, long, default_value = "Best available")]
        resolution: String,

        /// Sample frames straight from the stream instead of downloading first
        #[arg(long)]
        fast: bool,

        #[command(flatten)]
        common: JobArgs,
    },

    /// Check that yt-dlp and ffmpeg are usable
    Check {
        /// ffmpeg binary or the directory containing it
        #[arg(long)]
        ffmpeg: Option<String>,
    },
}

/// Options shared by every job subcommand
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Output folder (defaults to DOWNLOAD_FOLDER)
    #[arg(short, long)]
    pub output: Option<String>,

    /// ffmpeg binary or the directory containing it
    #[arg(long)]
    pub ffmpeg: Option<String>,

    /// Let aria2c do the transfers
    #[arg(long)]
    pub aria2c: bool,

    /// Skip videos already listed in download_archive.txt
    #[arg(long)]
    pub archive: bool,
}

/// yt-dlp postprocessing switches
#[derive(Args, Debug, Clone, Copy)]
pub struct PostArgs {
    #[arg(long)]
    pub embed_metadata: bool,

    #[arg(long)]
    pub embed_thumbnail: bool,

    /// Write subtitles as .srt files
    #[arg(long)]
    pub write_subs: bool,

    #[arg(long)]
    pub embed_subs: bool,

    #[arg(long)]
    pub split_chapters: bool,

    #[arg(long)]
    pub write_info_json: bool,
}

impl From<PostArgs> for tubecore::download::options::PostProcessing {
    fn from(args: PostArgs) -> Self {
        Self {
            embed_metadata: args.embed_metadata,
            embed_thumbnail: args.embed_thumbnail,
            write_subtitles: args.write_subs,
            embed_subtitles: args.embed_subs,
            split_chapters: args.split_chapters,
            write_info_json: args.write_info_json,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
