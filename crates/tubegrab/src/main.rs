use anyhow::Result;
use dotenvy::dotenv;

use tubecore::core::{config, init_logger, log_tools_configuration};
use tubecore::Engine;
use tubegrab::cli::{Cli, Commands};
use tubegrab::commands;
use tubegrab::web_server::start_web_server;

/// Main entry point
///
/// Parses CLI arguments and dispatches to the matching subcommand.
/// Without a subcommand the HTTP API is started.
///
/// # Errors
/// Returns an error if initialization fails (logging, HTTP client) or the command fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from worker threads instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env first: LOG_FILE_PATH may come from it
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Serve { port }) => run_server(port).await,
        Some(Commands::Info { url, json }) => {
            let engine = Engine::from_env()?;
            commands::run_info(&engine, &url, json).await
        }
        Some(Commands::Video {
            url,
            resolution,
            container,
            quality,
            common,
            post,
        }) => {
            let engine = Engine::from_env()?;
            commands::run_video(&engine, url, &resolution, &container, &quality, common, post.into()).await
        }
        Some(Commands::Audio {
            url,
            mode,
            bitrate,
            common,
            post,
        }) => {
            let engine = Engine::from_env()?;
            commands::run_audio(&engine, url, &mode, &bitrate, common, post.into()).await
        }
        Some(Commands::Screenshots {
            url,
            interval,
            resolution,
            fast,
            common,
        }) => {
            let engine = Engine::from_env()?;
            commands::run_screenshots(&engine, url, interval, &resolution, fast, common).await
        }
        Some(Commands::Check { ffmpeg }) => commands::run_check(ffmpeg.as_deref()).await,
        None => {
            log::info!("No command specified, starting the HTTP API");
            run_server(None).await
        }
    }
}

/// Run the HTTP API until Ctrl-C
async fn run_server(port: Option<u16>) -> Result<()> {
    if !log_tools_configuration() {
        log::warn!("Jobs will fail until ffmpeg is installed or a location is passed per request");
    }
    let engine = Engine::from_env()?;
    start_web_server(port.unwrap_or(*config::WEB_PORT), engine).await
}
